use std::fmt;
use std::marker::PhantomData;
use std::ops::Range;

use crate::command::ExecuteMode;
use crate::error::FluentDbError;
use crate::mapping::{Combine, FromSegments, SplitOn, plan_segments};
use crate::results::CustomDbRow;
use crate::session::CommandSession;

/// Lazy sequence of combined entities, one per row, in row order.
///
/// Each row is split and materialized only when the iterator reaches it.
pub struct MappedRows<T, R, F> {
    rows: std::vec::IntoIter<CustomDbRow>,
    segments: Vec<Range<usize>>,
    combine: F,
    _shapes: PhantomData<fn() -> (T, R)>,
}

impl<T, R, F> Iterator for MappedRows<T, R, F>
where
    T: FromSegments,
    F: Combine<T, R>,
{
    type Item = Result<R, FluentDbError>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        Some(T::from_segments(&row, &self.segments).map(|entities| self.combine.combine(entities)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl<T, R, F> fmt::Debug for MappedRows<T, R, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedRows")
            .field("remaining", &self.rows.len())
            .field("segments", &self.segments)
            .finish_non_exhaustive()
    }
}

impl CommandSession {
    /// Split every row of the first result set into `T`'s entities and combine them.
    ///
    /// `T` is a tuple of 2 to 6 entity types; `split_on` names the first column of
    /// each entity after the first (or one name used at every boundary, or a
    /// comma-separated list). An entity whose columns are all NULL is still built
    /// from defaults; deserialize into `Option<_>` inside the entity to tell.
    ///
    /// ```rust,no_run
    /// # use sql_fluent::prelude::*;
    /// # #[derive(serde::Deserialize)] struct Product { id: i64 }
    /// # #[derive(serde::Deserialize)] struct Category { id: i64 }
    /// # async fn demo(session: &mut CommandSession) -> Result<(), FluentDbError> {
    /// let pairs: Vec<(i64, i64)> = session
    ///     .set_command("SELECT p.id, p.name, c.id, c.name FROM products p JOIN categories c ON c.id = p.category_id")
    ///     .execute_mapping::<(Product, Category), _, _>(
    ///         |p: Product, c: Category| (p.id, c.id),
    ///         "id",
    ///     )
    ///     .await?
    ///     .collect::<Result<_, _>>()?;
    /// # let _ = pairs;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// `FluentDbError::SplitColumnNotFound` when a split column is missing,
    /// `FluentDbError::Argument` for a marker count that fits neither form, plus the
    /// usual session errors. Mapping errors surface per row from the iterator.
    pub async fn execute_mapping<T, R, F>(
        &mut self,
        combine: F,
        split_on: impl Into<SplitOn>,
    ) -> Result<MappedRows<T, R, F>, FluentDbError>
    where
        T: FromSegments,
        F: Combine<T, R>,
    {
        let split_on = split_on.into();
        let execution = self.run_command(ExecuteMode::Query).await?;
        let (rows, segments) = match execution.result_sets.into_iter().next() {
            Some(set) => {
                let segments = plan_segments(set.column_names(), T::ARITY, &split_on)?;
                (set.into_iter(), segments)
            }
            None => (Vec::new().into_iter(), Vec::new()),
        };
        Ok(MappedRows {
            rows,
            segments,
            combine,
            _shapes: PhantomData,
        })
    }
}
