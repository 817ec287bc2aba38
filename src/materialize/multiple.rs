use crate::command::ExecuteMode;
use crate::error::FluentDbError;
use crate::mapping::ResultShapes;
use crate::results::ResultSet;
use crate::session::CommandSession;

impl CommandSession {
    /// Read consecutive result sets into one list per shape.
    ///
    /// ```rust,no_run
    /// # use sql_fluent::prelude::*;
    /// # #[derive(serde::Deserialize)] struct Category { id: i64 }
    /// # #[derive(serde::Deserialize)] struct Product { id: i64 }
    /// # async fn demo(session: &mut CommandSession) -> Result<(), FluentDbError> {
    /// let (categories, products) = session
    ///     .set_command("SELECT * FROM categories; SELECT * FROM products;")
    ///     .execute_multiple::<(Category, Product)>()
    ///     .await?;
    /// # let _ = (categories, products);
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// `FluentDbError::ResultSetCountMismatch` when fewer result sets come back than
    /// shapes were requested, plus the usual session and mapping errors.
    pub async fn execute_multiple<S: ResultShapes>(&mut self) -> Result<S::Output, FluentDbError> {
        let execution = self.run_command(ExecuteMode::Query).await?;
        S::read(execution.result_sets)
    }

    /// Untyped form of `execute_multiple` for any number of result sets.
    ///
    /// # Errors
    /// `FluentDbError::Argument` for `count == 0`,
    /// `FluentDbError::ResultSetCountMismatch` when fewer sets come back.
    pub async fn execute_result_sets(&mut self, count: usize) -> Result<Vec<ResultSet>, FluentDbError> {
        if count == 0 {
            return Err(FluentDbError::Argument(
                "at least one result set must be requested".into(),
            ));
        }
        let mut sets = self.run_command(ExecuteMode::Query).await?.result_sets;
        if sets.len() < count {
            return Err(FluentDbError::ResultSetCountMismatch {
                expected: count,
                actual: sets.len(),
            });
        }
        sets.truncate(count);
        Ok(sets)
    }
}
