//! Arity adapters: tuples of target types for multi-result and multi-entity reads.

use std::ops::Range;

use serde::de::DeserializeOwned;

use super::{from_columns, from_result_set};
use crate::error::FluentDbError;
use crate::results::{CustomDbRow, ResultSet};

/// A tuple of entity types materialized side by side from one joined row.
pub trait FromSegments: Sized {
    /// Number of entities, i.e. segments per row.
    const ARITY: usize;

    /// Materialize every entity from its column range.
    ///
    /// # Errors
    /// Returns `FluentDbError::Mapping` if a segment cannot be deserialized.
    fn from_segments(row: &CustomDbRow, segments: &[Range<usize>]) -> Result<Self, FluentDbError>;
}

/// A combine function taking the entities of one row as separate arguments.
///
/// Implemented for every `FnMut(T1, .., Tn) -> R` with n = 2..=6.
pub trait Combine<Args, R> {
    fn combine(&mut self, args: Args) -> R;
}

/// A tuple of target types read from consecutive result sets.
pub trait ResultShapes {
    /// `(Vec<T1>, .., Vec<Tn>)`
    type Output;
    /// Number of result sets consumed.
    const COUNT: usize;

    /// Read one list per result set, in order.
    ///
    /// # Errors
    /// `FluentDbError::ResultSetCountMismatch` if fewer sets are available, or a mapping
    /// error from any row.
    fn read(sets: Vec<ResultSet>) -> Result<Self::Output, FluentDbError>;
}

fn segment<T: DeserializeOwned>(
    row: &CustomDbRow,
    segments: &[Range<usize>],
    index: usize,
) -> Result<T, FluentDbError> {
    let range = segments
        .get(index)
        .cloned()
        .ok_or_else(|| FluentDbError::Mapping(format!("no column segment for entity {index}")))?;
    match (row.column_names.get(range.clone()), row.rows.get(range)) {
        (Some(columns), Some(values)) => from_columns(columns, values),
        _ => Err(FluentDbError::Mapping(format!(
            "column segment for entity {index} is out of bounds"
        ))),
    }
}

fn next_list<T: DeserializeOwned>(
    sets: &mut std::vec::IntoIter<ResultSet>,
    expected: usize,
    actual: usize,
) -> Result<Vec<T>, FluentDbError> {
    let set = sets
        .next()
        .ok_or(FluentDbError::ResultSetCountMismatch { expected, actual })?;
    from_result_set(set)
}

macro_rules! impl_from_segments {
    ($arity:expr; $($name:ident $idx:tt),+) => {
        impl<$($name: DeserializeOwned),+> FromSegments for ($($name,)+) {
            const ARITY: usize = $arity;

            fn from_segments(
                row: &CustomDbRow,
                segments: &[Range<usize>],
            ) -> Result<Self, FluentDbError> {
                Ok(($(segment::<$name>(row, segments, $idx)?,)+))
            }
        }
    };
}

macro_rules! impl_combine {
    ($($name:ident $var:ident),+) => {
        impl<Func, R, $($name),+> Combine<($($name,)+), R> for Func
        where
            Func: FnMut($($name),+) -> R,
        {
            fn combine(&mut self, ($($var,)+): ($($name,)+)) -> R {
                self($($var),+)
            }
        }
    };
}

macro_rules! impl_result_shapes {
    ($count:expr; $($name:ident),+) => {
        impl<$($name: DeserializeOwned),+> ResultShapes for ($($name,)+) {
            type Output = ($(Vec<$name>,)+);
            const COUNT: usize = $count;

            fn read(sets: Vec<ResultSet>) -> Result<Self::Output, FluentDbError> {
                let actual = sets.len();
                if actual < Self::COUNT {
                    return Err(FluentDbError::ResultSetCountMismatch {
                        expected: Self::COUNT,
                        actual,
                    });
                }
                let mut sets = sets.into_iter();
                Ok(($(next_list::<$name>(&mut sets, Self::COUNT, actual)?,)+))
            }
        }
    };
}

impl_from_segments!(2; A 0, B 1);
impl_from_segments!(3; A 0, B 1, C 2);
impl_from_segments!(4; A 0, B 1, C 2, D 3);
impl_from_segments!(5; A 0, B 1, C 2, D 3, E 4);
impl_from_segments!(6; A 0, B 1, C 2, D 3, E 4, F 5);

impl_combine!(A a, B b);
impl_combine!(A a, B b, C c);
impl_combine!(A a, B b, C c, D d);
impl_combine!(A a, B b, C c, D d, E e);
impl_combine!(A a, B b, C c, D d, E e, F f);

impl_result_shapes!(1; A);
impl_result_shapes!(2; A, B);
impl_result_shapes!(3; A, B, C);
impl_result_shapes!(4; A, B, C, D);
impl_result_shapes!(5; A, B, C, D, E);
impl_result_shapes!(6; A, B, C, D, E, F);

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;
    use crate::mapping::split::{SplitOn, plan_segments};
    use crate::types::RowValues;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Order {
        id: i64,
        total: f64,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Customer {
        id: i64,
        name: String,
    }

    fn joined() -> ResultSet {
        let mut rs = ResultSet::new(vec![
            "Id".into(),
            "Total".into(),
            "Id".into(),
            "Name".into(),
        ]);
        rs.add_row_values(vec![
            RowValues::Int(10),
            RowValues::Float(99.5),
            RowValues::Int(3),
            RowValues::Text("Ana".into()),
        ]);
        rs
    }

    #[test]
    fn segments_feed_each_entity_then_combine() {
        let rs = joined();
        let plan = plan_segments(rs.column_names(), 2, &SplitOn::default()).unwrap();
        let row = rs.first().unwrap();
        let pair = <(Order, Customer)>::from_segments(row, &plan).unwrap();
        let mut combine = |order: Order, customer: Customer| (order.id, customer.name);
        let combined = Combine::combine(&mut combine, pair);
        assert_eq!(combined, (10, "Ana".to_string()));
    }

    #[test]
    fn result_shapes_require_enough_sets() {
        let err = <(Order, Customer)>::read(vec![joined()]).unwrap_err();
        assert!(matches!(
            err,
            FluentDbError::ResultSetCountMismatch {
                expected: 2,
                actual: 1
            }
        ));
        let (orders,) = <(Order,)>::read(vec![joined()]).unwrap();
        assert_eq!(orders, vec![Order { id: 10, total: 99.5 }]);
    }
}
