//! Buffered tabular results shared by every engine.

mod result_set;
mod row;

pub use result_set::ResultSet;
pub use row::CustomDbRow;
