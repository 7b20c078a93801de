//! Template column classification and destination table descriptors

mod category;
mod columns;
pub mod tables;

pub use category::{Category, DISCIPLINE_PLACEHOLDER};
pub use columns::{ColumnMap, ColumnMismatch, MismatchReason, SchemaError};
