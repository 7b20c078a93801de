//! SQL statements, builders and dialect-specific session control

mod dialect;
mod statement;

pub use dialect::SqlDialect;
pub use statement::{InsertBuilder, Statement, UpdateBuilder, literal};
