//! Repository functions, one function per database operation.
//!
//! Every function takes a `&DbPool` and returns a `Result<T, DbError>`.
//! Pure SQL with no business logic.

pub mod instances;
pub mod jobs;
pub mod reports;
