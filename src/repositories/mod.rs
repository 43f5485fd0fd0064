use crate::db_persistence::DbError;

pub type DbResult<T> = Result<T, DbError>;

pub mod challenge;
pub mod kv_store;
pub mod session;
