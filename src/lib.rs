//! Embedded SQLite logging of experiment runs.
//!
//! A database file holds two tables: INFO with one row per run (the
//! declared metadata columns) and DATA with the per-step records, linked
//! by a cascading foreign key. Independent OS processes can create runs
//! and append data concurrently; every operation uses its own short-lived
//! connection. A generic single-table store ([`TableDb`]) lives alongside
//! for small lookup tables.

pub mod db;
pub mod store;

#[cfg(test)]
mod tests;

pub use db::error::{DbError, SchemaOutcome};
pub use db::run::RunDb;
pub use db::schema::{get_columns, table_exists, validate_cols, ColumnField};
pub use db::types::{ColumnSpec, Record, SqlType, SqlValue};
pub use db::{
    connect, create_db, delete_run, query, query_as_map, query_one, query_one_as_map, DATA_TABLE,
    INFO_TABLE, RUNID_COLUMN,
};
pub use store::TableDb;
