use std::collections::{BTreeSet, HashMap};
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Column, Row, Sqlite, TypeInfo, ValueRef};

use crate::db::error::DbError;

/// The semantic column types and dynamic scalar values shared by both tables.

/// SQLite storage classes a column can be declared with.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum SqlType {
    Null,
    Integer,
    Real,
    Text,
    Blob,
}

impl SqlType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Null => "NULL",
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Text => "TEXT",
            SqlType::Blob => "BLOB",
        }
    }
}

impl Display for SqlType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_sql())
    }
}

/// An owned scalar as stored in a column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Real(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        SqlValue::Blob(value)
    }
}

impl From<&[u8]> for SqlValue {
    fn from(value: &[u8]) -> Self {
        SqlValue::Blob(value.to_vec())
    }
}

impl<T> From<Option<T>> for SqlValue
where
    T: Into<SqlValue>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => value.into(),
            None => SqlValue::Null,
        }
    }
}

/// One record, keyed by column name.
pub type Record = HashMap<String, SqlValue>;

/// Builds a [`Record`] from `"column" => value` pairs.
#[macro_export]
macro_rules! record {
    () => {
        $crate::db::types::Record::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut record = $crate::db::types::Record::new();
        $(
            record.insert(String::from($key), $crate::db::types::SqlValue::from($value));
        )+
        record
    }};
}

/// Ordered column declaration for one table, excluding the `runid` key.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    columns: Vec<(String, SqlType)>,
}

impl ColumnSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(mut self, name: impl Into<String>, ty: SqlType) -> Self {
        self.columns.push((name.into(), ty));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, SqlType)> + '_ {
        self.columns.iter().map(|(name, ty)| (name.as_str(), *ty))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// `"name TYPE"` per column, the same rendering introspection produces.
    pub fn rendered(&self) -> Vec<String> {
        self.columns
            .iter()
            .map(|(name, ty)| format!("{} {}", name, ty.as_sql()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Rejects a record whose key set differs from the declared column set.
/// Order-independent; runs before anything reaches the engine.
pub(crate) fn check_keys(table: &str, expected: &[String], record: &Record) -> Result<(), DbError> {
    let expected_set: BTreeSet<&str> = expected.iter().map(String::as_str).collect();
    let received_set: BTreeSet<&str> = record.keys().map(String::as_str).collect();
    if expected_set == received_set {
        return Ok(());
    }
    Err(DbError::WrongKeys {
        table: table.to_string(),
        expected: expected.to_vec(),
        received: received_set.into_iter().map(String::from).collect(),
    })
}

pub(crate) fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &SqlValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        SqlValue::Null => query.bind(None::<i64>),
        SqlValue::Integer(value) => query.bind(*value),
        SqlValue::Real(value) => query.bind(*value),
        SqlValue::Text(value) => query.bind(value.clone()),
        SqlValue::Blob(value) => query.bind(value.clone()),
    }
}

pub(crate) fn decode_value(row: &SqliteRow, index: usize) -> Result<SqlValue, DbError> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }
    let type_info = raw.type_info();
    let value = match type_info.name() {
        "INTEGER" => SqlValue::Integer(row.try_get(index)?),
        "REAL" => SqlValue::Real(row.try_get(index)?),
        "TEXT" => SqlValue::Text(row.try_get(index)?),
        "BLOB" => SqlValue::Blob(row.try_get(index)?),
        other => return Err(DbError::UnsupportedType(other.to_string())),
    };
    Ok(value)
}

pub(crate) fn decode_row(row: &SqliteRow) -> Result<Vec<SqlValue>, DbError> {
    (0..row.len()).map(|index| decode_value(row, index)).collect()
}

pub(crate) fn row_to_map(row: &SqliteRow) -> Result<Record, DbError> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(index, column)| Ok((column.name().to_string(), decode_value(row, index)?)))
        .collect()
}
