use itertools::Itertools;
use sqlx::{Row, SqliteConnection};

use crate::db::error::DbError;
use crate::db::types::ColumnSpec;
use crate::db::RUNID_COLUMN;

/// Schema introspection against the live file. The declared column spec and
/// the introspected one must agree exactly before a database is used.

/// `PRAGMA table_info` fields a column can be rendered with.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ColumnField {
    Name,
    Type,
    NotNull,
    DefaultValue,
    KeyPosition,
}

/// Table and column names are interpolated into statements, so anything
/// that is not a plain identifier is rejected up front.
pub(crate) fn ensure_identifier(name: &str) -> Result<(), DbError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    match valid {
        true => Ok(()),
        false => Err(DbError::InvalidIdentifier(name.to_string())),
    }
}

pub async fn table_exists(conn: &mut SqliteConnection, name: &str) -> Result<bool, DbError> {
    let row = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?;")
        .bind(name)
        .fetch_optional(conn)
        .await?;
    Ok(row.is_some())
}

/// Ordered non-key columns of `table`, each rendered as the requested
/// fields space-joined. The `runid` identity/foreign-key column and any
/// primary-key column are skipped.
pub async fn get_columns(
    conn: &mut SqliteConnection,
    table: &str,
    fields: &[ColumnField],
) -> Result<Vec<String>, DbError> {
    ensure_identifier(table)?;
    let rows = sqlx::query(&format!("PRAGMA table_info({});", table))
        .fetch_all(conn)
        .await?;

    let mut columns = Vec::new();
    for row in rows {
        let name: String = row.try_get("name")?;
        let key_position: i64 = row.try_get("pk")?;
        if key_position != 0 || name == RUNID_COLUMN {
            continue;
        }
        let rendered = fields
            .iter()
            .map(|field| match field {
                ColumnField::Name => Ok(name.clone()),
                ColumnField::Type => row.try_get("type"),
                ColumnField::NotNull => row.try_get::<i64, _>("notnull").map(|v| v.to_string()),
                ColumnField::DefaultValue => row
                    .try_get::<Option<String>, _>("dflt_value")
                    .map(|v| v.unwrap_or_else(|| "NULL".to_string())),
                ColumnField::KeyPosition => row.try_get::<i64, _>("pk").map(|v| v.to_string()),
            })
            .collect::<Result<Vec<String>, sqlx::Error>>()?;
        columns.push(rendered.iter().join(" "));
    }
    Ok(columns)
}

/// Fails with [`DbError::SchemaMismatch`] unless the introspected
/// `(name, type)` list of `table` is element-wise identical to `spec`.
pub async fn validate_cols(
    conn: &mut SqliteConnection,
    spec: &ColumnSpec,
    table: &str,
) -> Result<(), DbError> {
    let existing = get_columns(conn, table, &[ColumnField::Name, ColumnField::Type]).await?;
    let declared = spec.rendered();
    if existing != declared {
        return Err(DbError::SchemaMismatch {
            table: table.to_string(),
            existing,
            declared,
        });
    }
    Ok(())
}
