use std::path::{Path, PathBuf};

use itertools::Itertools;
use sqlx::{Connection, Row, SqliteConnection};

use crate::db::connect_creating;
use crate::db::error::DbError;
use crate::db::schema::{ensure_identifier, table_exists};
use crate::db::types::{bind_value, check_keys, row_to_map, Record, SqlValue};

/// Generic single-table store, independent of the run-tracking schema.
/// The first declared column is the primary key. Handy for small lookup
/// tables; not part of the concurrency story.

pub const STORE_TABLE: &str = "data";

pub struct TableDb {
    db_file: PathBuf,
    columns: Vec<String>,
}

impl TableDb {
    /// Opens (creating the file if needed) and loads the column list when
    /// the table already exists.
    pub async fn open(file: impl AsRef<Path>) -> Result<Self, DbError> {
        let file = file.as_ref();
        let mut conn = connect_creating(file).await?;
        let columns = Self::load_columns(&mut conn).await;
        conn.close().await?;
        Ok(Self {
            db_file: file.to_path_buf(),
            columns: columns?,
        })
    }

    async fn load_columns(conn: &mut SqliteConnection) -> Result<Vec<String>, DbError> {
        if !table_exists(conn, STORE_TABLE).await? {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!("PRAGMA table_info({});", STORE_TABLE))
            .fetch_all(conn)
            .await?;
        Ok(rows
            .iter()
            .map(|row| row.try_get("name"))
            .collect::<Result<Vec<String>, sqlx::Error>>()?)
    }

    /// Creates the table. The first column is the primary key.
    pub async fn create(&mut self, columns: &[&str]) -> Result<(), DbError> {
        if !self.columns.is_empty() {
            return Err(DbError::AlreadyInitialized);
        }
        let primary = *columns.first().ok_or(DbError::NoColumns)?;
        for column in columns {
            ensure_identifier(column)?;
        }

        let decl = format!(
            "CREATE TABLE IF NOT EXISTS {} ({}, PRIMARY KEY ({}))",
            STORE_TABLE,
            columns.iter().join(", "),
            primary,
        );
        let mut conn = connect_creating(&self.db_file).await?;
        let result = sqlx::query(&decl).execute(&mut conn).await;
        conn.close().await?;
        result?;

        self.columns = columns.iter().map(|c| c.to_string()).collect();
        Ok(())
    }

    /// Inserts one record; its key set must match the declared columns
    /// exactly. A duplicate primary key surfaces the engine error as-is.
    pub async fn insert_one(&self, entry: &Record) -> Result<(), DbError> {
        if self.columns.is_empty() {
            return Err(DbError::NotInitialized);
        }
        check_keys(STORE_TABLE, &self.columns, entry)?;

        let cmd = format!(
            "INSERT INTO {} VALUES ({})",
            STORE_TABLE,
            std::iter::repeat("?").take(self.columns.len()).join(", "),
        );
        let mut conn = connect_creating(&self.db_file).await?;
        let mut statement = sqlx::query(&cmd);
        for column in &self.columns {
            statement = bind_value(statement, &entry[column.as_str()]);
        }
        let result = statement.execute(&mut conn).await;
        conn.close().await?;
        result?;
        Ok(())
    }

    /// Inserts records one by one, stopping at the first failure.
    pub async fn insert_all(&self, entries: &[Record]) -> Result<(), DbError> {
        for entry in entries {
            self.insert_one(entry).await?;
        }
        Ok(())
    }

    pub async fn delete_one(&self, column: &str, value: &SqlValue) -> Result<(), DbError> {
        self.ensure_column(column)?;
        let cmd = format!("DELETE FROM {} WHERE {} = ?", STORE_TABLE, column);
        let mut conn = connect_creating(&self.db_file).await?;
        let result = bind_value(sqlx::query(&cmd), value).execute(&mut conn).await;
        conn.close().await?;
        result?;
        Ok(())
    }

    pub async fn delete_all(&self, column: &str, values: &[SqlValue]) -> Result<(), DbError> {
        for value in values {
            self.delete_one(column, value).await?;
        }
        Ok(())
    }

    /// Returns every record where `column = value`, keyed by column name.
    pub async fn query(&self, column: &str, value: &SqlValue) -> Result<Vec<Record>, DbError> {
        if self.columns.is_empty() {
            return Err(DbError::NotInitialized);
        }
        self.ensure_column(column)?;

        let cmd = format!("SELECT * FROM {} WHERE {} = ?", STORE_TABLE, column);
        let mut conn = connect_creating(&self.db_file).await?;
        let rows = bind_value(sqlx::query(&cmd), value)
            .fetch_all(&mut conn)
            .await;
        conn.close().await?;
        rows?.iter().map(row_to_map).collect()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    fn ensure_column(&self, column: &str) -> Result<(), DbError> {
        match self.columns.iter().any(|c| c == column) {
            true => Ok(()),
            false => Err(DbError::UnknownColumn {
                column: column.to_string(),
                table: STORE_TABLE.to_string(),
            }),
        }
    }
}
