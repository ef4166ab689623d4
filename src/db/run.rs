use std::path::{Path, PathBuf};

use itertools::Itertools;
use sqlx::{Connection, SqliteConnection};

use crate::db::error::DbError;
use crate::db::schema::{get_columns, table_exists, ColumnField};
use crate::db::types::{bind_value, check_keys, Record};
use crate::db::{connect, DATA_TABLE, INFO_TABLE, RUNID_COLUMN};

/// One logged experiment run.
///
/// Construction inserts the run's INFO row and captures the engine-assigned
/// id; [`insert`](RunDb::insert) appends DATA rows stamped with that id.
/// Every call opens its own short-lived connection, so independent processes
/// can write to the same file concurrently.
#[derive(Clone, Debug)]
pub struct RunDb {
    db_file: PathBuf,
    run_id: i64,
    info_cols: Vec<String>,
    data_cols: Vec<String>,
    insert_cmd: String,
}

impl RunDb {
    /// Opens an existing run database and creates one new run described by
    /// `run_info`, whose keys must match the INFO columns exactly.
    pub async fn new(file: impl AsRef<Path>, run_info: &Record) -> Result<Self, DbError> {
        let file = file.as_ref();
        if !file.exists() {
            return Err(DbError::DatabaseMissing(file.to_path_buf()));
        }

        // The connection is closed on every exit path, so the fallible
        // work happens in a helper and the error propagates after close.
        let mut conn = connect(file).await?;
        let created = Self::create_run(&mut conn, run_info).await;
        conn.close().await?;
        let (info_cols, data_cols, insert_cmd, run_id) = created?;

        Ok(Self {
            db_file: file.to_path_buf(),
            run_id,
            info_cols,
            data_cols,
            insert_cmd,
        })
    }

    async fn create_run(
        conn: &mut SqliteConnection,
        run_info: &Record,
    ) -> Result<(Vec<String>, Vec<String>, String, i64), DbError> {
        for table in [INFO_TABLE, DATA_TABLE] {
            if !table_exists(conn, table).await? {
                return Err(DbError::MissingTable(table.to_string()));
            }
        }

        let info_cols = get_columns(conn, INFO_TABLE, &[ColumnField::Name]).await?;
        let data_cols = get_columns(conn, DATA_TABLE, &[ColumnField::Name]).await?;

        let insert_cmd = format!(
            "INSERT INTO {} ({}, {}) VALUES ({})",
            DATA_TABLE,
            RUNID_COLUMN,
            data_cols.iter().join(", "),
            std::iter::repeat("?").take(data_cols.len() + 1).join(", "),
        );
        let create_run_cmd = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            INFO_TABLE,
            info_cols.iter().join(", "),
            std::iter::repeat("?").take(info_cols.len()).join(", "),
        );

        check_keys(INFO_TABLE, &info_cols, run_info)?;
        let mut statement = sqlx::query(&create_run_cmd);
        for col in &info_cols {
            statement = bind_value(statement, &run_info[col.as_str()]);
        }
        let result = statement.execute(conn).await?;
        if result.rows_affected() == 0 {
            return Err(DbError::RunCreationFailed);
        }
        Ok((info_cols, data_cols, insert_cmd, result.last_insert_rowid()))
    }

    /// Appends one DATA row. The record's key set must equal the DATA
    /// columns exactly; a mismatch never reaches the engine.
    pub async fn insert(&self, entry: &Record) -> Result<(), DbError> {
        check_keys(DATA_TABLE, &self.data_cols, entry)?;

        let mut conn = connect(&self.db_file).await?;
        let mut statement = sqlx::query(&self.insert_cmd).bind(self.run_id);
        for col in &self.data_cols {
            statement = bind_value(statement, &entry[col.as_str()]);
        }
        let result = statement.execute(&mut conn).await;
        conn.close().await?;
        result?;
        Ok(())
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    pub fn db_file(&self) -> &Path {
        &self.db_file
    }

    pub fn info_cols(&self) -> &[String] {
        &self.info_cols
    }

    pub fn data_cols(&self) -> &[String] {
        &self.data_cols
    }
}
