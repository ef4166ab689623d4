use std::path::Path;
use std::time::Duration;

use itertools::Itertools;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteRow};
use sqlx::{Connection, SqliteConnection};
use tracing::info;

pub mod error;
pub mod run;
pub mod schema;
pub mod types;

use error::{DbError, SchemaOutcome};
use schema::ensure_identifier;
use types::{bind_value, decode_row, row_to_map, ColumnSpec, Record, SqlValue};

// TABLE INFO: runid (identity) + one NOT NULL column per declared
// metadata field, e.g. hyper-parameters.
//
// TABLE DATA: runid (foreign key -> INFO, ON DELETE CASCADE) + one
// NOT NULL column per declared data field, e.g. step/loss pairs.

pub const INFO_TABLE: &str = "INFO";
pub const DATA_TABLE: &str = "DATA";
pub const RUNID_COLUMN: &str = "runid";

/// How long a writer waits on the file lock before the engine gives up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens a short-lived connection to an existing database file, configured
/// the way every operation here connects (foreign keys ON, WAL journal,
/// busy timeout). Close it when the operation is done.
pub async fn connect(file: impl AsRef<Path>) -> Result<SqliteConnection, DbError> {
    connect_with(file.as_ref(), false).await
}

pub(crate) async fn connect_creating(file: &Path) -> Result<SqliteConnection, DbError> {
    connect_with(file, true).await
}

async fn connect_with(file: &Path, create: bool) -> Result<SqliteConnection, DbError> {
    let options = SqliteConnectOptions::new()
        .filename(file)
        .create_if_missing(create)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);
    Ok(SqliteConnection::connect_with(&options).await?)
}

fn not_null_decls(spec: &ColumnSpec) -> Result<Vec<String>, DbError> {
    spec.iter()
        .map(|(name, ty)| {
            ensure_identifier(name)?;
            if name.eq_ignore_ascii_case(RUNID_COLUMN) {
                return Err(DbError::ReservedColumn(name.to_string()));
            }
            Ok(format!("{} {} NOT NULL", name, ty.as_sql()))
        })
        .collect()
}

/// Creates and initializes a database file to log experiment results.
///
/// The file gets two tables: INFO holds one row per run (the declared
/// metadata columns), DATA holds the per-step records. DATA rows carry a
/// foreign key `runid` with ON DELETE CASCADE, so deleting a run removes
/// all of its data.
///
/// An existing file is left untouched unless `force` is set, in which case
/// it is removed first.
pub async fn create_db(
    file: impl AsRef<Path>,
    info_cols: &ColumnSpec,
    data_cols: &ColumnSpec,
    force: bool,
) -> Result<SchemaOutcome, DbError> {
    let file = file.as_ref();

    // Validate the declared specs before touching anything on disk: a
    // rejected spec must not take an existing database down with it.
    let info_decls = not_null_decls(info_cols)?;
    let data_decls = not_null_decls(data_cols)?;

    if file.exists() {
        if force {
            info!(file = %file.display(), "removing existing database");
            std::fs::remove_file(file)?;
        } else {
            info!(file = %file.display(), "database exists, leaving it untouched");
            return Ok(SchemaOutcome::AlreadyExists);
        }
    }

    let info_sql = format!(
        "CREATE TABLE {} ({})",
        INFO_TABLE,
        std::iter::once(format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", RUNID_COLUMN))
            .chain(info_decls)
            .join(", "),
    );
    let data_sql = format!(
        "CREATE TABLE {} ({})",
        DATA_TABLE,
        std::iter::once(format!("{} INTEGER", RUNID_COLUMN))
            .chain(data_decls)
            .chain(std::iter::once(format!(
                "FOREIGN KEY({runid}) REFERENCES {info}({runid}) ON DELETE CASCADE",
                runid = RUNID_COLUMN,
                info = INFO_TABLE,
            )))
            .join(", "),
    );

    let mut conn = connect_creating(file).await?;
    let created: Result<(), sqlx::Error> = async {
        let mut tx = conn.begin().await?;
        sqlx::query(&info_sql).execute(&mut tx).await?;
        sqlx::query(&data_sql).execute(&mut tx).await?;
        tx.commit().await
    }
    .await;
    conn.close().await?;
    created?;

    Ok(SchemaOutcome::Created)
}

async fn fetch_rows(file: &Path, sql: &str, args: &[SqlValue]) -> Result<Vec<SqliteRow>, DbError> {
    let mut conn = connect(file).await?;
    let mut statement = sqlx::query(sql);
    for arg in args {
        statement = bind_value(statement, arg);
    }
    let rows = statement.fetch_all(&mut conn).await;
    conn.close().await?;
    Ok(rows?)
}

async fn fetch_first_row(
    file: &Path,
    sql: &str,
    args: &[SqlValue],
) -> Result<Option<SqliteRow>, DbError> {
    let mut conn = connect(file).await?;
    let mut statement = sqlx::query(sql);
    for arg in args {
        statement = bind_value(statement, arg);
    }
    let row = statement.fetch_optional(&mut conn).await;
    conn.close().await?;
    Ok(row?)
}

/// Runs a parameterized `sql` statement against `file` without boilerplate.
/// The statement is passed through as-is with positional binds.
pub async fn query(
    file: impl AsRef<Path>,
    sql: &str,
    args: &[SqlValue],
) -> Result<Vec<Vec<SqlValue>>, DbError> {
    let rows = fetch_rows(file.as_ref(), sql, args).await?;
    rows.iter().map(decode_row).collect()
}

/// Like [`query`], returning only the first row if any.
pub async fn query_one(
    file: impl AsRef<Path>,
    sql: &str,
    args: &[SqlValue],
) -> Result<Option<Vec<SqlValue>>, DbError> {
    let row = fetch_first_row(file.as_ref(), sql, args).await?;
    row.as_ref().map(decode_row).transpose()
}

/// Like [`query`], returning each row as a column-name keyed map.
pub async fn query_as_map(
    file: impl AsRef<Path>,
    sql: &str,
    args: &[SqlValue],
) -> Result<Vec<Record>, DbError> {
    let rows = fetch_rows(file.as_ref(), sql, args).await?;
    rows.iter().map(row_to_map).collect()
}

/// Like [`query_one`], returning the row as a column-name keyed map.
pub async fn query_one_as_map(
    file: impl AsRef<Path>,
    sql: &str,
    args: &[SqlValue],
) -> Result<Option<Record>, DbError> {
    let row = fetch_first_row(file.as_ref(), sql, args).await?;
    row.as_ref().map(row_to_map).transpose()
}

/// Deletes a single run and all of its data (see ON DELETE CASCADE).
/// Unknown ids are a silent no-op.
pub async fn delete_run(file: impl AsRef<Path>, run_id: i64) -> Result<(), DbError> {
    let mut conn = connect(file.as_ref()).await?;
    let result = sqlx::query(&format!(
        "DELETE FROM {info} WHERE {info}.{runid} = ?",
        info = INFO_TABLE,
        runid = RUNID_COLUMN,
    ))
    .bind(run_id)
    .execute(&mut conn)
    .await;
    conn.close().await?;
    result?;
    Ok(())
}
