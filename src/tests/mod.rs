use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::db::types::{ColumnSpec, Record};
use crate::{create_db, record, RunDb, SqlType, SqlValue};

mod schema;

pub const FAKE_RUNS: [(&str, f64, i64); 4] = [
    ("xavier", 0.001, 10),
    ("kaiming", 0.001, 10),
    ("xavier", 0.001, 20),
    ("kaiming", 0.1, 10),
];

pub fn info_spec() -> ColumnSpec {
    ColumnSpec::new()
        .column("init", SqlType::Text)
        .column("lr", SqlType::Real)
        .column("steps", SqlType::Integer)
}

pub fn data_spec() -> ColumnSpec {
    ColumnSpec::new()
        .column("step", SqlType::Integer)
        .column("loss", SqlType::Real)
}

pub fn run_record(init: &str, lr: f64, steps: i64) -> Record {
    record! {
        "init" => init,
        "lr" => lr,
        "steps" => steps,
    }
}

/// Fresh database file with the two-table schema and no runs.
pub async fn empty_db() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let db_file = dir.path().join("test.db");
    create_db(&db_file, &info_spec(), &data_spec(), false)
        .await
        .unwrap();
    (dir, db_file)
}

/// Database file populated with [`FAKE_RUNS`], each holding `steps` rows
/// of `{step, loss}` data.
pub async fn full_db() -> (TempDir, PathBuf) {
    let (dir, db_file) = empty_db().await;
    for (init, lr, steps) in FAKE_RUNS {
        let db = RunDb::new(&db_file, &run_record(init, lr, steps))
            .await
            .unwrap();
        for step in 0..steps {
            let entry = record! {
                "step" => step,
                "loss" => 1.0 / (step as f64 + 1.0),
            };
            db.insert(&entry).await.unwrap();
        }
    }
    (dir, db_file)
}

pub async fn count_rows(file: &Path, table: &str) -> i64 {
    let row = crate::query_one(file, &format!("SELECT COUNT(*) FROM {}", table), &[])
        .await
        .unwrap()
        .unwrap();
    match row[0] {
        SqlValue::Integer(count) => count,
        _ => panic!("COUNT(*) did not return an integer"),
    }
}
