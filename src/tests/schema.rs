use anyhow::Result;

use super::{count_rows, data_spec, empty_db, full_db, info_spec, run_record};
use crate::db::connect;
use crate::{
    create_db, get_columns, query_one_as_map, record, table_exists, validate_cols, ColumnField,
    ColumnSpec, DbError, RunDb, SchemaOutcome, SqlType, SqlValue, DATA_TABLE, INFO_TABLE,
};

#[tokio::test]
async fn create_then_introspect_matches_spec() -> Result<()> {
    let (_dir, db_file) = empty_db().await;
    let mut conn = connect(&db_file).await?;

    let fields = [ColumnField::Name, ColumnField::Type];
    let info = get_columns(&mut conn, INFO_TABLE, &fields).await?;
    let data = get_columns(&mut conn, DATA_TABLE, &fields).await?;

    assert_eq!(info, info_spec().rendered());
    assert_eq!(data, data_spec().rendered());
    Ok(())
}

#[tokio::test]
async fn introspection_skips_the_identity_column() -> Result<()> {
    let (_dir, db_file) = empty_db().await;
    let mut conn = connect(&db_file).await?;

    let names = get_columns(&mut conn, INFO_TABLE, &[ColumnField::Name]).await?;
    assert_eq!(names, ["init", "lr", "steps"]);
    Ok(())
}

#[tokio::test]
async fn validate_cols_accepts_matching_and_rejects_other_specs() -> Result<()> {
    let (_dir, db_file) = empty_db().await;
    let mut conn = connect(&db_file).await?;

    validate_cols(&mut conn, &info_spec(), INFO_TABLE).await?;

    let other = ColumnSpec::new()
        .column("init", SqlType::Text)
        .column("lr", SqlType::Text)
        .column("steps", SqlType::Integer);
    let err = validate_cols(&mut conn, &other, INFO_TABLE)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::SchemaMismatch { .. }), "got {err}");
    Ok(())
}

#[tokio::test]
async fn table_exists_probes_the_catalog() -> Result<()> {
    let (_dir, db_file) = empty_db().await;
    let mut conn = connect(&db_file).await?;

    assert!(table_exists(&mut conn, INFO_TABLE).await?);
    assert!(table_exists(&mut conn, DATA_TABLE).await?);
    assert!(!table_exists(&mut conn, "missing").await?);
    Ok(())
}

#[tokio::test]
async fn existing_file_without_force_is_left_untouched() -> Result<()> {
    let (_dir, db_file) = full_db().await;

    let outcome = create_db(&db_file, &info_spec(), &data_spec(), false).await?;
    assert_eq!(outcome, SchemaOutcome::AlreadyExists);
    assert_eq!(count_rows(&db_file, INFO_TABLE).await, 4);
    assert_eq!(count_rows(&db_file, DATA_TABLE).await, 50);
    Ok(())
}

#[tokio::test]
async fn force_recreates_the_file_from_scratch() -> Result<()> {
    let (_dir, db_file) = full_db().await;

    let outcome = create_db(&db_file, &info_spec(), &data_spec(), true).await?;
    assert_eq!(outcome, SchemaOutcome::Created);
    assert_eq!(count_rows(&db_file, INFO_TABLE).await, 0);
    assert_eq!(count_rows(&db_file, DATA_TABLE).await, 0);
    Ok(())
}

#[tokio::test]
async fn reserved_column_name_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let db_file = dir.path().join("test.db");

    let bad = ColumnSpec::new().column("runid", SqlType::Integer);
    let err = create_db(&db_file, &bad, &data_spec(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::ReservedColumn(_)), "got {err}");
    assert!(!db_file.exists());
}

#[tokio::test]
async fn rejected_spec_with_force_leaves_existing_file_intact() -> Result<()> {
    let (_dir, db_file) = full_db().await;

    let reserved = ColumnSpec::new().column("runid", SqlType::Integer);
    let err = create_db(&db_file, &reserved, &data_spec(), true)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::ReservedColumn(_)), "got {err}");

    let unusable = ColumnSpec::new().column("bad name; --", SqlType::Text);
    let err = create_db(&db_file, &info_spec(), &unusable, true)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidIdentifier(_)), "got {err}");

    // The existing database survives both rejected attempts.
    assert!(db_file.exists());
    assert_eq!(count_rows(&db_file, INFO_TABLE).await, 4);
    assert_eq!(count_rows(&db_file, DATA_TABLE).await, 50);
    Ok(())
}

#[tokio::test]
async fn non_identifier_column_name_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let db_file = dir.path().join("test.db");

    let bad = ColumnSpec::new().column("bad name; --", SqlType::Text);
    let err = create_db(&db_file, &info_spec(), &bad, false)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidIdentifier(_)), "got {err}");
}

#[tokio::test]
async fn query_as_map_uses_result_column_names() -> Result<()> {
    let (_dir, db_file) = empty_db().await;
    let db = RunDb::new(&db_file, &run_record("xavier", 0.001, 10)).await?;
    db.insert(&record! {"step" => 3, "loss" => 0.5}).await?;

    let row = query_one_as_map(
        &db_file,
        "SELECT step, loss FROM DATA WHERE runid = ?",
        &[SqlValue::Integer(db.run_id())],
    )
    .await?
    .unwrap();

    assert_eq!(row, record! {"step" => 3, "loss" => 0.5});
    Ok(())
}

#[tokio::test]
async fn all_value_types_round_trip() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let db_file = dir.path().join("typed.db");

    let info = ColumnSpec::new().column("tag", SqlType::Text);
    let data = ColumnSpec::new()
        .column("payload", SqlType::Blob)
        .column("flag", SqlType::Integer)
        .column("score", SqlType::Real);
    create_db(&db_file, &info, &data, false).await?;

    let db = RunDb::new(&db_file, &record! {"tag" => "blobbed"}).await?;
    let payload: &[u8] = &[0, 1, 254, 255];
    db.insert(&record! {"payload" => payload, "flag" => 7, "score" => 0.25})
        .await?;

    let row = query_one_as_map(
        &db_file,
        "SELECT payload, flag, score FROM DATA WHERE runid = ?",
        &[SqlValue::Integer(db.run_id())],
    )
    .await?
    .unwrap();
    assert_eq!(
        row,
        record! {"payload" => payload, "flag" => 7, "score" => 0.25},
    );
    Ok(())
}
