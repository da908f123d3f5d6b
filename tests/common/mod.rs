#![allow(dead_code)]

use sql_decorate::prelude::*;
use sql_decorate::PoolConfigBuilder;
use tempfile::TempDir;

/// A database file in its own temporary directory, removed when the guard drops.
pub struct TestDb {
    pub db: Database,
    _dir: TempDir,
}

/// Route library logs to the test harness.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub async fn test_db(pool_size: u32) -> Result<TestDb, SqlDecorateError> {
    init_tracing();
    let dir = tempfile::tempdir()
        .map_err(|e| SqlDecorateError::ConfigError(format!("tempdir: {e}")))?;
    let path = dir.path().join("test.db");
    let config = PoolConfigBuilder::new(path.to_string_lossy().into_owned())
        .pool_name("test")
        .pool_size(pool_size)
        .connection_timeout_ms(5_000)
        .finish();
    let db = Database::connect(config).await?;
    Ok(TestDb { db, _dir: dir })
}

/// A database with the `my_test` table and two seed rows: (1, hello, 2) and (2, hello, 3).
pub async fn seeded_db() -> Result<TestDb, SqlDecorateError> {
    let test = test_db(4).await?;
    let mut conn = test.db.get_connection().await?;
    conn.execute_batch(
        "DROP TABLE IF EXISTS my_test;
         CREATE TABLE my_test (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             name TEXT NOT NULL DEFAULT '',
             cnt INTEGER DEFAULT 0
         );",
    )
    .await?;
    drop(conn);

    let insert = insert_query();
    assert_eq!(insert.call(&test.db, ("hello", 2)).await?.last_insert_id(), Some(1));
    assert_eq!(insert.call(&test.db, ("hello", 3)).await?.last_insert_id(), Some(2));
    Ok(test)
}

pub fn insert_query() -> Query<(&'static str, i64)> {
    QueryDefinition::insert("insert into my_test (name, cnt) values (?, ?);").bind()
}

pub fn batch_insert_query() -> Query<Vec<(&'static str, i64)>> {
    QueryDefinition::batch_insert("insert into my_test (name, cnt) values (?, ?);").convert_with(
        |rows: &Vec<(&'static str, i64)>| {
            Params::Batch(
                rows.iter()
                    .map(|(name, cnt)| vec![RowValues::from(*name), RowValues::from(*cnt)])
                    .collect(),
            )
        },
    )
}

pub fn select_one_dict() -> Query<&'static str> {
    QueryDefinition::select("select id, name, cnt from my_test where name = ? limit 1;").bind()
}

pub fn update_cnt_by_name() -> Query<(i64, &'static str)> {
    QueryDefinition::update("update my_test set cnt = ? where name = ?;").bind()
}

pub async fn count_rows(db: &Database, name: &'static str) -> Result<i64, SqlDecorateError> {
    let row = QueryDefinition::select("select count(*) as n from my_test where name = ?")
        .bind::<&'static str>()
        .call(db, name)
        .await?
        .into_row()?;
    row.and_then(|r| r.get("n").and_then(RowValues::as_int).copied())
        .ok_or_else(|| SqlDecorateError::ExecutionError("missing count".into()))
}
