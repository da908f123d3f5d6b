mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    batch_insert_query, count_rows, seeded_db, select_one_dict, test_db, update_cnt_by_name,
};
use sql_decorate::prelude::*;
use tokio::sync::Barrier;

#[tokio::test(flavor = "multi_thread")]
async fn failing_body_rolls_back_everything() -> Result<(), SqlDecorateError> {
    let test = seeded_db().await?;
    let db = &test.db;

    let result: Result<(), SqlDecorateError> = db
        .transactional(|| async {
            batch_insert_query()
                .call(db, vec![("tx_rollback", 1), ("tx_rollback", 2)])
                .await?;
            let row = select_one_dict().call(db, "tx_rollback").await?.into_row()?;
            assert_eq!(
                row.and_then(|r| r.get("name").cloned()),
                Some(RowValues::Text("tx_rollback".into()))
            );
            update_cnt_by_name().call(db, (3, "tx_rollback")).await?;
            assert!(in_transaction());
            Err(SqlDecorateError::ExecutionError("rollback".into()))
        })
        .await;

    assert!(matches!(result, Err(SqlDecorateError::ExecutionError(msg)) if msg == "rollback"));
    assert!(!in_transaction());
    assert_eq!(select_one_dict().call(db, "tx_rollback").await?, QueryOutput::Row(None));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn successful_body_commits() -> Result<(), SqlDecorateError> {
    let test = seeded_db().await?;
    let db = &test.db;

    transactional(db, || async {
        batch_insert_query()
            .call(db, vec![("tx_commit", 1), ("tx_commit", 2)])
            .await?;
        update_cnt_by_name().call(db, (3, "tx_commit")).await?;
        assert!(in_transaction());
        Ok(())
    })
    .await?;

    assert!(!in_transaction());
    let row = select_one_dict().call(db, "tx_commit").await?.into_row()?.unwrap();
    assert_eq!(row.get("name"), Some(&RowValues::Text("tx_commit".into())));
    assert_eq!(row.get("cnt"), Some(&RowValues::Int(3)));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn nested_scopes_share_one_transaction() -> Result<(), SqlDecorateError> {
    let test = seeded_db().await?;
    let db = &test.db;
    let insert = common::insert_query();

    let result: Result<(), SqlDecorateError> = db
        .transactional(|| async {
            insert.call(db, ("nested", 1)).await?;
            // The inner scope succeeds but must not commit on its own.
            db.transactional(|| async {
                insert.call(db, ("nested", 2)).await?;
                Ok(())
            })
            .await?;
            assert!(in_transaction());
            assert_eq!(count_rows(db, "nested").await?, 2);
            Err(SqlDecorateError::ExecutionError("outer fails".into()))
        })
        .await;

    assert!(result.is_err());
    assert_eq!(count_rows(db, "nested").await?, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn inner_error_propagates_to_the_owner() -> Result<(), SqlDecorateError> {
    let test = seeded_db().await?;
    let db = &test.db;
    let insert = common::insert_query();

    let result: Result<(), SqlDecorateError> = transactional(db, || async {
        insert.call(db, ("inner_err", 1)).await?;
        transactional(db, || async {
            insert.call(db, ("inner_err", 2)).await?;
            Err::<(), _>(SqlDecorateError::ExecutionError("inner".into()))
        })
        .await?;
        Ok(())
    })
    .await;

    assert!(result.is_err());
    assert_eq!(count_rows(db, "inner_err").await?, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn binding_error_inside_scope_rolls_back() -> Result<(), SqlDecorateError> {
    let test = seeded_db().await?;
    let db = &test.db;

    let result: Result<(), SqlDecorateError> = transactional(db, || async {
        common::insert_query().call(db, ("bind_err", 1)).await?;
        QueryDefinition::select("select * from my_test where name = :name")
            .bind::<Params>()
            .call(db, named_params! {})
            .await?;
        Ok(())
    })
    .await;

    assert!(matches!(
        result,
        Err(SqlDecorateError::BindingError(BindingError::MissingNamedParam(name))) if name == "name"
    ));
    assert_eq!(count_rows(db, "bind_err").await?, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelled_scope_rolls_back_before_release() -> Result<(), SqlDecorateError> {
    let test = seeded_db().await?;
    let db = test.db.clone();

    let scope_db = db.clone();
    let timed_out = tokio::time::timeout(
        Duration::from_millis(200),
        transactional(&scope_db, || async {
            common::insert_query().call(&scope_db, ("cancelled", 1)).await?;
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }),
    )
    .await;

    assert!(timed_out.is_err());
    assert!(!in_transaction());
    assert_eq!(count_rows(&db, "cancelled").await?, 0);
    Ok(())
}

#[test]
fn cancelled_scope_discards_a_queued_statement() -> Result<(), SqlDecorateError> {
    // One blocking thread, so the insert has to wait behind the sleeper.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .max_blocking_threads(1)
        .enable_all()
        .build()
        .map_err(|e| SqlDecorateError::ExecutionError(e.to_string()))?;

    runtime.block_on(async {
        let test = seeded_db().await?;
        let db = test.db.clone();

        let scope_db = db.clone();
        let timed_out = tokio::time::timeout(
            Duration::from_millis(150),
            transactional(&scope_db, || async {
                let _sleeper = tokio::task::spawn_blocking(|| {
                    std::thread::sleep(Duration::from_millis(400));
                });
                common::insert_query().call(&scope_db, ("queued", 1)).await?;
                Ok(())
            }),
        )
        .await;
        assert!(timed_out.is_err());

        // Let the queued insert and the rollback drain before looking.
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(count_rows(&db, "queued").await?, 0);
        Ok::<(), SqlDecorateError>(())
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn panicking_scope_rolls_back() -> Result<(), SqlDecorateError> {
    let test = seeded_db().await?;
    let db = test.db.clone();

    let task_db = db.clone();
    let joined = tokio::spawn(async move {
        let _: Result<(), SqlDecorateError> = transactional(&task_db, || async {
            common::insert_query().call(&task_db, ("panicked", 1)).await?;
            if in_transaction() {
                panic!("body panicked");
            }
            Ok(())
        })
        .await;
    })
    .await;

    assert!(joined.is_err());
    assert_eq!(count_rows(&db, "panicked").await?, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_tasks_keep_separate_scopes() -> Result<(), SqlDecorateError> {
    let test = seeded_db().await?;
    let db = test.db.clone();
    let barrier = Arc::new(Barrier::new(2));

    let commit_db = db.clone();
    let commit_barrier = Arc::clone(&barrier);
    let committer = tokio::spawn(async move {
        transactional(&commit_db, || async {
            common::insert_query().call(&commit_db, ("task_commit", 1)).await?;
            assert!(in_transaction());
            commit_barrier.wait().await;
            Ok(())
        })
        .await
    });

    let rollback_db = db.clone();
    let rollback_barrier = Arc::clone(&barrier);
    let roller = tokio::spawn(async move {
        transactional(&rollback_db, || async {
            assert!(in_transaction());
            rollback_barrier.wait().await;
            Err::<(), _>(SqlDecorateError::ExecutionError("task rollback".into()))
        })
        .await
    });

    let committed = committer
        .await
        .map_err(|e| SqlDecorateError::ExecutionError(e.to_string()))?;
    let rolled_back = roller
        .await
        .map_err(|e| SqlDecorateError::ExecutionError(e.to_string()))?;

    assert!(committed.is_ok());
    assert!(rolled_back.is_err());
    assert!(!in_transaction());
    assert_eq!(count_rows(&db, "task_commit").await?, 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn queries_on_another_database_use_its_own_pool() -> Result<(), SqlDecorateError> {
    let a = seeded_db().await?;
    let b = seeded_db().await?;
    let mut conn = b.db.get_connection().await?;
    conn.execute_batch("CREATE TABLE only_in_b (v TEXT);").await?;
    drop(conn);

    let insert_b = QueryDefinition::insert("insert into only_in_b (v) values (?)").bind::<&str>();
    let id = transactional(&a.db, || async {
        common::insert_query().call(&a.db, ("in_a", 1)).await?;
        insert_b.call(&b.db, "y").await
    })
    .await?;

    assert_eq!(id, QueryOutput::LastInsertId(1));
    assert_eq!(count_rows(&a.db, "in_a").await?, 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn scopes_on_two_databases_settle_independently() -> Result<(), SqlDecorateError> {
    let a = seeded_db().await?;
    let b = seeded_db().await?;
    let insert = common::insert_query();

    let result: Result<(), SqlDecorateError> = transactional(&a.db, || async {
        insert.call(&a.db, ("in_a", 1)).await?;
        insert.call(&b.db, ("outside_b", 1)).await?;
        b.db.transactional(|| async {
            insert.call(&b.db, ("nested_b", 1)).await?;
            // Still inside the scope on `a`.
            insert.call(&a.db, ("in_a", 2)).await?;
            Ok(())
        })
        .await?;
        assert_eq!(count_rows(&a.db, "in_a").await?, 2);
        assert_eq!(count_rows(&a.db, "nested_b").await?, 0);
        Err(SqlDecorateError::ExecutionError("a fails".into()))
    })
    .await;

    assert!(result.is_err());
    assert_eq!(count_rows(&a.db, "in_a").await?, 0);
    assert_eq!(count_rows(&b.db, "outside_b").await?, 1);
    assert_eq!(count_rows(&b.db, "nested_b").await?, 1);
    assert_eq!(count_rows(&b.db, "in_a").await?, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn spawned_task_does_not_inherit_the_scope() -> Result<(), SqlDecorateError> {
    let test = seeded_db().await?;
    let db = test.db.clone();

    let inherited = transactional(&db, || async {
        let seen = tokio::spawn(async { in_transaction() })
            .await
            .map_err(|e| SqlDecorateError::ExecutionError(e.to_string()))?;
        Ok(seen)
    })
    .await?;

    assert!(!inherited);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn raw_connection_transaction_controls() -> Result<(), SqlDecorateError> {
    let test = test_db(1).await?;
    let mut conn = test.db.get_connection().await?;
    conn.execute_batch("CREATE TABLE raw (id INTEGER PRIMARY KEY, v TEXT);")
        .await?;

    conn.begin().await?;
    assert!(conn.in_transaction());
    assert!(conn.begin().await.is_err());
    let cursor = conn.cursor(false);
    let out = cursor.execute("INSERT INTO raw (v) VALUES (?)", &[RowValues::from("a")]).await?;
    assert_eq!(out.last_insert_id, 1);
    assert_eq!(out.rows_affected, 1);
    conn.rollback().await?;
    assert!(!conn.in_transaction());

    let inserted = conn
        .cursor(true)
        .execute_many(
            "INSERT INTO raw (v) VALUES (?)",
            &[vec![RowValues::from("b")], vec![RowValues::from("c")]],
        )
        .await?;
    assert_eq!(inserted, 2);

    let rs = conn.cursor(true).fetch_all("SELECT v FROM raw ORDER BY id", &[]).await?;
    assert_eq!(rs.column_names().as_slice(), ["v"]);
    assert_eq!(rs.len(), 2);
    let first = conn.cursor(false).fetch_one("SELECT v FROM raw ORDER BY id", &[]).await?;
    assert_eq!(first.into_first().1, Some(vec![RowValues::Text("b".into())]));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn cursor_is_refused_after_its_transaction_ends() -> Result<(), SqlDecorateError> {
    let test = test_db(1).await?;
    let mut conn = test.db.get_connection().await?;
    conn.execute_batch("CREATE TABLE stale (id INTEGER PRIMARY KEY);")
        .await?;

    conn.begin().await?;
    let cursor = conn.cursor(false);
    cursor.execute("INSERT INTO stale (id) VALUES (1)", &[]).await?;
    conn.rollback().await?;

    let err = cursor
        .execute("INSERT INTO stale (id) VALUES (2)", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, SqlDecorateError::ExecutionError(_)));
    let rs = conn.cursor(false).fetch_all("SELECT id FROM stale", &[]).await?;
    assert!(rs.is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn dropped_connection_in_transaction_is_rolled_back() -> Result<(), SqlDecorateError> {
    let test = test_db(1).await?;
    let db = &test.db;
    {
        let mut conn = db.get_connection().await?;
        conn.execute_batch("CREATE TABLE dropped (id INTEGER PRIMARY KEY);")
            .await?;
        conn.begin().await?;
        conn.cursor(false)
            .execute("INSERT INTO dropped (id) VALUES (1)", &[])
            .await?;
    }

    // Single-connection pool: this checks out the same connection again.
    let conn = db.get_connection().await?;
    assert!(!conn.in_transaction());
    let rs = conn.cursor(false).fetch_all("SELECT id FROM dropped", &[]).await?;
    assert!(rs.is_empty());
    Ok(())
}
