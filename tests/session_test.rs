mod common;

use serde::Deserialize;

use common::{row_map, session};
use mypool::pool_manager::PoolManager;
use mypool::{DbError, ErrorKind, Session, Value, to_values};

#[derive(Debug, Deserialize, PartialEq)]
struct User {
    id: i64,
    name: String,
}

#[tokio::test]
async fn select_one_returns_rows_and_releases() {
    let (session, _server) = session(2, 4).await;
    let rows = session.execute_query("SELECT 1", &[]).await.unwrap();
    assert_eq!(rows, vec![row_map(&[("1", Value::I64(1))])]);

    let status = session.status();
    assert_eq!(status.in_use, 0);
    assert_eq!(status.idle, 2);
}

#[tokio::test]
async fn parameters_are_passed_positionally() {
    let (session, _server) = session(1, 2).await;
    let rows = session
        .execute_query("SELECT ? AS v", &to_values(&("hello",)).unwrap())
        .await
        .unwrap();
    assert_eq!(rows[0]["v"], Value::Str("hello".into()));
}

#[tokio::test]
async fn query_failure_is_reported_and_connection_returned() {
    let (session, _server) = session(1, 1).await;
    let err = session
        .execute_query("SELEC 1", &[Value::I64(1)])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Query);
    let message = err.to_string();
    assert!(message.contains("SELEC 1"));
    assert!(message.contains("params: 1"));

    assert_eq!(session.status().in_use, 0);
    assert!(session.execute_query("SELECT 1", &[]).await.is_ok());
}

#[tokio::test]
async fn update_commits_and_constraint_violation_rolls_back() {
    let (session, server) = session(1, 2).await;
    let sql = "INSERT INTO t (id) VALUES (?)";

    assert_eq!(session.execute_update(sql, &[Value::I64(1)]).await.unwrap(), 1);
    assert_eq!(server.committed(), vec![1]);

    let err = session.execute_update(sql, &[Value::I64(1)]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Update);
    assert!(err.to_string().contains("Duplicate entry"));
    assert_eq!(server.committed(), vec![1]);
    assert!(server.rollbacks.load(std::sync::atomic::Ordering::SeqCst) >= 1);
    assert_eq!(session.status().in_use, 0);
}

#[tokio::test]
async fn explicit_transaction_on_one_connection() {
    let (session, server) = session(1, 2).await;
    let sql = "INSERT INTO t (id) VALUES (?)";

    let mut conn = session.get_connection().await.unwrap();
    conn.begin().await.unwrap();
    {
        let mut cursor = conn.cursor().await.unwrap();
        cursor.execute(sql, &[Value::I64(10)]).await.unwrap();
        cursor.execute(sql, &[Value::I64(11)]).await.unwrap();
        assert_eq!(cursor.last_insert_id(), Some(11));
    }
    conn.rollback().await.unwrap();
    assert!(server.committed().is_empty());

    conn.begin().await.unwrap();
    {
        let mut cursor = conn.cursor().await.unwrap();
        cursor.execute(sql, &[Value::I64(12)]).await.unwrap();
    }
    conn.commit().await.unwrap();
    session.release_connection(conn).await;

    assert_eq!(server.committed(), vec![12]);
}

#[tokio::test]
async fn abandoned_transaction_is_rolled_back_on_release() {
    let (session, server) = session(1, 1).await;
    let sql = "INSERT INTO t (id) VALUES (?)";

    async fn write_then_fail(session: &Session, sql: &str) -> Result<(), DbError> {
        let mut conn = session.connection().await?;
        conn.begin().await?;
        conn.cursor().await?.execute(sql, &[Value::I64(7)]).await?;
        conn.execute_query("SELEC broken", &[]).await?;
        Ok(())
    }
    let err = write_then_fail(&session, sql).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Query);

    // the single connection is the one the failed scope used
    session.execute_update(sql, &[Value::I64(8)]).await.unwrap();
    assert_eq!(server.committed(), vec![8]);
}

#[tokio::test]
async fn cursor_fetches_buffered_rows() {
    let (session, _server) = session(1, 2).await;
    for id in [3, 1, 2] {
        session
            .execute_update("INSERT INTO t (id) VALUES (?)", &[Value::I64(id)])
            .await
            .unwrap();
    }

    let mut conn = session.connection().await.unwrap();
    let mut cursor = conn.cursor().await.unwrap();
    assert_eq!(cursor.query("SELECT id, name FROM t ORDER BY id", &[]).await.unwrap(), 3);
    assert_eq!(cursor.rowcount(), 3);

    let first = cursor.fetch_one().unwrap();
    assert_eq!(first["id"], Value::I64(1));
    assert_eq!(cursor.fetch_many(5).len(), 2);
    assert!(cursor.fetch_one().is_none());
    assert!(cursor.fetch_all().is_empty());

    let err = cursor.query("DROP TABLE t", &[]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Query);
}

#[tokio::test]
async fn query_as_maps_rows_by_column_name() {
    let (session, _server) = session(1, 2).await;
    session
        .execute_update("INSERT INTO t (id) VALUES (?)", &[Value::I64(7)])
        .await
        .unwrap();

    let users: Vec<User> = session
        .query_as("SELECT id, name FROM t ORDER BY id", &[])
        .await
        .unwrap();
    assert_eq!(
        users,
        vec![User {
            id: 7,
            name: "user-7".into(),
        }]
    );
}

#[tokio::test]
async fn manager_registers_and_closes_named_pools() {
    let manager = PoolManager::new();
    let (primary, _) = session(1, 2).await;
    let (replica, _) = session(1, 2).await;

    assert!(manager.register("primary", primary.clone()).is_none());
    manager.register("replica", replica.clone());
    let mut names = manager.names();
    names.sort();
    assert_eq!(names, ["primary", "replica"]);

    let found = manager.session("primary").expect("registered");
    assert!(found.execute_query("SELECT 1", &[]).await.is_ok());
    assert!(manager.session("missing").is_none());

    manager.close_all().await;
    assert!(manager.names().is_empty());
    assert!(primary.execute_query("SELECT 1", &[]).await.unwrap_err().is_pool_closed());
    assert!(replica.execute_query("SELECT 1", &[]).await.unwrap_err().is_pool_closed());
}
