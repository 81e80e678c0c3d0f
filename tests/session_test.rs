//! Fixture session batches against an in-memory connection.

use fixture_sync::core::{Record, Schema};
use fixture_sync::sink::{Connection, RecordingConnection};
use fixture_sync::{FixtureSession, SchemaResolver};
use std::fs;
use tempfile::TempDir;

fn fixture_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("sites.yml"),
        "rubyonrails:\n  id: 1\n  name: Ruby on Rails\n\ngoogle:\n  id: 2\n  name: Google\n",
    )
    .unwrap();
    fs::write(dir.path().join("topics.yml"), "first:\n  id: 1\n  title: Hello\n").unwrap();
    fs::write(
        dir.path().join("funny_jokes.csv"),
        "id,name\n1,Knock knock\n",
    )
    .unwrap();
    fs::create_dir(dir.path().join("admin")).unwrap();
    fs::write(dir.path().join("admin/users.yml"), "root:\n  id: 1\n  login: root\n").unwrap();
    dir
}

#[tokio::test]
async fn test_batch_deletes_in_reverse_and_inserts_in_order() {
    tracing_subscriber::fmt()
        .with_env_filter("fixture_sync=debug")
        .try_init()
        .ok();

    let dir = fixture_dir();
    let mut session = FixtureSession::new(dir.path());
    let mut conn = RecordingConnection::new();

    let loaded = session
        .create_fixtures(&mut conn, &["sites", "topics"])
        .await
        .unwrap();
    assert_eq!(
        loaded.iter().map(|f| f.table()).collect::<Vec<_>>(),
        vec!["sites", "topics"]
    );

    assert_eq!(
        conn.statements(),
        [
            "BEGIN",
            "DELETE FROM topics",
            "DELETE FROM sites",
            "INSERT INTO sites (id, name) VALUES (1, 'Ruby on Rails')",
            "INSERT INTO sites (id, name) VALUES (2, 'Google')",
            "INSERT INTO topics (id, title) VALUES (1, 'Hello')",
            "COMMIT",
        ]
    );
}

#[tokio::test]
async fn test_batch_joins_open_transaction() {
    let dir = fixture_dir();
    let mut session = FixtureSession::new(dir.path());
    let mut conn = RecordingConnection::new();
    conn.begin().await.unwrap();

    session.create_fixtures(&mut conn, &["topics"]).await.unwrap();

    assert_eq!(
        conn.statements(),
        [
            "BEGIN",
            "DELETE FROM topics",
            "INSERT INTO topics (id, title) VALUES (1, 'Hello')",
        ]
    );
    assert!(conn.in_transaction());
}

#[tokio::test]
async fn test_failed_batch_rolls_back_and_keeps_nothing() {
    let dir = fixture_dir();
    let mut session = FixtureSession::new(dir.path());
    let mut conn = RecordingConnection::new().fail_on("INSERT INTO topics");

    let result = session.create_fixtures(&mut conn, &["sites", "topics"]).await;

    assert!(result.is_err());
    assert_eq!(conn.statements().last().map(String::as_str), Some("ROLLBACK"));
    assert!(!conn.in_transaction());
    assert!(session.fixtures("sites").is_none());
}

#[tokio::test]
async fn test_sequences_reset_after_all_inserts() {
    let dir = fixture_dir();
    let mut session = FixtureSession::new(dir.path());
    let mut conn = RecordingConnection::new().with_pk_sequence_reset(true);

    session
        .create_fixtures(&mut conn, &["sites", "topics"])
        .await
        .unwrap();

    let statements = conn.statements();
    let n = statements.len();
    assert_eq!(
        &statements[n - 3..],
        [
            "-- reset primary key sequence for sites",
            "-- reset primary key sequence for topics",
            "COMMIT",
        ]
    );
}

#[tokio::test]
async fn test_nested_dataset_loads_into_last_segment_table() {
    let dir = fixture_dir();
    let mut session = FixtureSession::new(dir.path());
    let mut conn = RecordingConnection::new();

    session
        .create_fixtures(&mut conn, &["admin/users"])
        .await
        .unwrap();

    let users = session.fixtures("users").unwrap();
    assert_eq!(users.entity(), "User");
    assert!(conn
        .statements()
        .contains(&"INSERT INTO users (id, login) VALUES (1, 'root')".to_string()));
}

#[tokio::test]
async fn test_class_names_drive_csv_record_names() {
    let dir = fixture_dir();
    let mut session = FixtureSession::new(dir.path()).with_class_names([("funny_jokes", "Joke")]);
    let mut conn = RecordingConnection::new();

    session
        .create_fixtures(&mut conn, &["funny_jokes"])
        .await
        .unwrap();

    let joke = session.record("funny_jokes", "joke_1").unwrap();
    assert_eq!(joke.get("name").and_then(|v| v.as_str()), Some("Knock knock"));
}

#[tokio::test]
async fn test_unknown_fixture_name() {
    let dir = fixture_dir();
    let mut session = FixtureSession::new(dir.path());
    let mut conn = RecordingConnection::new();
    session.create_fixtures(&mut conn, &["sites"]).await.unwrap();

    let err = session.record("sites", "yahoo").unwrap_err();
    assert!(err.is_resolution());
    assert_eq!(
        err.to_string(),
        "No fixture with name 'yahoo' found for table 'sites'"
    );
}

#[tokio::test]
async fn test_instantiate_reads_row_once() {
    let dir = fixture_dir();
    let mut session = FixtureSession::new(dir.path());
    let row: Record = [("id", "2"), ("name", "Google")].into_iter().collect();
    let mut conn =
        RecordingConnection::new().with_row("SELECT * FROM sites WHERE id = 2", row.clone());
    session.create_fixtures(&mut conn, &["sites"]).await.unwrap();
    conn.take_statements();

    let first = session.instantiate(&mut conn, "sites", "google").await.unwrap();
    let second = session.instantiate(&mut conn, "sites", "google").await.unwrap();

    assert_eq!(first, Some(row.clone()));
    assert_eq!(second, Some(row.clone()));
    assert_eq!(conn.statements().len(), 1);
    assert_eq!(session.instance("sites", "google"), Some(&row));

    session.reload();
    session.instantiate(&mut conn, "sites", "google").await.unwrap();
    assert_eq!(conn.statements().len(), 2);
}

#[tokio::test]
async fn test_instantiate_all_skips_unresolved_entities() {
    let dir = fixture_dir();
    let schema = Schema::from_yaml(
        "tables:\n  - name: sites\n    columns:\n      - name: id\n        type: integer\n",
    )
    .unwrap();
    let mut session = FixtureSession::new(dir.path()).with_resolver(SchemaResolver::new(schema));
    let mut conn = RecordingConnection::new();
    session
        .create_fixtures(&mut conn, &["sites", "topics"])
        .await
        .unwrap();
    conn.take_statements();

    let count = session.instantiate_all(&mut conn).await.unwrap();

    assert_eq!(count, 2);
    assert_eq!(
        conn.statements(),
        [
            "SELECT * FROM sites WHERE id = 1",
            "SELECT * FROM sites WHERE id = 2",
        ]
    );
}
