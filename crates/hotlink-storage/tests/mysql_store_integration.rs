//! These tests start a MySQL container and are ignored by default.
//! Run them with `cargo test -p hotlink-storage -- --ignored`.

use std::time::Duration;

use hotlink_core::{AccessEvent, ClickDelta, MappingRecord, ShortCode};
use hotlink_storage::{AccessLog, CounterStore, MappingStore, MySqlStore, StorageError};
use hotlink_test_infra::{MySqlConfig, MySqlServer};
use jiff::{SignedDuration, Timestamp};
use sqlx::mysql::MySqlPoolOptions;

struct Fixture {
    _mysql: MySqlServer,
    store: MySqlStore,
}

impl Fixture {
    async fn start() -> Self {
        let mysql = MySqlServer::start(MySqlConfig::default())
            .await
            .expect("start mysql");
        let url = mysql.database_url().await.expect("mysql url");
        let pool = connect_with_retry(&url).await;

        let store = MySqlStore::new(pool);
        store.migrate().await.expect("run migrations");

        Self {
            _mysql: mysql,
            store,
        }
    }
}

async fn connect_with_retry(url: &str) -> sqlx::MySqlPool {
    let mut last_error = None;

    for _ in 0..20 {
        match MySqlPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
        {
            Ok(pool) => return pool,
            Err(err) => {
                last_error = Some(err);
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
    }

    panic!("failed to connect mysql: {last_error:?}");
}

fn code(value: &str) -> ShortCode {
    ShortCode::new_unchecked(value)
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn create_and_find_mapping() {
    let fixture = Fixture::start().await;
    let expire_at = Timestamp::now() + SignedDuration::from_secs(3600);
    let record = MappingRecord::new(code("abc123"), "https://example.com", Some(expire_at));

    fixture.store.create_mapping(record.clone()).await.unwrap();

    let got = fixture.store.find_by_key(&code("abc123")).await.unwrap().unwrap();
    assert_eq!(got.target_url, "https://example.com");
    assert_eq!(got.access_count, 0);
    assert_eq!(
        got.expire_at.map(|ts| ts.as_millisecond()),
        Some(expire_at.as_millisecond())
    );
    assert_eq!(
        got.created_at.as_millisecond(),
        record.created_at.as_millisecond()
    );
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn create_conflicts_when_code_already_exists() {
    let fixture = Fixture::start().await;

    fixture
        .store
        .create_mapping(MappingRecord::new(code("abc123"), "https://one.example", None))
        .await
        .unwrap();

    let err = fixture
        .store
        .create_mapping(MappingRecord::new(code("abc123"), "https://two.example", None))
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::Conflict(_)));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn find_returns_expired_rows_as_is() {
    let fixture = Fixture::start().await;
    let expired = Timestamp::now() - SignedDuration::from_secs(1);

    fixture
        .store
        .create_mapping(MappingRecord::new(code("expired"), "https://example.com", Some(expired)))
        .await
        .unwrap();

    let got = fixture.store.find_by_key(&code("expired")).await.unwrap().unwrap();
    assert!(got.is_expired());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn delete_removes_row() {
    let fixture = Fixture::start().await;

    fixture
        .store
        .create_mapping(MappingRecord::new(code("to-delete"), "https://example.com", None))
        .await
        .unwrap();

    assert!(fixture.store.delete_mapping(&code("to-delete")).await.unwrap());
    assert!(fixture.store.find_by_key(&code("to-delete")).await.unwrap().is_none());
    assert!(!fixture.store.delete_mapping(&code("to-delete")).await.unwrap());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn batch_increment_is_applied_together() {
    let fixture = Fixture::start().await;
    for name in ["one", "two"] {
        fixture
            .store
            .create_mapping(MappingRecord::new(code(name), "https://example.com", None))
            .await
            .unwrap();
    }

    fixture
        .store
        .batch_increment_counters(&[
            ClickDelta::new("one", 5),
            ClickDelta::new("two", 2),
            ClickDelta::new("missing", 9),
        ])
        .await
        .unwrap();

    let one = fixture.store.find_by_key(&code("one")).await.unwrap().unwrap();
    let two = fixture.store.find_by_key(&code("two")).await.unwrap().unwrap();
    assert_eq!(one.access_count, 5);
    assert_eq!(two.access_count, 2);

    let top = fixture.store.most_accessed(1).await.unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].code, code("one"));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn access_log_round_trip() {
    let fixture = Fixture::start().await;

    for source in ["10.0.0.1", "10.0.0.2", "10.0.0.3"] {
        fixture
            .store
            .append_access(&AccessEvent::now(code("abc123"), source))
            .await
            .unwrap();
    }

    assert_eq!(fixture.store.access_count(&code("abc123")).await.unwrap(), 3);

    let recent = fixture
        .store
        .recent_accesses(&code("abc123"), 2)
        .await
        .unwrap();
    let sources: Vec<&str> = recent.iter().map(|e| e.source.as_str()).collect();
    assert_eq!(sources, vec!["10.0.0.3", "10.0.0.2"]);
}
