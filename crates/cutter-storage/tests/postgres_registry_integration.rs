use std::time::Duration;

use cutter_storage::{
    BatchAtomicity, NewUrl, PostgresRegistry, Registry, ShortCode, StorageError,
};
use cutter_test_infra::postgres::{PostgresConfig, PostgresServer};
use sqlx::postgres::PgPoolOptions;

struct Fixture {
    _postgres: PostgresServer,
    repo: PostgresRegistry,
}

impl Fixture {
    async fn start() -> Self {
        let postgres = PostgresServer::new(PostgresConfig::builder().build())
            .await
            .expect("start postgres");
        let url = postgres.database_url().await.expect("postgres url");
        let pool = connect_with_retry(&url).await;

        let repo = PostgresRegistry::new(pool);
        repo.migrate().await.expect("apply migrations");

        Self {
            _postgres: postgres,
            repo,
        }
    }
}

async fn connect_with_retry(url: &str) -> sqlx::PgPool {
    let mut last_error = None;

    for _ in 0..20 {
        match PgPoolOptions::new().max_connections(5).connect(url).await {
            Ok(pool) => return pool,
            Err(err) => {
                last_error = Some(err);
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
    }

    panic!("failed to connect postgres: {last_error:?}");
}

fn code(value: &str) -> ShortCode {
    ShortCode::new_unchecked(value)
}

#[tokio::test]
async fn save_resolve_conflict_and_tombstone() {
    let fixture = Fixture::start().await;
    let repo = &fixture.repo;

    repo.save(&code("abc12345"), "https://example.com/a", "u1")
        .await
        .unwrap();

    let err = repo
        .save(&code("xyz98765"), "https://example.com/a", "u2")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        StorageError::Conflict {
            existing: code("abc12345")
        }
    );

    let record = repo.resolve(&code("abc12345")).await.unwrap();
    assert_eq!(record.original_url, "https://example.com/a");
    assert_eq!(record.owner_id, "u1");
    assert!(!record.deleted);

    assert_eq!(
        repo.mark_deleted("u1", &[code("abc12345")]).await.unwrap(),
        1
    );
    let record = repo.resolve(&code("abc12345")).await.unwrap();
    assert!(record.deleted);
    assert_eq!(record.original_url, "https://example.com/a");
}

#[tokio::test]
async fn resolve_unknown_code_is_not_found() {
    let fixture = Fixture::start().await;

    let err = fixture.repo.resolve(&code("missing")).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
}

#[tokio::test]
async fn short_code_collision_is_code_taken() {
    let fixture = Fixture::start().await;
    let repo = &fixture.repo;

    repo.save(&code("abc12345"), "https://one.example", "u1")
        .await
        .unwrap();
    let err = repo
        .save(&code("abc12345"), "https://two.example", "u1")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::CodeTaken(_)));
}

#[tokio::test]
async fn live_url_wins_over_taken_code() {
    let fixture = Fixture::start().await;
    let repo = &fixture.repo;

    repo.save(&code("abc12345"), "https://example.com/a", "u1")
        .await
        .unwrap();
    repo.save(&code("def67890"), "https://example.com/b", "u1")
        .await
        .unwrap();

    // Both the code and the URL are already held.
    let err = repo
        .save(&code("def67890"), "https://example.com/a", "u2")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        StorageError::Conflict {
            existing: code("abc12345")
        }
    );
}

#[tokio::test]
async fn tombstoned_url_can_be_shortened_again_but_code_is_never_reused() {
    let fixture = Fixture::start().await;
    let repo = &fixture.repo;

    repo.save(&code("old00001"), "https://example.com", "u1")
        .await
        .unwrap();
    repo.mark_deleted("u1", &[code("old00001")]).await.unwrap();

    repo.save(&code("new00001"), "https://example.com", "u1")
        .await
        .unwrap();
    let err = repo
        .save(&code("old00001"), "https://elsewhere.example", "u1")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::CodeTaken(_)));
}

#[tokio::test]
async fn ownership_scopes_listing_and_deletion() {
    let fixture = Fixture::start().await;
    let repo = &fixture.repo;

    repo.save(&code("aaa111"), "https://a.example", "owner-a")
        .await
        .unwrap();
    repo.save(&code("bbb222"), "https://b.example", "owner-b")
        .await
        .unwrap();
    repo.save(&code("ccc333"), "https://c.example", "owner-a")
        .await
        .unwrap();

    let marked = repo
        .mark_deleted("owner-a", &[code("bbb222"), code("ccc333"), code("nope")])
        .await
        .unwrap();
    assert_eq!(marked, 1);
    assert!(!repo.resolve(&code("bbb222")).await.unwrap().deleted);

    let listed = repo.list_by_owner("owner-a").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].short_code, code("aaa111"));

    assert!(repo.list_by_owner("nobody").await.unwrap().is_empty());
}

#[tokio::test]
async fn batch_commits_all_entries() {
    let fixture = Fixture::start().await;
    let repo = &fixture.repo;
    assert_eq!(repo.batch_atomicity(), BatchAtomicity::Atomic);

    let entries: Vec<NewUrl> = (0..5)
        .map(|i| NewUrl::new(code(&format!("batch{i:03}")), format!("https://b{i}.example")))
        .collect();
    repo.save_batch(&entries, "u1").await.unwrap();

    assert_eq!(repo.list_by_owner("u1").await.unwrap().len(), 5);
}

#[tokio::test]
async fn batch_rolls_back_when_one_entry_fails() {
    let fixture = Fixture::start().await;
    let repo = &fixture.repo;

    repo.save(&code("taken001"), "https://taken.example", "other")
        .await
        .unwrap();

    let entries = vec![
        NewUrl::new(code("batch001"), "https://b1.example"),
        NewUrl::new(code("batch002"), "https://b2.example"),
        NewUrl::new(code("batch003"), "https://taken.example"),
        NewUrl::new(code("batch004"), "https://b4.example"),
        NewUrl::new(code("batch005"), "https://b5.example"),
    ];
    let err = repo.save_batch(&entries, "u1").await.unwrap_err();
    assert!(matches!(err, StorageError::Transaction(_)));

    for entry in &entries {
        assert!(matches!(
            repo.resolve(&entry.short_code).await,
            Err(StorageError::NotFound(_))
        ));
    }
}

#[tokio::test]
async fn batch_with_empty_url_writes_nothing() {
    let fixture = Fixture::start().await;
    let repo = &fixture.repo;

    let entries = vec![
        NewUrl::new(code("batch001"), "https://b1.example"),
        NewUrl::new(code("batch002"), ""),
    ];
    let err = repo.save_batch(&entries, "u1").await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidData(_)));
    assert!(repo.list_by_owner("u1").await.unwrap().is_empty());
}

#[tokio::test]
async fn health_check_reports_unreachable_store() {
    let fixture = Fixture::start().await;
    fixture.repo.health_check().await.unwrap();

    fixture.repo.pool().close().await;
    let err = fixture.repo.health_check().await.unwrap_err();
    assert!(matches!(err, StorageError::Unavailable(_)));
}
