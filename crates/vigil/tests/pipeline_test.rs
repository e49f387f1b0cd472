//! End-to-end tests of the change stream: store triggers through the reader
//! and queue to subscriptions.

use std::time::Duration;
use tempfile::TempDir;
use vigil::{Change, ChangeKind, Pipeline, ReaderConfig, Selector, Subscription};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

async fn open_pipeline() -> (Pipeline, TempDir) {
    init_tracing();
    let temp = TempDir::new().unwrap();
    let pipeline = Pipeline::open_with(
        temp.path().join("test.db"),
        ReaderConfig::new().with_poll_interval_ms(20),
    )
    .await
    .unwrap();
    (pipeline, temp)
}

async fn recv(sub: &mut Subscription) -> Option<Change> {
    tokio::time::timeout(Duration::from_secs(2), sub.recv())
        .await
        .expect("timed out waiting for change")
}

async fn assert_quiet(sub: &mut Subscription) {
    let quiet = tokio::time::timeout(Duration::from_millis(100), sub.recv()).await;
    assert!(quiet.is_err(), "expected no change, got {:?}", quiet);
}

async fn insert(pipeline: &Pipeline, key: &str, value: &str) -> i64 {
    pipeline
        .store()
        .execute(
            "INSERT INTO model_config (key, value) VALUES (?1, ?2)",
            vec![key.into(), value.into()],
        )
        .await
        .unwrap()
        .last_insert_id
}

#[tokio::test]
async fn insert_produces_one_create_event() {
    let (pipeline, _temp) = open_pipeline().await;
    let mut sub = pipeline
        .subscribe([Selector::topic(
            "model_config",
            ChangeKind::CREATE | ChangeKind::UPDATE,
        )])
        .unwrap();

    insert(&pipeline, "k", "v").await;

    let change = recv(&mut sub).await.unwrap();
    assert_eq!(change.kind, ChangeKind::CREATE);
    assert_eq!(change.entity_type, "model_config");
    assert_eq!(change.entity_id, 1);
    assert_quiet(&mut sub).await;

    pipeline.close().await.unwrap();
}

#[tokio::test]
async fn updates_in_one_window_coalesce() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("test.db");

    // Seed the log before the pipeline starts so the first poll observes one
    // window holding a create and five updates of the same row.
    {
        let store = vigil::Store::open(&path).unwrap();
        vigil::schema::install(&store).await.unwrap();
        store
            .execute(
                "INSERT INTO model_config (key, value) VALUES ('k', 'v0')",
                vec![],
            )
            .await
            .unwrap();
        for i in 1..=5 {
            store
                .execute(
                    "UPDATE model_config SET value = ?1 WHERE id = 1",
                    vec![format!("v{i}").into()],
                )
                .await
                .unwrap();
        }
    }

    let pipeline = Pipeline::open_with(&path, ReaderConfig::new().with_poll_interval_ms(20))
        .await
        .unwrap();
    let mut sub = pipeline
        .subscribe([Selector::topic("model_config", ChangeKind::ALL)])
        .unwrap();

    let create = recv(&mut sub).await.unwrap();
    assert_eq!(create.kind, ChangeKind::CREATE);
    assert_eq!(create.seq, 1);

    let update = recv(&mut sub).await.unwrap();
    assert_eq!(update.kind, ChangeKind::UPDATE);
    assert_eq!(update.seq, 6);

    assert_quiet(&mut sub).await;
    pipeline.close().await.unwrap();
}

#[tokio::test]
async fn fan_out_by_kind_mask() {
    let (pipeline, _temp) = open_pipeline().await;
    let mut creates = pipeline
        .subscribe([Selector::topic(
            "model_config",
            ChangeKind::CREATE | ChangeKind::UPDATE,
        )])
        .unwrap();
    let mut deletes = pipeline
        .subscribe([Selector::topic("model_config", ChangeKind::DELETE)])
        .unwrap();

    let id = insert(&pipeline, "k", "v").await;
    pipeline
        .store()
        .execute("DELETE FROM model_config WHERE id = ?1", vec![id.into()])
        .await
        .unwrap();

    let created = recv(&mut creates).await.unwrap();
    assert_eq!(created.kind, ChangeKind::CREATE);
    assert_eq!(created.entity_id, id);
    assert_quiet(&mut creates).await;

    let deleted = recv(&mut deletes).await.unwrap();
    assert_eq!(deleted.kind, ChangeKind::DELETE);
    assert_eq!(deleted.entity_id, id);
    assert_quiet(&mut deletes).await;

    pipeline.close().await.unwrap();
}

#[tokio::test]
async fn subscription_sees_ascending_seq_across_entities() {
    let (pipeline, _temp) = open_pipeline().await;
    let mut sub = pipeline
        .subscribe([Selector::topic("model_config", ChangeKind::ALL)])
        .unwrap();

    for i in 0..5 {
        insert(&pipeline, &format!("k{i}"), "v").await;
    }
    pipeline
        .store()
        .execute("UPDATE model_config SET value = 'v2' WHERE id = 2", vec![])
        .await
        .unwrap();

    let mut last_seq = 0;
    for _ in 0..6 {
        let change = recv(&mut sub).await.unwrap();
        assert!(
            change.seq > last_seq,
            "seq {} did not advance past {}",
            change.seq,
            last_seq
        );
        last_seq = change.seq;
    }

    pipeline.close().await.unwrap();
}

#[tokio::test]
async fn predicate_filters_at_the_queue() {
    let (pipeline, _temp) = open_pipeline().await;
    let mut sub = pipeline
        .subscribe([Selector::filtered(
            "model_config",
            ChangeKind::CREATE,
            |change| change.entity_id >= 2,
        )])
        .unwrap();

    insert(&pipeline, "first", "v").await;
    insert(&pipeline, "second", "v").await;

    let change = recv(&mut sub).await.unwrap();
    assert_eq!(change.entity_id, 2);
    assert_quiet(&mut sub).await;

    pipeline.close().await.unwrap();
}

#[tokio::test]
async fn slow_subscriber_delays_but_never_loses() {
    let (pipeline, _temp) = open_pipeline().await;
    let mut sub = pipeline
        .subscribe([Selector::topic("model_config", ChangeKind::ALL)])
        .unwrap();

    for i in 0..4 {
        insert(&pipeline, &format!("k{i}"), "v").await;
    }

    // Let the reader and dispatcher stall against the unread subscription.
    tokio::time::sleep(Duration::from_millis(150)).await;

    let mut ids = Vec::new();
    let mut last_seq = 0;
    for _ in 0..4 {
        let change = recv(&mut sub).await.unwrap();
        assert!(change.seq > last_seq);
        last_seq = change.seq;
        ids.push(change.entity_id);
    }
    assert_eq!(ids, vec![1, 2, 3, 4]);
    assert_quiet(&mut sub).await;

    pipeline.close().await.unwrap();
}

#[tokio::test]
async fn close_returns_promptly_and_closes_subscriptions() {
    let (pipeline, _temp) = open_pipeline().await;
    let mut sub = pipeline
        .subscribe([Selector::topic("model_config", ChangeKind::ALL)])
        .unwrap();

    tokio::time::timeout(Duration::from_secs(1), pipeline.close())
        .await
        .expect("close should return in bounded time")
        .unwrap();

    assert!(recv(&mut sub).await.is_none());
}

#[tokio::test]
async fn subscribing_with_no_selectors_fails() {
    let (pipeline, _temp) = open_pipeline().await;

    let err = pipeline.subscribe([]).unwrap_err();
    assert!(matches!(err, vigil::QueueError::NoSelectors));

    pipeline.close().await.unwrap();
}
