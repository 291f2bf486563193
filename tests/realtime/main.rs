//! Realtime listener integration tests.

use std::sync::Arc;
use std::time::Duration;

use blackcard_sync::backend::ChangeStream;
use blackcard_sync::entities::{Project, WhatsAppContact};
use blackcard_sync::{
    AdminPanel, Backend, BackendError, ChangeFeed, InMemoryBackend, QueryState, SyncConfig,
};

/// A feed whose channels can never be opened.
struct Offline;

impl ChangeFeed for Offline {
    fn subscribe(&self, _table: &str) -> Result<ChangeStream, BackendError> {
        Err(BackendError::Connection("realtime socket refused".into()))
    }
}

fn project_row(name: &str) -> blackcard_sync::Row {
    let mut row = blackcard_sync::Row::new();
    row.insert("name".into(), name.into());
    row
}

fn has(count: usize) -> impl Fn(&QueryState<Project>) -> bool {
    move |state| state.data().is_some_and(|d| d.len() == count)
}

#[tokio::test]
async fn external_insert_reaches_observed_list() {
    let backend = InMemoryBackend::new();
    let panel = AdminPanel::builder(SyncConfig::default(), Arc::new(backend.clone())).build();
    let subscriptions = panel.enable_realtime(&backend);

    let mut observer = panel.projects.observe().unwrap();
    observer.wait_for(has(0)).await.unwrap();

    // Another admin session writes directly.
    backend.insert("projects", project_row("Muscat Villas")).await.unwrap();

    let state = tokio::time::timeout(Duration::from_secs(1), observer.wait_for(has(1)))
        .await
        .expect("list should refresh")
        .unwrap();
    assert_eq!(state.data().unwrap()[0].name, "Muscat Villas");

    panel.shutdown(subscriptions).await;
}

#[tokio::test(start_paused = true)]
async fn offline_feed_falls_back_to_polling() {
    let backend = InMemoryBackend::new();
    let mut config = SyncConfig::default();
    config.cache.stale_after_ms = None;
    let panel = AdminPanel::builder(config, Arc::new(backend.clone())).build();
    let subscriptions = panel.enable_realtime(&Offline);
    assert_eq!(subscriptions.len(), 1);
    assert_eq!(subscriptions[0].name(), "poll");

    let mut observer = panel.projects.observe().unwrap();
    observer.wait_for(has(0)).await.unwrap();
    backend.insert("projects", project_row("Salalah Resort")).await.unwrap();

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(panel.projects.list().unwrap().data().map(|d| d.len()), Some(0));

    tokio::time::sleep(Duration::from_secs(31)).await;
    let state = observer.wait_for(has(1)).await.unwrap();
    assert_eq!(state.data().unwrap()[0].name, "Salalah Resort");

    panel.shutdown(subscriptions).await;
}

#[tokio::test]
async fn offline_feed_without_polling_spawns_nothing() {
    let backend = InMemoryBackend::new();
    let mut config = SyncConfig::default();
    config.realtime.poll_interval_ms = None;
    let panel = AdminPanel::builder(config, Arc::new(backend)).build();
    assert!(panel.enable_realtime(&Offline).is_empty());
}

#[tokio::test]
async fn contact_counter_follows_new_leads() {
    let backend = InMemoryBackend::new();
    let panel = AdminPanel::builder(SyncConfig::default(), Arc::new(backend.clone())).build();
    let mut counter = panel.contact_counter(&backend).await.unwrap();
    assert_eq!(counter.count(), 0);

    blackcard_sync::leads::record_contact(
        &backend,
        WhatsAppContact {
            phone: Some("+96890000000".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    tokio::time::timeout(Duration::from_secs(1), counter.changed())
        .await
        .expect("counter should tick");
    assert_eq!(counter.count(), 1);
    counter.dispose().await;
}

#[tokio::test]
async fn contact_counter_needs_a_feed() {
    let backend = InMemoryBackend::new();
    let panel = AdminPanel::builder(SyncConfig::default(), Arc::new(backend)).build();
    let err = panel.contact_counter(&Offline).await.err().unwrap();
    assert!(matches!(
        err,
        blackcard_sync::RealtimeError::Subscribe { ref table, .. } if table == "whatsapp_contacts"
    ));
}
