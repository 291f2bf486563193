//! Several mutations on one collection at once.

use std::time::Duration;

use blackcard_sync::backend::Operation;
use blackcard_sync::entities::{Faq, Project};
use blackcard_sync::notify::Level;
use blackcard_sync::{AdminPanel, BackendError, InMemoryBackend, Record};

use crate::support::{count, panel};

fn faq(id: &str, question: &str) -> Faq {
    Faq {
        id: id.into(),
        question: question.into(),
        answer: "Yes".into(),
        ..Default::default()
    }
}

fn project(name: &str) -> Project {
    Project {
        name: name.into(),
        country: "Oman".into(),
        ..Default::default()
    }
}

/// Waits until the cached projects contain one named `name`, returning the whole list.
async fn cached_with(panel: &AdminPanel, name: &str) -> Vec<Project> {
    let cache = panel.cache().clone();
    let key = panel.projects.key().clone();
    tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            if let Some(records) = cache.peek::<Project>(&key).unwrap() {
                if records.iter().any(|p| p.name == name) {
                    return records.to_vec();
                }
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn concurrent_creates_both_land() {
    let backend = InMemoryBackend::new().with_latency(Duration::from_millis(20));
    let (panel, toasts) = panel(&backend);
    panel.projects.fetch().await.unwrap();

    let a = panel.projects.clone();
    let first = tokio::spawn(async move { a.create(project("A")).await });
    cached_with(&panel, "A").await;

    let b = panel.projects.clone();
    let second = tokio::spawn(async move { b.create(project("B")).await });

    // B's draft goes on top of what A settled to, not on A's draft.
    let pending = cached_with(&panel, "B").await;
    let names: Vec<_> = pending.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["A", "B"]);
    assert!(!pending[0].is_temporary());
    assert!(pending[0].created_at.is_some());
    assert!(pending[1].is_temporary());

    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();
    assert_ne!(first.id, second.id);
    assert_eq!(pending[0].id, first.id);

    // Newest first.
    let cached = panel.projects.fetch().await.unwrap();
    let ids: Vec<_> = cached.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);
    let names: Vec<_> = cached.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["B", "A"]);
    assert_eq!(count(&toasts, Level::Success), 2);
}

#[tokio::test]
async fn rollback_keeps_the_other_mutations_change() {
    let backend = InMemoryBackend::new().with_latency(Duration::from_millis(20));
    backend.seed(&[faq("f1", "Keep me")]).unwrap();
    let (panel, toasts) = panel(&backend);
    panel.faqs.fetch().await.unwrap();
    backend.fail_next(Operation::Insert, Faq::TABLE, BackendError::Timeout);

    let failing = panel.faqs.clone();
    let editing = panel.faqs.clone();
    let create = tokio::spawn(async move { failing.create(faq("", "Rejected")).await });
    // Queued behind the create on the same key.
    tokio::time::sleep(Duration::from_millis(5)).await;
    let patch = tokio::spawn(async move {
        editing
            .patch("f1", |f| f.answer = "Updated".into())
            .await
    });

    assert!(create.await.unwrap().is_err());
    patch.await.unwrap().unwrap();

    let cached = panel.faqs.fetch().await.unwrap();
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].answer, "Updated");
    assert_eq!(count(&toasts, Level::Error), 1);
    assert_eq!(count(&toasts, Level::Success), 1);
}

#[tokio::test]
async fn collection_reports_in_flight_mutations() {
    let backend = InMemoryBackend::new().with_latency(Duration::from_millis(30));
    let (panel, _) = panel(&backend);
    panel.faqs.fetch().await.unwrap();

    let faqs = panel.faqs.clone();
    let task = tokio::spawn(async move { faqs.create(faq("", "Slow")).await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(panel.faqs.is_mutating());

    task.await.unwrap().unwrap();
    assert!(!panel.faqs.is_mutating());
}

#[tokio::test]
async fn racing_deletes_of_one_id() {
    let backend = InMemoryBackend::new().with_latency(Duration::from_millis(20));
    backend
        .seed(&[faq("f1", "Remove"), faq("f2", "Stay")])
        .unwrap();
    let (panel, toasts) = panel(&backend);
    panel.faqs.fetch().await.unwrap();

    let first = panel.faqs.clone();
    let second = panel.faqs.clone();
    let (a, b) = tokio::join!(
        tokio::spawn(async move { first.delete("f1").await }),
        tokio::spawn(async move { second.delete("f1").await }),
    );
    a.unwrap().unwrap();
    b.unwrap().unwrap();

    let cached = panel.faqs.fetch().await.unwrap();
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].id, "f2");
    assert_eq!(count(&toasts, Level::Error), 0);
}
