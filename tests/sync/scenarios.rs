//! End-to-end admin flows: form in, backend and cache out.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use blackcard_sync::entities::Project;
use blackcard_sync::form::ProjectForm;
use blackcard_sync::notify::Level;
use blackcard_sync::panel::public_key;
use blackcard_sync::{
    BackendError, FormSubmitter, InMemoryBackend, MutationError, Record, Scope,
};

use crate::support::{count, panel, panel_over, AssigningBackend};

fn project(id: &str, name: &str) -> Project {
    Project {
        id: id.into(),
        name: name.into(),
        country: "Oman".into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn create_project_from_form() {
    let memory = InMemoryBackend::new().with_latency(Duration::from_millis(50));
    let backend = AssigningBackend {
        inner: memory.clone(),
        next_id: "abc123",
    };
    let (panel, toasts) = panel_over(Arc::new(backend));
    panel.projects.fetch().await.unwrap();

    let submitter = Arc::new(FormSubmitter::<ProjectForm>::new(panel.projects.clone()));
    let form = ProjectForm {
        name: "Test Site".into(),
        country: "Oman".into(),
        technologies: "React, Node.js".into(),
        ..Default::default()
    };

    let task = {
        let submitter = Arc::clone(&submitter);
        tokio::spawn(async move { submitter.submit(&form).await })
    };

    // The optimistic record shows up before the backend answers.
    let cache = panel.cache().clone();
    let key = panel.projects.key().clone();
    let pending = tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            if let Some(records) = cache.peek::<Project>(&key).unwrap() {
                if let Some(first) = records.first() {
                    return first.clone();
                }
            }
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("optimistic record should appear");
    assert!(pending.is_temporary());
    assert_eq!(pending.technologies, vec!["React", "Node.js"]);
    assert!(submitter.is_busy());

    let created = task.await.unwrap().unwrap();
    assert_eq!(created.id, "abc123");
    assert_eq!(created.technologies, vec!["React", "Node.js"]);

    let cached = panel.projects.fetch().await.unwrap();
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].id, "abc123");
    assert!(cached.iter().all(|p| !p.is_temporary()));
    assert_eq!(count(&toasts, Level::Success), 1);
    assert_eq!(
        toasts.lock().unwrap()[0].message,
        "Project created successfully"
    );
    assert_eq!(memory.records::<Project>().len(), 1);
    assert!(!submitter.is_busy());
}

#[tokio::test]
async fn failed_update_rolls_back_with_one_error() {
    let backend = InMemoryBackend::new();
    backend
        .seed(&[project("p1", "Old Name"), project("p2", "Other")])
        .unwrap();
    let (panel, toasts) = panel(&backend);
    let before = panel.projects.fetch().await.unwrap();

    backend.fail_next(
        blackcard_sync::backend::Operation::Update,
        Project::TABLE,
        BackendError::Connection("network unreachable".into()),
    );
    let err = panel
        .projects
        .patch("p1", |p| p.name = "New Name".into())
        .await
        .unwrap_err();

    assert_eq!(
        err.backend(),
        Some(&BackendError::Connection("network unreachable".into()))
    );
    let after = panel
        .cache()
        .peek::<Project>(panel.projects.key())
        .unwrap()
        .unwrap();
    assert_eq!(*after, *before);
    assert_eq!(count(&toasts, Level::Error), 1);
    assert_eq!(count(&toasts, Level::Success), 0);
    assert!(toasts.lock().unwrap()[0]
        .message
        .contains("network unreachable"));
    assert_eq!(backend.records::<Project>()[0].name, "Old Name");
}

#[tokio::test]
async fn deleting_twice_succeeds_both_times() {
    let backend = InMemoryBackend::new();
    backend.seed(&[project("p1", "Gone soon")]).unwrap();
    let (panel, toasts) = panel(&backend);
    panel.projects.fetch().await.unwrap();

    panel.projects.delete("p1").await.unwrap();
    panel.projects.delete("p1").await.unwrap();

    assert!(panel.projects.fetch().await.unwrap().is_empty());
    assert!(backend.records::<Project>().is_empty());
    assert_eq!(count(&toasts, Level::Error), 0);
}

#[tokio::test]
async fn admin_edit_refreshes_public_portfolio() {
    let backend = InMemoryBackend::new();
    backend.seed(&[project("p1", "Draft")]).unwrap();
    let (panel, _) = panel(&backend);
    let public = panel.public::<Project>();
    assert_eq!(public.fetch().await.unwrap()[0].name, "Draft");
    assert_eq!(public.key(), &public_key("projects"));

    panel.projects.fetch().await.unwrap();
    panel
        .projects
        .patch("p1", |p| p.name = "Launched".into())
        .await
        .unwrap();

    assert_eq!(public.fetch().await.unwrap()[0].name, "Launched");
}

#[tokio::test]
async fn clearing_optional_fields_reaches_backend() {
    let backend = InMemoryBackend::new();
    backend
        .seed(&[Project {
            image_url: Some("http://img/site.png".into()),
            stats: Some(json!({ "visitors": 1200 })),
            year: Some(2020),
            ..project("p1", "Site")
        }])
        .unwrap();
    let (panel, toasts) = panel(&backend);
    let cached = panel.projects.fetch().await.unwrap();

    let submitter = FormSubmitter::<ProjectForm>::new(panel.projects.clone());
    let mut form = submitter.edit(&cached[0]);
    assert_eq!(form.year, "2020");
    form.image_url = String::new();
    form.stats = String::new();
    form.year = String::new();
    submitter.submit(&form).await.unwrap();

    let stored = &backend.records::<Project>()[0];
    assert_eq!(stored.image_url, None);
    assert_eq!(stored.stats, None);
    assert_eq!(stored.year, None);

    let cached = panel.projects.fetch().await.unwrap();
    assert_eq!(cached[0].image_url, None);
    assert_eq!(cached[0].stats, None);
    assert_eq!(cached[0].year, None);
    assert_eq!(cached[0].name, "Site");
    assert_eq!(count(&toasts, Level::Success), 1);
}

#[tokio::test]
async fn disposed_scope_settles_silently() {
    let backend = InMemoryBackend::new().with_latency(Duration::from_millis(30));
    let (panel, toasts) = panel(&backend);
    panel.projects.fetch().await.unwrap();

    let scope = Scope::new();
    let scoped = panel.projects.with_scope(scope.clone());
    let task = tokio::spawn(async move { scoped.create(project("", "Background")).await });
    scope.dispose();

    let created = task.await.unwrap().unwrap();
    assert!(toasts.lock().unwrap().is_empty());
    let cached = panel.projects.fetch().await.unwrap();
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].id, created.id);
}

#[tokio::test]
async fn temporary_ids_are_refused() {
    let backend = InMemoryBackend::new();
    let (panel, toasts) = panel(&backend);
    let err = panel
        .projects
        .update(project("tmp-7", "Pending"))
        .await
        .unwrap_err();
    assert_eq!(err, MutationError::TemporaryId("tmp-7".into()));
    assert!(toasts.lock().unwrap().is_empty());
}
