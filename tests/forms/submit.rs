use std::sync::{Arc, Mutex};

use blackcard_sync::backend::Operation;
use blackcard_sync::entities::{Service, SystemSetting};
use blackcard_sync::form::{ServiceForm, SettingForm};
use blackcard_sync::notify::{Level, LogNotifier};
use blackcard_sync::{
    AdminPanel, BackendError, FormSubmitter, InMemoryBackend, Record, SubmitError, SyncConfig,
};

fn panel(backend: &InMemoryBackend) -> (AdminPanel, Arc<Mutex<Vec<blackcard_sync::Notification>>>) {
    let toasts = Arc::new(Mutex::new(Vec::new()));
    let panel = AdminPanel::builder(SyncConfig::default(), Arc::new(backend.clone()))
        .notifier(Arc::new(LogNotifier::with_buffer(Arc::clone(&toasts))))
        .build();
    (panel, toasts)
}

#[tokio::test]
async fn invalid_service_form_is_rejected_before_any_mutation() {
    let backend = InMemoryBackend::new();
    let (panel, toasts) = panel(&backend);
    let submitter = FormSubmitter::<ServiceForm>::new(panel.services.clone());

    let err = submitter
        .submit(&ServiceForm {
            title: "Chauffeur".into(),
            sort_order: "first".into(),
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, SubmitError::Invalid(_)));
    assert!(toasts.lock().unwrap().is_empty());
    assert_eq!(backend.call_count(Operation::Insert, "services"), 0);
}

#[tokio::test]
async fn failed_submit_keeps_the_edit_open() {
    let backend = InMemoryBackend::new();
    let (panel, toasts) = panel(&backend);
    let submitter = FormSubmitter::<ServiceForm>::new(panel.services.clone());

    let created = submitter
        .submit(&ServiceForm {
            title: "Chauffeur".into(),
            features: "Airport pickup, 24/7".into(),
            is_active: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(created.features, vec!["Airport pickup", "24/7"]);

    let mut form = submitter.edit(&created);
    form.price = "250".into();
    backend.fail_next(
        Operation::Update,
        Service::TABLE,
        BackendError::Rejected("permission denied".into()),
    );
    let err = submitter.submit(&form).await.unwrap_err();
    assert!(matches!(err, SubmitError::Mutation(_)));
    assert_eq!(submitter.editing().map(|s| s.id), Some(created.id.clone()));

    let retried = submitter.submit(&form).await.unwrap();
    assert_eq!(retried.price, Some(250.0));
    assert!(submitter.editing().is_none());

    let levels: Vec<Level> = toasts.lock().unwrap().iter().map(|n| n.level).collect();
    assert_eq!(levels, vec![Level::Success, Level::Error, Level::Success]);
}

#[tokio::test]
async fn setting_toggle_is_stored_as_text() {
    let backend = InMemoryBackend::new();
    let (panel, _) = panel(&backend);
    let submitter = FormSubmitter::<SettingForm>::new(panel.settings.clone());

    submitter
        .submit(&SettingForm {
            key: "maintenance_mode".into(),
            toggle: Some(true),
            ..Default::default()
        })
        .await
        .unwrap();

    let rows = backend.rows("settings");
    assert_eq!(rows[0]["value"], "true");
    let stored = backend.records::<SystemSetting>();
    assert_eq!(stored[0].value.as_flag(), Some(true));
}
