use std::sync::Arc;

use blackcard_sync::config::BackendConfig;
use blackcard_sync::entities::Faq;
use blackcard_sync::{
    Auth, Backend, BackendError, FileStore, Filter, ManagedCollection, MutationRunner, Order,
    Query, QueryCache, RestBackend,
};
use serde_json::json;

use crate::mock::{start, Mock};

fn client(base: &str) -> RestBackend {
    RestBackend::new(&BackendConfig {
        url: base.to_string(),
        anon_key: "anon".into(),
        ..BackendConfig::default()
    })
    .unwrap()
}

fn row(value: serde_json::Value) -> blackcard_sync::Row {
    value.as_object().cloned().unwrap()
}

#[tokio::test]
async fn insert_returns_server_row() {
    let base = start(Mock::default()).await;
    let backend = client(&base);

    let stored = backend
        .insert("faqs", row(json!({ "question": "Q", "answer": "A" })))
        .await
        .unwrap();
    assert_eq!(stored["id"], "srv-1");
    assert_eq!(stored["question"], "Q");
}

#[tokio::test]
async fn select_sends_filters_and_order() {
    let mock = Mock::default();
    let base = start(mock.clone()).await;
    let backend = client(&base);
    backend
        .insert("faqs", row(json!({ "question": "Q", "is_published": true })))
        .await
        .unwrap();

    let query = Query::all()
        .filter(Filter::eq("is_published", true))
        .order(Order::asc("sort_order"))
        .limit(10);
    let rows = backend.select("faqs", &query).await.unwrap();
    assert_eq!(rows.len(), 1);

    let sent = mock.queries.lock().unwrap().last().cloned().unwrap();
    assert_eq!(sent["select"], "*");
    assert_eq!(sent["is_published"], "eq.true");
    assert_eq!(sent["order"], "sort_order.asc");
    assert_eq!(sent["limit"], "10");
}

#[tokio::test]
async fn update_and_delete_count_affected_rows() {
    let base = start(Mock::default()).await;
    let backend = client(&base);
    let stored = backend
        .insert("faqs", row(json!({ "question": "Q" })))
        .await
        .unwrap();
    let id = stored["id"].as_str().unwrap().to_string();

    let affected = backend
        .update("faqs", row(json!({ "question": "Q2" })), &Filter::eq("id", id.clone()))
        .await
        .unwrap();
    assert_eq!(affected, 1);
    let missing = backend
        .update("faqs", row(json!({ "question": "Q3" })), &Filter::eq("id", "nope"))
        .await
        .unwrap();
    assert_eq!(missing, 0);

    assert_eq!(backend.delete("faqs", &Filter::eq("id", id.clone())).await.unwrap(), 1);
    assert_eq!(backend.delete("faqs", &Filter::eq("id", id)).await.unwrap(), 0);
}

#[tokio::test]
async fn error_statuses_map_to_backend_errors() {
    let base = start(Mock::default()).await;
    let backend = client(&base);

    let err = backend.select("secret", &Query::all()).await.unwrap_err();
    assert_eq!(err, BackendError::Unauthorized("JWT expired".into()));

    let err = backend
        .insert("faqs", row(json!({ "question": "duplicate" })))
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::Rejected(msg) if msg.contains("duplicate key")));
}

#[tokio::test]
async fn unreachable_server_is_a_connection_error() {
    let backend = client("http://127.0.0.1:9");
    let err = backend.select("faqs", &Query::all()).await.unwrap_err();
    assert!(matches!(
        err,
        BackendError::Connection(_) | BackendError::Timeout
    ));
}

#[tokio::test]
async fn sign_in_attaches_session_token() {
    let mock = Mock::default();
    let base = start(mock.clone()).await;
    let backend = client(&base);

    let err = backend.sign_in("admin@theblackcard.test", "guess").await.unwrap_err();
    assert_eq!(err, BackendError::Rejected("Invalid login credentials".into()));
    assert!(backend.session().await.is_none());

    let session = backend
        .sign_in("admin@theblackcard.test", "correct horse")
        .await
        .unwrap();
    assert_eq!(session.user_id, "u1");
    backend.select("faqs", &Query::all()).await.unwrap();

    let tokens = mock.tokens.lock().unwrap().clone();
    assert_eq!(tokens.last().map(String::as_str), Some("Bearer session-token"));
}

#[tokio::test]
async fn upload_returns_public_url() {
    let base = start(Mock::default()).await;
    let backend = client(&base);
    let url = blackcard_sync::media::upload_public(&backend, "images", "Logo.PNG", vec![1, 2])
        .await
        .unwrap();
    assert!(url.starts_with(&format!("{base}/storage/v1/object/public/images/")));
    assert!(url.ends_with("-logo.png"));
    assert_eq!(backend.public_url("images", "a.png"), format!("{base}/storage/v1/object/public/images/a.png"));
}

#[tokio::test]
async fn managed_collection_over_rest() {
    let base = start(Mock::default()).await;
    let backend: Arc<dyn Backend> = Arc::new(client(&base));
    let faqs = ManagedCollection::<Faq>::new(backend, MutationRunner::new(QueryCache::new(None)));

    assert!(faqs.fetch().await.unwrap().is_empty());
    let created = faqs
        .create(Faq {
            question: "Where is the lounge?".into(),
            answer: "Terminal 1".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(created.id, "srv-1");

    faqs.patch("srv-1", |f| f.answer = "Terminal 2".into()).await.unwrap();
    let cached = faqs.fetch().await.unwrap();
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].answer, "Terminal 2");

    faqs.delete("srv-1").await.unwrap();
    assert!(faqs.fetch().await.unwrap().is_empty());
}
