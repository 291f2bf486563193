use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

/// In-process stand-in for the hosted backend's REST surface.
#[derive(Clone, Default)]
pub struct Mock {
    pub rows: Arc<Mutex<HashMap<String, Vec<Value>>>>,
    pub queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
    pub tokens: Arc<Mutex<Vec<String>>>,
    next_id: Arc<Mutex<u32>>,
}

fn matches(row: &Value, params: &HashMap<String, String>) -> bool {
    params.iter().all(|(column, rule)| {
        if matches!(column.as_str(), "select" | "order" | "limit") {
            return true;
        }
        match rule.strip_prefix("eq.") {
            Some(expected) => match &row[column] {
                Value::String(s) => s == expected,
                other => other.to_string() == expected,
            },
            None => true,
        }
    })
}

fn record(mock: &Mock, headers: &HeaderMap, params: &HashMap<String, String>) {
    mock.queries.lock().unwrap().push(params.clone());
    if let Some(token) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        mock.tokens.lock().unwrap().push(token.to_string());
    }
}

async fn select(
    State(mock): State<Mock>,
    Path(table): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    record(&mock, &headers, &params);
    if table == "secret" {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "JWT expired" })));
    }
    let rows = mock.rows.lock().unwrap();
    let found: Vec<Value> = rows
        .get(&table)
        .map(|rows| rows.iter().filter(|r| matches(r, &params)).cloned().collect())
        .unwrap_or_default();
    (StatusCode::OK, Json(Value::Array(found)))
}

async fn insert(
    State(mock): State<Mock>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Json(mut row): Json<Value>,
) -> impl IntoResponse {
    record(&mock, &headers, &HashMap::new());
    if row.get("id").is_none() {
        let mut next = mock.next_id.lock().unwrap();
        *next += 1;
        row["id"] = json!(format!("srv-{}", *next));
    }
    if row["question"] == "duplicate" {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "message": "duplicate key value violates unique constraint" })),
        );
    }
    mock.rows
        .lock()
        .unwrap()
        .entry(table)
        .or_default()
        .push(row.clone());
    (StatusCode::CREATED, Json(json!([row])))
}

async fn update(
    State(mock): State<Mock>,
    Path(table): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(patch): Json<Value>,
) -> impl IntoResponse {
    record(&mock, &headers, &params);
    let mut rows = mock.rows.lock().unwrap();
    let mut changed = Vec::new();
    for row in rows.entry(table).or_default().iter_mut() {
        if matches(row, &params) {
            if let (Some(target), Some(fields)) = (row.as_object_mut(), patch.as_object()) {
                for (k, v) in fields {
                    target.insert(k.clone(), v.clone());
                }
            }
            changed.push(row.clone());
        }
    }
    Json(Value::Array(changed))
}

async fn delete(
    State(mock): State<Mock>,
    Path(table): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    record(&mock, &headers, &params);
    let mut rows = mock.rows.lock().unwrap();
    let stored = rows.entry(table).or_default();
    let (gone, kept): (Vec<Value>, Vec<Value>) =
        stored.drain(..).partition(|row| matches(row, &params));
    *stored = kept;
    Json(Value::Array(gone))
}

async fn token(Json(body): Json<Value>) -> impl IntoResponse {
    if body["password"] != "correct horse" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error_description": "Invalid login credentials" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "access_token": "session-token",
            "user": { "id": "u1", "email": body["email"] }
        })),
    )
}

async fn upload(Path((_bucket, _path)): Path<(String, String)>) -> impl IntoResponse {
    Json(json!({ "Key": "ok" }))
}

/// Bind to port 0 and return the base url.
pub async fn start(mock: Mock) -> String {
    let app = Router::new()
        .route(
            "/rest/v1/:table",
            get(select).post(insert).patch(update).delete(delete),
        )
        .route("/auth/v1/token", post(token))
        .route("/storage/v1/object/:bucket/*path", post(upload))
        .with_state(mock);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}
