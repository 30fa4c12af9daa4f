use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// How long `/slow` waits before answering.
pub const SLOW_DELAY: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ping {
    pub ok: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub id: Uuid,
    pub size: usize,
}

pub type Uploads = Arc<RwLock<HashMap<Uuid, Bytes>>>;

pub fn app() -> Router {
    let uploads: Uploads = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/ping", get(ping))
        .route("/status/{code}", get(status))
        .route("/empty", get(empty))
        .route("/slow", get(slow))
        .route("/echo-headers", get(echo_headers))
        .route("/files/{name}", get(file))
        .route("/uploads", axum::routing::post(create_upload).put(create_upload))
        .route("/uploads/{id}", get(get_upload))
        .with_state(uploads)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Deterministic content served for `/files/{name}`.
pub fn file_contents(name: &str) -> Vec<u8> {
    name.bytes().cycle().take(name.len() * 1024).collect()
}

async fn ping() -> Json<Ping> {
    Json(Ping { ok: true })
}

async fn status(Path(code): Path<u16>) -> (StatusCode, Json<ErrorBody>) {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST);
    let reason = status
        .canonical_reason()
        .unwrap_or("unknown")
        .to_ascii_lowercase();
    (status, Json(ErrorBody { error: reason }))
}

async fn empty() -> StatusCode {
    StatusCode::OK
}

async fn slow() -> Json<Ping> {
    tokio::time::sleep(SLOW_DELAY).await;
    Json(Ping { ok: true })
}

async fn echo_headers(headers: HeaderMap) -> Json<Vec<(String, String)>> {
    Json(
        headers
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect(),
    )
}

async fn file(Path(name): Path<String>) -> Vec<u8> {
    file_contents(&name)
}

async fn create_upload(
    State(uploads): State<Uploads>,
    body: Bytes,
) -> (StatusCode, Json<UploadReceipt>) {
    let receipt = UploadReceipt {
        id: Uuid::new_v4(),
        size: body.len(),
    };
    uploads.write().await.insert(receipt.id, body);
    (StatusCode::CREATED, Json(receipt))
}

async fn get_upload(
    State(uploads): State<Uploads>,
    Path(id): Path<Uuid>,
) -> Result<Bytes, (StatusCode, Json<ErrorBody>)> {
    let uploads = uploads.read().await;
    uploads.get(&id).cloned().ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: "not found".to_string(),
            }),
        )
    })
}
