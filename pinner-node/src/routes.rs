//! HTTP 路由層
//!
//! 圍繞同一組存儲操作的薄傳輸封裝：
//! - `GET /value` - 最近一次持久化的提交
//! - `GET /ipfs/get-pinned-cids` - 當前固定列表
//! - `POST /ipfs/add` - multipart 上傳，目錄包裹添加（上限 10MB）
//! - `GET /ipfs/{cid}[/{filename}]` - Gateway 內容獲取，讀後補固定
//!
//! 上游錯誤映射沿用慣例：超時 → 504，未找到 → 404，其餘 → 422。

use crate::error::NodeError;
use crate::ipfs_client::IpfsClient;
use crate::proof::SUBMISSION_KEY;
use crate::round_store::RoundStore;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

/// 上傳體積上限
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// 路由層共享狀態
#[derive(Clone)]
pub struct AppState {
    pub ipfs: Arc<IpfsClient>,
    pub store: Arc<dyn RoundStore>,
}

/// 構建路由
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/value", get(get_value))
        .route("/ipfs/get-pinned-cids", get(get_pinned_cids))
        .route("/ipfs/add", post(add_files))
        .route("/ipfs/:cid", get(fetch_cid))
        .route("/ipfs/:cid/:filename", get(fetch_cid_file))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// 最近一次持久化的提交
async fn get_value(State(state): State<AppState>) -> Response {
    match state.store.get(SUBMISSION_KEY).await {
        Ok(value) => Json(serde_json::json!({ "value": value })).into_response(),
        Err(e) => {
            error!("Failed to read stored submission: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

/// 當前固定列表
async fn get_pinned_cids(State(state): State<AppState>) -> Response {
    match state.ipfs.list_pinned().await {
        Ok(cids) => Json(serde_json::json!({
            "status": 200,
            "pinnedCIDs": cids,
        }))
        .into_response(),
        Err(e) => {
            error!("Failed to list pinned CIDs: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

/// multipart 上傳 → 目錄包裹添加
async fn add_files(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut files = Vec::new();

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                let name = field
                    .file_name()
                    .map(|s| s.to_string())
                    .or_else(|| field.name().map(|s| s.to_string()))
                    .unwrap_or_else(|| format!("file-{}", files.len()));

                match field.bytes().await {
                    Ok(bytes) => files.push((name, bytes.to_vec())),
                    Err(e) => {
                        return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
                    }
                }
            }
            Ok(None) => break,
            Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        }
    }

    if files.is_empty() {
        return (StatusCode::BAD_REQUEST, "No files were uploaded").into_response();
    }

    match state.ipfs.add_content(files).await {
        Ok(cid) => Json(serde_json::json!({ "status": 200, "cid": cid })).into_response(),
        Err(NodeError::StorageTimeout(_)) => {
            (StatusCode::GATEWAY_TIMEOUT, "Request Timed Out").into_response()
        }
        Err(e) => {
            error!("Failed to add content: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

async fn fetch_cid(State(state): State<AppState>, Path(cid): Path<String>) -> Response {
    serve_content(&state, &cid, None).await
}

async fn fetch_cid_file(
    State(state): State<AppState>,
    Path((cid, filename)): Path<(String, String)>,
) -> Response {
    serve_content(&state, &cid, Some(&filename)).await
}

/// Gateway 內容獲取，成功後對該 CID 補固定
async fn serve_content(state: &AppState, cid: &str, filename: Option<&str>) -> Response {
    match state.ipfs.fetch_content(cid, filename).await {
        Ok(bytes) => {
            debug!("Serving {} bytes for {}", bytes.len(), cid);
            // 讀後補固定：分離任務，失敗只記日誌
            state.ipfs.spawn_pin(cid);
            bytes.into_response()
        }
        Err(NodeError::StorageTimeout(_)) => {
            (StatusCode::GATEWAY_TIMEOUT, "Request Timed Out").into_response()
        }
        Err(NodeError::NotFound(_)) => (StatusCode::NOT_FOUND, "Not found").into_response(),
        Err(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::round_store::MemoryRoundStore;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState {
            ipfs: Arc::new(IpfsClient::with_config(
                "http://127.0.0.1:1".to_string(),
                "http://127.0.0.1:1".to_string(),
                1,
                1,
            )),
            store: Arc::new(MemoryRoundStore::new()),
        }
    }

    #[tokio::test]
    async fn test_get_value_empty() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/value").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["value"].is_null());
    }

    #[tokio::test]
    async fn test_get_value_returns_stored_submission() {
        let state = test_state();
        state.store.set(SUBMISSION_KEY, "stored").await.unwrap();

        let app = router(state);
        let response = app
            .oneshot(Request::builder().uri("/value").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["value"], "stored");
    }

    #[tokio::test]
    async fn test_fetch_cid_unreachable_daemon_maps_to_422() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/ipfs/QmMissing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_add_without_files_is_bad_request() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/ipfs/add")
                    .header("content-type", "multipart/form-data; boundary=x")
                    .body(Body::from("--x--\r\n"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
