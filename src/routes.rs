use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::{
        multipart::MultipartRejection, rejection::JsonRejection, DefaultBodyLimit, Multipart,
        State,
    },
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::chat;
use crate::detection::{DetectionResult, LeafImage};
use crate::dispatch::{ChatChain, DetectionChain};
use crate::error::{AppError, Result};
use crate::uploads::UploadStore;

pub struct AppState {
    pub detection: DetectionChain,
    pub chat: ChatChain,
    pub uploads: UploadStore,
}

#[derive(Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    query: Option<String>,
}

pub fn router(state: Arc<AppState>, static_dir: &Path, body_limit_bytes: usize) -> Router {
    Router::new()
        .route("/api/detect-disease", post(detect_disease))
        .route("/api/chat", post(chat_handler))
        .route("/health", get(health_check))
        .fallback_service(ServeDir::new(static_dir))
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn detect_disease(
    State(state): State<Arc<AppState>>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<DetectionResult>> {
    // a body that is not multipart cannot carry the image field either
    let mut multipart = multipart.map_err(|_| no_image())?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        // a plain form value named `image` is not an upload
        if field.name() == Some("image") {
            let Some(file_name) = field.file_name().map(str::to_string) else {
                continue;
            };
            let content_type = field.content_type().map(str::to_string);
            let data = field.bytes().await?;
            upload = Some((file_name, content_type, data));
            break;
        }
    }

    let (file_name, content_type, data) = upload.ok_or_else(no_image)?;
    if file_name.is_empty() {
        return Err(AppError::BadRequest("No selected file".into()));
    }

    let path = state.uploads.save(&file_name, &data).await?;
    let image = LeafImage::new(&path, data.to_vec(), content_type);

    let result = state.detection.dispatch(&image).await;
    state.uploads.release(&path).await;

    tracing::info!("Detected {} ({}%)", result.disease, result.confidence);
    Ok(Json(result))
}

fn no_image() -> AppError {
    AppError::BadRequest("No image uploaded".into())
}

async fn chat_handler(
    State(state): State<Arc<AppState>>,
    request: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>> {
    let Json(request) = request.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    let query = match request.query.as_deref() {
        None | Some("") => return Ok(Json(json!({ "response": chat::EMPTY_QUERY_REPLY }))),
        Some(query) => query,
    };

    let response = state.chat.dispatch(query).await;
    Ok(Json(json!({ "response": response })))
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "OK",
        "backends": {
            "detection": state.detection.backend_names(),
            "chat": state.chat.backend_names(),
        }
    }))
}
