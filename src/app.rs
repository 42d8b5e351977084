use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, patch},
};
use chrono::Utc;
use log::{info, warn};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::codec;
use crate::config::Config;
use crate::export::{self, ExportFormat};
use crate::store::{
    CanvasListResponse, CanvasResponse, CreateCanvasRequest, MemoryCanvasStore,
    SaveScriptRequest, SaveScriptResponse, StatusResponse,
};

/// Shared state of the development backend.
pub struct AppState {
    store: MemoryCanvasStore,
}

/// Builds the canvas REST API over `store`.
///
/// # Routes
/// * `GET /health`
/// * `GET /canvas/:owner` and `POST /canvas/:owner`
/// * `GET /canvas/:owner/:id` and `DELETE /canvas/:owner/:id`
/// * `PATCH /canvas/:owner/:id/script`
/// * `GET /canvas/:owner/:id/export/:format`
pub fn router(store: MemoryCanvasStore) -> Router {
    let state = Arc::new(AppState { store });
    Router::new()
        .route("/health", get(health))
        .route("/canvas/:owner", get(list_canvases).post(create_canvas))
        .route("/canvas/:owner/:id", get(get_canvas).delete(delete_canvas))
        .route("/canvas/:owner/:id/script", patch(save_script))
        .route("/canvas/:owner/:id/export/:format", get(export_canvas))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves the API on `config.bind` until the process is stopped.
///
/// # Arguments
/// * `config` - Runtime settings; only the bind address is used here
/// * `store` - Canvas storage, shared with anything else holding a clone
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Error if the address cannot be bound
pub async fn run(config: &Config, store: MemoryCanvasStore) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(store);
    let listener = TcpListener::bind(&config.bind).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

async fn list_canvases(
    Path(owner): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    Json(CanvasListResponse {
        success: true,
        canvases: state.store.list(&owner),
        error: None,
    })
}

async fn create_canvas(
    Path(owner): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateCanvasRequest>,
) -> Response {
    let name = payload.name.trim();
    if name.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(CanvasResponse {
                success: false,
                canvas: None,
                error: Some("Canvas name is required".to_string()),
            }),
        )
            .into_response();
    }

    let canvas = state.store.create(&owner, name);
    (
        StatusCode::CREATED,
        Json(CanvasResponse {
            success: true,
            canvas: Some(canvas),
            error: None,
        }),
    )
        .into_response()
}

async fn get_canvas(
    Path((owner, id)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match state.store.get(&owner, &id) {
        Some(canvas) => Json(CanvasResponse {
            success: true,
            canvas: Some(canvas),
            error: None,
        })
        .into_response(),
        None => not_found(&id),
    }
}

async fn delete_canvas(
    Path((owner, id)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> Response {
    if state.store.delete(&owner, &id) {
        info!("deleted canvas {}/{}", owner, id);
        Json(StatusResponse {
            success: true,
            error: None,
        })
        .into_response()
    } else {
        not_found(&id)
    }
}

/// Overwrites the stored script. The script is opaque here; no merge, no validation.
async fn save_script(
    Path((owner, id)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SaveScriptRequest>,
) -> Response {
    match state.store.put_script(&owner, &id, &payload.script) {
        Some(updated_at) => Json(SaveScriptResponse {
            success: true,
            updated_at: Some(updated_at),
            error: None,
        })
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(SaveScriptResponse {
                success: false,
                updated_at: None,
                error: Some(format!("Canvas {} not found", id)),
            }),
        )
            .into_response(),
    }
}

async fn export_canvas(
    Path((owner, id, format)): Path<(String, String, String)>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let Some(canvas) = state.store.get(&owner, &id) else {
        return not_found(&id);
    };
    let Some(format) = ExportFormat::from_extension(&format) else {
        return error_response(StatusCode::BAD_REQUEST, format!("Unknown export format {}", format));
    };
    let document = match codec::decode(&canvas.script) {
        Ok(document) => document,
        Err(err) => {
            warn!("stored canvas {} is malformed: {}", id, err);
            return error_response(StatusCode::UNPROCESSABLE_ENTITY, err.to_string());
        }
    };

    // Rasterising is CPU bound, keep it off the async workers.
    let name = canvas.name.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut camera = document.viewport.unwrap_or_default();
        export::export(&document, &mut camera, format, &name, Utc::now())
    })
    .await;

    match result {
        Ok(Ok(file)) => (
            [
                (header::CONTENT_TYPE, format.mime_type().to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", file.file_name),
                ),
            ],
            file.bytes,
        )
            .into_response(),
        Ok(Err(err)) => error_response(StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

fn not_found(id: &str) -> Response {
    error_response(StatusCode::NOT_FOUND, format!("Canvas {} not found", id))
}

fn error_response(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(StatusResponse {
            success: false,
            error: Some(message),
        }),
    )
        .into_response()
}
