//! Read-only HTTP query surface.
//!
//! | Route                     | Response                                   |
//! |---------------------------|--------------------------------------------|
//! | `GET /`                   | service descriptor                         |
//! | `GET /api/documents`      | all documents, insertion order             |
//! | `GET /api/documents/{id}` | one document or 404                        |
//! | `GET /api/stats`          | [`ServiceStats`](crate::server::ServiceStats) |

use axum::extract::{Path, State};
use axum::http::{HeaderValue, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use scribe_core::Document;

use crate::protocol::CLIENT_EVENTS;
use crate::server::{CollabState, ServiceStats};

type AppState = Arc<CollabState>;

pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(descriptor))
        .route("/api/documents", get(list_documents))
        .route("/api/documents/{id}", get(get_document))
        .route("/api/stats", get(stats))
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

/// `*` anywhere in the list allows every origin.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("Ignoring invalid CORS origin {origin:?}: {e}");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(allowed))
}

async fn descriptor() -> Json<Value> {
    Json(json!({
        "name": "scribe",
        "description": "Real-time collaborative code editing server",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "documents": "/api/documents",
            "document": "/api/documents/{id}",
            "stats": "/api/stats",
        },
        "websocket_events": CLIENT_EVENTS,
    }))
}

async fn list_documents(State(state): State<AppState>) -> Json<Vec<Document>> {
    let coordinator = state.coordinator().await;
    Json(coordinator.documents().list().into_iter().cloned().collect())
}

async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Document>, (StatusCode, Json<Value>)> {
    let coordinator = state.coordinator().await;
    match coordinator.documents().get(&id) {
        Ok(document) => Ok(Json(document.clone())),
        Err(_) => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Document not found" })),
        )),
    }
}

async fn stats(State(state): State<AppState>) -> Json<ServiceStats> {
    Json(state.stats().await)
}
