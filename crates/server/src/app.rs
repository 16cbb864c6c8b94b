//! Router and request handlers.

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use lumina_analyses::{ImageAnalysisWorkflow, TriggerEvent};
use lumina_engine::Runtime;
use lumina_history::{
    HistoryStore, InMemoryHistoryStore, InMemoryResultStore, InstanceId, ResultStore,
};

use crate::error::ApiError;

/// Default number of results returned by the list endpoint.
const DEFAULT_LIST_LIMIT: usize = 10;

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    runtime: Arc<Runtime>,
    history: Arc<dyn HistoryStore>,
    results: Arc<dyn ResultStore>,
}

impl AppState {
    /// Create state over explicit stores and runtime.
    pub fn new(
        runtime: Arc<Runtime>,
        history: Arc<dyn HistoryStore>,
        results: Arc<dyn ResultStore>,
    ) -> Self {
        Self {
            runtime,
            history,
            results,
        }
    }

    /// Create a fully in-memory deployment of the image analysis workflow.
    pub fn in_memory() -> Self {
        let history = Arc::new(InMemoryHistoryStore::new());
        let results = Arc::new(InMemoryResultStore::new());
        let registry = ImageAnalysisWorkflow::registry(results.clone());
        let runtime = Arc::new(Runtime::new(
            history.clone(),
            Arc::new(ImageAnalysisWorkflow),
            Arc::new(registry),
        ));
        Self::new(runtime, history, results)
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/images", post(upload_image))
        .route("/results", get(list_results))
        .route("/results/{id}", get(get_result))
        .route("/instances/{id}", get(get_instance))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Image upload request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    /// Name of the uploaded file.
    pub file_name: String,
    /// Base64-encoded image bytes.
    pub image_data: String,
    /// Optional delivery id; redeliveries with the same id map to the same
    /// instance. Omitted means a fresh delivery.
    pub delivery_id: Option<String>,
}

/// Image upload acknowledgement.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Workflow instance handling this upload.
    pub instance_id: String,
    /// Echo of the uploaded file name.
    pub file_name: String,
    /// False when this delivery was a duplicate of an already running
    /// instance.
    pub started: bool,
}

/// POST /images
///
/// Accepts an upload, starts (at most) one workflow instance for it, and
/// returns 202 immediately; analysis continues in the background.
async fn upload_image(
    State(state): State<AppState>,
    Json(req): Json<UploadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.file_name.is_empty() {
        return Err(ApiError::BadRequest("fileName must not be empty".into()));
    }
    let bytes = STANDARD
        .decode(&req.image_data)
        .map_err(|e| ApiError::BadRequest(format!("imageData is not valid base64: {e}")))?;

    let delivery_id = req
        .delivery_id
        .unwrap_or_else(|| ulid::Ulid::new().to_string());
    let trigger = TriggerEvent::new(&req.file_name, bytes, delivery_id);
    let instance_id = trigger.instance_id();

    let started = state
        .runtime
        .start_instance(instance_id, &trigger.file_name, trigger.input())
        .await
        .map_err(|e| ApiError::Internal(format!("failed to start instance: {e}")))?;

    info!(
        instance_id = %instance_id,
        file_name = %req.file_name,
        started,
        "Upload accepted"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadResponse {
            instance_id: instance_id.to_string(),
            file_name: req.file_name,
            started,
        }),
    ))
}

#[derive(Debug, Deserialize)]
struct ListParams {
    limit: Option<usize>,
}

/// GET /results
///
/// Lists stored result summaries, newest first.
async fn list_results(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    let all = state
        .results
        .list_all()
        .await
        .map_err(|e| ApiError::Internal(format!("failed to list results: {e}")))?;

    let results: Vec<Value> = all
        .into_iter()
        .take(limit)
        .map(|stored| {
            json!({
                "id": stored.row_key,
                "fileName": stored.report["fileName"],
                "analyzedAt": stored.report["analyzedAt"],
                "summary": stored.report["summary"],
            })
        })
        .collect();

    Ok(Json(json!({
        "count": results.len(),
        "results": results,
    })))
}

/// GET /results/{id}
///
/// Returns the full report for one result.
async fn get_result(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let stored = state
        .results
        .get(&id)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to load result: {e}")))?
        .ok_or_else(|| ApiError::NotFound(format!("Result not found: {id}")))?;
    Ok(Json(stored.report))
}

/// GET /instances/{id}
///
/// Reports an instance's status, including what failed and why.
async fn get_instance(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let instance_id = InstanceId::from_str(&id)
        .map_err(|_| ApiError::BadRequest(format!("not a valid instance id: {id}")))?;

    let record = state
        .history
        .load_instance(instance_id)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to load instance: {e}")))?
        .ok_or_else(|| ApiError::NotFound(format!("Instance not found: {id}")))?;

    Ok(Json(json!({
        "instanceId": record.id.to_string(),
        "fileName": record.file_name,
        "status": record.status,
        "createdAt": record.created_at,
        "updatedAt": record.updated_at,
        "output": record.output,
        "failure": record.failure,
    })))
}
