use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use scribe_core::error::ScribeError;
use scribe_workflows::{ErrorKind, IdeaRequest, WorkflowResponse, XPostInput};

use crate::middleware::{ApiJson, Authenticated};
use crate::state::AppState;

/// Error reply with a `{status: "error", message}` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: "missing or invalid token".to_string(),
        }
    }

    fn from_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status: status_for(kind),
            message: message.into(),
        }
    }
}

impl From<ScribeError> for ApiError {
    fn from(e: ScribeError) -> Self {
        Self::from_kind(ErrorKind::of(&e), e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::from_kind(ErrorKind::InvalidInput, rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "status": "error", "message": self.message }));
        (self.status, body).into_response()
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::UnknownWorkflow => StatusCode::NOT_FOUND,
        ErrorKind::RunFailed => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// The workflow's result, or its failure as an error reply.
fn into_result(response: WorkflowResponse) -> Result<Value, ApiError> {
    if response.is_success() {
        return Ok(response.result.unwrap_or(Value::Null));
    }
    let kind = response.error_kind.unwrap_or(ErrorKind::RunFailed);
    Err(ApiError::from_kind(kind, response.message.unwrap_or_default()))
}

fn wrap_result(response: WorkflowResponse, key: &str) -> Result<Json<Value>, ApiError> {
    let mut body = json!({ "status": "success" });
    body[key] = into_result(response)?;
    Ok(Json(body))
}

// GET /api/health — no auth required
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// GET /api/workflows
pub async fn list_workflows(
    _auth: Authenticated,
    State(state): State<Arc<AppState>>,
) -> Json<Value> {
    Json(json!({ "workflows": state.service.list() }))
}

#[derive(Deserialize)]
pub struct RunQuery {
    #[serde(default)]
    pub trace: bool,
}

// POST /api/workflows/{name}/run?trace=true
pub async fn run_workflow(
    _auth: Authenticated,
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(q): Query<RunQuery>,
    ApiJson(fields): ApiJson<Value>,
) -> Response {
    info!(workflow = %name, trace = q.trace, "Workflow run requested");
    let response = state.service.run(&name, fields, q.trace).await;
    let status = response
        .error_kind
        .map(status_for)
        .unwrap_or(StatusCode::OK);
    if !response.is_success() {
        warn!(workflow = %name, status = %status, "Workflow run failed");
    }
    (status, Json(response)).into_response()
}

// POST /x-post/generate
pub async fn generate_x_post(
    _auth: Authenticated,
    State(state): State<Arc<AppState>>,
    ApiJson(input): ApiJson<XPostInput>,
) -> Result<Json<Value>, ApiError> {
    let response = state.service.x_post(input).await?;
    let mut body = serde_json::to_value(response).map_err(ScribeError::from)?;
    body["status"] = json!("success");
    Ok(Json(body))
}

// POST /x-post/ideas
pub async fn x_post_ideas(
    _auth: Authenticated,
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<IdeaRequest>,
) -> Result<Json<Value>, ApiError> {
    let response = state.service.ideas(request).await?;
    Ok(Json(serde_json::to_value(response).map_err(ScribeError::from)?))
}

#[derive(Deserialize)]
pub struct RepurposeRequest {
    pub article_text: String,
}

// POST /repurpose-article
pub async fn repurpose_article(
    _auth: Authenticated,
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<RepurposeRequest>,
) -> Result<Json<Value>, ApiError> {
    let response = state
        .service
        .run("repurpose", json!({ "article_text": req.article_text }), false)
        .await;
    wrap_result(response, "repurposed_content")
}

// POST /generate-blog
pub async fn generate_blog(
    _auth: Authenticated,
    State(state): State<Arc<AppState>>,
    ApiJson(fields): ApiJson<Value>,
) -> Result<Json<Value>, ApiError> {
    let response = state.service.run("blog", fields, false).await;
    wrap_result(response, "generated_blog")
}

/// Thumbnail brief. Accepts the camelCase `channelDescription` used by web clients.
#[derive(Deserialize, Serialize)]
pub struct ImagePromptRequest {
    #[serde(default, alias = "channelDescription")]
    pub channel_description: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub script: String,
    #[serde(default)]
    pub tone: String,
    #[serde(default)]
    pub audience: String,
}

// POST /image-prompt
pub async fn image_prompt(
    _auth: Authenticated,
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<ImagePromptRequest>,
) -> Result<Json<Value>, ApiError> {
    let fields = serde_json::to_value(req).map_err(ScribeError::from)?;
    let response = state.service.run("image_prompt", fields, false).await;
    Ok(Json(into_result(response)?))
}
