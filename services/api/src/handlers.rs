//! Axum Handlers for the REST API
//!
//! Each handler relays one presentation-layer action to a learner session
//! and answers with the resulting session view. It uses `utoipa` doc
//! comments to generate OpenAPI documentation.

use axum::{
    body::Bytes,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use describe_core::{
    generative::InlineData,
    session::{SessionError, SessionHandle},
};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    models::{ErrorResponse, SelectTopicPayload, SessionView, SubmitTextPayload, TopicView},
    state::AppState,
};

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    /// The AI backend failed or produced nothing usable.
    BadGateway(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message),
            ApiError::BadGateway(message) => {
                error!("Bad Gateway: {}", message);
                (StatusCode::BAD_GATEWAY, message)
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred.".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { message })).into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        let message = err.to_string();
        match err {
            SessionError::InvalidTransition { .. } | SessionError::Discarded => {
                Self::Conflict(message)
            }
            SessionError::EmptyDescription => Self::BadRequest(message),
            SessionError::Tutor(_) => Self::BadGateway(message),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

async fn session_handle(state: &AppState, id: Uuid) -> Result<Arc<SessionHandle>, ApiError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Session with id '{}' not found", id)))
}

/// List the topics a learner can pick.
#[utoipa::path(
    get,
    path = "/topics",
    responses(
        (status = 200, description = "Topic catalog", body = [TopicView])
    )
)]
pub async fn list_topics(State(state): State<Arc<AppState>>) -> Json<Vec<TopicView>> {
    Json(state.topics.topics().iter().map(TopicView::from).collect())
}

/// Start a new learner session at topic selection.
#[utoipa::path(
    post,
    path = "/sessions",
    responses(
        (status = 201, description = "Session created successfully", body = SessionView)
    )
)]
pub async fn create_session(State(state): State<Arc<AppState>>) -> (StatusCode, Json<SessionView>) {
    let (id, handle) = state.sessions.create().await;
    let live_sessions = state.sessions.count().await;
    info!(session_id = %id, live_sessions, "Session created");
    (StatusCode::CREATED, Json(SessionView::new(id, &handle.snapshot())))
}

/// Get a session's current phase and data.
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    responses(
        (status = 200, description = "Session details", body = SessionView),
        (status = 404, description = "Session not found", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID")
    )
)]
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let handle = session_handle(&state, id).await?;
    Ok(Json(SessionView::new(id, &handle.snapshot())))
}

/// Drop a session and everything it holds.
#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    responses(
        (status = 204, description = "Session deleted"),
        (status = 404, description = "Session not found", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID")
    )
)]
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.sessions.remove(id).await {
        info!(session_id = %id, "Session deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Session with id '{}' not found", id)))
    }
}

/// Pick a topic and generate its picture.
#[utoipa::path(
    post,
    path = "/sessions/{id}/topic",
    request_body = SelectTopicPayload,
    responses(
        (status = 200, description = "Picture ready, session is describing", body = SessionView),
        (status = 400, description = "Missing or malformed body", body = ErrorResponse),
        (status = 404, description = "Session or topic not found", body = ErrorResponse),
        (status = 409, description = "Not at topic selection", body = ErrorResponse),
        (status = 502, description = "Picture could not be generated", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID")
    )
)]
pub async fn select_topic(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Result<Json<SelectTopicPayload>, JsonRejection>,
) -> Result<Json<SessionView>, ApiError> {
    let Json(payload) = payload?;
    let handle = session_handle(&state, id).await?;
    let topic = state
        .topics
        .find(&payload.topic_id)
        .cloned()
        .ok_or_else(|| ApiError::NotFound(format!("Topic '{}' not found", payload.topic_id)))?;

    let session = handle.select_topic(state.tutor.as_ref(), topic).await?;
    Ok(Json(SessionView::new(id, &session)))
}

/// Transcribe a spoken description into the session's draft.
///
/// The body is the raw recording; its `Content-Type` is passed on as the
/// audio MIME type.
#[utoipa::path(
    post,
    path = "/sessions/{id}/audio",
    request_body(content = Vec<u8>, content_type = "audio/webm", description = "Recorded audio"),
    responses(
        (status = 200, description = "Transcript stored as draft", body = SessionView),
        (status = 400, description = "Missing audio or content type", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Not describing", body = ErrorResponse),
        (status = 502, description = "Transcription failed", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID")
    )
)]
pub async fn submit_audio(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SessionView>, ApiError> {
    let handle = session_handle(&state, id).await?;
    let mime_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Content-Type header is required".to_string()))?;
    if body.is_empty() {
        return Err(ApiError::BadRequest("Audio body is empty".to_string()));
    }

    let audio = InlineData::from_bytes(mime_type, &body);
    let session = handle.submit_audio(state.tutor.as_ref(), audio).await?;
    Ok(Json(SessionView::new(id, &session)))
}

/// Submit the written description for grading.
#[utoipa::path(
    post,
    path = "/sessions/{id}/description",
    request_body = SubmitTextPayload,
    responses(
        (status = 200, description = "Feedback ready", body = SessionView),
        (status = 400, description = "Empty description or malformed body", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Not describing", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID")
    )
)]
pub async fn submit_text(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Result<Json<SubmitTextPayload>, JsonRejection>,
) -> Result<Json<SessionView>, ApiError> {
    let Json(payload) = payload?;
    let handle = session_handle(&state, id).await?;
    let session = handle
        .submit_text(state.tutor.as_ref(), &payload.text)
        .await?;
    Ok(Json(SessionView::new(id, &session)))
}

/// Start over from topic selection, discarding all session data.
#[utoipa::path(
    post,
    path = "/sessions/{id}/reset",
    responses(
        (status = 200, description = "Session reset", body = SessionView),
        (status = 404, description = "Session not found", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID")
    )
)]
pub async fn reset_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let handle = session_handle(&state, id).await?;
    let session = handle.reset();
    Ok(Json(SessionView::new(id, &session)))
}

/// Download the generated picture as raw bytes.
#[utoipa::path(
    get,
    path = "/sessions/{id}/image",
    responses(
        (status = 200, description = "Image bytes", content_type = "image/png"),
        (status = 404, description = "Session not found or no image yet", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID")
    )
)]
pub async fn get_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let handle = session_handle(&state, id).await?;
    let session = handle.snapshot();
    let image = session
        .image()
        .ok_or_else(|| ApiError::NotFound("Session has no image yet".to_string()))?;
    let bytes = image
        .to_bytes()
        .map_err(|e| ApiError::InternalServerError(e.into()))?;

    Ok(([(header::CONTENT_TYPE, image.mime_type.clone())], bytes))
}
