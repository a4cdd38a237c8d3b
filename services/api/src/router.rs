//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API and its OpenAPI documentation.

use crate::{
    handlers,
    models::{
        ErrorResponse, ImageView, SelectTopicPayload, SessionView, SubmitTextPayload, TopicView,
    },
    state::AppState,
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::list_topics,
        handlers::create_session,
        handlers::get_session,
        handlers::delete_session,
        handlers::select_topic,
        handlers::submit_audio,
        handlers::submit_text,
        handlers::reset_session,
        handlers::get_image,
    ),
    components(
        schemas(
            TopicView,
            ImageView,
            SessionView,
            SelectTopicPayload,
            SubmitTextPayload,
            ErrorResponse
        )
    ),
    tags(
        (
            name = "Describe API",
            description = "Picture-description practice sessions for Spanish learners"
        )
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/topics", get(handlers::list_topics))
        .route("/sessions", post(handlers::create_session))
        .route(
            "/sessions/{id}",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route("/sessions/{id}/topic", post(handlers::select_topic))
        .route("/sessions/{id}/audio", post(handlers::submit_audio))
        .route("/sessions/{id}/description", post(handlers::submit_text))
        .route("/sessions/{id}/reset", post(handlers::reset_session))
        .route("/sessions/{id}/image", get(handlers::get_image))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
