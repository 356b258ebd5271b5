use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::handlers::{
    create_project, generate_avatar, generate_image, generate_text, generate_video,
    generate_voice, healthz, library, list_projects, poll_avatar, poll_video, readyz, stats,
};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/v1/generate/text", post(generate_text))
        .route("/v1/generate/image", post(generate_image))
        .route("/v1/generate/voice", post(generate_voice))
        .route("/v1/generate/video", post(generate_video))
        .route("/v1/generate/video/poll", get(poll_video))
        .route("/v1/generate/avatar", post(generate_avatar))
        .route("/v1/generate/avatar/poll", get(poll_avatar))
        .route("/v1/projects", get(list_projects))
        .route("/v1/projects", post(create_project))
        .route("/v1/library", get(library))
        .route("/v1/stats", get(stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
