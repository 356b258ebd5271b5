use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::auth::AuthUser;
use crate::models::{
    AvatarPollParams, CreateProjectRequest, GenerateAvatarRequest, GenerateImageRequest,
    GenerateTextRequest, GenerateVideoRequest, GenerateVoiceRequest, VideoPollParams,
};
use crate::service;
use crate::state::AppState;

pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

pub async fn readyz() -> StatusCode {
    StatusCode::OK
}

pub async fn generate_text(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<GenerateTextRequest>,
) -> impl IntoResponse {
    match service::generate_text(&state, &user, payload).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn generate_image(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<GenerateImageRequest>,
) -> impl IntoResponse {
    match service::generate_image(&state, &user, payload).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn generate_voice(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<GenerateVoiceRequest>,
) -> impl IntoResponse {
    match service::generate_voice(&state, &user, payload).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn generate_video(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<GenerateVideoRequest>,
) -> impl IntoResponse {
    match service::generate_video(&state, &user, payload).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn generate_avatar(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<GenerateAvatarRequest>,
) -> impl IntoResponse {
    match service::generate_avatar(&state, &user, payload).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn poll_video(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(params): Query<VideoPollParams>,
) -> impl IntoResponse {
    match service::poll_video(&state, params).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn poll_avatar(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(params): Query<AvatarPollParams>,
) -> impl IntoResponse {
    match service::poll_avatar(&state, params).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn list_projects(State(state): State<AppState>, user: AuthUser) -> impl IntoResponse {
    match service::list_projects(&state, &user).await {
        Ok(projects) => (StatusCode::OK, Json(projects)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn create_project(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateProjectRequest>,
) -> impl IntoResponse {
    match service::create_project(&state, &user, payload).await {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn library(State(state): State<AppState>, user: AuthUser) -> impl IntoResponse {
    match service::library(&state, &user).await {
        Ok(contents) => (StatusCode::OK, Json(contents)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn stats(State(state): State<AppState>, user: AuthUser) -> impl IntoResponse {
    match service::stats(&state, &user).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}
