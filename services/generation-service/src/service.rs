use axum::http::StatusCode;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::Value;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db;
use crate::models::{
    AvatarGenerateResponse, AvatarPollParams, ContentSummary, CreateProjectRequest, ErrorResponse,
    GenerateAvatarRequest, GenerateImageRequest, GenerateTextRequest, GenerateVideoRequest,
    GenerateVoiceRequest, GenerationKind, GenerationMeta, ImageGenerateResponse, JobStatus,
    PollResponse, ProjectResponse, StatsResponse, TextGenerateResponse, VideoGenerateResponse,
    VideoPollParams, VoiceGenerateResponse,
};
use crate::providers::{avatar, image, text, video, voice, FieldError, ProviderError};
use crate::state::AppState;

const LIBRARY_LIMIT: i64 = 50;
const RECENT_LIMIT: i64 = 5;
const TITLE_SNIPPET_CHARS: usize = 50;

pub struct ServiceError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ServiceError {
    fn new(status: StatusCode, code: &'static str, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: error.into(),
                code,
                details: None,
            },
        }
    }

    fn validation(details: Vec<FieldError>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorResponse {
                error: "Invalid request".to_string(),
                code: "VALIDATION_ERROR",
                details: Some(serde_json::to_value(&details).unwrap_or(Value::Null)),
            },
        }
    }

    fn missing_field(field: &'static str) -> Self {
        Self::validation(vec![FieldError::new(field, "is required")])
    }

    fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "Internal server error",
        )
    }
}

/// Map an adapter failure onto the wire taxonomy. Raw upstream detail is
/// logged here and never echoed to the caller.
fn classify_submit(err: ProviderError, kind: GenerationKind) -> ServiceError {
    match err {
        ProviderError::Config { message } => {
            ServiceError::new(StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR", message)
        }
        ProviderError::Validation { details } => ServiceError::validation(details),
        ProviderError::Upstream { status, body } => {
            tracing::error!(
                provider = kind.as_str(),
                status,
                body = %body,
                "provider call failed"
            );
            match (kind, status) {
                (GenerationKind::Text, 429) => ServiceError::new(
                    StatusCode::TOO_MANY_REQUESTS,
                    "RATE_LIMIT",
                    "Provider rate limit reached. Please try again shortly.",
                ),
                (GenerationKind::Image, 400) if body.contains("content_policy") => {
                    ServiceError::new(
                        StatusCode::BAD_REQUEST,
                        "CONTENT_POLICY",
                        "The prompt was rejected by the provider's content policy.",
                    )
                }
                _ => ServiceError::internal(),
            }
        }
        ProviderError::Transport { message } => {
            tracing::error!(provider = kind.as_str(), error = %message, "provider unreachable");
            ServiceError::internal()
        }
    }
}

fn classify_poll(err: ProviderError, kind: GenerationKind) -> ServiceError {
    match err {
        ProviderError::Config { message } => {
            ServiceError::new(StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR", message)
        }
        ProviderError::Validation { details } => ServiceError::validation(details),
        ProviderError::Upstream { status, body } => {
            tracing::error!(
                provider = kind.as_str(),
                status,
                body = %body,
                "provider poll failed"
            );
            if status == 404 {
                ServiceError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Provider job not found",
                )
            } else {
                ServiceError::internal()
            }
        }
        ProviderError::Transport { message } => {
            tracing::error!(provider = kind.as_str(), error = %message, "provider unreachable");
            ServiceError::internal()
        }
    }
}

fn db_internal(context: &'static str, err: String) -> ServiceError {
    tracing::error!(context, error = %err, "database operation failed");
    ServiceError::internal()
}

/// First characters of the prompt become the library title.
fn derive_title(prefix: &str, prompt: &str) -> String {
    let snippet: String = prompt.chars().take(TITLE_SNIPPET_CHARS).collect();
    if prompt.chars().count() > TITLE_SNIPPET_CHARS {
        format!("{prefix} - {snippet}...")
    } else {
        format!("{prefix} - {snippet}")
    }
}

/// Owner row upkeep is best-effort: a failure is logged and the
/// generation proceeds.
async fn upsert_owner(db: &tokio_postgres::Client, user: &AuthUser) {
    if let Err(err) = db::upsert_user(db, &user.id, &user.email, user.name.as_deref()).await {
        tracing::warn!(user = %user.id, error = %err, "owner upsert failed");
    }
}

async fn create_content(
    state: &AppState,
    user: &AuthUser,
    title: &str,
    content_type: &str,
    project_id: &Option<Uuid>,
) -> Result<Uuid, ServiceError> {
    let db = state.db.lock().await;
    upsert_owner(&db, user).await;
    let content_id = Uuid::new_v4();
    db::insert_content(&*db, &content_id, title, content_type, &user.id, project_id)
        .await
        .map_err(|err| db_internal("insert content", err))?;
    Ok(content_id)
}

#[allow(clippy::too_many_arguments)]
async fn store_generation(
    state: &AppState,
    generation_id: &Uuid,
    kind: GenerationKind,
    prompt: &str,
    result: &str,
    meta: &GenerationMeta,
    cost: f64,
    content_id: &Uuid,
) -> Result<(), ServiceError> {
    let metadata = serde_json::to_value(meta).map_err(|err| {
        tracing::error!(error = %err, "metadata serialization failed");
        ServiceError::internal()
    })?;
    let db = state.db.lock().await;
    db::insert_generation(
        &*db,
        generation_id,
        kind.as_str(),
        prompt,
        result,
        &metadata,
        cost,
        content_id,
    )
    .await
    .map_err(|err| db_internal("insert generation", err))
}

pub async fn generate_text(
    state: &AppState,
    user: &AuthUser,
    request: GenerateTextRequest,
) -> Result<TextGenerateResponse, ServiceError> {
    let valid =
        text::validate(&request).map_err(|err| classify_submit(err, GenerationKind::Text))?;
    state
        .providers
        .text
        .ensure_configured()
        .map_err(|err| classify_submit(err, GenerationKind::Text))?;

    // Reuse the caller's content row when one is named, otherwise open a
    // fresh draft. Either way the row exists before the provider call.
    let content_id = match request.content_id {
        Some(existing) => {
            let db = state.db.lock().await;
            upsert_owner(&db, user).await;
            let owned = db::content_owned_by(&*db, &existing, &user.id)
                .await
                .map_err(|err| db_internal("content lookup", err))?;
            if !owned {
                return Err(ServiceError::validation(vec![FieldError::new(
                    "contentId",
                    "unknown content identifier",
                )]));
            }
            existing
        }
        None => {
            let title = derive_title(valid.content_type.as_str(), &valid.prompt);
            create_content(
                state,
                user,
                &title,
                valid.content_type.as_str(),
                &request.project_id,
            )
            .await?
        }
    };

    let result = state
        .providers
        .text
        .submit(&valid)
        .await
        .map_err(|err| classify_submit(err, GenerationKind::Text))?;

    let generation_id = Uuid::new_v4();
    let meta = GenerationMeta::Text {
        content_type: valid.content_type.as_str().to_string(),
        tone: valid.tone.as_str().to_string(),
        length: valid.length.as_str().to_string(),
        tokens_used: result.tokens_used,
        model: state.providers.text.model().to_string(),
    };
    store_generation(
        state,
        &generation_id,
        GenerationKind::Text,
        &valid.prompt,
        &result.text,
        &meta,
        result.cost,
        &content_id,
    )
    .await?;

    Ok(TextGenerateResponse {
        generation_id,
        content_id,
        result: result.text,
        tokens_used: result.tokens_used,
        cost: result.cost,
    })
}

pub async fn generate_image(
    state: &AppState,
    user: &AuthUser,
    request: GenerateImageRequest,
) -> Result<ImageGenerateResponse, ServiceError> {
    let valid =
        image::validate(&request).map_err(|err| classify_submit(err, GenerationKind::Image))?;
    state
        .providers
        .image
        .ensure_configured()
        .map_err(|err| classify_submit(err, GenerationKind::Image))?;

    let title = derive_title("Image", &valid.prompt);
    let content_id = create_content(state, user, &title, "POST", &request.project_id).await?;

    let result = state
        .providers
        .image
        .submit(&valid)
        .await
        .map_err(|err| classify_submit(err, GenerationKind::Image))?;

    let generation_id = Uuid::new_v4();
    let meta = GenerationMeta::Image {
        size: valid.size.as_str().to_string(),
        quality: valid.quality.as_str().to_string(),
        style: valid.style.as_str().to_string(),
        revised_prompt: result.revised_prompt.clone(),
    };
    store_generation(
        state,
        &generation_id,
        GenerationKind::Image,
        &valid.prompt,
        &result.image_url,
        &meta,
        result.cost,
        &content_id,
    )
    .await?;

    Ok(ImageGenerateResponse {
        generation_id,
        content_id,
        image_url: result.image_url,
        revised_prompt: result.revised_prompt,
        cost: result.cost,
    })
}

pub async fn generate_voice(
    state: &AppState,
    user: &AuthUser,
    request: GenerateVoiceRequest,
) -> Result<VoiceGenerateResponse, ServiceError> {
    let valid =
        voice::validate(&request).map_err(|err| classify_submit(err, GenerationKind::Voice))?;
    state
        .providers
        .voice
        .ensure_configured()
        .map_err(|err| classify_submit(err, GenerationKind::Voice))?;

    let title = derive_title("Voice", &valid.text);
    let content_id = create_content(state, user, &title, "POST", &request.project_id).await?;

    let result = state
        .providers
        .voice
        .submit(&valid)
        .await
        .map_err(|err| classify_submit(err, GenerationKind::Voice))?;

    let audio_base64 = BASE64.encode(&result.audio);

    // Prefer the blob store; if it's unconfigured or the upload fails,
    // persist the clip inline so the generation is never lost.
    let (stored_result, blob_stored) = match &state.storage {
        Some(storage) => match storage.put_audio(result.audio.clone()).await {
            Ok(url) => (url, true),
            Err(err) => {
                tracing::warn!(error = %err, "audio upload failed, storing inline");
                (format!("data:audio/mpeg;base64,{audio_base64}"), false)
            }
        },
        None => (format!("data:audio/mpeg;base64,{audio_base64}"), false),
    };

    let generation_id = Uuid::new_v4();
    let meta = GenerationMeta::Voice {
        voice_id: valid.voice_id.clone(),
        model_id: valid.model_id.clone(),
        duration_seconds: result.duration_seconds,
        blob_stored,
    };
    store_generation(
        state,
        &generation_id,
        GenerationKind::Voice,
        &valid.text,
        &stored_result,
        &meta,
        result.cost,
        &content_id,
    )
    .await?;

    Ok(VoiceGenerateResponse {
        generation_id,
        content_id,
        audio_base64,
        duration_seconds: result.duration_seconds,
        cost: result.cost,
    })
}

pub async fn generate_video(
    state: &AppState,
    user: &AuthUser,
    request: GenerateVideoRequest,
) -> Result<VideoGenerateResponse, ServiceError> {
    let valid =
        video::validate(&request).map_err(|err| classify_submit(err, GenerationKind::Video))?;
    state
        .providers
        .video
        .ensure_configured()
        .map_err(|err| classify_submit(err, GenerationKind::Video))?;

    let title = derive_title("Video", &valid.prompt);
    let content_id = create_content(state, user, &title, "VIDEO", &request.project_id).await?;

    let submitted = state
        .providers
        .video
        .submit(&valid)
        .await
        .map_err(|err| classify_submit(err, GenerationKind::Video))?;

    let generation_id = Uuid::new_v4();
    let meta = GenerationMeta::Video {
        model: valid.model.clone(),
        ratio: valid.ratio.clone(),
        duration: valid.duration,
        task_id: submitted.task_id.clone(),
        status: submitted.status,
        video_url: None,
    };
    store_generation(
        state,
        &generation_id,
        GenerationKind::Video,
        &valid.prompt,
        "",
        &meta,
        submitted.cost,
        &content_id,
    )
    .await?;

    Ok(VideoGenerateResponse {
        generation_id,
        content_id,
        task_id: submitted.task_id,
        status: submitted.status,
        cost: submitted.cost,
    })
}

pub async fn generate_avatar(
    state: &AppState,
    user: &AuthUser,
    request: GenerateAvatarRequest,
) -> Result<AvatarGenerateResponse, ServiceError> {
    let valid =
        avatar::validate(&request).map_err(|err| classify_submit(err, GenerationKind::Avatar))?;
    state
        .providers
        .avatar
        .ensure_configured()
        .map_err(|err| classify_submit(err, GenerationKind::Avatar))?;

    let title = derive_title("Avatar", &valid.text);
    let content_id = create_content(state, user, &title, "VIDEO", &request.project_id).await?;

    let submitted = state
        .providers
        .avatar
        .submit(&valid)
        .await
        .map_err(|err| classify_submit(err, GenerationKind::Avatar))?;

    let generation_id = Uuid::new_v4();
    let meta = GenerationMeta::Avatar {
        avatar_id: valid.avatar_id.clone(),
        voice_id: valid.voice_id.clone(),
        dimension: valid.dimension.clone(),
        video_id: submitted.video_id.clone(),
        status: submitted.status,
        video_url: None,
    };
    store_generation(
        state,
        &generation_id,
        GenerationKind::Avatar,
        &valid.text,
        "",
        &meta,
        submitted.cost,
        &content_id,
    )
    .await?;

    Ok(AvatarGenerateResponse {
        generation_id,
        content_id,
        video_id: submitted.video_id,
        status: submitted.status,
        cost: submitted.cost,
    })
}

pub async fn poll_video(
    state: &AppState,
    params: VideoPollParams,
) -> Result<PollResponse, ServiceError> {
    let task_id = params
        .task_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ServiceError::missing_field("taskId"))?;

    let poll = state
        .providers
        .video
        .poll(&task_id)
        .await
        .map_err(|err| classify_poll(err, GenerationKind::Video))?;

    if poll.status == JobStatus::Completed {
        if let (Some(url), Some(generation_id)) = (&poll.video_url, params.generation_id) {
            reconcile_video(state, &generation_id, url).await?;
        }
    }

    Ok(PollResponse {
        status: poll.status,
        video_url: poll.video_url,
        progress: poll.progress,
    })
}

pub async fn poll_avatar(
    state: &AppState,
    params: AvatarPollParams,
) -> Result<PollResponse, ServiceError> {
    let video_id = params
        .video_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ServiceError::missing_field("videoId"))?;

    let poll = state
        .providers
        .avatar
        .poll(&video_id)
        .await
        .map_err(|err| classify_poll(err, GenerationKind::Avatar))?;

    if poll.status == JobStatus::Completed {
        if let (Some(url), Some(generation_id)) = (&poll.video_url, params.generation_id) {
            reconcile_avatar(state, &generation_id, url).await?;
        }
    }

    Ok(PollResponse {
        status: poll.status,
        video_url: poll.video_url,
        progress: None,
    })
}

/// Write the finished artifact URL back into the generation row. Rows
/// with unexpected metadata shapes are logged and left untouched.
async fn reconcile_video(
    state: &AppState,
    generation_id: &Uuid,
    url: &str,
) -> Result<(), ServiceError> {
    let db = state.db.lock().await;
    let stored = db::generation_metadata(&*db, generation_id)
        .await
        .map_err(|err| db_internal("generation lookup", err))?;
    let Some(value) = stored else {
        tracing::warn!(generation = %generation_id, "unknown generation in poll");
        return Ok(());
    };
    match serde_json::from_value::<GenerationMeta>(value) {
        Ok(GenerationMeta::Video {
            model,
            ratio,
            duration,
            task_id,
            ..
        }) => {
            let meta = GenerationMeta::Video {
                model,
                ratio,
                duration,
                task_id,
                status: JobStatus::Completed,
                video_url: Some(url.to_string()),
            };
            let metadata = serde_json::to_value(&meta).map_err(|err| {
                tracing::error!(error = %err, "metadata serialization failed");
                ServiceError::internal()
            })?;
            db::update_generation_result(&*db, generation_id, url, &metadata)
                .await
                .map_err(|err| db_internal("update generation", err))
        }
        _ => {
            tracing::warn!(generation = %generation_id, "metadata shape mismatch in poll");
            Ok(())
        }
    }
}

async fn reconcile_avatar(
    state: &AppState,
    generation_id: &Uuid,
    url: &str,
) -> Result<(), ServiceError> {
    let db = state.db.lock().await;
    let stored = db::generation_metadata(&*db, generation_id)
        .await
        .map_err(|err| db_internal("generation lookup", err))?;
    let Some(value) = stored else {
        tracing::warn!(generation = %generation_id, "unknown generation in poll");
        return Ok(());
    };
    match serde_json::from_value::<GenerationMeta>(value) {
        Ok(GenerationMeta::Avatar {
            avatar_id,
            voice_id,
            dimension,
            video_id,
            ..
        }) => {
            let meta = GenerationMeta::Avatar {
                avatar_id,
                voice_id,
                dimension,
                video_id,
                status: JobStatus::Completed,
                video_url: Some(url.to_string()),
            };
            let metadata = serde_json::to_value(&meta).map_err(|err| {
                tracing::error!(error = %err, "metadata serialization failed");
                ServiceError::internal()
            })?;
            db::update_generation_result(&*db, generation_id, url, &metadata)
                .await
                .map_err(|err| db_internal("update generation", err))
        }
        _ => {
            tracing::warn!(generation = %generation_id, "metadata shape mismatch in poll");
            Ok(())
        }
    }
}

pub async fn list_projects(
    state: &AppState,
    user: &AuthUser,
) -> Result<Vec<ProjectResponse>, ServiceError> {
    let db = state.db.lock().await;
    db::list_projects(&*db, &user.id)
        .await
        .map_err(|err| db_internal("list projects", err))
}

pub async fn create_project(
    state: &AppState,
    user: &AuthUser,
    request: CreateProjectRequest,
) -> Result<ProjectResponse, ServiceError> {
    let name = request.name.as_deref().unwrap_or("").trim().to_string();
    if name.is_empty() || name.chars().count() > 100 {
        return Err(ServiceError::validation(vec![FieldError::new(
            "name",
            "must be between 1 and 100 characters",
        )]));
    }
    let db = state.db.lock().await;
    upsert_owner(&db, user).await;
    db::insert_project(&*db, &Uuid::new_v4(), &name, &request.description, &user.id)
        .await
        .map_err(|err| db_internal("insert project", err))
}

pub async fn library(
    state: &AppState,
    user: &AuthUser,
) -> Result<Vec<ContentSummary>, ServiceError> {
    let db = state.db.lock().await;
    db::library_contents(&*db, &user.id, LIBRARY_LIMIT)
        .await
        .map_err(|err| db_internal("library query", err))
}

pub async fn stats(state: &AppState, user: &AuthUser) -> Result<StatsResponse, ServiceError> {
    let db = state.db.lock().await;
    let total_content = db::count_contents(&*db, &user.id)
        .await
        .map_err(|err| db_internal("content count", err))?;
    let total_projects = db::count_projects(&*db, &user.id)
        .await
        .map_err(|err| db_internal("project count", err))?;
    let total_tokens_used = db::sum_text_tokens(&*db, &user.id)
        .await
        .map_err(|err| db_internal("token sum", err))?;
    let recent_content = db::library_contents(&*db, &user.id, RECENT_LIMIT)
        .await
        .map_err(|err| db_internal("recent content", err))?;
    Ok(StatsResponse {
        total_content,
        total_tokens_used,
        total_projects,
        recent_content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_truncated_at_fifty_characters() {
        let long = "a".repeat(80);
        let title = derive_title("POST", &long);
        assert_eq!(title, format!("POST - {}...", "a".repeat(50)));

        let short = derive_title("Image", "sunset over the bay");
        assert_eq!(short, "Image - sunset over the bay");
    }

    #[test]
    fn config_errors_surface_verbatim() {
        let err = classify_submit(
            ProviderError::Config {
                message: "OPENAI_API_KEY is not configured.".to_string(),
            },
            GenerationKind::Text,
        );
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body.code, "CONFIG_ERROR");
        assert!(err.body.error.contains("OPENAI_API_KEY"));
    }

    #[test]
    fn text_rate_limits_map_to_429() {
        let err = classify_submit(
            ProviderError::Upstream {
                status: 429,
                body: "rate limited".to_string(),
            },
            GenerationKind::Text,
        );
        assert_eq!(err.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.body.code, "RATE_LIMIT");
    }

    #[test]
    fn image_policy_rejections_map_to_400() {
        let err = classify_submit(
            ProviderError::Upstream {
                status: 400,
                body: r#"{"error":{"code":"content_policy_violation"}}"#.to_string(),
            },
            GenerationKind::Image,
        );
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.body.code, "CONTENT_POLICY");
    }

    #[test]
    fn other_upstream_failures_are_opaque() {
        let err = classify_submit(
            ProviderError::Upstream {
                status: 500,
                body: "secret upstream detail".to_string(),
            },
            GenerationKind::Image,
        );
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body.code, "INTERNAL_ERROR");
        assert!(!err.body.error.contains("secret"));
    }

    #[test]
    fn vanished_provider_job_is_reported() {
        let err = classify_poll(
            ProviderError::Upstream {
                status: 404,
                body: "not found".to_string(),
            },
            GenerationKind::Video,
        );
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body.error, "Provider job not found");
    }
}
