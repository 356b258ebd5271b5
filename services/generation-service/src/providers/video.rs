use serde::Deserialize;
use serde_json::json;

use crate::models::{GenerateVideoRequest, JobStatus};
use crate::providers::{require_key, FieldError, ProviderError};

const RUNWAY_API_BASE: &str = "https://api.dev.runwayml.com/v1";
const RUNWAY_VERSION: &str = "2024-11-06";

// Gen-3/Gen-4 pricing: ~$0.05 per second of output.
const COST_PER_SECOND: f64 = 0.05;

const MODELS: [&str; 2] = ["gen3a_turbo", "gen4_turbo"];
const RATIOS: [&str; 4] = ["1280:720", "720:1280", "1104:832", "832:1104"];
const DURATIONS: [u32; 2] = [5, 10];

#[derive(Debug, Clone)]
pub struct ValidVideoRequest {
    pub prompt: String,
    pub model: String,
    pub ratio: String,
    pub duration: u32,
}

pub struct VideoSubmit {
    pub task_id: String,
    pub status: JobStatus,
    pub cost: f64,
}

pub struct VideoPoll {
    pub status: JobStatus,
    pub video_url: Option<String>,
    pub progress: Option<f64>,
}

pub fn validate(request: &GenerateVideoRequest) -> Result<ValidVideoRequest, ProviderError> {
    let mut errors = Vec::new();

    let prompt = request.prompt.as_deref().unwrap_or("").trim().to_string();
    if prompt.chars().count() < 10 {
        errors.push(FieldError::new("prompt", "must be at least 10 characters"));
    } else if prompt.chars().count() > 2000 {
        errors.push(FieldError::new("prompt", "must be at most 2000 characters"));
    }

    let model = request.model.as_deref().unwrap_or("").to_string();
    if !MODELS.contains(&model.as_str()) {
        errors.push(FieldError::new(
            "model",
            "must be gen3a_turbo or gen4_turbo",
        ));
    }
    let ratio = request.ratio.as_deref().unwrap_or("").to_string();
    if !RATIOS.contains(&ratio.as_str()) {
        errors.push(FieldError::new(
            "ratio",
            "must be one of 1280:720, 720:1280, 1104:832, 832:1104",
        ));
    }
    let duration = request.duration.unwrap_or(0);
    if !DURATIONS.contains(&duration) {
        errors.push(FieldError::new("duration", "must be 5 or 10"));
    }

    if !errors.is_empty() {
        return Err(ProviderError::validation(errors));
    }

    Ok(ValidVideoRequest {
        prompt,
        model,
        ratio,
        duration,
    })
}

pub fn estimate_cost(duration: u32) -> f64 {
    f64::from(duration) * COST_PER_SECOND
}

/// Map the provider's task vocabulary into the shared four-state enum.
/// Unrecognized values stay `processing` so the polling loop never
/// abandons a job over a status string it doesn't know.
pub fn normalize_status(native: &str) -> JobStatus {
    match native {
        "PENDING" => JobStatus::Pending,
        "RUNNING" => JobStatus::Processing,
        "SUCCEEDED" => JobStatus::Completed,
        "FAILED" | "CANCELLED" => JobStatus::Failed,
        _ => JobStatus::Processing,
    }
}

#[derive(Deserialize)]
struct TaskCreated {
    id: String,
}

#[derive(Deserialize)]
struct TaskState {
    status: String,
    output: Option<Vec<String>>,
    progress: Option<f64>,
}

pub struct VideoProvider {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl VideoProvider {
    pub fn from_env(client: reqwest::Client) -> Self {
        Self {
            client,
            api_key: mediaforge_common::env_credential("RUNWAY_API_KEY"),
        }
    }

    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self { client, api_key }
    }

    pub fn ensure_configured(&self) -> Result<(), ProviderError> {
        require_key(&self.api_key, "RUNWAY_API_KEY").map(|_| ())
    }

    /// Queue-based modality: returns the provider task id, not the artifact.
    pub async fn submit(&self, request: &ValidVideoRequest) -> Result<VideoSubmit, ProviderError> {
        let api_key = require_key(&self.api_key, "RUNWAY_API_KEY")?;

        let response = self
            .client
            .post(format!("{RUNWAY_API_BASE}/image_to_video"))
            .bearer_auth(api_key)
            .header("X-Runway-Version", RUNWAY_VERSION)
            .json(&json!({
                "promptText": request.prompt,
                "model": request.model,
                "ratio": request.ratio,
                "duration": request.duration,
            }))
            .send()
            .await
            .map_err(|err| ProviderError::transport(&err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let created: TaskCreated = response
            .json()
            .await
            .map_err(|err| ProviderError::transport(&err))?;

        Ok(VideoSubmit {
            task_id: created.id,
            status: JobStatus::Pending,
            cost: estimate_cost(request.duration),
        })
    }

    pub async fn poll(&self, task_id: &str) -> Result<VideoPoll, ProviderError> {
        let api_key = require_key(&self.api_key, "RUNWAY_API_KEY")?;

        let response = self
            .client
            .get(format!("{RUNWAY_API_BASE}/tasks/{task_id}"))
            .bearer_auth(api_key)
            .header("X-Runway-Version", RUNWAY_VERSION)
            .send()
            .await
            .map_err(|err| ProviderError::transport(&err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let state: TaskState = response
            .json()
            .await
            .map_err(|err| ProviderError::transport(&err))?;

        Ok(VideoPoll {
            status: normalize_status(&state.status),
            video_url: state.output.and_then(|urls| urls.into_iter().next()),
            progress: state.progress,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_rate_cost_formula() {
        assert!((estimate_cost(10) - 0.50).abs() < 1e-9);
        assert!((estimate_cost(5) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn native_statuses_map_into_the_shared_enum() {
        assert_eq!(normalize_status("PENDING"), JobStatus::Pending);
        assert_eq!(normalize_status("RUNNING"), JobStatus::Processing);
        assert_eq!(normalize_status("SUCCEEDED"), JobStatus::Completed);
        assert_eq!(normalize_status("FAILED"), JobStatus::Failed);
        assert_eq!(normalize_status("CANCELLED"), JobStatus::Failed);
    }

    #[test]
    fn unknown_native_status_is_never_terminal() {
        assert_eq!(normalize_status("THROTTLED"), JobStatus::Processing);
        assert_eq!(normalize_status(""), JobStatus::Processing);
    }

    #[test]
    fn rejects_unsupported_duration() {
        let request = GenerateVideoRequest {
            prompt: Some("A drone over mountains at sunrise".to_string()),
            model: Some("gen4_turbo".to_string()),
            ratio: Some("1280:720".to_string()),
            duration: Some(7),
            project_id: None,
        };
        match validate(&request).unwrap_err() {
            ProviderError::Validation { details } => {
                assert_eq!(details[0].field, "duration");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
