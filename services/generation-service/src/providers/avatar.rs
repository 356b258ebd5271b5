use serde::Deserialize;
use serde_json::json;

use crate::models::{GenerateAvatarRequest, JobStatus};
use crate::providers::{require_key, FieldError, ProviderError};

const HEYGEN_API_BASE: &str = "https://api.heygen.com";

// ~$0.08/second, with an assumed fixed 30-second clip. An estimate,
// never reconciled against the provider's actual bill.
const COST_PER_SECOND: f64 = 0.08;
const ASSUMED_DURATION_SECONDS: f64 = 30.0;

const AVATAR_IDS: [&str; 4] = [
    "Anna_public_3_20240108",
    "Tyler_public_incasualsuit_20220721",
    "Daisy_public_inskirt_20220818",
    "Eric_public_pro2_20230608",
];

const DEFAULT_DIMENSION: &str = "16:9";

#[derive(Debug, Clone)]
pub struct ValidAvatarRequest {
    pub text: String,
    pub avatar_id: String,
    pub voice_id: String,
    pub dimension: String,
}

pub struct AvatarSubmit {
    pub video_id: String,
    pub status: JobStatus,
    pub cost: f64,
}

pub struct AvatarPoll {
    pub status: JobStatus,
    pub video_url: Option<String>,
}

fn dimension_pixels(dimension: &str) -> Option<(u32, u32)> {
    match dimension {
        "16:9" => Some((1280, 720)),
        "9:16" => Some((720, 1280)),
        "1:1" => Some((1080, 1080)),
        _ => None,
    }
}

pub fn validate(request: &GenerateAvatarRequest) -> Result<ValidAvatarRequest, ProviderError> {
    let mut errors = Vec::new();

    let text = request.text.as_deref().unwrap_or("").trim().to_string();
    if text.chars().count() < 10 {
        errors.push(FieldError::new("text", "must be at least 10 characters"));
    } else if text.chars().count() > 3000 {
        errors.push(FieldError::new("text", "must be at most 3000 characters"));
    }

    let avatar_id = request.avatar_id.as_deref().unwrap_or("").to_string();
    if !AVATAR_IDS.contains(&avatar_id.as_str()) {
        errors.push(FieldError::new("avatarId", "unknown avatar identifier"));
    }

    let voice_id = request.voice_id.as_deref().unwrap_or("").to_string();
    if voice_id.is_empty() {
        errors.push(FieldError::new("voiceId", "is required"));
    }

    let dimension = request
        .dimension
        .clone()
        .unwrap_or_else(|| DEFAULT_DIMENSION.to_string());
    if dimension_pixels(&dimension).is_none() {
        errors.push(FieldError::new(
            "dimension",
            "must be one of 16:9, 9:16, 1:1",
        ));
    }

    if !errors.is_empty() {
        return Err(ProviderError::validation(errors));
    }

    Ok(ValidAvatarRequest {
        text,
        avatar_id,
        voice_id,
        dimension,
    })
}

pub fn estimate_cost() -> f64 {
    COST_PER_SECOND * ASSUMED_DURATION_SECONDS
}

/// HeyGen reports lowercase statuses; anything unrecognized stays
/// `processing` rather than being treated as terminal.
pub fn normalize_status(native: &str) -> JobStatus {
    match native {
        "pending" => JobStatus::Pending,
        "processing" => JobStatus::Processing,
        "completed" => JobStatus::Completed,
        "failed" => JobStatus::Failed,
        _ => JobStatus::Processing,
    }
}

#[derive(Deserialize)]
struct GenerateEnvelope {
    data: GenerateData,
}

#[derive(Deserialize)]
struct GenerateData {
    video_id: String,
}

#[derive(Deserialize)]
struct StatusEnvelope {
    data: StatusData,
}

#[derive(Deserialize)]
struct StatusData {
    status: String,
    video_url: Option<String>,
}

pub struct AvatarProvider {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl AvatarProvider {
    pub fn from_env(client: reqwest::Client) -> Self {
        Self {
            client,
            api_key: mediaforge_common::env_credential("HEYGEN_API_KEY"),
        }
    }

    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self { client, api_key }
    }

    pub fn ensure_configured(&self) -> Result<(), ProviderError> {
        require_key(&self.api_key, "HEYGEN_API_KEY").map(|_| ())
    }

    pub async fn submit(&self, request: &ValidAvatarRequest) -> Result<AvatarSubmit, ProviderError> {
        let api_key = require_key(&self.api_key, "HEYGEN_API_KEY")?;
        let (width, height) =
            dimension_pixels(&request.dimension).unwrap_or((1280, 720));

        let response = self
            .client
            .post(format!("{HEYGEN_API_BASE}/v2/video/generate"))
            .header("X-Api-Key", api_key)
            .json(&json!({
                "video_inputs": [{
                    "character": {
                        "type": "avatar",
                        "avatar_id": request.avatar_id,
                        "avatar_style": "normal",
                    },
                    "voice": {
                        "type": "text",
                        "input_text": request.text,
                        "voice_id": request.voice_id,
                        "speed": 1.0,
                    },
                    "background": {
                        "type": "color",
                        "value": "#0f172a",
                    },
                }],
                "dimension": { "width": width, "height": height },
                "aspect_ratio": request.dimension,
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

        let envelope: GenerateEnvelope = response
            .json()
            .await
            .map_err(|err| ProviderError::transport(&err))?;

        Ok(AvatarSubmit {
            video_id: envelope.data.video_id,
            status: JobStatus::Pending,
            cost: estimate_cost(),
        })
    }

    pub async fn poll(&self, video_id: &str) -> Result<AvatarPoll, ProviderError> {
        let api_key = require_key(&self.api_key, "HEYGEN_API_KEY")?;

        let response = self
            .client
            .get(format!("{HEYGEN_API_BASE}/v1/video_status.get"))
            .query(&[("video_id", video_id)])
            .header("X-Api-Key", api_key)
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

        let envelope: StatusEnvelope = response
            .json()
            .await
            .map_err(|err| ProviderError::transport(&err))?;

        Ok(AvatarPoll {
            status: normalize_status(&envelope.data.status),
            video_url: envelope.data.video_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_duration_cost_estimate() {
        assert!((estimate_cost() - 2.40).abs() < 1e-9);
    }

    #[test]
    fn lowercase_statuses_map_and_unknowns_stay_processing() {
        assert_eq!(normalize_status("pending"), JobStatus::Pending);
        assert_eq!(normalize_status("completed"), JobStatus::Completed);
        assert_eq!(normalize_status("failed"), JobStatus::Failed);
        assert_eq!(normalize_status("waiting"), JobStatus::Processing);
    }

    #[test]
    fn default_dimension_is_sixteen_nine() {
        let request = GenerateAvatarRequest {
            text: Some("Welcome to our quarterly update.".to_string()),
            avatar_id: Some("Anna_public_3_20240108".to_string()),
            voice_id: Some("21m00Tcm4TlvDq8ikWAM".to_string()),
            dimension: None,
            project_id: None,
        };
        let valid = validate(&request).expect("valid");
        assert_eq!(valid.dimension, "16:9");
        assert_eq!(dimension_pixels(&valid.dimension), Some((1280, 720)));
    }

    #[test]
    fn rejects_unknown_avatar() {
        let request = GenerateAvatarRequest {
            text: Some("Welcome to our quarterly update.".to_string()),
            avatar_id: Some("Bob_private_1".to_string()),
            voice_id: Some("21m00Tcm4TlvDq8ikWAM".to_string()),
            dimension: Some("16:9".to_string()),
            project_id: None,
        };
        match validate(&request).unwrap_err() {
            ProviderError::Validation { details } => {
                assert_eq!(details[0].field, "avatarId");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
