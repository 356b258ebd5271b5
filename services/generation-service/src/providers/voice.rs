use serde_json::json;

use crate::models::GenerateVoiceRequest;
use crate::providers::{require_key, FieldError, ProviderError};

const ELEVENLABS_API_BASE: &str = "https://api.elevenlabs.io/v1";
const DEFAULT_MODEL_ID: &str = "eleven_multilingual_v2";

// Creator plan: ~$0.30 per 1000 characters.
const COST_PER_THOUSAND_CHARS: f64 = 0.3;
// Rough speech rate used for the duration estimate.
const CHARS_PER_SECOND: u64 = 150;

/// The provider's fixed voice roster; anything else is rejected before
/// the network call.
const VOICE_IDS: [&str; 8] = [
    "21m00Tcm4TlvDq8ikWAM", // Rachel
    "AZnzlk1XvdvUeBnXmlld", // Domi
    "EXAVITQu4vr4xnSDxMaL", // Bella
    "ErXwobaYiN019PkySvjV", // Antoni
    "MF3mGyEYCl7XYWbV9V6O", // Elli
    "TxGEqnHWrfWFTfGW9XjX", // Josh
    "VR6AewLTigWG4xSOukaG", // Arnold
    "pNInz6obpgDQGcFmaJgB", // Adam
];

#[derive(Debug, Clone)]
pub struct ValidVoiceRequest {
    pub text: String,
    pub voice_id: String,
    pub model_id: String,
}

pub struct VoiceResult {
    pub audio: Vec<u8>,
    pub duration_seconds: u64,
    pub cost: f64,
}

pub fn validate(request: &GenerateVoiceRequest) -> Result<ValidVoiceRequest, ProviderError> {
    let mut errors = Vec::new();

    let text = request.text.as_deref().unwrap_or("").trim().to_string();
    if text.chars().count() < 10 {
        errors.push(FieldError::new("text", "must be at least 10 characters"));
    } else if text.chars().count() > 5000 {
        errors.push(FieldError::new("text", "must be at most 5000 characters"));
    }

    let voice_id = request.voice_id.as_deref().unwrap_or("").to_string();
    if !VOICE_IDS.contains(&voice_id.as_str()) {
        errors.push(FieldError::new("voiceId", "unknown voice identifier"));
    }

    if !errors.is_empty() {
        return Err(ProviderError::validation(errors));
    }

    Ok(ValidVoiceRequest {
        text,
        voice_id,
        model_id: request
            .model_id
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL_ID.to_string()),
    })
}

pub fn estimate_cost(text: &str) -> f64 {
    (text.chars().count() as f64 / 1000.0) * COST_PER_THOUSAND_CHARS
}

pub fn estimate_duration_seconds(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(CHARS_PER_SECOND)
}

pub struct VoiceProvider {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl VoiceProvider {
    pub fn from_env(client: reqwest::Client) -> Self {
        Self {
            client,
            api_key: mediaforge_common::env_credential("ELEVENLABS_API_KEY"),
        }
    }

    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self { client, api_key }
    }

    pub fn ensure_configured(&self) -> Result<(), ProviderError> {
        require_key(&self.api_key, "ELEVENLABS_API_KEY").map(|_| ())
    }

    /// Synchronous modality: the response body is the finished audio.
    pub async fn submit(&self, request: &ValidVoiceRequest) -> Result<VoiceResult, ProviderError> {
        let api_key = require_key(&self.api_key, "ELEVENLABS_API_KEY")?;

        let response = self
            .client
            .post(format!(
                "{ELEVENLABS_API_BASE}/text-to-speech/{}",
                request.voice_id
            ))
            .header("xi-api-key", api_key)
            .header("Accept", "audio/mpeg")
            .json(&json!({
                "text": request.text,
                "model_id": request.model_id,
                "voice_settings": {
                    "stability": 0.5,
                    "similarity_boost": 0.75,
                    "style": 0.0,
                    "use_speaker_boost": true,
                },
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

        let audio = response
            .bytes()
            .await
            .map_err(|err| ProviderError::transport(&err))?
            .to_vec();

        Ok(VoiceResult {
            duration_seconds: estimate_duration_seconds(&request.text),
            cost: estimate_cost(&request.text),
            audio,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn character_rate_cost_formula() {
        let text = "x".repeat(1000);
        assert!((estimate_cost(&text) - 0.3).abs() < 1e-9);
        let short = "x".repeat(500);
        assert!((estimate_cost(&short) - 0.15).abs() < 1e-9);
    }

    #[test]
    fn duration_rounds_up() {
        assert_eq!(estimate_duration_seconds(&"x".repeat(150)), 1);
        assert_eq!(estimate_duration_seconds(&"x".repeat(151)), 2);
        assert_eq!(estimate_duration_seconds(&"x".repeat(10)), 1);
    }

    #[test]
    fn rejects_unknown_voice() {
        let request = GenerateVoiceRequest {
            text: Some("Welcome to the morning briefing.".to_string()),
            voice_id: Some("not-a-voice".to_string()),
            model_id: None,
            project_id: None,
        };
        match validate(&request).unwrap_err() {
            ProviderError::Validation { details } => {
                assert_eq!(details[0].field, "voiceId");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn default_model_applies() {
        let request = GenerateVoiceRequest {
            text: Some("Welcome to the morning briefing.".to_string()),
            voice_id: Some("21m00Tcm4TlvDq8ikWAM".to_string()),
            model_id: None,
            project_id: None,
        };
        let valid = validate(&request).expect("valid");
        assert_eq!(valid.model_id, "eleven_multilingual_v2");
    }
}
