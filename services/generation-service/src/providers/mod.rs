pub mod avatar;
pub mod image;
pub mod text;
pub mod video;
pub mod voice;

use serde::Serialize;

pub use avatar::AvatarProvider;
pub use image::ImageProvider;
pub use text::TextProvider;
pub use video::VideoProvider;
pub use voice::VoiceProvider;

/// Field-level validation detail surfaced to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Adapter-level failure. Classification into the wire taxonomy happens
/// at the service boundary; raw upstream detail is logged there, never
/// echoed to the caller.
#[derive(Debug)]
pub enum ProviderError {
    /// Missing or placeholder credential. Operator-fixable.
    Config { message: String },
    /// Out-of-range input; no network call was attempted.
    Validation { details: Vec<FieldError> },
    /// Non-2xx upstream response with its status and raw body.
    Upstream { status: u16, body: String },
    /// Request never produced a structured response.
    Transport { message: String },
}

impl ProviderError {
    pub fn config(message: impl Into<String>) -> Self {
        ProviderError::Config {
            message: message.into(),
        }
    }

    pub fn validation(details: Vec<FieldError>) -> Self {
        ProviderError::Validation { details }
    }

    pub fn transport(err: &reqwest::Error) -> Self {
        ProviderError::Transport {
            message: err.to_string(),
        }
    }
}

/// Pull the credential out of an adapter, failing fast with an
/// actionable message before any network traffic.
pub(crate) fn require_key<'a>(key: &'a Option<String>, env_var: &str) -> Result<&'a str, ProviderError> {
    key.as_deref().ok_or_else(|| {
        ProviderError::config(format!(
            "{env_var} is not configured. Add a valid key to the service environment."
        ))
    })
}

/// One adapter per modality, each holding the shared HTTP client and
/// its own validated credential. Constructed once at startup and
/// injected through AppState.
pub struct ProviderSet {
    pub text: TextProvider,
    pub image: ImageProvider,
    pub voice: VoiceProvider,
    pub video: VideoProvider,
    pub avatar: AvatarProvider,
}

impl ProviderSet {
    pub fn from_env(client: reqwest::Client) -> Self {
        Self {
            text: TextProvider::from_env(client.clone()),
            image: ImageProvider::from_env(client.clone()),
            voice: VoiceProvider::from_env(client.clone()),
            video: VideoProvider::from_env(client.clone()),
            avatar: AvatarProvider::from_env(client),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_key_reports_the_env_var() {
        let missing: Option<String> = None;
        match require_key(&missing, "RUNWAY_API_KEY") {
            Err(ProviderError::Config { message }) => {
                assert!(message.contains("RUNWAY_API_KEY"));
            }
            other => panic!("expected config error, got {other:?}"),
        }

        let present = Some("key-123".to_string());
        assert_eq!(require_key(&present, "RUNWAY_API_KEY").unwrap(), "key-123");
    }
}
