use serde::Deserialize;
use serde_json::json;

use crate::models::GenerateImageRequest;
use crate::providers::{require_key, FieldError, ProviderError};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const MODEL: &str = "dall-e-3";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSize {
    Square,
    Landscape,
    Portrait,
}

impl ImageSize {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "1024x1024" => Some(ImageSize::Square),
            "1792x1024" => Some(ImageSize::Landscape),
            "1024x1792" => Some(ImageSize::Portrait),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSize::Square => "1024x1024",
            ImageSize::Landscape => "1792x1024",
            ImageSize::Portrait => "1024x1792",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageQuality {
    Standard,
    Hd,
}

impl ImageQuality {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "standard" => Some(ImageQuality::Standard),
            "hd" => Some(ImageQuality::Hd),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageQuality::Standard => "standard",
            ImageQuality::Hd => "hd",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStyle {
    Vivid,
    Natural,
}

impl ImageStyle {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "vivid" => Some(ImageStyle::Vivid),
            "natural" => Some(ImageStyle::Natural),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageStyle::Vivid => "vivid",
            ImageStyle::Natural => "natural",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidImageRequest {
    pub prompt: String,
    pub size: ImageSize,
    pub quality: ImageQuality,
    pub style: ImageStyle,
}

pub struct ImageResult {
    pub image_url: String,
    pub revised_prompt: String,
    pub cost: f64,
}

pub fn validate(request: &GenerateImageRequest) -> Result<ValidImageRequest, ProviderError> {
    let mut errors = Vec::new();

    let prompt = request.prompt.as_deref().unwrap_or("").trim().to_string();
    if prompt.chars().count() < 5 {
        errors.push(FieldError::new("prompt", "must be at least 5 characters"));
    } else if prompt.chars().count() > 4000 {
        errors.push(FieldError::new("prompt", "must be at most 4000 characters"));
    }

    let size = match request.size.as_deref().and_then(ImageSize::parse) {
        Some(size) => size,
        None => {
            errors.push(FieldError::new(
                "size",
                "must be one of 1024x1024, 1792x1024, 1024x1792",
            ));
            ImageSize::Square
        }
    };
    let quality = match request.quality.as_deref().and_then(ImageQuality::parse) {
        Some(quality) => quality,
        None => {
            errors.push(FieldError::new("quality", "must be standard or hd"));
            ImageQuality::Standard
        }
    };
    let style = match request.style.as_deref().and_then(ImageStyle::parse) {
        Some(style) => style,
        None => {
            errors.push(FieldError::new("style", "must be vivid or natural"));
            ImageStyle::Vivid
        }
    };

    if !errors.is_empty() {
        return Err(ProviderError::validation(errors));
    }

    Ok(ValidImageRequest {
        prompt,
        size,
        quality,
        style,
    })
}

/// DALL-E 3 price table keyed by (quality, size).
pub fn estimate_cost(quality: ImageQuality, size: ImageSize) -> f64 {
    match (quality, size) {
        (ImageQuality::Standard, ImageSize::Square) => 0.04,
        (ImageQuality::Standard, ImageSize::Landscape) => 0.08,
        (ImageQuality::Standard, ImageSize::Portrait) => 0.08,
        (ImageQuality::Hd, ImageSize::Square) => 0.08,
        (ImageQuality::Hd, ImageSize::Landscape) => 0.12,
        (ImageQuality::Hd, ImageSize::Portrait) => 0.12,
    }
}

#[derive(Deserialize)]
struct ImagesResponse {
    data: Option<Vec<ImageDatum>>,
}

#[derive(Deserialize)]
struct ImageDatum {
    url: Option<String>,
    revised_prompt: Option<String>,
}

pub struct ImageProvider {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl ImageProvider {
    pub fn from_env(client: reqwest::Client) -> Self {
        Self {
            client,
            api_key: mediaforge_common::env_credential("OPENAI_API_KEY"),
        }
    }

    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self { client, api_key }
    }

    pub fn ensure_configured(&self) -> Result<(), ProviderError> {
        require_key(&self.api_key, "OPENAI_API_KEY").map(|_| ())
    }

    pub async fn submit(&self, request: &ValidImageRequest) -> Result<ImageResult, ProviderError> {
        let api_key = require_key(&self.api_key, "OPENAI_API_KEY")?;

        let response = self
            .client
            .post(format!("{OPENAI_API_BASE}/images/generations"))
            .bearer_auth(api_key)
            .json(&json!({
                "model": MODEL,
                "prompt": request.prompt,
                "size": request.size.as_str(),
                "quality": request.quality.as_str(),
                "style": request.style.as_str(),
                "n": 1,
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

        let body: ImagesResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::transport(&err))?;
        let image = body.data.unwrap_or_default().into_iter().next();
        let image_url = match image.as_ref().and_then(|datum| datum.url.clone()) {
            Some(url) => url,
            None => {
                return Err(ProviderError::Upstream {
                    status: status.as_u16(),
                    body: "no image URL in provider response".to_string(),
                })
            }
        };
        let revised_prompt = image
            .and_then(|datum| datum.revised_prompt)
            .unwrap_or_else(|| request.prompt.clone());

        Ok(ImageResult {
            image_url,
            revised_prompt,
            cost: estimate_cost(request.quality, request.size),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_table_matches_quality_and_size() {
        assert_eq!(estimate_cost(ImageQuality::Standard, ImageSize::Square), 0.04);
        assert_eq!(estimate_cost(ImageQuality::Standard, ImageSize::Portrait), 0.08);
        assert_eq!(estimate_cost(ImageQuality::Hd, ImageSize::Square), 0.08);
        assert_eq!(estimate_cost(ImageQuality::Hd, ImageSize::Landscape), 0.12);
    }

    #[test]
    fn rejects_out_of_range_size() {
        let request = GenerateImageRequest {
            prompt: Some("A watercolor skyline at dusk".to_string()),
            size: Some("512x512".to_string()),
            quality: Some("hd".to_string()),
            style: Some("vivid".to_string()),
            project_id: None,
        };
        match validate(&request).unwrap_err() {
            ProviderError::Validation { details } => {
                assert_eq!(details[0].field, "size");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
