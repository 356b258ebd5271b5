use serde::Deserialize;
use serde_json::json;

use crate::models::{ContentType, GenerateTextRequest, TextLength, Tone};
use crate::providers::{require_key, FieldError, ProviderError};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const MODEL: &str = "gpt-4o";

// GPT-4o pricing (approximate): $5/1M input, $15/1M output.
const INPUT_COST_PER_TOKEN: f64 = 5.0 / 1_000_000.0;
const OUTPUT_COST_PER_TOKEN: f64 = 15.0 / 1_000_000.0;

/// A text request with every field parsed into its closed enum.
#[derive(Debug, Clone)]
pub struct ValidTextRequest {
    pub prompt: String,
    pub content_type: ContentType,
    pub tone: Tone,
    pub length: TextLength,
}

pub struct TextResult {
    pub text: String,
    pub tokens_used: u64,
    pub cost: f64,
}

pub fn validate(request: &GenerateTextRequest) -> Result<ValidTextRequest, ProviderError> {
    let mut errors = Vec::new();

    let prompt = request.prompt.as_deref().unwrap_or("").trim().to_string();
    if prompt.chars().count() < 10 {
        errors.push(FieldError::new("prompt", "must be at least 10 characters"));
    } else if prompt.chars().count() > 2000 {
        errors.push(FieldError::new("prompt", "must be at most 2000 characters"));
    }

    let content_type = match request.content_type.as_deref().and_then(ContentType::parse) {
        Some(content_type) => content_type,
        None => {
            errors.push(FieldError::new(
                "contentType",
                "must be one of POST, STORY, REEL, VIDEO, BLOG",
            ));
            ContentType::Post
        }
    };
    let tone = match request.tone.as_deref().and_then(Tone::parse) {
        Some(tone) => tone,
        None => {
            errors.push(FieldError::new(
                "tone",
                "must be one of professional, casual, humorous, inspirational, educational",
            ));
            Tone::Professional
        }
    };
    let length = match request.length.as_deref().and_then(TextLength::parse) {
        Some(length) => length,
        None => {
            errors.push(FieldError::new(
                "length",
                "must be one of short, medium, long",
            ));
            TextLength::Short
        }
    };

    if !errors.is_empty() {
        return Err(ProviderError::validation(errors));
    }

    Ok(ValidTextRequest {
        prompt,
        content_type,
        tone,
        length,
    })
}

fn tone_instruction(tone: Tone) -> &'static str {
    match tone {
        Tone::Professional => {
            "Write in a professional, authoritative tone suitable for business contexts."
        }
        Tone::Casual => {
            "Write in a friendly, conversational tone that feels approachable and relatable."
        }
        Tone::Humorous => {
            "Write with wit, humor, and lightheartedness. Include tasteful jokes where appropriate."
        }
        Tone::Inspirational => {
            "Write in a motivating, uplifting tone that inspires action and positive thinking."
        }
        Tone::Educational => {
            "Write in a clear, informative tone that teaches and explains concepts accessibly."
        }
    }
}

fn format_instruction(content_type: ContentType) -> &'static str {
    match content_type {
        ContentType::Post => {
            "Create a concise, engaging social media post. Include relevant hashtags at the end."
        }
        ContentType::Story => {
            "Create compelling story content optimized for social media stories format. Keep it punchy and visual."
        }
        ContentType::Reel => {
            "Write a script for a short-form video reel with a strong hook, main content, and call-to-action."
        }
        ContentType::Video => {
            "Write a detailed video script with a clear intro, main content sections, and an outro with CTA."
        }
        ContentType::Blog => {
            "Write a well-structured blog post with headings (##), subheadings (###), and clear paragraphs."
        }
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
}

pub struct TextProvider {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl TextProvider {
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

    /// Synchronous modality: blocks until the finished text comes back.
    pub async fn submit(&self, request: &ValidTextRequest) -> Result<TextResult, ProviderError> {
        let api_key = require_key(&self.api_key, "OPENAI_API_KEY")?;
        let max_words = request.length.max_words();

        let system_prompt = format!(
            "You are an expert content creator specializing in high-quality digital content.\n\
             Tone: {}\n\
             Format: Respond with clean, well-formatted markdown.",
            tone_instruction(request.tone)
        );
        let user_prompt = format!(
            "Create {} content about the following topic:\n\n\"{}\"\n\n\
             Guidelines:\n- {}\n- Target length: approximately {} words\n\
             - Use markdown formatting where appropriate",
            request.content_type.as_str(),
            request.prompt,
            format_instruction(request.content_type),
            max_words
        );

        let response = self
            .client
            .post(format!("{OPENAI_API_BASE}/chat/completions"))
            .bearer_auth(api_key)
            .json(&json!({
                "model": MODEL,
                "messages": [
                    { "role": "system", "content": system_prompt },
                    { "role": "user", "content": user_prompt },
                ],
                "max_tokens": max_words * 3,
                "temperature": 0.7,
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

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::transport(&err))?;
        let text = body
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default();
        let usage = body.usage.unwrap_or_default();

        Ok(TextResult {
            text,
            tokens_used: usage.total_tokens,
            cost: estimate_cost(usage.prompt_tokens, usage.completion_tokens),
        })
    }

    pub fn model(&self) -> &'static str {
        MODEL
    }
}

pub fn estimate_cost(prompt_tokens: u64, completion_tokens: u64) -> f64 {
    prompt_tokens as f64 * INPUT_COST_PER_TOKEN + completion_tokens as f64 * OUTPUT_COST_PER_TOKEN
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prompt: &str) -> GenerateTextRequest {
        GenerateTextRequest {
            prompt: Some(prompt.to_string()),
            content_type: Some("POST".to_string()),
            tone: Some("professional".to_string()),
            length: Some("short".to_string()),
            project_id: None,
            content_id: None,
        }
    }

    #[test]
    fn accepts_a_well_formed_request() {
        let valid = validate(&request("Write a post about morning routines")).expect("valid");
        assert_eq!(valid.content_type, ContentType::Post);
        assert_eq!(valid.tone, Tone::Professional);
        assert_eq!(valid.length.max_words(), 200);
    }

    #[test]
    fn rejects_a_short_prompt_with_field_detail() {
        let err = validate(&request("too short")).unwrap_err();
        match err {
            ProviderError::Validation { details } => {
                assert_eq!(details.len(), 1);
                assert_eq!(details[0].field, "prompt");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_enum_values() {
        let mut bad = request("Write a post about morning routines");
        bad.tone = Some("sarcastic".to_string());
        bad.length = Some("epic".to_string());
        let err = validate(&bad).unwrap_err();
        match err {
            ProviderError::Validation { details } => {
                let fields: Vec<_> = details.iter().map(|detail| detail.field).collect();
                assert_eq!(fields, vec!["tone", "length"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn token_cost_formula() {
        // 1M input tokens cost $5, 1M output tokens cost $15.
        let cost = estimate_cost(1_000_000, 1_000_000);
        assert!((cost - 20.0).abs() < 1e-9);
        assert_eq!(estimate_cost(0, 0), 0.0);
    }
}
