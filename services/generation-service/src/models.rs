use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The fixed modality set. Dispatch is by exhaustive match, never by
/// string lookup with a fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationKind {
    Text,
    Image,
    Voice,
    Video,
    Avatar,
}

impl GenerationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationKind::Text => "TEXT",
            GenerationKind::Image => "IMAGE",
            GenerationKind::Voice => "VOICE",
            GenerationKind::Video => "VIDEO",
            GenerationKind::Avatar => "AVATAR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Post,
    Story,
    Reel,
    Video,
    Blog,
}

impl ContentType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "POST" => Some(ContentType::Post),
            "STORY" => Some(ContentType::Story),
            "REEL" => Some(ContentType::Reel),
            "VIDEO" => Some(ContentType::Video),
            "BLOG" => Some(ContentType::Blog),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Post => "POST",
            ContentType::Story => "STORY",
            ContentType::Reel => "REEL",
            ContentType::Video => "VIDEO",
            ContentType::Blog => "BLOG",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Professional,
    Casual,
    Humorous,
    Inspirational,
    Educational,
}

impl Tone {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "professional" => Some(Tone::Professional),
            "casual" => Some(Tone::Casual),
            "humorous" => Some(Tone::Humorous),
            "inspirational" => Some(Tone::Inspirational),
            "educational" => Some(Tone::Educational),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Professional => "professional",
            Tone::Casual => "casual",
            Tone::Humorous => "humorous",
            Tone::Inspirational => "inspirational",
            Tone::Educational => "educational",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextLength {
    Short,
    Medium,
    Long,
}

impl TextLength {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "short" => Some(TextLength::Short),
            "medium" => Some(TextLength::Medium),
            "long" => Some(TextLength::Long),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TextLength::Short => "short",
            TextLength::Medium => "medium",
            TextLength::Long => "long",
        }
    }

    pub fn max_words(&self) -> u32 {
        match self {
            TextLength::Short => 200,
            TextLength::Medium => 500,
            TextLength::Long => 1000,
        }
    }
}

/// Shared four-state job status every provider vocabulary is mapped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Per-modality generation metadata, persisted as a tagged union so
/// poll-time reconciliation can pattern-match instead of probing an
/// untyped bag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GenerationMeta {
    Text {
        content_type: String,
        tone: String,
        length: String,
        tokens_used: u64,
        model: String,
    },
    Image {
        size: String,
        quality: String,
        style: String,
        revised_prompt: String,
    },
    Voice {
        voice_id: String,
        model_id: String,
        duration_seconds: u64,
        blob_stored: bool,
    },
    Video {
        model: String,
        ratio: String,
        duration: u32,
        task_id: String,
        status: JobStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        video_url: Option<String>,
    },
    Avatar {
        avatar_id: String,
        voice_id: String,
        dimension: String,
        video_id: String,
        status: JobStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        video_url: Option<String>,
    },
}

// ---- request bodies -------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTextRequest {
    pub prompt: Option<String>,
    pub content_type: Option<String>,
    pub tone: Option<String>,
    pub length: Option<String>,
    pub project_id: Option<Uuid>,
    pub content_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateImageRequest {
    pub prompt: Option<String>,
    pub size: Option<String>,
    pub quality: Option<String>,
    pub style: Option<String>,
    pub project_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVoiceRequest {
    pub text: Option<String>,
    pub voice_id: Option<String>,
    pub model_id: Option<String>,
    pub project_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVideoRequest {
    pub prompt: Option<String>,
    pub model: Option<String>,
    pub ratio: Option<String>,
    pub duration: Option<u32>,
    pub project_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateAvatarRequest {
    pub text: Option<String>,
    pub avatar_id: Option<String>,
    pub voice_id: Option<String>,
    pub dimension: Option<String>,
    pub project_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoPollParams {
    pub task_id: Option<String>,
    pub generation_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvatarPollParams {
    pub video_id: Option<String>,
    pub generation_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

// ---- response bodies ------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextGenerateResponse {
    pub generation_id: Uuid,
    pub content_id: Uuid,
    pub result: String,
    pub tokens_used: u64,
    pub cost: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageGenerateResponse {
    pub generation_id: Uuid,
    pub content_id: Uuid,
    pub image_url: String,
    pub revised_prompt: String,
    pub cost: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceGenerateResponse {
    pub generation_id: Uuid,
    pub content_id: Uuid,
    pub audio_base64: String,
    pub duration_seconds: u64,
    pub cost: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoGenerateResponse {
    pub generation_id: Uuid,
    pub content_id: Uuid,
    pub task_id: String,
    pub status: JobStatus,
    pub cost: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvatarGenerateResponse {
    pub generation_id: Uuid,
    pub content_id: Uuid,
    pub video_id: String,
    pub status: JobStatus,
    pub cost: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResponse {
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSummary {
    pub id: Uuid,
    pub title: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub status: String,
    pub created_at: String,
    pub generations_count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_content: i64,
    pub total_tokens_used: i64,
    pub total_projects: i64,
    pub recent_content: Vec<ContentSummary>,
}

/// Error body shape shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_round_trips_through_tagged_json() {
        let meta = GenerationMeta::Video {
            model: "gen4_turbo".to_string(),
            ratio: "1280:720".to_string(),
            duration: 10,
            task_id: "task-1".to_string(),
            status: JobStatus::Pending,
            video_url: None,
        };
        let value = serde_json::to_value(&meta).expect("serialize");
        assert_eq!(value["kind"], "video");
        assert_eq!(value["status"], "pending");
        assert!(value.get("video_url").is_none());

        let back: GenerationMeta = serde_json::from_value(value).expect("deserialize");
        match back {
            GenerationMeta::Video { task_id, status, .. } => {
                assert_eq!(task_id, "task-1");
                assert_eq!(status, JobStatus::Pending);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn content_type_rejects_unknown_tags() {
        assert!(ContentType::parse("POST").is_some());
        assert!(ContentType::parse("post").is_none());
        assert!(ContentType::parse("PODCAST").is_none());
    }

    #[test]
    fn terminal_statuses() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }
}
