use aws_config::BehaviorVersion;
use aws_sdk_s3::{config::Credentials, config::Region, Client};
use uuid::Uuid;

#[derive(Clone)]
pub struct StorageClient {
    client: Client,
    bucket: String,
    public_url: String,
}

impl StorageClient {
    pub async fn new(config: StorageConfig) -> Result<Self, String> {
        let credentials = Credentials::new(
            config.access_key,
            config.secret_key,
            None,
            None,
            "mediaforge",
        );
        let region = Region::new(config.region);
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(region)
            .credentials_provider(credentials)
            .endpoint_url(config.endpoint)
            .load()
            .await;
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(config.force_path_style)
            .build();
        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket,
            public_url: config.public_url.trim_end_matches('/').to_string(),
        })
    }

    /// Uploads one audio clip under a time-ordered unique key and returns
    /// its public URL.
    pub async fn put_audio(&self, audio: Vec<u8>) -> Result<String, String> {
        let key = format!(
            "audio/{}-{}.mp3",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map_err(|err| format!("clock error: {err}"))?
                .as_millis(),
            Uuid::new_v4()
        );
        self.put_object(&key, audio, "audio/mpeg").await?;
        Ok(format!("{}/{key}", self.public_url))
    }

    async fn put_object(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), String> {
        self.client
            .put_object()
            .bucket(self.bucket.as_str())
            .key(key)
            .content_type(content_type)
            .body(aws_sdk_s3::primitives::ByteStream::from(body))
            .send()
            .await
            .map_err(|err| format!("put object failed: {err}"))?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct StorageConfig {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub region: String,
    pub force_path_style: bool,
    pub public_url: String,
}

impl StorageConfig {
    /// Reads the blob store settings, returning `None` when any credential
    /// is absent or still a placeholder. Callers fall back to inline
    /// data URIs in that case.
    pub fn from_env() -> Option<Self> {
        let endpoint = mediaforge_common::env_credential("BLOB_ENDPOINT")?;
        let access_key = mediaforge_common::env_credential("BLOB_ACCESS_KEY")?;
        let secret_key = mediaforge_common::env_credential("BLOB_SECRET_KEY")?;
        let public_url = mediaforge_common::env_credential("BLOB_PUBLIC_URL")?;
        Some(Self {
            endpoint,
            access_key,
            secret_key,
            bucket: mediaforge_common::env_or("BLOB_BUCKET", "mediaforge-media".to_string()),
            region: mediaforge_common::env_or("BLOB_REGION", "auto".to_string()),
            force_path_style: mediaforge_common::env_or("BLOB_FORCE_PATH_STYLE", true),
            public_url,
        })
    }
}
