use tracing::{debug, info};
use uuid::Uuid;

use super::uploader::BlobUploader;
use super::MediaOutput;
use crate::errors::{PipelineError, PipelineResult};

const DEFAULT_VOICE: &str = "alloy";
const DEFAULT_FORMAT: &str = "mp3";
const SPEECH_URL: &str = "https://api.openai.com/v1/audio/speech";

#[derive(Debug, Clone)]
pub struct TtsRequest {
    pub text: String,
    pub voice: Option<String>,
    pub format: Option<String>,
}

/// Per-page narration generator. Mirrors the image handler's fallback
/// policy: unconfigured environments get a placeholder URI and success.
pub struct TtsHandler {
    client: reqwest::Client,
    api_key: Option<String>,
    uploader: BlobUploader,
}

impl TtsHandler {
    pub fn new(api_key: Option<String>, uploader: BlobUploader) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            uploader,
        }
    }

    pub async fn generate(&self, request: TtsRequest) -> PipelineResult<MediaOutput> {
        let voice = request
            .voice
            .clone()
            .unwrap_or_else(|| DEFAULT_VOICE.to_string());
        let format = request
            .format
            .clone()
            .unwrap_or_else(|| DEFAULT_FORMAT.to_string());

        let Some(api_key) = &self.api_key else {
            let uri = super::placeholder_uri("audio", &voice, &request.text);
            debug!(uri = %uri, "tts provider unconfigured, using placeholder");
            return Ok(MediaOutput {
                uri,
                format,
                duration_ms: None,
                metadata: serde_json::json!({ "placeholder": true, "voice": voice }),
            });
        };

        let body = serde_json::json!({
            "model": "tts-1",
            "voice": voice,
            "input": request.text,
            "response_format": format,
        });

        let response = self
            .client
            .post(SPEECH_URL)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::Transport(format!("tts request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PipelineError::Provider {
                status: status.as_u16(),
                message: text.chars().take(256).collect(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PipelineError::Transport(format!("bad tts response: {e}")))?;

        let name = format!("audio-{}.{format}", Uuid::new_v4());
        let uri = self.uploader.save_bytes(&name, &bytes).await?;

        info!(voice = %voice, size = bytes.len(), "narration generated");
        Ok(MediaOutput {
            uri,
            format,
            duration_ms: None,
            metadata: serde_json::json!({ "voice": voice }),
        })
    }
}
