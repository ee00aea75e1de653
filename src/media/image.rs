use serde::Deserialize;
use tracing::{debug, info};

use super::uploader::BlobUploader;
use super::MediaOutput;
use crate::errors::{PipelineError, PipelineResult};

const DEFAULT_SIZE: &str = "1024x1024";
const IMAGES_URL: &str = "https://api.openai.com/v1/images/generations";

#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub prompt: String,
    pub size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    b64_json: Option<String>,
}

/// Per-page illustration generator. Without an API key the handler
/// produces a deterministic placeholder URL derived from the prompt,
/// which counts as success.
pub struct ImageHandler {
    client: reqwest::Client,
    api_key: Option<String>,
    uploader: BlobUploader,
}

impl ImageHandler {
    pub fn new(api_key: Option<String>, uploader: BlobUploader) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            uploader,
        }
    }

    pub async fn generate(&self, request: ImageRequest) -> PipelineResult<MediaOutput> {
        let size = request
            .size
            .clone()
            .unwrap_or_else(|| DEFAULT_SIZE.to_string());

        let Some(api_key) = &self.api_key else {
            let uri = super::placeholder_uri("image", &size, &request.prompt);
            debug!(uri = %uri, "image provider unconfigured, using placeholder");
            return Ok(MediaOutput {
                uri,
                format: "png".to_string(),
                duration_ms: None,
                metadata: serde_json::json!({ "placeholder": true, "size": size }),
            });
        };

        let body = serde_json::json!({
            "model": "gpt-image-1",
            "prompt": request.prompt,
            "size": size,
            "n": 1,
        });

        let response = self
            .client
            .post(IMAGES_URL)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::Transport(format!("image request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PipelineError::Provider {
                status: status.as_u16(),
                message: text.chars().take(256).collect(),
            });
        }

        let parsed: ImagesResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Transport(format!("bad image response: {e}")))?;

        let datum = parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::Validation("image response had no data".into()))?;

        let uri = if let Some(url) = datum.url {
            url
        } else if let Some(b64) = datum.b64_json {
            let bytes = decode_base64(&b64)?;
            let name = format!("image-{}.png", uuid::Uuid::new_v4());
            self.uploader.save_bytes(&name, &bytes).await?
        } else {
            return Err(PipelineError::Validation(
                "image response had neither url nor b64 payload".into(),
            ));
        };

        info!(size = %size, "image generated");
        Ok(MediaOutput {
            uri,
            format: "png".to_string(),
            duration_ms: None,
            metadata: serde_json::json!({ "size": size }),
        })
    }
}

fn decode_base64(input: &str) -> PipelineResult<Vec<u8>> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(input)
        .map_err(|e| PipelineError::Validation(format!("invalid base64 payload: {e}")))
}
