//! Media generation: per-page illustrations, narration, and the optional
//! video composition step.

mod audio;
mod image;
mod uploader;
mod video;

pub use audio::{TtsHandler, TtsRequest};
pub use image::{ImageHandler, ImageRequest};
pub use uploader::BlobUploader;
pub use video::{VideoComposer, VideoRequest};

/// Result of one media generation call.
#[derive(Debug, Clone)]
pub struct MediaOutput {
    pub uri: String,
    pub format: String,
    pub duration_ms: Option<i32>,
    pub metadata: serde_json::Value,
}

/// Stable synthetic URL for unconfigured environments. The seed text is
/// reduced to a short slug so the URI stays readable in admin listings.
pub(crate) fn placeholder_uri(kind: &str, variant: &str, seed: &str) -> String {
    let slug: String = seed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|part| !part.is_empty())
        .take(8)
        .collect::<Vec<_>>()
        .join("-");

    format!("https://placeholder.storyloom.dev/{kind}/{variant}/{slug}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_is_derived_from_the_seed() {
        let uri = placeholder_uri("image", "1024x1024", "A friendly dragon naps in the sun!");
        assert!(uri.starts_with("https://placeholder.storyloom.dev/image/1024x1024/"));
        assert!(uri.contains("friendly-dragon"));
    }

    #[test]
    fn placeholder_is_deterministic() {
        let a = placeholder_uri("audio", "alloy", "same text");
        let b = placeholder_uri("audio", "alloy", "same text");
        assert_eq!(a, b);
    }
}
