use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chat::models::{Message, ModelId, Part};

/// Finite, non-restartable stream of generated text fragments. Fragments are
/// delivered strictly in order with at most one in flight.
pub type FragmentStream = BoxStream<'static, Result<String, GenerationError>>;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("GEMINI_API_KEY is not configured")]
    MissingApiKey,

    #[error("connection error: {0}")]
    Request(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("stream read error: {0}")]
    Stream(String),

    #[error("manifest parse error: {0}")]
    ManifestParse(String),

    #[error("empty response from model")]
    EmptyResponse,
}

/// One file of a generated project manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestFile {
    pub path: String,
    pub content: String,
}

/// Seam to the hosted generation API. Faked in tests; implemented for the
/// Gemini REST API by [`GeminiClient`](super::GeminiClient).
#[async_trait]
pub trait GenerationClient: Send + Sync + 'static {
    /// Start a streaming reply. `history` is the prior conversation without
    /// the just-appended user message and assistant placeholder.
    async fn stream_reply(
        &self,
        system_prompt: &str,
        history: &[Message],
        new_parts: &[Part],
        model: ModelId,
    ) -> Result<FragmentStream, GenerationError>;

    /// One-shot: short title for a first exchange.
    async fn generate_title(
        &self,
        user_prompt: &str,
        assistant_response: &str,
    ) -> Result<String, GenerationError>;

    /// One-shot: spoken rendition of `text` as PCM16 mono samples at 24 kHz,
    /// or `None` when the response carries no audio.
    async fn generate_speech(&self, text: &str) -> Result<Option<Vec<i16>>, GenerationError>;

    /// One-shot: ordered file manifest for a project description.
    async fn generate_project_manifest(
        &self,
        description: &str,
        model: ModelId,
    ) -> Result<Vec<ManifestFile>, GenerationError>;
}

/// Extract a manifest from the model's raw text output.
///
/// The model habitually wraps the JSON array in prose, so the parsed slice is
/// everything from the first `[` to the last `]`. Anything unparseable inside
/// that slice is a [`GenerationError::ManifestParse`], distinct from network
/// errors: garbled output must not silently become an empty project.
pub fn parse_manifest_text(raw: &str) -> Result<Vec<ManifestFile>, GenerationError> {
    let start = raw
        .find('[')
        .ok_or_else(|| GenerationError::ManifestParse("no '[' in model output".to_string()))?;
    let end = raw
        .rfind(']')
        .filter(|&end| end > start)
        .ok_or_else(|| GenerationError::ManifestParse("no closing ']' in model output".to_string()))?;

    serde_json::from_str(&raw[start..=end])
        .map_err(|err| GenerationError::ManifestParse(err.to_string()))
}
