use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::StreamExt;
use serde_json::{Value, json};
use tracing::{debug, error};

use async_trait::async_trait;

use super::generation_client::{
    FragmentStream, GenerationClient, GenerationError, ManifestFile, parse_manifest_text,
};
use super::sse::SseLineParser;
use super::title_generator::{build_title_prompt, clean_title};
use crate::chat::config::GeminiConfig;
use crate::chat::models::{Message, ModelId, Part, Role};

/// Model used for text-to-speech generation.
const TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";

/// Sample layout of the TTS payload: PCM16 mono at 24 kHz.
const BYTES_PER_SAMPLE: usize = 2;

/// Generation client over the Gemini REST API. Streaming goes through the
/// SSE variant of `streamGenerateContent`; everything else is a one-shot
/// `generateContent` call.
pub struct GeminiClient {
    config: GeminiConfig,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn api_key(&self) -> Result<String, GenerationError> {
        self.config
            .api_key
            .clone()
            .ok_or(GenerationError::MissingApiKey)
    }

    fn model_url(&self, model: &str, action: &str) -> String {
        format!("{}/v1beta/models/{}:{}", self.config.base_url, model, action)
    }

    /// One-shot `generateContent` call, returning the parsed response body.
    async fn generate_content(&self, model: &str, body: Value) -> Result<Value, GenerationError> {
        let key = self.api_key()?;
        let url = self.model_url(model, "generateContent");

        debug!(model, "sending generateContent request");

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", key)
            .json(&body)
            .send()
            .await
            .map_err(|err| GenerationError::Request(format!("connection error: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read body".to_string());
            error!(%status, body = %body, "generateContent returned error");
            return Err(map_http_error(status, &body));
        }

        response
            .json()
            .await
            .map_err(|err| GenerationError::Provider(format!("malformed response body: {err}")))
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn stream_reply(
        &self,
        system_prompt: &str,
        history: &[Message],
        new_parts: &[Part],
        model: ModelId,
    ) -> Result<FragmentStream, GenerationError> {
        let key = self.api_key()?;
        let url = format!(
            "{}?alt=sse",
            self.model_url(model.as_str(), "streamGenerateContent")
        );

        let mut contents = map_history(history);
        contents.push(content_entry("user", new_parts));

        let body = json!({
            "system_instruction": {"parts": [{"text": system_prompt}]},
            "contents": contents,
        });

        debug!(model = model.as_str(), history_len = history.len(), "starting reply stream");

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", key)
            .header("accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|err| GenerationError::Request(format!("connection error: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read body".to_string());
            error!(%status, body = %body, "streamGenerateContent returned error");
            return Err(map_http_error(status, &body));
        }

        let mut byte_stream = response.bytes_stream();

        let fragments = async_stream::stream! {
            let mut parser = SseLineParser::new();

            while let Some(chunk) = byte_stream.next().await {
                match chunk {
                    Ok(chunk) => {
                        for data in parser.push(&chunk) {
                            if let Some(text) = fragment_text(&data) {
                                yield Ok(text);
                            }
                        }
                    }
                    Err(err) => {
                        yield Err(GenerationError::Stream(err.to_string()));
                        return;
                    }
                }
            }

            if let Some(data) = parser.flush() {
                if let Some(text) = fragment_text(&data) {
                    yield Ok(text);
                }
            }
        };

        Ok(Box::pin(fragments))
    }

    async fn generate_title(
        &self,
        user_prompt: &str,
        assistant_response: &str,
    ) -> Result<String, GenerationError> {
        let prompt = build_title_prompt(user_prompt, assistant_response);
        let body = json!({"contents": [{"parts": [{"text": prompt}]}]});

        let response = self.generate_content(ModelId::Flash.as_str(), body).await?;
        let raw = response_text(&response).ok_or(GenerationError::EmptyResponse)?;

        Ok(clean_title(&raw))
    }

    async fn generate_speech(&self, text: &str) -> Result<Option<Vec<i16>>, GenerationError> {
        let body = json!({
            "contents": [{"parts": [{"text": text}]}],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": {"prebuiltVoiceConfig": {"voiceName": "Kore"}}
                }
            }
        });

        let response = self.generate_content(TTS_MODEL, body).await?;

        let encoded = response
            .pointer("/candidates/0/content/parts/0/inlineData/data")
            .and_then(Value::as_str);

        match encoded {
            Some(encoded) => decode_pcm16(encoded).map(Some),
            None => Ok(None),
        }
    }

    async fn generate_project_manifest(
        &self,
        description: &str,
        model: ModelId,
    ) -> Result<Vec<ManifestFile>, GenerationError> {
        let prompt = format!(
            "أنشئ ملفات مشروع كامل بناءً على الوصف التالي. أجب بمصفوفة JSON فقط، \
كل عنصر فيها كائن يحوي \"path\" و\"content\".\n\nالوصف: {description}"
        );
        let body = json!({"contents": [{"parts": [{"text": prompt}]}]});

        let response = self.generate_content(model.as_str(), body).await?;
        let raw = response_text(&response).ok_or(GenerationError::EmptyResponse)?;

        parse_manifest_text(&raw)
    }
}

/// Map persisted history to the wire format: drop messages whose parts are
/// all blank, rename the assistant role to `model`.
fn map_history(history: &[Message]) -> Vec<Value> {
    history
        .iter()
        .filter(|message| message.parts.iter().any(|part| !part.is_blank()))
        .map(|message| {
            let role = match message.role {
                Role::User => "user",
                Role::Assistant => "model",
            };
            content_entry(role, &message.parts)
        })
        .collect()
}

fn content_entry(role: &str, parts: &[Part]) -> Value {
    // Part serializes to the wire shape directly.
    json!({"role": role, "parts": parts})
}

/// Concatenated text of one streamed SSE chunk. Chunks that carry no text
/// (safety metadata, usage counts) yield nothing.
fn fragment_text(data: &str) -> Option<String> {
    let value: Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(err) => {
            debug!(error = %err, "skipping unparseable stream chunk");
            return None;
        }
    };

    let text = collect_parts_text(&value);
    if text.is_empty() { None } else { Some(text) }
}

/// Concatenated text of a one-shot response body.
fn response_text(response: &Value) -> Option<String> {
    let text = collect_parts_text(response);
    if text.trim().is_empty() { None } else { Some(text) }
}

fn collect_parts_text(value: &Value) -> String {
    value
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}

fn map_http_error(status: reqwest::StatusCode, body: &str) -> GenerationError {
    let detail = extract_error_message(body);

    match status.as_u16() {
        401 | 403 => GenerationError::Provider(format!("authentication failed: {detail}")),
        429 => GenerationError::Request(format!("rate limit exceeded: {detail}")),
        400 => GenerationError::Request(detail),
        s if s >= 500 => GenerationError::Provider(detail),
        _ => GenerationError::Request(format!("HTTP {status}: {detail}")),
    }
}

/// Extract a human-readable message from a Gemini error response.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(String::from)
        })
        .unwrap_or_else(|| {
            if body.is_empty() {
                "no response body".to_string()
            } else {
                body.chars().take(500).collect()
            }
        })
}

/// Decode a base64 PCM16 little-endian payload into samples.
fn decode_pcm16(encoded: &str) -> Result<Vec<i16>, GenerationError> {
    let bytes = BASE64
        .decode(encoded)
        .map_err(|err| GenerationError::Provider(format!("invalid audio payload: {err}")))?;

    Ok(bytes
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}
