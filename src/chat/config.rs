use std::env;

/// Public Gemini API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Connection settings for the Gemini API, read from the environment.
///
/// A missing key is not a startup failure: the first generation call reports
/// it as an in-conversation error instead.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
}

impl GeminiConfig {
    pub fn from_env() -> Self {
        let api_key = env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());
        let base_url =
            env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self { api_key, base_url }
    }

    /// Config with an explicit key and endpoint (used by tests against a mock server).
    pub fn new(api_key: Option<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key,
            base_url: base_url.into(),
        }
    }
}
