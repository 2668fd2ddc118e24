mod gemini;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub use gemini::GeminiProvider;

/// Result type for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API key is missing")]
    MissingCredentials,

    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Response parsing failed: {0}")]
    ParseError(String),

    #[error("Received an empty response from the model")]
    EmptyResponse,
}

/// What a text generation is for; providers map this onto a model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationTask {
    /// Full game board as structured JSON
    Board,
    /// Short plain-text hint for a single clue
    Hint,
}

/// Request to generate text
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub task: GenerationTask,
    pub prompt: String,
    /// JSON schema the response must follow; also switches the response to JSON
    pub response_schema: Option<serde_json::Value>,
    /// Reasoning token budget for models that think before answering
    pub thinking_budget: Option<u32>,
    /// None leaves the request to the HTTP client's own defaults
    pub timeout: Option<Duration>,
}

/// Response from an LLM provider
#[derive(Debug, Clone)]
pub struct GenerateResponse {
    pub text: String,
    pub metadata: ResponseMetadata,
}

/// Request to synthesize speech
#[derive(Debug, Clone)]
pub struct SpeechRequest {
    pub text: String,
    pub timeout: Option<Duration>,
}

/// Raw synthesized audio, already base64-decoded
#[derive(Debug, Clone)]
pub struct SpeechResponse {
    /// Little-endian signed 16-bit PCM
    pub audio: Vec<u8>,
    pub mime_type: Option<String>,
    pub metadata: ResponseMetadata,
}

/// Metadata about the LLM response
#[derive(Debug, Clone)]
pub struct ResponseMetadata {
    /// Name of the provider (e.g., "gemini")
    pub provider: String,
    /// Model name used
    pub model: String,
    /// Tokens consumed (if available)
    pub tokens_used: Option<u32>,
    /// Latency in milliseconds
    pub latency_ms: u64,
}

/// Trait that all generative providers must implement
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate text (plain or schema-constrained JSON)
    async fn generate(&self, request: GenerateRequest) -> LlmResult<GenerateResponse>;

    /// Turn text into speech audio
    async fn synthesize_speech(&self, request: SpeechRequest) -> LlmResult<SpeechResponse>;

    /// Get the name of this provider
    fn name(&self) -> &str;
}

/// Configuration for the generative service
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Service credential (None = fallback content only)
    pub api_key: Option<String>,
    pub base_url: String,
    /// Model used for full board generation
    pub board_model: String,
    /// Model used for hints
    pub hint_model: String,
    /// Model used for text-to-speech
    pub speech_model: String,
    /// Prebuilt voice name for text-to-speech
    pub voice: String,
    /// Thinking budget for board generation
    pub board_thinking_budget: u32,
    /// Per-request timeout; None means network defaults only
    pub request_timeout: Option<Duration>,
}

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            board_model: "gemini-3-pro-preview".to_string(),
            hint_model: "gemini-3-flash-preview".to_string(),
            speech_model: "gemini-2.5-flash-preview-tts".to_string(),
            voice: "Fenrir".to_string(),
            board_thinking_budget: 4000,
            request_timeout: None,
        }
    }
}

/// Read a non-blank environment variable
fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty() && trimmed != "undefined").then(|| trimmed.to_string())
    })
}

impl LlmConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let api_key = env_non_empty("GEMINI_API_KEY").or_else(|| env_non_empty("API_KEY"));

        Self {
            api_key,
            base_url: env_non_empty("GEMINI_BASE_URL").unwrap_or(defaults.base_url),
            board_model: env_non_empty("GEMINI_BOARD_MODEL").unwrap_or(defaults.board_model),
            hint_model: env_non_empty("GEMINI_HINT_MODEL").unwrap_or(defaults.hint_model),
            speech_model: env_non_empty("GEMINI_TTS_MODEL").unwrap_or(defaults.speech_model),
            voice: env_non_empty("GEMINI_TTS_VOICE").unwrap_or(defaults.voice),
            board_thinking_budget: defaults.board_thinking_budget,
            request_timeout: env_non_empty("LLM_TIMEOUT")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs),
        }
    }

    /// Build the configured provider
    pub fn build_provider(&self) -> LlmResult<Arc<dyn LlmProvider>> {
        let api_key = self
            .api_key
            .clone()
            .ok_or(LlmError::MissingCredentials)?;

        Ok(Arc::new(GeminiProvider::new(api_key, self.clone())?))
    }
}

/// Shown when the hint service fails
pub const HINT_FALLBACK: &str = "Could not generate a hint.";

/// Shown when the hint service answers with nothing usable
pub const HINT_UNAVAILABLE: &str = "No hint available.";

fn hint_prompt(clue: &str, answer: &str) -> String {
    format!(
        "You are a Jeopardy host helper.\n\
         Clue: \"{clue}\"\n\
         Answer: \"{answer}\"\n\
         Task: Provide a helpful but subtle hint for the players who are stuck. \
         Do not use the answer word itself. Keep it short (max 15 words)."
    )
}

/// Ask for a short hint for a clue.
/// Never fails: service errors turn into a fixed fallback text.
pub async fn generate_hint(
    provider: Option<&dyn LlmProvider>,
    clue: &str,
    answer: &str,
    timeout: Option<Duration>,
) -> String {
    let Some(provider) = provider else {
        tracing::warn!("Hint requested without a configured provider");
        return HINT_FALLBACK.to_string();
    };

    let request = GenerateRequest {
        task: GenerationTask::Hint,
        prompt: hint_prompt(clue, answer),
        response_schema: None,
        thinking_budget: None,
        timeout,
    };

    match provider.generate(request).await {
        Ok(response) => {
            let hint = response.text.trim().to_string();
            if hint.is_empty() {
                tracing::warn!("Hint generation returned empty text");
                HINT_UNAVAILABLE.to_string()
            } else if leaks_answer(&hint, answer) {
                // The model was told not to, but sometimes does anyway
                tracing::warn!("Generated hint contains the answer, discarding it");
                HINT_UNAVAILABLE.to_string()
            } else {
                tracing::debug!(
                    "Hint generated by {} in {}ms",
                    response.metadata.model,
                    response.metadata.latency_ms
                );
                hint
            }
        }
        Err(e) => {
            tracing::error!("Hint generation failed: {}", e);
            HINT_FALLBACK.to_string()
        }
    }
}

/// Words that open a Jeopardy-style response and carry no meaning of their own
const RESPONSE_LEAD_WORDS: &[&str] = &[
    "who", "what", "where", "when", "which", "is", "are", "was", "were", "a", "an", "the",
];

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Whether the hint spells out the key words of the answer.
/// "What is a candy cane?" leaks through "candy cane", not through "a".
pub fn leaks_answer(hint: &str, answer: &str) -> bool {
    let answer_words = words(answer);
    let core: Vec<&String> = answer_words
        .iter()
        .skip_while(|w| RESPONSE_LEAD_WORDS.contains(&w.as_str()))
        .collect();

    if core.is_empty() || core.iter().map(|w| w.len()).sum::<usize>() < 3 {
        return false;
    }

    let hint_words = words(hint);
    hint_words
        .windows(core.len())
        .any(|window| window.iter().zip(core.iter()).all(|(h, c)| h == *c))
}
