use super::*;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Gemini provider talking to the REST `generateContent` endpoint
pub struct GeminiProvider {
    api_key: String,
    config: LlmConfig,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: String, config: LlmConfig) -> LlmResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| LlmError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            config,
            client,
        })
    }

    fn model_for(&self, task: GenerationTask) -> &str {
        match task {
            GenerationTask::Board => &self.config.board_model,
            GenerationTask::Hint => &self.config.hint_model,
        }
    }

    async fn exchange(&self, url: &str, body: &GeminiRequest) -> LlmResult<GeminiResponse> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::ApiError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError(format!(
                "Gemini API returned status {}: {}",
                status, detail
            )));
        }

        response
            .json::<GeminiResponse>()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))
    }

    /// POST a generateContent call, honouring the optional timeout
    async fn call(
        &self,
        model: &str,
        body: &GeminiRequest,
        timeout: Option<Duration>,
    ) -> LlmResult<GeminiResponse> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        );

        let exchange = self.exchange(&url, body);

        match timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .map_err(|_| LlmError::Timeout(limit))?,
            None => exchange.await,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: Option<String>,
    data: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speech_config: Option<SpeechConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    voice_config: VoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    total_token_count: Option<u32>,
}

impl GeminiResponse {
    fn first_parts(&self) -> &[Part] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or(&[])
    }

    /// All text parts of the first candidate, joined
    fn text(&self) -> String {
        self.first_parts()
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }

    fn inline_audio(&self) -> Option<&InlineData> {
        self.first_parts().iter().find_map(|p| p.inline_data.as_ref())
    }

    fn tokens_used(&self) -> Option<u32> {
        self.usage_metadata
            .as_ref()
            .and_then(|u| u.total_token_count)
    }
}

fn user_text(text: String) -> Vec<Content> {
    vec![Content {
        role: Some("user".to_string()),
        parts: vec![Part {
            text: Some(text),
            inline_data: None,
        }],
    }]
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn generate(&self, request: GenerateRequest) -> LlmResult<GenerateResponse> {
        let start = Instant::now();
        let model = self.model_for(request.task).to_string();

        let generation_config = GenerationConfig {
            response_mime_type: request
                .response_schema
                .as_ref()
                .map(|_| "application/json".to_string()),
            response_schema: request.response_schema,
            thinking_config: request
                .thinking_budget
                .map(|thinking_budget| ThinkingConfig { thinking_budget }),
            ..Default::default()
        };

        let body = GeminiRequest {
            contents: user_text(request.prompt),
            generation_config: Some(generation_config),
        };

        let response = self.call(&model, &body, request.timeout).await?;

        let text = response.text();
        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        Ok(GenerateResponse {
            text: text.trim().to_string(),
            metadata: ResponseMetadata {
                provider: "gemini".to_string(),
                model,
                tokens_used: response.tokens_used(),
                latency_ms: start.elapsed().as_millis() as u64,
            },
        })
    }

    async fn synthesize_speech(&self, request: SpeechRequest) -> LlmResult<SpeechResponse> {
        let start = Instant::now();
        let model = self.config.speech_model.clone();

        let body = GeminiRequest {
            contents: vec![Content {
                role: None,
                parts: vec![Part {
                    text: Some(request.text),
                    inline_data: None,
                }],
            }],
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["AUDIO".to_string()]),
                speech_config: Some(SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: self.config.voice.clone(),
                        },
                    },
                }),
                ..Default::default()
            }),
        };

        let response = self.call(&model, &body, request.timeout).await?;

        let inline = response.inline_audio().ok_or(LlmError::EmptyResponse)?;
        let audio = STANDARD
            .decode(inline.data.as_bytes())
            .map_err(|e| LlmError::ParseError(format!("Invalid audio payload: {}", e)))?;

        Ok(SpeechResponse {
            audio,
            mime_type: inline.mime_type.clone(),
            metadata: ResponseMetadata {
                provider: "gemini".to_string(),
                model,
                tokens_used: response.tokens_used(),
                latency_ms: start.elapsed().as_millis() as u64,
            },
        })
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_text_joins_parts() {
        let json = r#"{
            "candidates": [{"content": {"role": "model", "parts": [{"text": "{\"a\":"}, {"text": "1}"}]}}],
            "usageMetadata": {"totalTokenCount": 42}
        }"#;
        let response: GeminiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.text(), "{\"a\":1}");
        assert_eq!(response.tokens_used(), Some(42));
        assert!(response.inline_audio().is_none());
    }

    #[test]
    fn test_response_inline_audio() {
        let json = r#"{
            "candidates": [{"content": {"parts": [{"inlineData": {"mimeType": "audio/L16;rate=24000", "data": "AAA="}}]}}]
        }"#;
        let response: GeminiResponse = serde_json::from_str(json).unwrap();
        let inline = response.inline_audio().unwrap();
        assert_eq!(inline.data, "AAA=");
        assert_eq!(inline.mime_type.as_deref(), Some("audio/L16;rate=24000"));
    }

    #[test]
    fn test_empty_candidates() {
        let response: GeminiResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response.text(), "");
        assert!(response.inline_audio().is_none());
    }

    #[test]
    fn test_speech_request_shape() {
        let body = GeminiRequest {
            contents: user_text("hello".to_string()),
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["AUDIO".to_string()]),
                speech_config: Some(SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: "Fenrir".to_string(),
                        },
                    },
                }),
                ..Default::default()
            }),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]
                ["voiceName"],
            "Fenrir"
        );
        assert_eq!(value["generationConfig"]["responseModalities"][0], "AUDIO");
        assert!(value["generationConfig"].get("responseSchema").is_none());
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hello");
    }

    #[tokio::test]
    #[ignore] // Only run with an actual API key
    async fn test_gemini_generate() {
        let api_key = std::env::var("GEMINI_API_KEY").expect("GEMINI_API_KEY not set");
        let provider = GeminiProvider::new(api_key, LlmConfig::default()).unwrap();

        let response = provider
            .generate(GenerateRequest {
                task: GenerationTask::Hint,
                prompt: "Say hello in five words.".to_string(),
                response_schema: None,
                thinking_budget: None,
                timeout: Some(Duration::from_secs(30)),
            })
            .await
            .unwrap();

        assert!(!response.text.is_empty());
        assert_eq!(response.metadata.provider, "gemini");
    }
}
