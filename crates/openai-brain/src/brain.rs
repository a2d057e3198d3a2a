//! OpenAiBrain implementation.

use brain_core::{
    async_trait, hash_prompt, Brain, BrainError, Generation, GenerationRequest, SpeechRequest,
    SpeechSynthesizer, SynthesizedAudio, Transcriber,
};
use reqwest::{multipart, Client, Response};
use std::time::Duration;
use tracing::{debug, info};

use crate::api_types::{
    ApiError, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, SpeechRequestBody,
    TranscriptionResponse,
};
use crate::config::OpenAiBrainConfig;

/// A brain that calls an OpenAI-compatible HTTP API.
///
/// Stateless: every request carries its own instruction and history, so a
/// single instance is shared by all conversations.
pub struct OpenAiBrain {
    client: Client,
    config: OpenAiBrainConfig,
}

impl OpenAiBrain {
    /// Create a new OpenAiBrain with the given configuration.
    pub fn new(config: OpenAiBrainConfig) -> Result<Self, BrainError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| BrainError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            api_url = %config.api_url,
            credentials = config.has_credentials(),
            "OpenAiBrain initialized"
        );

        Ok(Self { client, config })
    }

    /// Create an OpenAiBrain from environment variables.
    ///
    /// See [`OpenAiBrainConfig::from_env`] for the variables read.
    pub fn from_env() -> Result<Self, BrainError> {
        Self::new(OpenAiBrainConfig::from_env()?)
    }

    /// Get the configuration.
    pub fn config(&self) -> &OpenAiBrainConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.api_url, path)
    }

    fn api_key(&self) -> Result<&str, BrainError> {
        if self.config.has_credentials() {
            Ok(&self.config.api_key)
        } else {
            Err(BrainError::Configuration("OPENAI_API_KEY not set".to_string()))
        }
    }

    /// Check the response status, turning error bodies into `ProcessingFailed`.
    async fn check(response: Response) -> Result<Response, BrainError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();
        Err(api_failure(status.as_u16(), &error_text))
    }
}

/// Build the messages array for a chat completion request.
fn build_messages(request: &GenerationRequest) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(request.history.len() + 2);

    if !request.instruction.is_empty() {
        messages.push(ChatMessage::system(request.instruction.clone()));
    }

    for msg in &request.history {
        messages.push(ChatMessage {
            role: msg.role.chat_role().to_string(),
            content: msg.content.clone(),
        });
    }

    messages.push(ChatMessage::user(request.message.clone()));
    messages
}

/// Extract the reply text and token usage from a completion.
fn extract_generation(completion: ChatCompletionResponse) -> Result<Generation, BrainError> {
    let text = completion
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(BrainError::EmptyResponse);
    }

    let tokens_used = completion.usage.map(|u| u.total_tokens).unwrap_or(0);
    Ok(Generation::new(text, tokens_used))
}

fn api_failure(status: u16, body: &str) -> BrainError {
    if let Ok(api_error) = serde_json::from_str::<ApiError>(body) {
        return BrainError::ProcessingFailed(format!(
            "API error ({}): {}",
            status, api_error.error.message
        ));
    }

    BrainError::ProcessingFailed(format!("API error ({}): {}", status, body))
}

fn transport_error(e: reqwest::Error) -> BrainError {
    if e.is_timeout() {
        BrainError::Timeout
    } else {
        BrainError::Network(format!("Failed to send request: {}", e))
    }
}

#[async_trait]
impl Brain for OpenAiBrain {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, BrainError> {
        let api_key = self.api_key()?;

        let model = if request.model.is_empty() {
            self.config.default_model.clone()
        } else {
            request.model.clone()
        };

        debug!(
            model = %model,
            instruction_hash = %hash_prompt(&request.instruction),
            history = request.history.len(),
            "Requesting chat completion"
        );

        let body = ChatCompletionRequest {
            model,
            messages: build_messages(&request),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(self.url("chat/completions"))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let completion: ChatCompletionResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| BrainError::ProcessingFailed(format!("Failed to parse response: {}", e)))?;

        let generation = extract_generation(completion)?;
        debug!(tokens_used = generation.tokens_used, "Chat completion received");
        Ok(generation)
    }

    fn name(&self) -> &str {
        "OpenAiBrain"
    }

    async fn is_ready(&self) -> bool {
        self.config.has_credentials()
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiBrain {
    async fn synthesize(&self, request: SpeechRequest) -> Result<SynthesizedAudio, BrainError> {
        let api_key = self.api_key()?;

        let body = SpeechRequestBody {
            model: self.config.speech_model.clone(),
            input: request.text,
            voice: request.voice,
            speed: request.speed,
            response_format: "opus",
        };

        let response = self
            .client
            .post(self.url("audio/speech"))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let bytes = Self::check(response)
            .await?
            .bytes()
            .await
            .map_err(transport_error)?;

        if bytes.is_empty() {
            return Err(BrainError::EmptyResponse);
        }

        debug!(bytes = bytes.len(), "Speech synthesized");
        Ok(SynthesizedAudio {
            bytes: bytes.to_vec(),
            mime_type: "audio/ogg".to_string(),
        })
    }
}

#[async_trait]
impl Transcriber for OpenAiBrain {
    async fn transcribe(&self, audio: Vec<u8>, mime_type: &str) -> Result<String, BrainError> {
        let api_key = self.api_key()?;

        let file = multipart::Part::bytes(audio)
            .file_name(audio_file_name(mime_type))
            .mime_str(mime_type)
            .map_err(|e| BrainError::ProcessingFailed(format!("Invalid audio type: {}", e)))?;
        let form = multipart::Form::new()
            .text("model", self.config.transcription_model.clone())
            .part("file", file);

        let response = self
            .client
            .post(self.url("audio/transcriptions"))
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;

        let transcription: TranscriptionResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| BrainError::ProcessingFailed(format!("Failed to parse response: {}", e)))?;

        let text = transcription.text.trim().to_string();
        if text.is_empty() {
            return Err(BrainError::EmptyResponse);
        }
        Ok(text)
    }
}

/// File name with an extension the transcription endpoint recognizes.
fn audio_file_name(mime_type: &str) -> &'static str {
    let essence = mime_type.split(';').next().unwrap_or_default().trim();
    match essence {
        "audio/mpeg" | "audio/mp3" => "audio.mp3",
        "audio/mp4" | "audio/m4a" | "audio/aac" => "audio.m4a",
        "audio/wav" | "audio/x-wav" => "audio.wav",
        "audio/webm" => "audio.webm",
        _ => "audio.ogg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_types::{Choice, ResponseMessage, Usage};
    use brain_core::HistoryMessage;

    fn request() -> GenerationRequest {
        GenerationRequest {
            model: String::new(),
            instruction: "Eres un asistente.".to_string(),
            history: vec![
                HistoryMessage::contact("hola"),
                HistoryMessage::assistant("¡Hola! ¿En qué te ayudo?"),
            ],
            message: "precio?".to_string(),
            max_tokens: 100,
            temperature: 0.5,
        }
    }

    fn completion(content: Option<&str>, total_tokens: u32) -> ChatCompletionResponse {
        ChatCompletionResponse {
            choices: vec![Choice {
                message: ResponseMessage {
                    content: content.map(str::to_string),
                },
                finish_reason: Some("stop".to_string()),
            }],
            usage: Some(Usage {
                prompt_tokens: 0,
                completion_tokens: 0,
                total_tokens,
            }),
        }
    }

    #[test]
    fn test_build_messages_order() {
        let messages = build_messages(&request());
        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert_eq!(messages[3].content, "precio?");
    }

    #[test]
    fn test_build_messages_without_instruction() {
        let mut req = request();
        req.instruction.clear();
        req.history.clear();

        let messages = build_messages(&req);
        assert_eq!(messages, vec![ChatMessage::user("precio?")]);
    }

    #[test]
    fn test_extract_generation() {
        let generation = extract_generation(completion(Some("  Cuesta $250  "), 57)).unwrap();
        assert_eq!(generation, Generation::new("Cuesta $250", 57));
    }

    #[test]
    fn test_extract_generation_empty() {
        assert!(matches!(
            extract_generation(completion(None, 3)),
            Err(BrainError::EmptyResponse)
        ));
        assert!(matches!(
            extract_generation(completion(Some("   "), 3)),
            Err(BrainError::EmptyResponse)
        ));
        assert!(matches!(
            extract_generation(ChatCompletionResponse {
                choices: vec![],
                usage: None
            }),
            Err(BrainError::EmptyResponse)
        ));
    }

    #[test]
    fn test_api_failure_message() {
        let err = api_failure(401, r#"{"error": {"message": "bad key", "type": null, "code": null}}"#);
        assert_eq!(err.to_string(), "processing failed: API error (401): bad key");

        let err = api_failure(502, "upstream");
        assert_eq!(err.to_string(), "processing failed: API error (502): upstream");
    }

    #[test]
    fn test_audio_file_name() {
        assert_eq!(audio_file_name("audio/ogg; codecs=opus"), "audio.ogg");
        assert_eq!(audio_file_name("audio/mpeg"), "audio.mp3");
        assert_eq!(audio_file_name("application/octet-stream"), "audio.ogg");
    }

    #[tokio::test]
    async fn test_missing_key_is_configuration_error() {
        let brain = OpenAiBrain::new(OpenAiBrainConfig::default()).unwrap();
        assert!(!brain.is_ready().await);
        assert_eq!(brain.name(), "OpenAiBrain");

        let result = brain.generate(request()).await;
        assert!(matches!(result, Err(BrainError::Configuration(_))));

        let result = brain
            .synthesize(SpeechRequest {
                text: "hola".to_string(),
                voice: "alloy".to_string(),
                speed: 1.0,
            })
            .await;
        assert!(matches!(result, Err(BrainError::Configuration(_))));
    }
}
