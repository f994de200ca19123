use crate::error::GenerationError;
use crate::models::ChatPrompt;
use crate::traits::{FragmentStream, GenerationClient};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

const GROQ_CHAT_COMPLETIONS_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

pub const DEFAULT_GROQ_MODEL: &str = "mixtral-8x7b-32768";

pub const DEFAULT_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Clone)]
pub struct GroqConfig {
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
}

impl GroqConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_GROQ_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Generation client backed by Groq's OpenAI-compatible chat completions
/// endpoint, streaming fragments as server-sent events.
pub struct GroqGeneration {
    client: reqwest::Client,
    config: GroqConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatErrorBody {
    error: Option<ChatErrorDetail>,
}

#[derive(Deserialize)]
struct ChatErrorDetail {
    message: String,
}

impl GroqGeneration {
    pub fn new(config: GroqConfig) -> Result<Self, GenerationError> {
        if config.api_key.trim().is_empty() {
            return Err(GenerationError::Provider(
                "groq api key must not be empty".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            config,
        })
    }
}

#[async_trait]
impl GenerationClient for GroqGeneration {
    async fn generate_stream(&self, prompt: &ChatPrompt) -> Result<FragmentStream, GenerationError> {
        debug!(model = %self.config.model, "starting generation stream");

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.human,
                },
            ],
            temperature: self.config.temperature,
            stream: true,
        };

        let response = self
            .client
            .post(GROQ_CHAT_COMPLETIONS_URL)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ChatErrorBody>(&body)
                .ok()
                .and_then(|parsed| parsed.error)
                .map(|error| error.message)
                .unwrap_or(body);
            return Err(GenerationError::Provider(format!(
                "groq returned {status}: {detail}"
            )));
        }

        Ok(sse_fragments(response.bytes_stream()))
    }
}

/// Adapt a raw SSE byte stream into text fragments.
///
/// Buffers bytes until a full `data:` line is available, forwards each
/// non-empty delta, and ends at the `[DONE]` sentinel. A transport error is
/// yielded once and then the stream terminates; fragments already emitted
/// stand.
fn sse_fragments<S, B, E>(byte_stream: S) -> FragmentStream
where
    S: futures_util::Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let bytes = Box::pin(byte_stream);

    futures_util::stream::unfold(
        (bytes, String::new(), false),
        |(mut bytes, mut buffer, finished)| async move {
            if finished {
                return None;
            }

            loop {
                while let Some(position) = buffer.find('\n') {
                    let line = buffer[..position].trim().to_string();
                    buffer.drain(..=position);

                    let data = match line.strip_prefix("data:") {
                        Some(data) => data.trim(),
                        None => continue,
                    };

                    if data == "[DONE]" {
                        return None;
                    }

                    // unparseable keep-alive lines are skipped, not fatal
                    if let Ok(chunk) = serde_json::from_str::<StreamChunk>(data) {
                        let content = chunk
                            .choices
                            .into_iter()
                            .next()
                            .and_then(|choice| choice.delta.content);
                        if let Some(content) = content {
                            if !content.is_empty() {
                                return Some((Ok(content), (bytes, buffer, false)));
                            }
                        }
                    }
                }

                match bytes.next().await {
                    Some(Ok(chunk)) => {
                        buffer.push_str(&String::from_utf8_lossy(chunk.as_ref()));
                    }
                    Some(Err(error)) => {
                        return Some((
                            Err(GenerationError::Stream(error.to_string())),
                            (bytes, buffer, true),
                        ));
                    }
                    None => return None,
                }
            }
        },
    )
    .boxed()
}
