use crate::config::{LlmProvider, LlmSettings};
use crate::error::{AnalyticsError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A chat-completion model that answers one system + user prompt pair.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

/// Groq names the token limit differently and takes `top_p`.
#[derive(Debug, Serialize)]
struct GroqRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_completion_tokens: u32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// POST a chat-completions body and return the first choice's content.
async fn post_chat<B: Serialize + ?Sized>(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    body: &B,
) -> Result<String> {
    let response = client
        .post(format!("{}/chat/completions", base_url.trim_end_matches('/')))
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .json(body)
        .send()
        .await
        .map_err(|e| AnalyticsError::Llm(format!("LLM API call failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(AnalyticsError::Llm(format!(
            "LLM API returned {}: {}",
            status, text
        )));
    }

    let parsed: ChatResponse = response
        .json()
        .await
        .map_err(|e| AnalyticsError::Llm(format!("Failed to parse LLM response: {}", e)))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| AnalyticsError::Llm("No content in LLM response".to_string()))
}

pub struct OpenAiBackend {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiBackend {
    pub fn new(settings: &LlmSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: settings.openai_api_key.clone(),
            base_url: settings.openai_base_url.clone(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        debug!("Calling OpenAI model {}", self.model);
        let body = OpenAiRequest {
            model: &self.model,
            messages: vec![ChatMessage::system(system_prompt), ChatMessage::user(user_prompt)],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        post_chat(&self.client, &self.base_url, &self.api_key, &body).await
    }
}

pub struct GroqBackend {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl GroqBackend {
    pub fn new(settings: &LlmSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: settings.groq_api_key.clone(),
            base_url: settings.groq_base_url.clone(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }
    }
}

#[async_trait]
impl LlmBackend for GroqBackend {
    fn name(&self) -> &str {
        "groq"
    }

    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        debug!("Calling Groq model {}", self.model);
        let body = GroqRequest {
            model: &self.model,
            messages: vec![ChatMessage::system(system_prompt), ChatMessage::user(user_prompt)],
            temperature: self.temperature,
            max_completion_tokens: self.max_tokens,
            top_p: 1.0,
        };
        post_chat(&self.client, &self.base_url, &self.api_key, &body).await
    }
}

/// Backend for the configured provider; its API key must be set.
pub fn build_backend(settings: &LlmSettings) -> Result<Box<dyn LlmBackend>> {
    match settings.provider {
        LlmProvider::Groq => {
            if settings.groq_api_key.trim().is_empty() {
                return Err(AnalyticsError::Config(
                    "GROQ_API_KEY not found. Please set it in .env file".to_string(),
                ));
            }
            Ok(Box::new(GroqBackend::new(settings)))
        }
        LlmProvider::OpenAi => {
            if settings.openai_api_key.trim().is_empty() {
                return Err(AnalyticsError::Config(
                    "OPENAI_API_KEY not found. Please set it in .env file".to_string(),
                ));
            }
            Ok(Box::new(OpenAiBackend::new(settings)))
        }
    }
}
