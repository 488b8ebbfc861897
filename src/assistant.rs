use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};

use crate::error::ResaleError;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Scopes every conversation to Singapore HDB topics before the user's
/// question is forwarded.
const SYSTEM_PROMPT: &str = "Please read the user's query and strictly focus on Singapore HDB \
related information only. Strictly do not respond if it is not related to HDB. Provide a \
structured answer based on the question, containing only information specific to it. Ensure \
your answer starts with \"Answer: \".";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

/// Opaque question-answering boundary: forward a question (plus optional
/// prior turns) to the hosted model and get text back. No retry or
/// rate-limit handling is owned here; every upstream failure surfaces as
/// the single `Assistant` error.
pub trait AssistantClient: Send + Sync {
    fn answer(&self, question: &str, history: &[ChatTurn]) -> Result<String, ResaleError>;
}

#[derive(Clone)]
pub struct OpenAiHttpClient {
    client: Client,
    base_url: String,
    model: String,
}

impl OpenAiHttpClient {
    pub fn new(base_url: String, model: String) -> Result<Self, ResaleError> {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ResaleError::Assistant(format!("missing {API_KEY_ENV}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("hdb-rm/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| ResaleError::Assistant(err.to_string()))?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
                .map_err(|err| ResaleError::Assistant(err.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| ResaleError::Assistant(err.to_string()))?;

        Ok(Self {
            client,
            base_url,
            model,
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatTurn>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl AssistantClient for OpenAiHttpClient {
    fn answer(&self, question: &str, history: &[ChatTurn]) -> Result<String, ResaleError> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatTurn {
            role: ChatRole::System,
            content: SYSTEM_PROMPT.to_string(),
        });
        messages.extend(history.iter().cloned());
        messages.push(ChatTurn {
            role: ChatRole::User,
            content: question.to_string(),
        });

        let url = format!("{}/v1/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&ChatCompletionRequest {
                model: &self.model,
                messages,
            })
            .send()
            .map_err(|err| ResaleError::Assistant(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "assistant request failed".to_string());
            return Err(ResaleError::Assistant(format!("status {status}: {message}")));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .map_err(|err| ResaleError::Assistant(err.to_string()))?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| ResaleError::Assistant("empty completion".to_string()))
    }
}
