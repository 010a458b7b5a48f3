//! Generic responder for unroutable queries
//!
//! When neither the intent pipeline nor the FAQ store can answer, the
//! dialogue engine asks a responder for free-form text. The LLM-backed
//! implementation uses a long-lived reqwest::Client for connection pooling;
//! the canned implementation keeps the CLI and tests offline.

use crate::error::BankBotError;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::{error, info};

const SYSTEM_PROMPT: &str = r#"You are a professional banking assistant.

Guidelines:
- Answer general banking questions accurately and concisely
- Never invent account balances, card numbers or transaction data
- For anything account-specific, direct the user to the relevant command
- Use clear, professional language"#;

/// Trait for producing a free-form reply to otherwise unhandled input.
#[async_trait]
pub trait GenericResponder: Send + Sync {
    async fn respond(&self, text: &str) -> Result<String>;
}

//
// ================= LLM Responder =================
//

/// Reusable LLM client (connection-pooled)
pub struct LlmResponder {
    client: Client,
    api_key: String,
    base_url: String,
}

impl LlmResponder {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(15))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            base_url: "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent".to_string(),
        }
    }

    /// Build from `LLM_API_KEY` if configured.
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("LLM_API_KEY").ok()?;
        Some(Self::new(api_key))
    }
}

#[async_trait]
impl GenericResponder for LlmResponder {
    async fn respond(&self, text: &str) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(BankBotError::ResponderError(
                "LLM_API_KEY not configured".to_string(),
            ));
        }

        let url = format!("{}?key={}", self.base_url, self.api_key);

        let request = LlmRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: text.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.3,
                top_p: 0.9,
                max_output_tokens: 512,
            },
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: SYSTEM_PROMPT.to_string(),
                }],
            },
        };

        info!("Calling LLM responder");

        let response = self.client.post(&url).json(&request).send().await.map_err(|e| {
            error!("LLM request failed: {}", e);
            BankBotError::ResponderError(format!("LLM request error: {}", e))
        })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("LLM error response: {}", error_text);
            return Err(BankBotError::ResponderError(format!(
                "LLM API error: {}",
                error_text
            )));
        }

        let parsed: LlmResponse = response.json().await.map_err(|e| {
            BankBotError::ResponderError(format!("LLM parse error: {}", e))
        })?;

        let answer = parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .ok_or_else(|| BankBotError::ResponderError("Empty LLM response".to_string()))?;

        Ok(answer)
    }
}

#[derive(Debug, Serialize)]
struct LlmRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    system_instruction: SystemInstruction,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    max_output_tokens: i32,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct LlmResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

//
// ================= Canned Responder =================
//

/// Offline responder with a fixed reply, for the CLI demo and tests.
pub struct CannedResponder {
    reply: String,
}

impl CannedResponder {
    pub fn new(reply: impl Into<String>) -> Self {
        Self { reply: reply.into() }
    }
}

impl Default for CannedResponder {
    fn default() -> Self {
        Self::new(
            "I can help with balances, transfers, cards, loans and ATM locations. \
             Could you rephrase your question?",
        )
    }
}

#[async_trait]
impl GenericResponder for CannedResponder {
    async fn respond(&self, _text: &str) -> Result<String> {
        Ok(self.reply.clone())
    }
}

/// Responder that always fails, for exercising the apology fallback.
#[cfg(test)]
pub struct FailingResponder;

#[cfg(test)]
#[async_trait]
impl GenericResponder for FailingResponder {
    async fn respond(&self, _text: &str) -> Result<String> {
        Err(BankBotError::ResponderError("responder offline".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = LlmRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: "What is a fixed deposit?".to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.3,
                top_p: 0.9,
                max_output_tokens: 512,
            },
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: SYSTEM_PROMPT.to_string(),
                }],
            },
        };

        let json = serde_json::to_string(&request);
        assert!(json.is_ok());
        assert!(json.unwrap().contains("fixed deposit"));
    }

    #[tokio::test]
    async fn test_canned_responder_always_answers() {
        let responder = CannedResponder::default();
        let reply = responder.respond("anything").await.unwrap();
        assert!(reply.contains("balances"));
    }
}
