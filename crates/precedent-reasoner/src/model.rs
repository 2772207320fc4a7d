//! Reasoner model seam and the Bedrock-style HTTP client.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One round-trip to a reasoning model.
#[async_trait]
pub trait ReasonerModel: Send + Sync {
    /// Sends a system + user prompt pair and returns the raw completion text.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;

    /// Returns the model identifier.
    fn model_name(&self) -> &str;
}

/// Bedrock converse-style client.
pub struct BedrockClient {
    model_id: String,
    base_url: String,
    api_key: String,
    max_tokens: u32,
    client: reqwest::Client,
}

impl BedrockClient {
    /// Creates a client for the given model.
    pub fn new(model_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            base_url: "https://bedrock-runtime.us-east-1.amazonaws.com".to_string(),
            api_key: api_key.into(),
            max_tokens: 1600,
            client: reqwest::Client::new(),
        }
    }

    /// Sets a custom base URL (regional endpoints, proxies).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the completion token budget.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[derive(Serialize)]
struct ConverseRequest {
    system: Vec<SystemBlock>,
    messages: Vec<Message>,
    #[serde(rename = "inferenceConfig")]
    inference_config: InferenceConfig,
}

#[derive(Serialize)]
struct SystemBlock {
    text: String,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: Vec<ContentBlock>,
}

#[derive(Serialize, Deserialize)]
struct ContentBlock {
    text: String,
}

#[derive(Serialize)]
struct InferenceConfig {
    #[serde(rename = "maxTokens")]
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ConverseResponse {
    output: ConverseOutput,
}

#[derive(Deserialize)]
struct ConverseOutput {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Vec<ContentBlock>,
}

#[async_trait]
impl ReasonerModel for BedrockClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request = ConverseRequest {
            system: vec![SystemBlock {
                text: system.to_string(),
            }],
            messages: vec![Message {
                role: "user".to_string(),
                content: vec![ContentBlock {
                    text: user.to_string(),
                }],
            }],
            inference_config: InferenceConfig {
                max_tokens: self.max_tokens,
                temperature: 0.0,
            },
        };

        let response = self
            .client
            .post(format!(
                "{}/model/{}/converse",
                self.base_url, self.model_id
            ))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .context("Failed to send reasoner request")?
            .error_for_status()
            .context("Reasoner request rejected")?;

        let converse: ConverseResponse = response
            .json()
            .await
            .context("Failed to parse reasoner response")?;

        converse
            .output
            .message
            .content
            .first()
            .map(|block| block.text.clone())
            .ok_or_else(|| anyhow::anyhow!("Empty reasoner response"))
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape() {
        let request = ConverseRequest {
            system: vec![SystemBlock {
                text: "s".to_string(),
            }],
            messages: vec![Message {
                role: "user".to_string(),
                content: vec![ContentBlock {
                    text: "u".to_string(),
                }],
            }],
            inference_config: InferenceConfig {
                max_tokens: 100,
                temperature: 0.0,
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["inferenceConfig"]["maxTokens"], 100);
        assert_eq!(json["messages"][0]["role"], "user");
    }
}
