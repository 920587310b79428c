use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

use super::base::{Provider, Usage};
use super::configs::OpenAiProviderConfig;
use super::utils::{
    get_usage, input_to_openai_spec, openai_response_to_model_response, tools_to_openai_spec,
};
use crate::models::message::InputItem;
use crate::models::response::ModelResponse;
use crate::models::tool::Tool;

/// OpenAI Responses API client
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    async fn post(&self, payload: Value) -> Result<Value> {
        let url = format!("{}/v1/responses", self.config.host.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(anyhow!("Server error: {}", status))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(anyhow!("Request failed: {}\nBody: {}", status, body))
            }
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn complete(&self, input: &[InputItem], tools: &[Tool]) -> Result<(ModelResponse, Usage)> {
        let mut payload = json!({
            "model": self.config.model,
            "input": input_to_openai_spec(input),
        });

        if let Some(object) = payload.as_object_mut() {
            if !tools.is_empty() {
                object.insert("tools".to_string(), json!(tools_to_openai_spec(tools)?));
            }
            if let Some(temp) = self.config.temperature {
                object.insert("temperature".to_string(), json!(temp));
            }
            if let Some(tokens) = self.config.max_tokens {
                object.insert("max_output_tokens".to_string(), json!(tokens));
            }
        }

        let response = self.post(payload).await?;

        if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
            return Err(anyhow!("OpenAI API error: {}", error));
        }

        let message = openai_response_to_model_response(&response)?;
        let usage = get_usage(&response);

        Ok((message, usage))
    }
}
