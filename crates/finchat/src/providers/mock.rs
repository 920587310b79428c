use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::Mutex;

use crate::models::message::InputItem;
use crate::models::response::ModelResponse;
use crate::models::tool::Tool;
use crate::providers::base::{Provider, Usage};

/// A mock provider that returns pre-configured responses for testing
#[derive(Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<ModelResponse>>>,
    repeat: Option<ModelResponse>,
    usage: Usage,
    inputs: Arc<Mutex<Vec<Vec<InputItem>>>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<ModelResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            repeat: None,
            usage: Usage::default(),
            inputs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A provider that answers every call with the same response
    pub fn repeating(response: ModelResponse) -> Self {
        Self {
            repeat: Some(response),
            ..Self::new(Vec::new())
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }

    /// The input of every call made so far
    pub fn inputs(&self) -> Vec<Vec<InputItem>> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(&self, input: &[InputItem], _tools: &[Tool]) -> Result<(ModelResponse, Usage)> {
        self.inputs.lock().unwrap().push(input.to_vec());

        if let Some(response) = &self.repeat {
            return Ok((response.clone(), self.usage.clone()));
        }

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            // Return empty response if no more pre-configured responses
            Ok((ModelResponse::text(""), self.usage.clone()))
        } else {
            Ok((responses.remove(0), self.usage.clone()))
        }
    }
}
