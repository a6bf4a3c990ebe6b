use async_trait::async_trait;

use crate::clients::openai_client::{ChatMessage, OpenAIHttpClient, ToolDefinition};
use crate::error::LlmError;

/// Seam between the pipeline and the model. Tests plug in scripted fakes.
#[async_trait]
pub trait OpenAIClient: Send + Sync {
    /// Single system + user turn answered with one JSON object.
    async fn complete_json(&self, system: &str, prompt: &str) -> Result<String, LlmError>;

    /// One turn of a tool-enabled conversation.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatMessage, LlmError>;
}

pub struct OpenAIService {
    client: OpenAIHttpClient,
}

impl OpenAIService {
    pub fn new(api_key: String, model: String) -> Result<Self, LlmError> {
        Ok(Self {
            client: OpenAIHttpClient::new(api_key, model)?,
        })
    }
}

#[async_trait]
impl OpenAIClient for OpenAIService {
    async fn complete_json(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let messages = [ChatMessage::system(system), ChatMessage::user(prompt)];
        let reply = self.client.chat(&messages, &[], true).await?;
        Ok(reply.text().to_string())
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatMessage, LlmError> {
        self.client.chat(messages, tools, tools.is_empty()).await
    }
}
