//! Backend implementation over the OpenAI client.

use super::{ByteStream, ImageBackend, ImageDescriptor, ImageReply, ModelBackend, ModelReply};
use crate::config::StoryConfig;
use crate::error::BackendError;
use crate::segment::{Role, StorySegment};
use async_trait::async_trait;
use futures::StreamExt;
use openai::{ChatMessage, ChatRequest, ChatResponse, FinishReason, ImageRequest, OpenAi};

/// Serves both backend traits from one [`OpenAi`] client.
#[derive(Clone)]
pub struct OpenAiBackend {
    client: OpenAi,
    chat_model: Option<String>,
    image_model: Option<String>,
    image_size: Option<String>,
    max_tokens: Option<usize>,
    temperature: Option<f32>,
}

impl OpenAiBackend {
    pub fn new(client: OpenAi) -> Self {
        Self {
            client,
            chat_model: None,
            image_model: None,
            image_size: None,
            max_tokens: None,
            temperature: None,
        }
    }

    /// Take model and sampling settings from a story config.
    pub fn with_config(mut self, config: &StoryConfig) -> Self {
        self.chat_model = config.chat_model.clone();
        self.image_model = config.image_model.clone();
        self.image_size = config.image_size.clone();
        self.max_tokens = config.max_tokens;
        self.temperature = config.temperature;
        self
    }

    fn chat_request(&self, messages: Vec<ChatMessage>) -> ChatRequest {
        let mut request = ChatRequest::new(messages);
        if let Some(ref model) = self.chat_model {
            request = request.with_model(model);
        }
        if let Some(tokens) = self.max_tokens {
            request = request.with_max_tokens(tokens);
        }
        if let Some(temp) = self.temperature {
            request = request.with_temperature(temp);
        }
        request
    }

    async fn send(&self, request: ChatRequest) -> Result<ModelReply, BackendError> {
        let response = self.client.chat(request).await?;
        Ok(into_reply(response))
    }
}

#[async_trait]
impl ModelBackend for OpenAiBackend {
    async fn post_messages(&self, messages: &[StorySegment]) -> Result<ModelReply, BackendError> {
        let messages = messages
            .iter()
            .map(|s| ChatMessage::new(to_client_role(s.role), s.content.clone()))
            .collect();
        self.send(self.chat_request(messages).with_json_output()).await
    }

    async fn post_character_prompt(&self, prompt: &str) -> Result<ModelReply, BackendError> {
        self.send(self.chat_request(vec![ChatMessage::developer(prompt)]))
            .await
    }
}

#[async_trait]
impl ImageBackend for OpenAiBackend {
    async fn generate_image(&self, prompt: &str) -> Result<ImageReply, BackendError> {
        let mut request = ImageRequest::new(prompt);
        if let Some(ref model) = self.image_model {
            request = request.with_model(model);
        }
        if let Some(ref size) = self.image_size {
            request = request.with_size(size);
        }

        let response = self.client.generate_image(request).await?;
        Ok(ImageReply {
            data: response
                .data
                .into_iter()
                .filter_map(|d| d.url)
                .map(ImageDescriptor::new)
                .collect(),
        })
    }

    async fn fetch_asset(&self, url: &str) -> Result<ByteStream, BackendError> {
        let stream = self.client.download(url).await?;
        Ok(Box::pin(stream.map(|chunk| chunk.map_err(BackendError::from))))
    }
}

fn into_reply(response: ChatResponse) -> ModelReply {
    if let Some(ref usage) = response.usage {
        tracing::debug!(
            response_id = %response.id,
            model = %response.model,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "Chat completion received"
        );
    }
    match response.finish_reason {
        // A cut-off reply will not decode as a story object.
        FinishReason::Length => tracing::warn!(
            response_id = %response.id,
            "Chat completion hit the token limit; reply is truncated"
        ),
        FinishReason::ContentFilter => tracing::warn!(
            response_id = %response.id,
            "Chat completion was stopped by the content filter"
        ),
        FinishReason::Stop => {}
    }

    ModelReply {
        role: from_client_role(response.message.role),
        content: response.message.content,
    }
}

fn to_client_role(role: Role) -> openai::Role {
    match role {
        Role::Developer => openai::Role::Developer,
        Role::User => openai::Role::User,
        Role::Assistant => openai::Role::Assistant,
    }
}

fn from_client_role(role: openai::Role) -> Role {
    match role {
        openai::Role::System | openai::Role::Developer => Role::Developer,
        openai::Role::User => Role::User,
        openai::Role::Assistant => Role::Assistant,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_mapping_round_trips() {
        for role in [Role::Developer, Role::User, Role::Assistant] {
            assert_eq!(from_client_role(to_client_role(role)), role);
        }
        assert_eq!(from_client_role(openai::Role::System), Role::Developer);
    }

    #[test]
    fn test_truncated_reply_passes_content_through() {
        let response = ChatResponse {
            id: "chatcmpl-9".to_string(),
            model: "gpt-4o".to_string(),
            message: openai::ReplyMessage {
                role: openai::Role::Assistant,
                content: serde_json::json!("{\"story\":\"The do"),
            },
            finish_reason: FinishReason::Length,
            usage: Some(openai::Usage {
                prompt_tokens: 300,
                completion_tokens: 8,
            }),
        };

        let reply = into_reply(response);
        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.text().unwrap(), "{\"story\":\"The do");
    }

    #[test]
    fn test_chat_request_uses_config() {
        let config = StoryConfig::new()
            .with_chat_model("gpt-4o-mini")
            .with_max_tokens(256)
            .with_temperature(0.5);
        let backend = OpenAiBackend::new(OpenAi::new("test-key")).with_config(&config);

        let request = backend.chat_request(vec![ChatMessage::user("hi")]);
        assert_eq!(request.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(request.max_tokens, Some(256));
        assert_eq!(request.temperature, Some(0.5));
        assert!(!request.json_output);
    }
}
