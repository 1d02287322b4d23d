use anyhow::Result;
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse,
    },
};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde_json::Value;

/// What a single generation call produced.
#[derive(Debug, Clone, Default)]
pub struct ModelReply {
    /// Text of the first candidate, if the model produced one.
    pub candidate: Option<String>,
    /// The complete provider response, kept for diagnostics.
    pub raw: Value,
}

/// A hosted text-generation model that answers one prompt per call.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LessonModel: Send + Sync {
    /// Sends `prompt` to the model once. Transport and API failures are errors;
    /// a well-formed response without any usable text is not.
    async fn generate(&self, prompt: &str) -> Result<ModelReply>;
}

/// An implementation of `LessonModel` for any OpenAI-compatible API.
pub struct OpenAICompatibleModel {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAICompatibleModel {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - API key and base URL (OpenAI, or Gemini's OpenAI-compatible endpoint).
    /// * `model` - The model identifier to use for chat completions.
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }
}

#[async_trait]
impl LessonModel for OpenAICompatibleModel {
    async fn generate(&self, prompt: &str) -> Result<ModelReply> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()?
                    .into(),
            ])
            .build()?;

        let response: CreateChatCompletionResponse = self.client.chat().create(request).await?;

        let candidate = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|content| !content.trim().is_empty());
        let raw = serde_json::to_value(&response).unwrap_or_default();

        Ok(ModelReply { candidate, raw })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve_once;
    use serde_json::json;

    fn model_at(base_url: &str) -> OpenAICompatibleModel {
        let config = OpenAIConfig::new()
            .with_api_key("test-key")
            .with_api_base(format!("{}/v1", base_url));
        OpenAICompatibleModel::new(config, "test-model".to_string())
    }

    fn completion(choices: Value) -> String {
        json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1_700_000_000,
            "model": "test-model",
            "choices": choices
        })
        .to_string()
    }

    fn choice(content: Value) -> Value {
        json!([{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }])
    }

    #[tokio::test]
    async fn test_generate_sends_single_user_message() {
        let (base_url, stub) = serve_once(200, &completion(choice(json!("[]")))).await;

        let reply = model_at(&base_url).generate("Teach me extrusion").await.unwrap();
        assert_eq!(reply.candidate.as_deref(), Some("[]"));

        let request = stub.await.unwrap();
        assert!(request.request_line().starts_with("POST /v1/chat/completions "));
        let body = request.body_json();
        assert_eq!(body["model"], "test-model");
        assert_eq!(
            body["messages"],
            json!([{ "role": "user", "content": "Teach me extrusion" }])
        );
    }

    #[tokio::test]
    async fn test_no_choices_is_no_candidate() {
        let (base_url, stub) = serve_once(200, &completion(json!([]))).await;

        let reply = model_at(&base_url).generate("prompt").await.unwrap();
        assert_eq!(reply.candidate, None);
        assert_eq!(reply.raw["choices"], json!([]));
        assert_eq!(reply.raw["id"], "chatcmpl-1");
        stub.await.unwrap();
    }

    #[tokio::test]
    async fn test_null_or_blank_content_is_no_candidate() {
        for content in [Value::Null, json!(""), json!("  \n ")] {
            let (base_url, stub) = serve_once(200, &completion(choice(content.clone()))).await;

            let reply = model_at(&base_url).generate("prompt").await.unwrap();
            assert_eq!(reply.candidate, None, "content {content}");
            stub.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_rejected_request_is_an_error() {
        let (base_url, stub) = serve_once(
            400,
            r#"{"error":{"message":"bad model","type":"invalid_request_error","param":null,"code":null}}"#,
        )
        .await;

        let result = model_at(&base_url).generate("prompt").await;
        assert!(result.is_err());
        stub.await.unwrap();
    }
}
