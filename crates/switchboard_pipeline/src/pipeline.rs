use crate::backend::Backend;
use crate::platform;
use crate::translate;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use switchboard_core::{
    CallScope, ChatRequest, ChatResponse, ErrorCode, Message, Platform, Response,
};

/// Metadata key carrying the originating message id in a [`ChatRequest`].
pub const MESSAGE_ID_KEY: &str = "message_id";

// ============================================================================
// ProcessError
// ============================================================================

/// The backend failed. Carries both the reply to show the user and the
/// original error for logs and metrics.
#[derive(Debug)]
pub struct ProcessError {
    pub message_id: String,
    pub response: Response,
    pub error: anyhow::Error,
}

impl ProcessError {
    pub fn into_response(self) -> Response {
        self.response
    }
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to process message {}", self.message_id)
    }
}

impl std::error::Error for ProcessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.error)
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Inbound message → backend request → platform-formatted reply.
///
/// Holds nothing between calls except the backend handle, so one pipeline
/// can serve any number of concurrent messages.
#[derive(Clone)]
pub struct Pipeline {
    backend: Arc<dyn Backend>,
}

impl Pipeline {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Build the backend request. Only string metadata crosses this
    /// boundary; the message id is added under [`MESSAGE_ID_KEY`].
    pub fn prepare_request(&self, message: &Message) -> ChatRequest {
        let mut metadata: BTreeMap<String, String> = message
            .metadata
            .iter()
            .filter_map(|(k, v)| match v {
                Value::String(s) => Some((k.clone(), s.clone())),
                _ => None,
            })
            .collect();
        metadata.insert(MESSAGE_ID_KEY.to_string(), message.id.clone());

        ChatRequest {
            text: message.text.clone(),
            user_id: message.user_id.clone(),
            platform: message.platform.clone(),
            metadata,
        }
    }

    /// Run one message through the backend.
    ///
    /// Both arms yield a displayable [`Response`]: on failure it sits inside
    /// the [`ProcessError`] next to the original error.
    pub async fn process(
        &self,
        scope: &CallScope,
        message: &Message,
    ) -> Result<Response, ProcessError> {
        let request = self.prepare_request(message);
        tracing::debug!(
            "Processing message {} from {} on {} ({} metadata keys)",
            message.id,
            request.user_id,
            request.platform,
            request.metadata.len()
        );

        let scope = scope
            .clone()
            .with_conversation(message.id.clone())
            .with_user(request.user_id.clone())
            .with_platform(request.platform.clone());

        match self
            .backend
            .process_message_with_user_id(&scope, &request.text, &request.user_id)
            .await
        {
            Ok(chat) => Ok(self.format_response(chat, &message.platform)),
            Err(error) => {
                tracing::warn!(
                    "Backend failed on message {} from {} on {}: {:#}",
                    message.id,
                    message.user_id,
                    message.platform,
                    error
                );
                let response = self
                    .handle_error(Some(&error), &message.platform)
                    .unwrap_or_else(|| {
                        Response::failure(ErrorCode::Internal.user_message(), ErrorCode::Internal)
                    });
                Err(ProcessError {
                    message_id: message.id.clone(),
                    response,
                    error,
                })
            }
        }
    }

    pub fn format_response(&self, chat: ChatResponse, platform: &Platform) -> Response {
        platform::format_response(chat, platform)
    }

    pub fn handle_error(&self, err: Option<&anyhow::Error>, platform: &Platform) -> Option<Response> {
        translate::handle_error(err, platform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Canned;

    #[async_trait::async_trait]
    impl Backend for Canned {
        async fn process_message_with_user_id(
            &self,
            _scope: &CallScope,
            text: &str,
            _user_id: &str,
        ) -> anyhow::Result<ChatResponse> {
            Ok(ChatResponse::text(text))
        }
    }

    #[test]
    fn test_prepare_request_keeps_only_strings() {
        let pipeline = Pipeline::new(Arc::new(Canned));
        let msg = Message::new("u1", Platform::Discord, "hello")
            .with_id("m1")
            .with_metadata("channel", "general")
            .with_metadata("thread", "t-9")
            .with_metadata("priority", 3)
            .with_metadata("urgent", true)
            .with_metadata("tags", json!(["a"]));

        let req = pipeline.prepare_request(&msg);
        assert_eq!(req.text, "hello");
        assert_eq!(req.user_id, "u1");
        assert_eq!(req.platform, Platform::Discord);
        assert_eq!(req.metadata.len(), 3);
        assert_eq!(req.metadata["channel"], "general");
        assert_eq!(req.metadata["thread"], "t-9");
        assert_eq!(req.metadata[MESSAGE_ID_KEY], "m1");
    }

    #[tokio::test]
    async fn test_process_success() {
        let pipeline = Pipeline::new(Arc::new(Canned));
        let msg = Message::new("u1", Platform::Other("web".into()), "ping");
        let resp = pipeline.process(&CallScope::new(), &msg).await.unwrap();
        assert_eq!(resp.text, "ping");
        assert!(!resp.is_error());
    }
}
