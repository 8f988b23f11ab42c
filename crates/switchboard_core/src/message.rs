use crate::error::{AppError, ErrorCode};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

// ============================================================================
// Platform
// ============================================================================

/// Messaging surface a message arrived on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Platform {
    Feishu,
    Discord,
    /// Any other tag, passed through untouched.
    Other(String),
}

impl Platform {
    pub fn as_str(&self) -> &str {
        match self {
            Platform::Feishu => "feishu",
            Platform::Discord => "discord",
            Platform::Other(tag) => tag,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Platform::from(s))
    }
}

impl From<&str> for Platform {
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "feishu" | "lark" => Platform::Feishu,
            "discord" => Platform::Discord,
            _ => Platform::Other(s.to_string()),
        }
    }
}

impl Serialize for Platform {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Platform {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(Platform::from(tag.as_str()))
    }
}

// ============================================================================
// Inbound message
// ============================================================================

pub type ReplyFuture = BoxFuture<'static, anyhow::Result<()>>;

/// Callback a platform adapter installs so the message can be answered.
pub type ReplyFn = Arc<dyn Fn(String) -> ReplyFuture + Send + Sync>;

/// Platform-agnostic inbound message.
#[derive(Clone)]
pub struct Message {
    pub id: String,
    pub user_id: String,
    pub platform: Platform,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Open metadata from the adapter. Only string values are forwarded to
    /// the backend.
    pub metadata: HashMap<String, Value>,
    reply: Option<ReplyFn>,
}

impl Message {
    pub fn new(user_id: &str, platform: Platform, text: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            platform,
            text: text.to_string(),
            timestamp: Utc::now(),
            metadata: HashMap::new(),
            reply: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn with_reply<F>(mut self, reply: F) -> Self
    where
        F: Fn(String) -> ReplyFuture + Send + Sync + 'static,
    {
        self.reply = Some(Arc::new(reply));
        self
    }

    pub fn can_reply(&self) -> bool {
        self.reply.is_some()
    }

    /// Send `text` back through the platform callback.
    pub async fn reply(&self, text: &str) -> Result<(), AppError> {
        let Some(reply) = self.reply.as_ref() else {
            return Err(AppError::delivery(format!(
                "message {} has no reply channel",
                self.id
            )));
        };
        reply(text.to_string()).await.map_err(|e| {
            AppError::wrap(ErrorCode::MessageDelivery, "reply callback failed", e)
                .with_request_id(self.id.clone())
        })
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("platform", &self.platform)
            .field("text", &self.text)
            .field("timestamp", &self.timestamp)
            .field("metadata", &self.metadata)
            .field("reply", &self.reply.is_some())
            .finish()
    }
}

// ============================================================================
// Backend request / response
// ============================================================================

/// What the backend is asked to handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub text: String,
    pub user_id: String,
    pub platform: Platform,
    pub metadata: BTreeMap<String, String>,
}

/// What the backend answered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub text: String,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl ChatResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Record the tool the backend invoked while answering.
    pub fn with_tool(mut self, tool_name: &str) -> Self {
        self.tool_name = Some(tool_name.to_string());
        self
    }

    pub fn with_data(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }
}

// ============================================================================
// Outbound response
// ============================================================================

/// Reply handed back to the platform adapter. `error` is set when the text
/// is a translated failure rather than a real answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub text: String,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorCode>,
}

impl Response {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn failure(text: impl Into<String>, code: ErrorCode) -> Self {
        Self {
            text: text.into(),
            data: Map::new(),
            error: Some(code),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn test_platform_parse() {
        assert_eq!(Platform::from("feishu"), Platform::Feishu);
        assert_eq!(Platform::from("Lark"), Platform::Feishu);
        assert_eq!(Platform::from("DISCORD"), Platform::Discord);
        assert_eq!(Platform::from("slack"), Platform::Other("slack".into()));
        assert_eq!(Platform::Other("slack".into()).to_string(), "slack");
    }

    #[test]
    fn test_platform_serde_as_string() {
        let json = serde_json::to_string(&Platform::Discord).unwrap();
        assert_eq!(json, "\"discord\"");
        let back: Platform = serde_json::from_str("\"web\"").unwrap();
        assert_eq!(back, Platform::Other("web".into()));
    }

    #[test]
    fn test_message_builder() {
        let msg = Message::new("u1", Platform::Discord, "hello")
            .with_id("m1")
            .with_metadata("channel", "general")
            .with_metadata("priority", 3);
        assert_eq!(msg.id, "m1");
        assert_eq!(msg.metadata["channel"], json!("general"));
        assert_eq!(msg.metadata["priority"], json!(3));
        assert!(!msg.can_reply());
    }

    #[test]
    fn test_chat_response_builder() {
        let chat = ChatResponse::text("done")
            .with_tool("echo")
            .with_data("count", 2);
        assert_eq!(chat.text, "done");
        assert_eq!(chat.tool_name.as_deref(), Some("echo"));
        assert_eq!(chat.data["count"], json!(2));
        assert!(ChatResponse::text("plain").tool_name.is_none());
    }

    #[tokio::test]
    async fn test_reply_without_callback_is_delivery_error() {
        let msg = Message::new("u1", Platform::Discord, "hello");
        let err = msg.reply("hi").await.unwrap_err();
        assert!(err.is_code(ErrorCode::MessageDelivery));
    }

    #[tokio::test]
    async fn test_reply_invokes_callback() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sink = sent.clone();
        let msg = Message::new("u1", Platform::Feishu, "hello").with_reply(move |text| {
            sink.lock().unwrap().push(text);
            async { Ok(()) }.boxed()
        });
        msg.reply("pong").await.unwrap();
        assert_eq!(*sent.lock().unwrap(), vec!["pong".to_string()]);
    }

    #[tokio::test]
    async fn test_reply_callback_failure_is_wrapped() {
        let msg = Message::new("u1", Platform::Feishu, "hello")
            .with_id("m9")
            .with_reply(|_| async { Err(anyhow::anyhow!("socket closed")) }.boxed());
        let err = msg.reply("pong").await.unwrap_err();
        assert!(err.is_code(ErrorCode::MessageDelivery));
        assert_eq!(err.request_id(), Some("m9"));
        assert!(err.cause().is_some());
    }

    #[test]
    fn test_response_failure() {
        let resp = Response::failure("nope", ErrorCode::Internal);
        assert!(resp.is_error());
        assert!(!Response::text("ok").is_error());
    }
}
