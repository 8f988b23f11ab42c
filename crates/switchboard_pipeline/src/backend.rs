use anyhow::Result;
use switchboard_core::{CallScope, ChatResponse};

/// The agent that understands messages and may run tools. Owns any remote
/// protocol, sessions and retries; the pipeline only sees this call.
///
/// Implementations are shared across concurrent `process` calls.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    async fn process_message_with_user_id(
        &self,
        scope: &CallScope,
        text: &str,
        user_id: &str,
    ) -> Result<ChatResponse>;
}
