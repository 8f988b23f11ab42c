use crate::error::Interrupt;
use crate::message::Platform;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Per-call state threaded explicitly through the pipeline, the backend and
/// into tool bodies: who is talking, on which platform, and when to stop.
///
/// Cloning a scope shares its cancellation token. Use [`CallScope::child`] or
/// [`CallScope::with_timeout`] to get a scope that can be cancelled on its
/// own without affecting the parent.
#[derive(Debug, Clone, Default)]
pub struct CallScope {
    pub conversation_id: Option<String>,
    pub user_id: Option<String>,
    pub platform: Option<Platform>,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CallScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(earliest(self.deadline, deadline));
        self
    }

    /// A child scope: same identity, its own cancellation token that is also
    /// cancelled whenever this scope is.
    pub fn child(&self) -> Self {
        Self {
            conversation_id: self.conversation_id.clone(),
            user_id: self.user_id.clone(),
            platform: self.platform.clone(),
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
        }
    }

    /// A child scope whose deadline is `timeout` from now, or the parent's
    /// deadline if that comes first. A timeout too large to represent as an
    /// instant leaves the parent's deadline (if any) in force.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let mut child = self.child();
        if let Some(candidate) = Instant::now().checked_add(timeout) {
            child.deadline = Some(earliest(self.deadline, candidate));
        }
        child
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Resolves once the scope is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    /// Resolves with the reason the scope ended: cancellation, or the
    /// deadline passing. Never resolves for a scope with neither.
    pub async fn done(&self) -> Interrupt {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.cancel.cancelled() => Interrupt::Cancelled,
                _ = tokio::time::sleep_until(deadline) => Interrupt::DeadlineExceeded,
            },
            None => {
                self.cancel.cancelled().await;
                Interrupt::Cancelled
            }
        }
    }
}

fn earliest(current: Option<Instant>, candidate: Instant) -> Instant {
    match current {
        Some(existing) if existing < candidate => existing,
        _ => candidate,
    }
}
