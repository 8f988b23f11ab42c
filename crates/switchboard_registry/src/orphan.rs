use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Keeps track of executions whose caller stopped waiting.
///
/// An adopted task has already had its cancellation token fired. It gets
/// `grace` to wind down; after that it is aborted at its next await point.
/// Tasks stuck in blocking code cannot be aborted and stay counted as live
/// until they return.
#[derive(Debug, Clone)]
pub struct OrphanSupervisor {
    grace: Duration,
    live: Arc<AtomicUsize>,
    total: Arc<AtomicU64>,
}

impl OrphanSupervisor {
    pub fn new(grace: Duration) -> Self {
        Self {
            grace,
            live: Arc::new(AtomicUsize::new(0)),
            total: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Orphaned executions still running.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Executions orphaned since start.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }

    pub fn adopt<T: Send + 'static>(&self, tool: &str, mut handle: JoinHandle<T>) {
        self.live.fetch_add(1, Ordering::SeqCst);
        self.total.fetch_add(1, Ordering::SeqCst);

        let live = self.live.clone();
        let grace = self.grace;
        let tool = tool.to_string();
        tokio::spawn(async move {
            match tokio::time::timeout(grace, &mut handle).await {
                Ok(_) => {
                    tracing::info!(
                        "Abandoned execution of '{}' finished after its caller gave up; result discarded",
                        tool
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        "Abandoned execution of '{}' ignored cancellation for {:?}, aborting",
                        tool,
                        grace
                    );
                    handle.abort();
                    let _ = handle.await;
                }
            }
            live.fetch_sub(1, Ordering::SeqCst);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_finished_orphan_is_released() {
        let supervisor = OrphanSupervisor::new(Duration::from_secs(5));
        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_millis(10)).await;
        });
        supervisor.adopt("quick", handle);
        assert_eq!(supervisor.live(), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(supervisor.live(), 0);
        assert_eq!(supervisor.total(), 1);
    }

    #[tokio::test]
    async fn test_stubborn_orphan_is_aborted_after_grace() {
        let supervisor = OrphanSupervisor::new(Duration::from_millis(20));
        let finished = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = finished.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            flag.store(true, Ordering::SeqCst);
        });
        supervisor.adopt("stubborn", handle);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(supervisor.live(), 0);
        assert!(!finished.load(Ordering::SeqCst));
    }
}
