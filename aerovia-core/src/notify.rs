use async_trait::async_trait;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification channel unavailable: {0}")]
    Unavailable(String),
}

/// Seam to the outbound messaging channel (email, push). Fire-and-forget
/// from the core's perspective: callers log failures and move on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, recipient: &str, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// Notifier that only writes to the log stream. Used as the default wiring
/// when no delivery channel is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, recipient: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        info!(recipient, subject, body, "notification dispatched");
        Ok(())
    }
}
