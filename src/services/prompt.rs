/// Credential prompt collaborator
use crate::errors::{ApiError, ApiResult};
use async_trait::async_trait;
use tokio::sync::{oneshot, Mutex};

/// Asks the user for the API credential.
#[async_trait]
pub trait CredentialPrompt: Send + Sync {
    /// Suspends until the user confirms an entry. `None` means the prompt was
    /// torn down before any entry arrived.
    async fn request_credential(&self) -> Option<String>;
}

/// Prompt answered through `POST /credential`.
#[derive(Default)]
pub struct HttpCredentialPrompt {
    pending: Mutex<Option<oneshot::Sender<String>>>,
}

impl HttpCredentialPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_pending(&self) -> bool {
        self.pending.lock().await.is_some()
    }

    /// Hand the entered value to the waiting pipeline.
    pub async fn submit(&self, value: String) -> ApiResult<()> {
        let sender = self
            .pending
            .lock()
            .await
            .take()
            .ok_or_else(|| ApiError::Conflict("no credential has been requested".to_string()))?;

        sender
            .send(value)
            .map_err(|_| ApiError::Conflict("credential request was abandoned".to_string()))
    }
}

#[async_trait]
impl CredentialPrompt for HttpCredentialPrompt {
    async fn request_credential(&self) -> Option<String> {
        let (tx, rx) = oneshot::channel();
        *self.pending.lock().await = Some(tx);
        rx.await.ok()
    }
}
