use crate::error::SyncError;
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// Cancellation shared by everything taking part in one sync session,
/// together with the first error that caused it.
#[derive(Clone, Debug)]
pub struct SyncContext {
    token: CancellationToken,
    cause: Arc<OnceLock<SyncError>>,
}

impl SyncContext {
    /// Creates a session context that is also cancelled when `parent` is.
    pub fn new(parent: &CancellationToken) -> Self {
        SyncContext {
            token: parent.child_token(),
            cause: Arc::new(OnceLock::new()),
        }
    }

    /// Records `err` as the session's cause and cancels. The first cause wins;
    /// later ones are only logged.
    pub fn cancel_with(&self, err: SyncError) {
        match self.cause.set(err) {
            Ok(()) => {
                if let Some(cause) = self.cause.get() {
                    error!(error = %cause, "Sync session failed, cancelling");
                }
            }
            Err(dropped) => {
                warn!(error = %dropped, "Additional error after session cancellation");
            }
        }
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// The recorded cause, `Cancelled` if cancellation came from the parent,
    /// or `None` while the session is live.
    pub fn cause(&self) -> Option<SyncError> {
        if let Some(cause) = self.cause.get() {
            return Some(cause.clone());
        }
        self.token.is_cancelled().then_some(SyncError::Cancelled)
    }

    pub fn check(&self) -> Result<(), SyncError> {
        match self.cause() {
            Some(cause) => Err(cause),
            None => Ok(()),
        }
    }
}
