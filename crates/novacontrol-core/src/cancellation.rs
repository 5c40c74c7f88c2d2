//! Shutdown signalling for pipeline tasks
//!
//! One token per pipeline; each long-running loop watches a child of it.

use tokio_util::sync::CancellationToken;

/// Wrapper around CancellationToken for pipeline shutdown
#[derive(Clone, Debug)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Ask every task watching this signal to stop
    pub fn request(&self) {
        self.token.cancel();
    }

    pub fn is_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Get a child token for a single task
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Resolves once shutdown has been requested
    pub async fn requested(&self) {
        self.token.cancelled().await
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
