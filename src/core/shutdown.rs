// src/core/shutdown.rs

//! The shutdown signal shared by the network loop, the bus loop and any handler that is
//! allowed to stop the gateway.

use tokio_util::sync::CancellationToken;
use tracing::info;

/// A cloneable shutdown signal. Cancelling any clone stops every loop holding one.
#[derive(Debug, Clone, Default)]
pub struct ShutdownContext {
    token: CancellationToken,
}

impl ShutdownContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown. Idempotent.
    pub fn trigger(&self, reason: &str) {
        if !self.token.is_cancelled() {
            info!("Shutdown requested: {}", reason);
        }
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes once shutdown has been requested.
    pub async fn triggered(&self) {
        self.token.cancelled().await
    }

    /// A child token, cancelled together with this context.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }
}
