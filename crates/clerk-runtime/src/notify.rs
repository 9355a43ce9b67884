//! Outbound message seam.

use async_trait::async_trait;
use clerk_core::events::OutboundMessage;
use clerk_core::ids::UserId;

/// Delivers outbound messages to the chat transport. Delivery failures are
/// the implementation's problem; the orchestrator fires and forgets.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send one message to one user.
    async fn send(&self, user: &UserId, message: OutboundMessage);
}
