//! Notification channel contract.
//!
//! Mail-template rendering and transport live outside this system; they
//! are consumed only through `send(notification) -> delivered`. SMS and
//! webhook channels satisfy the same contract.

use crate::message::NotificationMessage;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors raised by a channel transport.
#[derive(Error, Debug, Clone)]
pub enum ChannelError {
    /// The transport failed to hand the notification over.
    #[error("send failed via {channel}: {reason}")]
    SendFailed {
        /// The channel that failed.
        channel: String,
        /// What the transport reported.
        reason: String,
    },
}

/// External send contract for a single notification channel.
///
/// `send` resolves to `true` when the channel delivered the notification
/// and `false` when the channel declined it without an error (an
/// undelivered outcome the consumer treats as a processing failure).
pub trait NotificationChannel: Send + Sync {
    /// Channel name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Send a notification through the channel.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::SendFailed`] when the transport errors.
    fn send(
        &self,
        notification: &NotificationMessage,
    ) -> Pin<Box<dyn Future<Output = Result<bool, ChannelError>> + Send + '_>>;
}
