//! Default notification channels.
//!
//! Real mail transport is an external collaborator; the worker wires
//! [`LoggingEmailChannel`] in until one is injected. SMS and webhook are
//! stubs by contract — type routing is what matters in-core, the
//! transports log and report delivered.

use shopstream_core::channel::{ChannelError, NotificationChannel};
use shopstream_core::message::NotificationMessage;
use std::future::Future;
use std::pin::Pin;

/// Email channel that logs the send and reports delivered.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingEmailChannel;

impl NotificationChannel for LoggingEmailChannel {
    fn name(&self) -> &'static str {
        "email"
    }

    fn send(
        &self,
        notification: &NotificationMessage,
    ) -> Pin<Box<dyn Future<Output = Result<bool, ChannelError>> + Send + '_>> {
        tracing::info!(
            recipient = %notification.recipient,
            subject = %notification.subject,
            template = %notification.template,
            "email notification sent"
        );
        Box::pin(async { Ok(true) })
    }
}

/// SMS stub channel.
#[derive(Clone, Copy, Debug, Default)]
pub struct StubSmsChannel;

impl NotificationChannel for StubSmsChannel {
    fn name(&self) -> &'static str {
        "sms"
    }

    fn send(
        &self,
        notification: &NotificationMessage,
    ) -> Pin<Box<dyn Future<Output = Result<bool, ChannelError>> + Send + '_>> {
        tracing::info!(
            recipient = %notification.recipient,
            "sms notification sent (stub)"
        );
        Box::pin(async { Ok(true) })
    }
}

/// Webhook stub channel.
#[derive(Clone, Copy, Debug, Default)]
pub struct StubWebhookChannel;

impl NotificationChannel for StubWebhookChannel {
    fn name(&self) -> &'static str {
        "webhook"
    }

    fn send(
        &self,
        notification: &NotificationMessage,
    ) -> Pin<Box<dyn Future<Output = Result<bool, ChannelError>> + Send + '_>> {
        tracing::info!(
            recipient = %notification.recipient,
            "webhook notification sent (stub)"
        );
        Box::pin(async { Ok(true) })
    }
}
