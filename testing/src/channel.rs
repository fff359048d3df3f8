//! Notification channel doubles.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use shopstream_core::channel::{ChannelError, NotificationChannel};
use shopstream_core::message::NotificationMessage;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

/// A channel that records everything handed to it.
///
/// Resolves `true` (delivered) by default; [`RecordingChannel::declining`]
/// builds one that resolves `false` without erroring, the "channel
/// declined" outcome.
pub struct RecordingChannel {
    name: &'static str,
    deliver: bool,
    sent: Mutex<Vec<NotificationMessage>>,
}

impl RecordingChannel {
    /// A channel that accepts and delivers everything.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            deliver: true,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// A channel that accepts everything but delivers nothing.
    #[must_use]
    pub fn declining(name: &'static str) -> Self {
        Self {
            name,
            deliver: false,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Everything sent through this channel, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<NotificationMessage> {
        self.sent.lock().unwrap().clone()
    }
}

impl NotificationChannel for RecordingChannel {
    fn name(&self) -> &'static str {
        self.name
    }

    fn send(
        &self,
        notification: &NotificationMessage,
    ) -> Pin<Box<dyn Future<Output = Result<bool, ChannelError>> + Send + '_>> {
        self.sent.lock().unwrap().push(notification.clone());
        let deliver = self.deliver;
        Box::pin(async move { Ok(deliver) })
    }
}

/// A channel whose transport always errors.
pub struct FailingChannel {
    name: &'static str,
}

impl FailingChannel {
    /// Create a channel that fails every send.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl NotificationChannel for FailingChannel {
    fn name(&self) -> &'static str {
        self.name
    }

    fn send(
        &self,
        _notification: &NotificationMessage,
    ) -> Pin<Box<dyn Future<Output = Result<bool, ChannelError>> + Send + '_>> {
        let channel = self.name.to_string();
        Box::pin(async move {
            Err(ChannelError::SendFailed {
                channel,
                reason: "transport unavailable".to_string(),
            })
        })
    }
}
