// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! External notifications.
//!
//! The adapter trait carries one concrete transport (SMTP email); the
//! [`Notifier`] resolves configured alias names to (method, address) pairs
//! and fans a message out to each.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use thiserror::Error;
use tracing::{error, info, warn};

/// Errors from notify operations
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("bad address: {0}")]
    BadAddress(String),
    #[error("message build failed: {0}")]
    Build(String),
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Adapter for delivering one notification to one address.
#[async_trait]
pub trait NotifyAdapter: Send + Sync {
    async fn notify(&self, address: &str, subject: &str, message: &str)
        -> Result<(), NotifyError>;
}

/// SMTP delivery settings, from `notifications.email`.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub sender: String,
    pub use_ssl: bool,
    pub credentials: Option<(String, String)>,
}

/// Email notification adapter over SMTP.
pub struct EmailNotifyAdapter {
    config: EmailConfig,
}

impl EmailNotifyAdapter {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn send_blocking(config: &EmailConfig, address: &str, subject: &str, message: &str)
        -> Result<(), NotifyError> {
        let from: Mailbox = config
            .sender
            .parse()
            .map_err(|_| NotifyError::BadAddress(config.sender.clone()))?;
        let to: Mailbox = address
            .parse()
            .map_err(|_| NotifyError::BadAddress(address.to_string()))?;
        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .body(message.to_string())
            .map_err(|e| NotifyError::Build(e.to_string()))?;

        let mut builder = if config.use_ssl {
            SmtpTransport::relay(&config.smtp_host)
                .map_err(|e| NotifyError::SendFailed(e.to_string()))?
        } else {
            SmtpTransport::builder_dangerous(&config.smtp_host)
        };
        if let Some((ref username, ref password)) = config.credentials {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }
        builder
            .build()
            .send(&email)
            .map_err(|e| NotifyError::SendFailed(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl NotifyAdapter for EmailNotifyAdapter {
    async fn notify(
        &self,
        address: &str,
        subject: &str,
        message: &str,
    ) -> Result<(), NotifyError> {
        let config = self.config.clone();
        let address = address.to_string();
        let subject = subject.to_string();
        let message = message.to_string();
        info!(%address, %subject, "sending email notification");
        // The SMTP client is synchronous; run it on the blocking pool so a
        // slow mail server never stalls the async runtime.
        tokio::task::spawn_blocking(move || {
            Self::send_blocking(&config, &address, &subject, &message)
        })
        .await
        .map_err(|e| NotifyError::SendFailed(e.to_string()))?
    }
}

/// Adapter used when no notification transport is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpNotifyAdapter;

#[async_trait]
impl NotifyAdapter for NoOpNotifyAdapter {
    async fn notify(
        &self,
        address: &str,
        subject: &str,
        _message: &str,
    ) -> Result<(), NotifyError> {
        info!(%address, %subject, "notification dropped (no transport configured)");
        Ok(())
    }
}

/// Recording adapter for tests.
#[cfg(any(test, feature = "test-support"))]
#[derive(Clone, Default)]
pub struct FakeNotifyAdapter {
    calls: Arc<parking_lot::Mutex<Vec<NotifyCall>>>,
}

/// One recorded notification.
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyCall {
    pub address: String,
    pub subject: String,
    pub message: String,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeNotifyAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<NotifyCall> {
        self.calls.lock().clone()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl NotifyAdapter for FakeNotifyAdapter {
    async fn notify(
        &self,
        address: &str,
        subject: &str,
        message: &str,
    ) -> Result<(), NotifyError> {
        self.calls.lock().push(NotifyCall {
            address: address.to_string(),
            subject: subject.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}

const EMAIL_METHOD: &str = "email";
const DEFAULT_SUBJECT: &str = "Stargate";

/// Resolves alias names to recipients and dispatches to the adapter.
pub struct Notifier {
    /// alias -> [(method, address)]
    aliases: HashMap<String, Vec<(String, String)>>,
    adapter: Arc<dyn NotifyAdapter>,
}

impl Notifier {
    pub fn new(
        aliases: HashMap<String, Vec<(String, String)>>,
        adapter: Arc<dyn NotifyAdapter>,
    ) -> Arc<Self> {
        Arc::new(Self { aliases, adapter })
    }

    /// Whether the alias exists and every recipient uses a supported method.
    pub fn can_notify(&self, alias: &str) -> bool {
        match self.aliases.get(alias) {
            Some(recipients) => recipients
                .iter()
                .all(|(method, _)| method == EMAIL_METHOD),
            None => {
                error!(%alias, "no notify alias configured");
                false
            }
        }
    }

    /// Send `message` to every recipient of `alias`. Returns whether every
    /// delivery attempt succeeded.
    pub async fn notify(&self, alias: &str, subject: Option<&str>, message: &str) -> bool {
        let Some(recipients) = self.aliases.get(alias) else {
            error!(%alias, "no notify alias configured");
            return false;
        };
        let subject = subject.unwrap_or(DEFAULT_SUBJECT);
        let mut all_ok = true;
        for (method, address) in recipients {
            if method != EMAIL_METHOD {
                error!(%method, "no notify handler configured for method");
                all_ok = false;
                continue;
            }
            if let Err(e) = self.adapter.notify(address, subject, message).await {
                warn!(%address, error = %e, "notification failed");
                all_ok = false;
            }
        }
        all_ok
    }
}

#[cfg(test)]
#[path = "notify_tests.rs"]
mod tests;
