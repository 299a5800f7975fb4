//! Outbound mail abstraction.
//!
//! The auth manager only needs "send this message now". Delivery is
//! synchronous from its point of view; a failing sender surfaces to the
//! caller as a dependency failure.

use anyhow::Result;
use tracing::info;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailMessage {
    pub to_email: String,
    pub subject: String,
    pub body: String,
}

pub trait Mailer: Send + Sync {
    /// Deliver `message` or return why it could not be delivered.
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Development mailer: the log line is the delivery. The server only wires it
/// in debug mode.
#[derive(Clone, Debug, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            subject = %message.subject,
            body = %message.body,
            "mail delivered to log"
        );
        Ok(())
    }
}
