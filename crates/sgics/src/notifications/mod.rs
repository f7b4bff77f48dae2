//! Participant e-mail notifications.
//!
//! Templates are rendered in-process and handed to a [`Mailer`]. Delivery failures are
//! logged and never roll back the workflow change that triggered them.

pub mod templates;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, info, warn};

pub use templates::{format_clp, render_text, EmailTemplate, RenderedEmail, TemplateError};

/// Message handed to a mailer transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub template: EmailTemplate,
    pub subject: String,
    pub body: String,
}

/// Outbound transport (SMTP relay, provider API, log sink).
pub trait Mailer: Send + Sync {
    fn send(&self, email: OutgoingEmail) -> Result<(), MailError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail transport unavailable: {0}")]
    Transport(String),
}

/// Keeps every message in memory; used by tests and the CLI demo.
#[derive(Default, Clone)]
pub struct InMemoryMailer {
    outbox: Arc<Mutex<Vec<OutgoingEmail>>>,
}

impl InMemoryMailer {
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.outbox
            .lock()
            .map(|outbox| outbox.clone())
            .unwrap_or_default()
    }
}

impl Mailer for InMemoryMailer {
    fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        self.outbox
            .lock()
            .map_err(|_| MailError::Transport("outbox poisoned".to_string()))?
            .push(email);
        Ok(())
    }
}

/// Writes messages to the log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMailer;

impl Mailer for TracingMailer {
    fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        info!(
            to = %email.to,
            template = email.template.key(),
            subject = %email.subject,
            "e-mail dispatched"
        );
        Ok(())
    }
}

/// Renders templates and sends them from the configured address.
#[derive(Clone)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    from_address: String,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, from_address: impl Into<String>) -> Self {
        Self {
            mailer,
            from_address: from_address.into(),
        }
    }

    /// Returns whether a message was handed to the transport.
    pub fn notify(
        &self,
        template: EmailTemplate,
        recipient: Option<&str>,
        context: &BTreeMap<String, String>,
    ) -> bool {
        let Some(to) = recipient.filter(|address| !address.trim().is_empty()) else {
            debug!(template = template.key(), "no recipient address, skipping e-mail");
            return false;
        };

        let rendered = match template.render(context) {
            Ok(rendered) => rendered,
            Err(err) => {
                warn!(template = template.key(), error = %err, "unable to render e-mail");
                return false;
            }
        };

        let email = OutgoingEmail {
            from: self.from_address.clone(),
            to: to.trim().to_string(),
            template,
            subject: rendered.subject,
            body: rendered.body,
        };

        match self.mailer.send(email) {
            Ok(()) => true,
            Err(err) => {
                warn!(template = template.key(), error = %err, "e-mail delivery failed");
                false
            }
        }
    }
}
