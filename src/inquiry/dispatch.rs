//! Relaying accepted inquiries to their recipients.
//!
//! Every inquiry produces two messages: an internal notification for the
//! partnerships inbox and an auto-response to the submitter. Both are sent
//! concurrently. Only the notification is required to succeed; a failed
//! auto-response is logged and the inquiry still counts as submitted.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, instrument};

use super::model::PartnerInquiry;
use crate::config::MailConfig;
use crate::error::{FormguardError, Result};

/// Subject of the confirmation sent back to the submitter.
pub const AUTO_RESPONSE_SUBJECT: &str = "Thank you for your interest in SLEEK Dental Club";

/// Which of the two per-inquiry messages this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    InternalNotification,
    AutoResponse,
}

/// An addressed message ready for delivery.
///
/// Rendering the body is left to the sink.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub kind: MessageKind,
    pub from: String,
    pub to: String,
    pub reply_to: String,
    pub subject: String,
    pub inquiry: Arc<PartnerInquiry>,
}

impl OutboundMessage {
    /// The notification for the partnerships inbox; replies go to the submitter.
    pub fn internal_notification(mail: &MailConfig, inquiry: Arc<PartnerInquiry>) -> Self {
        Self {
            kind: MessageKind::InternalNotification,
            from: mail.from_address.clone(),
            to: mail.notification_address.clone(),
            reply_to: inquiry.email.clone(),
            subject: format!("{} - {}", inquiry.subject_line, inquiry.full_name),
            inquiry,
        }
    }

    /// The confirmation for the submitter; replies go to the partnerships inbox.
    pub fn auto_response(mail: &MailConfig, inquiry: Arc<PartnerInquiry>) -> Self {
        Self {
            kind: MessageKind::AutoResponse,
            from: mail.from_address.clone(),
            to: inquiry.email.clone(),
            reply_to: mail.notification_address.clone(),
            subject: AUTO_RESPONSE_SUBJECT.to_string(),
            inquiry,
        }
    }
}

/// Destination for outbound inquiry messages.
#[async_trait]
pub trait InquirySink: Send + Sync {
    /// Deliver one message.
    async fn deliver(&self, message: &OutboundMessage) -> Result<()>;
}

/// A sink that records deliveries in the structured log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl InquirySink for LogSink {
    async fn deliver(&self, message: &OutboundMessage) -> Result<()> {
        info!(
            reference = %message.inquiry.reference,
            kind = ?message.kind,
            to = %message.to,
            reply_to = %message.reply_to,
            subject = %message.subject,
            partner_type = %message.inquiry.partner_type,
            "Inquiry message delivered"
        );
        Ok(())
    }
}

/// What happened to the two messages of a dispatched inquiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub auto_response_delivered: bool,
}

/// Sends the messages for each accepted inquiry through a sink.
pub struct Dispatcher {
    sink: Arc<dyn InquirySink>,
    mail: MailConfig,
}

impl Dispatcher {
    /// Create a dispatcher over `sink`.
    pub fn new(sink: Arc<dyn InquirySink>, mail: MailConfig) -> Self {
        Self { sink, mail }
    }

    /// Deliver both messages for `inquiry`.
    ///
    /// Fails only if the internal notification could not be delivered.
    #[instrument(skip(self, inquiry), fields(reference = %inquiry.reference))]
    pub async fn dispatch(&self, inquiry: PartnerInquiry) -> Result<DispatchReport> {
        let inquiry = Arc::new(inquiry);
        let notification = OutboundMessage::internal_notification(&self.mail, inquiry.clone());
        let confirmation = OutboundMessage::auto_response(&self.mail, inquiry);

        let (notified, confirmed) = futures::join!(
            self.sink.deliver(&notification),
            self.sink.deliver(&confirmation)
        );

        if let Err(e) = &confirmed {
            error!(error = %e, "Failed to send auto-response");
        }

        if let Err(e) = notified {
            error!(error = %e, "Failed to send internal notification");
            return Err(FormguardError::Delivery(format!(
                "internal notification failed: {}",
                e
            )));
        }

        Ok(DispatchReport {
            auto_response_delivered: confirmed.is_ok(),
        })
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("mail", &self.mail)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;

    /// Records deliveries and fails the configured message kinds.
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub delivered: Mutex<Vec<OutboundMessage>>,
        pub fail: Vec<MessageKind>,
    }

    impl RecordingSink {
        pub(crate) fn failing(kinds: &[MessageKind]) -> Self {
            Self {
                delivered: Mutex::new(Vec::new()),
                fail: kinds.to_vec(),
            }
        }
    }

    #[async_trait]
    impl InquirySink for RecordingSink {
        async fn deliver(&self, message: &OutboundMessage) -> Result<()> {
            if self.fail.contains(&message.kind) {
                return Err(FormguardError::Delivery("provider unavailable".to_string()));
            }
            self.delivered.lock().push(message.clone());
            Ok(())
        }
    }
}
