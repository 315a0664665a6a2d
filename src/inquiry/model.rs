//! Partner inquiry submissions and their validation.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Subject used when the form omits one.
pub const DEFAULT_SUBJECT_LINE: &str = "Partner Inquiry";

lazy_static! {
    static ref EMAIL_PATTERN: Regex =
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid");
}

/// Check an address has the `local@domain.tld` shape.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// The raw form body as posted by the partner contact form.
///
/// Every field is optional at this stage so that a missing field is reported
/// as a validation message rather than a parse failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartnerInquiryRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub message: Option<String>,
    pub partner_type: Option<String>,
    pub subject_line: Option<String>,
    /// Honeypot; hidden from people, so only bots fill it in
    pub website: Option<String>,
}

/// Reasons a submission is rejected, in the order they are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Full name is required")]
    MissingFullName,
    #[error("Email address is required")]
    MissingEmail,
    #[error("Please provide a valid email address")]
    InvalidEmail,
    #[error("Company/Practice name is required")]
    MissingCompanyName,
    #[error("Partner type is required")]
    MissingPartnerType,
}

impl PartnerInquiryRequest {
    /// Whether the honeypot field was filled in.
    pub fn is_spam(&self) -> bool {
        self.website.as_deref().is_some_and(|w| !w.is_empty())
    }

    /// Validate required fields and produce a normalized inquiry.
    pub fn validate(self) -> Result<PartnerInquiry, ValidationError> {
        let full_name = required(self.full_name).ok_or(ValidationError::MissingFullName)?;
        let raw_email = self.email.unwrap_or_default();
        if raw_email.trim().is_empty() {
            return Err(ValidationError::MissingEmail);
        }
        // Matched as submitted, so surrounding whitespace is rejected.
        if !is_valid_email(&raw_email) {
            return Err(ValidationError::InvalidEmail);
        }
        let email = raw_email;
        let company_name =
            required(self.company_name).ok_or(ValidationError::MissingCompanyName)?;
        let partner_type =
            required(self.partner_type).ok_or(ValidationError::MissingPartnerType)?;

        Ok(PartnerInquiry {
            reference: Uuid::new_v4(),
            received_at: Utc::now(),
            full_name,
            email,
            phone: required(self.phone),
            company_name,
            message: required(self.message),
            partner_type,
            subject_line: required(self.subject_line)
                .unwrap_or_else(|| DEFAULT_SUBJECT_LINE.to_string()),
        })
    }
}

/// Trimmed value, or `None` if absent or blank.
fn required(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A validated partner inquiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerInquiry {
    /// Reference assigned on acceptance, for log correlation
    pub reference: Uuid,
    pub received_at: DateTime<Utc>,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company_name: String,
    pub message: Option<String>,
    pub partner_type: String,
    pub subject_line: String,
}
