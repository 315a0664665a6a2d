//! Partner inquiry intake: validation, spam screening and relay.

mod dispatch;
mod model;

pub use dispatch::{
    DispatchReport, Dispatcher, InquirySink, LogSink, MessageKind, OutboundMessage,
    AUTO_RESPONSE_SUBJECT,
};
pub use model::{
    is_valid_email, PartnerInquiry, PartnerInquiryRequest, ValidationError, DEFAULT_SUBJECT_LINE,
};

#[cfg(test)]
pub(crate) use dispatch::testing;
