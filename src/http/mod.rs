//! HTTP surface: the partner inquiry endpoint guarded by the rate limiter.

mod handlers;
mod server;

pub use handlers::{
    partner_inquiry, router, ApiError, AppState, SubmissionResponse, PARTNER_INQUIRY_PATH,
};
pub use server::HttpServer;
