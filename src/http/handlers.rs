//! Request handlers for the partner inquiry endpoint.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::inquiry::{Dispatcher, PartnerInquiryRequest, ValidationError};
use crate::ratelimit::{client_ip, rate_limit_headers, PolicyRegistry, Preset, RateLimitHeaders};

/// Path of the partner inquiry endpoint.
pub const PARTNER_INQUIRY_PATH: &str = "/api/partner-inquiry";

const SUBMITTED_MESSAGE: &str = "Your inquiry has been submitted successfully.";

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub policies: Arc<PolicyRegistry>,
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(policies: Arc<PolicyRegistry>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            policies,
            dispatcher,
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(PARTNER_INQUIRY_PATH, post(partner_inquiry))
        .with_state(state)
}

/// Body of a successful submission.
#[derive(Debug, Serialize)]
pub struct SubmissionResponse {
    pub success: bool,
    pub message: &'static str,
}

impl SubmissionResponse {
    fn submitted() -> Json<Self> {
        Json(Self {
            success: true,
            message: SUBMITTED_MESSAGE,
        })
    }
}

/// Failures surfaced to the client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Too many requests. Please wait a moment before trying again.")]
    RateLimited(RateLimitHeaders),

    #[error("Invalid request body")]
    InvalidBody,

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to submit inquiry. Please try again.")]
    Delivery,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InvalidBody | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Delivery => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        let mut response = (self.status(), body).into_response();
        if let ApiError::RateLimited(headers) = &self {
            headers.apply(response.headers_mut());
        }
        response
    }
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Accept a partner inquiry.
///
/// The client is rate limited under [`Preset::FormSubmission`] before the
/// body is looked at. Honeypot submissions get the normal success response
/// so bots learn nothing.
#[instrument(skip_all, fields(client_ip = tracing::field::Empty))]
pub async fn partner_inquiry(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let client = client_ip(&headers);
    tracing::Span::current().record("client_ip", client.as_str());

    let preset = Preset::FormSubmission;
    let result = state.policies.check(preset, &client);
    if !result.allowed {
        warn!(client_ip = %client, "Rate limit exceeded for partner inquiry");
        let limit = state.policies.config(preset).max_requests;
        return Err(ApiError::RateLimited(rate_limit_headers(&result, limit)));
    }

    let request: PartnerInquiryRequest = serde_json::from_slice(&body).map_err(|e| {
        debug!(error = %e, "Rejecting unparseable inquiry body");
        ApiError::InvalidBody
    })?;

    if request.is_spam() {
        info!("Honeypot triggered - likely spam submission blocked");
        return Ok(SubmissionResponse::submitted());
    }

    let inquiry = request.validate().map_err(|e| {
        debug!(reason = %e, "Inquiry failed validation");
        ApiError::from(e)
    })?;

    let reference = inquiry.reference;
    state.dispatcher.dispatch(inquiry).await.map_err(|e| {
        error!(error = %e, %reference, "Partner inquiry could not be relayed");
        ApiError::Delivery
    })?;

    info!(%reference, "Partner inquiry submitted");
    Ok(SubmissionResponse::submitted())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MailConfig;
    use crate::inquiry::testing::RecordingSink;
    use crate::inquiry::{InquirySink, MessageKind};
    use crate::ratelimit::{ManualClock, StoreOptions};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    const VALID_BODY: &str = r#"{
        "fullName": "Morgan Ellis",
        "email": "morgan@ellisagency.example",
        "phone": "555-0100",
        "companyName": "Ellis Insurance Agency",
        "message": "We would like to offer the plan to our clients.",
        "partnerType": "agent",
        "subjectLine": "Agent Partnership"
    }"#;

    fn app_with(sink: Arc<dyn InquirySink>) -> (Router, Arc<PolicyRegistry>) {
        let policies = Arc::new(PolicyRegistry::with_clock(
            StoreOptions::default(),
            Arc::new(ManualClock::new(1_700_000_000_000)),
        ));
        let dispatcher = Arc::new(Dispatcher::new(sink, MailConfig::default()));
        (router(AppState::new(policies.clone(), dispatcher)), policies)
    }

    fn post_inquiry(ip: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(PARTNER_INQUIRY_PATH)
            .header("content-type", "application/json")
            .header("x-forwarded-for", ip)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app_with(Arc::new(RecordingSink::default()));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_valid_submission_is_relayed() {
        let sink = Arc::new(RecordingSink::default());
        let (app, _) = app_with(sink.clone());

        let response = app.oneshot(post_inquiry("203.0.113.5", VALID_BODY)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], SUBMITTED_MESSAGE);

        let delivered = sink.delivered.lock();
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0].inquiry.company_name, "Ellis Insurance Agency");
    }

    #[tokio::test]
    async fn test_sixth_submission_is_rate_limited() {
        let (app, _) = app_with(Arc::new(RecordingSink::default()));

        for _ in 0..5 {
            let response = app
                .clone()
                .oneshot(post_inquiry("198.51.100.20", VALID_BODY))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app
            .clone()
            .oneshot(post_inquiry("198.51.100.20", VALID_BODY))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let headers = response.headers();
        assert_eq!(headers["x-ratelimit-limit"], "5");
        assert_eq!(headers["x-ratelimit-remaining"], "0");
        assert_eq!(headers["x-ratelimit-reset"], "1700000060");
        assert_eq!(
            json_body(response).await["error"],
            "Too many requests. Please wait a moment before trying again."
        );

        // Another client is unaffected.
        let response = app.oneshot(post_inquiry("198.51.100.21", VALID_BODY)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_rejected_requests_still_count_toward_limit() {
        let (app, policies) = app_with(Arc::new(RecordingSink::default()));

        let response = app.oneshot(post_inquiry("192.0.2.44", "not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Invalid request body");

        let store = policies.store(Preset::FormSubmission);
        assert_eq!(store.timestamps("192.0.2.44").map(|t| t.len()), Some(1));
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let (app, _) = app_with(Arc::new(RecordingSink::default()));

        let cases = [
            (r#"{"email":"a@b.co"}"#, "Full name is required"),
            (r#"{"fullName":"A","email":"nope"}"#, "Please provide a valid email address"),
            (
                r#"{"fullName":"A","email":"a@b.co","companyName":"C"}"#,
                "Partner type is required",
            ),
        ];

        for (i, (body, message)) in cases.into_iter().enumerate() {
            let ip = format!("10.1.0.{}", i);
            let response = app.clone().oneshot(post_inquiry(&ip, body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(json_body(response).await["error"], message);
        }
    }

    #[tokio::test]
    async fn test_honeypot_returns_fake_success() {
        let sink = Arc::new(RecordingSink::default());
        let (app, _) = app_with(sink.clone());

        let body = r#"{"fullName":"Bot","email":"bot@spam.example","website":"http://spam.example"}"#;
        let response = app.oneshot(post_inquiry("10.9.9.9", body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["success"], true);
        assert!(sink.delivered.lock().is_empty());
    }

    #[tokio::test]
    async fn test_notification_failure_is_500() {
        let sink = Arc::new(RecordingSink::failing(&[MessageKind::InternalNotification]));
        let (app, _) = app_with(sink);

        let response = app.oneshot(post_inquiry("10.2.2.2", VALID_BODY)).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(response).await["error"],
            "Failed to submit inquiry. Please try again."
        );
    }

    #[tokio::test]
    async fn test_auto_response_failure_still_succeeds() {
        let sink = Arc::new(RecordingSink::failing(&[MessageKind::AutoResponse]));
        let (app, _) = app_with(sink.clone());

        let response = app.oneshot(post_inquiry("10.3.3.3", VALID_BODY)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(sink.delivered.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_client_headers_share_unknown_bucket() {
        let (app, policies) = app_with(Arc::new(RecordingSink::default()));

        let request = Request::post(PARTNER_INQUIRY_PATH)
            .body(Body::from(VALID_BODY))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let store = policies.store(Preset::FormSubmission);
        assert!(store.timestamps("unknown").is_some());
    }
}
