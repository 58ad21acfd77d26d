//! Admission pipeline: authenticate, rate-limit, run the handler, redact.

use crate::config::SecurityConfig;
use crate::error::{GatewayErrorKind, McpError, Result};
use crate::protocol::RequestContext;
use crate::security::{KeyAuthenticator, RateLimiter, Redactor};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Status used for every rejection unless overridden.
pub const DEFAULT_REJECTION_STATUS: u16 = 401;

/// Per-request stages, in the order they are reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionStage {
    Unauthenticated,
    Authenticated,
    RateChecked,
    HandlerExecuting,
    ResponseMasked,
    Complete,
    Rejected,
}

/// Maps error kinds to response status codes.
#[derive(Debug, Clone)]
pub struct StatusPolicy {
    default: u16,
    overrides: HashMap<GatewayErrorKind, u16>,
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self {
            default: DEFAULT_REJECTION_STATUS,
            overrides: HashMap::new(),
        }
    }
}

impl StatusPolicy {
    pub fn from_config(config: &SecurityConfig) -> Self {
        Self::default().with_status(GatewayErrorKind::RateLimitExceeded, config.rate_limit_status)
    }

    pub fn with_status(mut self, kind: GatewayErrorKind, status: u16) -> Self {
        self.overrides.insert(kind, status);
        self
    }

    pub fn status_for(&self, error: &McpError) -> u16 {
        match error {
            McpError::Gateway(e) => self
                .overrides
                .get(&e.kind())
                .copied()
                .unwrap_or(self.default),
            _ => self.default,
        }
    }
}

/// What the pipeline hands back to the transport.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineResponse {
    pub status: u16,
    pub body: Value,
}

impl PipelineResponse {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn rejected(status: u16, message: String) -> Self {
        Self {
            status,
            body: json!({ "error": message }),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The rejection message, if this is an error envelope.
    pub fn error_message(&self) -> Option<&str> {
        if self.is_success() {
            return None;
        }
        self.body.get("error").and_then(Value::as_str)
    }
}

/// Wraps every inbound operation.
///
/// Stages run strictly in order and the first failure ends the request with
/// an `{"error": message}` envelope. Only successful bodies are redacted.
pub struct AdmissionPipeline {
    authenticator: KeyAuthenticator,
    rate_limiter: Arc<RateLimiter>,
    redactor: Redactor,
    status: StatusPolicy,
}

impl AdmissionPipeline {
    pub fn new(
        authenticator: KeyAuthenticator,
        rate_limiter: Arc<RateLimiter>,
        redactor: Redactor,
        status: StatusPolicy,
    ) -> Self {
        Self {
            authenticator,
            rate_limiter,
            redactor,
            status,
        }
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    /// Run `handler` behind authentication and rate limiting, then redact.
    pub async fn admit<F, Fut>(&self, ctx: &RequestContext, handler: F) -> PipelineResponse
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        let mut stage = AdmissionStage::Unauthenticated;

        match self.run(ctx, handler, &mut stage).await {
            Ok(body) => {
                stage = AdmissionStage::Complete;
                debug!(method = %ctx.method, ?stage, "Request complete");
                PipelineResponse::ok(body)
            }
            Err(e) => {
                let failed_at = stage;
                stage = AdmissionStage::Rejected;
                let status = self.status.status_for(&e);
                warn!(method = %ctx.method, ?failed_at, ?stage, status, "Request rejected: {}", e);
                PipelineResponse::rejected(status, e.to_string())
            }
        }
    }

    async fn run<F, Fut>(
        &self,
        ctx: &RequestContext,
        handler: F,
        stage: &mut AdmissionStage,
    ) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        self.authenticator.authenticate(ctx.api_key())?;
        *stage = AdmissionStage::Authenticated;

        self.rate_limiter
            .check(ctx.caller_identity().unwrap_or_default())?;
        *stage = AdmissionStage::RateChecked;
        debug!(method = %ctx.method, stage = ?*stage, "Admitted");

        *stage = AdmissionStage::HandlerExecuting;
        let body = handler().await?;

        let masked = self.redactor.mask(&body);
        *stage = AdmissionStage::ResponseMasked;
        Ok(masked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GatewayError, ToolError};
    use crate::security::RateLimiterBuilder;
    use crate::security::mocks::ManualClock;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn pipeline(limit: u32, status: StatusPolicy) -> AdmissionPipeline {
        let limiter = RateLimiterBuilder::new()
            .limit(limit)
            .window(Duration::from_secs(60))
            .clock(Arc::new(ManualClock::new(0)))
            .build();
        AdmissionPipeline::new(
            KeyAuthenticator::new("secret"),
            Arc::new(limiter),
            Redactor::default(),
            status,
        )
    }

    async fn fails(error: impl Into<McpError>) -> Result<Value> {
        Err(error.into())
    }

    fn ctx(key: Option<&str>, client: Option<&str>) -> RequestContext {
        let mut ctx = RequestContext::for_method("tools/call");
        if let Some(key) = key {
            ctx = ctx.with_header("x-api-key", key);
        }
        if let Some(client) = client {
            ctx = ctx.with_header("x-client-id", client);
        }
        ctx
    }

    #[tokio::test]
    async fn test_success_is_masked() {
        let pipeline = pipeline(10, StatusPolicy::default());
        let response = pipeline
            .admit(&ctx(Some("secret"), None), || async {
                Ok(json!([{"id": 1, "password": "hunter2"}]))
            })
            .await;

        assert!(response.is_success());
        assert_eq!(response.body, json!([{"id": 1, "password": "********"}]));
    }

    #[tokio::test]
    async fn test_invalid_key_skips_handler() {
        let pipeline = pipeline(10, StatusPolicy::default());
        let called = AtomicBool::new(false);

        let response = pipeline
            .admit(&ctx(Some("wrong"), None), || async {
                called.store(true, Ordering::SeqCst);
                Ok(Value::Null)
            })
            .await;

        assert_eq!(response.status, 401);
        assert_eq!(response.body, json!({"error": "Invalid API key"}));
        assert!(!called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_missing_key() {
        let pipeline = pipeline(10, StatusPolicy::default());
        let response = pipeline
            .admit(&ctx(None, Some("client")), || async { Ok(Value::Null) })
            .await;

        assert_eq!(response.status, 401);
        assert_eq!(response.error_message(), Some("API key is required"));
    }

    #[tokio::test]
    async fn test_rate_limit_by_client_id() {
        let pipeline = pipeline(1, StatusPolicy::default());

        let first = pipeline
            .admit(&ctx(Some("secret"), Some("a")), || async { Ok(json!(1)) })
            .await;
        let second = pipeline
            .admit(&ctx(Some("secret"), Some("a")), || async { Ok(json!(2)) })
            .await;
        let other_client = pipeline
            .admit(&ctx(Some("secret"), Some("b")), || async { Ok(json!(3)) })
            .await;

        assert!(first.is_success());
        assert_eq!(second.status, 401);
        assert_eq!(second.error_message(), Some("Rate limit exceeded"));
        assert!(other_client.is_success());
    }

    #[tokio::test]
    async fn test_rate_limit_defaults_to_api_key_identity() {
        let pipeline = pipeline(1, StatusPolicy::default());
        pipeline
            .admit(&ctx(Some("secret"), None), || async { Ok(json!(1)) })
            .await;
        pipeline
            .admit(&ctx(Some("secret"), None), || async { Ok(json!(1)) })
            .await;

        assert_eq!(pipeline.rate_limiter().count("secret", 0), 1);
    }

    #[tokio::test]
    async fn test_configurable_rate_limit_status() {
        let policy = StatusPolicy::default().with_status(GatewayErrorKind::RateLimitExceeded, 429);
        let pipeline = pipeline(0, policy);

        let response = pipeline
            .admit(&ctx(Some("secret"), None), || async { Ok(Value::Null) })
            .await;
        assert_eq!(response.status, 429);

        let rejected_key = pipeline
            .admit(&ctx(Some("nope"), None), || async { Ok(Value::Null) })
            .await;
        assert_eq!(rejected_key.status, 401);
    }

    #[tokio::test]
    async fn test_handler_errors_become_envelopes() {
        let pipeline = pipeline(10, StatusPolicy::default());

        let timeout = pipeline
            .admit(&ctx(Some("secret"), None), || fails(GatewayError::QueryTimeout))
            .await;
        assert_eq!(timeout.status, 401);
        assert_eq!(timeout.body, json!({"error": "Query execution timed out"}));

        let bad_args = pipeline
            .admit(&ctx(Some("secret"), None), || {
                fails(ToolError::InvalidArguments("missing field".into()))
            })
            .await;
        assert_eq!(bad_args.error_message(), Some("Tool error: Invalid arguments: missing field"));
    }

    #[test]
    fn test_status_policy_from_config() {
        let config = SecurityConfig {
            rate_limit_status: 429,
            ..SecurityConfig::default()
        };
        let policy = StatusPolicy::from_config(&config);
        assert_eq!(policy.status_for(&GatewayError::RateLimitExceeded.into()), 429);
        assert_eq!(policy.status_for(&GatewayError::InvalidApiKey.into()), 401);
    }
}
