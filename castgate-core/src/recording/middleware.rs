use super::sanitizer::Sanitizer;
use super::types::{current_correlation_id, CorrelationId, CORRELATION_ID_HEADER};
use super::{Direction, EventType, RecordedEvent, RecordingLogger};
use http::{Extensions, HeaderValue};
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result as MiddlewareResult};
use serde_json::json;
use std::time::Instant;

/// Records every outbound Neynar request and its response (or transport error).
pub struct RecordingMiddleware {
    logger: RecordingLogger,
}

impl RecordingMiddleware {
    pub fn new(logger: RecordingLogger) -> Self {
        Self { logger }
    }
}

/// Pick the correlation id for an outbound request.
///
/// An explicit header wins, then a request extension, then the enclosing
/// frame request's scope; otherwise a fresh id is generated.
fn resolve_correlation_id(req: &Request, extensions: &Extensions) -> CorrelationId {
    req.headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| CorrelationId(value.to_string()))
        .or_else(|| extensions.get::<CorrelationId>().cloned())
        .or_else(current_correlation_id)
        .unwrap_or_else(CorrelationId::generate)
}

#[async_trait::async_trait]
impl Middleware for RecordingMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> MiddlewareResult<Response> {
        let correlation_id = resolve_correlation_id(&req, extensions);

        if !req.headers().contains_key(CORRELATION_ID_HEADER) {
            if let Ok(value) = HeaderValue::from_str(&correlation_id.0) {
                req.headers_mut().insert(CORRELATION_ID_HEADER, value);
            }
        }

        let operation = format!("{} {}", req.method(), req.url().path());
        self.logger.record(RecordedEvent::now(
            &correlation_id.0,
            EventType::NeynarApiCall,
            Direction::Request,
            operation.clone(),
            json!({
                "method": req.method().as_str(),
                "url": req.url().as_str(),
                "headers": Sanitizer::sanitize_header_map(req.headers()),
            }),
        ));

        let started = Instant::now();
        let response = next.run(req, extensions).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let event = match &response {
            Ok(resp) => RecordedEvent::now(
                &correlation_id.0,
                EventType::NeynarApiCall,
                Direction::Response,
                format!("response_{}", resp.status().as_u16()),
                json!({
                    "status_code": resp.status().as_u16(),
                    "headers": Sanitizer::sanitize_header_map(resp.headers()),
                    "body_size": resp.content_length(),
                    "elapsed_ms": elapsed_ms,
                }),
            ),
            Err(err) => RecordedEvent::now(
                &correlation_id.0,
                EventType::NeynarApiCall,
                Direction::Response,
                "error",
                json!({
                    "error": err.to_string(),
                    "elapsed_ms": elapsed_ms,
                }),
            ),
        };
        self.logger.record(event.with_metadata("request", operation));

        response
    }
}
