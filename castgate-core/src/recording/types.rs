use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RecordedEvent {
    pub timestamp: String, // RFC 3339
    pub correlation_id: String,
    pub event_type: EventType,
    pub direction: Direction,
    pub operation: String, // e.g. "POST /api", "GET /cast/{hash}/reactions"
    pub data: serde_json::Value,
    pub metadata: HashMap<String, String>,
}

impl RecordedEvent {
    pub fn now(
        correlation_id: &str,
        event_type: EventType,
        direction: Direction,
        operation: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            correlation_id: correlation_id.to_string(),
            event_type,
            direction,
            operation: operation.into(),
            data,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum EventType {
    FrameReceived,
    FrameRendered,
    NeynarApiCall,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Direction {
    Request,
    Response,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

tokio::task_local! {
    /// Correlation id of the frame request currently being handled.
    ///
    /// Outbound calls made inside [`CURRENT_CORRELATION_ID`]`.scope(..)` carry it
    /// in the `X-Correlation-ID` header so recordings group per request.
    pub static CURRENT_CORRELATION_ID: CorrelationId;
}

/// Correlation id of the enclosing request scope, if any.
pub fn current_correlation_id() -> Option<CorrelationId> {
    CURRENT_CORRELATION_ID.try_with(|id| id.clone()).ok()
}
