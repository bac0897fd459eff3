use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use castgate_core::{
    CorrelationId, Direction, EventType, Fid, RecordedEvent, Sanitizer, VerificationPolicy,
    CURRENT_CORRELATION_ID,
};

use crate::frame::{self, FrameContext, FrameEvent, Trigger};
use crate::render::{self, Screen};
use crate::AppState;

/// Whether the frame is being loaded or answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameStatus {
    Initial,
    Response,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TrustedData {
    #[serde(default, deserialize_with = "lenient")]
    pub fid: Option<Fid>,
    #[serde(default, deserialize_with = "lenient")]
    pub signature: Option<String>,
}

/// Frame interaction payload posted by the client.
///
/// Each field parses on its own: a malformed value reads as absent instead of
/// discarding `status` and `buttonValue` along with it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FramePayload {
    #[serde(default, deserialize_with = "lenient")]
    pub button_value: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<FrameStatus>,
    #[serde(default, deserialize_with = "lenient")]
    pub trusted_data: Option<TrustedData>,
}

/// Deserialize an optional field, mapping `null` or a value of the wrong shape to `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient<T> {
        Value(T),
        Other(IgnoredAny),
    }

    Ok(match Lenient::<T>::deserialize(deserializer)? {
        Lenient::Value(value) => Some(value),
        Lenient::Other(_) => None,
    })
}

/// Query string of a button's post target.
#[derive(Debug, Default, Deserialize)]
pub struct FrameQuery {
    pub button: Option<String>,
}

impl FramePayload {
    /// Parse a POST body; empty or malformed bodies yield an empty payload.
    pub fn from_body(body: &[u8]) -> Self {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Self::default();
        }
        match serde_json::from_slice(body) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Ignoring unparseable frame payload: {}", e);
                Self::default()
            }
        }
    }

    /// Build the state machine event for this request.
    ///
    /// A missing `status` is inferred from the method: GET loads the frame,
    /// POST answers it. Without `status == response` the prompt is always shown.
    pub fn into_event(self, method: &Method, query: FrameQuery) -> FrameEvent {
        let status = self.status.unwrap_or(if *method == Method::POST {
            FrameStatus::Response
        } else {
            FrameStatus::Initial
        });

        if status != FrameStatus::Response {
            return FrameEvent::Opened;
        }

        let trigger = self
            .button_value
            .or(query.button)
            .map(|value| Trigger::parse(&value));

        if trigger == Some(Trigger::Reset) {
            return FrameEvent::Reset;
        }

        let trusted = self.trusted_data.unwrap_or_default();
        FrameEvent::Submitted {
            identity: trusted.fid,
            signature: trusted.signature,
            trigger,
        }
    }
}

/// Serve JSON when the client asks for it, the HTML frame otherwise.
fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|accept| accept.to_lowercase().contains("application/json"))
        .unwrap_or(false)
}

async fn handle_frame(
    state: Arc<AppState>,
    method: Method,
    headers: HeaderMap,
    query: FrameQuery,
    payload: FramePayload,
) -> Response {
    let correlation_id = CorrelationId::generate();

    if let Some(ref logger) = state.recording_logger {
        let data = serde_json::json!({
            "headers": Sanitizer::sanitize_header_map(&headers),
            "query_button": query.button,
            "payload": Sanitizer::sanitize_json(
                &serde_json::to_value(&payload).unwrap_or(serde_json::Value::Null)
            ),
        });
        logger.record(RecordedEvent::now(
            &correlation_id.0,
            EventType::FrameReceived,
            Direction::Request,
            format!("{} {}", method, state.renderer.frame_route()),
            data,
        ));
    }

    let event = payload.into_event(&method, query);
    info!("[{}] Frame {} event: {:?}", correlation_id.0, method, event);

    let policy = VerificationPolicy::new(
        state.social_graph.clone(),
        state.cast.clone(),
        state.check_mode,
    );
    let ctx = FrameContext {
        policy: &policy,
        correlation_id: &correlation_id.0,
    };
    let final_state = CURRENT_CORRELATION_ID
        .scope(correlation_id.clone(), frame::run(&ctx, event))
        .await;

    let screen = Screen::for_state(&final_state);
    let view = state.renderer.view(screen);

    if let Some(ref logger) = state.recording_logger {
        logger.record(
            RecordedEvent::now(
                &correlation_id.0,
                EventType::FrameRendered,
                Direction::Response,
                screen.slug(),
                serde_json::to_value(&view).unwrap_or(serde_json::Value::Null),
            )
            .with_metadata("state", final_state.to_string()),
        );
    }

    if wants_json(&headers) {
        Json(view).into_response()
    } else {
        Html(state.renderer.html(&view)).into_response()
    }
}

async fn frame_get(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<FrameQuery>,
) -> Response {
    handle_frame(state, Method::GET, headers, query, FramePayload::default()).await
}

async fn frame_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<FrameQuery>,
    body: Bytes,
) -> Response {
    let payload = FramePayload::from_body(&body);
    handle_frame(state, Method::POST, headers, query, payload).await
}

async fn frame_image(Path(slug): Path<String>) -> Response {
    match Screen::from_slug(slug.trim_end_matches(".svg")) {
        Some(screen) => (
            [
                (header::CONTENT_TYPE, "image/svg+xml"),
                (header::CACHE_CONTROL, "max-age=0"),
            ],
            render::svg(screen),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "unknown frame image").into_response(),
    }
}

pub fn frame_router(state: &AppState) -> Router<Arc<AppState>> {
    let frame_route = state.renderer.frame_route();
    let mut router = Router::new()
        .route(&frame_route, get(frame_get).post(frame_post))
        .route(&state.renderer.image_route(), get(frame_image));

    // Clients post to both `/api` and `/api/`.
    if frame_route != "/" {
        router = router.route(
            &format!("{}/", frame_route),
            get(frame_get).post(frame_post),
        );
    }
    router
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Renderer;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use castgate_core::testing::FixedGraph;
    use castgate_core::{CastHash, CastReference, CheckMode, ReactionSet, SocialGraph};
    use proptest::prelude::*;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const TARGET: Fid = Fid(14871);

    fn app(graph: Arc<FixedGraph>) -> Router {
        let social_graph: Arc<dyn SocialGraph> = graph;
        let state = Arc::new(AppState {
            social_graph,
            cast: CastReference::new(
                CastHash::parse("0x3ba6f52a9b1c4e0d7f8a6b5c4d3e2f1a0b9c8d7e").unwrap(),
                TARGET,
            ),
            check_mode: CheckMode::Sequential,
            renderer: Renderer::new("https://frames.example.com", "/api", "Gate"),
            recording_logger: None,
        });
        frame_router(&state).with_state(state)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::ACCEPT, "application/json")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn screen_for(graph: Arc<FixedGraph>, body: Value) -> String {
        let response = app(graph).oneshot(post_json("/api", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        json_body(response).await["screen"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_get_renders_prompt_html() {
        let graph = Arc::new(FixedGraph::all_met(Fid(1), TARGET));
        let response = app(graph.clone())
            .oneshot(Request::get("/api").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("fc:frame:button:1\" content=\"Enter\""));
        assert!(html.contains("/api/image/prompt"));
        assert_eq!(graph.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_accepted_scenario() {
        let graph = Arc::new(FixedGraph::all_met(Fid(14871), TARGET));
        let body = json!({
            "status": "response",
            "buttonValue": "enter",
            "trustedData": { "fid": 14871, "signature": "0xabc" }
        });
        assert_eq!(screen_for(graph, body).await, "accepted");
    }

    #[tokio::test]
    async fn test_reaction_missing_scenario_skips_follow_check() {
        let graph = Arc::new(FixedGraph::new(
            Some(ReactionSet::default()),
            Some(vec![TARGET]),
        ));
        let body = json!({
            "status": "response",
            "buttonValue": "enter",
            "trustedData": { "fid": "999" }
        });
        assert_eq!(screen_for(graph.clone(), body).await, "reaction_missing");
        assert_eq!(graph.follow_calls(), 0);
    }

    #[tokio::test]
    async fn test_enter_without_fid_is_auth_missing() {
        let graph = Arc::new(FixedGraph::all_met(Fid(1), TARGET));
        let body = json!({ "status": "response", "buttonValue": "enter" });
        assert_eq!(screen_for(graph.clone(), body).await, "auth_missing");
        assert_eq!(graph.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_api_failure_is_transient_error_with_retry_button() {
        let graph = Arc::new(FixedGraph::new(None, None));
        let response = app(graph)
            .oneshot(post_json(
                "/api",
                json!({ "buttonValue": "enter", "trustedData": { "fid": 5 } }),
            ))
            .await
            .unwrap();
        let view = json_body(response).await;
        assert_eq!(view["screen"], "transient_error");
        assert_eq!(view["buttons"][0]["value"], "reset");
    }

    #[tokio::test]
    async fn test_reset_from_query_target_returns_prompt() {
        let graph = Arc::new(FixedGraph::all_met(Fid(5), TARGET));
        let body = json!({ "trustedData": { "fid": 5 } });
        let response = app(graph.clone())
            .oneshot(post_json("/api?button=reset", body))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["screen"], "prompt");
        assert_eq!(graph.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_post_body_attempts_verification() {
        let graph = Arc::new(FixedGraph::all_met(Fid(5), TARGET));
        let request = Request::post("/api")
            .header(header::ACCEPT, "application/json")
            .body(Body::empty())
            .unwrap();
        let response = app(graph).oneshot(request).await.unwrap();
        assert_eq!(json_body(response).await["screen"], "auth_missing");
    }

    #[tokio::test]
    async fn test_image_route() {
        let graph = Arc::new(FixedGraph::default());
        let response = app(graph.clone())
            .oneshot(Request::get("/api/image/accepted").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "image/svg+xml"
        );

        let missing = app(graph)
            .oneshot(Request::get("/api/image/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_payload_parsing() {
        let payload = FramePayload::from_body(
            br#"{"buttonValue":"enter","status":"response","trustedData":{"fid":"42","signature":"s"}}"#,
        );
        assert_eq!(payload.button_value.as_deref(), Some("enter"));
        assert_eq!(payload.status, Some(FrameStatus::Response));
        assert_eq!(payload.trusted_data.unwrap().fid, Some(Fid(42)));

        assert_eq!(FramePayload::from_body(b"not json"), FramePayload::default());
        assert_eq!(FramePayload::from_body(b"  "), FramePayload::default());

        let odd = FramePayload::from_body(br#"{"status":"weird"}"#);
        assert_eq!(odd.status, Some(FrameStatus::Unknown));
    }

    #[test]
    fn test_malformed_fid_keeps_status_and_button() {
        let initial =
            FramePayload::from_body(br#"{"status":"initial","trustedData":{"fid":"alice"}}"#);
        assert_eq!(initial.status, Some(FrameStatus::Initial));
        assert_eq!(initial.trusted_data.as_ref().unwrap().fid, None);
        assert_eq!(
            initial.into_event(&Method::POST, FrameQuery::default()),
            FrameEvent::Opened
        );

        let reset = FramePayload::from_body(
            br#"{"status":"response","buttonValue":"reset","trustedData":{"fid":-1}}"#,
        );
        assert_eq!(
            reset.into_event(&Method::POST, FrameQuery::default()),
            FrameEvent::Reset
        );

        let fractional = FramePayload::from_body(
            br#"{"status":"response","buttonValue":"enter","trustedData":{"fid":1.5,"signature":7}}"#,
        );
        assert_eq!(
            fractional.into_event(&Method::POST, FrameQuery::default()),
            FrameEvent::Submitted {
                identity: None,
                signature: None,
                trigger: Some(Trigger::Enter),
            }
        );
    }

    #[test]
    fn test_null_and_misshapen_fields_read_as_absent() {
        let payload = FramePayload::from_body(
            br#"{"buttonValue":null,"status":"response","trustedData":"nope"}"#,
        );
        assert_eq!(payload.button_value, None);
        assert_eq!(payload.status, Some(FrameStatus::Response));
        assert_eq!(payload.trusted_data, None);
    }

    #[tokio::test]
    async fn test_trailing_slash_frame_route() {
        let graph = Arc::new(FixedGraph::all_met(Fid(14871), TARGET));
        let body = json!({
            "status": "response",
            "buttonValue": "enter",
            "trustedData": { "fid": 14871 }
        });
        let response = app(graph).oneshot(post_json("/api/", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["screen"], "accepted");
    }

    #[test]
    fn test_body_button_value_wins_over_query() {
        let payload = FramePayload {
            button_value: Some("enter".to_string()),
            status: Some(FrameStatus::Response),
            trusted_data: None,
        };
        let event = payload.into_event(
            &Method::POST,
            FrameQuery {
                button: Some("reset".to_string()),
            },
        );
        assert!(matches!(
            event,
            FrameEvent::Submitted {
                trigger: Some(Trigger::Enter),
                ..
            }
        ));
    }

    fn arb_status() -> impl Strategy<Value = Option<FrameStatus>> {
        prop_oneof![
            Just(None),
            Just(Some(FrameStatus::Initial)),
            Just(Some(FrameStatus::Unknown)),
        ]
    }

    fn arb_bad_fid() -> impl Strategy<Value = Value> {
        prop_oneof![
            (i64::MIN..0i64).prop_map(|n| json!(n)),
            (-1.0e6f64..1.0e6).prop_filter("fractional", |f| f.fract() != 0.0).prop_map(|f| json!(f)),
            "[a-z]{1,8}".prop_map(|s| json!(s)),
            Just(Value::Null),
            Just(json!({ "fid": 3 })),
            Just(json!([1, 2])),
        ]
    }

    fn arb_any_fid() -> impl Strategy<Value = Value> {
        prop_oneof![
            arb_bad_fid(),
            any::<u64>().prop_map(|n| json!(n)),
            any::<u64>().prop_map(|n| json!(n.to_string())),
        ]
    }

    proptest! {
        #[test]
        fn posted_non_response_status_opens_prompt_for_any_fid(
            status in prop_oneof![Just("initial"), Just("weird"), Just("RESPONSE")],
            button in proptest::option::of("[a-z]{0,8}"),
            fid in arb_any_fid(),
        ) {
            let body = json!({
                "status": status,
                "buttonValue": button,
                "trustedData": { "fid": fid, "signature": "0xsig" }
            });
            let payload = FramePayload::from_body(&serde_json::to_vec(&body).unwrap());
            prop_assert_eq!(
                payload.into_event(&Method::POST, FrameQuery::default()),
                FrameEvent::Opened
            );
        }

        #[test]
        fn posted_reset_returns_prompt_for_any_fid(fid in arb_any_fid()) {
            let body = json!({
                "status": "response",
                "buttonValue": "reset",
                "trustedData": { "fid": fid }
            });
            let payload = FramePayload::from_body(&serde_json::to_vec(&body).unwrap());
            prop_assert_eq!(
                payload.into_event(&Method::POST, FrameQuery::default()),
                FrameEvent::Reset
            );
        }

        #[test]
        fn malformed_fid_reads_as_missing_identity(fid in arb_bad_fid()) {
            let body = json!({
                "status": "response",
                "buttonValue": "enter",
                "trustedData": { "fid": fid }
            });
            let payload = FramePayload::from_body(&serde_json::to_vec(&body).unwrap());
            let event = payload.into_event(&Method::POST, FrameQuery::default());
            let is_anonymous_enter = matches!(
                event,
                FrameEvent::Submitted { identity: None, trigger: Some(Trigger::Enter), .. }
            );
            prop_assert!(is_anonymous_enter);
        }

        #[test]
        fn non_response_status_always_opens_prompt(
            status in arb_status(),
            button in proptest::option::of("[a-z]{0,8}"),
            fid in proptest::option::of(any::<u64>()),
        ) {
            // A GET without explicit status, or any request whose status is not `response`.
            let method = if status.is_none() { Method::GET } else { Method::POST };
            let payload = FramePayload {
                button_value: button,
                status,
                trusted_data: Some(TrustedData { fid: fid.map(Fid), signature: None }),
            };
            prop_assert_eq!(payload.into_event(&method, FrameQuery::default()), FrameEvent::Opened);
        }

        #[test]
        fn identical_requests_yield_identical_events(
            button in proptest::option::of("[a-z]{0,8}"),
            fid in proptest::option::of(0u64..100_000),
        ) {
            let payload = FramePayload {
                button_value: button,
                status: Some(FrameStatus::Response),
                trusted_data: Some(TrustedData { fid: fid.map(Fid), signature: None }),
            };
            let first = payload.clone().into_event(&Method::POST, FrameQuery::default());
            let second = payload.into_event(&Method::POST, FrameQuery::default());
            prop_assert_eq!(first, second);
        }
    }
}
