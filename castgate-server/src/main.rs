use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, Level};

use castgate_core::{NeynarClient, RecordingLogger, SocialGraph};
use castgate_server::config::Config;
use castgate_server::{frame_router, AppState, Renderer};

async fn health_check() -> Result<Json<serde_json::Value>, StatusCode> {
    Ok(Json(json!({
        "status": "healthy",
        "service": "castgate"
    })))
}

async fn help_handler(headers: HeaderMap, State(state): State<Arc<AppState>>) -> Response {
    let accept = headers
        .get(axum::http::header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/json");

    if accept.to_lowercase().contains("text/html") {
        return Html(generate_help_html(&state)).into_response();
    }

    let frame_route = state.renderer.frame_route();
    let json_data = json!({
        "service": "castgate",
        "version": castgate_server::get_version(),
        "description": "Farcaster frame that unlocks a message for users who liked, recasted and follow",
        "cast": {
            "hash": state.cast.cast_hash.to_string(),
            "target_fid": state.cast.target_fid,
        },
        "endpoints": [
            {
                "path": "/health",
                "method": "GET",
                "description": "Health check endpoint",
                "response_format": "application/json"
            },
            {
                "path": "/help",
                "method": "GET",
                "description": "API documentation and service information",
                "response_format": "Supports content negotiation (JSON/HTML)"
            },
            {
                "path": frame_route,
                "method": "GET, POST",
                "description": "Frame entry point; POST with buttonValue \"enter\" runs verification",
                "response_format": "Frame HTML, or JSON with Accept: application/json"
            },
            {
                "path": state.renderer.image_route(),
                "method": "GET",
                "description": "SVG card for a frame screen",
                "response_format": "image/svg+xml"
            }
        ],
        "configuration": {
            "required_env_vars": [
                "NEYNAR_API_KEY",
                "CAST_HASH",
                "TARGET_FID"
            ],
            "optional_env_vars": [
                "NEYNAR_BASE_URL (default: https://api.neynar.com/v2/farcaster)",
                "NEYNAR_TIMEOUT_SECS (default: 5)",
                "CHECK_MODE (default: sequential)",
                "PUBLIC_URL (default: http://localhost:PORT)",
                "FRAME_BASE_PATH (default: /api)",
                "FRAME_TITLE",
                "PORT (default: 3000)",
                "RECORDING_ENABLED (default: false)",
                "RECORDING_LOG_PATH (default: recordings.jsonl)"
            ]
        }
    });

    Json(json_data).into_response()
}

fn generate_help_html(state: &AppState) -> String {
    const HELP_HTML_TEMPLATE: &str = include_str!("help.html");
    HELP_HTML_TEMPLATE
        .replace("{version}", &castgate_server::get_version())
        .replace("{frame_route}", &state.renderer.frame_route())
        .replace("{cast_hash}", state.cast.cast_hash.as_str())
        .replace("{target_fid}", &state.cast.target_fid.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!("Starting castgate frame server");

    let config = Config::from_env().context("Failed to load configuration from environment")?;

    let recording_logger = if config.recording_enabled {
        match RecordingLogger::open(PathBuf::from(&config.recording_log_path)).await {
            Ok(logger) => Some(logger),
            Err(e) => {
                error!("Failed to initialize recording logger: {:#}", e);
                None
            }
        }
    } else {
        None
    };

    let neynar_client = NeynarClient::new_with_recording(
        config.neynar_api_key.clone(),
        &config.neynar_base_url,
        config.neynar_timeout,
        recording_logger.clone(),
    )?;
    let social_graph: Arc<dyn SocialGraph> = Arc::new(neynar_client);

    info!(
        "Gating on cast {} and follows of fid {} ({:?} checks)",
        config.cast.cast_hash, config.cast.target_fid, config.check_mode
    );

    let app_state = Arc::new(AppState {
        social_graph,
        cast: config.cast.clone(),
        check_mode: config.check_mode,
        renderer: Renderer::new(&config.public_url, &config.base_path, &config.frame_title),
        recording_logger,
    });

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/help", get(help_handler))
        .merge(frame_router(&app_state))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(app_state.clone());

    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    info!(
        "Server listening on port {}, frame at {}{}",
        config.port,
        config.public_url,
        app_state.renderer.frame_route()
    );

    axum::serve(listener, app).await?;

    Ok(())
}
