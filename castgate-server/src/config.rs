use anyhow::{anyhow, Context, Result};
use castgate_core::neynar::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
use castgate_core::{CastHash, CastReference, CheckMode, Fid};
use std::env;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_FRAME_TITLE: &str = "Like, Recast, Follow Verification";
pub const DEFAULT_BASE_PATH: &str = "/api";

#[derive(Clone)]
pub struct Config {
    pub neynar_api_key: String,
    pub neynar_base_url: String,
    pub neynar_timeout: Duration,
    pub cast: CastReference,
    pub check_mode: CheckMode,
    /// Externally reachable origin used in frame image and post URLs.
    pub public_url: String,
    /// Path the frame is served under, normalized to start with `/` and have no trailing `/`.
    pub base_path: String,
    pub frame_title: String,
    pub port: u16,
    pub recording_enabled: bool,
    pub recording_log_path: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("neynar_api_key", &"<redacted>")
            .field("neynar_base_url", &self.neynar_base_url)
            .field("neynar_timeout", &self.neynar_timeout)
            .field("cast", &self.cast)
            .field("check_mode", &self.check_mode)
            .field("public_url", &self.public_url)
            .field("base_path", &self.base_path)
            .field("frame_title", &self.frame_title)
            .field("port", &self.port)
            .field("recording_enabled", &self.recording_enabled)
            .field("recording_log_path", &self.recording_log_path)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let neynar_api_key = parse_api_key(lookup("NEYNAR_API_KEY"))
            .context("NEYNAR_API_KEY environment variable is required")?;

        let neynar_base_url =
            lookup("NEYNAR_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let neynar_timeout = match lookup("NEYNAR_TIMEOUT_SECS") {
            Some(secs) => Duration::from_secs(
                secs.parse::<u64>()
                    .context("NEYNAR_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
            None => DEFAULT_TIMEOUT,
        };

        let cast_hash = lookup("CAST_HASH")
            .context("CAST_HASH environment variable is required")?
            .parse::<CastHash>()
            .context("CAST_HASH must be a full 0x-prefixed cast hash")?;

        let target_fid = lookup("TARGET_FID")
            .context("TARGET_FID environment variable is required")?
            .parse::<Fid>()
            .context("TARGET_FID must be a valid number")?;

        let check_mode = lookup("CHECK_MODE")
            .map(|mode| mode.parse::<CheckMode>())
            .transpose()?
            .unwrap_or_default();

        let port = lookup("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse::<u16>()
            .context("PORT must be a valid number")?;

        let public_url = lookup("PUBLIC_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("http://localhost:{}", port));

        let base_path = normalize_base_path(
            &lookup("FRAME_BASE_PATH").unwrap_or_else(|| DEFAULT_BASE_PATH.to_string()),
        );

        let frame_title =
            lookup("FRAME_TITLE").unwrap_or_else(|| DEFAULT_FRAME_TITLE.to_string());

        let recording_enabled = lookup("RECORDING_ENABLED")
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false);

        let recording_log_path =
            lookup("RECORDING_LOG_PATH").unwrap_or_else(|| "recordings.jsonl".to_string());

        Ok(Config {
            neynar_api_key,
            neynar_base_url,
            neynar_timeout,
            cast: CastReference::new(cast_hash, target_fid),
            check_mode,
            public_url,
            base_path,
            frame_title,
            port,
            recording_enabled,
            recording_log_path,
        })
    }
}

/// Reject a missing or whitespace-only API key.
pub fn parse_api_key(value: Option<String>) -> Result<String> {
    value
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| anyhow!("API key is missing or blank"))
}

/// `"api/"` -> `"/api"`, `"/"` -> `""`.
pub fn normalize_base_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}
