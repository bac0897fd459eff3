//! Client for the Neynar Farcaster API.
//!
//! Only the two facts the verification policy needs are exposed: who reacted
//! to a cast, and whether one user follows another. Both calls inspect the
//! first page of results only.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

use crate::recording::{RecordingLogger, RecordingMiddleware};
use crate::types::{CastHash, Fid};

pub const DEFAULT_BASE_URL: &str = "https://api.neynar.com/v2/farcaster";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const API_KEY_HEADER: &str = "api_key";

/// Users who liked and users who recasted a cast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReactionSet {
    pub likers: HashSet<Fid>,
    pub recasters: HashSet<Fid>,
}

impl ReactionSet {
    pub fn has_liked(&self, fid: Fid) -> bool {
        self.likers.contains(&fid)
    }

    pub fn has_recasted(&self, fid: Fid) -> bool {
        self.recasters.contains(&fid)
    }
}

/// The social-graph facts verification depends on.
#[async_trait]
pub trait SocialGraph: Send + Sync {
    /// Likers and recasters of `cast`.
    async fn reactions(&self, cast: &CastHash) -> Result<ReactionSet>;

    /// Whether `source` follows `target`.
    async fn is_following(&self, source: Fid, target: Fid) -> Result<bool>;
}

#[derive(Clone)]
pub struct NeynarClient {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: String,
}

/// A user reference as it appears in reaction and follow lists.
///
/// Neynar returns either `{"fid": ..}` directly or wraps it as `{"user": {"fid": ..}}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UserEntry {
    Direct { fid: Fid },
    Nested { user: UserRef },
}

#[derive(Debug, Deserialize)]
struct UserRef {
    fid: Fid,
}

impl UserEntry {
    fn fid(&self) -> Fid {
        match self {
            UserEntry::Direct { fid } => *fid,
            UserEntry::Nested { user } => user.fid,
        }
    }
}

#[derive(Debug, Deserialize)]
struct NextCursor {
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReactionLists {
    likes: Vec<UserEntry>,
    recasts: Vec<UserEntry>,
}

#[derive(Debug, Deserialize)]
struct CastEnvelope {
    reactions: ReactionLists,
}

/// Body of the reactions endpoint; the layout differs between API versions.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReactionsResponse {
    Nested {
        cast: CastEnvelope,
    },
    Wrapped {
        reactions: ReactionLists,
        #[serde(default)]
        next: Option<NextCursor>,
    },
    Flat {
        likes: Vec<UserEntry>,
        recasts: Vec<UserEntry>,
        #[serde(default)]
        next: Option<NextCursor>,
    },
}

impl ReactionsResponse {
    fn into_parts(self) -> (ReactionSet, Option<String>) {
        let (likes, recasts, next) = match self {
            ReactionsResponse::Nested { cast } => {
                (cast.reactions.likes, cast.reactions.recasts, None)
            }
            ReactionsResponse::Wrapped { reactions, next } => {
                (reactions.likes, reactions.recasts, next)
            }
            ReactionsResponse::Flat {
                likes,
                recasts,
                next,
            } => (likes, recasts, next),
        };

        let set = ReactionSet {
            likers: likes.iter().map(UserEntry::fid).collect(),
            recasters: recasts.iter().map(UserEntry::fid).collect(),
        };
        (set, next.and_then(|n| n.cursor))
    }
}

#[derive(Debug, Deserialize)]
struct FollowingResponse {
    users: Vec<UserEntry>,
    #[serde(default)]
    next: Option<NextCursor>,
}

impl NeynarClient {
    pub fn new(api_key: String, base_url: &str, timeout: Duration) -> Result<Self> {
        Self::new_with_recording(api_key, base_url, timeout, None)
    }

    pub fn new_with_recording(
        api_key: String,
        base_url: &str,
        timeout: Duration,
        recording_logger: Option<RecordingLogger>,
    ) -> Result<Self> {
        let parsed = Url::parse(base_url)
            .with_context(|| format!("Invalid Neynar base URL '{}'", base_url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(anyhow!("Neynar base URL must be http(s), got '{}'", base_url));
        }

        let client = create_neynar_client(timeout, recording_logger)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, what: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Fetching {} from {}", what, url);

        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", what))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .context("Failed to read error response body")?;
            error!("Neynar API error fetching {}: {} - {}", what, status, error_text);
            return Err(anyhow!("Neynar API error: {} - {}", status, error_text));
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to parse {} response", what))
    }
}

#[async_trait]
impl SocialGraph for NeynarClient {
    async fn reactions(&self, cast: &CastHash) -> Result<ReactionSet> {
        let body: ReactionsResponse = self
            .get_json(&format!("/cast/{}/reactions", cast), "cast reactions")
            .await?;

        let (set, cursor) = body.into_parts();
        if cursor.is_some() {
            warn!(
                "Reactions for cast {} span multiple pages; only the first page was checked",
                cast.short()
            );
        }

        debug!(
            "Cast {} has {} likes and {} recasts on the first page",
            cast.short(),
            set.likers.len(),
            set.recasters.len()
        );
        Ok(set)
    }

    async fn is_following(&self, source: Fid, target: Fid) -> Result<bool> {
        let body: FollowingResponse = self
            .get_json(&format!("/user/{}/following", source), "following list")
            .await?;

        if body.next.and_then(|n| n.cursor).is_some() {
            warn!(
                "Following list of fid {} spans multiple pages; only the first page was checked",
                source
            );
        }

        Ok(body.users.iter().any(|entry| entry.fid() == target))
    }
}

pub fn create_neynar_client(
    timeout: Duration,
    recording_logger: Option<RecordingLogger>,
) -> Result<ClientWithMiddleware> {
    let client = Client::builder()
        .user_agent(concat!("castgate/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .context("Failed to create HTTP client")?;

    let mut builder = ClientBuilder::new(client);

    if let Some(logger) = recording_logger {
        builder = builder.with(RecordingMiddleware::new(logger));
    }

    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const HASH: &str = "0x3ba6f52a9b1c4e0d7f8a6b5c4d3e2f1a0b9c8d7e";

    fn cast() -> CastHash {
        CastHash::parse(HASH).unwrap()
    }

    fn client_for(server: &MockServer) -> NeynarClient {
        NeynarClient::new("test-key".to_string(), &server.uri(), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_reactions_flat_layout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/cast/{}/reactions", HASH)))
            .and(header(API_KEY_HEADER, "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "likes": [{ "fid": 14871, "fname": "alice" }, { "fid": 2 }],
                "recasts": [{ "fid": "14871" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let set = client_for(&server).reactions(&cast()).await.unwrap();
        assert!(set.has_liked(Fid(14871)));
        assert!(set.has_liked(Fid(2)));
        assert!(set.has_recasted(Fid(14871)));
        assert!(!set.has_recasted(Fid(2)));
    }

    #[tokio::test]
    async fn test_reactions_nested_cast_layout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/cast/{}/reactions", HASH)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "cast": {
                    "hash": HASH,
                    "reactions": {
                        "likes_count": 1,
                        "likes": [{ "fid": 7 }],
                        "recasts": [{ "user": { "fid": 7 } }]
                    }
                }
            })))
            .mount(&server)
            .await;

        let set = client_for(&server).reactions(&cast()).await.unwrap();
        assert!(set.has_liked(Fid(7)));
        assert!(set.has_recasted(Fid(7)));
    }

    #[tokio::test]
    async fn test_reactions_malformed_payload_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": {} })))
            .mount(&server)
            .await;

        assert!(client_for(&server).reactions(&cast()).await.is_err());
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad api key"))
            .mount(&server)
            .await;

        let err = client_for(&server).reactions(&cast()).await.unwrap_err();
        assert!(err.to_string().contains("401"), "{}", err);
    }

    #[tokio::test]
    async fn test_is_following_scans_user_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user/999/following"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "users": [
                    { "object": "follow", "user": { "fid": 3 } },
                    { "fid": 14871 }
                ],
                "next": { "cursor": "abc" }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.is_following(Fid(999), Fid(14871)).await.unwrap());
        assert!(client.is_following(Fid(999), Fid(3)).await.unwrap());
        assert!(!client.is_following(Fid(999), Fid(4)).await.unwrap());
    }

    #[tokio::test]
    async fn test_timeout_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "users": [] }))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client =
            NeynarClient::new("k".to_string(), &server.uri(), Duration::from_millis(50)).unwrap();
        assert!(client.is_following(Fid(1), Fid(2)).await.is_err());
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        assert!(NeynarClient::new("k".to_string(), "not a url", DEFAULT_TIMEOUT).is_err());
        assert!(NeynarClient::new("k".to_string(), "ftp://example.com", DEFAULT_TIMEOUT).is_err());
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client =
            NeynarClient::new("k".to_string(), "https://example.com/v2/", DEFAULT_TIMEOUT)
                .unwrap();
        assert_eq!(client.base_url(), "https://example.com/v2");
    }
}
