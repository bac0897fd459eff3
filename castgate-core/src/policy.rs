//! Like / recast / follow verification.
//!
//! The caller is accepted only when they liked and recasted the configured cast
//! and follow the configured target. Checks run in that order and stop at the
//! first one that fails; any API failure ends the evaluation as
//! [`VerificationOutcome::TransientError`].

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::neynar::{ReactionSet, SocialGraph};
use crate::types::{CastReference, Fid};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationOutcome {
    /// All three conditions hold.
    Accepted,
    /// No caller identity in the trusted data.
    AuthMissing,
    /// The caller has not both liked and recasted the cast.
    ReactionMissing,
    /// The caller does not follow the target account.
    NotFollowing,
    /// A social API call failed or returned something unexpected.
    TransientError,
}

impl VerificationOutcome {
    pub fn is_accepted(self) -> bool {
        matches!(self, VerificationOutcome::Accepted)
    }

    /// True when the caller can fix the outcome themselves before retrying.
    pub fn is_user_correctable(self) -> bool {
        matches!(
            self,
            VerificationOutcome::AuthMissing
                | VerificationOutcome::ReactionMissing
                | VerificationOutcome::NotFollowing
        )
    }
}

impl fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted => write!(f, "accepted"),
            Self::AuthMissing => write!(f, "caller identity missing"),
            Self::ReactionMissing => write!(f, "cast not liked and recasted"),
            Self::NotFollowing => write!(f, "target not followed"),
            Self::TransientError => write!(f, "verification failed transiently"),
        }
    }
}

/// How the reaction and follow lookups are issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckMode {
    /// One call after another; the follow lookup is skipped when reactions fail.
    #[default]
    Sequential,
    /// Both lookups at once. Outcomes match `Sequential` for every remote state.
    Concurrent,
}

impl FromStr for CheckMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sequential" => Ok(CheckMode::Sequential),
            "concurrent" => Ok(CheckMode::Concurrent),
            other => Err(anyhow!(
                "unknown check mode '{}', expected 'sequential' or 'concurrent'",
                other
            )),
        }
    }
}

pub struct VerificationPolicy {
    graph: Arc<dyn SocialGraph>,
    cast: CastReference,
    mode: CheckMode,
}

impl VerificationPolicy {
    pub fn new(graph: Arc<dyn SocialGraph>, cast: CastReference, mode: CheckMode) -> Self {
        Self { graph, cast, mode }
    }

    pub fn cast(&self) -> &CastReference {
        &self.cast
    }

    pub fn mode(&self) -> CheckMode {
        self.mode
    }

    pub async fn evaluate(&self, identity: Option<Fid>) -> VerificationOutcome {
        let Some(fid) = identity else {
            warn!("Verification requested without a caller fid");
            return VerificationOutcome::AuthMissing;
        };

        let outcome = match self.mode {
            CheckMode::Sequential => self.evaluate_sequential(fid).await,
            CheckMode::Concurrent => self.evaluate_concurrent(fid).await,
        };

        info!(
            "Verification of fid {} against cast {}: {}",
            fid,
            self.cast.cast_hash.short(),
            outcome
        );
        outcome
    }

    async fn evaluate_sequential(&self, fid: Fid) -> VerificationOutcome {
        let reactions = self.graph.reactions(&self.cast.cast_hash).await;
        if let Some(outcome) = self.check_reactions(fid, reactions) {
            return outcome;
        }

        let following = self.graph.is_following(fid, self.cast.target_fid).await;
        self.check_following(fid, following)
    }

    async fn evaluate_concurrent(&self, fid: Fid) -> VerificationOutcome {
        let (reactions, following) = tokio::join!(
            self.graph.reactions(&self.cast.cast_hash),
            self.graph.is_following(fid, self.cast.target_fid),
        );

        if let Some(outcome) = self.check_reactions(fid, reactions) {
            return outcome;
        }
        self.check_following(fid, following)
    }

    /// Returns the failing outcome, or `None` when the reaction check passes.
    fn check_reactions(
        &self,
        fid: Fid,
        reactions: Result<ReactionSet>,
    ) -> Option<VerificationOutcome> {
        match reactions {
            Err(e) => {
                error!(
                    "Failed to fetch reactions for cast {}: {:#}",
                    self.cast.cast_hash, e
                );
                Some(VerificationOutcome::TransientError)
            }
            Ok(set) if !(set.has_liked(fid) && set.has_recasted(fid)) => {
                info!(
                    "fid {} liked: {}, recasted: {}",
                    fid,
                    set.has_liked(fid),
                    set.has_recasted(fid)
                );
                Some(VerificationOutcome::ReactionMissing)
            }
            Ok(_) => None,
        }
    }

    fn check_following(&self, fid: Fid, following: Result<bool>) -> VerificationOutcome {
        match following {
            Ok(true) => VerificationOutcome::Accepted,
            Ok(false) => VerificationOutcome::NotFollowing,
            Err(e) => {
                error!(
                    "Failed to check whether fid {} follows {}: {:#}",
                    fid, self.cast.target_fid, e
                );
                VerificationOutcome::TransientError
            }
        }
    }
}
