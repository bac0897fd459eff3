//! In-memory [`SocialGraph`] for tests of code built on the policy.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::neynar::{ReactionSet, SocialGraph};
use crate::types::{CastHash, Fid};

/// A social graph with fixed answers that counts the calls made against it.
///
/// `None` for either answer simulates a network failure on that call.
#[derive(Debug, Default)]
pub struct FixedGraph {
    reactions: Option<ReactionSet>,
    following: Option<Vec<Fid>>,
    reaction_calls: AtomicUsize,
    follow_calls: AtomicUsize,
}

impl FixedGraph {
    pub fn new(reactions: Option<ReactionSet>, following: Option<Vec<Fid>>) -> Self {
        Self {
            reactions,
            following,
            ..Self::default()
        }
    }

    /// `fid` liked, recasted, and follows `target`.
    pub fn all_met(fid: Fid, target: Fid) -> Self {
        Self::new(
            Some(ReactionSet {
                likers: [fid].into_iter().collect(),
                recasters: [fid].into_iter().collect(),
            }),
            Some(vec![target]),
        )
    }

    pub fn reaction_calls(&self) -> usize {
        self.reaction_calls.load(Ordering::SeqCst)
    }

    pub fn follow_calls(&self) -> usize {
        self.follow_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.reaction_calls() + self.follow_calls()
    }
}

#[async_trait]
impl SocialGraph for FixedGraph {
    async fn reactions(&self, cast: &CastHash) -> Result<ReactionSet> {
        self.reaction_calls.fetch_add(1, Ordering::SeqCst);
        self.reactions
            .clone()
            .ok_or_else(|| anyhow!("connection refused fetching reactions for {}", cast))
    }

    async fn is_following(&self, source: Fid, target: Fid) -> Result<bool> {
        self.follow_calls.fetch_add(1, Ordering::SeqCst);
        self.following
            .as_ref()
            .map(|followed| followed.contains(&target))
            .ok_or_else(|| anyhow!("connection refused fetching following list of {}", source))
    }
}
