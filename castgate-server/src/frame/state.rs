//! States a frame can be in while a request is handled.

use castgate_core::VerificationOutcome;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameState {
    /// Initial screen asking the caller to press Enter.
    #[default]
    Prompt,
    /// Verification ran; terminal for this request.
    Result { outcome: VerificationOutcome },
}

impl FrameState {
    pub fn outcome(&self) -> Option<VerificationOutcome> {
        match self {
            FrameState::Prompt => None,
            FrameState::Result { outcome } => Some(*outcome),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FrameState::Result { .. })
    }
}

impl fmt::Display for FrameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameState::Prompt => write!(f, "prompt"),
            FrameState::Result { outcome } => write!(f, "result ({})", outcome),
        }
    }
}
