//! Events that drive the frame state machine.

use castgate_core::{Fid, VerificationOutcome};

/// Button value of the prompt's Enter button.
pub const ENTER: &str = "enter";
/// Button value of the reset control shown on failure screens.
pub const RESET: &str = "reset";

/// A button value sent with a frame submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Enter,
    Reset,
    /// Any value this frame never renders.
    Other(String),
}

impl Trigger {
    pub fn parse(value: &str) -> Self {
        match value {
            ENTER => Trigger::Enter,
            RESET => Trigger::Reset,
            other => Trigger::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// The frame was loaded without a submission (first render or a GET).
    Opened,

    /// The reset control was pressed.
    Reset,

    /// A button on the prompt was pressed.
    Submitted {
        /// `trustedData.fid`, if present.
        identity: Option<Fid>,
        /// `trustedData.signature`. Carried for logging only, never verified.
        signature: Option<String>,
        trigger: Option<Trigger>,
    },

    /// The verification policy finished.
    VerificationFinished { outcome: VerificationOutcome },
}
