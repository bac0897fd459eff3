//! Pure transition function for the frame state machine.

use super::effect::{Effect, LogLevel};
use super::event::{FrameEvent, Trigger};
use super::state::FrameState;

/// Result of a state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionResult {
    pub state: FrameState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: FrameState, effects: Vec<Effect>) -> Self {
        Self { state, effects }
    }

    pub fn no_change(state: FrameState) -> Self {
        Self::new(state, vec![])
    }
}

/// Compute the next state and the effects to run.
///
/// Any submission that is not a reset attempts verification, whatever button
/// value it carries; there is no "invalid state" screen.
pub fn transition(state: FrameState, event: FrameEvent) -> TransitionResult {
    match (state, event) {
        (_, FrameEvent::Opened) => TransitionResult::no_change(FrameState::Prompt),

        (_, FrameEvent::Reset) => TransitionResult::new(
            FrameState::Prompt,
            vec![Effect::log(LogLevel::Debug, "Frame reset to prompt")],
        ),

        (
            FrameState::Prompt,
            FrameEvent::Submitted {
                identity,
                signature,
                trigger,
            },
        ) => {
            let mut effects = Vec::new();

            match trigger {
                Some(Trigger::Enter) => {}
                Some(Trigger::Other(value)) => effects.push(Effect::log(
                    LogLevel::Warn,
                    format!("Unrecognized button value '{}', verifying anyway", value),
                )),
                None => effects.push(Effect::log(
                    LogLevel::Info,
                    "Submission without a button value, verifying anyway",
                )),
                // Reset submissions are turned into FrameEvent::Reset upstream.
                Some(Trigger::Reset) => return transition(state, FrameEvent::Reset),
            }

            effects.push(Effect::log(
                LogLevel::Debug,
                format!(
                    "Trusted data signature {}",
                    if signature.is_some() { "present (unverified)" } else { "absent" }
                ),
            ));
            effects.push(Effect::Verify { identity });

            TransitionResult::new(FrameState::Prompt, effects)
        }

        (FrameState::Prompt, FrameEvent::VerificationFinished { outcome }) => {
            TransitionResult::no_change(FrameState::Result { outcome })
        }

        (state @ FrameState::Result { .. }, FrameEvent::Submitted { .. }) => {
            TransitionResult::new(
                state,
                vec![Effect::log(
                    LogLevel::Warn,
                    format!("Ignoring submission, frame already at {}", state),
                )],
            )
        }

        (state @ FrameState::Result { .. }, FrameEvent::VerificationFinished { outcome }) => {
            TransitionResult::new(
                state,
                vec![Effect::log(
                    LogLevel::Warn,
                    format!(
                        "Ignoring second verification result ({}), frame already at {}",
                        outcome, state
                    ),
                )],
            )
        }
    }
}
