//! Effect interpreter for the frame state machine.
//!
//! The boundary between the pure transition function and the social API:
//! it executes effects and returns the events they produce.

use std::collections::VecDeque;

use castgate_core::VerificationPolicy;
use tracing::{debug, info, warn};

use super::effect::{Effect, LogLevel};
use super::event::FrameEvent;
use super::state::FrameState;
use super::transition::transition;

/// Context needed to execute effects for one request.
pub struct FrameContext<'a> {
    pub policy: &'a VerificationPolicy,
    pub correlation_id: &'a str,
}

/// Drive a fresh frame from `Prompt` with `event` until no events remain.
pub async fn run(ctx: &FrameContext<'_>, event: FrameEvent) -> FrameState {
    let mut state = FrameState::default();
    let mut pending = VecDeque::from([event]);

    while let Some(event) = pending.pop_front() {
        let result = transition(state, event);
        state = result.state;
        pending.extend(execute_effects(ctx, result.effects).await);
    }

    debug!("[{}] Frame settled at {}", ctx.correlation_id, state);
    state
}

/// Execute effects in order and collect the events they produce.
pub async fn execute_effects(ctx: &FrameContext<'_>, effects: Vec<Effect>) -> Vec<FrameEvent> {
    let mut events = Vec::new();
    for effect in effects {
        if let Some(event) = execute_effect(ctx, effect).await {
            events.push(event);
        }
    }
    events
}

async fn execute_effect(ctx: &FrameContext<'_>, effect: Effect) -> Option<FrameEvent> {
    match effect {
        Effect::Verify { identity } => {
            let outcome = ctx.policy.evaluate(identity).await;
            Some(FrameEvent::VerificationFinished { outcome })
        }

        Effect::Log { level, message } => {
            match level {
                LogLevel::Debug => debug!("[{}] {}", ctx.correlation_id, message),
                LogLevel::Info => info!("[{}] {}", ctx.correlation_id, message),
                LogLevel::Warn => warn!("[{}] {}", ctx.correlation_id, message),
            }
            None
        }
    }
}
