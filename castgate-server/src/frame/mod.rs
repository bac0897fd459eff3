//! Explicit state machine for a single frame interaction.
//!
//! Every HTTP round trip is evaluated from scratch; nothing carries over
//! between requests. The design separates:
//! - **State**: what the frame is showing (`FrameState`)
//! - **Events**: what happened (`FrameEvent`)
//! - **Effects**: what to do (`Effect`)
//! - **Transition**: pure function `(FrameState, FrameEvent) -> (FrameState, Vec<Effect>)`
//!
//! The interpreter runs effects against the verification policy and feeds the
//! resulting events back into the transition function.

pub mod effect;
pub mod event;
pub mod interpreter;
pub mod state;
pub mod transition;

pub use effect::*;
pub use event::*;
pub use interpreter::{run, FrameContext};
pub use state::*;
pub use transition::*;
