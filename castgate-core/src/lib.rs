pub mod neynar;
pub mod policy;
pub mod recording;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;

pub use neynar::{create_neynar_client, NeynarClient, ReactionSet, SocialGraph};
pub use policy::{CheckMode, VerificationOutcome, VerificationPolicy};
pub use recording::{
    CorrelationId, Direction, EventType, RecordedEvent, RecordingLogger, RecordingMiddleware,
    Sanitizer, CORRELATION_ID_HEADER, CURRENT_CORRELATION_ID,
};
pub use types::{CastHash, CastReference, Fid};
