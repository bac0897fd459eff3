pub mod config;
pub mod frame;
pub mod frame_handler;
pub mod render;

use std::sync::Arc;

use castgate_core::{CastReference, CheckMode, RecordingLogger, SocialGraph};

pub use frame_handler::frame_router;
pub use render::Renderer;

mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// Short git hash of the build, or the crate version when unavailable.
pub fn get_version() -> String {
    let hash = option_env!("CASTGATE_GIT_HASH").or(built_info::GIT_COMMIT_HASH);
    match hash {
        Some(hash) => hash[..8.min(hash.len())].to_string(),
        None => built_info::PKG_VERSION.to_string(),
    }
}

pub struct AppState {
    pub social_graph: Arc<dyn SocialGraph>,
    pub cast: CastReference,
    pub check_mode: CheckMode,
    pub renderer: Renderer,
    pub recording_logger: Option<RecordingLogger>,
}
