//! Effects (side effects as data) produced by frame transitions.

use castgate_core::Fid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Run the like / recast / follow checks for the caller.
    Verify { identity: Option<Fid> },

    /// Log a message.
    Log { level: LogLevel, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
}

impl Effect {
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Effect::Log {
            level,
            message: message.into(),
        }
    }
}
