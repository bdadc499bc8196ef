//! Error types for the routing layer.

/// Errors raised when routing parameters are not logically consistent.
///
/// These are fatal at startup only; nothing in the running state machines
/// produces them.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("reuse limit ({reuse}) must be below the suppress limit ({suppress})")]
    ReuseAboveSuppress { reuse: u32, suppress: u32 },
    #[error("suppress limit ({suppress}) must not exceed the figure-of-merit cap ({cap})")]
    SuppressAboveCap { suppress: u32, cap: u32 },
    #[error("dampener half life must be non-zero")]
    ZeroHalfLife,
    #[error("dampener penalty must be non-zero")]
    ZeroPenalty,
    #[error("element TTL must be non-zero")]
    ZeroElementTtl,
}
