// crates/playback-core/src/error.rs
//
// The uniform error type at every IOTrait boundary (see Design Notes in
// SPEC_FULL.md — "Replacing exception-based error surfacing"). Plugin
// implementations are free to use `anyhow` internally the way
// velocut-media always has; they convert to `EngineError` only where they
// cross the Reader/Writer trait boundary.

use thiserror::Error;

/// The seven error kinds the spec names. Exhaustive — do not add a
/// catch-all `Other` variant, callers match on these directly.
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    #[error("no registered reader/writer for extension {extension:?}")]
    UnknownFormat { extension: String },

    #[error("failed to open {path}: {reason}")]
    OpenFailed { path: String, reason: String },

    #[error("decode error in {path} at {detail}")]
    Decode { path: String, detail: String },

    #[error("{path} has no data at the requested time")]
    NotFound { path: String },

    #[error("request cancelled")]
    Cancelled,

    #[error("cache could not allocate even after eviction ({needed} bytes needed, budget {budget})")]
    OverBudget { needed: u64, budget: u64 },

    #[error("I/O error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::IoError(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
