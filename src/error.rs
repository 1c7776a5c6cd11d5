//! Error taxonomy.
//!
//! Only configuration errors surface synchronously, at construction time,
//! before any reactive state exists. Everything that happens inside the
//! scheduler flush (watchers, computed invalidation, component updates) is a
//! failure-isolation unit: caught, logged via `tracing`, and never allowed to
//! cross the flush boundary.

use thiserror::Error;

/// All errors produced by the runtime.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid component or app configuration. The one category that is
    /// raised synchronously at construction time.
    #[error("invalid config: {0}")]
    Config(String),

    /// A render function failed. Caught around the update path; the
    /// component keeps its last successfully rendered tree for that cycle.
    #[error("render failed in `{component}`: {reason}")]
    Render { component: String, reason: String },

    /// A markup string embedded as a child could not be parsed. Caught
    /// locally; the offending string falls back to a plain text node.
    #[error("markup parse error at byte {pos}: {reason}")]
    Markup { pos: usize, reason: String },

    /// An async component loader reported failure. Surfaced as a dedicated
    /// error placeholder rather than propagated to the mount caller.
    #[error("component load failed: {0}")]
    Load(String),
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }
}
