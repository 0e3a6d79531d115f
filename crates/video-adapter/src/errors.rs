//! Resolution and invocation error types.

use thiserror::Error;

/// Failure to bind any adapter to a candidate. Strategy misses are not
/// errors; this only surfaces when the page itself faults hard enough that
/// no strategy could run to completion.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("strategy {strategy} failed: {reason}")]
    StrategyFailed {
        strategy: &'static str,
        reason: String,
    },

    #[error("no adapter strategy produced a binding: {0}")]
    Exhausted(String),
}

/// Failure of a single adapter invocation. The dispatcher maps these into
/// control results; they never tear down the binding by themselves.
#[derive(Debug, Error)]
pub enum CallError {
    /// The adapter kind cannot perform this operation at all. Virtual
    /// adapters reject direct playback calls this way.
    #[error("operation not supported: {0}")]
    Unsupported(String),

    /// The surface accepted the call shape but the invocation failed: a page
    /// exception, a vanished node, or a timeout.
    #[error("invocation failed: {0}")]
    Failed(String),
}
