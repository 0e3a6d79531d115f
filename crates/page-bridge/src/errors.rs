use thiserror::Error;
use vidlens_core_types::NodeId;

/// Faults raised by a page backend. A script-level exception inside the host
/// page surfaces as `Script` and is contained by the caller; it never aborts
/// the pipeline.
#[derive(Debug, Error, Clone)]
pub enum PageError {
    #[error("node no longer present in page: {0}")]
    NodeGone(NodeId),
    #[error("page script failed: {0}")]
    Script(String),
    #[error("page backend unreachable: {0}")]
    Unreachable(String),
}
