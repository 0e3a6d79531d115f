//! Strategy chain assembly and execution.

use std::sync::Arc;

use page_bridge::HostPage;
use tracing::{debug, info};
use vidlens_core_types::{CandidateKind, Platform, VideoCandidate};

use crate::errors::ResolveError;
use crate::metrics;
use crate::strategies::{
    IframeStrategy, NativeStrategy, ResolveContext, ResolveStrategy, UnknownVirtualStrategy,
    WrappedLookupStrategy,
};
use crate::surface::Adapter;

/// Resolves a candidate into an adapter by running strategies in order until
/// one binds. The platform hint only reorders the chain; every applicable
/// strategy still gets its turn.
pub struct AdapterResolver {
    page: Arc<dyn HostPage>,
}

impl AdapterResolver {
    pub fn new(page: Arc<dyn HostPage>) -> Self {
        Self { page }
    }

    fn chain(candidate: &VideoCandidate, platform: Platform) -> Vec<Box<dyn ResolveStrategy>> {
        match candidate.kind {
            CandidateKind::Frame => vec![Box::new(IframeStrategy)],
            CandidateKind::Element => match platform {
                Platform::WrappedPlayer => vec![
                    Box::new(WrappedLookupStrategy),
                    Box::new(NativeStrategy),
                    Box::new(UnknownVirtualStrategy),
                ],
                Platform::Native | Platform::Unknown => vec![
                    Box::new(NativeStrategy),
                    Box::new(WrappedLookupStrategy),
                    Box::new(UnknownVirtualStrategy),
                ],
            },
        }
    }

    pub async fn resolve(
        &self,
        candidate: &VideoCandidate,
        platform: Platform,
    ) -> Result<Adapter, ResolveError> {
        let ctx = ResolveContext {
            page: Arc::clone(&self.page),
            candidate: candidate.clone(),
        };
        let mut last_failure: Option<ResolveError> = None;
        for strategy in Self::chain(candidate, platform) {
            let name = strategy.kind().as_str();
            match strategy.resolve(&ctx).await {
                Ok(Some(adapter)) => {
                    metrics::record_attempt(name, "bound");
                    metrics::record_binding(adapter.kind().as_str());
                    info!(
                        target: "video-adapter",
                        strategy = name,
                        kind = adapter.kind().as_str(),
                        node = %candidate.node,
                        "adapter bound"
                    );
                    return Ok(adapter);
                }
                Ok(None) => {
                    metrics::record_attempt(name, "miss");
                    debug!(target: "video-adapter", strategy = name, "strategy missed");
                }
                Err(err) => {
                    metrics::record_attempt(name, "failed");
                    debug!(
                        target: "video-adapter",
                        strategy = name,
                        error = %err,
                        "strategy failed"
                    );
                    last_failure = Some(err);
                }
            }
        }
        Err(last_failure.unwrap_or_else(|| {
            ResolveError::Exhausted(format!(
                "no strategy applied to {:?} candidate {}",
                candidate.kind, candidate.node
            ))
        }))
    }
}
