//! Resolution strategies.
//!
//! Each strategy knows one way a candidate might become controllable. A miss
//! returns `Ok(None)` and the chain moves on; only a page fault that makes
//! the verdict untrustworthy surfaces as an error.

use std::sync::Arc;

use async_trait::async_trait;
use page_bridge::{HostPage, PageError, PlayerProbe};
use tracing::{debug, warn};
use vidlens_core_types::{CandidateKind, VideoCandidate};

use crate::errors::ResolveError;
use crate::surface::Adapter;

/// Conventional property names frameworks use to stash the player object on
/// its element. Probed in order.
pub const PLAYER_PROPERTY_NAMES: &[&str] = &["player", "_player", "playerInstance", "api"];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StrategyKind {
    Native,
    WrappedLookup,
    Iframe,
    UnknownVirtual,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Native => "native",
            StrategyKind::WrappedLookup => "wrapped-lookup",
            StrategyKind::Iframe => "iframe",
            StrategyKind::UnknownVirtual => "unknown-virtual",
        }
    }
}

pub struct ResolveContext {
    pub page: Arc<dyn HostPage>,
    pub candidate: VideoCandidate,
}

#[async_trait]
pub trait ResolveStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Try to bind. `Ok(None)` means this path does not apply here.
    async fn resolve(&self, ctx: &ResolveContext) -> Result<Option<Adapter>, ResolveError>;
}

/// Direct element control. Applies when the element answers a property read;
/// framework-managed elements that refuse reads fall through to the wrapped
/// lookup.
pub struct NativeStrategy;

#[async_trait]
impl ResolveStrategy for NativeStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Native
    }

    async fn resolve(&self, ctx: &ResolveContext) -> Result<Option<Adapter>, ResolveError> {
        if ctx.candidate.kind != CandidateKind::Element {
            return Ok(None);
        }
        match ctx.page.read_media(&ctx.candidate.node).await {
            Ok(_) => Ok(Some(Adapter::native(
                Arc::clone(&ctx.page),
                ctx.candidate.node.clone(),
            ))),
            Err(PageError::Script(reason)) => {
                debug!(
                    target: "video-adapter",
                    node = %ctx.candidate.node,
                    reason,
                    "element refused direct read, trying other paths"
                );
                Ok(None)
            }
            Err(PageError::NodeGone(_)) => Ok(None),
            Err(err) => Err(ResolveError::StrategyFailed {
                strategy: self.kind().as_str(),
                reason: err.to_string(),
            }),
        }
    }
}

/// Wrapped-player discovery. Walks the known exposure paths in order and
/// takes the first probe that returns a live player object. Probe faults are
/// absorbed: a broken path must not mask a working later one.
pub struct WrappedLookupStrategy;

impl WrappedLookupStrategy {
    fn probes(candidate: &VideoCandidate) -> Vec<PlayerProbe> {
        let mut probes = vec![PlayerProbe::GlobalRegistry];
        for property in PLAYER_PROPERTY_NAMES {
            probes.push(PlayerProbe::ElementProperty {
                node: candidate.node.clone(),
                property: property.to_string(),
            });
        }
        if let Some(element_id) = &candidate.element_dom_id {
            probes.push(PlayerProbe::RegistryById {
                element_id: element_id.clone(),
            });
        }
        probes
    }
}

#[async_trait]
impl ResolveStrategy for WrappedLookupStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::WrappedLookup
    }

    async fn resolve(&self, ctx: &ResolveContext) -> Result<Option<Adapter>, ResolveError> {
        if ctx.candidate.kind != CandidateKind::Element {
            return Ok(None);
        }
        for probe in Self::probes(&ctx.candidate) {
            match ctx.page.probe_player(&probe).await {
                Ok(Some(player)) => {
                    debug!(
                        target: "video-adapter",
                        probe = probe.name(),
                        player = %player,
                        "wrapped player discovered"
                    );
                    return Ok(Some(Adapter::wrapped(
                        Arc::clone(&ctx.page),
                        player,
                        Some(ctx.candidate.node.clone()),
                        probe.name(),
                    )));
                }
                Ok(None) => continue,
                Err(err) => {
                    warn!(
                        target: "video-adapter",
                        probe = probe.name(),
                        error = %err,
                        "player probe faulted, continuing"
                    );
                    continue;
                }
            }
        }
        Ok(None)
    }
}

/// Frame candidates: the player is real but unreachable, so the binding gets
/// a describe-only surface built from the frame's own attributes.
pub struct IframeStrategy;

#[async_trait]
impl ResolveStrategy for IframeStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Iframe
    }

    async fn resolve(&self, ctx: &ResolveContext) -> Result<Option<Adapter>, ResolveError> {
        if ctx.candidate.kind != CandidateKind::Frame {
            return Ok(None);
        }
        let src = ctx.candidate.src.clone().unwrap_or_default();
        Ok(Some(Adapter::iframe(src, ctx.candidate.frame_title.clone())))
    }
}

/// Last resort for element candidates. Never misses, so an element that
/// defeated every control path still binds and reports honestly.
pub struct UnknownVirtualStrategy;

#[async_trait]
impl ResolveStrategy for UnknownVirtualStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::UnknownVirtual
    }

    async fn resolve(&self, ctx: &ResolveContext) -> Result<Option<Adapter>, ResolveError> {
        if ctx.candidate.kind != CandidateKind::Element {
            return Ok(None);
        }
        Ok(Some(Adapter::unknown(ctx.candidate.src.clone())))
    }
}
