//! Adapter resolution: turning a scanned candidate into a uniform playback
//! capability object.
//!
//! The wrapped-player ecosystem exposes its internal object through
//! inconsistent, version-dependent paths; resolution therefore tries several
//! independent strategies and accepts the first success. Failure of one
//! strategy never aborts the others.

pub mod errors;
pub mod metrics;
pub mod resolver;
pub mod strategies;
pub mod surface;

pub use errors::{CallError, ResolveError};
pub use resolver::AdapterResolver;
pub use strategies::{StrategyKind, PLAYER_PROPERTY_NAMES};
pub use surface::Adapter;

use std::sync::Arc;

use async_trait::async_trait;
use vidlens_core_types::{AdapterKind, BindingId, CoreError, Platform, VideoCandidate};

/// The single active selection: candidate plus bound adapter. Replaced
/// wholesale on change, never mutated in place; the adapter kind and the
/// platform observed at resolution time are fixed for the binding's
/// lifetime.
#[derive(Clone)]
pub struct PrimaryBinding {
    pub id: BindingId,
    pub kind: AdapterKind,
    pub platform: Platform,
    pub candidate: VideoCandidate,
    pub adapter: Arc<Adapter>,
}

impl PrimaryBinding {
    pub fn new(candidate: VideoCandidate, adapter: Adapter, platform: Platform) -> Self {
        Self {
            id: BindingId::new(),
            kind: adapter.kind(),
            platform,
            candidate,
            adapter: Arc::new(adapter),
        }
    }
}

impl std::fmt::Debug for PrimaryBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrimaryBinding")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("node", &self.candidate.node)
            .finish()
    }
}

/// Access to the current binding. Implemented by the binding center;
/// consumed by the control dispatcher so every result reports against
/// whatever binding is current at completion time.
#[async_trait]
pub trait BindingSource: Send + Sync {
    /// The active binding, if any. Never a stale or in-resolution one.
    fn current(&self) -> Option<Arc<PrimaryBinding>>;

    /// The active binding, resolving on demand when the slot is unset.
    async fn acquire(&self) -> Result<Arc<PrimaryBinding>, CoreError> {
        self.current().ok_or(CoreError::NoVideoFound)
    }
}
