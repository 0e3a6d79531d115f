//! The binding slot and its resolution loop.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use page_bridge::{HostPage, PageMutation};
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use vidlens_core_types::retry::{retry_bounded, RetryPolicy};
use vidlens_core_types::{BindingPhase, CoreError, Platform};
use video_adapter::{AdapterResolver, BindingSource, PrimaryBinding};
use video_scanner::{classify, PlatformHints, Scanner};

use crate::events::BindingEvent;
use crate::metrics;

/// Attribute mutations on the bound node that invalidate the binding. A
/// source swap means the element now plays different content.
const MEDIA_ATTRIBUTES: &[&str] = &["src", "currentSrc", "data-src"];

#[derive(Clone, Debug)]
pub struct BindingCenterConfig {
    pub retry: RetryPolicy,
    pub hints: PlatformHints,
    pub event_capacity: usize,
}

impl Default for BindingCenterConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            hints: PlatformHints::default(),
            event_capacity: 64,
        }
    }
}

enum SlotState {
    Unset,
    Resolving { attempt: u32 },
    Active(Arc<PrimaryBinding>),
    Stale(Arc<PrimaryBinding>),
}

/// Owns the single binding slot. Cheap to share; all clones of the Arc see
/// one slot.
pub struct BindingCenter {
    page: Arc<dyn HostPage>,
    scanner: Scanner,
    resolver: AdapterResolver,
    config: BindingCenterConfig,
    slot: RwLock<SlotState>,
    /// True while a resolution worker is running. Exactly one worker at a
    /// time; everyone else requests and waits.
    in_flight: AtomicBool,
    /// Bumped on every re-scan request. A pass that finishes under an older
    /// generation is discarded and rerun.
    generation: AtomicU64,
    events: broadcast::Sender<BindingEvent>,
}

impl BindingCenter {
    pub fn new(page: Arc<dyn HostPage>, config: BindingCenterConfig) -> Arc<Self> {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Arc::new(Self {
            scanner: Scanner::new(Arc::clone(&page)),
            resolver: AdapterResolver::new(Arc::clone(&page)),
            page,
            config,
            slot: RwLock::new(SlotState::Unset),
            in_flight: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            events,
        })
    }

    pub fn page(&self) -> Arc<dyn HostPage> {
        Arc::clone(&self.page)
    }

    pub fn phase(&self) -> BindingPhase {
        match &*self.slot.read() {
            SlotState::Unset => BindingPhase::Unset,
            SlotState::Resolving { .. } => BindingPhase::Resolving,
            SlotState::Active(_) => BindingPhase::Active,
            SlotState::Stale(_) => BindingPhase::Stale,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BindingEvent> {
        self.events.subscribe()
    }

    /// Return the active binding, resolving first if the slot is unset or
    /// stale. This is the entry point behind metadata queries.
    pub async fn ensure_binding(self: &Arc<Self>) -> Result<Arc<PrimaryBinding>, CoreError> {
        if let Some(binding) = self.current_active() {
            return Ok(binding);
        }
        self.run_exclusive().await
    }

    /// Mark the active binding stale. Idempotent; a slot that is not active
    /// is left alone.
    pub fn mark_stale(&self) {
        let mut slot = self.slot.write();
        if let SlotState::Active(binding) = &*slot {
            let binding = Arc::clone(binding);
            info!(target: "binding-center", binding = %binding.id, "binding marked stale");
            metrics::record_stale_mark();
            let id = binding.id.clone();
            *slot = SlotState::Stale(binding);
            drop(slot);
            self.emit(BindingEvent::Stale { id });
        }
    }

    /// Request a re-scan. Returns immediately: if a pass is already running
    /// it will observe the bumped generation and rerun; otherwise a worker is
    /// spawned.
    pub fn request_rescan(self: &Arc<Self>) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            metrics::record_coalesced();
            debug!(target: "binding-center", "re-scan coalesced into running pass");
            return;
        }
        let center = Arc::clone(self);
        tokio::spawn(async move {
            let (generation, _) = center.run_until_settled().await;
            center.finish_worker(generation);
        });
    }

    /// Does this page mutation invalidate or improve on the current binding?
    pub fn mutation_qualifies(&self, mutation: &PageMutation) -> bool {
        let bound_node = {
            match &*self.slot.read() {
                SlotState::Active(b) | SlotState::Stale(b) => {
                    b.adapter.node().cloned().or(Some(b.candidate.node.clone()))
                }
                _ => None,
            }
        };
        match mutation {
            PageMutation::NodeAttribute { node, attribute } => {
                bound_node.as_ref() == Some(node)
                    && MEDIA_ATTRIBUTES.iter().any(|a| a == attribute)
            }
            PageMutation::SubtreeChanged {
                playable_added,
                removed,
            } => {
                *playable_added
                    || bound_node
                        .as_ref()
                        .map(|n| removed.contains(n))
                        .unwrap_or(false)
            }
        }
    }

    /// The active binding, if any. Never a stale or in-resolution one.
    pub fn current(&self) -> Option<Arc<PrimaryBinding>> {
        self.current_active()
    }

    fn current_active(&self) -> Option<Arc<PrimaryBinding>> {
        match &*self.slot.read() {
            SlotState::Active(binding) => Some(Arc::clone(binding)),
            _ => None,
        }
    }

    /// Become the worker, or wait for the running one and re-read the slot.
    async fn run_exclusive(self: &Arc<Self>) -> Result<Arc<PrimaryBinding>, CoreError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let (generation, result) = self.run_until_settled().await;
            self.finish_worker(generation);
            return result;
        }

        // Another caller is resolving. Events only nudge the loop; the slot
        // itself is the source of truth, so a missed event cannot hang us.
        let mut rx = self.events.subscribe();
        loop {
            if let Some(binding) = self.current_active() {
                return Ok(binding);
            }
            if !self.in_flight.load(Ordering::SeqCst) {
                return match self.current_active() {
                    Some(binding) => Ok(binding),
                    None => Err(CoreError::NoVideoFound),
                };
            }
            let _ = tokio::time::timeout(std::time::Duration::from_millis(25), rx.recv()).await;
        }
    }

    /// Run passes until one completes under the generation it started with.
    /// A pass finished under a stale generation is thrown away entirely.
    /// Returns the generation the committed pass ran under, so the caller can
    /// detect requests that arrived after the final check.
    async fn run_until_settled(
        self: &Arc<Self>,
    ) -> (u64, Result<Arc<PrimaryBinding>, CoreError>) {
        loop {
            let generation = self.generation.load(Ordering::SeqCst);
            let outcome = self.resolve_pass().await;
            if self.generation.load(Ordering::SeqCst) != generation {
                metrics::record_pass("discarded");
                debug!(target: "binding-center", "pass superseded before commit, rerunning");
                continue;
            }
            let result = match outcome {
                Ok(binding) => {
                    metrics::record_pass("bound");
                    *self.slot.write() = SlotState::Active(Arc::clone(&binding));
                    info!(
                        target: "binding-center",
                        binding = %binding.id,
                        kind = binding.kind.as_str(),
                        "binding active"
                    );
                    self.emit(BindingEvent::Bound {
                        id: binding.id.clone(),
                        kind: binding.kind,
                    });
                    Ok(binding)
                }
                Err(err) => {
                    metrics::record_pass("lost");
                    *self.slot.write() = SlotState::Unset;
                    warn!(target: "binding-center", error = %err, "resolution exhausted, slot unset");
                    self.emit(BindingEvent::Lost);
                    Err(err)
                }
            };
            return (generation, result);
        }
    }

    /// One bounded-retry resolution pass: scan, classify, resolve.
    async fn resolve_pass(self: &Arc<Self>) -> Result<Arc<PrimaryBinding>, CoreError> {
        retry_bounded(self.config.retry, |attempt| {
            let center = Arc::clone(self);
            async move {
                *center.slot.write() = SlotState::Resolving { attempt };
                center.emit(BindingEvent::Resolving { attempt });

                let candidate = center
                    .scanner
                    .scan()
                    .await
                    .map_err(|err| {
                        CoreError::AdapterResolutionFailed(format!("scan failed: {err}"))
                    })?
                    .ok_or(CoreError::NoVideoFound)?;

                let location = center
                    .page
                    .location()
                    .await
                    .map(|loc| classify(&loc, &center.config.hints))
                    .unwrap_or(Platform::Unknown);

                let adapter = center
                    .resolver
                    .resolve(&candidate, location)
                    .await
                    .map_err(|err| CoreError::AdapterResolutionFailed(err.to_string()))?;

                Ok(Arc::new(PrimaryBinding::new(candidate, adapter, location)))
            }
        })
        .await
    }

    /// Clear the in-flight flag and respawn if any request slipped in after
    /// the worker's final generation check. Such a request was coalesced into
    /// a worker that no longer exists, so the generation gap is the only
    /// trace of it.
    fn finish_worker(self: &Arc<Self>, completed_generation: u64) {
        self.in_flight.store(false, Ordering::SeqCst);
        if self.generation.load(Ordering::SeqCst) != completed_generation {
            self.request_rescan();
        }
    }

    fn emit(&self, event: BindingEvent) {
        let _ = self.events.send(event);
    }
}

/// `BindingSource` is defined in `video-adapter`, so the orphan rule forbids
/// implementing it directly for `Arc<BindingCenter>`; this wrapper carries
/// the impl instead.
pub struct BindingCenterSource(pub Arc<BindingCenter>);

#[async_trait::async_trait]
impl BindingSource for BindingCenterSource {
    fn current(&self) -> Option<Arc<PrimaryBinding>> {
        self.0.current_active()
    }

    async fn acquire(&self) -> Result<Arc<PrimaryBinding>, CoreError> {
        self.0.ensure_binding().await
    }
}
