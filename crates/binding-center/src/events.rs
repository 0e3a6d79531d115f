//! Lifecycle events published on the center's broadcast channel.

use vidlens_core_types::{AdapterKind, BindingId};

/// One observable transition of the binding slot. Consumers that lag are
/// dropped by the broadcast channel and must re-read the slot on resubscribe.
#[derive(Clone, Debug)]
pub enum BindingEvent {
    /// A resolution pass started or retried.
    Resolving { attempt: u32 },
    /// A new binding became active.
    Bound { id: BindingId, kind: AdapterKind },
    /// The active binding was marked stale by a page change.
    Stale { id: BindingId },
    /// Resolution gave up; the slot is unset.
    Lost,
}
