//! Primary binding lifecycle.
//!
//! One slot, one binding. The center owns the Unset / Resolving / Active /
//! Stale state machine, serializes resolution passes, coalesces re-scan
//! requests that arrive while a pass is running, and discards any pass whose
//! result is already stale by the time it completes. A change observer task
//! watches page mutations and keeps the slot honest without polling.

pub mod center;
pub mod events;
pub mod metrics;
pub mod watcher;

pub use center::{BindingCenter, BindingCenterConfig, BindingCenterSource};
pub use events::BindingEvent;
pub use watcher::ChangeObserver;
