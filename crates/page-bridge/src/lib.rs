//! Capability seam between the discovery pipeline and whatever renders the
//! host page.
//!
//! Everything above this crate speaks in terms of the [`HostPage`] trait and
//! the snapshot types in [`model`]; concrete backends (CDP, scripted double)
//! live behind it.

pub mod errors;
pub mod model;
pub mod ports;
pub mod scripted;

pub use errors::PageError;
pub use model::{
    FrameSnapshot, MediaCall, MediaNodeSnapshot, MediaProps, PageLocation, PageMutation,
    PlayerField, PlayerProbe, TextProbe, Viewport,
};
pub use ports::HostPage;
pub use scripted::{MediaNodeSpec, PlayerSpec, ScriptedPage};

use tokio::sync::broadcast;

/// Create a mutation bus with the given capacity. The sender side belongs to
/// the page backend; observers subscribe through [`HostPage::mutations`].
pub fn mutation_bus(capacity: usize) -> broadcast::Sender<PageMutation> {
    let (tx, _) = broadcast::channel(capacity.max(1));
    tx
}
