//! The `HostPage` capability trait.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;
use vidlens_core_types::{NodeId, PlayerRef};

use crate::errors::PageError;
use crate::model::{
    FrameSnapshot, MediaCall, MediaNodeSnapshot, MediaProps, PageLocation, PageMutation,
    PlayerField, PlayerProbe, TextProbe, Viewport,
};

/// Minimal capability surface a page backend must provide for discovery,
/// metadata extraction and control. All methods are read- or call-throughs;
/// no backend keeps pipeline state.
#[async_trait]
pub trait HostPage: Send + Sync {
    async fn location(&self) -> Result<PageLocation, PageError>;

    async fn viewport(&self) -> Result<Viewport, PageError>;

    /// All playable elements currently in the document, in document order.
    async fn media_nodes(&self) -> Result<Vec<MediaNodeSnapshot>, PageError>;

    /// All frames currently in the document, in document order.
    async fn frame_nodes(&self) -> Result<Vec<FrameSnapshot>, PageError>;

    /// Full property read of one playable element. Fails with `Script` when
    /// the element refuses direct reads (framework-managed or cross-origin).
    async fn read_media(&self, node: &NodeId) -> Result<MediaProps, PageError>;

    /// Invoke a playback method directly on the element.
    async fn invoke_media(&self, node: &NodeId, call: MediaCall) -> Result<(), PageError>;

    /// Try one wrapped-player discovery path. `Ok(None)` is a miss, not a
    /// fault.
    async fn probe_player(&self, probe: &PlayerProbe) -> Result<Option<PlayerRef>, PageError>;

    /// Read an accessor on a previously probed player object.
    async fn read_player(&self, player: &PlayerRef, field: PlayerField)
        -> Result<Value, PageError>;

    /// Call through to a previously probed player object. An exception inside
    /// the page surfaces as `Script`.
    async fn invoke_player(&self, player: &PlayerRef, call: MediaCall) -> Result<(), PageError>;

    /// Text lookup near the node, for title and time-display heuristics.
    async fn container_text(
        &self,
        node: &NodeId,
        probe: TextProbe,
    ) -> Result<Option<String>, PageError>;

    /// Simulate activation of a control surface matching `selector`, scoped
    /// to the node's player container. Returns whether anything was clicked.
    async fn click_control(&self, node: &NodeId, selector: &str) -> Result<bool, PageError>;

    async fn page_title(&self) -> Result<String, PageError>;

    /// Subscribe to structural changes. Backends coalesce raw DOM mutation
    /// records into [`PageMutation`] values before publishing.
    fn mutations(&self) -> broadcast::Receiver<PageMutation>;
}
