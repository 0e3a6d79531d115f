//! Snapshot and probe types exchanged across the page seam.

use serde::{Deserialize, Serialize};
use vidlens_core_types::{NodeId, NodeRect};

/// Where the page currently is.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PageLocation {
    pub href: String,
    pub host: Option<String>,
}

impl PageLocation {
    pub fn new(href: impl Into<String>, host: Option<&str>) -> Self {
        Self {
            href: href.into(),
            host: host.map(|h| h.to_string()),
        }
    }
}

/// Layout viewport dimensions, page coordinates anchored at the origin.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
        }
    }
}

/// One playable element as seen by a scan pass: geometry plus the cheap
/// playback state the scorer needs. Full property reads go through
/// [`MediaProps`].
#[derive(Clone, Debug)]
pub struct MediaNodeSnapshot {
    pub node: NodeId,
    pub rect: NodeRect,
    pub paused: bool,
    pub current_time: f64,
    pub dom_index: usize,
    /// The element's DOM id attribute, when present. Used for id-keyed
    /// wrapped-player registry lookups.
    pub element_id: Option<String>,
    pub src: Option<String>,
}

/// A frame that may host an inaccessible player.
#[derive(Clone, Debug)]
pub struct FrameSnapshot {
    pub node: NodeId,
    pub url: String,
    pub title: Option<String>,
    pub rect: NodeRect,
    pub dom_index: usize,
}

/// Full property read of a playable surface. Every field is optional: a
/// cross-origin or framework-managed element may refuse any subset.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MediaProps {
    pub current_time: Option<f64>,
    pub duration: Option<f64>,
    pub paused: Option<bool>,
    pub muted: Option<bool>,
    pub volume: Option<f64>,
    pub playback_rate: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub src: Option<String>,
    pub sources: Vec<String>,
}

/// Uniform invocation on a playable surface, element or wrapped player.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MediaCall {
    Play,
    Pause,
    SetCurrentTime(f64),
    SetRate(f64),
}

impl MediaCall {
    pub fn method(&self) -> &'static str {
        match self {
            MediaCall::Play => "play",
            MediaCall::Pause => "pause",
            MediaCall::SetCurrentTime(_) => "setCurrentTime",
            MediaCall::SetRate(_) => "setRate",
        }
    }
}

/// One wrapped-player discovery path. The framework exposes its internal
/// player object inconsistently across versions, so resolution tries several
/// independent probes and takes the first non-null result.
#[derive(Clone, Debug)]
pub enum PlayerProbe {
    /// Global registry enumeration API published on the page.
    GlobalRegistry,
    /// Player reference stored on the element under a conventional property
    /// name.
    ElementProperty { node: NodeId, property: String },
    /// Registry lookup keyed by the element's DOM id.
    RegistryById { element_id: String },
}

impl PlayerProbe {
    pub fn name(&self) -> &'static str {
        match self {
            PlayerProbe::GlobalRegistry => "global-registry",
            PlayerProbe::ElementProperty { .. } => "element-property",
            PlayerProbe::RegistryById { .. } => "registry-by-id",
        }
    }
}

/// Accessor read on a wrapped-player object.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum PlayerField {
    CurrentTime,
    Duration,
    Paused,
    Muted,
    Volume,
    PlaybackRate,
    Source,
    Title,
}

impl PlayerField {
    pub fn accessor(&self) -> &'static str {
        match self {
            PlayerField::CurrentTime => "currentTime",
            PlayerField::Duration => "duration",
            PlayerField::Paused => "paused",
            PlayerField::Muted => "muted",
            PlayerField::Volume => "volume",
            PlayerField::PlaybackRate => "playbackRate",
            PlayerField::Source => "currentSrc",
            PlayerField::Title => "title",
        }
    }
}

/// Text lookup near a candidate node, used by the metadata heuristics.
#[derive(Clone, Debug)]
pub enum TextProbe {
    /// Nearest heading-like sibling or parent text.
    NearestHeading,
    /// A selector scoped to the nearest player container.
    Selector(String),
    /// Any time-display text node inside the player container.
    TimeDisplay,
}

/// Structural page change observed by a backend's mutation watcher.
#[derive(Clone, Debug)]
pub enum PageMutation {
    /// Attribute mutation on a specific node.
    NodeAttribute { node: NodeId, attribute: String },
    /// Subtree mutation on the document body.
    SubtreeChanged {
        playable_added: bool,
        removed: Vec<NodeId>,
    },
}
