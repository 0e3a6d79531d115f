//! Shared identifiers, error taxonomy and the canonical data model for the
//! vidlens crates.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub mod retry;

/// Error taxonomy surfaced to bridge callers. Recoverable conditions inside
/// the pipeline (single strategy miss, framework lookup miss) are absorbed
/// locally and never reach this enum.
#[derive(Debug, Error, Clone)]
pub enum CoreError {
    #[error("no qualifying video found")]
    NoVideoFound,
    #[error("adapter resolution failed: {0}")]
    AdapterResolutionFailed(String),
    #[error("control rejected: {0}")]
    ControlRejected(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl CoreError {
    /// Stable machine-readable code used on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::NoVideoFound => "NoVideoFound",
            CoreError::AdapterResolutionFailed(_) => "AdapterResolutionFailed",
            CoreError::ControlRejected(_) => "ControlRejected",
            CoreError::InvalidParameter(_) => "InvalidParameter",
        }
    }
}

/// Handle to a media-bearing node issued by the page backend. Opaque to the
/// discovery pipeline; only the backend that issued it can dereference it.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one PrimaryBinding incarnation. Replaced wholesale whenever
/// the underlying node changes; never reused.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct BindingId(pub String);

impl BindingId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for BindingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to a wrapped-player object stashed by the page backend.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct PlayerRef(pub String);

impl fmt::Display for PlayerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Platform hint derived from the page location. Used only to bias the order
/// in which adapter strategies are tried.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    Native,
    WrappedPlayer,
    Unknown,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Native => "native",
            Platform::WrappedPlayer => "wrapped-player",
            Platform::Unknown => "unknown",
        }
    }
}

/// Adapter kind bound into a PrimaryBinding. Fixed for the binding's
/// lifetime.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdapterKind {
    Native,
    WrappedPlayer,
    IframeVirtual,
    UnknownVirtual,
}

impl AdapterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterKind::Native => "native",
            AdapterKind::WrappedPlayer => "wrapped-player",
            AdapterKind::IframeVirtual => "iframe-virtual",
            AdapterKind::UnknownVirtual => "unknown-virtual",
        }
    }

    /// Virtual adapters do not wrap a native playable element.
    pub fn is_virtual(&self) -> bool {
        matches!(
            self,
            AdapterKind::IframeVirtual | AdapterKind::UnknownVirtual
        )
    }
}

/// Kind of page node a candidate points at.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CandidateKind {
    Element,
    Frame,
}

/// Axis-aligned rectangle in page coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NodeRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> f64 {
        (self.width.max(0.0)) * (self.height.max(0.0))
    }

    /// Area of the intersection with a viewport anchored at the origin.
    pub fn visible_area(&self, viewport_width: f64, viewport_height: f64) -> f64 {
        let left = self.x.max(0.0);
        let top = self.y.max(0.0);
        let right = (self.x + self.width).min(viewport_width);
        let bottom = (self.y + self.height).min(viewport_height);
        if right <= left || bottom <= top {
            return 0.0;
        }
        (right - left) * (bottom - top)
    }
}

/// One media-bearing node discovered by a scan pass. Ephemeral: recomputed on
/// every scan, never persisted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VideoCandidate {
    pub node: NodeId,
    pub kind: CandidateKind,
    pub rect: NodeRect,
    pub paused: bool,
    pub current_time: f64,
    pub dom_index: usize,
    pub score: f64,
    pub src: Option<String>,
    /// The element's DOM id attribute, for id-keyed registry lookups.
    pub element_dom_id: Option<String>,
    /// Frame title when the candidate is a player-like frame.
    pub frame_title: Option<String>,
}

impl VideoCandidate {
    /// Playing, or paused with nonzero position.
    pub fn started(&self) -> bool {
        !self.paused || self.current_time > 0.0
    }
}

/// Canonical metadata snapshot. Always produced by a full read of the current
/// binding, never merged from a stale one.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playback_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    pub platform: String,
    pub is_virtual: bool,
    pub in_iframe: bool,
    pub wrapped_player: bool,
    pub streaming: bool,
}

/// Uniform control verbs accepted over the bridge.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ControlVerb {
    Play,
    Pause,
    Seek,
    SetRate,
}

impl ControlVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlVerb::Play => "play",
            ControlVerb::Pause => "pause",
            ControlVerb::Seek => "seek",
            ControlVerb::SetRate => "setRate",
        }
    }
}

/// A control command with its optional numeric payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ControlCommand {
    pub verb: ControlVerb,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
}

impl ControlCommand {
    pub fn play() -> Self {
        Self {
            verb: ControlVerb::Play,
            time: None,
            rate: None,
        }
    }

    pub fn pause() -> Self {
        Self {
            verb: ControlVerb::Pause,
            time: None,
            rate: None,
        }
    }

    pub fn seek(time: f64) -> Self {
        Self {
            verb: ControlVerb::Seek,
            time: Some(time),
            rate: None,
        }
    }

    pub fn set_rate(rate: f64) -> Self {
        Self {
            verb: ControlVerb::SetRate,
            time: None,
            rate: Some(rate),
        }
    }

    /// Validate the numeric payload before any adapter call is attempted.
    /// Seek requires a finite, non-negative time; setRate a finite, positive
    /// rate. Invalid payloads short-circuit without touching the adapter.
    pub fn validate(&self) -> Result<(), CoreError> {
        match self.verb {
            ControlVerb::Play | ControlVerb::Pause => Ok(()),
            ControlVerb::Seek => match self.time {
                Some(t) if t.is_finite() && t >= 0.0 => Ok(()),
                Some(t) => Err(CoreError::InvalidParameter(format!(
                    "seek time must be finite and non-negative, got {t}"
                ))),
                None => Err(CoreError::InvalidParameter(
                    "seek requires a time payload".to_string(),
                )),
            },
            ControlVerb::SetRate => match self.rate {
                Some(r) if r.is_finite() && r > 0.0 => Ok(()),
                Some(r) => Err(CoreError::InvalidParameter(format!(
                    "playback rate must be finite and positive, got {r}"
                ))),
                None => Err(CoreError::InvalidParameter(
                    "setRate requires a rate payload".to_string(),
                )),
            },
        }
    }
}

/// Outcome of one dispatched control command. `metadata` is the truth read
/// after the attempt, regardless of which path ran.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ControlResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<VideoMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Machine-readable taxonomy code matching `error`, when failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl ControlResult {
    pub fn succeeded(metadata: VideoMetadata) -> Self {
        Self {
            success: true,
            metadata: Some(metadata),
            warning: None,
            error: None,
            error_code: None,
        }
    }

    pub fn degraded(metadata: Option<VideoMetadata>, warning: impl Into<String>) -> Self {
        Self {
            success: true,
            metadata,
            warning: Some(warning.into()),
            error: None,
            error_code: None,
        }
    }

    pub fn failed(metadata: Option<VideoMetadata>, error: &CoreError) -> Self {
        Self {
            success: false,
            metadata,
            warning: None,
            error: Some(error.to_string()),
            error_code: Some(error.code().to_string()),
        }
    }
}

/// Externally visible phase of the PrimaryBinding state machine.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingPhase {
    Unset,
    Resolving,
    Active,
    Stale,
}

impl BindingPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            BindingPhase::Unset => "unset",
            BindingPhase::Resolving => "resolving",
            BindingPhase::Active => "active",
            BindingPhase::Stale => "stale",
        }
    }
}
