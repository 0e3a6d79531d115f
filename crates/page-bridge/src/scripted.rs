//! In-memory page double.
//!
//! `ScriptedPage` implements [`HostPage`] over hand-built node and player
//! tables so unit and integration tests can stage every page shape the
//! pipeline has to survive: hidden elements, wrapped-player registries,
//! throwing surfaces, structural mutations. No rendering, no network.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use vidlens_core_types::{NodeId, NodeRect, PlayerRef};

use crate::errors::PageError;
use crate::model::{
    FrameSnapshot, MediaCall, MediaNodeSnapshot, MediaProps, PageLocation, PageMutation,
    PlayerField, PlayerProbe, TextProbe, Viewport,
};
use crate::mutation_bus;
use crate::ports::HostPage;

/// Blueprint for one playable element.
#[derive(Clone, Debug)]
pub struct MediaNodeSpec {
    pub rect: NodeRect,
    pub paused: bool,
    pub current_time: f64,
    pub duration: Option<f64>,
    pub muted: bool,
    pub volume: f64,
    pub playback_rate: f64,
    pub src: Option<String>,
    pub sources: Vec<String>,
    pub element_id: Option<String>,
    /// When false the element refuses direct property reads and calls, the
    /// way framework-managed custom elements do.
    pub readable: bool,
    pub heading: Option<String>,
    pub selector_texts: HashMap<String, String>,
    pub time_display: Option<String>,
    pub control_selectors: HashSet<String>,
    /// Methods that raise inside the page when invoked directly.
    pub throw_on: HashSet<String>,
}

impl Default for MediaNodeSpec {
    fn default() -> Self {
        Self {
            rect: NodeRect::new(0.0, 0.0, 640.0, 360.0),
            paused: true,
            current_time: 0.0,
            duration: Some(120.0),
            muted: false,
            volume: 1.0,
            playback_rate: 1.0,
            src: Some("https://media.example/clip.mp4".to_string()),
            sources: Vec::new(),
            element_id: None,
            readable: true,
            heading: None,
            selector_texts: HashMap::new(),
            time_display: None,
            control_selectors: HashSet::new(),
            throw_on: HashSet::new(),
        }
    }
}

impl MediaNodeSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rect(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.rect = NodeRect::new(x, y, width, height);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.rect = NodeRect::new(0.0, 0.0, 0.0, 0.0);
        self
    }

    pub fn playing(mut self) -> Self {
        self.paused = false;
        self
    }

    pub fn at_position(mut self, seconds: f64) -> Self {
        self.current_time = seconds;
        self
    }

    pub fn duration(mut self, seconds: Option<f64>) -> Self {
        self.duration = seconds;
        self
    }

    pub fn src(mut self, src: impl Into<String>) -> Self {
        self.src = Some(src.into());
        self
    }

    pub fn sources(mut self, sources: &[&str]) -> Self {
        self.sources = sources.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn element_id(mut self, id: impl Into<String>) -> Self {
        self.element_id = Some(id.into());
        self
    }

    pub fn unreadable(mut self) -> Self {
        self.readable = false;
        self
    }

    pub fn heading(mut self, text: impl Into<String>) -> Self {
        self.heading = Some(text.into());
        self
    }

    pub fn selector_text(mut self, selector: impl Into<String>, text: impl Into<String>) -> Self {
        self.selector_texts.insert(selector.into(), text.into());
        self
    }

    pub fn time_display(mut self, text: impl Into<String>) -> Self {
        self.time_display = Some(text.into());
        self
    }

    pub fn control_selector(mut self, selector: impl Into<String>) -> Self {
        self.control_selectors.insert(selector.into());
        self
    }

    pub fn throws_on(mut self, method: impl Into<String>) -> Self {
        self.throw_on.insert(method.into());
        self
    }
}

/// Blueprint for one wrapped-player object.
#[derive(Clone, Debug)]
pub struct PlayerSpec {
    pub current_time: f64,
    pub duration: Option<f64>,
    pub paused: bool,
    pub muted: bool,
    pub volume: f64,
    pub playback_rate: f64,
    pub src: Option<String>,
    pub title: Option<String>,
    pub throw_on: HashSet<String>,
}

impl Default for PlayerSpec {
    fn default() -> Self {
        Self {
            current_time: 0.0,
            duration: Some(300.0),
            paused: true,
            muted: false,
            volume: 1.0,
            playback_rate: 1.0,
            src: Some("https://media.example/wrapped.m3u8".to_string()),
            title: None,
            throw_on: HashSet::new(),
        }
    }
}

impl PlayerSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at_position(mut self, seconds: f64) -> Self {
        self.current_time = seconds;
        self
    }

    pub fn duration(mut self, seconds: Option<f64>) -> Self {
        self.duration = seconds;
        self
    }

    pub fn playing(mut self) -> Self {
        self.paused = false;
        self
    }

    pub fn src(mut self, src: impl Into<String>) -> Self {
        self.src = Some(src.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn throws_on(mut self, method: impl Into<String>) -> Self {
        self.throw_on.insert(method.into());
        self
    }
}

struct ScriptedNode {
    id: NodeId,
    rect: NodeRect,
    element_id: Option<String>,
    readable: bool,
    props: MediaProps,
    throw_on: HashSet<String>,
    player_props: HashMap<String, String>,
    heading: Option<String>,
    selector_texts: HashMap<String, String>,
    time_display: Option<String>,
    control_selectors: HashSet<String>,
}

struct ScriptedFrame {
    id: NodeId,
    url: String,
    title: Option<String>,
    rect: NodeRect,
}

struct ScriptedPlayer {
    fields: RwLock<HashMap<&'static str, Value>>,
    throw_on: HashSet<String>,
}

struct State {
    location: RwLock<PageLocation>,
    viewport: RwLock<Viewport>,
    title: RwLock<String>,
    nodes: RwLock<Vec<ScriptedNode>>,
    frames: RwLock<Vec<ScriptedFrame>>,
    players: DashMap<String, Arc<ScriptedPlayer>>,
    global_registry: RwLock<Vec<String>>,
    id_registry: DashMap<String, String>,
    calls: DashMap<String, usize>,
    next_player: AtomicUsize,
    bus: broadcast::Sender<PageMutation>,
}

/// Scripted page double. Cheap to clone; all clones share one page state.
#[derive(Clone)]
pub struct ScriptedPage {
    state: Arc<State>,
}

impl ScriptedPage {
    pub fn new(href: impl Into<String>) -> Self {
        let href = href.into();
        let host = url_host(&href);
        Self {
            state: Arc::new(State {
                location: RwLock::new(PageLocation { href, host }),
                viewport: RwLock::new(Viewport::default()),
                title: RwLock::new("Untitled page".to_string()),
                nodes: RwLock::new(Vec::new()),
                frames: RwLock::new(Vec::new()),
                players: DashMap::new(),
                global_registry: RwLock::new(Vec::new()),
                id_registry: DashMap::new(),
                calls: DashMap::new(),
                next_player: AtomicUsize::new(0),
                bus: mutation_bus(64),
            }),
        }
    }

    pub fn set_viewport(&self, width: f64, height: f64) {
        *self.state.viewport.write() = Viewport { width, height };
    }

    pub fn set_page_title(&self, title: impl Into<String>) {
        *self.state.title.write() = title.into();
    }

    /// Install a playable element and announce it on the mutation bus.
    pub fn install_media_node(&self, spec: MediaNodeSpec) -> NodeId {
        let id = NodeId::new();
        let props = MediaProps {
            current_time: Some(spec.current_time),
            duration: spec.duration,
            paused: Some(spec.paused),
            muted: Some(spec.muted),
            volume: Some(spec.volume),
            playback_rate: Some(spec.playback_rate),
            width: Some(spec.rect.width),
            height: Some(spec.rect.height),
            src: spec.src,
            sources: spec.sources,
        };
        self.state.nodes.write().push(ScriptedNode {
            id: id.clone(),
            rect: spec.rect,
            element_id: spec.element_id,
            readable: spec.readable,
            props,
            throw_on: spec.throw_on,
            player_props: HashMap::new(),
            heading: spec.heading,
            selector_texts: spec.selector_texts,
            time_display: spec.time_display,
            control_selectors: spec.control_selectors,
        });
        self.emit(PageMutation::SubtreeChanged {
            playable_added: true,
            removed: Vec::new(),
        });
        id
    }

    /// Install a frame node. Frames never carry timing data.
    pub fn install_frame(
        &self,
        url: impl Into<String>,
        title: Option<&str>,
        rect: NodeRect,
    ) -> NodeId {
        let id = NodeId::new();
        self.state.frames.write().push(ScriptedFrame {
            id: id.clone(),
            url: url.into(),
            title: title.map(|t| t.to_string()),
            rect,
        });
        id
    }

    /// Install a wrapped-player object, returning its stash key.
    pub fn install_player(&self, spec: PlayerSpec) -> PlayerRef {
        let n = self.state.next_player.fetch_add(1, Ordering::SeqCst);
        let key = format!("player-{n}");
        let mut fields: HashMap<&'static str, Value> = HashMap::new();
        fields.insert("currentTime", json!(spec.current_time));
        match spec.duration {
            Some(d) => fields.insert("duration", json!(d)),
            None => fields.insert("duration", Value::Null),
        };
        fields.insert("paused", json!(spec.paused));
        fields.insert("muted", json!(spec.muted));
        fields.insert("volume", json!(spec.volume));
        fields.insert("playbackRate", json!(spec.playback_rate));
        fields.insert(
            "currentSrc",
            spec.src.map(Value::String).unwrap_or(Value::Null),
        );
        fields.insert(
            "title",
            spec.title.map(Value::String).unwrap_or(Value::Null),
        );
        self.state.players.insert(
            key.clone(),
            Arc::new(ScriptedPlayer {
                fields: RwLock::new(fields),
                throw_on: spec.throw_on,
            }),
        );
        PlayerRef(key)
    }

    /// Make the player discoverable through the global enumeration API.
    pub fn publish_in_global_registry(&self, player: &PlayerRef) {
        self.state.global_registry.write().push(player.0.clone());
    }

    /// Stash a player reference on the element under a property name.
    pub fn attach_player_property(&self, node: &NodeId, property: &str, player: &PlayerRef) {
        let mut nodes = self.state.nodes.write();
        if let Some(n) = nodes.iter_mut().find(|n| &n.id == node) {
            n.player_props
                .insert(property.to_string(), player.0.clone());
        }
    }

    /// Register the player in the id-keyed registry.
    pub fn register_player_for_element_id(&self, element_id: &str, player: &PlayerRef) {
        self.state
            .id_registry
            .insert(element_id.to_string(), player.0.clone());
    }

    /// Mutate a media attribute and announce it, the way a source swap does.
    pub fn set_media_attribute(&self, node: &NodeId, attribute: &str, value: &str) {
        {
            let mut nodes = self.state.nodes.write();
            if let Some(n) = nodes.iter_mut().find(|n| &n.id == node) {
                if attribute == "src" {
                    n.props.src = Some(value.to_string());
                }
            }
        }
        self.emit(PageMutation::NodeAttribute {
            node: node.clone(),
            attribute: attribute.to_string(),
        });
    }

    /// Remove a node from the document and announce the removal.
    pub fn remove_node(&self, node: &NodeId) {
        {
            let mut nodes = self.state.nodes.write();
            nodes.retain(|n| &n.id != node);
        }
        {
            let mut frames = self.state.frames.write();
            frames.retain(|f| &f.id != node);
        }
        self.emit(PageMutation::SubtreeChanged {
            playable_added: false,
            removed: vec![node.clone()],
        });
    }

    /// How many times a playback method was attempted on the element.
    pub fn media_call_count(&self, node: &NodeId, method: &str) -> usize {
        self.count(&format!("{node}:{method}"))
    }

    /// How many times a method was attempted on a wrapped player.
    pub fn player_call_count(&self, player: &PlayerRef, method: &str) -> usize {
        self.count(&format!("{player}:{method}"))
    }

    /// How many control-surface clicks were simulated for the selector.
    pub fn click_count(&self, node: &NodeId, selector: &str) -> usize {
        self.count(&format!("{node}:click:{selector}"))
    }

    fn count(&self, key: &str) -> usize {
        self.state.calls.get(key).map(|c| *c).unwrap_or(0)
    }

    fn record(&self, key: String) {
        *self.state.calls.entry(key).or_insert(0) += 1;
    }

    fn emit(&self, mutation: PageMutation) {
        // No subscribers yet is fine.
        let _ = self.state.bus.send(mutation);
    }

    fn with_node<T>(
        &self,
        node: &NodeId,
        f: impl FnOnce(&ScriptedNode) -> T,
    ) -> Result<T, PageError> {
        let nodes = self.state.nodes.read();
        nodes
            .iter()
            .find(|n| &n.id == node)
            .map(f)
            .ok_or_else(|| PageError::NodeGone(node.clone()))
    }

    fn with_node_mut<T>(
        &self,
        node: &NodeId,
        f: impl FnOnce(&mut ScriptedNode) -> T,
    ) -> Result<T, PageError> {
        let mut nodes = self.state.nodes.write();
        nodes
            .iter_mut()
            .find(|n| &n.id == node)
            .map(f)
            .ok_or_else(|| PageError::NodeGone(node.clone()))
    }

    fn player(&self, player: &PlayerRef) -> Result<Arc<ScriptedPlayer>, PageError> {
        self.state
            .players
            .get(&player.0)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| PageError::Script(format!("player object gone: {player}")))
    }
}

#[async_trait]
impl HostPage for ScriptedPage {
    async fn location(&self) -> Result<PageLocation, PageError> {
        Ok(self.state.location.read().clone())
    }

    async fn viewport(&self) -> Result<Viewport, PageError> {
        Ok(*self.state.viewport.read())
    }

    async fn media_nodes(&self) -> Result<Vec<MediaNodeSnapshot>, PageError> {
        let nodes = self.state.nodes.read();
        Ok(nodes
            .iter()
            .enumerate()
            .map(|(dom_index, n)| MediaNodeSnapshot {
                node: n.id.clone(),
                rect: n.rect,
                paused: n.props.paused.unwrap_or(true),
                current_time: n.props.current_time.unwrap_or(0.0),
                dom_index,
                element_id: n.element_id.clone(),
                src: n.props.src.clone(),
            })
            .collect())
    }

    async fn frame_nodes(&self) -> Result<Vec<FrameSnapshot>, PageError> {
        let frames = self.state.frames.read();
        Ok(frames
            .iter()
            .enumerate()
            .map(|(dom_index, f)| FrameSnapshot {
                node: f.id.clone(),
                url: f.url.clone(),
                title: f.title.clone(),
                rect: f.rect,
                dom_index,
            })
            .collect())
    }

    async fn read_media(&self, node: &NodeId) -> Result<MediaProps, PageError> {
        let (readable, props) = self.with_node(node, |n| (n.readable, n.props.clone()))?;
        if !readable {
            return Err(PageError::Script(format!(
                "element refuses direct media reads: {node}"
            )));
        }
        Ok(props)
    }

    async fn invoke_media(&self, node: &NodeId, call: MediaCall) -> Result<(), PageError> {
        self.record(format!("{node}:{}", call.method()));
        self.with_node_mut(node, |n| {
            if !n.readable {
                return Err(PageError::Script(format!(
                    "element refuses direct calls: {node}"
                )));
            }
            if n.throw_on.contains(call.method()) {
                return Err(PageError::Script(format!(
                    "{}() raised inside the page",
                    call.method()
                )));
            }
            match call {
                MediaCall::Play => n.props.paused = Some(false),
                MediaCall::Pause => n.props.paused = Some(true),
                MediaCall::SetCurrentTime(t) => n.props.current_time = Some(t),
                MediaCall::SetRate(r) => n.props.playback_rate = Some(r),
            }
            Ok(())
        })?
    }

    async fn probe_player(&self, probe: &PlayerProbe) -> Result<Option<PlayerRef>, PageError> {
        match probe {
            PlayerProbe::GlobalRegistry => {
                let registry = self.state.global_registry.read();
                Ok(registry
                    .iter()
                    .find(|id| self.state.players.contains_key(*id))
                    .map(|id| PlayerRef(id.clone())))
            }
            PlayerProbe::ElementProperty { node, property } => {
                let found = self.with_node(node, |n| n.player_props.get(property).cloned())?;
                Ok(found.map(PlayerRef))
            }
            PlayerProbe::RegistryById { element_id } => Ok(self
                .state
                .id_registry
                .get(element_id)
                .map(|entry| PlayerRef(entry.value().clone()))),
        }
    }

    async fn read_player(
        &self,
        player: &PlayerRef,
        field: PlayerField,
    ) -> Result<Value, PageError> {
        let p = self.player(player)?;
        if p.throw_on.contains(field.accessor()) {
            return Err(PageError::Script(format!(
                "{}() raised inside the page",
                field.accessor()
            )));
        }
        let fields = p.fields.read();
        Ok(fields.get(field.accessor()).cloned().unwrap_or(Value::Null))
    }

    async fn invoke_player(&self, player: &PlayerRef, call: MediaCall) -> Result<(), PageError> {
        self.record(format!("{player}:{}", call.method()));
        let p = self.player(player)?;
        if p.throw_on.contains(call.method()) {
            return Err(PageError::Script(format!(
                "{}() raised inside the page",
                call.method()
            )));
        }
        let mut fields = p.fields.write();
        match call {
            MediaCall::Play => fields.insert("paused", json!(false)),
            MediaCall::Pause => fields.insert("paused", json!(true)),
            MediaCall::SetCurrentTime(t) => fields.insert("currentTime", json!(t)),
            MediaCall::SetRate(r) => fields.insert("playbackRate", json!(r)),
        };
        Ok(())
    }

    async fn container_text(
        &self,
        node: &NodeId,
        probe: TextProbe,
    ) -> Result<Option<String>, PageError> {
        self.with_node(node, |n| match probe {
            TextProbe::NearestHeading => n.heading.clone(),
            TextProbe::Selector(selector) => n.selector_texts.get(&selector).cloned(),
            TextProbe::TimeDisplay => n.time_display.clone(),
        })
    }

    async fn click_control(&self, node: &NodeId, selector: &str) -> Result<bool, PageError> {
        let matched = self.with_node(node, |n| n.control_selectors.contains(selector))?;
        if !matched {
            return Ok(false);
        }
        self.record(format!("{node}:click:{selector}"));
        self.with_node_mut(node, |n| {
            let paused = n.props.paused.unwrap_or(true);
            n.props.paused = Some(!paused);
        })?;
        Ok(true)
    }

    async fn page_title(&self) -> Result<String, PageError> {
        Ok(self.state.title.read().clone())
    }

    fn mutations(&self) -> broadcast::Receiver<PageMutation> {
        self.state.bus.subscribe()
    }
}

fn url_host(href: &str) -> Option<String> {
    let rest = href.split_once("://").map(|(_, rest)| rest)?;
    let host = rest.split(['/', '?', '#']).next()?;
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}
