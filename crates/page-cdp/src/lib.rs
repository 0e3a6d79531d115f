//! Chromium-backed [`HostPage`] implementation.
//!
//! All page access goes through `Runtime.evaluate` with snippets from
//! [`js`]; elements are identified by a `data-vidlens-id` attribute the
//! runtime stamps on first sight, and wrapped-player objects are stashed in
//! an in-page table keyed by opaque handles. Structural changes are observed
//! by an in-page `MutationObserver` and drained into the mutation bus by a
//! polling task.

pub mod browser;
pub mod js;

pub use browser::CdpBrowser;

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::Page;
use page_bridge::{
    mutation_bus, FrameSnapshot, HostPage, MediaCall, MediaNodeSnapshot, MediaProps, PageError,
    PageLocation, PageMutation, PlayerField, PlayerProbe, TextProbe, Viewport,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use vidlens_core_types::{NodeId, NodeRect, PlayerRef};

const MUTATION_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Deserialize)]
struct Outcome<T> {
    ok: Option<T>,
    err: Option<String>,
}

#[derive(Deserialize)]
struct RectWire {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

impl From<RectWire> for NodeRect {
    fn from(r: RectWire) -> Self {
        NodeRect::new(r.x, r.y, r.width, r.height)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaNodeWire {
    id: String,
    rect: RectWire,
    paused: bool,
    current_time: f64,
    dom_index: usize,
    element_id: Option<String>,
    src: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FrameWire {
    id: String,
    url: String,
    title: Option<String>,
    rect: RectWire,
    dom_index: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PropsWire {
    current_time: Option<f64>,
    duration: Option<f64>,
    paused: Option<bool>,
    muted: Option<bool>,
    volume: Option<f64>,
    playback_rate: Option<f64>,
    width: Option<f64>,
    height: Option<f64>,
    src: Option<String>,
    #[serde(default)]
    sources: Vec<String>,
}

#[derive(Deserialize)]
struct PlayerWire {
    player: Option<String>,
}

#[derive(Deserialize)]
struct ValueWire {
    value: Value,
}

#[derive(Deserialize)]
struct TextWire {
    text: Option<String>,
}

#[derive(Deserialize)]
struct LocationWire {
    href: String,
    host: Option<String>,
}

#[derive(Deserialize)]
struct ViewportWire {
    width: f64,
    height: f64,
}

#[derive(Deserialize)]
#[serde(tag = "kind")]
enum MutationWire {
    #[serde(rename = "attr")]
    Attr { node: String, attribute: String },
    #[serde(rename = "subtree", rename_all = "camelCase")]
    Subtree {
        playable_added: bool,
        removed: Vec<String>,
    },
}

async fn eval<T: DeserializeOwned>(page: &Page, script: String) -> Result<T, PageError> {
    // await_promise lets a snippet return a promise settling to the envelope;
    // the play() paths rely on this to surface async rejections.
    let params = EvaluateParams::builder()
        .expression(script)
        .return_by_value(true)
        .await_promise(true)
        .build()
        .map_err(PageError::Script)?;
    let outcome: Outcome<T> = page
        .evaluate_expression(params)
        .await
        .map_err(|err| PageError::Unreachable(err.to_string()))?
        .into_value()
        .map_err(|err| PageError::Script(format!("unexpected evaluate result: {err}")))?;
    match (outcome.ok, outcome.err) {
        (Some(value), _) => Ok(value),
        (None, Some(err)) => Err(PageError::Script(err)),
        (None, None) => Err(PageError::Script("empty evaluate result".to_string())),
    }
}

/// Translate the runtime's "node gone" sentinel into the typed error.
fn map_node_err(node: &NodeId, err: PageError) -> PageError {
    match err {
        PageError::Script(msg) if msg == "node gone" => PageError::NodeGone(node.clone()),
        other => other,
    }
}

fn call_arg(call: MediaCall) -> Option<f64> {
    match call {
        MediaCall::Play | MediaCall::Pause => None,
        MediaCall::SetCurrentTime(t) => Some(t),
        MediaCall::SetRate(r) => Some(r),
    }
}

/// One attached Chromium page.
pub struct CdpHostPage {
    page: Page,
    bus: broadcast::Sender<PageMutation>,
    cancel: CancellationToken,
    poller: JoinHandle<()>,
}

impl CdpHostPage {
    /// Stamp the runtime into the page and start the mutation poller.
    pub async fn attach(page: Page) -> Result<Self, PageError> {
        let _: bool = eval(&page, js::INSTALL_RUNTIME.to_string()).await?;
        let bus = mutation_bus(256);
        let cancel = CancellationToken::new();
        let poller = spawn_poller(page.clone(), bus.clone(), cancel.clone());
        Ok(Self {
            page,
            bus,
            cancel,
            poller,
        })
    }
}

impl Drop for CdpHostPage {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.poller.abort();
    }
}

fn spawn_poller(
    page: Page,
    bus: broadcast::Sender<PageMutation>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(MUTATION_POLL_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let drained: Result<Vec<MutationWire>, PageError> =
                        eval(&page, js::DRAIN_MUTATIONS.to_string()).await;
                    match drained {
                        Ok(records) => {
                            for record in records {
                                let mutation = match record {
                                    MutationWire::Attr { node, attribute } => {
                                        PageMutation::NodeAttribute {
                                            node: NodeId(node),
                                            attribute,
                                        }
                                    }
                                    MutationWire::Subtree {
                                        playable_added,
                                        removed,
                                    } => PageMutation::SubtreeChanged {
                                        playable_added,
                                        removed: removed.into_iter().map(NodeId).collect(),
                                    },
                                };
                                let _ = bus.send(mutation);
                            }
                        }
                        Err(err) => {
                            debug!(target: "page-cdp", error = %err, "mutation drain failed");
                        }
                    }
                }
            }
        }
    })
}

#[async_trait]
impl HostPage for CdpHostPage {
    async fn location(&self) -> Result<PageLocation, PageError> {
        let wire: LocationWire = eval(&self.page, js::LOCATION.to_string()).await?;
        Ok(PageLocation {
            href: wire.href,
            host: wire.host,
        })
    }

    async fn viewport(&self) -> Result<Viewport, PageError> {
        let wire: ViewportWire = eval(&self.page, js::VIEWPORT.to_string()).await?;
        Ok(Viewport {
            width: wire.width,
            height: wire.height,
        })
    }

    async fn media_nodes(&self) -> Result<Vec<MediaNodeSnapshot>, PageError> {
        let wires: Vec<MediaNodeWire> = eval(&self.page, js::SCAN_MEDIA.to_string()).await?;
        Ok(wires
            .into_iter()
            .map(|w| MediaNodeSnapshot {
                node: NodeId(w.id),
                rect: w.rect.into(),
                paused: w.paused,
                current_time: w.current_time,
                dom_index: w.dom_index,
                element_id: w.element_id,
                src: w.src,
            })
            .collect())
    }

    async fn frame_nodes(&self) -> Result<Vec<FrameSnapshot>, PageError> {
        let wires: Vec<FrameWire> = eval(&self.page, js::SCAN_FRAMES.to_string()).await?;
        Ok(wires
            .into_iter()
            .map(|w| FrameSnapshot {
                node: NodeId(w.id),
                url: w.url,
                title: w.title,
                rect: w.rect.into(),
                dom_index: w.dom_index,
            })
            .collect())
    }

    async fn read_media(&self, node: &NodeId) -> Result<MediaProps, PageError> {
        let wire: PropsWire = eval(&self.page, js::read_media(&node.0))
            .await
            .map_err(|err| map_node_err(node, err))?;
        Ok(MediaProps {
            current_time: wire.current_time,
            duration: wire.duration,
            paused: wire.paused,
            muted: wire.muted,
            volume: wire.volume,
            playback_rate: wire.playback_rate,
            width: wire.width,
            height: wire.height,
            src: wire.src,
            sources: wire.sources,
        })
    }

    async fn invoke_media(&self, node: &NodeId, call: MediaCall) -> Result<(), PageError> {
        let script = js::invoke_media(&node.0, call.method(), call_arg(call));
        let _: bool = eval(&self.page, script)
            .await
            .map_err(|err| map_node_err(node, err))?;
        Ok(())
    }

    async fn probe_player(&self, probe: &PlayerProbe) -> Result<Option<PlayerRef>, PageError> {
        let script = match probe {
            PlayerProbe::GlobalRegistry => js::probe_global_registry(),
            PlayerProbe::ElementProperty { node, property } => {
                js::probe_element_property(&node.0, property)
            }
            PlayerProbe::RegistryById { element_id } => js::probe_registry_by_id(element_id),
        };
        let wire: PlayerWire = eval(&self.page, script).await?;
        Ok(wire.player.map(PlayerRef))
    }

    async fn read_player(
        &self,
        player: &PlayerRef,
        field: PlayerField,
    ) -> Result<Value, PageError> {
        let wire: ValueWire = eval(&self.page, js::read_player(&player.0, field.accessor())).await?;
        Ok(wire.value)
    }

    async fn invoke_player(&self, player: &PlayerRef, call: MediaCall) -> Result<(), PageError> {
        let script = js::invoke_player(&player.0, call.method(), call_arg(call));
        let _: bool = eval(&self.page, script).await?;
        Ok(())
    }

    async fn container_text(
        &self,
        node: &NodeId,
        probe: TextProbe,
    ) -> Result<Option<String>, PageError> {
        let script = match probe {
            TextProbe::NearestHeading => js::container_heading(&node.0),
            TextProbe::Selector(selector) => js::container_selector_text(&node.0, &selector),
            TextProbe::TimeDisplay => js::container_time_display(&node.0),
        };
        let wire: TextWire = eval(&self.page, script)
            .await
            .map_err(|err| map_node_err(node, err))?;
        Ok(wire.text)
    }

    async fn click_control(&self, node: &NodeId, selector: &str) -> Result<bool, PageError> {
        let clicked: bool = eval(&self.page, js::click_control(&node.0, selector))
            .await
            .map_err(|err| map_node_err(node, err))?;
        if clicked {
            warn!(target: "page-cdp", node = %node, selector, "simulated control click");
        }
        Ok(clicked)
    }

    async fn page_title(&self) -> Result<String, PageError> {
        eval(&self.page, js::PAGE_TITLE.to_string()).await
    }

    fn mutations(&self) -> broadcast::Receiver<PageMutation> {
        self.bus.subscribe()
    }
}
