//! The uniform playback surface behind a binding.
//!
//! An [`Adapter`] hides which discovery strategy won: callers issue the same
//! four playback operations and the same property read regardless of whether
//! the surface is a direct element, a wrapped-player object, or a virtual
//! placeholder that can only describe itself.

use std::sync::Arc;
use std::time::Duration;

use page_bridge::{HostPage, MediaCall, MediaProps, PageError, PlayerField};
use serde_json::Value;
use tracing::warn;
use vidlens_core_types::{AdapterKind, NodeId, PlayerRef};

use crate::errors::CallError;

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(3);

enum Surface {
    /// Direct element control.
    Native {
        page: Arc<dyn HostPage>,
        node: NodeId,
    },
    /// Calls routed through a discovered wrapped-player object. The element
    /// node is kept when known so UI fallbacks and text probes stay scoped.
    Wrapped {
        page: Arc<dyn HostPage>,
        player: PlayerRef,
        node: Option<NodeId>,
        via: &'static str,
    },
    /// A player-like frame whose interior is unreachable. Describes itself,
    /// accepts no playback calls.
    Iframe {
        src: String,
        title: Option<String>,
    },
    /// An element that refused every direct and wrapped path. Still worth
    /// binding so callers get a truthful "found but uncontrollable" answer
    /// instead of a spurious not-found.
    Unknown { src: Option<String> },
}

pub struct Adapter {
    inner: Surface,
    timeout: Duration,
}

impl Adapter {
    pub fn native(page: Arc<dyn HostPage>, node: NodeId) -> Self {
        Self {
            inner: Surface::Native { page, node },
            timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn wrapped(
        page: Arc<dyn HostPage>,
        player: PlayerRef,
        node: Option<NodeId>,
        via: &'static str,
    ) -> Self {
        Self {
            inner: Surface::Wrapped {
                page,
                player,
                node,
                via,
            },
            timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn iframe(src: String, title: Option<String>) -> Self {
        Self {
            inner: Surface::Iframe { src, title },
            timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn unknown(src: Option<String>) -> Self {
        Self {
            inner: Surface::Unknown { src },
            timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn kind(&self) -> AdapterKind {
        match &self.inner {
            Surface::Native { .. } => AdapterKind::Native,
            Surface::Wrapped { .. } => AdapterKind::WrappedPlayer,
            Surface::Iframe { .. } => AdapterKind::IframeVirtual,
            Surface::Unknown { .. } => AdapterKind::UnknownVirtual,
        }
    }

    /// The element node this adapter is anchored to, when one exists.
    pub fn node(&self) -> Option<&NodeId> {
        match &self.inner {
            Surface::Native { node, .. } => Some(node),
            Surface::Wrapped { node, .. } => node.as_ref(),
            Surface::Iframe { .. } | Surface::Unknown { .. } => None,
        }
    }

    /// Which discovery path produced a wrapped-player surface.
    pub fn wrapped_via(&self) -> Option<&'static str> {
        match &self.inner {
            Surface::Wrapped { via, .. } => Some(via),
            _ => None,
        }
    }

    /// Best-effort property snapshot. Individual read failures degrade to
    /// absent fields rather than failing the whole read; virtual surfaces
    /// report only what they were constructed with.
    pub async fn props(&self) -> MediaProps {
        match &self.inner {
            Surface::Native { page, node } => {
                match tokio::time::timeout(self.timeout, page.read_media(node)).await {
                    Ok(Ok(props)) => props,
                    Ok(Err(err)) => {
                        warn!(target: "video-adapter", node = %node, error = %err, "media read failed");
                        MediaProps::default()
                    }
                    Err(_) => {
                        warn!(target: "video-adapter", node = %node, "media read timed out");
                        MediaProps::default()
                    }
                }
            }
            Surface::Wrapped { page, player, .. } => {
                let mut props = MediaProps::default();
                props.current_time = self.player_f64(page, player, PlayerField::CurrentTime).await;
                props.duration = self.player_f64(page, player, PlayerField::Duration).await;
                props.paused = self.player_bool(page, player, PlayerField::Paused).await;
                props.muted = self.player_bool(page, player, PlayerField::Muted).await;
                props.volume = self.player_f64(page, player, PlayerField::Volume).await;
                props.playback_rate = self.player_f64(page, player, PlayerField::PlaybackRate).await;
                props.src = self.player_string(page, player, PlayerField::Source).await;
                if let Some(src) = &props.src {
                    props.sources = vec![src.clone()];
                }
                props
            }
            Surface::Iframe { src, .. } => MediaProps {
                src: Some(src.clone()),
                ..MediaProps::default()
            },
            Surface::Unknown { src } => MediaProps {
                src: src.clone(),
                ..MediaProps::default()
            },
        }
    }

    /// Title as the wrapped player reports it, when the surface has one.
    pub async fn wrapped_title(&self) -> Option<String> {
        match &self.inner {
            Surface::Wrapped { page, player, .. } => {
                self.player_string(page, player, PlayerField::Title).await
            }
            Surface::Iframe { title, .. } => title.clone(),
            _ => None,
        }
    }

    pub async fn play(&self) -> Result<(), CallError> {
        self.invoke(MediaCall::Play).await
    }

    pub async fn pause(&self) -> Result<(), CallError> {
        self.invoke(MediaCall::Pause).await
    }

    pub async fn seek(&self, position: f64) -> Result<(), CallError> {
        self.invoke(MediaCall::SetCurrentTime(position)).await
    }

    pub async fn set_rate(&self, rate: f64) -> Result<(), CallError> {
        self.invoke(MediaCall::SetRate(rate)).await
    }

    async fn invoke(&self, call: MediaCall) -> Result<(), CallError> {
        match &self.inner {
            Surface::Native { page, node } => {
                let fut = page.invoke_media(node, call);
                match tokio::time::timeout(self.timeout, fut).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(err)) => Err(call_failure(call, err)),
                    Err(_) => Err(CallError::Failed(format!(
                        "{} timed out after {:?}",
                        call.method(),
                        self.timeout
                    ))),
                }
            }
            Surface::Wrapped { page, player, .. } => {
                let fut = page.invoke_player(player, call);
                match tokio::time::timeout(self.timeout, fut).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(err)) => Err(call_failure(call, err)),
                    Err(_) => Err(CallError::Failed(format!(
                        "{} timed out after {:?}",
                        call.method(),
                        self.timeout
                    ))),
                }
            }
            Surface::Iframe { .. } => Err(CallError::Unsupported(
                "player lives in an inaccessible frame".to_string(),
            )),
            Surface::Unknown { .. } => Err(CallError::Unsupported(
                "element rejected every control path".to_string(),
            )),
        }
    }

    async fn player_value(
        &self,
        page: &Arc<dyn HostPage>,
        player: &PlayerRef,
        field: PlayerField,
    ) -> Option<Value> {
        match tokio::time::timeout(self.timeout, page.read_player(player, field)).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(err)) => {
                warn!(
                    target: "video-adapter",
                    player = %player,
                    field = field.accessor(),
                    error = %err,
                    "player read failed"
                );
                None
            }
            Err(_) => None,
        }
    }

    async fn player_f64(
        &self,
        page: &Arc<dyn HostPage>,
        player: &PlayerRef,
        field: PlayerField,
    ) -> Option<f64> {
        self.player_value(page, player, field).await?.as_f64()
    }

    async fn player_bool(
        &self,
        page: &Arc<dyn HostPage>,
        player: &PlayerRef,
        field: PlayerField,
    ) -> Option<bool> {
        self.player_value(page, player, field).await?.as_bool()
    }

    async fn player_string(
        &self,
        page: &Arc<dyn HostPage>,
        player: &PlayerRef,
        field: PlayerField,
    ) -> Option<String> {
        let value = self.player_value(page, player, field).await?;
        value.as_str().map(|s| s.to_string())
    }
}

impl std::fmt::Debug for Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            Surface::Native { node, .. } => f.debug_struct("Adapter::Native").field("node", node).finish(),
            Surface::Wrapped { player, via, .. } => f
                .debug_struct("Adapter::Wrapped")
                .field("player", player)
                .field("via", via)
                .finish(),
            Surface::Iframe { src, .. } => f.debug_struct("Adapter::Iframe").field("src", src).finish(),
            Surface::Unknown { src } => f.debug_struct("Adapter::Unknown").field("src", src).finish(),
        }
    }
}

fn call_failure(call: MediaCall, err: PageError) -> CallError {
    CallError::Failed(format!("{} failed: {}", call.method(), err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use page_bridge::{MediaNodeSpec, PlayerSpec, ScriptedPage};

    #[tokio::test]
    async fn native_adapter_controls_the_element() {
        let page = ScriptedPage::new("https://watch.example");
        let node = page.install_media_node(MediaNodeSpec::new());
        let page: Arc<dyn HostPage> = Arc::new(page.clone());

        let adapter = Adapter::native(page.clone(), node.clone());
        assert_eq!(adapter.kind(), AdapterKind::Native);
        adapter.play().await.unwrap();

        let props = adapter.props().await;
        assert_eq!(props.paused, Some(false));
    }

    #[tokio::test]
    async fn wrapped_adapter_reads_through_the_player_object() {
        let page = ScriptedPage::new("https://watch.example");
        let player = page.install_player(PlayerSpec::new().duration(Some(420.0)));
        let host: Arc<dyn HostPage> = Arc::new(page.clone());

        let adapter = Adapter::wrapped(host, player.clone(), None, "global-registry");
        assert_eq!(adapter.kind(), AdapterKind::WrappedPlayer);
        let props = adapter.props().await;
        assert_eq!(props.duration, Some(420.0));

        adapter.seek(15.0).await.unwrap();
        assert_eq!(page.player_call_count(&player, "setCurrentTime"), 1);
    }

    #[tokio::test]
    async fn virtual_adapters_reject_playback_calls() {
        let iframe = Adapter::iframe("https://cdn.example/embed/1".to_string(), None);
        assert!(matches!(
            iframe.play().await,
            Err(CallError::Unsupported(_))
        ));

        let unknown = Adapter::unknown(None);
        assert!(matches!(
            unknown.pause().await,
            Err(CallError::Unsupported(_))
        ));
        let props = unknown.props().await;
        assert!(props.src.is_none());
    }

    #[tokio::test]
    async fn page_exception_surfaces_as_failed_call() {
        let page = ScriptedPage::new("https://watch.example");
        let node = page.install_media_node(MediaNodeSpec::new().throws_on("play"));
        let host: Arc<dyn HostPage> = Arc::new(page.clone());

        let adapter = Adapter::native(host, node);
        assert!(matches!(adapter.play().await, Err(CallError::Failed(_))));
    }
}
