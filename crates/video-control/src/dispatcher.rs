//! The dispatch pipeline: validate, invoke, fall back, report.

use std::sync::Arc;

use page_bridge::HostPage;
use tracing::{info, warn};
use vidlens_core_types::{ControlCommand, ControlResult, ControlVerb, CoreError, VideoMetadata};
use video_adapter::{BindingSource, CallError, PrimaryBinding};
use video_metadata::MetadataExtractor;

/// Conventional play-control selectors, probed in order when a direct play
/// call is refused.
pub const PLAY_CONTROL_SELECTORS: &[&str] = &[
    ".vjs-big-play-button",
    ".vjs-play-control",
    "button[aria-label='Play']",
    "[data-play-button]",
    ".play-button",
];

/// Conventional pause-control selectors. Toggle buttons appear in both lists
/// on purpose.
pub const PAUSE_CONTROL_SELECTORS: &[&str] = &[
    ".vjs-play-control",
    "button[aria-label='Pause']",
    "[data-pause-button]",
    ".pause-button",
];

/// Routes validated commands to the current binding's adapter.
pub struct ControlDispatcher {
    source: Arc<dyn BindingSource>,
    extractor: MetadataExtractor,
    page: Arc<dyn HostPage>,
}

impl ControlDispatcher {
    pub fn new(page: Arc<dyn HostPage>, source: Arc<dyn BindingSource>) -> Self {
        Self {
            source,
            extractor: MetadataExtractor::new(Arc::clone(&page)),
            page,
        }
    }

    /// Execute one command end to end. Never returns an Err: every outcome,
    /// including rejection, is a [`ControlResult`].
    pub async fn dispatch(&self, command: ControlCommand) -> ControlResult {
        if let Err(err) = command.validate() {
            warn!(target: "video-control", verb = command.verb.as_str(), error = %err, "command rejected before dispatch");
            return ControlResult::failed(self.completion_snapshot().await, &err);
        }

        let binding = match self.source.acquire().await {
            Ok(binding) => binding,
            Err(err) => {
                return ControlResult::failed(None, &err);
            }
        };

        match self.invoke(&binding, &command).await {
            Ok(()) => {
                info!(
                    target: "video-control",
                    verb = command.verb.as_str(),
                    binding = %binding.id,
                    "command applied"
                );
                match self.completion_snapshot().await {
                    Some(metadata) => ControlResult::succeeded(metadata),
                    // The attempt itself can invalidate the binding; the
                    // command still took effect.
                    None => ControlResult::degraded(None, "binding replaced during command"),
                }
            }
            Err(call_err) => self.fall_back(&binding, &command, call_err).await,
        }
    }

    async fn invoke(
        &self,
        binding: &PrimaryBinding,
        command: &ControlCommand,
    ) -> Result<(), CallError> {
        let adapter = &binding.adapter;
        match command.verb {
            ControlVerb::Play => adapter.play().await,
            ControlVerb::Pause => adapter.pause().await,
            // Payload presence was checked by validate().
            ControlVerb::Seek => adapter.seek(command.time.unwrap_or(0.0)).await,
            ControlVerb::SetRate => adapter.set_rate(command.rate.unwrap_or(1.0)).await,
        }
    }

    /// Direct call refused. Play and pause get one more chance through the
    /// player's own UI; seek and rate have no safe click equivalent.
    async fn fall_back(
        &self,
        binding: &PrimaryBinding,
        command: &ControlCommand,
        call_err: CallError,
    ) -> ControlResult {
        let selectors: &[&str] = match command.verb {
            ControlVerb::Play => PLAY_CONTROL_SELECTORS,
            ControlVerb::Pause => PAUSE_CONTROL_SELECTORS,
            ControlVerb::Seek | ControlVerb::SetRate => &[],
        };

        if let Some(node) = binding.adapter.node() {
            for selector in selectors {
                match self.page.click_control(node, selector).await {
                    Ok(true) => {
                        warn!(
                            target: "video-control",
                            verb = command.verb.as_str(),
                            selector,
                            "direct call refused, applied via control click"
                        );
                        return ControlResult::degraded(
                            self.completion_snapshot().await,
                            format!(
                                "{} applied via simulated click on {selector}",
                                command.verb.as_str()
                            ),
                        );
                    }
                    Ok(false) => continue,
                    Err(err) => {
                        warn!(
                            target: "video-control",
                            selector,
                            error = %err,
                            "control click probe faulted, continuing"
                        );
                        continue;
                    }
                }
            }
        }

        let rejected = CoreError::ControlRejected(format!(
            "{}: {call_err}",
            command.verb.as_str()
        ));
        ControlResult::failed(self.completion_snapshot().await, &rejected)
    }

    /// Snapshot of whatever binding is current once the attempt finished.
    /// The attempt itself may have invalidated the binding; reporting against
    /// the completion-time binding keeps the result truthful.
    async fn completion_snapshot(&self) -> Option<VideoMetadata> {
        let binding = self.source.current()?;
        Some(self.extractor.extract(&binding).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use page_bridge::{MediaNodeSpec, ScriptedPage};
    use parking_lot::RwLock;
    use vidlens_core_types::Platform;
    use video_adapter::AdapterResolver;

    struct FixedSource {
        binding: RwLock<Option<Arc<PrimaryBinding>>>,
    }

    impl FixedSource {
        fn empty() -> Arc<Self> {
            Arc::new(Self {
                binding: RwLock::new(None),
            })
        }

        fn with(binding: PrimaryBinding) -> Arc<Self> {
            Arc::new(Self {
                binding: RwLock::new(Some(Arc::new(binding))),
            })
        }
    }

    #[async_trait::async_trait]
    impl BindingSource for FixedSource {
        fn current(&self) -> Option<Arc<PrimaryBinding>> {
            self.binding.read().clone()
        }
    }

    async fn bind(page: &ScriptedPage) -> PrimaryBinding {
        let host: Arc<dyn HostPage> = Arc::new(page.clone());
        let candidate = video_scanner::Scanner::new(Arc::clone(&host))
            .scan()
            .await
            .unwrap()
            .unwrap();
        let adapter = AdapterResolver::new(Arc::clone(&host))
            .resolve(&candidate, Platform::Native)
            .await
            .unwrap();
        PrimaryBinding::new(candidate, adapter, Platform::Native)
    }

    fn dispatcher(page: &ScriptedPage, source: Arc<FixedSource>) -> ControlDispatcher {
        ControlDispatcher::new(Arc::new(page.clone()), source)
    }

    #[tokio::test]
    async fn play_returns_fresh_metadata() {
        let page = ScriptedPage::new("https://watch.example");
        page.install_media_node(MediaNodeSpec::new().heading("Clip"));
        let source = FixedSource::with(bind(&page).await);

        let result = dispatcher(&page, source).dispatch(ControlCommand::play()).await;
        assert!(result.success);
        let meta = result.metadata.unwrap();
        assert_eq!(meta.paused, Some(false));
        assert_eq!(meta.title, "Clip");
    }

    #[tokio::test]
    async fn invalid_seek_never_touches_the_adapter() {
        let page = ScriptedPage::new("https://watch.example");
        let node = page.install_media_node(MediaNodeSpec::new());
        let source = FixedSource::with(bind(&page).await);

        let result = dispatcher(&page, source)
            .dispatch(ControlCommand::seek(-3.0))
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("invalid parameter"));
        assert_eq!(page.media_call_count(&node, "setCurrentTime"), 0);
    }

    #[tokio::test]
    async fn missing_binding_fails_with_not_found() {
        let page = ScriptedPage::new("https://watch.example");
        let result = dispatcher(&page, FixedSource::empty())
            .dispatch(ControlCommand::pause())
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("no qualifying video"));
        assert!(result.metadata.is_none());
    }

    #[tokio::test]
    async fn refused_play_falls_back_to_control_click() {
        let page = ScriptedPage::new("https://watch.example");
        let node = page.install_media_node(
            MediaNodeSpec::new()
                .throws_on("play")
                .control_selector(".vjs-big-play-button"),
        );
        let source = FixedSource::with(bind(&page).await);

        let result = dispatcher(&page, source).dispatch(ControlCommand::play()).await;
        assert!(result.success);
        assert!(result
            .warning
            .unwrap()
            .contains(".vjs-big-play-button"));
        assert_eq!(page.click_count(&node, ".vjs-big-play-button"), 1);
        assert_eq!(result.metadata.unwrap().paused, Some(false));
    }

    #[tokio::test]
    async fn refused_seek_has_no_click_fallback() {
        let page = ScriptedPage::new("https://watch.example");
        page.install_media_node(
            MediaNodeSpec::new()
                .throws_on("setCurrentTime")
                .control_selector(".vjs-big-play-button"),
        );
        let source = FixedSource::with(bind(&page).await);

        let result = dispatcher(&page, source)
            .dispatch(ControlCommand::seek(10.0))
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("control rejected"));
        // Metadata still reflects the surviving binding.
        assert!(result.metadata.is_some());
    }
}
