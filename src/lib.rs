//! Video surface discovery and control core.
//!
//! `VidLens` wires the pipeline together over any [`HostPage`] backend: the
//! binding center owns the single primary binding, a change observer keeps it
//! honest against page mutations, and the control dispatcher executes verbs
//! against whatever is bound. The messaging bridge exposes the three verbs
//! external consumers speak.

pub mod bridge;
pub mod config;

pub use bridge::MessageBridge;
pub use config::Settings;

use std::sync::Arc;

use binding_center::{BindingCenter, BindingCenterConfig, BindingEvent, ChangeObserver};
use page_bridge::HostPage;
use tokio::sync::broadcast;
use vidlens_core_types::{BindingPhase, ControlCommand, ControlResult, CoreError, VideoMetadata};
use video_control::ControlDispatcher;
use video_metadata::MetadataExtractor;

/// One attached pipeline instance.
pub struct VidLens {
    center: Arc<BindingCenter>,
    dispatcher: ControlDispatcher,
    extractor: MetadataExtractor,
    observer: Option<ChangeObserver>,
}

impl VidLens {
    /// Attach to a page and start observing it. Resolution is lazy; nothing
    /// is scanned until the first query or page change.
    pub fn attach(page: Arc<dyn HostPage>, config: BindingCenterConfig) -> Self {
        let center = BindingCenter::new(Arc::clone(&page), config);
        let observer = ChangeObserver::spawn(Arc::clone(&center));
        let source: Arc<dyn video_adapter::BindingSource> =
            Arc::new(binding_center::BindingCenterSource(Arc::clone(&center)));
        Self {
            dispatcher: ControlDispatcher::new(Arc::clone(&page), source),
            extractor: MetadataExtractor::new(page),
            center,
            observer: Some(observer),
        }
    }

    pub fn phase(&self) -> BindingPhase {
        self.center.phase()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BindingEvent> {
        self.center.subscribe()
    }

    /// Fresh metadata for the current binding. While a re-resolution is in
    /// flight the answer is `NoVideoFound`, never stale data; an unset slot
    /// triggers resolution on demand.
    pub async fn current_video(&self) -> Result<VideoMetadata, CoreError> {
        match self.center.phase() {
            BindingPhase::Active | BindingPhase::Unset => {
                let binding = self.center.ensure_binding().await?;
                Ok(self.extractor.extract(&binding).await)
            }
            BindingPhase::Resolving | BindingPhase::Stale => Err(CoreError::NoVideoFound),
        }
    }

    /// Execute one control command end to end.
    pub async fn control(&self, command: ControlCommand) -> ControlResult {
        self.dispatcher.dispatch(command).await
    }

    /// Stop the change observer. Pending resolution work finishes on its own.
    pub async fn shutdown(mut self) {
        if let Some(observer) = self.observer.take() {
            observer.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use page_bridge::{MediaNodeSpec, ScriptedPage};
    use vidlens_core_types::retry::RetryPolicy;

    fn lens(page: &ScriptedPage) -> VidLens {
        let config = BindingCenterConfig {
            retry: RetryPolicy::immediate(3),
            ..BindingCenterConfig::default()
        };
        VidLens::attach(Arc::new(page.clone()), config)
    }

    #[tokio::test]
    async fn query_resolves_on_demand() {
        let page = ScriptedPage::new("https://watch.example");
        page.install_media_node(MediaNodeSpec::new().heading("Feature"));
        let lens = lens(&page);

        let meta = lens.current_video().await.unwrap();
        assert_eq!(meta.title, "Feature");
        assert_eq!(lens.phase(), BindingPhase::Active);
        lens.shutdown().await;
    }

    #[tokio::test]
    async fn empty_page_reports_not_found() {
        let page = ScriptedPage::new("https://watch.example");
        let lens = lens(&page);
        assert!(matches!(
            lens.current_video().await,
            Err(CoreError::NoVideoFound)
        ));
        lens.shutdown().await;
    }
}
