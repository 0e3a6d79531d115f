//! Change observer: page mutations drive the slot, not polling.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::center::BindingCenter;

/// Watches the page's mutation stream and marks the binding stale when a
/// qualifying change lands. Owns its task; dropping the observer stops it.
pub struct ChangeObserver {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ChangeObserver {
    pub fn spawn(center: Arc<BindingCenter>) -> Self {
        let cancel = CancellationToken::new();
        let child = cancel.clone();
        // Subscribe before the task is scheduled so mutations emitted in the
        // gap are buffered, not lost.
        let mut rx = center.page().mutations();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    mutation = rx.recv() => match mutation {
                        Ok(mutation) => {
                            if center.mutation_qualifies(&mutation) {
                                debug!(target: "binding-center", ?mutation, "qualifying page change");
                                center.mark_stale();
                                center.request_rescan();
                            }
                        }
                        // Missed mutations may include a qualifying one;
                        // resync rather than guess.
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(target: "binding-center", skipped, "mutation stream lagged, resyncing");
                            center.mark_stale();
                            center.request_rescan();
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        });
        Self {
            cancel,
            handle: Some(handle),
        }
    }

    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for ChangeObserver {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::center::BindingCenterConfig;
    use crate::events::BindingEvent;
    use page_bridge::{MediaNodeSpec, ScriptedPage};
    use vidlens_core_types::retry::RetryPolicy;
    use vidlens_core_types::BindingPhase;

    fn center(page: &ScriptedPage) -> Arc<BindingCenter> {
        let config = BindingCenterConfig {
            retry: RetryPolicy::immediate(3),
            ..BindingCenterConfig::default()
        };
        BindingCenter::new(Arc::new(page.clone()), config)
    }

    async fn wait_for_bound(rx: &mut tokio::sync::broadcast::Receiver<BindingEvent>) {
        loop {
            match rx.recv().await {
                Ok(BindingEvent::Bound { .. }) => break,
                Ok(_) => continue,
                Err(_) => break,
            }
        }
    }

    #[tokio::test]
    async fn source_swap_rebinds_automatically() {
        let page = ScriptedPage::new("https://watch.example");
        let node = page.install_media_node(MediaNodeSpec::new());
        let center = center(&page);
        let first = center.ensure_binding().await.unwrap();

        let observer = ChangeObserver::spawn(Arc::clone(&center));
        let mut rx = center.subscribe();
        page.set_media_attribute(&node, "src", "https://media.example/next.mp4");

        wait_for_bound(&mut rx).await;
        let second = center.ensure_binding().await.unwrap();
        assert_ne!(second.id, first.id);
        observer.shutdown().await;
    }

    #[tokio::test]
    async fn removal_of_the_bound_node_rebinds_to_the_survivor() {
        let page = ScriptedPage::new("https://watch.example");
        let bound = page.install_media_node(MediaNodeSpec::new().rect(0.0, 0.0, 800.0, 450.0));
        page.install_media_node(MediaNodeSpec::new().rect(0.0, 500.0, 320.0, 180.0));
        let center = center(&page);
        let first = center.ensure_binding().await.unwrap();
        assert_eq!(first.candidate.node, bound);

        let observer = ChangeObserver::spawn(Arc::clone(&center));
        let mut rx = center.subscribe();
        page.remove_node(&bound);

        wait_for_bound(&mut rx).await;
        let second = center.ensure_binding().await.unwrap();
        assert_ne!(second.candidate.node, bound);
        observer.shutdown().await;
    }

    #[tokio::test]
    async fn cosmetic_mutations_leave_the_binding_alone() {
        let page = ScriptedPage::new("https://watch.example");
        let node = page.install_media_node(MediaNodeSpec::new());
        let center = center(&page);
        let first = center.ensure_binding().await.unwrap();

        let observer = ChangeObserver::spawn(Arc::clone(&center));
        page.set_media_attribute(&node, "class", "highlighted");
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(center.phase(), BindingPhase::Active);
        let still = center.ensure_binding().await.unwrap();
        assert_eq!(still.id, first.id);
        observer.shutdown().await;
    }
}
