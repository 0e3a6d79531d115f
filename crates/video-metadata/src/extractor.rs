//! Snapshot assembly and the title / duration fallback heuristics.

use std::sync::Arc;

use page_bridge::{HostPage, MediaProps, TextProbe};
use tracing::debug;
use vidlens_core_types::{AdapterKind, VideoMetadata};
use video_adapter::PrimaryBinding;

/// Selectors probed inside the player container when no heading is found.
/// Ordered from most to least specific.
pub const TITLE_SELECTORS: &[&str] = &[
    ".video-title",
    ".player-title",
    "[data-title]",
    "figcaption",
];

/// Source substrings that identify adaptive-streaming manifests.
const STREAMING_MARKERS: &[&str] = &[".m3u8", ".mpd", "manifest"];

/// Reads a full metadata snapshot from whatever binding is current.
pub struct MetadataExtractor {
    page: Arc<dyn HostPage>,
}

impl MetadataExtractor {
    pub fn new(page: Arc<dyn HostPage>) -> Self {
        Self { page }
    }

    /// Assemble a snapshot for the binding. Never fails: unreadable fields
    /// stay absent and the title falls back to the document title.
    pub async fn extract(&self, binding: &PrimaryBinding) -> VideoMetadata {
        let adapter = &binding.adapter;
        let kind = binding.kind;
        let props = adapter.props().await;

        let title = self.title_for(binding).await;
        let duration = match props.duration.filter(|d| d.is_finite() && *d > 0.0) {
            Some(d) => Some(d),
            None => self.duration_from_time_display(binding).await,
        };

        VideoMetadata {
            src: props.src.clone().or_else(|| binding.candidate.src.clone()),
            title,
            duration,
            current_time: props.current_time,
            paused: props.paused,
            muted: props.muted,
            volume: props.volume,
            playback_rate: props.playback_rate,
            width: props.width.or(Some(binding.candidate.rect.width)),
            height: props.height.or(Some(binding.candidate.rect.height)),
            platform: binding.platform.as_str().to_string(),
            is_virtual: kind.is_virtual(),
            in_iframe: kind == AdapterKind::IframeVirtual,
            wrapped_player: kind == AdapterKind::WrappedPlayer,
            streaming: is_streaming(&props),
        }
    }

    /// Most-specific-first title chain: the player's own title, then a
    /// heading near the element, then known title selectors inside the
    /// container, then the document title.
    async fn title_for(&self, binding: &PrimaryBinding) -> String {
        if let Some(title) = binding.adapter.wrapped_title().await {
            let trimmed = title.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }

        if let Some(node) = binding.adapter.node() {
            if let Ok(Some(heading)) = self
                .page
                .container_text(node, TextProbe::NearestHeading)
                .await
            {
                let trimmed = heading.trim();
                if !trimmed.is_empty() {
                    return trimmed.to_string();
                }
            }
            for selector in TITLE_SELECTORS {
                if let Ok(Some(text)) = self
                    .page
                    .container_text(node, TextProbe::Selector(selector.to_string()))
                    .await
                {
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        debug!(
                            target: "video-metadata",
                            selector,
                            "title recovered from container selector"
                        );
                        return trimmed.to_string();
                    }
                }
            }
        }

        self.page.page_title().await.unwrap_or_default()
    }

    /// Recover a duration from the player's time display. Displays usually
    /// read "position / total"; the last clock in the text is the total.
    async fn duration_from_time_display(&self, binding: &PrimaryBinding) -> Option<f64> {
        let node = binding.adapter.node()?;
        let text = self
            .page
            .container_text(node, TextProbe::TimeDisplay)
            .await
            .ok()??;
        let duration = text
            .split(|c: char| !(c.is_ascii_digit() || c == ':'))
            .filter_map(parse_clock)
            .last();
        if duration.is_some() {
            debug!(target: "video-metadata", text, "duration recovered from time display");
        }
        duration
    }
}

/// Parse a clock string (`MM:SS` or `HH:MM:SS`) into seconds.
pub fn parse_clock(text: &str) -> Option<f64> {
    let parts: Vec<&str> = text.split(':').collect();
    if !(2..=3).contains(&parts.len()) {
        return None;
    }
    let mut seconds = 0.0;
    for part in &parts {
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        seconds = seconds * 60.0 + part.parse::<f64>().ok()?;
    }
    Some(seconds)
}

fn is_streaming(props: &MediaProps) -> bool {
    let matches_marker = |src: &String| {
        let lower = src.to_ascii_lowercase();
        STREAMING_MARKERS.iter().any(|m| lower.contains(m))
    };
    props.src.iter().any(matches_marker) || props.sources.iter().any(matches_marker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use page_bridge::{MediaNodeSpec, PlayerSpec, ScriptedPage};
    use vidlens_core_types::Platform;
    use video_adapter::AdapterResolver;

    async fn bind(page: &ScriptedPage, platform: Platform) -> PrimaryBinding {
        let host: Arc<dyn HostPage> = Arc::new(page.clone());
        let candidate = video_scanner::Scanner::new(Arc::clone(&host))
            .scan()
            .await
            .unwrap()
            .unwrap();
        let adapter = AdapterResolver::new(Arc::clone(&host))
            .resolve(&candidate, platform)
            .await
            .unwrap();
        PrimaryBinding::new(candidate, adapter, platform)
    }

    fn extractor(page: &ScriptedPage) -> MetadataExtractor {
        MetadataExtractor::new(Arc::new(page.clone()))
    }

    #[tokio::test]
    async fn native_snapshot_carries_full_playback_state() {
        let page = ScriptedPage::new("https://watch.example/v/1");
        page.install_media_node(
            MediaNodeSpec::new()
                .at_position(12.5)
                .heading("Launch highlights"),
        );
        let binding = bind(&page, Platform::Native).await;

        let meta = extractor(&page).extract(&binding).await;
        assert_eq!(meta.title, "Launch highlights");
        assert_eq!(meta.current_time, Some(12.5));
        assert_eq!(meta.duration, Some(120.0));
        assert_eq!(meta.platform, "native");
        assert!(!meta.is_virtual);
        assert!(!meta.streaming);
    }

    #[tokio::test]
    async fn title_falls_back_through_selectors_to_page_title() {
        let page = ScriptedPage::new("https://watch.example");
        page.set_page_title("Fallback page title");
        page.install_media_node(
            MediaNodeSpec::new().selector_text(".player-title", "  Selector title  "),
        );
        let binding = bind(&page, Platform::Native).await;
        let meta = extractor(&page).extract(&binding).await;
        assert_eq!(meta.title, "Selector title");

        let bare = ScriptedPage::new("https://watch.example");
        bare.set_page_title("Fallback page title");
        bare.install_media_node(MediaNodeSpec::new());
        let binding = bind(&bare, Platform::Native).await;
        let meta = extractor(&bare).extract(&binding).await;
        assert_eq!(meta.title, "Fallback page title");
    }

    #[tokio::test]
    async fn missing_duration_is_recovered_from_time_display() {
        let page = ScriptedPage::new("https://watch.example");
        page.install_media_node(
            MediaNodeSpec::new()
                .duration(None)
                .time_display("0:42 / 1:30:05"),
        );
        let binding = bind(&page, Platform::Native).await;

        let meta = extractor(&page).extract(&binding).await;
        assert_eq!(meta.duration, Some(5405.0));

        // Live streams report an infinite duration; the same fallback
        // applies.
        let live = ScriptedPage::new("https://watch.example");
        live.install_media_node(
            MediaNodeSpec::new()
                .duration(Some(f64::INFINITY))
                .time_display("12:34 / 56:07"),
        );
        let binding = bind(&live, Platform::Native).await;

        let meta = extractor(&live).extract(&binding).await;
        assert_eq!(meta.duration, Some(3367.0));
    }

    #[tokio::test]
    async fn wrapped_snapshot_reads_through_the_player() {
        let page = ScriptedPage::new("https://players.brightcove.net/1/index.html");
        let node = page.install_media_node(MediaNodeSpec::new().unreadable());
        let player = page.install_player(
            PlayerSpec::new()
                .title("Wrapped feature")
                .src("https://cdn.example/stream/master.m3u8"),
        );
        page.attach_player_property(&node, "player", &player);
        let binding = bind(&page, Platform::WrappedPlayer).await;

        let meta = extractor(&page)
            .extract(&binding).await;
        assert_eq!(meta.title, "Wrapped feature");
        assert!(meta.wrapped_player);
        assert!(meta.streaming);
        assert_eq!(meta.duration, Some(300.0));
    }

    #[tokio::test]
    async fn iframe_snapshot_is_descriptive_only() {
        let page = ScriptedPage::new("https://watch.example");
        page.set_page_title("Host page");
        page.install_frame(
            "https://cdn.example/embed/player?id=9",
            Some("Embedded clip"),
            vidlens_core_types::NodeRect::new(0.0, 0.0, 640.0, 360.0),
        );
        let binding = bind(&page, Platform::Native).await;

        let meta = extractor(&page).extract(&binding).await;
        assert_eq!(meta.title, "Embedded clip");
        assert!(meta.is_virtual);
        assert!(meta.in_iframe);
        assert!(meta.paused.is_none());
        assert_eq!(
            meta.src.as_deref(),
            Some("https://cdn.example/embed/player?id=9")
        );
    }

    #[test]
    fn clock_parsing() {
        assert_eq!(parse_clock("2:05"), Some(125.0));
        assert_eq!(parse_clock("1:00:00"), Some(3600.0));
        assert_eq!(parse_clock("125"), None);
        assert_eq!(parse_clock("1:2:3:4"), None);
        assert_eq!(parse_clock("ab:cd"), None);
    }
}
