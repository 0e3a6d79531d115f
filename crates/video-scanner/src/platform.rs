//! Platform classification from the page location.
//!
//! Pure, side-effect free. The result only biases which adapter strategies
//! are tried first; it never gates them.

use page_bridge::PageLocation;
use serde::{Deserialize, Serialize};
use url::Url;
use vidlens_core_types::Platform;

/// Host substrings that indicate the dominant wrapped-player framework is
/// likely managing playback on this page. Tunable, not load-bearing: a miss
/// only changes probe order.
pub const DEFAULT_WRAPPED_HOST_HINTS: &[&str] = &[
    "videojs",
    "vjs.zencdn",
    "brightcove",
    "jwplatform",
    "jwpcdn",
    "kaltura",
];

/// Configurable classification hints.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlatformHints {
    pub wrapped_hosts: Vec<String>,
}

impl Default for PlatformHints {
    fn default() -> Self {
        Self {
            wrapped_hosts: DEFAULT_WRAPPED_HOST_HINTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Classify the page location into a platform hint.
pub fn classify(location: &PageLocation, hints: &PlatformHints) -> Platform {
    let parsed = match Url::parse(&location.href) {
        Ok(url) => url,
        Err(_) => return Platform::Unknown,
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return Platform::Unknown;
    }
    let host = match parsed.host_str() {
        Some(host) => host.to_ascii_lowercase(),
        None => return Platform::Unknown,
    };
    if hints
        .wrapped_hosts
        .iter()
        .any(|hint| host.contains(hint.as_str()))
    {
        return Platform::WrappedPlayer;
    }
    Platform::Native
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(href: &str) -> PageLocation {
        PageLocation::new(href, None)
    }

    #[test]
    fn http_pages_default_to_native() {
        let hints = PlatformHints::default();
        assert_eq!(
            classify(&loc("https://news.example/article"), &hints),
            Platform::Native
        );
    }

    #[test]
    fn wrapped_hosts_are_detected() {
        let hints = PlatformHints::default();
        assert_eq!(
            classify(&loc("https://players.brightcove.net/123/index.html"), &hints),
            Platform::WrappedPlayer
        );
    }

    #[test]
    fn non_http_schemes_are_unknown() {
        let hints = PlatformHints::default();
        assert_eq!(classify(&loc("about:blank"), &hints), Platform::Unknown);
        assert_eq!(
            classify(&loc("file:///tmp/video.html"), &hints),
            Platform::Unknown
        );
        assert_eq!(classify(&loc("not a url"), &hints), Platform::Unknown);
    }

    #[test]
    fn custom_hints_override_defaults() {
        let hints = PlatformHints {
            wrapped_hosts: vec!["mytube".to_string()],
        };
        assert_eq!(
            classify(&loc("https://mytube.example/watch"), &hints),
            Platform::WrappedPlayer
        );
    }
}
