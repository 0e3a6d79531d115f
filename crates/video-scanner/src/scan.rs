//! Candidate enumeration and relevance scoring.

use std::sync::Arc;

use page_bridge::{FrameSnapshot, HostPage, MediaNodeSnapshot, PageError, Viewport};
use tracing::debug;
use vidlens_core_types::{CandidateKind, VideoCandidate};

/// Multiplier applied to candidates that are playing or have a nonzero
/// position. Tunable: tests assert ordering, not the exact weight.
pub const PLAYING_BONUS: f64 = 1.5;

/// URL substrings that make a frame look player-like.
pub const PLAYER_URL_HINTS: &[&str] = &["player", "video", "embed"];

/// Enumerates media-bearing nodes and picks the most relevant one.
pub struct Scanner {
    page: Arc<dyn HostPage>,
}

impl Scanner {
    pub fn new(page: Arc<dyn HostPage>) -> Self {
        Self { page }
    }

    /// One scan pass. `Ok(None)` means no candidate qualifies right now,
    /// which is recoverable, not an error.
    pub async fn scan(&self) -> Result<Option<VideoCandidate>, PageError> {
        let viewport = self.page.viewport().await?;
        let nodes = self.page.media_nodes().await?;
        if !nodes.is_empty() {
            return Ok(pick_element(nodes, viewport));
        }

        let frames = self.page.frame_nodes().await?;
        let candidate = pick_frame(frames, viewport);
        if candidate.is_none() {
            debug!(target: "video-scanner", "no playable elements or player-like frames");
        }
        Ok(candidate)
    }
}

fn element_score(node: &MediaNodeSnapshot, viewport: Viewport) -> f64 {
    let viewport_area = (viewport.width * viewport.height).max(1.0);
    let visible = node.rect.visible_area(viewport.width, viewport.height);
    let base = visible / viewport_area;
    let started = !node.paused || node.current_time > 0.0;
    if started {
        base * PLAYING_BONUS
    } else {
        base
    }
}

fn element_candidate(node: MediaNodeSnapshot, score: f64) -> VideoCandidate {
    VideoCandidate {
        node: node.node,
        kind: CandidateKind::Element,
        rect: node.rect,
        paused: node.paused,
        current_time: node.current_time,
        dom_index: node.dom_index,
        score,
        src: node.src,
        element_dom_id: node.element_id,
        frame_title: None,
    }
}

fn pick_element(nodes: Vec<MediaNodeSnapshot>, viewport: Viewport) -> Option<VideoCandidate> {
    // Single-candidate shortcut: the only playable element wins regardless of
    // visibility.
    if nodes.len() == 1 {
        return nodes.into_iter().next().map(|node| {
            let score = element_score(&node, viewport);
            element_candidate(node, score)
        });
    }

    let mut best: Option<(f64, MediaNodeSnapshot)> = None;
    for node in nodes {
        let visible = node.rect.visible_area(viewport.width, viewport.height);
        if visible <= 0.0 {
            continue;
        }
        let score = element_score(&node, viewport);
        // Strictly-greater keeps document order on ties.
        let replace = match &best {
            Some((best_score, _)) => score > *best_score,
            None => true,
        };
        if replace {
            best = Some((score, node));
        }
    }
    best.map(|(score, node)| {
        debug!(
            target: "video-scanner",
            node = %node.node,
            score,
            "selected media element"
        );
        element_candidate(node, score)
    })
}

fn frame_candidate(frame: FrameSnapshot, score: f64) -> VideoCandidate {
    VideoCandidate {
        node: frame.node,
        kind: CandidateKind::Frame,
        rect: frame.rect,
        paused: true,
        current_time: 0.0,
        dom_index: frame.dom_index,
        score,
        src: Some(frame.url),
        element_dom_id: None,
        frame_title: frame.title,
    }
}

fn pick_frame(frames: Vec<FrameSnapshot>, viewport: Viewport) -> Option<VideoCandidate> {
    let viewport_area = (viewport.width * viewport.height).max(1.0);
    let player_like: Vec<FrameSnapshot> = frames
        .into_iter()
        .filter(|f| {
            let url = f.url.to_ascii_lowercase();
            PLAYER_URL_HINTS.iter().any(|hint| url.contains(hint))
        })
        .collect();
    if player_like.is_empty() {
        return None;
    }

    let mut best: Option<(f64, FrameSnapshot)> = None;
    for frame in player_like {
        let score = frame.rect.visible_area(viewport.width, viewport.height) / viewport_area;
        let replace = match &best {
            Some((best_score, _)) => score > *best_score,
            None => true,
        };
        if replace {
            best = Some((score, frame));
        }
    }
    best.map(|(score, frame)| frame_candidate(frame, score))
}

#[cfg(test)]
mod tests {
    use super::*;
    use page_bridge::{MediaNodeSpec, ScriptedPage};
    use vidlens_core_types::NodeRect;

    fn scanner(page: &ScriptedPage) -> Scanner {
        Scanner::new(Arc::new(page.clone()))
    }

    #[tokio::test]
    async fn single_element_wins_even_when_hidden() {
        let page = ScriptedPage::new("https://watch.example");
        let node = page.install_media_node(MediaNodeSpec::new().hidden());

        let candidate = scanner(&page).scan().await.unwrap().unwrap();
        assert_eq!(candidate.node, node);
        assert_eq!(candidate.score, 0.0);
    }

    #[tokio::test]
    async fn visible_element_beats_hidden_one() {
        let page = ScriptedPage::new("https://watch.example");
        page.install_media_node(MediaNodeSpec::new().hidden());
        let visible = page.install_media_node(MediaNodeSpec::new().rect(0.0, 0.0, 640.0, 360.0));

        let candidate = scanner(&page).scan().await.unwrap().unwrap();
        assert_eq!(candidate.node, visible);
        assert!(candidate.score > 0.0);
    }

    #[tokio::test]
    async fn playing_element_beats_idle_at_equal_area() {
        let page = ScriptedPage::new("https://watch.example");
        page.install_media_node(MediaNodeSpec::new().rect(0.0, 0.0, 640.0, 360.0));
        let playing =
            page.install_media_node(MediaNodeSpec::new().rect(640.0, 0.0, 640.0, 360.0).playing());

        let candidate = scanner(&page).scan().await.unwrap().unwrap();
        assert_eq!(candidate.node, playing);
    }

    #[tokio::test]
    async fn started_but_paused_element_also_gets_bonus() {
        let page = ScriptedPage::new("https://watch.example");
        page.install_media_node(MediaNodeSpec::new().rect(0.0, 0.0, 640.0, 360.0));
        let started = page.install_media_node(
            MediaNodeSpec::new()
                .rect(640.0, 0.0, 640.0, 360.0)
                .at_position(30.0),
        );

        let candidate = scanner(&page).scan().await.unwrap().unwrap();
        assert_eq!(candidate.node, started);
    }

    #[tokio::test]
    async fn equal_scores_keep_document_order() {
        let page = ScriptedPage::new("https://watch.example");
        let first = page.install_media_node(MediaNodeSpec::new().rect(0.0, 0.0, 320.0, 180.0));
        page.install_media_node(MediaNodeSpec::new().rect(320.0, 0.0, 320.0, 180.0));

        let candidate = scanner(&page).scan().await.unwrap().unwrap();
        assert_eq!(candidate.node, first);
    }

    #[tokio::test]
    async fn frames_are_fallback_only() {
        let page = ScriptedPage::new("https://watch.example");
        page.install_frame(
            "https://cdn.example/embed/player?id=1",
            Some("Embedded clip"),
            NodeRect::new(0.0, 0.0, 640.0, 360.0),
        );
        page.install_frame(
            "https://ads.example/banner",
            None,
            NodeRect::new(0.0, 400.0, 300.0, 250.0),
        );

        let candidate = scanner(&page).scan().await.unwrap().unwrap();
        assert_eq!(candidate.kind, CandidateKind::Frame);
        assert_eq!(candidate.frame_title.as_deref(), Some("Embedded clip"));

        // A playable element pre-empts frames entirely.
        let element = page.install_media_node(MediaNodeSpec::new());
        let candidate = scanner(&page).scan().await.unwrap().unwrap();
        assert_eq!(candidate.node, element);
    }

    #[tokio::test]
    async fn empty_page_yields_none() {
        let page = ScriptedPage::new("https://watch.example");
        assert!(scanner(&page).scan().await.unwrap().is_none());
    }
}
