//! In-page script snippets.
//!
//! Every snippet is an IIFE that never throws: results come back as
//! `{"ok": ...}` and failures as `{"err": "..."}` so the Rust side can map
//! page exceptions without parsing DevTools exception details. A snippet may
//! return a promise settling to that same envelope (the `play()` paths do, so
//! an async rejection such as an autoplay block still lands in `err`); the
//! evaluator awaits promises. All node handles are `data-vidlens-id`
//! attribute values stamped by the runtime.

use serde_json::json;

/// Shared helpers stamped into the page once per attach. Idempotent.
pub const INSTALL_RUNTIME: &str = r#"
(() => {
  try {
    if (!window.__vidlens) {
      const S = {
        nextNode: 1,
        nextPlayer: 1,
        players: {},
        mutations: [],
      };
      S.tag = (el) => {
        if (!el.dataset.vidlensId) {
          el.dataset.vidlensId = 'n' + S.nextNode++;
        }
        return el.dataset.vidlensId;
      };
      S.find = (id) => document.querySelector('[data-vidlens-id="' + id + '"]');
      S.stash = (player) => {
        const key = 'p' + S.nextPlayer++;
        S.players[key] = player;
        return key;
      };
      S.container = (el) => {
        return el.closest('.video-js, .jwplayer, .player, figure, article, section')
          || el.parentElement || document.body;
      };
      S.push = (record) => {
        if (S.mutations.length < 512) S.mutations.push(record);
      };
      const playableIn = (node) => {
        if (node.nodeType !== 1) return false;
        const tags = ['VIDEO', 'AUDIO', 'IFRAME'];
        if (tags.includes(node.tagName)) return true;
        return !!(node.querySelector && node.querySelector('video, audio, iframe'));
      };
      const removedIds = (node, out) => {
        if (node.nodeType !== 1) return;
        if (node.dataset && node.dataset.vidlensId) out.push(node.dataset.vidlensId);
        if (node.querySelectorAll) {
          node.querySelectorAll('[data-vidlens-id]').forEach((el) => {
            out.push(el.dataset.vidlensId);
          });
        }
      };
      S.observer = new MutationObserver((records) => {
        for (const r of records) {
          if (r.type === 'attributes') {
            const id = r.target.dataset ? r.target.dataset.vidlensId : null;
            if (id) S.push({ kind: 'attr', node: id, attribute: r.attributeName });
          } else if (r.type === 'childList') {
            let playableAdded = false;
            r.addedNodes.forEach((n) => { if (playableIn(n)) playableAdded = true; });
            const removed = [];
            r.removedNodes.forEach((n) => removedIds(n, removed));
            if (playableAdded || removed.length) {
              S.push({ kind: 'subtree', playableAdded, removed });
            }
          }
        }
      });
      S.observer.observe(document.documentElement, {
        subtree: true,
        childList: true,
        attributes: true,
      });
      window.__vidlens = S;
    }
    return { ok: true };
  } catch (e) {
    return { err: String(e) };
  }
})()
"#;

pub const DRAIN_MUTATIONS: &str = r#"
(() => {
  try {
    const S = window.__vidlens;
    return { ok: S ? S.mutations.splice(0) : [] };
  } catch (e) {
    return { err: String(e) };
  }
})()
"#;

pub const LOCATION: &str = r#"
(() => ({ ok: { href: location.href, host: location.host || null } }))()
"#;

pub const VIEWPORT: &str = r#"
(() => ({ ok: { width: window.innerWidth, height: window.innerHeight } }))()
"#;

pub const PAGE_TITLE: &str = r#"
(() => ({ ok: document.title || '' }))()
"#;

pub const SCAN_MEDIA: &str = r#"
(() => {
  try {
    const S = window.__vidlens;
    const out = [];
    document.querySelectorAll('video, audio').forEach((el, i) => {
      const r = el.getBoundingClientRect();
      out.push({
        id: S.tag(el),
        rect: { x: r.x, y: r.y, width: r.width, height: r.height },
        paused: !!el.paused,
        currentTime: Number(el.currentTime) || 0,
        domIndex: i,
        elementId: el.id || null,
        src: el.currentSrc || el.getAttribute('src') || null,
      });
    });
    return { ok: out };
  } catch (e) {
    return { err: String(e) };
  }
})()
"#;

pub const SCAN_FRAMES: &str = r#"
(() => {
  try {
    const S = window.__vidlens;
    const out = [];
    document.querySelectorAll('iframe').forEach((el, i) => {
      const r = el.getBoundingClientRect();
      out.push({
        id: S.tag(el),
        url: el.src || '',
        title: el.title || null,
        rect: { x: r.x, y: r.y, width: r.width, height: r.height },
        domIndex: i,
      });
    });
    return { ok: out };
  } catch (e) {
    return { err: String(e) };
  }
})()
"#;

pub fn read_media(node: &str) -> String {
    format!(
        r#"
(() => {{
  try {{
    const S = window.__vidlens;
    const el = S.find({node});
    if (!el) return {{ err: 'node gone' }};
    const sources = [];
    el.querySelectorAll('source').forEach((s) => {{ if (s.src) sources.push(s.src); }});
    return {{ ok: {{
      currentTime: Number.isFinite(el.currentTime) ? el.currentTime : null,
      duration: Number.isFinite(el.duration) ? el.duration : null,
      paused: typeof el.paused === 'boolean' ? el.paused : null,
      muted: typeof el.muted === 'boolean' ? el.muted : null,
      volume: Number.isFinite(el.volume) ? el.volume : null,
      playbackRate: Number.isFinite(el.playbackRate) ? el.playbackRate : null,
      width: el.videoWidth || null,
      height: el.videoHeight || null,
      src: el.currentSrc || el.getAttribute('src') || null,
      sources,
    }} }};
  }} catch (e) {{
    return {{ err: String(e) }};
  }}
}})()
"#,
        node = json!(node)
    )
}

pub fn invoke_media(node: &str, method: &str, arg: Option<f64>) -> String {
    format!(
        r#"
(() => {{
  try {{
    const S = window.__vidlens;
    const el = S.find({node});
    if (!el) return {{ err: 'node gone' }};
    const method = {method};
    const arg = {arg};
    if (method === 'play') {{
      const p = el.play();
      if (p && p.then) {{
        return p.then(() => ({{ ok: true }}), (e) => ({{ err: String(e) }}));
      }}
    }} else if (method === 'pause') {{
      el.pause();
    }} else if (method === 'setCurrentTime') {{
      el.currentTime = arg;
    }} else if (method === 'setRate') {{
      el.playbackRate = arg;
    }} else {{
      return {{ err: 'unknown method ' + method }};
    }}
    return {{ ok: true }};
  }} catch (e) {{
    return {{ err: String(e) }};
  }}
}})()
"#,
        node = json!(node),
        method = json!(method),
        arg = json!(arg)
    )
}

pub fn probe_global_registry() -> String {
    r#"
(() => {
  try {
    const S = window.__vidlens;
    const vjs = window.videojs;
    if (vjs && typeof vjs.getAllPlayers === 'function') {
      const players = vjs.getAllPlayers();
      if (players && players.length) return { ok: { player: S.stash(players[0]) } };
    }
    if (window.jwplayer && typeof window.jwplayer === 'function') {
      const p = window.jwplayer();
      if (p && typeof p.play === 'function') return { ok: { player: S.stash(p) } };
    }
    return { ok: { player: null } };
  } catch (e) {
    return { err: String(e) };
  }
})()
"#
    .to_string()
}

pub fn probe_element_property(node: &str, property: &str) -> String {
    format!(
        r#"
(() => {{
  try {{
    const S = window.__vidlens;
    const el = S.find({node});
    if (!el) return {{ ok: {{ player: null }} }};
    const p = el[{property}];
    if (p && (typeof p.play === 'function' || typeof p.currentTime === 'function')) {{
      return {{ ok: {{ player: S.stash(p) }} }};
    }}
    return {{ ok: {{ player: null }} }};
  }} catch (e) {{
    return {{ err: String(e) }};
  }}
}})()
"#,
        node = json!(node),
        property = json!(property)
    )
}

pub fn probe_registry_by_id(element_id: &str) -> String {
    format!(
        r#"
(() => {{
  try {{
    const S = window.__vidlens;
    const vjs = window.videojs;
    if (vjs && typeof vjs.getPlayer === 'function') {{
      const p = vjs.getPlayer({element_id});
      if (p) return {{ ok: {{ player: S.stash(p) }} }};
    }}
    return {{ ok: {{ player: null }} }};
  }} catch (e) {{
    return {{ err: String(e) }};
  }}
}})()
"#,
        element_id = json!(element_id)
    )
}

pub fn read_player(player: &str, accessor: &str) -> String {
    format!(
        r#"
(() => {{
  try {{
    const S = window.__vidlens;
    const p = S.players[{player}];
    if (!p) return {{ err: 'player object gone' }};
    const v = p[{accessor}];
    const value = typeof v === 'function' ? v.call(p) : v;
    return {{ ok: {{ value: value === undefined ? null : value }} }};
  }} catch (e) {{
    return {{ err: String(e) }};
  }}
}})()
"#,
        player = json!(player),
        accessor = json!(accessor)
    )
}

pub fn invoke_player(player: &str, method: &str, arg: Option<f64>) -> String {
    format!(
        r#"
(() => {{
  try {{
    const S = window.__vidlens;
    const p = S.players[{player}];
    if (!p) return {{ err: 'player object gone' }};
    const method = {method};
    const arg = {arg};
    if (method === 'play') {{
      const r = p.play();
      if (r && r.then) {{
        return r.then(() => ({{ ok: true }}), (e) => ({{ err: String(e) }}));
      }}
    }} else if (method === 'pause') {{
      p.pause();
    }} else if (method === 'setCurrentTime') {{
      if (typeof p.currentTime === 'function') p.currentTime(arg);
      else if (typeof p.seek === 'function') p.seek(arg);
      else p.currentTime = arg;
    }} else if (method === 'setRate') {{
      if (typeof p.playbackRate === 'function') p.playbackRate(arg);
      else p.playbackRate = arg;
    }} else {{
      return {{ err: 'unknown method ' + method }};
    }}
    return {{ ok: true }};
  }} catch (e) {{
    return {{ err: String(e) }};
  }}
}})()
"#,
        player = json!(player),
        method = json!(method),
        arg = json!(arg)
    )
}

pub fn container_heading(node: &str) -> String {
    format!(
        r#"
(() => {{
  try {{
    const S = window.__vidlens;
    const el = S.find({node});
    if (!el) return {{ err: 'node gone' }};
    let scope = el;
    for (let depth = 0; scope && depth < 5; depth++) {{
      const heading = scope.querySelector && scope.querySelector('h1, h2, h3, h4');
      if (heading && heading.textContent.trim()) {{
        return {{ ok: {{ text: heading.textContent.trim() }} }};
      }}
      scope = scope.parentElement;
    }}
    return {{ ok: {{ text: null }} }};
  }} catch (e) {{
    return {{ err: String(e) }};
  }}
}})()
"#,
        node = json!(node)
    )
}

pub fn container_selector_text(node: &str, selector: &str) -> String {
    format!(
        r#"
(() => {{
  try {{
    const S = window.__vidlens;
    const el = S.find({node});
    if (!el) return {{ err: 'node gone' }};
    const hit = S.container(el).querySelector({selector});
    const text = hit && hit.textContent ? hit.textContent.trim() : null;
    return {{ ok: {{ text: text || null }} }};
  }} catch (e) {{
    return {{ err: String(e) }};
  }}
}})()
"#,
        node = json!(node),
        selector = json!(selector)
    )
}

pub fn container_time_display(node: &str) -> String {
    format!(
        r#"
(() => {{
  try {{
    const S = window.__vidlens;
    const el = S.find({node});
    if (!el) return {{ err: 'node gone' }};
    const hit = S.container(el).querySelector(
      '.vjs-duration, .vjs-remaining-time, .time-display, [class*="duration"], [class*="time"]'
    );
    const text = hit && hit.textContent ? hit.textContent.trim() : null;
    return {{ ok: {{ text: text || null }} }};
  }} catch (e) {{
    return {{ err: String(e) }};
  }}
}})()
"#,
        node = json!(node)
    )
}

pub fn click_control(node: &str, selector: &str) -> String {
    format!(
        r#"
(() => {{
  try {{
    const S = window.__vidlens;
    const el = S.find({node});
    if (!el) return {{ err: 'node gone' }};
    const control = S.container(el).querySelector({selector});
    if (!control) return {{ ok: false }};
    control.click();
    return {{ ok: true }};
  }} catch (e) {{
    return {{ err: String(e) }};
  }}
}})()
"#,
        node = json!(node),
        selector = json!(selector)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_are_json_escaped() {
        let script = container_selector_text("n3", r#"a"b'c"#);
        assert!(script.contains(r#""n3""#));
        assert!(script.contains(r#""a\"b'c""#));

        let script = invoke_media("n1", "setCurrentTime", Some(12.5));
        assert!(script.contains("12.5"));
        assert!(script.contains(r#""setCurrentTime""#));
    }

    #[test]
    fn play_reports_async_rejection() {
        // A rejected play() promise must settle into the err envelope, not be
        // swallowed while a premature ok is returned.
        for script in [
            invoke_media("n1", "play", None),
            invoke_player("p1", "play", None),
        ] {
            assert!(script.contains(".then("));
            assert!(script.contains("(e) => ({ err: String(e) })"));
            assert!(!script.contains(".catch("));
        }

        // Synchronous methods keep the plain envelope.
        let script = invoke_media("n1", "pause", None);
        assert!(!script.contains(".catch("));
    }

    #[test]
    fn runtime_install_is_guarded() {
        assert!(INSTALL_RUNTIME.contains("if (!window.__vidlens)"));
        assert!(INSTALL_RUNTIME.contains("MutationObserver"));
    }
}
