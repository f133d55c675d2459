//! Canonical element locator (spec §3 "ElementParams") and the JS resolve
//! script that finds, scrolls to, and actionability-checks it in one
//! `script.callFunction` round trip (spec §4.2).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::DEFAULT_RESOLVE_TIMEOUT;
use crate::error::{Result, VibiumError};
use crate::jswrap;

/// Canonical locator. At least one of `selector` or a semantic field must
/// be set — enforced by [`ElementParams::validate`], called before any
/// browser round trip (spec §3 invariant, §7 "Validation").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElementParams {
    pub scope: Option<String>,
    pub selector: Option<String>,
    pub index: Option<u32>,
    pub role: Option<String>,
    pub text: Option<String>,
    pub label: Option<String>,
    pub placeholder: Option<String>,
    pub alt: Option<String>,
    pub title: Option<String>,
    pub testid: Option<String>,
    pub xpath: Option<String>,
    pub context: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub force: bool,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_RESOLVE_TIMEOUT.as_millis() as u64
}

impl ElementParams {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        let has_semantic = self.role.is_some()
            || self.text.is_some()
            || self.label.is_some()
            || self.placeholder.is_some()
            || self.alt.is_some()
            || self.title.is_some()
            || self.testid.is_some()
            || self.xpath.is_some();
        if self.selector.is_none() && !has_semantic {
            return Err(VibiumError::validation(
                "at least one of selector or a semantic locator field must be set",
            ));
        }
        Ok(())
    }

    /// A human-readable locator description for error messages: "all
    /// non-empty predicate fields joined" (spec §7).
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(s) = &self.selector {
            parts.push(format!("selector={s}"));
        }
        if let Some(s) = &self.role {
            parts.push(format!("role={s}"));
        }
        if let Some(s) = &self.text {
            parts.push(format!("text={s}"));
        }
        if let Some(s) = &self.label {
            parts.push(format!("label={s}"));
        }
        if let Some(s) = &self.placeholder {
            parts.push(format!("placeholder={s}"));
        }
        if let Some(s) = &self.alt {
            parts.push(format!("alt={s}"));
        }
        if let Some(s) = &self.title {
            parts.push(format!("title={s}"));
        }
        if let Some(s) = &self.testid {
            parts.push(format!("testid={s}"));
        }
        if let Some(s) = &self.xpath {
            parts.push(format!("xpath={s}"));
        }
        if parts.is_empty() {
            "<empty locator>".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Result of a successful resolve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementInfo {
    pub tag: String,
    pub text: String,
    pub box_: BoundingBox,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// One actionability precondition (spec §3 "ActionabilityMatrix").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Check {
    Visible,
    Stable,
    ReceivesEvents,
    Enabled,
    Editable,
}

impl Check {
    pub fn as_str(self) -> &'static str {
        match self {
            Check::Visible => "visible",
            Check::Stable => "stable",
            Check::ReceivesEvents => "receivesEvents",
            Check::Enabled => "enabled",
            Check::Editable => "editable",
        }
    }
}

/// Which interaction is being performed — selects the check list below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// click, dblclick, type, press, tap, drag-to
    PointerOrKeyboard,
    Hover,
    Fill,
    Select,
    ScrollIntoView,
}

/// The fixed per-command check set (spec §3 "ActionabilityMatrix").
/// `force=true` bypasses this matrix entirely (plain resolve, no checks).
pub fn matrix_for(kind: ActionKind) -> &'static [Check] {
    use Check::*;
    match kind {
        ActionKind::PointerOrKeyboard => &[Visible, Stable, ReceivesEvents, Enabled],
        ActionKind::Hover => &[Visible, Stable, ReceivesEvents],
        ActionKind::Fill => &[Visible, Enabled, Editable],
        ActionKind::Select => &[Visible, Enabled],
        ActionKind::ScrollIntoView => &[Stable],
    }
}

/// Builds the single JS function body + argument object for one resolve
/// poll. `checks` excludes [`Check::Stable`] — that one is done by the
/// *caller* via two script invocations 50ms apart (spec §4.2 "Stability
/// check"), never inside the script itself.
pub fn build_resolve_script(params: &ElementParams, checks: &[Check]) -> (String, Value) {
    let non_stability: Vec<&str> = checks
        .iter()
        .filter(|c| **c != Check::Stable)
        .map(|c| c.as_str())
        .collect();

    let args = json!({
        "scope": params.scope,
        "selector": params.selector,
        "hasIndex": params.index.is_some(),
        "index": params.index.unwrap_or(0),
        "role": params.role,
        "text": params.text,
        "label": params.label,
        "placeholder": params.placeholder,
        "alt": params.alt,
        "title": params.title,
        "testid": params.testid,
        "xpath": params.xpath,
        "checks": non_stability,
    });

    let script = format!(
        r#"
(function(args) {{
{helpers}

function matchesSemantic(node) {{
  if (args.role && implicitRole(node) !== args.role && (node.getAttribute('role') || implicitRole(node)) !== args.role) return false;
  if (args.role) {{
    const explicit = node.getAttribute('role');
    const effective = explicit || implicitRole(node);
    if (effective !== args.role) return false;
  }}
  if (args.text && !accessibleName(node).includes(args.text) && !(node.textContent || '').includes(args.text)) return false;
  if (args.label && !accessibleName(node).includes(args.label)) return false;
  if (args.placeholder && node.getAttribute('placeholder') !== args.placeholder) return false;
  if (args.alt && node.getAttribute('alt') !== args.alt) return false;
  if (args.title && node.getAttribute('title') !== args.title) return false;
  if (args.testid && node.getAttribute('data-testid') !== args.testid) return false;
  return true;
}}

function pick(candidates) {{
  if (args.hasIndex) return candidates[args.index] || null;
  if (args.text || args.label) {{
    let best = null;
    for (const c of candidates) {{
      const len = (c.textContent || '').trim().length;
      if (best === null || len < best.len) best = {{ node: c, len }};
    }}
    return best ? best.node : (candidates[0] || null);
  }}
  return candidates[0] || null;
}}

const root = args.scope ? document.querySelector(args.scope) : document;
if (!root) return {{ status: 'not_found' }};

let candidates = [];
if (args.xpath) {{
  const snap = document.evaluate(args.xpath, root, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
  for (let i = 0; i < snap.snapshotLength; i++) candidates.push(snap.snapshotItem(i));
  candidates = candidates.filter(matchesSemantic);
}} else if (args.selector && !(args.role || args.text || args.label || args.placeholder || args.alt || args.title || args.testid)) {{
  candidates = Array.from(root.querySelectorAll(args.selector));
}} else if (args.selector) {{
  candidates = Array.from(root.querySelectorAll(args.selector)).filter(matchesSemantic);
}} else {{
  const walker = document.createTreeWalker(root === document ? document.documentElement : root, NodeFilter.SHOW_ELEMENT);
  let node = walker.currentNode;
  while (node) {{
    if (node.nodeType === 1 && matchesSemantic(node)) candidates.push(node);
    node = walker.nextNode();
  }}
}}

const el = pick(candidates);
if (!el) return {{ status: 'not_found' }};

scrollIntoViewIfPossible(el);

const rect = el.getBoundingClientRect();
const box = {{ x: rect.x, y: rect.y, width: rect.width, height: rect.height }};
const cx = rect.x + rect.width / 2;
const cy = rect.y + rect.height / 2;

for (const check of args.checks) {{
  if (check === 'visible' && !isVisible(el)) return {{ status: 'failed', check: 'visible', reason: 'element is not visible', tag: el.tagName.toLowerCase(), box }};
  if (check === 'enabled' && !isEnabled(el)) return {{ status: 'failed', check: 'enabled', reason: 'element is disabled', tag: el.tagName.toLowerCase(), box }};
  if (check === 'editable' && !isEditable(el)) return {{ status: 'failed', check: 'editable', reason: 'element is not editable', tag: el.tagName.toLowerCase(), box }};
  if (check === 'receivesEvents' && !receivesEvents(el, cx, cy)) return {{ status: 'failed', check: 'receivesEvents', reason: 'element is obscured at its center point', tag: el.tagName.toLowerCase(), box }};
}}

return {{
  status: 'ok',
  tag: el.tagName.toLowerCase(),
  text: (el.textContent || '').trim().slice(0, 100),
  box,
}};
}})
"#,
        helpers = jswrap::shared_helpers(),
    );

    (script, args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_locator() {
        let params = ElementParams::default();
        assert!(params.validate().is_err());
    }

    #[test]
    fn accepts_selector_only() {
        let params = ElementParams {
            selector: Some("button".into()),
            ..Default::default()
        };
        assert!(params.validate().is_ok());
    }

    #[test]
    fn accepts_semantic_only() {
        let params = ElementParams {
            role: Some("button".into()),
            text: Some("Save".into()),
            ..Default::default()
        };
        assert!(params.validate().is_ok());
    }

    #[test]
    fn describe_joins_nonempty_fields() {
        let params = ElementParams {
            role: Some("button".into()),
            text: Some("Save".into()),
            ..Default::default()
        };
        assert_eq!(params.describe(), "role=button, text=Save");
    }

    #[test]
    fn matrix_matches_spec_table() {
        assert_eq!(
            matrix_for(ActionKind::PointerOrKeyboard),
            &[Check::Visible, Check::Stable, Check::ReceivesEvents, Check::Enabled]
        );
        assert_eq!(matrix_for(ActionKind::Hover), &[Check::Visible, Check::Stable, Check::ReceivesEvents]);
        assert_eq!(matrix_for(ActionKind::Fill), &[Check::Visible, Check::Enabled, Check::Editable]);
        assert_eq!(matrix_for(ActionKind::Select), &[Check::Visible, Check::Enabled]);
        assert_eq!(matrix_for(ActionKind::ScrollIntoView), &[Check::Stable]);
    }

    #[test]
    fn script_excludes_stability_from_in_browser_checks() {
        let params = ElementParams {
            selector: Some("button".into()),
            ..Default::default()
        };
        let (_script, args) = build_resolve_script(&params, matrix_for(ActionKind::PointerOrKeyboard));
        let checks = args["checks"].as_array().unwrap();
        assert!(!checks.iter().any(|c| c == "stable"));
        assert!(checks.iter().any(|c| c == "visible"));
    }
}
