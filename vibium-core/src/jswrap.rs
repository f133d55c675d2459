//! Shared JS snippets spliced into the single `script.callFunction` body the
//! actionability engine sends per poll (spec §4.2, §9 "JS-as-string
//! construction": one canonical source for the shared helpers, re-spliced
//! rather than duplicated per call site).
//!
//! Every constant here is a standalone JS expression or statement list that
//! assumes a handful of conventions: the element under consideration is
//! bound to `el`, and helper functions are attached to the scratch object
//! `__vibium` so the generated script can call them without re-declaring
//! them inline.

/// Implicit ARIA role table keyed on tag name (and, for `<input>`, its
/// `type` attribute). Matches the subset of the HTML-AAM mapping that
/// actually shows up in locator predicates.
pub const IMPLICIT_ROLE_TABLE_JS: &str = r#"
function implicitRole(node) {
  const tag = node.tagName.toLowerCase();
  if (tag === 'button') return 'button';
  if (tag === 'a' && node.hasAttribute('href')) return 'link';
  if (tag === 'select') return 'combobox';
  if (tag === 'textarea') return 'textbox';
  if (tag === 'img') return node.getAttribute('alt') === '' ? 'presentation' : 'img';
  if (tag === 'h1' || tag === 'h2' || tag === 'h3' || tag === 'h4' || tag === 'h5' || tag === 'h6') return 'heading';
  if (tag === 'input') {
    const type = (node.getAttribute('type') || 'text').toLowerCase();
    if (type === 'button' || type === 'submit' || type === 'reset') return 'button';
    if (type === 'checkbox') return 'checkbox';
    if (type === 'radio') return 'radio';
    if (type === 'range') return 'slider';
    if (type === 'search') return 'searchbox';
    return 'textbox';
  }
  return null;
}
"#;

/// Accessible-name computation: `aria-label` -> `aria-labelledby` -> an
/// associated `label[for]` -> enclosing `<label>` -> `placeholder` -> `alt`
/// -> `title` -> trimmed `textContent`, in that order (spec §4.2).
pub const ACCESSIBLE_NAME_JS: &str = r#"
function accessibleName(node) {
  const ariaLabel = node.getAttribute('aria-label');
  if (ariaLabel && ariaLabel.trim()) return ariaLabel.trim();

  const labelledBy = node.getAttribute('aria-labelledby');
  if (labelledBy) {
    const parts = labelledBy.split(/\s+/).filter(Boolean).map((id) => {
      const ref = document.getElementById(id);
      return ref ? ref.textContent.trim() : '';
    }).filter(Boolean);
    if (parts.length) return parts.join(' ');
  }

  if (node.id) {
    const forLabel = document.querySelector(`label[for="${CSS.escape(node.id)}"]`);
    if (forLabel && forLabel.textContent.trim()) return forLabel.textContent.trim();
  }

  const enclosing = node.closest('label');
  if (enclosing && enclosing.textContent.trim()) return enclosing.textContent.trim();

  const placeholder = node.getAttribute('placeholder');
  if (placeholder && placeholder.trim()) return placeholder.trim();

  const alt = node.getAttribute('alt');
  if (alt && alt.trim()) return alt.trim();

  const title = node.getAttribute('title');
  if (title && title.trim()) return title.trim();

  return (node.textContent || '').trim();
}
"#;

/// `rect.width>0 && rect.height>0 && display!=='none' && visibility!=='hidden'`.
pub const VISIBLE_CHECK_JS: &str = r#"
function isVisible(node) {
  const rect = node.getBoundingClientRect();
  if (rect.width <= 0 || rect.height <= 0) return false;
  const style = getComputedStyle(node);
  return style.display !== 'none' && style.visibility !== 'hidden';
}
"#;

/// disabled, `aria-disabled="true"`, or inside a `fieldset[disabled]`
/// unless inside that fieldset's `legend`.
pub const ENABLED_CHECK_JS: &str = r#"
function isEnabled(node) {
  if (node.disabled === true) return false;
  if (node.getAttribute('aria-disabled') === 'true') return false;
  let fs = node.closest('fieldset[disabled]');
  while (fs) {
    const legend = fs.querySelector(':scope > legend');
    if (legend && legend.contains(node)) { fs = fs.parentElement ? fs.parentElement.closest('fieldset[disabled]') : null; continue; }
    return false;
  }
  return true;
}
"#;

/// readonly / aria-readonly, non-text input types, anything but
/// input/textarea/contenteditable.
pub const EDITABLE_CHECK_JS: &str = r#"
const __editableInputTypes = new Set(['text', 'password', 'email', 'number', 'search', 'tel', 'url']);
function isEditable(node) {
  if (node.readOnly === true) return false;
  if (node.getAttribute('aria-readonly') === 'true') return false;
  const tag = node.tagName.toLowerCase();
  if (tag === 'textarea') return true;
  if (tag === 'input') return __editableInputTypes.has((node.getAttribute('type') || 'text').toLowerCase());
  return node.isContentEditable === true;
}
"#;

/// `document.elementFromPoint` at the bbox center must be, or be contained
/// by, the resolved element.
pub const RECEIVES_EVENTS_CHECK_JS: &str = r#"
function receivesEvents(node, cx, cy) {
  const at = document.elementFromPoint(cx, cy);
  return at === node || (at !== null && node.contains(at));
}
"#;

/// Brings the element into view, preferring the spec-ideal accessor.
pub const SCROLL_INTO_VIEW_JS: &str = r#"
function scrollIntoViewIfPossible(node) {
  if (typeof node.scrollIntoViewIfNeeded === 'function') {
    node.scrollIntoViewIfNeeded();
  } else {
    node.scrollIntoView({ block: 'center' });
  }
}
"#;

/// All helper snippets concatenated once, in a fixed order, so the builder
/// in `locator.rs` only ever needs to splice this one block plus the
/// per-call dispatch body.
pub fn shared_helpers() -> String {
    [
        IMPLICIT_ROLE_TABLE_JS,
        ACCESSIBLE_NAME_JS,
        VISIBLE_CHECK_JS,
        ENABLED_CHECK_JS,
        EDITABLE_CHECK_JS,
        RECEIVES_EVENTS_CHECK_JS,
        SCROLL_INTO_VIEW_JS,
    ]
    .join("\n")
}
