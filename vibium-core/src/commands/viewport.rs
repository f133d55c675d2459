//! set-viewport/get-viewport, get-window/set-window, emulate-media,
//! set-geolocation, set-content (spec §4.3).

use serde_json::{json, Value};

use super::{optional_str, required_f64, required_str};
use crate::error::Result;
use crate::session::Session;
use crate::state::CommandContext;

pub async fn set_viewport(ctx: &CommandContext, params: Value) -> Result<Value> {
    let width = super::required_u64(&params, "width")?;
    let height = super::required_u64(&params, "height")?;
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;
    ctx.session
        .send_bidi_command(
            "browsingContext.setViewport",
            json!({ "context": context, "viewport": { "width": width, "height": height } }),
        )
        .await?;
    Ok(json!({ "ok": true }))
}

pub async fn get_viewport(ctx: &CommandContext, params: Value) -> Result<Value> {
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;
    let result = ctx
        .session
        .send_bidi_command(
            "script.callFunction",
            json!({
                "functionDeclaration": "(function() { return { width: innerWidth, height: innerHeight }; })",
                "arguments": [],
                "target": { "context": context },
                "awaitPromise": false,
            }),
        )
        .await?;
    Ok(result["result"]["value"].clone())
}

/// Reads window state the way a classic WebDriver `GET .../window/rect`
/// caller would infer it — fullscreen via the Fullscreen API, maximized by
/// comparing the outer window to the available screen area, otherwise
/// normal. Page JS has no way to observe "minimized" (the tab keeps
/// reporting its last-known size), so that state never comes back here
/// (spec §4.3: "window state uses classic WebDriver endpoints", a distinct
/// mechanism from the BiDi viewport command `set-viewport`/`get-viewport`
/// use).
const GET_WINDOW_STATE_JS: &str = r#"
(function() {
  let state = 'normal';
  if (document.fullscreenElement) {
    state = 'fullscreen';
  } else if (window.outerWidth >= screen.availWidth && window.outerHeight >= screen.availHeight) {
    state = 'maximized';
  }
  return { state };
})
"#;

const SET_WINDOW_STATE_JS: &str = r#"
(function(args) {
  if (args.state === 'fullscreen') {
    document.documentElement.requestFullscreen();
  } else if (document.fullscreenElement) {
    document.exitFullscreen();
  }
  if (args.state === 'maximized') {
    window.moveTo(0, 0);
    window.resizeTo(screen.availWidth, screen.availHeight);
  }
  return true;
})
"#;

pub async fn get_window(ctx: &CommandContext, params: Value) -> Result<Value> {
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;
    let result = ctx
        .session
        .send_bidi_command(
            "script.callFunction",
            json!({
                "functionDeclaration": GET_WINDOW_STATE_JS,
                "arguments": [],
                "target": { "context": context },
                "awaitPromise": false,
            }),
        )
        .await?;
    Ok(result["result"]["value"].clone())
}

pub async fn set_window(ctx: &CommandContext, params: Value) -> Result<Value> {
    let state = required_str(&params, "state")?.to_string();
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;
    ctx.session
        .send_bidi_command(
            "script.callFunction",
            json!({
                "functionDeclaration": SET_WINDOW_STATE_JS,
                "arguments": [json!({ "state": state })],
                "target": { "context": context },
                "awaitPromise": false,
            }),
        )
        .await?;
    Ok(json!({ "ok": true }))
}

/// Maps the command's short feature names onto the CSS media-feature names
/// `matchMedia` queries actually use.
const EMULATE_MEDIA_JS: &str = r#"
(function(args) {
  if (!window.__vibiumMatchMediaPatched) {
    window.__vibiumMatchMediaPatched = true;
    window.__vibiumMediaOverrides = {};
    window.__vibiumMediaType = null;
    const realMatchMedia = window.matchMedia.bind(window);
    const featureRe = /\(\s*([a-zA-Z-]+)\s*:\s*([a-zA-Z-]+)\s*\)/;
    function fakeList(query, matches) {
      return {
        media: query,
        matches,
        onchange: null,
        addListener() {},
        removeListener() {},
        addEventListener() {},
        removeEventListener() {},
        dispatchEvent() { return false; },
      };
    }
    window.matchMedia = function(query) {
      const trimmed = query.trim();
      if (window.__vibiumMediaType && (trimmed === 'print' || trimmed === 'screen')) {
        return fakeList(query, trimmed === window.__vibiumMediaType);
      }
      const m = featureRe.exec(query);
      if (m) {
        const feature = m[1];
        if (Object.prototype.hasOwnProperty.call(window.__vibiumMediaOverrides, feature)) {
          return fakeList(query, window.__vibiumMediaOverrides[feature] === m[2]);
        }
      }
      return realMatchMedia(query);
    };
  }
  Object.assign(window.__vibiumMediaOverrides, args.overrides);
  if (args.media) window.__vibiumMediaType = args.media;
  return true;
})
"#;

/// Installs (once, idempotently) a `matchMedia` patch intercepting the
/// named features and delegates the rest to the real implementation (spec
/// §4.3 "emulate-media": "installs a JS matchMedia wrapper that intercepts
/// the named features and delegates the rest ... idempotent across
/// multiple calls").
pub async fn emulate_media(ctx: &CommandContext, params: Value) -> Result<Value> {
    let mut overrides = serde_json::Map::new();
    if let Some(scheme) = optional_str(&params, "colorScheme") {
        overrides.insert("prefers-color-scheme".to_string(), json!(scheme));
    }
    if let Some(motion) = optional_str(&params, "reducedMotion") {
        overrides.insert("prefers-reduced-motion".to_string(), json!(motion));
    }
    if let Some(forced) = optional_str(&params, "forcedColors") {
        overrides.insert("forced-colors".to_string(), json!(forced));
    }
    if let Some(contrast) = optional_str(&params, "contrast") {
        overrides.insert("prefers-contrast".to_string(), json!(contrast));
    }
    let media = optional_str(&params, "media").map(str::to_string);
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;
    ctx.session
        .send_bidi_command(
            "script.callFunction",
            json!({
                "functionDeclaration": EMULATE_MEDIA_JS,
                "arguments": [json!({ "overrides": Value::Object(overrides), "media": media })],
                "target": { "context": context },
                "awaitPromise": false,
            }),
        )
        .await?;
    Ok(json!({ "ok": true }))
}

pub async fn set_geolocation(ctx: &CommandContext, params: Value) -> Result<Value> {
    let latitude = required_f64(&params, "latitude")?;
    let longitude = required_f64(&params, "longitude")?;
    let accuracy = params.get("accuracy").and_then(Value::as_f64).unwrap_or(1.0);
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;
    ctx.session
        .send_bidi_command(
            "emulation.setGeolocationOverride",
            json!({
                "contexts": [context],
                "coordinates": { "latitude": latitude, "longitude": longitude, "accuracy": accuracy },
            }),
        )
        .await?;
    Ok(json!({ "ok": true }))
}

pub async fn set_content(ctx: &CommandContext, params: Value) -> Result<Value> {
    let html = required_str(&params, "html")?.to_string();
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;
    ctx.session
        .send_bidi_command(
            "script.callFunction",
            json!({
                "functionDeclaration": "(function(args) { document.open(); document.write(args.html); document.close(); return true; })",
                "arguments": [json!({ "html": html })],
                "target": { "context": context },
                "awaitPromise": false,
            }),
        )
        .await?;
    Ok(json!({ "ok": true }))
}
