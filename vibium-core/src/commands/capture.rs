//! screenshot, pdf, highlight (spec §4.3).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Value};

use super::{element_params, optional_str};
use crate::config::HIGHLIGHT_DURATION;
use crate::error::{Result, VibiumError};
use crate::session::Session;
use crate::state::CommandContext;

/// File-save commands take a filename but only ever use its basename, to
/// defeat path traversal (spec §4.3 "screenshot": "file save uses basename
/// only to defeat path traversal").
fn safe_basename(filename: &str) -> PathBuf {
    Path::new(filename)
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("capture"))
}

/// Resolves a save path against the configured screenshot directory,
/// failing validation *before* any capture happens when none is set (spec
/// §8 boundary behavior).
async fn save_path(ctx: &CommandContext, filename: &str) -> Result<PathBuf> {
    let dir = ctx
        .state
        .screenshot_dir
        .lock()
        .await
        .clone()
        .ok_or_else(|| VibiumError::validation("no screenshot directory configured"))?;
    Ok(dir.join(safe_basename(filename)))
}

async fn annotate_refs(ctx: &CommandContext, context: &str) -> Result<()> {
    let entries = ctx.state.ref_table.lock().await.clone();
    if entries.is_empty() {
        return Ok(());
    }
    let selectors: Vec<String> = (1..=entries.len() as u32).filter_map(|n| entries.get(n).map(str::to_string)).collect();
    ctx.session
        .send_bidi_command(
            "script.callFunction",
            json!({
                "functionDeclaration": r#"
(function(args) {
  args.selectors.forEach((sel, i) => {
    const el = document.querySelector(sel);
    if (!el) return;
    const rect = el.getBoundingClientRect();
    const badge = document.createElement('div');
    badge.className = '__vibium_ref_badge';
    badge.textContent = String(i + 1);
    badge.style.cssText = 'position:fixed;z-index:2147483647;background:red;color:white;font:10px monospace;padding:1px 3px;border-radius:2px;left:' + rect.x + 'px;top:' + rect.y + 'px;';
    document.body.appendChild(badge);
  });
})
"#,
                "arguments": [json!({ "selectors": selectors })],
                "target": { "context": context },
                "awaitPromise": false,
            }),
        )
        .await?;
    Ok(())
}

async fn remove_ref_annotations(ctx: &CommandContext, context: &str) -> Result<()> {
    ctx.session
        .send_bidi_command(
            "script.callFunction",
            json!({
                "functionDeclaration": "(function() { document.querySelectorAll('.__vibium_ref_badge').forEach(n => n.remove()); })",
                "arguments": [],
                "target": { "context": context },
                "awaitPromise": false,
            }),
        )
        .await?;
    Ok(())
}

pub async fn screenshot(ctx: &CommandContext, params: Value) -> Result<Value> {
    let full_page = params.get("fullPage").and_then(Value::as_bool).unwrap_or(false);
    let annotate = params.get("annotate").and_then(Value::as_bool).unwrap_or(false);
    let filename = optional_str(&params, "filename");
    let path = match filename {
        Some(f) => Some(save_path(ctx, f).await?),
        None => None,
    };
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;

    if annotate {
        annotate_refs(ctx, &context).await?;
    }

    let result = ctx
        .session
        .send_bidi_command(
            "browsingContext.captureScreenshot",
            json!({ "context": context, "origin": if full_page { "document" } else { "viewport" } }),
        )
        .await;

    if annotate {
        remove_ref_annotations(ctx, &context).await?;
    }
    let result = result?;
    let data = result["data"].as_str().unwrap_or_default().to_string();

    if let Some(path) = path {
        let bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &data)
            .map_err(|e| VibiumError::validation(format!("invalid screenshot data: {e}")))?;
        tokio::fs::write(&path, bytes).await?;
        return Ok(json!({ "saved": path.to_string_lossy() }));
    }
    Ok(json!({ "data": data }))
}

pub async fn pdf(ctx: &CommandContext, params: Value) -> Result<Value> {
    let path = match optional_str(&params, "filename") {
        Some(f) => Some(save_path(ctx, f).await?),
        None => None,
    };
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;
    let result = ctx
        .session
        .send_bidi_command("browsingContext.print", json!({ "context": context }))
        .await?;
    let data = result["data"].as_str().unwrap_or_default().to_string();

    if let Some(path) = path {
        let bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &data)
            .map_err(|e| VibiumError::validation(format!("invalid pdf data: {e}")))?;
        tokio::fs::write(&path, bytes).await?;
        return Ok(json!({ "saved": path.to_string_lossy() }));
    }
    Ok(json!({ "data": data }))
}

pub async fn highlight(ctx: &CommandContext, params: Value) -> Result<Value> {
    let mut ep = element_params(&params)?;
    let context = ctx.resolve_context(ep.context.clone()).await?;
    ep.context = Some(context.clone());
    let selector = ep.selector.clone().unwrap_or_default();
    let selector = ctx.state.ref_table.lock().await.expand(&selector).into_owned();
    ctx.session
        .send_bidi_command(
            "script.callFunction",
            json!({
                "functionDeclaration": r#"
(function(args) {
  const el = document.querySelector(args.selector);
  if (!el) return false;
  const prev = el.style.outline;
  el.style.outline = '2px solid red';
  setTimeout(() => { el.style.outline = prev; }, args.durationMs);
  return true;
})
"#,
                "arguments": [json!({ "selector": selector, "durationMs": HIGHLIGHT_DURATION.as_millis() as u64 })],
                "target": { "context": context },
                "awaitPromise": false,
            }),
        )
        .await?;
    Ok(json!({ "ok": true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MockSession;
    use crate::state::SessionState;

    #[test]
    fn safe_basename_strips_directory_components() {
        assert_eq!(safe_basename("../../etc/passwd"), PathBuf::from("passwd"));
        assert_eq!(safe_basename("shot.png"), PathBuf::from("shot.png"));
    }

    #[tokio::test]
    async fn screenshot_with_filename_and_no_directory_fails_before_capture() {
        let session = Arc::new(MockSession::repeating(json!({ "data": "Zg==" })));
        let state = Arc::new(SessionState::new());
        let ctx = CommandContext::new(session.clone() as Arc<dyn Session>, state);

        let err = screenshot(&ctx, json!({ "filename": "shot.png" })).await.unwrap_err();
        assert_eq!(err.kind(), "validation error");
        assert!(session.sent.lock().await.is_empty(), "must fail before any BiDi call");
    }

    #[tokio::test]
    async fn screenshot_with_configured_directory_saves_under_its_basename() {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(MockSession::repeating(json!({ "data": "aGVsbG8=" })));
        let state = Arc::new(SessionState::with_screenshot_dir(Some(dir.path().to_path_buf())));
        let ctx = CommandContext::new(session as Arc<dyn Session>, state);

        let result = screenshot(&ctx, json!({ "filename": "../../etc/shot.png" })).await.unwrap();
        let saved = result["saved"].as_str().unwrap();
        assert_eq!(Path::new(saved), dir.path().join("shot.png"));
        assert!(tokio::fs::try_exists(saved).await.unwrap());
    }
}
