//! find/find-all/map/diff-map/a11y-tree, text/html/value/attribute
//! getters, is-visible/is-enabled/is-checked, count, wait, wait-for-text,
//! wait-for-fn (spec §4.3).

use std::time::{Duration, Instant};

use itertools::Itertools;
use serde_json::{json, Value};

use super::{element_params, optional_str, optional_u64, required_str};
use crate::actionability::resolve;
use crate::config::POLL_INTERVAL;
use crate::error::{Result, VibiumError};
use crate::locator::{matrix_for, ActionKind, Check};
use crate::session::Session;
use crate::state::CommandContext;

async fn eval(ctx: &CommandContext, context: &str, function: &str, args: Value) -> Result<Value> {
    let result = ctx
        .session
        .send_bidi_command(
            "script.callFunction",
            json!({
                "functionDeclaration": function,
                "arguments": [args],
                "target": { "context": context },
                "awaitPromise": false,
            }),
        )
        .await?;
    Ok(result["result"]["value"].clone())
}

pub async fn find(ctx: &CommandContext, params: Value) -> Result<Value> {
    let mut ep = element_params(&params)?;
    let context = ctx.resolve_context(ep.context.clone()).await?;
    ep.context = Some(context);
    let checks = if ep.force { &[][..] } else { matrix_for(ActionKind::PointerOrKeyboard) };
    let info = resolve(ctx.session.as_ref(), &ep, checks).await?;
    let selector = ep.selector.clone().unwrap_or_else(|| ep.describe());
    ctx.state.ref_table.lock().await.install(vec![selector.clone()]);
    Ok(json!({ "selector": selector, "tag": info.tag, "text": info.text, "box": info.box_ }))
}

pub async fn find_all(ctx: &CommandContext, params: Value) -> Result<Value> {
    let selector = required_str(&params, "selector")?.to_string();
    let limit = optional_u64(&params, "limit", 10) as usize;
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;
    let result = eval(
        ctx,
        &context,
        r#"
(function(args) {
  const nodes = Array.from(document.querySelectorAll(args.selector)).slice(0, args.limit);
  return nodes.map((n, i) => ({
    selector: args.selector + ':nth-of-type(' + (i + 1) + ')',
    tag: n.tagName.toLowerCase(),
    label: (n.textContent || '').trim().slice(0, 60),
  }));
})
"#,
        json!({ "selector": selector, "limit": limit }),
    )
    .await?;
    let entries: Vec<Value> = result.as_array().cloned().unwrap_or_default();
    let selectors: Vec<String> = entries
        .iter()
        .map(|e| e["selector"].as_str().unwrap_or_default().to_string())
        .collect();
    ctx.state.ref_table.lock().await.install(selectors);
    Ok(json!({ "entries": entries }))
}

const MAP_SCRIPT: &str = r#"
(function(args) {
  const root = args.scope ? document.querySelector(args.scope) : document;
  if (!root) return [];
  const INTERACTIVE_ROLES = new Set(['tab', 'menuitem', 'switch']);
  function isInteractive(el) {
    const tag = el.tagName.toLowerCase();
    if (tag === 'a' || tag === 'button' || tag === 'input' || tag === 'select' || tag === 'summary' || tag === 'details') return true;
    const role = el.getAttribute('role');
    if (role && INTERACTIVE_ROLES.has(role)) return true;
    if (el.onclick) return true;
    const tabindex = el.getAttribute('tabindex');
    if (tabindex !== null && parseInt(tabindex, 10) > 0) return true;
    return false;
  }
  const seen = new Set();
  const out = [];
  const walker = document.createTreeWalker(root === document ? document.documentElement : root, NodeFilter.SHOW_ELEMENT);
  let node = walker.currentNode;
  while (node) {
    if (node.nodeType === 1 && isInteractive(node)) {
      const rect = node.getBoundingClientRect();
      if (rect.width > 0 && rect.height > 0) {
        const selector = node.tagName.toLowerCase() + (node.id ? '#' + node.id : '');
        if (!seen.has(selector)) {
          seen.add(selector);
          out.push({ selector, tag: node.tagName.toLowerCase(), label: (node.textContent || '').trim().slice(0, 60) });
        }
      }
    }
    node = walker.nextNode();
  }
  return out;
})
"#;

fn format_map(entries: &[Value]) -> String {
    entries
        .iter()
        .map(|e| {
            format!(
                "{} {} {}",
                e["selector"].as_str().unwrap_or_default(),
                e["tag"].as_str().unwrap_or_default(),
                e["label"].as_str().unwrap_or_default()
            )
        })
        .join("\n")
}

pub async fn map(ctx: &CommandContext, params: Value) -> Result<Value> {
    let scope = optional_str(&params, "scope");
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;
    let result = eval(ctx, &context, MAP_SCRIPT, json!({ "scope": scope })).await?;
    let entries: Vec<Value> = result.as_array().cloned().unwrap_or_default();
    let selectors: Vec<String> = entries
        .iter()
        .map(|e| e["selector"].as_str().unwrap_or_default().to_string())
        .collect();
    ctx.state.ref_table.lock().await.install(selectors);
    let output = format_map(&entries);
    *ctx.state.last_map.lock().await = Some(output.clone());
    Ok(json!({ "entries": entries, "output": output }))
}

pub async fn diff_map(ctx: &CommandContext, params: Value) -> Result<Value> {
    let previous = ctx
        .state
        .last_map
        .lock()
        .await
        .clone()
        .ok_or_else(|| VibiumError::validation("diff-map has no previous map to compare against"))?;
    let current = map(ctx, params).await?;
    let current_output = current["output"].as_str().unwrap_or_default();
    let diff = diff_lines(&previous, current_output);
    Ok(json!({ "diff": diff }))
}

fn diff_lines(before: &str, after: &str) -> Vec<String> {
    let before_lines: Vec<&str> = before.lines().collect();
    let after_lines: Vec<&str> = after.lines().collect();
    let mut out = Vec::new();
    for line in &before_lines {
        if !after_lines.contains(line) {
            out.push(format!("-{line}"));
        }
    }
    for line in &after_lines {
        if !before_lines.contains(line) {
            out.push(format!("+{line}"));
        }
    }
    out
}

const A11Y_TREE_SCRIPT: &str = r#"
(function(args) {
  function roleOf(el) {
    const explicit = el.getAttribute('role');
    if (explicit) return explicit;
    const tag = el.tagName.toLowerCase();
    if (tag === 'button') return 'button';
    if (tag === 'a' && el.hasAttribute('href')) return 'link';
    if (tag === 'input') return 'textbox';
    return 'generic';
  }
  function nameOf(el) {
    return (el.getAttribute('aria-label') || el.textContent || '').trim().slice(0, 80);
  }
  function build(el) {
    const role = roleOf(el);
    const name = nameOf(el);
    const children = Array.from(el.children).map(build).filter(Boolean);
    if (!args.everything && (role === 'none' || role === 'presentation' || role === 'generic') && !name) {
      return children.length === 1 ? children[0] : (children.length ? { role: 'generic', name: '', children } : null);
    }
    return { role, name, children };
  }
  return build(document.body);
})
"#;

pub async fn a11y_tree(ctx: &CommandContext, params: Value) -> Result<Value> {
    let everything = params.get("everything").and_then(Value::as_bool).unwrap_or(false);
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;
    eval(ctx, &context, A11Y_TREE_SCRIPT, json!({ "everything": everything })).await
}

async fn getter(ctx: &CommandContext, params: Value, kind: Check, expression: &str) -> Result<Value> {
    let mut ep = element_params(&params)?;
    let context = ctx.resolve_context(ep.context.clone()).await?;
    ep.context = Some(context.clone());
    let checks: &[Check] = &[kind];
    resolve(ctx.session.as_ref(), &ep, checks).await?;
    let selector = ctx.state.ref_table.lock().await.expand(ep.selector.as_deref().unwrap_or_default()).into_owned();
    eval(ctx, &context, expression, json!({ "selector": selector })).await
}

pub async fn get_text(ctx: &CommandContext, params: Value) -> Result<Value> {
    getter(
        ctx,
        params,
        Check::Visible,
        "(function(args) { const el = document.querySelector(args.selector); return el ? el.textContent.trim() : null; })",
    )
    .await
}

pub async fn get_html(ctx: &CommandContext, params: Value) -> Result<Value> {
    let outer = params.get("outer").and_then(Value::as_bool).unwrap_or(false);
    let expression = if outer {
        "(function(args) { const el = document.querySelector(args.selector); return el ? el.outerHTML : null; })"
    } else {
        "(function(args) { const el = document.querySelector(args.selector); return el ? el.innerHTML : null; })"
    };
    getter(ctx, params, Check::Visible, expression).await
}

pub async fn get_value(ctx: &CommandContext, params: Value) -> Result<Value> {
    getter(
        ctx,
        params,
        Check::Visible,
        "(function(args) { const el = document.querySelector(args.selector); return el ? el.value : null; })",
    )
    .await
}

pub async fn get_attribute(ctx: &CommandContext, params: Value) -> Result<Value> {
    let attr = required_str(&params, "attr")?.to_string();
    let mut ep = element_params(&params)?;
    let context = ctx.resolve_context(ep.context.clone()).await?;
    ep.context = Some(context.clone());
    resolve(ctx.session.as_ref(), &ep, &[Check::Visible]).await?;
    let selector = ctx.state.ref_table.lock().await.expand(ep.selector.as_deref().unwrap_or_default()).into_owned();
    eval(
        ctx,
        &context,
        "(function(args) { const el = document.querySelector(args.selector); return el ? el.getAttribute(args.attr) : null; })",
        json!({ "selector": selector, "attr": attr }),
    )
    .await
}

/// `is-visible` returns `false` rather than an error on not-found (spec
/// §4.3).
pub async fn is_visible(ctx: &CommandContext, params: Value) -> Result<Value> {
    let mut ep = element_params(&params)?;
    let context = ctx.resolve_context(ep.context.clone()).await?;
    ep.context = Some(context);
    match resolve(ctx.session.as_ref(), &ep, &[Check::Visible]).await {
        Ok(_) => Ok(json!(true)),
        Err(_) => Ok(json!(false)),
    }
}

pub async fn is_enabled(ctx: &CommandContext, params: Value) -> Result<Value> {
    let mut ep = element_params(&params)?;
    let context = ctx.resolve_context(ep.context.clone()).await?;
    ep.context = Some(context);
    Ok(json!(resolve(ctx.session.as_ref(), &ep, &[Check::Enabled]).await.is_ok()))
}

pub async fn is_checked(ctx: &CommandContext, params: Value) -> Result<Value> {
    let ep = element_params(&params)?;
    let context = ctx.resolve_context(ep.context.clone()).await?;
    let selector = ctx.state.ref_table.lock().await.expand(ep.selector.as_deref().unwrap_or_default()).into_owned();
    eval(
        ctx,
        &context,
        "(function(args) { const el = document.querySelector(args.selector); return el ? !!el.checked : false; })",
        json!({ "selector": selector }),
    )
    .await
}

pub async fn count(ctx: &CommandContext, params: Value) -> Result<Value> {
    let selector = required_str(&params, "selector")?.to_string();
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;
    eval(
        ctx,
        &context,
        "(function(args) { return document.querySelectorAll(args.selector).length; })",
        json!({ "selector": selector }),
    )
    .await
}

pub async fn wait(ctx: &CommandContext, params: Value) -> Result<Value> {
    let state = required_str(&params, "state")?.to_string();
    let timeout_ms = optional_u64(&params, "timeout", 30_000);
    let mut ep = element_params(&params)?;
    ep.timeout_ms = timeout_ms;
    let context = ctx.resolve_context(ep.context.clone()).await?;
    ep.context = Some(context);
    let checks: &[Check] = match state.as_str() {
        "visible" => &[Check::Visible],
        "hidden" | "attached" => &[],
        other => return Err(VibiumError::validation(format!("unknown wait state: {other}"))),
    };
    if state == "hidden" {
        let deadline = Instant::now() + ep.timeout();
        loop {
            match resolve(ctx.session.as_ref(), &ep, &[Check::Visible]).await {
                Err(VibiumError::NotFound { .. }) => return Ok(json!({ "ok": true })),
                Err(VibiumError::Timeout { .. }) => return Ok(json!({ "ok": true })),
                _ if Instant::now() >= deadline => {
                    return Err(VibiumError::timeout(ep.timeout(), Some("hidden".into()), None))
                }
                _ => tokio::time::sleep(POLL_INTERVAL).await,
            }
        }
    }
    resolve(ctx.session.as_ref(), &ep, checks).await?;
    Ok(json!({ "ok": true }))
}

pub async fn wait_for_text(ctx: &CommandContext, params: Value) -> Result<Value> {
    let text = required_str(&params, "text")?.to_string();
    let timeout_ms = optional_u64(&params, "timeout", 30_000);
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;
    let started = Instant::now();
    let deadline = started + Duration::from_millis(timeout_ms);
    loop {
        let body = eval(
            ctx,
            &context,
            "(function() { return document.body ? document.body.innerText : ''; })",
            json!({}),
        )
        .await?;
        if body.as_str().unwrap_or_default().contains(&text) {
            return Ok(json!({ "ok": true }));
        }
        if Instant::now() >= deadline {
            return Err(VibiumError::timeout(started.elapsed(), None, Some(format!("text never appeared: {text}"))));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// The three outcomes a polled `wait-for-fn` expression can settle into.
/// `wait-for-fn` succeeds only on [`JsTruthiness::Value`] — `Null` and
/// `Empty` both mean "not yet" and keep polling.
enum JsTruthiness {
    Null,
    Empty,
    Value(Value),
}

fn classify(value: Value) -> JsTruthiness {
    match &value {
        Value::Null => JsTruthiness::Null,
        Value::String(s) if s.is_empty() => JsTruthiness::Empty,
        _ => JsTruthiness::Value(value),
    }
}

/// Polls `expression` until it evaluates to a non-null, non-empty-string
/// value (spec §4.3 "wait-for-fn").
pub async fn wait_for_fn(ctx: &CommandContext, params: Value) -> Result<Value> {
    let expression = required_str(&params, "expression")?.to_string();
    let timeout_ms = optional_u64(&params, "timeout", 30_000);
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;
    let started = Instant::now();
    let deadline = started + Duration::from_millis(timeout_ms);
    loop {
        let raw = eval(ctx, &context, &format!("(function() {{ return ({expression}); }})"), json!({})).await?;
        if let JsTruthiness::Value(value) = classify(raw) {
            return Ok(json!({ "ok": true, "value": value }));
        }
        if Instant::now() >= deadline {
            return Err(VibiumError::timeout(started.elapsed(), None, Some(format!("{expression} never resolved"))));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_lines_reports_additions_and_removals() {
        let before = "a\nb";
        let after = "b\nc";
        let diff = diff_lines(before, after);
        assert!(diff.contains(&"-a".to_string()));
        assert!(diff.contains(&"+c".to_string()));
        assert!(!diff.iter().any(|l| l == "-b" || l == "+b"));
    }

    #[test]
    fn format_map_joins_fields() {
        let entries = vec![json!({ "selector": "a#x", "tag": "a", "label": "Link" })];
        assert_eq!(format_map(&entries), "a#x a Link");
    }
}
