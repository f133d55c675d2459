//! navigate, back/forward/reload, url/title/content, wait-for-url,
//! wait-for-load, sleep (spec §4.3).

use std::time::{Duration, Instant};

use serde_json::{json, Value};

use super::{optional_str, required_str};
use crate::config::{MAX_SLEEP, POLL_INTERVAL, POST_TRAVERSAL_LOAD_TIMEOUT};
use crate::error::{Result, VibiumError};
use crate::session::Session;
use crate::state::CommandContext;

fn wait_param(params: &Value) -> &str {
    optional_str(params, "wait").unwrap_or("complete")
}

async fn wait_readystate(ctx: &CommandContext, context: &str, wait: &str, timeout: Duration) -> Result<()> {
    if wait == "none" {
        return Ok(());
    }
    let started = Instant::now();
    let deadline = started + timeout;
    loop {
        let state = ctx
            .session
            .send_bidi_command(
                "script.callFunction",
                json!({
                    "functionDeclaration": "(function() { return document.readyState; })",
                    "arguments": [],
                    "target": { "context": context },
                    "awaitPromise": false,
                }),
            )
            .await?;
        let current = state["result"]["value"].as_str().unwrap_or("loading");
        if readystate_satisfies(current, wait) {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(VibiumError::timeout(
                started.elapsed(),
                Some("readyState".to_string()),
                Some(format!("document.readyState never reached {wait}")),
            ));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// `loading < interactive < complete` (spec §4.3 "wait-for-load": "polls
/// `document.readyState` against an order loading < interactive <
/// complete").
fn readystate_satisfies(current: &str, wanted: &str) -> bool {
    fn rank(s: &str) -> u8 {
        match s {
            "loading" => 0,
            "interactive" => 1,
            "complete" => 2,
            _ => 0,
        }
    }
    rank(current) >= rank(wanted)
}

pub async fn navigate(ctx: &CommandContext, params: Value) -> Result<Value> {
    let url = required_str(&params, "url")?;
    let wait = wait_param(&params).to_string();
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;
    ctx.session
        .send_bidi_command(
            "browsingContext.navigate",
            json!({ "context": context, "url": url, "wait": "none" }),
        )
        .await?;
    wait_readystate(ctx, &context, &wait, POST_TRAVERSAL_LOAD_TIMEOUT).await?;
    Ok(json!({ "ok": true }))
}

async fn traverse(ctx: &CommandContext, params: Value, delta: i64) -> Result<Value> {
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;
    ctx.session
        .send_bidi_command("browsingContext.traverseHistory", json!({ "context": context, "delta": delta }))
        .await?;
    wait_readystate(ctx, &context, "complete", POST_TRAVERSAL_LOAD_TIMEOUT).await?;
    Ok(json!({ "ok": true }))
}

pub async fn back(ctx: &CommandContext, params: Value) -> Result<Value> {
    traverse(ctx, params, -1).await
}

pub async fn forward(ctx: &CommandContext, params: Value) -> Result<Value> {
    traverse(ctx, params, 1).await
}

pub async fn reload(ctx: &CommandContext, params: Value) -> Result<Value> {
    let wait = wait_param(&params).to_string();
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;
    ctx.session
        .send_bidi_command("browsingContext.reload", json!({ "context": context, "wait": "none" }))
        .await?;
    wait_readystate(ctx, &context, &wait, POST_TRAVERSAL_LOAD_TIMEOUT).await?;
    Ok(json!({ "ok": true }))
}

async fn eval_string(ctx: &CommandContext, context: &str, expression: &str) -> Result<String> {
    let result = ctx
        .session
        .send_bidi_command(
            "script.callFunction",
            json!({
                "functionDeclaration": format!("(function() {{ return {expression}; }})"),
                "arguments": [],
                "target": { "context": context },
                "awaitPromise": false,
            }),
        )
        .await?;
    Ok(result["result"]["value"].as_str().unwrap_or_default().to_string())
}

pub async fn url(ctx: &CommandContext, params: Value) -> Result<Value> {
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;
    Ok(json!(eval_string(ctx, &context, "location.href").await?))
}

pub async fn title(ctx: &CommandContext, params: Value) -> Result<Value> {
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;
    Ok(json!(eval_string(ctx, &context, "document.title").await?))
}

pub async fn content(ctx: &CommandContext, params: Value) -> Result<Value> {
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;
    Ok(json!(eval_string(ctx, &context, "document.documentElement.outerHTML").await?))
}

fn glob_match(pattern: &str, value: &str) -> bool {
    if !pattern.contains('*') {
        return value == pattern || value.contains(pattern);
    }
    let parts: Vec<&str> = pattern.split('*').collect();
    let mut rest = value;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        match rest.find(part) {
            Some(pos) => {
                if i == 0 && pos != 0 {
                    return false;
                }
                rest = &rest[pos + part.len()..];
            }
            None => return false,
        }
    }
    true
}

pub async fn wait_for_url(ctx: &CommandContext, params: Value) -> Result<Value> {
    let pattern = required_str(&params, "pattern")?.to_string();
    let timeout_ms = super::optional_u64(&params, "timeout", 30_000);
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;
    let started = Instant::now();
    let deadline = started + Duration::from_millis(timeout_ms);
    loop {
        let current = eval_string(ctx, &context, "location.href").await?;
        if glob_match(&pattern, &current) {
            return Ok(json!({ "ok": true, "url": current }));
        }
        if Instant::now() >= deadline {
            return Err(VibiumError::timeout(
                started.elapsed(),
                None,
                Some(format!("url never matched {pattern}")),
            ));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

pub async fn wait_for_load(ctx: &CommandContext, params: Value) -> Result<Value> {
    let state = optional_str(&params, "state").unwrap_or("complete").to_string();
    let timeout_ms = super::optional_u64(&params, "timeout", 30_000);
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;
    wait_readystate(ctx, &context, &state, Duration::from_millis(timeout_ms)).await?;
    Ok(json!({ "ok": true }))
}

pub async fn sleep(_ctx: &CommandContext, params: Value) -> Result<Value> {
    let ms = super::required_u64(&params, "ms")?;
    let capped = Duration::from_millis(ms).min(MAX_SLEEP);
    tokio::time::sleep(capped).await;
    Ok(json!({ "ok": true }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readystate_order_is_monotonic() {
        assert!(readystate_satisfies("complete", "interactive"));
        assert!(!readystate_satisfies("loading", "complete"));
        assert!(readystate_satisfies("interactive", "interactive"));
    }

    #[test]
    fn glob_star_matches_prefix_and_suffix() {
        assert!(glob_match("https://*.example.com/*", "https://app.example.com/dash"));
        assert!(!glob_match("https://*.example.com/*", "https://other.com/dash"));
    }

    #[test]
    fn plain_pattern_matches_by_substring() {
        assert!(glob_match("example.com", "https://example.com/path"));
    }
}
