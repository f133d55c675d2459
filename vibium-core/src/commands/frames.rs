//! frames list/find (spec §4.3).

use serde_json::{json, Value};

use crate::error::{Result, VibiumError};
use crate::session::Session;
use crate::state::CommandContext;

async fn frame_name(ctx: &CommandContext, context: &str) -> Result<String> {
    let result = ctx
        .session
        .send_bidi_command(
            "script.callFunction",
            json!({
                "functionDeclaration": "(function() { return window.name || ''; })",
                "arguments": [],
                "target": { "context": context },
                "awaitPromise": false,
            }),
        )
        .await;
    Ok(result.ok().and_then(|r| r["result"]["value"].as_str().map(str::to_string)).unwrap_or_default())
}

async fn flatten_contexts(ctx: &CommandContext) -> Result<Vec<Value>> {
    let result = ctx.session.send_bidi_command("browsingContext.getTree", json!({})).await?;
    let mut out = Vec::new();
    fn walk(node: &Value, out: &mut Vec<Value>) {
        out.push(node.clone());
        if let Some(children) = node["children"].as_array() {
            for child in children {
                walk(child, out);
            }
        }
    }
    if let Some(contexts) = result["contexts"].as_array() {
        for c in contexts {
            walk(c, &mut out);
        }
    }
    Ok(out)
}

pub async fn list(ctx: &CommandContext, _params: Value) -> Result<Value> {
    let contexts = flatten_contexts(ctx).await?;
    let mut entries = Vec::new();
    for c in &contexts {
        let context_id = c["context"].as_str().unwrap_or_default().to_string();
        let name = frame_name(ctx, &context_id).await?;
        entries.push(json!({
            "context": context_id,
            "url": c["url"],
            "name": name,
        }));
    }
    Ok(json!({ "frames": entries }))
}

/// Finds a child context by `window.name` first, falling back to a URL
/// substring match (spec §4.3 "frames find").
pub async fn find(ctx: &CommandContext, params: Value) -> Result<Value> {
    let query = super::required_str(&params, "query")?.to_string();
    let contexts = flatten_contexts(ctx).await?;

    for c in &contexts {
        let context_id = c["context"].as_str().unwrap_or_default().to_string();
        if frame_name(ctx, &context_id).await? == query {
            return Ok(json!({ "context": context_id, "url": c["url"] }));
        }
    }
    for c in &contexts {
        if c["url"].as_str().unwrap_or_default().contains(&query) {
            return Ok(json!({ "context": c["context"], "url": c["url"] }));
        }
    }
    Err(VibiumError::not_found(format!("frame matching {query}")))
}
