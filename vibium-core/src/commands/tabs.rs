//! tabs new/list/switch/close (spec §4.3).

use serde_json::{json, Value};

use super::optional_str;
use crate::error::{Result, VibiumError};
use crate::session::Session;
use crate::state::CommandContext;

pub async fn new(ctx: &CommandContext, params: Value) -> Result<Value> {
    let mut create_params = json!({ "type": "tab" });
    if let Some(url) = optional_str(&params, "url") {
        create_params["url"] = json!(url);
    }
    let result = ctx.session.send_bidi_command("browsingContext.create", create_params).await?;
    let context = result["context"].as_str().unwrap_or_default().to_string();
    ctx.session.set_context_id(Some(context.clone())).await;
    Ok(json!({ "context": context }))
}

pub async fn list(ctx: &CommandContext, _params: Value) -> Result<Value> {
    let result = ctx.session.send_bidi_command("browsingContext.getTree", json!({})).await?;
    let tabs: Vec<Value> = result["contexts"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .map(|c| json!({ "context": c["context"], "url": c["url"] }))
        .collect();
    Ok(json!({ "tabs": tabs }))
}

pub async fn switch(ctx: &CommandContext, params: Value) -> Result<Value> {
    let context = if let Some(context) = optional_str(&params, "context") {
        context.to_string()
    } else if let Some(index) = params.get("index").and_then(Value::as_u64) {
        let result = ctx.session.send_bidi_command("browsingContext.getTree", json!({})).await?;
        let tabs = result["contexts"].as_array().cloned().unwrap_or_default();
        let n = tabs.len();
        let entry = tabs.get(index as usize).ok_or_else(|| {
            VibiumError::validation(format!("tab index {index} out of range (0–{n})"))
        })?;
        entry["context"].as_str().unwrap_or_default().to_string()
    } else if let Some(url) = optional_str(&params, "url") {
        let result = ctx.session.send_bidi_command("browsingContext.getTree", json!({})).await?;
        let tabs = result["contexts"].as_array().cloned().unwrap_or_default();
        let entry = tabs
            .iter()
            .find(|c| c["url"].as_str().is_some_and(|u| u.contains(url)))
            .ok_or_else(|| VibiumError::validation(format!("no tab matching url: {url}")))?;
        entry["context"].as_str().unwrap_or_default().to_string()
    } else {
        return Err(VibiumError::validation("missing required parameter: context, index, or url"));
    };
    ctx.session
        .send_bidi_command("browsingContext.activate", json!({ "context": context }))
        .await?;
    ctx.session.set_context_id(Some(context)).await;
    Ok(json!({ "ok": true }))
}

pub async fn close(ctx: &CommandContext, params: Value) -> Result<Value> {
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;
    ctx.session
        .send_bidi_command("browsingContext.close", json!({ "context": context.clone() }))
        .await?;
    if ctx.session.context_id().await.as_deref() == Some(context.as_str()) {
        ctx.session.set_context_id(None).await;
    }
    Ok(json!({ "ok": true }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::session::MockSession;
    use crate::state::SessionState;

    use super::*;

    fn ctx_with_tabs() -> (Arc<MockSession>, CommandContext) {
        let session = Arc::new(MockSession::repeating(json!({
            "contexts": [
                { "context": "ctx-0", "url": "https://a.example/" },
                { "context": "ctx-1", "url": "https://b.example/" },
            ]
        })));
        let ctx = CommandContext::new(session.clone() as Arc<dyn Session>, Arc::new(SessionState::new()));
        (session, ctx)
    }

    #[tokio::test]
    async fn switch_by_out_of_range_index_is_a_validation_error() {
        let (_session, ctx) = ctx_with_tabs();
        let err = switch(&ctx, json!({ "index": 5 })).await.unwrap_err();
        assert_eq!(err.kind(), "validation error");
        assert!(err.to_string().contains("tab index 5 out of range (0–2)"));
    }

    #[tokio::test]
    async fn switch_by_in_range_index_activates_that_context() {
        let (_session, ctx) = ctx_with_tabs();
        switch(&ctx, json!({ "index": 1 })).await.unwrap();
        assert_eq!(ctx.session.context_id().await.as_deref(), Some("ctx-1"));
    }

    #[tokio::test]
    async fn switch_by_url_substring_matches() {
        let (_session, ctx) = ctx_with_tabs();
        switch(&ctx, json!({ "url": "b.example" })).await.unwrap();
        assert_eq!(ctx.session.context_id().await.as_deref(), Some("ctx-1"));
    }
}
