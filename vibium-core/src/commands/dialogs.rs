//! dialog-accept/dialog-dismiss (spec §4.3).

use serde_json::{json, Value};

use super::optional_str;
use crate::error::Result;
use crate::session::Session;
use crate::state::CommandContext;

pub async fn dialog_accept(ctx: &CommandContext, params: Value) -> Result<Value> {
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;
    let mut handle_params = json!({ "context": context, "accept": true });
    if let Some(text) = optional_str(&params, "text") {
        handle_params["userText"] = json!(text);
    }
    ctx.session.send_bidi_command("browsingContext.handleUserPrompt", handle_params).await?;
    Ok(json!({ "ok": true }))
}

pub async fn dialog_dismiss(ctx: &CommandContext, params: Value) -> Result<Value> {
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;
    ctx.session
        .send_bidi_command("browsingContext.handleUserPrompt", json!({ "context": context, "accept": false }))
        .await?;
    Ok(json!({ "ok": true }))
}
