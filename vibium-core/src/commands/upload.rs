//! upload — resolves a file input to a BiDi shared reference, then sets
//! its files via `input.setFiles` (spec §4.3 "upload").

use serde_json::{json, Value};

use super::element_params;
use crate::actionability::resolve_forced;
use crate::error::{Result, VibiumError};
use crate::session::Session;
use crate::state::CommandContext;

pub async fn upload(ctx: &CommandContext, params: Value) -> Result<Value> {
    let files: Vec<String> = params
        .get("files")
        .and_then(Value::as_array)
        .ok_or_else(|| VibiumError::validation("missing required parameter: files"))?
        .iter()
        .map(|v| v.as_str().unwrap_or_default().to_string())
        .collect();

    let mut ep = element_params(&params)?;
    if let Some(token) = ep.selector.clone() {
        ep.selector = Some(ctx.state.ref_table.lock().await.expand(&token).into_owned());
    }
    let context = ctx.resolve_context(ep.context.clone()).await?;
    ep.context = Some(context.clone());
    resolve_forced(ctx.session.as_ref(), &ep).await?;

    let selector_literal = serde_json::to_string(ep.selector.as_deref().unwrap_or_default())?;
    let shared_id = ctx
        .session
        .send_bidi_command(
            "script.callFunction",
            json!({
                "functionDeclaration": format!("(function() {{ return document.querySelector({selector_literal}); }})"),
                "arguments": [],
                "target": { "context": context },
                "resultOwnership": "root",
                "awaitPromise": false,
            }),
        )
        .await?;
    let element = shared_id["result"]
        .get("sharedId")
        .cloned()
        .ok_or_else(|| VibiumError::not_found(ep.describe()))?;

    ctx.session
        .send_bidi_command(
            "input.setFiles",
            json!({ "context": context, "element": { "sharedId": element }, "files": files }),
        )
        .await?;
    Ok(json!({ "ok": true }))
}
