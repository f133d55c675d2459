//! cookies get/set/delete, storage-state/restore-storage (spec §4.3).

use serde_json::{json, Value};

use super::{optional_str, required_str};
use crate::error::Result;
use crate::session::Session;
use crate::state::CommandContext;

fn partition(context: &str) -> Value {
    json!({ "type": "context", "context": context })
}

pub async fn cookies_get(ctx: &CommandContext, params: Value) -> Result<Value> {
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;
    let result = ctx
        .session
        .send_bidi_command("storage.getCookies", json!({ "partition": partition(&context) }))
        .await?;
    Ok(json!({ "cookies": result["cookies"].clone() }))
}

pub async fn cookies_set(ctx: &CommandContext, params: Value) -> Result<Value> {
    let name = required_str(&params, "name")?.to_string();
    let value = required_str(&params, "value")?.to_string();
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;
    let mut cookie = json!({
        "name": name,
        "value": { "type": "string", "value": value },
    });
    if let Some(domain) = optional_str(&params, "domain") {
        cookie["domain"] = json!(domain);
    }
    if let Some(path) = optional_str(&params, "path") {
        cookie["path"] = json!(path);
    }
    ctx.session
        .send_bidi_command(
            "storage.setCookie",
            json!({ "cookie": cookie, "partition": partition(&context) }),
        )
        .await?;
    Ok(json!({ "ok": true }))
}

pub async fn cookies_delete(ctx: &CommandContext, params: Value) -> Result<Value> {
    let name = required_str(&params, "name")?.to_string();
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;
    ctx.session
        .send_bidi_command(
            "storage.deleteCookies",
            json!({ "filter": { "name": name }, "partition": partition(&context) }),
        )
        .await?;
    Ok(json!({ "ok": true }))
}

const STORAGE_SNAPSHOT_JS: &str = r#"
(function() {
  function dump(storage) {
    const out = {};
    for (let i = 0; i < storage.length; i++) {
      const key = storage.key(i);
      out[key] = storage.getItem(key);
    }
    return out;
  }
  return { origin: location.origin, localStorage: dump(window.localStorage), sessionStorage: dump(window.sessionStorage) };
})
"#;

const STORAGE_RESTORE_JS: &str = r#"
(function(args) {
  function restore(storage, entries) {
    storage.clear();
    for (const key of Object.keys(entries || {})) storage.setItem(key, entries[key]);
  }
  restore(window.localStorage, args.localStorage);
  restore(window.sessionStorage, args.sessionStorage);
  return true;
})
"#;

/// Exports cookies plus per-origin `localStorage`/`sessionStorage` as one
/// JSON document (spec §4.3 "storage-state").
pub async fn storage_state(ctx: &CommandContext, params: Value) -> Result<Value> {
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;
    let cookies = ctx
        .session
        .send_bidi_command("storage.getCookies", json!({ "partition": partition(&context) }))
        .await?;
    let storage = ctx
        .session
        .send_bidi_command(
            "script.callFunction",
            json!({
                "functionDeclaration": STORAGE_SNAPSHOT_JS,
                "arguments": [],
                "target": { "context": context },
                "awaitPromise": false,
            }),
        )
        .await?;
    Ok(json!({
        "cookies": cookies["cookies"].clone(),
        "origins": [storage["result"]["value"].clone()],
    }))
}

/// Re-hydrates a document previously produced by [`storage_state`].
pub async fn restore_storage(ctx: &CommandContext, params: Value) -> Result<Value> {
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;
    if let Some(cookies) = params.get("cookies").and_then(Value::as_array) {
        for cookie in cookies {
            ctx.session
                .send_bidi_command(
                    "storage.setCookie",
                    json!({ "cookie": cookie, "partition": partition(&context) }),
                )
                .await?;
        }
    }
    if let Some(origins) = params.get("origins").and_then(Value::as_array) {
        if let Some(first) = origins.first() {
            ctx.session
                .send_bidi_command(
                    "script.callFunction",
                    json!({
                        "functionDeclaration": STORAGE_RESTORE_JS,
                        "arguments": [first.clone()],
                        "target": { "context": context },
                        "awaitPromise": false,
                    }),
                )
                .await?;
        }
    }
    Ok(json!({ "ok": true }))
}
