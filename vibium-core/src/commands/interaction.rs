//! click/dblclick/hover/tap/type/fill/press/select/check/uncheck/scroll/
//! keys/drag/mouse-* (spec §4.3).

use serde_json::{json, Value};

use super::{element_params, optional_str, optional_u64, required_f64, required_str};
use crate::actionability::{resolve, resolve_forced};
use crate::error::{Result, VibiumError};
use crate::locator::{matrix_for, ActionKind, BoundingBox};
use crate::session::Session;
use crate::state::CommandContext;

fn center(box_: &BoundingBox) -> (f64, f64) {
    (box_.x + box_.width / 2.0, box_.y + box_.height / 2.0)
}

async fn resolve_for(ctx: &CommandContext, params: &Value, kind: ActionKind) -> Result<(String, BoundingBox)> {
    let mut ep = element_params(params)?;
    if let Some(token) = ep.selector.clone() {
        ep.selector = Some(ctx.state.ref_table.lock().await.expand(&token).into_owned());
    }
    let context = ctx.resolve_context(ep.context.clone()).await?;
    ep.context = Some(context.clone());
    let info = if ep.force {
        resolve_forced(ctx.session.as_ref(), &ep).await?
    } else {
        resolve(ctx.session.as_ref(), &ep, matrix_for(kind)).await?
    };
    Ok((context, info.box_))
}

async fn pointer_actions(ctx: &CommandContext, context: &str, actions: Value) -> Result<()> {
    ctx.session
        .send_bidi_command("input.performActions", json!({ "context": context, "actions": actions }))
        .await?;
    Ok(())
}

fn pointer_move_click(x: f64, y: f64, button: u8, clicks: u8) -> Value {
    let mut actions = vec![json!({ "type": "pointerMove", "x": x, "y": y })];
    for _ in 0..clicks {
        actions.push(json!({ "type": "pointerDown", "button": button }));
        actions.push(json!({ "type": "pointerUp", "button": button }));
    }
    json!([{ "type": "pointer", "id": "vibium-mouse", "parameters": { "pointerType": "mouse" }, "actions": actions }])
}

pub async fn click(ctx: &CommandContext, params: Value) -> Result<Value> {
    let (context, box_) = resolve_for(ctx, &params, ActionKind::PointerOrKeyboard).await?;
    let (x, y) = center(&box_);
    pointer_actions(ctx, &context, pointer_move_click(x, y, 0, 1)).await?;
    Ok(json!({ "ok": true }))
}

pub async fn dblclick(ctx: &CommandContext, params: Value) -> Result<Value> {
    let (context, box_) = resolve_for(ctx, &params, ActionKind::PointerOrKeyboard).await?;
    let (x, y) = center(&box_);
    pointer_actions(ctx, &context, pointer_move_click(x, y, 0, 2)).await?;
    Ok(json!({ "ok": true }))
}

pub async fn hover(ctx: &CommandContext, params: Value) -> Result<Value> {
    let (context, box_) = resolve_for(ctx, &params, ActionKind::Hover).await?;
    let (x, y) = center(&box_);
    let actions = json!([{ "type": "pointer", "id": "vibium-mouse", "parameters": { "pointerType": "mouse" }, "actions": [{ "type": "pointerMove", "x": x, "y": y }] }]);
    pointer_actions(ctx, &context, actions).await?;
    Ok(json!({ "ok": true }))
}

pub async fn tap(ctx: &CommandContext, params: Value) -> Result<Value> {
    let (context, box_) = resolve_for(ctx, &params, ActionKind::PointerOrKeyboard).await?;
    let (x, y) = center(&box_);
    let actions = json!([{ "type": "pointer", "id": "vibium-touch", "parameters": { "pointerType": "touch" }, "actions": [
        { "type": "pointerMove", "x": x, "y": y },
        { "type": "pointerDown", "button": 0 },
        { "type": "pointerUp", "button": 0 },
    ] }]);
    pointer_actions(ctx, &context, actions).await?;
    Ok(json!({ "ok": true }))
}

/// Fixed key-combo name table for `press`/`keys` (spec §4.3: "resolves key
/// combos `Mod+Mod+Key` via fixed name table").
fn resolve_key_combo(combo: &str) -> Vec<Value> {
    combo
        .split('+')
        .map(|part| {
            let key = match part {
                "Mod" | "Control" | "Ctrl" => "\u{E009}",
                "Shift" => "\u{E008}",
                "Alt" => "\u{E00A}",
                "Meta" | "Cmd" => "\u{E03D}",
                "Enter" => "\u{E007}",
                "Tab" => "\u{E004}",
                "Escape" | "Esc" => "\u{E00C}",
                "Backspace" => "\u{E003}",
                "Delete" => "\u{E017}",
                "ArrowUp" => "\u{E013}",
                "ArrowDown" => "\u{E015}",
                "ArrowLeft" => "\u{E012}",
                "ArrowRight" => "\u{E014}",
                "Space" => " ",
                other if other.chars().count() == 1 => other,
                other => other,
            };
            json!(key)
        })
        .collect()
}

async fn send_key_sequence(ctx: &CommandContext, context: &str, keys: &[Value]) -> Result<()> {
    let mut actions = Vec::new();
    for key in keys {
        actions.push(json!({ "type": "keyDown", "value": key }));
    }
    for key in keys.iter().rev() {
        actions.push(json!({ "type": "keyUp", "value": key }));
    }
    ctx.session
        .send_bidi_command(
            "input.performActions",
            json!({ "context": context, "actions": [{ "type": "key", "id": "vibium-keyboard", "actions": actions }] }),
        )
        .await?;
    Ok(())
}

pub async fn r#type(ctx: &CommandContext, params: Value) -> Result<Value> {
    let text = required_str(&params, "text")?.to_string();
    let (context, box_) = resolve_for(ctx, &params, ActionKind::PointerOrKeyboard).await?;
    let (x, y) = center(&box_);
    pointer_actions(ctx, &context, pointer_move_click(x, y, 0, 1)).await?;
    for ch in text.chars() {
        send_key_sequence(ctx, &context, &[json!(ch.to_string())]).await?;
    }
    Ok(json!({ "ok": true }))
}

pub async fn fill(ctx: &CommandContext, params: Value) -> Result<Value> {
    let text = required_str(&params, "text")?.to_string();
    let (context, _box) = resolve_for(ctx, &params, ActionKind::Fill).await?;
    let ep = element_params(&params)?;
    let selector = ctx.state.ref_table.lock().await.expand(ep.selector.as_deref().unwrap_or_default()).into_owned();
    ctx.session
        .send_bidi_command(
            "script.callFunction",
            json!({
                "functionDeclaration": r#"
(function(args) {
  const el = document.querySelector(args.selector);
  if (!el) return false;
  const proto = Object.getPrototypeOf(el);
  const setter = Object.getOwnPropertyDescriptor(proto, 'value') && Object.getOwnPropertyDescriptor(proto, 'value').set;
  if (setter) { setter.call(el, args.text); } else { el.value = args.text; }
  el.dispatchEvent(new Event('input', { bubbles: true }));
  el.dispatchEvent(new Event('change', { bubbles: true }));
  return true;
})
"#,
                "arguments": [json!({ "selector": selector, "text": text })],
                "target": { "context": context },
                "awaitPromise": false,
            }),
        )
        .await?;
    Ok(json!({ "ok": true }))
}

pub async fn press(ctx: &CommandContext, params: Value) -> Result<Value> {
    let key = required_str(&params, "key")?.to_string();
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;
    if params.get("ep").is_some() {
        let (click_context, box_) = resolve_for(ctx, &params, ActionKind::PointerOrKeyboard).await?;
        let (x, y) = center(&box_);
        pointer_actions(ctx, &click_context, pointer_move_click(x, y, 0, 1)).await?;
    }
    let keys = resolve_key_combo(&key);
    send_key_sequence(ctx, &context, &keys).await?;
    Ok(json!({ "ok": true }))
}

pub async fn keys(ctx: &CommandContext, params: Value) -> Result<Value> {
    let combo = required_str(&params, "keys")?.to_string();
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;
    let keys = resolve_key_combo(&combo);
    send_key_sequence(ctx, &context, &keys).await?;
    Ok(json!({ "ok": true }))
}

pub async fn select(ctx: &CommandContext, params: Value) -> Result<Value> {
    let value = required_str(&params, "value")?.to_string();
    let (context, _box) = resolve_for(ctx, &params, ActionKind::Select).await?;
    let ep = element_params(&params)?;
    let selector = ctx.state.ref_table.lock().await.expand(ep.selector.as_deref().unwrap_or_default()).into_owned();
    ctx.session
        .send_bidi_command(
            "script.callFunction",
            json!({
                "functionDeclaration": r#"
(function(args) {
  const el = document.querySelector(args.selector);
  if (!el) return false;
  el.value = args.value;
  el.dispatchEvent(new Event('input', { bubbles: true }));
  el.dispatchEvent(new Event('change', { bubbles: true }));
  return true;
})
"#,
                "arguments": [json!({ "selector": selector, "value": value })],
                "target": { "context": context },
                "awaitPromise": false,
            }),
        )
        .await?;
    Ok(json!({ "ok": true }))
}

async fn toggle_check(ctx: &CommandContext, params: Value, want_checked: bool) -> Result<Value> {
    let (context, box_) = resolve_for(ctx, &params, ActionKind::PointerOrKeyboard).await?;
    let ep = element_params(&params)?;
    let selector = ctx.state.ref_table.lock().await.expand(ep.selector.as_deref().unwrap_or_default()).into_owned();
    let state = ctx
        .session
        .send_bidi_command(
            "script.callFunction",
            json!({
                "functionDeclaration": "(function(args) { const el = document.querySelector(args.selector); return el ? !!el.checked : null; })",
                "arguments": [json!({ "selector": selector })],
                "target": { "context": context },
                "awaitPromise": false,
            }),
        )
        .await?;
    let currently_checked = state["result"]["value"].as_bool().unwrap_or(false);
    if currently_checked == want_checked {
        return Ok(json!({ "toggled": false }));
    }
    let (x, y) = center(&box_);
    pointer_actions(ctx, &context, pointer_move_click(x, y, 0, 1)).await?;
    Ok(json!({ "toggled": true }))
}

pub async fn check(ctx: &CommandContext, params: Value) -> Result<Value> {
    toggle_check(ctx, params, true).await
}

pub async fn uncheck(ctx: &CommandContext, params: Value) -> Result<Value> {
    toggle_check(ctx, params, false).await
}

pub async fn scroll(ctx: &CommandContext, params: Value) -> Result<Value> {
    let direction = required_str(&params, "direction")?;
    let amount = optional_u64(&params, "amount", 3) as f64;
    let (dx, dy) = match direction {
        "up" => (0.0, -amount * 120.0),
        "down" => (0.0, amount * 120.0),
        "left" => (-amount * 120.0, 0.0),
        "right" => (amount * 120.0, 0.0),
        other => return Err(VibiumError::validation(format!("unknown scroll direction: {other}"))),
    };
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;
    let (x, y) = if let Some(selector) = optional_str(&params, "selector") {
        let info = crate::actionability::resolve_forced(
            ctx.session.as_ref(),
            &crate::locator::ElementParams {
                selector: Some(ctx.state.ref_table.lock().await.expand(selector).into_owned()),
                context: Some(context.clone()),
                ..Default::default()
            },
        )
        .await?;
        center(&info.box_)
    } else {
        // Fixed fallback center when no element is targeted; a literal
        // (400, 300) doesn't generalize across viewport sizes, so this
        // queries the real one instead.
        let viewport = ctx
            .session
            .send_bidi_command(
                "script.callFunction",
                json!({
                    "functionDeclaration": "(function() { return { x: innerWidth/2, y: innerHeight/2 }; })",
                    "arguments": [],
                    "target": { "context": context },
                    "awaitPromise": false,
                }),
            )
            .await?;
        (
            viewport["result"]["value"]["x"].as_f64().unwrap_or(400.0),
            viewport["result"]["value"]["y"].as_f64().unwrap_or(300.0),
        )
    };
    ctx.session
        .send_bidi_command(
            "input.performActions",
            json!({ "context": context, "actions": [{ "type": "wheel", "id": "vibium-wheel", "actions": [{ "type": "scroll", "x": x, "y": y, "deltaX": dx, "deltaY": dy }] }] }),
        )
        .await?;
    Ok(json!({ "ok": true }))
}

pub async fn scroll_into_view(ctx: &CommandContext, params: Value) -> Result<Value> {
    resolve_for(ctx, &params, ActionKind::ScrollIntoView).await?;
    Ok(json!({ "ok": true }))
}

async fn resolve_selector_box(ctx: &CommandContext, selector: &str, context: &str) -> Result<BoundingBox> {
    let expanded = ctx.state.ref_table.lock().await.expand(selector).into_owned();
    let params = crate::locator::ElementParams {
        selector: Some(expanded),
        context: Some(context.to_string()),
        ..Default::default()
    };
    Ok(crate::actionability::resolve_forced(ctx.session.as_ref(), &params).await?.box_)
}

pub async fn drag(ctx: &CommandContext, params: Value) -> Result<Value> {
    let source = required_str(&params, "source")?.to_string();
    let target = required_str(&params, "target")?.to_string();
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;

    let source_box = resolve_selector_box(ctx, &source, &context).await?;
    let target_box = resolve_selector_box(ctx, &target, &context).await?;
    let (sx, sy) = center(&source_box);
    let (tx, ty) = center(&target_box);

    let actions = json!([{
        "type": "pointer",
        "id": "vibium-drag",
        "parameters": { "pointerType": "mouse" },
        "actions": [
            { "type": "pointerMove", "x": sx, "y": sy },
            { "type": "pointerDown", "button": 0 },
            { "type": "pause", "duration": 100 },
            { "type": "pointerMove", "x": tx, "y": ty, "duration": 200 },
            { "type": "pointerUp", "button": 0 },
        ],
    }]);
    pointer_actions(ctx, &context, actions).await?;
    Ok(json!({ "ok": true }))
}

pub async fn mouse_move(ctx: &CommandContext, params: Value) -> Result<Value> {
    let x = required_f64(&params, "x")?;
    let y = required_f64(&params, "y")?;
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;
    let actions = json!([{ "type": "pointer", "id": "vibium-mouse", "parameters": { "pointerType": "mouse" }, "actions": [{ "type": "pointerMove", "x": x, "y": y }] }]);
    pointer_actions(ctx, &context, actions).await?;
    Ok(json!({ "ok": true }))
}

pub async fn mouse_down(ctx: &CommandContext, params: Value) -> Result<Value> {
    let button = optional_u64(&params, "button", 0) as u8;
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;
    let actions = json!([{ "type": "pointer", "id": "vibium-mouse", "parameters": { "pointerType": "mouse" }, "actions": [{ "type": "pointerDown", "button": button }] }]);
    pointer_actions(ctx, &context, actions).await?;
    Ok(json!({ "ok": true }))
}

pub async fn mouse_up(ctx: &CommandContext, params: Value) -> Result<Value> {
    let button = optional_u64(&params, "button", 0) as u8;
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;
    let actions = json!([{ "type": "pointer", "id": "vibium-mouse", "parameters": { "pointerType": "mouse" }, "actions": [{ "type": "pointerUp", "button": button }] }]);
    pointer_actions(ctx, &context, actions).await?;
    Ok(json!({ "ok": true }))
}

/// `click without coords emits down+up only` (spec §4.3).
pub async fn mouse_click(ctx: &CommandContext, params: Value) -> Result<Value> {
    let button = optional_u64(&params, "button", 0) as u8;
    let context = ctx.resolve_context(optional_str(&params, "context").map(String::from)).await?;
    let actions = match (params.get("x").and_then(Value::as_f64), params.get("y").and_then(Value::as_f64)) {
        (Some(x), Some(y)) => pointer_move_click(x, y, button, 1),
        _ => json!([{ "type": "pointer", "id": "vibium-mouse", "parameters": { "pointerType": "mouse" }, "actions": [
            { "type": "pointerDown", "button": button },
            { "type": "pointerUp", "button": button },
        ] }]),
    };
    pointer_actions(ctx, &context, actions).await?;
    Ok(json!({ "ok": true }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_combo_resolves_modifier_names() {
        let keys = resolve_key_combo("Mod+Shift+Enter");
        assert_eq!(keys.len(), 3);
        assert_eq!(keys[2], json!("\u{E007}"));
    }

    #[test]
    fn center_is_the_midpoint_of_the_box() {
        let box_ = BoundingBox { x: 10.0, y: 20.0, width: 30.0, height: 40.0 };
        assert_eq!(center(&box_), (25.0, 40.0));
    }
}
