//! clock-install/clock-fast-forward/clock-run-for/clock-pause-at/
//! clock-resume/clock-set-fixed-time/clock-set-system-time/
//! clock-set-timezone — extension command bindings over [`crate::clock`]
//! (spec §4.5).

use serde_json::{json, Value};

use super::{optional_str, required_u64};
use crate::clock;
use crate::error::{Result, VibiumError};
use crate::state::CommandContext;

fn required_i64(params: &Value, key: &str) -> Result<i64> {
    params
        .get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| VibiumError::validation(format!("missing required parameter: {key}")))
}

pub async fn clock_install(ctx: &CommandContext, params: Value) -> Result<Value> {
    let context = ctx.resolve_context(optional_str(&params, "context").map(str::to_string)).await?;
    let time = params.get("time").and_then(Value::as_i64);
    clock::install(&*ctx.session, &context, time).await?;
    Ok(json!({ "ok": true }))
}

pub async fn clock_fast_forward(ctx: &CommandContext, params: Value) -> Result<Value> {
    let context = ctx.resolve_context(optional_str(&params, "context").map(str::to_string)).await?;
    let ms = required_u64(&params, "ms")? as i64;
    clock::fast_forward(&*ctx.session, &context, ms).await?;
    Ok(json!({ "ok": true }))
}

pub async fn clock_run_for(ctx: &CommandContext, params: Value) -> Result<Value> {
    let context = ctx.resolve_context(optional_str(&params, "context").map(str::to_string)).await?;
    let ms = required_u64(&params, "ms")? as i64;
    clock::run_for(&*ctx.session, &context, ms).await?;
    Ok(json!({ "ok": true }))
}

pub async fn clock_pause_at(ctx: &CommandContext, params: Value) -> Result<Value> {
    let context = ctx.resolve_context(optional_str(&params, "context").map(str::to_string)).await?;
    let time = required_i64(&params, "time")?;
    clock::pause_at(&*ctx.session, &context, time).await?;
    Ok(json!({ "ok": true }))
}

pub async fn clock_resume(ctx: &CommandContext, params: Value) -> Result<Value> {
    let context = ctx.resolve_context(optional_str(&params, "context").map(str::to_string)).await?;
    clock::resume(&*ctx.session, &context).await?;
    Ok(json!({ "ok": true }))
}

pub async fn clock_set_fixed_time(ctx: &CommandContext, params: Value) -> Result<Value> {
    let context = ctx.resolve_context(optional_str(&params, "context").map(str::to_string)).await?;
    let time = required_i64(&params, "time")?;
    clock::set_fixed_time(&*ctx.session, &context, time).await?;
    Ok(json!({ "ok": true }))
}

pub async fn clock_set_system_time(ctx: &CommandContext, params: Value) -> Result<Value> {
    let context = ctx.resolve_context(optional_str(&params, "context").map(str::to_string)).await?;
    let time = required_i64(&params, "time")?;
    clock::set_system_time(&*ctx.session, &context, time).await?;
    Ok(json!({ "ok": true }))
}

pub async fn clock_set_timezone(ctx: &CommandContext, params: Value) -> Result<Value> {
    let context = ctx.resolve_context(optional_str(&params, "context").map(str::to_string)).await?;
    let timezone = optional_str(&params, "timezone");
    clock::set_timezone(&*ctx.session, &context, timezone).await?;
    Ok(json!({ "ok": true }))
}
