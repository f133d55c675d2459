//! C6 — the extension command set (spec §4.3). Every handler here is a
//! thin composition over [`crate::actionability`], [`crate::locator`], and
//! a handful of BiDi calls through [`crate::state::CommandContext`]; none
//! of them know whether they're being driven by the broker or the
//! direct-call adapter (spec §4.3 C10).

pub mod capture;
pub mod clock_cmds;
pub mod cookies;
pub mod dialogs;
pub mod frames;
pub mod interaction;
pub mod navigation;
pub mod query;
pub mod tabs;
pub mod trace_cmds;
pub mod upload;
pub mod viewport;

use serde_json::Value;

use crate::error::{Result, VibiumError};
use crate::locator::ElementParams;

/// Pulls `ep` out of a command's params object and deserializes it as an
/// [`ElementParams`] — every interaction/query command's "locator".
pub fn element_params(params: &Value) -> Result<ElementParams> {
    let ep = params
        .get("ep")
        .ok_or_else(|| VibiumError::validation("missing required parameter: ep"))?;
    let parsed: ElementParams = serde_json::from_value(ep.clone())?;
    parsed.validate()?;
    Ok(parsed)
}

/// Required-string param accessor shared by every handler (spec §4.3
/// "Error policy": "Missing required parameter → validation error ...
/// before any browser call").
pub fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| VibiumError::validation(format!("missing required parameter: {key}")))
}

pub fn required_u64(params: &Value, key: &str) -> Result<u64> {
    params
        .get(key)
        .and_then(Value::as_u64)
        .ok_or_else(|| VibiumError::validation(format!("missing required parameter: {key}")))
}

pub fn optional_str<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

pub fn optional_u64(params: &Value, key: &str, default: u64) -> u64 {
    params.get(key).and_then(Value::as_u64).unwrap_or(default)
}

pub fn required_f64(params: &Value, key: &str) -> Result<f64> {
    params
        .get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| VibiumError::validation(format!("missing required parameter: {key}")))
}
