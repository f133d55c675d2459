//! C5 — the poll loop around [`crate::locator::build_resolve_script`]:
//! retries until the element reaches the required actionable state or the
//! deadline passes (spec §4.2 "Poll loop").

use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::json;

use crate::config::{POLL_INTERVAL, STABILITY_CHECK_INTERVAL};
use crate::error::{Result, VibiumError};
use crate::locator::{build_resolve_script, BoundingBox, Check, ElementInfo, ElementParams};
use crate::session::Session;

#[derive(Debug, Deserialize)]
struct ResolveOutcome {
    status: String,
    check: Option<String>,
    reason: Option<String>,
    tag: Option<String>,
    text: Option<String>,
    #[serde(rename = "box")]
    box_: Option<BoundingBox>,
}

async fn call_resolve(session: &dyn Session, params: &ElementParams, checks: &[Check]) -> Result<ResolveOutcome> {
    let (function, args) = build_resolve_script(params, checks);
    let call_params = json!({
        "functionDeclaration": function,
        "arguments": [args],
        "target": { "context": params.context },
        "awaitPromise": false,
    });
    let raw = session.send_bidi_command("script.callFunction", call_params).await?;
    Ok(serde_json::from_value(raw)?)
}

/// Runs [`call_resolve`] twice, [`STABILITY_CHECK_INTERVAL`] apart, and
/// requires bit-exact bounding boxes (spec §4.2 "Stability check" — "done
/// by the caller, not in JS").
async fn check_stable(
    session: &dyn Session,
    params: &ElementParams,
    checks: &[Check],
) -> Result<ResolveOutcome> {
    let first = call_resolve(session, params, checks).await?;
    if first.status != "ok" {
        return Ok(first);
    }
    tokio::time::sleep(STABILITY_CHECK_INTERVAL).await;
    let second = call_resolve(session, params, checks).await?;
    if second.status != "ok" {
        return Ok(second);
    }
    if first.box_ != second.box_ {
        return Ok(ResolveOutcome {
            status: "failed".to_string(),
            check: Some("stable".to_string()),
            reason: Some("bounding box moved between consecutive reads".to_string()),
            tag: second.tag,
            text: second.text,
            box_: second.box_,
        });
    }
    Ok(second)
}

/// Resolves `params`, polling until it satisfies every check in `checks` or
/// `params.timeout()` elapses. `force=true` must be handled by the caller —
/// this function always evaluates `checks` (pass an empty slice for a
/// forced, check-free resolve).
pub async fn resolve(session: &dyn Session, params: &ElementParams, checks: &[Check]) -> Result<ElementInfo> {
    params.validate()?;
    let deadline = Instant::now() + params.timeout();
    let needs_stability = checks.contains(&Check::Stable);

    let mut last_check: Option<String> = None;
    let mut last_reason: Option<String> = None;
    let mut ever_resolved = false;

    loop {
        let outcome = if needs_stability {
            check_stable(session, params, checks).await?
        } else {
            call_resolve(session, params, checks).await?
        };

        match outcome.status.as_str() {
            "ok" => {
                return Ok(ElementInfo {
                    tag: outcome.tag.unwrap_or_default(),
                    text: outcome.text.unwrap_or_default(),
                    box_: outcome.box_.ok_or_else(|| {
                        VibiumError::bidi(
                            "script.callFunction",
                            "internal",
                            "resolve reported ok without a bounding box",
                        )
                    })?,
                })
            }
            "not_found" => {
                last_check = None;
                last_reason = None;
            }
            _ => {
                ever_resolved = true;
                last_check = outcome.check;
                last_reason = outcome.reason;
            }
        }

        if Instant::now() >= deadline {
            let elapsed = params.timeout();
            if !ever_resolved {
                return Err(VibiumError::not_found(params.describe()));
            }
            return Err(VibiumError::timeout(elapsed, last_check, last_reason));
        }

        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// A resolve with `force=true`: no actionability checks, no stability
/// polling — a single plain lookup (spec §3 "Force=true: skip all checks,
/// use plain resolve").
pub async fn resolve_forced(session: &dyn Session, params: &ElementParams) -> Result<ElementInfo> {
    params.validate()?;
    let outcome = call_resolve(session, params, &[]).await?;
    match outcome.status.as_str() {
        "ok" => Ok(ElementInfo {
            tag: outcome.tag.unwrap_or_default(),
            text: outcome.text.unwrap_or_default(),
            box_: outcome.box_.unwrap_or(BoundingBox {
                x: 0.0,
                y: 0.0,
                width: 0.0,
                height: 0.0,
            }),
        }),
        _ => Err(VibiumError::not_found(params.describe())),
    }
}

/// The user-visible timeout window this resolve actually waited, used by
/// callers composing a richer error message that also names the operation
/// (spec §7 "every error message includes the operation...").
pub fn describe_timeout(op: &str, params: &ElementParams, elapsed: Duration) -> String {
    format!("{op}: timed out after {elapsed:?} resolving {}", params.describe())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MockSession;
    use serde_json::json;

    #[tokio::test]
    async fn resolves_immediately_when_ok() {
        let session = MockSession::with_responses(vec![Ok(json!({
            "status": "ok",
            "tag": "button",
            "text": "Save",
            "box": { "x": 1.0, "y": 2.0, "width": 3.0, "height": 4.0 },
        }))]);
        let params = ElementParams {
            selector: Some("button".into()),
            timeout_ms: 1000,
            ..Default::default()
        };
        let info = resolve(&session, &params, &[Check::Visible]).await.unwrap();
        assert_eq!(info.tag, "button");
        assert_eq!(info.text, "Save");
    }

    #[tokio::test]
    async fn not_found_when_never_resolved_before_deadline() {
        let session = MockSession::repeating(json!({ "status": "not_found" }));
        let params = ElementParams {
            selector: Some("button".into()),
            timeout_ms: 50,
            ..Default::default()
        };
        let err = resolve(&session, &params, &[Check::Visible]).await.unwrap_err();
        assert!(matches!(err, VibiumError::NotFound { .. }));
    }

    #[tokio::test]
    async fn surfaces_last_failure_on_timeout() {
        let session = MockSession::repeating(json!({
            "status": "failed",
            "check": "enabled",
            "reason": "element is disabled",
        }));
        let params = ElementParams {
            selector: Some("button".into()),
            timeout_ms: 50,
            ..Default::default()
        };
        let err = resolve(&session, &params, &[Check::Enabled]).await.unwrap_err();
        match err {
            VibiumError::Timeout { check, reason, .. } => {
                assert_eq!(check.as_deref(), Some("enabled"));
                assert_eq!(reason.as_deref(), Some("element is disabled"));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unstable_box_is_treated_as_stability_failure() {
        let session = MockSession::with_responses(vec![
            Ok(json!({ "status": "ok", "tag": "div", "text": "", "box": { "x": 0.0, "y": 0.0, "width": 10.0, "height": 10.0 } })),
            Ok(json!({ "status": "ok", "tag": "div", "text": "", "box": { "x": 5.0, "y": 0.0, "width": 10.0, "height": 10.0 } })),
            Ok(json!({ "status": "ok", "tag": "div", "text": "", "box": { "x": 5.0, "y": 0.0, "width": 10.0, "height": 10.0 } })),
            Ok(json!({ "status": "ok", "tag": "div", "text": "", "box": { "x": 5.0, "y": 0.0, "width": 10.0, "height": 10.0 } })),
        ]);
        let params = ElementParams {
            selector: Some("div".into()),
            timeout_ms: 1000,
            ..Default::default()
        };
        let info = resolve(&session, &params, &[Check::Stable]).await.unwrap();
        assert_eq!(info.box_.x, 5.0);
    }
}
