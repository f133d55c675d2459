//! Clock emulation (spec §4.5). The wrapper script is registered once as a
//! preload script so it survives navigations; every subsequent `clock.*`
//! extension command drives it through `window.__vibiumClock` via a plain
//! `script.callFunction`.

use serde_json::{json, Value};

use crate::error::Result;
use crate::session::Session;

/// Replaces `Date`, the timer family, and `performance.now` with a
/// virtual-time implementation driven by `window.__vibiumClock`. Installed
/// once per session via `script.addPreloadScript` (spec §4.5 "Install
/// registers itself as a preload script so it persists across
/// navigations").
pub const CLOCK_PRELOAD_JS: &str = r#"
(() => {
  if (window.__vibiumClock) return;

  const realDate = Date;
  const realSetTimeout = window.setTimeout.bind(window);
  const realClearTimeout = window.clearTimeout.bind(window);
  const realSetInterval = window.setInterval.bind(window);
  const realClearInterval = window.clearInterval.bind(window);
  const realRaf = window.requestAnimationFrame ? window.requestAnimationFrame.bind(window) : null;
  const realCancelRaf = window.cancelAnimationFrame ? window.cancelAnimationFrame.bind(window) : null;
  const realPerfNow = performance.now.bind(performance);

  let virtualNow = realDate.now();
  let fixedTime = null;
  let paused = false;
  let nextId = 1;
  const timers = new Map();

  function now() {
    return fixedTime !== null ? fixedTime : virtualNow;
  }

  class VirtualDate extends realDate {
    constructor(...args) {
      if (args.length === 0) {
        super(now());
      } else {
        super(...args);
      }
    }
    static now() {
      return now();
    }
  }

  function scheduleTimer(kind, callback, delay, args) {
    const id = nextId++;
    timers.set(id, {
      kind,
      callback,
      args,
      delay: delay || 0,
      due: virtualNow + (delay || 0),
    });
    return id;
  }

  window.Date = VirtualDate;
  window.setTimeout = (cb, delay, ...args) => scheduleTimer('timeout', cb, delay, args);
  window.clearTimeout = (id) => timers.delete(id);
  window.setInterval = (cb, delay, ...args) => scheduleTimer('interval', cb, delay, args);
  window.clearInterval = (id) => timers.delete(id);
  if (realRaf) {
    window.requestAnimationFrame = (cb) => scheduleTimer('raf', cb, 0, []);
    window.cancelAnimationFrame = (id) => timers.delete(id);
  }
  performance.now = () => now() - virtualNow + realPerfNow();

  window.__vibiumClock = {
    fastForward(ms) {
      const target = virtualNow + ms;
      const fired = new Set();
      while (true) {
        const due = Array.from(timers.entries())
          .filter(([id, t]) => t.due <= target && !fired.has(id))
          .sort((a, b) => a[1].due - b[1].due);
        if (due.length === 0) break;
        const [id, t] = due[0];
        fired.add(id);
        virtualNow = t.due;
        if (t.kind !== 'interval') timers.delete(id);
        t.callback(...t.args);
      }
      virtualNow = target;
    },
    runFor(ms) {
      const target = virtualNow + ms;
      while (true) {
        const due = Array.from(timers.entries())
          .filter(([, t]) => t.due <= target)
          .sort((a, b) => a[1].due - b[1].due);
        if (due.length === 0) { virtualNow = target; break; }
        const [id, t] = due[0];
        virtualNow = t.due;
        if (t.kind === 'interval') {
          t.due = virtualNow + t.delay;
        } else {
          timers.delete(id);
        }
        t.callback(...t.args);
      }
    },
    pauseAt(t) {
      paused = true;
      virtualNow = t;
    },
    resume() {
      if (!paused) return;
      paused = false;
    },
    setFixedTime(t) {
      fixedTime = t;
    },
    setSystemTime(t) {
      fixedTime = null;
      virtualNow = t;
    },
  };
})();
"#;

fn call_clock_method(method: &str, arg: Option<Value>) -> String {
    let call = match arg {
        Some(_) => format!("window.__vibiumClock.{method}(arguments[0])"),
        None => format!("window.__vibiumClock.{method}()"),
    };
    format!("(function() {{ {call}; return true; }})")
}

async fn call(session: &dyn Session, context: &str, method: &str, arg: Option<Value>) -> Result<()> {
    let function = call_clock_method(method, arg.clone());
    let params = json!({
        "functionDeclaration": function,
        "arguments": arg.map(|v| vec![v]).unwrap_or_default(),
        "target": { "context": context },
        "awaitPromise": false,
    });
    session.send_bidi_command("script.callFunction", params).await?;
    Ok(())
}

/// `clock.install` (spec §4.5). Registers [`CLOCK_PRELOAD_JS`] as a preload
/// script, then seeds virtual time if `time` was given. Idempotent: the
/// script itself guards against double-installation per page.
pub async fn install(session: &dyn Session, context: &str, time: Option<i64>) -> Result<()> {
    let params = json!({ "functionDeclaration": CLOCK_PRELOAD_JS, "contexts": [context] });
    session.send_bidi_command("script.addPreloadScript", params).await?;
    session
        .send_bidi_command(
            "script.callFunction",
            json!({
                "functionDeclaration": CLOCK_PRELOAD_JS,
                "arguments": [],
                "target": { "context": context },
                "awaitPromise": false,
            }),
        )
        .await?;
    if let Some(t) = time {
        call(session, context, "setSystemTime", Some(json!(t))).await?;
    }
    Ok(())
}

pub async fn fast_forward(session: &dyn Session, context: &str, ms: i64) -> Result<()> {
    call(session, context, "fastForward", Some(json!(ms))).await
}

pub async fn run_for(session: &dyn Session, context: &str, ms: i64) -> Result<()> {
    call(session, context, "runFor", Some(json!(ms))).await
}

pub async fn pause_at(session: &dyn Session, context: &str, time: i64) -> Result<()> {
    call(session, context, "pauseAt", Some(json!(time))).await
}

pub async fn resume(session: &dyn Session, context: &str) -> Result<()> {
    call(session, context, "resume", None).await
}

pub async fn set_fixed_time(session: &dyn Session, context: &str, time: i64) -> Result<()> {
    call(session, context, "setFixedTime", Some(json!(time))).await
}

pub async fn set_system_time(session: &dyn Session, context: &str, time: i64) -> Result<()> {
    call(session, context, "setSystemTime", Some(json!(time))).await
}

/// Timezone is controlled separately, through BiDi directly rather than the
/// page script (spec §4.5: "Timezone is controlled separately via BiDi
/// `emulation.setTimezoneOverride`; empty string clears").
pub async fn set_timezone(session: &dyn Session, context: &str, timezone: Option<&str>) -> Result<()> {
    let params = json!({
        "contexts": [context],
        "timezone": timezone.unwrap_or(""),
    });
    session.send_bidi_command("emulation.setTimezoneOverride", params).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MockSession;
    use serde_json::json;

    #[tokio::test]
    async fn install_adds_preload_script_then_seeds_time() {
        let session = MockSession::with_responses(vec![
            Ok(json!(null)),
            Ok(json!(null)),
            Ok(json!(null)),
        ]);
        install(&session, "ctx-1", Some(1_700_000_000_000)).await.unwrap();
        let sent = session.sent.lock().await;
        assert_eq!(sent[0].0, "script.addPreloadScript");
        assert_eq!(sent[1].0, "script.callFunction");
        assert_eq!(sent[2].0, "script.callFunction");
        assert!(sent[2].1["functionDeclaration"]
            .as_str()
            .unwrap()
            .contains("setSystemTime"));
    }

    #[tokio::test]
    async fn fast_forward_passes_ms_argument() {
        let session = MockSession::repeating(json!(null));
        fast_forward(&session, "ctx-1", 60_000).await.unwrap();
        let sent = session.sent.lock().await;
        assert_eq!(sent[0].1["arguments"][0], json!(60_000));
    }

    #[tokio::test]
    async fn set_timezone_empty_string_clears() {
        let session = MockSession::repeating(json!(null));
        set_timezone(&session, "ctx-1", None).await.unwrap();
        let sent = session.sent.lock().await;
        assert_eq!(sent[0].0, "emulation.setTimezoneOverride");
        assert_eq!(sent[0].1["timezone"], json!(""));
    }
}
