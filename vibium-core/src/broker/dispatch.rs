//! Method-name dispatch table (spec §4.1 "Dispatch", §4.3, §6 "`vibium:`
//! prefix"). Extension methods route to a `commands::*` handler through a
//! [`CommandContext`]; anything else is forwarded to the BiDi channel
//! verbatim and its response relayed straight back to the client.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};

use serde_json::{json, Value};

use super::client_session::ClientSession;
use super::tracing_wrapper;
use crate::bidi::BidiChannel;
use crate::commands;
use crate::error::{Result, VibiumError};
use crate::state::CommandContext;
use crate::transport::ClientTransport;

const EXTENSION_PREFIX: &str = "vibium:";

type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;
type CommandHandler = fn(CommandContext, Value) -> HandlerFuture;

macro_rules! handler {
    ($f:path) => {
        |ctx: CommandContext, params: Value| -> HandlerFuture { Box::pin(async move { $f(&ctx, params).await }) }
    };
}

fn table() -> &'static HashMap<&'static str, CommandHandler> {
    static TABLE: OnceLock<HashMap<&'static str, CommandHandler>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut m: HashMap<&'static str, CommandHandler> = HashMap::new();
        m.insert("navigate", handler!(commands::navigation::navigate));
        m.insert("back", handler!(commands::navigation::back));
        m.insert("forward", handler!(commands::navigation::forward));
        m.insert("reload", handler!(commands::navigation::reload));
        m.insert("url", handler!(commands::navigation::url));
        m.insert("title", handler!(commands::navigation::title));
        m.insert("content", handler!(commands::navigation::content));
        m.insert("wait-for-url", handler!(commands::navigation::wait_for_url));
        m.insert("wait-for-load", handler!(commands::navigation::wait_for_load));
        m.insert("sleep", handler!(commands::navigation::sleep));

        m.insert("click", handler!(commands::interaction::click));
        m.insert("dblclick", handler!(commands::interaction::dblclick));
        m.insert("hover", handler!(commands::interaction::hover));
        m.insert("tap", handler!(commands::interaction::tap));
        m.insert("type", handler!(commands::interaction::r#type));
        m.insert("fill", handler!(commands::interaction::fill));
        m.insert("press", handler!(commands::interaction::press));
        m.insert("keys", handler!(commands::interaction::keys));
        m.insert("select", handler!(commands::interaction::select));
        m.insert("check", handler!(commands::interaction::check));
        m.insert("uncheck", handler!(commands::interaction::uncheck));
        m.insert("scroll", handler!(commands::interaction::scroll));
        m.insert("scroll-into-view", handler!(commands::interaction::scroll_into_view));
        m.insert("drag", handler!(commands::interaction::drag));
        m.insert("mouse-move", handler!(commands::interaction::mouse_move));
        m.insert("mouse-down", handler!(commands::interaction::mouse_down));
        m.insert("mouse-up", handler!(commands::interaction::mouse_up));
        m.insert("mouse-click", handler!(commands::interaction::mouse_click));

        m.insert("find", handler!(commands::query::find));
        m.insert("find-all", handler!(commands::query::find_all));
        m.insert("map", handler!(commands::query::map));
        m.insert("diff-map", handler!(commands::query::diff_map));
        m.insert("a11y-tree", handler!(commands::query::a11y_tree));
        m.insert("get-text", handler!(commands::query::get_text));
        m.insert("get-html", handler!(commands::query::get_html));
        m.insert("get-value", handler!(commands::query::get_value));
        m.insert("get-attribute", handler!(commands::query::get_attribute));
        m.insert("is-visible", handler!(commands::query::is_visible));
        m.insert("is-enabled", handler!(commands::query::is_enabled));
        m.insert("is-checked", handler!(commands::query::is_checked));
        m.insert("count", handler!(commands::query::count));
        m.insert("wait", handler!(commands::query::wait));
        m.insert("wait-for-text", handler!(commands::query::wait_for_text));
        m.insert("wait-for-fn", handler!(commands::query::wait_for_fn));

        m.insert("screenshot", handler!(commands::capture::screenshot));
        m.insert("pdf", handler!(commands::capture::pdf));
        m.insert("highlight", handler!(commands::capture::highlight));

        m.insert("dialog-accept", handler!(commands::dialogs::dialog_accept));
        m.insert("dialog-dismiss", handler!(commands::dialogs::dialog_dismiss));

        m.insert("cookies-get", handler!(commands::cookies::cookies_get));
        m.insert("cookies-set", handler!(commands::cookies::cookies_set));
        m.insert("cookies-delete", handler!(commands::cookies::cookies_delete));
        m.insert("storage-state", handler!(commands::cookies::storage_state));
        m.insert("restore-storage", handler!(commands::cookies::restore_storage));

        m.insert("upload", handler!(commands::upload::upload));

        m.insert("frames-list", handler!(commands::frames::list));
        m.insert("frames-find", handler!(commands::frames::find));

        m.insert("tabs-new", handler!(commands::tabs::new));
        m.insert("tabs-list", handler!(commands::tabs::list));
        m.insert("tabs-switch", handler!(commands::tabs::switch));
        m.insert("tabs-close", handler!(commands::tabs::close));

        m.insert("set-viewport", handler!(commands::viewport::set_viewport));
        m.insert("get-viewport", handler!(commands::viewport::get_viewport));
        m.insert("get-window", handler!(commands::viewport::get_window));
        m.insert("set-window", handler!(commands::viewport::set_window));
        m.insert("emulate-media", handler!(commands::viewport::emulate_media));
        m.insert("set-geolocation", handler!(commands::viewport::set_geolocation));
        m.insert("set-content", handler!(commands::viewport::set_content));

        m.insert("clock-install", handler!(commands::clock_cmds::clock_install));
        m.insert("clock-fast-forward", handler!(commands::clock_cmds::clock_fast_forward));
        m.insert("clock-run-for", handler!(commands::clock_cmds::clock_run_for));
        m.insert("clock-pause-at", handler!(commands::clock_cmds::clock_pause_at));
        m.insert("clock-resume", handler!(commands::clock_cmds::clock_resume));
        m.insert("clock-set-fixed-time", handler!(commands::clock_cmds::clock_set_fixed_time));
        m.insert("clock-set-system-time", handler!(commands::clock_cmds::clock_set_system_time));
        m.insert("clock-set-timezone", handler!(commands::clock_cmds::clock_set_timezone));

        m.insert("trace-start", handler!(commands::trace_cmds::trace_start));
        m.insert("trace-stop", handler!(commands::trace_cmds::trace_stop));
        m.insert("trace-start-chunk", handler!(commands::trace_cmds::trace_start_chunk));
        m.insert("trace-stop-chunk", handler!(commands::trace_cmds::trace_stop_chunk));
        m.insert("trace-start-group", handler!(commands::trace_cmds::trace_start_group));
        m.insert("trace-stop-group", handler!(commands::trace_cmds::trace_stop_group));
        m
    })
}

fn error_response(id: u64, err: &VibiumError) -> Value {
    json!({
        "id": id,
        "type": "error",
        "error": err.kind(),
        "message": err.to_string(),
    })
}

fn success_response(id: u64, result: Value) -> Value {
    json!({ "id": id, "type": "success", "result": result })
}

/// Handles one raw client-issued frame (spec §4.1 "Dispatch"): extension
/// methods (`vibium:*`) run through the handler table against a fresh
/// [`CommandContext`]; everything else is forwarded to the browser and its
/// response relayed back to the client untouched.
pub async fn handle(session: Arc<ClientSession>, raw: String) {
    let value: Value = match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(err) => {
            tracing::warn!(client = session.id.0, %err, "malformed client frame");
            return;
        }
    };
    let Some(id) = value.get("id").and_then(Value::as_u64) else {
        tracing::warn!(client = session.id.0, "client frame missing id");
        return;
    };
    let Some(method) = value.get("method").and_then(Value::as_str) else {
        let _ = session.transport.send(error_response(id, &VibiumError::validation("missing method")).to_string()).await;
        return;
    };
    let params = value.get("params").cloned().unwrap_or(json!({}));

    let response = match method.strip_prefix(EXTENSION_PREFIX) {
        Some(command) => run_extension_command(&session, command, params).await,
        None => {
            // Forward verbatim; the reader task will relay the browser's
            // response back since client-issued ids stay below the
            // internal-id ceiling.
            if let Err(err) = session.active.bidi().send(raw.clone()).await {
                tracing::warn!(client = session.id.0, %err, "failed to forward client frame");
            }
            return;
        }
    };

    match response {
        Ok(result) => {
            let _ = session.transport.send(success_response(id, result).to_string()).await;
        }
        Err(err) => {
            let _ = session.transport.send(error_response(id, &err).to_string()).await;
        }
    }
}

async fn run_extension_command(session: &Arc<ClientSession>, command: &str, params: Value) -> Result<Value> {
    let handler = *table()
        .get(command)
        .ok_or_else(|| VibiumError::validation(format!("unknown command: vibium:{command}")))?;
    let ctx = CommandContext::new(session.session(), session.state.clone());
    let params_for_trace = params.clone();
    tracing_wrapper::wrap(session, command, params_for_trace, || handler(ctx, params)).await
}
