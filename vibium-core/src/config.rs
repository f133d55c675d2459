//! Typed configuration consumed at session startup (spec §4.3 C9).
//!
//! This module has no knowledge of files or environment variables — loading
//! these from disk or `env::var` is the CLI wrapper's job, out of scope
//! here (spec §1).

use std::collections::HashMap;
use std::time::Duration;

/// Default timeout for a single element resolve / poll loop.
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for a broker-issued internal BiDi command.
pub const DEFAULT_INTERNAL_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for the readyState wait that follows `back`/`forward`/`reload`.
pub const POST_TRAVERSAL_LOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Poll interval used by every retry-until-deadline loop.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Interval between periodic trace screenshots.
pub const TRACE_SCREENSHOT_INTERVAL: Duration = Duration::from_millis(500);

/// Interval between the two stability-check reads of a resolved element's
/// bounding box.
pub const STABILITY_CHECK_INTERVAL: Duration = Duration::from_millis(50);

/// Ceiling on `sleep(ms)`.
pub const MAX_SLEEP: Duration = Duration::from_secs(30);

/// Duration a `highlight` outline stays visible before it's removed.
pub const HIGHLIGHT_DURATION: Duration = Duration::from_millis(3_000);

/// Depth of the pipe transport's bounded outgoing queue (spec §5).
pub const PIPE_QUEUE_DEPTH: usize = 4096;

/// Read-buffer size raised for WebSocket transports carrying screenshots.
pub const WS_READ_BUFFER_BYTES: usize = 10 * 1024 * 1024;

/// Options the broker needs to bring up a client session. The browser
/// itself is already running by the time these are consumed — launching it
/// is the browser-launch subsystem's job (spec §1, out of scope).
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// The BiDi WebSocket URL of an already-running browser.
    pub bidi_url: String,
    /// Extra HTTP headers to send while establishing the BiDi WebSocket.
    pub headers: HashMap<String, String>,
    /// Default timeout applied to element resolves that don't specify one.
    pub default_resolve_timeout: Duration,
    /// Default timeout applied to broker-issued internal commands.
    pub default_internal_timeout: Duration,
    /// Whether to provision a temp download directory eagerly. Per spec
    /// §4.1, this setup is best-effort and must never gate the first
    /// client command; setting this to `false` skips it entirely.
    pub download_directory_enabled: bool,
    /// Directory `screenshot`/`pdf` may save into. `None` means a filename
    /// argument to either command is rejected before capture (spec §8
    /// boundary: "screenshot with a filename and no configured screenshot
    /// directory fails with a validation error before capture").
    pub screenshot_directory: Option<std::path::PathBuf>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            bidi_url: String::new(),
            headers: HashMap::new(),
            default_resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
            default_internal_timeout: DEFAULT_INTERNAL_COMMAND_TIMEOUT,
            download_directory_enabled: true,
            screenshot_directory: None,
        }
    }
}

impl SessionOptions {
    pub fn new(bidi_url: impl Into<String>) -> Self {
        Self {
            bidi_url: bidi_url.into(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_screenshot_directory(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.screenshot_directory = Some(dir.into());
        self
    }
}

/// The fixed event set the broker subscribes to synchronously before
/// returning control to the client (spec §4.1 "Client-connect protocol").
pub const STARTUP_SUBSCRIPTION_EVENTS: &[&str] = &[
    "browsingContext.contextCreated",
    "network.beforeRequestSent",
    "network.responseCompleted",
    "script.userPromptOpened",
    "log.entryAdded",
    "browsingContext.downloadWillBegin",
    "browsingContext.downloadEnd",
    "browsingContext.load",
    "browsingContext.fragmentNavigated",
];
