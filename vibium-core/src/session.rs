//! C3 — the uniform interface every extension command handler programs
//! against: `send_bidi_command(method, params) -> raw response` plus
//! `context_id()`. Two call sites produce a [`Session`]: the broker, one
//! per connected client (spec §4.1), and the direct-call adapter, one per
//! in-process caller (spec §4.3 C10) — both are realized here as the same
//! [`ActiveSession`] wired to a different [`BidiChannel`]/[`Correlator`]
//! pair, since the correlation logic itself doesn't care who's driving it.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex;
use vibium_types::{BidiCommand, BidiOutcome};

use crate::bidi::BidiChannel;
use crate::config::DEFAULT_INTERNAL_COMMAND_TIMEOUT;
use crate::correlator::Correlator;
use crate::error::{Result, VibiumError};

#[async_trait::async_trait]
pub trait Session: Send + Sync {
    /// Issues one BiDi command and awaits its response, subject to this
    /// session's default internal-command timeout (spec §4.1
    /// `sendInternalCommand`).
    async fn send_bidi_command(&self, method: &str, params: Value) -> Result<Value>;

    /// The last browsing context this session resolved, if any (spec §3
    /// "last-resolved browsing-context id").
    async fn context_id(&self) -> Option<String>;

    async fn set_context_id(&self, context: Option<String>);
}

/// The shared implementation behind both `Session` call sites.
pub struct ActiveSession {
    bidi: Arc<dyn BidiChannel>,
    correlator: Arc<Correlator>,
    default_timeout: Duration,
    last_context: Mutex<Option<String>>,
}

impl ActiveSession {
    pub fn new(bidi: Arc<dyn BidiChannel>, correlator: Arc<Correlator>, default_timeout: Duration) -> Self {
        Self {
            bidi,
            correlator,
            default_timeout,
            last_context: Mutex::new(None),
        }
    }

    pub fn correlator(&self) -> &Arc<Correlator> {
        &self.correlator
    }

    pub fn bidi(&self) -> &Arc<dyn BidiChannel> {
        &self.bidi
    }

    /// `sendInternalCommand` (spec §4.1): allocates a fresh internal id,
    /// registers a one-shot slot, sends the framed command, and waits on
    /// the slot with the given deadline. On timeout the id is deregistered
    /// so a late reply is silently dropped by the reader rather than
    /// delivered (spec §8).
    pub async fn send_internal_command(&self, method: &str, params: Value, timeout: Duration) -> Result<Value> {
        if self.correlator.is_closed() {
            return Err(VibiumError::SessionClosed);
        }
        let id = self.correlator.alloc_internal_id();
        let rx = self.correlator.register(id).await?;
        let command = BidiCommand::new(id, method.to_string(), params);
        let frame = serde_json::to_string(&command)?;
        self.bidi.send(frame).await?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => match response.outcome {
                BidiOutcome::Success(value) => Ok(value),
                BidiOutcome::Error { error, message } => {
                    Err(VibiumError::bidi(method, error, message))
                }
            },
            Ok(Err(_canceled)) => Err(VibiumError::SessionClosed),
            Err(_elapsed) => {
                self.correlator.deregister(id).await;
                Err(VibiumError::Timeout {
                    check: None,
                    reason: Some(format!("no response to {method} within {timeout:?}")),
                    elapsed: timeout,
                })
            }
        }
    }
}

#[async_trait::async_trait]
impl Session for ActiveSession {
    async fn send_bidi_command(&self, method: &str, params: Value) -> Result<Value> {
        self.send_internal_command(method, params, self.default_timeout).await
    }

    async fn context_id(&self) -> Option<String> {
        self.last_context.lock().await.clone()
    }

    async fn set_context_id(&self, context: Option<String>) {
        *self.last_context.lock().await = context;
    }
}

/// Convenience constructor used by both the broker (spec §4.1) and the
/// direct-call adapter (spec §4.3 C10).
pub fn new_active_session(bidi: Arc<dyn BidiChannel>) -> (Arc<ActiveSession>, Arc<Correlator>) {
    new_active_session_with_timeout(bidi, DEFAULT_INTERNAL_COMMAND_TIMEOUT)
}

/// Same as [`new_active_session`] but with a caller-supplied default
/// internal-command timeout (spec §4.3 C9: `default_internal_timeout`).
pub fn new_active_session_with_timeout(bidi: Arc<dyn BidiChannel>, default_timeout: Duration) -> (Arc<ActiveSession>, Arc<Correlator>) {
    let correlator = Arc::new(Correlator::new());
    let session = Arc::new(ActiveSession::new(bidi, correlator.clone(), default_timeout));
    (session, correlator)
}

#[cfg(test)]
pub use test_support::MockSession;

#[cfg(test)]
mod test_support {
    use super::*;
    use tokio::sync::Mutex as TokioMutex;

    /// A [`Session`] double that plays back a canned sequence of
    /// `script.callFunction`-style results, used throughout the
    /// actionability and command-handler test suites.
    pub struct MockSession {
        responses: TokioMutex<std::collections::VecDeque<Result<Value>>>,
        repeat: Option<Value>,
        context: TokioMutex<Option<String>>,
        pub sent: TokioMutex<Vec<(String, Value)>>,
    }

    impl MockSession {
        pub fn with_responses(responses: Vec<Result<Value>>) -> Self {
            Self {
                responses: TokioMutex::new(responses.into()),
                repeat: None,
                context: TokioMutex::new(None),
                sent: TokioMutex::new(Vec::new()),
            }
        }

        pub fn repeating(value: Value) -> Self {
            Self {
                responses: TokioMutex::new(Default::default()),
                repeat: Some(value),
                context: TokioMutex::new(None),
                sent: TokioMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl Session for MockSession {
        async fn send_bidi_command(&self, method: &str, params: Value) -> Result<Value> {
            self.sent.lock().await.push((method.to_string(), params));
            if let Some(next) = self.responses.lock().await.pop_front() {
                return next;
            }
            if let Some(value) = &self.repeat {
                return Ok(value.clone());
            }
            Ok(Value::Null)
        }

        async fn context_id(&self) -> Option<String> {
            self.context.lock().await.clone()
        }

        async fn set_context_id(&self, context: Option<String>) {
            *self.context.lock().await = context;
        }
    }
}
