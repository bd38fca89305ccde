//! Module capability surface
//!
//! Every supervised unit implements [`Module`]. The manager only ever talks to
//! modules through this trait: it never owns them (it keeps a `Weak` handle)
//! and it treats every capability call as fallible, including panics.
//!
//! Modules report problems by emitting [`ModuleEvent`]s to the sinks bound
//! through [`Module::bind`]. [`EventEmitter`] is the ready-made subscription
//! list modules embed for that purpose.

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, Weak};
use thiserror::Error;

pub type ModuleResult<T> = std::result::Result<T, ModuleError>;

/// Failure of a module capability call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModuleError {
    #[error("Module operation failed: {0}")]
    Failed(String),

    #[error("Module panicked: {0}")]
    Panicked(String),

    #[error("Module {0} has been dropped by its owner")]
    Dropped(String),
}

/// Status snapshot reported by a module
///
/// `initialized` is the only field the manager interprets. Anything else a
/// module wants to expose goes into `extra` and is passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleStatus {
    /// Missing in a serialized status means not initialized
    #[serde(default)]
    pub initialized: bool,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ModuleStatus {
    pub fn initialized() -> Self {
        Self {
            initialized: true,
            extra: serde_json::Map::new(),
        }
    }

    pub fn uninitialized() -> Self {
        Self::default()
    }

    /// Attach a diagnostic field
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Payload of a module error report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Module the error belongs to
    pub module_id: String,
    /// Human readable error message
    pub error: String,
    /// Where in the module the error happened
    pub context: String,
    /// Short error classification
    pub error_type: String,
}

impl ErrorInfo {
    pub fn new(module_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            module_id: module_id.into(),
            error: error.into(),
            context: String::new(),
            error_type: "error".to_string(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = error_type.into();
        self
    }
}

/// Payload of a module status change notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub module_id: String,
    pub details: serde_json::Map<String, serde_json::Value>,
}

/// Events a module emits to its subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleEvent {
    /// The module hit an error
    Error(ErrorInfo),
    /// The module's status changed (informational)
    StatusChange(StatusChange),
}

impl ModuleEvent {
    pub fn module_id(&self) -> &str {
        match self {
            ModuleEvent::Error(info) => &info.module_id,
            ModuleEvent::StatusChange(change) => &change.module_id,
        }
    }
}

/// Receiver of module events
#[async_trait]
pub trait ModuleEventSink: Send + Sync {
    async fn on_module_event(&self, event: ModuleEvent);
}

/// Subscription list a module embeds to emit events
#[derive(Default)]
pub struct EventEmitter {
    sinks: Mutex<Vec<Arc<dyn ModuleEventSink>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a sink; binding the same sink twice is a no-op
    pub fn bind(&self, sink: Arc<dyn ModuleEventSink>) {
        let mut sinks = self.sinks.lock().unwrap_or_else(|e| e.into_inner());
        if !sinks.iter().any(|s| same_sink(s, &sink)) {
            sinks.push(sink);
        }
    }

    /// Unsubscribe a sink, returning whether it was bound
    pub fn unbind(&self, sink: &Arc<dyn ModuleEventSink>) -> bool {
        let mut sinks = self.sinks.lock().unwrap_or_else(|e| e.into_inner());
        let before = sinks.len();
        sinks.retain(|s| !same_sink(s, sink));
        sinks.len() != before
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Deliver an event to every bound sink, in bind order
    pub async fn emit(&self, event: ModuleEvent) {
        let sinks: Vec<Arc<dyn ModuleEventSink>> = self
            .sinks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        for sink in sinks {
            sink.on_module_event(event.clone()).await;
        }
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sinks", &self.sink_count())
            .finish()
    }
}

fn same_sink(a: &Arc<dyn ModuleEventSink>, b: &Arc<dyn ModuleEventSink>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// A unit of application functionality that the recovery manager supervises
///
/// All capability calls are awaited without a timeout. Wrap slow modules in
/// your own `tokio::time::timeout` if bounded latency matters.
#[async_trait]
pub trait Module: Send + Sync {
    /// Stable, unique identifier
    fn id(&self) -> &str;

    /// Subscription list used by the default `bind`/`unbind`
    fn events(&self) -> &EventEmitter;

    async fn initialize(&self) -> ModuleResult<bool>;

    /// Full reinitialization; `Ok(true)` only if the module is usable again
    async fn restart(&self) -> ModuleResult<bool>;

    async fn enable_fallback_mode(&self) -> ModuleResult<bool>;

    async fn disable_fallback_mode(&self) -> ModuleResult<bool>;

    async fn status(&self) -> ModuleResult<ModuleStatus>;

    fn bind(&self, sink: Arc<dyn ModuleEventSink>) {
        self.events().bind(sink);
    }

    fn unbind(&self, sink: &Arc<dyn ModuleEventSink>) -> bool {
        self.events().unbind(sink)
    }
}

/// Upgrade a module handle, failing if the owner dropped the module
pub(crate) fn upgrade(module_id: &str, handle: &Weak<dyn Module>) -> ModuleResult<Arc<dyn Module>> {
    handle
        .upgrade()
        .ok_or_else(|| ModuleError::Dropped(module_id.to_string()))
}

/// Run a module call, converting a panic into `ModuleError::Panicked`
pub(crate) async fn guarded<T, F>(call: F) -> ModuleResult<T>
where
    F: Future<Output = ModuleResult<T>>,
{
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(ModuleError::Panicked(panic_message(payload.as_ref()))),
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink {
        seen: AtomicUsize,
    }

    #[async_trait]
    impl ModuleEventSink for CountingSink {
        async fn on_module_event(&self, _event: ModuleEvent) {
            self.seen.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_emitter_bind_emit_unbind() {
        let emitter = EventEmitter::new();
        let counting = Arc::new(CountingSink {
            seen: AtomicUsize::new(0),
        });
        let sink: Arc<dyn ModuleEventSink> = counting.clone();

        emitter.bind(sink.clone());
        emitter.bind(sink.clone());
        assert_eq!(emitter.sink_count(), 1);

        emitter
            .emit(ModuleEvent::Error(ErrorInfo::new("audio", "boom")))
            .await;
        assert_eq!(counting.seen.load(Ordering::SeqCst), 1);

        assert!(emitter.unbind(&sink));
        assert!(!emitter.unbind(&sink));

        emitter
            .emit(ModuleEvent::Error(ErrorInfo::new("audio", "boom")))
            .await;
        assert_eq!(counting.seen.load(Ordering::SeqCst), 1);
    }

    async fn exploding_restart() -> ModuleResult<bool> {
        panic!("restart exploded")
    }

    #[tokio::test]
    async fn test_guarded_catches_panics() {
        let result = guarded(exploding_restart()).await;
        assert_eq!(
            result,
            Err(ModuleError::Panicked("restart exploded".to_string()))
        );

        let result = guarded(async { Ok::<_, ModuleError>(true) }).await;
        assert_eq!(result, Ok(true));
    }

    #[test]
    fn test_status_flattens_extra_fields() {
        let status = ModuleStatus::initialized().with("active", false).with("icon", "cal");
        let json = serde_json::to_value(&status).unwrap();

        assert_eq!(json["initialized"], true);
        assert_eq!(json["active"], false);
        assert_eq!(json["icon"], "cal");

        let parsed: ModuleStatus =
            serde_json::from_value(serde_json::json!({"active": true})).unwrap();
        assert!(!parsed.initialized);
        assert_eq!(parsed.extra["active"], true);
    }

    #[test]
    fn test_event_module_id() {
        let event = ModuleEvent::Error(ErrorInfo::new("tasks", "db locked").with_context("save"));
        assert_eq!(event.module_id(), "tasks");
    }
}
