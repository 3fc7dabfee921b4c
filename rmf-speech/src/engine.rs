//! Native speech engine seam.
//!
//! An engine is created by a [`SpeechEngineFactory`] and reports back through
//! the [`EngineListener`] it is given, from whatever thread it likes. The
//! listener tags every callback with the engine's generation so the bridge
//! can drop signals from an engine it already released.

use rmf_core::Result;
use tokio::sync::mpsc;

/// Locale requested from every engine
pub const DEFAULT_LOCALE: &str = "en-US";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageSupport {
    Available,
    MissingData,
    NotSupported,
}

impl LanguageSupport {
    pub fn is_usable(self) -> bool {
        matches!(self, LanguageSupport::Available)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueMode {
    /// Drop whatever is playing or queued
    Flush,
    /// Append behind the current utterance
    Add,
}

/// Progress reported by an engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCallback {
    Init(InitStatus),
    Start { utterance_id: String },
    Done { utterance_id: String },
    Error {
        utterance_id: String,
        error_code: Option<i32>,
    },
    /// Halted by `stop()` or a flush
    Stopped {
        utterance_id: String,
        interrupted: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSignal {
    pub generation: u64,
    pub callback: EngineCallback,
}

/// Handle an engine uses to report progress. Cheap to clone, usable from any thread.
#[derive(Debug, Clone)]
pub struct EngineListener {
    generation: u64,
    tx: mpsc::UnboundedSender<EngineSignal>,
}

impl EngineListener {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<EngineSignal>) -> Self {
        Self { generation, tx }
    }

    /// Returns false once the bridge stopped listening
    pub fn notify(&self, callback: EngineCallback) -> bool {
        self.tx
            .send(EngineSignal {
                generation: self.generation,
                callback,
            })
            .is_ok()
    }

    pub fn init(&self, status: InitStatus) -> bool {
        self.notify(EngineCallback::Init(status))
    }

    pub fn start(&self, utterance_id: &str) -> bool {
        self.notify(EngineCallback::Start {
            utterance_id: utterance_id.to_string(),
        })
    }

    pub fn done(&self, utterance_id: &str) -> bool {
        self.notify(EngineCallback::Done {
            utterance_id: utterance_id.to_string(),
        })
    }

    pub fn error(&self, utterance_id: &str, error_code: Option<i32>) -> bool {
        self.notify(EngineCallback::Error {
            utterance_id: utterance_id.to_string(),
            error_code,
        })
    }

    pub fn stopped(&self, utterance_id: &str, interrupted: bool) -> bool {
        self.notify(EngineCallback::Stopped {
            utterance_id: utterance_id.to_string(),
            interrupted,
        })
    }
}

/// A live voice synthesizer. Calls are made sequentially from the bridge.
pub trait SpeechEngine: Send {
    fn set_language(&mut self, locale: &str) -> LanguageSupport;

    /// Submit an utterance. An `Err` is a synchronous submission failure;
    /// progress is reported through the listener.
    fn speak(&mut self, text: &str, mode: QueueMode, utterance_id: &str) -> Result<()>;

    fn stop(&mut self);

    fn shutdown(&mut self);
}

pub trait SpeechEngineFactory: Send + Sync {
    /// Short engine name for logs
    fn name(&self) -> &str;

    /// Start creating an engine. The engine must later deliver exactly one
    /// `Init` callback through `listener`. An `Err` here counts as an init
    /// failure.
    fn create(&self, listener: EngineListener) -> Result<Box<dyn SpeechEngine>>;
}
