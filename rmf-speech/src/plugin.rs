//! The `Tts` bridge plugin.
//!
//! Wraps one [`SpeechEngine`] behind the `speak` / `stop` calls and turns
//! engine callbacks into `ttsStart` / `ttsDone` / `ttsError` events on the
//! `Tts` topic.
//!
//! Engine lifecycle: `Uninitialized -> Initializing -> Ready | Failed`.
//! `Failed` is terminal until teardown. Speak requests are only accepted in
//! `Ready` and always flush whatever is playing. Engine-side problems are
//! reported as `ttsError` events, never as call rejections.

use crate::engine::{
    EngineCallback, EngineListener, EngineSignal, InitStatus, LanguageSupport, QueueMode,
    SpeechEngine, SpeechEngineFactory, DEFAULT_LOCALE,
};
use crate::models::{
    SpeakRequest, SpeakResult, SpeechEvent, StopResult, CODE_INIT_FAILED, CODE_LANG_FAILED,
    MSG_INIT_FAILED, MSG_LANG_FAILED, PLUGIN_NAME, REJECT_MISSING_TEXT, REJECT_NOT_READY,
    REJECT_SPEAK_FAILED,
};
use async_trait::async_trait;
use rmf_core::{CallRejection, CallResult, EventBus, Plugin, PluginCall};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

struct EngineSlot {
    engine: Option<Box<dyn SpeechEngine>>,
    state: EngineState,
    generation: u64,
}

struct Shared {
    factory: Arc<dyn SpeechEngineFactory>,
    bus: Arc<EventBus>,
    slot: Mutex<EngineSlot>,
    state_tx: watch::Sender<EngineState>,
    signals: mpsc::UnboundedSender<EngineSignal>,
}

pub struct TtsPlugin {
    shared: Arc<Shared>,
    signal_rx: Mutex<Option<mpsc::UnboundedReceiver<EngineSignal>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TtsPlugin {
    pub fn new(factory: Arc<dyn SpeechEngineFactory>, bus: Arc<EventBus>) -> Self {
        let (signals, signal_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(EngineState::Uninitialized);
        info!(target: "tts", engine = factory.name(), "Tts plugin created");
        Self {
            shared: Arc::new(Shared {
                factory,
                bus,
                slot: Mutex::new(EngineSlot {
                    engine: None,
                    state: EngineState::Uninitialized,
                    generation: 0,
                }),
                state_tx,
                signals,
            }),
            signal_rx: Mutex::new(Some(signal_rx)),
            worker: Mutex::new(None),
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.shared.bus
    }

    pub fn state(&self) -> EngineState {
        self.shared.lock_slot().state
    }

    pub fn is_ready(&self) -> bool {
        self.state() == EngineState::Ready
    }

    /// Resolves once the current engine is Ready (`true`) or Failed (`false`)
    pub async fn when_ready(&self) -> bool {
        let mut rx = self.shared.state_tx.subscribe();
        loop {
            let state = *rx.borrow_and_update();
            match state {
                EngineState::Ready => return true,
                EngineState::Failed => return false,
                EngineState::Uninitialized | EngineState::Initializing => {}
            }
            if rx.changed().await.is_err() {
                return false;
            }
        }
    }

    /// Attach an engine unless one was already attempted
    pub fn initialize(&self) {
        self.ensure_worker();

        let mut slot = self.shared.lock_slot();
        if slot.state != EngineState::Uninitialized {
            return;
        }
        slot.generation += 1;
        let generation = slot.generation;
        slot.state = EngineState::Initializing;
        self.shared.state_tx.send_replace(EngineState::Initializing);

        let listener = EngineListener::new(generation, self.shared.signals.clone());
        match self.shared.factory.create(listener) {
            Ok(engine) => {
                debug!(target: "tts", generation, "Engine created; awaiting init callback");
                slot.engine = Some(engine);
            }
            Err(e) => {
                warn!(target: "tts", error = %e, "Engine creation failed");
                // Same path as an engine reporting init failure
                let _ = self.shared.signals.send(EngineSignal {
                    generation,
                    callback: EngineCallback::Init(InitStatus::Error),
                });
            }
        }
    }

    pub fn speak(&self, request: &SpeakRequest) -> Result<SpeakResult, CallRejection> {
        self.initialize();

        let mut slot = self.shared.lock_slot();
        if slot.state != EngineState::Ready {
            return Err(CallRejection::new(REJECT_NOT_READY));
        }

        let Some(text) = request.usable_text() else {
            return Err(CallRejection::new(REJECT_MISSING_TEXT));
        };
        let utterance_id = request.resolved_utterance_id();

        let Some(engine) = slot.engine.as_mut() else {
            return Err(CallRejection::new(REJECT_NOT_READY));
        };
        if let Err(e) = engine.speak(text, QueueMode::Flush, &utterance_id) {
            warn!(target: "tts", utterance_id = %utterance_id, error = %e, "Speak submission failed");
            return Err(CallRejection::new(REJECT_SPEAK_FAILED));
        }

        debug!(target: "tts", utterance_id = %utterance_id, chars = text.len(), "Utterance submitted");
        Ok(SpeakResult {
            ok: true,
            utterance_id,
        })
    }

    pub fn stop(&self) -> StopResult {
        if let Some(engine) = self.shared.lock_slot().engine.as_mut() {
            engine.stop();
        }
        StopResult { ok: true }
    }

    /// Stop, release the engine and forget readiness. Idempotent.
    pub fn teardown(&self) {
        let mut slot = self.shared.lock_slot();
        if let Some(mut engine) = slot.engine.take() {
            engine.stop();
            engine.shutdown();
            info!(target: "tts", generation = slot.generation, "Engine released");
        }
        // Callbacks from the released engine are now stale
        slot.generation += 1;
        slot.state = EngineState::Uninitialized;
        self.shared.state_tx.send_replace(EngineState::Uninitialized);
    }

    fn ensure_worker(&self) {
        let mut rx_guard = self.signal_rx.lock().unwrap_or_else(|e| e.into_inner());
        if rx_guard.is_none() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(target: "tts", "No Tokio runtime; engine callbacks are buffered");
            return;
        };
        if let Some(rx) = rx_guard.take() {
            let shared = Arc::clone(&self.shared);
            let join = handle.spawn(shared.run(rx));
            *self.worker.lock().unwrap_or_else(|e| e.into_inner()) = Some(join);
        }
    }
}

impl Drop for TtsPlugin {
    fn drop(&mut self) {
        if let Some(join) = self
            .worker
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            join.abort();
        }
    }
}

impl Shared {
    fn lock_slot(&self) -> MutexGuard<'_, EngineSlot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn run(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<EngineSignal>) {
        while let Some(signal) = rx.recv().await {
            if let Some(event) = self.apply(signal) {
                self.emit(event).await;
            }
        }
    }

    /// Fold one engine signal into the state machine; returns the event to emit
    fn apply(&self, signal: EngineSignal) -> Option<SpeechEvent> {
        let mut slot = self.lock_slot();
        if signal.generation != slot.generation {
            debug!(target: "tts", generation = signal.generation, current = slot.generation, "Dropping stale engine signal");
            return None;
        }

        match signal.callback {
            EngineCallback::Init(status) => {
                if slot.state != EngineState::Initializing {
                    warn!(target: "tts", ?status, state = ?slot.state, "Ignoring repeated init callback");
                    return None;
                }
                match status {
                    InitStatus::Success => {
                        slot.state = EngineState::Ready;
                        let language = slot
                            .engine
                            .as_mut()
                            .map(|e| e.set_language(DEFAULT_LOCALE))
                            .unwrap_or(LanguageSupport::NotSupported);
                        self.state_tx.send_replace(EngineState::Ready);
                        info!(target: "tts", ?language, "Engine ready");
                        if language.is_usable() {
                            None
                        } else {
                            Some(SpeechEvent::engine_error(CODE_LANG_FAILED, MSG_LANG_FAILED))
                        }
                    }
                    InitStatus::Error => {
                        slot.state = EngineState::Failed;
                        self.state_tx.send_replace(EngineState::Failed);
                        warn!(target: "tts", "Engine failed to initialize");
                        Some(SpeechEvent::engine_error(CODE_INIT_FAILED, MSG_INIT_FAILED))
                    }
                }
            }
            EngineCallback::Start { utterance_id } => Some(SpeechEvent::Start { utterance_id }),
            EngineCallback::Done { utterance_id } => Some(SpeechEvent::Done { utterance_id }),
            EngineCallback::Error {
                utterance_id,
                error_code,
            } => Some(SpeechEvent::utterance_error(utterance_id, error_code)),
            EngineCallback::Stopped {
                utterance_id,
                interrupted,
            } => {
                debug!(target: "tts", utterance_id = %utterance_id, interrupted, "Utterance stopped");
                None
            }
        }
    }

    async fn emit(&self, event: SpeechEvent) {
        debug!(target: "tts", event = event.name(), utterance_id = ?event.utterance_id(), "Emitting");
        if let Err(e) = self.bus.publish(PLUGIN_NAME, event.to_bridge_event()).await {
            warn!(target: "tts", error = %e, "Failed to publish speech event");
        }
    }
}

fn to_payload<T: Serialize>(value: &T) -> CallResult {
    serde_json::to_value(value).map_err(|e| CallRejection::new(e.to_string()))
}

#[async_trait]
impl Plugin for TtsPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    async fn load(&self) -> rmf_core::Result<()> {
        self.initialize();
        Ok(())
    }

    async fn handle_call(&self, call: PluginCall) -> CallResult {
        match call.method.as_str() {
            "speak" => to_payload(&self.speak(&SpeakRequest::from_call(&call))?),
            "stop" => to_payload(&self.stop()),
            other => Err(CallRejection::new(format!(
                "Method not implemented: {}",
                other
            ))),
        }
    }

    async fn handle_on_destroy(&self) -> rmf_core::Result<()> {
        self.teardown();
        Ok(())
    }
}
