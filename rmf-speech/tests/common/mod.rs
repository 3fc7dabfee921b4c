//! Scripted speech engine shared by the integration tests.
#![allow(dead_code)]

use rmf_core::{BridgeEvent, EventBus, QoSLevel, RmfError};
use rmf_speech::{
    EngineListener, InitStatus, LanguageSupport, QueueMode, SpeechEngine, SpeechEngineFactory,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    SetLanguage(String),
    Speak {
        text: String,
        mode: QueueMode,
        utterance_id: String,
    },
    Stop,
    Shutdown,
}

#[derive(Clone)]
pub struct ScriptedFactory {
    /// Init result delivered during `create`; `None` leaves the engine initializing
    pub auto_init: Option<InitStatus>,
    pub fail_create: bool,
    pub language: LanguageSupport,
    pub fail_speak: bool,
    /// Report Start then Done for every accepted utterance
    pub auto_complete: bool,
    pub calls: Arc<Mutex<Vec<EngineCall>>>,
    pub listeners: Arc<Mutex<Vec<EngineListener>>>,
}

impl Default for ScriptedFactory {
    fn default() -> Self {
        Self {
            auto_init: Some(InitStatus::Success),
            fail_create: false,
            language: LanguageSupport::Available,
            fail_speak: false,
            auto_complete: false,
            calls: Arc::new(Mutex::new(Vec::new())),
            listeners: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl ScriptedFactory {
    pub fn pending() -> Self {
        Self {
            auto_init: None,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn spoken(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                EngineCall::Speak {
                    text, utterance_id, ..
                } => Some((text, utterance_id)),
                _ => None,
            })
            .collect()
    }

    pub fn created(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    /// Listener handed to the most recently created engine
    pub fn listener(&self) -> EngineListener {
        self.listeners
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no engine created")
    }

    pub fn listener_at(&self, i: usize) -> EngineListener {
        self.listeners.lock().unwrap()[i].clone()
    }
}

impl SpeechEngineFactory for ScriptedFactory {
    fn name(&self) -> &str {
        "scripted"
    }

    fn create(&self, listener: EngineListener) -> rmf_core::Result<Box<dyn SpeechEngine>> {
        self.listeners.lock().unwrap().push(listener.clone());
        if self.fail_create {
            return Err(RmfError::EngineError("no synthesizer".into()));
        }
        if let Some(status) = self.auto_init {
            listener.init(status);
        }
        Ok(Box::new(ScriptedEngine {
            factory: self.clone(),
            listener,
        }))
    }
}

pub struct ScriptedEngine {
    factory: ScriptedFactory,
    listener: EngineListener,
}

impl ScriptedEngine {
    fn record(&self, call: EngineCall) {
        self.factory.calls.lock().unwrap().push(call);
    }
}

impl SpeechEngine for ScriptedEngine {
    fn set_language(&mut self, locale: &str) -> LanguageSupport {
        self.record(EngineCall::SetLanguage(locale.to_string()));
        self.factory.language
    }

    fn speak(&mut self, text: &str, mode: QueueMode, utterance_id: &str) -> rmf_core::Result<()> {
        self.record(EngineCall::Speak {
            text: text.to_string(),
            mode,
            utterance_id: utterance_id.to_string(),
        });
        if self.factory.fail_speak {
            return Err(RmfError::EngineError("queue full".into()));
        }
        if self.factory.auto_complete {
            self.listener.start(utterance_id);
            self.listener.done(utterance_id);
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.record(EngineCall::Stop);
    }

    fn shutdown(&mut self) {
        self.record(EngineCall::Shutdown);
    }
}

pub async fn listen(bus: &EventBus) -> mpsc::Receiver<BridgeEvent> {
    let (_id, rx) = bus
        .subscribe("Tts", vec![], QoSLevel::Batched)
        .await
        .expect("subscribe");
    rx
}

pub async fn next_event(rx: &mut mpsc::Receiver<BridgeEvent>) -> BridgeEvent {
    tokio::time::timeout(Duration::from_millis(500), rx.recv())
        .await
        .expect("timeout waiting for event")
        .expect("channel closed")
}

pub async fn assert_quiet(rx: &mut mpsc::Receiver<BridgeEvent>) {
    let got = tokio::time::timeout(Duration::from_millis(150), rx.recv()).await;
    assert!(got.is_err(), "unexpected event: {:?}", got);
}
