//! Sequential reading of a feed through the `Tts` plugin.
//!
//! Every utterance id carries the queue session and item index
//! (`rmf_q<session>_<index>`), so events belonging to a session that was
//! stopped or restarted are ignored.

use crate::models::{SpeakRequest, SpeechEvent, PLUGIN_NAME};
use crate::plugin::TtsPlugin;
use crate::text::{build_speech_text, FeedItem};
use rmf_core::{BridgeEvent, QoSLevel, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const UTTERANCE_PREFIX: &str = "rmf_q";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    IndexChanged { index: usize, item: FeedItem },
    Finished,
    Failed { message: String },
}

pub type TextBuilder = fn(&FeedItem) -> String;

#[derive(Default)]
struct QueueState {
    items: Vec<FeedItem>,
    current_index: usize,
    session_id: u64,
    is_playing: bool,
}

struct Inner {
    tts: Arc<TtsPlugin>,
    text_builder: TextBuilder,
    state: Mutex<QueueState>,
    events: mpsc::UnboundedSender<QueueEvent>,
}

pub struct SpeechQueue {
    inner: Arc<Inner>,
    subscription_id: String,
    listener: JoinHandle<()>,
}

impl SpeechQueue {
    pub async fn new(tts: Arc<TtsPlugin>) -> Result<(Self, mpsc::UnboundedReceiver<QueueEvent>)> {
        Self::with_text_builder(tts, build_speech_text).await
    }

    pub async fn with_text_builder(
        tts: Arc<TtsPlugin>,
        text_builder: TextBuilder,
    ) -> Result<(Self, mpsc::UnboundedReceiver<QueueEvent>)> {
        let (subscription_id, rx) = tts
            .bus()
            .subscribe(PLUGIN_NAME, vec![], QoSLevel::Batched)
            .await?;
        let (events, events_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            tts,
            text_builder,
            state: Mutex::new(QueueState::default()),
            events,
        });
        let listener = tokio::spawn(Arc::clone(&inner).listen(rx));
        Ok((
            Self {
                inner,
                subscription_id,
                listener,
            },
            events_rx,
        ))
    }

    /// Replace the list and start reading at `start_index` (clamped)
    pub fn play(&self, items: Vec<FeedItem>, start_index: usize) {
        self.inner.lock_state().items = items;
        self.inner.start_at(start_index);
    }

    /// Restart at the current index
    pub fn resume(&self) {
        let index = {
            let state = self.inner.lock_state();
            if state.items.is_empty() {
                return;
            }
            state.current_index
        };
        self.inner.start_at(index);
    }

    pub fn stop(&self) {
        {
            let mut state = self.inner.lock_state();
            state.session_id += 1;
            state.is_playing = false;
        }
        self.inner.tts.stop();
    }

    /// Swap the list without interrupting; the index is kept in range
    pub fn update_items(&self, items: Vec<FeedItem>) {
        let mut state = self.inner.lock_state();
        if state.current_index + 1 > items.len() {
            state.current_index = items.len().saturating_sub(1);
        }
        state.items = items;
    }

    pub fn current_index(&self) -> usize {
        self.inner.lock_state().current_index
    }

    pub fn is_playing(&self) -> bool {
        self.inner.lock_state().is_playing
    }

    /// Stop reading and detach from the plugin's events
    pub async fn close(self) -> Result<()> {
        self.stop();
        self.inner
            .tts
            .bus()
            .unsubscribe(&self.subscription_id)
            .await
    }
}

impl Drop for SpeechQueue {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

pub fn utterance_id(session: u64, index: usize) -> String {
    format!("{}{}_{}", UTTERANCE_PREFIX, session, index)
}

pub fn parse_utterance_id(id: &str) -> Option<(u64, usize)> {
    let (session, index) = id.strip_prefix(UTTERANCE_PREFIX)?.split_once('_')?;
    Some((session.parse().ok()?, index.parse().ok()?))
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn send(&self, event: QueueEvent) {
        let _ = self.events.send(event);
    }

    fn start_at(&self, index: usize) {
        let (index, session) = {
            let mut state = self.lock_state();
            if state.items.is_empty() {
                state.current_index = 0;
                state.is_playing = false;
                return;
            }
            let clamped = index.min(state.items.len() - 1);
            state.session_id += 1;
            state.is_playing = true;
            state.current_index = clamped;
            (clamped, state.session_id)
        };
        self.tts.stop();
        self.speak_index(index, session);
    }

    fn speak_index(&self, index: usize, session: u64) {
        let item = {
            let state = self.lock_state();
            if state.session_id != session {
                return;
            }
            state.items.get(index).cloned()
        };
        let Some(item) = item else {
            self.finish(session);
            return;
        };

        let request = SpeakRequest::new((self.text_builder)(&item))
            .with_utterance_id(utterance_id(session, index));
        if let Err(rejection) = self.tts.speak(&request) {
            warn!(target: "tts", index, reason = %rejection, "Queue could not speak item");
            {
                let mut state = self.lock_state();
                if state.session_id != session {
                    return;
                }
                state.is_playing = false;
            }
            self.send(QueueEvent::Failed {
                message: rejection.message,
            });
        }
    }

    fn finish(&self, session: u64) {
        {
            let mut state = self.lock_state();
            if state.session_id != session {
                return;
            }
            state.is_playing = false;
        }
        self.send(QueueEvent::Finished);
    }

    async fn listen(self: Arc<Self>, mut rx: mpsc::Receiver<BridgeEvent>) {
        while let Some(raw) = rx.recv().await {
            if let Some(event) = SpeechEvent::from_bridge_event(&raw) {
                self.on_speech_event(event);
            }
        }
    }

    fn on_speech_event(&self, event: SpeechEvent) {
        let Some((session, index)) = event.utterance_id().and_then(parse_utterance_id) else {
            debug!(target: "tts", event = event.name(), "Event not addressed to the queue");
            return;
        };
        if self.lock_state().session_id != session {
            return;
        }

        match event {
            SpeechEvent::Start { .. } => {
                let item = {
                    let mut state = self.lock_state();
                    if state.session_id != session {
                        return;
                    }
                    state.current_index = index;
                    state.items.get(index).cloned()
                };
                if let Some(item) = item {
                    self.send(QueueEvent::IndexChanged { index, item });
                }
            }
            SpeechEvent::Done { .. } => {
                let next = index + 1;
                let len = self.lock_state().items.len();
                if next >= len {
                    self.finish(session);
                } else {
                    self.speak_index(next, session);
                }
            }
            SpeechEvent::Error { message, .. } => {
                {
                    let mut state = self.lock_state();
                    if state.session_id != session {
                        return;
                    }
                    state.is_playing = false;
                }
                self.send(QueueEvent::Failed { message });
            }
        }
    }
}
