// Request, result and event shapes of the Tts bridge
use rmf_core::{BridgeEvent, PluginCall};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PLUGIN_NAME: &str = "Tts";
pub const DEFAULT_UTTERANCE_ID: &str = "rmf_utterance";

pub const EVENT_START: &str = "ttsStart";
pub const EVENT_DONE: &str = "ttsDone";
pub const EVENT_ERROR: &str = "ttsError";

pub const CODE_INIT_FAILED: &str = "tts_init_failed";
pub const CODE_LANG_FAILED: &str = "tts_lang_failed";
pub const CODE_UTTERANCE_ERROR: &str = "tts_error";

pub const MSG_INIT_FAILED: &str = "Failed to initialize TextToSpeech";
pub const MSG_LANG_FAILED: &str = "Locale.US missing or not supported";

pub const REJECT_NOT_READY: &str = "TTS not ready";
pub const REJECT_MISSING_TEXT: &str = "Missing text";
pub const REJECT_SPEAK_FAILED: &str = "TTS speak failed";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakRequest {
    pub text: Option<String>,
    pub utterance_id: Option<String>,
}

impl SpeakRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            utterance_id: None,
        }
    }

    pub fn with_utterance_id(mut self, id: impl Into<String>) -> Self {
        self.utterance_id = Some(id.into());
        self
    }

    /// Read from a page call; non-string fields count as absent
    pub fn from_call(call: &PluginCall) -> Self {
        Self {
            text: call.get_string("text"),
            utterance_id: call.get_string("utteranceId"),
        }
    }

    /// Text if present and not blank, untrimmed
    pub fn usable_text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.trim().is_empty())
    }

    pub fn resolved_utterance_id(&self) -> String {
        match self.utterance_id.as_deref() {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => DEFAULT_UTTERANCE_ID.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakResult {
    pub ok: bool,
    pub utterance_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopResult {
    pub ok: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtterancePayload {
    pub utterance_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utterance_id: Option<String>,
    pub code: String,
    pub message: String,
}

/// Lifecycle events pushed to the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    Start {
        utterance_id: String,
    },
    Done {
        utterance_id: String,
    },
    Error {
        utterance_id: Option<String>,
        code: String,
        message: String,
    },
}

impl SpeechEvent {
    pub fn engine_error(code: &str, message: impl Into<String>) -> Self {
        SpeechEvent::Error {
            utterance_id: None,
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn utterance_error(utterance_id: impl Into<String>, error_code: Option<i32>) -> Self {
        let message = match error_code {
            Some(code) => format!("TTS error code={}", code),
            None => "TTS error".to_string(),
        };
        SpeechEvent::Error {
            utterance_id: Some(utterance_id.into()),
            code: CODE_UTTERANCE_ERROR.to_string(),
            message,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SpeechEvent::Start { .. } => EVENT_START,
            SpeechEvent::Done { .. } => EVENT_DONE,
            SpeechEvent::Error { .. } => EVENT_ERROR,
        }
    }

    pub fn utterance_id(&self) -> Option<&str> {
        match self {
            SpeechEvent::Start { utterance_id } | SpeechEvent::Done { utterance_id } => {
                Some(utterance_id)
            }
            SpeechEvent::Error { utterance_id, .. } => utterance_id.as_deref(),
        }
    }

    pub fn payload(&self) -> Value {
        let value = match self {
            SpeechEvent::Start { utterance_id } | SpeechEvent::Done { utterance_id } => {
                serde_json::to_value(UtterancePayload {
                    utterance_id: utterance_id.clone(),
                })
            }
            SpeechEvent::Error {
                utterance_id,
                code,
                message,
            } => serde_json::to_value(ErrorPayload {
                utterance_id: utterance_id.clone(),
                code: code.clone(),
                message: message.clone(),
            }),
        };
        // plain structs of strings always serialize
        value.unwrap_or(Value::Null)
    }

    pub fn to_bridge_event(&self) -> BridgeEvent {
        BridgeEvent::new(PLUGIN_NAME, self.name(), self.payload())
    }

    /// Inverse of [`SpeechEvent::to_bridge_event`]; `None` for foreign events
    pub fn from_bridge_event(event: &BridgeEvent) -> Option<Self> {
        match event.name.as_str() {
            EVENT_START | EVENT_DONE => {
                let p: UtterancePayload = serde_json::from_value(event.data.clone()).ok()?;
                Some(if event.name == EVENT_START {
                    SpeechEvent::Start {
                        utterance_id: p.utterance_id,
                    }
                } else {
                    SpeechEvent::Done {
                        utterance_id: p.utterance_id,
                    }
                })
            }
            EVENT_ERROR => {
                let p: ErrorPayload = serde_json::from_value(event.data.clone()).ok()?;
                Some(SpeechEvent::Error {
                    utterance_id: p.utterance_id,
                    code: p.code,
                    message: p.message,
                })
            }
            _ => None,
        }
    }
}
