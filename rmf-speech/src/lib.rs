// Speech capabilities for the ReadMyFeed host

pub mod config;
pub mod engine;
pub mod log_only;
pub mod models;
pub mod plugin;
pub mod queue;
pub mod text;

#[cfg(feature = "espeak")]
pub mod espeak;

pub use config::{select_engine_factory, EngineChoice, EspeakConfig, TtsConfig};
pub use engine::{
    EngineCallback, EngineListener, EngineSignal, InitStatus, LanguageSupport, QueueMode,
    SpeechEngine, SpeechEngineFactory,
};
pub use models::{SpeakRequest, SpeakResult, SpeechEvent, StopResult};
pub use plugin::{EngineState, TtsPlugin};
pub use queue::{QueueEvent, SpeechQueue};
pub use text::{build_speech_text, FeedItem, FeedSource};

#[cfg(feature = "espeak")]
pub use espeak::EspeakFactory;
