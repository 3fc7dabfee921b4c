// Fallback engine used when no synthesizer is installed: logs the text and
// reports the utterance as finished straight away.
use crate::engine::{
    EngineListener, InitStatus, LanguageSupport, QueueMode, SpeechEngine, SpeechEngineFactory,
};
use rmf_core::{Result, RmfError};
use tracing::info;

pub struct LogOnlyFactory;

impl SpeechEngineFactory for LogOnlyFactory {
    fn name(&self) -> &str {
        "log-only"
    }

    fn create(&self, listener: EngineListener) -> Result<Box<dyn SpeechEngine>> {
        listener.init(InitStatus::Success);
        Ok(Box::new(LogOnlyEngine {
            listener,
            shut_down: false,
        }))
    }
}

pub struct LogOnlyEngine {
    listener: EngineListener,
    shut_down: bool,
}

impl SpeechEngine for LogOnlyEngine {
    fn set_language(&mut self, _locale: &str) -> LanguageSupport {
        LanguageSupport::Available
    }

    fn speak(&mut self, text: &str, _mode: QueueMode, utterance_id: &str) -> Result<()> {
        if self.shut_down {
            return Err(RmfError::EngineError("engine shut down".into()));
        }
        info!(target: "tts", utterance_id, text, "Speak (no engine)");
        self.listener.start(utterance_id);
        self.listener.done(utterance_id);
        Ok(())
    }

    fn stop(&mut self) {}

    fn shutdown(&mut self) {
        self.shut_down = true;
    }
}
