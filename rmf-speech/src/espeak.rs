//! espeak-ng backend.
//!
//! Each utterance is one `espeak-ng` process playing straight to the audio
//! device. Flushing kills the running process. A watcher thread per utterance
//! reports Done/Error when the process exits on its own.

use crate::config::EspeakConfig;
use crate::engine::{
    EngineListener, InitStatus, LanguageSupport, QueueMode, SpeechEngine, SpeechEngineFactory,
};
use rmf_core::{Result, RmfError};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub struct EspeakFactory {
    cfg: EspeakConfig,
}

impl EspeakFactory {
    pub fn new(cfg: EspeakConfig) -> Self {
        Self { cfg }
    }
}

impl SpeechEngineFactory for EspeakFactory {
    fn name(&self) -> &str {
        "espeak-ng"
    }

    fn create(&self, listener: EngineListener) -> Result<Box<dyn SpeechEngine>> {
        let bin = self
            .cfg
            .bin
            .clone()
            .ok_or_else(|| RmfError::EngineError("espeak-ng not found".into()))?;

        let voices = Arc::new(Mutex::new(Vec::new()));

        // Probe off-thread; init is reported like a platform callback
        let probe_bin = bin.clone();
        let probe_voices = Arc::clone(&voices);
        let probe_listener = listener.clone();
        thread::Builder::new()
            .name("espeak-init".into())
            .spawn(move || match list_voices(&probe_bin) {
                Ok(found) => {
                    debug!(target: "tts", count = found.len(), "espeak-ng voices listed");
                    *probe_voices.lock().unwrap_or_else(|e| e.into_inner()) = found;
                    probe_listener.init(InitStatus::Success);
                }
                Err(e) => {
                    warn!(target: "tts", error = %e, "espeak-ng probe failed");
                    probe_listener.init(InitStatus::Error);
                }
            })?;

        Ok(Box::new(EspeakEngine {
            bin,
            cfg: self.cfg.clone(),
            listener,
            voices,
            language: None,
            current: Arc::new(Mutex::new(None)),
            serial: 0,
            shut_down: false,
        }))
    }
}

struct Playback {
    serial: u64,
    utterance_id: String,
    child: Child,
}

pub struct EspeakEngine {
    bin: PathBuf,
    cfg: EspeakConfig,
    listener: EngineListener,
    voices: Arc<Mutex<Vec<String>>>,
    language: Option<String>,
    current: Arc<Mutex<Option<Playback>>>,
    serial: u64,
    shut_down: bool,
}

impl EspeakEngine {
    fn voice(&self) -> Option<&str> {
        self.cfg.voice.as_deref().or(self.language.as_deref())
    }

    fn halt_current(&mut self) {
        let taken = self.current.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(mut playback) = taken {
            if let Err(e) = playback.child.kill() {
                debug!(target: "tts", error = %e, "espeak-ng already exited");
            }
            self.listener.stopped(&playback.utterance_id, true);
            reap(playback.child);
        }
    }
}

impl SpeechEngine for EspeakEngine {
    fn set_language(&mut self, locale: &str) -> LanguageSupport {
        let wanted = locale.replace('_', "-").to_ascii_lowercase();
        let voices = self.voices.lock().unwrap_or_else(|e| e.into_inner());
        if voices.is_empty() {
            return LanguageSupport::MissingData;
        }
        if voices.iter().any(|v| *v == wanted) {
            self.language = Some(wanted);
            LanguageSupport::Available
        } else {
            LanguageSupport::NotSupported
        }
    }

    fn speak(&mut self, text: &str, mode: QueueMode, utterance_id: &str) -> Result<()> {
        if self.shut_down {
            return Err(RmfError::EngineError("engine shut down".into()));
        }
        if mode == QueueMode::Add {
            debug!(target: "tts", "espeak-ng backend has no queue; flushing");
        }
        self.halt_current();

        let mut cmd = Command::new(&self.bin);
        if let Some(voice) = self.voice() {
            cmd.arg("-v").arg(voice);
        }
        cmd.arg("-s").arg(self.cfg.words_per_minute().to_string());
        cmd.arg("-a").arg(self.cfg.amplitude().to_string());
        cmd.arg("--").arg(text);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());

        debug!(target: "tts", command = ?cmd, "Running espeak-ng");
        let child = cmd.spawn()?;

        self.serial += 1;
        let serial = self.serial;
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(Playback {
            serial,
            utterance_id: utterance_id.to_string(),
            child,
        });
        self.listener.start(utterance_id);

        let current = Arc::clone(&self.current);
        let listener = self.listener.clone();
        let id = utterance_id.to_string();
        thread::Builder::new()
            .name("espeak-watch".into())
            .spawn(move || watch_playback(current, listener, serial, id))?;
        Ok(())
    }

    fn stop(&mut self) {
        self.halt_current();
    }

    fn shutdown(&mut self) {
        self.halt_current();
        self.shut_down = true;
    }
}

fn watch_playback(
    current: Arc<Mutex<Option<Playback>>>,
    listener: EngineListener,
    serial: u64,
    utterance_id: String,
) {
    loop {
        thread::sleep(POLL_INTERVAL);
        let mut guard = current.lock().unwrap_or_else(|e| e.into_inner());
        let status = match guard.as_mut() {
            Some(p) if p.serial == serial => p.child.try_wait(),
            // Replaced or stopped; whoever halted it reported Stopped
            _ => return,
        };
        match status {
            Ok(None) => continue,
            Ok(Some(exit)) => {
                guard.take();
                drop(guard);
                if exit.success() {
                    listener.done(&utterance_id);
                } else {
                    listener.error(&utterance_id, exit.code());
                }
                return;
            }
            Err(e) => {
                guard.take();
                drop(guard);
                warn!(target: "tts", error = %e, "Lost track of espeak-ng process");
                listener.error(&utterance_id, None);
                return;
            }
        }
    }
}

/// Collect a killed process off the caller's thread; callers hold the engine lock
fn reap(mut child: Child) {
    let spawned = thread::Builder::new()
        .name("espeak-reap".into())
        .spawn(move || {
            if let Err(e) = child.wait() {
                debug!(target: "tts", error = %e, "Failed to reap espeak-ng process");
            }
        });
    if let Err(e) = spawned {
        debug!(target: "tts", error = %e, "Could not spawn espeak-ng reaper");
    }
}

/// Language column of `espeak-ng --voices`, lowercased
fn list_voices(bin: &Path) -> std::io::Result<Vec<String>> {
    let output = Command::new(bin).arg("--voices").output()?;
    if !output.status.success() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!(
                "espeak-ng --voices failed: {}",
                String::from_utf8_lossy(&output.stderr)
            ),
        ));
    }
    Ok(parse_voice_list(&String::from_utf8_lossy(&output.stdout)))
}

fn parse_voice_list(listing: &str) -> Vec<String> {
    listing
        .lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(str::to_ascii_lowercase)
        .collect()
}
