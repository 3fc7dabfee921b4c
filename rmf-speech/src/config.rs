//! Engine selection and backend settings.
//!
//! Env overrides:
//! - TTS_ENGINE: auto | espeak | log
//! - ESPEAK_BIN, TTS_VOICE, TTS_RATE, TTS_VOLUME

use crate::engine::SpeechEngineFactory;
use crate::log_only::LogOnlyFactory;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EngineChoice {
    /// espeak-ng when installed, otherwise log-only
    #[default]
    Auto,
    Espeak,
    LogOnly,
}

impl EngineChoice {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(EngineChoice::Auto),
            "espeak" | "espeak-ng" => Some(EngineChoice::Espeak),
            "log" | "none" | "log-only" => Some(EngineChoice::LogOnly),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct EspeakConfig {
    pub bin: Option<PathBuf>,
    /// espeak voice; the bridge's locale is used when unset
    pub voice: Option<String>,
    /// 0.5–2.0, 1.0 is 160 words per minute
    pub rate: f32,
    /// 0.5–2.0
    pub volume: f32,
}

impl Default for EspeakConfig {
    fn default() -> Self {
        let bin = get_from_env_or_path("ESPEAK_BIN", "espeak-ng").or_else(|| get_from_path("espeak"));
        let voice = std::env::var("TTS_VOICE").ok().filter(|s| !s.is_empty());
        let rate = std::env::var("TTS_RATE")
            .ok()
            .and_then(|s| s.parse::<f32>().ok())
            .unwrap_or(1.0);
        let volume = std::env::var("TTS_VOLUME")
            .ok()
            .and_then(|s| s.parse::<f32>().ok())
            .unwrap_or(1.0);
        Self {
            bin,
            voice,
            rate,
            volume,
        }
    }
}

impl EspeakConfig {
    pub fn words_per_minute(&self) -> i32 {
        (160.0 * self.rate.clamp(0.5, 2.0)).round().clamp(80.0, 450.0) as i32
    }

    pub fn amplitude(&self) -> i32 {
        (100.0 * self.volume.clamp(0.5, 2.0)).round().clamp(50.0, 200.0) as i32
    }
}

#[derive(Clone, Debug, Default)]
pub struct TtsConfig {
    pub engine: EngineChoice,
    pub espeak: EspeakConfig,
}

impl TtsConfig {
    pub fn from_env() -> Self {
        let engine = std::env::var("TTS_ENGINE")
            .ok()
            .and_then(|s| EngineChoice::parse(&s))
            .unwrap_or_default();
        Self {
            engine,
            espeak: EspeakConfig::default(),
        }
    }
}

/// Pick the engine backend for a config
pub fn select_engine_factory(cfg: &TtsConfig) -> Arc<dyn SpeechEngineFactory> {
    match cfg.engine {
        EngineChoice::LogOnly => Arc::new(LogOnlyFactory),
        EngineChoice::Espeak => espeak_or_log(cfg, true),
        EngineChoice::Auto => espeak_or_log(cfg, false),
    }
}

#[cfg(feature = "espeak")]
fn espeak_or_log(cfg: &TtsConfig, required: bool) -> Arc<dyn SpeechEngineFactory> {
    if cfg.espeak.bin.is_some() || required {
        if let Some(ref bin) = cfg.espeak.bin {
            info!(target: "tts", bin = ?bin, "Detected espeak-ng binary");
        }
        // A missing binary surfaces as tts_init_failed when required
        return Arc::new(crate::espeak::EspeakFactory::new(cfg.espeak.clone()));
    }
    warn!(target: "tts", "No TTS engine detected. Logging only.");
    Arc::new(LogOnlyFactory)
}

#[cfg(not(feature = "espeak"))]
fn espeak_or_log(_cfg: &TtsConfig, required: bool) -> Arc<dyn SpeechEngineFactory> {
    if required {
        warn!(target: "tts", "espeak support not compiled in; logging only");
    } else {
        info!(target: "tts", "Logging-only speech engine selected");
    }
    Arc::new(LogOnlyFactory)
}

fn get_from_env_or_path(env_key: &str, default_bin: &str) -> Option<PathBuf> {
    if let Ok(p) = std::env::var(env_key) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Some(pb);
        }
    }
    get_from_path(default_bin)
}

fn get_from_path(bin: &str) -> Option<PathBuf> {
    // If a path-like string is provided, respect it directly
    if bin.contains(std::path::MAIN_SEPARATOR) {
        let p = PathBuf::from(bin);
        return if p.exists() { Some(p) } else { None };
    }

    if let Some(paths_os) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&paths_os) {
            let candidate = dir.join(bin);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }
    None
}
