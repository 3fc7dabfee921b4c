use std::fs;
use std::path::{Path, PathBuf};

use rmf_core::telemetry::DEFAULT_LOG_FILTER;
use rmf_speech::{EngineChoice, TtsConfig};

/// High-level configuration for the host shell
#[derive(Clone, Debug)]
pub struct HostConfig {
    /// Read from RMF_LOG only; tracing is installed before the TOML is read
    pub log_filter: String,
    pub tts: TtsConfig,
    /// Echo events from the Tts topic to the log
    pub trace_events: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            log_filter: std::env::var("RMF_LOG")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| format!("{},rmf_host=info", DEFAULT_LOG_FILTER)),
            tts: TtsConfig::from_env(),
            trace_events: std::env::var("RMF_TRACE_EVENTS")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(true),
        }
    }
}

impl HostConfig {
    /// Load configuration from a TOML file (`path`, else RMF_HOST_CONFIG, else ./rmf_host.toml),
    /// overlaying values onto env-driven defaults.
    pub fn load(path: Option<&Path>) -> Self {
        let default = Self::default();
        let path = path.map(Path::to_path_buf).unwrap_or_else(|| {
            PathBuf::from(std::env::var("RMF_HOST_CONFIG").unwrap_or_else(|_| "rmf_host.toml".into()))
        });
        let p = path.as_path();
        if !p.exists() {
            tracing::info!(target: "rmf_host", path = %p.display(), "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(p) {
            Ok(s) => match Self::from_toml_str(&s, default.clone()) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!(target: "rmf_host", error = %e, "Failed to parse TOML; using defaults");
                    default
                }
            },
            Err(e) => {
                tracing::warn!(target: "rmf_host", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }

    pub fn from_toml_str(s: &str, base: HostConfig) -> Result<Self, toml::de::Error> {
        let t = toml::from_str::<HostToml>(s)?;
        Ok(t.overlay(base))
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct HostToml {
    pub trace_events: Option<bool>,
    pub tts: Option<TtsToml>,
}

impl HostToml {
    fn overlay(self, mut base: HostConfig) -> HostConfig {
        if let Some(t) = self.trace_events {
            base.trace_events = t;
        }
        if let Some(t) = self.tts {
            t.apply(&mut base.tts);
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct TtsToml {
    pub engine: Option<String>,
    pub espeak_bin: Option<PathBuf>,
    pub voice: Option<String>,
    pub rate: Option<f32>,
    pub volume: Option<f32>,
}

impl TtsToml {
    fn apply(self, t: &mut TtsConfig) {
        if let Some(x) = self.engine.as_deref().and_then(EngineChoice::parse) {
            t.engine = x;
        }
        if let Some(x) = self.espeak_bin {
            t.espeak.bin = Some(x);
        }
        if let Some(x) = self.voice {
            t.espeak.voice = Some(x);
        }
        if let Some(x) = self.rate {
            t.espeak.rate = x;
        }
        if let Some(x) = self.volume {
            t.espeak.volume = x;
        }
    }
}
