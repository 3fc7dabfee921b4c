// ReadMyFeed Core Library
// Native host shell runtime: plugin bridge, event bus, page context

pub mod event;
pub mod host;
pub mod launch;
pub mod page;
pub mod plugin;
pub mod telemetry;
pub(crate) mod utils;

// Export core types
pub use event::{BridgeEvent, EventBus, EventBusStats, QoSLevel};
pub use host::HostShell;
pub use launch::{ExtraValue, LaunchParams, StartupParams};
pub use page::{PageConfig, PageContext, PageScheduler, PageTask, ScriptEvaluator, ScriptPage};
pub use plugin::{CallRejection, CallResult, Plugin, PluginCall, PluginManager};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RmfError {
    #[error("Event bus error: {0}")]
    EventBusError(String),

    #[error("Plugin error: {0}")]
    PluginError(String),

    #[error("Page error: {0}")]
    PageError(String),

    #[error("Engine error: {0}")]
    EngineError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
pub type Result<T> = std::result::Result<T, RmfError>;
