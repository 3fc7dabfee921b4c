// Plugin system implementation
use crate::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// A rejected bridge call. The message is what the page sees.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct CallRejection {
    pub message: String,
}

impl CallRejection {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub type CallResult = std::result::Result<Value, CallRejection>;

/// One request from the page to a plugin method.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginCall {
    pub method: String,
    pub data: Value,
}

impl PluginCall {
    pub fn new(method: impl Into<String>, data: Value) -> Self {
        Self {
            method: method.into(),
            data,
        }
    }

    /// String option; any non-string value reads as absent
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.data.get(key).and_then(Value::as_str).map(str::to_string)
    }
}

/// Plugin trait
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Name the page uses to address the plugin; also its event topic
    fn name(&self) -> &str;

    /// Called once when the plugin is registered with the bridge
    async fn load(&self) -> Result<()>;

    /// Dispatch one page call
    async fn handle_call(&self, call: PluginCall) -> CallResult;

    /// The hosting surface is being destroyed
    async fn handle_on_destroy(&self) -> Result<()>;
}

/// Plugin Manager
pub struct PluginManager {
    plugins: Arc<DashMap<String, Arc<dyn Plugin>>>,
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginManager {
    pub fn new() -> Self {
        Self {
            plugins: Arc::new(DashMap::new()),
        }
    }

    /// Register and load a plugin; later registrations with the same name replace the previous one
    pub async fn register_plugin(&self, plugin: Arc<dyn Plugin>) -> Result<()> {
        let name = plugin.name().to_string();
        plugin.load().await?;
        if let Some(previous) = self.plugins.insert(name.clone(), plugin) {
            if let Err(e) = previous.handle_on_destroy().await {
                warn!(target: "plugin", plugin = %name, error = %e, "Error releasing replaced plugin");
            }
        }
        info!(target: "plugin", plugin = %name, "Registered plugin");
        Ok(())
    }

    /// Register unless a plugin with the same name is already present.
    /// Returns whether a registration happened.
    pub async fn ensure_registered(&self, plugin: Arc<dyn Plugin>) -> Result<bool> {
        if self.plugins.contains_key(plugin.name()) {
            debug!(target: "plugin", plugin = %plugin.name(), "Plugin already registered");
            return Ok(false);
        }
        self.register_plugin(plugin).await?;
        Ok(true)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    pub fn plugin_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.plugins.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.get(name).map(|e| Arc::clone(e.value()))
    }

    /// Route a page call to a plugin method
    pub async fn call(&self, plugin: &str, method: &str, data: Value) -> CallResult {
        let Some(target) = self.get(plugin) else {
            return Err(CallRejection::new(format!("Plugin {} not found", plugin)));
        };
        debug!(target: "plugin", plugin, method, "Dispatching call");
        target.handle_call(PluginCall::new(method, data)).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        info!(target: "plugin", "Plugin Manager shutting down");

        let plugins: Vec<(String, Arc<dyn Plugin>)> = self
            .plugins
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();
        self.plugins.clear();

        for (name, plugin) in plugins {
            if let Err(e) = plugin.handle_on_destroy().await {
                warn!(target: "plugin", plugin = %name, error = %e, "Error shutting down plugin");
            }
        }

        Ok(())
    }
}
