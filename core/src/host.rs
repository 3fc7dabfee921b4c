//! Host shell: plugin registration and page bootstrap.

use crate::launch::{LaunchParams, StartupParams};
use crate::page::{native_log_message, PageConfig, PageScheduler, PageTask};
use crate::plugin::{Plugin, PluginManager};
use crate::Result;
use std::sync::Arc;
use tracing::{debug, info};

pub struct HostShell {
    plugins: Arc<PluginManager>,
    page: PageScheduler,
    pending: Vec<Arc<dyn Plugin>>,
    startup: Option<StartupParams>,
}

impl HostShell {
    pub fn new(plugins: Arc<PluginManager>, page: PageScheduler) -> Self {
        Self {
            plugins,
            page,
            pending: Vec::new(),
            startup: None,
        }
    }

    /// Queue a plugin to be registered during [`HostShell::on_create`]
    pub fn with_plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.pending.push(plugin);
        self
    }

    /// Register plugins, then schedule the page bootstrap tasks without
    /// waiting for the page. Startup params are read once; later calls only
    /// re-check plugin registration.
    pub async fn on_create(&mut self, launch: &LaunchParams) -> Result<StartupParams> {
        // A failed registration keeps it and everything after it queued
        while let Some(plugin) = self.pending.first().cloned() {
            self.plugins.ensure_registered(plugin).await?;
            self.pending.remove(0);
        }

        if let Some(startup) = &self.startup {
            return Ok(startup.clone());
        }

        let startup = StartupParams::from_launch(launch);
        debug!(
            target: "rmf",
            api_key_present = startup.api_key_present(),
            auto_run = startup.auto_run,
            "Host onCreate extras"
        );

        self.page.schedule(PageTask::InstallNativeLogger);
        self.page.schedule(PageTask::ApplyConfig(PageConfig::new(
            startup.api_key.clone(),
            startup.auto_run,
        )));
        self.startup = Some(startup.clone());
        Ok(startup)
    }

    pub async fn on_destroy(&self) -> Result<()> {
        info!(target: "rmf", "Host destroyed; releasing plugins");
        self.page.shutdown();
        self.plugins.shutdown().await
    }

    /// Console output from the page. Native-logger lines go to the
    /// `rmf/native` target; returns whether the line was one of them.
    pub fn on_console_message(&self, line: &str) -> bool {
        match native_log_message(line) {
            Some(msg) => {
                self.native_log(msg);
                true
            }
            None => {
                debug!(target: "page", console = %line, "Page console");
                false
            }
        }
    }

    pub fn native_log(&self, msg: &str) {
        info!(target: "rmf/native", "{}", msg);
    }

    pub fn startup_params(&self) -> Option<&StartupParams> {
        self.startup.as_ref()
    }

    pub fn plugins(&self) -> &Arc<PluginManager> {
        &self.plugins
    }

    pub fn page(&self) -> &PageScheduler {
        &self.page
    }
}
