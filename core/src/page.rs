//! Page execution context and the task queue that feeds it.
//!
//! The host never writes into the page directly. It submits [`PageTask`]s to a
//! [`PageScheduler`], which holds them until a [`PageContext`] is attached and
//! then runs them in submission order. Web views that only understand script
//! strings are adapted through [`ScriptPage`].
//!
//! The page talks back through its console. Lines written by the installed
//! native logger start with [`NATIVE_LOG_PREFIX`]; web view adapters hand
//! console output to `HostShell::on_console_message`.

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

// Every global the host defines on the page carries the `__RMF_` prefix
pub const NATIVE_LOG_GLOBAL: &str = "__RMF_NATIVE_LOG__";
pub const CONFIG_GLOBAL: &str = "__RMF_CONFIG__";
pub const API_KEY_GLOBAL: &str = "__RMF_API_KEY__";
pub const AUTO_RUN_GLOBAL: &str = "__RMF_AUTO_RUN__";

/// Console prefix of messages sent through `__RMF_NATIVE_LOG__`
pub const NATIVE_LOG_PREFIX: &str = "[rmf/native] ";

/// Startup configuration handed to the page in one piece
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub api_key_present: bool,
    pub auto_run: bool,
}

impl PageConfig {
    pub fn new(api_key: Option<String>, auto_run: bool) -> Self {
        let api_key = api_key.filter(|k| !k.is_empty());
        Self {
            api_key_present: api_key.is_some(),
            api_key,
            auto_run,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageTask {
    /// Give the page a function that routes messages to native logging
    InstallNativeLogger,
    /// Deliver startup configuration
    ApplyConfig(PageConfig),
}

impl PageTask {
    /// Render the task as a script for string-evaluating web views
    pub fn to_script(&self) -> Result<String> {
        match self {
            PageTask::InstallNativeLogger => Ok(format!(
                "window.{} = function(msg){{ try {{ console.log('{}' + msg); }} catch(e) {{}} }};",
                NATIVE_LOG_GLOBAL, NATIVE_LOG_PREFIX
            )),
            PageTask::ApplyConfig(cfg) => {
                let mut script = format!("window.{}={};", CONFIG_GLOBAL, js_literal(cfg)?);
                if let Some(key) = &cfg.api_key {
                    script.push_str(&format!("window.{}={};", API_KEY_GLOBAL, js_literal(key)?));
                }
                script.push_str(&format!("window.{}={};", AUTO_RUN_GLOBAL, cfg.auto_run));
                script.push_str(&format!(
                    "console.log('[rmf] injected extras apiKeyPresent={} autoRun={}');",
                    cfg.api_key_present, cfg.auto_run
                ));
                Ok(script)
            }
        }
    }
}

/// Body of a native-logger console line, `None` for ordinary page output
pub fn native_log_message(console_line: &str) -> Option<&str> {
    console_line.strip_prefix(NATIVE_LOG_PREFIX)
}

/// JSON encoding that is also safe inside an inline `<script>` block
pub fn js_literal<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let json = serde_json::to_string(value)?;
    Ok(json
        .replace("</", "<\\/")
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029"))
}

/// The page's execution context
#[async_trait]
pub trait PageContext: Send + Sync {
    async fn run(&self, task: &PageTask) -> Result<()>;
}

/// A web view that can evaluate script strings
#[async_trait]
pub trait ScriptEvaluator: Send + Sync {
    async fn evaluate_script(&self, script: &str) -> Result<()>;
}

/// Adapts a [`ScriptEvaluator`] into a [`PageContext`]
pub struct ScriptPage<E> {
    evaluator: E,
}

impl<E: ScriptEvaluator> ScriptPage<E> {
    pub fn new(evaluator: E) -> Self {
        Self { evaluator }
    }
}

#[async_trait]
impl<E: ScriptEvaluator> PageContext for ScriptPage<E> {
    async fn run(&self, task: &PageTask) -> Result<()> {
        let script = task.to_script()?;
        self.evaluator.evaluate_script(&script).await
    }
}

type SharedContext = Option<Arc<dyn PageContext>>;

/// Single-consumer task queue in front of the page context
pub struct PageScheduler {
    tasks: mpsc::UnboundedSender<PageTask>,
    context: watch::Sender<SharedContext>,
    worker: JoinHandle<()>,
}

impl PageScheduler {
    /// Start the queue worker. Must be called inside a Tokio runtime.
    pub fn spawn() -> Self {
        let (tasks, rx) = mpsc::unbounded_channel();
        let (context, ctx_rx) = watch::channel::<SharedContext>(None);
        let worker = tokio::spawn(run_queue(rx, ctx_rx));
        Self {
            tasks,
            context,
            worker,
        }
    }

    /// Attach (or replace) the page context; held tasks start running
    pub fn attach(&self, ctx: Arc<dyn PageContext>) {
        debug!(target: "page", "Page context attached");
        self.context.send_replace(Some(ctx));
    }

    pub fn is_attached(&self) -> bool {
        self.context.borrow().is_some()
    }

    /// Submit a task. Never fails; a stopped queue only logs.
    pub fn schedule(&self, task: PageTask) {
        if self.tasks.send(task).is_err() {
            warn!(target: "page", "Page task queue closed; task dropped");
        }
    }

    /// Stop running tasks; later submissions are dropped
    pub fn shutdown(&self) {
        debug!(target: "page", "Page task queue stopped");
        self.worker.abort();
    }
}

async fn run_queue(
    mut tasks: mpsc::UnboundedReceiver<PageTask>,
    mut ctx_rx: watch::Receiver<SharedContext>,
) {
    while let Some(task) = tasks.recv().await {
        let ctx = loop {
            let current = ctx_rx.borrow_and_update().clone();
            if let Some(ctx) = current {
                break ctx;
            }
            if ctx_rx.changed().await.is_err() {
                return;
            }
        };
        if let Err(e) = ctx.run(&task).await {
            warn!(target: "page", error = %e, ?task, "Page task failed");
        }
    }
}
