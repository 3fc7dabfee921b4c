mod cli;
mod config;
use async_trait::async_trait;
use clap::Parser;
use cli::Cli;
use config::HostConfig;
use rmf_core::telemetry::init_tracing;
use rmf_core::{
    EventBus, HostShell, LaunchParams, PageScheduler, PluginManager, QoSLevel, ScriptEvaluator,
    ScriptPage,
};
use rmf_speech::{select_engine_factory, FeedItem, QueueEvent, SpeechQueue, TtsPlugin};
use serde_json::json;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info, warn};

/// Stand-in web view: scripts are logged instead of evaluated
struct ConsoleWebView;

#[async_trait]
impl ScriptEvaluator for ConsoleWebView {
    async fn evaluate_script(&self, script: &str) -> rmf_core::Result<()> {
        info!(target: "rmf_host", script = %script, "evaluateJavascript");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let _ = dotenvy::dotenv();
    let defaults = HostConfig::default();
    init_tracing(&defaults.log_filter);

    let cfg = HostConfig::load(cli.config.as_deref());
    info!(target: "rmf_host", engine = ?cfg.tts.engine, "Starting ReadMyFeed host shell");

    let bus = Arc::new(EventBus::new());
    let plugins = Arc::new(PluginManager::new());
    let tts = Arc::new(TtsPlugin::new(select_engine_factory(&cfg.tts), Arc::clone(&bus)));

    // Launch extras: environment first, command line wins
    let launch = LaunchParams::from_env().merge(cli.launch_params()?);

    let page = PageScheduler::spawn();
    let mut host = HostShell::new(Arc::clone(&plugins), page).with_plugin(tts.clone());
    let startup = host.on_create(&launch).await?;
    info!(
        target: "rmf_host",
        api_key_present = startup.api_key_present(),
        auto_run = startup.auto_run,
        "Host created"
    );

    // The page finishes loading after onCreate; held tasks run now
    host.page().attach(Arc::new(ScriptPage::new(ConsoleWebView)));

    let (_sub_id, mut events) = bus.subscribe("Tts", vec![], QoSLevel::Batched).await?;
    let trace_events = cfg.trace_events;
    let printer = tokio::spawn(async move {
        while let Some(ev) = events.recv().await {
            if trace_events {
                info!(target: "rmf_host", event = %ev.name, data = %ev.data, "Tts event");
            }
        }
    });

    if !tts.when_ready().await {
        warn!(target: "rmf_host", "Speech engine failed to initialize; speak calls will be rejected");
    }

    let (queue, mut queue_events) = SpeechQueue::new(Arc::clone(&tts)).await?;
    let queue_printer = tokio::spawn(async move {
        while let Some(ev) = queue_events.recv().await {
            match ev {
                QueueEvent::IndexChanged { index, item } => {
                    info!(target: "rmf_host", index, id = %item.id, "Reading feed item")
                }
                QueueEvent::Finished => info!(target: "rmf_host", "Feed finished"),
                QueueEvent::Failed { message } => warn!(target: "rmf_host", %message, "Feed stopped"),
            }
        }
    });

    info!(
        target: "rmf_host",
        "Type a line to speak it. Commands: /stop, /feed <file.json> [start], /resume, /console <line>, /quit"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match line.split_whitespace().next() {
                    Some("/quit") => break,
                    Some("/stop") => {
                        queue.stop();
                        report(plugins.call("Tts", "stop", json!({})).await);
                    }
                    Some("/resume") => queue.resume(),
                    // Stands in for the web view's console callback
                    Some("/console") => {
                        let console_line = line.trim_start_matches("/console").trim_start();
                        host.on_console_message(console_line);
                    }
                    Some("/feed") => {
                        let mut args = line.split_whitespace().skip(1);
                        let Some(path) = args.next() else {
                            warn!(target: "rmf_host", "Usage: /feed <file.json> [start]");
                            continue;
                        };
                        let start = args.next().and_then(|s| s.parse().ok()).unwrap_or(0);
                        match load_feed(path).await {
                            Ok(items) => queue.play(items, start),
                            Err(e) => error!(target: "rmf_host", error = %e, path, "Could not load feed"),
                        }
                    }
                    _ => report(plugins.call("Tts", "speak", json!({ "text": line })).await),
                }
            }
            _ = signal::ctrl_c() => {
                info!(target: "rmf_host", "Ctrl+C received");
                break;
            }
        }
    }

    queue.close().await?;
    host.on_destroy().await?;
    printer.abort();
    queue_printer.abort();
    info!(target: "rmf_host", "Host shell stopped");
    Ok(())
}

fn report(result: rmf_core::CallResult) {
    match result {
        Ok(value) => info!(target: "rmf_host", result = %value, "Call resolved"),
        Err(rejection) => warn!(target: "rmf_host", reason = %rejection, "Call rejected"),
    }
}

async fn load_feed(path: &str) -> Result<Vec<FeedItem>, Box<dyn std::error::Error>> {
    let raw = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&raw)?)
}
