mod common;

use common::{assert_quiet, listen, next_event, EngineCall, ScriptedFactory};
use rmf_core::{EventBus, Plugin, PluginCall, PluginManager};
use rmf_speech::{EngineState, InitStatus, LanguageSupport, QueueMode, SpeakRequest, TtsPlugin};
use serde_json::json;
use std::sync::Arc;

fn plugin_with(factory: &ScriptedFactory) -> (Arc<TtsPlugin>, Arc<EventBus>) {
    let bus = Arc::new(EventBus::new());
    let plugin = Arc::new(TtsPlugin::new(Arc::new(factory.clone()), Arc::clone(&bus)));
    (plugin, bus)
}

async fn ready_plugin(factory: &ScriptedFactory) -> (Arc<TtsPlugin>, Arc<EventBus>) {
    let (plugin, bus) = plugin_with(factory);
    plugin.load().await.unwrap();
    assert!(plugin.when_ready().await);
    (plugin, bus)
}

async fn speak(plugin: &TtsPlugin, data: serde_json::Value) -> rmf_core::CallResult {
    plugin.handle_call(PluginCall::new("speak", data)).await
}

#[tokio::test]
async fn speak_before_ready_rejects_without_events() {
    let factory = ScriptedFactory::pending();
    let (plugin, bus) = plugin_with(&factory);
    let mut rx = listen(&bus).await;
    plugin.load().await.unwrap();

    assert_eq!(plugin.state(), EngineState::Initializing);
    let err = speak(&plugin, json!({ "text": "hello" })).await.unwrap_err();
    assert_eq!(err.message, "TTS not ready");

    assert!(factory.spoken().is_empty());
    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn speak_resolves_with_the_given_utterance_id() {
    let factory = ScriptedFactory::default();
    let (plugin, _bus) = ready_plugin(&factory).await;

    let out = speak(&plugin, json!({ "text": "hello", "utteranceId": "u1" }))
        .await
        .unwrap();
    assert_eq!(out, json!({ "ok": true, "utteranceId": "u1" }));

    let out = speak(&plugin, json!({ "text": "again" })).await.unwrap();
    assert_eq!(out["utteranceId"], "rmf_utterance");

    let out = speak(&plugin, json!({ "text": "blank id", "utteranceId": "  " }))
        .await
        .unwrap();
    assert_eq!(out["utteranceId"], "rmf_utterance");

    assert_eq!(
        factory.spoken(),
        vec![
            ("hello".to_string(), "u1".to_string()),
            ("again".to_string(), "rmf_utterance".to_string()),
            ("blank id".to_string(), "rmf_utterance".to_string()),
        ]
    );
}

#[tokio::test]
async fn missing_text_never_reaches_the_engine() {
    let factory = ScriptedFactory::default();
    let (plugin, _bus) = ready_plugin(&factory).await;

    for data in [
        json!({ "text": "" }),
        json!({ "text": "   " }),
        json!({}),
        json!({ "text": 12 }),
    ] {
        let err = speak(&plugin, data).await.unwrap_err();
        assert_eq!(err.message, "Missing text");
    }
    assert!(factory.spoken().is_empty());
}

#[tokio::test]
async fn new_speech_flushes_the_previous_utterance() {
    let factory = ScriptedFactory::default();
    let (plugin, _bus) = ready_plugin(&factory).await;

    plugin.speak(&SpeakRequest::new("first").with_utterance_id("a")).unwrap();
    plugin.speak(&SpeakRequest::new("second").with_utterance_id("b")).unwrap();

    let modes: Vec<QueueMode> = factory
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            EngineCall::Speak { mode, .. } => Some(mode),
            _ => None,
        })
        .collect();
    assert_eq!(modes, vec![QueueMode::Flush, QueueMode::Flush]);
}

#[tokio::test]
async fn stop_always_resolves_ok() {
    let factory = ScriptedFactory::default();
    let (plugin, _bus) = plugin_with(&factory);

    // No engine yet
    let out = plugin.handle_call(PluginCall::new("stop", json!({}))).await.unwrap();
    assert_eq!(out, json!({ "ok": true }));
    assert_eq!(factory.created(), 0);

    plugin.load().await.unwrap();
    assert!(plugin.when_ready().await);
    let out = plugin.handle_call(PluginCall::new("stop", json!({}))).await.unwrap();
    assert_eq!(out, json!({ "ok": true }));
    assert!(factory.calls().contains(&EngineCall::Stop));
}

#[tokio::test]
async fn engine_callbacks_become_bridge_events() {
    let factory = ScriptedFactory::default();
    let (plugin, bus) = ready_plugin(&factory).await;
    let mut rx = listen(&bus).await;

    plugin.speak(&SpeakRequest::new("hi").with_utterance_id("u1")).unwrap();
    let listener = factory.listener();
    listener.start("u1");
    listener.done("u1");
    listener.stopped("u1", true);
    listener.error("u2", None);
    listener.error("u3", Some(-8));

    let start = next_event(&mut rx).await;
    assert_eq!(start.name, "ttsStart");
    assert_eq!(start.data, json!({ "utteranceId": "u1" }));

    let done = next_event(&mut rx).await;
    assert_eq!(done.name, "ttsDone");
    assert_eq!(done.data, json!({ "utteranceId": "u1" }));

    // Stopped is not forwarded
    let err = next_event(&mut rx).await;
    assert_eq!(err.name, "ttsError");
    assert_eq!(
        err.data,
        json!({ "utteranceId": "u2", "code": "tts_error", "message": "TTS error" })
    );
    let err = next_event(&mut rx).await;
    assert_eq!(err.data["message"], "TTS error code=-8");
    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn init_failure_is_permanent_and_reported_once() {
    let factory = ScriptedFactory {
        auto_init: Some(InitStatus::Error),
        ..ScriptedFactory::default()
    };
    let (plugin, bus) = plugin_with(&factory);
    let mut rx = listen(&bus).await;
    plugin.load().await.unwrap();

    assert!(!plugin.when_ready().await);
    assert_eq!(plugin.state(), EngineState::Failed);

    for _ in 0..3 {
        let err = speak(&plugin, json!({ "text": "hello" })).await.unwrap_err();
        assert_eq!(err.message, "TTS not ready");
    }

    let ev = next_event(&mut rx).await;
    assert_eq!(ev.name, "ttsError");
    assert_eq!(ev.data["code"], "tts_init_failed");
    assert_eq!(ev.data["message"], "Failed to initialize TextToSpeech");
    assert!(ev.data.get("utteranceId").is_none());
    assert_quiet(&mut rx).await;

    // No automatic retry
    assert_eq!(factory.created(), 1);
}

#[tokio::test]
async fn factory_error_counts_as_init_failure() {
    let factory = ScriptedFactory {
        fail_create: true,
        ..ScriptedFactory::default()
    };
    let (plugin, bus) = plugin_with(&factory);
    let mut rx = listen(&bus).await;
    plugin.load().await.unwrap();

    assert!(!plugin.when_ready().await);
    assert_eq!(next_event(&mut rx).await.data["code"], "tts_init_failed");
    let err = speak(&plugin, json!({ "text": "x" })).await.unwrap_err();
    assert_eq!(err.message, "TTS not ready");
}

#[tokio::test]
async fn unsupported_language_is_an_event_not_a_failure() {
    let factory = ScriptedFactory {
        language: LanguageSupport::NotSupported,
        ..ScriptedFactory::default()
    };
    let (plugin, bus) = plugin_with(&factory);
    let mut rx = listen(&bus).await;
    plugin.load().await.unwrap();

    assert!(plugin.when_ready().await);
    let ev = next_event(&mut rx).await;
    assert_eq!(ev.data["code"], "tts_lang_failed");
    assert_eq!(ev.data["message"], "Locale.US missing or not supported");
    assert!(factory.calls().contains(&EngineCall::SetLanguage("en-US".into())));

    assert!(speak(&plugin, json!({ "text": "still works" })).await.is_ok());
}

#[tokio::test]
async fn submission_failure_rejects_the_call() {
    let factory = ScriptedFactory {
        fail_speak: true,
        ..ScriptedFactory::default()
    };
    let (plugin, _bus) = ready_plugin(&factory).await;

    let err = speak(&plugin, json!({ "text": "hello" })).await.unwrap_err();
    assert_eq!(err.message, "TTS speak failed");
}

#[tokio::test]
async fn teardown_resets_readiness_and_reattaches_on_speak() {
    let factory = ScriptedFactory::pending();
    let (plugin, bus) = plugin_with(&factory);
    plugin.load().await.unwrap();
    factory.listener().init(InitStatus::Success);
    assert!(plugin.when_ready().await);

    plugin.handle_on_destroy().await.unwrap();
    assert!(!plugin.is_ready());
    assert_eq!(plugin.state(), EngineState::Uninitialized);
    assert!(factory.calls().contains(&EngineCall::Shutdown));

    // Idempotent
    plugin.teardown();

    // First speak re-attaches but cannot succeed yet
    let err = speak(&plugin, json!({ "text": "hello" })).await.unwrap_err();
    assert_eq!(err.message, "TTS not ready");
    assert_eq!(factory.created(), 2);

    // Callbacks from the released engine are ignored
    let mut rx = listen(&bus).await;
    factory.listener_at(0).start("old");
    assert_quiet(&mut rx).await;

    factory.listener().init(InitStatus::Success);
    assert!(plugin.when_ready().await);
    assert!(speak(&plugin, json!({ "text": "hello" })).await.is_ok());
}

#[tokio::test]
async fn unknown_method_is_rejected() {
    let factory = ScriptedFactory::default();
    let (plugin, _bus) = ready_plugin(&factory).await;
    let err = plugin
        .handle_call(PluginCall::new("getVoices", json!({})))
        .await
        .unwrap_err();
    assert_eq!(err.message, "Method not implemented: getVoices");
}

#[tokio::test]
async fn calls_route_through_the_plugin_manager() {
    let factory = ScriptedFactory::default();
    let (plugin, _bus) = plugin_with(&factory);
    let manager = PluginManager::new();
    manager.register_plugin(plugin.clone()).await.unwrap();
    assert!(plugin.when_ready().await);

    let out = manager
        .call("Tts", "speak", json!({ "text": "via bridge", "utteranceId": "b1" }))
        .await
        .unwrap();
    assert_eq!(out["ok"], true);

    manager.shutdown().await.unwrap();
    assert!(!plugin.is_ready());
}
