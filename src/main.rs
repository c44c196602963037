//! Application entry point for the voice relay server.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (defaults on first run), then apply
//!    environment overrides (`PORT`, `GROQ_API_KEY`, `OPENAI_API_KEY`).
//! 3. Create the [`tokio`] runtime.
//! 4. Build the STT, LLM and TTS adapters from config.
//! 5. Create the relay and the pipeline runner.
//! 6. Spawn push delivery if `delivery.push_url` is set.
//! 7. Serve HTTP until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use voice_relay::{
    config::AppConfig,
    llm::{ApiCompleter, Completer},
    pipeline::PipelineRunner,
    relay::{PushNotifier, Relay},
    server::{self, AppState},
    stt::{Transcriber, WhisperApiTranscriber},
    tts::build_synthesizer,
};

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("voice relay starting up");

    // 2. Configuration
    let config = AppConfig::load()
        .unwrap_or_else(|e| {
            log::warn!("Failed to load config ({e}); using defaults");
            AppConfig::default()
        })
        .with_env_overrides();

    if config.stt.api_key.as_deref().unwrap_or("").is_empty() {
        log::warn!("No transcription API key configured (set GROQ_API_KEY)");
    }

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    rt.block_on(run(config))
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    // 4. Adapters
    let stt: Arc<dyn Transcriber> = Arc::new(WhisperApiTranscriber::from_config(&config.stt));
    let llm: Arc<dyn Completer> = Arc::new(ApiCompleter::from_config(&config.llm));
    let tts = build_synthesizer(&config.tts);
    log::info!(
        "adapters: stt={} ({}), llm={} ({}), tts={:?}",
        config.stt.model,
        config.stt.base_url,
        config.llm.model,
        config.llm.base_url,
        config.tts.provider
    );

    // 5. Relay + runner
    let relay = Arc::new(Relay::new());
    let runner = Arc::new(PipelineRunner::new(
        Arc::clone(&relay),
        stt,
        llm,
        tts,
        &config,
    ));

    // 6. Optional push delivery
    let _push_task = PushNotifier::from_config(&config.delivery).map(|notifier| {
        log::info!("delivery: pushing replies to {}", notifier.url());
        notifier.spawn(relay.subscribe())
    });

    // 7. HTTP
    let state = AppState::new(runner, &config.server);
    server::serve(state, &config.server).await
}
