//! Application entry point: Vietnamese ↔ English voice translator.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] (defaults when the file is missing).
//! 3. Check that both recognition models and both voices exist (exit 1).
//! 4. Load the Whisper models, one per language.
//! 5. Build translator, synthesiser and output sink from config.
//! 6. Open the input backend (keyboard keys or GPIO pins).
//! 7. Run the session orchestrator on a tokio runtime until Ctrl-C or
//!    SIGTERM; a capture in progress is ended and its session finished
//!    before the process exits.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use voice_translate::{
    audio::{AudioSink, CaptureManager, CpalSink, Recorder},
    config::{AppConfig, InputBackend, InputConfig},
    gpio::{trigger_channel, DigitalInput, EdgeSender, GpioError, KeyboardInput, Pin},
    language::Language,
    pipeline::{new_shared_state, SessionOrchestrator},
    stt::{Recognizer, SpeechModel, SpeechRecognizer, WhisperModel},
    translate,
    tts::{PiperSynthesizer, Speaker, Synthesizer, VoiceSpeaker},
};

// ---------------------------------------------------------------------------
// Input backend
// ---------------------------------------------------------------------------

fn open_input(config: &InputConfig, edges: EdgeSender) -> Result<Arc<dyn DigitalInput>, GpioError> {
    match config.backend {
        InputBackend::Keyboard => Ok(Arc::new(KeyboardInput::start(config, edges)?)),
        #[cfg(feature = "rpi")]
        InputBackend::Gpio => Ok(Arc::new(voice_translate::gpio::GpioInput::open(
            config, edges,
        )?)),
        #[cfg(not(feature = "rpi"))]
        InputBackend::Gpio => {
            drop(edges);
            Err(GpioError::NotCompiled("gpio (build with --features rpi)"))
        }
    }
}

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

/// Resolves on Ctrl-C, or on SIGTERM where the platform has it.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    res = tokio::signal::ctrl_c() => log_ctrl_c(res),
                    _ = term.recv() => log::info!("received SIGTERM"),
                }
                return;
            }
            Err(e) => log::warn!("cannot listen for SIGTERM: {e}"),
        }
    }
    log_ctrl_c(tokio::signal::ctrl_c().await);
}

fn log_ctrl_c(res: std::io::Result<()>) {
    if let Err(e) = res {
        log::error!("cannot listen for Ctrl-C: {e}");
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("voice translator starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Models and voices must be installed before any trigger is accepted
    if let Err(e) = config.ensure_resources() {
        log::error!("startup: {e}");
        std::process::exit(1);
    }

    // 4. Recognition
    let vi: Arc<dyn SpeechModel> = Arc::new(
        WhisperModel::load(&config.stt.vi_model, Language::Vietnamese, config.stt.use_gpu)
            .context("loading Vietnamese recognition model")?,
    );
    let en: Arc<dyn SpeechModel> = Arc::new(
        WhisperModel::load(&config.stt.en_model, Language::English, config.stt.use_gpu)
            .context("loading English recognition model")?,
    );
    let recognizer: Arc<dyn Recognizer> =
        Arc::new(SpeechRecognizer::new(vi, en, config.stt.chunk_frames));

    // 5. Translation, synthesis, playback
    let translator = translate::from_config(&config.translate);
    let synthesizer: Arc<dyn Synthesizer> = Arc::new(PiperSynthesizer::new(&config.tts));
    let sink: Arc<dyn AudioSink> = Arc::new(CpalSink::new(config.tts.frame_size));
    let speaker: Arc<dyn Speaker> = Arc::new(VoiceSpeaker::new(synthesizer, sink));

    // 6. Inputs
    let (trigger_tx, trigger_rx) = trigger_channel();
    let edges = EdgeSender::new(trigger_tx, config.input.debounce());
    let pins = open_input(&config.input, edges).context("opening trigger / mode inputs")?;

    let trigger_pin = Pin(config.input.trigger_pin);
    let mode_pin = Pin(config.input.mode_pin);
    let recorder: Arc<dyn Recorder> = Arc::new(CaptureManager::new(
        &config.capture,
        Arc::clone(&pins),
        trigger_pin,
    ));

    // 7. Orchestrator
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    let orchestrator = SessionOrchestrator::new(
        new_shared_state(),
        Arc::clone(&pins),
        mode_pin,
        recorder,
        recognizer,
        translator,
        speaker,
    );

    log::info!("ready: hold {trigger_pin} to speak, {mode_pin} selects direction");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    rt.block_on(async move {
        let mut session_loop = tokio::spawn(orchestrator.run(trigger_rx, shutdown_rx));
        tokio::select! {
            _ = &mut session_loop => return,
            _ = wait_for_signal() => log::info!("interrupted, shutting down"),
        }
        let _ = shutdown_tx.send(true);
        if let Err(e) = session_loop.await {
            log::error!("orchestrator task failed: {e}");
        }
    });

    rt.shutdown_timeout(config.capture.grace());
    drop(pins);
    Ok(())
}
