//! `kokoro-gui` — desktop window for Kokoro text-to-speech.
//!
//! ```bash
//! RUST_LOG=debug kokoro-gui
//! KOKORO_MODEL=models/kokoro-v0_19.onnx KOKORO_VOICES=models/voices kokoro-gui
//! ```

use anyhow::{anyhow, Result};
use eframe::egui;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use kokoro_gui::{
    app::{KokoroApp, WINDOW_TITLE},
    AppConfig, KokoroBackend, OutputSettings, Shell, VoiceCatalog,
};

fn main() -> Result<()> {
    // RUST_LOG wins; otherwise info for this crate and warnings from the stack
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn,kokoro_gui=info"))?;
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    info!("Kokoro TTS v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load().inspect_err(|e| error!("configuration error: {e:#}"))?;
    info!(
        model = %config.model_path.display(),
        voices = %config.voices_path.display(),
        output = %config.output_dir.display(),
        "configuration"
    );

    #[cfg(not(feature = "espeak"))]
    if !kokoro_gui::phonemize::EspeakCommand::default().is_available() {
        warn!("espeak-ng was not found on PATH; generation will fail until it is installed");
    }
    if !config.model_path.exists() && config.hf_repo.is_none() {
        warn!(
            "model file {} is missing and no HuggingFace repo is configured",
            config.model_path.display()
        );
    }

    let shell = Shell::new(
        KokoroBackend::new(&config),
        VoiceCatalog::default(),
        OutputSettings::from(&config),
    );

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(WINDOW_TITLE)
            .with_inner_size([800.0, 600.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        WINDOW_TITLE,
        options,
        Box::new(|cc| Ok(Box::new(KokoroApp::new(cc, shell)))),
    )
    .map_err(|e| anyhow!("window error: {e}"))
}
