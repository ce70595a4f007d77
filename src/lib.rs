//! # kokoro-gui
//!
//! Desktop front-end for the [Kokoro](https://huggingface.co/hexgrad/Kokoro-82M)
//! text-to-speech model: type text, pick a voice, get a WAV file.
//!
//! The window never blocks. A click on "Generate Audio" hands the text to a
//! background worker that loads the model, speaks the text sentence by
//! sentence and writes `output/{voice}_output_{YYYYMMDD_HHMMSS}.wav`. The same
//! button cancels a run between sentences.
//!
//! ## Headless use
//!
//! The worker and the window state are toolkit-independent:
//!
//! ```no_run
//! use kokoro_gui::{AppConfig, KokoroBackend, OutputSettings, Shell, VoiceCatalog};
//! use std::time::Duration;
//!
//! let config = AppConfig::load().unwrap();
//! let mut shell = Shell::new(
//!     KokoroBackend::new(&config),
//!     VoiceCatalog::default(),
//!     OutputSettings::from(&config),
//! );
//! shell.text = "Hello from Rust.".into();
//! shell.submit().unwrap();
//! while shell.is_busy() {
//!     shell.wait_event(Duration::from_millis(200));
//! }
//! println!("{}", shell.status());
//! ```
//!
//! ## Pipeline per sentence
//! 1. **Normalisation** — honorifics, years, money, decimals → speakable text.
//! 2. **Phonemisation** — espeak-ng converts text to IPA (`en-us` / `en-gb`).
//! 3. **Tokenisation** — IPA characters mapped to Kokoro token IDs (≤ 510).
//! 4. **ONNX inference** — `(tokens, style, speed)` → 24 kHz samples.
//! 5. **Concat** — sentence audio joined and written as 16-bit PCM WAV.

pub mod app;
pub mod backend;
pub mod config;
pub mod download;
pub mod generation;
pub mod model;
pub mod normalize;
pub mod npz;
pub mod phonemize;
pub mod shell;
pub mod tokenize;
pub mod voices;

// ─── Re-exports for convenience ─────────────────────────────────────────────

pub use backend::{Backend, KokoroBackend};
pub use config::{AppConfig, SAMPLE_RATE};
pub use generation::{GenerationState, Outcome, OutputSettings, Request, WorkerEvent};
pub use shell::{Phase, Shell, SubmitError};
pub use voices::{Language, VoiceCatalog};
