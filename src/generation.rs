//! The cancellable background generation run.
//!
//! One call to [`run`] turns a [`Request`] into zero or one WAV file:
//!
//! ```text
//! Loading ─▶ Chunking ─▶ Inference(1) ─▶ … ─▶ Inference(n) ─▶ Writing ─▶ Done
//!    │                        │                    │              │
//!    └────────── Failed ◀─────┴──── Cancelled ◀────┘              │
//!                   ▲                                             │
//!                   └─────────────────────────────────────────────┘
//! ```
//!
//! Cancellation is cooperative: the shared "in progress" flag is read before
//! and after every chunk's inference call, never during one. Whatever the
//! ending, the flag is cleared and exactly one [`WorkerEvent::Finished`] is
//! reported after all progress events.

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        mpsc::Sender,
        Arc,
    },
    thread::{self, JoinHandle},
};

use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    backend::Backend,
    config::{AppConfig, SAMPLE_RATE},
    model::write_wav,
    voices::{Language, UnknownLanguage},
};

/// Fragments shorter than this (in characters) are not spoken.
pub const MIN_CHUNK_CHARS: usize = 2;

const SENTENCE_TERMINATOR: char = '.';

// ─────────────────────────────────────────────────────────────────────────────
// Shared state
// ─────────────────────────────────────────────────────────────────────────────

/// State shared between the shell and the worker.
///
/// The worker is the only writer of the counters. Either side may clear the
/// flag: the shell to cancel, the worker when it is done.
#[derive(Debug, Default)]
pub struct GenerationState {
    in_progress: AtomicBool,
    current: AtomicUsize,
    total: AtomicUsize,
}

impl GenerationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the flag for a new run. Fails if a run already holds it.
    pub fn try_begin(&self) -> bool {
        let won = self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            self.current.store(0, Ordering::Release);
            self.total.store(0, Ordering::Release);
        }
        won
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Clear the flag. Used for cancellation and for terminal cleanup.
    pub fn clear(&self) {
        self.in_progress.store(false, Ordering::Release);
    }

    /// `(chunks done, chunk count)` of the current or last run.
    pub fn progress(&self) -> (usize, usize) {
        (self.current.load(Ordering::Acquire), self.total.load(Ordering::Acquire))
    }

    fn set_total(&self, total: usize) {
        self.total.store(total, Ordering::Release);
    }

    fn set_current(&self, current: usize) {
        self.current.store(current, Ordering::Release);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Requests, outcomes, events
// ─────────────────────────────────────────────────────────────────────────────

/// One generation run's input, owned by the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub text: String,
    pub voice_id: String,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed { path: PathBuf },
    Cancelled,
    Failed { message: String },
}

/// Messages from the worker to the shell, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    Progress { current: usize, total: usize },
    Finished(Outcome),
}

/// Where generated files go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSettings {
    pub dir: PathBuf,
    pub sample_rate: u32,
}

impl OutputSettings {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), sample_rate: SAMPLE_RATE }
    }
}

impl From<&AppConfig> for OutputSettings {
    fn from(config: &AppConfig) -> Self {
        Self::new(config.output_dir.clone())
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Language(#[from] UnknownLanguage),

    #[error("Cannot load model: {0:#}")]
    Load(anyhow::Error),

    #[error("Cannot load voice '{voice}': {error:#}")]
    Voice { voice: String, error: anyhow::Error },

    #[error("Inference failed on chunk {chunk}: {error:#}")]
    Inference { chunk: usize, error: anyhow::Error },

    #[error("Cannot create output directory {path}: {source}")]
    OutputDir { path: String, source: std::io::Error },

    #[error("Cannot write {path}: {error:#}")]
    Write { path: String, error: anyhow::Error },

    #[error("Generation panicked: {0}")]
    Panic(String),
}

/// Receives the worker's notifications. Called on the worker thread.
pub trait Reporter: Send {
    fn progress(&self, current: usize, total: usize);
    fn finished(&self, outcome: &Outcome);
}

/// Forwards notifications over a channel and wakes the UI.
pub struct ChannelReporter {
    tx: Sender<WorkerEvent>,
    wake: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl ChannelReporter {
    pub fn new(tx: Sender<WorkerEvent>, wake: Option<Arc<dyn Fn() + Send + Sync>>) -> Self {
        Self { tx, wake }
    }

    fn send(&self, event: WorkerEvent) {
        if self.tx.send(event).is_err() {
            debug!("shell is gone, dropping worker event");
            return;
        }
        if let Some(wake) = &self.wake {
            wake();
        }
    }
}

impl Reporter for ChannelReporter {
    fn progress(&self, current: usize, total: usize) {
        self.send(WorkerEvent::Progress { current, total });
    }

    fn finished(&self, outcome: &Outcome) {
        self.send(WorkerEvent::Finished(outcome.clone()));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Chunking and naming
// ─────────────────────────────────────────────────────────────────────────────

/// Split on the sentence terminator and drop fragments under two characters.
///
/// Fragments keep their surrounding whitespace: `"Hello there. Hi."` yields
/// `["Hello there", " Hi"]`.
pub fn split_chunks(text: &str) -> Vec<&str> {
    text.split(SENTENCE_TERMINATOR)
        .filter(|c| c.chars().count() >= MIN_CHUNK_CHARS)
        .collect()
}

/// `{dir}/{voice}_output_{YYYYMMDD_HHMMSS}.wav`
pub fn output_path(dir: &Path, voice_id: &str, at: DateTime<Local>) -> PathBuf {
    dir.join(format!("{}_output_{}.wav", voice_id, at.format("%Y%m%d_%H%M%S")))
}

// ─────────────────────────────────────────────────────────────────────────────
// The run
// ─────────────────────────────────────────────────────────────────────────────

/// Execute one run to completion on the calling thread.
///
/// The caller must have claimed the flag with [`GenerationState::try_begin`].
/// Returns the same outcome that was reported through `reporter`.
pub fn run<B: Backend>(
    backend: &B,
    request: Request,
    state: &GenerationState,
    output: &OutputSettings,
    reporter: &dyn Reporter,
) -> Outcome {
    let voice_id = request.voice_id.clone();
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        generate(backend, &request, state, output, reporter)
    }))
    .unwrap_or_else(|payload| Err(GenerationError::Panic(panic_message(payload))));

    let outcome = match result {
        Ok(Some(path)) => Outcome::Completed { path },
        Ok(None) => {
            info!(voice = %voice_id, "generation cancelled");
            Outcome::Cancelled
        }
        Err(e) => {
            error!(voice = %voice_id, "generation failed: {e}");
            Outcome::Failed { message: e.to_string() }
        }
    };

    state.clear();
    reporter.finished(&outcome);
    outcome
}

/// `Ok(None)` means cancelled.
fn generate<B: Backend>(
    backend: &B,
    request: &Request,
    state: &GenerationState,
    output: &OutputSettings,
    reporter: &dyn Reporter,
) -> Result<Option<PathBuf>, GenerationError> {
    let language = Language::for_voice(&request.voice_id)?;
    let device = backend.device();
    debug!(stage = "loading", voice = %request.voice_id, %device);

    let model = backend.load_model(device).map_err(GenerationError::Load)?;
    let voice = backend
        .load_voice(&model, &request.voice_id)
        .map_err(|error| GenerationError::Voice { voice: request.voice_id.clone(), error })?;

    let chunks = split_chunks(&request.text);
    let total = chunks.len();
    state.set_total(total);
    debug!(stage = "chunking", total);
    if total == 0 {
        warn!("no chunk of two or more characters, output will be silent");
    }

    let mut audio: Vec<f32> = Vec::new();
    for (i, chunk) in chunks.iter().enumerate() {
        if !state.is_in_progress() {
            return Ok(None);
        }

        let index = i + 1;
        debug!(stage = "inference", chunk = index, total);
        let synthesis = backend
            .infer(&model, chunk, &voice, language)
            .map_err(|error| GenerationError::Inference { chunk: index, error })?;

        if !state.is_in_progress() {
            return Ok(None);
        }
        debug!(chunk = index, phonemes = %synthesis.phonemes);
        audio.extend(synthesis.samples);
        state.set_current(index);
        reporter.progress(index, total);
    }

    if !state.is_in_progress() {
        return Ok(None);
    }

    debug!(stage = "writing", samples = audio.len());
    std::fs::create_dir_all(&output.dir).map_err(|source| GenerationError::OutputDir {
        path: output.dir.display().to_string(),
        source,
    })?;
    let path = output_path(&output.dir, &request.voice_id, Local::now());
    if let Err(error) = write_wav(&audio, output.sample_rate, &path) {
        let _ = std::fs::remove_file(&path);
        return Err(GenerationError::Write { path: path.display().to_string(), error });
    }
    if !state.is_in_progress() {
        let _ = std::fs::remove_file(&path);
        return Ok(None);
    }

    Ok(Some(path))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Run [`run`] on a dedicated thread.
pub fn spawn<B: Backend>(
    backend: Arc<B>,
    request: Request,
    state: Arc<GenerationState>,
    output: OutputSettings,
    reporter: ChannelReporter,
) -> std::io::Result<JoinHandle<Outcome>> {
    thread::Builder::new()
        .name("kokoro-generate".into())
        .spawn(move || run(backend.as_ref(), request, &state, &output, &reporter))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn splits_on_terminator_and_drops_noise() {
        assert_eq!(split_chunks("Hello there. Hi."), vec!["Hello there", " Hi"]);
        assert_eq!(split_chunks("A. B. Longer one"), vec![" B", " Longer one"]);
        assert!(split_chunks("").is_empty());
        assert!(split_chunks("...").is_empty());
        assert!(split_chunks("H").is_empty());
    }

    #[test]
    fn two_characters_qualify() {
        assert_eq!(split_chunks("Hi"), vec!["Hi"]);
        assert_eq!(split_chunks("é."), Vec::<&str>::new());
    }

    #[test]
    fn output_name_embeds_voice_and_second() {
        let at = Local.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let path = output_path(Path::new("output"), "af_bella", at);
        assert_eq!(path, Path::new("output/af_bella_output_20250102_030405.wav"));
    }

    #[test]
    fn only_one_claim_wins() {
        let state = Arc::new(GenerationState::new());
        let winners: usize = (0..8)
            .map(|_| {
                let state = Arc::clone(&state);
                thread::spawn(move || state.try_begin())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();
        assert_eq!(winners, 1);
        assert!(state.is_in_progress());

        state.clear();
        assert!(state.try_begin());
    }

    #[test]
    fn claim_resets_counters() {
        let state = GenerationState::new();
        state.set_total(4);
        state.set_current(4);
        assert!(state.try_begin());
        assert_eq!(state.progress(), (0, 0));
    }

    #[test]
    fn panic_payloads_become_messages() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_message(Box::new(7u8)), "unknown panic");
    }
}
