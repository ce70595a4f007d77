//! Toolkit-independent state of the window.
//!
//! [`Shell`] owns everything the widgets display and the single start/cancel
//! command. It lives on the UI thread; the worker only talks to it through
//! the event channel drained by [`Shell::poll`].

use std::{
    sync::{
        mpsc::{self, Receiver, Sender},
        Arc,
    },
    thread::JoinHandle,
    time::Duration,
};

use thiserror::Error;
use tracing::info;

use crate::{
    backend::Backend,
    generation::{self, ChannelReporter, GenerationState, Outcome, OutputSettings, Request, WorkerEvent},
    voices::VoiceCatalog,
};

pub const STATUS_READY: &str = "Ready";
pub const STATUS_LOADING: &str = "Loading model...";
pub const STATUS_CANCELED: &str = "Generation canceled.";
pub const STATUS_SUCCESS: &str = "Audio generated successfully!";
pub const STATUS_FINISHING: &str = "Finishing current chunk...";

/// Why a click on "Generate Audio" did not start a run.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Please enter text.")]
    EmptyText,

    #[error("Unknown voice '{0}'")]
    UnknownVoice(String),

    #[error("A generation is still running")]
    Busy,

    #[error("Cannot start generation thread: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Generating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

/// A modal message waiting to be acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub message: String,
}

impl Notice {
    fn info(title: &str, message: impl Into<String>) -> Self {
        Self { kind: NoticeKind::Info, title: title.to_string(), message: message.into() }
    }

    fn error(message: impl Into<String>) -> Self {
        Self { kind: NoticeKind::Error, title: "Error".to_string(), message: message.into() }
    }
}

pub struct Shell<B: Backend> {
    backend: Arc<B>,
    catalog: VoiceCatalog,
    output: OutputSettings,
    state: Arc<GenerationState>,
    events_tx: Sender<WorkerEvent>,
    events_rx: Receiver<WorkerEvent>,
    wake: Option<Arc<dyn Fn() + Send + Sync>>,

    /// Set from spawn until the worker's terminal event is applied.
    worker: Option<JoinHandle<Outcome>>,
    phase: Phase,
    status: String,
    progress: Option<(usize, usize)>,
    notice: Option<Notice>,
    last_outcome: Option<Outcome>,

    /// Contents of the text box.
    pub text: String,
    /// Display name of the selected voice.
    pub selected_voice: String,
}

impl<B: Backend> Shell<B> {
    pub fn new(backend: B, catalog: VoiceCatalog, output: OutputSettings) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        let selected_voice = catalog.first().map(|v| v.display_name.clone()).unwrap_or_default();
        Self {
            backend: Arc::new(backend),
            catalog,
            output,
            state: Arc::new(GenerationState::new()),
            events_tx,
            events_rx,
            wake: None,
            worker: None,
            phase: Phase::Idle,
            status: STATUS_READY.to_string(),
            progress: None,
            notice: None,
            last_outcome: None,
            text: String::new(),
            selected_voice,
        }
    }

    /// Called by the worker after each event so the UI repaints promptly.
    pub fn with_waker(mut self, wake: impl Fn() + Send + Sync + 'static) -> Self {
        self.wake = Some(Arc::new(wake));
        self
    }

    // ── Commands ─────────────────────────────────────────────────────────────

    /// The single button: start while idle, cancel while generating.
    pub fn toggle(&mut self) -> Result<(), SubmitError> {
        match self.phase {
            Phase::Idle => self.submit(),
            Phase::Generating => {
                self.cancel();
                Ok(())
            }
        }
    }

    /// Validate the form and start a worker.
    pub fn submit(&mut self) -> Result<(), SubmitError> {
        if self.is_busy() {
            return Err(self.reject_busy());
        }

        let text = self.text.trim();
        if text.is_empty() {
            self.notice = Some(Notice::error(SubmitError::EmptyText.to_string()));
            return Err(SubmitError::EmptyText);
        }
        let Some(voice_id) = self.catalog.id_for(&self.selected_voice) else {
            let err = SubmitError::UnknownVoice(self.selected_voice.clone());
            self.notice = Some(Notice::error(err.to_string()));
            return Err(err);
        };
        let request = Request { text: text.to_string(), voice_id: voice_id.to_string() };

        if !self.state.try_begin() {
            return Err(self.reject_busy());
        }

        info!(voice = %request.voice_id, chars = request.text.chars().count(), "starting generation");
        let reporter = ChannelReporter::new(self.events_tx.clone(), self.wake.clone());
        match generation::spawn(
            Arc::clone(&self.backend),
            request,
            Arc::clone(&self.state),
            self.output.clone(),
            reporter,
        ) {
            Ok(handle) => self.worker = Some(handle),
            Err(e) => {
                self.state.clear();
                self.notice = Some(Notice::error(format!("An error occurred: {e}")));
                return Err(SubmitError::Spawn(e));
            }
        }

        self.phase = Phase::Generating;
        self.status = STATUS_LOADING.to_string();
        self.progress = Some((0, 0));
        self.last_outcome = None;
        Ok(())
    }

    /// A cancelled worker is still inside its current chunk.
    fn reject_busy(&mut self) -> SubmitError {
        if self.phase == Phase::Idle {
            self.status = STATUS_FINISHING.to_string();
        }
        SubmitError::Busy
    }

    /// Ask the worker to stop at its next chunk boundary and go idle now.
    pub fn cancel(&mut self) {
        if self.phase != Phase::Generating {
            return;
        }
        info!("cancellation requested");
        self.state.clear();
        self.phase = Phase::Idle;
        self.status = STATUS_CANCELED.to_string();
        self.progress = None;
    }

    // ── Worker events ────────────────────────────────────────────────────────

    /// Apply every pending worker event. Returns `true` if any arrived.
    pub fn poll(&mut self) -> bool {
        let mut any = false;
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply(event);
            any = true;
        }
        any
    }

    /// Block up to `timeout` for one event, then drain the rest.
    pub fn wait_event(&mut self, timeout: Duration) -> bool {
        match self.events_rx.recv_timeout(timeout) {
            Ok(event) => {
                self.apply(event);
                self.poll();
                true
            }
            Err(_) => false,
        }
    }

    fn apply(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Progress { current, total } => self.on_progress(current, total),
            WorkerEvent::Finished(outcome) => self.on_finished(outcome),
        }
    }

    pub fn on_progress(&mut self, current: usize, total: usize) {
        if self.phase != Phase::Generating {
            return;
        }
        self.progress = Some((current, total));
        self.status = format!("Processing chunk {current} of {total}...");
    }

    pub fn on_finished(&mut self, outcome: Outcome) {
        let cancel_requested = self.phase == Phase::Idle;
        self.worker = None;
        self.state.clear();
        self.phase = Phase::Idle;
        self.progress = None;

        match &outcome {
            Outcome::Completed { path } if cancel_requested => {
                info!(path = %path.display(), "run finished writing after cancellation");
                self.status = STATUS_CANCELED.to_string();
            }
            Outcome::Completed { path } => {
                self.status = STATUS_SUCCESS.to_string();
                self.notice = Some(Notice::info("Success", format!("Audio saved to {}", path.display())));
            }
            Outcome::Cancelled => self.status = STATUS_CANCELED.to_string(),
            Outcome::Failed { message } => {
                self.status = STATUS_READY.to_string();
                self.notice = Some(Notice::error(format!("An error occurred: {message}")));
            }
        }
        self.last_outcome = Some(outcome);
    }

    // ── View accessors ───────────────────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Cancelled, but the worker has not delivered its terminal event yet.
    pub fn is_finishing(&self) -> bool {
        self.phase == Phase::Idle && self.worker.is_some()
    }

    /// A worker exists that has not delivered its terminal event.
    pub fn is_busy(&self) -> bool {
        self.phase == Phase::Generating || self.worker.is_some()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn progress(&self) -> Option<(usize, usize)> {
        self.progress
    }

    /// Progress bar fill in `0.0..=1.0`.
    pub fn progress_fraction(&self) -> f32 {
        match self.progress {
            Some((current, total)) if total > 0 => (current as f32 / total as f32).clamp(0.0, 1.0),
            _ => 0.0,
        }
    }

    /// Characters in the trimmed text, as shown by the counter.
    pub fn char_count(&self) -> usize {
        self.text.trim().chars().count()
    }

    pub fn button_label(&self) -> &'static str {
        match self.phase {
            Phase::Idle => "Generate Audio",
            Phase::Generating => "Cancel",
        }
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    pub fn last_outcome(&self) -> Option<&Outcome> {
        self.last_outcome.as_ref()
    }

    pub fn catalog(&self) -> &VoiceCatalog {
        &self.catalog
    }

    pub fn state(&self) -> &Arc<GenerationState> {
        &self.state
    }
}
