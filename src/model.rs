//! ONNX model runner for Kokoro.
//!
//! Uses [`ort`] (ONNX Runtime Rust bindings) for inference.
//! The three model inputs are positional:
//!
//! | Position | Shape          | dtype   |
//! |----------|----------------|---------|
//! | 0 tokens | `[1, n + 2]`   | int64   |
//! | 1 style  | `[1, 256]`     | float32 |
//! | 2 speed  | `[1]`          | float32 |
//!
//! Output 0 is the raw 24 kHz waveform.

use std::{fmt, path::Path, sync::Mutex};

use anyhow::{bail, Context, Result};
use ort::{session::Session, value::Tensor};
use tracing::{debug, info};

use crate::{
    normalize::normalize,
    npz::{self, StyleMatrix, STYLE_WIDTH},
    phonemize::{default_phonemizer, Phonemizer},
    tokenize::{clean_phonemes, pad, tokenize},
    voices::Language,
};

// ─────────────────────────────────────────────────────────────────────────────
// Device
// ─────────────────────────────────────────────────────────────────────────────

/// Where inference runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Cuda,
}

impl Device {
    /// CUDA when this build has it and a device is present, otherwise CPU.
    pub fn resolve() -> Self {
        #[cfg(feature = "cuda")]
        {
            use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};
            if CUDAExecutionProvider::default().is_available().unwrap_or(false) {
                return Self::Cuda;
            }
        }
        Self::Cpu
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cpu => "cpu",
            Self::Cuda => "cuda",
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Voice packs
// ─────────────────────────────────────────────────────────────────────────────

/// Style matrix for one voice; row `n` conditions an `n`-token utterance.
#[derive(Debug, Clone)]
pub struct VoicePack {
    id: String,
    styles: StyleMatrix,
}

impl VoicePack {
    pub fn new(id: impl Into<String>, styles: StyleMatrix) -> Result<Self> {
        let id = id.into();
        if styles.width() != STYLE_WIDTH {
            bail!(
                "Voice '{}' has style width {}, expected {}",
                id,
                styles.width(),
                STYLE_WIDTH
            );
        }
        Ok(Self { id, styles })
    }

    /// Load voice `id` from `voices_path`.
    ///
    /// `voices_path` is either a `.npz` archive keyed by voice id, or a
    /// directory holding `{id}.npy` or `{id}.bin`.
    pub fn load(voices_path: &Path, id: &str) -> Result<Self> {
        let styles = if voices_path.extension().is_some_and(|e| e == "npz") {
            npz::load_npz_member(voices_path, id)?
        } else {
            let npy = voices_path.join(format!("{id}.npy"));
            let bin = voices_path.join(format!("{id}.bin"));
            if npy.is_file() {
                npz::load_npy(&npy)?
            } else if bin.is_file() {
                npz::load_raw_f32(&bin, STYLE_WIDTH)?
            } else {
                bail!("Voice '{}' not found in {}", id, voices_path.display());
            }
        };
        debug!(voice = id, rows = styles.rows(), "voice pack loaded");
        Self::new(id, styles)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Style vector for a sequence of `token_count` tokens.
    pub fn style_for(&self, token_count: usize) -> &[f32] {
        self.styles.row(token_count)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// KokoroOnnx
// ─────────────────────────────────────────────────────────────────────────────

/// Audio for one chunk plus the phonemes it was generated from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Synthesis {
    pub samples: Vec<f32>,
    pub phonemes: String,
}

/// A loaded Kokoro session.
pub struct KokoroOnnx {
    session: Mutex<Session>,
    phonemizer: Box<dyn Phonemizer>,
}

impl KokoroOnnx {
    /// Load the ONNX graph onto `device`.
    pub fn load(model_path: &Path, device: Device) -> Result<Self> {
        let builder = Session::builder().context("Failed to create ORT session builder")?;

        #[cfg(feature = "cuda")]
        let builder = if device == Device::Cuda {
            use ort::execution_providers::CUDAExecutionProvider;
            builder
                .with_execution_providers([CUDAExecutionProvider::default().build()])
                .context("Failed to register the CUDA execution provider")?
        } else {
            builder
        };

        let session = builder
            .commit_from_file(model_path)
            .with_context(|| format!("Cannot load ONNX model: {}", model_path.display()))?;

        info!(model = %model_path.display(), %device, "model loaded");
        Ok(Self { session: Mutex::new(session), phonemizer: default_phonemizer() })
    }

    /// Text → audio for one chunk.
    pub fn synthesize(
        &self,
        text: &str,
        voice: &VoicePack,
        language: Language,
        speed: f32,
    ) -> Result<Synthesis> {
        let normalized = normalize(text);
        let raw = self
            .phonemizer
            .phonemize(&normalized, language)
            .with_context(|| format!("Phonemisation failed for {:?}", text))?;
        let phonemes = clean_phonemes(&raw, language);

        let tokens = tokenize(&phonemes);
        if tokens.is_empty() {
            debug!(chunk = text, "no pronounceable symbols, emitting silence");
            return Ok(Synthesis { samples: Vec::new(), phonemes });
        }

        let samples = self.infer_tokens(&tokens, voice.style_for(tokens.len()), speed)?;
        Ok(Synthesis { samples, phonemes })
    }

    /// Core inference step: unpadded token ids → waveform.
    fn infer_tokens(&self, tokens: &[i64], style: &[f32], speed: f32) -> Result<Vec<f32>> {
        let ids = pad(tokens);
        let seq_len = ids.len();

        let t_tokens = Tensor::<i64>::from_array(([1usize, seq_len], ids))
            .context("Failed to build tokens tensor")?;
        let t_style = Tensor::<f32>::from_array(([1usize, style.len()], style.to_vec()))
            .context("Failed to build style tensor")?;
        let t_speed = Tensor::<f32>::from_array(([1usize], vec![speed]))
            .context("Failed to build speed tensor")?;

        let mut session = self.session.lock().unwrap_or_else(|p| p.into_inner());
        let outputs = session
            .run(ort::inputs![t_tokens, t_style, t_speed])
            .context("ONNX inference failed")?;

        let (_shape, audio) = outputs[0]
            .try_extract_tensor::<f32>()
            .context("Failed to extract audio tensor")?;

        Ok(audio.to_vec())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// WAV writer
// ─────────────────────────────────────────────────────────────────────────────

/// Write mono `samples` to a 16-bit PCM WAV file.
pub fn write_wav(samples: &[f32], sample_rate: u32, output_path: &Path) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(output_path, spec)
        .with_context(|| format!("Cannot create WAV: {}", output_path.display()))?;
    for &s in samples {
        let s16 = (s * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        writer.write_sample(s16).context("WAV write error")?;
    }
    writer.finalize().context("WAV finalise error")?;
    info!(
        samples = samples.len(),
        seconds = samples.len() as f32 / sample_rate as f32,
        path = %output_path.display(),
        "audio written"
    );
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
