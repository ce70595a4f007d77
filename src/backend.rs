//! The model seam the generation worker talks to.
//!
//! [`Backend`] is the opaque `load` / `infer` collaborator: the worker never
//! sees ONNX, espeak-ng or file formats, which keeps the worker testable with
//! an in-memory fake.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::{
    config::AppConfig,
    download,
    model::{Device, KokoroOnnx, Synthesis, VoicePack},
    voices::Language,
};

/// Blocking model operations. Every method runs on the worker thread.
pub trait Backend: Send + Sync + 'static {
    type Model;
    type Voice;

    /// Device the model should be loaded on.
    fn device(&self) -> Device {
        Device::resolve()
    }

    fn load_model(&self, device: Device) -> Result<Self::Model>;

    fn load_voice(&self, model: &Self::Model, voice_id: &str) -> Result<Self::Voice>;

    fn infer(
        &self,
        model: &Self::Model,
        chunk: &str,
        voice: &Self::Voice,
        language: Language,
    ) -> Result<Synthesis>;
}

/// Production backend: Kokoro ONNX model + voice packs from disk / the Hub.
#[derive(Debug, Clone)]
pub struct KokoroBackend {
    model_path: PathBuf,
    voices_path: PathBuf,
    hf_repo: Option<String>,
    speed: f32,
}

impl KokoroBackend {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            model_path: config.model_path.clone(),
            voices_path: config.voices_path.clone(),
            hf_repo: config.hf_repo.clone(),
            speed: config.speed,
        }
    }

    fn remote_name(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl Backend for KokoroBackend {
    type Model = KokoroOnnx;
    type Voice = VoicePack;

    fn load_model(&self, device: Device) -> Result<KokoroOnnx> {
        let path = download::resolve(
            &self.model_path,
            self.hf_repo.as_deref(),
            &Self::remote_name(&self.model_path),
        )?;
        KokoroOnnx::load(&path, device)
    }

    fn load_voice(&self, _model: &KokoroOnnx, voice_id: &str) -> Result<VoicePack> {
        if self.voices_path.extension().is_some_and(|e| e == "npz") {
            let archive = download::resolve(
                &self.voices_path,
                self.hf_repo.as_deref(),
                &Self::remote_name(&self.voices_path),
            )?;
            return VoicePack::load(&archive, voice_id);
        }

        let present = ["npy", "bin"]
            .iter()
            .any(|ext| self.voices_path.join(format!("{voice_id}.{ext}")).is_file());
        let Some(repo) = self.hf_repo.as_deref().filter(|_| !present) else {
            return VoicePack::load(&self.voices_path, voice_id);
        };

        let local = self.voices_path.join(format!("{voice_id}.npy"));
        let fetched = download::resolve(&local, Some(repo), &format!("voices/{voice_id}.npy"))?;
        VoicePack::load(fetched.parent().unwrap_or(Path::new(".")), voice_id)
    }

    fn infer(
        &self,
        model: &KokoroOnnx,
        chunk: &str,
        voice: &VoicePack,
        language: Language,
    ) -> Result<Synthesis> {
        model.synthesize(chunk, voice, language, self.speed)
    }
}
