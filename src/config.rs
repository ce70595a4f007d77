//! Runtime configuration: where the model, voices and output live.
//!
//! Defaults reproduce the classic layout next to the executable:
//!
//! ```text
//! kokoro-v0_19.onnx
//! voices/af_bella.npy …
//! output/
//! ```
//!
//! A JSON file named by `KOKORO_CONFIG` may override any field, and the
//! individual `KOKORO_*` environment variables override the file. Nothing is
//! ever written back.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

/// Sample rate of the audio written to disk.
pub const SAMPLE_RATE: u32 = 24_000;

/// Deserialised configuration. Every field is optional in the JSON file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// ONNX model file.
    pub model_path: PathBuf,

    /// Directory with one style file per voice, or a `.npz` archive.
    pub voices_path: PathBuf,

    /// Where generated WAV files are written.
    pub output_dir: PathBuf,

    /// HuggingFace repository used to fetch missing model / voice files.
    pub hf_repo: Option<String>,

    /// Speaking-rate multiplier passed to the model.
    pub speed: f32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("kokoro-v0_19.onnx"),
            voices_path: PathBuf::from("voices"),
            output_dir: PathBuf::from("output"),
            hf_repo: None,
            speed: 1.0,
        }
    }
}

impl AppConfig {
    /// Defaults, then `KOKORO_CONFIG` file, then individual env overrides.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var_os("KOKORO_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        debug!(?config, "configuration loaded");
        Ok(config)
    }

    /// Parse a JSON config file. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Cannot read config: {}", path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// Apply `KOKORO_*` overrides looked up through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("KOKORO_MODEL") {
            self.model_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("KOKORO_VOICES") {
            self.voices_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("KOKORO_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("KOKORO_HF_REPO") {
            self.hf_repo = Some(v).filter(|r| !r.is_empty());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_classic_layout() {
        let c = AppConfig::default();
        assert_eq!(c.model_path, PathBuf::from("kokoro-v0_19.onnx"));
        assert_eq!(c.voices_path, PathBuf::from("voices"));
        assert_eq!(c.output_dir, PathBuf::from("output"));
        assert_eq!(c.hf_repo, None);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kokoro.json");
        std::fs::write(&path, r#"{ "output_dir": "/tmp/tts", "speed": 1.25 }"#).unwrap();

        let c = AppConfig::from_file(&path).unwrap();
        assert_eq!(c.output_dir, PathBuf::from("/tmp/tts"));
        assert_eq!(c.speed, 1.25);
        assert_eq!(c.model_path, PathBuf::from("kokoro-v0_19.onnx"));
    }

    #[test]
    fn malformed_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(AppConfig::from_file(&path).is_err());
    }

    #[test]
    fn env_overrides_win() {
        let env: HashMap<&str, &str> = [
            ("KOKORO_MODEL", "/models/k.onnx"),
            ("KOKORO_HF_REPO", "someone/kokoro"),
        ]
        .into_iter()
        .collect();

        let mut c = AppConfig::default();
        c.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(c.model_path, PathBuf::from("/models/k.onnx"));
        assert_eq!(c.hf_repo.as_deref(), Some("someone/kokoro"));
        assert_eq!(c.voices_path, PathBuf::from("voices"));
    }

    #[test]
    fn empty_repo_override_clears_repo() {
        let mut c = AppConfig { hf_repo: Some("x/y".into()), ..AppConfig::default() };
        c.apply_overrides(|k| (k == "KOKORO_HF_REPO").then(String::new));
        assert_eq!(c.hf_repo, None);
    }
}
