//! HuggingFace Hub fallback for missing model and voice files.
//!
//! Files are cached in the HuggingFace Hub cache directory
//! (`~/.cache/huggingface/hub` by default), so a download happens at most once.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use hf_hub::api::sync::Api;
use tracing::info;

/// Download a single file from a HuggingFace repository.
fn hf_download(repo_id: &str, filename: &str) -> Result<PathBuf> {
    let api = Api::new().context("Failed to initialise HuggingFace Hub client")?;
    api.model(repo_id.to_string())
        .get(filename)
        .with_context(|| format!("Failed to download '{}' from '{}'", filename, repo_id))
}

/// Return `local` if it exists, otherwise fetch `remote_name` from `repo`.
///
/// Without a repository a missing file is an error naming the path.
pub fn resolve(local: &Path, repo: Option<&str>, remote_name: &str) -> Result<PathBuf> {
    if local.exists() {
        return Ok(local.to_path_buf());
    }
    let Some(repo) = repo else {
        bail!("File not found: {}", local.display());
    };
    info!(repo, file = remote_name, "fetching from HuggingFace Hub");
    hf_download(repo, remote_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existing_file_is_used_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        std::fs::write(&path, b"onnx").unwrap();
        assert_eq!(resolve(&path, Some("someone/repo"), "model.onnx").unwrap(), path);
    }

    #[test]
    fn missing_file_without_repo_names_the_path() {
        let err = resolve(Path::new("/nonexistent/kokoro.onnx"), None, "kokoro.onnx").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/kokoro.onnx"));
    }
}
