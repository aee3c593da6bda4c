//! Model source detection

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

/// Index file at the root of every diffusers pipeline
pub const MODEL_INDEX_FILE: &str = "model_index.json";

/// Where a model comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// A pipeline directory on disk
    Local(PathBuf),
    /// A HuggingFace Hub repository (e.g. "stabilityai/stable-diffusion-3-medium-diffusers")
    Hub(String),
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSource::Local(path) => write!(f, "{}", path.display()),
            ModelSource::Hub(repo_id) => write!(f, "hf://{}", repo_id),
        }
    }
}

/// Local model directory (`$DIFFUZR_MODEL_DIR`, default `./models`)
pub fn model_dir() -> PathBuf {
    std::env::var("DIFFUZR_MODEL_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./models"))
}

/// Detect the source of a model given as a path or a name
pub fn detect_model_source(model: &str) -> Result<ModelSource> {
    detect_model_source_in(model, &model_dir())
}

/// Detect the source of a model, looking up bare names in `model_dir`
///
/// The model can be:
/// - A pipeline directory
/// - The `model_index.json` inside a pipeline directory
/// - The name of a pipeline directory under `model_dir`
/// - A hub repository id of the form `org/name`
pub fn detect_model_source_in(model: &str, model_dir: &Path) -> Result<ModelSource> {
    let direct = Path::new(model);
    if direct.is_dir() {
        return Ok(ModelSource::Local(direct.to_path_buf()));
    }
    if direct.is_file() && direct.file_name().is_some_and(|name| name == MODEL_INDEX_FILE) {
        let parent = direct
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        return Ok(ModelSource::Local(parent.to_path_buf()));
    }

    let in_dir = model_dir.join(model);
    if in_dir.is_dir() {
        return Ok(ModelSource::Local(in_dir));
    }

    if is_repo_id(model) {
        return Ok(ModelSource::Hub(model.to_string()));
    }

    Err(anyhow!("Model not found: {}", model))
}

/// Check if `s` looks like `org/name`
fn is_repo_id(s: &str) -> bool {
    let valid_part = |part: &str| {
        !part.is_empty()
            && !part.starts_with('.')
            && part
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    };
    match s.split_once('/') {
        Some((org, name)) => valid_part(org) && valid_part(name),
        None => false,
    }
}
