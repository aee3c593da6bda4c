//! Diffusion generation settings

use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::ModelArchitecture;

/// Sampling parameters for one generation call.
///
/// Every field is optional. Unset fields are left out of [`to_kwargs`] so the
/// backend applies the defaults of the model architecture it runs.
///
/// [`to_kwargs`]: DiffusionGenerationConfig::to_kwargs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffusionGenerationConfig {
    /// Output height in pixels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,

    /// Output width in pixels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    /// Number of denoising steps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_inference_steps: Option<usize>,

    /// Classifier-free guidance scale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidance_scale: Option<f64>,

    /// What the image should not contain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,

    /// Images generated for each prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_images_per_prompt: Option<usize>,

    /// Random seed (None = random)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Number of final text-encoder layers to skip
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip_skip: Option<usize>,
}

/// Generation parameters with architecture defaults filled in
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedGenerationParams {
    pub height: u32,
    pub width: u32,
    pub num_inference_steps: usize,
    pub guidance_scale: f64,
    pub negative_prompt: String,
    pub num_images_per_prompt: usize,
    pub seed: Option<u64>,
    pub clip_skip: Option<usize>,
}

impl DiffusionGenerationConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Set the seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Images the backend must return for each prompt
    pub fn images_per_prompt(&self) -> usize {
        self.num_images_per_prompt.unwrap_or(1)
    }

    /// The explicitly set fields, as keyword arguments for a backend
    pub fn to_kwargs(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => anyhow::bail!("generation config serialized to non-object: {}", other),
        }
    }

    /// Fill unset fields from the defaults of `arch`
    pub fn resolved_for(&self, arch: ModelArchitecture) -> ResolvedGenerationParams {
        let defaults = arch.sampling_defaults();
        ResolvedGenerationParams {
            height: self.height.unwrap_or(defaults.height),
            width: self.width.unwrap_or(defaults.width),
            num_inference_steps: self
                .num_inference_steps
                .unwrap_or(defaults.num_inference_steps),
            guidance_scale: self.guidance_scale.unwrap_or(defaults.guidance_scale),
            negative_prompt: self.negative_prompt.clone().unwrap_or_default(),
            num_images_per_prompt: self.images_per_prompt(),
            seed: self.seed,
            clip_skip: self.clip_skip,
        }
    }
}
