//! Supported diffusion model families

use std::fmt;

use anyhow::{anyhow, Result};

/// Diffusion model family.
///
/// Detected from the `_class_name` entry of a diffusers `model_index.json`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ModelArchitecture {
    /// Stable Diffusion 3 (MMDiT transformer, three text encoders)
    #[default]
    StableDiffusion3,
    /// PixArt-α / PixArt-Σ (DiT transformer, T5 text encoder)
    PixArtAlpha,
}

/// Default sampling parameters of a model family
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingDefaults {
    pub height: u32,
    pub width: u32,
    pub num_inference_steps: usize,
    pub guidance_scale: f64,
}

impl ModelArchitecture {
    /// All supported architectures
    pub const ALL: [ModelArchitecture; 2] = [
        ModelArchitecture::StableDiffusion3,
        ModelArchitecture::PixArtAlpha,
    ];

    /// Detect the architecture from a diffusers pipeline class name
    pub fn from_class_name(class_name: &str) -> Result<Self> {
        match class_name {
            "StableDiffusion3Pipeline" => Ok(ModelArchitecture::StableDiffusion3),
            "PixArtAlphaPipeline" | "PixArtSigmaPipeline" => Ok(ModelArchitecture::PixArtAlpha),
            other => Err(anyhow!(
                "unsupported pipeline class '{}' (supported: StableDiffusion3Pipeline, PixArtAlphaPipeline, PixArtSigmaPipeline)",
                other
            )),
        }
    }

    /// Canonical diffusers pipeline class name
    pub fn pipeline_class(&self) -> &'static str {
        match self {
            ModelArchitecture::StableDiffusion3 => "StableDiffusion3Pipeline",
            ModelArchitecture::PixArtAlpha => "PixArtAlphaPipeline",
        }
    }

    pub fn sampling_defaults(&self) -> SamplingDefaults {
        match self {
            ModelArchitecture::StableDiffusion3 => SamplingDefaults {
                height: 1024,
                width: 1024,
                num_inference_steps: 28,
                guidance_scale: 7.0,
            },
            ModelArchitecture::PixArtAlpha => SamplingDefaults {
                height: 1024,
                width: 1024,
                num_inference_steps: 20,
                guidance_scale: 4.5,
            },
        }
    }
}

impl fmt::Display for ModelArchitecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.pipeline_class())
    }
}
