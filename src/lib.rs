//! Diffuzr - distributed text-to-image inference
//!
//! Diffuzr loads a diffusers-layout model, lays its denoiser out across a
//! tensor-parallel group of ranks started by a torchrun-style launcher, and
//! runs batched prompts through it.
//!
//! # Architecture
//!
//! Diffuzr is the orchestration layer:
//! - **diffuzr**: CLI, distributed bootstrap, model resolution, parallel
//!   policies, request batching, image output
//! - **backend**: weights, denoising loop, kernels, collectives
//!   (anything implementing [`DiffusionPipeline`], registered in a
//!   [`PipelineRegistry`])
//!
//! # Supported Models
//!
//! - Stable Diffusion 3 (`StableDiffusion3Pipeline`)
//! - PixArt-α / PixArt-Σ (`PixArtAlphaPipeline`, `PixArtSigmaPipeline`)
//!
//! # Example
//!
//! ```bash
//! # Single process
//! diffuzr -m stabilityai/stable-diffusion-3-medium-diffusers -p "a red bicycle"
//!
//! # Two-way tensor parallel
//! torchrun --nproc_per_node 2 diffuzr -m sd3-medium -t 2 -d bf16
//! ```

pub mod cli;
pub mod config;
pub mod dist;
pub mod engine;
pub mod loader;
pub mod model;
pub mod policy;

// Re-export key types
pub use config::{DType, DiffusionGenerationConfig, InferenceConfig, Precision};
pub use dist::{DistContext, DistCoordinator};
pub use engine::InferenceEngine;
pub use loader::{load_pipeline, ModelSource, PipelineRegistry, ResolvedModel};
pub use model::{DiffusionPipeline, GeneratedImage, ModelArchitecture};
pub use policy::{policy_for, InferPolicy};
