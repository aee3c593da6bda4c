//! Model-side abstractions.
//!
//! A diffusion model is driven through the [`DiffusionPipeline`] trait. The
//! backend that implements it owns the weights, the denoising loop and the
//! kernels; this crate only decides what to run and how to lay it out.

mod architecture;
mod output;
mod pipeline;

pub use architecture::{ModelArchitecture, SamplingDefaults};
pub use output::GeneratedImage;
pub use pipeline::{BoxedPipeline, DiffusionPipeline, ExecutionPlan};
