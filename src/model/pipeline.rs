//! Pipeline backend interface

use anyhow::Result;

use super::{GeneratedImage, ModelArchitecture};
use crate::config::{DiffusionGenerationConfig, KernelBackend, Precision};
use crate::dist::TensorParallelGroup;
use crate::policy::ShardPlan;

/// How the engine wants a pipeline laid out on this rank
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionPlan {
    /// Precision the weights should be held in
    pub precision: Precision,
    /// Kernel family to dispatch to
    pub kernel_backend: KernelBackend,
    /// Ranks cooperating on each forward pass, including this one
    pub tp_group: TensorParallelGroup,
    /// Which denoiser modules to split across `tp_group`
    pub shard_plan: ShardPlan,
    /// Largest prompt batch `forward` will receive
    pub max_batch_size: usize,
}

/// A loaded text-to-image pipeline.
///
/// Implemented by backend crates. The engine calls [`prepare`] once, then
/// [`forward`] once per scheduled batch.
///
/// [`prepare`]: DiffusionPipeline::prepare
/// [`forward`]: DiffusionPipeline::forward
pub trait DiffusionPipeline: Send {
    /// Model family this pipeline runs
    fn architecture(&self) -> ModelArchitecture;

    /// Precision the weights were loaded in
    fn precision(&self) -> Precision;

    /// Attention heads of the denoiser, if known. Used to check that the
    /// heads divide evenly across the tensor-parallel group.
    fn num_attention_heads(&self) -> Option<usize> {
        None
    }

    /// Shard weights and select kernels according to `plan`
    fn prepare(&mut self, plan: &ExecutionPlan) -> Result<()>;

    /// Generate images for a batch of prompts.
    ///
    /// Must return `config.images_per_prompt()` images per prompt, grouped by
    /// prompt in input order.
    fn forward(
        &mut self,
        prompts: &[String],
        config: &DiffusionGenerationConfig,
    ) -> Result<Vec<GeneratedImage>>;
}

/// Boxed pipeline type used by the loader and the engine
pub type BoxedPipeline = Box<dyn DiffusionPipeline>;
