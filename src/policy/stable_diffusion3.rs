//! Stable Diffusion 3 policy

use super::{InferPolicy, ShardStrategy};
use crate::model::ModelArchitecture;

/// Joint-attention MMDiT blocks: the image stream (`to_*`, `ff`) and the
/// text stream (`add_*`, `ff_context`) are split the same way.
const PARALLEL_LAYERS: &[(&str, ShardStrategy)] = &[
    ("transformer_blocks.*.attn.to_q", ShardStrategy::Column),
    ("transformer_blocks.*.attn.to_k", ShardStrategy::Column),
    ("transformer_blocks.*.attn.to_v", ShardStrategy::Column),
    ("transformer_blocks.*.attn.to_out.0", ShardStrategy::Row),
    ("transformer_blocks.*.attn.add_q_proj", ShardStrategy::Column),
    ("transformer_blocks.*.attn.add_k_proj", ShardStrategy::Column),
    ("transformer_blocks.*.attn.add_v_proj", ShardStrategy::Column),
    ("transformer_blocks.*.attn.to_add_out", ShardStrategy::Row),
    ("transformer_blocks.*.ff.net.0.proj", ShardStrategy::Column),
    ("transformer_blocks.*.ff.net.2", ShardStrategy::Row),
    ("transformer_blocks.*.ff_context.net.0.proj", ShardStrategy::Column),
    ("transformer_blocks.*.ff_context.net.2", ShardStrategy::Row),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct StableDiffusion3InferPolicy;

impl InferPolicy for StableDiffusion3InferPolicy {
    fn name(&self) -> &'static str {
        "StableDiffusion3InferPolicy"
    }

    fn architecture(&self) -> ModelArchitecture {
        ModelArchitecture::StableDiffusion3
    }

    fn parallel_layers(&self) -> &'static [(&'static str, ShardStrategy)] {
        PARALLEL_LAYERS
    }
}
