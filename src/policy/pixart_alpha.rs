//! PixArt-α policy

use super::{InferPolicy, ShardStrategy};
use crate::model::ModelArchitecture;

/// Self-attention (`attn1`), cross-attention to the T5 embeddings (`attn2`)
/// and the feed-forward of each DiT block.
const PARALLEL_LAYERS: &[(&str, ShardStrategy)] = &[
    ("transformer_blocks.*.attn1.to_q", ShardStrategy::Column),
    ("transformer_blocks.*.attn1.to_k", ShardStrategy::Column),
    ("transformer_blocks.*.attn1.to_v", ShardStrategy::Column),
    ("transformer_blocks.*.attn1.to_out.0", ShardStrategy::Row),
    ("transformer_blocks.*.attn2.to_q", ShardStrategy::Column),
    ("transformer_blocks.*.attn2.to_k", ShardStrategy::Column),
    ("transformer_blocks.*.attn2.to_v", ShardStrategy::Column),
    ("transformer_blocks.*.attn2.to_out.0", ShardStrategy::Row),
    ("transformer_blocks.*.ff.net.0.proj", ShardStrategy::Column),
    ("transformer_blocks.*.ff.net.2", ShardStrategy::Row),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct PixArtAlphaInferPolicy;

impl InferPolicy for PixArtAlphaInferPolicy {
    fn name(&self) -> &'static str {
        "PixArtAlphaInferPolicy"
    }

    fn architecture(&self) -> ModelArchitecture {
        ModelArchitecture::PixArtAlpha
    }

    fn parallel_layers(&self) -> &'static [(&'static str, ShardStrategy)] {
        PARALLEL_LAYERS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_attention_is_sharded() {
        let plan = PixArtAlphaInferPolicy.shard_plan(4, Some(16)).unwrap();
        assert_eq!(
            plan.strategy_for("transformer_blocks.27.attn2.to_k"),
            ShardStrategy::Column
        );
        assert_eq!(
            plan.strategy_for("transformer_blocks.27.attn2.to_out.0"),
            ShardStrategy::Row
        );
        assert_eq!(
            plan.strategy_for("pos_embed.proj"),
            ShardStrategy::Replicate
        );
    }
}
