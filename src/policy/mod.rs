//! Per-architecture execution policies
//!
//! A policy tells the engine which pipeline component does the denoising and
//! how that component's layers are split across a tensor-parallel group. The
//! backend performs the split; the policy only names it.

mod pixart_alpha;
mod stable_diffusion3;

pub use pixart_alpha::PixArtAlphaInferPolicy;
pub use stable_diffusion3::StableDiffusion3InferPolicy;

use anyhow::{bail, Result};

use crate::model::ModelArchitecture;

/// How a linear layer is split across the tensor-parallel group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardStrategy {
    /// Output features split; each rank holds a slice of the weight rows
    Column,
    /// Input features split; partial outputs are summed across ranks
    Row,
    /// Every rank holds the full layer
    Replicate,
}

/// A module-name pattern and the strategy applied to matching modules.
///
/// Patterns are dot-separated; a `*` segment matches any single segment
/// (usually the block index).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardRule {
    pub pattern: String,
    pub strategy: ShardStrategy,
}

/// Sharding layout of the denoiser for one tensor-parallel degree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardPlan {
    pub tp_size: usize,
    pub rules: Vec<ShardRule>,
}

impl ShardPlan {
    /// Plan that keeps every module whole
    pub fn replicated() -> Self {
        Self {
            tp_size: 1,
            rules: Vec::new(),
        }
    }

    /// Check if any module is split
    pub fn is_sharded(&self) -> bool {
        self.tp_size > 1 && !self.rules.is_empty()
    }

    /// Strategy for a module; modules without a rule are replicated
    pub fn strategy_for(&self, module: &str) -> ShardStrategy {
        self.rules
            .iter()
            .find(|rule| pattern_matches(&rule.pattern, module))
            .map(|rule| rule.strategy)
            .unwrap_or(ShardStrategy::Replicate)
    }
}

/// Execution policy for one model family
pub trait InferPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Model family the policy applies to
    fn architecture(&self) -> ModelArchitecture;

    /// Pipeline component holding the denoiser weights
    fn denoiser_component(&self) -> &'static str {
        "transformer"
    }

    /// Column/row-parallel layer patterns inside the denoiser
    fn parallel_layers(&self) -> &'static [(&'static str, ShardStrategy)];

    /// Sharding layout for `tp_size` ranks.
    ///
    /// `num_attention_heads`, when known, must divide evenly by `tp_size`.
    fn shard_plan(&self, tp_size: usize, num_attention_heads: Option<usize>) -> Result<ShardPlan> {
        if tp_size == 0 {
            bail!("tp_size must be at least 1");
        }
        if tp_size == 1 {
            return Ok(ShardPlan::replicated());
        }
        if let Some(heads) = num_attention_heads {
            if heads % tp_size != 0 {
                bail!(
                    "{}: {} attention heads cannot be split across {} ranks",
                    self.name(),
                    heads,
                    tp_size
                );
            }
        }

        Ok(ShardPlan {
            tp_size,
            rules: self
                .parallel_layers()
                .iter()
                .map(|(pattern, strategy)| ShardRule {
                    pattern: pattern.to_string(),
                    strategy: *strategy,
                })
                .collect(),
        })
    }
}

/// Policy registry: the policy for each supported architecture
pub fn policy_for(arch: ModelArchitecture) -> Box<dyn InferPolicy> {
    match arch {
        ModelArchitecture::StableDiffusion3 => Box::new(StableDiffusion3InferPolicy),
        ModelArchitecture::PixArtAlpha => Box::new(PixArtAlphaInferPolicy),
    }
}

fn pattern_matches(pattern: &str, module: &str) -> bool {
    let mut pattern_parts = pattern.split('.');
    let mut module_parts = module.split('.');
    loop {
        match (pattern_parts.next(), module_parts.next()) {
            (None, None) => return true,
            (Some("*"), Some(_)) => {}
            (Some(p), Some(m)) if p == m => {}
            _ => return false,
        }
    }
}
