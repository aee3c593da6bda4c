//! Inference engine
//!
//! Wraps a loaded pipeline, lays it out across the tensor-parallel group and
//! runs batched generation requests through it.

use std::collections::HashMap;

use anyhow::{anyhow, bail, Context, Result};
use rand::Rng;

use super::scheduler::{DiffusionSequence, RequestScheduler};
use crate::config::{DiffusionGenerationConfig, InferenceConfig};
use crate::dist::DistContext;
use crate::model::{BoxedPipeline, ExecutionPlan, GeneratedImage};
use crate::policy::InferPolicy;

/// Inference engine
///
/// Owns the pipeline for the lifetime of the run.
pub struct InferenceEngine {
    /// The loaded pipeline
    pipeline: BoxedPipeline,
    /// Engine configuration
    config: InferenceConfig,
    /// Policy for the pipeline's architecture
    policy: Box<dyn InferPolicy>,
    /// Layout handed to the pipeline at construction
    plan: ExecutionPlan,
    /// Waiting requests
    scheduler: RequestScheduler,
    /// Next request id to hand out
    next_request_id: u64,
}

impl InferenceEngine {
    /// Create a new engine
    ///
    /// # Arguments
    /// * `pipeline` - The loaded pipeline
    /// * `config` - Engine configuration
    /// * `policy` - Execution policy; must match the pipeline's architecture
    /// * `ctx` - Process group this rank belongs to
    /// * `verbose` - Log the resolved configuration and layout
    pub fn new(
        mut pipeline: BoxedPipeline,
        config: InferenceConfig,
        policy: Box<dyn InferPolicy>,
        ctx: &DistContext,
        verbose: bool,
    ) -> Result<Self> {
        config.validate().context("invalid inference config")?;

        let arch = pipeline.architecture();
        if policy.architecture() != arch {
            bail!(
                "policy {} does not apply to {} pipelines",
                policy.name(),
                arch
            );
        }

        let tp_group = ctx.tensor_parallel_group(config.tp_size)?;
        let shard_plan = policy.shard_plan(config.tp_size, pipeline.num_attention_heads())?;
        let plan = ExecutionPlan {
            precision: config.precision(),
            kernel_backend: config.kernel_backend(),
            tp_group,
            shard_plan,
            max_batch_size: config.max_batch_size,
        };

        if verbose {
            tracing::info!(
                "Inference config: dtype={}, max_batch_size={}, tp_size={}, kernels={}",
                config.dtype,
                config.max_batch_size,
                config.tp_size,
                plan.kernel_backend
            );
            tracing::info!(
                "Policy {} on rank {} (tp rank {}/{} in group {:?}, {} sharding rules)",
                policy.name(),
                ctx.rank(),
                plan.tp_group.local_index(),
                plan.tp_group.size(),
                plan.tp_group.ranks(),
                plan.shard_plan.rules.len()
            );
        }

        let start = std::time::Instant::now();
        pipeline
            .prepare(&plan)
            .with_context(|| format!("failed to prepare {} pipeline", arch))?;
        tracing::debug!("Pipeline prepared in {:?}", start.elapsed());

        Ok(Self {
            pipeline,
            scheduler: RequestScheduler::new(config.max_batch_size),
            config,
            policy,
            plan,
            next_request_id: 0,
        })
    }

    /// Get engine configuration
    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    pub fn policy(&self) -> &dyn InferPolicy {
        self.policy.as_ref()
    }

    /// Layout the pipeline was prepared with
    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    /// Generate images for `prompts`
    ///
    /// Results come back in prompt order, `config.images_per_prompt()` per
    /// prompt, regardless of how requests were batched.
    pub fn generate(
        &mut self,
        prompts: &[String],
        config: &DiffusionGenerationConfig,
    ) -> Result<Vec<GeneratedImage>> {
        if prompts.is_empty() {
            bail!("no prompts given");
        }

        let config = self.seeded(config);
        let request_ids: Vec<u64> = prompts
            .iter()
            .map(|prompt| {
                let request_id = self.next_request_id;
                self.next_request_id += 1;
                self.scheduler.add(DiffusionSequence {
                    request_id,
                    prompt: prompt.clone(),
                    config: config.clone(),
                });
                request_id
            })
            .collect();

        let mut outputs = match self.drain() {
            Ok(outputs) => outputs,
            Err(e) => {
                self.scheduler.clear();
                return Err(e);
            }
        };

        let mut images = Vec::with_capacity(prompts.len() * config.images_per_prompt());
        for request_id in request_ids {
            let request_images = outputs
                .remove(&request_id)
                .ok_or_else(|| anyhow!("request {} produced no output", request_id))?;
            images.extend(request_images);
        }
        Ok(images)
    }

    /// Run batches until the queue is empty
    fn drain(&mut self) -> Result<HashMap<u64, Vec<GeneratedImage>>> {
        let mut outputs = HashMap::new();

        while self.scheduler.has_pending() {
            let batch = self.scheduler.schedule();
            let Some(head) = batch.first() else {
                break;
            };
            let config = head.config.clone();
            let per_prompt = config.images_per_prompt();
            let prompts: Vec<String> = batch.iter().map(|s| s.prompt.clone()).collect();

            tracing::debug!(
                "Running batch of {} request(s), {} waiting",
                batch.len(),
                self.scheduler.pending()
            );
            let start = std::time::Instant::now();
            let images = self
                .pipeline
                .forward(&prompts, &config)
                .context("pipeline forward failed")?;
            tracing::debug!("Batch finished in {:.2}s", start.elapsed().as_secs_f64());

            if images.len() != batch.len() * per_prompt {
                bail!(
                    "pipeline returned {} image(s) for {} prompt(s) x {} per prompt",
                    images.len(),
                    batch.len(),
                    per_prompt
                );
            }

            let mut images = images.into_iter();
            for sequence in &batch {
                let request_images: Vec<GeneratedImage> =
                    images.by_ref().take(per_prompt).collect();
                outputs.insert(sequence.request_id, request_images);
            }
        }

        Ok(outputs)
    }

    /// Pin a seed so the run can be reproduced.
    ///
    /// Ranks of a tensor-parallel group must agree on the seed, so one is
    /// only drawn here when the group has a single member.
    fn seeded(&self, config: &DiffusionGenerationConfig) -> DiffusionGenerationConfig {
        match config.seed {
            Some(_) => config.clone(),
            None if self.plan.tp_group.is_trivial() => {
                let seed: u64 = rand::thread_rng().gen();
                tracing::info!("Using random seed {}", seed);
                config.clone().with_seed(seed)
            }
            None => config.clone(),
        }
    }
}
