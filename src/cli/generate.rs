//! One-shot text-to-image generation

use std::io::{self, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};

use super::RunArgs;
use crate::config::{DiffusionGenerationConfig, InferenceConfig};
use crate::dist::{DistContext, DistCoordinator};
use crate::engine::InferenceEngine;
use crate::loader::{load_pipeline, PipelineRegistry};
use crate::model::GeneratedImage;
use crate::policy::policy_for;

/// Where the generated image is written, relative to the working directory
pub const OUTPUT_PATH: &str = "cat.jpg";

/// Generate and save to [`OUTPUT_PATH`]
///
/// Uses an empty registry: no backend is compiled into the binary, so this
/// fails before launching. Embedders call [`run_with`] with their own registry.
pub fn run(args: &RunArgs) -> Result<()> {
    run_with(args, &PipelineRegistry::new(), Path::new(OUTPUT_PATH)).map(|_| ())
}

/// Launch from the process environment, generate, and shut down
///
/// Fails before launching when `registry` has no backend at all.
pub fn run_with(
    args: &RunArgs,
    registry: &PipelineRegistry,
    output: &Path,
) -> Result<GeneratedImage> {
    if registry.architectures().is_empty() {
        bail!(
            "no pipeline backend registered; register one with PipelineRegistry::register before running {}",
            args.model
        );
    }

    let ctx = DistContext::launch()?;
    let image = generate_on(&ctx, args, registry, output)?;
    ctx.shutdown();
    Ok(image)
}

/// Generate one image for `args.prompt` on an already launched context
///
/// Every rank takes part in generation; only the leader saves and prints.
pub fn generate_on(
    ctx: &DistContext,
    args: &RunArgs,
    registry: &PipelineRegistry,
    output: &Path,
) -> Result<GeneratedImage> {
    generate_to(ctx, args, registry, output, &mut io::stdout())
}

/// [`generate_on`], with the leader's progress and summary lines written to `out`
pub fn generate_to<W: Write>(
    ctx: &DistContext,
    args: &RunArgs,
    registry: &PipelineRegistry,
    output: &Path,
    out: &mut W,
) -> Result<GeneratedImage> {
    let _span = tracing::info_span!("rank", rank = ctx.rank()).entered();
    let coordinator = DistCoordinator::new(ctx);

    let config = InferenceConfig::from(args);
    config.validate()?;

    let (pipeline, model) = load_pipeline(&args.model, config.precision(), registry)?;
    coordinator.write_on_master(out, "Initializing Inference Engine...")?;
    let policy = policy_for(model.architecture);
    let mut engine = InferenceEngine::new(pipeline, config, policy, ctx, true)?;

    coordinator.write_on_master(out, "Generating...")?;
    let images = engine.generate(
        std::slice::from_ref(&args.prompt),
        &DiffusionGenerationConfig::default(),
    )?;
    let image = images
        .into_iter()
        .next()
        .context("pipeline returned no images")?;

    if coordinator.is_master() {
        image.save(output)?;
        tracing::info!("Saved image to {}", output.display());
    }
    coordinator.write_on_master(out, &image)?;

    Ok(image)
}
