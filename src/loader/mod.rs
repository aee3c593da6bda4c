//! Model loading
//!
//! Turns a model path, name or hub id into a [`ResolvedModel`] (the parsed
//! diffusers `model_index.json` plus a weight inventory) and hands it to the
//! backend registered for its architecture.

mod detect;
mod model_index;
mod registry;
mod weights;

pub use detect::{
    detect_model_source, detect_model_source_in, model_dir, ModelSource, MODEL_INDEX_FILE,
};
pub use model_index::{ComponentSpec, ModelIndex};
pub use registry::{PipelineFactory, PipelineRegistry};
pub use weights::{find_weight_files, inventory_component, weight_variant, ComponentWeights};

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use hf_hub::api::sync::Api;

use crate::config::Precision;
use crate::model::{BoxedPipeline, ModelArchitecture};
use crate::policy::policy_for;

/// A model located and inspected, ready for a backend
#[derive(Debug, Clone)]
pub struct ResolvedModel {
    pub source: ModelSource,
    /// Directory holding `model_index.json` and the component directories
    pub root: PathBuf,
    pub index: ModelIndex,
    pub architecture: ModelArchitecture,
    /// Weight inventory per present component (local sources only)
    pub weights: BTreeMap<String, ComponentWeights>,
}

impl ResolvedModel {
    /// Directory of a component, e.g. `root/transformer`
    pub fn component_dir(&self, component: &str) -> PathBuf {
        self.root.join(component)
    }

    pub fn component_weights(&self, component: &str) -> Option<&ComponentWeights> {
        self.weights.get(component)
    }

    /// Total parameter count over all inventoried components
    pub fn num_params(&self) -> u64 {
        self.weights.values().map(|w| w.num_params).sum()
    }
}

/// Resolve a model source into a [`ResolvedModel`]
pub fn resolve_model(source: ModelSource) -> Result<ResolvedModel> {
    resolve_model_for(source, Precision::Auto)
}

/// Resolve a model source, inventorying the weight variant matching `precision`
pub fn resolve_model_for(source: ModelSource, precision: Precision) -> Result<ResolvedModel> {
    match &source {
        ModelSource::Local(root) => resolve_local(root.clone(), source, precision),
        ModelSource::Hub(repo_id) => resolve_hub(repo_id.clone(), source),
    }
}

fn resolve_local(
    root: PathBuf,
    source: ModelSource,
    precision: Precision,
) -> Result<ResolvedModel> {
    let index_path = root.join(MODEL_INDEX_FILE);
    if !index_path.is_file() {
        bail!(
            "Incompatible model: {} has no {}",
            root.display(),
            MODEL_INDEX_FILE
        );
    }

    let index = ModelIndex::from_path(&index_path)?;
    let architecture = index.architecture()?;

    let mut weights = BTreeMap::new();
    for component in index.present_components() {
        let inventory = inventory_component(&root, component, precision)?;
        if !inventory.is_empty() {
            weights.insert(component.to_string(), inventory);
        }
    }

    let denoiser = policy_for(architecture).denoiser_component();
    if !weights.contains_key(denoiser) {
        bail!(
            "Incompatible model: no {} weights found under {}",
            denoiser,
            root.join(denoiser).display()
        );
    }

    Ok(ResolvedModel {
        source,
        root,
        index,
        architecture,
        weights,
    })
}

fn resolve_hub(repo_id: String, source: ModelSource) -> Result<ResolvedModel> {
    tracing::info!("Fetching {} from {}", MODEL_INDEX_FILE, repo_id);

    let api = Api::new()?;
    let repo = api.model(repo_id.clone());

    let index_path = repo
        .get(MODEL_INDEX_FILE)
        .with_context(|| format!("failed to fetch {} from {}", MODEL_INDEX_FILE, repo_id))?;
    let index = ModelIndex::from_path(&index_path)?;
    let architecture = index.architecture()?;

    // Component configs are small; weights are left for the backend to fetch
    for component in index.present_components() {
        let file = format!("{}/{}", component, config_file_for(component));
        match repo.get(&file) {
            Ok(_) => tracing::debug!("Fetched {}", file),
            Err(e) => tracing::debug!("No {} in {}: {}", file, repo_id, e),
        }
    }

    let root = index_path
        .parent()
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("invalid cache path {}", index_path.display()))?;

    Ok(ResolvedModel {
        source,
        root,
        index,
        architecture,
        weights: BTreeMap::new(),
    })
}

/// Config file name of a diffusers component
fn config_file_for(component: &str) -> &'static str {
    match component {
        "scheduler" => "scheduler_config.json",
        c if c.starts_with("tokenizer") => "tokenizer_config.json",
        _ => "config.json",
    }
}

/// Load a pipeline from a path, name or hub id
pub fn load_pipeline(
    model: &str,
    precision: Precision,
    registry: &PipelineRegistry,
) -> Result<(BoxedPipeline, ResolvedModel)> {
    let source = detect_model_source(model)?;
    tracing::info!("Loading {} from {}", model, source);

    let resolved = resolve_model_for(source, precision)?;
    let num_params = resolved.num_params();
    match precision.size_in_bytes() {
        Some(bytes) => tracing::info!(
            "Detected {} ({}), {:.2}B params, {:.2} GB at {}",
            resolved.architecture,
            resolved.index.class_name(),
            num_params as f64 / 1e9,
            (num_params * bytes as u64) as f64 / (1024.0 * 1024.0 * 1024.0),
            precision
        ),
        None => tracing::info!(
            "Detected {} ({}), {:.2}B params",
            resolved.architecture,
            resolved.index.class_name(),
            num_params as f64 / 1e9
        ),
    }

    let pipeline = registry
        .build(&resolved, precision)
        .with_context(|| format!("failed to load {}", model))?;
    if pipeline.architecture() != resolved.architecture {
        bail!(
            "backend for {} returned a {} pipeline",
            resolved.architecture,
            pipeline.architecture()
        );
    }

    Ok((pipeline, resolved))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::config::DiffusionGenerationConfig;
    use crate::model::{DiffusionPipeline, ExecutionPlan, GeneratedImage};

    struct NullPipeline(ModelArchitecture, Precision);

    impl DiffusionPipeline for NullPipeline {
        fn architecture(&self) -> ModelArchitecture {
            self.0
        }

        fn precision(&self) -> Precision {
            self.1
        }

        fn prepare(&mut self, _plan: &ExecutionPlan) -> Result<()> {
            Ok(())
        }

        fn forward(
            &mut self,
            _prompts: &[String],
            _config: &DiffusionGenerationConfig,
        ) -> Result<Vec<GeneratedImage>> {
            Ok(Vec::new())
        }
    }

    fn write_model(root: &Path, class_name: &str, with_transformer: bool) {
        std::fs::write(
            root.join(MODEL_INDEX_FILE),
            format!(
                r#"{{"_class_name": "{}", "transformer": ["diffusers", "SD3Transformer2DModel"], "vae": ["diffusers", "AutoencoderKL"]}}"#,
                class_name
            ),
        )
        .unwrap();
        if with_transformer {
            let dir = root.join("transformer");
            std::fs::create_dir(&dir).unwrap();
            weights::tests::write_safetensors(
                &dir.join("diffusion_pytorch_model.safetensors"),
                &[("proj_out.weight", vec![8, 4])],
            );
        }
    }

    #[test]
    fn test_resolve_local_model() {
        let dir = tempfile::tempdir().unwrap();
        write_model(dir.path(), "StableDiffusion3Pipeline", true);

        let model = resolve_model(ModelSource::Local(dir.path().to_path_buf())).unwrap();
        assert_eq!(model.architecture, ModelArchitecture::StableDiffusion3);
        assert_eq!(model.num_params(), 32);
        assert!(model.component_weights("transformer").is_some());
        assert!(model.component_weights("vae").is_none());
        assert_eq!(model.component_dir("vae"), dir.path().join("vae"));
    }

    #[test]
    fn test_resolve_counts_one_variant() {
        let dir = tempfile::tempdir().unwrap();
        write_model(dir.path(), "StableDiffusion3Pipeline", true);
        weights::tests::write_safetensors(
            &dir.path().join("transformer/diffusion_pytorch_model.fp16.safetensors"),
            &[("proj_out.weight", vec![8, 4])],
        );

        let model = resolve_model(ModelSource::Local(dir.path().to_path_buf())).unwrap();
        assert_eq!(model.num_params(), 32);

        let model =
            resolve_model_for(ModelSource::Local(dir.path().to_path_buf()), Precision::F16)
                .unwrap();
        let transformer = model.component_weights("transformer").unwrap();
        assert_eq!(transformer.variant.as_deref(), Some("fp16"));
        assert_eq!(transformer.files.len(), 1);
        assert_eq!(model.num_params(), 32);
    }

    #[test]
    fn test_missing_denoiser_weights_is_incompatible() {
        let dir = tempfile::tempdir().unwrap();
        write_model(dir.path(), "StableDiffusion3Pipeline", false);

        let err = resolve_model(ModelSource::Local(dir.path().to_path_buf())).unwrap_err();
        assert!(err.to_string().contains("Incompatible model"));
    }

    #[test]
    fn test_unknown_pipeline_class_is_incompatible() {
        let dir = tempfile::tempdir().unwrap();
        write_model(dir.path(), "StableDiffusionXLPipeline", true);

        assert!(resolve_model(ModelSource::Local(dir.path().to_path_buf())).is_err());
    }

    #[test]
    fn test_missing_index_is_incompatible() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_model(ModelSource::Local(dir.path().to_path_buf())).unwrap_err();
        assert!(err.to_string().contains(MODEL_INDEX_FILE));
    }

    #[test]
    fn test_load_pipeline_uses_registered_backend() {
        let dir = tempfile::tempdir().unwrap();
        write_model(dir.path(), "StableDiffusion3Pipeline", true);

        let mut registry = PipelineRegistry::new();
        registry.register(ModelArchitecture::StableDiffusion3, |model, precision| {
            Ok(Box::new(NullPipeline(model.architecture, precision)) as BoxedPipeline)
        });

        let (pipeline, resolved) =
            load_pipeline(dir.path().to_str().unwrap(), Precision::F32, &registry).unwrap();
        assert_eq!(pipeline.precision(), Precision::F32);
        assert_eq!(resolved.index.class_name(), "StableDiffusion3Pipeline");
    }

    #[test]
    fn test_load_pipeline_without_backend_fails() {
        let dir = tempfile::tempdir().unwrap();
        write_model(dir.path(), "StableDiffusion3Pipeline", true);

        let registry = PipelineRegistry::new();
        let Err(err) = load_pipeline(dir.path().to_str().unwrap(), Precision::F16, &registry)
        else {
            panic!("loading without a backend should fail");
        };
        assert!(format!("{:#}", err).contains("no pipeline backend registered"));
    }

    #[test]
    fn test_backend_architecture_must_match() {
        let dir = tempfile::tempdir().unwrap();
        write_model(dir.path(), "StableDiffusion3Pipeline", true);

        let mut registry = PipelineRegistry::new();
        registry.register(ModelArchitecture::StableDiffusion3, |_, precision| {
            Ok(Box::new(NullPipeline(ModelArchitecture::PixArtAlpha, precision)) as BoxedPipeline)
        });
        assert_eq!(
            registry.architectures(),
            vec![ModelArchitecture::StableDiffusion3]
        );

        assert!(load_pipeline(dir.path().to_str().unwrap(), Precision::F16, &registry).is_err());
    }
}
