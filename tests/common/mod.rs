#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use image::DynamicImage;
use safetensors::tensor::TensorView;
use safetensors::Dtype;

use diffuzr::config::Precision;
use diffuzr::loader::{PipelineRegistry, MODEL_INDEX_FILE};
use diffuzr::model::{BoxedPipeline, DiffusionPipeline, ExecutionPlan, GeneratedImage};
use diffuzr::{DiffusionGenerationConfig, ModelArchitecture};

/// Everything the stub backend was asked to do
#[derive(Debug, Default)]
pub struct Calls {
    pub loaded: Vec<Precision>,
    pub plans: Vec<ExecutionPlan>,
    pub batches: Vec<Vec<String>>,
    pub configs: Vec<DiffusionGenerationConfig>,
}

/// Backend that paints a blank image per prompt and records its calls
pub struct StubPipeline {
    arch: ModelArchitecture,
    precision: Precision,
    calls: Arc<Mutex<Calls>>,
}

impl DiffusionPipeline for StubPipeline {
    fn architecture(&self) -> ModelArchitecture {
        self.arch
    }

    fn precision(&self) -> Precision {
        self.precision
    }

    fn num_attention_heads(&self) -> Option<usize> {
        Some(24)
    }

    fn prepare(&mut self, plan: &ExecutionPlan) -> Result<()> {
        self.calls.lock().unwrap().plans.push(plan.clone());
        Ok(())
    }

    fn forward(
        &mut self,
        prompts: &[String],
        config: &DiffusionGenerationConfig,
    ) -> Result<Vec<GeneratedImage>> {
        let mut calls = self.calls.lock().unwrap();
        calls.batches.push(prompts.to_vec());
        calls.configs.push(config.clone());

        let params = config.resolved_for(self.arch);
        let count = prompts.len() * config.images_per_prompt();
        Ok((0..count)
            .map(|_| GeneratedImage::new(DynamicImage::new_rgb8(params.width / 16, params.height / 16)))
            .collect())
    }
}

/// Registry with the stub backend for every architecture
pub fn stub_registry() -> (PipelineRegistry, Arc<Mutex<Calls>>) {
    let calls = Arc::new(Mutex::new(Calls::default()));
    let mut registry = PipelineRegistry::new();
    for arch in ModelArchitecture::ALL {
        let calls = Arc::clone(&calls);
        registry.register(arch, move |model, precision| {
            calls.lock().unwrap().loaded.push(precision);
            Ok(Box::new(StubPipeline {
                arch: model.architecture,
                precision,
                calls: Arc::clone(&calls),
            }) as BoxedPipeline)
        });
    }
    (registry, calls)
}

/// Write a minimal diffusers pipeline directory
pub fn write_model(root: &Path, class_name: &str) {
    std::fs::create_dir_all(root).unwrap();
    std::fs::write(
        root.join(MODEL_INDEX_FILE),
        format!(
            r#"{{
  "_class_name": "{}",
  "_diffusers_version": "0.29.0",
  "scheduler": ["diffusers", "FlowMatchEulerDiscreteScheduler"],
  "transformer": ["diffusers", "SD3Transformer2DModel"],
  "vae": ["diffusers", "AutoencoderKL"]
}}"#,
            class_name
        ),
    )
    .unwrap();

    let transformer = root.join("transformer");
    std::fs::create_dir_all(&transformer).unwrap();
    let data = vec![0u8; 64 * 4];
    let view = TensorView::new(Dtype::F32, vec![8, 8], &data).unwrap();
    safetensors::serialize_to_file(
        vec![("proj_out.weight", view)],
        &None,
        &transformer.join("diffusion_pytorch_model.safetensors"),
    )
    .unwrap();
}

/// Launcher environment for one rank
pub fn rank_env(rank: usize, world_size: usize) -> impl Fn(&str) -> Option<String> {
    move |key: &str| match key {
        "RANK" | "LOCAL_RANK" => Some(rank.to_string()),
        "WORLD_SIZE" => Some(world_size.to_string()),
        "MASTER_ADDR" => Some("127.0.0.1".to_string()),
        "MASTER_PORT" => Some("29500".to_string()),
        _ => None,
    }
}

/// Number of entries in a directory
pub fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}
