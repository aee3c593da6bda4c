//! Inference engine configuration

use std::fmt;
use std::path::Path;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::{DType, Precision};

/// Kernel family the pipeline backend should dispatch to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelBackend {
    /// Triton kernels (default)
    Triton,
    /// Hand-written CUDA kernels
    Cuda,
}

impl fmt::Display for KernelBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelBackend::Triton => f.write_str("triton"),
            KernelBackend::Cuda => f.write_str("cuda"),
        }
    }
}

/// Inference engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Data type for inference (fp16, fp32, bf16)
    #[serde(default)]
    pub dtype: DType,

    /// Maximum number of requests grouped into one pipeline call
    #[serde(default = "default_one")]
    pub max_batch_size: usize,

    /// Number of ranks cooperating on one forward pass
    #[serde(default = "default_one")]
    pub tp_size: usize,

    /// Pipeline-parallel degree. Diffusion models only run with 1.
    #[serde(default = "default_one")]
    pub pp_size: usize,

    /// Use CUDA kernels instead of Triton
    #[serde(default)]
    pub use_cuda_kernel: bool,
}

fn default_one() -> usize {
    1
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            dtype: DType::default(),
            max_batch_size: default_one(),
            tp_size: default_one(),
            pp_size: default_one(),
            use_cuda_kernel: false,
        }
    }
}

impl InferenceConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Check the configuration before an engine is built from it
    pub fn validate(&self) -> Result<()> {
        if self.max_batch_size == 0 {
            bail!("max_batch_size must be at least 1");
        }
        if self.tp_size == 0 {
            bail!("tp_size must be at least 1");
        }
        if self.pp_size != 1 {
            bail!(
                "pipeline parallelism is not supported for diffusion models (pp_size = {})",
                self.pp_size
            );
        }
        Ok(())
    }

    /// Precision the pipeline should run in
    pub fn precision(&self) -> Precision {
        Precision::from(self.dtype)
    }

    pub fn kernel_backend(&self) -> KernelBackend {
        if self.use_cuda_kernel {
            KernelBackend::Cuda
        } else {
            KernelBackend::Triton
        }
    }
}
