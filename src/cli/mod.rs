//! Command-line interface
//!
//! A single command: load a text-to-image model, generate one image for a
//! prompt and save it.

mod generate;

pub use generate::{generate_on, generate_to, run, run_with, OUTPUT_PATH};

use clap::Parser;

use crate::config::{DType, InferenceConfig};

/// Diffuzr - distributed text-to-image inference
#[derive(Parser, Debug, Clone)]
#[command(name = "diffuzr")]
#[command(version, about, long_about = None)]
pub struct RunArgs {
    /// Model path, name under $DIFFUZR_MODEL_DIR, or HuggingFace repo id
    #[arg(short = 'm', long)]
    pub model: String,

    /// Tensor-parallel degree
    #[arg(short = 't', long = "tp_size", default_value = "1", value_parser = parse_positive)]
    pub tp_size: usize,

    /// Prompt text
    #[arg(
        short = 'p',
        long,
        default_value = "A cat holding a sign that says hello world"
    )]
    pub prompt: String,

    /// Maximum number of prompts per pipeline call
    #[arg(short = 'b', long = "max_batch_size", default_value = "1", value_parser = parse_positive)]
    pub max_batch_size: usize,

    /// Numeric precision
    #[arg(short = 'd', long, value_enum, default_value_t = DType::Fp16)]
    pub dtype: DType,

    /// Use CUDA kernels instead of Triton
    #[arg(long = "use_cuda_kernel")]
    pub use_cuda_kernel: bool,
}

impl From<&RunArgs> for InferenceConfig {
    fn from(args: &RunArgs) -> Self {
        Self {
            dtype: args.dtype,
            max_batch_size: args.max_batch_size,
            tp_size: args.tp_size,
            use_cuda_kernel: args.use_cuda_kernel,
            ..Default::default()
        }
    }
}

fn parse_positive(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use clap::error::ErrorKind;

    use super::*;

    #[test]
    fn test_defaults() {
        let args = RunArgs::try_parse_from(["diffuzr", "-m", "test-model"]).unwrap();
        assert_eq!(args.prompt, "A cat holding a sign that says hello world");
        assert_eq!(args.dtype, DType::Fp16);
        assert_eq!(args.tp_size, 1);
        assert_eq!(args.max_batch_size, 1);
        assert!(!args.use_cuda_kernel);
    }

    #[test]
    fn test_inference_config_from_args() {
        let args = RunArgs::try_parse_from([
            "diffuzr",
            "--model",
            "test-model",
            "--dtype",
            "bf16",
            "--max_batch_size",
            "4",
            "--tp_size",
            "2",
            "--use_cuda_kernel",
        ])
        .unwrap();

        let config = InferenceConfig::from(&args);
        assert_eq!(config.dtype, DType::Bf16);
        assert_eq!(config.max_batch_size, 4);
        assert_eq!(config.tp_size, 2);
        assert_eq!(config.pp_size, 1);
        assert!(config.use_cuda_kernel);
    }

    #[test]
    fn test_model_is_required() {
        let err = RunArgs::try_parse_from(["diffuzr"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_invalid_values_are_usage_errors() {
        for argv in [
            vec!["diffuzr", "-m", "x", "-d", "int8"],
            vec!["diffuzr", "-m", "x", "-t", "0"],
            vec!["diffuzr", "-m", "x", "-b", "0"],
            vec!["diffuzr", "-m", "x", "-b", "-1"],
        ] {
            let err = RunArgs::try_parse_from(argv.iter().copied()).unwrap_err();
            assert_eq!(err.exit_code(), 2, "{:?}", argv);
        }
    }
}
