//! Configuration system for diffuzr
//!
//! Holds the dtype/precision tables and the two configuration records the
//! engine consumes: [`InferenceConfig`] (how the engine is built) and
//! [`DiffusionGenerationConfig`] (how one generation call samples).

mod generation;
mod inference;

pub use generation::{DiffusionGenerationConfig, ResolvedGenerationParams};
pub use inference::{InferenceConfig, KernelBackend};

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Numeric precision requested on the command line.
///
/// Only the three values below exist, so anything that holds a `DType` has
/// already been validated.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    #[default]
    Fp16,
    Fp32,
    Bf16,
}

impl DType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DType::Fp16 => "fp16",
            DType::Fp32 => "fp32",
            DType::Bf16 => "bf16",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fp16" => Ok(DType::Fp16),
            "fp32" => Ok(DType::Fp32),
            "bf16" => Ok(DType::Bf16),
            other => Err(anyhow!(
                "unknown dtype: '{}' (expected one of fp16, fp32, bf16)",
                other
            )),
        }
    }
}

/// Internal numeric precision handed to pipeline backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Precision {
    F16,
    F32,
    BF16,
    /// Keep whatever precision the checkpoint was stored in
    Auto,
}

impl Precision {
    /// Map a dtype name to a precision.
    ///
    /// Unknown names fall back to [`Precision::Auto`] instead of failing.
    pub fn from_name(name: &str) -> Self {
        match name {
            "fp16" => Precision::F16,
            "fp32" => Precision::F32,
            "bf16" => Precision::BF16,
            _ => Precision::Auto,
        }
    }

    /// Bytes per element, if fixed
    pub fn size_in_bytes(&self) -> Option<usize> {
        match self {
            Precision::F16 | Precision::BF16 => Some(2),
            Precision::F32 => Some(4),
            Precision::Auto => None,
        }
    }

    /// diffusers weight variant stored in this precision
    pub fn variant(&self) -> Option<&'static str> {
        match self {
            Precision::F16 => Some("fp16"),
            Precision::F32 => Some("fp32"),
            Precision::BF16 => Some("bf16"),
            Precision::Auto => None,
        }
    }
}

impl From<DType> for Precision {
    fn from(dtype: DType) -> Self {
        match dtype {
            DType::Fp16 => Precision::F16,
            DType::Fp32 => Precision::F32,
            DType::Bf16 => Precision::BF16,
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Precision::F16 => "float16",
            Precision::F32 => "float32",
            Precision::BF16 => "bfloat16",
            Precision::Auto => "auto",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dtype_accepts_enumerated_values() {
        assert_eq!("fp16".parse::<DType>().unwrap(), DType::Fp16);
        assert_eq!("fp32".parse::<DType>().unwrap(), DType::Fp32);
        assert_eq!("bf16".parse::<DType>().unwrap(), DType::Bf16);
    }

    #[test]
    fn test_parse_dtype_rejects_everything_else() {
        assert!("f16".parse::<DType>().is_err());
        assert!("FP16".parse::<DType>().is_err());
        assert!("int8".parse::<DType>().is_err());
        assert!("".parse::<DType>().is_err());
    }

    #[test]
    fn test_precision_table() {
        assert_eq!(Precision::from(DType::Fp16), Precision::F16);
        assert_eq!(Precision::from(DType::Fp32), Precision::F32);
        assert_eq!(Precision::from(DType::Bf16), Precision::BF16);
    }

    #[test]
    fn test_precision_from_unknown_name_falls_back() {
        assert_eq!(Precision::from_name("bf16"), Precision::BF16);
        assert_eq!(Precision::from_name("int4"), Precision::Auto);
        assert_eq!(Precision::Auto.size_in_bytes(), None);
        assert_eq!(Precision::BF16.variant(), Some("bf16"));
        assert_eq!(Precision::Auto.variant(), None);
    }
}
