//! diffusers `model_index.json`

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde_json::Value;

use crate::model::ModelArchitecture;

/// One component entry, e.g. `"vae": ["diffusers", "AutoencoderKL"]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentSpec {
    /// Library providing the component ("diffusers", "transformers", ...)
    pub library: Option<String>,
    /// Component class name
    pub class_name: Option<String>,
}

impl ComponentSpec {
    /// Check if the pipeline ships this component (null entries are optional
    /// components left out of the checkpoint)
    pub fn is_present(&self) -> bool {
        self.class_name.is_some()
    }
}

/// Parsed pipeline index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelIndex {
    class_name: String,
    diffusers_version: Option<String>,
    components: BTreeMap<String, ComponentSpec>,
}

impl ModelIndex {
    /// Load from a `model_index.json` file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json_str(&content).with_context(|| format!("invalid {}", path.display()))
    }

    /// Parse the JSON text of a `model_index.json`
    ///
    /// Keys starting with `_` are metadata; `[library, class]` pairs are
    /// components; any other entry (pipeline flags) is ignored.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content)?;
        let entries = value
            .as_object()
            .ok_or_else(|| anyhow!("model index is not a JSON object"))?;

        let class_name = entries
            .get("_class_name")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("model index has no _class_name"))?
            .to_string();
        let diffusers_version = entries
            .get("_diffusers_version")
            .and_then(Value::as_str)
            .map(str::to_string);

        let mut components = BTreeMap::new();
        for (name, entry) in entries {
            if name.starts_with('_') {
                continue;
            }
            if let Some([library, class]) = entry.as_array().map(Vec::as_slice) {
                components.insert(
                    name.clone(),
                    ComponentSpec {
                        library: library.as_str().map(str::to_string),
                        class_name: class.as_str().map(str::to_string),
                    },
                );
            }
        }

        Ok(Self {
            class_name,
            diffusers_version,
            components,
        })
    }

    /// Pipeline class name (`_class_name`)
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn diffusers_version(&self) -> Option<&str> {
        self.diffusers_version.as_deref()
    }

    /// Model family of the pipeline
    pub fn architecture(&self) -> Result<ModelArchitecture> {
        ModelArchitecture::from_class_name(&self.class_name)
    }

    /// All components, including absent optional ones
    pub fn components(&self) -> &BTreeMap<String, ComponentSpec> {
        &self.components
    }

    pub fn component(&self, name: &str) -> Option<&ComponentSpec> {
        self.components.get(name)
    }

    /// Names of components shipped with the checkpoint
    pub fn present_components(&self) -> impl Iterator<Item = &str> {
        self.components
            .iter()
            .filter(|(_, spec)| spec.is_present())
            .map(|(name, _)| name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SD3_INDEX: &str = r#"{
  "_class_name": "StableDiffusion3Pipeline",
  "_diffusers_version": "0.29.0.dev0",
  "feature_extractor": [null, null],
  "scheduler": ["diffusers", "FlowMatchEulerDiscreteScheduler"],
  "text_encoder": ["transformers", "CLIPTextModelWithProjection"],
  "text_encoder_3": ["transformers", "T5EncoderModel"],
  "tokenizer": ["transformers", "CLIPTokenizer"],
  "transformer": ["diffusers", "SD3Transformer2DModel"],
  "vae": ["diffusers", "AutoencoderKL"]
}"#;

    #[test]
    fn test_parse_sd3_index() {
        let index = ModelIndex::from_json_str(SD3_INDEX).unwrap();
        assert_eq!(index.class_name(), "StableDiffusion3Pipeline");
        assert_eq!(index.diffusers_version(), Some("0.29.0.dev0"));
        assert_eq!(
            index.architecture().unwrap(),
            ModelArchitecture::StableDiffusion3
        );
        assert_eq!(
            index.component("transformer").unwrap().class_name.as_deref(),
            Some("SD3Transformer2DModel")
        );
    }

    #[test]
    fn test_null_components_are_not_present() {
        let index = ModelIndex::from_json_str(SD3_INDEX).unwrap();
        assert!(index.component("feature_extractor").is_some());
        let present: Vec<&str> = index.present_components().collect();
        assert!(!present.contains(&"feature_extractor"));
        assert!(present.contains(&"vae"));
    }

    #[test]
    fn test_flags_are_ignored() {
        let index = ModelIndex::from_json_str(
            r#"{"_class_name": "PixArtAlphaPipeline", "requires_safety_checker": false, "transformer": ["diffusers", "PixArtTransformer2DModel"]}"#,
        )
        .unwrap();
        assert_eq!(index.components().len(), 1);
        assert_eq!(index.architecture().unwrap(), ModelArchitecture::PixArtAlpha);
    }

    #[test]
    fn test_missing_class_name_is_an_error() {
        assert!(ModelIndex::from_json_str(r#"{"vae": ["diffusers", "AutoencoderKL"]}"#).is_err());
        assert!(ModelIndex::from_json_str("[]").is_err());
    }
}
