//! Pipeline backend registry

use std::collections::HashMap;
use std::fmt;

use anyhow::{anyhow, Result};

use super::ResolvedModel;
use crate::config::Precision;
use crate::model::{BoxedPipeline, ModelArchitecture};

/// Builds a pipeline for a resolved model
pub type PipelineFactory =
    Box<dyn Fn(&ResolvedModel, Precision) -> Result<BoxedPipeline> + Send + Sync>;

/// Maps each architecture to the backend that runs it
#[derive(Default)]
pub struct PipelineRegistry {
    factories: HashMap<ModelArchitecture, PipelineFactory>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the backend for `arch`, replacing any previous one
    pub fn register<F>(&mut self, arch: ModelArchitecture, factory: F) -> &mut Self
    where
        F: Fn(&ResolvedModel, Precision) -> Result<BoxedPipeline> + Send + Sync + 'static,
    {
        if self.factories.insert(arch, Box::new(factory)).is_some() {
            tracing::debug!("Replaced pipeline backend for {}", arch);
        }
        self
    }

    pub fn contains(&self, arch: ModelArchitecture) -> bool {
        self.factories.contains_key(&arch)
    }

    /// Registered architectures
    pub fn architectures(&self) -> Vec<ModelArchitecture> {
        ModelArchitecture::ALL
            .into_iter()
            .filter(|arch| self.contains(*arch))
            .collect()
    }

    /// Build the pipeline for `model`
    pub fn build(&self, model: &ResolvedModel, precision: Precision) -> Result<BoxedPipeline> {
        let factory = self.factories.get(&model.architecture).ok_or_else(|| {
            anyhow!(
                "no pipeline backend registered for {}; register one with PipelineRegistry::register",
                model.architecture
            )
        })?;
        factory(model, precision)
    }
}

impl fmt::Debug for PipelineRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineRegistry")
            .field("architectures", &self.architectures())
            .finish()
    }
}
