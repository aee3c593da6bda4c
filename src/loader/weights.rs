//! Weight inventory of pipeline components
//!
//! Only safetensors headers are inspected; tensor data stays on disk behind
//! a memory map until the backend loads it.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use memmap2::Mmap;
use safetensors::SafeTensors;

use crate::config::Precision;

/// What a component directory holds
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentWeights {
    /// Component name ("transformer", "vae", ...)
    pub component: String,
    /// diffusers variant the files belong to ("fp16", ...), None for the
    /// default checkpoint
    pub variant: Option<String>,
    /// Weight files of that variant, sorted (shards in order)
    pub files: Vec<PathBuf>,
    pub num_tensors: usize,
    /// Total element count over all tensors
    pub num_params: u64,
    /// Stored dtypes ("F16", "BF16", ...)
    pub dtypes: BTreeSet<String>,
}

impl ComponentWeights {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Parameter count in billions
    pub fn params_billions(&self) -> f64 {
        self.num_params as f64 / 1e9
    }
}

/// Find the safetensors files of a component directory
pub fn find_weight_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = dir.join("*.safetensors");
    let pattern = pattern
        .to_str()
        .ok_or_else(|| anyhow!("non UTF-8 path: {}", dir.display()))?;

    let mut files: Vec<PathBuf> = glob::glob(pattern)?.filter_map(|r| r.ok()).collect();
    files.sort();
    Ok(files)
}

/// Variant of a diffusers weight file
///
/// `diffusion_pytorch_model.safetensors` has none,
/// `diffusion_pytorch_model.fp16.safetensors` and
/// `diffusion_pytorch_model.fp16-00001-of-00002.safetensors` are "fp16".
pub fn weight_variant(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?.strip_suffix(".safetensors")?;
    let name = strip_shard_suffix(name);
    name.rsplit_once('.')
        .map(|(_, variant)| variant.to_string())
        .filter(|variant| !variant.is_empty())
}

/// `model-00001-of-00002` -> `model`
fn strip_shard_suffix(name: &str) -> &str {
    let is_index = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if let Some((head, total)) = name.rsplit_once("-of-") {
        if let Some((base, index)) = head.rsplit_once('-') {
            if is_index(index) && is_index(total) {
                return base;
            }
        }
    }
    name
}

/// Pick one checkpoint out of the variants present
///
/// The variant named after `precision` wins, then the default checkpoint,
/// then the first variant by name.
fn select_variant(
    mut groups: BTreeMap<Option<String>, Vec<PathBuf>>,
    precision: Precision,
) -> Option<(Option<String>, Vec<PathBuf>)> {
    let preferred = precision.variant().map(str::to_string);
    for key in [preferred, None] {
        if let Some(files) = groups.remove(&key) {
            return Some((key, files));
        }
    }
    groups.into_iter().next()
}

/// Inventory the weights under `root/component`
///
/// When the directory holds several diffusers variants, only one of them is
/// counted (see [`select_variant`]). A missing directory yields an empty
/// inventory.
pub fn inventory_component(
    root: &Path,
    component: &str,
    precision: Precision,
) -> Result<ComponentWeights> {
    let dir = root.join(component);
    let mut weights = ComponentWeights {
        component: component.to_string(),
        ..Default::default()
    };
    if !dir.is_dir() {
        return Ok(weights);
    }

    let mut groups: BTreeMap<Option<String>, Vec<PathBuf>> = BTreeMap::new();
    for file in find_weight_files(&dir)? {
        groups.entry(weight_variant(&file)).or_default().push(file);
    }
    let num_variants = groups.len();
    let Some((variant, files)) = select_variant(groups, precision) else {
        return Ok(weights);
    };
    if num_variants > 1 {
        tracing::debug!(
            "Component {}: using {} weights out of {} variants",
            component,
            variant.as_deref().unwrap_or("default"),
            num_variants
        );
    }

    weights.variant = variant;
    for file in files {
        inspect_file(&file, &mut weights)
            .with_context(|| format!("failed to read weights from {}", file.display()))?;
        weights.files.push(file);
    }

    if !weights.is_empty() {
        tracing::debug!(
            "Component {}: {} file(s), {} tensors, {:.2}B params, dtypes {:?}",
            weights.component,
            weights.files.len(),
            weights.num_tensors,
            weights.params_billions(),
            weights.dtypes
        );
    }

    Ok(weights)
}

fn inspect_file(path: &Path, weights: &mut ComponentWeights) -> Result<()> {
    let file = File::open(path)?;
    // SAFETY: the map is read-only and dropped before returning
    let mmap = unsafe { Mmap::map(&file)? };
    let tensors = SafeTensors::deserialize(&mmap).map_err(|e| anyhow!("{}", e))?;

    for (_, view) in tensors.tensors() {
        weights.num_tensors += 1;
        weights.num_params += view.shape().iter().product::<usize>() as u64;
        weights.dtypes.insert(format!("{:?}", view.dtype()));
    }
    Ok(())
}
