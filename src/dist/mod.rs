//! Distributed execution context
//!
//! Processes are started by an external launcher (torchrun-compatible) that
//! describes each process through environment variables. [`DistContext`]
//! reads them once at startup and lives until [`DistContext::shutdown`].
//! Collective communication itself belongs to the pipeline backend.

mod coordinator;

pub use coordinator::DistCoordinator;

use std::fmt::Display;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};

/// Variables every launched process must see
const REQUIRED_VARS: [&str; 3] = ["RANK", "LOCAL_RANK", "WORLD_SIZE"];

/// Process group membership of this process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistContext {
    rank: usize,
    local_rank: usize,
    world_size: usize,
    local_world_size: usize,
    master_addr: Option<String>,
    master_port: Option<u16>,
}

/// The ranks sharing one copy of the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorParallelGroup {
    ranks: Vec<usize>,
    local_index: usize,
}

impl DistContext {
    /// Launch from the process environment
    pub fn launch() -> Result<Self> {
        Self::launch_with(|key| std::env::var(key).ok())
    }

    /// Launch from an arbitrary variable lookup.
    ///
    /// Without any launcher variables the process runs as a world of one.
    pub fn launch_with<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if REQUIRED_VARS.iter().all(|&key| lookup(key).is_none()) {
            tracing::debug!("No launcher environment found, running as a single process");
            return Ok(Self::single_process());
        }

        if let Some(missing) = REQUIRED_VARS.iter().find(|&&key| lookup(key).is_none()) {
            bail!(
                "environment variable {} is not set, which is needed to run under a distributed launcher",
                missing
            );
        }

        let rank: usize = parse_var(&lookup, "RANK")?;
        let local_rank: usize = parse_var(&lookup, "LOCAL_RANK")?;
        let world_size: usize = parse_var(&lookup, "WORLD_SIZE")?;
        let local_world_size: usize = match lookup("LOCAL_WORLD_SIZE") {
            Some(_) => parse_var(&lookup, "LOCAL_WORLD_SIZE")?,
            None => world_size,
        };
        let master_port: Option<u16> = match lookup("MASTER_PORT") {
            Some(_) => Some(parse_var(&lookup, "MASTER_PORT")?),
            None => None,
        };

        if world_size == 0 {
            bail!("WORLD_SIZE must be at least 1");
        }
        if rank >= world_size {
            bail!("RANK {} is out of range for WORLD_SIZE {}", rank, world_size);
        }
        if local_rank >= local_world_size {
            bail!(
                "LOCAL_RANK {} is out of range for LOCAL_WORLD_SIZE {}",
                local_rank,
                local_world_size
            );
        }

        let ctx = Self {
            rank,
            local_rank,
            world_size,
            local_world_size,
            master_addr: lookup("MASTER_ADDR"),
            master_port,
        };

        tracing::info!(
            "Launched rank {}/{} (local rank {}, master {}:{})",
            ctx.rank,
            ctx.world_size,
            ctx.local_rank,
            ctx.master_addr.as_deref().unwrap_or("-"),
            ctx.master_port
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string())
        );

        Ok(ctx)
    }

    /// A world containing only this process
    pub fn single_process() -> Self {
        Self {
            rank: 0,
            local_rank: 0,
            world_size: 1,
            local_world_size: 1,
            master_addr: None,
            master_port: None,
        }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn local_rank(&self) -> usize {
        self.local_rank
    }

    pub fn world_size(&self) -> usize {
        self.world_size
    }

    pub fn local_world_size(&self) -> usize {
        self.local_world_size
    }

    pub fn master_addr(&self) -> Option<&str> {
        self.master_addr.as_deref()
    }

    pub fn master_port(&self) -> Option<u16> {
        self.master_port
    }

    /// Check if more than one process takes part
    pub fn is_distributed(&self) -> bool {
        self.world_size > 1
    }

    /// Group of `tp_size` consecutive ranks containing this rank
    pub fn tensor_parallel_group(&self, tp_size: usize) -> Result<TensorParallelGroup> {
        if tp_size == 0 {
            bail!("tp_size must be at least 1");
        }
        if self.world_size % tp_size != 0 {
            bail!(
                "world size {} is not divisible by tp_size {}",
                self.world_size,
                tp_size
            );
        }

        let start = (self.rank / tp_size) * tp_size;
        Ok(TensorParallelGroup {
            ranks: (start..start + tp_size).collect(),
            local_index: self.rank - start,
        })
    }

    /// Tear down the context
    pub fn shutdown(self) {
        tracing::debug!("Shutting down rank {}/{}", self.rank, self.world_size);
    }
}

impl TensorParallelGroup {
    /// Global ranks in the group, ascending
    pub fn ranks(&self) -> &[usize] {
        &self.ranks
    }

    /// Position of this rank inside the group
    pub fn local_index(&self) -> usize {
        self.local_index
    }

    pub fn size(&self) -> usize {
        self.ranks.len()
    }

    /// Check if the group has a single member
    pub fn is_trivial(&self) -> bool {
        self.ranks.len() == 1
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key).ok_or_else(|| anyhow!("environment variable {} is not set", key))?;
    value
        .trim()
        .parse()
        .map_err(|e| anyhow!("{}", e))
        .with_context(|| format!("invalid value for {}: '{}'", key, value))
}
