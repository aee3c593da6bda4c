//! Core inference engine
//!
//! This module provides the generation pipeline around a loaded model:
//! - InferenceEngine: binds a pipeline to a policy and a process group
//! - RequestScheduler: queues requests and forms batches

mod inference;
mod scheduler;

pub use inference::InferenceEngine;
pub use scheduler::{DiffusionSequence, RequestScheduler};
