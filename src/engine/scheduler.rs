//! Request scheduler
//!
//! Queues generation requests and groups them into batches for the pipeline.

use std::collections::VecDeque;

use crate::config::DiffusionGenerationConfig;

/// One queued generation request
#[derive(Debug, Clone, PartialEq)]
pub struct DiffusionSequence {
    /// Engine-assigned request id
    pub request_id: u64,
    /// Prompt text
    pub prompt: String,
    /// Sampling parameters
    pub config: DiffusionGenerationConfig,
}

/// FIFO request scheduler
///
/// Batches are formed from the head of the queue:
/// - at most `max_batch_size` requests per batch
/// - only consecutive requests sharing the head's generation config
#[derive(Debug)]
pub struct RequestScheduler {
    waiting: VecDeque<DiffusionSequence>,
    max_batch_size: usize,
}

impl RequestScheduler {
    /// Create a new scheduler
    pub fn new(max_batch_size: usize) -> Self {
        Self {
            waiting: VecDeque::new(),
            max_batch_size: max_batch_size.max(1),
        }
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Queue a request
    pub fn add(&mut self, sequence: DiffusionSequence) {
        self.waiting.push_back(sequence);
    }

    /// Check if any request is waiting
    pub fn has_pending(&self) -> bool {
        !self.waiting.is_empty()
    }

    /// Number of waiting requests
    pub fn pending(&self) -> usize {
        self.waiting.len()
    }

    /// Take the next batch off the queue
    ///
    /// Returns an empty batch when nothing is waiting.
    pub fn schedule(&mut self) -> Vec<DiffusionSequence> {
        let mut batch: Vec<DiffusionSequence> = Vec::new();

        while batch.len() < self.max_batch_size {
            let same_config = match (self.waiting.front(), batch.first()) {
                (None, _) => break,
                (Some(_), None) => true,
                (Some(next), Some(head)) => next.config == head.config,
            };
            if !same_config {
                break;
            }
            if let Some(sequence) = self.waiting.pop_front() {
                batch.push(sequence);
            }
        }

        batch
    }

    /// Drop every waiting request
    pub fn clear(&mut self) {
        self.waiting.clear();
    }
}
