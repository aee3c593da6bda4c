//! Rank-aware output

use std::fmt::Display;
use std::io::{self, Write};

use super::DistContext;

/// Identifies the leader processes of a distributed run so that each message
/// is printed once rather than once per rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistCoordinator {
    rank: usize,
    local_rank: usize,
    world_size: usize,
}

impl DistCoordinator {
    pub fn new(ctx: &DistContext) -> Self {
        Self {
            rank: ctx.rank(),
            local_rank: ctx.local_rank(),
            world_size: ctx.world_size(),
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

    /// Check if this is the global leader (rank 0)
    pub fn is_master(&self) -> bool {
        self.rank == 0
    }

    /// Check if this is the leader of its node (local rank 0)
    pub fn is_node_master(&self) -> bool {
        self.local_rank == 0
    }

    /// Write `msg` as a line to `out` on the global leader only.
    ///
    /// Returns whether this rank wrote.
    pub fn write_on_master<W: Write>(&self, out: &mut W, msg: impl Display) -> io::Result<bool> {
        if !self.is_master() {
            return Ok(false);
        }
        writeln!(out, "{}", msg)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rank_context(rank: usize, local_rank: usize, world_size: usize) -> DistContext {
        let rank = rank.to_string();
        let local_rank = local_rank.to_string();
        let world_size = world_size.to_string();
        DistContext::launch_with(|key| match key {
            "RANK" => Some(rank.clone()),
            "LOCAL_RANK" => Some(local_rank.clone()),
            "WORLD_SIZE" => Some(world_size.clone()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn test_leader_message_is_written_once_per_world() {
        let mut out = Vec::new();
        let mut writers = 0;

        for rank in 0..4 {
            let coordinator = DistCoordinator::new(&rank_context(rank, rank, 4));
            if coordinator
                .write_on_master(&mut out, "Generating...")
                .unwrap()
            {
                writers += 1;
            }
        }

        assert_eq!(writers, 1);
        assert_eq!(String::from_utf8(out).unwrap(), "Generating...\n");
    }

    #[test]
    fn test_node_master_differs_from_master() {
        let coordinator = DistCoordinator::new(&rank_context(2, 0, 4));
        assert!(!coordinator.is_master());
        assert!(coordinator.is_node_master());
        assert_eq!(coordinator.world_size(), 4);
    }

    #[test]
    fn test_single_process_is_master() {
        let coordinator = DistCoordinator::new(&DistContext::single_process());
        assert!(coordinator.is_master());
        assert!(coordinator.is_node_master());
    }
}
