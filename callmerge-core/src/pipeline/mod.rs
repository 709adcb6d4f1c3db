//! Checkpoint-aware pipeline staging.
//!
//! Every genome moves through the same ordered stages:
//!
//! ```text
//! PENDING -> GENECALL_DONE -> ANNOTATE_DONE -> COMPARE_DONE -> GENOMICS_DONE
//! ```
//!
//! The [`StageController`] decides where each genome resumes, verifies the
//! artifacts a stage consumes before entering it and records completion in
//! the [`CheckpointStore`]. [`Pipeline`] drives all configured genomes
//! through the controller on two worker pools: one for per-genome stages and
//! one for the cross-genome comparison.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::CallmergeError;

pub mod artifacts;
pub mod checkpoint;
pub mod commands;
pub mod controller;
pub mod genecall;
pub mod pool;
pub mod run;
pub mod work;

pub use checkpoint::{CheckpointRecord, CheckpointStore, GenomeLease};
pub use commands::CommandHooks;
pub use controller::{CancellationToken, GenomeProgress, StageController};
pub use pool::WorkerPool;
pub use run::{GenomeOutcome, Pipeline, RunSummary};
pub use work::{ComparativeMatcher, Peer, StageWork};

/// Furthest completed stage of a genome.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    #[default]
    Pending,
    GenecallDone,
    AnnotateDone,
    CompareDone,
    GenomicsDone,
}

impl Stage {
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::GenecallDone,
        Self::AnnotateDone,
        Self::CompareDone,
        Self::GenomicsDone,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::GenecallDone => "GENECALL_DONE",
            Self::AnnotateDone => "ANNOTATE_DONE",
            Self::CompareDone => "COMPARE_DONE",
            Self::GenomicsDone => "GENOMICS_DONE",
        }
    }

    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::GenecallDone),
            Self::GenecallDone => Some(Self::AnnotateDone),
            Self::AnnotateDone => Some(Self::CompareDone),
            Self::CompareDone => Some(Self::GenomicsDone),
            Self::GenomicsDone => None,
        }
    }

    /// Name of the work that completes this stage.
    #[must_use]
    pub const fn step_name(self) -> &'static str {
        match self {
            Self::Pending => "setup",
            Self::GenecallDone => "gene calling",
            Self::AnnotateDone => "annotation",
            Self::CompareDone => "comparison",
            Self::GenomicsDone => "genomics",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = CallmergeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CallmergeError::Checkpoint(format!("unknown stage '{s}'")))
    }
}
