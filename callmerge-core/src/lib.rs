//! # callmerge
//!
//! Reconciliation of competing gene-call sets for a genome, and the
//! checkpointed staging that carries many genomes through gene calling,
//! annotation, comparison and genomics.
//!
//! ## Overview
//!
//! Several gene callers (PHANOTATE, GeneMarkS, Prodigal, Glimmer, plus
//! user-supplied custom calls) predict genes for the same genome and rarely
//! agree. The [`reconcile::Reconciler`] groups calls that describe the same
//! gene within a boundary tolerance and emits one call set under a
//! configured policy. The [`pipeline`] module runs the stages around it and
//! records each genome's progress so an interrupted run can resume.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::collections::HashMap;
//!
//! use bio::bio_types::strand::Strand;
//! use callmerge_core::{CallPolicy, MatchTolerance, Reconciler};
//! use callmerge_core::types::{Caller, GeneCallRecord, GeneCallSet, GenomeDescriptor};
//!
//! let genome = GenomeDescriptor::new("phiX", "phage", "phiX.fasta", "out/phiX");
//! let reconciler = Reconciler::new(vec![Caller::Prodigal, Caller::Glimmer], MatchTolerance::Bases(5))?;
//!
//! let mut sets = HashMap::new();
//! sets.insert(
//!     Caller::Prodigal,
//!     GeneCallSet::with_records(
//!         Caller::Prodigal,
//!         vec![GeneCallRecord::new("phiX", 100, 500, Strand::Forward, Caller::Prodigal)],
//!     ),
//! );
//! sets.insert(
//!     Caller::Glimmer,
//!     GeneCallSet::with_records(
//!         Caller::Glimmer,
//!         vec![GeneCallRecord::new("phiX", 103, 500, Strand::Forward, Caller::Glimmer)],
//!     ),
//! );
//!
//! let result = reconciler.reconcile(&genome, &sets, CallPolicy::CommonCore)?;
//! assert_eq!(result.calls.len(), 1);
//! assert_eq!(result.calls.calls[0].record.start, 100);
//! # Ok::<(), callmerge_core::types::CallmergeError>(())
//! ```
//!
//! ## Module Organization
//!
//! - [`adapters`]: Raw caller output readers
//! - [`reconcile`]: Equivalence grouping and the reconciliation policies
//! - [`output`]: Tabular and GFF3 writers for reconciled sets
//! - [`pipeline`]: Stages, checkpoints, worker pools and the run driver
//! - [`config`]: Run configuration
//! - [`databases`]: Database pre-flight verification
//! - [`types`]: Core data types and the error type
//!
//! ## Error Handling
//!
//! Fallible operations return [`Result<T, CallmergeError>`](types::CallmergeError).
//! Configuration errors abort a run before any stage; every other failure
//! stops only the genome it belongs to.

pub mod adapters;
pub mod config;
pub mod constants;
pub mod databases;
pub mod output;
pub mod pipeline;
pub mod reconcile;
pub mod types;

pub use config::{CallPolicy, MatchTolerance, OutputFormat, RunConfig};
pub use reconcile::{Reconciler, Reconciliation};
pub use types::CallmergeError;
