use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use bio::bio_types::strand::Strand;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::CallPolicy;
use crate::pipeline::Stage;

/// External gene callers whose output can be reconciled.
///
/// The declaration order carries no meaning; caller priority comes from the
/// run configuration (the order callers were activated in).
///
/// # Examples
///
/// ```rust
/// use callmerge_core::types::Caller;
///
/// let caller: Caller = "prodigal".parse()?;
/// assert_eq!(caller, Caller::Prodigal);
/// assert_eq!(caller.to_string(), "prodigal");
/// # Ok::<(), callmerge_core::types::CallmergeError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Caller {
    /// PHANOTATE (phage-specific caller)
    Phanotate,
    /// GeneMarkS
    Genemarks,
    /// Prodigal
    Prodigal,
    /// Glimmer3
    Glimmer,
    /// User-supplied calls read from `<genome>.custom.gff`
    Custom,
}

impl Caller {
    /// Every supported caller, in configuration-key order.
    pub const ALL: [Self; 5] = [
        Self::Phanotate,
        Self::Genemarks,
        Self::Prodigal,
        Self::Glimmer,
        Self::Custom,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Phanotate => "phanotate",
            Self::Genemarks => "genemarks",
            Self::Prodigal => "prodigal",
            Self::Glimmer => "glimmer",
            Self::Custom => "custom",
        }
    }

    /// Name of the activation key in the run configuration (`prodigal_calls`, ...).
    #[must_use]
    pub fn config_key(self) -> String {
        format!("{}_calls", self.as_str())
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Caller {
    type Err = CallmergeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|caller| caller.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CallmergeError::Configuration(format!("unknown gene caller '{s}'")))
    }
}

/// Parse a strand symbol. Anything other than `+` or `-` maps to
/// [`Strand::Unknown`], which validation later rejects.
#[must_use]
pub fn strand_from_symbol(symbol: &str) -> Strand {
    match symbol.trim() {
        "+" => Strand::Forward,
        "-" => Strand::Reverse,
        _ => Strand::Unknown,
    }
}

#[must_use]
pub const fn strand_symbol(strand: Strand) -> char {
    match strand {
        Strand::Forward => '+',
        Strand::Reverse => '-',
        Strand::Unknown => '.',
    }
}

/// Sort rank for strands, `Strand` itself is not `Ord`.
#[must_use]
pub const fn strand_rank(strand: Strand) -> u8 {
    match strand {
        Strand::Forward => 0,
        Strand::Reverse => 1,
        Strand::Unknown => 2,
    }
}

/// Reading frame (1..=3) of a call, counted from the 5' end of the coding strand.
#[must_use]
pub const fn reading_frame(start: u64, end: u64, strand: Strand) -> u8 {
    let anchor = match strand {
        Strand::Reverse => end,
        _ => start,
    };
    (anchor.saturating_sub(1) % 3) as u8 + 1
}

/// Immutable identity of one genome in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenomeDescriptor {
    /// Short name, used for file names and checkpoint keys
    pub name: String,
    /// Species label carried into reports
    #[serde(default)]
    pub species: String,
    /// Path to the genome FASTA
    pub fasta: PathBuf,
    /// Directory receiving this genome's artifacts
    pub output_dir: PathBuf,
}

impl GenomeDescriptor {
    pub fn new(
        name: impl Into<String>,
        species: impl Into<String>,
        fasta: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            species: species.into(),
            fasta: fasta.into(),
            output_dir: output_dir.into(),
        }
    }

    #[must_use]
    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }
}

/// One predicted gene as normalized by a caller adapter.
///
/// Coordinates are 1-based and inclusive with `start <= end` regardless of
/// strand. Adapters do not validate, see [`GeneCallRecord::validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct GeneCallRecord {
    /// Sequence (contig) the call sits on
    pub contig: String,
    pub start: u64,
    pub end: u64,
    pub strand: Strand,
    /// Reading frame 1..=3
    pub frame: u8,
    /// Caller that produced the call
    pub caller: Caller,
    /// Caller-reported score, when the format carries one
    pub confidence: Option<f64>,
}

impl GeneCallRecord {
    /// Create a record, deriving the reading frame from its coordinates.
    pub fn new(contig: impl Into<String>, start: u64, end: u64, strand: Strand, caller: Caller) -> Self {
        Self {
            contig: contig.into(),
            start,
            end,
            strand,
            frame: reading_frame(start, end, strand),
            caller,
            confidence: None,
        }
    }

    #[must_use]
    pub const fn with_confidence(mut self, confidence: Option<f64>) -> Self {
        self.confidence = confidence;
        self
    }

    /// Length in bases (0 for inverted coordinates).
    #[must_use]
    pub const fn len(&self) -> u64 {
        if self.end < self.start {
            0
        } else {
            self.end - self.start + 1
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identity key used for the uniqueness invariant of reconciled sets.
    #[must_use]
    pub fn locus(&self) -> (&str, u64, u64, u8) {
        (&self.contig, self.start, self.end, strand_rank(self.strand))
    }

    /// Check the record against the schema: non-zero start, `start <= end`,
    /// strand `+` or `-`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let detail = || CallDetail {
            caller: self.caller,
            contig: self.contig.clone(),
            start: self.start,
            end: self.end,
        };
        if self.start == 0 {
            return Err(ValidationError::ZeroStart(detail()));
        }
        if self.end < self.start {
            return Err(ValidationError::EndBeforeStart(detail()));
        }
        if matches!(self.strand, Strand::Unknown) {
            return Err(ValidationError::UnknownStrand(detail()));
        }
        Ok(())
    }
}

/// All calls one caller produced for one genome.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneCallSet {
    pub caller: Caller,
    pub records: Vec<GeneCallRecord>,
    /// Lines the adapter could not turn into a record at all
    pub unparsed: usize,
}

impl GeneCallSet {
    #[must_use]
    pub const fn new(caller: Caller) -> Self {
        Self {
            caller,
            records: Vec::new(),
            unparsed: 0,
        }
    }

    #[must_use]
    pub const fn with_records(caller: Caller, records: Vec<GeneCallRecord>) -> Self {
        Self {
            caller,
            records,
            unparsed: 0,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A reconciled gene together with every caller that supports it.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledCall {
    /// Boundaries of the representative (highest-priority) caller
    pub record: GeneCallRecord,
    /// Supporting callers in priority order
    pub contributors: Vec<Caller>,
}

/// Result of reconciling one genome under one policy, ordered by position.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledCallSet {
    pub genome: String,
    pub policy: CallPolicy,
    pub calls: Vec<ReconciledCall>,
}

impl ReconciledCallSet {
    #[must_use]
    pub fn empty(genome: impl Into<String>, policy: CallPolicy) -> Self {
        Self {
            genome: genome.into(),
            policy,
            calls: Vec::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Feed this set back into the reconciler as a single caller's output.
    #[must_use]
    pub fn as_call_set(&self, caller: Caller) -> GeneCallSet {
        let records = self
            .calls
            .iter()
            .map(|call| GeneCallRecord {
                caller,
                ..call.record.clone()
            })
            .collect();
        GeneCallSet::with_records(caller, records)
    }
}

/// Coordinates of a call that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallDetail {
    pub caller: Caller,
    pub contig: String,
    pub start: u64,
    pub end: u64,
}

impl fmt::Display for CallDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} call {}:{}-{}", self.caller, self.contig, self.start, self.end)
    }
}

/// Reasons a single gene call is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} ends before it starts")]
    EndBeforeStart(CallDetail),
    #[error("{0} starts at position 0 (coordinates are 1-based)")]
    ZeroStart(CallDetail),
    #[error("{0} has no strand (expected '+' or '-')")]
    UnknownStrand(CallDetail),
}

/// Error types raised by reconciliation and pipeline staging
#[derive(Error, Debug)]
pub enum CallmergeError {
    /// Bad policy, bad run configuration, missing database
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Resume attempted without the artifacts a stage consumes
    #[error(
        "Missing prerequisite artifact for genome {genome} before {}: {} ({reason})",
        .stage.step_name(),
        .path.display()
    )]
    PrerequisiteMissing {
        genome: String,
        stage: Stage,
        path: PathBuf,
        reason: String,
    },
    /// A gene caller, search tool or stage command failed
    #[error("External tool {tool} failed: {message}")]
    ExternalTool { tool: String, message: String },
    /// A second stage transition was requested while one is running
    #[error("A stage transition is already in flight for genome {0}")]
    TransitionInFlight(String),
    /// The run was cancelled before this transition started
    #[error("Run cancelled before {} for genome {genome}", .stage.step_name())]
    Cancelled { genome: String, stage: Stage },
    /// The checkpoint store refused an update
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl CallmergeError {
    pub fn external(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalTool {
            tool: tool.into(),
            message: message.into(),
        }
    }
}
