//! Run configuration.
//!
//! A run is described by a JSON document whose keys follow the pipeline's
//! configuration surface (`prodigal_calls`, `primary_calls`,
//! `checkpoint_phate`, `phate_threads`, ...). [`RunConfig::from_json_str`]
//! parses and validates it into an explicit value that is handed to the
//! reconciler and the stage controller; nothing is read from globals.
//!
//! Caller priority is the order the `<caller>_calls` keys appear in the
//! document (first activated wins), unless `caller_priority` lists it
//! explicitly.
//!
//! # Examples
//!
//! ```rust
//! use callmerge_core::config::{CallPolicy, RunConfig};
//! use callmerge_core::types::Caller;
//!
//! let config = RunConfig::from_json_str(r#"{
//!     "genomes": [{"name": "phiX", "fasta": "phiX.fasta", "output_dir": "out/phiX"}],
//!     "glimmer_calls": true,
//!     "prodigal_calls": true,
//!     "phanotate_calls": true,
//!     "primary_calls": "consensus",
//!     "boundary_tolerance": 5
//! }"#)?;
//!
//! assert_eq!(config.callers, vec![Caller::Glimmer, Caller::Prodigal, Caller::Phanotate]);
//! assert_eq!(config.policy, CallPolicy::Consensus);
//! # Ok::<(), callmerge_core::types::CallmergeError>(())
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::constants::{
    DEFAULT_CHECKPOINT_DIR, DEFAULT_CUSTOM_CALLS_DIR, DEFAULT_IDENTITY_CUTOFF, MIN_IDENTITY_CUTOFF,
};
use crate::databases::DatabaseSpec;
use crate::pipeline::Stage;
use crate::types::{CallmergeError, Caller, GeneCallRecord, GenomeDescriptor};

/// Output format for reconciled call sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Tab-separated, one record per line, re-parseable. This is the
    /// persisted pipeline artifact.
    #[default]
    Tabular,

    /// General Feature Format version 3 export.
    Gff,
}

impl FromStr for OutputFormat {
    type Err = CallmergeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tsv" | "tabular" => Ok(Self::Tabular),
            "gff" | "gff3" => Ok(Self::Gff),
            other => Err(CallmergeError::Configuration(format!(
                "unknown output format '{other}' (expected tsv or gff)"
            ))),
        }
    }
}

/// Reconciliation policy, one handler per variant.
///
/// Unknown policy strings fail at construction time; there is no fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPolicy {
    /// Groups supported by a strict majority of active callers
    Consensus,
    /// Every equivalence group, once
    Superset,
    /// Groups supported by every active caller
    CommonCore,
    /// The custom caller's set, verbatim
    Custom,
    /// One caller's raw set, bypassing the merge
    Primary(Caller),
}

impl CallPolicy {
    /// Whether this policy runs the equivalence-group merge.
    #[must_use]
    pub const fn is_merge(self) -> bool {
        matches!(self, Self::Consensus | Self::Superset | Self::CommonCore)
    }
}

impl fmt::Display for CallPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Consensus => f.write_str("consensus"),
            Self::Superset => f.write_str("superset"),
            Self::CommonCore => f.write_str("commoncore"),
            Self::Custom => f.write_str("custom"),
            Self::Primary(caller) => write!(f, "primary:{caller}"),
        }
    }
}

impl FromStr for CallPolicy {
    type Err = CallmergeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "consensus" => return Ok(Self::Consensus),
            "superset" => return Ok(Self::Superset),
            "commoncore" | "common-core" | "common_core" => return Ok(Self::CommonCore),
            "custom" => return Ok(Self::Custom),
            _ => {}
        }
        let caller_name = normalized.strip_prefix("primary:").unwrap_or(&normalized);
        caller_name.parse::<Caller>().map(Self::Primary).map_err(|_| {
            CallmergeError::Configuration(format!(
                "unknown reconciliation policy '{s}' (expected consensus, superset, commoncore, \
                 custom or a caller name)"
            ))
        })
    }
}

/// How far apart two calls' boundaries may be and still count as one gene.
///
/// Strand and contig must always match exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchTolerance {
    /// Fixed allowance in bases
    Bases(u64),
    /// Allowance as a percentage of the longer of the two calls
    Percent(f64),
}

impl Default for MatchTolerance {
    fn default() -> Self {
        Self::Bases(0)
    }
}

impl MatchTolerance {
    /// Build from the `boundary_tolerance` / `tolerance_mode` configuration pair.
    pub fn from_parts(value: f64, mode: &str) -> Result<Self, CallmergeError> {
        if !value.is_finite() || value < 0.0 {
            return Err(CallmergeError::Configuration(format!(
                "boundary_tolerance must be a non-negative number, got {value}"
            )));
        }
        match mode.trim().to_ascii_lowercase().as_str() {
            "bases" | "bp" => {
                if value.fract() != 0.0 {
                    return Err(CallmergeError::Configuration(format!(
                        "boundary_tolerance in bases must be a whole number, got {value}"
                    )));
                }
                Ok(Self::Bases(value as u64))
            }
            "percent" | "%" => {
                if value > 100.0 {
                    return Err(CallmergeError::Configuration(format!(
                        "boundary_tolerance in percent must be at most 100, got {value}"
                    )));
                }
                Ok(Self::Percent(value))
            }
            other => Err(CallmergeError::Configuration(format!(
                "unknown tolerance_mode '{other}' (expected bases or percent)"
            ))),
        }
    }

    /// Allowed boundary difference between two calls of the given lengths.
    #[must_use]
    pub fn allowance(&self, first_len: u64, second_len: u64) -> u64 {
        match *self {
            Self::Bases(bases) => bases,
            Self::Percent(percent) => {
                (percent / 100.0 * first_len.max(second_len) as f64).floor() as u64
            }
        }
    }

    /// Upper bound of [`allowance`](Self::allowance) over a set whose longest call is `longest`.
    #[must_use]
    pub fn window(&self, longest: u64) -> u64 {
        self.allowance(longest, longest)
    }

    /// The matching rule: same contig, same strand, both boundaries within the allowance.
    #[must_use]
    pub fn matches(&self, first: &GeneCallRecord, second: &GeneCallRecord) -> bool {
        if first.contig != second.contig || first.strand != second.strand {
            return false;
        }
        let allowance = self.allowance(first.len(), second.len());
        first.start.abs_diff(second.start) <= allowance && first.end.abs_diff(second.end) <= allowance
    }
}

/// Worker-pool size setting (`*_threads` keys).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "RawThreadSetting")]
pub enum ThreadSetting {
    /// `0`: run in the caller's own thread
    Inline,
    /// A fixed number of workers
    Fixed(NonZeroUsize),
    /// `ALL`: the host's available parallelism
    #[default]
    All,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawThreadSetting {
    Count(u64),
    Text(String),
}

impl TryFrom<RawThreadSetting> for ThreadSetting {
    type Error = CallmergeError;

    fn try_from(raw: RawThreadSetting) -> Result<Self, Self::Error> {
        match raw {
            RawThreadSetting::Count(count) => Ok(usize::try_from(count)
                .ok()
                .and_then(NonZeroUsize::new)
                .map_or(Self::Inline, Self::Fixed)),
            RawThreadSetting::Text(text) => text.parse(),
        }
    }
}

impl FromStr for ThreadSetting {
    type Err = CallmergeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        let count: usize = trimmed.parse().map_err(|_| {
            CallmergeError::Configuration(format!(
                "invalid thread setting '{s}' (expected an integer, 0 or ALL)"
            ))
        })?;
        Ok(NonZeroUsize::new(count).map_or(Self::Inline, Self::Fixed))
    }
}

impl ThreadSetting {
    /// Number of workers; `0` means inline execution.
    #[must_use]
    pub fn resolve(self) -> usize {
        match self {
            Self::Inline => 0,
            Self::Fixed(count) => count.get(),
            Self::All => std::thread::available_parallelism().map_or(1, NonZeroUsize::get),
        }
    }
}

/// Requested minimum entry point, from the mutually exclusive
/// `checkpoint_phate` / `checkpoint_cgp` / `checkpoint_genomics` flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkipRequest {
    #[default]
    None,
    /// `checkpoint_phate`: gene calling is already done
    GeneCalling,
    /// `checkpoint_cgp`: gene calling and annotation are already done
    ThroughAnnotation,
    /// `checkpoint_genomics`: everything through comparison is already done
    ThroughComparison,
}

impl SkipRequest {
    pub fn from_flags(phate: bool, cgp: bool, genomics: bool) -> Result<Self, CallmergeError> {
        match (phate, cgp, genomics) {
            (false, false, false) => Ok(Self::None),
            (true, false, false) => Ok(Self::GeneCalling),
            (false, true, false) => Ok(Self::ThroughAnnotation),
            (false, false, true) => Ok(Self::ThroughComparison),
            _ => Err(CallmergeError::Configuration(
                "checkpoint_phate, checkpoint_cgp and checkpoint_genomics are mutually exclusive"
                    .to_string(),
            )),
        }
    }

    /// Stage the run may assume complete.
    #[must_use]
    pub const fn floor(self) -> Stage {
        match self {
            Self::None => Stage::Pending,
            Self::GeneCalling => Stage::GenecallDone,
            Self::ThroughAnnotation => Stage::AnnotateDone,
            Self::ThroughComparison => Stage::CompareDone,
        }
    }
}

/// Identity thresholds consumed by the comparative matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityCutoffs {
    pub gene: u32,
    pub protein: u32,
}

impl Default for IdentityCutoffs {
    fn default() -> Self {
        Self {
            gene: DEFAULT_IDENTITY_CUTOFF,
            protein: DEFAULT_IDENTITY_CUTOFF,
        }
    }
}

/// External command templates for the stages this crate does not implement.
///
/// Templates run through `sh -c` after placeholder substitution, see
/// [`crate::pipeline::commands`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StageCommands {
    /// Runs the gene callers before their outputs are collected
    #[serde(default)]
    pub genecall: Option<String>,
    #[serde(default)]
    pub annotate: Option<String>,
    #[serde(default)]
    pub compare: Option<String>,
    #[serde(default)]
    pub genomics: Option<String>,
}

impl StageCommands {
    /// Furthest stage a run can reach with these commands.
    #[must_use]
    pub const fn target(&self) -> Stage {
        if self.genomics.is_some() {
            Stage::GenomicsDone
        } else if self.compare.is_some() {
            Stage::CompareDone
        } else if self.annotate.is_some() {
            Stage::AnnotateDone
        } else {
            Stage::GenecallDone
        }
    }
}

/// Validated configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub genomes: Vec<GenomeDescriptor>,
    /// Active callers in priority order
    pub callers: Vec<Caller>,
    pub policy: CallPolicy,
    pub tolerance: MatchTolerance,
    pub skip: SkipRequest,
    /// Per-genome pool (`phate_threads`)
    pub pipeline_threads: ThreadSetting,
    /// Cross-genome comparison pool (`cgp_threads`)
    pub comparison_threads: ThreadSetting,
    pub check_databases: bool,
    pub databases: Vec<DatabaseSpec>,
    pub identity_cutoffs: IdentityCutoffs,
    /// Directory holding `<genome>.custom.gff`
    pub custom_calls_dir: PathBuf,
    pub checkpoint_dir: PathBuf,
    pub commands: StageCommands,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            genomes: Vec::new(),
            callers: Vec::new(),
            policy: CallPolicy::Consensus,
            tolerance: MatchTolerance::default(),
            skip: SkipRequest::None,
            pipeline_threads: ThreadSetting::All,
            comparison_threads: ThreadSetting::All,
            check_databases: false,
            databases: Vec::new(),
            identity_cutoffs: IdentityCutoffs::default(),
            custom_calls_dir: PathBuf::from(DEFAULT_CUSTOM_CALLS_DIR),
            checkpoint_dir: PathBuf::from(DEFAULT_CHECKPOINT_DIR),
            commands: StageCommands::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawRunConfig {
    #[serde(default)]
    genomes: Vec<GenomeDescriptor>,
    #[serde(default)]
    caller_priority: Option<Vec<Caller>>,
    #[serde(default = "default_policy")]
    primary_calls: String,
    #[serde(default, deserialize_with = "de_flag")]
    checkpoint_phate: bool,
    #[serde(default, deserialize_with = "de_flag")]
    checkpoint_cgp: bool,
    #[serde(default, deserialize_with = "de_flag")]
    checkpoint_genomics: bool,
    #[serde(default)]
    phate_threads: ThreadSetting,
    #[serde(default)]
    cgp_threads: ThreadSetting,
    #[serde(default, deserialize_with = "de_flag")]
    check_databases: bool,
    #[serde(default)]
    databases: Vec<DatabaseSpec>,
    #[serde(default = "default_cutoff")]
    cgp_identity_cutoff_gene: u32,
    #[serde(default = "default_cutoff")]
    cgp_identity_cutoff_protein: u32,
    #[serde(default)]
    boundary_tolerance: f64,
    #[serde(default = "default_tolerance_mode")]
    tolerance_mode: String,
    #[serde(default = "default_custom_calls_dir")]
    custom_calls_dir: PathBuf,
    #[serde(default = "default_checkpoint_dir")]
    checkpoint_dir: PathBuf,
    #[serde(default)]
    commands: StageCommands,
}

fn default_policy() -> String {
    "consensus".to_string()
}

const fn default_cutoff() -> u32 {
    DEFAULT_IDENTITY_CUTOFF
}

fn default_tolerance_mode() -> String {
    "bases".to_string()
}

fn default_custom_calls_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CUSTOM_CALLS_DIR)
}

fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CHECKPOINT_DIR)
}

fn parse_flag(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" | "" => Some(false),
        _ => None,
    }
}

fn flag_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::String(text) => parse_flag(text),
        _ => None,
    }
}

// Pipeline configs historically spell booleans as 'True'/'False' strings.
fn de_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Value::deserialize(deserializer)?;
    flag_value(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("expected true or false, got {value}")))
}

impl RunConfig {
    /// Read and validate a JSON run file.
    pub fn from_path(path: &Path) -> Result<Self, CallmergeError> {
        let text = fs::read_to_string(path).map_err(|e| {
            CallmergeError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    /// Parse and validate a JSON run document.
    pub fn from_json_str(text: &str) -> Result<Self, CallmergeError> {
        let document: Value = serde_json::from_str(text)
            .map_err(|e| CallmergeError::Configuration(format!("invalid run file: {e}")))?;
        let Value::Object(entries) = &document else {
            return Err(CallmergeError::Configuration(
                "run file must be a JSON object".to_string(),
            ));
        };

        // Key order is activation order, which is caller priority.
        let mut activated = Vec::new();
        for (key, value) in entries {
            let Some(caller) = Caller::ALL.into_iter().find(|c| c.config_key() == *key) else {
                continue;
            };
            let active = flag_value(value).ok_or_else(|| {
                CallmergeError::Configuration(format!("{key} must be true or false, got {value}"))
            })?;
            if active {
                activated.push(caller);
            }
        }

        let raw: RawRunConfig = serde_json::from_value(document)
            .map_err(|e| CallmergeError::Configuration(format!("invalid run file: {e}")))?;

        let callers = match raw.caller_priority {
            Some(priority) => ordered_by_priority(&activated, priority)?,
            None => activated,
        };

        let config = Self {
            genomes: raw.genomes,
            callers,
            policy: raw.primary_calls.parse()?,
            tolerance: MatchTolerance::from_parts(raw.boundary_tolerance, &raw.tolerance_mode)?,
            skip: SkipRequest::from_flags(
                raw.checkpoint_phate,
                raw.checkpoint_cgp,
                raw.checkpoint_genomics,
            )?,
            pipeline_threads: raw.phate_threads,
            comparison_threads: raw.cgp_threads,
            check_databases: raw.check_databases,
            databases: raw.databases,
            identity_cutoffs: IdentityCutoffs {
                gene: raw.cgp_identity_cutoff_gene,
                protein: raw.cgp_identity_cutoff_protein,
            },
            custom_calls_dir: raw.custom_calls_dir,
            checkpoint_dir: raw.checkpoint_dir,
            commands: raw.commands,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), CallmergeError> {
        let mut seen = HashSet::new();
        let mut output_dirs: HashMap<&Path, &str> = HashMap::new();
        for genome in &self.genomes {
            if genome.name.is_empty()
                || genome.name.chars().any(|c| c.is_whitespace() || c == '/' || c == '\\')
            {
                return Err(CallmergeError::Configuration(format!(
                    "invalid genome name '{}' (must be non-empty, without whitespace or path separators)",
                    genome.name
                )));
            }
            if !seen.insert(genome.name.as_str()) {
                return Err(CallmergeError::Configuration(format!(
                    "genome '{}' is configured more than once",
                    genome.name
                )));
            }
            if let Some(owner) = output_dirs.insert(genome.output_dir.as_path(), genome.name.as_str()) {
                return Err(CallmergeError::Configuration(format!(
                    "genomes '{owner}' and '{}' share output directory {}",
                    genome.name,
                    genome.output_dir.display()
                )));
            }
        }

        if self.policy.is_merge() && self.callers.is_empty() {
            return Err(CallmergeError::Configuration(format!(
                "policy {} needs at least one active caller",
                self.policy
            )));
        }
        if let CallPolicy::Primary(caller) = self.policy
            && !self.callers.contains(&caller)
        {
            return Err(CallmergeError::Configuration(format!(
                "primary_calls selects {caller}, but {} is not enabled",
                caller.config_key()
            )));
        }

        for (key, cutoff) in [
            ("cgp_identity_cutoff_gene", self.identity_cutoffs.gene),
            ("cgp_identity_cutoff_protein", self.identity_cutoffs.protein),
        ] {
            if !(MIN_IDENTITY_CUTOFF..=100).contains(&cutoff) {
                return Err(CallmergeError::Configuration(format!(
                    "{key} must be between {MIN_IDENTITY_CUTOFF} and 100, got {cutoff}"
                )));
            }
        }

        if self.check_databases {
            if let Some(database) = self
                .databases
                .iter()
                .find(|db| db.enabled && db.path.as_os_str().is_empty())
            {
                return Err(CallmergeError::Configuration(format!(
                    "database '{}' is enabled but has no path",
                    database.name
                )));
            }
        }
        Ok(())
    }

    /// Path of the custom gene-call file for a genome.
    #[must_use]
    pub fn custom_calls_path(&self, genome: &GenomeDescriptor) -> PathBuf {
        self.custom_calls_dir.join(format!(
            "{}.{}",
            genome.name,
            crate::constants::CUSTOM_CALLS_SUFFIX
        ))
    }
}

fn ordered_by_priority(
    activated: &[Caller],
    priority: Vec<Caller>,
) -> Result<Vec<Caller>, CallmergeError> {
    let listed: HashSet<Caller> = priority.iter().copied().collect();
    if listed.len() != priority.len() {
        return Err(CallmergeError::Configuration(
            "caller_priority lists a caller more than once".to_string(),
        ));
    }
    if let Some(inactive) = priority.iter().find(|caller| !activated.contains(caller)) {
        return Err(CallmergeError::Configuration(format!(
            "caller_priority lists {inactive}, but {} is not enabled",
            inactive.config_key()
        )));
    }
    if let Some(missing) = activated.iter().find(|caller| !listed.contains(caller)) {
        return Err(CallmergeError::Configuration(format!(
            "caller_priority does not list the active caller {missing}"
        )));
    }
    Ok(priority)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bio::bio_types::strand::Strand;

    fn call(start: u64, end: u64) -> GeneCallRecord {
        GeneCallRecord::new("c", start, end, Strand::Forward, Caller::Prodigal)
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("consensus".parse::<CallPolicy>().unwrap(), CallPolicy::Consensus);
        assert_eq!("SUPERSET".parse::<CallPolicy>().unwrap(), CallPolicy::Superset);
        assert_eq!("commoncore".parse::<CallPolicy>().unwrap(), CallPolicy::CommonCore);
        assert_eq!("custom".parse::<CallPolicy>().unwrap(), CallPolicy::Custom);
        assert_eq!(
            "prodigal".parse::<CallPolicy>().unwrap(),
            CallPolicy::Primary(Caller::Prodigal)
        );
        assert_eq!(
            "primary:glimmer".parse::<CallPolicy>().unwrap(),
            CallPolicy::Primary(Caller::Glimmer)
        );
        assert!(matches!(
            "majority".parse::<CallPolicy>(),
            Err(CallmergeError::Configuration(_))
        ));
    }

    #[test]
    fn test_policy_display_parses_back() {
        for policy in [
            CallPolicy::Consensus,
            CallPolicy::Superset,
            CallPolicy::CommonCore,
            CallPolicy::Custom,
            CallPolicy::Primary(Caller::Phanotate),
        ] {
            assert_eq!(policy.to_string().parse::<CallPolicy>().unwrap(), policy);
        }
    }

    #[test]
    fn test_tolerance_in_bases() {
        let tolerance = MatchTolerance::Bases(5);
        assert!(tolerance.matches(&call(100, 500), &call(105, 495)));
        assert!(!tolerance.matches(&call(100, 500), &call(106, 500)));

        let exact = MatchTolerance::default();
        assert!(exact.matches(&call(100, 500), &call(100, 500)));
        assert!(!exact.matches(&call(100, 500), &call(101, 500)));
    }

    #[test]
    fn test_tolerance_requires_same_strand_and_contig() {
        let tolerance = MatchTolerance::Bases(10);
        let mut reverse = call(100, 500);
        reverse.strand = Strand::Reverse;
        assert!(!tolerance.matches(&call(100, 500), &reverse));

        let mut elsewhere = call(100, 500);
        elsewhere.contig = "other".to_string();
        assert!(!tolerance.matches(&call(100, 500), &elsewhere));
    }

    #[test]
    fn test_tolerance_in_percent_uses_longer_call() {
        let tolerance = MatchTolerance::Percent(1.0);
        // longer call is 1000 bp -> allowance 10
        assert_eq!(tolerance.allowance(1000, 990), 10);
        assert!(tolerance.matches(&call(1, 1000), &call(11, 1000)));
        assert!(!tolerance.matches(&call(1, 1000), &call(12, 1000)));
    }

    #[test]
    fn test_tolerance_from_parts_validation() {
        assert_eq!(
            MatchTolerance::from_parts(3.0, "bases").unwrap(),
            MatchTolerance::Bases(3)
        );
        assert!(MatchTolerance::from_parts(2.5, "bases").is_err());
        assert!(MatchTolerance::from_parts(-1.0, "bases").is_err());
        assert!(MatchTolerance::from_parts(150.0, "percent").is_err());
        assert!(MatchTolerance::from_parts(1.0, "codons").is_err());
    }

    #[test]
    fn test_thread_setting_parsing() {
        assert_eq!("ALL".parse::<ThreadSetting>().unwrap(), ThreadSetting::All);
        assert_eq!("0".parse::<ThreadSetting>().unwrap(), ThreadSetting::Inline);
        assert_eq!(
            "4".parse::<ThreadSetting>().unwrap(),
            ThreadSetting::Fixed(NonZeroUsize::new(4).unwrap())
        );
        assert!("many".parse::<ThreadSetting>().is_err());
        assert_eq!(ThreadSetting::Inline.resolve(), 0);
        assert!(ThreadSetting::All.resolve() >= 1);
    }

    #[test]
    fn test_skip_request_flags_are_exclusive() {
        assert_eq!(
            SkipRequest::from_flags(false, true, false).unwrap(),
            SkipRequest::ThroughAnnotation
        );
        assert_eq!(SkipRequest::GeneCalling.floor(), Stage::GenecallDone);
        assert!(SkipRequest::from_flags(true, true, false).is_err());
    }

    #[test]
    fn test_run_config_activation_order_is_priority() {
        let config = RunConfig::from_json_str(
            r#"{
                "prodigal_calls": "True",
                "phanotate_calls": false,
                "glimmer_calls": true,
                "genemarks_calls": "True",
                "primary_calls": "superset",
                "phate_threads": "ALL",
                "cgp_threads": 0
            }"#,
        )
        .unwrap();
        assert_eq!(
            config.callers,
            vec![Caller::Prodigal, Caller::Glimmer, Caller::Genemarks]
        );
        assert_eq!(config.policy, CallPolicy::Superset);
        assert_eq!(config.pipeline_threads, ThreadSetting::All);
        assert_eq!(config.comparison_threads, ThreadSetting::Inline);
        assert_eq!(config.tolerance, MatchTolerance::Bases(0));
    }

    #[test]
    fn test_run_config_explicit_priority() {
        let config = RunConfig::from_json_str(
            r#"{
                "prodigal_calls": true,
                "glimmer_calls": true,
                "caller_priority": ["glimmer", "prodigal"]
            }"#,
        )
        .unwrap();
        assert_eq!(config.callers, vec![Caller::Glimmer, Caller::Prodigal]);

        let err = RunConfig::from_json_str(
            r#"{"prodigal_calls": true, "caller_priority": ["glimmer", "prodigal"]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("glimmer_calls"));
    }

    #[test]
    fn test_run_config_rejects_bad_policy() {
        let err = RunConfig::from_json_str(r#"{"prodigal_calls": true, "primary_calls": "vote"}"#)
            .unwrap_err();
        assert!(matches!(err, CallmergeError::Configuration(_)));
    }

    #[test]
    fn test_run_config_rejects_merge_without_callers() {
        let err = RunConfig::from_json_str(r#"{"primary_calls": "consensus"}"#).unwrap_err();
        assert!(err.to_string().contains("at least one active caller"));
    }

    #[test]
    fn test_run_config_rejects_inactive_primary() {
        let err = RunConfig::from_json_str(
            r#"{"prodigal_calls": true, "primary_calls": "glimmer"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("glimmer_calls"));
    }

    #[test]
    fn test_run_config_rejects_conflicting_checkpoints() {
        let err = RunConfig::from_json_str(
            r#"{"prodigal_calls": true, "checkpoint_phate": true, "checkpoint_genomics": true}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn test_run_config_rejects_low_identity_cutoff() {
        let err = RunConfig::from_json_str(
            r#"{"prodigal_calls": true, "cgp_identity_cutoff_gene": 20}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("cgp_identity_cutoff_gene"));
    }

    #[test]
    fn test_run_config_rejects_duplicate_genomes() {
        let err = RunConfig::from_json_str(
            r#"{
                "prodigal_calls": true,
                "genomes": [
                    {"name": "phiX", "fasta": "a.fasta", "output_dir": "a"},
                    {"name": "phiX", "fasta": "b.fasta", "output_dir": "b"}
                ]
            }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_run_config_rejects_shared_output_dir() {
        let err = RunConfig::from_json_str(
            r#"{
                "prodigal_calls": true,
                "genomes": [
                    {"name": "A", "fasta": "a.fasta", "output_dir": "shared"},
                    {"name": "B", "fasta": "b.fasta", "output_dir": "shared/"}
                ]
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, CallmergeError::Configuration(_)));
        assert!(err.to_string().contains("share output directory shared"));
    }

    #[test]
    fn test_run_config_database_needs_path_when_checked() {
        let err = RunConfig::from_json_str(
            r#"{
                "prodigal_calls": true,
                "check_databases": true,
                "databases": [{"name": "pvogs", "path": ""}]
            }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("pvogs"));
    }

    #[test]
    fn test_stage_commands_target() {
        assert_eq!(StageCommands::default().target(), Stage::GenecallDone);
        let commands = StageCommands {
            compare: Some("true".to_string()),
            ..Default::default()
        };
        assert_eq!(commands.target(), Stage::CompareDone);
    }

    #[test]
    fn test_custom_calls_path() {
        let config = RunConfig {
            custom_calls_dir: PathBuf::from("input"),
            ..Default::default()
        };
        let genome = GenomeDescriptor::new("phiX", "", "phiX.fasta", "out");
        assert_eq!(
            config.custom_calls_path(&genome),
            PathBuf::from("input/phiX.custom.gff")
        );
    }
}
