// =============================================================================
// OUTPUT IDENTIFICATION
// =============================================================================

/// Version string written into output headers
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Source column used for GFF3 exports
pub const GFF_SOURCE: &str = "callmerge";

// =============================================================================
// ARTIFACT NAMING
// =============================================================================

/// Suffix of the persisted reconciled call set (`<genome>.reconciled.tsv`)
pub const RECONCILED_SUFFIX: &str = "reconciled.tsv";

/// Suffix of the GFF3 export written next to the reconciled call set
pub const RECONCILED_GFF_SUFFIX: &str = "reconciled.gff";

/// Suffix of the annotation artifact produced by the annotation stage
pub const ANNOTATION_SUFFIX: &str = "annotation.tsv";

/// Directory (under a genome's output directory) holding comparison results
pub const COMPARISON_DIR: &str = "CGP_RESULTS";

/// Directory (under a genome's output directory) holding genomics results
pub const GENOMICS_DIR: &str = "GENOMICS_RESULTS";

/// Suffix of custom gene-call files (`<genome>.custom.gff`)
pub const CUSTOM_CALLS_SUFFIX: &str = "custom.gff";

/// Suffix of per-genome checkpoint files
pub const CHECKPOINT_SUFFIX: &str = "checkpoint.json";

// =============================================================================
// RUN DEFAULTS
// =============================================================================

/// Default directory holding `<genome>.custom.gff` files
pub const DEFAULT_CUSTOM_CALLS_DIR: &str = "PipelineInput";

/// Default directory holding per-genome checkpoint files
pub const DEFAULT_CHECKPOINT_DIR: &str = "PipelineOutput/checkpoints";

/// Default identity cutoff (percent) for comparative gene/protein matching
pub const DEFAULT_IDENTITY_CUTOFF: u32 = 60;

/// Lowest identity cutoff (percent) the comparative matcher accepts
pub const MIN_IDENTITY_CUTOFF: u32 = 30;
