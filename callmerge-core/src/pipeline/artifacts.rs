//! Artifact locations and the prerequisite checks guarding each stage.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use bio::io::fasta;
use tracing::debug;

use super::Stage;
use crate::adapters::raw_output_file;
use crate::constants::{
    ANNOTATION_SUFFIX, COMPARISON_DIR, GENOMICS_DIR, RECONCILED_GFF_SUFFIX, RECONCILED_SUFFIX,
};
use crate::output::load_reconciled;
use crate::types::{CallmergeError, Caller, GenomeDescriptor};

/// Where a genome's stage artifacts live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub fasta: PathBuf,
    /// Persisted reconciled call set (tabular)
    pub reconciled: PathBuf,
    /// GFF3 export written alongside the reconciled set
    pub reconciled_gff: PathBuf,
    pub annotation: PathBuf,
    pub comparison: PathBuf,
    pub genomics: PathBuf,
}

impl ArtifactPaths {
    #[must_use]
    pub fn for_genome(genome: &GenomeDescriptor) -> Self {
        let named = |suffix: &str| genome.output_path(&format!("{}.{suffix}", genome.name));
        Self {
            fasta: genome.fasta.clone(),
            reconciled: named(RECONCILED_SUFFIX),
            reconciled_gff: named(RECONCILED_GFF_SUFFIX),
            annotation: named(ANNOTATION_SUFFIX),
            comparison: genome.output_path(COMPARISON_DIR),
            genomics: genome.output_path(GENOMICS_DIR),
        }
    }

    /// Raw output a caller leaves under the genome's output directory.
    #[must_use]
    pub fn raw_output(genome: &GenomeDescriptor, caller: Caller) -> PathBuf {
        genome.output_path(raw_output_file(caller))
    }
}

fn missing(genome: &GenomeDescriptor, stage: Stage, path: &Path, reason: impl Into<String>) -> CallmergeError {
    CallmergeError::PrerequisiteMissing {
        genome: genome.name.clone(),
        stage,
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Why a FASTA file cannot feed gene calling, if it cannot.
fn fasta_problem(path: &Path) -> Option<String> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => return Some(e.to_string()),
    };
    match fasta::Reader::new(file).records().next() {
        None => Some("no sequence records".to_string()),
        Some(Err(e)) => Some(format!("not valid FASTA: {e}")),
        Some(Ok(record)) => match record.check() {
            Err(problem) => Some(format!("not valid FASTA: {problem}")),
            Ok(()) if record.seq().is_empty() => Some(format!("record {} is empty", record.id())),
            Ok(()) => None,
        },
    }
}

fn non_empty_file_problem(path: &Path) -> Option<String> {
    match fs::metadata(path) {
        Err(e) => Some(e.to_string()),
        Ok(meta) if !meta.is_file() => Some("not a file".to_string()),
        Ok(meta) if meta.len() == 0 => Some("empty file".to_string()),
        Ok(_) => None,
    }
}

fn non_empty_dir_problem(path: &Path) -> Option<String> {
    match fs::read_dir(path) {
        Err(e) => Some(e.to_string()),
        Ok(mut entries) => entries.next().is_none().then(|| "empty directory".to_string()),
    }
}

fn reconciled_problem(path: &Path) -> Option<String> {
    load_reconciled(path).err().map(|e| match e {
        CallmergeError::IoError(io) => io.to_string(),
        other => other.to_string(),
    })
}

/// First problem with the artifact `stage`'s work consumes.
fn consumed_problem(stage: Stage, paths: &ArtifactPaths) -> Option<(PathBuf, String)> {
    let check = |path: &PathBuf, problem: Option<String>| problem.map(|reason| (path.clone(), reason));
    match stage {
        Stage::Pending => None,
        Stage::GenecallDone => check(&paths.fasta, fasta_problem(&paths.fasta)),
        Stage::AnnotateDone => check(&paths.reconciled, reconciled_problem(&paths.reconciled)),
        Stage::CompareDone => check(&paths.reconciled, reconciled_problem(&paths.reconciled))
            .or_else(|| check(&paths.annotation, non_empty_file_problem(&paths.annotation))),
        Stage::GenomicsDone => check(&paths.reconciled, reconciled_problem(&paths.reconciled))
            .or_else(|| check(&paths.comparison, non_empty_dir_problem(&paths.comparison))),
    }
}

/// Verify that everything the work completing `stage` consumes is present,
/// non-empty and, where it has a format, parseable.
///
/// # Errors
///
/// [`CallmergeError::PrerequisiteMissing`] naming the first offending path.
pub fn check_prerequisites(genome: &GenomeDescriptor, stage: Stage) -> Result<(), CallmergeError> {
    let paths = ArtifactPaths::for_genome(genome);
    if let Some((path, reason)) = consumed_problem(stage, &paths) {
        return Err(missing(genome, stage, &path, reason));
    }
    debug!(genome = %genome.name, %stage, "prerequisites present");
    Ok(())
}

/// Verify that the work completing `stage` left its artifact behind.
///
/// # Errors
///
/// [`CallmergeError::ExternalTool`] if the artifact is missing or empty.
pub fn check_produced(genome: &GenomeDescriptor, stage: Stage) -> Result<(), CallmergeError> {
    let paths = ArtifactPaths::for_genome(genome);
    let (path, problem) = match stage {
        Stage::Pending => return Ok(()),
        Stage::GenecallDone => (&paths.reconciled, reconciled_problem(&paths.reconciled)),
        Stage::AnnotateDone => (&paths.annotation, non_empty_file_problem(&paths.annotation)),
        Stage::CompareDone => (&paths.comparison, non_empty_dir_problem(&paths.comparison)),
        Stage::GenomicsDone => (&paths.genomics, non_empty_dir_problem(&paths.genomics)),
    };
    match problem {
        None => Ok(()),
        Some(reason) => Err(CallmergeError::external(
            stage.step_name(),
            format!("did not produce {} ({reason})", path.display()),
        )),
    }
}
