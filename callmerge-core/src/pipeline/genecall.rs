//! The gene-calling stage: run callers, collect and reconcile their output,
//! persist the reconciled set.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, info, warn};

use super::artifacts::ArtifactPaths;
use super::checkpoint::write_atomic;
use super::work::StageWork;
use crate::adapters::{CallerAdapter, RawFormat};
use crate::config::{CallPolicy, OutputFormat};
use crate::output::render_reconciled;
use crate::reconcile::{Reconciler, Reconciliation};
use crate::types::{CallmergeError, Caller, GeneCallSet, GenomeDescriptor};

/// Load one caller's output, treating unreadable output as absent.
fn load_calls(caller: Caller, path: &Path, format: RawFormat) -> Option<GeneCallSet> {
    match CallerAdapter::new(caller, format).load(path) {
        Ok(set) => Some(set),
        Err(CallmergeError::IoError(e)) if e.kind() == io::ErrorKind::NotFound => {
            warn!(%caller, path = %path.display(), "no caller output found; treating its calls as absent");
            None
        }
        Err(error) => {
            warn!(%caller, path = %path.display(), %error, "cannot read caller output; treating its calls as absent");
            None
        }
    }
}

fn wants_custom(reconciler: &Reconciler, policy: CallPolicy) -> bool {
    matches!(policy, CallPolicy::Custom | CallPolicy::Primary(Caller::Custom))
        || reconciler.priority().contains(&Caller::Custom)
}

/// Gather every available call set for a genome.
///
/// Each active caller is run through `work`; a caller that fails or leaves
/// no output is absent from the result. Custom calls are read from
/// `custom_calls` when the policy or the active callers need them, and a
/// missing custom file is not an error.
pub fn collect_call_sets(
    genome: &GenomeDescriptor,
    reconciler: &Reconciler,
    policy: CallPolicy,
    custom_calls: &Path,
    work: &dyn StageWork,
) -> HashMap<Caller, GeneCallSet> {
    let mut sets = HashMap::new();

    for &caller in reconciler.priority() {
        if caller == Caller::Custom {
            continue;
        }
        if let Err(error) = work.run_caller(genome, caller) {
            warn!(%caller, %error, "gene caller failed; treating its calls as absent");
            continue;
        }
        let path = ArtifactPaths::raw_output(genome, caller);
        if let Some(set) = load_calls(caller, &path, RawFormat::native(caller)) {
            sets.insert(caller, set);
        }
    }

    if wants_custom(reconciler, policy) {
        if custom_calls.exists() {
            let format = RawFormat::detect(Caller::Custom, custom_calls);
            if let Some(set) = load_calls(Caller::Custom, custom_calls, format) {
                sets.insert(Caller::Custom, set);
            }
        } else {
            debug!(path = %custom_calls.display(), "no custom gene calls for genome");
        }
    }
    sets
}

/// Run the gene-calling stage for one genome and persist its reconciled set
/// (tabular plus a GFF3 export) atomically.
pub fn call_genes(
    genome: &GenomeDescriptor,
    reconciler: &Reconciler,
    policy: CallPolicy,
    custom_calls: &Path,
    work: &dyn StageWork,
) -> Result<Reconciliation, CallmergeError> {
    let sets = collect_call_sets(genome, reconciler, policy, custom_calls, work);
    let result = reconciler.reconcile(genome, &sets, policy)?;

    let paths = ArtifactPaths::for_genome(genome);
    fs::create_dir_all(&genome.output_dir)?;
    write_atomic(
        &paths.reconciled,
        render_reconciled(&result.calls, OutputFormat::Tabular)?.as_bytes(),
    )?;
    write_atomic(
        &paths.reconciled_gff,
        render_reconciled(&result.calls, OutputFormat::Gff)?.as_bytes(),
    )?;

    info!(
        genome = %genome.name,
        calls = result.calls.len(),
        path = %paths.reconciled.display(),
        "wrote reconciled gene calls"
    );
    Ok(result)
}
