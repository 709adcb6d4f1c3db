//! Gene-call reconciliation.
//!
//! The [`Reconciler`] merges the call sets several gene callers produced for
//! one genome into a single [`ReconciledCallSet`]. Records from different
//! callers are the same gene when contig and strand match and both
//! boundaries lie within the [`MatchTolerance`]; chains of such matches are
//! closed into equivalence groups. Each group takes the boundaries of its
//! highest-priority caller and is emitted or dropped according to the
//! [`CallPolicy`].
//!
//! ## Policies
//!
//! - **superset**: every group
//! - **commoncore**: groups every active caller contributed to
//! - **consensus**: groups a strict majority of active callers contributed to
//! - **custom**: the custom call set, validated and ordered
//! - **primary:&lt;caller&gt;**: one caller's set, bypassing the merge
//!
//! ## Examples
//!
//! ```rust
//! use std::collections::HashMap;
//!
//! use bio::bio_types::strand::Strand;
//! use callmerge_core::config::{CallPolicy, MatchTolerance};
//! use callmerge_core::reconcile::Reconciler;
//! use callmerge_core::types::{Caller, GeneCallRecord, GeneCallSet, GenomeDescriptor};
//!
//! let genome = GenomeDescriptor::new("phiX", "phage", "phiX.fasta", "out/phiX");
//! let call = |start, end, caller| GeneCallRecord::new("phiX", start, end, Strand::Forward, caller);
//!
//! let mut sets = HashMap::new();
//! sets.insert(Caller::Prodigal, GeneCallSet::with_records(Caller::Prodigal, vec![call(100, 500, Caller::Prodigal)]));
//! sets.insert(Caller::Glimmer, GeneCallSet::with_records(Caller::Glimmer, vec![call(103, 500, Caller::Glimmer)]));
//!
//! let reconciler = Reconciler::new(vec![Caller::Prodigal, Caller::Glimmer], MatchTolerance::Bases(5))?;
//! let result = reconciler.reconcile(&genome, &sets, CallPolicy::CommonCore)?;
//!
//! assert_eq!(result.calls.len(), 1);
//! assert_eq!(result.calls.calls[0].record.start, 100);
//! assert_eq!(result.calls.calls[0].contributors, vec![Caller::Prodigal, Caller::Glimmer]);
//! # Ok::<(), callmerge_core::types::CallmergeError>(())
//! ```

mod grouping;

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info, instrument, warn};

use crate::config::{CallPolicy, MatchTolerance, RunConfig};
use crate::types::{
    CallmergeError, Caller, GeneCallRecord, GeneCallSet, GenomeDescriptor, ReconciledCall,
    ReconciledCallSet, strand_rank,
};
use grouping::{
    Candidate, confidence_key, equivalence_groups, representative_order, sort_candidates,
};

/// Outcome of reconciling one genome.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub calls: ReconciledCallSet,
    /// Records rejected per caller: unparseable lines plus records failing validation
    pub rejected: BTreeMap<Caller, usize>,
    /// Warning-level notices (absent custom set, absent primary caller output)
    pub notices: Vec<String>,
}

impl Reconciliation {
    /// Total number of rejected records across callers.
    #[must_use]
    pub fn total_rejected(&self) -> usize {
        self.rejected.values().sum()
    }
}

/// Merges per-caller gene calls for a genome.
///
/// Holds no mutable state; one instance can serve every genome of a run
/// from any number of threads.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciler {
    tolerance: MatchTolerance,
    /// Active callers, highest priority first
    priority: Vec<Caller>,
}

impl Reconciler {
    /// Create a reconciler for the given active callers (highest priority first).
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a caller is listed twice.
    pub fn new(priority: Vec<Caller>, tolerance: MatchTolerance) -> Result<Self, CallmergeError> {
        for (index, caller) in priority.iter().enumerate() {
            if priority[..index].contains(caller) {
                return Err(CallmergeError::Configuration(format!(
                    "caller '{caller}' is listed more than once in the priority order"
                )));
            }
        }
        Ok(Self { tolerance, priority })
    }

    pub fn from_config(config: &RunConfig) -> Result<Self, CallmergeError> {
        Self::new(config.callers.clone(), config.tolerance)
    }

    #[must_use]
    pub fn priority(&self) -> &[Caller] {
        &self.priority
    }

    /// Reconcile one genome's call sets under `policy`.
    ///
    /// `sets` holds whatever caller output is available; an active caller
    /// without an entry simply contributes nothing. Sets for callers outside
    /// the priority order are ignored, except the custom set under the
    /// `custom` policy.
    ///
    /// # Errors
    ///
    /// Configuration errors only: a merge policy with no active callers, or a
    /// `primary` caller that is not active. Malformed records are dropped and
    /// counted in [`Reconciliation::rejected`].
    #[instrument(name = "reconcile", skip_all, fields(genome = %genome.name, policy = %policy))]
    pub fn reconcile(
        &self,
        genome: &GenomeDescriptor,
        sets: &HashMap<Caller, GeneCallSet>,
        policy: CallPolicy,
    ) -> Result<Reconciliation, CallmergeError> {
        let result = match policy {
            CallPolicy::Superset | CallPolicy::CommonCore | CallPolicy::Consensus => {
                self.merge(genome, sets, policy)?
            }
            CallPolicy::Custom => single_caller(genome, sets.get(&Caller::Custom), Caller::Custom, policy),
            CallPolicy::Primary(caller) => {
                if !self.priority.contains(&caller) {
                    return Err(CallmergeError::Configuration(format!(
                        "primary caller '{caller}' is not an active caller"
                    )));
                }
                single_caller(genome, sets.get(&caller), caller, policy)
            }
        };

        info!(
            calls = result.calls.len(),
            rejected = result.total_rejected(),
            "reconciled gene calls"
        );
        Ok(result)
    }

    fn merge(
        &self,
        genome: &GenomeDescriptor,
        sets: &HashMap<Caller, GeneCallSet>,
        policy: CallPolicy,
    ) -> Result<Reconciliation, CallmergeError> {
        if self.priority.is_empty() {
            return Err(CallmergeError::Configuration(format!(
                "policy '{policy}' needs at least one active caller"
            )));
        }

        let mut ignored: Vec<Caller> = sets
            .keys()
            .filter(|caller| !self.priority.contains(caller))
            .copied()
            .collect();
        ignored.sort_unstable();
        for caller in ignored {
            debug!(%caller, "ignoring call set from inactive caller");
        }

        let mut rejected = BTreeMap::new();
        let mut candidates = Vec::new();
        for (rank, caller) in self.priority.iter().enumerate() {
            let Some(set) = sets.get(caller) else {
                debug!(%caller, "no call set available");
                continue;
            };
            let accepted = accepted_records(set, &mut rejected);
            candidates.extend(accepted.into_iter().map(|record| Candidate { rank, record }));
        }

        sort_candidates(&mut candidates);
        let groups = equivalence_groups(&candidates, &self.tolerance);
        let active = self.priority.len();
        debug!(candidates = candidates.len(), groups = groups.len(), "grouped gene calls");

        let mut calls: Vec<ReconciledCall> = groups
            .iter()
            .filter_map(|group| {
                let members: Vec<Candidate<'_>> = group.iter().map(|&index| candidates[index]).collect();
                let mut ranks: Vec<usize> = members.iter().map(|member| member.rank).collect();
                ranks.sort_unstable();
                ranks.dedup();
                if !qualifies(policy, ranks.len(), active) {
                    return None;
                }
                let representative = members.iter().min_by(|a, b| representative_order(a, b))?;
                Some(ReconciledCall {
                    record: representative.record.clone(),
                    contributors: ranks.iter().map(|&rank| self.priority[rank]).collect(),
                })
            })
            .collect();
        calls.sort_by(|a, b| position_order(&a.record, &b.record));

        Ok(Reconciliation {
            calls: ReconciledCallSet {
                genome: genome.name.clone(),
                policy,
                calls,
            },
            rejected,
            notices: Vec::new(),
        })
    }
}

/// Whether a group with `contributors` distinct callers is emitted.
const fn qualifies(policy: CallPolicy, contributors: usize, active: usize) -> bool {
    match policy {
        CallPolicy::CommonCore => contributors == active,
        CallPolicy::Consensus => 2 * contributors > active,
        CallPolicy::Superset | CallPolicy::Custom | CallPolicy::Primary(_) => true,
    }
}

fn position_order(a: &GeneCallRecord, b: &GeneCallRecord) -> std::cmp::Ordering {
    a.contig
        .cmp(&b.contig)
        .then_with(|| a.start.cmp(&b.start))
        .then_with(|| a.end.cmp(&b.end))
        .then_with(|| strand_rank(a.strand).cmp(&strand_rank(b.strand)))
        .then_with(|| confidence_key(b).total_cmp(&confidence_key(a)))
}

/// Validate a caller's records, counting rejects (including lines the
/// adapter could not parse) into `rejected`.
fn accepted_records<'a>(
    set: &'a GeneCallSet,
    rejected: &mut BTreeMap<Caller, usize>,
) -> Vec<&'a GeneCallRecord> {
    let mut invalid = 0;
    let accepted: Vec<&GeneCallRecord> = set
        .records
        .iter()
        .filter(|record| match record.validate() {
            Ok(()) => true,
            Err(err) => {
                debug!("{err}");
                invalid += 1;
                false
            }
        })
        .collect();

    let count = invalid + set.unparsed;
    if count > 0 {
        warn!(caller = %set.caller, rejected = count, "rejected malformed gene calls");
        *rejected.entry(set.caller).or_insert(0) += count;
    }
    accepted
}

/// Custom and primary policies: one caller's set, validated, ordered by
/// position and with exact duplicates removed.
fn single_caller(
    genome: &GenomeDescriptor,
    set: Option<&GeneCallSet>,
    caller: Caller,
    policy: CallPolicy,
) -> Reconciliation {
    let mut rejected = BTreeMap::new();
    let Some(set) = set else {
        let notice = format!("no {caller} gene calls found for genome {}", genome.name);
        warn!("{notice}; continuing with an empty call set");
        return Reconciliation {
            calls: ReconciledCallSet::empty(genome.name.clone(), policy),
            rejected,
            notices: vec![notice],
        };
    };

    let mut records = accepted_records(set, &mut rejected);
    records.sort_by(|a, b| position_order(a, b));
    let before = records.len();
    records.dedup_by(|a, b| a.locus() == b.locus());
    if records.len() < before {
        debug!(duplicates = before - records.len(), "dropped duplicate gene calls");
    }

    let calls = records
        .into_iter()
        .map(|record| ReconciledCall {
            record: record.clone(),
            contributors: vec![caller],
        })
        .collect();
    Reconciliation {
        calls: ReconciledCallSet {
            genome: genome.name.clone(),
            policy,
            calls,
        },
        rejected,
        notices: Vec::new(),
    }
}
