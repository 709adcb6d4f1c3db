//! Whole-run driver: every configured genome, both worker pools.

use std::fmt;

use tracing::{info, warn};

use super::artifacts::ArtifactPaths;
use super::checkpoint::CheckpointStore;
use super::controller::{CancellationToken, GenomeProgress, StageController};
use super::genecall::call_genes;
use super::pool::WorkerPool;
use super::work::{ComparativeMatcher, Peer, StageWork};
use super::Stage;
use crate::config::RunConfig;
use crate::databases::DatabaseVerifier;
use crate::output::load_reconciled;
use crate::reconcile::Reconciler;
use crate::types::{CallmergeError, GenomeDescriptor, ReconciledCallSet};

/// Final state of one genome after a run.
#[derive(Debug)]
pub struct GenomeOutcome {
    pub name: String,
    pub reached: Stage,
    pub error: Option<CallmergeError>,
}

impl GenomeOutcome {
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Per-genome outcomes of a run, in configuration order.
#[derive(Debug)]
pub struct RunSummary {
    pub target: Stage,
    pub genomes: Vec<GenomeOutcome>,
}

impl RunSummary {
    pub fn failures(&self) -> impl Iterator<Item = &GenomeOutcome> {
        self.genomes.iter().filter(|outcome| outcome.is_failure())
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for outcome in &self.genomes {
            match &outcome.error {
                None => writeln!(f, "{}\t{}", outcome.name, outcome.reached)?,
                Some(error) => writeln!(f, "{}\t{}\tFAILED: {error}", outcome.name, outcome.reached)?,
            }
        }
        Ok(())
    }
}

/// Drives every genome of a run through the stage controller.
///
/// Per-genome stages run on the pipeline pool (`phate_threads`). Comparison
/// runs on its own pool (`cgp_threads`) and only starts once every
/// participating genome has been annotated.
pub struct Pipeline<'a> {
    config: &'a RunConfig,
    reconciler: Reconciler,
    controller: StageController,
    target: Stage,
    work: &'a dyn StageWork,
    matcher: &'a dyn ComparativeMatcher,
    verifier: &'a dyn DatabaseVerifier,
}

impl<'a> Pipeline<'a> {
    /// Build a pipeline whose target is the furthest stage the configured
    /// commands can reach.
    pub fn new(
        config: &'a RunConfig,
        work: &'a dyn StageWork,
        matcher: &'a dyn ComparativeMatcher,
        verifier: &'a dyn DatabaseVerifier,
        cancel: CancellationToken,
    ) -> Result<Self, CallmergeError> {
        let store = CheckpointStore::open(&config.checkpoint_dir)?;
        Ok(Self {
            config,
            reconciler: Reconciler::from_config(config)?,
            controller: StageController::new(store, config.skip, cancel),
            target: config.commands.target(),
            work,
            matcher,
            verifier,
        })
    }

    #[must_use]
    pub const fn with_target(mut self, target: Stage) -> Self {
        self.target = target;
        self
    }

    #[must_use]
    pub const fn controller(&self) -> &StageController {
        &self.controller
    }

    /// Run every genome up to the target stage.
    ///
    /// # Errors
    ///
    /// Only run-fatal errors: failed database verification or a pool that
    /// cannot be built. Per-genome failures are reported in the summary.
    pub fn run(&self) -> Result<RunSummary, CallmergeError> {
        if self.config.check_databases {
            self.verifier.verify(&self.config.databases)?;
        }
        let pipeline_pool = WorkerPool::new(self.config.pipeline_threads, "pipeline")?;
        let comparison_pool = WorkerPool::new(self.config.comparison_threads, "comparison")?;
        let genomes = &self.config.genomes;
        info!(
            genomes = genomes.len(),
            target = %self.target,
            pipeline_workers = pipeline_pool.workers(),
            comparison_workers = comparison_pool.workers(),
            "starting run"
        );

        let first_target = self.target.min(Stage::AnnotateDone);
        let mut progress = pipeline_pool.map(genomes, |genome| {
            self.controller
                .advance(genome, first_target, |stage| self.run_stage(genome, stage))
        });

        if self.target >= Stage::CompareDone {
            self.compare_all(&comparison_pool, &mut progress);
        }

        if self.target > Stage::CompareDone {
            let ready: Vec<usize> = (0..genomes.len())
                .filter(|&i| progress[i].error.is_none() && progress[i].reached >= Stage::CompareDone)
                .collect();
            let finished = pipeline_pool.map(&ready, |&i| {
                let genome = &genomes[i];
                self.controller
                    .advance(genome, self.target, |stage| self.run_stage(genome, stage))
            });
            for (i, outcome) in ready.into_iter().zip(finished) {
                progress[i] = outcome;
            }
        }

        let summary = RunSummary {
            target: self.target,
            genomes: genomes
                .iter()
                .zip(progress)
                .map(|(genome, progress)| GenomeOutcome {
                    name: genome.name.clone(),
                    reached: progress.reached,
                    error: progress.error,
                })
                .collect(),
        };
        let failed = summary.failures().count();
        if failed == 0 {
            info!(genomes = summary.genomes.len(), "run finished");
        } else {
            warn!(genomes = summary.genomes.len(), failed, "run finished with failures");
        }
        Ok(summary)
    }

    /// Cross-genome comparison of every annotated genome that still needs it.
    fn compare_all(&self, pool: &WorkerPool, progress: &mut [GenomeProgress]) {
        let genomes = &self.config.genomes;

        let mut participants: Vec<(usize, ReconciledCallSet)> = Vec::new();
        for (i, genome) in genomes.iter().enumerate() {
            let state = &mut progress[i];
            if state.error.is_some() || state.reached < Stage::AnnotateDone {
                continue;
            }
            match load_reconciled(&ArtifactPaths::for_genome(genome).reconciled) {
                Ok(calls) => participants.push((i, calls)),
                Err(error) if state.reached < Stage::CompareDone => {
                    warn!(genome = %genome.name, %error, "cannot load reconciled calls for comparison");
                    state.error = Some(error);
                }
                Err(error) => {
                    warn!(genome = %genome.name, %error, "reconciled calls unavailable; genome is not a comparison peer");
                }
            }
        }

        let subjects: Vec<usize> = participants
            .iter()
            .enumerate()
            .filter(|(_, (i, _))| progress[*i].reached < Stage::CompareDone)
            .map(|(slot, _)| slot)
            .collect();
        if subjects.is_empty() {
            return;
        }
        info!(
            subjects = subjects.len(),
            participants = participants.len(),
            "starting comparison"
        );

        let compared = pool.map(&subjects, |&slot| {
            let (i, calls) = &participants[slot];
            let genome = &genomes[*i];
            let peers: Vec<Peer<'_>> = participants
                .iter()
                .filter(|(other, _)| other != i)
                .map(|(other, calls)| Peer {
                    genome: &genomes[*other],
                    calls,
                })
                .collect();
            self.controller.advance(genome, Stage::CompareDone, |_| {
                self.matcher
                    .compare(genome, calls, &peers, self.config.identity_cutoffs)
            })
        });

        for (slot, outcome) in subjects.into_iter().zip(compared) {
            progress[participants[slot].0] = outcome;
        }
    }

    /// Work completing one per-genome stage.
    fn run_stage(&self, genome: &GenomeDescriptor, stage: Stage) -> Result<(), CallmergeError> {
        match stage {
            Stage::GenecallDone => call_genes(
                genome,
                &self.reconciler,
                self.config.policy,
                &self.config.custom_calls_path(genome),
                self.work,
            )
            .map(|_| ()),
            Stage::AnnotateDone => {
                let calls = load_reconciled(&ArtifactPaths::for_genome(genome).reconciled)?;
                self.work.annotate(genome, &calls)
            }
            Stage::GenomicsDone => {
                let calls = load_reconciled(&ArtifactPaths::for_genome(genome).reconciled)?;
                self.work.genomics(genome, &calls)
            }
            Stage::Pending | Stage::CompareDone => Err(CallmergeError::Checkpoint(format!(
                "{} is not a per-genome stage",
                stage.step_name()
            ))),
        }
    }
}
