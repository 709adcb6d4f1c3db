use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, instrument, warn};

use super::artifacts::{check_prerequisites, check_produced};
use super::checkpoint::CheckpointStore;
use super::Stage;
use crate::config::SkipRequest;
use crate::types::{CallmergeError, GenomeDescriptor};

/// Run-level cancellation flag shared by every worker.
///
/// Cancelling stops new transitions from starting; a transition already
/// running finishes and persists its checkpoint.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Where a genome stopped, and why if it stopped early.
#[derive(Debug)]
pub struct GenomeProgress {
    pub reached: Stage,
    pub error: Option<CallmergeError>,
}

/// Checkpoint-aware stage state machine.
#[derive(Debug)]
pub struct StageController {
    store: CheckpointStore,
    skip: SkipRequest,
    cancel: CancellationToken,
}

impl StageController {
    #[must_use]
    pub fn new(store: CheckpointStore, skip: SkipRequest, cancel: CancellationToken) -> Self {
        Self { store, skip, cancel }
    }

    #[must_use]
    pub const fn store(&self) -> &CheckpointStore {
        &self.store
    }

    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Stage the genome may be assumed to have completed: the later of the
    /// requested skip floor and the recorded checkpoint.
    pub fn resume_point(&self, genome: &GenomeDescriptor) -> Result<Stage, CallmergeError> {
        let recorded = self.store.load(&genome.name)?;
        Ok(recorded.max(self.skip.floor()))
    }

    /// Stage the genome enters next, `None` once everything is done.
    pub fn entry_stage(&self, genome: &GenomeDescriptor) -> Result<Option<Stage>, CallmergeError> {
        Ok(self.resume_point(genome)?.next())
    }

    /// Run the work completing `stage` for one genome.
    ///
    /// The transition is refused if the run was cancelled, another
    /// transition for this genome is in flight, or the genome is already at
    /// or past `stage`. Prerequisites are checked
    /// before `work` runs and the produced artifact after; only then is the
    /// checkpoint advanced. Any failure leaves the checkpoint untouched.
    #[instrument(name = "transition", skip(self, genome, stage, work), fields(genome = %genome.name, stage = %stage))]
    pub fn transition<F>(&self, genome: &GenomeDescriptor, stage: Stage, work: F) -> Result<(), CallmergeError>
    where
        F: FnOnce() -> Result<(), CallmergeError>,
    {
        if self.cancel.is_cancelled() {
            return Err(CallmergeError::Cancelled {
                genome: genome.name.clone(),
                stage,
            });
        }
        let lease = self.store.lease(&genome.name)?;
        let resume = self.resume_point(genome)?;
        if stage <= resume {
            return Err(CallmergeError::Checkpoint(format!(
                "genome {} is already at {resume}; refusing to run {stage} again",
                genome.name
            )));
        }

        check_prerequisites(genome, stage)?;
        info!("starting {}", stage.step_name());
        work()?;
        check_produced(genome, stage)?;

        self.store.advance(&lease, stage)
    }

    /// Drive one genome from its resume point up to `target`.
    ///
    /// `run` performs the work for each stage entered. The first failure
    /// stops the genome; it is reported in the returned progress rather
    /// than propagated, so other genomes are unaffected.
    pub fn advance<F>(&self, genome: &GenomeDescriptor, target: Stage, mut run: F) -> GenomeProgress
    where
        F: FnMut(Stage) -> Result<(), CallmergeError>,
    {
        let mut reached = match self.resume_point(genome) {
            Ok(stage) => stage,
            Err(error) => {
                return GenomeProgress {
                    reached: Stage::Pending,
                    error: Some(error),
                };
            }
        };
        if reached >= target {
            info!(genome = %genome.name, %reached, "genome is up to date");
        }

        while reached < target {
            let Some(next) = reached.next() else { break };
            if let Err(error) = self.transition(genome, next, || run(next)) {
                warn!(genome = %genome.name, stage = %next, %error, "stage failed");
                return GenomeProgress {
                    reached,
                    error: Some(error),
                };
            }
            reached = next;
        }
        GenomeProgress {
            reached,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const RECONCILED: &str = "# callmerge version=0.3.0 genome=phiX policy=consensus\nphiX\t100\t500\t+\t1\tprodigal\n";

    struct Fixture {
        _dir: TempDir,
        genome: GenomeDescriptor,
        checkpoints: std::path::PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let genome = GenomeDescriptor::new(
                "phiX",
                "phage",
                dir.path().join("phiX.fasta"),
                dir.path().join("out"),
            );
            fs::create_dir_all(&genome.output_dir).unwrap();
            fs::write(&genome.fasta, ">phiX\nGAGTTTTATCGCTTCCATGAC\n").unwrap();
            let checkpoints = dir.path().join("checkpoints");
            Self {
                _dir: dir,
                genome,
                checkpoints,
            }
        }

        fn controller(&self, skip: SkipRequest) -> StageController {
            let store = CheckpointStore::open(&self.checkpoints).unwrap();
            StageController::new(store, skip, CancellationToken::new())
        }

        fn record(&self, stage: Stage) {
            let store = CheckpointStore::open(&self.checkpoints).unwrap();
            let lease = store.lease(&self.genome.name).unwrap();
            store.advance(&lease, stage).unwrap();
        }

        fn write(&self, file_name: &str, contents: &str) {
            fs::write(self.genome.output_path(file_name), contents).unwrap();
        }
    }

    #[test]
    fn test_fresh_genome_enters_gene_calling() {
        let fixture = Fixture::new();
        let controller = fixture.controller(SkipRequest::None);
        assert_eq!(
            controller.entry_stage(&fixture.genome).unwrap(),
            Some(Stage::GenecallDone)
        );
    }

    #[test]
    fn test_skip_flag_and_checkpoint_take_the_later_stage() {
        let fixture = Fixture::new();
        fixture.record(Stage::GenecallDone);

        let controller = fixture.controller(SkipRequest::GeneCalling);
        assert_eq!(
            controller.entry_stage(&fixture.genome).unwrap(),
            Some(Stage::AnnotateDone)
        );

        let controller = fixture.controller(SkipRequest::ThroughComparison);
        assert_eq!(
            controller.entry_stage(&fixture.genome).unwrap(),
            Some(Stage::GenomicsDone)
        );

        fixture.record(Stage::CompareDone);
        let controller = fixture.controller(SkipRequest::GeneCalling);
        assert_eq!(controller.resume_point(&fixture.genome).unwrap(), Stage::CompareDone);
    }

    #[test]
    fn test_missing_prerequisite_leaves_checkpoint_unchanged() {
        let fixture = Fixture::new();
        fixture.record(Stage::AnnotateDone);
        let controller = fixture.controller(SkipRequest::None);

        let mut ran = false;
        let result = controller.transition(&fixture.genome, Stage::CompareDone, || {
            ran = true;
            Ok(())
        });

        assert!(matches!(result, Err(CallmergeError::PrerequisiteMissing { .. })));
        assert!(!ran);
        assert_eq!(controller.store().load("phiX").unwrap(), Stage::AnnotateDone);
    }

    #[test]
    fn test_completed_stage_is_never_rerun() {
        let fixture = Fixture::new();
        fixture.write("phiX.reconciled.tsv", RECONCILED);
        fixture.record(Stage::CompareDone);
        let controller = fixture.controller(SkipRequest::None);

        let mut ran = false;
        let result = controller.transition(&fixture.genome, Stage::GenecallDone, || {
            ran = true;
            Ok(())
        });
        assert!(matches!(result, Err(CallmergeError::Checkpoint(_))));
        assert!(!ran);
        assert_eq!(controller.store().load("phiX").unwrap(), Stage::CompareDone);
    }

    #[test]
    fn test_stage_covered_by_skip_floor_is_not_run() {
        let fixture = Fixture::new();
        let controller = fixture.controller(SkipRequest::GeneCalling);

        let mut ran = false;
        let result = controller.transition(&fixture.genome, Stage::GenecallDone, || {
            ran = true;
            Ok(())
        });
        assert!(matches!(result, Err(CallmergeError::Checkpoint(_))));
        assert!(!ran);
        assert_eq!(controller.store().load("phiX").unwrap(), Stage::Pending);
    }

    #[test]
    fn test_failed_work_leaves_checkpoint_unchanged() {
        let fixture = Fixture::new();
        let controller = fixture.controller(SkipRequest::None);

        let result = controller.transition(&fixture.genome, Stage::GenecallDone, || {
            Err(CallmergeError::external("prodigal", "exit status 1"))
        });
        assert!(matches!(result, Err(CallmergeError::ExternalTool { .. })));
        assert_eq!(controller.store().load("phiX").unwrap(), Stage::Pending);
    }

    #[test]
    fn test_work_without_artifact_is_not_checkpointed() {
        let fixture = Fixture::new();
        let controller = fixture.controller(SkipRequest::None);

        let result = controller.transition(&fixture.genome, Stage::GenecallDone, || Ok(()));
        assert!(matches!(result, Err(CallmergeError::ExternalTool { .. })));
        assert_eq!(controller.store().load("phiX").unwrap(), Stage::Pending);
    }

    #[test]
    fn test_advance_runs_each_stage_in_order() {
        let fixture = Fixture::new();
        let controller = fixture.controller(SkipRequest::None);

        let mut entered = Vec::new();
        let progress = controller.advance(&fixture.genome, Stage::AnnotateDone, |stage| {
            entered.push(stage);
            match stage {
                Stage::GenecallDone => fixture.write("phiX.reconciled.tsv", RECONCILED),
                _ => fixture.write("phiX.annotation.tsv", "gene\tproduct\n"),
            }
            Ok(())
        });

        assert!(progress.error.is_none());
        assert_eq!(progress.reached, Stage::AnnotateDone);
        assert_eq!(entered, vec![Stage::GenecallDone, Stage::AnnotateDone]);
        assert_eq!(controller.store().load("phiX").unwrap(), Stage::AnnotateDone);
    }

    #[test]
    fn test_advance_resumes_after_skip_floor() {
        let fixture = Fixture::new();
        fixture.write("phiX.reconciled.tsv", RECONCILED);
        let controller = fixture.controller(SkipRequest::GeneCalling);

        let mut entered = Vec::new();
        let progress = controller.advance(&fixture.genome, Stage::AnnotateDone, |stage| {
            entered.push(stage);
            fixture.write("phiX.annotation.tsv", "gene\tproduct\n");
            Ok(())
        });

        assert!(progress.error.is_none());
        assert_eq!(entered, vec![Stage::AnnotateDone]);
    }

    #[test]
    fn test_advance_reports_failure_with_reached_stage() {
        let fixture = Fixture::new();
        fixture.record(Stage::GenecallDone);
        let controller = fixture.controller(SkipRequest::None);

        let progress = controller.advance(&fixture.genome, Stage::GenomicsDone, |_| Ok(()));
        assert_eq!(progress.reached, Stage::GenecallDone);
        assert!(matches!(
            progress.error,
            Some(CallmergeError::PrerequisiteMissing { stage: Stage::AnnotateDone, .. })
        ));
    }

    #[test]
    fn test_up_to_date_genome_runs_nothing() {
        let fixture = Fixture::new();
        fixture.record(Stage::CompareDone);
        let controller = fixture.controller(SkipRequest::None);

        let progress = controller.advance(&fixture.genome, Stage::AnnotateDone, |stage| {
            panic!("unexpected stage {stage}")
        });
        assert!(progress.error.is_none());
        assert_eq!(progress.reached, Stage::CompareDone);
    }

    #[test]
    fn test_cancelled_run_refuses_new_transitions() {
        let fixture = Fixture::new();
        let controller = fixture.controller(SkipRequest::None);
        controller.cancellation().cancel();

        let progress = controller.advance(&fixture.genome, Stage::GenecallDone, |_| Ok(()));
        assert!(matches!(progress.error, Some(CallmergeError::Cancelled { .. })));
        assert_eq!(progress.reached, Stage::Pending);
    }

    #[test]
    fn test_concurrent_transition_for_same_genome_is_rejected() {
        let fixture = Fixture::new();
        let controller = fixture.controller(SkipRequest::None);
        let _held = controller.store().lease("phiX").unwrap();

        let result = controller.transition(&fixture.genome, Stage::GenecallDone, || Ok(()));
        assert!(matches!(result, Err(CallmergeError::TransitionInFlight(_))));
    }
}
