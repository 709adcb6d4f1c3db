use crate::config::IdentityCutoffs;
use crate::types::{CallmergeError, Caller, GenomeDescriptor, ReconciledCallSet};

/// Per-genome work behind the stages the crate does not implement itself.
///
/// Implementations must be shareable across worker threads; the pipeline
/// calls them concurrently for different genomes.
pub trait StageWork: Sync {
    /// Run one gene caller, leaving its raw output under the genome's output
    /// directory. A failure makes that caller's set absent for the genome.
    fn run_caller(&self, _genome: &GenomeDescriptor, _caller: Caller) -> Result<(), CallmergeError> {
        Ok(())
    }

    /// Functional annotation of the reconciled calls.
    fn annotate(&self, genome: &GenomeDescriptor, calls: &ReconciledCallSet) -> Result<(), CallmergeError>;

    /// Genome-level analyses after comparison.
    fn genomics(&self, genome: &GenomeDescriptor, calls: &ReconciledCallSet) -> Result<(), CallmergeError>;
}

/// Another genome taking part in a comparison.
#[derive(Debug, Clone, Copy)]
pub struct Peer<'a> {
    pub genome: &'a GenomeDescriptor,
    pub calls: &'a ReconciledCallSet,
}

/// Cross-genome ortholog matching over reconciled call sets.
pub trait ComparativeMatcher: Sync {
    /// Compare one genome against its peers, writing results under its
    /// comparison directory.
    fn compare(
        &self,
        subject: &GenomeDescriptor,
        calls: &ReconciledCallSet,
        peers: &[Peer<'_>],
        cutoffs: IdentityCutoffs,
    ) -> Result<(), CallmergeError>;
}
