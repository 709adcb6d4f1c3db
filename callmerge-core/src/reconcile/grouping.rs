use std::cmp::Ordering;

use crate::config::MatchTolerance;
use crate::types::{GeneCallRecord, strand_rank};

/// A validated record together with the priority rank of its caller.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate<'a> {
    pub rank: usize,
    pub record: &'a GeneCallRecord,
}

/// Disjoint-set forest with path halving and union by size.
#[derive(Debug)]
pub(crate) struct DisjointSets {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl DisjointSets {
    pub fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            size: vec![1; len],
        }
    }

    pub fn find(&mut self, mut item: usize) -> usize {
        while self.parent[item] != item {
            self.parent[item] = self.parent[self.parent[item]];
            item = self.parent[item];
        }
        item
    }

    /// Merge the sets holding `a` and `b`. Returns false if they were already joined.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let (mut root_a, mut root_b) = (self.find(a), self.find(b));
        if root_a == root_b {
            return false;
        }
        if self.size[root_a] < self.size[root_b] {
            std::mem::swap(&mut root_a, &mut root_b);
        }
        self.parent[root_b] = root_a;
        self.size[root_a] += self.size[root_b];
        true
    }
}

/// Sort candidates by contig, strand, start, end, caller rank and
/// descending confidence.
///
/// The order only depends on record content and caller priority, so the
/// grouping that follows is independent of how the input was assembled.
pub(crate) fn sort_candidates(candidates: &mut [Candidate<'_>]) {
    candidates.sort_by(|a, b| {
        let (x, y) = (a.record, b.record);
        x.contig
            .cmp(&y.contig)
            .then_with(|| strand_rank(x.strand).cmp(&strand_rank(y.strand)))
            .then_with(|| x.start.cmp(&y.start))
            .then_with(|| x.end.cmp(&y.end))
            .then_with(|| a.rank.cmp(&b.rank))
            .then_with(|| confidence_key(y).total_cmp(&confidence_key(x)))
    });
}

/// Final tie-break between calls at the same locus.
pub(crate) fn confidence_key(record: &GeneCallRecord) -> f64 {
    record.confidence.unwrap_or(f64::NEG_INFINITY)
}

fn same_run(a: &GeneCallRecord, b: &GeneCallRecord) -> bool {
    a.contig == b.contig && a.strand == b.strand
}

fn same_gene(a: &Candidate<'_>, b: &Candidate<'_>, tolerance: &MatchTolerance) -> bool {
    if a.record.locus() == b.record.locus() {
        return true;
    }
    a.rank != b.rank && tolerance.matches(a.record, b.record)
}

/// Cluster sorted candidates into equivalence groups.
///
/// Candidate pairs are found with a forward sweep over each (contig, strand)
/// run: once the start gap exceeds the widest possible allowance no later
/// record can match. Matches are closed transitively through
/// [`DisjointSets`]. Groups hold indices into `candidates` and are ordered by
/// their first member.
pub(crate) fn equivalence_groups(
    candidates: &[Candidate<'_>],
    tolerance: &MatchTolerance,
) -> Vec<Vec<usize>> {
    let longest = candidates.iter().map(|c| c.record.len()).max().unwrap_or(0);
    let window = tolerance.window(longest);

    let mut sets = DisjointSets::new(candidates.len());
    for (i, current) in candidates.iter().enumerate() {
        for (offset, next) in candidates[i + 1..].iter().enumerate() {
            if !same_run(current.record, next.record)
                || next.record.start - current.record.start > window
            {
                break;
            }
            if same_gene(current, next, tolerance) {
                sets.union(i, i + 1 + offset);
            }
        }
    }

    let mut slot_of_root: Vec<Option<usize>> = vec![None; candidates.len()];
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for index in 0..candidates.len() {
        let root = sets.find(index);
        let slot = *slot_of_root[root].get_or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(index);
    }
    groups
}

/// Order used to pick a group's representative: highest priority, then
/// earliest start and end, then best score.
pub(crate) fn representative_order(a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    a.rank
        .cmp(&b.rank)
        .then_with(|| a.record.start.cmp(&b.record.start))
        .then_with(|| a.record.end.cmp(&b.record.end))
        .then_with(|| confidence_key(b.record).total_cmp(&confidence_key(a.record)))
}
