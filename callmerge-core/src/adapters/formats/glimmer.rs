use std::io::BufRead;

use bio::bio_types::strand::Strand;
use tracing::trace;

use crate::adapters::{parse_coordinate, split_fields};
use crate::types::{CallmergeError, Caller, GeneCallRecord, GeneCallSet};

/// Read a Glimmer3 `.predict` file.
///
/// ```text
/// >contig_1
/// orf00001      110     1207  +2     9.87
/// orf00002     3000     2001  -1     5.02
/// ```
///
/// Reverse-strand rows list the stop before the start; coordinates are
/// swapped so that `start <= end`.
pub fn read_glimmer_calls<R: BufRead>(reader: R, caller: Caller) -> Result<GeneCallSet, CallmergeError> {
    let mut set = GeneCallSet::new(caller);
    let mut contig = String::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(header) = line.strip_prefix('>') {
            contig = header.split_whitespace().next().unwrap_or_default().to_string();
            continue;
        }

        let fields = split_fields(line);
        let parsed = match fields.as_slice() {
            [_id, first, second, frame, rest @ ..] => parse_coordinate(first)
                .zip(parse_coordinate(second))
                .map(|coords| (coords, frame_strand(frame), rest.first())),
            _ => None,
        };
        let Some(((first, second), strand, score)) = parsed else {
            trace!(line = index + 1, "unparseable Glimmer row");
            set.unparsed += 1;
            continue;
        };

        // Reverse rows are written stop-first
        let (start, end) = if strand == Strand::Reverse && first > second {
            (second, first)
        } else {
            (first, second)
        };
        let confidence = score.and_then(|score| score.parse().ok());
        set.records
            .push(GeneCallRecord::new(contig.as_str(), start, end, strand, caller).with_confidence(confidence));
    }

    Ok(set)
}

fn frame_strand(frame: &str) -> Strand {
    match frame.chars().next() {
        Some('+') => Strand::Forward,
        Some('-') => Strand::Reverse,
        _ => Strand::Unknown,
    }
}
