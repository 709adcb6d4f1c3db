use std::io::BufRead;

use tracing::trace;

use crate::adapters::{parse_coordinate, split_fields};
use crate::types::{CallmergeError, Caller, GeneCallRecord, GeneCallSet, strand_from_symbol};

/// Read PHANOTATE tabular output (`START STOP FRAME CONTIG SCORE`).
///
/// Reverse-strand rows are written with `START > STOP`.
pub fn read_phanotate_calls<R: BufRead>(reader: R, caller: Caller) -> Result<GeneCallSet, CallmergeError> {
    let mut set = GeneCallSet::new(caller);

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields = split_fields(line);
        let [first, second, frame, contig, rest @ ..] = fields.as_slice() else {
            trace!(line = index + 1, "PHANOTATE row has too few columns");
            set.unparsed += 1;
            continue;
        };
        let (Some(first), Some(second)) = (parse_coordinate(first), parse_coordinate(second)) else {
            trace!(line = index + 1, "PHANOTATE row has non-numeric coordinates");
            set.unparsed += 1;
            continue;
        };

        let strand = strand_from_symbol(frame);
        let (start, end) = if first > second && frame.trim() == "-" {
            (second, first)
        } else {
            (first, second)
        };
        let confidence = rest.first().and_then(|score| score.parse().ok());
        set.records
            .push(GeneCallRecord::new(*contig, start, end, strand, caller).with_confidence(confidence));
    }

    Ok(set)
}
