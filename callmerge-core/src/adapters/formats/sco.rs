use std::io::BufRead;

use bio::bio_types::strand::Strand;
use tracing::trace;

use crate::adapters::{parse_coordinate, split_fields};
use crate::types::{CallmergeError, Caller, GeneCallRecord, GeneCallSet};

/// Read simple coordinate output.
///
/// Two row shapes are accepted: Prodigal's `>index_start_end_strand` rows
/// (the contig comes from the preceding `seqhdr="..."` comment) and the
/// tab-separated `start end ±1 confidence` rows some Prodigal ports write.
pub fn read_sco_calls<R: BufRead>(reader: R, caller: Caller) -> Result<GeneCallSet, CallmergeError> {
    let mut set = GeneCallSet::new(caller);
    let mut contig = String::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with('#') {
            if let Some(header) = sequence_header(line) {
                contig = header.to_string();
            }
            continue;
        }

        let record = match line.strip_prefix('>') {
            Some(row) => parse_prodigal_row(row, &contig, caller),
            None => parse_tabular_row(line, &contig, caller),
        };
        match record {
            Some(record) => set.records.push(record),
            None => {
                trace!(line = index + 1, "unparseable SCO row");
                set.unparsed += 1;
            }
        }
    }

    Ok(set)
}

/// First word of `seqhdr="..."` in a `# Sequence Data:` comment.
fn sequence_header(line: &str) -> Option<&str> {
    let (_, rest) = line.split_once("seqhdr=\"")?;
    let (header, _) = rest.split_once('"')?;
    header.split_whitespace().next()
}

fn parse_prodigal_row(row: &str, contig: &str, caller: Caller) -> Option<GeneCallRecord> {
    let mut parts = row.split('_');
    let _index = parts.next()?;
    let start = parse_coordinate(parts.next()?)?;
    let end = parse_coordinate(parts.next()?)?;
    let strand = match parts.next()? {
        "+" => Strand::Forward,
        "-" => Strand::Reverse,
        _ => Strand::Unknown,
    };
    Some(GeneCallRecord::new(contig, start, end, strand, caller))
}

fn parse_tabular_row(line: &str, contig: &str, caller: Caller) -> Option<GeneCallRecord> {
    let fields = split_fields(line);
    let [start, end, strand, rest @ ..] = fields.as_slice() else {
        return None;
    };
    let strand = match *strand {
        "1" | "+1" | "+" => Strand::Forward,
        "-1" | "-" => Strand::Reverse,
        _ => Strand::Unknown,
    };
    let confidence = rest.first().and_then(|value| value.parse().ok());
    Some(
        GeneCallRecord::new(contig, parse_coordinate(start)?, parse_coordinate(end)?, strand, caller)
            .with_confidence(confidence),
    )
}
