use std::io::BufRead;

use tracing::trace;

use crate::adapters::parse_coordinate;
use crate::types::{CallmergeError, Caller, GeneCallRecord, GeneCallSet, strand_from_symbol};

/// Read gene calls from GFF3.
///
/// CDS features are used when present; files that only carry `gene`
/// features (common for hand-made custom calls) fall back to those. Parsing
/// stops at a `##FASTA` section.
pub fn read_gff_calls<R: BufRead>(reader: R, caller: Caller) -> Result<GeneCallSet, CallmergeError> {
    let mut cds = Vec::new();
    let mut genes = Vec::new();
    let mut unparsed = 0;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim_end();
        if line.starts_with("##FASTA") {
            break;
        }
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // GFF columns: seqid, source, type, start, end, score, strand, phase, attributes
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 8 {
            trace!(line = index + 1, "GFF line has fewer than 8 columns");
            unparsed += 1;
            continue;
        }
        let target = match cols[2] {
            "CDS" => &mut cds,
            "gene" => &mut genes,
            _ => continue,
        };
        let (Some(start), Some(end)) = (parse_coordinate(cols[3]), parse_coordinate(cols[4])) else {
            trace!(line = index + 1, "GFF line has non-numeric coordinates");
            unparsed += 1;
            continue;
        };
        let confidence = match cols[5] {
            "." => None,
            score => score.parse().ok(),
        };
        target.push(
            GeneCallRecord::new(cols[0], start, end, strand_from_symbol(cols[6]), caller)
                .with_confidence(confidence),
        );
    }

    let records = if cds.is_empty() { genes } else { cds };
    Ok(GeneCallSet {
        caller,
        records,
        unparsed,
    })
}
