use std::io::Write;

use crate::constants::{GFF_SOURCE, VERSION};
use crate::types::{CallmergeError, ReconciledCallSet, strand_symbol};

/// Write a call set in GFF format
pub fn write_gff_format<W: Write>(writer: &mut W, set: &ReconciledCallSet) -> Result<(), CallmergeError> {
    writeln!(writer, "##gff-version 3")?;
    writeln!(
        writer,
        "# callmerge version={} genome={} policy={} calls={}",
        VERSION,
        set.genome,
        set.policy,
        set.len()
    )?;

    for (index, call) in set.calls.iter().enumerate() {
        let score = call
            .record
            .confidence
            .map_or_else(|| ".".to_string(), |score| format!("{score:.1}"));
        let callers: Vec<&str> = call.contributors.iter().map(|caller| caller.as_str()).collect();

        writeln!(
            writer,
            "{}\t{}_v{}\tCDS\t{}\t{}\t{}\t{}\t0\tID={}_{};callers={};policy={}",
            call.record.contig,
            GFF_SOURCE,
            VERSION,
            call.record.start,
            call.record.end,
            score,
            strand_symbol(call.record.strand),
            set.genome,
            index + 1,
            callers.join(","),
            set.policy
        )?;
    }
    Ok(())
}
