use std::io::{BufRead, Write};

use bio::bio_types::strand::Strand;

use crate::config::CallPolicy;
use crate::constants::VERSION;
use crate::types::{
    CallmergeError, Caller, GeneCallRecord, ReconciledCall, ReconciledCallSet, strand_from_symbol,
    strand_symbol,
};

const COLUMNS: &str = "#contig\tstart\tend\tstrand\tframe\tcallers";

/// Write a call set in the tabular format
pub fn write_tsv_format<W: Write>(writer: &mut W, set: &ReconciledCallSet) -> Result<(), CallmergeError> {
    writeln!(
        writer,
        "# callmerge version={} genome={} policy={}",
        VERSION, set.genome, set.policy
    )?;
    writeln!(writer, "{COLUMNS}")?;

    for call in &set.calls {
        let callers: Vec<&str> = call.contributors.iter().map(|caller| caller.as_str()).collect();
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}",
            call.record.contig,
            call.record.start,
            call.record.end,
            strand_symbol(call.record.strand),
            call.record.frame,
            callers.join(",")
        )?;
    }
    Ok(())
}

/// Parse the tabular format written by [`write_tsv_format`].
///
/// Unlike the caller adapters this reader is strict: the file is a pipeline
/// artifact, so any malformed line is an error naming the line number.
pub fn read_reconciled<R: BufRead>(reader: R) -> Result<ReconciledCallSet, CallmergeError> {
    let mut header: Option<(String, CallPolicy)> = None;
    let mut calls = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let number = index + 1;
        if line.trim().is_empty() {
            continue;
        }
        if let Some(comment) = line.strip_prefix("# callmerge ") {
            header = Some(parse_header(comment, number)?);
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        if header.is_none() {
            return Err(parse_error(number, "record before the callmerge header"));
        }
        calls.push(parse_row(&line, number)?);
    }

    let (genome, policy) = header.ok_or_else(|| parse_error(0, "missing callmerge header"))?;
    Ok(ReconciledCallSet {
        genome,
        policy,
        calls,
    })
}

fn parse_error(line: usize, message: impl AsRef<str>) -> CallmergeError {
    CallmergeError::ParseError(format!("line {line}: {}", message.as_ref()))
}

fn parse_header(comment: &str, number: usize) -> Result<(String, CallPolicy), CallmergeError> {
    let mut genome = None;
    let mut policy = None;
    for pair in comment.split_whitespace() {
        match pair.split_once('=') {
            Some(("genome", value)) => genome = Some(value.to_string()),
            Some(("policy", value)) => {
                policy = Some(
                    value
                        .parse::<CallPolicy>()
                        .map_err(|_| parse_error(number, format!("unknown policy '{value}'")))?,
                );
            }
            _ => {}
        }
    }
    match (genome, policy) {
        (Some(genome), Some(policy)) => Ok((genome, policy)),
        _ => Err(parse_error(number, "header needs genome= and policy=")),
    }
}

fn parse_row(line: &str, number: usize) -> Result<ReconciledCall, CallmergeError> {
    let fields: Vec<&str> = line.split('\t').collect();
    let [contig, start, end, strand, frame, callers] = fields.as_slice() else {
        return Err(parse_error(
            number,
            format!("expected 6 tab-separated columns, found {}", fields.len()),
        ));
    };

    let coordinate = |field: &str, name: &str| {
        field
            .parse::<u64>()
            .map_err(|_| parse_error(number, format!("invalid {name} '{field}'")))
    };
    let start = coordinate(*start, "start")?;
    let end = coordinate(*end, "end")?;
    let strand = match strand_from_symbol(strand) {
        Strand::Unknown => return Err(parse_error(number, format!("invalid strand '{strand}'"))),
        known => known,
    };
    let frame = frame
        .parse::<u8>()
        .ok()
        .filter(|frame| (1..=3).contains(frame))
        .ok_or_else(|| parse_error(number, format!("invalid frame '{frame}'")))?;
    let contributors = callers
        .split(',')
        .map(|name| {
            name.parse::<Caller>()
                .map_err(|_| parse_error(number, format!("unknown caller '{name}'")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let record = GeneCallRecord {
        contig: (*contig).to_string(),
        start,
        end,
        strand,
        frame,
        caller: contributors[0],
        confidence: None,
    };
    record
        .validate()
        .map_err(|err| parse_error(number, err.to_string()))?;
    Ok(ReconciledCall {
        record,
        contributors,
    })
}
