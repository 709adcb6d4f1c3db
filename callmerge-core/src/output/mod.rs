//! Output formatting for reconciled call sets.
//!
//! This module provides writers for converting a [`ReconciledCallSet`] into
//! the persisted tabular artifact or a GFF3 export, and the reader that
//! loads the tabular artifact back when a later stage resumes.
//!
//! ## Supported Formats
//!
//! - **Tabular**: `contig start end strand frame callers`, re-parseable with
//!   [`read_reconciled`]
//! - **GFF3**: General Feature Format version 3, one `CDS` per call
//!
//! ## Examples
//!
//! ```rust
//! use bio::bio_types::strand::Strand;
//! use callmerge_core::config::{CallPolicy, OutputFormat};
//! use callmerge_core::output::{read_reconciled, write_reconciled};
//! use callmerge_core::types::{Caller, GeneCallRecord, ReconciledCall, ReconciledCallSet};
//!
//! let set = ReconciledCallSet {
//!     genome: "phiX".to_string(),
//!     policy: CallPolicy::Consensus,
//!     calls: vec![ReconciledCall {
//!         record: GeneCallRecord::new("phiX", 100, 500, Strand::Forward, Caller::Prodigal),
//!         contributors: vec![Caller::Prodigal, Caller::Glimmer],
//!     }],
//! };
//!
//! let mut buffer = Vec::new();
//! write_reconciled(&mut buffer, &set, OutputFormat::Tabular)?;
//!
//! let loaded = read_reconciled(buffer.as_slice())?;
//! assert_eq!(loaded.calls[0].contributors, set.calls[0].contributors);
//! # Ok::<(), callmerge_core::types::CallmergeError>(())
//! ```

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;

use crate::config::OutputFormat;
use crate::types::{CallmergeError, ReconciledCallSet};

mod formats {
    pub mod gff;
    pub mod tsv;
}

pub use formats::tsv::read_reconciled;
use formats::{gff::write_gff_format, tsv::write_tsv_format};

/// Writes a reconciled call set in the specified format.
///
/// # Errors
///
/// Returns [`CallmergeError::IoError`] if writing fails.
pub fn write_reconciled<W: Write>(
    writer: &mut W,
    set: &ReconciledCallSet,
    format: OutputFormat,
) -> Result<(), CallmergeError> {
    match format {
        OutputFormat::Tabular => write_tsv_format(writer, set),
        OutputFormat::Gff => write_gff_format(writer, set),
    }
}

/// Load a persisted tabular call set from disk.
pub fn load_reconciled(path: &Path) -> Result<ReconciledCallSet, CallmergeError> {
    let file = File::open(path)?;
    read_reconciled(BufReader::new(file)).map_err(|err| match err {
        CallmergeError::ParseError(message) => {
            CallmergeError::ParseError(format!("{}: {message}", path.display()))
        }
        other => other,
    })
}

/// Render a call set to a string, for callers that need the bytes up front.
pub fn render_reconciled(set: &ReconciledCallSet, format: OutputFormat) -> Result<String, CallmergeError> {
    let mut buffer = Vec::new();
    write_reconciled(&mut buffer, set, format)?;
    String::from_utf8(buffer).map_err(|e| CallmergeError::ParseError(e.to_string()))
}
