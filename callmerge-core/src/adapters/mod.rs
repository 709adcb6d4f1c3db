//! Caller adapters: normalize raw gene-caller output into [`GeneCallSet`]s.
//!
//! Each supported output dialect has a reader under `formats`. Readers never
//! fail on a bad line; they count it in [`GeneCallSet::unparsed`] and move on.
//! Records that parse but break the schema (inverted coordinates, missing
//! strand) are passed through for the reconciler to reject.
//!
//! ## Supported Formats
//!
//! - **GFF3**: Prodigal `-f gff`, GeneMarkS, custom `<genome>.custom.gff`
//! - **Glimmer predict**: Glimmer3 `.predict` files
//! - **PHANOTATE**: PHANOTATE tabular output
//! - **SCO**: Prodigal simple coordinate output
//!
//! ## Examples
//!
//! ```rust
//! use callmerge_core::adapters::{CallerAdapter, RawFormat};
//! use callmerge_core::types::Caller;
//!
//! let gff = "##gff-version 3\nphiX\tProdigal_v2.6.3\tCDS\t100\t500\t12.5\t+\t0\tID=1_1\n";
//! let adapter = CallerAdapter::new(Caller::Prodigal, RawFormat::Gff);
//! let set = adapter.parse(gff.as_bytes())?;
//!
//! assert_eq!(set.len(), 1);
//! assert_eq!(set.records[0].start, 100);
//! # Ok::<(), callmerge_core::types::CallmergeError>(())
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{debug, warn};

use crate::types::{CallmergeError, Caller, GeneCallSet};

mod formats {
    pub mod glimmer;
    pub mod gff;
    pub mod phanotate;
    pub mod sco;
}

use formats::{
    gff::read_gff_calls, glimmer::read_glimmer_calls, phanotate::read_phanotate_calls,
    sco::read_sco_calls,
};

/// Raw output dialects understood by the adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawFormat {
    Gff,
    GlimmerPredict,
    PhanotateTable,
    Sco,
}

impl RawFormat {
    /// Pick a dialect from the file extension, falling back to the caller's native one.
    #[must_use]
    pub fn detect(caller: Caller, path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("gff" | "gff3") => Self::Gff,
            Some("predict") => Self::GlimmerPredict,
            Some("sco") => Self::Sco,
            _ => Self::native(caller),
        }
    }

    /// Format a caller writes when run by the pipeline.
    #[must_use]
    pub const fn native(caller: Caller) -> Self {
        match caller {
            Caller::Prodigal | Caller::Genemarks | Caller::Custom => Self::Gff,
            Caller::Glimmer => Self::GlimmerPredict,
            Caller::Phanotate => Self::PhanotateTable,
        }
    }
}

/// File name a caller's raw output is collected from, under the genome's
/// output directory. Custom calls live elsewhere, see
/// [`RunConfig::custom_calls_path`](crate::config::RunConfig::custom_calls_path).
#[must_use]
pub const fn raw_output_file(caller: Caller) -> &'static str {
    match caller {
        Caller::Phanotate => "phanotate.tsv",
        Caller::Genemarks => "genemarks.gff",
        Caller::Prodigal => "prodigal.gff",
        Caller::Glimmer => "glimmer.predict",
        Caller::Custom => "custom.gff",
    }
}

/// Normalizes one caller's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerAdapter {
    pub caller: Caller,
    pub format: RawFormat,
}

impl CallerAdapter {
    #[must_use]
    pub const fn new(caller: Caller, format: RawFormat) -> Self {
        Self { caller, format }
    }

    /// Adapter for the caller's native output format.
    #[must_use]
    pub const fn native(caller: Caller) -> Self {
        Self::new(caller, RawFormat::native(caller))
    }

    /// Parse raw caller output.
    ///
    /// # Errors
    ///
    /// Only I/O errors are returned; malformed lines are counted instead.
    pub fn parse<R: BufRead>(&self, reader: R) -> Result<GeneCallSet, CallmergeError> {
        let set = match self.format {
            RawFormat::Gff => read_gff_calls(reader, self.caller)?,
            RawFormat::GlimmerPredict => read_glimmer_calls(reader, self.caller)?,
            RawFormat::PhanotateTable => read_phanotate_calls(reader, self.caller)?,
            RawFormat::Sco => read_sco_calls(reader, self.caller)?,
        };
        if set.unparsed > 0 {
            warn!(
                caller = %self.caller,
                unparsed = set.unparsed,
                "skipped unparseable lines in caller output"
            );
        }
        debug!(caller = %self.caller, calls = set.len(), "parsed caller output");
        Ok(set)
    }

    /// Parse a caller output file.
    pub fn load(&self, path: &Path) -> Result<GeneCallSet, CallmergeError> {
        let file = File::open(path)?;
        self.parse(BufReader::new(file))
    }
}

/// Split a data line into fields on tabs, or on any whitespace when the line has no tabs.
pub(crate) fn split_fields(line: &str) -> Vec<&str> {
    if line.contains('\t') {
        line.split('\t').map(str::trim).collect()
    } else {
        line.split_whitespace().collect()
    }
}

/// Parse a coordinate, tolerating partial-gene markers such as `<1` or `>2000`.
pub(crate) fn parse_coordinate(field: &str) -> Option<u64> {
    field.trim().trim_start_matches(['<', '>']).parse().ok()
}
