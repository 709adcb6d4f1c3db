//! Stage work backed by external shell commands.
//!
//! Each configured template runs through `sh -c` after placeholder
//! substitution. Path values are single-quoted for the shell.
//!
//! | placeholder | value |
//! |---|---|
//! | `{genome}` | genome name |
//! | `{species}` | species label |
//! | `{fasta}` | genome FASTA path |
//! | `{output_dir}` | genome output directory |
//! | `{reconciled}` | persisted reconciled call set |
//! | `{caller}` | gene caller being run (gene calling only) |
//! | `{peers}` | peers' reconciled call sets, space separated (comparison only) |
//! | `{gene_cutoff}`, `{protein_cutoff}` | identity cutoffs (comparison only) |

use std::io::ErrorKind;
use std::process::Command;

use tracing::debug;

use super::artifacts::ArtifactPaths;
use super::work::{ComparativeMatcher, Peer, StageWork};
use crate::config::{IdentityCutoffs, StageCommands};
use crate::types::{CallmergeError, Caller, GenomeDescriptor, ReconciledCallSet};

/// Lines of stderr carried into a failure message.
const STDERR_TAIL_LINES: usize = 5;

/// Quote a value for a POSIX shell.
#[must_use]
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Substitute `{key}` placeholders; unknown placeholders are left as written.
#[must_use]
pub fn expand_template(template: &str, values: &[(&str, String)]) -> String {
    values.iter().fold(template.to_string(), |command, (key, value)| {
        command.replace(&format!("{{{key}}}"), value)
    })
}

fn genome_values(genome: &GenomeDescriptor) -> Vec<(&'static str, String)> {
    let paths = ArtifactPaths::for_genome(genome);
    vec![
        ("genome", shell_quote(&genome.name)),
        ("species", shell_quote(&genome.species)),
        ("fasta", shell_quote(&genome.fasta.to_string_lossy())),
        ("output_dir", shell_quote(&genome.output_dir.to_string_lossy())),
        ("reconciled", shell_quote(&paths.reconciled.to_string_lossy())),
    ]
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|line| !line.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n")
}

/// Run one expanded command line, failing on a non-zero exit.
fn run_shell(tool: &str, command: &str) -> Result<(), CallmergeError> {
    debug!(tool, command, "running stage command");
    let output = Command::new("sh").arg("-c").arg(command).output().map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            CallmergeError::external(tool, "no shell found to run the stage command")
        } else {
            CallmergeError::external(tool, format!("could not start '{command}': {e}"))
        }
    })?;

    if output.status.success() {
        return Ok(());
    }
    let status = output
        .status
        .code()
        .map_or_else(|| "terminated by signal".to_string(), |code| format!("exit status {code}"));
    let tail = stderr_tail(&output.stderr);
    let message = if tail.is_empty() {
        status
    } else {
        format!("{status}: {tail}")
    };
    Err(CallmergeError::external(tool, message))
}

/// [`StageWork`] and [`ComparativeMatcher`] over the run file's `commands`.
#[derive(Debug, Clone, Default)]
pub struct CommandHooks {
    commands: StageCommands,
}

impl CommandHooks {
    #[must_use]
    pub const fn new(commands: StageCommands) -> Self {
        Self { commands }
    }
}

fn configured<'a>(template: Option<&'a String>, tool: &str) -> Result<&'a str, CallmergeError> {
    template
        .map(String::as_str)
        .ok_or_else(|| CallmergeError::external(tool, format!("no {tool} command configured")))
}

impl StageWork for CommandHooks {
    fn run_caller(&self, genome: &GenomeDescriptor, caller: Caller) -> Result<(), CallmergeError> {
        // Without a gene-calling command, caller output is expected to be in place already.
        let Some(template) = self.commands.genecall.as_deref() else {
            return Ok(());
        };
        let mut values = genome_values(genome);
        values.push(("caller", caller.as_str().to_string()));
        run_shell(caller.as_str(), &expand_template(template, &values))
    }

    fn annotate(&self, genome: &GenomeDescriptor, _calls: &ReconciledCallSet) -> Result<(), CallmergeError> {
        let template = configured(self.commands.annotate.as_ref(), "annotate")?;
        run_shell("annotate", &expand_template(template, &genome_values(genome)))
    }

    fn genomics(&self, genome: &GenomeDescriptor, _calls: &ReconciledCallSet) -> Result<(), CallmergeError> {
        let template = configured(self.commands.genomics.as_ref(), "genomics")?;
        run_shell("genomics", &expand_template(template, &genome_values(genome)))
    }
}

impl ComparativeMatcher for CommandHooks {
    fn compare(
        &self,
        subject: &GenomeDescriptor,
        _calls: &ReconciledCallSet,
        peers: &[Peer<'_>],
        cutoffs: IdentityCutoffs,
    ) -> Result<(), CallmergeError> {
        let template = configured(self.commands.compare.as_ref(), "compare")?;
        let peer_paths = peers
            .iter()
            .map(|peer| {
                let path = ArtifactPaths::for_genome(peer.genome).reconciled;
                shell_quote(&path.to_string_lossy())
            })
            .collect::<Vec<_>>()
            .join(" ");

        let mut values = genome_values(subject);
        values.push(("peers", peer_paths));
        values.push(("gene_cutoff", cutoffs.gene.to_string()));
        values.push(("protein_cutoff", cutoffs.protein.to_string()));
        run_shell("compare", &expand_template(template, &values))
    }
}
