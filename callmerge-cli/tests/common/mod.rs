#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;

pub const PRODIGAL_GFF: &str = "##gff-version  3
# Sequence Data: seqnum=1;seqlen=5386;seqhdr=\"phiX\"
phiX\tProdigal_v2.6.3\tCDS\t100\t500\t12.5\t+\t0\tID=1_1;partial=00
phiX\tProdigal_v2.6.3\tCDS\t700\t900\t3.1\t+\t0\tID=1_2;partial=00
";

pub const GLIMMER_PREDICT: &str = ">phiX
orf00001      102      500  +3     4.20
";

pub const PHANOTATE_TABLE: &str = "#id:\tphiX
#START\tSTOP\tFRAME\tCONTIG\tSCORE
100\t498\t+\tphiX\t-1.5e+02
";

/// The `callmerge` binary under test.
pub fn callmerge() -> Command {
    Command::cargo_bin("callmerge").unwrap()
}

/// Write the three caller outputs under their pipeline file names.
pub fn write_caller_outputs(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("prodigal.gff"), PRODIGAL_GFF).unwrap();
    fs::write(dir.join("glimmer.predict"), GLIMMER_PREDICT).unwrap();
    fs::write(dir.join("phanotate.tsv"), PHANOTATE_TABLE).unwrap();
}

/// Set up a genome's FASTA and raw caller outputs; returns its output directory.
pub fn write_genome(root: &Path, name: &str) -> PathBuf {
    let output_dir = root.join("out").join(name);
    write_caller_outputs(&output_dir);
    fs::write(
        root.join(format!("{name}.fasta")),
        format!(">{name}\nGAGTTTTATCGCTTCCATGACGCAGAAGTTAACACTTTCGGATATTTCTGATGAGTCGAAAAATTATCTTG\n"),
    )
    .unwrap();
    output_dir
}

/// Write a run file for `genomes` with stage commands that leave the
/// expected artifacts behind. `extra` is spliced into the JSON object.
pub fn write_run_file(root: &Path, genomes: &[&str], extra: &str) -> PathBuf {
    let entries: Vec<String> = genomes
        .iter()
        .map(|name| {
            format!(
                r#"{{"name": "{name}", "species": "phage", "fasta": "{}", "output_dir": "{}"}}"#,
                root.join(format!("{name}.fasta")).display(),
                root.join("out").join(name).display()
            )
        })
        .collect();

    let run = format!(
        r#"{{
    "genomes": [{}],
    "prodigal_calls": true,
    "glimmer_calls": true,
    "phanotate_calls": true,
    "primary_calls": "consensus",
    "boundary_tolerance": 5,
    "phate_threads": 2,
    "cgp_threads": 0,
    "custom_calls_dir": "{}",
    "checkpoint_dir": "{}",
    "commands": {{
        "annotate": "cut -f1-3 {{reconciled}} > {{output_dir}}/{{genome}}.annotation.tsv",
        "compare": "mkdir -p {{output_dir}}/CGP_RESULTS && echo {{peers}} > {{output_dir}}/CGP_RESULTS/peers.txt",
        "genomics": "mkdir -p {{output_dir}}/GENOMICS_RESULTS && wc -l < {{reconciled}} > {{output_dir}}/GENOMICS_RESULTS/lines.txt"
    }}{extra}
}}"#,
        entries.join(", "),
        root.join("input").display(),
        root.join("checkpoints").display()
    );
    let path = root.join("run.json");
    fs::write(&path, run).unwrap();
    path
}

/// Make output stable for snapshots: fixed version, tabs as spaces.
pub fn normalize_output(s: &str) -> String {
    s.replace(env!("CARGO_PKG_VERSION"), "[VERSION]")
        .replace('\t', " ")
        .trim_end()
        .to_string()
}
