mod common;

use std::fs;

use insta::assert_snapshot;
use predicates::prelude::*;
use tempfile::TempDir;

use crate::common::{callmerge, normalize_output, write_caller_outputs};

fn reconcile_output(policy: &str, extra: &[&str]) -> String {
    let dir = TempDir::new().unwrap();
    write_caller_outputs(dir.path());

    let mut cmd = callmerge();
    cmd.arg("reconcile")
        .arg("--call")
        .arg(format!("prodigal={}", dir.path().join("prodigal.gff").display()))
        .arg("--call")
        .arg(format!("glimmer={}", dir.path().join("glimmer.predict").display()))
        .arg("--call")
        .arg(format!("phanotate={}", dir.path().join("phanotate.tsv").display()))
        .args(["--name", "phiX", "--tolerance", "5", "--policy", policy])
        .args(extra);
    let output = cmd.assert().success().get_output().stdout.clone();
    normalize_output(&String::from_utf8(output).unwrap())
}

#[test]
fn consensus_merges_three_callers_into_one_call() {
    assert_snapshot!(reconcile_output("consensus", &[]), @r"
    # callmerge version=[VERSION] genome=phiX policy=consensus
    #contig start end strand frame callers
    phiX 100 500 + 1 prodigal,glimmer,phanotate
    ");
}

#[test]
fn superset_keeps_single_caller_calls() {
    assert_snapshot!(reconcile_output("superset", &[]), @r"
    # callmerge version=[VERSION] genome=phiX policy=superset
    #contig start end strand frame callers
    phiX 100 500 + 1 prodigal,glimmer,phanotate
    phiX 700 900 + 1 prodigal
    ");
}

#[test]
fn primary_caller_output_is_passed_through() {
    assert_snapshot!(reconcile_output("glimmer", &[]), @r"
    # callmerge version=[VERSION] genome=phiX policy=primary:glimmer
    #contig start end strand frame callers
    phiX 102 500 + 3 glimmer
    ");
}

#[test]
fn gff_export() {
    assert_snapshot!(reconcile_output("commoncore", &["-f", "gff"]), @r"
    ##gff-version 3
    # callmerge version=[VERSION] genome=phiX policy=commoncore calls=1
    phiX callmerge_v[VERSION] CDS 100 500 12.5 + 0 ID=phiX_1;callers=prodigal,glimmer,phanotate;policy=commoncore
    ");
}

#[test]
fn zero_tolerance_keeps_callers_apart() {
    let dir = TempDir::new().unwrap();
    write_caller_outputs(dir.path());

    callmerge()
        .arg("reconcile")
        .arg("--call")
        .arg(format!("prodigal={}", dir.path().join("prodigal.gff").display()))
        .arg("--call")
        .arg(format!("glimmer={}", dir.path().join("glimmer.predict").display()))
        .args(["--policy", "commoncore"])
        .assert()
        .success()
        .stdout(predicate::str::contains("prodigal,glimmer").not());
}

#[test]
fn writes_output_file() {
    let dir = TempDir::new().unwrap();
    write_caller_outputs(dir.path());
    let out = dir.path().join("phiX.reconciled.tsv");

    callmerge()
        .arg("reconcile")
        .arg("--call")
        .arg(format!("prodigal={}", dir.path().join("prodigal.gff").display()))
        .arg("-o")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let written = fs::read_to_string(&out).unwrap();
    assert!(written.starts_with("# callmerge version="));
    assert_eq!(written.lines().count(), 4);
}

#[test]
fn unknown_policy_is_rejected() {
    let dir = TempDir::new().unwrap();
    write_caller_outputs(dir.path());

    callmerge()
        .arg("reconcile")
        .arg("--call")
        .arg(format!("prodigal={}", dir.path().join("prodigal.gff").display()))
        .args(["--policy", "majority"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown reconciliation policy 'majority'"));
}

#[test]
fn malformed_call_argument_is_rejected() {
    callmerge()
        .args(["reconcile", "--call", "prodigal.gff"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("CALLER=FILE"));
}

#[test]
fn missing_caller_file_names_the_path() {
    callmerge()
        .args(["reconcile", "--call", "prodigal=/nonexistent/prodigal.gff"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("/nonexistent/prodigal.gff"));
}
