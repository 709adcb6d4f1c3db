mod common;

use std::fs;

use predicates::prelude::*;
use tempfile::TempDir;

use crate::common::{callmerge, write_genome, write_run_file};

#[test]
fn run_reaches_genomics_for_every_genome() {
    let dir = TempDir::new().unwrap();
    let phix = write_genome(dir.path(), "phiX");
    let t7 = write_genome(dir.path(), "T7");
    let run_file = write_run_file(dir.path(), &["phiX", "T7"], "");

    callmerge()
        .arg("run")
        .arg("-c")
        .arg(&run_file)
        .assert()
        .success()
        .stdout(predicate::str::contains("phiX\tGENOMICS_DONE"))
        .stdout(predicate::str::contains("T7\tGENOMICS_DONE"));

    let reconciled = fs::read_to_string(phix.join("phiX.reconciled.tsv")).unwrap();
    assert!(reconciled.contains("phiX\t100\t500\t+\t1\tprodigal,glimmer,phanotate"));
    assert!(phix.join("phiX.reconciled.gff").exists());
    assert!(phix.join("phiX.annotation.tsv").exists());

    let peers = fs::read_to_string(t7.join("CGP_RESULTS/peers.txt")).unwrap();
    assert!(peers.trim().ends_with("phiX.reconciled.tsv"));
    assert!(t7.join("GENOMICS_RESULTS/lines.txt").exists());
}

#[test]
fn status_reports_recorded_stages() {
    let dir = TempDir::new().unwrap();
    write_genome(dir.path(), "phiX");
    let run_file = write_run_file(dir.path(), &["phiX"], "");

    callmerge()
        .arg("status")
        .arg("-c")
        .arg(&run_file)
        .assert()
        .success()
        .stdout(predicate::str::contains("phiX\tPENDING\t-"));

    callmerge().arg("run").arg("-c").arg(&run_file).assert().success();

    callmerge()
        .arg("status")
        .arg("-c")
        .arg(&run_file)
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"phiX\tGENOMICS_DONE\t\d{4}-\d{2}-\d{2}T").unwrap());
}

#[test]
fn second_run_is_up_to_date() {
    let dir = TempDir::new().unwrap();
    let phix = write_genome(dir.path(), "phiX");
    let run_file = write_run_file(dir.path(), &["phiX"], "");
    callmerge().arg("run").arg("-c").arg(&run_file).assert().success();

    // Nothing may be recomputed: a rerun would recreate the annotation.
    fs::remove_file(phix.join("phiX.annotation.tsv")).unwrap();
    callmerge()
        .arg("run")
        .arg("-c")
        .arg(&run_file)
        .assert()
        .success()
        .stderr(predicate::str::contains("genome is up to date"));
    assert!(!phix.join("phiX.annotation.tsv").exists());
}

#[test]
fn failed_genome_fails_the_run_but_not_its_peers() {
    let dir = TempDir::new().unwrap();
    write_genome(dir.path(), "phiX");
    write_genome(dir.path(), "T7");
    fs::remove_file(dir.path().join("T7.fasta")).unwrap();
    let run_file = write_run_file(dir.path(), &["phiX", "T7"], "");

    callmerge()
        .arg("run")
        .arg("-c")
        .arg(&run_file)
        .assert()
        .failure()
        .stdout(predicate::str::contains("phiX\tGENOMICS_DONE"))
        .stdout(predicate::str::contains("T7\tPENDING\tFAILED: Missing prerequisite artifact"))
        .stderr(predicate::str::contains("1 of 2 genomes failed"));
}

#[test]
fn skip_flag_without_reconciled_calls_is_a_missing_prerequisite() {
    let dir = TempDir::new().unwrap();
    write_genome(dir.path(), "phiX");
    let run_file = write_run_file(dir.path(), &["phiX"], r#", "checkpoint_phate": "True""#);

    callmerge()
        .arg("run")
        .arg("-c")
        .arg(&run_file)
        .assert()
        .failure()
        .stdout(predicate::str::contains("phiX\tGENECALL_DONE\tFAILED"))
        .stdout(predicate::str::contains("phiX.reconciled.tsv"));
}

#[test]
fn missing_database_aborts_the_run() {
    let dir = TempDir::new().unwrap();
    let phix = write_genome(dir.path(), "phiX");
    let extra = format!(
        r#", "check_databases": true, "databases": [{{"name": "pvogs", "path": "{}"}}]"#,
        dir.path().join("db/pvogs").display()
    );
    let run_file = write_run_file(dir.path(), &["phiX"], &extra);

    callmerge()
        .arg("run")
        .arg("-c")
        .arg(&run_file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("pvogs"));
    assert!(!phix.join("phiX.reconciled.tsv").exists());
}

#[test]
fn conflicting_checkpoint_flags_are_a_configuration_error() {
    let dir = TempDir::new().unwrap();
    write_genome(dir.path(), "phiX");
    let run_file = write_run_file(
        dir.path(),
        &["phiX"],
        r#", "checkpoint_phate": true, "checkpoint_cgp": true"#,
    );

    callmerge()
        .arg("run")
        .arg("-c")
        .arg(&run_file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("mutually exclusive"));
}
