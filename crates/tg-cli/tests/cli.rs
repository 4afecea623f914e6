use assert_cmd::Command;
use predicates::prelude::*;

fn tiled_gemm() -> Command {
    let mut cmd = Command::cargo_bin("tiled-gemm").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_subcommands() {
    let out = tiled_gemm()
        .arg("--help")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let s = String::from_utf8(out).unwrap();
    for needle in ["gemm", "local-check", "iota", "--compute-units"] {
        assert!(s.contains(needle), "help missing `{needle}`");
    }
}

#[test]
fn gemm_single_group_succeeds() {
    tiled_gemm()
        .args(["gemm", "-n", "8", "-b", "8"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SUCCESS - all 64 elements match"));
}

#[test]
fn gemm_with_hazard_checks_succeeds() {
    tiled_gemm()
        .args(["--check-hazards", "--compute-units", "2"])
        .args(["gemm", "-n", "16", "-b", "4", "--dtype", "f64"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SUCCESS"));
}

#[test]
fn gemm_serial_backend_succeeds() {
    tiled_gemm()
        .args(["gemm", "-n", "12", "--backend", "serial"])
        .assert()
        .success()
        .stdout(predicate::str::contains("serial backend"));
}

#[test]
fn gemm_rejects_indivisible_tile() {
    tiled_gemm()
        .args(["gemm", "-n", "6", "-b", "4"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("SUCCESS").not());
}

#[test]
fn gemm_rejects_oversized_group() {
    tiled_gemm()
        .args(["--max-work-group-size", "16", "gemm", "-n", "16", "-b", "8"])
        .assert()
        .failure();
}

#[test]
fn local_check_succeeds() {
    tiled_gemm()
        .args(["local-check", "--global", "256", "--local", "64"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "SUCCESS - 256 work-items read back their own id",
        ))
        .stdout(predicate::str::contains("unexpected value").not());
}

#[test]
fn iota_prints_every_index() {
    tiled_gemm()
        .args(["iota", "--global", "8", "--local", "4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("A[ 0 ] = 0"))
        .stdout(predicate::str::contains("A[ 7 ] = 7"))
        .stdout(predicate::str::contains("A[ 8 ]").not());
}

#[test]
fn iota_rejects_indivisible_range() {
    tiled_gemm()
        .args(["iota", "--global", "10", "--local", "4"])
        .assert()
        .failure();
}
