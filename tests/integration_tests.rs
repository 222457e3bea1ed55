use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::str::{contains, diff};

fn xpire() -> Command {
    let mut cmd = Command::cargo_bin("xpire").unwrap();
    cmd.env_remove("XPIRE_TRACE").env_remove("XPIRE_MAX_STEPS");
    cmd
}

/// Scratch file unique to one test.
fn scratch(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("xpire-{}-{name}", std::process::id()))
}

#[test]
fn runs_without_arguments() {
    xpire().assert().success();
}

#[test]
fn runs_sum() {
    let mut cmd = xpire();
    cmd.arg("run").arg("tests/files/sum.asm").arg("--minimal");
    cmd.assert().success().stdout(diff(
        "A=37 B=00 C=00 D=00 E=00 H=00 L=00 SP=0000 PC=000D .ZAP.\n",
    ));
}

#[test]
fn runs_bare_path() {
    let mut cmd = xpire();
    cmd.arg("tests/files/sum.asm");
    cmd.assert()
        .success()
        .stdout(contains("Assembling"))
        .stdout(contains("Halted"));
}

#[test]
fn runs_subroutines_and_stack() {
    let mut cmd = xpire();
    cmd.arg("run").arg("tests/files/stack.asm").arg("--minimal");
    cmd.assert().success().stdout(diff(
        "A=12 B=12 C=34 D=12 E=34 H=12 L=03 SP=0021 PC=000C ....C\n",
    ));
}

#[test]
fn runs_cpm_hello_world() {
    let mut cmd = xpire();
    cmd.arg("run")
        .arg("tests/files/hw.asm")
        .arg("--cpm")
        .arg("--minimal");
    cmd.assert().success().stdout(diff("Hello, world!"));
}

#[test]
fn runs_cpm_com_image() {
    let path = scratch("hw.com");
    // LXI D,010Ah; MVI C,9; CALL 5; RST 0; "ok$"
    fs::write(
        &path,
        [0x11, 0x0A, 0x01, 0x0E, 0x09, 0xCD, 0x05, 0x00, 0xC7, 0x00, b'o', b'k', b'$'],
    )
    .unwrap();
    let mut cmd = xpire();
    cmd.arg("run").arg(&path).arg("--cpm").arg("--minimal");
    cmd.assert().success().stdout(diff("ok"));
    fs::remove_file(path).unwrap();
}

#[test]
fn cpm_source_needs_origin() {
    let mut cmd = xpire();
    cmd.arg("run").arg("tests/files/sum.asm").arg("--cpm");
    cmd.assert().failure().stderr(contains("ORG 100h"));

    let mut cmd = xpire();
    cmd.arg("run").arg("tests/files/no_origin.asm").arg("--cpm");
    cmd.assert().failure().stderr(contains("ORG 100h"));
}

#[test]
fn bounded_run_stops() {
    let mut cmd = xpire();
    cmd.arg("run")
        .arg("tests/files/spin.asm")
        .arg("--max-steps")
        .arg("100");
    cmd.assert()
        .success()
        .stdout(contains("Stopped"))
        .stdout(contains("after 100 instructions"));
}

#[test]
fn step_budget_from_environment() {
    let mut cmd = xpire();
    cmd.env("XPIRE_MAX_STEPS", "25")
        .arg("run")
        .arg("tests/files/spin.asm");
    cmd.assert()
        .success()
        .stdout(contains("after 25 instructions"));

    let mut cmd = xpire();
    cmd.env("XPIRE_MAX_STEPS", "many")
        .arg("run")
        .arg("tests/files/spin.asm");
    cmd.assert().failure().stderr(contains("XPIRE_MAX_STEPS"));
}

#[test]
fn traces_instructions() {
    let mut cmd = xpire();
    cmd.env("XPIRE_TRACE", "1")
        .arg("run")
        .arg("tests/files/sum.asm")
        .arg("--minimal");
    cmd.assert()
        .success()
        .stderr(contains("0000  3E  MVI A,0x00"))
        .stderr(contains("ADD B"))
        .stderr(contains("HLT"));
}

#[test]
fn compiles_image() {
    let dest = scratch("sum.bin");
    let mut cmd = xpire();
    cmd.arg("compile").arg("tests/files/sum.asm").arg(&dest);
    cmd.assert().success().stdout(contains("Saved"));

    let image = fs::read(&dest).unwrap();
    assert_eq!(
        image,
        vec![
            0x3E, 0x00, // MVI A,0
            0x06, 0x0A, // MVI B,10
            0x80, // ADD B
            0x05, // DCR B
            0xC2, 0x04, 0x00, // JNZ loop
            0x32, 0x0D, 0x00, // STA result
            0x76, // HLT
            0x00, // result
        ]
    );

    // The compiled image runs the same as the source
    let mut cmd = xpire();
    cmd.arg("run").arg(&dest).arg("--minimal");
    cmd.assert().success().stdout(diff(
        "A=37 B=00 C=00 D=00 E=00 H=00 L=00 SP=0000 PC=000D .ZAP.\n",
    ));
    fs::remove_file(dest).unwrap();
}

#[test]
fn checks_valid_source() {
    let mut cmd = xpire();
    cmd.arg("check").arg("tests/files/stack.asm");
    cmd.assert().success().stdout(contains("no errors found"));
}

#[test]
fn reports_undefined_label() {
    let mut cmd = xpire();
    cmd.arg("check").arg("tests/files/undefined.asm");
    cmd.assert()
        .failure()
        .stderr(contains("undefined label `nowhere` on line 2"));
}

#[test]
fn reports_duplicate_label() {
    let mut cmd = xpire();
    cmd.arg("check").arg("tests/files/duplicate.asm");
    cmd.assert()
        .failure()
        .stderr(contains("already defined on line 1"));
}

#[test]
fn reports_invalid_opcode() {
    let path = scratch("invalid.bin");
    fs::write(&path, [0x00, 0x08]).unwrap();
    let mut cmd = xpire();
    cmd.arg("run").arg(&path).arg("--minimal");
    cmd.assert()
        .failure()
        .stderr(contains("invalid opcode 0x08 at 0x0001"));
    fs::remove_file(path).unwrap();
}

#[test]
fn rejects_unknown_extension() {
    let mut cmd = xpire();
    cmd.arg("run").arg("Cargo.toml");
    cmd.assert().failure().stderr(contains("unknown extension"));
}
