//! The `aura` binary and its exit codes.

use std::fs;

use tempfile::tempdir;

use crate::common::{FIXTURE_ALPHA, FIXTURE_ALPHA_FINGERPRINT, aura};

const ENTROPY_HEX: &str = "4141414141414141414141414141414141414141414141414141414141414141";

fn exit_code(cmd: &mut std::process::Command) -> i32 {
    cmd.output().unwrap().status.code().unwrap()
}

#[test]
fn birth_seal_verify_round_trip() {
    let home = tempdir().unwrap();
    let work = tempdir().unwrap();
    let payload = work.path().join("payload.txt");
    let record = work.path().join("record.json");
    fs::write(&payload, b"hello").unwrap();

    let birth = aura(home.path())
        .args(["birth", "--entropy", ENTROPY_HEX])
        .output()
        .unwrap();
    assert!(birth.status.success());
    let info: serde_json::Value = serde_json::from_slice(&birth.stdout).unwrap();
    assert_eq!(info["fingerprint_alpha"], FIXTURE_ALPHA_FINGERPRINT);

    let seal = aura(home.path())
        .arg("seal")
        .arg(&payload)
        .arg("--out")
        .arg(&record)
        .output()
        .unwrap();
    assert!(seal.status.success(), "{}", String::from_utf8_lossy(&seal.stderr));

    assert_eq!(
        exit_code(aura(home.path()).arg("verify").arg(&payload).arg(&record)),
        0
    );

    fs::write(&payload, b"hellp").unwrap();
    assert_eq!(
        exit_code(aura(home.path()).arg("verify").arg(&payload).arg(&record)),
        2
    );
}

#[test]
fn verify_heals_through_surviving_vector() {
    let home = tempdir().unwrap();
    let work = tempdir().unwrap();
    let payload = work.path().join("payload.bin");
    let record = work.path().join("record.json");
    fs::write(&payload, b"heal me").unwrap();

    assert_eq!(
        exit_code(aura(home.path()).args(["birth", "--entropy", ENTROPY_HEX])),
        0
    );
    assert_eq!(
        exit_code(aura(home.path()).arg("seal").arg(&payload).arg("--out").arg(&record)),
        0
    );

    let out = aura(home.path())
        .arg("verify")
        .arg(&payload)
        .arg(&record)
        .args(["--beta", &"00".repeat(32)])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&out.stdout).contains("healing through alpha"));
}

#[test]
fn two_invalid_vectors_exit_with_breach() {
    let home = tempdir().unwrap();
    assert_eq!(
        exit_code(aura(home.path()).args(["birth", "--entropy", ENTROPY_HEX])),
        0
    );

    let bogus_a = "11".repeat(32);
    let bogus_b = "22".repeat(32);
    assert_eq!(
        exit_code(aura(home.path()).args(["heal", &bogus_a, &bogus_b])),
        3
    );

    let healed = aura(home.path())
        .args(["heal", &bogus_a, FIXTURE_ALPHA])
        .output()
        .unwrap();
    assert!(healed.status.success());
    let value: serde_json::Value = serde_json::from_slice(&healed.stdout).unwrap();
    assert_eq!(value["source"], "candidate");
}

#[test]
fn usage_errors_exit_one() {
    let home = tempdir().unwrap();
    assert_eq!(exit_code(&mut aura(home.path())), 1);
    assert_eq!(exit_code(aura(home.path()).arg("frobnicate")), 1);
    assert_eq!(exit_code(aura(home.path()).arg("seal")), 1);
    assert_eq!(
        exit_code(aura(home.path()).args(["birth", "--entropy", "4141"])),
        1
    );
}

#[test]
fn protect_and_recover_files() {
    let home = tempdir().unwrap();
    let work = tempdir().unwrap();
    let original = work.path().join("reference.bin");
    let framed = work.path().join("reference.aurf");
    let restored = work.path().join("restored.bin");
    let bytes: Vec<u8> = (0..300u16).map(|i| (i % 251) as u8).collect();
    fs::write(&original, &bytes).unwrap();

    assert_eq!(
        exit_code(aura(home.path()).arg("protect").arg(&original).arg(&framed)),
        0
    );
    let mut frame = fs::read(&framed).unwrap();
    frame[60] ^= 0xff;
    fs::write(&framed, &frame).unwrap();

    assert_eq!(
        exit_code(aura(home.path()).arg("recover").arg(&framed).arg(&restored)),
        0
    );
    assert_eq!(fs::read(&restored).unwrap(), bytes);
}

#[test]
fn flag_values_are_not_taken_as_positionals() {
    let home = tempdir().unwrap();
    let work = tempdir().unwrap();
    let target = work.path().join("payload.bin");
    fs::write(&target, b"payload").unwrap();

    let out = aura(home.path())
        .arg("seal")
        .arg("--out")
        .arg(&target)
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert_eq!(fs::read(&target).unwrap(), b"payload");

    assert_eq!(exit_code(aura(home.path()).args(["info", "--frobnicate"])), 1);
    assert_eq!(exit_code(aura(home.path()).arg("--help")), 0);
    assert_eq!(exit_code(aura(home.path()).args(["help", "verify"])), 0);
}
