use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn bin(data_dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("ecrypt"));
    cmd.env("ECRYPT_DATA_DIR", data_dir).env_remove("RUST_LOG");
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let out = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(out).unwrap().trim().to_string()
}

#[test]
fn encrypt_file_replaces_it_with_ecrypt_sibling() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("notes.txt");
    fs::write(&file, "top secret").unwrap();

    bin(dir.path())
        .env("ECRYPT_PASSWORD", "pw")
        .arg("encrypt")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("notes.txt.ecrypt"));

    assert!(!file.exists());
    assert!(dir.path().join("notes.txt.ecrypt").exists());

    // decrypt
    bin(dir.path())
        .env("ECRYPT_PASSWORD", "pw")
        .arg("decrypt")
        .arg(dir.path().join("notes.txt.ecrypt"))
        .assert()
        .success();

    assert_eq!(fs::read_to_string(&file).unwrap(), "top secret");
}

#[test]
fn text_roundtrip_through_base64() {
    let dir = tempdir().unwrap();

    let sealed = stdout_of(
        bin(dir.path())
            .env("ECRYPT_PASSWORD", "pw")
            .args(["encrypt", "--text", "hello there"]),
    );

    bin(dir.path())
        .env("ECRYPT_PASSWORD", "pw")
        .args(["decrypt", "--text", sealed.as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("hello there"));
}

#[test]
fn wrong_password_fails() {
    let dir = tempdir().unwrap();

    let sealed = stdout_of(
        bin(dir.path())
            .env("ECRYPT_PASSWORD", "pw")
            .args(["encrypt", "--text", "hello there"]),
    );

    bin(dir.path())
        .env("ECRYPT_PASSWORD", "wrong_pw")
        .args(["decrypt", "--text", sealed.as_str()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid input data"));
}

#[test]
fn existing_output_is_not_overwritten() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("a.txt");
    let out = dir.path().join("a.bin");
    fs::write(&file, "data").unwrap();
    fs::write(&out, "keep").unwrap();

    bin(dir.path())
        .env("ECRYPT_PASSWORD", "pw")
        .arg("encrypt")
        .arg(&file)
        .arg("--output")
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    assert_eq!(fs::read_to_string(&out).unwrap(), "keep");
    assert!(file.exists());
}

#[test]
fn missing_input_file_fails() {
    let dir = tempdir().unwrap();

    bin(dir.path())
        .env("ECRYPT_PASSWORD", "pw")
        .arg("encrypt")
        .arg(dir.path().join("missing.txt"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("file does not exist"));
}

#[test]
fn hash_prints_uppercase_hex() {
    let dir = tempdir().unwrap();

    bin(dir.path())
        .args(["hash", "--algorithm", "sha256", "--text", "abc"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD",
        ));
}

#[test]
fn hash_of_file_keeps_file() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("abc.txt");
    fs::write(&file, "abc").unwrap();

    let digest = stdout_of(bin(dir.path()).args(["hash", "-a", "MD5"]).arg(&file));

    assert_eq!(digest, "900150983CD24FB0D6963F7D28E17F72");
    assert!(file.exists());
}

#[test]
fn password_has_requested_length() {
    let dir = tempdir().unwrap();

    let pw = stdout_of(bin(dir.path()).args(["password", "--length", "40"]));

    assert_eq!(pw.len(), 40);
    assert!(pw.chars().all(|c| c.is_ascii_alphanumeric()));
}

#[test]
fn password_length_zero_is_rejected() {
    let dir = tempdir().unwrap();

    bin(dir.path())
        .args(["password", "--length", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid parameter"));
}

#[test]
fn keygen_rsa_roundtrip_sign_and_verify() {
    let dir = tempdir().unwrap();
    let keys = dir.path().join("keys");

    bin(dir.path())
        .env("ECRYPT_PASSWORD", "pw")
        .args(["keygen", "--size", "2048", "--name", "alice"])
        .arg("--out-dir")
        .arg(&keys)
        .assert()
        .success();

    let public = keys.join("alice.pub");
    let private = keys.join("alice.key.ecrypt");
    assert!(public.exists());
    assert!(private.exists());

    // long text goes through the envelope
    let message = "m".repeat(500);
    let sealed = stdout_of(
        bin(dir.path())
            .args(["rsa-encrypt", "--text", message.as_str()])
            .arg("--public-key")
            .arg(&public),
    );

    bin(dir.path())
        .env("ECRYPT_PASSWORD", "pw")
        .args(["rsa-decrypt", "--text", sealed.as_str()])
        .arg("--private-key")
        .arg(&private)
        .assert()
        .success()
        .stdout(predicate::str::contains(message.as_str()));

    let sig = dir.path().join("msg.sig");
    bin(dir.path())
        .env("ECRYPT_PASSWORD", "pw")
        .args(["sign", "--text", "signed message"])
        .arg("--private-key")
        .arg(&private)
        .arg("--signature")
        .arg(&sig)
        .assert()
        .success();

    bin(dir.path())
        .args(["verify", "--text", "signed message"])
        .arg("--public-key")
        .arg(&public)
        .arg("--signature")
        .arg(&sig)
        .assert()
        .success()
        .stdout(predicate::str::contains("signature verified"));

    bin(dir.path())
        .args(["verify", "--text", "tampered message"])
        .arg("--public-key")
        .arg(&public)
        .arg("--signature")
        .arg(&sig)
        .assert()
        .failure()
        .stderr(predicate::str::contains("signature does not match"));
}
