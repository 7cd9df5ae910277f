#![cfg(feature = "cli")]

use std::process::Command;

use serde_json::Value;

fn classify(args: &[&str]) -> Value {
    let output = Command::new(env!("CARGO_BIN_EXE_canrx"))
        .args(["--log-level", "error", "--format", "json", "classify"])
        .args(args)
        .output()
        .expect("canrx should run");
    assert!(output.status.success());
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

#[test]
fn exact_standard_id_is_hashed() {
    let out = classify(&["123", "C00007FF"]);
    assert_eq!(out["bucket"]["standard_hashed"], 0x123);
    assert_eq!(out["id"], "00000123");
}

#[test]
fn zero_mask_is_catch_all() {
    assert_eq!(classify(&["0x55", "0"])["bucket"], "all");
}

#[test]
fn invert_flag_selects_inverted_bucket() {
    let out = classify(&["10", "7FF", "--invert"]);
    assert_eq!(out["bucket"], "inverted");
    assert_eq!(out["filter"], "010~7FF");
}

#[test]
fn error_mask_selects_error_bucket() {
    let out = classify(&["0", "20000040"]);
    assert_eq!(out["bucket"], "error");
    assert_eq!(out["mask"], "00000040");
}

#[test]
fn version_prints_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_canrx"))
        .arg("version")
        .output()
        .expect("canrx should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("canrx {}", env!("CARGO_PKG_VERSION")));
}
