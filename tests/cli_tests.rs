use std::path::Path;
use std::process::{Command, Output};

fn bank(state: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_bank"))
        .arg("--state")
        .arg(state)
        .args(args)
        .env("RUST_LOG", "warn")
        .env_remove("BANK_MINIMUM_DEPOSIT")
        .output()
        .expect("run bank binary")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn deploy_deposit_withdraw() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("bank.state.json");

    assert!(bank(&state, &["deploy"]).status.success());
    assert!(!bank(&state, &["deploy"]).status.success(), "second deploy must fail");
    assert!(bank(&state, &["fund", "--name", "owner", "--value", "1"]).status.success());

    let too_small = bank(&state, &["deposit", "--from", "owner", "--value", "0.09"]);
    assert!(!too_small.status.success());
    assert!(String::from_utf8_lossy(&too_small.stderr).contains("Not enough funds provided"));

    let deposit = bank(&state, &["deposit", "--from", "owner", "--value", "0.1"]);
    assert!(deposit.status.success());
    let event: serde_json::Value = serde_json::from_str(stdout(&deposit).trim()).unwrap();
    assert_eq!(event["sequence"], 1);
    assert_eq!(event["event"]["type"], "Deposit");
    assert_eq!(event["event"]["amount"], "100000000000000000");

    let balance = bank(&state, &["balance"]);
    assert_eq!(stdout(&balance).trim(), "0.1 ether (100000000000000000 wei)");

    let withdraw = bank(&state, &["withdraw", "--from", "owner", "--amount", "0.1"]);
    assert!(withdraw.status.success());
    let balance = bank(&state, &["balance"]);
    assert_eq!(stdout(&balance).trim(), "0.0 ether (0 wei)");

    let events = bank(&state, &["events"]);
    assert_eq!(stdout(&events).lines().count(), 2);
    assert!(bank(&state, &["verify"]).status.success());
}

#[test]
fn only_the_owner_may_deposit() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("bank.state.json");

    assert!(bank(&state, &["deploy"]).status.success());
    assert!(bank(&state, &["keygen", "--name", "mallory"]).status.success());
    assert!(bank(&state, &["fund", "--name", "mallory", "--value", "1"]).status.success());

    let output = bank(&state, &["deposit", "--from", "mallory", "--value", "0.5"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not authorized"));

    let balance = bank(&state, &["balance", "--name", "mallory"]);
    assert_eq!(stdout(&balance).trim(), "1.0 ether (1000000000000000000 wei)");
}

#[test]
fn unsaved_deposit_prints_no_event() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("bank.state.json");

    assert!(bank(&state, &["deploy"]).status.success());
    assert!(bank(&state, &["fund", "--name", "owner", "--value", "1"]).status.success());
    std::fs::create_dir(dir.path().join("bank.state.json.tmp")).unwrap();

    let output = bank(&state, &["deposit", "--from", "owner", "--value", "0.1"]);
    assert!(!output.status.success());
    assert_eq!(stdout(&output), "");

    std::fs::remove_dir(dir.path().join("bank.state.json.tmp")).unwrap();
    assert_eq!(stdout(&bank(&state, &["events"])), "");
    let balance = bank(&state, &["balance"]);
    assert_eq!(stdout(&balance).trim(), "0.0 ether (0 wei)");
}

#[test]
fn unknown_signer_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("bank.state.json");

    assert!(bank(&state, &["deploy"]).status.success());
    let output = bank(&state, &["deposit", "--from", "nobody", "--value", "0.1"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("signer \"nobody\" is unknown"));
}
