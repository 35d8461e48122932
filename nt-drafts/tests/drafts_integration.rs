//! Integration tests for nt-drafts

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Helper to escape path for TOML on Windows
fn escape_path_for_toml(path: &str) -> String {
    path.replace('\\', "\\\\")
}

struct TestEnv {
    _temp_dir: TempDir,
    config_path: PathBuf,
    store_path: PathBuf,
}

/// Config plus a store already holding three drafts
fn setup_test_env() -> TestEnv {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    let store_path = temp_dir.path().join("preferences.json");

    let config_content = format!(
        r#"
[settings]
license_key = "lic"

[vault]
path = "{}"

[store]
path = "{}"

[backend]
url = "http://127.0.0.1:9"
timeout_secs = 2
"#,
        escape_path_for_toml(&temp_dir.path().to_string_lossy()),
        escape_path_for_toml(&store_path.to_string_lossy())
    );
    fs::write(&config_path, config_content).unwrap();

    let drafts = serde_json::json!([
        ["First post of thread zero", "Second post"],
        ["Only post of thread one"],
        []
    ]);
    let store = serde_json::json!({
        "lastGeneratedTweets": drafts.to_string(),
        "userIdentifier": "user-1",
    });
    fs::write(&store_path, store.to_string()).unwrap();

    TestEnv {
        _temp_dir: temp_dir,
        config_path,
        store_path,
    }
}

fn nt_drafts(env: &TestEnv) -> Command {
    let mut cmd = Command::cargo_bin("nt-drafts").unwrap();
    cmd.env("NOTETHREAD_CONFIG", &env.config_path)
        .env_remove("RUST_LOG");
    cmd
}

fn stored(env: &TestEnv) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(&env.store_path).unwrap()).unwrap()
}

#[test]
fn test_list_text() {
    let env = setup_test_env();

    nt_drafts(&env)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("0 | 2 post(s) | First post of thread zero"))
        .stdout(predicate::str::contains("1 | 1 post(s) | Only post of thread one"))
        .stdout(predicate::str::contains("2 | 0 post(s) | (empty)"));
}

#[test]
fn test_list_json_keeps_order() {
    let env = setup_test_env();

    let output = nt_drafts(&env)
        .args(["list", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json[0][1], "Second post");
    assert_eq!(json[1][0], "Only post of thread one");
    assert_eq!(json[2].as_array().unwrap().len(), 0);
}

#[test]
fn test_list_rejects_unknown_format() {
    let env = setup_test_env();

    nt_drafts(&env)
        .args(["list", "--format", "yaml"])
        .assert()
        .code(3);
}

#[test]
fn test_show_one_post_per_line() {
    let env = setup_test_env();

    nt_drafts(&env)
        .args(["show", "0"])
        .assert()
        .success()
        .stdout(predicate::str::diff(
            "First post of thread zero\nSecond post\n",
        ));
}

#[test]
fn test_show_joined() {
    let env = setup_test_env();

    nt_drafts(&env)
        .args(["show", "0", "--joined"])
        .assert()
        .success()
        .stdout(predicate::str::diff(
            "First post of thread zero Second post\n",
        ));
}

#[test]
fn test_show_unknown_index() {
    let env = setup_test_env();

    nt_drafts(&env)
        .args(["show", "9"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("No draft at index 9"));
}

#[test]
fn test_schedule_without_connection() {
    let env = setup_test_env();
    let before = fs::read_to_string(&env.store_path).unwrap();

    nt_drafts(&env)
        .args(["schedule", "0"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Not connected"));

    assert_eq!(fs::read_to_string(&env.store_path).unwrap(), before);
}

#[test]
fn test_schedule_backend_failure_keeps_draft() {
    let env = setup_test_env();
    let mut store = stored(&env);
    store["twitterAuthToken"] = "tok".into();
    store["twitterAuthSecret"] = "sec".into();
    fs::write(&env.store_path, store.to_string()).unwrap();

    nt_drafts(&env)
        .args(["schedule", "1"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("schedule-tweet"));

    let after = stored(&env);
    let drafts: serde_json::Value =
        serde_json::from_str(after["lastGeneratedTweets"].as_str().unwrap()).unwrap();
    assert_eq!(drafts.as_array().unwrap().len(), 3);
    assert!(after.get("lastTweetTime").is_some());
}

#[test]
fn test_clear_removes_all_drafts() {
    let env = setup_test_env();

    nt_drafts(&env).arg("clear").assert().success();

    nt_drafts(&env)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
    assert_eq!(stored(&env)["userIdentifier"], "user-1");
}
