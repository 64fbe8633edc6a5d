#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const CONFIG: &str = r#"
campus:
  id: 7
  mail_domain: student.example.org
  utc_offset: "+02:00"
selection:
  tracks: [21]
  project_whitelist: [1314]
  start_date: "2024-01-01T00:00:00.000Z"
  repo_domain: vogsphere.example.org
policy:
  days_until_stagnant: 14
  days_to_correct: 7
vacations:
  endpoint: http://127.0.0.1:9/api/vacations
repository:
  host: 127.0.0.1
  port: 9
  user: git
  private_key_path: /nonexistent/key
  base_path: /srv/repos
  command_timeout_secs: 5
mail:
  from: noreply@example.org
"#;

fn idlewatch(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("idlewatch").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("IDLEWATCH_CONFIG")
        .env_remove("DIRECTORY_CLIENT_ID")
        .env_remove("DIRECTORY_CLIENT_SECRET")
        .env_remove("CHAT_TOKEN");
    cmd
}

fn write_config(dir: &TempDir, body: &str) {
    std::fs::write(dir.path().join("idlewatch.yaml"), body).unwrap();
}

// ---------------------------------------------------------------------------
// help / usage
// ---------------------------------------------------------------------------

#[test]
fn help_lists_commands() {
    let dir = TempDir::new().unwrap();
    idlewatch(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn check_requires_a_team_id() {
    let dir = TempDir::new().unwrap();
    idlewatch(&dir).arg("check").assert().failure();
}

// ---------------------------------------------------------------------------
// idlewatch config validate
// ---------------------------------------------------------------------------

#[test]
fn missing_config_fails() {
    let dir = TempDir::new().unwrap();
    idlewatch(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config not found"));
}

#[test]
fn valid_config_validates() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, CONFIG);
    idlewatch(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Config is valid"));
}

#[test]
fn empty_tracks_is_an_error() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, &CONFIG.replace("tracks: [21]", "tracks: []"));
    idlewatch(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error] selection.tracks is empty"));
}

#[test]
fn validate_json_lists_warnings() {
    let dir = TempDir::new().unwrap();
    write_config(
        &dir,
        &CONFIG.replace("command_timeout_secs: 5", "command_timeout_secs: 0"),
    );
    idlewatch(&dir)
        .args(["config", "validate", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"level\": \"warning\""))
        .stdout(predicate::str::contains("command_timeout_secs=0"));
}

#[test]
fn config_flag_and_env_override_default_path() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("campus.yaml"), CONFIG).unwrap();
    idlewatch(&dir)
        .args(["--config", "campus.yaml", "config", "validate"])
        .assert()
        .success();
    idlewatch(&dir)
        .env("IDLEWATCH_CONFIG", "campus.yaml")
        .args(["config", "validate"])
        .assert()
        .success();
}

#[test]
fn show_fills_in_defaults() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, CONFIG);
    idlewatch(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("vacation_credit: true"))
        .stdout(predicate::str::contains("page_size: 100"));
}

// ---------------------------------------------------------------------------
// idlewatch run
// ---------------------------------------------------------------------------

#[test]
fn run_without_credentials_fails_before_connecting() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, CONFIG);
    idlewatch(&dir)
        .args(["run", "--dry-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("DIRECTORY_CLIENT_ID"));
}
