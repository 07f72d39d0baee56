//! CLI integration tests for the roost binary.
//!
//! Each test uses an isolated temp directory for the database, ensuring tests
//! can run in parallel safely.

#![allow(deprecated)] // Command::cargo_bin deprecation only affects custom build dirs

use std::path::Path;
use std::sync::Arc;

use assert_cmd::Command;
use assert_fs::TempDir;
use predicates::prelude::*;
use uuid::Uuid;

use roost::config::EngineConfig;
use roost::engine::Engine;
use roost::store::{SqliteStore, Store};

struct TestContext {
    temp_dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    fn data_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    fn data_dir_str(&self) -> String {
        self.data_dir().to_string_lossy().to_string()
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("roost").expect("failed to find binary");
        cmd.env("NO_COLOR", "1");
        cmd.args(["--data-dir", &self.data_dir_str()]);
        cmd
    }

    fn init(&self) -> assert_cmd::assert::Assert {
        self.cmd().arg("init").assert()
    }

    fn create_user(&self, username: &str) -> assert_cmd::assert::Assert {
        self.cmd()
            .args([
                "user",
                "create",
                "--username",
                username,
                "--email",
                &format!("{username}@example.com"),
                "--password",
                "hunter22",
            ])
            .assert()
    }

    fn engine(&self) -> Engine<SqliteStore> {
        let store = SqliteStore::new(self.data_dir().join("roost.db")).expect("open store");
        Engine::new(Arc::new(store), EngineConfig::default())
    }
}

/// Pulls the value following `label` out of command output.
fn field_after(stdout: &[u8], label: &str) -> String {
    let text = String::from_utf8_lossy(stdout);
    let line = text
        .lines()
        .find(|line| line.starts_with(label))
        .unwrap_or_else(|| panic!("no line starting with {label:?} in {text}"));
    line[label.len()..].trim().to_string()
}

/// Extracts the id inside the trailing parentheses of a "Created ..." line.
fn created_id(stdout: &[u8]) -> Uuid {
    let text = String::from_utf8_lossy(stdout);
    let line = text
        .lines()
        .find(|line| line.starts_with("Created"))
        .expect("no Created line");
    let start = line.rfind('(').expect("no opening paren") + 1;
    let end = line.rfind(')').expect("no closing paren");
    line[start..end].parse().expect("invalid id")
}

#[test]
fn test_init_creates_database() {
    let ctx = TestContext::new();

    ctx.init()
        .success()
        .stdout(predicate::str::contains("Initialized database at"));
    assert!(ctx.data_dir().join("roost.db").exists());

    ctx.init()
        .success()
        .stdout(predicate::str::contains("Database already initialized"));
}

#[test]
fn test_commands_require_init() {
    let ctx = TestContext::new();

    ctx.create_user("alice")
        .failure()
        .stderr(predicate::str::contains("Run 'roost init' first"));
}

#[test]
fn test_user_create_prints_working_token() {
    let ctx = TestContext::new();
    ctx.init().success();

    let output = ctx
        .create_user("Alice")
        .success()
        .stdout(predicate::str::contains("Created user 'alice'"))
        .get_output()
        .stdout
        .clone();

    let token = field_after(&output, "Token:");
    let identity = ctx
        .engine()
        .authenticate(&[format!("Bearer {token}")])
        .expect("issued token authenticates");
    assert_eq!(identity.user.username, "alice");
}

#[test]
fn test_user_create_rejects_duplicate() {
    let ctx = TestContext::new();
    ctx.init().success();

    ctx.create_user("alice").success();
    ctx.create_user("alice")
        .failure()
        .stderr(predicate::str::contains("user already exists"));
}

#[test]
fn test_limit_set() {
    let ctx = TestContext::new();
    ctx.init().success();
    ctx.create_user("alice").success();

    ctx.cmd()
        .args(["limit", "set", "--username", "ALICE", "--limit", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Group limit for 'alice' set to 3"));

    let limit = ctx
        .engine()
        .store()
        .read(|s| {
            let user = s.get_user_by_username("alice", None)?.expect("user");
            s.get_user_group_limit(user.id)
        })
        .expect("read limit")
        .expect("limit recorded");
    assert_eq!(limit.group_limit, 3);
}

#[test]
fn test_limit_set_unknown_user() {
    let ctx = TestContext::new();
    ctx.init().success();

    ctx.cmd()
        .args(["limit", "set", "--username", "ghost", "--limit", "3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("user 'ghost' not found"));
}

#[test]
fn test_plan_and_subscription() {
    let ctx = TestContext::new();
    ctx.init().success();

    let output = ctx.create_user("alice").success().get_output().stdout.clone();
    let token = field_after(&output, "Token:");

    let group_id = {
        let engine = ctx.engine();
        let identity = engine
            .authenticate(&[format!("Bearer {token}")])
            .expect("authenticate");
        engine
            .create_group(&identity, "studio", None)
            .expect("create group")
            .id
    };

    let output = ctx
        .cmd()
        .args([
            "plan",
            "create",
            "--name",
            "team",
            "--plan-type",
            "seats",
            "--default-units",
            "5",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created plan 'team'"))
        .get_output()
        .stdout
        .clone();
    let plan_id = created_id(&output);

    ctx.cmd()
        .args([
            "subscription",
            "set",
            "--group-id",
            &group_id.to_string(),
            "--plan-id",
            &plan_id.to_string(),
            "--units",
            "7",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("7 units, active"));

    assert_eq!(ctx.engine().active_units(group_id, "seats").unwrap(), 7);

    ctx.cmd()
        .args([
            "subscription",
            "set",
            "--group-id",
            &group_id.to_string(),
            "--plan-id",
            &plan_id.to_string(),
            "--units",
            "7",
            "--inactive",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("inactive"));

    assert_eq!(ctx.engine().active_units(group_id, "seats").unwrap(), 0);
}

#[test]
fn test_subscription_unknown_group() {
    let ctx = TestContext::new();
    ctx.init().success();

    ctx.cmd()
        .args([
            "subscription",
            "set",
            "--group-id",
            &Uuid::new_v4().to_string(),
            "--plan-id",
            &Uuid::new_v4().to_string(),
            "--units",
            "1",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_invalid_config_rejected() {
    let ctx = TestContext::new();
    ctx.init().success();

    let config_path = ctx.data_dir().join("engine.toml");
    std::fs::write(&config_path, "max_credentials = 0\n").unwrap();

    ctx.cmd()
        .args(["--config", &config_path.to_string_lossy()])
        .args(["limit", "set", "--username", "alice", "--limit", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load config"));
}
