#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

/// A project directory plus an empty home so the user's real rules never
/// leak into a test.
struct Project {
    dir: TempDir,
    home: TempDir,
}

impl Project {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            home: TempDir::new().unwrap(),
        }
    }

    fn write(&self, relative: &str, body: &str) -> &Self {
        write(self.dir.path(), relative, body);
        self
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("coding-context").unwrap();
        cmd.current_dir(self.dir.path())
            .env("CODING_CONTEXT_DIR", self.dir.path())
            .env("HOME", self.home.path())
            .env_remove("RUST_LOG");
        cmd
    }
}

fn write(root: &Path, relative: &str, body: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, body).unwrap();
}

// ---------------------------------------------------------------------------
// coding-context run
// ---------------------------------------------------------------------------

#[test]
fn run_prints_rules_then_task() {
    let project = Project::new();
    project
        .write(".agents/rules/style.md", "Use tabs.\n")
        .write(".agents/tasks/fix-bug.md", "Fix the bug.\n");

    project
        .cmd()
        .args(["run", "fix-bug"])
        .assert()
        .success()
        .stdout("Use tabs.\n\nFix the bug.\n");
}

#[test]
fn run_expands_parameters_and_commands() {
    let project = Project::new();
    project.write(
        ".agents/tasks/hello.md",
        "Hello ${name}, today is !`echo Monday`",
    );

    project
        .cmd()
        .args(["run", "hello", "-p", "name=Ada"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Hello Ada, today is Monday\n"));
}

#[test]
fn run_resolves_slash_commands() {
    let project = Project::new();
    project
        .write(".agents/commands/deploy.md", "Deploy to ${env} (${1}).\n")
        .write(".agents/tasks/release.md", "Release notes.\n/deploy env=\"prod eu\"\n");

    project
        .cmd()
        .args(["run", "release"])
        .assert()
        .success()
        .stdout("Release notes.\nDeploy to prod eu (env=\"prod eu\").\n");
}

#[test]
fn run_filters_rules_with_selectors() {
    let project = Project::new();
    project
        .write(".agents/rules/prod.md", "---\nenv: production\n---\nProd rule\n")
        .write(".agents/rules/dev.md", "---\nenv: development\n---\nDev rule\n")
        .write(".agents/tasks/t.md", "Task\n");

    project
        .cmd()
        .args(["run", "t", "-s", "env=development"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dev rule"))
        .stdout(predicate::str::contains("Prod rule").not());
}

#[test]
fn run_excludes_rules_native_to_the_agent() {
    let project = Project::new();
    project
        .write("CLAUDE.md", "Claude memory\n")
        .write(".cursor/rules/c.mdc", "Cursor rule\n")
        .write(".agents/tasks/t.md", "Task\n");

    project
        .cmd()
        .args(["run", "t", "-a", "claude"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cursor rule"))
        .stdout(predicate::str::contains("Claude memory").not());
}

#[test]
fn run_appends_user_prompt() {
    let project = Project::new();
    project.write(".agents/tasks/t.md", "Task body\n");

    project
        .cmd()
        .args(["run", "t", "--prompt", "Also check ${area}", "-p", "area=tests"])
        .assert()
        .success()
        .stdout("Task body\n---\nAlso check tests\n");
}

#[test]
fn run_resume_skips_rules() {
    let project = Project::new();
    project
        .write(".agents/rules/r.md", "Rule\n")
        .write(".agents/tasks/t.md", "Task\n");

    project
        .cmd()
        .args(["run", "t", "--resume"])
        .assert()
        .success()
        .stdout("Task\n");
}

#[test]
fn run_uses_extra_search_paths() {
    let project = Project::new();
    let shared = TempDir::new().unwrap();
    write(shared.path(), ".agents/rules/shared.md", "Shared rule\n");
    project.write(".agents/tasks/t.md", "Task\n");

    project
        .cmd()
        .args(["run", "t", "-d"])
        .arg(shared.path())
        .assert()
        .success()
        .stdout("Shared rule\n\nTask\n");
}

#[test]
fn run_json_reports_everything() {
    let project = Project::new();
    project
        .write(".agents/rules/r.md", "Rule\n")
        .write(".agents/tasks/t.md", "Task\n");

    let output = project
        .cmd()
        .args(["--json", "run", "t"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(value["prompt"], "Rule\n\nTask\n");
    assert_eq!(value["task"]["content"], "Task\n");
    assert_eq!(value["rules"].as_array().unwrap().len(), 1);
    assert!(value["tokens"].is_u64());
}

#[test]
fn run_writes_output_file() {
    let project = Project::new();
    project.write(".agents/tasks/t.md", "Task\n");
    let out = project.dir.path().join("out/prompt.md");

    project
        .cmd()
        .args(["run", "t", "-o"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));
    assert_eq!(std::fs::read_to_string(out).unwrap(), "Task\n");
}

#[test]
fn run_bootstrap_output_stays_off_stdout() {
    let project = Project::new();
    project
        .write(".agents/rules/setup.md", "Setup rule\n")
        .write(".agents/rules/setup-bootstrap", "#!/bin/sh\necho booting\n")
        .write(".agents/tasks/t.md", "Task\n");

    project
        .cmd()
        .args(["run", "t"])
        .assert()
        .success()
        .stdout("Setup rule\n\nTask\n")
        .stderr(predicate::str::contains("booting"));
}

#[test]
fn run_fails_when_bootstrap_fails() {
    let project = Project::new();
    project
        .write(".agents/rules/setup.md", "Setup rule\n")
        .write(".agents/rules/setup-bootstrap", "#!/bin/sh\nexit 4\n")
        .write(".agents/tasks/t.md", "Task\n");

    project
        .cmd()
        .args(["run", "t"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("bootstrap"));
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn unknown_task_fails() {
    let project = Project::new();
    project
        .cmd()
        .args(["run", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("task not found: missing"));
}

#[test]
fn unknown_agent_fails() {
    let project = Project::new();
    project.write(".agents/tasks/t.md", "Task\n");
    project
        .cmd()
        .args(["run", "t", "-a", "emacs"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown agent 'emacs'"));
}

#[test]
fn malformed_parameter_fails() {
    let project = Project::new();
    project.write(".agents/tasks/t.md", "Task\n");
    project
        .cmd()
        .args(["run", "t", "-p", "novalue"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid parameter 'novalue'"));
}

#[test]
fn unclosed_quote_in_task_fails() {
    let project = Project::new();
    project.write(".agents/tasks/t.md", "/deploy \"prod\n");
    project
        .cmd()
        .args(["run", "t"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unclosed quote"));
}

#[test]
fn missing_slash_command_fails() {
    let project = Project::new();
    project.write(".agents/tasks/t.md", "/ghost\n");
    project
        .cmd()
        .args(["run", "t"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("command not found: /ghost"));
}

#[test]
fn path_in_prose_is_not_a_command() {
    let project = Project::new();
    project.write(".agents/tasks/t.md", "Save the logs in /tmp first\n");
    project
        .cmd()
        .args(["run", "t"])
        .assert()
        .success()
        .stdout("Save the logs in /tmp first\n");
}

// ---------------------------------------------------------------------------
// coding-context list
// ---------------------------------------------------------------------------

#[test]
fn list_shows_tasks() {
    let project = Project::new();
    project
        .write(".agents/tasks/fix-bug.md", "---\ndescription: Fix a reported bug\n---\nBody\n")
        .write(".claude/commands/ignored.md", "Not a task\n")
        .write(".agents/tasks/review.md", "# Review a pull request\n");

    project
        .cmd()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("fix-bug"))
        .stdout(predicate::str::contains("Fix a reported bug"))
        .stdout(predicate::str::contains("Review a pull request"))
        .stdout(predicate::str::contains("ignored").not());
}

#[test]
fn list_json() {
    let project = Project::new();
    project.write(".agents/tasks/a.md", "Alpha\n");

    let output = project
        .cmd()
        .args(["list", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(value[0]["name"], "a");
    assert_eq!(value[0]["description"], "Alpha");
}

#[test]
fn list_without_tasks() {
    let project = Project::new();
    project
        .cmd()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No tasks found."));
}
