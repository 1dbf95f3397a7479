use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;

/// Result of an external command: pass/fail plus whatever it printed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub output: String,
}

/// What to run before a rule is included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bootstrap {
    /// An executable file next to the rule.
    Script(PathBuf),
    /// A shell snippet from the rule's `bootstrap:` frontmatter.
    Inline(String),
}

/// Boundary to the operating system for everything the assembler executes.
pub trait ProcessRunner {
    /// Run `command` through the shell and capture stdout followed by stderr.
    fn run_shell(&self, command: &str, cwd: &Path) -> CommandOutput;

    /// Run a bootstrap step. Its own output is not captured; `output` only
    /// describes a failure.
    fn run_bootstrap(&self, bootstrap: &Bootstrap, cwd: &Path) -> CommandOutput;
}

/// Runs commands with `sh`, optionally killing them after `timeout`.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    pub timeout: Option<Duration>,
}

impl SystemRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl ProcessRunner for SystemRunner {
    fn run_shell(&self, command: &str, cwd: &Path) -> CommandOutput {
        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();
        let mut child = match child {
            Ok(c) => c,
            Err(e) => return failure(format!("failed to spawn: {e}")),
        };

        // Drain both pipes on their own threads so a chatty child cannot block.
        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        let status = match wait(child, self.timeout) {
            Ok(status) => status,
            Err(reason) => {
                // Readers may never see EOF if a grandchild holds the pipes.
                tracing::warn!(command, %reason, "shell command did not finish");
                return failure(String::new());
            }
        };

        let mut output = stdout.join().unwrap_or_default();
        output.push_str(&stderr.join().unwrap_or_default());
        CommandOutput {
            success: status.success(),
            output,
        }
    }

    fn run_bootstrap(&self, bootstrap: &Bootstrap, cwd: &Path) -> CommandOutput {
        let mut command = match bootstrap {
            Bootstrap::Script(path) => Command::new(path),
            Bootstrap::Inline(script) => {
                let mut c = Command::new("sh");
                c.arg("-c").arg(script);
                c
            }
        };
        // Bootstrap chatter goes to stderr so stdout stays clean for the prompt.
        let child = command
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::from(std::io::stderr()))
            .stderr(Stdio::inherit())
            .spawn();
        let child = match child {
            Ok(c) => c,
            Err(e) => return failure(format!("failed to spawn: {e}")),
        };

        match wait(child, self.timeout) {
            Ok(status) if status.success() => CommandOutput {
                success: true,
                output: String::new(),
            },
            Ok(status) => failure(format!("exited with {status}")),
            Err(reason) => failure(reason),
        }
    }
}

fn failure(output: String) -> CommandOutput {
    CommandOutput {
        success: false,
        output,
    }
}

fn spawn_reader<R: Read + Send + 'static>(
    pipe: Option<R>,
) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut r) = pipe {
            let _ = r.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Wait for `child`, killing it once `timeout` elapses. `None` waits forever.
fn wait(mut child: Child, timeout: Option<Duration>) -> Result<ExitStatus, String> {
    let Some(limit) = timeout else {
        return child.wait().map_err(|e| format!("wait failed: {e}"));
    };

    let pid = child.id();
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(child.wait());
    });

    match rx.recv_timeout(limit) {
        Ok(result) => result.map_err(|e| format!("wait failed: {e}")),
        Err(_) => {
            kill_process(pid);
            Err(format!("timed out after {}s", limit.as_secs()))
        }
    }
}

/// SIGKILL by pid. Errors are ignored.
fn kill_process(pid: u32) {
    let _ = Command::new("kill")
        .arg("-9")
        .arg(pid.to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn shell_output_is_not_trimmed() {
        let out = SystemRunner::default().run_shell("echo middle", Path::new("."));
        assert!(out.success);
        assert_eq!(out.output, "middle\n");
    }

    #[test]
    fn shell_captures_stderr_after_stdout() {
        let out = SystemRunner::default().run_shell("echo out; echo err >&2", Path::new("."));
        assert_eq!(out.output, "out\nerr\n");
    }

    #[test]
    fn failing_shell_keeps_its_output() {
        let out = SystemRunner::default().run_shell("echo partial; exit 3", Path::new("."));
        assert!(!out.success);
        assert_eq!(out.output, "partial\n");
    }

    #[test]
    fn shell_runs_in_cwd() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "here").unwrap();
        let out = SystemRunner::default().run_shell("cat marker.txt", dir.path());
        assert_eq!(out.output, "here");
    }

    #[test]
    fn timeout_kills_slow_command() {
        let runner = SystemRunner::new(Some(Duration::from_secs(1)));
        let out = runner.run_bootstrap(&Bootstrap::Inline("sleep 30".into()), Path::new("."));
        assert!(!out.success);
        assert!(out.output.contains("timed out"), "{}", out.output);
    }

    #[test]
    fn timed_out_shell_yields_no_output() {
        let runner = SystemRunner::new(Some(Duration::from_secs(1)));
        let out = runner.run_shell("exec sleep 30", Path::new("."));
        assert!(!out.success);
        assert_eq!(out.output, "");
    }

    #[test]
    fn inline_bootstrap_reports_exit_status() {
        let runner = SystemRunner::default();
        let ok = runner.run_bootstrap(&Bootstrap::Inline("true".into()), Path::new("."));
        assert!(ok.success);
        let bad = runner.run_bootstrap(&Bootstrap::Inline("exit 2".into()), Path::new("."));
        assert!(!bad.success);
        assert!(bad.output.contains('2'), "{}", bad.output);
    }

    #[test]
    fn missing_script_fails_to_spawn() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("nope-bootstrap");
        let out = SystemRunner::default().run_bootstrap(&Bootstrap::Script(script), dir.path());
        assert!(!out.success);
        assert!(out.output.contains("failed to spawn"));
    }
}
