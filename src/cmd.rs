use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use std::process::{Command, Output, Stdio};

use crate::error::{DeployError, DeployResult};
use crate::exec::CommandOutput;

/// Run a shell snippet (via `sh -c`) and return stdout, stderr
/// and the exit code without judging the result.
pub fn run_shell(dir: Option<&Path>, script: &str) -> DeployResult<CommandOutput> {
    let output = capture("sh", &["-c", script], dir)?;
    Ok(CommandOutput::from(output))
}

/// Run a command that pipes its stdin from a byte slice.
pub fn run_with_stdin(program: &str, args: &[&str], stdin_data: &[u8]) -> DeployResult<CommandOutput> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| spawn_error(program, e))?;

    if let Some(stdin) = &mut child.stdin {
        stdin.write_all(stdin_data)?;
    }
    drop(child.stdin.take());

    let output = child.wait_with_output()?;
    Ok(CommandOutput::from(output))
}

/// Run a command and hand every stdout line to `on_line` as it
/// arrives. Stderr is collected alongside and reported on failure.
pub fn run_streaming(
    program: &str,
    args: &[&str],
    on_line: &mut dyn FnMut(&str),
) -> DeployResult<()> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| spawn_error(program, e))?;

    // Stderr drains on its own thread so a chatty child cannot
    // block on a full pipe while stdout is being read.
    let stderr = child.stderr.take().map(|mut stderr| {
        std::thread::spawn(move || {
            let mut text = String::new();
            stderr.read_to_string(&mut text).map(|_| text)
        })
    });

    if let Some(stdout) = child.stdout.take() {
        for line in BufReader::new(stdout).lines() {
            on_line(&line?);
        }
    }

    let status = child.wait()?;
    let stderr = match stderr {
        Some(handle) => handle
            .join()
            .map_err(|_| DeployError::Other(format!("{program}: stderr reader panicked")))??,
        None => String::new(),
    };

    if status.success() {
        Ok(())
    } else {
        let output = CommandOutput {
            stdout: String::new(),
            stderr,
            exit_code: status.code().unwrap_or(-1),
        };
        Err(failure(program, args, &output))
    }
}

/// Build a [`DeployError::Execution`] from a finished command.
#[must_use]
pub fn failure(program: &str, args: &[&str], output: &CommandOutput) -> DeployError {
    DeployError::Execution {
        command: format_command(program, args),
        exit_code: output.exit_code,
        stderr: output.stderr.trim().to_string(),
    }
}

fn capture(program: &str, args: &[&str], dir: Option<&Path>) -> DeployResult<Output> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = dir {
        command.current_dir(dir);
    }
    command.output().map_err(|e| spawn_error(program, e))
}

fn spawn_error(program: &str, e: std::io::Error) -> DeployError {
    if e.kind() == std::io::ErrorKind::NotFound {
        DeployError::CommandNotFound(program.to_string())
    } else {
        DeployError::Io(e)
    }
}

fn format_command(program: &str, args: &[&str]) -> String {
    let mut parts = vec![program.to_string()];
    parts.extend(args.iter().map(|a| (*a).to_string()));
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_shell_reports_exit_code() {
        let output = run_shell(None, "echo out; echo err >&2; exit 3").unwrap();

        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
        assert_eq!(output.exit_code, 3);
        assert!(!output.success());
    }

    #[test]
    fn run_shell_uses_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let output = run_shell(Some(dir.path()), "pwd").unwrap();

        let reported = std::fs::canonicalize(output.stdout.trim()).unwrap();
        assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
    }

    #[test]
    fn missing_program_is_command_not_found() {
        let err = run_with_stdin("definitely-not-a-real-binary-xyz", &[], b"").unwrap_err();
        assert!(matches!(err, DeployError::CommandNotFound(_)));
    }

    #[test]
    fn streaming_hands_over_each_line() {
        let mut lines = Vec::new();
        run_streaming("sh", &["-c", "echo one; echo two"], &mut |l: &str| {
            lines.push(l.to_string());
        })
        .unwrap();

        assert_eq!(lines, vec!["one", "two"]);
    }

    #[test]
    fn streaming_survives_a_flood_on_stderr() {
        let mut lines = Vec::new();
        let err = run_streaming(
            "sh",
            &["-c", "head -c 262144 /dev/zero | tr '\\0' x >&2; echo done; exit 2"],
            &mut |l: &str| lines.push(l.to_string()),
        )
        .unwrap_err();

        assert_eq!(lines, vec!["done"]);
        match err {
            DeployError::Execution { exit_code, stderr, .. } => {
                assert_eq!(exit_code, 2);
                assert_eq!(stderr.len(), 262_144);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn run_with_stdin_feeds_input() {
        let output = run_with_stdin("cat", &[], b"hello").unwrap();
        assert_eq!(output.stdout, "hello");
        assert!(output.success());
    }
}
