use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write as _;
use std::process::{Command, Stdio};

/// Number of trailing output lines kept when a command failure is reported.
const OUTPUT_TAIL_LINES: usize = 20;

/// A single external program invocation: program name plus discrete arguments.
///
/// Arguments are never joined into a shell string for execution; the rendered
/// command line is only used for logging, error messages, and test matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    #[serde(skip)]
    pub stdin: Option<Vec<u8>>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Program and arguments joined by single spaces, without quoting.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(|c: char| c.is_whitespace() || c == '\'') {
                write!(f, " '{}'", arg.replace('\'', r"'\''"))?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    pub fn status_description(&self) -> String {
        match self.code {
            Some(code) => format!("exit status {code}"),
            None => "terminated by signal".to_owned(),
        }
    }

    /// Last lines of stderr followed by stdout, for error reporting.
    pub fn output_tail(&self) -> String {
        let mut combined = self.stderr_text();
        let stdout = self.stdout_text();
        if !stdout.trim().is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&stdout);
        }
        let lines: Vec<&str> = combined.trim_end().lines().collect();
        let start = lines.len().saturating_sub(OUTPUT_TAIL_LINES);
        lines[start..].join("\n")
    }
}

/// Seam between the decision logic and the host's process table.
pub trait CommandRunner: Send + Sync {
    fn run(&self, command: &CommandSpec) -> std::io::Result<CommandOutput>;

    /// True when the command could be spawned and exited zero.
    fn succeeds(&self, command: &CommandSpec) -> bool {
        self.run(command).is_ok_and(|o| o.success)
    }
}

/// Runs commands on the real host with `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, command: &CommandSpec) -> std::io::Result<CommandOutput> {
        tracing::debug!("exec: {command}");

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = if let Some(input) = &command.stdin {
            cmd.stdin(Stdio::piped());
            let mut child = cmd.spawn()?;
            if let Some(mut stdin) = child.stdin.take() {
                // A child that exits without draining stdin still has a status
                // and output worth reporting.
                match stdin.write_all(input) {
                    Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                        tracing::debug!("{command} closed stdin early");
                    }
                    other => other?,
                }
            }
            child.wait_with_output()?
        } else {
            cmd.stdin(Stdio::null());
            cmd.output()?
        };

        tracing::trace!(
            "exit: {command} -> {:?} ({} bytes stdout)",
            output.status.code(),
            output.stdout.len()
        );

        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
