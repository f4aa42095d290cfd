//! Scripted command runner for exercising host and lifecycle logic without
//! touching the real machine.
//!
//! Replies are registered against a command line (program and arguments joined
//! by spaces). A rule matches a command whose line equals the pattern or starts
//! with the pattern followed by a space. When a rule holds several replies they
//! are consumed in order and the last one repeats. Commands with no matching
//! rule behave as if the binary were missing.

use crate::command::{CommandOutput, CommandRunner, CommandSpec};
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub enum Reply {
    Exit {
        code: i32,
        stdout: String,
        stderr: String,
    },
    SpawnError,
}

impl Reply {
    pub fn ok(stdout: &str) -> Self {
        Self::Exit {
            code: 0,
            stdout: stdout.to_owned(),
            stderr: String::new(),
        }
    }

    pub fn fail(code: i32, stderr: &str) -> Self {
        Self::Exit {
            code,
            stdout: String::new(),
            stderr: stderr.to_owned(),
        }
    }

    fn to_result(&self) -> std::io::Result<CommandOutput> {
        match self {
            Self::Exit {
                code,
                stdout,
                stderr,
            } => Ok(CommandOutput {
                success: *code == 0,
                code: Some(*code),
                stdout: stdout.clone().into_bytes(),
                stderr: stderr.clone().into_bytes(),
            }),
            Self::SpawnError => Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "mock: command not found",
            )),
        }
    }
}

struct Rule {
    pattern: String,
    replies: VecDeque<Reply>,
}

impl Rule {
    fn matches(&self, line: &str) -> bool {
        line == self.pattern
            || line
                .strip_prefix(self.pattern.as_str())
                .is_some_and(|rest| rest.starts_with(' '))
    }

    fn next_reply(&mut self) -> Reply {
        if self.replies.len() > 1 {
            self.replies.pop_front().unwrap_or(Reply::SpawnError)
        } else {
            self.replies.front().cloned().unwrap_or(Reply::SpawnError)
        }
    }
}

#[derive(Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a single reply that repeats for every matching command.
    #[must_use]
    pub fn on(self, pattern: &str, reply: Reply) -> Self {
        self.sequence(pattern, vec![reply])
    }

    /// Register replies consumed in order; the last one repeats.
    #[must_use]
    pub fn sequence(self, pattern: &str, replies: Vec<Reply>) -> Self {
        if let Ok(mut rules) = self.rules.lock() {
            rules.push(Rule {
                pattern: pattern.to_owned(),
                replies: replies.into(),
            });
        }
        self
    }

    /// Every command run so far, in order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Command lines of every command run so far, in order.
    pub fn lines(&self) -> Vec<String> {
        self.calls().iter().map(CommandSpec::command_line).collect()
    }

    pub fn count(&self, pattern: &str) -> usize {
        let probe = Rule {
            pattern: pattern.to_owned(),
            replies: VecDeque::new(),
        };
        self.lines().iter().filter(|l| probe.matches(l)).count()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, command: &CommandSpec) -> std::io::Result<CommandOutput> {
        let line = command.command_line();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(command.clone());
        }

        let mut rules = self
            .rules
            .lock()
            .map_err(|e| std::io::Error::other(format!("mutex poisoned: {e}")))?;
        match rules.iter_mut().find(|r| r.matches(&line)) {
            Some(rule) => rule.next_reply().to_result(),
            None => Reply::SpawnError.to_result(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmatched_command_is_spawn_error() {
        let runner = ScriptedRunner::new();
        assert!(runner.run(&CommandSpec::new("docker").arg("info")).is_err());
        assert_eq!(runner.lines(), vec!["docker info"]);
    }

    #[test]
    fn pattern_matches_on_word_boundary() {
        let runner = ScriptedRunner::new().on("docker compose", Reply::ok(""));
        assert!(runner.succeeds(&CommandSpec::new("docker").args(["compose", "version"])));
        assert!(!runner.succeeds(&CommandSpec::new("docker").arg("composex")));
    }

    #[test]
    fn sequence_repeats_last_reply() {
        let runner = ScriptedRunner::new().sequence(
            "probe",
            vec![Reply::fail(1, "no"), Reply::ok("yes")],
        );
        let cmd = CommandSpec::new("probe");
        assert!(!runner.succeeds(&cmd));
        assert!(runner.succeeds(&cmd));
        assert!(runner.succeeds(&cmd));
        assert_eq!(runner.count("probe"), 3);
    }

    #[test]
    fn first_matching_rule_wins() {
        let runner = ScriptedRunner::new()
            .on("docker compose version", Reply::fail(1, ""))
            .on("docker", Reply::ok(""));
        assert!(!runner.succeeds(&CommandSpec::new("docker").args(["compose", "version"])));
        assert!(runner.succeeds(&CommandSpec::new("docker").arg("info")));
    }
}
