// Instance Agent - Command Runner
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! External command execution.
//!
//! Network restarts, `ifup`/`ifdown`, `netcfg` and friends all go through
//! [`CommandRunner`] so the orchestrator can be driven by a scripted runner
//! in tests. Commands run with an empty environment and no stdin; the exit
//! status is the only success signal, output is kept for the logs.

use std::process::{Command, Stdio};

use tracing::{debug, info};

use crate::models::{Error, Result};

/// Captured result of one external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status (`-1` when the process was killed by a signal).
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Something that can run an argv and report its exit status.
pub trait CommandRunner {
    /// Run `argv[0]` with the remaining arguments, blocking until it exits.
    fn run(&self, argv: &[String]) -> Result<CommandOutput>;
}

/// Runs commands on the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, argv: &[String]) -> Result<CommandOutput> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| Error::Internal("Empty command line".to_string()))?;
        let command_line = argv.join(" ");

        info!("Executing {}", command_line);

        let output = Command::new(program)
            .args(args)
            .env_clear()
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::CommandSpawnFailed {
                command: command_line.clone(),
                reason: e.to_string(),
            })?;

        let result = CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        debug!(
            command = %command_line,
            status = result.status,
            stdout = %result.stdout.trim_end(),
            stderr = %result.stderr.trim_end(),
            "Command finished"
        );

        Ok(result)
    }
}

/// Build an argv from string slices.
pub fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}

#[cfg(test)]
pub mod testing {
    //! Scripted runner for tests.

    use std::cell::RefCell;
    use std::collections::{HashMap, VecDeque};

    use super::*;

    /// Records every command and answers from a per-command script of exit
    /// statuses (default 0).
    #[derive(Debug, Default)]
    pub struct ScriptedRunner {
        calls: RefCell<Vec<String>>,
        script: RefCell<HashMap<String, VecDeque<i32>>>,
    }

    impl ScriptedRunner {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue exit statuses for a command line (`"/etc/rc.d/network restart"`).
        pub fn script(&self, command: &str, statuses: &[i32]) {
            self.script
                .borrow_mut()
                .entry(command.to_string())
                .or_default()
                .extend(statuses.iter().copied());
        }

        /// Every command line run so far.
        pub fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        /// How many times a command line ran.
        pub fn count(&self, command: &str) -> usize {
            self.calls.borrow().iter().filter(|c| *c == command).count()
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, argv: &[String]) -> Result<CommandOutput> {
            let line = argv.join(" ");
            self.calls.borrow_mut().push(line.clone());
            let status = self
                .script
                .borrow_mut()
                .get_mut(&line)
                .and_then(|queue| queue.pop_front())
                .unwrap_or(0);
            Ok(CommandOutput {
                status,
                ..Default::default()
            })
        }
    }
}
