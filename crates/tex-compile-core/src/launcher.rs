//! Process launcher abstraction.
//!
//! `Launcher` turns one [`InvocationSpec`] into one finished process.
//! `SystemLauncher` is the production implementation backed by
//! `std::process::Command`. `RecordingLauncher` is the test double that records
//! invocations and replays scripted outcomes.

use std::cell::RefCell;
use std::io;
use std::process::{Command, Stdio};

use crate::plan::InvocationSpec;

/// Captured streams and exit status of one finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl PassOutput {
    pub fn success() -> Self {
        Self {
            exit_code: Some(0),
            ..Self::default()
        }
    }

    pub fn failure(code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code: Some(code),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs a single invocation to completion.
pub trait Launcher {
    /// Launch `spec`, wait for it to exit and return what it wrote. An `Err`
    /// means the process could not be started or waited on at all.
    fn launch(&self, spec: &InvocationSpec) -> io::Result<PassOutput>;
}

/// Spawns real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    fn launch(&self, spec: &InvocationSpec) -> io::Result<PassOutput> {
        let child = Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(&spec.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Drains both pipes concurrently, so neither stream can fill up and
        // stall the engine while we wait on the other.
        let output = child.wait_with_output()?;

        Ok(PassOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        })
    }
}

/// Test double that records every invocation and replays scripted outcomes
/// in order. Once the script runs out every launch succeeds silently.
#[derive(Debug, Default)]
pub struct RecordingLauncher {
    outcomes: RefCell<Vec<io::Result<PassOutput>>>,
    launched: RefCell<Vec<InvocationSpec>>,
}

impl RecordingLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcomes(outcomes: Vec<io::Result<PassOutput>>) -> Self {
        let mut reversed = outcomes;
        reversed.reverse();
        Self {
            outcomes: RefCell::new(reversed),
            launched: RefCell::new(Vec::new()),
        }
    }

    pub fn launched(&self) -> Vec<InvocationSpec> {
        self.launched.borrow().clone()
    }

    pub fn launch_count(&self) -> usize {
        self.launched.borrow().len()
    }
}

impl Launcher for RecordingLauncher {
    fn launch(&self, spec: &InvocationSpec) -> io::Result<PassOutput> {
        self.launched.borrow_mut().push(spec.clone());
        self.outcomes
            .borrow_mut()
            .pop()
            .unwrap_or_else(|| Ok(PassOutput::success()))
    }
}
