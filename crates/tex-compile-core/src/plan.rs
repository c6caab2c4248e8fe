//! Expansion of "run the engine N times with these flags" entries into a flat,
//! ordered list of process launches.
//!
//! Two defaults live here and are applied at two separate points:
//! [`default_run_plan`] replaces a missing run specification as a whole, while
//! [`DEFAULT_OPTIONS`] fills in for a single entry that carries no options.

use std::path::{Path, PathBuf};

use crate::error::{CompileError, CompileResult};

/// Engine used when the caller does not name one.
pub const DEFAULT_ENGINE: &str = "pdflatex";

/// Number of passes in the built-in run specification.
pub const DEFAULT_PASSES: u32 = 2;

/// Batch mode, stop at the first error, `file:line:` prefixed messages.
pub const DEFAULT_OPTIONS: [&str; 3] = [
    "-interaction=nonstopmode",
    "-halt-on-error",
    "-file-line-error",
];

/// Caller-facing unit: run the engine `runs` times with `options`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunEntry {
    pub runs: u32,
    /// `None` means [`DEFAULT_OPTIONS`].
    pub options: Option<Vec<String>>,
}

impl RunEntry {
    pub fn new<I, S>(runs: u32, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            runs,
            options: Some(options.into_iter().map(Into::into).collect()),
        }
    }

    /// Entry whose option list is the one value `option`.
    pub fn single(runs: u32, option: impl Into<String>) -> Self {
        Self {
            runs,
            options: Some(vec![option.into()]),
        }
    }

    pub fn with_default_options(runs: u32) -> Self {
        Self {
            runs,
            options: None,
        }
    }

    /// Options this entry expands to, with the per-entry default applied.
    pub fn resolved_options(&self) -> Vec<String> {
        match &self.options {
            Some(options) => options.clone(),
            None => default_options(),
        }
    }
}

pub fn default_options() -> Vec<String> {
    DEFAULT_OPTIONS.iter().map(|opt| opt.to_string()).collect()
}

/// Run specification used when the caller supplies none.
pub fn default_run_plan() -> Vec<RunEntry> {
    vec![RunEntry::new(DEFAULT_PASSES, DEFAULT_OPTIONS)]
}

/// One fully resolved process launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

impl InvocationSpec {
    /// Shell-like rendering used in logs and dry runs. Not quoted.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Ordered, non-empty list of invocations for a single compile call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    invocations: Vec<InvocationSpec>,
}

impl RunPlan {
    /// Expand `runs` (or the built-in default) into one invocation per pass.
    ///
    /// Entry order and repeat order are preserved: later passes read the
    /// auxiliary files written by earlier ones. `target` is appended as the
    /// last argument of every invocation.
    pub fn build(
        engine: &str,
        target: &Path,
        working_dir: &Path,
        runs: Option<&[RunEntry]>,
    ) -> CompileResult<Self> {
        let defaults;
        let entries = match runs {
            Some(entries) => entries,
            None => {
                defaults = default_run_plan();
                &defaults[..]
            }
        };
        validate_entries(entries)?;

        let target = target.to_string_lossy().into_owned();
        let mut invocations = Vec::new();
        for entry in entries {
            let mut args = entry.resolved_options();
            args.push(target.clone());
            for _ in 0..entry.runs {
                invocations.push(InvocationSpec {
                    program: engine.to_string(),
                    args: args.clone(),
                    working_dir: working_dir.to_path_buf(),
                });
            }
        }

        Ok(Self { invocations })
    }

    pub fn invocations(&self) -> &[InvocationSpec] {
        &self.invocations
    }

    pub fn len(&self) -> usize {
        self.invocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invocations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InvocationSpec> {
        self.invocations.iter()
    }
}

impl<'a> IntoIterator for &'a RunPlan {
    type Item = &'a InvocationSpec;
    type IntoIter = std::slice::Iter<'a, InvocationSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.invocations.iter()
    }
}

fn validate_entries(entries: &[RunEntry]) -> CompileResult<()> {
    if entries.is_empty() {
        return Err(CompileError::InvalidRunSpec(
            "run specification has no entries".into(),
        ));
    }
    if let Some(idx) = entries.iter().position(|entry| entry.runs == 0) {
        return Err(CompileError::InvalidRunSpec(format!(
            "entry {} has a repeat count of 0; expected at least 1",
            idx + 1
        )));
    }
    Ok(())
}
