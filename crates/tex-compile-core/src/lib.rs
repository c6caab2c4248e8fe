//! Multi-pass runner for TeX-style typesetting engines.
//!
//! A compile call expands a run specification into an ordered [`RunPlan`],
//! launches the engine once per pass in the document's directory, and stops at
//! the first pass that exits non-zero. On success it yields the path of the
//! generated document.

pub mod error;
pub mod launcher;
pub mod output;
pub mod plan;
pub mod runner;

use std::path::{Path, PathBuf};

pub use error::{CompileError, CompileResult, ExitCode, PassFailure};
pub use launcher::{Launcher, PassOutput, RecordingLauncher, SystemLauncher};
pub use output::{output_path, working_dir, OUTPUT_EXTENSION};
pub use plan::{
    default_options, default_run_plan, InvocationSpec, RunEntry, RunPlan, DEFAULT_ENGINE,
    DEFAULT_OPTIONS, DEFAULT_PASSES,
};
pub use runner::run_plan;

/// Compile `input` with `engine` (default [`DEFAULT_ENGINE`]) using `runs`
/// (default [`default_run_plan`]) and return the path of the output file.
pub fn compile(
    input: impl AsRef<Path>,
    engine: Option<&str>,
    runs: Option<&[RunEntry]>,
) -> CompileResult<PathBuf> {
    let mut compiler = Compiler::new(input.as_ref());
    if let Some(engine) = engine {
        compiler = compiler.engine(engine);
    }
    if let Some(runs) = runs {
        compiler = compiler.runs(runs.to_vec());
    }
    compiler.run().map(|outcome| outcome.output_path)
}

/// Result of a compile call in which every pass succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOutcome {
    pub output_path: PathBuf,
    pub passes: usize,
}

/// Builder-style front door for a single compile call.
#[derive(Debug, Clone)]
pub struct Compiler {
    input: PathBuf,
    engine: String,
    runs: Option<Vec<RunEntry>>,
    output_extension: String,
}

impl Compiler {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            engine: DEFAULT_ENGINE.to_string(),
            runs: None,
            output_extension: OUTPUT_EXTENSION.to_string(),
        }
    }

    pub fn engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }

    pub fn runs(mut self, runs: Vec<RunEntry>) -> Self {
        self.runs = Some(runs);
        self
    }

    /// Extension of the file the engine produces, `pdf` unless overridden.
    pub fn output_extension(mut self, extension: impl Into<String>) -> Self {
        self.output_extension = extension.into();
        self
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output_path(&self) -> PathBuf {
        output_path(&self.input, &self.output_extension)
    }

    /// Build the plan without launching anything.
    pub fn plan(&self) -> CompileResult<RunPlan> {
        RunPlan::build(
            &self.engine,
            &self.input,
            &working_dir(&self.input),
            self.runs.as_deref(),
        )
    }

    pub fn run(&self) -> CompileResult<CompileOutcome> {
        self.run_with(&SystemLauncher)
    }

    pub fn run_with(&self, launcher: &dyn Launcher) -> CompileResult<CompileOutcome> {
        let output_path = self.output_path();
        let plan = self.plan()?;
        let passes = run_plan(&plan, launcher)?;
        Ok(CompileOutcome {
            output_path,
            passes,
        })
    }
}
