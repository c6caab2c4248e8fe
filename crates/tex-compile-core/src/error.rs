use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::plan::InvocationSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    Success = 0,
    PassFailed = 1,
    InvalidRunSpec = 2,
    Launch = 3,
    Config = 4,
    Io = 5,
}

impl ExitCode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Success),
            1 => Some(Self::PassFailed),
            2 => Some(Self::InvalidRunSpec),
            3 => Some(Self::Launch),
            4 => Some(Self::Config),
            5 => Some(Self::Io),
            _ => None,
        }
    }
}

/// Captured state of the pass that stopped the sequence.
#[derive(Debug, Clone)]
pub struct PassFailure {
    /// Everything the engine wrote to stdout. TeX engines put the error
    /// summary here, so this is the primary diagnostic.
    pub message: String,
    /// Everything the engine wrote to stderr.
    pub detail: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// 1-based index of the failing pass.
    pub pass: usize,
    pub total: usize,
    pub invocation: InvocationSpec,
}

impl fmt::Display for PassFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pass {} of {} failed: `{}` ",
            self.pass, self.total, self.invocation.program
        )?;
        match self.exit_code {
            Some(code) => write!(f, "exited with status {code}"),
            None => f.write_str("was terminated by a signal"),
        }
    }
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("{0}")]
    PassFailed(Box<PassFailure>),

    #[error("invalid run specification: {0}")]
    InvalidRunSpec(String),

    #[error("failed to launch `{engine}` in {}: {source}", working_dir.display())]
    Launch {
        engine: String,
        working_dir: PathBuf,
        source: io::Error,
    },
}

impl CompileError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::PassFailed(_) => ExitCode::PassFailed,
            Self::InvalidRunSpec(_) => ExitCode::InvalidRunSpec,
            Self::Launch { .. } => ExitCode::Launch,
        }
    }

    /// The failing pass, when the engine itself reported the failure.
    pub fn pass_failure(&self) -> Option<&PassFailure> {
        match self {
            Self::PassFailed(failure) => Some(failure.as_ref()),
            _ => None,
        }
    }
}

pub type CompileResult<T> = Result<T, CompileError>;
