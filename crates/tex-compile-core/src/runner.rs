use log::{debug, info, warn};

use crate::error::{CompileError, CompileResult, PassFailure};
use crate::launcher::Launcher;
use crate::plan::RunPlan;

/// Execute `plan` one pass at a time and return the number of passes run.
///
/// Pass `i + 1` is launched only after pass `i` has exited with status 0. The
/// first launch error or non-zero exit ends the sequence; nothing after it is
/// started.
pub fn run_plan(plan: &RunPlan, launcher: &dyn Launcher) -> CompileResult<usize> {
    let total = plan.len();

    for (idx, spec) in plan.iter().enumerate() {
        let pass = idx + 1;
        info!(
            "pass {pass}/{total}: {} (in {})",
            spec.command_line(),
            spec.working_dir.display()
        );

        let output = launcher
            .launch(spec)
            .map_err(|source| CompileError::Launch {
                engine: spec.program.clone(),
                working_dir: spec.working_dir.clone(),
                source,
            })?;

        if !output.succeeded() {
            let failure = PassFailure {
                message: output.stdout,
                detail: output.stderr,
                exit_code: output.exit_code,
                pass,
                total,
                invocation: spec.clone(),
            };
            warn!("{failure}");
            return Err(CompileError::PassFailed(Box::new(failure)));
        }

        debug!(
            "pass {pass}/{total} finished ({} bytes stdout, {} bytes stderr)",
            output.stdout.len(),
            output.stderr.len()
        );
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::{PassOutput, RecordingLauncher};
    use crate::plan::RunEntry;
    use std::io;
    use std::path::Path;

    fn plan(runs: &[RunEntry]) -> RunPlan {
        RunPlan::build("pdflatex", Path::new("paper.tex"), Path::new("."), Some(runs)).unwrap()
    }

    #[test]
    fn runs_every_pass_when_all_succeed() {
        let plan = plan(&[RunEntry::single(2, "-draftmode"), RunEntry::single(1, "-x")]);
        let launcher = RecordingLauncher::new();

        let passes = run_plan(&plan, &launcher).unwrap();

        assert_eq!(passes, 3);
        assert_eq!(launcher.launched(), plan.invocations().to_vec());
    }

    #[test]
    fn stops_at_first_failure() {
        let plan = plan(&[RunEntry::single(3, "-x")]);
        let launcher = RecordingLauncher::with_outcomes(vec![
            Ok(PassOutput::success()),
            Ok(PassOutput::failure(
                1,
                "! Undefined control sequence.",
                "warning on stderr",
            )),
        ]);

        let err = run_plan(&plan, &launcher).unwrap_err();

        assert_eq!(launcher.launch_count(), 2);
        let failure = err.pass_failure().expect("pass failure");
        assert_eq!(failure.message, "! Undefined control sequence.");
        assert_eq!(failure.detail, "warning on stderr");
        assert_eq!(failure.exit_code, Some(1));
        assert_eq!(failure.pass, 2);
        assert_eq!(failure.total, 3);
        assert_eq!(failure.invocation, plan.invocations()[1]);
    }

    #[test]
    fn signal_termination_fails_the_pass() {
        let plan = plan(&[RunEntry::single(2, "-x")]);
        let launcher = RecordingLauncher::with_outcomes(vec![Ok(PassOutput {
            stdout: "partial".into(),
            stderr: String::new(),
            exit_code: None,
        })]);

        let err = run_plan(&plan, &launcher).unwrap_err();

        assert_eq!(launcher.launch_count(), 1);
        let failure = err.pass_failure().expect("pass failure");
        assert_eq!(failure.exit_code, None);
        assert_eq!(failure.message, "partial");
    }

    #[test]
    fn launch_error_stops_the_sequence() {
        let plan = plan(&[RunEntry::single(2, "-x")]);
        let launcher = RecordingLauncher::with_outcomes(vec![Err(io::Error::from(
            io::ErrorKind::NotFound,
        ))]);

        let err = run_plan(&plan, &launcher).unwrap_err();

        assert_eq!(launcher.launch_count(), 1);
        match err {
            CompileError::Launch { engine, source, .. } => {
                assert_eq!(engine, "pdflatex");
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
