use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde_json::json;
use tex_compile_config::{Config, LoadOptions};
use tex_compile_core::{default_run_plan, CompileError, Compiler, ExitCode, RunEntry, RunPlan};

mod logging;

#[derive(Parser, Debug)]
#[command(
    name = "tex-compile",
    version,
    about = "Run a TeX engine over a document until every pass succeeds",
    long_about = None
)]
pub struct Cli {
    /// Path to the source document
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Engine binary to launch (default: pdflatex, or the configured engine)
    #[arg(short, long, value_name = "NAME")]
    engine: Option<String>,

    /// Run entry as N or N:OPT[,OPT...]; repeat for more entries.
    /// Options are split on commas, so an option that itself contains a comma
    /// has to be declared in a config file instead
    #[arg(
        short = 'r',
        long = "run",
        value_name = "SPEC",
        value_parser = parse_run_entry,
        allow_hyphen_values = true
    )]
    runs: Vec<RunEntry>,

    /// Ignore configured runs and use the built-in two-pass plan
    #[arg(long = "default-runs", conflicts_with = "runs")]
    default_runs: bool,

    /// Config file applied over the .tex-compile.toml layers, which are found
    /// from the current directory (and its git root), not the document's
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print the plan without launching the engine
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Rendering used by --dry-run
    #[arg(long, value_enum, default_value_t = PlanFormat::Plain)]
    format: PlanFormat,

    /// Log each pass to stderr
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Do not print the output path on success
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PlanFormat {
    Plain,
    Json,
}

/// Entry point for CLI execution. Returns the desired exit code.
pub fn run() -> Result<i32> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let input = match fs::canonicalize(&cli.file) {
        Ok(path) => path,
        Err(err) => {
            eprintln!("cannot read {}: {err}", cli.file.display());
            return Ok(ExitCode::Io as i32);
        }
    };

    let mut load = LoadOptions::default();
    if let Some(path) = &cli.config {
        load = load.with_override_path(path);
    }
    let config = match Config::load(load) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return Ok(ExitCode::Config as i32);
        }
    };

    let compiler = build_compiler(&cli, &config, input);

    if cli.dry_run {
        return handle_dry_run(&compiler, cli.format);
    }

    match compiler.run() {
        Ok(outcome) => {
            if !cli.quiet {
                emit(&outcome.output_path.display().to_string())?;
            }
            Ok(ExitCode::Success as i32)
        }
        Err(err) => report_failure(&err),
    }
}

fn build_compiler(cli: &Cli, config: &Config, input: PathBuf) -> Compiler {
    let mut compiler = config.compiler(input);
    if let Some(engine) = &cli.engine {
        compiler = compiler.engine(engine.clone());
    }
    if cli.default_runs {
        compiler = compiler.runs(default_run_plan());
    } else if !cli.runs.is_empty() {
        compiler = compiler.runs(cli.runs.clone());
    }
    compiler
}

fn handle_dry_run(compiler: &Compiler, format: PlanFormat) -> Result<i32> {
    let plan = match compiler.plan() {
        Ok(plan) => plan,
        Err(err) => return report_failure(&err),
    };

    let rendered = match format {
        PlanFormat::Plain => render_plain(&plan),
        PlanFormat::Json => render_json(compiler, &plan)?,
    };
    emit(&rendered)?;
    Ok(ExitCode::Success as i32)
}

fn render_plain(plan: &RunPlan) -> String {
    let total = plan.len();
    plan.iter()
        .enumerate()
        .map(|(idx, inv)| {
            format!(
                "[{}/{total}] (cd {}) {}",
                idx + 1,
                inv.working_dir.display(),
                inv.command_line()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_json(compiler: &Compiler, plan: &RunPlan) -> Result<String> {
    let invocations: Vec<_> = plan
        .iter()
        .map(|inv| {
            json!({
                "program": inv.program,
                "args": inv.args,
                "working_dir": inv.working_dir.display().to_string(),
            })
        })
        .collect();
    let document = json!({
        "input": compiler.input().display().to_string(),
        "output": compiler.output_path().display().to_string(),
        "invocations": invocations,
    });
    serde_json::to_string_pretty(&document).context("Failed to render plan as JSON")
}

fn report_failure(err: &CompileError) -> Result<i32> {
    if let Some(failure) = err.pass_failure() {
        // The engine's stdout transcript is the primary diagnostic.
        if !failure.message.is_empty() {
            emit(failure.message.trim_end())?;
        }
        if !failure.detail.is_empty() {
            eprintln!("{}", failure.detail.trim_end());
        }
    }
    eprintln!("tex-compile: {err}");
    Ok(err.exit_code() as i32)
}

fn emit(content: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    match writeln!(handle, "{content}") {
        Ok(_) => {}
        Err(err) if should_ignore_pipe_error(&err) => return Ok(()),
        Err(err) => return Err(err).context("Failed to write output"),
    }
    match handle.flush() {
        Ok(_) => Ok(()),
        Err(err) if should_ignore_pipe_error(&err) => Ok(()),
        Err(err) => Err(err).context("Failed to flush stdout"),
    }
}

fn should_ignore_pipe_error(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::BrokenPipe)
}

/// Parse `N` or `N:OPT[,OPT...]` into a run entry.
fn parse_run_entry(value: &str) -> Result<RunEntry, String> {
    let (count, options) = match value.split_once(':') {
        Some((count, options)) => (count, Some(options)),
        None => (value, None),
    };

    let runs = match count.trim().parse::<u32>() {
        Ok(runs) if runs >= 1 => runs,
        _ => {
            return Err(format!(
                "repeat count must be a positive integer, got '{}'",
                count.trim()
            ))
        }
    };

    Ok(match options {
        None => RunEntry::with_default_options(runs),
        Some(options) => RunEntry::new(
            runs,
            options
                .split(',')
                .map(str::trim)
                .filter(|opt| !opt.is_empty()),
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_count_as_default_options() {
        assert_eq!(
            parse_run_entry("3").unwrap(),
            RunEntry::with_default_options(3)
        );
    }

    #[test]
    fn parses_count_with_options() {
        assert_eq!(
            parse_run_entry("1:-draftmode").unwrap(),
            RunEntry::single(1, "-draftmode")
        );
        assert_eq!(
            parse_run_entry("2:-shell-escape, -synctex=1").unwrap(),
            RunEntry::new(2, ["-shell-escape", "-synctex=1"])
        );
    }

    #[test]
    fn empty_option_list_means_no_options() {
        assert_eq!(
            parse_run_entry("1:").unwrap(),
            RunEntry::new(1, Vec::<String>::new())
        );
    }

    #[test]
    fn options_split_on_every_comma() {
        assert_eq!(
            parse_run_entry("1:-output-comment=a,b").unwrap(),
            RunEntry::new(1, ["-output-comment=a", "b"])
        );
    }

    #[test]
    fn help_describes_comma_splitting_and_config_discovery() {
        use clap::CommandFactory;

        let help = Cli::command().render_long_help().to_string();
        assert!(help.contains("contains a comma"));
        assert!(help.contains("not the document's"));
    }

    #[test]
    fn rejects_bad_counts() {
        for value in ["0", "-1", "two", "1.5:-x", ""] {
            assert!(parse_run_entry(value).is_err(), "accepted {value:?}");
        }
    }

    #[test]
    fn plain_plan_lists_each_pass() {
        let compiler =
            Compiler::new("/docs/paper.tex").runs(vec![RunEntry::single(2, "-draftmode")]);
        let plan = compiler.plan().unwrap();

        assert_eq!(
            render_plain(&plan),
            "[1/2] (cd /docs) pdflatex -draftmode /docs/paper.tex\n\
             [2/2] (cd /docs) pdflatex -draftmode /docs/paper.tex"
        );
    }
}
