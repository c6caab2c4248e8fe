//! Shared test harness utilities for tex-compile crates.
//!
//! [`FakeEngine`] writes a small POSIX shell script that stands in for a TeX
//! engine. Every launch appends one record to a log: the working directory and
//! each argument, every field NUL-terminated, then a newline. Tests read it back
//! to see which passes ran, where, and with exactly which arguments.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// One recorded launch of a [`FakeEngine`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedLaunch {
    pub cwd: PathBuf,
    pub args: Vec<String>,
}

/// Scripted stand-in for a typesetting engine binary.
pub struct FakeEngine {
    _dir: TempDir,
    script: PathBuf,
    log: PathBuf,
}

impl FakeEngine {
    /// Engine whose behaviour is `body`, run after the launch is logged. The
    /// script sees `$pass` (1-based launch number) and `$last` (final
    /// argument, the document path).
    pub fn new(body: &str) -> Self {
        let dir = TempDir::new().expect("tempdir");
        let script = dir.path().join("fake-engine");
        let log = dir.path().join("launches.log");
        let log_quoted = shell_quote(&log.to_string_lossy());

        let contents = format!(
            "#!/bin/sh\n\
             {{ printf '%s\\0' \"$(pwd)\" \"$@\"; printf '\\n'; }} >> {log_quoted}\n\
             pass=$(wc -l < {log_quoted} | tr -d ' ')\n\
             last=''\n\
             for arg in \"$@\"; do last=\"$arg\"; done\n\
             {body}\n"
        );
        fs::write(&script, contents).expect("write fake engine");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755))
            .expect("chmod fake engine");

        FakeEngine {
            _dir: dir,
            script,
            log,
        }
    }

    /// Engine that always succeeds and writes `<stem>.pdf` next to the input.
    pub fn succeeding() -> Self {
        Self::new(": > \"${last%.*}.pdf\"\nexit 0")
    }

    /// Engine that succeeds on every pass except `pass`, where it prints
    /// `stdout`/`stderr` and exits with `code`.
    pub fn failing_on_pass(pass: usize, code: i32, stdout: &str, stderr: &str) -> Self {
        Self::new(&format!(
            "if [ \"$pass\" -eq {pass} ]; then\n\
             printf '%s' {out}\n\
             printf '%s' {err} >&2\n\
             exit {code}\n\
             fi\n\
             : > \"${{last%.*}}.pdf\"\n\
             exit 0",
            out = shell_quote(stdout),
            err = shell_quote(stderr),
        ))
    }

    pub fn program(&self) -> String {
        self.script.to_string_lossy().into_owned()
    }

    /// Launches recorded so far, in order.
    pub fn launches(&self) -> Vec<RecordedLaunch> {
        let contents = match fs::read_to_string(&self.log) {
            Ok(contents) => contents,
            Err(_) => return Vec::new(),
        };
        contents
            .lines()
            .map(|record| {
                let record = record.strip_suffix('\0').unwrap_or(record);
                let mut fields = record.split('\0');
                let cwd = PathBuf::from(fields.next().unwrap_or_default());
                RecordedLaunch {
                    cwd,
                    args: fields.map(str::to_string).collect(),
                }
            })
            .collect()
    }
}

/// Write `contents` to `dir/relative`, creating parent directories.
pub fn write_document(dir: &Path, relative: &str, contents: &str) -> PathBuf {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent directory");
    }
    fs::write(&path, contents).expect("write document");
    path
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
