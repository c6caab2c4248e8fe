use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tex_compile_config::{Config, ConfigError, ConfigSourceKind, LoadOptions};
use tex_compile_core::{RunEntry, DEFAULT_ENGINE};

fn write_file(path: impl AsRef<Path>, contents: &str) {
    let mut file = fs::File::create(path).expect("create config");
    file.write_all(contents.as_bytes()).expect("write config");
}

fn canonical(path: impl AsRef<Path>) -> PathBuf {
    fs::canonicalize(path).expect("canonicalize path")
}

#[test]
fn loads_defaults_when_no_files_present() {
    let temp = TempDir::new().expect("tempdir");
    let working_dir = canonical(temp.path());

    let config = Config::load(LoadOptions::default().with_working_dir(working_dir.clone()))
        .expect("load defaults");

    assert_eq!(config.engine.name, DEFAULT_ENGINE);
    assert_eq!(config.engine.output_extension, "pdf");
    assert!(config.runs.is_none());
    assert_eq!(config.working_dir, working_dir);
    assert_eq!(config.layers.len(), 1);
    assert_eq!(config.layers[0].kind, ConfigSourceKind::Builtin);
}

#[test]
fn applies_precedence_and_replaces_runs() {
    let temp = TempDir::new().expect("tempdir");
    let git_root = canonical(temp.path());
    fs::create_dir(git_root.join(".git")).expect("create .git");

    write_file(
        git_root.join(".tex-compile.toml"),
        r#"
        [engine]
        name = "lualatex"
        output_extension = "pdf"

        [[runs]]
        runs = 1
        options = ["-draftmode"]

        [[runs]]
        runs = 2
        "#,
    );

    let workspace = git_root.join("thesis");
    fs::create_dir(&workspace).expect("create workspace");

    write_file(
        workspace.join(".tex-compile.toml"),
        r#"
        [[runs]]
        runs = 3
        options = "-shell-escape"
        "#,
    );

    let config = Config::load(LoadOptions::default().with_working_dir(&workspace))
        .expect("load config with precedence");

    assert_eq!(config.engine.name, "lualatex");
    assert_eq!(
        config.run_entries(),
        Some(&[RunEntry::single(3, "-shell-escape")][..])
    );
    let runs_source = &config.runs.as_ref().expect("runs").source;
    assert_eq!(runs_source.kind, ConfigSourceKind::Local);

    let kinds: Vec<_> = config.layers.iter().map(|l| l.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ConfigSourceKind::Builtin,
            ConfigSourceKind::GitRoot,
            ConfigSourceKind::Local
        ]
    );
}

#[test]
fn override_file_wins() {
    let temp = TempDir::new().expect("tempdir");
    let working_dir = canonical(temp.path());

    write_file(
        working_dir.join(".tex-compile.toml"),
        r#"
        [engine]
        name = "xelatex"
        "#,
    );
    let override_path = working_dir.join("ci.toml");
    write_file(
        &override_path,
        r#"
        [engine]
        name = "pdflatex"
        output_extension = "dvi"
        "#,
    );

    let config = Config::load(
        LoadOptions::default()
            .with_working_dir(&working_dir)
            .with_override_path("ci.toml"),
    )
    .expect("load config with override");

    assert_eq!(config.engine.name, "pdflatex");
    assert_eq!(config.engine.output_extension, "dvi");
    assert_eq!(
        config.layers.last().map(|l| l.kind),
        Some(ConfigSourceKind::Override)
    );
}

#[test]
fn missing_override_is_an_error() {
    let temp = TempDir::new().expect("tempdir");

    let err = Config::load(
        LoadOptions::default()
            .with_working_dir(temp.path())
            .with_override_path("missing.toml"),
    )
    .unwrap_err();

    assert!(matches!(err, ConfigError::OverrideNotFound { .. }));
}

#[test]
fn malformed_toml_reports_path() {
    let temp = TempDir::new().expect("tempdir");
    let working_dir = canonical(temp.path());
    write_file(working_dir.join(".tex-compile.toml"), "[engine\nname = ");

    let err = Config::load(LoadOptions::default().with_working_dir(&working_dir)).unwrap_err();

    match err {
        ConfigError::Parse { path, .. } => {
            assert_eq!(path, working_dir.join(".tex-compile.toml"))
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn fractional_repeat_count_is_rejected() {
    let temp = TempDir::new().expect("tempdir");
    let working_dir = canonical(temp.path());
    write_file(
        working_dir.join(".tex-compile.toml"),
        r#"
        [[runs]]
        runs = 1.5
        "#,
    );

    let err = Config::load(LoadOptions::default().with_working_dir(&working_dir)).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn validation_messages_name_their_source() {
    let temp = TempDir::new().expect("tempdir");
    let working_dir = canonical(temp.path());
    write_file(
        working_dir.join(".tex-compile.toml"),
        r#"
        runs = []
        "#,
    );

    let err = Config::load(LoadOptions::default().with_working_dir(&working_dir)).unwrap_err();

    let rendered = err.to_string();
    assert!(rendered.contains("runs: must contain at least one entry"));
    assert!(rendered.contains("local config at"));
}

#[test]
fn override_naming_the_local_file_is_read_once() {
    let temp = TempDir::new().expect("tempdir");
    let working_dir = canonical(temp.path());
    write_file(
        working_dir.join(".tex-compile.toml"),
        r#"
        [engine]
        name = "xelatex"
        "#,
    );

    let config = Config::load(
        LoadOptions::default()
            .with_working_dir(&working_dir)
            .with_override_path(".tex-compile.toml"),
    )
    .expect("load config");

    assert_eq!(config.engine.name, "xelatex");
    let kinds: Vec<_> = config.layers.iter().map(|l| l.kind).collect();
    assert_eq!(
        kinds,
        vec![ConfigSourceKind::Builtin, ConfigSourceKind::Override]
    );
}
