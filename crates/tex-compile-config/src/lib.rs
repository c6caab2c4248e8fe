//! Configuration loader for tex-compile.
//!
//! Settings are resolved from a stack of `.tex-compile.toml` layers:
//! override flag → working directory → git root → built-in defaults.
//! Each layer only replaces the keys it sets; a `runs` array replaces the
//! whole array from lower layers. Parsed values are checked and converted to
//! core types so callers never touch raw TOML.

use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tex_compile_core::{Compiler, RunEntry, DEFAULT_ENGINE, OUTPUT_EXTENSION};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = ".tex-compile.toml";

/// Complete configuration resolved from defaults and on-disk overrides.
#[derive(Clone, Debug)]
pub struct Config {
    pub engine: EngineSettings,
    /// `None` when no layer declares `runs`; the built-in plan applies.
    pub runs: Option<RunSettings>,
    /// Directory the layers were discovered from.
    pub working_dir: PathBuf,
    /// Layers that contributed, lowest precedence first.
    pub layers: Vec<ConfigSource>,
}

/// Which engine binary to launch and what it produces.
#[derive(Clone, Debug)]
pub struct EngineSettings {
    pub name: String,
    pub output_extension: String,
}

/// Run specification declared by one of the layers.
#[derive(Clone, Debug)]
pub struct RunSettings {
    pub entries: Vec<RunEntry>,
    pub source: ConfigSource,
}

impl Config {
    /// Discover `.tex-compile.toml` layers around the working directory and
    /// resolve them on top of the built-in defaults.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let working_dir = match options.working_dir {
            Some(dir) => fs::canonicalize(&dir)
                .map_err(|source| ConfigError::WorkingDirectory { path: dir, source })?,
            None => env::current_dir().map_err(|source| ConfigError::WorkingDirectory {
                path: PathBuf::from("."),
                source,
            })?,
        };

        let override_path = options.override_path.map(|path| working_dir.join(path));
        if let Some(path) = &override_path {
            if !path.is_file() {
                return Err(ConfigError::OverrideNotFound { path: path.clone() });
            }
        }

        let mut layers = Vec::new();
        for (kind, path) in discover_layers(&working_dir, override_path) {
            let source = ConfigSource::file(kind, path.clone());
            let contents = fs::read_to_string(&path).map_err(|err| ConfigError::Read {
                path: path.clone(),
                source: err,
            })?;
            let partial = parse_layer(&contents, &source)
                .map_err(|err| ConfigError::Parse { path, source: err })?;
            layers.push((source, partial));
        }

        Self::resolve(working_dir, layers)
    }

    /// Parse a single TOML document on top of the built-in defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let source = ConfigSource::inline();
        let partial = parse_layer(contents, &source).map_err(|err| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source: err,
        })?;
        Self::resolve(PathBuf::from("."), vec![(source, partial)])
    }

    fn resolve(
        working_dir: PathBuf,
        layers: Vec<(ConfigSource, PartialConfig)>,
    ) -> Result<Self, ConfigError> {
        let builtin = ConfigSource::builtin();
        let mut merged = PartialConfig {
            engine_name: Some(Located::new(DEFAULT_ENGINE.to_string(), builtin.clone())),
            output_extension: Some(Located::new(OUTPUT_EXTENSION.to_string(), builtin.clone())),
            runs: None,
        };
        let mut sources = vec![builtin];
        for (source, partial) in layers {
            merged.merge(partial);
            sources.push(source);
        }

        let (engine, runs) = merged.finalize().map_err(ConfigError::Invalid)?;
        Ok(Config {
            engine,
            runs,
            working_dir,
            layers: sources,
        })
    }

    /// Configured run entries, if any layer declared them.
    pub fn run_entries(&self) -> Option<&[RunEntry]> {
        self.runs.as_ref().map(|runs| runs.entries.as_slice())
    }

    /// A compiler for `input` carrying the configured engine, output extension
    /// and run specification.
    pub fn compiler(&self, input: impl Into<PathBuf>) -> Compiler {
        let compiler = Compiler::new(input)
            .engine(self.engine.name.clone())
            .output_extension(self.engine.output_extension.clone());
        match &self.runs {
            Some(runs) => compiler.runs(runs.entries.clone()),
            None => compiler,
        }
    }
}

/// On-disk layers in precedence order: git root, working directory, override.
/// A file reachable through more than one route is read once, at its highest
/// precedence.
fn discover_layers(
    working_dir: &Path,
    override_path: Option<PathBuf>,
) -> Vec<(ConfigSourceKind, PathBuf)> {
    let local = working_dir.join(CONFIG_FILE_NAME);
    let git = working_dir
        .ancestors()
        .find(|dir| dir.join(".git").exists())
        .map(|root| root.join(CONFIG_FILE_NAME));

    let mut layers = Vec::new();
    if let Some(git) = git.filter(|path| path.is_file() && *path != local) {
        layers.push((ConfigSourceKind::GitRoot, git));
    }
    if local.is_file() {
        layers.push((ConfigSourceKind::Local, local));
    }
    if let Some(path) = override_path {
        layers.retain(|(_, existing)| *existing != path);
        layers.push((ConfigSourceKind::Override, path));
    }
    layers
}

fn parse_layer(contents: &str, source: &ConfigSource) -> Result<PartialConfig, toml::de::Error> {
    let raw: RawConfig = toml::from_str(contents)?;
    Ok(raw.into_partial(source))
}

/// Where a configuration value came from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConfigSource {
    pub kind: ConfigSourceKind,
    pub path: Option<PathBuf>,
}

impl ConfigSource {
    fn builtin() -> Self {
        ConfigSource {
            kind: ConfigSourceKind::Builtin,
            path: None,
        }
    }

    fn inline() -> Self {
        ConfigSource {
            kind: ConfigSourceKind::Inline,
            path: None,
        }
    }

    fn file(kind: ConfigSourceKind, path: PathBuf) -> Self {
        ConfigSource {
            kind,
            path: Some(path),
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{} at {}", self.kind, path.display()),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// Layer kinds, lowest precedence first.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfigSourceKind {
    Builtin,
    GitRoot,
    Local,
    Override,
    /// A document handed to [`Config::from_toml_str`].
    Inline,
}

impl fmt::Display for ConfigSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfigSourceKind::Builtin => "built-in defaults",
            ConfigSourceKind::GitRoot => "git-root config",
            ConfigSourceKind::Local => "local config",
            ConfigSourceKind::Override => "override config",
            ConfigSourceKind::Inline => "inline config",
        })
    }
}

/// Loader options, typically supplied by the CLI layer.
#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub override_path: Option<PathBuf>,
    /// Defaults to the process's current directory.
    pub working_dir: Option<PathBuf>,
}

impl LoadOptions {
    pub fn with_override_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.override_path = Some(path.into());
        self
    }

    pub fn with_working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(path.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot use {} as the working directory: {source}", path.display())]
    WorkingDirectory { path: PathBuf, source: io::Error },
    #[error("config file {} does not exist", path.display())]
    OverrideNotFound { path: PathBuf },
    #[error("cannot read config {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("invalid TOML in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid configuration:\n{0}")]
    Invalid(ConfigIssues),
}

#[derive(Clone, Debug)]
struct Located<T> {
    value: T,
    source: ConfigSource,
}

impl<T> Located<T> {
    fn new(value: T, source: ConfigSource) -> Self {
        Located { value, source }
    }
}

#[derive(Clone, Debug)]
struct PartialConfig {
    engine_name: Option<Located<String>>,
    output_extension: Option<Located<String>>,
    runs: Option<Located<Vec<RawRunEntry>>>,
}

impl PartialConfig {
    fn merge(&mut self, other: PartialConfig) {
        if other.engine_name.is_some() {
            self.engine_name = other.engine_name;
        }
        if other.output_extension.is_some() {
            self.output_extension = other.output_extension;
        }
        if other.runs.is_some() {
            self.runs = other.runs;
        }
    }

    fn finalize(self) -> Result<(EngineSettings, Option<RunSettings>), ConfigIssues> {
        let mut issues = Vec::new();

        let name = self
            .engine_name
            .map(|located| non_empty(located, "engine.name", &mut issues))
            .unwrap_or_else(|| DEFAULT_ENGINE.to_string());

        let output_extension = self
            .output_extension
            .map(|located| non_empty(located, "engine.output_extension", &mut issues))
            .map(|ext| ext.trim_start_matches('.').to_string())
            .unwrap_or_else(|| OUTPUT_EXTENSION.to_string());

        let runs = self.runs.map(|located| RunSettings {
            entries: finalize_runs(&located, &mut issues),
            source: located.source,
        });

        if !issues.is_empty() {
            return Err(ConfigIssues(issues));
        }
        let engine = EngineSettings {
            name,
            output_extension,
        };
        Ok((engine, runs))
    }
}

fn non_empty(located: Located<String>, field: &str, issues: &mut Vec<ConfigIssue>) -> String {
    let value = located.value.trim().to_string();
    if value.is_empty() {
        issues.push(ConfigIssue::new(field, "must not be empty", located.source));
    }
    value
}

fn finalize_runs(
    located: &Located<Vec<RawRunEntry>>,
    issues: &mut Vec<ConfigIssue>,
) -> Vec<RunEntry> {
    if located.value.is_empty() {
        issues.push(ConfigIssue::new(
            "runs",
            "must contain at least one entry",
            located.source.clone(),
        ));
        return Vec::new();
    }

    let mut entries = Vec::with_capacity(located.value.len());
    for (idx, raw) in located.value.iter().enumerate() {
        let runs = match u32::try_from(raw.runs) {
            Ok(runs) if runs >= 1 => runs,
            _ => {
                issues.push(ConfigIssue::new(
                    format!("runs[{idx}].runs"),
                    format!("repeat count must be a positive integer, got {}", raw.runs),
                    located.source.clone(),
                ));
                continue;
            }
        };

        entries.push(match &raw.options {
            None => RunEntry::with_default_options(runs),
            Some(RawOptions::One(option)) => RunEntry::single(runs, option.clone()),
            Some(RawOptions::Many(options)) => RunEntry::new(runs, options.iter().cloned()),
        });
    }
    entries
}

/// Every problem found while validating the merged layers, one per line.
#[derive(Debug)]
pub struct ConfigIssues(pub Vec<ConfigIssue>);

impl ConfigIssues {
    pub fn iter(&self) -> impl Iterator<Item = &ConfigIssue> {
        self.0.iter()
    }
}

impl fmt::Display for ConfigIssues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self.0.iter().map(|issue| format!("- {issue}")).collect();
        f.write_str(&lines.join("\n"))
    }
}

/// A rejected value: the TOML key, what is wrong with it, and the layer that
/// set it.
#[derive(Clone, Debug)]
pub struct ConfigIssue {
    pub field: String,
    pub message: String,
    pub source: ConfigSource,
}

impl ConfigIssue {
    fn new(field: impl Into<String>, message: impl Into<String>, source: ConfigSource) -> Self {
        ConfigIssue {
            field: field.into(),
            message: message.into(),
            source,
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.field, self.message, self.source)
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    engine: Option<RawEngine>,
    #[serde(default)]
    runs: Option<Vec<RawRunEntry>>,
}

impl RawConfig {
    fn into_partial(self, source: &ConfigSource) -> PartialConfig {
        let (engine_name, output_extension) = match self.engine {
            Some(engine) => (
                engine.name.map(|value| Located::new(value, source.clone())),
                engine
                    .output_extension
                    .map(|value| Located::new(value, source.clone())),
            ),
            None => (None, None),
        };
        PartialConfig {
            engine_name,
            output_extension,
            runs: self.runs.map(|value| Located::new(value, source.clone())),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawEngine {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    output_extension: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
struct RawRunEntry {
    runs: i64,
    #[serde(default)]
    options: Option<RawOptions>,
}

/// `options = "-x"` and `options = ["-x", "-y"]` are both accepted.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum RawOptions {
    One(String),
    Many(Vec<String>),
}
