use std::path::{Path, PathBuf};

/// Extension of the file produced by the default engine.
pub const OUTPUT_EXTENSION: &str = "pdf";

/// Path of the engine's output for `input`: same directory and stem, with the
/// extension swapped (or added) for `extension`.
pub fn output_path(input: &Path, extension: &str) -> PathBuf {
    input.with_extension(extension.trim_start_matches('.'))
}

/// Directory the engine runs in. Auxiliary files land here, and later passes
/// read them back from here.
pub fn working_dir(input: &Path) -> PathBuf {
    match input.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
