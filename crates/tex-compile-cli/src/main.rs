use std::process;

use tex_compile_core::ExitCode;

fn main() {
    match tex_compile_cli::run() {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("tex-compile error: {err:#}");
            process::exit(ExitCode::Io as i32);
        }
    }
}
