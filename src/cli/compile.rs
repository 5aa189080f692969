//! Compile command implementation

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use super::{EXIT_ERROR, EXIT_SUCCESS};
use crate::build::{finalize_source_map, BuildError};
use crate::bundle::Bundle;
use crate::compiler::{compile, CompileOptions};
use crate::config::SourceMapMode;

/// Run the compile command
pub fn run_compile(file: &Path, bare: bool, map: bool) -> ExitCode {
    let source = match fs::read_to_string(file) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error: {}", BuildError::io(file, e));
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let js_name = file.with_extension("js");
    let js_name = js_name.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let options = CompileOptions::new(file.to_string_lossy().replace('\\', "/"))
        .with_bare(bare)
        .with_filename(js_name.clone())
        .with_content(true);

    match compile(&source, &options) {
        Ok(compiled) => {
            let code = if map {
                let bundle = Bundle { code: compiled.js, map: compiled.map };
                let (code, _) = finalize_source_map(bundle, &js_name, SourceMapMode::Inline);
                format!("{}\n", code)
            } else {
                compiled.js
            };
            print!("{}", code);
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {}", BuildError::compile(file, e));
            ExitCode::from(EXIT_ERROR)
        }
    }
}
