//! Compiler for the `.coffee` script dialect
//!
//! The pipeline is [`lexer::tokenize`] → [`parser::parse`] →
//! [`codegen::generate`]. Every generated line carries at least one mapping
//! back into the source, so a [`SourceMap`] lookup on compiled output always
//! resolves.

pub mod ast;
pub mod codegen;
pub mod emitter;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod token;

use thiserror::Error;

use crate::sourcemap::SourceMap;
use token::Pos;

/// Error compiling a source file. Line and column are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}, column {column}: {message}")]
pub struct CompileError {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

impl CompileError {
    pub fn new(message: impl Into<String>, pos: Pos) -> Self {
        Self { message: message.into(), line: pos.line + 1, column: pos.column + 1 }
    }
}

/// Options for compiling one file.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Skip the `(function() { ... }).call(this);` wrapper
    pub bare: bool,
    /// Name of the generated file, recorded as the map's `file`
    pub filename: Option<String>,
    /// Path of the source as it should appear in `sources`
    pub source_path: String,
    /// Embed the source text as `sourcesContent`
    pub include_content: bool,
}

impl CompileOptions {
    pub fn new(source_path: impl Into<String>) -> Self {
        Self { source_path: source_path.into(), ..Self::default() }
    }

    pub fn with_bare(mut self, bare: bool) -> Self {
        self.bare = bare;
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_content(mut self, include: bool) -> Self {
        self.include_content = include;
        self
    }
}

/// Compiled JavaScript and its source map.
#[derive(Debug, Clone)]
pub struct Compiled {
    pub js: String,
    pub map: SourceMap,
}

/// Compile one source file.
pub fn compile(source: &str, options: &CompileOptions) -> Result<Compiled, CompileError> {
    let tokens = lexer::tokenize(source)?;
    let body = parser::parse(tokens)?;
    let (js, mappings) = codegen::generate(&body, options.bare)?;

    let mut map = SourceMap::new();
    if let Some(filename) = &options.filename {
        map.set_file(filename.clone());
    }
    let content = if options.include_content { Some(source) } else { None };
    let source_index = map.add_source(&options.source_path, content);
    for mapping in mappings {
        map.add_mapping(crate::sourcemap::Mapping { source: source_index, ..mapping });
    }

    Ok(Compiled { js, map })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_wraps_by_default() {
        let out = compile("x = 1", &CompileOptions::new("x.coffee")).unwrap();
        assert!(out.js.starts_with("(function() {\n"));
        assert!(out.js.ends_with("}).call(this);\n"));
    }

    #[test]
    fn test_compile_records_source() {
        let options = CompileOptions::new("client/app.coffee")
            .with_bare(true)
            .with_filename("app.js")
            .with_content(true);
        let out = compile("square = (x) -> x * x", &options).unwrap();
        assert_eq!(out.map.file(), Some("app.js"));
        assert_eq!(out.map.sources(), ["client/app.coffee".to_string()]);
        assert_eq!(out.map.source_content(0), Some("square = (x) -> x * x"));
    }

    #[test]
    fn test_every_generated_line_is_mapped() {
        let source = "class Greeter\n  constructor: (@name) ->\n  greet: ->\n    \"Hi #{@name}\"\n";
        let out = compile(source, &CompileOptions::new("g.coffee")).unwrap();
        let lines = out.js.lines().filter(|l| !l.trim().is_empty()).count();
        assert_eq!(out.map.mapped_lines(), lines);
    }

    #[test]
    fn test_error_positions_are_one_based() {
        let err = compile("a = 1\nvar = 2", &CompileOptions::new("bad.coffee")).unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 1);
        assert!(err.to_string().starts_with("line 2, column 1:"));
    }
}
