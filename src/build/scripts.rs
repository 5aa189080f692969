//! Script bundling.
//!
//! Runs the bundle stages for one target: expand the File Set, compile each
//! file, minify, concatenate, attach the source map and write the results.

use crate::build::output::StagedOutput;
use crate::build::{expand_patterns, BuildContext, BuildError};
use crate::bundle::{concat, Bundle, Part};
use crate::compiler::{compile, CompileOptions, Compiled};
use crate::config::{BundleConfig, SourceMapMode};
use crate::minify::{minify, MinifyOptions};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

const INLINE_MAP_PREFIX: &str = "data:application/json;charset=utf-8;base64,";

/// What a finished bundle run produced.
#[derive(Debug, Clone, Default)]
pub struct BundleOutcome {
    /// Files written, bundle first
    pub outputs: Vec<PathBuf>,
    /// Number of source files in the bundle
    pub files: usize,
    /// Non-fatal problems, such as empty patterns under `on_empty = "warn"`
    pub warnings: Vec<String>,
}

/// Build the bundle described by `config` into `output`.
///
/// Nothing is written unless every stage succeeds.
pub fn build_bundle(
    ctx: &BuildContext,
    config: &BundleConfig,
    output: &Path,
) -> Result<BundleOutcome, BuildError> {
    let expansion = expand_patterns(ctx.project_root(), &config.sources, config.on_empty)?;
    let warnings = expansion
        .warnings
        .iter()
        .map(|pattern| format!("no files match pattern '{}'", pattern))
        .collect();

    let compiled = compile_all(ctx, config, &expansion.files)?;

    let minify_options =
        MinifyOptions { preserve_license_comments: config.preserve_license_comments };
    let mut parts = Vec::with_capacity(compiled.len());
    for (path, unit) in expansion.files.iter().zip(compiled) {
        let minified = minify(&unit.js, &unit.map, &minify_options)
            .map_err(|source| BuildError::Minify { path: path.clone(), source })?;
        tracing::debug!(file = %ctx.display_path(path), bytes = minified.code.len(), "minified");
        parts.push(Part { code: minified.code, map: minified.map });
    }

    let mut bundle = concat(&config.file, &parts);
    bundle.map.set_source_root(config.source_root.clone());
    if !config.include_content {
        bundle.map.clear_sources_content();
    }

    let (code, map) = finalize_source_map(bundle, &config.file, config.source_map);

    let mut stage = StagedOutput::new();
    stage.write(output, code.as_bytes())?;
    if let Some(map) = map {
        let map_path = output.with_file_name(map_file_name(&config.file));
        stage.write(&map_path, map.as_bytes())?;
    }
    let outputs = stage.commit()?;

    Ok(BundleOutcome { outputs, files: expansion.files.len(), warnings })
}

/// Compile `files` in parallel. Results keep file order, so the reported
/// error is the first failing file in the File Set.
pub fn compile_all(
    ctx: &BuildContext,
    config: &BundleConfig,
    files: &[PathBuf],
) -> Result<Vec<Compiled>, BuildError> {
    files
        .par_iter()
        .map(|path| {
            let source = fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
            let options = CompileOptions::new(ctx.display_path(path))
                .with_bare(config.bare)
                .with_filename(config.file.clone())
                .with_content(config.include_content);
            let compiled = compile(&source, &options).map_err(|e| BuildError::compile(path, e))?;
            tracing::debug!(file = %ctx.display_path(path), "compiled");
            Ok(compiled)
        })
        .collect::<Vec<_>>()
        .into_iter()
        .collect()
}

/// Name of the external map written next to `file`.
pub fn map_file_name(file: &str) -> String {
    format!("{}.map", file)
}

/// Attach the map to the bundle code according to `mode`.
///
/// Returns the final bundle code and, for external maps, the map JSON to
/// write beside it.
pub fn finalize_source_map(bundle: Bundle, file: &str, mode: SourceMapMode) -> (String, Option<String>) {
    let Bundle { mut code, map } = bundle;

    let url = match mode {
        SourceMapMode::None => return (code, None),
        SourceMapMode::External => map_file_name(file),
        SourceMapMode::Inline => format!("{}{}", INLINE_MAP_PREFIX, STANDARD.encode(map.to_json())),
    };

    if !code.is_empty() && !code.ends_with('\n') {
        code.push('\n');
    }
    code.push_str("//# sourceMappingURL=");
    code.push_str(&url);

    match mode {
        SourceMapMode::External => (code, Some(map.to_json())),
        _ => (code, None),
    }
}
