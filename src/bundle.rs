//! Concatenation of minified parts into one bundle

use crate::sourcemap::SourceMap;

/// Separator placed between concatenated parts.
pub const SEPARATOR: &str = "\n";

/// One input of a bundle, already minified.
#[derive(Debug, Clone)]
pub struct Part {
    pub code: String,
    pub map: SourceMap,
}

/// A concatenated bundle and its merged map.
#[derive(Debug, Clone)]
pub struct Bundle {
    pub code: String,
    pub map: SourceMap,
}

/// Join `parts` in order with [`SEPARATOR`] under the bundle file name `file`.
///
/// Each part's mappings are shifted down by the number of lines that precede
/// it. Sources and their contents are merged, so a file that appears in two
/// parts keeps a single `sources` entry.
pub fn concat(file: &str, parts: &[Part]) -> Bundle {
    let mut code = String::new();
    let mut map = SourceMap::new().with_file(file);
    let mut line_offset = 0u32;

    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            code.push_str(SEPARATOR);
            line_offset += 1;
        }
        map.append(&part.map, line_offset);
        code.push_str(&part.code);
        line_offset += part.code.matches('\n').count() as u32;
    }

    Bundle { code, map }
}
