//! Source Map v3 model
//!
//! A [`SourceMap`] is built up by the compiler, remapped by the minifier and
//! merged by the bundler. Positions are 0-based throughout; only the
//! human-facing error messages elsewhere use 1-based lines.

pub mod vlq;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Error reading a serialized source map.
#[derive(Debug, Error)]
pub enum SourceMapError {
    /// Invalid JSON document
    #[error("invalid source map JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// Unsupported `version` field
    #[error("unsupported source map version {0}")]
    Version(u32),
    /// Malformed `mappings` string
    #[error("invalid mappings at line {line}: {source}")]
    Mappings {
        line: u32,
        #[source]
        source: vlq::VlqError,
    },
    /// A segment with an unexpected number of fields
    #[error("segment with {0} fields at line {1}")]
    Segment(usize, u32),
}

/// One mapping segment: a generated position pointing back at an original one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    pub generated_line: u32,
    pub generated_column: u32,
    pub source: u32,
    pub original_line: u32,
    pub original_column: u32,
    pub name: Option<u32>,
}

impl Mapping {
    /// The same mapping moved to a new generated position.
    pub fn moved_to(&self, line: u32, column: u32) -> Self {
        Self { generated_line: line, generated_column: column, ..*self }
    }

    fn same_origin(&self, other: &Mapping) -> bool {
        self.source == other.source
            && self.original_line == other.original_line
            && self.original_column == other.original_column
            && self.name == other.name
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSourceMap {
    version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source_root: Option<String>,
    sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    sources_content: Vec<Option<String>>,
    #[serde(default)]
    names: Vec<String>,
    mappings: String,
}

/// An in-memory source map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceMap {
    file: Option<String>,
    source_root: Option<String>,
    sources: Vec<String>,
    sources_content: Vec<Option<String>>,
    names: Vec<String>,
    mappings: Vec<Mapping>,
    source_index: HashMap<String, u32>,
    name_index: HashMap<String, u32>,
}

impl SourceMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the generated file name recorded in the map.
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Set the `sourceRoot` field.
    pub fn set_source_root(&mut self, root: Option<String>) {
        self.source_root = root;
    }

    /// Set the generated file name.
    pub fn set_file(&mut self, file: impl Into<String>) {
        self.file = Some(file.into());
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub fn source_root(&self) -> Option<&str> {
        self.source_root.as_deref()
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    /// Original content of a source, if recorded.
    pub fn source_content(&self, index: u32) -> Option<&str> {
        self.sources_content.get(index as usize).and_then(|c| c.as_deref())
    }

    /// Register a source file and return its index. Registering the same path
    /// twice returns the existing index.
    pub fn add_source(&mut self, path: &str, content: Option<&str>) -> u32 {
        if let Some(&index) = self.source_index.get(path) {
            if let (Some(content), None) =
                (content, self.sources_content.get(index as usize).and_then(|c| c.as_ref()))
            {
                self.sources_content[index as usize] = Some(content.to_string());
            }
            return index;
        }
        let index = self.sources.len() as u32;
        self.sources.push(path.to_string());
        self.sources_content.push(content.map(str::to_string));
        self.source_index.insert(path.to_string(), index);
        index
    }

    /// Register a symbol name and return its index.
    pub fn add_name(&mut self, name: &str) -> u32 {
        if let Some(&index) = self.name_index.get(name) {
            return index;
        }
        let index = self.names.len() as u32;
        self.names.push(name.to_string());
        self.name_index.insert(name.to_string(), index);
        index
    }

    /// Drop all embedded source content.
    pub fn clear_sources_content(&mut self) {
        for content in &mut self.sources_content {
            *content = None;
        }
    }

    /// Drop all mappings, keeping sources and names.
    pub fn clear_mappings(&mut self) {
        self.mappings.clear();
    }

    /// Append a mapping. Consecutive segments on the same line pointing at the
    /// same original position are collapsed.
    pub fn add_mapping(&mut self, mapping: Mapping) {
        if let Some(last) = self.mappings.last() {
            if last.generated_line == mapping.generated_line
                && last.generated_column == mapping.generated_column
            {
                return;
            }
            if last.generated_line == mapping.generated_line && last.same_origin(&mapping) {
                return;
            }
        }
        self.mappings.push(mapping);
    }

    /// Number of generated lines that carry at least one mapping.
    pub fn mapped_lines(&self) -> usize {
        let mut lines: Vec<u32> = self.mappings.iter().map(|m| m.generated_line).collect();
        lines.dedup();
        lines.len()
    }

    /// Find the mapping that covers a generated position.
    ///
    /// Returns the last segment on `line` starting at or before `column`. A
    /// column before the first segment of its line resolves to that first
    /// segment, and a line without segments resolves to the closest earlier
    /// segment. Only an empty map yields `None`.
    pub fn lookup(&self, line: u32, column: u32) -> Option<&Mapping> {
        if self.mappings.is_empty() {
            return None;
        }

        let after = self
            .mappings
            .partition_point(|m| (m.generated_line, m.generated_column) <= (line, column));

        if after > 0 {
            let candidate = &self.mappings[after - 1];
            if candidate.generated_line == line {
                return Some(candidate);
            }
        }

        if let Some(next) = self.mappings.get(after) {
            if next.generated_line == line {
                return Some(next);
            }
        }

        if after > 0 {
            Some(&self.mappings[after - 1])
        } else {
            self.mappings.first()
        }
    }

    /// Append another map whose generated output starts `line_offset` lines
    /// into this map's output. Sources and names are merged by value.
    pub fn append(&mut self, other: &SourceMap, line_offset: u32) {
        let source_remap: Vec<u32> = other
            .sources
            .iter()
            .enumerate()
            .map(|(i, path)| self.add_source(path, other.source_content(i as u32)))
            .collect();
        let name_remap: Vec<u32> = other.names.iter().map(|n| self.add_name(n)).collect();

        for mapping in &other.mappings {
            self.add_mapping(Mapping {
                generated_line: mapping.generated_line + line_offset,
                generated_column: mapping.generated_column,
                source: source_remap[mapping.source as usize],
                original_line: mapping.original_line,
                original_column: mapping.original_column,
                name: mapping.name.map(|n| name_remap[n as usize]),
            });
        }
    }

    /// Encode the `mappings` field.
    pub fn encode_mappings(&self) -> String {
        let mut sorted: Vec<&Mapping> = self.mappings.iter().collect();
        sorted.sort_by_key(|m| (m.generated_line, m.generated_column));

        let mut out = String::new();
        let mut line = 0u32;
        let mut prev_column = 0i64;
        let mut prev_source = 0i64;
        let mut prev_original_line = 0i64;
        let mut prev_original_column = 0i64;
        let mut prev_name = 0i64;
        let mut first_on_line = true;

        for mapping in sorted {
            while line < mapping.generated_line {
                out.push(';');
                line += 1;
                prev_column = 0;
                first_on_line = true;
            }
            if !first_on_line {
                out.push(',');
            }
            first_on_line = false;

            vlq::encode(mapping.generated_column as i64 - prev_column, &mut out);
            prev_column = mapping.generated_column as i64;
            vlq::encode(mapping.source as i64 - prev_source, &mut out);
            prev_source = mapping.source as i64;
            vlq::encode(mapping.original_line as i64 - prev_original_line, &mut out);
            prev_original_line = mapping.original_line as i64;
            vlq::encode(mapping.original_column as i64 - prev_original_column, &mut out);
            prev_original_column = mapping.original_column as i64;
            if let Some(name) = mapping.name {
                vlq::encode(name as i64 - prev_name, &mut out);
                prev_name = name as i64;
            }
        }

        out
    }

    /// Serialize the map as a Source Map v3 JSON document.
    pub fn to_json(&self) -> String {
        let include_content = self.sources_content.iter().any(Option::is_some);
        let raw = RawSourceMap {
            version: 3,
            file: self.file.clone(),
            source_root: self.source_root.clone(),
            sources: self.sources.clone(),
            sources_content: if include_content { self.sources_content.clone() } else { vec![] },
            names: self.names.clone(),
            mappings: self.encode_mappings(),
        };
        // RawSourceMap only holds strings and integers
        serde_json::to_string(&raw).unwrap_or_default()
    }

    /// Parse a Source Map v3 JSON document.
    pub fn from_json(json: &str) -> Result<Self, SourceMapError> {
        let raw: RawSourceMap = serde_json::from_str(json)?;
        if raw.version != 3 {
            return Err(SourceMapError::Version(raw.version));
        }

        let mut map = SourceMap::new();
        map.file = raw.file;
        map.source_root = raw.source_root;
        for (i, source) in raw.sources.iter().enumerate() {
            let content = raw.sources_content.get(i).and_then(|c| c.as_deref());
            map.add_source(source, content);
        }
        for name in &raw.names {
            map.add_name(name);
        }

        let mut source = 0i64;
        let mut original_line = 0i64;
        let mut original_column = 0i64;
        let mut name = 0i64;

        for (line, group) in raw.mappings.split(';').enumerate() {
            let line = line as u32;
            let mut column = 0i64;
            for segment in group.split(',').filter(|s| !s.is_empty()) {
                let values = vlq::decode(segment)
                    .map_err(|source| SourceMapError::Mappings { line, source })?;
                match values.len() {
                    4 | 5 => {}
                    // Segments without an original position carry no information we keep
                    1 => {
                        column += values[0];
                        continue;
                    }
                    n => return Err(SourceMapError::Segment(n, line)),
                }
                column += values[0];
                source += values[1];
                original_line += values[2];
                original_column += values[3];
                let segment_name = if values.len() == 5 {
                    name += values[4];
                    Some(name as u32)
                } else {
                    None
                };
                map.mappings.push(Mapping {
                    generated_line: line,
                    generated_column: column as u32,
                    source: source as u32,
                    original_line: original_line as u32,
                    original_column: original_column as u32,
                    name: segment_name,
                });
            }
        }

        Ok(map)
    }
}
