//! Output buffer that tracks generated positions and source mappings

use super::token::Pos;
use crate::sourcemap::Mapping;

const INDENT: &str = "  ";

/// Generated JavaScript with one mapping at every node start and at the
/// first character of every non-empty line.
#[derive(Debug, Default)]
pub struct Emitter {
    out: String,
    line: u32,
    column: u32,
    pub indent: usize,
    mappings: Vec<Mapping>,
    current: Pos,
    line_mapped: bool,
}

impl Emitter {
    pub fn new(indent: usize) -> Self {
        Self { indent, ..Self::default() }
    }

    /// An empty buffer for a nested function body, one level deeper.
    pub fn child(&self) -> Self {
        Self { indent: self.indent + 1, current: self.current, ..Self::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    pub fn write(&mut self, text: &str) {
        for (i, piece) in text.split('\n').enumerate() {
            if i > 0 {
                self.out.push('\n');
                self.line += 1;
                self.column = 0;
                self.line_mapped = false;
            }
            if piece.is_empty() {
                continue;
            }
            if !self.line_mapped {
                self.push_mapping(self.current);
            }
            self.out.push_str(piece);
            self.column += piece.encode_utf16().count() as u32;
        }
    }

    pub fn newline(&mut self) {
        self.write("\n");
    }

    /// Indentation for a new statement line.
    pub fn start_line(&mut self) {
        let indent = INDENT.repeat(self.indent);
        if indent.is_empty() {
            return;
        }
        self.write(&indent);
    }

    /// Record that output from here on comes from `pos`.
    pub fn map(&mut self, pos: Pos) {
        self.current = pos;
        self.push_mapping(pos);
    }

    fn push_mapping(&mut self, pos: Pos) {
        let mapping = Mapping {
            generated_line: self.line,
            generated_column: self.column,
            source: 0,
            original_line: pos.line,
            original_column: pos.column,
            name: None,
        };
        match self.mappings.last_mut() {
            Some(last)
                if last.generated_line == mapping.generated_line
                    && last.generated_column == mapping.generated_column =>
            {
                *last = mapping;
            }
            _ => self.mappings.push(mapping),
        }
        self.line_mapped = true;
    }

    /// Append a buffer that was generated starting at column 0.
    pub fn append(&mut self, child: Emitter) {
        if self.column != 0 {
            self.newline();
        }
        let offset = self.line;
        self.mappings.extend(
            child.mappings.iter().map(|m| m.moved_to(m.generated_line + offset, m.generated_column)),
        );
        self.out.push_str(&child.out);
        self.line += child.line;
        self.column = child.column;
        self.line_mapped = child.line_mapped;
        self.current = child.current;
    }

    pub fn finish(self) -> (String, Vec<Mapping>) {
        (self.out, self.mappings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_line_is_mapped() {
        let mut e = Emitter::new(0);
        e.map(Pos::new(3, 2));
        e.write("a;\nb;\n\nc;");
        let (out, mappings) = e.finish();
        assert_eq!(out, "a;\nb;\n\nc;");
        let lines: Vec<u32> = mappings.iter().map(|m| m.generated_line).collect();
        assert_eq!(lines, vec![0, 1, 3]);
        assert!(mappings.iter().all(|m| m.original_line == 3));
    }

    #[test]
    fn test_append_offsets_child_mappings() {
        let mut parent = Emitter::new(0);
        parent.write("function() {");
        parent.newline();
        let mut child = parent.child();
        child.start_line();
        child.map(Pos::new(1, 2));
        child.write("x;");
        child.newline();
        parent.append(child);
        parent.write("}");

        let (out, mappings) = parent.finish();
        assert_eq!(out, "function() {\n  x;\n}");
        let inner: Vec<_> = mappings.iter().filter(|m| m.generated_line == 1).collect();
        assert!(inner.iter().any(|m| m.generated_column == 2 && m.original_line == 1));
    }

    #[test]
    fn test_same_column_mapping_is_replaced() {
        let mut e = Emitter::new(0);
        e.map(Pos::new(0, 0));
        e.map(Pos::new(0, 4));
        e.write("x");
        let (_, mappings) = e.finish();
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].original_column, 4);
    }

    #[test]
    fn test_columns_count_utf16_units() {
        let mut e = Emitter::new(0);
        e.map(Pos::new(0, 0));
        e.write("s = '\u{1F600}'; ");
        e.map(Pos::new(1, 0));
        e.write("x;");
        let (_, mappings) = e.finish();
        assert_eq!(mappings.last().map(|m| m.generated_column), Some(10));
    }
}
