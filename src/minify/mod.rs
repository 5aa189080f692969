//! Whitespace and comment removal for generated JavaScript
//!
//! Identifiers are never renamed. Line breaks survive only where dropping
//! them could change automatic semicolon insertion, following the classic
//! JSMin rules. Each output token is mapped through the input source map to
//! the original position of the input token it came from.

pub mod lexer;

use thiserror::Error;

use crate::sourcemap::SourceMap;
use lexer::{is_word_char, JsToken, JsTokenKind};

/// Error tokenizing JavaScript for minification. Positions are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MinifyError {
    #[error("unterminated {what} at line {line}, column {column}")]
    Unterminated { what: &'static str, line: u32, column: u32 },
    #[error("unexpected character '{ch}' at line {line}, column {column}")]
    UnexpectedChar { ch: char, line: u32, column: u32 },
}

#[derive(Debug, Clone, Default)]
pub struct MinifyOptions {
    /// Keep `/*! ... */` comments
    pub preserve_license_comments: bool,
}

/// Minified code and its remapped source map.
#[derive(Debug, Clone)]
pub struct Minified {
    pub code: String,
    pub map: SourceMap,
}

/// Minify `js`, remapping positions through `input_map`.
///
/// The output map keeps the input's sources, contents and names. An empty
/// input map produces an output map without segments.
pub fn minify(js: &str, input_map: &SourceMap, options: &MinifyOptions) -> Result<Minified, MinifyError> {
    let tokens = lexer::tokenize(js, options.preserve_license_comments)?;

    let mut map = input_map.clone();
    map.clear_mappings();

    let mut out = Output::default();
    let mut prev: Option<&JsToken> = None;
    for token in &tokens {
        if let Some(prev) = prev {
            out.write(separator(prev, token));
        }
        if token.kind == JsTokenKind::License && out.column > 0 {
            out.write("\n");
        }
        if let Some(origin) = input_map.lookup(token.line, token.column) {
            map.add_mapping(origin.moved_to(out.line, out.column));
        }
        out.write(&token.text);
        prev = Some(token);
    }

    Ok(Minified { code: out.text, map })
}

#[derive(Default)]
struct Output {
    text: String,
    line: u32,
    column: u32,
}

impl Output {
    fn write(&mut self, text: &str) {
        for c in text.chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += c.len_utf16() as u32;
            }
        }
        self.text.push_str(text);
    }
}

/// What goes between two adjacent tokens in the output.
fn separator(prev: &JsToken, next: &JsToken) -> &'static str {
    if prev.kind == JsTokenKind::License {
        return "\n";
    }
    if next.newline_before && ends_statement(prev) && begins_statement(next) {
        return "\n";
    }
    if needs_space(prev, next) {
        return " ";
    }
    ""
}

fn first_char(token: &JsToken) -> char {
    token.text.chars().next().unwrap_or(' ')
}

fn last_char(token: &JsToken) -> char {
    token.text.chars().last().unwrap_or(' ')
}

/// A line break after this token may terminate a statement.
fn ends_statement(token: &JsToken) -> bool {
    let c = last_char(token);
    is_word_char(c) || matches!(c, '}' | ']' | ')' | '+' | '-' | '"' | '\'' | '`' | '/')
}

/// A line break before this token may start a new statement.
fn begins_statement(token: &JsToken) -> bool {
    let c = first_char(token);
    token.kind == JsTokenKind::Regex
        || is_word_char(c)
        || matches!(c, '{' | '[' | '(' | '+' | '-' | '!' | '~' | '"' | '\'' | '`')
}

fn needs_space(prev: &JsToken, next: &JsToken) -> bool {
    let (a, b) = (last_char(prev), first_char(next));
    if is_word_char(a) && is_word_char(b) {
        return true;
    }
    // `a + +b`, `a - -b`, `a + ++b`
    if (a == '+' || a == '-') && a == b && prev.kind == JsTokenKind::Punct {
        return true;
    }
    // `1 .toString()` would otherwise read as a decimal point
    if prev.kind == JsTokenKind::Word
        && b == '.'
        && prev.text.chars().all(|c| c.is_ascii_digit())
    {
        return true;
    }
    // `a / /re/` must not become a line comment
    a == '/' && b == '/'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sourcemap::Mapping;

    fn min(js: &str) -> String {
        minify(js, &SourceMap::new(), &MinifyOptions::default()).unwrap().code
    }

    #[test]
    fn test_removes_whitespace_and_comments() {
        let js = "(function() {\n  var x;\n\n  // set x\n  x = 1 + 2;\n\n}).call(this);\n";
        assert_eq!(min(js), "(function(){var x;x=1+2;}).call(this);");
    }

    #[test]
    fn test_keeps_identifiers() {
        let out = min("var longName = function(argumentOne) {\n  return argumentOne;\n};");
        assert!(out.contains("longName"));
        assert!(out.contains("argumentOne"));
        assert_eq!(out, "var longName=function(argumentOne){return argumentOne;};");
    }

    #[test]
    fn test_newline_kept_where_semicolon_insertion_matters() {
        assert_eq!(min("a = b\n(c)"), "a=b\n(c)");
        assert_eq!(min("x\n++y"), "x\n++y");
        assert_eq!(min("a = 1;\nb = 2;"), "a=1;b=2;");
        assert_eq!(min("return\nvalue"), "return\nvalue");
    }

    #[test]
    fn test_operator_spacing() {
        assert_eq!(min("a + +b"), "a+ +b");
        assert_eq!(min("a - -b"), "a- -b");
        assert_eq!(min("1 .toString()"), "1 .toString()");
        assert_eq!(min("typeof x"), "typeof x");
    }

    #[test]
    fn test_license_comments() {
        let js = "/*! keep me */\n/* drop me */\nvar a = 1;";
        assert_eq!(min(js), "var a=1;");
        let options = MinifyOptions { preserve_license_comments: true };
        let out = minify(js, &SourceMap::new(), &options).unwrap().code;
        assert_eq!(out, "/*! keep me */\nvar a=1;");
    }

    #[test]
    fn test_mappings_follow_tokens() {
        let mut input = SourceMap::new();
        input.add_source("a.coffee", None);
        let segment = |gl, ol| Mapping {
            generated_line: gl,
            generated_column: 0,
            source: 0,
            original_line: ol,
            original_column: 0,
            name: None,
        };
        input.add_mapping(segment(0, 0));
        input.add_mapping(segment(1, 4));

        let out = minify("a = 1;\nb = 2;\n", &input, &MinifyOptions::default()).unwrap();
        assert_eq!(out.code, "a=1;b=2;");
        let b = out.map.lookup(0, 4).unwrap();
        assert_eq!(b.original_line, 4);
        let a = out.map.lookup(0, 0).unwrap();
        assert_eq!(a.original_line, 0);
        assert_eq!(out.map.sources(), ["a.coffee".to_string()]);
    }

    #[test]
    fn test_columns_count_utf16_units() {
        let mut input = SourceMap::new();
        input.add_source("a.coffee", None);
        for column in [0, 10] {
            input.add_mapping(Mapping {
                generated_line: 0,
                generated_column: column,
                source: 0,
                original_line: 0,
                original_column: column,
                name: None,
            });
        }

        // the emoji is two UTF-16 units wide on both sides
        let out = minify("a = \"\u{1F600}\"; b = 1;", &input, &MinifyOptions::default()).unwrap();
        assert_eq!(out.code, "a=\"\u{1F600}\";b=1;");
        assert!(
            out.map.mappings().iter().any(|m| m.generated_column == 7 && m.original_column == 10),
            "{:?}",
            out.map.mappings()
        );
    }
}
