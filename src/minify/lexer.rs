//! JavaScript tokenizer for the minifier
//!
//! Only distinguishes what whitespace removal needs: words, literals,
//! punctuation and preserved comments. Every token keeps the position where
//! it starts in the input so output can be remapped.

use super::MinifyError;

const PUNCTUATORS: &[&str] = &[
    ">>>=", "===", "!==", ">>>", "<<=", ">>=", "**=", "&&=", "||=", "??=", "...", "=>", "==", "!=",
    "<=", ">=", "&&", "||", "??", "?.", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=",
    "<<", ">>", "**", "+", "-", "*", "/", "%", "=", "<", ">", "!", "~", "&", "|", "^", "?", ":",
    ";", ",", ".", "(", ")", "[", "]", "{", "}",
];

/// Keywords after which a `/` starts a regular expression.
const REGEX_KEYWORDS: &[&str] =
    &["return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do", "else"];

#[derive(Debug, Clone, PartialEq)]
pub enum JsTokenKind {
    /// Identifier, keyword or number
    Word,
    Str,
    Regex,
    Punct,
    /// `/*! ... */` comment
    License,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JsToken {
    pub kind: JsTokenKind,
    pub text: String,
    pub line: u32,
    pub column: u32,
    /// A line terminator separates this token from the previous one
    pub newline_before: bool,
}

pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '\\' || !c.is_ascii()
}

/// Split JavaScript source into tokens, dropping whitespace and comments.
/// License comments are returned only when `keep_license` is set.
pub fn tokenize(source: &str, keep_license: bool) -> Result<Vec<JsToken>, MinifyError> {
    let mut scanner = Scanner {
        chars: source.chars().collect(),
        index: 0,
        line: 0,
        column: 0,
        tokens: Vec::new(),
        newline: false,
    };
    scanner.run(keep_license)?;
    Ok(scanner.tokens)
}

struct Scanner {
    chars: Vec<char>,
    index: usize,
    line: u32,
    column: u32,
    tokens: Vec<JsToken>,
    newline: bool,
}

impl Scanner {
    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.index + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.index).copied()?;
        self.index += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += c.len_utf16() as u32;
        }
        Some(c)
    }

    fn push(&mut self, kind: JsTokenKind, text: String, line: u32, column: u32) {
        self.tokens.push(JsToken { kind, text, line, column, newline_before: self.newline });
        self.newline = false;
    }

    fn run(&mut self, keep_license: bool) -> Result<(), MinifyError> {
        while let Some(c) = self.peek(0) {
            let (line, column) = (self.line, self.column);
            match c {
                '\n' | '\r' | '\u{2028}' | '\u{2029}' => {
                    self.newline = true;
                    self.bump();
                }
                c if c.is_whitespace() || c == '\u{feff}' => {
                    self.bump();
                }
                '/' if self.peek(1) == Some('/') => {
                    while let Some(c) = self.peek(0) {
                        if c == '\n' || c == '\r' {
                            break;
                        }
                        self.bump();
                    }
                }
                '/' if self.peek(1) == Some('*') => {
                    let text = self.block_comment(line, column)?;
                    if keep_license && text.starts_with("/*!") {
                        self.push(JsTokenKind::License, text, line, column);
                    } else if text.contains('\n') {
                        self.newline = true;
                    }
                }
                '\'' | '"' | '`' => {
                    let text = self.string(c, line, column)?;
                    self.push(JsTokenKind::Str, text, line, column);
                }
                '/' if self.regex_allowed() => {
                    let text = self.regex(line, column)?;
                    self.push(JsTokenKind::Regex, text, line, column);
                }
                c if c.is_ascii_digit() || (c == '.' && self.peek(1).is_some_and(|d| d.is_ascii_digit())) => {
                    let text = self.number();
                    self.push(JsTokenKind::Word, text, line, column);
                }
                c if is_word_char(c) => {
                    let mut text = String::new();
                    while let Some(c) = self.peek(0).filter(|c| is_word_char(*c)) {
                        text.push(c);
                        self.bump();
                    }
                    self.push(JsTokenKind::Word, text, line, column);
                }
                _ => {
                    let punct = PUNCTUATORS
                        .iter()
                        .find(|p| p.chars().enumerate().all(|(i, pc)| self.peek(i) == Some(pc)))
                        .copied()
                        .ok_or(MinifyError::UnexpectedChar { ch: c, line: line + 1, column: column + 1 })?;
                    for _ in 0..punct.chars().count() {
                        self.bump();
                    }
                    self.push(JsTokenKind::Punct, punct.to_string(), line, column);
                }
            }
        }
        Ok(())
    }

    fn block_comment(&mut self, line: u32, column: u32) -> Result<String, MinifyError> {
        let mut text = String::from("/*");
        self.bump();
        self.bump();
        loop {
            match self.bump() {
                Some('*') if self.peek(0) == Some('/') => {
                    self.bump();
                    text.push_str("*/");
                    return Ok(text);
                }
                Some(c) => text.push(c),
                None => {
                    return Err(MinifyError::Unterminated { what: "comment", line: line + 1, column: column + 1 })
                }
            }
        }
    }

    fn string(&mut self, quote: char, line: u32, column: u32) -> Result<String, MinifyError> {
        let mut text = String::new();
        text.push(quote);
        self.bump();
        loop {
            match self.bump() {
                Some('\\') => {
                    text.push('\\');
                    if let Some(escaped) = self.bump() {
                        text.push(escaped);
                    }
                }
                Some(c) if c == quote => {
                    text.push(c);
                    return Ok(text);
                }
                Some('\n') if quote != '`' => break,
                Some(c) => text.push(c),
                None => break,
            }
        }
        Err(MinifyError::Unterminated { what: "string", line: line + 1, column: column + 1 })
    }

    fn regex(&mut self, line: u32, column: u32) -> Result<String, MinifyError> {
        let mut text = String::from("/");
        self.bump();
        let mut in_class = false;
        loop {
            match self.bump() {
                Some('\\') => {
                    text.push('\\');
                    match self.bump() {
                        Some('\n') | None => break,
                        Some(escaped) => text.push(escaped),
                    }
                }
                Some('[') => {
                    in_class = true;
                    text.push('[');
                }
                Some(']') => {
                    in_class = false;
                    text.push(']');
                }
                Some('/') if !in_class => {
                    text.push('/');
                    while let Some(flag) = self.peek(0).filter(|c| c.is_ascii_alphabetic()) {
                        text.push(flag);
                        self.bump();
                    }
                    return Ok(text);
                }
                Some('\n') | None => break,
                Some(c) => text.push(c),
            }
        }
        Err(MinifyError::Unterminated { what: "regular expression", line: line + 1, column: column + 1 })
    }

    fn number(&mut self) -> String {
        let mut text = String::new();
        let hex = self.peek(0) == Some('0') && matches!(self.peek(1), Some('x' | 'X' | 'b' | 'B' | 'o' | 'O'));
        while let Some(c) = self.peek(0) {
            let exponent_sign =
                !hex && (c == '+' || c == '-') && matches!(text.chars().last(), Some('e' | 'E'));
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || exponent_sign {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        text
    }

    /// A `/` after an operand is division; anywhere else it starts a regex.
    fn regex_allowed(&self) -> bool {
        match self.tokens.last() {
            None => true,
            Some(token) => match token.kind {
                JsTokenKind::Word => REGEX_KEYWORDS.contains(&token.text.as_str()),
                JsTokenKind::Str | JsTokenKind::Regex => false,
                JsTokenKind::Punct => !matches!(token.text.as_str(), ")" | "]" | "}" | "++" | "--"),
                JsTokenKind::License => true,
            },
        }
    }
}
