//! Indentation-aware lexer for the script dialect
//!
//! Produces a flat token stream where significant indentation appears as
//! `Indent`/`Outdent`/`Newline` tokens. Lines ending in a binary operator or
//! comma, and lines starting with `.`, continue the previous line without any
//! layout token.

use super::token::{Keyword, Pos, StrPart, Token, TokenKind};
use super::CompileError;

const PUNCTUATORS: &[&str] = &[
    ">>>=", "...", ">>>", "<<=", ">>=", "->", "=>", "::", "?.", "..", "?=", "||=", "&&=", "+=",
    "-=", "*=", "/=", "%=", "&=", "|=", "^=", "==", "!=", "<=", ">=", "&&", "||", "++", "--", "<<",
    ">>", "+", "-", "*", "/", "%", "=", "<", ">", "!", "~", "&", "|", "^", "?", ":", ".", ",", "(",
    ")", "[", "]", "{", "}",
];

#[derive(Debug, Clone, Copy)]
struct IndentLevel {
    width: usize,
    /// Pushed by a continued line; closes without an `Outdent`
    continuation: bool,
}

/// Tokenize a complete source file.
pub fn tokenize(source: &str) -> Result<Vec<Token>, CompileError> {
    Lexer::new(source, Pos::default(), false).run()
}

struct Lexer {
    chars: Vec<char>,
    index: usize,
    line: u32,
    column: u32,
    tokens: Vec<Token>,
    indents: Vec<IndentLevel>,
    brackets: Vec<(char, usize, Pos)>,
    spaced: bool,
    at_line_start: bool,
    newline_pending: bool,
    /// Lexing the inside of `#{...}`: no layout tokens
    inline: bool,
}

impl Lexer {
    fn new(source: &str, start: Pos, inline: bool) -> Self {
        Self {
            chars: source.chars().collect(),
            index: 0,
            line: start.line,
            column: start.column,
            tokens: Vec::new(),
            indents: vec![IndentLevel { width: 0, continuation: false }],
            brackets: Vec::new(),
            spaced: false,
            at_line_start: !inline,
            newline_pending: false,
            inline,
        }
    }

    fn pos(&self) -> Pos {
        Pos::new(self.line, self.column)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.index + offset).copied()
    }

    fn starts_with(&self, text: &str) -> bool {
        text.chars().enumerate().all(|(i, c)| self.peek_at(i) == Some(c))
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.index += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += c.len_utf16() as u32;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>, pos: Pos) -> CompileError {
        CompileError::new(message, pos)
    }

    fn push(&mut self, kind: TokenKind, pos: Pos) {
        let mut token = Token::new(kind, pos);
        token.spaced = self.spaced;
        token.newline_before = self.newline_pending;
        self.spaced = false;
        self.newline_pending = false;
        self.tokens.push(token);
    }

    fn push_layout(&mut self, kind: TokenKind, pos: Pos) {
        self.tokens.push(Token::new(kind, pos));
    }

    fn last_kind(&self) -> Option<&TokenKind> {
        self.tokens.last().map(|t| &t.kind)
    }

    fn run(mut self) -> Result<Vec<Token>, CompileError> {
        loop {
            if self.at_line_start {
                self.line_start()?;
            }
            let Some(c) = self.peek() else { break };
            let pos = self.pos();

            match c {
                ' ' | '\t' | '\r' => {
                    self.advance();
                    self.spaced = true;
                }
                '\n' => {
                    self.advance();
                    if self.inline {
                        self.spaced = true;
                    } else {
                        self.at_line_start = true;
                    }
                }
                '\\' if self.is_line_continuation() => self.skip_line_continuation(),
                '#' => {
                    if self.starts_with("###") && self.peek_at(3) != Some('#') {
                        self.here_comment()?;
                    } else {
                        self.skip_line_comment();
                    }
                }
                ';' => {
                    self.advance();
                    if !matches!(self.last_kind(), Some(TokenKind::Newline) | None) {
                        self.push_layout(TokenKind::Newline, pos);
                    }
                }
                '0'..='9' => self.number()?,
                '@' => self.at_sign(),
                '"' | '\'' => self.string(c)?,
                '`' => self.embedded_js()?,
                '/' if self.regex_allowed() => self.regex()?,
                c if is_ident_start(c) => self.word(),
                _ => self.punct()?,
            }
        }

        self.finish()
    }

    fn finish(mut self) -> Result<Vec<Token>, CompileError> {
        let pos = self.pos();
        if let Some(&(open, _, open_pos)) = self.brackets.last() {
            return Err(self.error(format!("missing '{}'", closing_for(open)), open_pos));
        }
        if self.inline {
            return Ok(self.tokens);
        }

        while self.indents.len() > 1 {
            if let Some(level) = self.indents.pop() {
                if !level.continuation {
                    self.push_layout(TokenKind::Outdent, pos);
                }
            }
        }
        if !matches!(self.last_kind(), Some(TokenKind::Newline) | None) {
            self.push_layout(TokenKind::Newline, pos);
        }
        self.push_layout(TokenKind::Eof, pos);
        Ok(self.tokens)
    }

    /// Measure indentation, skip blank and comment-only lines, and emit the
    /// layout tokens for the new line.
    fn line_start(&mut self) -> Result<(), CompileError> {
        let width = loop {
            let mut width = 0;
            while matches!(self.peek(), Some(' ') | Some('\t')) {
                self.advance();
                width += 1;
            }
            match self.peek() {
                None => {
                    self.at_line_start = false;
                    return Ok(());
                }
                Some('\n') | Some('\r') => {
                    self.advance();
                }
                Some('#') if !(self.starts_with("###") && self.peek_at(3) != Some('#')) => {
                    self.skip_line_comment();
                }
                _ => break width,
            }
        };
        self.at_line_start = false;
        self.spaced = false;

        if self.tokens.is_empty() {
            self.indents[0].width = width;
            return Ok(());
        }

        let pos = self.pos();
        let starts_with_dot = (self.peek() == Some('.') && self.peek_at(1) != Some('.'))
            || self.starts_with("?.");
        let continued = starts_with_dot || self.tokens.last().is_some_and(is_unfinished);

        self.apply_indentation(width, continued, pos)?;
        self.newline_pending = true;
        Ok(())
    }

    fn apply_indentation(
        &mut self,
        width: usize,
        continued: bool,
        pos: Pos,
    ) -> Result<(), CompileError> {
        let bracket_floor = self.brackets.last().map(|&(_, depth, _)| depth).unwrap_or(1);

        while self.indents.len() > bracket_floor.max(1) {
            let top = self.indents[self.indents.len() - 1];
            if width >= top.width {
                break;
            }
            self.indents.pop();
            if !top.continuation {
                self.push_layout(TokenKind::Outdent, pos);
            }
        }

        let top = self.indents[self.indents.len() - 1].width;
        if width > top {
            if continued {
                self.indents.push(IndentLevel { width, continuation: true });
            } else {
                self.indents.push(IndentLevel { width, continuation: false });
                self.push_layout(TokenKind::Indent, pos);
            }
            return Ok(());
        }

        if !continued
            && !matches!(self.last_kind(), Some(TokenKind::Newline) | Some(TokenKind::Indent))
        {
            self.push_layout(TokenKind::Newline, pos);
        }
        Ok(())
    }

    fn is_line_continuation(&self) -> bool {
        let mut offset = 1;
        while matches!(self.peek_at(offset), Some(' ') | Some('\t') | Some('\r')) {
            offset += 1;
        }
        self.peek_at(offset) == Some('\n')
    }

    fn skip_line_continuation(&mut self) {
        while let Some(c) = self.advance() {
            if c == '\n' {
                break;
            }
        }
        while matches!(self.peek(), Some(' ') | Some('\t')) {
            self.advance();
        }
        self.spaced = true;
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn here_comment(&mut self) -> Result<(), CompileError> {
        let pos = self.pos();
        for _ in 0..3 {
            self.advance();
        }
        let mut body = String::new();
        loop {
            if self.starts_with("###") {
                for _ in 0..3 {
                    self.advance();
                }
                break;
            }
            match self.advance() {
                Some(c) => body.push(c),
                None => return Err(self.error("missing ### to close block comment", pos)),
            }
        }
        let body = body.replace("*/", "* /");
        self.push(TokenKind::HereComment(body), pos);
        Ok(())
    }

    fn number(&mut self) -> Result<(), CompileError> {
        let pos = self.pos();
        let mut text = String::new();

        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x') | Some('X')) {
            text.push_str("0x");
            self.advance();
            self.advance();
            while let Some(c) = self.peek().filter(char::is_ascii_hexdigit) {
                text.push(c);
                self.advance();
            }
            if text.len() == 2 {
                return Err(self.error("invalid hexadecimal literal", pos));
            }
        } else if self.peek() == Some('0') && matches!(self.peek_at(1), Some('b') | Some('o')) {
            let radix = if self.peek_at(1) == Some('b') { 2 } else { 8 };
            self.advance();
            self.advance();
            let mut digits = String::new();
            while let Some(c) = self.peek().filter(|c| c.is_digit(radix)) {
                digits.push(c);
                self.advance();
            }
            let value = u64::from_str_radix(&digits, radix)
                .map_err(|_| self.error("invalid number literal", pos))?;
            text = value.to_string();
        } else {
            while let Some(c) = self.peek().filter(char::is_ascii_digit) {
                text.push(c);
                self.advance();
            }
            if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
                text.push('.');
                self.advance();
                while let Some(c) = self.peek().filter(char::is_ascii_digit) {
                    text.push(c);
                    self.advance();
                }
            }
            if matches!(self.peek(), Some('e') | Some('E')) {
                let sign = matches!(self.peek_at(1), Some('+') | Some('-'));
                let digit_at = if sign { 2 } else { 1 };
                if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                    for _ in 0..digit_at {
                        if let Some(c) = self.advance() {
                            text.push(c);
                        }
                    }
                    while let Some(c) = self.peek().filter(char::is_ascii_digit) {
                        text.push(c);
                        self.advance();
                    }
                }
            }
        }

        if self.peek().is_some_and(is_ident_char) {
            return Err(self.error("identifier starts immediately after number", self.pos()));
        }
        self.push(TokenKind::Number(text), pos);
        Ok(())
    }

    fn at_sign(&mut self) {
        let pos = self.pos();
        self.advance();
        if self.peek().is_some_and(is_ident_start) {
            let name = self.read_word();
            self.push(TokenKind::AtIdent(name), pos);
        } else {
            self.push(TokenKind::Keyword(Keyword::This), pos);
        }
    }

    fn read_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self.peek().filter(|c| is_ident_char(*c)) {
            word.push(c);
            self.advance();
        }
        word
    }

    fn word(&mut self) {
        let pos = self.pos();
        let word = self.read_word();

        let after_accessor = matches!(
            self.last_kind(),
            Some(TokenKind::Punct(".")) | Some(TokenKind::Punct("?.")) | Some(TokenKind::Punct("::"))
        ) && !self.spaced;
        let is_key = self.peek() == Some(':') && self.peek_at(1) != Some(':');

        let kind = match Keyword::from_word(&word) {
            Some(keyword) if !after_accessor && !is_key => TokenKind::Keyword(keyword),
            _ => TokenKind::Ident(word),
        };
        self.push(kind, pos);
    }

    fn string(&mut self, quote: char) -> Result<(), CompileError> {
        let pos = self.pos();
        let triple: String = std::iter::repeat(quote).take(3).collect();
        if self.starts_with(&triple) {
            return self.heredoc(quote, pos);
        }

        self.advance();
        let mut raw = String::new();
        loop {
            match self.advance() {
                None => return Err(self.error(format!("missing {} to close string", quote), pos)),
                Some('\\') => {
                    raw.push('\\');
                    match self.advance() {
                        Some('\n') => {
                            raw.pop();
                            while matches!(self.peek(), Some(' ') | Some('\t')) {
                                self.advance();
                            }
                        }
                        Some(c) => raw.push(c),
                        None => {
                            return Err(self.error(format!("missing {} to close string", quote), pos))
                        }
                    }
                }
                Some(c) if c == quote => break,
                Some('\n') => {
                    while raw.ends_with(' ') || raw.ends_with('\t') {
                        raw.pop();
                    }
                    while matches!(self.peek(), Some(' ') | Some('\t')) {
                        self.advance();
                    }
                    raw.push(' ');
                }
                Some(c) => raw.push(c),
            }
        }

        if quote == '"' && raw.contains("#{") {
            let parts = self.interpolate(&raw, pos)?;
            self.push(TokenKind::Interp(parts), pos);
        } else {
            self.push(TokenKind::Str(raw, quote), pos);
        }
        Ok(())
    }

    fn heredoc(&mut self, quote: char, pos: Pos) -> Result<(), CompileError> {
        for _ in 0..3 {
            self.advance();
        }
        let triple: String = std::iter::repeat(quote).take(3).collect();
        let mut raw = String::new();
        loop {
            if self.starts_with(&triple) {
                for _ in 0..3 {
                    self.advance();
                }
                break;
            }
            match self.advance() {
                Some('\\') => {
                    raw.push('\\');
                    if let Some(c) = self.advance() {
                        raw.push(c);
                    }
                }
                Some(c) => raw.push(c),
                None => return Err(self.error(format!("missing {} to close heredoc", triple), pos)),
            }
        }

        let body = dedent_heredoc(&raw);
        let mut escaped = String::new();
        for c in body.chars() {
            match c {
                '\n' => escaped.push_str("\\n"),
                '\r' => {}
                c if c == quote => {
                    escaped.push('\\');
                    escaped.push(c);
                }
                c => escaped.push(c),
            }
        }

        if quote == '"' && escaped.contains("#{") {
            let parts = self.interpolate(&escaped, pos)?;
            self.push(TokenKind::Interp(parts), pos);
        } else {
            self.push(TokenKind::Str(escaped, quote), pos);
        }
        Ok(())
    }

    /// Split a double-quoted string body on `#{...}` and lex each embedded
    /// expression.
    fn interpolate(&self, raw: &str, pos: Pos) -> Result<Vec<StrPart>, CompileError> {
        let chars: Vec<char> = raw.chars().collect();
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut i = 0;

        while i < chars.len() {
            if chars[i] == '\\' && i + 1 < chars.len() {
                literal.push(chars[i]);
                literal.push(chars[i + 1]);
                i += 2;
                continue;
            }
            if chars[i] == '#' && chars.get(i + 1) == Some(&'{') {
                let start = i + 2;
                let end = find_interpolation_end(&chars, start)
                    .ok_or_else(|| self.error("missing } in string interpolation", pos))?;
                let code: String = chars[start..end].iter().collect();
                let offset: usize = chars[..start].iter().map(|c| c.len_utf16()).sum();
                let code_pos = Pos::new(pos.line, pos.column + 1 + offset as u32);
                let tokens = Lexer::new(&code, code_pos, true).run()?;

                if !literal.is_empty() {
                    parts.push(StrPart::Lit(std::mem::take(&mut literal)));
                }
                if !tokens.is_empty() {
                    parts.push(StrPart::Code(tokens, code_pos));
                }
                i = end + 1;
                continue;
            }
            literal.push(chars[i]);
            i += 1;
        }
        if !literal.is_empty() {
            parts.push(StrPart::Lit(literal));
        }
        Ok(parts)
    }

    fn embedded_js(&mut self) -> Result<(), CompileError> {
        let pos = self.pos();
        self.advance();
        let mut code = String::new();
        loop {
            match self.advance() {
                Some('\\') if self.peek() == Some('`') => {
                    self.advance();
                    code.push('`');
                }
                Some('`') => break,
                Some(c) => code.push(c),
                None => return Err(self.error("missing ` to close embedded JavaScript", pos)),
            }
        }
        self.push(TokenKind::Js(code), pos);
        Ok(())
    }

    /// Decide whether a `/` starts a regex literal or is a division.
    fn regex_allowed(&self) -> bool {
        if self.starts_with("///") {
            return true;
        }
        let Some(last) = self.tokens.last() else { return true };
        let value_like = match &last.kind {
            TokenKind::Ident(_) | TokenKind::AtIdent(_) => {
                // `f /re/` is an implicit call with a regex argument
                let next = self.peek_at(1);
                return self.spaced && !matches!(next, Some(' ') | Some('=') | None);
            }
            TokenKind::Number(_)
            | TokenKind::Str(..)
            | TokenKind::Interp(_)
            | TokenKind::Regex(_)
            | TokenKind::Js(_) => true,
            TokenKind::Keyword(k) => matches!(
                k,
                Keyword::This | Keyword::True | Keyword::False | Keyword::Null | Keyword::Undefined
            ),
            TokenKind::Punct(p) => matches!(*p, ")" | "]" | "}" | "?" | "++" | "--"),
            _ => false,
        };
        !value_like
    }

    fn regex(&mut self) -> Result<(), CompileError> {
        let pos = self.pos();
        if self.starts_with("///") {
            return Err(self.error("block regexes (///) are not supported", pos));
        }
        self.advance();
        let mut body = String::from("/");
        let mut in_class = false;
        loop {
            match self.advance() {
                Some('\\') => {
                    body.push('\\');
                    match self.advance() {
                        Some('\n') | None => return Err(self.error("missing / to close regex", pos)),
                        Some(c) => body.push(c),
                    }
                }
                Some('[') => {
                    in_class = true;
                    body.push('[');
                }
                Some(']') => {
                    in_class = false;
                    body.push(']');
                }
                Some('/') if !in_class => {
                    body.push('/');
                    break;
                }
                Some('\n') | None => return Err(self.error("missing / to close regex", pos)),
                Some(c) => body.push(c),
            }
        }
        while let Some(c) = self.peek().filter(|c| matches!(c, 'g' | 'i' | 'm' | 'u' | 'y')) {
            body.push(c);
            self.advance();
        }
        if body == "//" {
            return Err(self.error("empty regex", pos));
        }
        self.push(TokenKind::Regex(body), pos);
        Ok(())
    }

    fn punct(&mut self) -> Result<(), CompileError> {
        let pos = self.pos();
        let Some(op) = PUNCTUATORS.iter().copied().find(|p| self.starts_with(p)) else {
            let c = self.peek().unwrap_or(' ');
            return Err(self.error(format!("unexpected character '{}'", c), pos));
        };
        for _ in 0..op.chars().count() {
            self.advance();
        }

        match op {
            "(" | "[" | "{" => {
                self.push(TokenKind::Punct(op), pos);
                let open = op.chars().next().unwrap_or('(');
                self.brackets.push((open, self.indents.len(), pos));
            }
            ")" | "]" | "}" => {
                let close = op.chars().next().unwrap_or(')');
                match self.brackets.pop() {
                    Some((open, depth, _)) if closing_for(open) == close => {
                        let spaced = self.spaced;
                        while self.indents.len() > depth {
                            if let Some(level) = self.indents.pop() {
                                if !level.continuation {
                                    self.push_layout(TokenKind::Outdent, pos);
                                }
                            }
                        }
                        if matches!(self.last_kind(), Some(TokenKind::Newline)) {
                            self.tokens.pop();
                        }
                        self.spaced = spaced;
                        self.push(TokenKind::Punct(op), pos);
                    }
                    Some((open, _, open_pos)) => {
                        return Err(self.error(
                            format!("unmatched '{}' (expected '{}')", op, closing_for(open)),
                            open_pos,
                        ));
                    }
                    None => return Err(self.error(format!("unmatched '{}'", op), pos)),
                }
            }
            _ => self.push(TokenKind::Punct(op), pos),
        }
        Ok(())
    }
}

fn closing_for(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// A token after which a line break continues the expression.
fn is_unfinished(token: &Token) -> bool {
    match &token.kind {
        TokenKind::Punct(p) => matches!(
            *p,
            "+" | "-"
                | "*"
                | "/"
                | "%"
                | "&&"
                | "||"
                | "=="
                | "!="
                | "<"
                | ">"
                | "<="
                | ">="
                | "&"
                | "|"
                | "^"
                | "<<"
                | ">>"
                | ">>>"
                | ","
                | "."
                | "?."
                | "::"
        ),
        TokenKind::Keyword(k) => {
            matches!(k, Keyword::And | Keyword::Or | Keyword::Is | Keyword::Isnt | Keyword::Instanceof)
        }
        _ => false,
    }
}

/// Find the `}` closing an interpolation, skipping nested braces and strings.
fn find_interpolation_end(chars: &[char], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = start;
    let mut quote: Option<char> = None;
    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = quote {
            if c == '\\' {
                i += 2;
                continue;
            }
            if c == q {
                quote = None;
            }
        } else {
            match c {
                '"' | '\'' => quote = Some(c),
                '{' => depth += 1,
                '}' if depth == 0 => return Some(i),
                '}' => depth -= 1,
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// Strip the first and last blank lines and the common indentation of a
/// heredoc body.
fn dedent_heredoc(raw: &str) -> String {
    let mut lines: Vec<&str> = raw.split('\n').collect();
    if lines.first().is_some_and(|l| l.trim().is_empty()) && lines.len() > 1 {
        lines.remove(0);
    }
    if lines.last().is_some_and(|l| l.trim().is_empty()) && lines.len() > 1 {
        lines.pop();
    }

    let indent = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.chars().take_while(|c| *c == ' ' || *c == '\t').count())
        .min()
        .unwrap_or(0);

    lines
        .iter()
        .map(|l| l.chars().skip(indent).collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    fn ident(name: &str) -> TokenKind {
        TokenKind::Ident(name.to_string())
    }

    #[test]
    fn test_columns_count_utf16_units() {
        let tokens = tokenize("a = '\u{1F600}' + b").unwrap();
        assert_eq!(tokens[4].kind, ident("b"));
        assert_eq!(tokens[4].pos.column, 11);
    }

    #[test]
    fn test_simple_assignment() {
        assert_eq!(
            kinds("x = 42"),
            vec![
                ident("x"),
                TokenKind::Punct("="),
                TokenKind::Number("42".to_string()),
                TokenKind::Newline,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_indent_and_outdent() {
        let tokens = kinds("if a\n  b\nc");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Keyword(Keyword::If),
                ident("a"),
                TokenKind::Indent,
                ident("b"),
                TokenKind::Outdent,
                TokenKind::Newline,
                ident("c"),
                TokenKind::Newline,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_blank_and_comment_lines_are_skipped() {
        let tokens = kinds("a\n\n  # note\n\nb # trailing\n");
        assert_eq!(
            tokens,
            vec![ident("a"), TokenKind::Newline, ident("b"), TokenKind::Newline, TokenKind::Eof]
        );
    }

    #[test]
    fn test_trailing_comma_continues_line() {
        let tokens = kinds("f a,\n  b\nc");
        assert_eq!(
            tokens,
            vec![
                ident("f"),
                ident("a"),
                TokenKind::Punct(","),
                ident("b"),
                TokenKind::Newline,
                ident("c"),
                TokenKind::Newline,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_leading_dot_continues_chain() {
        let tokens = kinds("a\n  .b()\n  .c()");
        assert!(!tokens.contains(&TokenKind::Indent));
        assert_eq!(tokens.iter().filter(|k| **k == TokenKind::Newline).count(), 1);
    }

    #[test]
    fn test_closing_bracket_closes_indentation() {
        let tokens = kinds("f(->\n  a)\nb");
        assert_eq!(
            tokens,
            vec![
                ident("f"),
                TokenKind::Punct("("),
                TokenKind::Punct("->"),
                TokenKind::Indent,
                ident("a"),
                TokenKind::Outdent,
                TokenKind::Punct(")"),
                TokenKind::Newline,
                ident("b"),
                TokenKind::Newline,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_spaced_flag() {
        let tokens = tokenize("f -1\ng - 1").unwrap();
        assert!(tokens[1].spaced);
        assert!(!tokens[2].spaced);
        assert!(tokens[5].spaced && tokens[6].spaced);
    }

    #[test]
    fn test_keywords_as_property_names() {
        let tokens = kinds("a.class\nnew: 1");
        assert_eq!(tokens[2], ident("class"));
        assert_eq!(tokens[4], ident("new"));
    }

    #[test]
    fn test_at_ident() {
        assert_eq!(kinds("@name")[0], TokenKind::AtIdent("name".to_string()));
        assert_eq!(kinds("@")[0], TokenKind::Keyword(Keyword::This));
    }

    #[test]
    fn test_strings() {
        assert_eq!(kinds("'it''s'")[0], TokenKind::Str("it".to_string(), '\''));
        assert_eq!(kinds(r#""a\"b""#)[0], TokenKind::Str(r#"a\"b"#.to_string(), '"'));
    }

    #[test]
    fn test_multiline_string_joins_with_space() {
        assert_eq!(
            kinds("x = 'one\n     two'")[2],
            TokenKind::Str("one two".to_string(), '\'')
        );
    }

    #[test]
    fn test_interpolation() {
        let tokens = kinds(r#""Hello #{name}!""#);
        match &tokens[0] {
            TokenKind::Interp(parts) => {
                assert_eq!(parts.len(), 3);
                assert_eq!(parts[0], StrPart::Lit("Hello ".to_string()));
                match &parts[1] {
                    StrPart::Code(tokens, _) => assert_eq!(tokens[0].kind, ident("name")),
                    other => panic!("expected code part, got {:?}", other),
                }
            }
            other => panic!("expected interpolation, got {:?}", other),
        }
    }

    #[test]
    fn test_heredoc_dedent() {
        let tokens = kinds("x = '''\n  <div>\n    hi\n  </div>\n  '''");
        assert_eq!(tokens[2], TokenKind::Str("<div>\\n  hi\\n</div>".to_string(), '\''));
    }

    #[test]
    fn test_regex_vs_division() {
        assert_eq!(kinds("a / b")[1], TokenKind::Punct("/"));
        assert_eq!(kinds("x = /ab+c/gi")[2], TokenKind::Regex("/ab+c/gi".to_string()));
        assert_eq!(kinds("s.replace /x/g, ''")[3], TokenKind::Regex("/x/g".to_string()));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("0xFF")[0], TokenKind::Number("0xFF".to_string()));
        assert_eq!(kinds("1.5e3")[0], TokenKind::Number("1.5e3".to_string()));
        assert_eq!(kinds("0b101")[0], TokenKind::Number("5".to_string()));
        assert_eq!(kinds("[1..5]")[1], TokenKind::Number("1".to_string()));
        assert_eq!(kinds("[1..5]")[2], TokenKind::Punct(".."));
    }

    #[test]
    fn test_here_comment() {
        let tokens = kinds("###\nLicense\n###\nx");
        assert_eq!(tokens[0], TokenKind::HereComment("\nLicense\n".to_string()));
    }

    #[test]
    fn test_semicolon_separates_statements() {
        assert_eq!(
            kinds("a; b"),
            vec![ident("a"), TokenKind::Newline, ident("b"), TokenKind::Newline, TokenKind::Eof]
        );
    }

    #[test]
    fn test_unclosed_string_is_error() {
        let err = tokenize("x = 'abc").unwrap_err();
        assert!(err.message.contains("missing '"));
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_unmatched_bracket_is_error() {
        assert!(tokenize("f(a").unwrap_err().message.contains("missing ')'"));
        assert!(tokenize("a)").unwrap_err().message.contains("unmatched ')'"));
    }
}
