//! Token definitions for the script dialect

use std::fmt;

/// A 0-based position in a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Pos {
    pub line: u32,
    pub column: u32,
}

impl Pos {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// A piece of an interpolated string.
#[derive(Debug, Clone, PartialEq)]
pub enum StrPart {
    /// Literal text, already escaped for a double-quoted JS string
    Lit(String),
    /// Tokens of an embedded `#{...}` expression
    Code(Vec<Token>, Pos),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    /// `@name`
    AtIdent(String),
    Number(String),
    /// String body escaped for JS, plus the quote character to emit
    Str(String, char),
    Interp(Vec<StrPart>),
    Regex(String),
    /// Embedded JavaScript between backticks
    Js(String),
    /// Block comment body from `###`
    HereComment(String),
    Keyword(Keyword),
    /// Operators and punctuation
    Punct(&'static str),
    Indent,
    Outdent,
    Newline,
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    If,
    Else,
    Unless,
    Then,
    While,
    Until,
    Loop,
    For,
    In,
    Of,
    By,
    When,
    Own,
    Return,
    Break,
    Continue,
    Throw,
    Try,
    Catch,
    Finally,
    Switch,
    Class,
    Extends,
    Super,
    New,
    Do,
    This,
    And,
    Or,
    Not,
    Is,
    Isnt,
    Instanceof,
    Typeof,
    Delete,
    True,
    False,
    Null,
    Undefined,
}

impl Keyword {
    pub fn from_word(word: &str) -> Option<Self> {
        let keyword = match word {
            "if" => Keyword::If,
            "else" => Keyword::Else,
            "unless" => Keyword::Unless,
            "then" => Keyword::Then,
            "while" => Keyword::While,
            "until" => Keyword::Until,
            "loop" => Keyword::Loop,
            "for" => Keyword::For,
            "in" => Keyword::In,
            "of" => Keyword::Of,
            "by" => Keyword::By,
            "when" => Keyword::When,
            "own" => Keyword::Own,
            "return" => Keyword::Return,
            "break" => Keyword::Break,
            "continue" => Keyword::Continue,
            "throw" => Keyword::Throw,
            "try" => Keyword::Try,
            "catch" => Keyword::Catch,
            "finally" => Keyword::Finally,
            "switch" => Keyword::Switch,
            "class" => Keyword::Class,
            "extends" => Keyword::Extends,
            "super" => Keyword::Super,
            "new" => Keyword::New,
            "do" => Keyword::Do,
            "this" => Keyword::This,
            "and" => Keyword::And,
            "or" => Keyword::Or,
            "not" => Keyword::Not,
            "is" => Keyword::Is,
            "isnt" => Keyword::Isnt,
            "instanceof" => Keyword::Instanceof,
            "typeof" => Keyword::Typeof,
            "delete" => Keyword::Delete,
            "true" | "yes" | "on" => Keyword::True,
            "false" | "no" | "off" => Keyword::False,
            "null" => Keyword::Null,
            "undefined" => Keyword::Undefined,
            _ => return None,
        };
        Some(keyword)
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = format!("{:?}", self).to_lowercase();
        write!(f, "{}", text)
    }
}

/// A lexed token with its position and surrounding whitespace.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Pos,
    /// Whitespace precedes the token on the same line
    pub spaced: bool,
    /// The token starts a new line, or follows a continued line break
    pub newline_before: bool,
}

impl Token {
    pub fn new(kind: TokenKind, pos: Pos) -> Self {
        Self { kind, pos, spaced: false, newline_before: false }
    }

    pub fn is_punct(&self, p: &str) -> bool {
        matches!(&self.kind, TokenKind::Punct(q) if *q == p)
    }

    pub fn is_keyword(&self, k: Keyword) -> bool {
        matches!(&self.kind, TokenKind::Keyword(q) if *q == k)
    }

    /// Short human-readable description used in error messages.
    pub fn describe(&self) -> String {
        match &self.kind {
            TokenKind::Ident(name) => format!("identifier '{}'", name),
            TokenKind::AtIdent(name) => format!("'@{}'", name),
            TokenKind::Number(n) => format!("number {}", n),
            TokenKind::Str(..) | TokenKind::Interp(_) => "string".to_string(),
            TokenKind::Regex(_) => "regex".to_string(),
            TokenKind::Js(_) => "embedded JavaScript".to_string(),
            TokenKind::HereComment(_) => "block comment".to_string(),
            TokenKind::Keyword(k) => format!("'{}'", k),
            TokenKind::Punct(p) => format!("'{}'", p),
            TokenKind::Indent => "indentation".to_string(),
            TokenKind::Outdent => "outdent".to_string(),
            TokenKind::Newline => "end of line".to_string(),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_aliases() {
        assert_eq!(Keyword::from_word("yes"), Some(Keyword::True));
        assert_eq!(Keyword::from_word("off"), Some(Keyword::False));
        assert_eq!(Keyword::from_word("isnt"), Some(Keyword::Isnt));
        assert_eq!(Keyword::from_word("function"), None);
    }

    #[test]
    fn test_keyword_display() {
        assert_eq!(Keyword::Instanceof.to_string(), "instanceof");
        assert_eq!(Keyword::If.to_string(), "if");
    }

    #[test]
    fn test_token_describe() {
        let token = Token::new(TokenKind::Punct("->"), Pos::new(0, 0));
        assert_eq!(token.describe(), "'->'");
        assert!(token.is_punct("->"));
        assert!(!token.is_keyword(Keyword::If));
    }
}
