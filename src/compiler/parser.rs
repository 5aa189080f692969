//! Recursive-descent parser producing the syntax tree
//!
//! Implicit calls (`f a, b`) and implicit objects (`key: value`) are resolved
//! here from token spacing and layout, so the token stream stays a plain
//! sequence.

use super::ast::*;
use super::token::{Keyword, Pos, StrPart, Token, TokenKind};
use super::CompileError;

/// JavaScript words that are not dialect keywords but cannot name variables.
const RESERVED: &[&str] = &[
    "case",
    "default",
    "function",
    "var",
    "void",
    "with",
    "const",
    "let",
    "enum",
    "export",
    "import",
    "native",
    "implements",
    "interface",
    "package",
    "private",
    "protected",
    "public",
    "static",
    "yield",
    "debugger",
    "__hasProp",
    "__extends",
    "__slice",
    "__bind",
    "__indexOf",
];

const ASSIGN_OPS: &[&str] = &["=", "+=", "-=", "*=", "/=", "%=", "||=", "&&=", "?=", "&=", "|=", "^=", "<<=", ">>=", ">>>="];

/// Parse a token stream into a program body.
pub fn parse(tokens: Vec<Token>) -> Result<Block, CompileError> {
    let mut parser = Parser::new(tokens);
    let body = parser.parse_body()?;
    let token = parser.peek();
    if token.kind != TokenKind::Eof {
        return Err(parser.unexpected(token));
    }
    Ok(body)
}

pub fn is_reserved(name: &str) -> bool {
    RESERVED.contains(&name)
}

struct Parser {
    tokens: Vec<Token>,
    index: usize,
    /// Nesting of implicit call argument lists; a line starting with `.`
    /// belongs to the outermost call
    implicit_call_depth: usize,
    /// Inside a condition, an indented object is a block, not a call argument
    no_indent_call: bool,
}

impl Parser {
    fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|t| &t.kind) != Some(&TokenKind::Eof) {
            let pos = tokens.last().map(|t| t.pos).unwrap_or_default();
            tokens.push(Token::new(TokenKind::Eof, pos));
        }
        Self { tokens, index: 0, implicit_call_depth: 0, no_indent_call: false }
    }

    // ------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------

    fn peek(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.index.min(last)]
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.index + offset).min(last)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
        token
    }

    fn at_punct(&self, p: &str) -> bool {
        self.peek().is_punct(p)
    }

    fn at_keyword(&self, k: Keyword) -> bool {
        self.peek().is_keyword(k)
    }

    fn at_kind(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.at_punct(p) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, k: Keyword) -> bool {
        if self.at_keyword(k) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &str) -> Result<Pos, CompileError> {
        if self.at_punct(p) {
            Ok(self.advance().pos)
        } else {
            let token = self.peek();
            Err(CompileError::new(
                format!("expected '{}' but found {}", p, token.describe()),
                token.pos,
            ))
        }
    }

    fn expect_outdent(&mut self) -> Result<(), CompileError> {
        match self.peek().kind {
            TokenKind::Outdent => {
                self.advance();
                Ok(())
            }
            TokenKind::Eof => Ok(()),
            _ => Err(self.unexpected(self.peek())),
        }
    }

    fn unexpected(&self, token: &Token) -> CompileError {
        CompileError::new(format!("unexpected {}", token.describe()), token.pos)
    }

    fn skip_layout(&mut self) {
        while matches!(
            self.peek().kind,
            TokenKind::Newline | TokenKind::Indent | TokenKind::Outdent | TokenKind::HereComment(_)
        ) {
            self.advance();
        }
    }

    /// Is `else`/`catch`/`finally` next, possibly on the following line?
    fn at_continuation_keyword(&self, k: Keyword) -> bool {
        self.at_keyword(k) || (self.at_kind(&TokenKind::Newline) && self.peek_at(1).is_keyword(k))
    }

    fn eat_continuation_keyword(&mut self, k: Keyword) -> bool {
        if !self.at_continuation_keyword(k) {
            return false;
        }
        if self.at_kind(&TokenKind::Newline) {
            self.advance();
        }
        self.advance();
        true
    }

    /// Tokens that end an expression without belonging to it.
    fn at_expression_end(&self) -> bool {
        let token = self.peek();
        match &token.kind {
            TokenKind::Newline | TokenKind::Outdent | TokenKind::Eof => true,
            TokenKind::Punct(p) => matches!(*p, ")" | "]" | "}" | ","),
            TokenKind::Keyword(k) => matches!(
                k,
                Keyword::If
                    | Keyword::Unless
                    | Keyword::While
                    | Keyword::Until
                    | Keyword::For
                    | Keyword::Else
                    | Keyword::Then
                    | Keyword::When
            ),
            _ => false,
        }
    }

    // ------------------------------------------------------------------
    // Blocks and statements
    // ------------------------------------------------------------------

    fn parse_body(&mut self) -> Result<Block, CompileError> {
        let mut body = Vec::new();
        loop {
            while self.at_kind(&TokenKind::Newline) {
                self.advance();
            }
            if matches!(self.peek().kind, TokenKind::Outdent | TokenKind::Eof) {
                break;
            }
            body.push(self.parse_statement()?);
            match self.peek().kind {
                TokenKind::Newline => continue,
                TokenKind::Outdent | TokenKind::Eof => break,
                _ => return Err(self.unexpected(self.peek())),
            }
        }
        Ok(body)
    }

    /// An indented block or a `then` inline statement.
    fn parse_block(&mut self) -> Result<Block, CompileError> {
        let saved = std::mem::replace(&mut self.no_indent_call, false);
        let saved_depth = std::mem::replace(&mut self.implicit_call_depth, 0);
        let result = self.parse_block_inner();
        self.no_indent_call = saved;
        self.implicit_call_depth = saved_depth;
        result
    }

    fn parse_block_inner(&mut self) -> Result<Block, CompileError> {
        if self.at_kind(&TokenKind::Indent) {
            self.advance();
            let body = self.parse_body()?;
            self.expect_outdent()?;
            return Ok(body);
        }
        if self.eat_keyword(Keyword::Then) {
            if self.at_kind(&TokenKind::Indent) {
                return self.parse_block_inner();
            }
            return Ok(vec![self.parse_statement()?]);
        }
        let token = self.peek();
        Err(CompileError::new(
            format!("expected an indented block but found {}", token.describe()),
            token.pos,
        ))
    }

    fn parse_statement(&mut self) -> Result<Expr, CompileError> {
        let token = self.peek().clone();
        let expr = match &token.kind {
            TokenKind::HereComment(body) => {
                self.advance();
                return Ok(Expr::new(ExprKind::Comment(body.clone()), token.pos));
            }
            TokenKind::Keyword(Keyword::Return) => {
                self.advance();
                let value = if self.at_expression_end() {
                    None
                } else {
                    Some(Box::new(self.parse_expression()?))
                };
                Expr::new(ExprKind::Return(value), token.pos)
            }
            TokenKind::Keyword(Keyword::Break) => {
                self.advance();
                Expr::new(ExprKind::Break, token.pos)
            }
            TokenKind::Keyword(Keyword::Continue) => {
                self.advance();
                Expr::new(ExprKind::Continue, token.pos)
            }
            _ => self.parse_expression()?,
        };
        self.parse_postfix_control(expr)
    }

    /// Trailing `if`, `unless`, `while`, `until` and `for` clauses.
    fn parse_postfix_control(&mut self, mut expr: Expr) -> Result<Expr, CompileError> {
        loop {
            let token = self.peek().clone();
            let TokenKind::Keyword(keyword) = token.kind else { break };
            expr = match keyword {
                Keyword::If | Keyword::Unless => {
                    self.advance();
                    let mut cond = self.parse_condition()?;
                    if keyword == Keyword::Unless {
                        cond = negate(cond);
                    }
                    Expr::new(
                        ExprKind::If(Box::new(If { cond, then: vec![expr], otherwise: None })),
                        token.pos,
                    )
                }
                Keyword::While | Keyword::Until => {
                    self.advance();
                    let mut cond = self.parse_condition()?;
                    if keyword == Keyword::Until {
                        cond = negate(cond);
                    }
                    Expr::new(
                        ExprKind::While(Box::new(While { cond, guard: None, body: vec![expr] })),
                        token.pos,
                    )
                }
                Keyword::For => {
                    self.advance();
                    let mut header = self.parse_for_header()?;
                    header.body = vec![expr];
                    Expr::new(ExprKind::For(Box::new(header)), token.pos)
                }
                _ => break,
            };
        }
        Ok(expr)
    }

    fn parse_condition(&mut self) -> Result<Expr, CompileError> {
        let saved = std::mem::replace(&mut self.no_indent_call, true);
        let result = self.parse_expression();
        self.no_indent_call = saved;
        result
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn parse_expression(&mut self) -> Result<Expr, CompileError> {
        if self.at_implicit_object(0) {
            return self.parse_implicit_object();
        }

        let left = self.parse_binary(0)?;
        let token = self.peek().clone();
        let TokenKind::Punct(op) = token.kind else { return Ok(left) };
        if !ASSIGN_OPS.contains(&op) {
            return Ok(left);
        }
        self.advance();

        let op = if op == "=" { None } else { Some(op) };
        check_assign_target(&left, op.is_none())?;
        let value = self.parse_assign_value()?;
        let pos = left.pos;
        Ok(Expr::new(
            ExprKind::Assign { target: Box::new(left), op, value: Box::new(value) },
            pos,
        ))
    }

    /// Right-hand side of `=` or `:`, which may be an indented block.
    fn parse_assign_value(&mut self) -> Result<Expr, CompileError> {
        if !self.at_kind(&TokenKind::Indent) {
            return self.parse_expression();
        }
        let pos = self.advance().pos;
        let saved = std::mem::replace(&mut self.no_indent_call, false);
        let saved_depth = std::mem::replace(&mut self.implicit_call_depth, 0);
        let body = self.parse_body();
        self.no_indent_call = saved;
        self.implicit_call_depth = saved_depth;
        let mut body = body?;
        self.expect_outdent()?;

        match body.len() {
            1 => Ok(body.remove(0)),
            0 => Err(CompileError::new("expected a value", pos)),
            _ => Err(CompileError::new("expected a single expression in indented value", pos)),
        }
    }

    fn at_implicit_object(&self, offset: usize) -> bool {
        let key = self.peek_at(offset);
        let is_key = matches!(
            key.kind,
            TokenKind::Ident(_) | TokenKind::AtIdent(_) | TokenKind::Str(..) | TokenKind::Number(_)
        );
        is_key && self.peek_at(offset + 1).is_punct(":")
    }

    fn parse_implicit_object(&mut self) -> Result<Expr, CompileError> {
        let pos = self.peek().pos;
        let mut props = Vec::new();
        loop {
            props.push(self.parse_object_prop()?);
            let continues = (self.at_punct(",") || self.at_kind(&TokenKind::Newline))
                && self.at_implicit_object(1);
            if !continues {
                break;
            }
            self.advance();
        }
        Ok(Expr::new(ExprKind::Object(props), pos))
    }

    fn parse_object_prop(&mut self) -> Result<Prop, CompileError> {
        let token = self.advance();
        let key = match token.kind {
            TokenKind::Ident(name) => PropKey::Ident(name),
            TokenKind::AtIdent(name) => PropKey::Static(name),
            TokenKind::Str(text, quote) => PropKey::Str(text, quote),
            TokenKind::Number(n) => PropKey::Number(n),
            _ => return Err(self.unexpected(&token)),
        };
        self.expect_punct(":")?;
        let value = self.parse_assign_value()?;
        Ok(Prop { key, value, pos: token.pos })
    }

    fn binary_op(&self) -> Option<(&'static str, u8, bool)> {
        let token = self.peek();
        let op = match &token.kind {
            TokenKind::Punct(p) => match *p {
                "?" if token.spaced => ("?", 1),
                "||" => ("||", 2),
                "&&" => ("&&", 3),
                "|" => ("|", 4),
                "^" => ("^", 5),
                "&" => ("&", 6),
                "==" => ("===", 7),
                "!=" => ("!==", 7),
                "<" | ">" | "<=" | ">=" => (*p, 8),
                "<<" | ">>" | ">>>" => (*p, 9),
                "+" | "-" => (*p, 10),
                "*" | "/" | "%" => (*p, 11),
                _ => return None,
            },
            TokenKind::Keyword(k) => match k {
                Keyword::Or => ("||", 2),
                Keyword::And => ("&&", 3),
                Keyword::Is => ("===", 7),
                Keyword::Isnt => ("!==", 7),
                Keyword::Instanceof => ("instanceof", 8),
                Keyword::In => ("in", 8),
                Keyword::Of => ("of", 8),
                Keyword::Not => {
                    let next = self.peek_at(1);
                    return match next.kind {
                        TokenKind::Keyword(Keyword::In) => Some(("in", 8, true)),
                        TokenKind::Keyword(Keyword::Of) => Some(("of", 8, true)),
                        TokenKind::Keyword(Keyword::Instanceof) => Some(("instanceof", 8, true)),
                        _ => None,
                    };
                }
                _ => return None,
            },
            _ => return None,
        };
        Some((op.0, op.1, false))
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, CompileError> {
        let mut left = self.parse_unary()?;
        while let Some((op, prec, negated)) = self.binary_op() {
            if prec < min_prec {
                break;
            }
            if negated {
                self.advance();
            }
            self.advance();
            let right = self.parse_binary(prec + 1)?;
            let pos = left.pos;
            let kind = match op {
                "in" => ExprKind::In {
                    item: Box::new(left),
                    collection: Box::new(right),
                    negated,
                },
                "of" => ExprKind::Of { key: Box::new(left), object: Box::new(right), negated },
                _ => {
                    let binary = ExprKind::Binary {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    };
                    if negated {
                        ExprKind::Unary {
                            op: "!",
                            operand: Box::new(Expr::new(ExprKind::Paren(Box::new(Expr::new(binary, pos))), pos)),
                        }
                    } else {
                        binary
                    }
                }
            };
            left = Expr::new(kind, pos);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, CompileError> {
        let token = self.peek().clone();
        let pos = token.pos;
        let unary = |op: &'static str, operand: Expr| {
            Expr::new(ExprKind::Unary { op, operand: Box::new(operand) }, pos)
        };

        match &token.kind {
            TokenKind::Punct("!") | TokenKind::Keyword(Keyword::Not) => {
                self.advance();
                Ok(unary("!", self.parse_unary()?))
            }
            TokenKind::Punct(op @ ("-" | "+" | "~")) => {
                self.advance();
                Ok(unary(*op, self.parse_unary()?))
            }
            TokenKind::Keyword(Keyword::Typeof) => {
                self.advance();
                Ok(unary("typeof", self.parse_unary()?))
            }
            TokenKind::Keyword(Keyword::Delete) => {
                self.advance();
                Ok(unary("delete", self.parse_unary()?))
            }
            TokenKind::Punct(op @ ("++" | "--")) => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::new(ExprKind::Update { op: *op, prefix: true, operand: Box::new(operand) }, pos))
            }
            TokenKind::Keyword(Keyword::New) => {
                self.advance();
                self.parse_new(pos)
            }
            TokenKind::Keyword(Keyword::Do) => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::new(ExprKind::Do(Box::new(operand)), pos))
            }
            _ => {
                let primary = self.parse_primary()?;
                self.parse_postfix(primary, true)
            }
        }
    }

    fn parse_new(&mut self, pos: Pos) -> Result<Expr, CompileError> {
        let primary = self.parse_primary()?;
        let callee = self.parse_postfix(primary, false)?;

        let args = if self.at_punct("(") && !self.peek().spaced {
            self.parse_call_args()?
        } else if self.at_implicit_arg() {
            self.parse_implicit_args()?
        } else {
            Vec::new()
        };
        let call = Expr::new(
            ExprKind::Call { callee: Box::new(callee), args, soak: false, new: true },
            pos,
        );
        self.parse_postfix(call, true)
    }

    /// Accessors, indexing, explicit and implicit calls, soaks and `?`.
    fn parse_postfix(&mut self, mut expr: Expr, calls: bool) -> Result<Expr, CompileError> {
        loop {
            let token = self.peek().clone();
            let pos = expr.pos;
            match &token.kind {
                TokenKind::Punct(op @ ("." | "?.")) => {
                    if token.newline_before && self.implicit_call_depth > 0 {
                        break;
                    }
                    self.advance();
                    let name = self.expect_property_name()?;
                    expr = Expr::new(
                        ExprKind::Access { target: Box::new(expr), name, soak: *op == "?." },
                        pos,
                    );
                }
                TokenKind::Punct("::") => {
                    self.advance();
                    expr = Expr::new(
                        ExprKind::Access {
                            target: Box::new(expr),
                            name: "prototype".to_string(),
                            soak: false,
                        },
                        pos,
                    );
                    if matches!(self.peek().kind, TokenKind::Ident(_)) && !self.peek().spaced {
                        let name = self.expect_property_name()?;
                        expr = Expr::new(
                            ExprKind::Access { target: Box::new(expr), name, soak: false },
                            pos,
                        );
                    }
                }
                TokenKind::Punct("[") if !token.spaced => {
                    self.advance();
                    expr = self.parse_index(expr, false)?;
                }
                TokenKind::Punct("(") if !token.spaced && calls => {
                    let args = self.parse_call_args()?;
                    expr = Expr::new(
                        ExprKind::Call { callee: Box::new(expr), args, soak: false, new: false },
                        pos,
                    );
                }
                TokenKind::Punct("?") if !token.spaced => {
                    let next = self.peek_at(1).clone();
                    self.advance();
                    if next.is_punct("[") && !next.spaced {
                        self.advance();
                        expr = self.parse_index(expr, true)?;
                    } else if next.is_punct("(") && !next.spaced && calls {
                        let args = self.parse_call_args()?;
                        expr = Expr::new(
                            ExprKind::Call { callee: Box::new(expr), args, soak: true, new: false },
                            pos,
                        );
                    } else {
                        expr = Expr::new(ExprKind::Existence(Box::new(expr)), pos);
                        break;
                    }
                }
                TokenKind::Punct(op @ ("++" | "--")) if !token.spaced => {
                    self.advance();
                    expr = Expr::new(
                        ExprKind::Update { op: *op, prefix: false, operand: Box::new(expr) },
                        pos,
                    );
                }
                _ if calls && is_callable(&expr) && self.at_implicit_arg() => {
                    let args = self.parse_implicit_args()?;
                    expr = Expr::new(
                        ExprKind::Call { callee: Box::new(expr), args, soak: false, new: false },
                        pos,
                    );
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn expect_property_name(&mut self) -> Result<String, CompileError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Ident(name) => Ok(name),
            TokenKind::Keyword(k) => Ok(k.to_string()),
            _ => Err(CompileError::new(
                format!("expected a property name but found {}", token.describe()),
                token.pos,
            )),
        }
    }

    /// After `[`: an index or a slice.
    fn parse_index(&mut self, target: Expr, soak: bool) -> Result<Expr, CompileError> {
        let pos = target.pos;
        let saved_depth = std::mem::replace(&mut self.implicit_call_depth, 0);
        let result = self.parse_index_inner(target, soak, pos);
        self.implicit_call_depth = saved_depth;
        result
    }

    fn parse_index_inner(&mut self, target: Expr, soak: bool, pos: Pos) -> Result<Expr, CompileError> {
        self.skip_layout();
        let from = if self.at_punct("..") || self.at_punct("...") {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        self.skip_layout();

        if self.at_punct("..") || self.at_punct("...") {
            let exclusive = self.advance().is_punct("...");
            self.skip_layout();
            let to = if self.at_punct("]") { None } else { Some(Box::new(self.parse_expression()?)) };
            self.skip_layout();
            self.expect_punct("]")?;
            return Ok(Expr::new(
                ExprKind::Slice { target: Box::new(target), from, to, exclusive },
                pos,
            ));
        }

        self.expect_punct("]")?;
        let Some(index) = from else {
            return Err(CompileError::new("expected an index", pos));
        };
        Ok(Expr::new(ExprKind::Index { target: Box::new(target), index, soak }, pos))
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>, CompileError> {
        self.expect_punct("(")?;
        let saved_depth = std::mem::replace(&mut self.implicit_call_depth, 0);
        let saved = std::mem::replace(&mut self.no_indent_call, false);
        let result = self.parse_list(")");
        self.implicit_call_depth = saved_depth;
        self.no_indent_call = saved;
        result
    }

    /// Comma or newline separated elements up to `close`, which is consumed.
    fn parse_list(&mut self, close: &str) -> Result<Vec<Expr>, CompileError> {
        let mut items = Vec::new();
        self.skip_layout();
        while !self.at_punct(close) {
            items.push(self.parse_arg()?);
            self.skip_layout();
            if self.eat_punct(",") {
                self.skip_layout();
            } else if self.at_kind(&TokenKind::Eof) {
                break;
            }
        }
        self.expect_punct(close)?;
        Ok(items)
    }

    fn parse_arg(&mut self) -> Result<Expr, CompileError> {
        let expr = self.parse_expression()?;
        if self.at_punct("...") {
            self.advance();
            let pos = expr.pos;
            return Ok(Expr::new(ExprKind::Splat(Box::new(expr)), pos));
        }
        Ok(expr)
    }

    /// Can the next token start an argument of a call without parentheses?
    fn at_implicit_arg(&self) -> bool {
        let token = self.peek();
        if token.kind == TokenKind::Indent {
            return !self.no_indent_call && self.at_implicit_object(1);
        }
        if !token.spaced || token.newline_before {
            return false;
        }
        match &token.kind {
            TokenKind::Ident(_)
            | TokenKind::AtIdent(_)
            | TokenKind::Number(_)
            | TokenKind::Str(..)
            | TokenKind::Interp(_)
            | TokenKind::Regex(_)
            | TokenKind::Js(_) => true,
            TokenKind::Keyword(k) => matches!(
                k,
                Keyword::This
                    | Keyword::True
                    | Keyword::False
                    | Keyword::Null
                    | Keyword::Undefined
                    | Keyword::New
                    | Keyword::Typeof
                    | Keyword::Delete
                    | Keyword::Do
                    | Keyword::Super
            ),
            // `a not in b` is a binary operator, `f not x` a call
            TokenKind::Keyword(Keyword::Not) => !matches!(
                self.peek_at(1).kind,
                TokenKind::Keyword(Keyword::In | Keyword::Of | Keyword::Instanceof)
            ),
            TokenKind::Punct(p) => match *p {
                "(" | "[" | "{" | "->" | "=>" | "!" | "~" => true,
                "-" | "+" | "++" | "--" => {
                    let next = self.peek_at(1);
                    !next.spaced && !matches!(next.kind, TokenKind::Newline | TokenKind::Eof)
                }
                _ => false,
            },
            _ => false,
        }
    }

    fn parse_implicit_args(&mut self) -> Result<Vec<Expr>, CompileError> {
        self.implicit_call_depth += 1;
        let result = self.parse_implicit_args_inner();
        self.implicit_call_depth -= 1;
        result
    }

    fn parse_implicit_args_inner(&mut self) -> Result<Vec<Expr>, CompileError> {
        if self.at_kind(&TokenKind::Indent) {
            self.advance();
            let saved_depth = std::mem::replace(&mut self.implicit_call_depth, 0);
            let object = self.parse_implicit_object();
            self.implicit_call_depth = saved_depth;
            let object = object?;
            while self.at_kind(&TokenKind::Newline) {
                self.advance();
            }
            self.expect_outdent()?;
            return Ok(vec![object]);
        }

        let mut args = vec![self.parse_arg()?];
        while self.eat_punct(",") {
            if self.at_kind(&TokenKind::Indent) && self.at_implicit_object(1) {
                self.advance();
                args.push(self.parse_implicit_object()?);
                self.expect_outdent()?;
                break;
            }
            args.push(self.parse_arg()?);
        }
        Ok(args)
    }

    // ------------------------------------------------------------------
    // Primary expressions
    // ------------------------------------------------------------------

    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        let token = self.peek().clone();
        let pos = token.pos;

        if token.is_punct("->") || token.is_punct("=>") {
            return self.parse_func(Vec::new());
        }
        if token.is_punct("(") && self.at_param_list() {
            let params = self.parse_params()?;
            return self.parse_func(params);
        }

        self.advance();
        let kind = match token.kind {
            TokenKind::Number(n) => ExprKind::Number(n),
            TokenKind::Str(text, quote) => ExprKind::Str(text, quote),
            TokenKind::Interp(parts) => ExprKind::Interp(parse_interpolation(parts)?),
            TokenKind::Regex(re) => ExprKind::Regex(re),
            TokenKind::Js(code) => ExprKind::Js(code),
            TokenKind::Ident(name) => {
                check_name(&name, pos)?;
                ExprKind::Ident(name)
            }
            TokenKind::AtIdent(name) => ExprKind::Access {
                target: Box::new(Expr::new(ExprKind::This, pos)),
                name,
                soak: false,
            },
            TokenKind::Keyword(keyword) => match keyword {
                Keyword::True => ExprKind::Bool(true),
                Keyword::False => ExprKind::Bool(false),
                Keyword::Null => ExprKind::Null,
                Keyword::Undefined => ExprKind::Undefined,
                Keyword::This => ExprKind::This,
                Keyword::If | Keyword::Unless => return self.parse_if(keyword == Keyword::Unless, pos),
                Keyword::While | Keyword::Until | Keyword::Loop => return self.parse_while(keyword, pos),
                Keyword::For => {
                    let mut header = self.parse_for_header()?;
                    header.body = self.parse_block()?;
                    ExprKind::For(Box::new(header))
                }
                Keyword::Switch => return self.parse_switch(pos),
                Keyword::Try => return self.parse_try(pos),
                Keyword::Class => return self.parse_class(pos),
                Keyword::Super => return self.parse_super(pos),
                Keyword::Throw => ExprKind::Throw(Box::new(self.parse_expression()?)),
                _ => return Err(self.unexpected(&token)),
            },
            TokenKind::Punct("(") => {
                let saved_depth = std::mem::replace(&mut self.implicit_call_depth, 0);
                let saved = std::mem::replace(&mut self.no_indent_call, false);
                let inner = self.parse_paren_inner();
                self.implicit_call_depth = saved_depth;
                self.no_indent_call = saved;
                ExprKind::Paren(Box::new(inner?))
            }
            TokenKind::Punct("[") => {
                let saved_depth = std::mem::replace(&mut self.implicit_call_depth, 0);
                let saved = std::mem::replace(&mut self.no_indent_call, false);
                let array = self.parse_array(pos);
                self.implicit_call_depth = saved_depth;
                self.no_indent_call = saved;
                return array;
            }
            TokenKind::Punct("{") => {
                let saved_depth = std::mem::replace(&mut self.implicit_call_depth, 0);
                let saved = std::mem::replace(&mut self.no_indent_call, false);
                let object = self.parse_object();
                self.implicit_call_depth = saved_depth;
                self.no_indent_call = saved;
                ExprKind::Object(object?)
            }
            _ => return Err(self.unexpected(&token)),
        };
        Ok(Expr::new(kind, pos))
    }

    fn parse_paren_inner(&mut self) -> Result<Expr, CompileError> {
        self.skip_layout();
        let expr = self.parse_statement()?;
        self.skip_layout();
        self.expect_punct(")")?;
        Ok(expr)
    }

    fn parse_array(&mut self, pos: Pos) -> Result<Expr, CompileError> {
        self.skip_layout();
        if self.eat_punct("]") {
            return Ok(Expr::new(ExprKind::Array(Vec::new()), pos));
        }

        let first = self.parse_expression()?;
        if self.at_punct("..") || (self.at_punct("...") && !self.at_splat_end()) {
            let exclusive = self.advance().is_punct("...");
            self.skip_layout();
            let to = self.parse_expression()?;
            self.skip_layout();
            self.expect_punct("]")?;
            return Ok(Expr::new(
                ExprKind::Range { from: Box::new(first), to: Box::new(to), exclusive },
                pos,
            ));
        }

        let first = if self.eat_punct("...") {
            let pos = first.pos;
            Expr::new(ExprKind::Splat(Box::new(first)), pos)
        } else {
            first
        };
        self.skip_layout();

        let mut items = vec![first];
        if self.eat_punct(",") {
            self.skip_layout();
        }
        items.extend(self.parse_list("]")?);
        Ok(Expr::new(ExprKind::Array(items), pos))
    }

    /// Does the `...` at the cursor close a splat rather than open a range end?
    fn at_splat_end(&self) -> bool {
        let next = self.peek_at(1);
        next.is_punct("]")
            || next.is_punct(",")
            || matches!(next.kind, TokenKind::Newline | TokenKind::Indent | TokenKind::Outdent | TokenKind::Eof)
    }

    fn parse_object(&mut self) -> Result<Vec<Prop>, CompileError> {
        let mut props = Vec::new();
        self.skip_layout();
        while !self.at_punct("}") {
            let token = self.peek().clone();
            if self.peek_at(1).is_punct(":") {
                props.push(self.parse_object_prop()?);
            } else {
                self.advance();
                let (key, value) = match token.kind {
                    TokenKind::Ident(name) => {
                        check_name(&name, token.pos)?;
                        (PropKey::Ident(name.clone()), Expr::ident(name, token.pos))
                    }
                    TokenKind::AtIdent(name) => (
                        PropKey::Ident(name.clone()),
                        Expr::new(
                            ExprKind::Access {
                                target: Box::new(Expr::new(ExprKind::This, token.pos)),
                                name,
                                soak: false,
                            },
                            token.pos,
                        ),
                    ),
                    _ => return Err(self.unexpected(&token)),
                };
                props.push(Prop { key, value, pos: token.pos });
            }
            self.skip_layout();
            if self.eat_punct(",") {
                self.skip_layout();
            } else if self.at_kind(&TokenKind::Eof) {
                break;
            }
        }
        self.expect_punct("}")?;
        Ok(props)
    }

    // ------------------------------------------------------------------
    // Functions
    // ------------------------------------------------------------------

    /// Is the `(` at the cursor the start of a parameter list?
    fn at_param_list(&self) -> bool {
        let mut depth = 0usize;
        let mut i = self.index;
        while i < self.tokens.len() {
            let token = &self.tokens[i];
            if token.is_punct("(") {
                depth += 1;
            } else if token.is_punct(")") {
                depth -= 1;
                if depth == 0 {
                    let next = self.tokens.get(i + 1);
                    return next.is_some_and(|t| t.is_punct("->") || t.is_punct("=>"));
                }
            }
            i += 1;
        }
        false
    }

    fn parse_params(&mut self) -> Result<Vec<Param>, CompileError> {
        self.expect_punct("(")?;
        let mut params = Vec::new();
        self.skip_layout();
        while !self.at_punct(")") {
            let token = self.peek().clone();
            let target = match &token.kind {
                TokenKind::Ident(name) => {
                    check_name(name, token.pos)?;
                    self.advance();
                    ParamTarget::Ident(name.clone())
                }
                TokenKind::AtIdent(name) => {
                    self.advance();
                    ParamTarget::This(name.clone())
                }
                TokenKind::Punct("[") | TokenKind::Punct("{") => {
                    ParamTarget::Pattern(self.parse_primary()?)
                }
                _ => return Err(self.unexpected(&token)),
            };
            let splat = self.eat_punct("...");
            let default = if self.eat_punct("=") { Some(self.parse_expression()?) } else { None };
            params.push(Param { target, default, splat, pos: token.pos });

            self.skip_layout();
            if self.eat_punct(",") {
                self.skip_layout();
            } else if !self.at_punct(")") {
                return Err(self.unexpected(self.peek()));
            }
        }
        self.expect_punct(")")?;

        if params.iter().filter(|p| p.splat).count() > 1 {
            return Err(CompileError::new("only one splat parameter is allowed", params[0].pos));
        }
        Ok(params)
    }

    fn parse_func(&mut self, params: Vec<Param>) -> Result<Expr, CompileError> {
        let arrow = self.advance();
        let pos = params.first().map(|p| p.pos).unwrap_or(arrow.pos);
        let bound = arrow.is_punct("=>");
        if !bound && !arrow.is_punct("->") {
            return Err(self.unexpected(&arrow));
        }

        let body = if self.at_kind(&TokenKind::Indent) {
            self.parse_block()?
        } else if self.at_func_end() {
            Vec::new()
        } else {
            vec![self.parse_statement()?]
        };
        Ok(Expr::new(ExprKind::Func(Box::new(Func { params, body, bound })), pos))
    }

    fn at_func_end(&self) -> bool {
        match &self.peek().kind {
            TokenKind::Newline | TokenKind::Outdent | TokenKind::Eof => true,
            TokenKind::Punct(p) => matches!(*p, ")" | "]" | "}" | ","),
            _ => false,
        }
    }

    fn parse_super(&mut self, pos: Pos) -> Result<Expr, CompileError> {
        let args = if self.at_punct("(") && !self.peek().spaced {
            Some(self.parse_call_args()?)
        } else if self.at_implicit_arg() {
            Some(self.parse_implicit_args()?)
        } else {
            None
        };
        let expr = Expr::new(ExprKind::Super(args), pos);
        self.parse_postfix(expr, true)
    }

    // ------------------------------------------------------------------
    // Control flow
    // ------------------------------------------------------------------

    fn parse_if(&mut self, unless: bool, pos: Pos) -> Result<Expr, CompileError> {
        let mut cond = self.parse_condition()?;
        if unless {
            cond = negate(cond);
        }
        let then = self.parse_block()?;

        let otherwise = if self.eat_continuation_keyword(Keyword::Else) {
            if self.at_keyword(Keyword::If) || self.at_keyword(Keyword::Unless) {
                let token = self.advance();
                Some(vec![self.parse_if(token.is_keyword(Keyword::Unless), token.pos)?])
            } else {
                Some(self.parse_else_body()?)
            }
        } else {
            None
        };
        Ok(Expr::new(ExprKind::If(Box::new(If { cond, then, otherwise })), pos))
    }

    /// After `else`: an indented block or one statement on the same line.
    fn parse_else_body(&mut self) -> Result<Block, CompileError> {
        if self.at_kind(&TokenKind::Indent) {
            return self.parse_block();
        }
        let saved = std::mem::replace(&mut self.no_indent_call, false);
        let saved_depth = std::mem::replace(&mut self.implicit_call_depth, 0);
        let statement = self.parse_statement();
        self.no_indent_call = saved;
        self.implicit_call_depth = saved_depth;
        Ok(vec![statement?])
    }

    fn parse_while(&mut self, keyword: Keyword, pos: Pos) -> Result<Expr, CompileError> {
        let cond = match keyword {
            Keyword::Loop => Expr::new(ExprKind::Bool(true), pos),
            Keyword::Until => negate(self.parse_condition()?),
            _ => self.parse_condition()?,
        };
        let guard = if self.eat_keyword(Keyword::When) { Some(self.parse_condition()?) } else { None };
        let body = self.parse_block()?;
        Ok(Expr::new(ExprKind::While(Box::new(While { cond, guard, body })), pos))
    }

    /// `[own] value[, index] in|of source [by step] [when guard]`
    fn parse_for_header(&mut self) -> Result<For, CompileError> {
        let own = self.eat_keyword(Keyword::Own);

        let token = self.peek().clone();
        let value = match &token.kind {
            TokenKind::Ident(name) => {
                check_name(name, token.pos)?;
                self.advance();
                Some(Expr::ident(name.clone(), token.pos))
            }
            TokenKind::AtIdent(_) | TokenKind::Punct("[") | TokenKind::Punct("{") => {
                Some(self.parse_primary()?)
            }
            _ => None,
        };

        let index = if self.eat_punct(",") {
            let token = self.advance();
            match token.kind {
                TokenKind::Ident(name) => {
                    check_name(&name, token.pos)?;
                    Some(name)
                }
                _ => return Err(self.unexpected(&token)),
            }
        } else {
            None
        };

        let object = if self.eat_keyword(Keyword::In) {
            false
        } else if self.eat_keyword(Keyword::Of) {
            true
        } else {
            let token = self.peek();
            return Err(CompileError::new(
                format!("expected 'in' or 'of' but found {}", token.describe()),
                token.pos,
            ));
        };
        if own && !object {
            return Err(CompileError::new("'own' is only valid in 'for ... of' loops", token.pos));
        }
        if object && !matches!(value.as_ref().map(|v| &v.kind), Some(ExprKind::Ident(_))) {
            return Err(CompileError::new("'for ... of' needs a key variable", token.pos));
        }
        if value.is_none() {
            return Err(CompileError::new("expected a loop variable", token.pos));
        }

        let source = self.parse_condition()?;
        let step = if !object && self.eat_keyword(Keyword::By) {
            Some(self.parse_condition()?)
        } else {
            None
        };
        let guard = if self.eat_keyword(Keyword::When) { Some(self.parse_condition()?) } else { None };

        Ok(For { value, index, source, object, own, step, guard, body: Vec::new() })
    }

    fn parse_switch(&mut self, pos: Pos) -> Result<Expr, CompileError> {
        let subject = if self.at_kind(&TokenKind::Indent) { None } else { Some(self.parse_condition()?) };
        if !self.at_kind(&TokenKind::Indent) {
            return Err(CompileError::new("expected 'when' clauses after 'switch'", pos));
        }
        self.advance();

        let mut cases = Vec::new();
        let mut otherwise = None;
        loop {
            while self.at_kind(&TokenKind::Newline) {
                self.advance();
            }
            if self.eat_keyword(Keyword::When) {
                let mut tests = vec![self.parse_condition()?];
                while self.eat_punct(",") {
                    tests.push(self.parse_condition()?);
                }
                let body = self.parse_block()?;
                cases.push(Case { tests, body });
            } else if self.eat_keyword(Keyword::Else) {
                otherwise = Some(self.parse_else_body()?);
            } else if matches!(self.peek().kind, TokenKind::Outdent | TokenKind::Eof) {
                break;
            } else {
                return Err(self.unexpected(self.peek()));
            }
        }
        self.expect_outdent()?;

        if cases.is_empty() {
            return Err(CompileError::new("'switch' needs at least one 'when' clause", pos));
        }
        Ok(Expr::new(ExprKind::Switch(Box::new(Switch { subject, cases, otherwise })), pos))
    }

    fn parse_try(&mut self, pos: Pos) -> Result<Expr, CompileError> {
        let body = if self.at_kind(&TokenKind::Indent) {
            self.parse_block()?
        } else {
            vec![self.parse_statement()?]
        };

        let catch = if self.eat_continuation_keyword(Keyword::Catch) {
            let name = match self.peek().kind.clone() {
                TokenKind::Ident(name) => {
                    let token = self.advance();
                    check_name(&name, token.pos)?;
                    Some(name)
                }
                _ => None,
            };
            let block = if self.at_kind(&TokenKind::Indent) || self.at_keyword(Keyword::Then) {
                self.parse_block()?
            } else {
                Vec::new()
            };
            Some((name, block))
        } else {
            None
        };

        let finally = if self.eat_continuation_keyword(Keyword::Finally) {
            Some(self.parse_block()?)
        } else {
            None
        };

        let catch = if catch.is_none() && finally.is_none() { Some((None, Vec::new())) } else { catch };
        Ok(Expr::new(ExprKind::Try(Box::new(Try { body, catch, finally })), pos))
    }

    fn parse_class(&mut self, pos: Pos) -> Result<Expr, CompileError> {
        let token = self.peek().clone();
        let mut target = match &token.kind {
            TokenKind::Ident(name) => {
                check_name(name, token.pos)?;
                self.advance();
                Some(Expr::ident(name.clone(), token.pos))
            }
            TokenKind::AtIdent(name) => {
                self.advance();
                Some(Expr::new(
                    ExprKind::Access {
                        target: Box::new(Expr::new(ExprKind::This, token.pos)),
                        name: name.clone(),
                        soak: false,
                    },
                    token.pos,
                ))
            }
            _ => None,
        };
        while let Some(current) = target.take() {
            if self.at_punct(".") && !self.peek().spaced {
                self.advance();
                let name = self.expect_property_name()?;
                target = Some(Expr::new(
                    ExprKind::Access { target: Box::new(current), name, soak: false },
                    token.pos,
                ));
            } else {
                target = Some(current);
                break;
            }
        }

        let parent = if self.eat_keyword(Keyword::Extends) { Some(self.parse_condition()?) } else { None };

        let body = if self.at_kind(&TokenKind::Indent) { self.parse_block()? } else { Vec::new() };
        let mut members = Vec::new();
        for stmt in body {
            match stmt.kind {
                ExprKind::Object(props) => {
                    for prop in props {
                        members.push(ClassMember::Method { key: prop.key, value: prop.value, pos: prop.pos });
                    }
                }
                _ => members.push(ClassMember::Code(stmt)),
            }
        }
        Ok(Expr::new(ExprKind::Class(Box::new(Class { target, parent, members })), pos))
    }
}

fn negate(cond: Expr) -> Expr {
    let pos = cond.pos;
    let operand = match cond.kind {
        ExprKind::Binary { .. } | ExprKind::In { .. } | ExprKind::Of { .. } | ExprKind::Assign { .. } => {
            Expr::new(ExprKind::Paren(Box::new(cond)), pos)
        }
        _ => cond,
    };
    Expr::new(ExprKind::Unary { op: "!", operand: Box::new(operand) }, pos)
}

fn is_callable(expr: &Expr) -> bool {
    matches!(
        expr.kind,
        ExprKind::Ident(_)
            | ExprKind::Access { .. }
            | ExprKind::Index { .. }
            | ExprKind::Call { .. }
            | ExprKind::Paren(_)
    )
}

fn check_name(name: &str, pos: Pos) -> Result<(), CompileError> {
    if is_reserved(name) {
        return Err(CompileError::new(format!("reserved word '{}'", name), pos));
    }
    Ok(())
}

fn check_assign_target(target: &Expr, plain: bool) -> Result<(), CompileError> {
    match &target.kind {
        ExprKind::Ident(_) | ExprKind::Access { .. } | ExprKind::Index { .. } => Ok(()),
        ExprKind::Array(items) if plain => {
            for item in items {
                match &item.kind {
                    ExprKind::Splat(inner) => check_assign_target(inner, true)?,
                    _ => check_assign_target(item, true)?,
                }
            }
            Ok(())
        }
        ExprKind::Object(props) if plain => {
            for prop in props {
                check_assign_target(&prop.value, true)?;
            }
            Ok(())
        }
        _ => Err(CompileError::new("invalid assignment target", target.pos)),
    }
}

fn parse_interpolation(parts: Vec<StrPart>) -> Result<Vec<InterpPart>, CompileError> {
    let mut out = Vec::new();
    for part in parts {
        match part {
            StrPart::Lit(text) => out.push(InterpPart::Lit(text)),
            StrPart::Code(mut tokens, pos) => {
                let end = tokens.last().map(|t| t.pos).unwrap_or(pos);
                tokens.push(Token::new(TokenKind::Newline, end));
                tokens.push(Token::new(TokenKind::Eof, end));
                let mut parser = Parser::new(tokens);
                let expr = parser.parse_expression()?;
                let expr = parser.parse_postfix_control(expr)?;
                if parser.peek().kind != TokenKind::Newline {
                    return Err(parser.unexpected(parser.peek()));
                }
                out.push(InterpPart::Code(expr));
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::lexer::tokenize;

    fn parse_source(source: &str) -> Block {
        parse(tokenize(source).unwrap()).unwrap()
    }

    fn parse_one(source: &str) -> ExprKind {
        let mut body = parse_source(source);
        assert_eq!(body.len(), 1, "expected a single statement in {:?}", body);
        body.remove(0).kind
    }

    #[test]
    fn test_assignment() {
        match parse_one("x = 1 + 2 * 3") {
            ExprKind::Assign { target, op: None, value } => {
                assert_eq!(target.kind, ExprKind::Ident("x".to_string()));
                match value.kind {
                    ExprKind::Binary { op: "+", right, .. } => {
                        assert!(matches!(right.kind, ExprKind::Binary { op: "*", .. }));
                    }
                    other => panic!("unexpected value {:?}", other),
                }
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_implicit_call_with_args() {
        match parse_one("console.log 'a', b") {
            ExprKind::Call { callee, args, .. } => {
                assert!(matches!(callee.kind, ExprKind::Access { .. }));
                assert_eq!(args.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_nested_implicit_calls() {
        match parse_one("f g x") {
            ExprKind::Call { args, .. } => {
                assert!(matches!(args[0].kind, ExprKind::Call { .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_minus_spacing_decides_call() {
        assert!(matches!(parse_one("a - 1"), ExprKind::Binary { op: "-", .. }));
        assert!(matches!(parse_one("a -1"), ExprKind::Call { .. }));
    }

    #[test]
    fn test_implicit_object_argument() {
        match parse_one("f a: 1, b: 2") {
            ExprKind::Call { args, .. } => match &args[0].kind {
                ExprKind::Object(props) => assert_eq!(props.len(), 2),
                other => panic!("unexpected arg {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_indented_object_argument() {
        match parse_one("$.ajax\n  url: u\n  type: 'GET'") {
            ExprKind::Call { args, .. } => match &args[0].kind {
                ExprKind::Object(props) => assert_eq!(props.len(), 2),
                other => panic!("unexpected arg {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_function_with_params_and_block() {
        match parse_one("add = (a, b = 2) ->\n  a + b") {
            ExprKind::Assign { value, .. } => match value.kind {
                ExprKind::Func(func) => {
                    assert_eq!(func.params.len(), 2);
                    assert!(func.params[1].default.is_some());
                    assert_eq!(func.body.len(), 1);
                    assert!(!func.bound);
                }
                other => panic!("unexpected value {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_paren_group_is_not_params() {
        assert!(matches!(parse_one("(a + b) * c"), ExprKind::Binary { op: "*", .. }));
    }

    #[test]
    fn test_callback_then_chain() {
        match parse_one("$.get url, ->\n  done()\n.fail ->\n  oops()") {
            ExprKind::Call { callee, .. } => match callee.kind {
                ExprKind::Access { name, target, .. } => {
                    assert_eq!(name, "fail");
                    assert!(matches!(target.kind, ExprKind::Call { .. }));
                }
                other => panic!("unexpected callee {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_if_else_chain() {
        match parse_one("if a\n  1\nelse if b\n  2\nelse\n  3") {
            ExprKind::If(node) => {
                let otherwise = node.otherwise.unwrap();
                assert!(matches!(otherwise[0].kind, ExprKind::If(_)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_inline_if_then_else() {
        match parse_one("x = if a then b else c") {
            ExprKind::Assign { value, .. } => assert!(matches!(value.kind, ExprKind::If(_))),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_postfix_conditional_wraps_statement() {
        match parse_one("return x unless y") {
            ExprKind::If(node) => {
                assert!(matches!(node.cond.kind, ExprKind::Unary { op: "!", .. }));
                assert!(matches!(node.then[0].kind, ExprKind::Return(Some(_))));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_comprehension() {
        match parse_one("squares = (x * x for x in list when x > 0)") {
            ExprKind::Assign { value, .. } => match value.kind {
                ExprKind::Paren(inner) => match inner.kind {
                    ExprKind::For(node) => {
                        assert!(node.guard.is_some());
                        assert!(!node.object);
                    }
                    other => panic!("unexpected {:?}", other),
                },
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_for_own_of() {
        match parse_one("for own key, value of obj\n  log key") {
            ExprKind::For(node) => {
                assert!(node.own && node.object);
                assert_eq!(node.index.as_deref(), Some("value"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_switch() {
        match parse_one("switch x\n  when 1, 2 then 'low'\n  when 3\n    'mid'\n  else 'high'") {
            ExprKind::Switch(node) => {
                assert_eq!(node.cases.len(), 2);
                assert_eq!(node.cases[0].tests.len(), 2);
                assert!(node.otherwise.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_try_catch_finally() {
        match parse_one("try\n  a()\ncatch err\n  b err\nfinally\n  c()") {
            ExprKind::Try(node) => {
                assert_eq!(node.catch.as_ref().unwrap().0.as_deref(), Some("err"));
                assert!(node.finally.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_class_members() {
        let source = "class Dog extends Animal\n  constructor: (@name) ->\n  bark: ->\n    'woof'\n  @create: -> new Dog";
        match parse_one(source) {
            ExprKind::Class(node) => {
                assert!(node.parent.is_some());
                assert_eq!(node.members.len(), 3);
                assert!(matches!(
                    &node.members[2],
                    ClassMember::Method { key: PropKey::Static(name), .. } if name == "create"
                ));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_soak_and_existence() {
        assert!(matches!(parse_one("a?.b"), ExprKind::Access { soak: true, .. }));
        assert!(matches!(parse_one("a?"), ExprKind::Existence(_)));
        assert!(matches!(parse_one("a ? b"), ExprKind::Binary { op: "?", .. }));
        assert!(matches!(parse_one("f?()"), ExprKind::Call { soak: true, .. }));
    }

    #[test]
    fn test_not_in() {
        assert!(matches!(parse_one("a not in b"), ExprKind::In { negated: true, .. }));
    }

    #[test]
    fn test_slices_and_ranges() {
        assert!(matches!(parse_one("a[1..2]"), ExprKind::Slice { exclusive: false, .. }));
        assert!(matches!(parse_one("a[..-1]"), ExprKind::Slice { from: None, .. }));
        assert!(matches!(parse_one("[1...5]"), ExprKind::Range { exclusive: true, .. }));
    }

    #[test]
    fn test_not_of_and_not_instanceof() {
        assert!(matches!(parse_one("k not of obj"), ExprKind::Of { negated: true, .. }));
        assert!(matches!(parse_one("a not instanceof B"), ExprKind::Unary { op: "!", .. }));
        assert!(matches!(parse_one("f not x"), ExprKind::Call { .. }));
    }

    #[test]
    fn test_exclusive_range_is_not_splat() {
        match parse_one("for i in [0...3]\n  f i") {
            ExprKind::For(node) => {
                assert!(matches!(node.source.kind, ExprKind::Range { exclusive: true, .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_array_splats() {
        match parse_one("[xs..., y]") {
            ExprKind::Array(items) => {
                assert_eq!(items.len(), 2);
                assert!(matches!(items[0].kind, ExprKind::Splat(_)));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(parse_one("[xs...]"), ExprKind::Array(items) if items.len() == 1));
    }

    #[test]
    fn test_inline_else_forms() {
        for source in ["if a then b() else c()", "if a\n  b()\nelse c()", "unless a then b() else c()"] {
            match parse_one(source) {
                ExprKind::If(node) => assert_eq!(node.otherwise.map(|o| o.len()), Some(1), "{}", source),
                other => panic!("unexpected {:?} for {}", other, source),
            }
        }
        match parse_one("if a then b else if c then d else e") {
            ExprKind::If(node) => {
                let otherwise = node.otherwise.unwrap();
                assert!(matches!(&otherwise[0].kind, ExprKind::If(inner) if inner.otherwise.is_some()));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_switch_inline_else() {
        match parse_one("switch x\n  when 1 then a()\n  else b()") {
            ExprKind::Switch(node) => assert_eq!(node.otherwise.map(|o| o.len()), Some(1)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_statement_in_parens() {
        match parse_one("x = (return 1)") {
            ExprKind::Assign { value, .. } => {
                assert!(matches!(&value.kind, ExprKind::Paren(inner) if matches!(inner.kind, ExprKind::Return(_))));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_reserved_word_is_error() {
        let err = parse(tokenize("var = 1").unwrap()).unwrap_err();
        assert!(err.message.contains("reserved word 'var'"));
    }

    #[test]
    fn test_invalid_assignment_target() {
        let err = parse(tokenize("1 = 2").unwrap()).unwrap_err();
        assert!(err.message.contains("invalid assignment target"));
    }

    #[test]
    fn test_unexpected_token_reports_position() {
        let err = parse(tokenize("a = 1\nb = else").unwrap()).unwrap_err();
        assert_eq!(err.line, 2);
    }
}
