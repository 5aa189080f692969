//! Syntax tree for the script dialect
//!
//! Everything is an expression. Control flow (`if`, loops, `switch`, `try`,
//! `class`) is represented as expression kinds so it can appear both as a
//! statement and as a value.

use super::token::Pos;

pub type Block = Vec<Expr>;

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: Pos,
}

impl Expr {
    pub fn new(kind: ExprKind, pos: Pos) -> Self {
        Self { kind, pos }
    }

    pub fn ident(name: impl Into<String>, pos: Pos) -> Self {
        Self::new(ExprKind::Ident(name.into()), pos)
    }

    /// Plain variable reference, `this`, or a literal: safe to evaluate twice.
    pub fn is_simple(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Ident(_)
                | ExprKind::This
                | ExprKind::Number(_)
                | ExprKind::Str(..)
                | ExprKind::Bool(_)
                | ExprKind::Null
                | ExprKind::Undefined
        )
    }

    /// Kinds that compile to JavaScript statements rather than expressions.
    pub fn is_statement_like(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::If(_)
                | ExprKind::For(_)
                | ExprKind::While(_)
                | ExprKind::Switch(_)
                | ExprKind::Try(_)
                | ExprKind::Return(_)
                | ExprKind::Throw(_)
                | ExprKind::Break
                | ExprKind::Continue
                | ExprKind::Comment(_)
        )
    }

    /// Whether control leaves the block unconditionally after this node.
    pub fn is_jump(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Return(_) | ExprKind::Throw(_) | ExprKind::Break | ExprKind::Continue
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Number(String),
    Str(String, char),
    Interp(Vec<InterpPart>),
    Regex(String),
    Js(String),
    Bool(bool),
    Null,
    Undefined,
    This,
    Ident(String),
    Array(Vec<Expr>),
    Object(Vec<Prop>),
    /// `[from..to]` or `[from...to]`
    Range { from: Box<Expr>, to: Box<Expr>, exclusive: bool },
    Access { target: Box<Expr>, name: String, soak: bool },
    Index { target: Box<Expr>, index: Box<Expr>, soak: bool },
    Slice { target: Box<Expr>, from: Option<Box<Expr>>, to: Option<Box<Expr>>, exclusive: bool },
    Call { callee: Box<Expr>, args: Vec<Expr>, soak: bool, new: bool },
    /// `super` with explicit arguments, or `None` to forward `arguments`
    Super(Option<Vec<Expr>>),
    Splat(Box<Expr>),
    /// Postfix `a?`
    Existence(Box<Expr>),
    Unary { op: &'static str, operand: Box<Expr> },
    Update { op: &'static str, prefix: bool, operand: Box<Expr> },
    Binary { op: &'static str, left: Box<Expr>, right: Box<Expr> },
    /// `item in collection`: array membership
    In { item: Box<Expr>, collection: Box<Expr>, negated: bool },
    /// `key of object`: property membership
    Of { key: Box<Expr>, object: Box<Expr>, negated: bool },
    /// `op` is `None` for plain `=`, otherwise the compound operator
    Assign { target: Box<Expr>, op: Option<&'static str>, value: Box<Expr> },
    Func(Box<Func>),
    Paren(Box<Expr>),
    Do(Box<Expr>),
    If(Box<If>),
    For(Box<For>),
    While(Box<While>),
    Switch(Box<Switch>),
    Try(Box<Try>),
    Class(Box<Class>),
    Return(Option<Box<Expr>>),
    Throw(Box<Expr>),
    Break,
    Continue,
    /// `### ... ###` block comment
    Comment(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum InterpPart {
    Lit(String),
    Code(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropKey {
    Ident(String),
    Str(String, char),
    Number(String),
    /// `@name:` inside a class body
    Static(String),
}

impl PropKey {
    /// The key as a property name, without quotes.
    pub fn name(&self) -> &str {
        match self {
            PropKey::Ident(name) | PropKey::Number(name) | PropKey::Static(name) => name,
            PropKey::Str(text, _) => text,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prop {
    pub key: PropKey,
    pub value: Expr,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamTarget {
    Ident(String),
    /// `@name` stores the argument on `this`
    This(String),
    /// Array or object destructuring pattern
    Pattern(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub target: ParamTarget,
    pub default: Option<Expr>,
    pub splat: bool,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Func {
    pub params: Vec<Param>,
    pub body: Block,
    /// `=>`: `this` is the enclosing function's
    pub bound: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct If {
    pub cond: Expr,
    pub then: Block,
    pub otherwise: Option<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct For {
    /// Loop variable or destructuring pattern
    pub value: Option<Expr>,
    /// Index (`in`) or value (`of`) variable after the comma
    pub index: Option<String>,
    pub source: Expr,
    /// `of` loops iterate object keys
    pub object: bool,
    pub own: bool,
    pub step: Option<Expr>,
    pub guard: Option<Expr>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct While {
    pub cond: Expr,
    pub guard: Option<Expr>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    pub tests: Vec<Expr>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Switch {
    pub subject: Option<Expr>,
    pub cases: Vec<Case>,
    pub otherwise: Option<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Try {
    pub body: Block,
    pub catch: Option<(Option<String>, Block)>,
    pub finally: Option<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassMember {
    Method { key: PropKey, value: Expr, pos: Pos },
    Code(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Class {
    /// Assignable name, e.g. `Foo` or `App.Foo`
    pub target: Option<Expr>,
    pub parent: Option<Expr>,
    pub members: Vec<ClassMember>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_simple() {
        let pos = Pos::default();
        assert!(Expr::ident("a", pos).is_simple());
        assert!(Expr::new(ExprKind::This, pos).is_simple());
        let call = Expr::new(
            ExprKind::Call {
                callee: Box::new(Expr::ident("f", pos)),
                args: vec![],
                soak: false,
                new: false,
            },
            pos,
        );
        assert!(!call.is_simple());
    }

    #[test]
    fn test_prop_key_name() {
        assert_eq!(PropKey::Str("a b".to_string(), '"').name(), "a b");
        assert_eq!(PropKey::Static("create".to_string()).name(), "create");
    }
}
