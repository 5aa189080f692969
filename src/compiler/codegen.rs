//! JavaScript generation from the syntax tree
//!
//! Output follows the conventions of the reference compiler for this
//! dialect: two-space indentation, one `var` statement per function,
//! `_`-prefixed temporaries and small runtime helpers emitted on demand.

use std::collections::BTreeSet;

use super::ast::*;
use super::emitter::Emitter;
use super::scope::{FunctionScope, ScopeStack};
use super::token::Pos;
use super::CompileError;
use crate::sourcemap::Mapping;

/// Largest literal range expanded inline as an array.
const INLINE_RANGE_LIMIT: i64 = 20;

/// Largest array literal that `in` expands into an equality chain.
const IN_CHAIN_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Helper {
    Bind,
    HasProp,
    Extends,
    IndexOf,
    Slice,
}

impl Helper {
    fn declaration(self) -> &'static str {
        match self {
            Helper::Bind => {
                "__bind = function(fn, me){ return function(){ return fn.apply(me, arguments); }; }"
            }
            Helper::HasProp => "__hasProp = {}.hasOwnProperty",
            Helper::Extends => {
                "__extends = function(child, parent) { for (var key in parent) { if (__hasProp.call(parent, key)) child[key] = parent[key]; } function ctor() { this.constructor = child; } ctor.prototype = parent.prototype; child.prototype = new ctor(); child.__super__ = parent.prototype; return child; }"
            }
            Helper::IndexOf => {
                "__indexOf = [].indexOf || function(item) { for (var i = 0, l = this.length; i < l; i++) { if (i in this && this[i] === item) return i; } return -1; }"
            }
            Helper::Slice => "__slice = [].slice",
        }
    }
}

/// Where the value of a statement goes.
#[derive(Debug, Clone, PartialEq)]
enum Position {
    Stmt,
    Return,
    /// Appended to the named results array
    Push(String),
}

#[derive(Debug)]
struct ClassContext {
    name: String,
    method: Option<String>,
    is_static: bool,
}

#[derive(Debug, Default)]
struct FuncOptions {
    name: Option<String>,
    /// Lines emitted before parameter handling
    prelude: Vec<String>,
    implicit_return: bool,
    /// Compile a `=>` method as a plain function; the constructor binds it
    unbound: bool,
}

/// Generate JavaScript and its mappings for a parsed program.
pub fn generate(body: &Block, bare: bool) -> Result<(String, Vec<Mapping>), CompileError> {
    let mut gen = CodeGen::default();
    let indent = if bare { 0 } else { 1 };

    gen.scopes.push(FunctionScope::default());
    let mut inner = Emitter::new(indent);
    gen.compile_body(&mut inner, body, Position::Stmt)?;
    let scope = gen.scopes.pop();

    let mut out = Emitter::new(0);
    if !bare {
        out.write("(function() {");
        out.newline();
    }
    out.indent = indent;

    let mut header = false;
    for helper in &gen.helpers {
        out.start_line();
        out.write("var ");
        out.write(helper.declaration());
        out.write(";");
        out.newline();
        header = true;
    }
    header |= write_declarations(&mut out, &scope.declarations());
    if header && !inner.is_empty() {
        out.newline();
    }
    out.append(inner);

    if !bare {
        out.indent = 0;
        out.newline();
        out.write("}).call(this);");
        out.newline();
    }
    Ok(out.finish())
}

fn write_declarations(e: &mut Emitter, declarations: &[String]) -> bool {
    if declarations.is_empty() {
        return false;
    }
    e.start_line();
    e.write("var ");
    e.write(&declarations.join(", "));
    e.write(";");
    e.newline();
    true
}

#[derive(Default)]
struct CodeGen {
    scopes: ScopeStack,
    helpers: BTreeSet<Helper>,
    classes: Vec<ClassContext>,
}

impl CodeGen {
    fn use_helper(&mut self, helper: Helper) -> &'static str {
        if helper == Helper::Extends {
            self.helpers.insert(Helper::HasProp);
        }
        self.helpers.insert(helper);
        match helper {
            Helper::Bind => "__bind",
            Helper::HasProp => "__hasProp",
            Helper::Extends => "__extends",
            Helper::IndexOf => "__indexOf",
            Helper::Slice => "__slice",
        }
    }

    /// Compile into a scratch buffer and return the text.
    fn to_text(
        &mut self,
        indent: usize,
        f: impl FnOnce(&mut Self, &mut Emitter) -> Result<(), CompileError>,
    ) -> Result<String, CompileError> {
        let mut scratch = Emitter::new(indent);
        f(self, &mut scratch)?;
        Ok(scratch.finish().0)
    }

    fn expr_text(&mut self, indent: usize, expr: &Expr, min: u8) -> Result<String, CompileError> {
        self.to_text(indent, |gen, e| gen.expr(e, expr, min))
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn compile_body(
        &mut self,
        e: &mut Emitter,
        block: &[Expr],
        position: Position,
    ) -> Result<(), CompileError> {
        let last = block.iter().rposition(|s| !matches!(s.kind, ExprKind::Comment(_)));
        for (i, stmt) in block.iter().enumerate() {
            let position = if Some(i) == last { position.clone() } else { Position::Stmt };
            self.statement(e, stmt, position)?;
        }
        Ok(())
    }

    fn statement(&mut self, e: &mut Emitter, stmt: &Expr, position: Position) -> Result<(), CompileError> {
        e.start_line();
        e.map(stmt.pos);
        self.statement_inner(e, stmt, position)?;
        e.newline();
        Ok(())
    }

    fn statement_inner(
        &mut self,
        e: &mut Emitter,
        stmt: &Expr,
        position: Position,
    ) -> Result<(), CompileError> {
        match &stmt.kind {
            ExprKind::Comment(body) => {
                e.write("/*");
                e.write(body);
                e.write("*/");
            }
            ExprKind::Return(None) => e.write("return;"),
            ExprKind::Return(Some(value)) if !is_pure(value) => {
                self.statement_inner(e, value, Position::Return)?;
            }
            ExprKind::Return(Some(value)) => {
                e.write("return ");
                self.expr(e, value, 0)?;
                e.write(";");
            }
            ExprKind::Throw(value) => {
                e.write("throw ");
                self.expr(e, value, 0)?;
                e.write(";");
            }
            ExprKind::Break => e.write("break;"),
            ExprKind::Continue => e.write("continue;"),
            ExprKind::If(node) => {
                self.if_statement(e, node, position)?;
            }
            ExprKind::Switch(node) => self.switch_statement(e, node, position)?,
            ExprKind::Try(node) => self.try_statement(e, node, position)?,
            ExprKind::For(node) if !matches!(position, Position::Push(_)) => {
                self.for_statement(e, node, stmt.pos, position)?;
            }
            ExprKind::While(node) if !matches!(position, Position::Push(_)) => {
                self.while_statement(e, node, position)?;
            }
            _ => self.expression_statement(e, stmt, position)?,
        }
        Ok(())
    }

    fn expression_statement(
        &mut self,
        e: &mut Emitter,
        expr: &Expr,
        position: Position,
    ) -> Result<(), CompileError> {
        match position {
            Position::Stmt => {
                if let ExprKind::Assign { target, op: None, value } = &expr.kind {
                    if is_pattern(target) {
                        self.destructure(e, target, value, true)?;
                        e.write(";");
                        return Ok(());
                    }
                }
                if starts_with_function_or_object(expr) {
                    e.write("(");
                    self.expr(e, expr, 0)?;
                    e.write(")");
                } else {
                    self.expr(e, expr, 0)?;
                }
                e.write(";");
            }
            Position::Return => {
                e.write("return ");
                self.expr(e, expr, 0)?;
                e.write(";");
            }
            Position::Push(results) => {
                e.write(&results);
                e.write(".push(");
                self.expr(e, expr, 1)?;
                e.write(");");
            }
        }
        Ok(())
    }

    /// `{ ... }` around a block; `{}` when it is empty.
    fn braced(&mut self, e: &mut Emitter, block: &[Expr], position: Position) -> Result<(), CompileError> {
        if block.is_empty() {
            e.write("{}");
            return Ok(());
        }
        e.write("{");
        e.newline();
        e.indent += 1;
        self.compile_body(e, block, position)?;
        e.indent -= 1;
        e.start_line();
        e.write("}");
        Ok(())
    }

    fn line_break(e: &mut Emitter) {
        e.newline();
        e.start_line();
    }

    fn if_statement(&mut self, e: &mut Emitter, node: &If, position: Position) -> Result<(), CompileError> {
        e.write("if (");
        self.expr(e, &node.cond, 0)?;
        e.write(") ");
        self.braced(e, &node.then, position.clone())?;

        if let Some(otherwise) = &node.otherwise {
            e.write(" else ");
            if let [only] = otherwise.as_slice() {
                if let ExprKind::If(inner) = &only.kind {
                    e.map(only.pos);
                    return self.if_statement(e, inner, position);
                }
            }
            self.braced(e, otherwise, position)?;
        }
        Ok(())
    }

    /// Start a results array when a loop is the value of its function.
    fn loop_results(&mut self, e: &mut Emitter, position: &Position) -> Option<String> {
        if *position != Position::Return {
            return None;
        }
        let results = self.scopes.temp("results");
        e.write(&results);
        e.write(" = [];");
        Self::line_break(e);
        Some(results)
    }

    fn finish_loop_results(e: &mut Emitter, results: Option<String>) {
        if let Some(results) = results {
            Self::line_break(e);
            e.write("return ");
            e.write(&results);
            e.write(";");
        }
    }

    fn loop_body(
        &mut self,
        e: &mut Emitter,
        prelude: &[String],
        guard: Option<&Expr>,
        body: &[Expr],
        position: Position,
    ) -> Result<(), CompileError> {
        e.write("{");
        e.newline();
        e.indent += 1;
        for line in prelude {
            e.start_line();
            e.write(line);
            e.newline();
        }
        match guard {
            Some(guard) => {
                e.start_line();
                e.map(guard.pos);
                e.write("if (");
                self.expr(e, guard, 0)?;
                e.write(") ");
                self.braced(e, body, position)?;
                e.newline();
            }
            None => self.compile_body(e, body, position)?,
        }
        e.indent -= 1;
        e.start_line();
        e.write("}");
        Ok(())
    }

    /// Name of the collection a loop iterates, caching it in a temporary
    /// unless it is a plain variable.
    fn loop_source(&mut self, e: &mut Emitter, source: &Expr) -> Result<String, CompileError> {
        if let ExprKind::Ident(name) = &source.kind {
            return Ok(name.clone());
        }
        let reference = self.scopes.temp("ref");
        e.write(&reference);
        e.write(" = ");
        self.expr(e, source, 1)?;
        e.write(";");
        Self::line_break(e);
        Ok(reference)
    }

    fn for_statement(
        &mut self,
        e: &mut Emitter,
        node: &For,
        pos: Pos,
        position: Position,
    ) -> Result<(), CompileError> {
        if node.object {
            return self.for_of(e, node, position);
        }
        if let ExprKind::Range { from, to, exclusive } = &node.source.kind {
            if let Some(ExprKind::Ident(name)) = node.value.as_ref().map(|v| &v.kind) {
                if node.index.is_some() {
                    return Err(CompileError::new("range loops take no index variable", pos));
                }
                return self.for_range(e, node, name, from, to, *exclusive, position);
            }
        }

        let source = self.loop_source(e, &node.source)?;
        let results = self.loop_results(e, &position);
        let counter = self.scopes.temp("i");
        let index = node.index.clone();
        if let Some(index) = &index {
            self.scopes.declare(index);
        }

        let step = match &node.step {
            Some(step) => Some(self.expr_text(e.indent, step, 1)?),
            None => None,
        };
        let descending = node.step.as_ref().is_some_and(is_negative_literal);

        let (init, cond) = if descending {
            (format!("{} = {}.length - 1", counter, source), format!("{} >= 0", counter))
        } else {
            let len = self.scopes.temp("len");
            (format!("{} = 0, {} = {}.length", counter, len, source), format!("{} < {}", counter, len))
        };
        let increment = match &step {
            Some(step) => format!("{} += {}", counter, step),
            None => format!("{}++", counter),
        };
        let (init, increment) = match &index {
            Some(index) => {
                let increment = match &step {
                    Some(step) => format!("{} = {} += {}", index, counter, step),
                    None => format!("{} = ++{}", index, counter),
                };
                (format!("{} = {}", index, init), increment)
            }
            None => (init, increment),
        };

        let position_in_body = match &results {
            Some(results) => Position::Push(results.clone()),
            None => Position::Stmt,
        };

        let mut prelude = Vec::new();
        if let Some(value) = &node.value {
            let element = Expr::new(
                ExprKind::Index {
                    target: Box::new(Expr::ident(source.clone(), value.pos)),
                    index: Box::new(Expr::ident(counter.clone(), value.pos)),
                    soak: false,
                },
                value.pos,
            );
            let line = self.to_text(e.indent + 1, |gen, scratch| {
                if is_pattern(value) {
                    gen.destructure(scratch, value, &element, true)
                } else {
                    gen.assign_plain(scratch, value, &element)
                }
            })?;
            prelude.push(format!("{};", line));
        }

        e.write(&format!("for ({}; {}; {}) ", init, cond, increment));
        self.loop_body(e, &prelude, node.guard.as_ref(), &node.body, position_in_body)?;
        Self::finish_loop_results(e, results);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn for_range(
        &mut self,
        e: &mut Emitter,
        node: &For,
        var: &str,
        from: &Expr,
        to: &Expr,
        exclusive: bool,
        position: Position,
    ) -> Result<(), CompileError> {
        self.scopes.declare(var);
        let results = self.loop_results(e, &position);
        let (lt, gt) = if exclusive { ("<", ">") } else { ("<=", ">=") };

        let header = match (int_literal(from), int_literal(to)) {
            (Some(start), Some(end)) => {
                let ascending = start <= end;
                let cmp = if ascending { lt } else { gt };
                let increment = match &node.step {
                    Some(step) => format!("{} += {}", var, self.expr_text(e.indent, step, 1)?),
                    None if ascending => format!("{}++", var),
                    None => format!("{}--", var),
                };
                format!("for ({} = {}; {} {} {}; {}) ", var, start, var, cmp, end, increment)
            }
            _ => {
                let counter = self.scopes.temp("i");
                let mut init = Vec::new();
                let start = self.cached(e.indent, from, &mut init)?;
                let end = self.cached(e.indent, to, &mut init)?;
                init.push(format!("{} = {} = {}", var, counter, start));

                let (cond, increment) = match &node.step {
                    Some(step) if int_literal(step).is_some() || is_negative_literal(step) => {
                        let step_text = self.expr_text(e.indent, step, 1)?;
                        let cmp = if is_negative_literal(step) { gt } else { lt };
                        (
                            format!("{} {} {}", counter, cmp, end),
                            format!("{} = {} += {}", var, counter, step_text),
                        )
                    }
                    Some(step) => {
                        let step_name = self.scopes.temp("step");
                        let step_text = self.expr_text(e.indent, step, 1)?;
                        init.push(format!("{} = {}", step_name, step_text));
                        (
                            format!(
                                "{} > 0 ? {} {} {} : {} {} {}",
                                step_name, counter, lt, end, counter, gt, end
                            ),
                            format!("{} = {} += {}", var, counter, step_name),
                        )
                    }
                    None => (
                        format!(
                            "{} <= {} ? {} {} {} : {} {} {}",
                            start, end, counter, lt, end, counter, gt, end
                        ),
                        format!("{} = {} <= {} ? ++{} : --{}", var, start, end, counter, counter),
                    ),
                };
                format!("for ({}; {}; {}) ", init.join(", "), cond, increment)
            }
        };

        let position_in_body = match &results {
            Some(results) => Position::Push(results.clone()),
            None => Position::Stmt,
        };
        e.write(&header);
        self.loop_body(e, &[], node.guard.as_ref(), &node.body, position_in_body)?;
        Self::finish_loop_results(e, results);
        Ok(())
    }

    /// Text for a loop bound, adding `_ref = value` to `init` unless it is a
    /// literal or a plain variable.
    fn cached(&mut self, indent: usize, expr: &Expr, init: &mut Vec<String>) -> Result<String, CompileError> {
        if matches!(expr.kind, ExprKind::Number(_) | ExprKind::Ident(_)) || is_negative_literal(expr) {
            return self.expr_text(indent, expr, 1);
        }
        let reference = self.scopes.temp("ref");
        let text = self.expr_text(indent, expr, 1)?;
        init.push(format!("{} = {}", reference, text));
        Ok(reference)
    }

    fn for_of(&mut self, e: &mut Emitter, node: &For, position: Position) -> Result<(), CompileError> {
        let Some(ExprKind::Ident(key)) = node.value.as_ref().map(|v| &v.kind) else {
            return Err(CompileError::new("'for ... of' needs a key variable", node.source.pos));
        };
        let object = self.loop_source(e, &node.source)?;
        let results = self.loop_results(e, &position);
        self.scopes.declare(key);

        let mut prelude = Vec::new();
        if node.own {
            let has_prop = self.use_helper(Helper::HasProp);
            prelude.push(format!("if (!{}.call({}, {})) continue;", has_prop, object, key));
        }
        if let Some(value) = &node.index {
            self.scopes.declare(value);
            prelude.push(format!("{} = {}[{}];", value, object, key));
        }

        let position_in_body = match &results {
            Some(results) => Position::Push(results.clone()),
            None => Position::Stmt,
        };
        e.write(&format!("for ({} in {}) ", key, object));
        self.loop_body(e, &prelude, node.guard.as_ref(), &node.body, position_in_body)?;
        Self::finish_loop_results(e, results);
        Ok(())
    }

    fn while_statement(&mut self, e: &mut Emitter, node: &While, position: Position) -> Result<(), CompileError> {
        let results = self.loop_results(e, &position);
        e.write("while (");
        self.expr(e, &node.cond, 0)?;
        e.write(") ");
        let position_in_body = match &results {
            Some(results) => Position::Push(results.clone()),
            None => Position::Stmt,
        };
        self.loop_body(e, &[], node.guard.as_ref(), &node.body, position_in_body)?;
        Self::finish_loop_results(e, results);
        Ok(())
    }

    fn switch_statement(&mut self, e: &mut Emitter, node: &Switch, position: Position) -> Result<(), CompileError> {
        e.write("switch (");
        match &node.subject {
            Some(subject) => self.expr(e, subject, 0)?,
            None => e.write("false"),
        }
        e.write(") {");
        e.newline();
        e.indent += 1;

        let clause_count = node.cases.len() + usize::from(node.otherwise.is_some());
        for (i, case) in node.cases.iter().enumerate() {
            for test in &case.tests {
                e.start_line();
                e.map(test.pos);
                e.write("case ");
                if node.subject.is_some() {
                    self.expr(e, test, 0)?;
                } else {
                    e.write("!");
                    self.expr(e, test, 14)?;
                }
                e.write(":");
                e.newline();
            }
            e.indent += 1;
            self.compile_body(e, &case.body, position.clone())?;
            if i + 1 < clause_count && needs_break(&case.body, &position) {
                e.start_line();
                e.write("break;");
                e.newline();
            }
            e.indent -= 1;
        }
        if let Some(otherwise) = &node.otherwise {
            e.start_line();
            e.write("default:");
            e.newline();
            e.indent += 1;
            self.compile_body(e, otherwise, position)?;
            e.indent -= 1;
        }

        e.indent -= 1;
        e.start_line();
        e.write("}");
        Ok(())
    }

    fn try_statement(&mut self, e: &mut Emitter, node: &Try, position: Position) -> Result<(), CompileError> {
        e.write("try ");
        self.braced(e, &node.body, position.clone())?;
        if let Some((name, block)) = &node.catch {
            let name = name.clone().unwrap_or_else(|| "_error".to_string());
            self.scopes.add_param(&name);
            e.write(" catch (");
            e.write(&name);
            e.write(") ");
            self.braced(e, block, position)?;
        }
        if let Some(block) = &node.finally {
            e.write(" finally ");
            self.braced(e, block, Position::Stmt)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn precedence(&self, expr: &Expr) -> u8 {
        if split_soak(expr).is_some() {
            return 2;
        }
        match &expr.kind {
            ExprKind::Number(_)
            | ExprKind::Str(..)
            | ExprKind::Regex(_)
            | ExprKind::Js(_)
            | ExprKind::Bool(_)
            | ExprKind::Null
            | ExprKind::This
            | ExprKind::Ident(_)
            | ExprKind::Object(_)
            | ExprKind::Paren(_) => 16,
            ExprKind::Array(items) => {
                if items.iter().any(|i| matches!(i.kind, ExprKind::Splat(_))) {
                    15
                } else {
                    16
                }
            }
            ExprKind::Interp(parts) => {
                if matches!(parts.as_slice(), [InterpPart::Lit(_)]) {
                    16
                } else {
                    11
                }
            }
            ExprKind::Undefined => 13,
            ExprKind::Range { from, to, exclusive } => {
                if inline_range(from, to, *exclusive).is_some() {
                    16
                } else {
                    15
                }
            }
            ExprKind::Access { .. }
            | ExprKind::Index { .. }
            | ExprKind::Slice { .. }
            | ExprKind::Call { .. }
            | ExprKind::Super(_)
            | ExprKind::Do(_) => 15,
            ExprKind::Existence(inner) => {
                if self.is_undeclared(inner) {
                    4
                } else {
                    8
                }
            }
            ExprKind::Unary { .. } => 13,
            ExprKind::Update { prefix, .. } => {
                if *prefix {
                    13
                } else {
                    14
                }
            }
            ExprKind::Binary { op, .. } => binary_precedence(op),
            ExprKind::In { collection, negated, .. } => match in_chain_len(collection) {
                Some(0) => 16,
                Some(1) => 8,
                Some(_) if *negated => 4,
                Some(_) => 3,
                None => 9,
            },
            ExprKind::Of { negated, .. } => {
                if *negated {
                    13
                } else {
                    9
                }
            }
            ExprKind::Assign { target, op, .. } => match op {
                None if is_pattern(target) => 0,
                Some("?=") => 2,
                Some("||=") => 3,
                Some("&&=") => 4,
                _ => 1,
            },
            ExprKind::Func(_) => 2,
            ExprKind::If(node) => {
                if ternary_able(node) {
                    2
                } else {
                    15
                }
            }
            ExprKind::For(_) | ExprKind::While(_) | ExprKind::Switch(_) | ExprKind::Try(_) => 15,
            ExprKind::Class(node) => {
                if node.target.is_some() {
                    1
                } else {
                    15
                }
            }
            ExprKind::Splat(_)
            | ExprKind::Return(_)
            | ExprKind::Throw(_)
            | ExprKind::Break
            | ExprKind::Continue
            | ExprKind::Comment(_) => 16,
        }
    }

    fn is_undeclared(&self, expr: &Expr) -> bool {
        matches!(&expr.kind, ExprKind::Ident(name) if !self.scopes.is_declared(name))
    }

    /// Compile `expr`, parenthesized when it binds looser than `min`.
    fn expr(&mut self, e: &mut Emitter, expr: &Expr, min: u8) -> Result<(), CompileError> {
        let wrap = self.precedence(expr) < min;
        e.map(expr.pos);
        if wrap {
            e.write("(");
        }
        self.expr_inner(e, expr)?;
        if wrap {
            e.write(")");
        }
        Ok(())
    }

    fn expr_inner(&mut self, e: &mut Emitter, expr: &Expr) -> Result<(), CompileError> {
        if split_soak(expr).is_some() {
            return self.soak(e, expr);
        }

        match &expr.kind {
            ExprKind::Number(n) => e.write(n),
            ExprKind::Str(text, quote) => {
                e.write(&quote.to_string());
                e.write(text);
                e.write(&quote.to_string());
            }
            ExprKind::Interp(parts) => self.interpolation(e, parts)?,
            ExprKind::Regex(re) => e.write(re),
            ExprKind::Js(code) => e.write(code),
            ExprKind::Bool(value) => e.write(if *value { "true" } else { "false" }),
            ExprKind::Null => e.write("null"),
            ExprKind::Undefined => e.write("void 0"),
            ExprKind::This => {
                let this = self.scopes.this_expr();
                e.write(&this);
            }
            ExprKind::Ident(name) => e.write(name),
            ExprKind::Array(items) => {
                if items.iter().any(|i| matches!(i.kind, ExprKind::Splat(_))) {
                    self.splat_array(e, items)?;
                } else {
                    e.write("[");
                    self.comma_list(e, items)?;
                    e.write("]");
                }
            }
            ExprKind::Object(props) => self.object(e, props)?,
            ExprKind::Range { from, to, exclusive } => self.range(e, from, to, *exclusive)?,
            ExprKind::Access { target, name, .. } => {
                if matches!(&target.kind, ExprKind::Number(n) if n.chars().all(|c| c.is_ascii_digit())) {
                    e.write("(");
                    self.expr(e, target, 0)?;
                    e.write(")");
                } else {
                    self.expr(e, target, 15)?;
                }
                e.write(".");
                e.write(name);
            }
            ExprKind::Index { target, index, .. } => {
                self.expr(e, target, 15)?;
                e.write("[");
                self.expr(e, index, 0)?;
                e.write("]");
            }
            ExprKind::Slice { target, from, to, exclusive } => {
                self.expr(e, target, 15)?;
                e.write(".slice(");
                match from {
                    Some(from) => self.expr(e, from, 1)?,
                    None => e.write("0"),
                }
                if let Some(to) = to {
                    e.write(", ");
                    if *exclusive {
                        self.expr(e, to, 1)?;
                    } else if let Some(n) = int_literal(to) {
                        e.write(&(n + 1).to_string());
                    } else {
                        e.write("+");
                        self.expr(e, to, 13)?;
                        e.write(" + 1 || 9e9");
                    }
                }
                e.write(")");
            }
            ExprKind::Call { callee, args, new, .. } => self.call(e, callee, args, *new)?,
            ExprKind::Super(args) => self.super_call(e, args.as_deref(), expr.pos)?,
            ExprKind::Splat(_) => {
                return Err(CompileError::new(
                    "splats are only allowed in calls, arrays and parameters",
                    expr.pos,
                ));
            }
            ExprKind::Existence(inner) => {
                if self.is_undeclared(inner) {
                    let name = self.expr_text(e.indent, inner, 16)?;
                    e.write(&format!("typeof {} !== \"undefined\" && {} !== null", name, name));
                } else {
                    self.expr(e, inner, 9)?;
                    e.write(" != null");
                }
            }
            ExprKind::Unary { op, operand } => {
                e.write(op);
                let spaced = match *op {
                    "typeof" | "delete" => true,
                    "-" | "+" => match &operand.kind {
                        ExprKind::Unary { op: inner, .. } => inner == op,
                        ExprKind::Update { op: inner, prefix: true, .. } => inner.starts_with(op),
                        _ => false,
                    },
                    _ => false,
                };
                if spaced {
                    e.write(" ");
                }
                self.expr(e, operand, 13)?;
            }
            ExprKind::Update { op, prefix, operand } => {
                if *prefix {
                    e.write(op);
                    self.expr(e, operand, 15)?;
                } else {
                    self.expr(e, operand, 15)?;
                    e.write(op);
                }
            }
            ExprKind::Binary { op: "?", left, right } => self.existential(e, left, right)?,
            ExprKind::Binary { op, left, right } => {
                let prec = binary_precedence(op);
                self.expr(e, left, prec)?;
                e.write(" ");
                e.write(op);
                e.write(" ");
                self.expr(e, right, prec + 1)?;
            }
            ExprKind::In { item, collection, negated } => self.in_array(e, item, collection, *negated)?,
            ExprKind::Of { key, object, negated } => {
                if *negated {
                    e.write("!(");
                }
                self.expr(e, key, 9)?;
                e.write(" in ");
                self.expr(e, object, 10)?;
                if *negated {
                    e.write(")");
                }
            }
            ExprKind::Assign { target, op, value } => self.assign(e, target, *op, value)?,
            ExprKind::Func(func) => {
                let options = FuncOptions { implicit_return: true, ..FuncOptions::default() };
                self.function(e, func, options)?;
            }
            ExprKind::Paren(inner) => {
                if matches!(
                    inner.kind,
                    ExprKind::For(_) | ExprKind::While(_) | ExprKind::Switch(_) | ExprKind::Try(_)
                ) || matches!(&inner.kind, ExprKind::If(node) if !ternary_able(node))
                {
                    self.expr(e, inner, 0)?;
                } else {
                    e.write("(");
                    self.expr(e, inner, 0)?;
                    e.write(")");
                }
            }
            ExprKind::Do(inner) => self.do_call(e, inner)?,
            ExprKind::If(node) if ternary_able(node) => {
                self.expr(e, &node.cond, 3)?;
                e.write(" ? ");
                self.expr(e, &node.then[0], 1)?;
                e.write(" : ");
                match node.otherwise.as_deref() {
                    Some([otherwise]) => self.expr(e, otherwise, 1)?,
                    _ => e.write("void 0"),
                }
            }
            ExprKind::If(_) | ExprKind::For(_) | ExprKind::While(_) | ExprKind::Switch(_) | ExprKind::Try(_) => {
                self.closure(e, expr)?;
            }
            ExprKind::Class(node) => self.class(e, node, expr.pos)?,
            ExprKind::Return(_) => return Err(value_error("return", expr.pos)),
            ExprKind::Throw(_) => return Err(value_error("throw", expr.pos)),
            ExprKind::Break => return Err(value_error("break", expr.pos)),
            ExprKind::Continue => return Err(value_error("continue", expr.pos)),
            ExprKind::Comment(_) => return Err(value_error("a block comment", expr.pos)),
        }
        Ok(())
    }

    fn comma_list(&mut self, e: &mut Emitter, items: &[Expr]) -> Result<(), CompileError> {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                e.write(", ");
            }
            self.expr(e, item, 1)?;
        }
        Ok(())
    }

    /// Statements used as a value run in an immediately invoked function.
    fn closure(&mut self, e: &mut Emitter, stmt: &Expr) -> Result<(), CompileError> {
        e.write("(function() {");
        e.newline();
        e.indent += 1;
        self.statement(e, stmt, Position::Return)?;
        e.indent -= 1;
        e.start_line();
        e.write("}).call(this)");
        Ok(())
    }

    fn interpolation(&mut self, e: &mut Emitter, parts: &[InterpPart]) -> Result<(), CompileError> {
        if parts.is_empty() {
            e.write("\"\"");
            return Ok(());
        }
        if matches!(parts.first(), Some(InterpPart::Code(_))) {
            e.write("\"\" + ");
        }
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                e.write(" + ");
            }
            match part {
                InterpPart::Lit(text) => {
                    e.write("\"");
                    e.write(text);
                    e.write("\"");
                }
                InterpPart::Code(code) => self.expr(e, code, 12)?,
            }
        }
        Ok(())
    }

    fn object(&mut self, e: &mut Emitter, props: &[Prop]) -> Result<(), CompileError> {
        if props.is_empty() {
            e.write("{}");
            return Ok(());
        }
        e.write("{");
        e.newline();
        e.indent += 1;
        for (i, prop) in props.iter().enumerate() {
            e.start_line();
            e.map(prop.pos);
            match &prop.key {
                PropKey::Str(text, quote) => {
                    e.write(&quote.to_string());
                    e.write(text);
                    e.write(&quote.to_string());
                }
                key => e.write(key.name()),
            }
            e.write(": ");
            self.expr(e, &prop.value, 1)?;
            if i + 1 < props.len() {
                e.write(",");
            }
            e.newline();
        }
        e.indent -= 1;
        e.start_line();
        e.write("}");
        Ok(())
    }

    fn range(&mut self, e: &mut Emitter, from: &Expr, to: &Expr, exclusive: bool) -> Result<(), CompileError> {
        if let Some(values) = inline_range(from, to, exclusive) {
            let items: Vec<String> = values.iter().map(|v| v.to_string()).collect();
            e.write("[");
            e.write(&items.join(", "));
            e.write("]");
            return Ok(());
        }

        let (lt, gt) = if exclusive { ("<", ">") } else { ("<=", ">=") };
        e.write("(function() {");
        e.newline();
        e.indent += 1;
        e.start_line();
        e.write("var _end, _i, _results, _start;");
        Self::line_break(e);
        e.write("_start = ");
        self.expr(e, from, 1)?;
        e.write(", _end = ");
        self.expr(e, to, 1)?;
        e.write(", _results = [];");
        Self::line_break(e);
        e.write(&format!(
            "for (_i = _start; _start <= _end ? _i {} _end : _i {} _end; _start <= _end ? _i++ : _i--) {{",
            lt, gt
        ));
        e.indent += 1;
        Self::line_break(e);
        e.write("_results.push(_i);");
        e.indent -= 1;
        Self::line_break(e);
        e.write("}");
        Self::line_break(e);
        e.write("return _results;");
        e.newline();
        e.indent -= 1;
        e.start_line();
        e.write("}).apply(this)");
        Ok(())
    }

    fn call(&mut self, e: &mut Emitter, callee: &Expr, args: &[Expr], new: bool) -> Result<(), CompileError> {
        let has_splat = args.iter().any(|a| matches!(a.kind, ExprKind::Splat(_)));
        if has_splat {
            if new {
                return Err(CompileError::new("splats are not supported with 'new'", callee.pos));
            }
            return self.splat_call(e, callee, args);
        }

        if new {
            e.write("new ");
            let min = if contains_call(callee) { 16 } else { 15 };
            self.expr(e, callee, min)?;
        } else {
            self.expr(e, callee, 15)?;
        }
        e.write("(");
        self.comma_list(e, args)?;
        e.write(")");
        Ok(())
    }

    fn splat_call(&mut self, e: &mut Emitter, callee: &Expr, args: &[Expr]) -> Result<(), CompileError> {
        match &callee.kind {
            ExprKind::Access { target, name, soak: false } => {
                let context = self.call_context(e, target)?;
                e.write(".");
                e.write(name);
                e.write(".apply(");
                e.write(&context);
            }
            ExprKind::Index { target, index, soak: false } => {
                let context = self.call_context(e, target)?;
                e.write("[");
                self.expr(e, index, 0)?;
                e.write("].apply(");
                e.write(&context);
            }
            _ => {
                self.expr(e, callee, 15)?;
                e.write(".apply(null");
            }
        }
        e.write(", ");
        self.apply_args(e, args)?;
        e.write(")");
        Ok(())
    }

    /// Write the object a method is called on and return the text that
    /// refers to it again as `this`.
    fn call_context(&mut self, e: &mut Emitter, target: &Expr) -> Result<String, CompileError> {
        if target.is_simple() {
            let text = self.expr_text(e.indent, target, 15)?;
            e.write(&text);
            return Ok(text);
        }
        let reference = self.scopes.temp("ref");
        e.write("(");
        e.write(&reference);
        e.write(" = ");
        self.expr(e, target, 1)?;
        e.write(")");
        Ok(reference)
    }

    fn apply_args(&mut self, e: &mut Emitter, args: &[Expr]) -> Result<(), CompileError> {
        if let [Expr { kind: ExprKind::Splat(inner), .. }] = args {
            return self.expr(e, inner, 1);
        }
        self.splat_array(e, args)
    }

    /// `[a, b, rest...]` as `[a, b].concat(__slice.call(rest))`.
    fn splat_array(&mut self, e: &mut Emitter, items: &[Expr]) -> Result<(), CompileError> {
        let mut first = true;
        let mut i = 0;
        while i < items.len() {
            if !first {
                e.write(".concat(");
            }
            match &items[i].kind {
                ExprKind::Splat(inner) => {
                    let slice = self.use_helper(Helper::Slice);
                    e.write(slice);
                    e.write(".call(");
                    self.expr(e, inner, 1)?;
                    e.write(")");
                    i += 1;
                }
                _ => {
                    let end = items[i..]
                        .iter()
                        .position(|item| matches!(item.kind, ExprKind::Splat(_)))
                        .map(|offset| i + offset)
                        .unwrap_or(items.len());
                    e.write("[");
                    self.comma_list(e, &items[i..end])?;
                    e.write("]");
                    i = end;
                }
            }
            if !first {
                e.write(")");
            }
            first = false;
        }
        Ok(())
    }

    fn super_call(&mut self, e: &mut Emitter, args: Option<&[Expr]>, pos: Pos) -> Result<(), CompileError> {
        let Some(context) = self.classes.last() else {
            return Err(CompileError::new("cannot call super outside of a class", pos));
        };
        let Some(method) = &context.method else {
            return Err(CompileError::new("cannot call super outside of a method", pos));
        };
        let target = if method == "constructor" {
            format!("{}.__super__.constructor", context.name)
        } else if context.is_static {
            format!("{}.__super__.constructor.{}", context.name, method)
        } else {
            format!("{}.__super__.{}", context.name, method)
        };
        let this = self.scopes.this_expr();

        e.write(&target);
        match args {
            None => e.write(&format!(".apply({}, arguments)", this)),
            Some(args) if args.iter().any(|a| matches!(a.kind, ExprKind::Splat(_))) => {
                e.write(&format!(".apply({}, ", this));
                self.apply_args(e, args)?;
                e.write(")");
            }
            Some(args) => {
                e.write(&format!(".call({}", this));
                for arg in args {
                    e.write(", ");
                    self.expr(e, arg, 1)?;
                }
                e.write(")");
            }
        }
        Ok(())
    }

    fn do_call(&mut self, e: &mut Emitter, inner: &Expr) -> Result<(), CompileError> {
        self.expr(e, inner, 15)?;
        e.write("(");
        if let ExprKind::Func(func) = &inner.kind {
            let mut first = true;
            for param in func.params.iter().filter(|p| !p.splat) {
                if !first {
                    e.write(", ");
                }
                first = false;
                match (&param.default, &param.target) {
                    (Some(default), _) => self.expr(e, default, 1)?,
                    (None, ParamTarget::Ident(name)) | (None, ParamTarget::This(name)) => e.write(name),
                    (None, ParamTarget::Pattern(_)) => e.write("void 0"),
                }
            }
        }
        e.write(")");
        Ok(())
    }

    /// `a ? b`
    fn existential(&mut self, e: &mut Emitter, left: &Expr, right: &Expr) -> Result<(), CompileError> {
        if self.is_undeclared(left) {
            let name = self.expr_text(e.indent, left, 16)?;
            e.write(&format!("typeof {} !== \"undefined\" && {} !== null ? {} : ", name, name, name));
        } else if left.is_simple() {
            let text = self.expr_text(e.indent, left, 9)?;
            e.write(&format!("{} != null ? {} : ", text, text));
        } else {
            let reference = self.scopes.temp("ref");
            e.write("(");
            e.write(&reference);
            e.write(" = ");
            self.expr(e, left, 1)?;
            e.write(&format!(") != null ? {} : ", reference));
        }
        self.expr(e, right, 1)
    }

    fn in_array(&mut self, e: &mut Emitter, item: &Expr, collection: &Expr, negated: bool) -> Result<(), CompileError> {
        if let (Some(len), ExprKind::Array(values)) = (in_chain_len(collection), &collection.kind) {
            if len == 0 {
                e.write(if negated { "true" } else { "false" });
                return Ok(());
            }
            let (cmp, join) = if negated { (" !== ", " && ") } else { (" === ", " || ") };
            let subject = if item.is_simple() {
                self.expr_text(e.indent, item, 9)?
            } else {
                let reference = self.scopes.temp("ref");
                let text = self.expr_text(e.indent, item, 1)?;
                e.write(&format!("({} = {}){}", reference, text, cmp));
                self.expr(e, &values[0], 9)?;
                for value in &values[1..] {
                    e.write(join);
                    e.write(&reference);
                    e.write(cmp);
                    self.expr(e, value, 9)?;
                }
                return Ok(());
            };
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    e.write(join);
                }
                e.write(&subject);
                e.write(cmp);
                self.expr(e, value, 9)?;
            }
            return Ok(());
        }

        let index_of = self.use_helper(Helper::IndexOf);
        e.write(index_of);
        e.write(".call(");
        self.expr(e, collection, 1)?;
        e.write(", ");
        self.expr(e, item, 1)?;
        e.write(if negated { ") < 0" } else { ") >= 0" });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Soaks
    // ------------------------------------------------------------------

    /// `a?.b`, `a?[b]` and `f?()`: guard the innermost soaked link and
    /// compile the rest of the chain against it.
    fn soak(&mut self, e: &mut Emitter, expr: &Expr) -> Result<(), CompileError> {
        let Some((target, is_call)) = split_soak(expr) else {
            return self.expr_inner(e, expr);
        };

        let replacement = if is_call {
            match &target.kind {
                ExprKind::Access { target: object, name, .. } if !object.is_simple() => {
                    let reference = self.scopes.temp("ref");
                    let text = self.expr_text(e.indent, object, 1)?;
                    e.write(&format!("typeof ({} = {}).{} === \"function\"", reference, text, name));
                    Expr::new(
                        ExprKind::Access {
                            target: Box::new(Expr::ident(reference, object.pos)),
                            name: name.clone(),
                            soak: false,
                        },
                        target.pos,
                    )
                }
                ExprKind::Ident(_) | ExprKind::Access { .. } => {
                    let text = self.expr_text(e.indent, &target, 15)?;
                    e.write(&format!("typeof {} === \"function\"", text));
                    target.clone()
                }
                _ => {
                    let reference = self.scopes.temp("ref");
                    let text = self.expr_text(e.indent, &target, 1)?;
                    e.write(&format!("typeof ({} = {}) === \"function\"", reference, text));
                    Expr::ident(reference, target.pos)
                }
            }
        } else if self.is_undeclared(&target) {
            let text = self.expr_text(e.indent, &target, 16)?;
            e.write(&format!("typeof {} !== \"undefined\" && {} !== null", text, text));
            target.clone()
        } else if target.is_simple() {
            let text = self.expr_text(e.indent, &target, 9)?;
            e.write(&format!("{} != null", text));
            target.clone()
        } else {
            let reference = self.scopes.temp("ref");
            let text = self.expr_text(e.indent, &target, 1)?;
            e.write(&format!("({} = {}) != null", reference, text));
            Expr::ident(reference, target.pos)
        };

        let rebuilt = replace_soak(expr, &replacement);
        e.write(" ? ");
        self.expr(e, &rebuilt, 1)?;
        e.write(" : void 0");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Assignment
    // ------------------------------------------------------------------

    fn assign(
        &mut self,
        e: &mut Emitter,
        target: &Expr,
        op: Option<&'static str>,
        value: &Expr,
    ) -> Result<(), CompileError> {
        if let ExprKind::Ident(name) = &target.kind {
            self.scopes.declare(name);
        }
        match op {
            None if is_pattern(target) => self.destructure(e, target, value, false),
            None => self.assign_plain(e, target, value),
            Some("?=") => {
                let text = self.expr_text(e.indent, target, 15)?;
                e.write(&format!("{} != null ? {} : {} = ", text, text, text));
                self.expr(e, value, 1)
            }
            Some(op @ ("||=" | "&&=")) => {
                let text = self.expr_text(e.indent, target, 15)?;
                e.write(&format!("{} {} ({} = ", text, &op[..2], text));
                self.expr(e, value, 1)?;
                e.write(")");
                Ok(())
            }
            Some(op) => {
                self.expr(e, target, 15)?;
                e.write(" ");
                e.write(op);
                e.write(" ");
                self.expr(e, value, 1)
            }
        }
    }

    fn assign_plain(&mut self, e: &mut Emitter, target: &Expr, value: &Expr) -> Result<(), CompileError> {
        if let ExprKind::Ident(name) = &target.kind {
            self.scopes.declare(name);
        }
        self.expr(e, target, 15)?;
        e.write(" = ");
        self.expr(e, value, 1)
    }

    /// `[a, b] = value` and `{a, b: c} = value` as a sequence of plain
    /// assignments. As a value the sequence ends with the assigned object.
    fn destructure(
        &mut self,
        e: &mut Emitter,
        pattern: &Expr,
        value: &Expr,
        statement: bool,
    ) -> Result<(), CompileError> {
        let base = match &value.kind {
            ExprKind::Ident(name) => name.clone(),
            _ => {
                let reference = self.scopes.temp("ref");
                e.write(&reference);
                e.write(" = ");
                self.expr(e, value, 1)?;
                e.write(", ");
                reference
            }
        };

        let mut pairs = Vec::new();
        self.collect_pattern(pattern, &base, &mut pairs)?;
        for (i, (target, access)) in pairs.iter().enumerate() {
            if i > 0 {
                e.write(", ");
            }
            if let ExprKind::Ident(name) = &target.kind {
                self.scopes.declare(name);
            }
            self.expr(e, target, 15)?;
            e.write(" = ");
            e.write(access);
        }
        if !statement {
            e.write(", ");
            e.write(&base);
        }
        Ok(())
    }

    fn collect_pattern(
        &mut self,
        pattern: &Expr,
        base: &str,
        out: &mut Vec<(Expr, String)>,
    ) -> Result<(), CompileError> {
        match &pattern.kind {
            ExprKind::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    match &item.kind {
                        ExprKind::Splat(inner) => {
                            if i + 1 != items.len() {
                                return Err(CompileError::new(
                                    "a splat must be the last element of a pattern",
                                    item.pos,
                                ));
                            }
                            let slice = self.use_helper(Helper::Slice);
                            self.collect_target(inner, format!("{}.call({}, {})", slice, base, i), out)?;
                        }
                        _ => self.collect_target(item, format!("{}[{}]", base, i), out)?,
                    }
                }
                Ok(())
            }
            ExprKind::Object(props) => {
                for prop in props {
                    let access = format!("{}{}", base, member_suffix(&prop.key));
                    self.collect_target(&prop.value, access, out)?;
                }
                Ok(())
            }
            _ => Err(CompileError::new("invalid destructuring pattern", pattern.pos)),
        }
    }

    fn collect_target(&mut self, target: &Expr, access: String, out: &mut Vec<(Expr, String)>) -> Result<(), CompileError> {
        if is_pattern(target) {
            return self.collect_pattern(target, &access, out);
        }
        out.push((target.clone(), access));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Functions and classes
    // ------------------------------------------------------------------

    fn function(&mut self, e: &mut Emitter, func: &Func, options: FuncOptions) -> Result<(), CompileError> {
        if let Some(index) = func.params.iter().position(|p| p.splat) {
            if index + 1 != func.params.len() {
                return Err(CompileError::new("a splat parameter must be the last one", func.params[index].pos));
            }
        }

        self.scopes.push(FunctionScope::function(func.bound && !options.unbound));
        let result = self.function_body(e, func, &options);
        let scope = self.scopes.pop();
        let (names, body) = result?;

        e.write("function");
        if let Some(name) = &options.name {
            e.write(" ");
            e.write(name);
        }
        e.write("(");
        e.write(&names.join(", "));
        e.write(") {");

        let declarations = scope.declarations();
        if body.is_empty() && declarations.is_empty() {
            e.write("}");
            return Ok(());
        }
        e.newline();
        e.indent += 1;
        write_declarations(e, &declarations);
        e.indent -= 1;
        e.append(body);
        e.start_line();
        e.write("}");
        Ok(())
    }

    fn function_body(
        &mut self,
        e: &Emitter,
        func: &Func,
        options: &FuncOptions,
    ) -> Result<(Vec<String>, Emitter), CompileError> {
        let mut body = e.child();
        let mut names = Vec::new();

        for line in &options.prelude {
            body.start_line();
            body.write(line);
            body.newline();
        }

        for (i, param) in func.params.iter().enumerate() {
            if param.splat {
                let name = match &param.target {
                    ParamTarget::Ident(name) | ParamTarget::This(name) => name.clone(),
                    ParamTarget::Pattern(p) => {
                        return Err(CompileError::new("a splat parameter cannot be a pattern", p.pos));
                    }
                };
                let slice = self.use_helper(Helper::Slice);
                self.scopes.declare(&name);
                body.start_line();
                body.map(param.pos);
                body.write(&format!("{} = {}.call(arguments, {});", name, slice, i));
                body.newline();
                if matches!(param.target, ParamTarget::This(_)) {
                    let this = self.scopes.this_expr();
                    body.start_line();
                    body.write(&format!("{}.{} = {};", this, name, name));
                    body.newline();
                }
                continue;
            }

            let name = match &param.target {
                ParamTarget::Ident(name) | ParamTarget::This(name) => {
                    self.scopes.add_param(name);
                    name.clone()
                }
                ParamTarget::Pattern(_) => self.scopes.temp_param("arg"),
            };
            names.push(name.clone());

            if let Some(default) = &param.default {
                body.start_line();
                body.map(param.pos);
                body.write(&format!("if ({} == null) {{", name));
                body.newline();
                body.indent += 1;
                body.start_line();
                body.write(&format!("{} = ", name));
                self.expr(&mut body, default, 1)?;
                body.write(";");
                body.newline();
                body.indent -= 1;
                body.start_line();
                body.write("}");
                body.newline();
            }

            match &param.target {
                ParamTarget::This(field) => {
                    let this = self.scopes.this_expr();
                    body.start_line();
                    body.map(param.pos);
                    body.write(&format!("{}.{} = {};", this, field, name));
                    body.newline();
                }
                ParamTarget::Pattern(pattern) => {
                    body.start_line();
                    body.map(param.pos);
                    let source = Expr::ident(name.clone(), param.pos);
                    self.destructure(&mut body, pattern, &source, true)?;
                    body.write(";");
                    body.newline();
                }
                ParamTarget::Ident(_) => {}
            }
        }

        let position = if options.implicit_return { Position::Return } else { Position::Stmt };
        self.compile_body(&mut body, &func.body, position)?;
        Ok((names, body))
    }

    fn class(&mut self, e: &mut Emitter, node: &Class, pos: Pos) -> Result<(), CompileError> {
        let name = match node.target.as_ref().map(|t| &t.kind) {
            Some(ExprKind::Ident(name)) => name.clone(),
            Some(ExprKind::Access { name, .. }) => name.clone(),
            _ => "_Class".to_string(),
        };
        if let Some(target) = &node.target {
            if let ExprKind::Ident(n) = &target.kind {
                self.scopes.declare(n);
            }
            self.expr(e, target, 15)?;
            e.write(" = ");
        }

        e.write(if node.parent.is_some() { "(function(_super) {" } else { "(function() {" });
        e.newline();

        self.scopes.push(FunctionScope::class_body(&name));
        if node.parent.is_some() {
            self.scopes.add_param("_super");
        }
        self.classes.push(ClassContext { name: name.clone(), method: None, is_static: false });
        let mut body = e.child();
        let result = self.class_body(&mut body, node, &name, pos);
        self.classes.pop();
        let scope = self.scopes.pop();
        result?;

        e.indent += 1;
        write_declarations(e, &scope.declarations());
        e.indent -= 1;
        e.append(body);
        e.start_line();
        e.write("})(");
        if let Some(parent) = &node.parent {
            self.expr(e, parent, 1)?;
        }
        e.write(")");
        Ok(())
    }

    fn class_body(&mut self, e: &mut Emitter, node: &Class, name: &str, pos: Pos) -> Result<(), CompileError> {
        if node.parent.is_some() {
            let extends = self.use_helper(Helper::Extends);
            e.start_line();
            e.map(pos);
            e.write(&format!("{}({}, _super);", extends, name));
            e.newline();
            e.newline();
        }

        let constructor = node.members.iter().find_map(|m| match m {
            ClassMember::Method { key: PropKey::Ident(key), value, pos } if key == "constructor" => {
                Some((value, *pos))
            }
            _ => None,
        });

        let mut prelude = Vec::new();
        for member in &node.members {
            if let ClassMember::Method { key: key @ (PropKey::Ident(_) | PropKey::Str(..)), value, .. } = member {
                if matches!(&value.kind, ExprKind::Func(f) if f.bound) && key.name() != "constructor" {
                    let bind = self.use_helper(Helper::Bind);
                    let suffix = member_suffix(key);
                    prelude.push(format!("this{} = {}(this{}, this);", suffix, bind, suffix));
                }
            }
        }

        self.set_method(Some("constructor".to_string()), false);
        e.start_line();
        match constructor {
            Some((value, ctor_pos)) => {
                e.map(ctor_pos);
                let ExprKind::Func(func) = &value.kind else {
                    return Err(CompileError::new("a class constructor must be a function", ctor_pos));
                };
                let options = FuncOptions { name: Some(name.to_string()), prelude, implicit_return: false, unbound: true };
                self.function(e, func, options)?;
            }
            None => {
                e.map(pos);
                if node.parent.is_some() {
                    prelude.push(format!("return {}.__super__.constructor.apply(this, arguments);", name));
                }
                let empty = Func { params: Vec::new(), body: Vec::new(), bound: false };
                let options = FuncOptions { name: Some(name.to_string()), prelude, implicit_return: false, unbound: true };
                self.function(e, &empty, options)?;
            }
        }
        e.newline();
        e.newline();
        self.set_method(None, false);

        for member in &node.members {
            match member {
                ClassMember::Method { key, value, pos } => {
                    if matches!(key, PropKey::Ident(k) if k == "constructor") {
                        continue;
                    }
                    let is_static = matches!(key, PropKey::Static(_));
                    e.start_line();
                    e.map(*pos);
                    if is_static {
                        e.write(&format!("{}{} = ", name, member_suffix(key)));
                    } else {
                        e.write(&format!("{}.prototype{} = ", name, member_suffix(key)));
                    }
                    self.set_method(Some(key.name().to_string()), is_static);
                    match &value.kind {
                        ExprKind::Func(func) => {
                            let options = FuncOptions {
                                implicit_return: true,
                                unbound: !is_static,
                                ..FuncOptions::default()
                            };
                            self.function(e, func, options)?;
                        }
                        _ => self.expr(e, value, 1)?,
                    }
                    self.set_method(None, false);
                    e.write(";");
                    e.newline();
                    e.newline();
                }
                ClassMember::Code(stmt) => {
                    self.statement(e, stmt, Position::Stmt)?;
                    e.newline();
                }
            }
        }

        e.start_line();
        e.write(&format!("return {};", name));
        e.newline();
        e.newline();
        Ok(())
    }

    fn set_method(&mut self, method: Option<String>, is_static: bool) {
        if let Some(context) = self.classes.last_mut() {
            context.method = method;
            context.is_static = is_static;
        }
    }
}

fn value_error(what: &str, pos: Pos) -> CompileError {
    CompileError::new(format!("cannot use {} as a value", what), pos)
}

fn binary_precedence(op: &str) -> u8 {
    match op {
        "?" => 2,
        "||" => 3,
        "&&" => 4,
        "|" => 5,
        "^" => 6,
        "&" => 7,
        "===" | "!==" | "==" | "!=" => 8,
        "<" | ">" | "<=" | ">=" | "instanceof" | "in" => 9,
        "<<" | ">>" | ">>>" => 10,
        "+" | "-" => 11,
        _ => 12,
    }
}

fn is_pattern(expr: &Expr) -> bool {
    matches!(expr.kind, ExprKind::Array(_) | ExprKind::Object(_))
}

/// Can this expression be written as a JavaScript expression without a
/// closure?
fn is_pure(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::If(node) => ternary_able(node),
        ExprKind::For(_)
        | ExprKind::While(_)
        | ExprKind::Switch(_)
        | ExprKind::Try(_)
        | ExprKind::Return(_)
        | ExprKind::Throw(_)
        | ExprKind::Break
        | ExprKind::Continue
        | ExprKind::Comment(_) => false,
        _ => true,
    }
}

fn ternary_able(node: &If) -> bool {
    let single = |block: &[Expr]| matches!(block, [only] if is_pure(only));
    single(&node.then) && node.otherwise.as_deref().map_or(true, single)
}

fn needs_break(body: &[Expr], position: &Position) -> bool {
    match body.iter().rev().find(|s| !matches!(s.kind, ExprKind::Comment(_))) {
        None => true,
        Some(last) if last.is_jump() => false,
        Some(last) => !(*position == Position::Return && is_pure(last)),
    }
}

/// A statement beginning with `function` or `{` must be parenthesized.
fn starts_with_function_or_object(expr: &Expr) -> bool {
    if split_soak(expr).is_some() {
        return false;
    }
    match &expr.kind {
        ExprKind::Func(_) | ExprKind::Object(_) => true,
        ExprKind::Call { callee, new: false, args, .. } => {
            !matches!(callee.kind, ExprKind::Func(_))
                && !args.iter().any(|a| matches!(a.kind, ExprKind::Splat(_)))
                && starts_with_function_or_object(callee)
        }
        ExprKind::Access { target, .. } | ExprKind::Index { target, .. } | ExprKind::Slice { target, .. } => {
            starts_with_function_or_object(target)
        }
        ExprKind::Binary { op, left, .. } if *op != "?" => starts_with_function_or_object(left),
        ExprKind::Assign { target, op: None, .. } => starts_with_function_or_object(target),
        ExprKind::Update { prefix: false, operand, .. } => starts_with_function_or_object(operand),
        _ => false,
    }
}

fn contains_call(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Call { .. } => true,
        ExprKind::Access { target, .. } | ExprKind::Index { target, .. } => contains_call(target),
        _ => false,
    }
}

fn int_literal(expr: &Expr) -> Option<i64> {
    match &expr.kind {
        ExprKind::Number(n) => n.parse().ok(),
        ExprKind::Unary { op: "-", operand } => match &operand.kind {
            ExprKind::Number(n) => n.parse::<i64>().ok().map(|v| -v),
            _ => None,
        },
        _ => None,
    }
}

fn is_negative_literal(expr: &Expr) -> bool {
    matches!(&expr.kind, ExprKind::Unary { op: "-", operand } if matches!(operand.kind, ExprKind::Number(_)))
}

/// Values of a small literal range, expanded inline.
fn inline_range(from: &Expr, to: &Expr, exclusive: bool) -> Option<Vec<i64>> {
    let (start, end) = (int_literal(from)?, int_literal(to)?);
    if (end - start).abs() > INLINE_RANGE_LIMIT {
        return None;
    }
    let values: Vec<i64> = if start <= end {
        let end = if exclusive { end - 1 } else { end };
        (start..=end).collect()
    } else {
        let end = if exclusive { end + 1 } else { end };
        (end..=start).rev().collect()
    };
    Some(values)
}

/// Number of comparisons when `x in [a, b]` expands to an equality chain.
fn in_chain_len(collection: &Expr) -> Option<usize> {
    match &collection.kind {
        ExprKind::Array(values)
            if values.len() <= IN_CHAIN_LIMIT
                && !values.iter().any(|v| matches!(v.kind, ExprKind::Splat(_))) =>
        {
            Some(values.len())
        }
        _ => None,
    }
}

fn member_suffix(key: &PropKey) -> String {
    match key {
        PropKey::Ident(name) | PropKey::Static(name) => format!(".{}", name),
        PropKey::Str(text, quote) => format!("[{}{}{}]", quote, text, quote),
        PropKey::Number(n) => format!("[{}]", n),
    }
}

/// Find the soaked link closest to the base of an access chain. Returns the
/// expression it guards and whether it is a call.
fn split_soak(expr: &Expr) -> Option<(Expr, bool)> {
    match &expr.kind {
        ExprKind::Access { target, soak, .. } | ExprKind::Index { target, soak, .. } => {
            split_soak(target).or_else(|| soak.then(|| ((**target).clone(), false)))
        }
        ExprKind::Call { callee, soak, new: false, .. } => {
            split_soak(callee).or_else(|| soak.then(|| ((**callee).clone(), true)))
        }
        ExprKind::Slice { target, .. } => split_soak(target),
        _ => None,
    }
}

/// Rebuild a chain with its innermost soaked link replaced by a plain one
/// whose target is `replacement`.
fn replace_soak(expr: &Expr, replacement: &Expr) -> Expr {
    let kind = match &expr.kind {
        ExprKind::Access { target, name, soak } => {
            if split_soak(target).is_some() {
                ExprKind::Access { target: Box::new(replace_soak(target, replacement)), name: name.clone(), soak: *soak }
            } else if *soak {
                ExprKind::Access { target: Box::new(replacement.clone()), name: name.clone(), soak: false }
            } else {
                return expr.clone();
            }
        }
        ExprKind::Index { target, index, soak } => {
            if split_soak(target).is_some() {
                ExprKind::Index { target: Box::new(replace_soak(target, replacement)), index: index.clone(), soak: *soak }
            } else if *soak {
                ExprKind::Index { target: Box::new(replacement.clone()), index: index.clone(), soak: false }
            } else {
                return expr.clone();
            }
        }
        ExprKind::Call { callee, args, soak, new } => {
            if split_soak(callee).is_some() {
                ExprKind::Call { callee: Box::new(replace_soak(callee, replacement)), args: args.clone(), soak: *soak, new: *new }
            } else if *soak {
                ExprKind::Call { callee: Box::new(replacement.clone()), args: args.clone(), soak: false, new: *new }
            } else {
                return expr.clone();
            }
        }
        ExprKind::Slice { target, from, to, exclusive } => ExprKind::Slice {
            target: Box::new(replace_soak(target, replacement)),
            from: from.clone(),
            to: to.clone(),
            exclusive: *exclusive,
        },
        _ => return expr.clone(),
    };
    Expr::new(kind, expr.pos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{lexer, parser};

    fn js(source: &str) -> String {
        let tokens = lexer::tokenize(source).unwrap();
        let body = parser::parse(tokens).unwrap();
        generate(&body, true).unwrap().0
    }

    fn js_error(source: &str) -> CompileError {
        let tokens = lexer::tokenize(source).unwrap();
        let body = parser::parse(tokens).unwrap();
        generate(&body, true).unwrap_err()
    }

    #[test]
    fn test_assignment_declares_var() {
        assert_eq!(js("x = 1"), "var x;\n\nx = 1;\n");
    }

    #[test]
    fn test_wrapper() {
        let tokens = lexer::tokenize("x = 1").unwrap();
        let body = parser::parse(tokens).unwrap();
        let (out, _) = generate(&body, false).unwrap();
        assert_eq!(out, "(function() {\n  var x;\n\n  x = 1;\n\n}).call(this);\n");
    }

    #[test]
    fn test_function_implicit_return() {
        assert_eq!(
            js("square = (x) -> x * x"),
            "var square;\n\nsquare = function(x) {\n  return x * x;\n};\n"
        );
    }

    #[test]
    fn test_default_param() {
        let out = js("f = (a = 1) -> a");
        assert!(out.contains("if (a == null) {\n    a = 1;\n  }"), "{}", out);
    }

    #[test]
    fn test_implicit_call_and_operators() {
        assert_eq!(js("console.log a is b and not c"), "console.log(a === b && !c);\n");
    }

    #[test]
    fn test_if_else_statement() {
        assert_eq!(
            js("if a\n  b()\nelse\n  c()"),
            "if (a) {\n  b();\n} else {\n  c();\n}\n"
        );
    }

    #[test]
    fn test_ternary_from_if_expression() {
        assert_eq!(js("x = if a then 1 else 2"), "var x;\n\nx = a ? 1 : 2;\n");
    }

    #[test]
    fn test_unless_negates() {
        assert_eq!(js("f() unless a"), "if (!a) {\n  f();\n}\n");
    }

    #[test]
    fn test_array_loop() {
        let out = js("for x in xs\n  f x");
        assert_eq!(
            out,
            "var x, _i, _len;\n\nfor (_i = 0, _len = xs.length; _i < _len; _i++) {\n  x = xs[_i];\n  f(x);\n}\n"
        );
    }

    #[test]
    fn test_comprehension_returns_results() {
        let out = js("f = -> (x * 2 for x in xs)");
        assert!(out.contains("_results = [];"), "{}", out);
        assert!(out.contains("_results.push(x * 2);"), "{}", out);
        assert!(out.contains("return _results;"), "{}", out);
    }

    #[test]
    fn test_range_loop_literal() {
        assert_eq!(
            js("for i in [1..3]\n  f i"),
            "var i;\n\nfor (i = 1; i <= 3; i++) {\n  f(i);\n}\n"
        );
    }

    #[test]
    fn test_inline_range() {
        assert_eq!(js("x = [1...4]"), "var x;\n\nx = [1, 2, 3];\n");
    }

    #[test]
    fn test_exclusive_range_loop() {
        let out = js("for i in [0...3]\n  f i");
        assert!(out.contains("for (i = 0; i < 3; i++) {\n  f(i);\n}"), "{}", out);
        assert!(!out.contains("__slice"), "{}", out);
    }

    #[test]
    fn test_not_in_and_not_of() {
        let out = js("x = a not in b");
        assert!(out.contains("x = __indexOf.call(b, a) < 0;"), "{}", out);
        assert_eq!(js("a not in [1, 2]"), "a !== 1 && a !== 2;\n");
        assert!(js("y = k not of obj").contains("!(k in obj)"));
    }

    #[test]
    fn test_inline_else_statement() {
        assert_eq!(js("if a then b() else c()"), "if (a) {\n  b();\n} else {\n  c();\n}\n");
        assert_eq!(js("if a\n  b()\nelse c()"), "if (a) {\n  b();\n} else {\n  c();\n}\n");
    }

    #[test]
    fn test_for_own_of() {
        let out = js("for own k, v of obj\n  f k, v");
        assert!(out.starts_with("var __hasProp = {}.hasOwnProperty;\n"), "{}", out);
        assert!(out.contains("for (k in obj) {\n  if (!__hasProp.call(obj, k)) continue;\n  v = obj[k];"));
    }

    #[test]
    fn test_in_operator() {
        assert_eq!(js("a in [1, 2]"), "a === 1 || a === 2;\n");
        let out = js("a in list");
        assert!(out.contains("__indexOf.call(list, a) >= 0"), "{}", out);
    }

    #[test]
    fn test_existence() {
        assert_eq!(js("a?"), "typeof a !== \"undefined\" && a !== null;\n");
        assert_eq!(js("a = 1\na?"), "var a;\n\na = 1;\na != null;\n");
    }

    #[test]
    fn test_soak_access() {
        assert_eq!(js("a = {}\na?.b"), "var a;\n\na = {};\na != null ? a.b : void 0;\n");
    }

    #[test]
    fn test_string_interpolation() {
        assert_eq!(js("\"Hi #{name}!\""), "\"Hi \" + name + \"!\";\n");
    }

    #[test]
    fn test_fat_arrow_uses_this_alias() {
        let out = js("f = ->\n  g => @x");
        assert!(out.contains("var _this = this;"), "{}", out);
        assert!(out.contains("return _this.x;"), "{}", out);
    }

    #[test]
    fn test_class_with_super() {
        let out = js("class A extends B\n  constructor: (@n) ->\n    super()\n  go: -> super");
        assert!(out.contains("__extends(A, _super);"), "{}", out);
        assert!(out.contains("function A(n) {"), "{}", out);
        assert!(out.contains("this.n = n;"), "{}", out);
        assert!(out.contains("A.__super__.constructor.call(this);"), "{}", out);
        assert!(out.contains("return A.__super__.go.apply(this, arguments);"), "{}", out);
        assert!(out.contains("})(B);"), "{}", out);
    }

    #[test]
    fn test_destructuring() {
        assert_eq!(js("[a, b] = pair"), "var a, b;\n\na = pair[0], b = pair[1];\n");
        assert_eq!(js("{x, y: z} = point"), "var x, z;\n\nx = point.x, z = point.y;\n");
    }

    #[test]
    fn test_splat_call() {
        let out = js("f a, rest...");
        assert!(out.contains("f.apply(null, [a].concat(__slice.call(rest)));"), "{}", out);
    }

    #[test]
    fn test_switch() {
        let out = js("switch x\n  when 1 then a()\n  else b()");
        assert_eq!(out, "switch (x) {\n  case 1:\n    a();\n    break;\n  default:\n    b();\n}\n");
    }

    #[test]
    fn test_try_catch() {
        assert_eq!(js("try\n  a()\ncatch e\n  b e"), "try {\n  a();\n} catch (e) {\n  b(e);\n}\n");
    }

    #[test]
    fn test_function_statement_is_parenthesized() {
        assert_eq!(js("do -> a()"), "(function() {\n  return a();\n})();\n");
    }

    #[test]
    fn test_return_outside_statement_is_error() {
        assert!(js_error("x = (return 1)").message.contains("cannot use return as a value"));
    }

    #[test]
    fn test_super_outside_class_is_error() {
        assert!(js_error("super()").message.contains("outside of a class"));
    }

    #[test]
    fn test_every_line_has_mapping() {
        let tokens = lexer::tokenize("f = (a) ->\n  if a\n    b()\n  else\n    c()\n").unwrap();
        let body = parser::parse(tokens).unwrap();
        let (out, mappings) = generate(&body, false).unwrap();
        for (line, text) in out.lines().enumerate() {
            if text.trim().is_empty() {
                continue;
            }
            assert!(
                mappings.iter().any(|m| m.generated_line == line as u32),
                "line {} ({:?}) has no mapping",
                line,
                text
            );
        }
    }
}
