//! Function scopes for `var` declarations, temporaries and `this` capture

use std::collections::HashSet;

/// Variables and temporaries owned by one generated JavaScript function.
#[derive(Debug, Default)]
pub struct FunctionScope {
    vars: Vec<String>,
    temps: Vec<String>,
    /// Every visible name, including parameters and catch bindings that are
    /// declared without `var`
    names: HashSet<String>,
    /// Needs `_this = this` for a nested fat arrow
    this_alias: bool,
    /// Fat-arrow function: `this` belongs to the enclosing function
    bound: bool,
    /// Class body: `this` is the class itself
    class_name: Option<String>,
}

impl FunctionScope {
    pub fn function(bound: bool) -> Self {
        Self { bound, ..Self::default() }
    }

    pub fn class_body(name: &str) -> Self {
        Self { class_name: Some(name.to_string()), ..Self::default() }
    }

    /// Entries for the function's `var` statement, in declaration order.
    pub fn declarations(&self) -> Vec<String> {
        let mut out: Vec<String> = self.vars.iter().chain(self.temps.iter()).cloned().collect();
        if self.this_alias {
            out.push("_this = this".to_string());
        }
        out
    }
}

#[derive(Debug, Default)]
pub struct ScopeStack {
    scopes: Vec<FunctionScope>,
}

impl ScopeStack {
    pub fn push(&mut self, scope: FunctionScope) {
        self.scopes.push(scope);
    }

    pub fn pop(&mut self) -> FunctionScope {
        self.scopes.pop().unwrap_or_default()
    }

    fn current(&mut self) -> &mut FunctionScope {
        if self.scopes.is_empty() {
            self.scopes.push(FunctionScope::default());
        }
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.scopes.iter().any(|s| s.names.contains(name))
    }

    /// Declare `name` in the current function unless an enclosing one has it.
    pub fn declare(&mut self, name: &str) {
        if self.is_declared(name) {
            return;
        }
        let scope = self.current();
        scope.names.insert(name.to_string());
        scope.vars.push(name.to_string());
    }

    pub fn add_param(&mut self, name: &str) {
        self.current().names.insert(name.to_string());
    }

    fn fresh(&self, base: &str) -> String {
        let mut n = 0usize;
        loop {
            let candidate = if base == "i" {
                let letter = (b'i' + (n % 18) as u8) as char;
                if n < 18 {
                    format!("_{}", letter)
                } else {
                    format!("_{}{}", letter, n / 18)
                }
            } else if n == 0 {
                format!("_{}", base)
            } else {
                format!("_{}{}", base, n)
            };
            if !self.is_declared(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// A fresh temporary declared with `var`: `_i`, `_j`, ... for indices,
    /// `_ref`, `_ref1`, ... for everything else.
    pub fn temp(&mut self, base: &str) -> String {
        let name = self.fresh(base);
        let scope = self.current();
        scope.names.insert(name.clone());
        scope.temps.push(name.clone());
        name
    }

    /// A fresh name used as a parameter, e.g. `_arg` for a destructured one.
    pub fn temp_param(&mut self, base: &str) -> String {
        let name = self.fresh(base);
        self.add_param(&name);
        name
    }

    /// The JavaScript expression for `this` at the current position.
    pub fn this_expr(&mut self) -> String {
        let mut index = self.scopes.len();
        while index > 0 {
            index -= 1;
            let scope = &self.scopes[index];
            if let Some(name) = &scope.class_name {
                return name.clone();
            }
            if scope.bound {
                continue;
            }
            if index == self.scopes.len() - 1 {
                return "this".to_string();
            }
            self.scopes[index].this_alias = true;
            return "_this".to_string();
        }
        "this".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declare_once_across_scopes() {
        let mut scopes = ScopeStack::default();
        scopes.push(FunctionScope::default());
        scopes.declare("a");
        scopes.push(FunctionScope::function(false));
        scopes.declare("a");
        scopes.declare("b");
        let inner = scopes.pop();
        assert_eq!(inner.declarations(), vec!["b"]);
        assert_eq!(scopes.pop().declarations(), vec!["a"]);
    }

    #[test]
    fn test_params_are_not_declared_as_vars() {
        let mut scopes = ScopeStack::default();
        scopes.push(FunctionScope::function(false));
        scopes.add_param("x");
        scopes.declare("x");
        assert!(scopes.is_declared("x"));
        assert!(scopes.pop().declarations().is_empty());
    }

    #[test]
    fn test_temp_names() {
        let mut scopes = ScopeStack::default();
        scopes.push(FunctionScope::default());
        assert_eq!(scopes.temp("i"), "_i");
        assert_eq!(scopes.temp("i"), "_j");
        assert_eq!(scopes.temp("ref"), "_ref");
        assert_eq!(scopes.temp("ref"), "_ref1");
        assert_eq!(scopes.temp("len"), "_len");
        assert_eq!(scopes.temp_param("arg"), "_arg");
        assert!(scopes.pop().declarations().iter().all(|d| d != "_arg"));
    }

    #[test]
    fn test_fat_arrow_captures_this() {
        let mut scopes = ScopeStack::default();
        scopes.push(FunctionScope::function(false));
        assert_eq!(scopes.this_expr(), "this");
        scopes.push(FunctionScope::function(true));
        assert_eq!(scopes.this_expr(), "_this");
        scopes.pop();
        assert_eq!(scopes.pop().declarations(), vec!["_this = this"]);
    }

    #[test]
    fn test_class_body_this_is_class() {
        let mut scopes = ScopeStack::default();
        scopes.push(FunctionScope::class_body("Point"));
        assert_eq!(scopes.this_expr(), "Point");
    }
}
