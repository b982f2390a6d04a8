//! Type environment with a scope stack.
//!
//! Maps names to type schemes. Entering a function or block pushes a
//! scope; leaving pops it. Lookups walk inward-out, implementing lexical
//! scoping and shadowing (a local `let print = ..` shadows the built-in).

use rustc_hash::FxHashMap;

use crate::ty::Scheme;

/// A single name binding.
#[derive(Debug, Clone)]
pub struct Binding {
    pub scheme: Scheme,
    /// Whether `name = value` reassignment is permitted (`let` bindings
    /// are; `const`, functions, and built-ins are not).
    pub assignable: bool,
}

/// A stack of scopes mapping names to bindings.
pub struct TypeEnv {
    /// Index 0 is the outermost (global) scope.
    scopes: Vec<FxHashMap<String, Binding>>,
}

impl TypeEnv {
    /// Create a new environment with one empty global scope.
    pub fn new() -> Self {
        TypeEnv {
            scopes: vec![FxHashMap::default()],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    /// # Panics
    ///
    /// Panics if called when only the global scope remains.
    pub fn pop_scope(&mut self) {
        assert!(self.scopes.len() > 1, "cannot pop the global scope");
        self.scopes.pop();
    }

    /// Insert a binding into the current (topmost) scope.
    pub fn insert(&mut self, name: impl Into<String>, scheme: Scheme, assignable: bool) {
        self.scopes
            .last_mut()
            .expect("scope stack is never empty")
            .insert(name.into(), Binding { scheme, assignable });
    }

    /// Look up a name, innermost scope first.
    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Replace an existing binding's scheme wherever it is bound.
    ///
    /// Used to upgrade a hoisted monomorphic function signature to its
    /// generalized scheme after the body has been checked.
    pub fn update_scheme(&mut self, name: &str, scheme: Scheme) {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(binding) = scope.get_mut(name) {
                binding.scheme = scheme;
                return;
            }
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Iterate the global scope's bindings.
    pub fn globals(&self) -> impl Iterator<Item = (&String, &Binding)> {
        self.scopes[0].iter()
    }
}

impl Default for TypeEnv {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::{Scheme, Ty};

    #[test]
    fn lookup_walks_outward() {
        let mut env = TypeEnv::new();
        env.insert("x", Scheme::mono(Ty::int()), true);
        env.push_scope();
        assert!(env.lookup("x").is_some());
        assert!(env.lookup("y").is_none());
    }

    #[test]
    fn shadowing_and_restore() {
        let mut env = TypeEnv::new();
        env.insert("x", Scheme::mono(Ty::int()), true);
        env.push_scope();
        env.insert("x", Scheme::mono(Ty::string()), true);
        assert_eq!(env.lookup("x").unwrap().scheme.ty, Ty::string());
        env.pop_scope();
        assert_eq!(env.lookup("x").unwrap().scheme.ty, Ty::int());
    }

    #[test]
    fn assignability_is_tracked() {
        let mut env = TypeEnv::new();
        env.insert("pi", Scheme::mono(Ty::float()), false);
        assert!(!env.lookup("pi").unwrap().assignable);
    }

    #[test]
    fn update_scheme_reaches_outer_scope() {
        let mut env = TypeEnv::new();
        env.insert("f", Scheme::mono(Ty::int()), false);
        env.push_scope();
        env.update_scheme("f", Scheme::mono(Ty::bool()));
        env.pop_scope();
        assert_eq!(env.lookup("f").unwrap().scheme.ty, Ty::bool());
    }

    #[test]
    #[should_panic(expected = "cannot pop the global scope")]
    fn popping_global_scope_panics() {
        let mut env = TypeEnv::new();
        env.pop_scope();
    }
}
