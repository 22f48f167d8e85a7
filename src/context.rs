//! Scope stack for template rendering
//!
//! The root scope holds the host's bindings. Loops, `with` blocks, macro calls
//! and each render push a scope on top and always pop it again.

use crate::error::{Result, TemplateError};
use crate::value::Value;
use indexmap::IndexMap;

/// A stack of name-to-value scopes, innermost last
#[derive(Debug, Clone)]
pub struct Context {
    scopes: Vec<IndexMap<String, Value>>,
}

impl Context {
    pub fn new() -> Self {
        Context {
            scopes: vec![IndexMap::new()],
        }
    }

    /// Seed the root scope from a JSON object; any other JSON is rejected
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        let mut context = Context::new();
        match Value::from(json) {
            Value::Dict(entries) => {
                for (name, value) in entries.borrow().iter() {
                    context.define(name, value.clone());
                }
                Ok(context)
            }
            Value::Nil => Ok(context),
            other => Err(TemplateError::type_error(format!(
                "context data must be an object, not {}",
                other.type_name()
            ))),
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(IndexMap::new());
        tracing::trace!(depth = self.scopes.len(), "push scope");
    }

    /// Pop the innermost scope. The root scope is never removed.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
        tracing::trace!(depth = self.scopes.len(), "pop scope");
    }

    /// Run `f` inside a fresh scope, popping it whether or not `f` fails
    pub fn with_scope<T>(&mut self, f: impl FnOnce(&mut Context) -> T) -> T {
        self.push_scope();
        let depth = self.scopes.len();
        let result = f(self);
        self.scopes.truncate(depth);
        self.pop_scope();
        result
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Look a name up from the innermost scope outward
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Like [`Context::lookup`], but a miss reads as `Nil`
    pub fn get(&self, name: &str) -> Value {
        self.lookup(name).cloned().unwrap_or(Value::Nil)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Rebind `name` in the nearest scope that already owns it, otherwise
    /// create it in the innermost scope.
    pub fn set(&mut self, name: &str, value: Value) {
        if let Some(scope) = self
            .scopes
            .iter_mut()
            .rev()
            .find(|scope| scope.contains_key(name))
        {
            scope.insert(name.to_string(), value);
            return;
        }
        self.define(name, value);
    }

    /// Bind `name` in the innermost scope, shadowing any outer binding
    pub fn define(&mut self, name: &str, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), value);
        }
    }

    /// Every visible binding, inner scopes shadowing outer ones
    pub fn visible(&self) -> IndexMap<String, Value> {
        let mut visible = IndexMap::new();
        for scope in &self.scopes {
            for (name, value) in scope {
                visible.insert(name.clone(), value.clone());
            }
        }
        visible
    }

    /// Drop every binding and nested scope
    pub fn clear(&mut self) {
        self.scopes = vec![IndexMap::new()];
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl From<IndexMap<String, Value>> for Context {
    fn from(globals: IndexMap<String, Value>) -> Self {
        Context {
            scopes: vec![globals],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_name_is_nil() {
        let ctx = Context::new();
        assert!(ctx.get("nope").is_nil());
        assert!(!ctx.contains("nope"));
    }

    #[test]
    fn test_inner_scope_shadows_and_pops() {
        let mut ctx = Context::new();
        ctx.set("x", Value::from(1));
        ctx.push_scope();
        ctx.define("x", Value::from(2));
        assert_eq!(ctx.get("x"), Value::from(2));
        ctx.pop_scope();
        assert_eq!(ctx.get("x"), Value::from(1));
    }

    #[test]
    fn test_set_rebinds_nearest_owner() {
        let mut ctx = Context::new();
        ctx.set("total", Value::from(0));
        ctx.push_scope();
        ctx.define("total", Value::from(10));
        ctx.push_scope();
        ctx.set("total", Value::from(11));
        ctx.set("fresh", Value::from(1));
        ctx.pop_scope();
        assert_eq!(ctx.get("total"), Value::from(11));
        assert!(ctx.get("fresh").is_nil());
        ctx.pop_scope();
        assert_eq!(ctx.get("total"), Value::from(0));
    }

    #[test]
    fn test_root_scope_survives_extra_pops() {
        let mut ctx = Context::new();
        ctx.set("x", Value::from(1));
        ctx.pop_scope();
        ctx.pop_scope();
        assert_eq!(ctx.depth(), 1);
        assert_eq!(ctx.get("x"), Value::from(1));
    }

    #[test]
    fn test_with_scope_pops_on_failure() {
        let mut ctx = Context::new();
        let result: Result<()> = ctx.with_scope(|inner| {
            inner.push_scope();
            inner.define("tmp", Value::from(1));
            Err(TemplateError::type_error("boom"))
        });
        assert!(result.is_err());
        assert_eq!(ctx.depth(), 1);
        assert!(ctx.get("tmp").is_nil());
    }

    #[test]
    fn test_lookup_shares_container_storage() {
        let mut ctx = Context::new();
        ctx.set("l", Value::list(vec![]));
        let alias = ctx.get("l");
        if let Value::List(items) = &alias {
            items.borrow_mut().push(Value::from("x"));
        }
        assert_eq!(ctx.get("l").render(), "['x']");
    }

    #[test]
    fn test_from_json() {
        let ctx = Context::from_json(serde_json::json!({"value": ["1", 2]})).unwrap();
        assert_eq!(ctx.get("value").render(), "['1', 2]");
        assert!(Context::from_json(serde_json::json!([1])).is_err());
    }
}
