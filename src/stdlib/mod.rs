//! Built-in filters, tests and globals
//!
//! Each module provides an `init()` with its default content:
//! ```jinja
//! {{ items | join(', ') }}        {# filters #}
//! {% if n is divisibleby 3 %}     {# tests (see `predicates`) #}
//! {% for i in range(3) %}         {# globals #}
//! ```
//! Hosts extend any of them through [`crate::Environment`].

pub mod filters;
pub mod globals;
pub mod predicates;

use crate::error::Result;
use crate::methods::{Arguments, Signature};
use crate::value::{Function, Value};
use std::collections::HashMap;
use std::rc::Rc;

/// Named callables looked up from template expressions
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: HashMap<String, Rc<Function>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Register `function` under its own name, replacing any previous entry
    pub fn register(&mut self, function: Function) {
        self.entries.insert(function.name.clone(), Rc::new(function));
    }

    /// Register a native closure
    pub fn register_fn<F>(&mut self, name: &str, signature: Signature, func: F)
    where
        F: Fn(&Arguments) -> Result<Value> + 'static,
    {
        self.register(Function::native(name, signature, func));
    }

    pub fn lookup(&self, name: &str) -> Option<Rc<Function>> {
        self.entries.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The value a filter or test is applied to
pub(crate) fn input(args: &Arguments) -> Value {
    args.arg_or_nil(0, "value")
}

#[cfg(test)]
mod registry_tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = Registry::new();
        registry.register_fn("shout", Signature::new().required("value"), |args| {
            Ok(Value::from(input(args).render().to_uppercase()))
        });
        let shout = registry.lookup("shout").unwrap();
        assert_eq!(shout.name, "shout");
        assert!(registry.lookup("whisper").is_none());
        assert_eq!(registry.names(), vec!["shout"]);
    }

    #[test]
    fn test_later_registration_replaces() {
        let mut registry = Registry::new();
        registry.register_fn("f", Signature::new(), |_| Ok(Value::from(1)));
        registry.register_fn("f", Signature::new(), |_| Ok(Value::from(2)));
        assert_eq!(registry.len(), 1);
    }
}
