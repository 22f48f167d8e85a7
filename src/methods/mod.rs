//! Built-in method registry
//!
//! Methods are registered per value kind and keyed by name. Every entry
//! declares a [`Signature`]; calls are validated against it before the method
//! body runs, so bodies can assume their required arguments are present.
//!
//! Dispatch order:
//! 1. unknown `(kind, name)` is an `AttributeError`
//! 2. too many positional arguments is an `ArgumentError` reporting the excess
//! 3. the first undeclared keyword is an `ArgumentError` naming it
//! 4. missing required arguments are an `ArgumentError`

pub mod dict;
pub mod list;
pub mod string;

use crate::error::{Result, TemplateError};
use crate::value::{Value, ValueKind};
use indexmap::IndexMap;
use std::collections::HashMap;

/// A declared parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub required: bool,
}

/// Declared calling convention of a method or callable
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    /// Named positional parameters, required ones first
    pub params: Vec<Param>,
    /// Extra unnamed positional arguments are permitted
    pub variadic: bool,
    /// Accepted keyword names
    pub keywords: Vec<String>,
    /// Any keyword name is accepted (`**kwargs`)
    pub any_keyword: bool,
}

impl Signature {
    pub fn new() -> Self {
        Signature::default()
    }

    pub fn required(mut self, name: &str) -> Self {
        self.params.push(Param {
            name: name.to_string(),
            required: true,
        });
        self
    }

    pub fn optional(mut self, name: &str) -> Self {
        self.params.push(Param {
            name: name.to_string(),
            required: false,
        });
        self
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    pub fn keyword(mut self, name: &str) -> Self {
        self.keywords.push(name.to_string());
        self
    }

    pub fn any_keyword(mut self) -> Self {
        self.any_keyword = true;
        self
    }

    pub fn max_positional(&self) -> usize {
        self.params.len()
    }

    fn accepts_keyword(&self, name: &str) -> bool {
        self.any_keyword || self.keywords.iter().any(|k| k == name)
    }

    /// Check a call's arguments. `callee` prefixes every message, e.g.
    /// `append() received 1 unexpected keyword argument: 'foo'`.
    pub fn validate(&self, callee: &str, arguments: &Arguments) -> Result<()> {
        let given = arguments.positional.len();
        let max = self.max_positional();
        if given > max && !self.variadic {
            let excess = given - max;
            return Err(TemplateError::argument_error(format!(
                "{}() received {} unexpected positional argument{}",
                callee,
                excess,
                if excess == 1 { "" } else { "s" }
            )));
        }

        if let Some(name) = arguments
            .keyword
            .keys()
            .find(|name| !self.accepts_keyword(name))
        {
            return Err(TemplateError::argument_error(format!(
                "{}() received 1 unexpected keyword argument: '{}'",
                callee, name
            )));
        }

        for (i, param) in self.params.iter().enumerate() {
            if param.required && i >= given && !arguments.keyword.contains_key(&param.name) {
                return Err(TemplateError::argument_error(format!(
                    "{}() missing required argument: '{}'",
                    callee, param.name
                )));
            }
        }

        Ok(())
    }
}

/// Evaluated call-site arguments
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    pub positional: Vec<Value>,
    pub keyword: IndexMap<String, Value>,
}

impl Arguments {
    pub fn new(positional: Vec<Value>) -> Self {
        Arguments {
            positional,
            keyword: IndexMap::new(),
        }
    }

    pub fn with_keyword(mut self, name: &str, value: Value) -> Self {
        self.keyword.insert(name.to_string(), value);
        self
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    pub fn kwarg(&self, name: &str) -> Option<&Value> {
        self.keyword.get(name)
    }

    /// Positional argument `index`, falling back to keyword `name`
    pub fn arg(&self, index: usize, name: &str) -> Option<&Value> {
        self.get(index).or_else(|| self.kwarg(name))
    }

    /// Like [`Arguments::arg`], but a missing argument reads as `Nil`
    pub fn arg_or_nil(&self, index: usize, name: &str) -> Value {
        self.arg(index, name).cloned().unwrap_or(Value::Nil)
    }
}

/// A method invocation built at the call site and consumed by dispatch
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub name: String,
    pub arguments: Arguments,
}

impl MethodCall {
    pub fn new(name: &str, arguments: Arguments) -> Self {
        MethodCall {
            name: name.to_string(),
            arguments,
        }
    }
}

/// Method body: receiver plus validated arguments
pub type MethodFn = fn(&Value, &Arguments) -> Result<Value>;

#[derive(Clone)]
pub struct Method {
    pub signature: Signature,
    pub func: MethodFn,
}

impl std::fmt::Debug for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Method")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// Table of built-in methods keyed by `(kind, name)`
#[derive(Debug, Clone, Default)]
pub struct MethodRegistry {
    methods: HashMap<(ValueKind, String), Method>,
}

impl MethodRegistry {
    /// An empty registry
    pub fn new() -> Self {
        MethodRegistry::default()
    }

    /// A registry holding the list, dict and string built-ins
    pub fn with_builtins() -> Self {
        let mut registry = MethodRegistry::new();
        list::register(&mut registry);
        dict::register(&mut registry);
        string::register(&mut registry);
        registry
    }

    pub fn register(&mut self, kind: ValueKind, name: &str, signature: Signature, func: MethodFn) {
        self.methods
            .insert((kind, name.to_string()), Method { signature, func });
    }

    pub fn lookup(&self, kind: ValueKind, name: &str) -> Option<&Method> {
        self.methods.get(&(kind, name.to_string()))
    }

    pub fn contains(&self, kind: ValueKind, name: &str) -> bool {
        self.lookup(kind, name).is_some()
    }

    /// Names registered for a kind, sorted
    pub fn names(&self, kind: ValueKind) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .methods
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, name)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// Validate and execute `call` against `receiver`
    pub fn dispatch(&self, receiver: &Value, call: &MethodCall) -> Result<Value> {
        let method = self.lookup(receiver.kind(), &call.name).ok_or_else(|| {
            TemplateError::attribute_error(format!(
                "'{}' object has no attribute '{}'",
                receiver.type_name(),
                call.name
            ))
        })?;
        tracing::trace!(
            receiver = receiver.type_name(),
            method = %call.name,
            args = call.arguments.positional.len(),
            "dispatching method"
        );
        method.signature.validate(&call.name, &call.arguments)?;
        (method.func)(receiver, &call.arguments)
    }
}

/// String argument `index`/`name`, or a TypeError naming the method
pub(crate) fn str_arg<'a>(
    arguments: &'a Arguments,
    index: usize,
    name: &str,
    method: &str,
) -> Result<Option<&'a str>> {
    match arguments.arg(index, name) {
        None | Some(Value::Nil) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(TemplateError::type_error(format!(
            "{}() argument '{}' must be str, not {}",
            method,
            name,
            other.type_name()
        ))),
    }
}

/// Integer argument `index`/`name`, or a TypeError naming the method
pub(crate) fn int_arg(
    arguments: &Arguments,
    index: usize,
    name: &str,
    method: &str,
) -> Result<Option<i64>> {
    match arguments.arg(index, name) {
        None | Some(Value::Nil) => Ok(None),
        Some(value) => value.as_int().map(Some).ok_or_else(|| {
            TemplateError::type_error(format!(
                "{}() argument '{}' must be int, not {}",
                method,
                name,
                value.type_name()
            ))
        }),
    }
}
