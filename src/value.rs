//! Runtime values for Kiln
//!
//! `List` and `Dict` are reference types: cloning a `Value` clones the handle,
//! not the storage, so every alias of a container observes in-place mutation.
//! Independent storage is only produced by explicit copies (`copy()`, slices,
//! literals, `+`).

use crate::ast::MacroDef;
use crate::error::{Result, TemplateError};
use crate::methods::{Arguments, Signature};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

/// Shared list storage
pub type ListRef = Rc<RefCell<Vec<Value>>>;

/// Shared, insertion-ordered dict storage
pub type DictRef = Rc<RefCell<IndexMap<String, Value>>>;

/// Runtime values
#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(ListRef),
    Dict(DictRef),
    Callable(Rc<Function>),
}

/// The closed set of value kinds, used as the method-table key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Nil,
    Bool,
    Int,
    Float,
    String,
    List,
    Dict,
    Callable,
}

impl ValueKind {
    /// Python type name, as it appears in error messages
    pub fn type_name(self) -> &'static str {
        match self {
            ValueKind::Nil => "NoneType",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::String => "str",
            ValueKind::List => "list",
            ValueKind::Dict => "dict",
            ValueKind::Callable => "function",
        }
    }
}

/// Host-implemented callable body
pub type NativeFn = dyn Fn(&Arguments) -> Result<Value>;

pub enum FunctionBody {
    Native(Box<NativeFn>),
    Macro(MacroDef),
}

/// A callable value: a host function, filter, test or template macro.
///
/// Calls are validated against `signature` exactly like built-in methods.
pub struct Function {
    pub name: String,
    pub signature: Signature,
    pub body: FunctionBody,
}

impl Function {
    pub fn native<F>(name: &str, signature: Signature, func: F) -> Self
    where
        F: Fn(&Arguments) -> Result<Value> + 'static,
    {
        Function {
            name: name.to_string(),
            signature,
            body: FunctionBody::Native(Box::new(func)),
        }
    }

    /// Validate `arguments` and run a native body. Macro bodies need an
    /// interpreter and are rejected here.
    pub fn call_native(&self, arguments: &Arguments) -> Result<Value> {
        self.signature.validate(&self.name, arguments)?;
        match &self.body {
            FunctionBody::Native(body) => body(arguments),
            FunctionBody::Macro(_) => Err(TemplateError::RuntimeError(format!(
                "macro '{}' can only be called while rendering",
                self.name
            ))),
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.body {
            FunctionBody::Native(_) => write!(f, "<native fn {}>", self.name),
            FunctionBody::Macro(_) => write!(f, "<macro {}>", self.name),
        }
    }
}

impl Value {
    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn dict(entries: IndexMap<String, Value>) -> Value {
        Value::Dict(Rc::new(RefCell::new(entries)))
    }

    pub fn empty_dict() -> Value {
        Value::dict(IndexMap::new())
    }

    pub fn function(function: Function) -> Value {
        Value::Callable(Rc::new(function))
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Nil => ValueKind::Nil,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::String(_) => ValueKind::String,
            Value::List(_) => ValueKind::List,
            Value::Dict(_) => ValueKind::Dict,
            Value::Callable(_) => ValueKind::Callable,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.kind().type_name()
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Dict(entries) => !entries.borrow().is_empty(),
            Value::Callable(_) => true,
        }
    }

    /// Length of a sized value (characters for strings)
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::String(s) => Some(s.chars().count()),
            Value::List(items) => Some(items.borrow().len()),
            Value::Dict(entries) => Some(entries.borrow().len()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view, accepting booleans as 0/1
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Whether two values denote the same container storage
    pub fn same_storage(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Dict(a), Value::Dict(b)) => Rc::ptr_eq(a, b),
            (Value::Callable(a), Value::Callable(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// New container storage holding the same element references
    pub fn shallow_copy(&self) -> Value {
        match self {
            Value::List(items) => Value::list(items.borrow().clone()),
            Value::Dict(entries) => Value::dict(entries.borrow().clone()),
            other => other.clone(),
        }
    }

    /// The sequence a `for` loop walks: list elements, dict keys in insertion
    /// order or string characters. Nil iterates nothing.
    pub fn iterate(&self) -> Result<Vec<Value>> {
        match self {
            Value::Nil => Ok(Vec::new()),
            Value::List(items) => Ok(items.borrow().clone()),
            Value::Dict(entries) => Ok(entries
                .borrow()
                .keys()
                .map(|k| Value::String(k.clone()))
                .collect()),
            Value::String(s) => Ok(s.chars().map(|c| Value::String(c.to_string())).collect()),
            other => Err(TemplateError::type_error(format!(
                "'{}' object is not iterable",
                other.type_name()
            ))),
        }
    }

    /// Key used when a value indexes or builds a dict
    pub fn to_key(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            other => other.render_element(),
        }
    }

    /// Top-level render form: strings unquoted, nil empty
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.write_top_level(&mut out, &mut Vec::new());
        out
    }

    /// Render form of a value nested inside a list or dict
    pub fn render_element(&self) -> String {
        let mut out = String::new();
        self.write_element(&mut out, &mut Vec::new());
        out
    }

    fn write_top_level(&self, out: &mut String, seen: &mut Vec<*const ()>) {
        match self {
            Value::Nil => {}
            Value::String(s) => out.push_str(s),
            other => other.write_element(out, seen),
        }
    }

    fn write_element(&self, out: &mut String, seen: &mut Vec<*const ()>) {
        match self {
            Value::Nil => out.push_str("None"),
            Value::Bool(true) => out.push_str("True"),
            Value::Bool(false) => out.push_str("False"),
            Value::Int(n) => out.push_str(&n.to_string()),
            Value::Float(f) => out.push_str(&format_float(*f)),
            Value::String(s) => {
                out.push('\'');
                for ch in s.chars() {
                    match ch {
                        '\\' => out.push_str("\\\\"),
                        '\'' => out.push_str("\\'"),
                        '\n' => out.push_str("\\n"),
                        '\t' => out.push_str("\\t"),
                        '\r' => out.push_str("\\r"),
                        c => out.push(c),
                    }
                }
                out.push('\'');
            }
            Value::List(items) => {
                let ptr = Rc::as_ptr(items) as *const ();
                if seen.contains(&ptr) {
                    out.push_str("[...]");
                    return;
                }
                seen.push(ptr);
                out.push('[');
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write_element(out, seen);
                }
                out.push(']');
                seen.pop();
            }
            Value::Dict(entries) => {
                let ptr = Rc::as_ptr(entries) as *const ();
                if seen.contains(&ptr) {
                    out.push_str("{...}");
                    return;
                }
                seen.push(ptr);
                out.push('{');
                for (i, (key, value)) in entries.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    Value::String(key.clone()).write_element(out, seen);
                    out.push_str(": ");
                    value.write_element(out, seen);
                }
                out.push('}');
                seen.pop();
            }
            Value::Callable(function) => {
                out.push_str(&format!("<function {}>", function.name));
            }
        }
    }

    /// Convert to JSON; callables become null
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Nil | Value::Callable(_) => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(n) => serde_json::Value::from(*n),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.borrow().iter().map(Value::to_json).collect())
            }
            Value::Dict(entries) => serde_json::Value::Object(
                entries
                    .borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

/// Ordering between two values, where Python defines one: numbers with
/// numbers, strings with strings, lists element-wise.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::List(x), Value::List(y)) => {
            let (x, y) = (x.borrow(), y.borrow());
            for (left, right) in x.iter().zip(y.iter()) {
                if left != right {
                    return compare(left, right);
                }
            }
            Some(x.len().cmp(&y.len()))
        }
        _ => match (a.as_int(), b.as_int()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => match (a.as_float(), b.as_float()) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => None,
            },
        },
    }
}

/// Python `repr` of a float
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let magnitude = f.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let formatted = format!("{:e}", f);
        return match formatted.split_once('e') {
            Some((mantissa, exponent)) => {
                let (sign, digits) = match exponent.strip_prefix('-') {
                    Some(digits) => ('-', digits),
                    None => ('+', exponent),
                };
                format!("{}e{}{:0>2}", mantissa, sign, digits)
            }
            None => formatted,
        };
    }
    if f.fract() == 0.0 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            }
            (Value::Dict(a), Value::Dict(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter().all(|(k, v)| b.get(k).map_or(false, |other| v == other))
            }
            (Value::Callable(a), Value::Callable(b)) => Rc::ptr_eq(a, b),
            (Value::Float(_), _) | (_, Value::Float(_)) => {
                match (self.as_float(), other.as_float()) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                }
            }
            (a, b) => match (a.as_int(), b.as_int()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Callable(function) => write!(f, "{:?}", function),
            other => f.write_str(&other.render_element()),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Nil
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::list(items)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(entries: IndexMap<String, Value>) -> Self {
        Value::dict(entries)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Nil,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::list(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(entries) => Value::dict(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Value {
        Value::list(vec![
            Value::from("1"),
            Value::from(2),
            Value::from(3),
            Value::from(4),
            Value::from("five"),
        ])
    }

    #[test]
    fn test_top_level_and_element_render() {
        assert_eq!(Value::from("five").render(), "five");
        assert_eq!(Value::from("five").render_element(), "'five'");
        assert_eq!(sample().render(), "['1', 2, 3, 4, 'five']");
        assert_eq!(Value::Nil.render(), "");
        assert_eq!(Value::list(vec![Value::Nil, Value::Bool(true)]).render(), "[None, True]");
    }

    #[test]
    fn test_dict_render_keeps_insertion_order() {
        let mut entries = IndexMap::new();
        entries.insert("z".to_string(), Value::from(1));
        entries.insert("a".to_string(), Value::list(vec![Value::from("x")]));
        assert_eq!(Value::dict(entries).render(), "{'z': 1, 'a': ['x']}");
    }

    #[test]
    fn test_string_escaping_in_elements() {
        let v = Value::list(vec![Value::from("it's")]);
        assert_eq!(v.render(), r"['it\'s']");
    }

    #[test]
    fn test_self_referencing_list() {
        let v = Value::list(vec![Value::from(1)]);
        if let Value::List(items) = &v {
            items.borrow_mut().push(v.clone());
        }
        assert_eq!(v.render(), "[1, [...]]");
        // break the cycle so the test does not leak
        if let Value::List(items) = &v {
            items.borrow_mut().clear();
        }
    }

    #[test]
    fn test_float_format() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(0.5), "0.5");
        assert_eq!(format_float(-2.25), "-2.25");
        assert_eq!(format_float(1e20), "1e+20");
        assert_eq!(format_float(1.5e-7), "1.5e-07");
        assert_eq!(format_float(f64::INFINITY), "inf");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::from(0).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(!Value::list(vec![]).is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(sample().is_truthy());
    }

    #[test]
    fn test_equality() {
        assert_eq!(Value::from(1), Value::from(1.0));
        assert_eq!(Value::Bool(true), Value::from(1));
        assert_ne!(Value::from("1"), Value::from(1));
        assert_eq!(sample(), sample());
        assert_ne!(Value::Nil, Value::from(0));
    }

    #[test]
    fn test_compare() {
        assert_eq!(compare(&Value::from(1), &Value::from(2.5)), Some(Ordering::Less));
        assert_eq!(compare(&Value::from("b"), &Value::from("a")), Some(Ordering::Greater));
        assert_eq!(compare(&Value::from("b"), &Value::from(1)), None);
        let short = Value::list(vec![Value::from(1)]);
        let long = Value::list(vec![Value::from(1), Value::from(0)]);
        assert_eq!(compare(&short, &long), Some(Ordering::Less));
    }

    #[test]
    fn test_clone_shares_storage_and_copy_does_not() {
        let original = sample();
        let alias = original.clone();
        let copy = original.shallow_copy();
        assert!(original.same_storage(&alias));
        assert!(!original.same_storage(&copy));
        if let Value::List(items) = &alias {
            items.borrow_mut().push(Value::from(6));
        }
        assert_eq!(original.len(), Some(6));
        assert_eq!(copy.len(), Some(5));
    }

    #[test]
    fn test_from_json_preserves_key_order() {
        let json: serde_json::Value = serde_json::from_str(r#"{"b": 1, "a": [true, null]}"#).unwrap();
        assert_eq!(Value::from(json).render(), "{'b': 1, 'a': [True, None]}");
    }
}
