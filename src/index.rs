//! Subscript, slice and attribute resolution
//!
//! Out-of-range indexing never fails: it yields `Nil`, which renders empty.
//! Only indexing something that is not a container is an error.

use crate::error::{Result, TemplateError};
use crate::value::Value;

/// `[start:stop]` with unit step; `None` bounds take their defaults
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Slice {
    pub start: Option<i64>,
    pub stop: Option<i64>,
}

impl Slice {
    pub fn new(start: Option<i64>, stop: Option<i64>) -> Self {
        Slice { start, stop }
    }

    /// Resolve against a sequence of length `len`: negative bounds count from
    /// the end, then both are clamped into `[0, len]`.
    pub fn bounds(&self, len: usize) -> (usize, usize) {
        let n = len as i64;
        let clamp = |bound: i64| -> usize {
            let bound = if bound < 0 { bound + n } else { bound };
            bound.clamp(0, n) as usize
        };
        let start = clamp(self.start.unwrap_or(0));
        let stop = clamp(self.stop.unwrap_or(n));
        (start, stop)
    }
}

/// Position of index `i` in a sequence of length `len`, if any
pub fn resolve_index(i: i64, len: usize) -> Option<usize> {
    let n = len as i64;
    let resolved = if i < 0 { n + i } else { i };
    if (0..n).contains(&resolved) {
        Some(resolved as usize)
    } else {
        None
    }
}

/// `container[index]`; an absent index (`container[]`) yields `Nil`
pub fn get_index(container: &Value, index: Option<&Value>) -> Result<Value> {
    let index = match index {
        Some(index) => index,
        None => return Ok(Value::Nil),
    };

    match container {
        Value::List(items) => {
            let i = sequence_index(index, "list")?;
            let items = items.borrow();
            Ok(resolve_index(i, items.len())
                .map(|pos| items[pos].clone())
                .unwrap_or(Value::Nil))
        }
        Value::String(s) => {
            let i = sequence_index(index, "string")?;
            let len = s.chars().count();
            Ok(resolve_index(i, len)
                .and_then(|pos| s.chars().nth(pos))
                .map(|c| Value::String(c.to_string()))
                .unwrap_or(Value::Nil))
        }
        Value::Dict(entries) => Ok(entries
            .borrow()
            .get(&index.to_key())
            .cloned()
            .unwrap_or(Value::Nil)),
        other => Err(not_subscriptable(other)),
    }
}

/// `container[start:stop]`.
///
/// Lists produce a new list with freshly allocated storage whose elements
/// are the same references as the source; strings produce a string.
pub fn get_slice(container: &Value, slice: &Slice) -> Result<Value> {
    match container {
        Value::List(items) => {
            let items = items.borrow();
            let (start, stop) = slice.bounds(items.len());
            if stop <= start {
                return Ok(Value::list(Vec::new()));
            }
            Ok(Value::list(items[start..stop].to_vec()))
        }
        Value::String(s) => {
            let (start, stop) = slice.bounds(s.chars().count());
            if stop <= start {
                return Ok(Value::String(String::new()));
            }
            Ok(Value::String(s.chars().skip(start).take(stop - start).collect()))
        }
        Value::Dict(_) => Err(TemplateError::type_error("'dict' object cannot be sliced")),
        other => Err(not_subscriptable(other)),
    }
}

/// `object.name`: a dict key lookup. Missing keys and attributes of other
/// kinds yield `Nil`; only a `Nil` receiver is an error.
pub fn get_attribute(object: &Value, name: &str) -> Result<Value> {
    match object {
        Value::Dict(entries) => Ok(entries.borrow().get(name).cloned().unwrap_or(Value::Nil)),
        Value::Nil => Err(TemplateError::type_error(format!(
            "'NoneType' object has no attribute '{}'",
            name
        ))),
        _ => Ok(Value::Nil),
    }
}

fn sequence_index(index: &Value, what: &str) -> Result<i64> {
    index.as_int().ok_or_else(|| {
        TemplateError::type_error(format!(
            "{} indices must be integers, not {}",
            what,
            index.type_name()
        ))
    })
}

fn not_subscriptable(value: &Value) -> TemplateError {
    TemplateError::type_error(format!("'{}' object is not subscriptable", value.type_name()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value() -> Value {
        Value::list(vec![
            Value::from("1"),
            Value::from(2),
            Value::from(3),
            Value::from(4),
            Value::from("five"),
        ])
    }

    fn index(i: i64) -> Value {
        get_index(&value(), Some(&Value::from(i))).unwrap()
    }

    fn slice(start: Option<i64>, stop: Option<i64>) -> String {
        get_slice(&value(), &Slice::new(start, stop)).unwrap().render()
    }

    #[test]
    fn test_index_in_range_and_negative() {
        assert_eq!(index(1).render(), "2");
        assert_eq!(index(-2).render(), "4");
        assert_eq!(index(0).render(), "1");
        assert_eq!(index(-5).render(), "1");
    }

    #[test]
    fn test_index_out_of_range_is_nil() {
        assert!(index(256).is_nil());
        assert!(index(5).is_nil());
        assert!(index(-6).is_nil());
        assert!(index(-99).is_nil());
    }

    #[test]
    fn test_every_index_of_every_length() {
        for n in 0..6usize {
            let list = Value::list((0..n as i64).map(Value::from).collect());
            for i in -8i64..8 {
                let got = get_index(&list, Some(&Value::from(i))).unwrap();
                if (0..n as i64).contains(&i) {
                    assert_eq!(got, Value::from(i));
                } else if i < 0 && i >= -(n as i64) {
                    assert_eq!(got, Value::from(n as i64 + i));
                } else {
                    assert!(got.is_nil(), "index {} of length {}", i, n);
                }
            }
        }
    }

    #[test]
    fn test_empty_brackets_yield_nil() {
        assert!(get_index(&value(), None).unwrap().is_nil());
    }

    #[test]
    fn test_slices() {
        assert_eq!(slice(None, None), "['1', 2, 3, 4, 'five']");
        assert_eq!(slice(Some(2), None), "[3, 4, 'five']");
        assert_eq!(slice(None, Some(3)), "['1', 2, 3]");
        assert_eq!(slice(None, Some(-2)), "['1', 2, 3]");
        assert_eq!(slice(Some(-4), None), "[2, 3, 4, 'five']");
        assert_eq!(slice(Some(4), Some(2)), "[]");
        assert_eq!(slice(Some(-100), Some(100)), "['1', 2, 3, 4, 'five']");
    }

    #[test]
    fn test_slice_has_independent_storage() {
        let nested = Value::list(vec![Value::from("x")]);
        let source = Value::list(vec![nested.clone(), Value::from(1)]);
        let sliced = get_slice(&source, &Slice::default()).unwrap();
        assert!(!sliced.same_storage(&source));

        if let Value::List(items) = &sliced {
            items.borrow_mut().push(Value::from(2));
        }
        assert_eq!(source.len(), Some(2));

        if let Value::List(items) = &nested {
            items.borrow_mut().push(Value::from("y"));
        }
        assert_eq!(sliced.render(), "[['x', 'y'], 1, 2]");
        assert_eq!(source.render(), "[['x', 'y'], 1]");
    }

    #[test]
    fn test_string_index_and_slice() {
        let s = Value::from("hello");
        assert_eq!(get_index(&s, Some(&Value::from(-1))).unwrap().render(), "o");
        assert!(get_index(&s, Some(&Value::from(10))).unwrap().is_nil());
        assert_eq!(get_slice(&s, &Slice::new(Some(1), Some(3))).unwrap().render(), "el");
    }

    #[test]
    fn test_non_containers_are_type_errors() {
        let err = get_index(&Value::Nil, Some(&Value::from(0))).unwrap_err();
        assert!(matches!(err, TemplateError::TypeError { .. }));
        assert!(err.to_string().contains("'NoneType' object is not subscriptable"));

        let err = get_slice(&Value::from(3), &Slice::default()).unwrap_err();
        assert!(matches!(err, TemplateError::TypeError { .. }));

        let err = get_index(&value(), Some(&Value::from("a"))).unwrap_err();
        assert!(err.to_string().contains("list indices must be integers, not str"));
    }

    #[test]
    fn test_dict_index_and_attribute() {
        let dict: Value = serde_json::json!({"nested": [1, 2], "1": "one"}).into();
        assert_eq!(get_attribute(&dict, "nested").unwrap().render(), "[1, 2]");
        assert!(get_attribute(&dict, "missing").unwrap().is_nil());
        assert_eq!(get_index(&dict, Some(&Value::from(1))).unwrap().render(), "one");
        assert!(get_attribute(&Value::Nil, "x").is_err());
    }
}
