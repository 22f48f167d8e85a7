//! Built-in list methods
//!
//! `append`, `extend`, `insert`, `pop`, `remove`, `clear`, `reverse` and
//! `sort` mutate the shared storage in place; `copy` allocates new storage.

use super::{int_arg, Arguments, MethodRegistry, Signature};
use crate::error::{Result, TemplateError};
use crate::value::{compare, ListRef, Value, ValueKind};
use std::cmp::Ordering;

pub fn register(registry: &mut MethodRegistry) {
    let kind = ValueKind::List;
    registry.register(kind, "append", Signature::new().required("item"), append);
    registry.register(kind, "extend", Signature::new().required("items"), extend);
    registry.register(
        kind,
        "insert",
        Signature::new().required("index").required("item"),
        insert,
    );
    registry.register(kind, "pop", Signature::new().optional("index"), pop);
    registry.register(kind, "remove", Signature::new().required("item"), remove);
    registry.register(kind, "clear", Signature::new(), clear);
    registry.register(kind, "index", Signature::new().required("item"), index);
    registry.register(kind, "count", Signature::new().required("item"), count);
    registry.register(kind, "copy", Signature::new(), copy);
    registry.register(kind, "reverse", Signature::new(), reverse);
    registry.register(kind, "sort", Signature::new().keyword("reverse"), sort);
}

fn storage(receiver: &Value) -> Result<&ListRef> {
    match receiver {
        Value::List(items) => Ok(items),
        other => Err(TemplateError::type_error(format!(
            "descriptor requires a 'list' object but received a '{}'",
            other.type_name()
        ))),
    }
}

fn append(receiver: &Value, args: &Arguments) -> Result<Value> {
    let item = args.arg_or_nil(0, "item");
    storage(receiver)?.borrow_mut().push(item);
    Ok(Value::Nil)
}

fn extend(receiver: &Value, args: &Arguments) -> Result<Value> {
    // collected before borrowing mutably: `l.extend(l)` is legal
    let extra = args.arg_or_nil(0, "items").iterate()?;
    storage(receiver)?.borrow_mut().extend(extra);
    Ok(Value::Nil)
}

fn insert(receiver: &Value, args: &Arguments) -> Result<Value> {
    let index = int_arg(args, 0, "index", "insert")?.unwrap_or(0);
    let item = args.arg_or_nil(1, "item");
    let mut items = storage(receiver)?.borrow_mut();
    let n = items.len() as i64;
    let at = if index < 0 { index + n } else { index };
    items.insert(at.clamp(0, n) as usize, item);
    Ok(Value::Nil)
}

fn pop(receiver: &Value, args: &Arguments) -> Result<Value> {
    let index = int_arg(args, 0, "index", "pop")?.unwrap_or(-1);
    let mut items = storage(receiver)?.borrow_mut();
    if items.is_empty() {
        return Err(TemplateError::RuntimeError("pop from empty list".to_string()));
    }
    match crate::index::resolve_index(index, items.len()) {
        Some(pos) => Ok(items.remove(pos)),
        None => Err(TemplateError::RuntimeError("pop index out of range".to_string())),
    }
}

fn position_of(items: &ListRef, item: &Value) -> Option<usize> {
    items.borrow().iter().position(|candidate| candidate == item)
}

fn remove(receiver: &Value, args: &Arguments) -> Result<Value> {
    let items = storage(receiver)?;
    let item = args.arg_or_nil(0, "item");
    match position_of(items, &item) {
        Some(pos) => {
            items.borrow_mut().remove(pos);
            Ok(Value::Nil)
        }
        None => Err(TemplateError::RuntimeError(
            "list.remove(x): x not in list".to_string(),
        )),
    }
}

fn clear(receiver: &Value, _args: &Arguments) -> Result<Value> {
    storage(receiver)?.borrow_mut().clear();
    Ok(Value::Nil)
}

fn index(receiver: &Value, args: &Arguments) -> Result<Value> {
    let item = args.arg_or_nil(0, "item");
    match position_of(storage(receiver)?, &item) {
        Some(pos) => Ok(Value::from(pos)),
        None => Err(TemplateError::RuntimeError(format!(
            "{} is not in list",
            item.render_element()
        ))),
    }
}

fn count(receiver: &Value, args: &Arguments) -> Result<Value> {
    let item = args.arg_or_nil(0, "item");
    let n = storage(receiver)?
        .borrow()
        .iter()
        .filter(|candidate| **candidate == item)
        .count();
    Ok(Value::from(n))
}

fn copy(receiver: &Value, _args: &Arguments) -> Result<Value> {
    storage(receiver)?;
    Ok(receiver.shallow_copy())
}

fn reverse(receiver: &Value, _args: &Arguments) -> Result<Value> {
    storage(receiver)?.borrow_mut().reverse();
    Ok(Value::Nil)
}

fn sort(receiver: &Value, args: &Arguments) -> Result<Value> {
    let descending = args.kwarg("reverse").map_or(false, Value::is_truthy);
    let items = storage(receiver)?;
    let sorted = sorted_values(items.borrow().clone(), descending)?;
    *items.borrow_mut() = sorted;
    Ok(Value::Nil)
}

/// Sort a vector of values, failing on the first incomparable pair
pub fn sorted_values(mut values: Vec<Value>, descending: bool) -> Result<Vec<Value>> {
    let mut failure = None;
    values.sort_by(|a, b| match compare(a, b) {
        Some(ordering) => ordering,
        None => {
            failure.get_or_insert_with(|| {
                TemplateError::type_error(format!(
                    "'<' not supported between instances of '{}' and '{}'",
                    a.type_name(),
                    b.type_name()
                ))
            });
            Ordering::Equal
        }
    });
    if let Some(err) = failure {
        return Err(err);
    }
    if descending {
        values.reverse();
    }
    Ok(values)
}
