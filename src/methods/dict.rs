//! Built-in dict methods

use super::{Arguments, MethodRegistry, Signature};
use crate::error::{Result, TemplateError};
use crate::value::{DictRef, Value, ValueKind};

pub fn register(registry: &mut MethodRegistry) {
    let kind = ValueKind::Dict;
    registry.register(kind, "keys", Signature::new(), keys);
    registry.register(kind, "values", Signature::new(), values);
    registry.register(kind, "items", Signature::new(), items);
    registry.register(
        kind,
        "get",
        Signature::new().required("key").optional("default"),
        get,
    );
    registry.register(kind, "copy", Signature::new(), copy);
    registry.register(
        kind,
        "update",
        Signature::new().optional("other").any_keyword(),
        update,
    );
    registry.register(
        kind,
        "pop",
        Signature::new().required("key").optional("default"),
        pop,
    );
    registry.register(
        kind,
        "setdefault",
        Signature::new().required("key").optional("default"),
        setdefault,
    );
    registry.register(kind, "clear", Signature::new(), clear);
}

fn storage(receiver: &Value) -> Result<&DictRef> {
    match receiver {
        Value::Dict(entries) => Ok(entries),
        other => Err(TemplateError::type_error(format!(
            "descriptor requires a 'dict' object but received a '{}'",
            other.type_name()
        ))),
    }
}

fn keys(receiver: &Value, _args: &Arguments) -> Result<Value> {
    let keys = storage(receiver)?
        .borrow()
        .keys()
        .map(|k| Value::String(k.clone()))
        .collect();
    Ok(Value::list(keys))
}

fn values(receiver: &Value, _args: &Arguments) -> Result<Value> {
    let values = storage(receiver)?.borrow().values().cloned().collect();
    Ok(Value::list(values))
}

/// `[[key, value], ...]`, ready for `for k, v in d.items()`
fn items(receiver: &Value, _args: &Arguments) -> Result<Value> {
    let pairs = storage(receiver)?
        .borrow()
        .iter()
        .map(|(k, v)| Value::list(vec![Value::String(k.clone()), v.clone()]))
        .collect();
    Ok(Value::list(pairs))
}

fn get(receiver: &Value, args: &Arguments) -> Result<Value> {
    let key = args.arg_or_nil(0, "key").to_key();
    let found = storage(receiver)?.borrow().get(&key).cloned();
    Ok(found.unwrap_or_else(|| args.arg_or_nil(1, "default")))
}

fn copy(receiver: &Value, _args: &Arguments) -> Result<Value> {
    storage(receiver)?;
    Ok(receiver.shallow_copy())
}

fn update(receiver: &Value, args: &Arguments) -> Result<Value> {
    let entries = storage(receiver)?;
    let mut incoming: Vec<(String, Value)> = match args.get(0) {
        None | Some(Value::Nil) => Vec::new(),
        Some(Value::Dict(other)) => other
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        Some(Value::List(pairs)) => {
            let mut collected = Vec::new();
            for pair in pairs.borrow().iter() {
                match pair {
                    Value::List(kv) if kv.borrow().len() == 2 => {
                        let kv = kv.borrow();
                        collected.push((kv[0].to_key(), kv[1].clone()));
                    }
                    other => {
                        return Err(TemplateError::type_error(format!(
                            "cannot convert dictionary update sequence element of type '{}'",
                            other.type_name()
                        )))
                    }
                }
            }
            collected
        }
        Some(other) => {
            return Err(TemplateError::type_error(format!(
                "'{}' object is not iterable as key/value pairs",
                other.type_name()
            )))
        }
    };
    incoming.extend(args.keyword.iter().map(|(k, v)| (k.clone(), v.clone())));

    let mut entries = entries.borrow_mut();
    for (key, value) in incoming {
        entries.insert(key, value);
    }
    Ok(Value::Nil)
}

fn pop(receiver: &Value, args: &Arguments) -> Result<Value> {
    let key = args.arg_or_nil(0, "key").to_key();
    let removed = storage(receiver)?.borrow_mut().shift_remove(&key);
    match (removed, args.arg(1, "default")) {
        (Some(value), _) => Ok(value),
        (None, Some(default)) => Ok(default.clone()),
        (None, None) => Err(TemplateError::RuntimeError(format!("KeyError: '{}'", key))),
    }
}

fn setdefault(receiver: &Value, args: &Arguments) -> Result<Value> {
    let key = args.arg_or_nil(0, "key").to_key();
    let default = args.arg_or_nil(1, "default");
    let mut entries = storage(receiver)?.borrow_mut();
    let value = entries.entry(key).or_insert(default).clone();
    Ok(value)
}

fn clear(receiver: &Value, _args: &Arguments) -> Result<Value> {
    storage(receiver)?.borrow_mut().clear();
    Ok(Value::Nil)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::methods::MethodCall;

    fn dispatch(receiver: &Value, name: &str, positional: Vec<Value>) -> Result<Value> {
        MethodRegistry::with_builtins()
            .dispatch(receiver, &MethodCall::new(name, Arguments::new(positional)))
    }

    fn sample() -> Value {
        serde_json::json!({"a": 1, "b": [1, 2]}).into()
    }

    #[test]
    fn test_keys_values_items() {
        let d = sample();
        assert_eq!(dispatch(&d, "keys", vec![]).unwrap().render(), "['a', 'b']");
        assert_eq!(dispatch(&d, "values", vec![]).unwrap().render(), "[1, [1, 2]]");
        assert_eq!(
            dispatch(&d, "items", vec![]).unwrap().render(),
            "[['a', 1], ['b', [1, 2]]]"
        );
    }

    #[test]
    fn test_values_alias_the_stored_containers() {
        let d = sample();
        let values = dispatch(&d, "values", vec![]).unwrap();
        let nested = crate::index::get_index(&values, Some(&Value::from(1))).unwrap();
        dispatch(&nested, "append", vec![Value::from(3)]).unwrap();
        assert_eq!(d.render(), "{'a': 1, 'b': [1, 2, 3]}");
    }

    #[test]
    fn test_get_with_default() {
        let d = sample();
        assert_eq!(dispatch(&d, "get", vec![Value::from("a")]).unwrap(), Value::from(1));
        assert!(dispatch(&d, "get", vec![Value::from("z")]).unwrap().is_nil());
        assert_eq!(
            dispatch(&d, "get", vec![Value::from("z"), Value::from("x")]).unwrap(),
            Value::from("x")
        );
    }

    #[test]
    fn test_update_from_dict_and_keywords() {
        let d = sample();
        let call = MethodCall::new(
            "update",
            Arguments::new(vec![serde_json::json!({"a": 9, "c": 3}).into()])
                .with_keyword("d", Value::from(4)),
        );
        MethodRegistry::with_builtins().dispatch(&d, &call).unwrap();
        assert_eq!(d.render(), "{'a': 9, 'b': [1, 2], 'c': 3, 'd': 4}");
    }

    #[test]
    fn test_update_with_itself() {
        let d = sample();
        dispatch(&d, "update", vec![d.clone()]).unwrap();
        assert_eq!(d.len(), Some(2));
    }

    #[test]
    fn test_pop_and_setdefault() {
        let d = sample();
        assert_eq!(dispatch(&d, "pop", vec![Value::from("a")]).unwrap(), Value::from(1));
        assert!(dispatch(&d, "pop", vec![Value::from("a")]).is_err());
        assert_eq!(
            dispatch(&d, "pop", vec![Value::from("a"), Value::from(0)]).unwrap(),
            Value::from(0)
        );
        assert_eq!(
            dispatch(&d, "setdefault", vec![Value::from("n"), Value::from(5)]).unwrap(),
            Value::from(5)
        );
        assert_eq!(d.render(), "{'b': [1, 2], 'n': 5}");
    }
}
