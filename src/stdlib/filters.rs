//! Default filters (`value | name(args)`)
//!
//! A filter receives the piped value as its first positional argument.

use super::{input, Registry};
use crate::error::{Result, TemplateError};
use crate::methods::list::sorted_values;
use crate::methods::string::{capitalize_str, title_str};
use crate::methods::{Arguments, Signature};
use crate::value::Value;

/// Initialize the default filter set
pub fn init() -> Registry {
    let mut filters = Registry::new();
    let unary = || Signature::new().required("value");

    // length(value) -> Int
    filters.register_fn("length", unary(), length);
    filters.register_fn("count", unary(), length);

    filters.register_fn("upper", unary(), |args| {
        Ok(Value::from(input(args).render().to_uppercase()))
    });
    filters.register_fn("lower", unary(), |args| {
        Ok(Value::from(input(args).render().to_lowercase()))
    });
    filters.register_fn("title", unary(), |args| {
        Ok(Value::from(title_str(&input(args).render())))
    });
    filters.register_fn("capitalize", unary(), |args| {
        Ok(Value::from(capitalize_str(&input(args).render())))
    });

    // trim(value, chars=None) -> String
    filters.register_fn(
        "trim",
        unary().optional("chars").keyword("chars"),
        |args| {
            let text = input(args).render();
            let trimmed = match args.arg(1, "chars") {
                Some(Value::String(chars)) => text.trim_matches(|c: char| chars.contains(c)),
                _ => text.trim(),
            };
            Ok(Value::from(trimmed))
        },
    );

    // join(value, d='') -> String
    filters.register_fn("join", unary().optional("d").keyword("d"), |args| {
        let separator = args.arg(1, "d").map(Value::render).unwrap_or_default();
        let parts: Vec<String> = input(args).iterate()?.iter().map(Value::render).collect();
        Ok(Value::from(parts.join(&separator)))
    });

    // default(value, default_value='', boolean=False), also as `d`
    let defaulting = || {
        Signature::new()
            .required("value")
            .optional("default_value")
            .keyword("default_value")
            .keyword("boolean")
    };
    filters.register_fn("default", defaulting(), default);
    filters.register_fn("d", defaulting(), default);

    filters.register_fn("first", unary(), |args| {
        Ok(input(args).iterate()?.into_iter().next().unwrap_or(Value::Nil))
    });
    filters.register_fn("last", unary(), |args| {
        Ok(input(args).iterate()?.pop().unwrap_or(Value::Nil))
    });

    // reverse(value): a new list, or the reversed string
    filters.register_fn("reverse", unary(), |args| match input(args) {
        Value::String(s) => Ok(Value::from(s.chars().rev().collect::<String>())),
        other => {
            let mut items = other.iterate()?;
            items.reverse();
            Ok(Value::list(items))
        }
    });

    filters.register_fn("list", unary(), |args| Ok(Value::list(input(args).iterate()?)));
    filters.register_fn("string", unary(), |args| Ok(Value::from(input(args).render())));

    // int(value, default=0)
    filters.register_fn(
        "int",
        unary().optional("default").keyword("default"),
        |args| {
            let fallback = args.arg(1, "default").cloned().unwrap_or(Value::Int(0));
            Ok(to_int(&input(args)).map(Value::Int).unwrap_or(fallback))
        },
    );

    // float(value, default=0.0)
    filters.register_fn(
        "float",
        unary().optional("default").keyword("default"),
        |args| {
            let fallback = args.arg(1, "default").cloned().unwrap_or(Value::Float(0.0));
            Ok(to_float(&input(args)).map(Value::Float).unwrap_or(fallback))
        },
    );

    filters.register_fn("abs", unary(), |args| match input(args) {
        Value::Int(n) => n
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| TemplateError::RuntimeError("integer overflow in abs()".to_string())),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        Value::Bool(b) => Ok(Value::Int(b as i64)),
        other => Err(TemplateError::type_error(format!(
            "bad operand type for abs(): '{}'",
            other.type_name()
        ))),
    });

    // sort(value, reverse=False): a new sorted list
    filters.register_fn(
        "sort",
        unary().optional("reverse").keyword("reverse"),
        |args| {
            let descending = args.arg(1, "reverse").map_or(false, Value::is_truthy);
            Ok(Value::list(sorted_values(input(args).iterate()?, descending)?))
        },
    );

    // tojson(value, indent=None)
    filters.register_fn(
        "tojson",
        unary().optional("indent").keyword("indent"),
        |args| {
            let json = input(args).to_json();
            let text = match args.arg(1, "indent") {
                None | Some(Value::Nil) => serde_json::to_string(&json),
                Some(_) => serde_json::to_string_pretty(&json),
            }
            .map_err(|e| TemplateError::RuntimeError(e.to_string()))?;
            Ok(Value::from(text))
        },
    );

    filters
}

fn length(args: &Arguments) -> Result<Value> {
    let value = input(args);
    if value.is_nil() {
        return Ok(Value::Int(0));
    }
    value.len().map(Value::from).ok_or_else(|| {
        TemplateError::type_error(format!(
            "object of type '{}' has no len()",
            value.type_name()
        ))
    })
}

fn default(args: &Arguments) -> Result<Value> {
    let value = input(args);
    let boolean = args.kwarg("boolean").map_or(false, Value::is_truthy);
    if value.is_nil() || (boolean && !value.is_truthy()) {
        Ok(args
            .arg(1, "default_value")
            .cloned()
            .unwrap_or_else(|| Value::from("")))
    } else {
        Ok(value)
    }
}

fn to_int(value: &Value) -> Option<i64> {
    match value {
        Value::Int(n) => Some(*n),
        Value::Bool(b) => Some(*b as i64),
        Value::Float(f) if f.is_finite() => Some(f.trunc() as i64),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
        }
        _ => None,
    }
}

fn to_float(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        other => other.as_float(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(name: &str, positional: Vec<Value>) -> Result<Value> {
        init()
            .lookup(name)
            .unwrap()
            .call_native(&Arguments::new(positional))
    }

    fn list(items: &[i64]) -> Value {
        Value::list(items.iter().map(|n| Value::from(*n)).collect())
    }

    #[test]
    fn test_length() {
        assert_eq!(apply("length", vec![list(&[1, 2, 3])]).unwrap(), Value::from(3));
        assert_eq!(apply("count", vec![Value::from("héllo")]).unwrap(), Value::from(5));
        assert_eq!(apply("length", vec![Value::Nil]).unwrap(), Value::from(0));
        assert!(apply("length", vec![Value::from(3)]).is_err());
    }

    #[test]
    fn test_string_filters() {
        assert_eq!(apply("upper", vec![Value::from("abc")]).unwrap().render(), "ABC");
        assert_eq!(apply("title", vec![Value::from("a tale")]).unwrap().render(), "A Tale");
        assert_eq!(apply("trim", vec![Value::from("  x ")]).unwrap().render(), "x");
        assert_eq!(apply("string", vec![list(&[1])]).unwrap().render(), "[1]");
    }

    #[test]
    fn test_join() {
        let items = Value::list(vec![Value::from("a"), Value::from(1), Value::from(2.5)]);
        assert_eq!(
            apply("join", vec![items, Value::from(", ")]).unwrap().render(),
            "a, 1, 2.5"
        );
    }

    #[test]
    fn test_default() {
        assert_eq!(
            apply("default", vec![Value::Nil, Value::from("fallback")]).unwrap().render(),
            "fallback"
        );
        assert_eq!(
            apply("default", vec![Value::from(""), Value::from("fallback")]).unwrap().render(),
            ""
        );
        let call = Arguments::new(vec![Value::from(""), Value::from("fallback")])
            .with_keyword("boolean", Value::Bool(true));
        let default = init().lookup("default").unwrap();
        assert_eq!(default.call_native(&call).unwrap().render(), "fallback");
    }

    #[test]
    fn test_first_last_reverse() {
        assert_eq!(apply("first", vec![list(&[4, 5])]).unwrap(), Value::from(4));
        assert_eq!(apply("last", vec![list(&[4, 5])]).unwrap(), Value::from(5));
        assert!(apply("first", vec![list(&[])]).unwrap().is_nil());

        let source = list(&[1, 2, 3]);
        let reversed = apply("reverse", vec![source.clone()]).unwrap();
        assert_eq!(reversed.render(), "[3, 2, 1]");
        assert_eq!(source.render(), "[1, 2, 3]");
        assert_eq!(apply("reverse", vec![Value::from("abc")]).unwrap().render(), "cba");
    }

    #[test]
    fn test_numeric_conversions() {
        assert_eq!(apply("int", vec![Value::from("42")]).unwrap(), Value::from(42));
        assert_eq!(apply("int", vec![Value::from("4.7")]).unwrap(), Value::from(4));
        assert_eq!(apply("int", vec![Value::from("x")]).unwrap(), Value::from(0));
        assert_eq!(apply("float", vec![Value::from("1.5")]).unwrap(), Value::from(1.5));
        assert_eq!(apply("abs", vec![Value::from(-3)]).unwrap(), Value::from(3));
        assert!(apply("abs", vec![Value::from("x")]).is_err());
    }

    #[test]
    fn test_sort_and_tojson() {
        assert_eq!(apply("sort", vec![list(&[3, 1, 2])]).unwrap().render(), "[1, 2, 3]");
        let data: Value = serde_json::json!({"b": [1, null], "a": "x"}).into();
        assert_eq!(
            apply("tojson", vec![data]).unwrap().render(),
            r#"{"b":[1,null],"a":"x"}"#
        );
    }

    #[test]
    fn test_filter_arguments_are_validated() {
        let err = apply("upper", vec![Value::from("a"), Value::from("b")]).unwrap_err();
        assert!(err
            .to_string()
            .contains("upper() received 1 unexpected positional argument"));
    }
}
