//! Built-in string methods

use super::{int_arg, str_arg, Arguments, MethodRegistry, Signature};
use crate::error::{Result, TemplateError};
use crate::value::{Value, ValueKind};

pub fn register(registry: &mut MethodRegistry) {
    let kind = ValueKind::String;
    registry.register(kind, "upper", Signature::new(), upper);
    registry.register(kind, "lower", Signature::new(), lower);
    registry.register(kind, "capitalize", Signature::new(), capitalize);
    registry.register(kind, "title", Signature::new(), title);
    registry.register(kind, "strip", Signature::new().optional("chars"), strip);
    registry.register(kind, "lstrip", Signature::new().optional("chars"), lstrip);
    registry.register(kind, "rstrip", Signature::new().optional("chars"), rstrip);
    registry.register(
        kind,
        "split",
        Signature::new()
            .optional("sep")
            .optional("maxsplit")
            .keyword("sep")
            .keyword("maxsplit"),
        split,
    );
    registry.register(kind, "startswith", Signature::new().required("prefix"), startswith);
    registry.register(kind, "endswith", Signature::new().required("suffix"), endswith);
    registry.register(
        kind,
        "replace",
        Signature::new().required("old").required("new").optional("count"),
        replace,
    );
    registry.register(kind, "find", Signature::new().required("sub"), find);
    registry.register(kind, "count", Signature::new().required("sub"), count);
    registry.register(kind, "join", Signature::new().required("items"), join);
}

fn text(receiver: &Value) -> Result<&str> {
    receiver.as_str().ok_or_else(|| {
        TemplateError::type_error(format!(
            "descriptor requires a 'str' object but received a '{}'",
            receiver.type_name()
        ))
    })
}

fn upper(receiver: &Value, _args: &Arguments) -> Result<Value> {
    Ok(Value::from(text(receiver)?.to_uppercase()))
}

fn lower(receiver: &Value, _args: &Arguments) -> Result<Value> {
    Ok(Value::from(text(receiver)?.to_lowercase()))
}

/// First character upper-cased, the rest lower-cased
pub fn capitalize_str(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
        None => String::new(),
    }
}

/// Every run of letters starts upper-case, continues lower-case
pub fn title_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if in_word {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(ch);
            in_word = false;
        }
    }
    out
}

fn capitalize(receiver: &Value, _args: &Arguments) -> Result<Value> {
    Ok(Value::from(capitalize_str(text(receiver)?)))
}

fn title(receiver: &Value, _args: &Arguments) -> Result<Value> {
    Ok(Value::from(title_str(text(receiver)?)))
}

#[derive(Clone, Copy)]
enum Side {
    Both,
    Left,
    Right,
}

fn strip_with(receiver: &Value, args: &Arguments, side: Side, method: &str) -> Result<Value> {
    let s = text(receiver)?;
    let chars = str_arg(args, 0, "chars", method)?;
    let matches = |c: char| match chars {
        Some(set) => set.contains(c),
        None => c.is_whitespace(),
    };
    let stripped = match side {
        Side::Both => s.trim_matches(matches),
        Side::Left => s.trim_start_matches(matches),
        Side::Right => s.trim_end_matches(matches),
    };
    Ok(Value::from(stripped))
}

fn strip(receiver: &Value, args: &Arguments) -> Result<Value> {
    strip_with(receiver, args, Side::Both, "strip")
}

fn lstrip(receiver: &Value, args: &Arguments) -> Result<Value> {
    strip_with(receiver, args, Side::Left, "lstrip")
}

fn rstrip(receiver: &Value, args: &Arguments) -> Result<Value> {
    strip_with(receiver, args, Side::Right, "rstrip")
}

fn split(receiver: &Value, args: &Arguments) -> Result<Value> {
    let s = text(receiver)?;
    let sep = str_arg(args, 0, "sep", "split")?;
    let maxsplit = int_arg(args, 1, "maxsplit", "split")?.unwrap_or(-1);

    let parts: Vec<String> = match sep {
        Some("") => {
            return Err(TemplateError::RuntimeError("empty separator".to_string()));
        }
        Some(sep) if maxsplit < 0 => s.split(sep).map(str::to_string).collect(),
        Some(sep) => s
            .splitn(maxsplit as usize + 1, sep)
            .map(str::to_string)
            .collect(),
        None => split_whitespace(s, maxsplit),
    };
    Ok(Value::list(parts.into_iter().map(Value::from).collect()))
}

/// Python's separator-less split: runs of whitespace separate, leading
/// whitespace is dropped, and after `maxsplit` splits the rest is kept whole.
fn split_whitespace(s: &str, maxsplit: i64) -> Vec<String> {
    if maxsplit < 0 {
        return s.split_whitespace().map(str::to_string).collect();
    }
    let mut parts = Vec::new();
    let mut rest = s.trim_start();
    while !rest.is_empty() {
        if parts.len() as i64 == maxsplit {
            parts.push(rest.to_string());
            break;
        }
        match rest.find(char::is_whitespace) {
            Some(end) => {
                parts.push(rest[..end].to_string());
                rest = rest[end..].trim_start();
            }
            None => {
                parts.push(rest.to_string());
                break;
            }
        }
    }
    parts
}

fn startswith(receiver: &Value, args: &Arguments) -> Result<Value> {
    let s = text(receiver)?;
    let prefix = str_arg(args, 0, "prefix", "startswith")?.unwrap_or_default();
    Ok(Value::Bool(s.starts_with(prefix)))
}

fn endswith(receiver: &Value, args: &Arguments) -> Result<Value> {
    let s = text(receiver)?;
    let suffix = str_arg(args, 0, "suffix", "endswith")?.unwrap_or_default();
    Ok(Value::Bool(s.ends_with(suffix)))
}

fn replace(receiver: &Value, args: &Arguments) -> Result<Value> {
    let s = text(receiver)?;
    let old = str_arg(args, 0, "old", "replace")?.unwrap_or_default();
    let new = str_arg(args, 1, "new", "replace")?.unwrap_or_default();
    let replaced = match int_arg(args, 2, "count", "replace")? {
        Some(count) if count >= 0 => s.replacen(old, new, count as usize),
        _ => s.replace(old, new),
    };
    Ok(Value::from(replaced))
}

fn find(receiver: &Value, args: &Arguments) -> Result<Value> {
    let s = text(receiver)?;
    let sub = str_arg(args, 0, "sub", "find")?.unwrap_or_default();
    let position = s
        .find(sub)
        .map(|byte| s[..byte].chars().count() as i64)
        .unwrap_or(-1);
    Ok(Value::Int(position))
}

fn count(receiver: &Value, args: &Arguments) -> Result<Value> {
    let s = text(receiver)?;
    let sub = str_arg(args, 0, "sub", "count")?.unwrap_or_default();
    let n = if sub.is_empty() {
        s.chars().count() + 1
    } else {
        s.matches(sub).count()
    };
    Ok(Value::from(n))
}

fn join(receiver: &Value, args: &Arguments) -> Result<Value> {
    let sep = text(receiver)?;
    let items = args.arg_or_nil(0, "items").iterate()?;
    let mut parts = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        match item {
            Value::String(s) => parts.push(s.as_str()),
            other => {
                return Err(TemplateError::type_error(format!(
                    "sequence item {}: expected str instance, {} found",
                    i,
                    other.type_name()
                )))
            }
        }
    }
    Ok(Value::from(parts.join(sep)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::methods::MethodCall;

    fn dispatch(receiver: &str, name: &str, positional: Vec<Value>) -> Result<Value> {
        MethodRegistry::with_builtins().dispatch(
            &Value::from(receiver),
            &MethodCall::new(name, Arguments::new(positional)),
        )
    }

    fn render(receiver: &str, name: &str, positional: Vec<Value>) -> String {
        dispatch(receiver, name, positional).unwrap().render()
    }

    #[test]
    fn test_case_conversions() {
        assert_eq!(render("Hello", "upper", vec![]), "HELLO");
        assert_eq!(render("Hello", "lower", vec![]), "hello");
        assert_eq!(render("hELLO world", "capitalize", vec![]), "Hello world");
        assert_eq!(render("hello big world", "title", vec![]), "Hello Big World");
    }

    #[test]
    fn test_strip_variants() {
        assert_eq!(render("  pad  ", "strip", vec![]), "pad");
        assert_eq!(render("xxpadxx", "lstrip", vec![Value::from("x")]), "padxx");
        assert_eq!(render("xxpadxx", "rstrip", vec![Value::from("x")]), "xxpad");
    }

    #[test]
    fn test_split() {
        assert_eq!(render("a,b,,c", "split", vec![Value::from(",")]), "['a', 'b', '', 'c']");
        assert_eq!(render("  a  b c ", "split", vec![]), "['a', 'b', 'c']");
        assert_eq!(
            render("a b c d", "split", vec![Value::Nil, Value::from(2)]),
            "['a', 'b', 'c d']"
        );
        assert!(dispatch("abc", "split", vec![Value::from("")]).is_err());
    }

    #[test]
    fn test_search_and_replace() {
        assert_eq!(render("banana", "find", vec![Value::from("na")]), "2");
        assert_eq!(render("banana", "find", vec![Value::from("x")]), "-1");
        assert_eq!(render("banana", "count", vec![Value::from("a")]), "3");
        assert_eq!(
            render("banana", "replace", vec![Value::from("a"), Value::from("o"), Value::from(2)]),
            "bonona"
        );
        assert_eq!(render("banana", "startswith", vec![Value::from("ban")]), "True");
        assert_eq!(render("banana", "endswith", vec![Value::from("x")]), "False");
    }

    #[test]
    fn test_join() {
        let items = Value::list(vec![Value::from("a"), Value::from("b")]);
        assert_eq!(render(", ", "join", vec![items]), "a, b");
        let bad = Value::list(vec![Value::from("a"), Value::from(1)]);
        let err = dispatch(", ", "join", vec![bad]).unwrap_err();
        assert!(err.to_string().contains("sequence item 1: expected str instance, int found"));
    }

    #[test]
    fn test_wrong_argument_type() {
        let err = dispatch("abc", "startswith", vec![Value::from(1)]).unwrap_err();
        assert!(matches!(err, TemplateError::TypeError { .. }));
    }
}
