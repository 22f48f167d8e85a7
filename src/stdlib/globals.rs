//! Default globals, visible to every template unless shadowed by the context

use crate::error::{Result, TemplateError};
use crate::methods::{int_arg, Arguments, Signature};
use crate::value::{Function, Value};
use std::collections::HashMap;

/// Upper bound on the number of items `range()` will produce
pub const MAX_RANGE: usize = 100_000;

/// Initialize the default globals
pub fn init() -> HashMap<String, Value> {
    let mut globals: HashMap<String, Value> = HashMap::new();

    // range(stop) / range(start, stop, step=1) -> List
    globals.insert(
        "range".to_string(),
        Value::function(Function::native(
            "range",
            Signature::new()
                .required("start")
                .optional("stop")
                .optional("step"),
            range,
        )),
    );

    // dict(**kwargs) -> Dict
    globals.insert(
        "dict".to_string(),
        Value::function(Function::native(
            "dict",
            Signature::new().any_keyword(),
            |args| Ok(Value::dict(args.keyword.clone())),
        )),
    );

    globals
}

fn range(args: &Arguments) -> Result<Value> {
    let first = int_arg(args, 0, "start", "range")?.unwrap_or(0);
    let (start, stop) = match int_arg(args, 1, "stop", "range")? {
        Some(stop) => (first, stop),
        None => (0, first),
    };
    let step = int_arg(args, 2, "step", "range")?.unwrap_or(1);
    if step == 0 {
        return Err(TemplateError::RuntimeError(
            "range() arg 3 must not be zero".to_string(),
        ));
    }

    let span = if step > 0 {
        stop.saturating_sub(start)
    } else {
        start.saturating_sub(stop)
    };
    let count = if span <= 0 {
        0
    } else {
        (span as u64).div_ceil(step.unsigned_abs())
    };
    if count > MAX_RANGE as u64 {
        return Err(TemplateError::RuntimeError(format!(
            "range too big, at most {} items are allowed",
            MAX_RANGE
        )));
    }

    let items = (0..count as i64)
        .map(|i| Value::Int(start + i * step))
        .collect();
    Ok(Value::list(items))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, arguments: Arguments) -> Result<Value> {
        match init().get(name) {
            Some(Value::Callable(function)) => function.call_native(&arguments),
            other => panic!("{} is not a callable global: {:?}", name, other),
        }
    }

    fn range_of(bounds: &[i64]) -> Result<String> {
        let positional = bounds.iter().map(|n| Value::from(*n)).collect();
        call("range", Arguments::new(positional)).map(|v| v.render())
    }

    #[test]
    fn test_range_forms() {
        assert_eq!(range_of(&[3]).unwrap(), "[0, 1, 2]");
        assert_eq!(range_of(&[2, 5]).unwrap(), "[2, 3, 4]");
        assert_eq!(range_of(&[0, 10, 4]).unwrap(), "[0, 4, 8]");
        assert_eq!(range_of(&[5, 0, -2]).unwrap(), "[5, 3, 1]");
        assert_eq!(range_of(&[5, 2]).unwrap(), "[]");
        assert_eq!(range_of(&[-2]).unwrap(), "[]");
    }

    #[test]
    fn test_range_rejects_zero_step_and_huge_spans() {
        assert!(range_of(&[0, 5, 0]).is_err());
        assert!(range_of(&[0, i64::MAX]).is_err());
    }

    #[test]
    fn test_dict_from_keywords() {
        let arguments = Arguments::new(vec![])
            .with_keyword("b", Value::from(1))
            .with_keyword("a", Value::from("x"));
        assert_eq!(call("dict", arguments).unwrap().render(), "{'b': 1, 'a': 'x'}");
    }
}
