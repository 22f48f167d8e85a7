//! Default tests (`value is name(args)`)
//!
//! Nil stands for both `none` and an undefined name, so `defined` and
//! `none` are complementary.

use super::{input, Registry};
use crate::error::{Result, TemplateError};
use crate::methods::Signature;
use crate::value::Value;

/// Initialize the default test set
pub fn init() -> Registry {
    let mut tests = Registry::new();

    kind_test(&mut tests, "defined", |v| !v.is_nil());
    kind_test(&mut tests, "undefined", Value::is_nil);
    kind_test(&mut tests, "none", Value::is_nil);
    kind_test(&mut tests, "boolean", |v| matches!(v, Value::Bool(_)));
    kind_test(&mut tests, "number", |v| matches!(v, Value::Int(_) | Value::Float(_)));
    kind_test(&mut tests, "integer", |v| matches!(v, Value::Int(_)));
    kind_test(&mut tests, "float", |v| matches!(v, Value::Float(_)));
    kind_test(&mut tests, "string", |v| matches!(v, Value::String(_)));
    kind_test(&mut tests, "mapping", |v| matches!(v, Value::Dict(_)));
    kind_test(&mut tests, "sequence", |v| {
        matches!(v, Value::List(_) | Value::String(_) | Value::Dict(_))
    });
    kind_test(&mut tests, "iterable", |v| {
        matches!(v, Value::List(_) | Value::String(_) | Value::Dict(_))
    });
    kind_test(&mut tests, "callable", |v| matches!(v, Value::Callable(_)));

    tests.register_fn("even", Signature::new().required("value"), |args| {
        Ok(Value::Bool(integer(&input(args), "even")? % 2 == 0))
    });
    tests.register_fn("odd", Signature::new().required("value"), |args| {
        Ok(Value::Bool(integer(&input(args), "odd")? % 2 != 0))
    });

    // divisibleby(value, num)
    tests.register_fn(
        "divisibleby",
        Signature::new().required("value").required("num").keyword("num"),
        |args| {
            let value = integer(&input(args), "divisibleby")?;
            let num = integer(&args.arg_or_nil(1, "num"), "divisibleby")?;
            if num == 0 {
                return Err(TemplateError::zero_division());
            }
            // i64::MIN % -1 overflows; every int is divisible by -1
            Ok(Value::Bool(value.checked_rem(num).map_or(true, |r| r == 0)))
        },
    );

    // eq(value, other), also as `==`
    for name in ["eq", "equalto", "=="] {
        tests.register_fn(
            name,
            Signature::new().required("value").required("other"),
            |args| Ok(Value::Bool(input(args) == args.arg_or_nil(1, "other"))),
        );
    }

    tests
}

fn kind_test(tests: &mut Registry, name: &str, check: fn(&Value) -> bool) {
    tests.register_fn(name, Signature::new().required("value"), move |args| {
        Ok(Value::Bool(check(&input(args))))
    });
}

fn integer(value: &Value, test: &str) -> Result<i64> {
    value.as_int().ok_or_else(|| {
        TemplateError::type_error(format!(
            "test '{}' requires an int, not {}",
            test,
            value.type_name()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::methods::Arguments;

    fn check(name: &str, positional: Vec<Value>) -> Result<bool> {
        let result = init()
            .lookup(name)
            .unwrap()
            .call_native(&Arguments::new(positional))?;
        Ok(result.is_truthy())
    }

    #[test]
    fn test_kind_tests() {
        assert!(check("defined", vec![Value::from(0)]).unwrap());
        assert!(!check("defined", vec![Value::Nil]).unwrap());
        assert!(check("none", vec![Value::Nil]).unwrap());
        assert!(check("number", vec![Value::from(1.5)]).unwrap());
        assert!(!check("number", vec![Value::Bool(true)]).unwrap());
        assert!(check("mapping", vec![Value::empty_dict()]).unwrap());
        assert!(check("sequence", vec![Value::list(vec![])]).unwrap());
        assert!(!check("string", vec![Value::from(1)]).unwrap());
    }

    #[test]
    fn test_parity_and_divisibility() {
        assert!(check("even", vec![Value::from(4)]).unwrap());
        assert!(check("odd", vec![Value::from(-3)]).unwrap());
        assert!(check("divisibleby", vec![Value::from(9), Value::from(3)]).unwrap());
        assert!(!check("divisibleby", vec![Value::from(10), Value::from(3)]).unwrap());
        assert!(matches!(
            check("divisibleby", vec![Value::from(1), Value::from(0)]),
            Err(TemplateError::ZeroDivisionError { .. })
        ));
        assert!(check("odd", vec![Value::from("x")]).is_err());
        assert!(check("divisibleby", vec![Value::from(i64::MIN), Value::from(-1)]).unwrap());
        assert!(check("divisibleby", vec![Value::from(i64::MIN), Value::from(2)]).unwrap());
    }

    #[test]
    fn test_eq() {
        assert!(check("eq", vec![Value::from(1), Value::from(1.0)]).unwrap());
        assert!(!check("eq", vec![Value::from("1"), Value::from(1)]).unwrap());
    }
}
