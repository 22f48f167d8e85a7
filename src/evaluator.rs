//! Expression evaluation
//!
//! Every failure raised while evaluating an expression is tagged with the
//! position of the innermost expression that produced it.

use crate::ast::{BinaryOp, CallArguments, Expression, ExpressionKind, UnaryOp};
use crate::context::Context;
use crate::error::{Result, TemplateError};
use crate::index::{get_attribute, get_index, get_slice, Slice};
use crate::interpreter::Interpreter;
use crate::methods::{Arguments, MethodCall};
use crate::value::{compare, Function, FunctionBody, Value};
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::rc::Rc;

/// Nested macro calls allowed before a render is aborted
pub const MAX_CALL_DEPTH: usize = 64;

/// Largest result `seq * n` may build
pub const MAX_REPEAT: usize = 1_000_000;

impl Interpreter<'_> {
    /// Evaluate an expression against `ctx`
    pub fn eval_expression(&self, expr: &Expression, ctx: &mut Context) -> Result<Value> {
        self.eval_kind(&expr.kind, ctx).map_err(|e| e.at(expr.position))
    }

    fn eval_kind(&self, kind: &ExpressionKind, ctx: &mut Context) -> Result<Value> {
        match kind {
            ExpressionKind::Nil => Ok(Value::Nil),
            ExpressionKind::Bool(b) => Ok(Value::Bool(*b)),
            ExpressionKind::Integer(n) => Ok(Value::Int(*n)),
            ExpressionKind::Float(f) => Ok(Value::Float(*f)),
            ExpressionKind::String(s) => Ok(Value::String(s.clone())),

            ExpressionKind::List(items) => {
                let values = items
                    .iter()
                    .map(|item| self.eval_expression(item, ctx))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::list(values))
            }

            ExpressionKind::Dict(pairs) => {
                let mut entries = IndexMap::new();
                for (key, value) in pairs {
                    let key = self.eval_expression(key, ctx)?.to_key();
                    let value = self.eval_expression(value, ctx)?;
                    entries.insert(key, value);
                }
                Ok(Value::dict(entries))
            }

            ExpressionKind::Name(name) => Ok(self.lookup_name(name, ctx)),

            ExpressionKind::Unary { operator, operand } => {
                let operand = self.eval_expression(operand, ctx)?;
                unary_op(*operator, operand)
            }

            ExpressionKind::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.eval_expression(left, ctx)?;
                match operator {
                    BinaryOp::And if !left.is_truthy() => Ok(left),
                    BinaryOp::Or if left.is_truthy() => Ok(left),
                    BinaryOp::And | BinaryOp::Or => self.eval_expression(right, ctx),
                    op => {
                        let right = self.eval_expression(right, ctx)?;
                        binary_op(*op, left, right)
                    }
                }
            }

            ExpressionKind::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval_expression(condition, ctx)?.is_truthy() {
                    self.eval_expression(then_branch, ctx)
                } else {
                    match else_branch {
                        Some(branch) => self.eval_expression(branch, ctx),
                        None => Ok(Value::Nil),
                    }
                }
            }

            ExpressionKind::Attribute { object, name } => {
                let object = self.eval_expression(object, ctx)?;
                get_attribute(&object, name)
            }

            ExpressionKind::Index { object, index } => {
                let object = self.eval_expression(object, ctx)?;
                let index = match index {
                    Some(index) => Some(self.eval_expression(index, ctx)?),
                    None => None,
                };
                get_index(&object, index.as_ref())
            }

            ExpressionKind::Slice {
                object,
                start,
                stop,
            } => {
                let object = self.eval_expression(object, ctx)?;
                let start = self.slice_bound(start.as_deref(), ctx)?;
                let stop = self.slice_bound(stop.as_deref(), ctx)?;
                get_slice(&object, &Slice::new(start, stop))
            }

            ExpressionKind::MethodCall {
                object,
                method,
                arguments,
            } => {
                let receiver = self.eval_expression(object, ctx)?;
                let arguments = self.eval_arguments(arguments, ctx)?;
                self.call_method(&receiver, method, arguments, ctx)
            }

            ExpressionKind::Call {
                function,
                arguments,
            } => match self.eval_expression(function, ctx)? {
                Value::Callable(function) => {
                    let arguments = self.eval_arguments(arguments, ctx)?;
                    self.call_function(&function, arguments, ctx)
                }
                other => Err(TemplateError::type_error(format!(
                    "'{}' object is not callable",
                    other.type_name()
                ))),
            },

            ExpressionKind::Filter {
                input,
                name,
                arguments,
            } => {
                let input = self.eval_expression(input, ctx)?;
                let filter = self.env.filters.lookup(name).ok_or_else(|| {
                    TemplateError::attribute_error(format!("no filter named '{}'", name))
                })?;
                let mut arguments = self.eval_arguments(arguments, ctx)?;
                arguments.positional.insert(0, input);
                self.call_function(&filter, arguments, ctx)
            }

            ExpressionKind::Test {
                input,
                name,
                arguments,
                negated,
            } => {
                let input = self.eval_expression(input, ctx)?;
                let test = self.env.tests.lookup(name).ok_or_else(|| {
                    TemplateError::attribute_error(format!("no test named '{}'", name))
                })?;
                let mut arguments = self.eval_arguments(arguments, ctx)?;
                arguments.positional.insert(0, input);
                let passed = self.call_function(&test, arguments, ctx)?.is_truthy();
                Ok(Value::Bool(passed != *negated))
            }
        }
    }

    /// Context first, then globals; a miss is Nil
    pub fn lookup_name(&self, name: &str, ctx: &Context) -> Value {
        ctx.lookup(name)
            .or_else(|| self.env.globals.get(name))
            .cloned()
            .unwrap_or(Value::Nil)
    }

    fn slice_bound(&self, bound: Option<&Expression>, ctx: &mut Context) -> Result<Option<i64>> {
        let Some(bound) = bound else {
            return Ok(None);
        };
        match self.eval_expression(bound, ctx)? {
            Value::Nil => Ok(None),
            value => value.as_int().map(Some).ok_or_else(|| {
                TemplateError::type_error(format!(
                    "slice indices must be integers or None, not {}",
                    value.type_name()
                ))
                .at(bound.position)
            }),
        }
    }

    fn eval_arguments(&self, arguments: &CallArguments, ctx: &mut Context) -> Result<Arguments> {
        let mut evaluated = Arguments::default();
        for expr in &arguments.positional {
            evaluated.positional.push(self.eval_expression(expr, ctx)?);
        }
        for (name, expr) in &arguments.keyword {
            let value = self.eval_expression(expr, ctx)?;
            evaluated.keyword.insert(name.clone(), value);
        }
        Ok(evaluated)
    }

    /// Built-in method dispatch. A dict with no built-in of that name calls
    /// a callable stored under the key instead.
    fn call_method(
        &self,
        receiver: &Value,
        method: &str,
        arguments: Arguments,
        ctx: &mut Context,
    ) -> Result<Value> {
        if !self.env.methods.contains(receiver.kind(), method) {
            if let Value::Dict(entries) = receiver {
                let stored = entries.borrow().get(method).cloned();
                if let Some(Value::Callable(function)) = stored {
                    return self.call_function(&function, arguments, ctx);
                }
            }
        }
        self.env
            .methods
            .dispatch(receiver, &MethodCall::new(method, arguments))
    }

    /// Invoke a host function, filter, test or macro
    pub fn call_function(
        &self,
        function: &Rc<Function>,
        arguments: Arguments,
        ctx: &mut Context,
    ) -> Result<Value> {
        match &function.body {
            FunctionBody::Native(_) => function.call_native(&arguments),
            FunctionBody::Macro(_) => self.call_macro(function, arguments, ctx),
        }
    }

    fn call_macro(
        &self,
        function: &Rc<Function>,
        arguments: Arguments,
        ctx: &mut Context,
    ) -> Result<Value> {
        let FunctionBody::Macro(def) = &function.body else {
            return function.call_native(&arguments);
        };
        function.signature.validate(&function.name, &arguments)?;
        if let Some(param) = def
            .params
            .iter()
            .take(arguments.positional.len())
            .find(|param| arguments.keyword.contains_key(&param.name))
        {
            return Err(TemplateError::argument_error(format!(
                "{}() got multiple values for argument '{}'",
                function.name, param.name
            )));
        }

        let depth = self.call_depth.get();
        if depth >= MAX_CALL_DEPTH {
            return Err(TemplateError::RuntimeError(format!(
                "maximum macro call depth of {} exceeded in '{}'",
                MAX_CALL_DEPTH, function.name
            )));
        }
        self.call_depth.set(depth + 1);
        tracing::trace!(name = %function.name, depth = depth + 1, "calling macro");

        let result = ctx.with_scope(|ctx| {
            for (i, param) in def.params.iter().enumerate() {
                let value = match (arguments.arg(i, &param.name), &param.default) {
                    (Some(value), _) => value.clone(),
                    (None, Some(default)) => self.eval_expression(default, ctx)?,
                    (None, None) => Value::Nil,
                };
                ctx.define(&param.name, value);
            }
            let mut out = String::new();
            self.exec_block(&def.body, ctx, &mut out)?;
            Ok(Value::String(out))
        });

        self.call_depth.set(depth);
        result
    }
}

fn unary_op(operator: UnaryOp, operand: Value) -> Result<Value> {
    let symbol = match operator {
        UnaryOp::Not => return Ok(Value::Bool(!operand.is_truthy())),
        UnaryOp::Neg => "-",
        UnaryOp::Pos => "+",
    };
    match (operator, &operand) {
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Pos, Value::Float(f)) => Ok(Value::Float(*f)),
        (UnaryOp::Neg, Value::Int(_) | Value::Bool(_)) => operand
            .as_int()
            .and_then(i64::checked_neg)
            .map(Value::Int)
            .ok_or_else(overflow),
        (UnaryOp::Pos, Value::Int(_) | Value::Bool(_)) => {
            Ok(Value::Int(operand.as_int().unwrap_or_default()))
        }
        _ => Err(TemplateError::type_error(format!(
            "bad operand type for unary {}: '{}'",
            symbol,
            operand.type_name()
        ))),
    }
}

/// A numeric operand; booleans count as integers
#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn of(value: &Value) -> Option<Number> {
        match value {
            Value::Float(f) => Some(Number::Float(*f)),
            other => other.as_int().map(Number::Int),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(f) => f,
        }
    }
}

/// Apply a non-short-circuiting binary operator
pub fn binary_op(op: BinaryOp, left: Value, right: Value) -> Result<Value> {
    match op {
        BinaryOp::Eq => return Ok(Value::Bool(left == right)),
        BinaryOp::Ne => return Ok(Value::Bool(left != right)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare(&left, &right).ok_or_else(|| {
                TemplateError::type_error(format!(
                    "'{}' not supported between instances of '{}' and '{}'",
                    op.symbol(),
                    left.type_name(),
                    right.type_name()
                ))
            })?;
            let holds = match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            return Ok(Value::Bool(holds));
        }
        BinaryOp::In => return contains(&right, &left).map(Value::Bool),
        BinaryOp::NotIn => return contains(&right, &left).map(|found| Value::Bool(!found)),
        BinaryOp::Concat => return Ok(Value::String(left.render() + &right.render())),
        BinaryOp::And | BinaryOp::Or => {
            let deciding = if (op == BinaryOp::And) != left.is_truthy() {
                left
            } else {
                right
            };
            return Ok(deciding);
        }
        _ => {}
    }

    if let (Some(a), Some(b)) = (Number::of(&left), Number::of(&right)) {
        return arithmetic(op, a, b);
    }

    match (op, &left, &right) {
        (BinaryOp::Add, Value::String(a), Value::String(b)) => {
            Ok(Value::String(format!("{}{}", a, b)))
        }
        (BinaryOp::Add, Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::list(items))
        }
        (BinaryOp::Mul, Value::String(s), Value::Int(_) | Value::Bool(_)) => {
            Ok(Value::String(s.repeat(repeat_count(s.len(), &right)?)))
        }
        (BinaryOp::Mul, Value::Int(_) | Value::Bool(_), Value::String(s)) => {
            Ok(Value::String(s.repeat(repeat_count(s.len(), &left)?)))
        }
        (BinaryOp::Mul, Value::List(items), Value::Int(_) | Value::Bool(_)) => {
            let items = items.borrow();
            let times = repeat_count(items.len(), &right)?;
            Ok(Value::list(repeat_items(&items, times)))
        }
        (BinaryOp::Mul, Value::Int(_) | Value::Bool(_), Value::List(items)) => {
            let items = items.borrow();
            let times = repeat_count(items.len(), &left)?;
            Ok(Value::list(repeat_items(&items, times)))
        }
        _ => Err(TemplateError::type_error(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn arithmetic(op: BinaryOp, a: Number, b: Number) -> Result<Value> {
    if let (Number::Int(x), Number::Int(y)) = (a, b) {
        return int_arithmetic(op, x, y);
    }
    let (x, y) = (a.as_f64(), b.as_f64());
    let result = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod if y == 0.0 => {
            return Err(TemplateError::zero_division())
        }
        BinaryOp::Div => x / y,
        BinaryOp::FloorDiv => (x / y).floor(),
        BinaryOp::Mod => {
            let r = x % y;
            if r != 0.0 && (r < 0.0) != (y < 0.0) {
                r + y
            } else {
                r
            }
        }
        BinaryOp::Pow if x == 0.0 && y < 0.0 => return Err(TemplateError::zero_division()),
        BinaryOp::Pow => x.powf(y),
        _ => return Err(unsupported(op, "float")),
    };
    Ok(Value::Float(result))
}

fn int_arithmetic(op: BinaryOp, x: i64, y: i64) -> Result<Value> {
    let result = match op {
        BinaryOp::Add => x.checked_add(y),
        BinaryOp::Sub => x.checked_sub(y),
        BinaryOp::Mul => x.checked_mul(y),
        BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod if y == 0 => {
            return Err(TemplateError::zero_division())
        }
        BinaryOp::Div => return Ok(Value::Float(x as f64 / y as f64)),
        BinaryOp::FloorDiv => x.checked_div(y).map(|q| {
            if x % y != 0 && (x < 0) != (y < 0) {
                q - 1
            } else {
                q
            }
        }),
        BinaryOp::Mod => x.checked_rem(y).map(|r| {
            if r != 0 && (r < 0) != (y < 0) {
                r + y
            } else {
                r
            }
        }),
        BinaryOp::Pow if y < 0 => {
            if x == 0 {
                return Err(TemplateError::zero_division());
            }
            return Ok(Value::Float((x as f64).powf(y as f64)));
        }
        BinaryOp::Pow => u32::try_from(y).ok().and_then(|y| x.checked_pow(y)),
        _ => return Err(unsupported(op, "int")),
    };
    result.map(Value::Int).ok_or_else(overflow)
}

fn unsupported(op: BinaryOp, operand: &str) -> TemplateError {
    TemplateError::type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op.symbol(),
        operand,
        operand
    ))
}

fn overflow() -> TemplateError {
    TemplateError::RuntimeError("integer overflow".to_string())
}

/// Repetition count for `seq * times`; the result may hold at most
/// [`MAX_REPEAT`] bytes or items
fn repeat_count(len: usize, times: &Value) -> Result<usize> {
    let times = usize::try_from(times.as_int().unwrap_or(0)).unwrap_or(0);
    if len == 0 {
        return Ok(0);
    }
    match len.checked_mul(times) {
        Some(total) if total <= MAX_REPEAT => Ok(times),
        _ => Err(TemplateError::RuntimeError(format!(
            "repeated sequence too big (limit is {} items)",
            MAX_REPEAT
        ))),
    }
}

fn repeat_items(items: &[Value], times: usize) -> Vec<Value> {
    let mut repeated = Vec::with_capacity(items.len() * times);
    for _ in 0..times {
        repeated.extend(items.iter().cloned());
    }
    repeated
}

/// `item in container`
fn contains(container: &Value, item: &Value) -> Result<bool> {
    match container {
        Value::List(items) => Ok(items.borrow().iter().any(|candidate| candidate == item)),
        Value::Dict(entries) => Ok(entries.borrow().contains_key(&item.to_key())),
        Value::String(s) => match item {
            Value::String(needle) => Ok(s.contains(needle.as_str())),
            other => Err(TemplateError::type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        other => Err(TemplateError::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Node;
    use crate::interpreter::Environment;
    use crate::methods::Signature;

    fn eval_in(source: &str, ctx: &mut Context) -> Result<Value> {
        let env = Environment::new();
        let template = env.parse("expr", &format!("{{{{ {} }}}}", source))?;
        match template.nodes.as_slice() {
            [Node::Output(expr)] => Interpreter::new(&env).eval_expression(expr, ctx),
            other => panic!("expected a single output node, got {:?}", other),
        }
    }

    fn eval(source: &str) -> Result<Value> {
        eval_in(source, &mut Context::new())
    }

    fn render(source: &str) -> String {
        eval(source).unwrap().render()
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(render("1 + 2 * 3"), "7");
        assert_eq!(render("7 / 2"), "3.5");
        assert_eq!(render("4 / 2"), "2.0");
        assert_eq!(render("7 // 2"), "3");
        assert_eq!(render("-7 // 2"), "-4");
        assert_eq!(render("-7 % 3"), "2");
        assert_eq!(render("7 % -3"), "-2");
        assert_eq!(render("2 ** 10"), "1024");
        assert_eq!(render("2 ** -1"), "0.5");
        assert_eq!(render("1.5 + 1"), "2.5");
        assert_eq!(render("true + 1"), "2");
    }

    #[test]
    fn test_division_by_zero() {
        for source in ["1 / 0", "1 // 0", "1 % 0", "1.0 / 0"] {
            let err = eval(source).unwrap_err();
            assert!(matches!(err, TemplateError::ZeroDivisionError { .. }), "{}", source);
            assert!(err.to_string().contains("division by zero"));
        }
    }

    #[test]
    fn test_integer_overflow_is_an_error() {
        assert!(eval("9223372036854775807 + 1").is_err());
        // literals are i64; the minimum is spelled as an expression
        let err = eval("-9223372036854775808").unwrap_err();
        assert!(err.to_string().contains("invalid number literal"));
        assert_eq!(render("-9223372036854775807 - 1"), i64::MIN.to_string());
        assert!(eval("(-9223372036854775807 - 1) // -1").is_err());
    }

    #[test]
    fn test_string_and_list_operators() {
        assert_eq!(render("'ab' + 'cd'"), "abcd");
        assert_eq!(render("'ab' * 3"), "ababab");
        assert_eq!(render("[1] + [2, 3]"), "[1, 2, 3]");
        assert_eq!(render("[0] * 3"), "[0, 0, 0]");
        assert_eq!(render("1 ~ 'x' ~ none"), "1x");
        let err = eval("'a' + 1").unwrap_err();
        assert!(err
            .to_string()
            .contains("unsupported operand type(s) for +: 'str' and 'int'"));
    }

    #[test]
    fn test_huge_repetition_is_an_error() {
        for source in [
            "'ab' * 9223372036854775807",
            "9223372036854775807 * 'ab'",
            "[0] * 9223372036854775807",
            "[0, 1] * 600000",
        ] {
            let err = eval(source).unwrap_err();
            assert!(matches!(err, TemplateError::RuntimeError(_)), "{}", source);
            assert!(err.to_string().contains("repeated sequence too big"));
        }
        assert_eq!(render("'' * 9223372036854775807"), "");
        assert_eq!(render("[] * 9223372036854775807"), "[]");
        assert_eq!(render("'ab' * -2"), "");
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(render("1 < 2"), "True");
        assert_eq!(render("2.5 >= 3"), "False");
        assert_eq!(render("'abc' < 'abd'"), "True");
        assert_eq!(render("1 == 1.0"), "True");
        assert_eq!(render("'1' != 1"), "True");
        let err = eval("'a' < 1").unwrap_err();
        assert!(matches!(err, TemplateError::TypeError { .. }));
        assert!(err
            .to_string()
            .contains("'<' not supported between instances of 'str' and 'int'"));
    }

    #[test]
    fn test_logic_returns_deciding_operand() {
        assert_eq!(render("0 or 'x'"), "x");
        assert_eq!(render("'a' and 'b'"), "b");
        assert_eq!(render("'' and missing.attr"), "");
        assert_eq!(render("not []"), "True");
    }

    #[test]
    fn test_membership() {
        assert_eq!(render("2 in [1, 2]"), "True");
        assert_eq!(render("'k' in {'k': 1}"), "True");
        assert_eq!(render("'ell' in 'hello'"), "True");
        assert_eq!(render("3 not in [1, 2]"), "True");
        assert!(eval("1 in 'abc'").is_err());
        assert!(eval("1 in 5").is_err());
    }

    #[test]
    fn test_conditional_expression() {
        assert_eq!(render("'yes' if 1 else 'no'"), "yes");
        assert_eq!(render("'yes' if 0 else 'no'"), "no");
        assert!(eval("'yes' if 0").unwrap().is_nil());
    }

    #[test]
    fn test_literals_allocate_fresh_storage() {
        let mut ctx = Context::new();
        let a = eval_in("[1, 2]", &mut ctx).unwrap();
        let b = eval_in("[1, 2]", &mut ctx).unwrap();
        assert_eq!(a, b);
        assert!(!a.same_storage(&b));
        assert_eq!(render("{'a': 1, 2: 'b'}"), "{'a': 1, '2': 'b'}");
    }

    #[test]
    fn test_names_resolve_from_context_then_globals() {
        let mut ctx = Context::new();
        ctx.set("who", Value::from("world"));
        assert_eq!(eval_in("who", &mut ctx).unwrap().render(), "world");
        assert!(eval_in("nobody", &mut ctx).unwrap().is_nil());
        assert_eq!(eval_in("range(2)", &mut ctx).unwrap().render(), "[0, 1]");

        ctx.set("range", Value::from("shadowed"));
        assert_eq!(eval_in("range", &mut ctx).unwrap().render(), "shadowed");
    }

    #[test]
    fn test_subscripts_on_nil_carry_position() {
        let err = eval("missing[0]").unwrap_err();
        assert!(matches!(err, TemplateError::TypeError { .. }));
        assert!(err.to_string().contains("'NoneType' object is not subscriptable"));
        assert!(err.position().is_some());

        let err = eval("missing.append(1)").unwrap_err();
        assert!(matches!(err, TemplateError::AttributeError { .. }));
    }

    #[test]
    fn test_slice_bounds_must_be_integers() {
        assert_eq!(render("[1, 2, 3][1:none]"), "[2, 3]");
        assert!(eval("[1, 2, 3]['a':]").is_err());
    }

    #[test]
    fn test_filters_and_tests() {
        assert_eq!(render("'abc' | upper"), "ABC");
        assert_eq!(render("[1, 2] | join('-')"), "1-2");
        assert_eq!(render("none | default('x')"), "x");
        assert_eq!(render("4 is even"), "True");
        assert_eq!(render("4 is not even"), "False");
        assert_eq!(render("9 is divisibleby(3)"), "True");

        let err = eval("1 | nope").unwrap_err();
        assert!(err.to_string().contains("no filter named 'nope'"));
        let err = eval("1 is nope").unwrap_err();
        assert!(err.to_string().contains("no test named 'nope'"));
    }

    #[test]
    fn test_calling_non_callable() {
        let err = eval("'x'()").unwrap_err();
        assert!(err.to_string().contains("'str' object is not callable"));
    }

    #[test]
    fn test_dict_stored_callable_is_invoked_as_method() {
        let mut ctx = Context::new();
        let mut helpers = IndexMap::new();
        helpers.insert(
            "twice".to_string(),
            Value::function(Function::native(
                "twice",
                Signature::new().required("n"),
                |args| Ok(Value::Int(args.arg_or_nil(0, "n").as_int().unwrap_or(0) * 2)),
            )),
        );
        ctx.set("helpers", Value::dict(helpers));
        assert_eq!(eval_in("helpers.twice(21)", &mut ctx).unwrap(), Value::from(42));
        // built-ins win over stored keys
        assert_eq!(eval_in("helpers.keys()", &mut ctx).unwrap().render(), "['twice']");
    }
}
