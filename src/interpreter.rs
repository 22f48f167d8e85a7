//! Tree-walking renderer for Kiln templates
//!
//! [`Environment`] bundles the configuration with the method table and the
//! filter, test and global registries. [`Interpreter`] walks statement nodes
//! against a [`Context`], delegating expressions to the evaluator.

use crate::ast::{IfBranch, MacroDef, Node, Template};
use crate::config::Config;
use crate::context::Context;
use crate::error::{Result, TemplateError};
use crate::methods::{Arguments, MethodRegistry, Signature};
use crate::stdlib::{self, Registry};
use crate::value::{Function, FunctionBody, Value};
use indexmap::IndexMap;
use std::cell::Cell;
use std::collections::HashMap;

/// Everything a render needs besides the data
#[derive(Debug, Clone)]
pub struct Environment {
    pub config: Config,
    pub methods: MethodRegistry,
    pub filters: Registry,
    pub tests: Registry,
    pub globals: HashMap<String, Value>,
}

impl Environment {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Environment {
            config,
            methods: MethodRegistry::with_builtins(),
            filters: stdlib::filters::init(),
            tests: stdlib::predicates::init(),
            globals: stdlib::globals::init(),
        }
    }

    /// Register a filter, replacing any default of the same name
    pub fn add_filter<F>(&mut self, name: &str, signature: Signature, func: F)
    where
        F: Fn(&Arguments) -> Result<Value> + 'static,
    {
        self.filters.register_fn(name, signature, func);
    }

    /// Register a test, replacing any default of the same name
    pub fn add_test<F>(&mut self, name: &str, signature: Signature, func: F)
    where
        F: Fn(&Arguments) -> Result<Value> + 'static,
    {
        self.tests.register_fn(name, signature, func);
    }

    pub fn add_global(&mut self, name: &str, value: Value) {
        self.globals.insert(name.to_string(), value);
    }

    /// Parse `source` with this environment's delimiters
    pub fn parse(&self, name: &str, source: &str) -> Result<Template> {
        Template::parse(name, source, &self.config)
    }

    /// Render a parsed template.
    ///
    /// A template-level scope is pushed over `context` for the duration of
    /// the call and popped again whether or not rendering succeeds.
    pub fn render(&self, template: &Template, context: &mut Context) -> Result<String> {
        tracing::debug!(template = %template.name, depth = context.depth(), "render start");
        let interpreter = Interpreter::new(self);
        let result = context.with_scope(|ctx| interpreter.execute(&template.nodes, ctx));
        match &result {
            Ok(output) => {
                tracing::debug!(template = %template.name, bytes = output.len(), "render finished")
            }
            Err(e) => tracing::debug!(template = %template.name, error = %e, "render failed"),
        }
        result
    }

    /// Parse and render in one step
    pub fn render_str(&self, source: &str, context: &mut Context) -> Result<String> {
        let template = self.parse("<string>", source)?;
        self.render(&template, context)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

/// Render `template` against `context` with the default environment
pub fn render(template: &Template, context: &mut Context) -> Result<String> {
    Environment::new().render(template, context)
}

/// Statement executor. Holds no template state of its own; everything a
/// template binds lives in the [`Context`] it is run against.
pub struct Interpreter<'env> {
    pub(crate) env: &'env Environment,
    /// Current macro nesting
    pub(crate) call_depth: Cell<usize>,
}

impl<'env> Interpreter<'env> {
    pub fn new(env: &'env Environment) -> Self {
        Interpreter {
            env,
            call_depth: Cell::new(0),
        }
    }

    /// Run `nodes` directly in the current scope of `ctx`
    pub fn execute(&self, nodes: &[Node], ctx: &mut Context) -> Result<String> {
        let mut out = String::new();
        self.exec_block(nodes, ctx, &mut out)?;
        Ok(out)
    }

    pub(crate) fn exec_block(&self, nodes: &[Node], ctx: &mut Context, out: &mut String) -> Result<()> {
        for node in nodes {
            self.exec_node(node, ctx, out)?;
        }
        Ok(())
    }

    fn exec_node(&self, node: &Node, ctx: &mut Context, out: &mut String) -> Result<()> {
        match node {
            Node::Text(text) => {
                out.push_str(text);
                Ok(())
            }

            Node::Output(expr) => {
                let value = self.eval_expression(expr, ctx)?;
                out.push_str(&value.render());
                Ok(())
            }

            Node::If {
                branches,
                else_branch,
            } => self.exec_if(branches, else_branch.as_deref(), ctx, out),

            Node::For {
                targets,
                iterable,
                body,
                else_branch,
            } => {
                let items = self
                    .eval_expression(iterable, ctx)?
                    .iterate()
                    .map_err(|e| e.at(iterable.position))?;
                if items.is_empty() {
                    if let Some(else_branch) = else_branch {
                        self.exec_block(else_branch, ctx, out)?;
                    }
                    return Ok(());
                }

                let length = items.len();
                ctx.with_scope(|ctx| {
                    for (i, item) in items.into_iter().enumerate() {
                        let bindings = unpack(targets, item).map_err(|e| e.at(iterable.position))?;
                        for (name, value) in bindings {
                            ctx.define(&name, value);
                        }
                        ctx.define("loop", loop_info(i, length));
                        self.exec_block(body, ctx, out)?;
                    }
                    Ok(())
                })
            }

            Node::Set { targets, value } => {
                let evaluated = self.eval_expression(value, ctx)?;
                let bindings = unpack(targets, evaluated).map_err(|e| e.at(value.position))?;
                for (name, bound) in bindings {
                    ctx.set(&name, bound);
                }
                Ok(())
            }

            Node::SetBlock { name, body } => {
                let captured = self.execute(body, ctx)?;
                ctx.set(name, Value::String(captured));
                Ok(())
            }

            Node::With { assignments, body } => ctx.with_scope(|ctx| {
                for (name, expr) in assignments {
                    let value = self.eval_expression(expr, ctx)?;
                    ctx.define(name, value);
                }
                self.exec_block(body, ctx, out)
            }),

            Node::Macro(def) => {
                ctx.define(&def.name, Value::function(macro_function(def)));
                Ok(())
            }
        }
    }

    fn exec_if(
        &self,
        branches: &[IfBranch],
        else_branch: Option<&[Node]>,
        ctx: &mut Context,
        out: &mut String,
    ) -> Result<()> {
        for branch in branches {
            if self.eval_expression(&branch.condition, ctx)?.is_truthy() {
                return self.exec_block(&branch.body, ctx, out);
            }
        }
        match else_branch {
            Some(nodes) => self.exec_block(nodes, ctx, out),
            None => Ok(()),
        }
    }
}

/// Wrap a macro definition as a callable. Every parameter may be passed
/// positionally or by keyword; omitted ones without a default are Nil.
fn macro_function(def: &MacroDef) -> Function {
    let signature = def.params.iter().fold(Signature::new(), |signature, param| {
        signature.optional(&param.name).keyword(&param.name)
    });
    Function {
        name: def.name.clone(),
        signature,
        body: FunctionBody::Macro(def.clone()),
    }
}

/// Pair assignment targets with values. A single target takes the value
/// whole; several targets unpack a list or string of matching length.
fn unpack(targets: &[String], value: Value) -> Result<Vec<(String, Value)>> {
    if let [target] = targets {
        return Ok(vec![(target.clone(), value)]);
    }
    let values = match &value {
        Value::List(_) | Value::String(_) => value.iterate()?,
        other => {
            return Err(TemplateError::type_error(format!(
                "cannot unpack non-iterable {} object",
                other.type_name()
            )))
        }
    };
    if values.len() != targets.len() {
        let message = if values.len() > targets.len() {
            format!("too many values to unpack (expected {})", targets.len())
        } else {
            format!(
                "not enough values to unpack (expected {}, got {})",
                targets.len(),
                values.len()
            )
        };
        return Err(TemplateError::type_error(message));
    }
    Ok(targets.iter().cloned().zip(values).collect())
}

/// The `loop` variable for iteration `i` of `length`
fn loop_info(i: usize, length: usize) -> Value {
    let mut info = IndexMap::new();
    info.insert("index".to_string(), Value::from(i + 1));
    info.insert("index0".to_string(), Value::from(i));
    info.insert("revindex".to_string(), Value::from(length - i));
    info.insert("revindex0".to_string(), Value::from(length - i - 1));
    info.insert("first".to_string(), Value::Bool(i == 0));
    info.insert("last".to_string(), Value::Bool(i + 1 == length));
    info.insert("length".to_string(), Value::from(length));
    Value::dict(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_with(source: &str, ctx: &mut Context) -> Result<String> {
        Environment::new().render_str(source, ctx)
    }

    fn render(source: &str) -> Result<String> {
        render_with(source, &mut Context::new())
    }

    #[test]
    fn test_text_and_output() {
        assert_eq!(render("Hello {{ 'world' }}!").unwrap(), "Hello world!");
        assert_eq!(render("{{ none }}|{{ [none] }}").unwrap(), "|[None]");
    }

    #[test]
    fn test_if_elif_else() {
        let source = "{% if n > 1 %}many{% elif n == 1 %}one{% else %}none{% endif %}";
        for (n, expected) in [(3, "many"), (1, "one"), (0, "none")] {
            let mut ctx = Context::new();
            ctx.set("n", Value::from(n));
            assert_eq!(render_with(source, &mut ctx).unwrap(), expected);
        }
    }

    #[test]
    fn test_for_loop_variable() {
        let output = render(
            "{% for x in ['a', 'b', 'c'] %}{{ loop.index }}{{ x }}{% if not loop.last %},{% endif %}{% endfor %}",
        )
        .unwrap();
        assert_eq!(output, "1a,2b,3c");
        let output = render("{% for x in [1, 2] %}{{ loop.revindex0 }}{{ loop.length }}{% endfor %}").unwrap();
        assert_eq!(output, "1202");
    }

    #[test]
    fn test_for_else_and_nil_iterable() {
        assert_eq!(render("{% for x in [] %}x{% else %}empty{% endfor %}").unwrap(), "empty");
        assert_eq!(render("{% for x in missing %}x{% else %}empty{% endfor %}").unwrap(), "empty");
        assert!(render("{% for x in 5 %}{% endfor %}").is_err());
    }

    #[test]
    fn test_for_unpacks_pairs() {
        let output = render("{% for k, v in {'a': 1, 'b': 2}.items() %}{{ k }}={{ v }};{% endfor %}").unwrap();
        assert_eq!(output, "a=1;b=2;");
        let err = render("{% for a, b in [[1, 2, 3]] %}{% endfor %}").unwrap_err();
        assert!(err.to_string().contains("too many values to unpack (expected 2)"));
    }

    #[test]
    fn test_loop_scope_is_popped() {
        let mut ctx = Context::new();
        let output = render_with("{% for x in [1, 2] %}{% set seen = x %}{% endfor %}[{{ x }}{{ seen }}]", &mut ctx).unwrap();
        assert_eq!(output, "[]");
        assert_eq!(ctx.depth(), 1);
    }

    #[test]
    fn test_set_in_loop_persists_across_iterations() {
        let output = render(
            "{% for x in [1, 2, 3] %}{% if loop.first %}{% set acc = 0 %}{% endif %}{% set acc = acc + x %}{{ acc }}{% endfor %}",
        )
        .unwrap();
        assert_eq!(output, "136");
    }

    #[test]
    fn test_set_rebinds_nearest_owner() {
        let mut ctx = Context::new();
        ctx.set("total", Value::from(1));
        render_with("{% for x in [1] %}{% set total = 10 %}{% endfor %}{% set fresh = 1 %}", &mut ctx).unwrap();
        assert_eq!(ctx.get("total"), Value::from(10));
        assert!(!ctx.contains("fresh"));
    }

    #[test]
    fn test_set_unpacking_and_block_set() {
        assert_eq!(render("{% set a, b = 1, 2 %}{{ b }}{{ a }}").unwrap(), "21");
        assert_eq!(
            render("{% set greeting %}Hi {{ 'there' }}{% endset %}[{{ greeting }}]").unwrap(),
            "[Hi there]"
        );
        assert!(render("{% set a, b = 1 %}").is_err());
    }

    #[test]
    fn test_with_block_scope() {
        let output = render("{% with a = 1, b = 2 %}{{ a + b }}{% endwith %}[{{ a }}]").unwrap();
        assert_eq!(output, "3[]");
    }

    #[test]
    fn test_macros() {
        let source = "{% macro greet(name, punct='!') %}Hello {{ name }}{{ punct }}{% endmacro %}\
                      {{ greet('Ann') }} {{ greet(name='Bob', punct='?') }}";
        assert_eq!(render(source).unwrap(), "Hello Ann! Hello Bob?");

        let err = render("{% macro m(a) %}{% endmacro %}{{ m(1, 2) }}").unwrap_err();
        assert!(err.to_string().contains("m() received 1 unexpected positional argument"));

        let err = render("{% macro m(a) %}{% endmacro %}{{ m(1, a=2) }}").unwrap_err();
        assert!(err.to_string().contains("got multiple values for argument 'a'"));
    }

    #[test]
    fn test_macro_sees_caller_scope() {
        let source = "{% macro show() %}{{ item }}{% endmacro %}{% for item in ['x', 'y'] %}{{ show() }}{% endfor %}";
        assert_eq!(render(source).unwrap(), "xy");
    }

    #[test]
    fn test_runaway_macro_recursion_is_stopped() {
        let err = render("{% macro f() %}{{ f() }}{% endmacro %}{{ f() }}").unwrap_err();
        assert!(err.to_string().contains("maximum macro call depth"));
    }

    #[test]
    fn test_failure_returns_no_output_and_restores_depth() {
        let mut ctx = Context::new();
        let result = render_with("before{% for x in [1] %}{{ x.append(1) }}{% endfor %}", &mut ctx);
        assert!(result.is_err());
        assert_eq!(ctx.depth(), 1);
    }

    #[test]
    fn test_custom_filter_and_global() {
        let mut env = Environment::new();
        env.add_filter("shout", Signature::new().required("value"), |args| {
            Ok(Value::from(format!("{}!", args.arg_or_nil(0, "value").render())))
        });
        env.add_global("site", Value::from("kiln"));
        let output = env.render_str("{{ site | shout }}", &mut Context::new()).unwrap();
        assert_eq!(output, "kiln!");
    }
}
