//! Kiln template engine
//!
//! A Jinja-compatible renderer with Python collection semantics: negative and
//! clamped indexing, copy-on-slice lists, shared mutable containers and
//! Python-worded errors.
//!
//! ```
//! use kiln::{Context, Environment, Value};
//!
//! let env = Environment::new();
//! let mut ctx = Context::new();
//! ctx.set("value", Value::from(vec![Value::from("1"), Value::from(2)]));
//! assert_eq!(env.render_str("{{ value[-1] }} {{ value[1:] }}", &mut ctx).unwrap(), "2 [2]");
//! ```

pub mod ast;
pub mod config;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod index;
pub mod interpreter;
pub mod lexer;
pub mod methods;
pub mod parser;
pub mod stdlib;
pub mod value;

pub use ast::Template;
pub use config::Config;
pub use context::Context;
pub use error::{Result, TemplateError};
pub use interpreter::{render, Environment, Interpreter};
pub use methods::{Arguments, Signature};
pub use value::{Function, Value};
