//! Abstract Syntax Tree definitions for Kiln templates
//!
//! A parsed template is immutable; the same tree can be rendered any number
//! of times against different contexts.

use crate::error::Position;
use serde::{Deserialize, Serialize};

/// A complete parsed template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub nodes: Vec<Node>,
}

/// Statement nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Node {
    /// Literal text, emitted verbatim
    Text(String),

    /// Interpolation: `{{ expr }}`
    Output(Expression),

    /// `{% if %}` with any number of `elif` branches
    If {
        branches: Vec<IfBranch>,
        else_branch: Option<Vec<Node>>,
    },

    /// `{% for a, b in expr %}`
    For {
        targets: Vec<String>,
        iterable: Expression,
        body: Vec<Node>,
        else_branch: Option<Vec<Node>>,
    },

    /// `{% set a = expr %}` or `{% set a, b = expr %}`
    Set {
        targets: Vec<String>,
        value: Expression,
    },

    /// `{% set name %}...{% endset %}`
    SetBlock { name: String, body: Vec<Node> },

    /// `{% with a = expr %}...{% endwith %}`
    With {
        assignments: Vec<(String, Expression)>,
        body: Vec<Node>,
    },

    /// `{% macro name(params) %}...{% endmacro %}`
    Macro(MacroDef),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IfBranch {
    pub condition: Expression,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroDef {
    pub name: String,
    pub params: Vec<MacroParam>,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroParam {
    pub name: String,
    pub default: Option<Expression>,
}

/// An expression together with the position it starts at
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub position: Position,
}

impl Expression {
    pub fn new(kind: ExpressionKind, position: Position) -> Self {
        Expression { kind, position }
    }
}

/// Expression nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExpressionKind {
    Nil,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),

    /// `[a, b]`
    List(Vec<Expression>),

    /// `{k: v}`
    Dict(Vec<(Expression, Expression)>),

    /// Variable reference
    Name(String),

    Unary {
        operator: UnaryOp,
        operand: Box<Expression>,
    },

    Binary {
        left: Box<Expression>,
        operator: BinaryOp,
        right: Box<Expression>,
    },

    /// `a if cond else b`
    Conditional {
        condition: Box<Expression>,
        then_branch: Box<Expression>,
        else_branch: Option<Box<Expression>>,
    },

    /// `obj.name`
    Attribute {
        object: Box<Expression>,
        name: String,
    },

    /// `obj[index]`; `obj[]` has no index
    Index {
        object: Box<Expression>,
        index: Option<Box<Expression>>,
    },

    /// `obj[start:stop]`
    Slice {
        object: Box<Expression>,
        start: Option<Box<Expression>>,
        stop: Option<Box<Expression>>,
    },

    /// `obj.method(args)`
    MethodCall {
        object: Box<Expression>,
        method: String,
        arguments: CallArguments,
    },

    /// `callee(args)`
    Call {
        function: Box<Expression>,
        arguments: CallArguments,
    },

    /// `input | name(args)`
    Filter {
        input: Box<Expression>,
        name: String,
        arguments: CallArguments,
    },

    /// `input is [not] name(args)`
    Test {
        input: Box<Expression>,
        name: String,
        arguments: CallArguments,
        negated: bool,
    },
}

/// Arguments as written at a call site
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallArguments {
    pub positional: Vec<Expression>,
    pub keyword: Vec<(String, Expression)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    /// `~`
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    In,
    NotIn,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::Concat => "~",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::In => "in",
            BinaryOp::NotIn => "not in",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
    Pos,
}
