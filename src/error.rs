//! Error types for Kiln

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias for template operations
pub type Result<T> = std::result::Result<T, TemplateError>;

/// A line/column position in template source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Position { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Optional source location attached to evaluation errors.
///
/// Renders as ` (line L, column C)` when known and as nothing otherwise, so
/// the error message stays the leading part of the display form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location(pub Option<Position>);

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(position) => write!(f, " ({})", position),
            None => Ok(()),
        }
    }
}

/// Main error type for template operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    #[error("Lexer error at line {line}, column {column}: {message}")]
    LexerError {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Parser error at line {line}: {message}")]
    ParserError { line: usize, message: String },

    /// Operation invalid for the runtime kind of a value
    #[error("TypeError: {message}{location}")]
    TypeError { message: String, location: Location },

    /// No such method or attribute on the receiver's kind
    #[error("AttributeError: {message}{location}")]
    AttributeError { message: String, location: Location },

    /// Positional-count or keyword-set mismatch on a call
    #[error("ArgumentError: {message}{location}")]
    ArgumentError { message: String, location: Location },

    #[error("ZeroDivisionError: {message}{location}")]
    ZeroDivisionError { message: String, location: Location },

    /// Failure raised from inside a method, filter or host callable
    #[error("Runtime error: {0}")]
    RuntimeError(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}

impl TemplateError {
    pub fn type_error(message: impl Into<String>) -> Self {
        TemplateError::TypeError {
            message: message.into(),
            location: Location::default(),
        }
    }

    pub fn attribute_error(message: impl Into<String>) -> Self {
        TemplateError::AttributeError {
            message: message.into(),
            location: Location::default(),
        }
    }

    pub fn argument_error(message: impl Into<String>) -> Self {
        TemplateError::ArgumentError {
            message: message.into(),
            location: Location::default(),
        }
    }

    pub fn zero_division() -> Self {
        TemplateError::ZeroDivisionError {
            message: "division by zero".to_string(),
            location: Location::default(),
        }
    }

    /// Attach a source position unless the error already carries one.
    pub fn at(mut self, position: Position) -> Self {
        match &mut self {
            TemplateError::TypeError { location, .. }
            | TemplateError::AttributeError { location, .. }
            | TemplateError::ArgumentError { location, .. }
            | TemplateError::ZeroDivisionError { location, .. } => {
                if location.0.is_none() {
                    location.0 = Some(position);
                }
            }
            _ => {}
        }
        self
    }

    /// Source position of an evaluation error, if one was attached
    pub fn position(&self) -> Option<Position> {
        match self {
            TemplateError::TypeError { location, .. }
            | TemplateError::AttributeError { location, .. }
            | TemplateError::ArgumentError { location, .. }
            | TemplateError::ZeroDivisionError { location, .. } => location.0,
            TemplateError::LexerError { line, column, .. } => Some(Position::new(*line, *column)),
            TemplateError::ParserError { line, .. } => Some(Position::new(*line, 0)),
            _ => None,
        }
    }
}
