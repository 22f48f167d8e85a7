//! Lexer for Kiln templates
//!
//! Splits template source into literal text and the tokens found inside
//! `{{ ... }}` and `{% ... %}` tags. Comments (`{# ... #}`) are dropped.
//! Delimiters come from [`Config`].

use crate::config::Config;
use crate::error::{Result, TemplateError};
use std::fmt;

/// Token types for Kiln templates
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Literal text outside of tags
    Text(String),

    // Tag delimiters
    VariableStart,
    VariableEnd,
    BlockStart,
    BlockEnd,

    // Literals
    Integer(i64),
    Float(f64),
    String(String),
    Bool(bool),
    None,

    Identifier(String),

    // Keywords
    And,
    Or,
    Not,
    In,
    Is,
    If,
    Else,

    // Operators
    Plus,         // +
    Minus,        // -
    Star,         // *
    StarStar,     // **
    Slash,        // /
    SlashSlash,   // //
    Percent,      // %
    Tilde,        // ~
    Equal,        // ==
    NotEqual,     // !=
    Less,         // <
    LessEqual,    // <=
    Greater,      // >
    GreaterEqual, // >=
    Assign,       // =
    Pipe,         // |

    // Delimiters
    LeftParen,    // (
    RightParen,   // )
    LeftBrace,    // {
    RightBrace,   // }
    LeftBracket,  // [
    RightBracket, // ]

    // Punctuation
    Comma, // ,
    Dot,   // .
    Colon, // :

    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Text(_) => "template text",
            TokenKind::VariableStart => "start of print statement",
            TokenKind::VariableEnd => "end of print statement",
            TokenKind::BlockStart => "start of statement block",
            TokenKind::BlockEnd => "end of statement block",
            TokenKind::Integer(n) => return write!(f, "{}", n),
            TokenKind::Float(x) => return write!(f, "{}", x),
            TokenKind::String(s) => return write!(f, "'{}'", s),
            TokenKind::Bool(b) => return write!(f, "{}", b),
            TokenKind::None => "none",
            TokenKind::Identifier(name) => return write!(f, "'{}'", name),
            TokenKind::And => "and",
            TokenKind::Or => "or",
            TokenKind::Not => "not",
            TokenKind::In => "in",
            TokenKind::Is => "is",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::StarStar => "**",
            TokenKind::Slash => "/",
            TokenKind::SlashSlash => "//",
            TokenKind::Percent => "%",
            TokenKind::Tilde => "~",
            TokenKind::Equal => "==",
            TokenKind::NotEqual => "!=",
            TokenKind::Less => "<",
            TokenKind::LessEqual => "<=",
            TokenKind::Greater => ">",
            TokenKind::GreaterEqual => ">=",
            TokenKind::Assign => "=",
            TokenKind::Pipe => "|",
            TokenKind::LeftParen => "(",
            TokenKind::RightParen => ")",
            TokenKind::LeftBrace => "{",
            TokenKind::RightBrace => "}",
            TokenKind::LeftBracket => "[",
            TokenKind::RightBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Colon => ":",
            TokenKind::Eof => "end of template",
        };
        f.write_str(text)
    }
}

/// A token with position information
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
    pub lexeme: String,
}

impl Token {
    pub fn new(kind: TokenKind, line: usize, column: usize, lexeme: String) -> Self {
        Token {
            kind,
            line,
            column,
            lexeme,
        }
    }
}

/// Which closing delimiter the current tag expects
#[derive(Debug, Clone, Copy, PartialEq)]
enum Tag {
    Variable,
    Block,
}

/// Lexer for tokenizing template source
pub struct Lexer<'a> {
    source: &'a str,
    config: &'a Config,
    pos: usize,
    line: usize,
    column: usize,
    /// Open `(`, `[` and `{` inside the current tag
    depth: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, config: &'a Config) -> Self {
        let source = if config.keep_trailing_newline {
            source
        } else {
            source
                .strip_suffix("\r\n")
                .or_else(|| source.strip_suffix('\n'))
                .unwrap_or(source)
        };
        Lexer {
            source,
            config,
            pos: 0,
            line: 1,
            column: 1,
            depth: 0,
        }
    }

    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_str(&mut self, expected: &str) -> bool {
        if self.rest().starts_with(expected) {
            for _ in expected.chars() {
                self.advance();
            }
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::LexerError {
            line: self.line,
            column: self.column,
            message: message.into(),
        }
    }

    /// Tokenize the whole template, ending with `Eof`
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        while self.pos < self.source.len() {
            self.scan_data(&mut tokens)?;
        }
        tokens.push(Token::new(TokenKind::Eof, self.line, self.column, String::new()));
        Ok(tokens)
    }

    /// Text up to the next tag, then the tag itself
    fn scan_data(&mut self, tokens: &mut Vec<Token>) -> Result<()> {
        let config = self.config;
        let (line, column) = (self.line, self.column);
        let start = self.pos;

        while self.pos < self.source.len() {
            let rest = self.rest();
            if rest.starts_with(&config.comment_start)
                || rest.starts_with(&config.variable_start)
                || rest.starts_with(&config.block_start)
            {
                break;
            }
            self.advance();
        }
        if self.pos > start {
            let text = &self.source[start..self.pos];
            tokens.push(Token::new(
                TokenKind::Text(text.to_string()),
                line,
                column,
                text.to_string(),
            ));
        }

        let (line, column) = (self.line, self.column);
        if self.match_str(&config.comment_start) {
            self.skip_comment(line, column)
        } else if self.match_str(&config.variable_start) {
            tokens.push(Token::new(
                TokenKind::VariableStart,
                line,
                column,
                config.variable_start.clone(),
            ));
            self.scan_tag(Tag::Variable, tokens)
        } else if self.match_str(&config.block_start) {
            tokens.push(Token::new(
                TokenKind::BlockStart,
                line,
                column,
                config.block_start.clone(),
            ));
            self.scan_tag(Tag::Block, tokens)
        } else {
            Ok(())
        }
    }

    fn skip_comment(&mut self, line: usize, column: usize) -> Result<()> {
        let end = &self.config.comment_end;
        while self.pos < self.source.len() {
            if self.match_str(end) {
                return Ok(());
            }
            self.advance();
        }
        Err(TemplateError::LexerError {
            line,
            column,
            message: "unterminated comment".to_string(),
        })
    }

    /// Tokens inside a tag, through its closing delimiter
    fn scan_tag(&mut self, tag: Tag, tokens: &mut Vec<Token>) -> Result<()> {
        let config = self.config;
        let (end, end_kind) = match tag {
            Tag::Variable => (&config.variable_end, TokenKind::VariableEnd),
            Tag::Block => (&config.block_end, TokenKind::BlockEnd),
        };
        self.depth = 0;

        loop {
            while matches!(self.peek(), Some(c) if c.is_whitespace()) {
                self.advance();
            }
            let (line, column) = (self.line, self.column);
            if self.pos >= self.source.len() {
                return Err(self.error(format!(
                    "unexpected end of template, expected '{}'",
                    end
                )));
            }
            if self.depth == 0 && self.match_str(end) {
                tokens.push(Token::new(end_kind, line, column, end.clone()));
                return Ok(());
            }
            let token = self.scan_token(line, column)?;
            tokens.push(token);
        }
    }

    fn scan_token(&mut self, line: usize, column: usize) -> Result<Token> {
        let start = self.pos;
        let ch = match self.advance() {
            Some(ch) => ch,
            None => return Err(self.error("unexpected end of template")),
        };

        let kind = match ch {
            '"' | '\'' => return self.scan_string(ch, line, column),
            '0'..='9' => return self.scan_number(start, line, column),
            c if c.is_alphabetic() || c == '_' => return Ok(self.scan_identifier(start, line, column)),

            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => {
                if self.match_char('*') {
                    TokenKind::StarStar
                } else {
                    TokenKind::Star
                }
            }
            '/' => {
                if self.match_char('/') {
                    TokenKind::SlashSlash
                } else {
                    TokenKind::Slash
                }
            }
            '%' => TokenKind::Percent,
            '~' => TokenKind::Tilde,
            '=' => {
                if self.match_char('=') {
                    TokenKind::Equal
                } else {
                    TokenKind::Assign
                }
            }
            '!' => {
                if self.match_char('=') {
                    TokenKind::NotEqual
                } else {
                    return Err(TemplateError::LexerError {
                        line,
                        column,
                        message: "unexpected character '!'".to_string(),
                    });
                }
            }
            '<' => {
                if self.match_char('=') {
                    TokenKind::LessEqual
                } else {
                    TokenKind::Less
                }
            }
            '>' => {
                if self.match_char('=') {
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::Greater
                }
            }
            '|' => TokenKind::Pipe,

            '(' | '[' | '{' => {
                self.depth += 1;
                match ch {
                    '(' => TokenKind::LeftParen,
                    '[' => TokenKind::LeftBracket,
                    _ => TokenKind::LeftBrace,
                }
            }
            ')' | ']' | '}' => {
                self.depth = self.depth.saturating_sub(1);
                match ch {
                    ')' => TokenKind::RightParen,
                    ']' => TokenKind::RightBracket,
                    _ => TokenKind::RightBrace,
                }
            }

            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            ':' => TokenKind::Colon,

            other => {
                return Err(TemplateError::LexerError {
                    line,
                    column,
                    message: format!("unexpected character '{}'", other),
                })
            }
        };

        Ok(Token::new(
            kind,
            line,
            column,
            self.source[start..self.pos].to_string(),
        ))
    }

    fn scan_string(&mut self, quote: char, line: usize, column: usize) -> Result<Token> {
        let start = self.pos - quote.len_utf8();
        let mut value = String::new();

        loop {
            let ch = match self.advance() {
                Some(ch) => ch,
                None => {
                    return Err(TemplateError::LexerError {
                        line,
                        column,
                        message: "unterminated string literal".to_string(),
                    })
                }
            };
            if ch == quote {
                break;
            }
            if ch != '\\' {
                value.push(ch);
                continue;
            }
            match self.advance() {
                Some('n') => value.push('\n'),
                Some('t') => value.push('\t'),
                Some('r') => value.push('\r'),
                Some(c @ ('\\' | '"' | '\'')) => value.push(c),
                Some(c) => {
                    value.push('\\');
                    value.push(c);
                }
                None => {
                    return Err(TemplateError::LexerError {
                        line,
                        column,
                        message: "unterminated string literal".to_string(),
                    })
                }
            }
        }

        Ok(Token::new(
            TokenKind::String(value),
            line,
            column,
            self.source[start..self.pos].to_string(),
        ))
    }

    fn scan_number(&mut self, start: usize, line: usize, column: usize) -> Result<Token> {
        let mut digits = String::from(&self.source[start..self.pos]);
        let mut is_float = false;

        self.take_digits(&mut digits);

        // `1.2` is a float, `1.real` is attribute access
        if self.peek() == Some('.') && matches!(self.peek_next(), Some(c) if c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            digits.push('.');
            self.take_digits(&mut digits);
        }

        if matches!(self.peek(), Some('e') | Some('E')) {
            let exponent_follows = match self.peek_next() {
                Some(c) if c.is_ascii_digit() => true,
                Some('+') | Some('-') => {
                    matches!(self.rest().chars().nth(2), Some(c) if c.is_ascii_digit())
                }
                _ => false,
            };
            if exponent_follows {
                is_float = true;
                self.advance();
                digits.push('e');
                if let Some(sign @ ('+' | '-')) = self.peek() {
                    self.advance();
                    digits.push(sign);
                }
                self.take_digits(&mut digits);
            }
        }

        let lexeme = self.source[start..self.pos].to_string();
        let kind = if is_float {
            digits.parse::<f64>().map(TokenKind::Float).ok()
        } else {
            digits.parse::<i64>().map(TokenKind::Integer).ok()
        };
        match kind {
            Some(kind) => Ok(Token::new(kind, line, column, lexeme)),
            None => Err(TemplateError::LexerError {
                line,
                column,
                message: format!("invalid number literal '{}'", lexeme),
            }),
        }
    }

    /// Digits with `_` separators dropped
    fn take_digits(&mut self, digits: &mut String) {
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits.push(ch);
            } else if ch != '_' {
                break;
            }
            self.advance();
        }
    }

    fn scan_identifier(&mut self, start: usize, line: usize, column: usize) -> Token {
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        let ident = &self.source[start..self.pos];

        let kind = match ident {
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "in" => TokenKind::In,
            "is" => TokenKind::Is,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "true" | "True" => TokenKind::Bool(true),
            "false" | "False" => TokenKind::Bool(false),
            "none" | "None" => TokenKind::None,
            _ => TokenKind::Identifier(ident.to_string()),
        };

        Token::new(kind, line, column, ident.to_string())
    }
}

/// Tokenize `source` with the given syntax
pub fn tokenize(source: &str, config: &Config) -> Result<Vec<Token>> {
    Lexer::new(source, config).tokenize()
}
