//! Parser for Kiln templates
//!
//! Transforms a stream of tokens into a [`Template`]. Expressions are parsed
//! by recursive descent, lowest precedence first:
//!
//! `a if c else b` → `or` → `and` → `not` → comparisons, `in`, `is` → `~`
//! → `+ -` → `* / // %` → unary `- +` → `**` → postfix (`.x`, `[i]`,
//! `[a:b]`, `(args)`, `| filter`) → primary

use crate::ast::*;
use crate::config::Config;
use crate::error::{Position, Result, TemplateError};
use crate::lexer::{tokenize, Token, TokenKind};

/// Parser for template token streams
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !matches!(tokens.last(), Some(Token { kind: TokenKind::Eof, .. })) {
            let (line, column) = tokens.last().map_or((1, 1), |t| (t.line, t.column));
            tokens.push(Token::new(TokenKind::Eof, line, column, String::new()));
        }
        Parser { tokens, current: 0 }
    }

    /// Parse a complete template
    pub fn parse(&mut self, name: &str) -> Result<Template> {
        let nodes = self.block(&[])?;
        Ok(Template {
            name: name.to_string(),
            nodes,
        })
    }

    // Helper methods

    fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.current + offset).min(last)]
    }

    /// Consume the current token; `Eof` is never consumed
    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.is_at_end() {
            self.current += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.check_at(0, kind)
    }

    fn check_at(&self, offset: usize, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek_at(offset).kind) == std::mem::discriminant(kind)
    }

    fn match_token(&mut self, kinds: &[TokenKind]) -> bool {
        for kind in kinds {
            if self.check(kind) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn consume(&mut self, kind: &TokenKind, context: &str) -> Result<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(format!(
                "Expected {} {}, found {}",
                kind,
                context,
                self.peek().kind
            )))
        }
    }

    fn consume_identifier(&mut self, context: &str) -> Result<String> {
        if let TokenKind::Identifier(name) = &self.peek().kind {
            let name = name.clone();
            self.advance();
            return Ok(name);
        }
        Err(self.error(format!("Expected name {}, found {}", context, self.peek().kind)))
    }

    fn position(&self) -> Position {
        let token = self.peek();
        Position::new(token.line, token.column)
    }

    fn error(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::ParserError {
            line: self.peek().line,
            message: message.into(),
        }
    }

    // Statements

    /// Nodes up to, but not including, a `{% tag %}` named in `end_tags`
    fn block(&mut self, end_tags: &[&str]) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        loop {
            match self.peek().kind.clone() {
                TokenKind::Eof => {
                    if end_tags.is_empty() {
                        return Ok(nodes);
                    }
                    let expected: Vec<String> =
                        end_tags.iter().map(|t| format!("'{}'", t)).collect();
                    return Err(self.error(format!(
                        "Unexpected end of template, expected {}",
                        expected.join(" or ")
                    )));
                }
                TokenKind::Text(text) => {
                    self.advance();
                    nodes.push(Node::Text(text));
                }
                TokenKind::VariableStart => {
                    self.advance();
                    let expr = self.expression()?;
                    self.consume(&TokenKind::VariableEnd, "after expression")?;
                    nodes.push(Node::Output(expr));
                }
                TokenKind::BlockStart => {
                    let tag = self.peek_tag()?;
                    if end_tags.contains(&tag.as_str()) {
                        return Ok(nodes);
                    }
                    self.advance();
                    nodes.push(self.statement(&tag)?);
                }
                other => return Err(self.error(format!("Unexpected {}", other))),
            }
        }
    }

    /// Name of the tag opened by the `BlockStart` at the cursor
    fn peek_tag(&self) -> Result<String> {
        match &self.peek_at(1).kind {
            TokenKind::Identifier(name) => Ok(name.clone()),
            TokenKind::If => Ok("if".to_string()),
            TokenKind::Else => Ok("else".to_string()),
            other => Err(TemplateError::ParserError {
                line: self.peek_at(1).line,
                message: format!("Expected tag name, found {}", other),
            }),
        }
    }

    /// Consume `{% name` of an intermediate or closing tag
    fn open_tag(&mut self) -> Result<String> {
        let tag = self.peek_tag()?;
        self.advance();
        self.advance();
        Ok(tag)
    }

    fn statement(&mut self, tag: &str) -> Result<Node> {
        self.advance();
        match tag {
            "if" => self.if_statement(),
            "for" => self.for_statement(),
            "set" => self.set_statement(),
            "with" => self.with_statement(),
            "macro" => self.macro_statement(),
            _ => Err(self.error(format!("Unknown tag '{}'", tag))),
        }
    }

    fn if_statement(&mut self) -> Result<Node> {
        let condition = self.expression()?;
        self.consume(&TokenKind::BlockEnd, "after if condition")?;
        let body = self.block(&["elif", "else", "endif"])?;
        let mut branches = vec![IfBranch { condition, body }];
        let mut else_branch = None;

        loop {
            match self.open_tag()?.as_str() {
                "elif" => {
                    let condition = self.expression()?;
                    self.consume(&TokenKind::BlockEnd, "after elif condition")?;
                    let body = self.block(&["elif", "else", "endif"])?;
                    branches.push(IfBranch { condition, body });
                }
                "else" => {
                    self.consume(&TokenKind::BlockEnd, "after 'else'")?;
                    else_branch = Some(self.block(&["endif"])?);
                }
                _ => {
                    self.consume(&TokenKind::BlockEnd, "after 'endif'")?;
                    break;
                }
            }
        }

        Ok(Node::If {
            branches,
            else_branch,
        })
    }

    fn for_statement(&mut self) -> Result<Node> {
        let targets = self.target_names("after 'for'")?;
        self.consume(&TokenKind::In, "after loop variables")?;
        let iterable = self.expression()?;
        self.consume(&TokenKind::BlockEnd, "after loop iterable")?;

        let body = self.block(&["else", "endfor"])?;
        let else_branch = if self.open_tag()? == "else" {
            self.consume(&TokenKind::BlockEnd, "after 'else'")?;
            let nodes = self.block(&["endfor"])?;
            self.open_tag()?;
            Some(nodes)
        } else {
            None
        };
        self.consume(&TokenKind::BlockEnd, "after 'endfor'")?;

        Ok(Node::For {
            targets,
            iterable,
            body,
            else_branch,
        })
    }

    fn set_statement(&mut self) -> Result<Node> {
        let targets = self.target_names("after 'set'")?;

        if self.match_token(&[TokenKind::Assign]) {
            let value = self.expression_list()?;
            self.consume(&TokenKind::BlockEnd, "after set value")?;
            return Ok(Node::Set { targets, value });
        }

        if targets.len() != 1 {
            return Err(self.error("Block set takes exactly one name"));
        }
        self.consume(&TokenKind::BlockEnd, "after set name")?;
        let body = self.block(&["endset"])?;
        self.open_tag()?;
        self.consume(&TokenKind::BlockEnd, "after 'endset'")?;
        Ok(Node::SetBlock {
            name: targets.into_iter().next().unwrap_or_default(),
            body,
        })
    }

    fn with_statement(&mut self) -> Result<Node> {
        let mut assignments = Vec::new();
        while !self.check(&TokenKind::BlockEnd) {
            let name = self.consume_identifier("in 'with'")?;
            self.consume(&TokenKind::Assign, "after name in 'with'")?;
            assignments.push((name, self.expression()?));
            if !self.match_token(&[TokenKind::Comma]) {
                break;
            }
        }
        self.consume(&TokenKind::BlockEnd, "after 'with' assignments")?;
        let body = self.block(&["endwith"])?;
        self.open_tag()?;
        self.consume(&TokenKind::BlockEnd, "after 'endwith'")?;
        Ok(Node::With { assignments, body })
    }

    fn macro_statement(&mut self) -> Result<Node> {
        let name = self.consume_identifier("after 'macro'")?;
        self.consume(&TokenKind::LeftParen, "after macro name")?;
        let mut params = Vec::new();
        while !self.check(&TokenKind::RightParen) {
            let param = self.consume_identifier("in macro parameters")?;
            let default = if self.match_token(&[TokenKind::Assign]) {
                Some(self.expression()?)
            } else {
                None
            };
            if default.is_none() && params.iter().any(|p: &MacroParam| p.default.is_some()) {
                return Err(self.error(format!(
                    "Parameter '{}' without a default follows a parameter with one",
                    param
                )));
            }
            params.push(MacroParam {
                name: param,
                default,
            });
            if !self.match_token(&[TokenKind::Comma]) {
                break;
            }
        }
        self.consume(&TokenKind::RightParen, "after macro parameters")?;
        self.consume(&TokenKind::BlockEnd, "after macro signature")?;
        let body = self.block(&["endmacro"])?;
        self.open_tag()?;
        self.consume(&TokenKind::BlockEnd, "after 'endmacro'")?;
        Ok(Node::Macro(MacroDef { name, params, body }))
    }

    /// `a` or `a, b, ...`
    fn target_names(&mut self, context: &str) -> Result<Vec<String>> {
        let mut names = vec![self.consume_identifier(context)?];
        while self.match_token(&[TokenKind::Comma]) {
            names.push(self.consume_identifier("after ','")?);
        }
        Ok(names)
    }

    // Expressions

    pub fn expression(&mut self) -> Result<Expression> {
        self.conditional()
    }

    /// `a, b` without brackets builds a list
    fn expression_list(&mut self) -> Result<Expression> {
        let first = self.expression()?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }
        let position = first.position;
        let mut items = vec![first];
        while self.match_token(&[TokenKind::Comma]) {
            if self.check(&TokenKind::BlockEnd) {
                break;
            }
            items.push(self.expression()?);
        }
        Ok(Expression::new(ExpressionKind::List(items), position))
    }

    fn conditional(&mut self) -> Result<Expression> {
        let expr = self.or()?;
        if !self.match_token(&[TokenKind::If]) {
            return Ok(expr);
        }
        let position = expr.position;
        let condition = self.or()?;
        let else_branch = if self.match_token(&[TokenKind::Else]) {
            Some(Box::new(self.conditional()?))
        } else {
            None
        };
        Ok(Expression::new(
            ExpressionKind::Conditional {
                condition: Box::new(condition),
                then_branch: Box::new(expr),
                else_branch,
            },
            position,
        ))
    }

    fn or(&mut self) -> Result<Expression> {
        let mut expr = self.and()?;
        while self.match_token(&[TokenKind::Or]) {
            let right = self.and()?;
            expr = binary(expr, BinaryOp::Or, right);
        }
        Ok(expr)
    }

    fn and(&mut self) -> Result<Expression> {
        let mut expr = self.not()?;
        while self.match_token(&[TokenKind::And]) {
            let right = self.not()?;
            expr = binary(expr, BinaryOp::And, right);
        }
        Ok(expr)
    }

    fn not(&mut self) -> Result<Expression> {
        let position = self.position();
        if self.match_token(&[TokenKind::Not]) {
            let operand = self.not()?;
            return Ok(Expression::new(
                ExpressionKind::Unary {
                    operator: UnaryOp::Not,
                    operand: Box::new(operand),
                },
                position,
            ));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expression> {
        let mut expr = self.concat()?;
        loop {
            if let Some(operator) = self.match_operator(&[
                (TokenKind::Equal, BinaryOp::Eq),
                (TokenKind::NotEqual, BinaryOp::Ne),
                (TokenKind::Less, BinaryOp::Lt),
                (TokenKind::LessEqual, BinaryOp::Le),
                (TokenKind::Greater, BinaryOp::Gt),
                (TokenKind::GreaterEqual, BinaryOp::Ge),
                (TokenKind::In, BinaryOp::In),
            ]) {
                let right = self.concat()?;
                expr = binary(expr, operator, right);
            } else if self.check(&TokenKind::Not) && self.check_at(1, &TokenKind::In) {
                self.advance();
                self.advance();
                let right = self.concat()?;
                expr = binary(expr, BinaryOp::NotIn, right);
            } else if self.match_token(&[TokenKind::Is]) {
                expr = self.test(expr)?;
            } else {
                break;
            }
        }
        Ok(expr)
    }

    /// `input is [not] name`, `name(args)` or `name arg`
    fn test(&mut self, input: Expression) -> Result<Expression> {
        let position = input.position;
        let negated = self.match_token(&[TokenKind::Not]);
        let token = self.advance();
        let name = match word(&token) {
            Some(name) => name,
            None => {
                return Err(TemplateError::ParserError {
                    line: token.line,
                    message: format!("Expected test name after 'is', found {}", token.kind),
                })
            }
        };

        let arguments = if self.match_token(&[TokenKind::LeftParen]) {
            self.call_arguments()?
        } else if self.starts_bare_argument() {
            CallArguments {
                positional: vec![self.postfix()?],
                keyword: Vec::new(),
            }
        } else {
            CallArguments::default()
        };

        Ok(Expression::new(
            ExpressionKind::Test {
                input: Box::new(input),
                name,
                arguments,
                negated,
            },
            position,
        ))
    }

    fn starts_bare_argument(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Integer(_)
                | TokenKind::Float(_)
                | TokenKind::String(_)
                | TokenKind::Bool(_)
                | TokenKind::None
                | TokenKind::Identifier(_)
        )
    }

    fn concat(&mut self) -> Result<Expression> {
        let mut expr = self.term()?;
        while self.match_token(&[TokenKind::Tilde]) {
            let right = self.term()?;
            expr = binary(expr, BinaryOp::Concat, right);
        }
        Ok(expr)
    }

    fn term(&mut self) -> Result<Expression> {
        let mut expr = self.factor()?;
        while let Some(operator) = self.match_operator(&[
            (TokenKind::Plus, BinaryOp::Add),
            (TokenKind::Minus, BinaryOp::Sub),
        ]) {
            let right = self.factor()?;
            expr = binary(expr, operator, right);
        }
        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expression> {
        let mut expr = self.unary()?;
        while let Some(operator) = self.match_operator(&[
            (TokenKind::Star, BinaryOp::Mul),
            (TokenKind::Slash, BinaryOp::Div),
            (TokenKind::SlashSlash, BinaryOp::FloorDiv),
            (TokenKind::Percent, BinaryOp::Mod),
        ]) {
            let right = self.unary()?;
            expr = binary(expr, operator, right);
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expression> {
        let position = self.position();
        let operator = if self.match_token(&[TokenKind::Minus]) {
            UnaryOp::Neg
        } else if self.match_token(&[TokenKind::Plus]) {
            UnaryOp::Pos
        } else {
            return self.power();
        };
        let operand = self.unary()?;
        Ok(Expression::new(
            ExpressionKind::Unary {
                operator,
                operand: Box::new(operand),
            },
            position,
        ))
    }

    /// `**` is right-associative and binds tighter than a unary minus on its left
    fn power(&mut self) -> Result<Expression> {
        let base = self.postfix()?;
        if self.match_token(&[TokenKind::StarStar]) {
            let exponent = self.unary()?;
            return Ok(binary(base, BinaryOp::Pow, exponent));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<Expression> {
        let mut expr = self.primary()?;

        loop {
            let position = expr.position;
            if self.match_token(&[TokenKind::Dot]) {
                let token = self.advance();
                let kind = match (&token.kind, word(&token)) {
                    (TokenKind::Integer(n), _) => ExpressionKind::Index {
                        object: Box::new(expr),
                        index: Some(Box::new(Expression::new(
                            ExpressionKind::Integer(*n),
                            Position::new(token.line, token.column),
                        ))),
                    },
                    (_, Some(name)) => {
                        if self.match_token(&[TokenKind::LeftParen]) {
                            ExpressionKind::MethodCall {
                                object: Box::new(expr),
                                method: name,
                                arguments: self.call_arguments()?,
                            }
                        } else {
                            ExpressionKind::Attribute {
                                object: Box::new(expr),
                                name,
                            }
                        }
                    }
                    (other, None) => {
                        return Err(TemplateError::ParserError {
                            line: token.line,
                            message: format!("Expected attribute name after '.', found {}", other),
                        })
                    }
                };
                expr = Expression::new(kind, position);
            } else if self.match_token(&[TokenKind::LeftBracket]) {
                expr = self.subscript(expr)?;
            } else if self.match_token(&[TokenKind::LeftParen]) {
                let arguments = self.call_arguments()?;
                expr = Expression::new(
                    ExpressionKind::Call {
                        function: Box::new(expr),
                        arguments,
                    },
                    position,
                );
            } else if self.match_token(&[TokenKind::Pipe]) {
                let name = self.consume_identifier("after '|'")?;
                let arguments = if self.match_token(&[TokenKind::LeftParen]) {
                    self.call_arguments()?
                } else {
                    CallArguments::default()
                };
                expr = Expression::new(
                    ExpressionKind::Filter {
                        input: Box::new(expr),
                        name,
                        arguments,
                    },
                    position,
                );
            } else {
                break;
            }
        }

        Ok(expr)
    }

    /// After `[`: `[]`, `[i]`, or `[a:b]` with either bound optional
    fn subscript(&mut self, object: Expression) -> Result<Expression> {
        let position = object.position;
        let object = Box::new(object);

        if self.match_token(&[TokenKind::RightBracket]) {
            return Ok(Expression::new(
                ExpressionKind::Index {
                    object,
                    index: None,
                },
                position,
            ));
        }

        let start = if self.check(&TokenKind::Colon) {
            None
        } else {
            Some(Box::new(self.expression()?))
        };

        if self.match_token(&[TokenKind::Colon]) {
            let stop = if self.check(&TokenKind::RightBracket) || self.check(&TokenKind::Colon) {
                None
            } else {
                Some(Box::new(self.expression()?))
            };
            if self.check(&TokenKind::Colon) {
                return Err(self.error("Slice step is not supported"));
            }
            self.consume(&TokenKind::RightBracket, "after slice")?;
            return Ok(Expression::new(
                ExpressionKind::Slice {
                    object,
                    start,
                    stop,
                },
                position,
            ));
        }

        self.consume(&TokenKind::RightBracket, "after index")?;
        Ok(Expression::new(
            ExpressionKind::Index {
                object,
                index: start,
            },
            position,
        ))
    }

    /// After `(`: positional then keyword arguments, through `)`
    fn call_arguments(&mut self) -> Result<CallArguments> {
        let mut arguments = CallArguments::default();
        while !self.check(&TokenKind::RightParen) {
            let keyword = match (&self.peek().kind, &self.peek_at(1).kind) {
                (TokenKind::Identifier(name), TokenKind::Assign) => Some(name.clone()),
                _ => None,
            };
            match keyword {
                Some(name) => {
                    if arguments.keyword.iter().any(|(existing, _)| *existing == name) {
                        return Err(self.error(format!("Keyword argument repeated: {}", name)));
                    }
                    self.advance();
                    self.advance();
                    let value = self.expression()?;
                    arguments.keyword.push((name, value));
                }
                None => {
                    if !arguments.keyword.is_empty() {
                        return Err(self.error("Positional argument follows keyword argument"));
                    }
                    arguments.positional.push(self.expression()?);
                }
            }
            if !self.match_token(&[TokenKind::Comma]) {
                break;
            }
        }
        self.consume(&TokenKind::RightParen, "after arguments")?;
        Ok(arguments)
    }

    fn primary(&mut self) -> Result<Expression> {
        let position = self.position();
        let token = self.advance();

        let kind = match token.kind {
            TokenKind::Integer(n) => ExpressionKind::Integer(n),
            TokenKind::Float(f) => ExpressionKind::Float(f),
            TokenKind::String(s) => ExpressionKind::String(s),
            TokenKind::Bool(b) => ExpressionKind::Bool(b),
            TokenKind::None => ExpressionKind::Nil,
            TokenKind::Identifier(name) => ExpressionKind::Name(name),

            TokenKind::LeftParen => {
                if self.match_token(&[TokenKind::RightParen]) {
                    ExpressionKind::List(Vec::new())
                } else {
                    let first = self.expression()?;
                    if !self.check(&TokenKind::Comma) {
                        self.consume(&TokenKind::RightParen, "after expression")?;
                        return Ok(first);
                    }
                    let mut items = vec![first];
                    while self.match_token(&[TokenKind::Comma]) {
                        if self.check(&TokenKind::RightParen) {
                            break;
                        }
                        items.push(self.expression()?);
                    }
                    self.consume(&TokenKind::RightParen, "after tuple")?;
                    ExpressionKind::List(items)
                }
            }

            TokenKind::LeftBracket => {
                let mut items = Vec::new();
                while !self.check(&TokenKind::RightBracket) {
                    items.push(self.expression()?);
                    if !self.match_token(&[TokenKind::Comma]) {
                        break;
                    }
                }
                self.consume(&TokenKind::RightBracket, "after list items")?;
                ExpressionKind::List(items)
            }

            TokenKind::LeftBrace => {
                let mut entries = Vec::new();
                while !self.check(&TokenKind::RightBrace) {
                    let key = self.expression()?;
                    self.consume(&TokenKind::Colon, "after dict key")?;
                    let value = self.expression()?;
                    entries.push((key, value));
                    if !self.match_token(&[TokenKind::Comma]) {
                        break;
                    }
                }
                self.consume(&TokenKind::RightBrace, "after dict entries")?;
                ExpressionKind::Dict(entries)
            }

            other => {
                return Err(TemplateError::ParserError {
                    line: token.line,
                    message: format!("Unexpected {}", other),
                })
            }
        };

        Ok(Expression::new(kind, position))
    }

    /// Consume the first operator in `table` found at the cursor
    fn match_operator(&mut self, table: &[(TokenKind, BinaryOp)]) -> Option<BinaryOp> {
        let operator = table
            .iter()
            .find(|(kind, _)| self.check(kind))
            .map(|(_, operator)| *operator)?;
        self.advance();
        Some(operator)
    }
}

fn binary(left: Expression, operator: BinaryOp, right: Expression) -> Expression {
    let position = left.position;
    Expression::new(
        ExpressionKind::Binary {
            left: Box::new(left),
            operator,
            right: Box::new(right),
        },
        position,
    )
}

/// A name-like token: identifiers, plus keywords used as attribute or test names
fn word(token: &Token) -> Option<String> {
    match &token.kind {
        TokenKind::Identifier(name) => Some(name.clone()),
        TokenKind::None
        | TokenKind::Bool(_)
        | TokenKind::And
        | TokenKind::Or
        | TokenKind::Not
        | TokenKind::In
        | TokenKind::Is
        | TokenKind::If
        | TokenKind::Else => Some(token.lexeme.clone()),
        _ => None,
    }
}

impl Template {
    /// Tokenize and parse `source`
    pub fn parse(name: &str, source: &str, config: &Config) -> Result<Template> {
        let tokens = tokenize(source, config)?;
        Parser::new(tokens).parse(name)
    }
}
