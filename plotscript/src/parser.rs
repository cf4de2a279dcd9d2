//! Statement parser
//!
//! Recursive descent over the tokens of one statement (the separators
//! are already stripped). Precedence, lowest first:
//!
//! ```text
//! comparison  == != < <= > >=     (left)
//! additive    + -                 (left)
//! term        * / %               (left)
//! unary       - +                 (prefix)
//! power       ^                   (right, exponent may be unary)
//! postfix     f(args)
//! primary     literal, name, (expr), fn(params) => expr
//! ```

use crate::ast::{Expr, ExprKind, Statement, StatementKind, UnaryOp};
use crate::lexer::{Delimiter, Keyword, NumberLiteral, Operator, Token, TokenKind};
use plotscript_core::{BinaryOp, ParseError, ParseErrorKind, Span};
use std::collections::HashSet;
use std::sync::Arc;

/// Deepest expression nesting accepted, counting parentheses, prefix
/// operators and the links of an operator chain
pub const MAX_DEPTH: usize = 200;

/// Parse one statement from `tokens`.
///
/// `end` is where the statement stops in the source, used for
/// "unexpected end" errors.
pub fn parse_statement(tokens: &[Token], end: usize) -> Result<Statement, ParseError> {
    Parser::new(tokens, end).statement()
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    end: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token], end: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            end,
            depth: 0,
        }
    }

    // ========== Statements ==========

    fn statement(&mut self) -> Result<Statement, ParseError> {
        let (Some(first), Some(last)) = (self.tokens.first(), self.tokens.last()) else {
            return Ok(Statement {
                kind: StatementKind::Empty,
                span: Span::point(self.end),
            });
        };
        let span = first.span.to(last.span);

        let kind = if let Some(kind) = self.assignment()? {
            kind
        } else if let Some(kind) = self.definition()? {
            kind
        } else {
            let expr = self.parse_comparison()?;
            self.finish()?;
            StatementKind::Expr(expr)
        };

        Ok(Statement { kind, span })
    }

    /// `name = expr`
    fn assignment(&mut self) -> Result<Option<StatementKind>, ParseError> {
        let tokens = self.tokens;
        let [Token { kind: TokenKind::Ident(name), .. }, Token { kind: TokenKind::Operator(Operator::Assign), .. }, ..] =
            tokens
        else {
            return Ok(None);
        };

        self.pos = 2;
        let value = self.parse_comparison()?;
        self.finish()?;
        Ok(Some(StatementKind::Assign {
            name: name.clone(),
            value,
        }))
    }

    /// `name(p1, p2) = expr`; anything else that starts like a call is left
    /// to the expression parser.
    fn definition(&mut self) -> Result<Option<StatementKind>, ParseError> {
        let tokens = self.tokens;
        let [Token { kind: TokenKind::Ident(name), .. }, Token { kind: TokenKind::Delimiter(Delimiter::LParen), .. }, ..] =
            tokens
        else {
            return Ok(None);
        };

        let mut lookahead = Parser::new(self.tokens, self.end);
        lookahead.pos = 2;
        let Ok(params) = lookahead.parameters() else {
            return Ok(None);
        };
        if !lookahead.eat_operator(Operator::Assign) {
            return Ok(None);
        }

        *self = lookahead;
        let params = unique(params)?;
        let body = self.parse_comparison()?;
        self.finish()?;
        Ok(Some(StatementKind::Define {
            name: name.clone(),
            params,
            body: Arc::new(body),
        }))
    }

    /// Parameter names up to and including the closing `)`
    fn parameters(&mut self) -> Result<Vec<(String, Span)>, ParseError> {
        let mut params = Vec::new();
        if self.eat_delimiter(Delimiter::RParen) {
            return Ok(params);
        }

        loop {
            let token = self.next_token("parameter name")?;
            match &token.kind {
                TokenKind::Ident(name) => params.push((name.clone(), token.span)),
                _ => return Err(unexpected(token, "parameter name")),
            }

            if self.eat_delimiter(Delimiter::RParen) {
                return Ok(params);
            }
            self.expect_delimiter(Delimiter::Comma, "',' or ')'")?;
        }
    }

    /// Everything must be consumed
    fn finish(&mut self) -> Result<(), ParseError> {
        match self.peek() {
            None => Ok(()),
            Some(token) if token.kind == TokenKind::Operator(Operator::Assign) => Err(ParseError::new(
                ParseErrorKind::InvalidAssignmentTarget,
                token.span,
            )),
            Some(token) => Err(unexpected(token, "operator or end of statement")),
        }
    }

    // ========== Expressions ==========

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        self.chain(
            &[
                (Operator::Eq, BinaryOp::Eq),
                (Operator::Ne, BinaryOp::Ne),
                (Operator::Lt, BinaryOp::Lt),
                (Operator::Le, BinaryOp::Le),
                (Operator::Gt, BinaryOp::Gt),
                (Operator::Ge, BinaryOp::Ge),
            ],
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        self.chain(
            &[(Operator::Plus, BinaryOp::Add), (Operator::Minus, BinaryOp::Sub)],
            Self::parse_term,
        )
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        self.chain(
            &[
                (Operator::Star, BinaryOp::Mul),
                (Operator::Slash, BinaryOp::Div),
                (Operator::Percent, BinaryOp::Rem),
            ],
            Self::parse_unary,
        )
    }

    /// Left-associative `operand (op operand)*`
    fn chain(
        &mut self,
        operators: &[(Operator, BinaryOp)],
        operand: fn(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        let mut lhs = operand(self)?;
        loop {
            let at = self.peek().map_or(lhs.span, |t| t.span);
            let Some(op) = self.binary_operator(operators) else {
                return Ok(lhs);
            };
            let rhs = operand(self)?;
            lhs = shallow(binary(op, lhs, rhs), at)?;
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Operator(Operator::Minus)) => UnaryOp::Neg,
            Some(TokenKind::Operator(Operator::Plus)) => UnaryOp::Plus,
            _ => return self.parse_power(),
        };

        let start = self.advance_span();
        self.descend(start)?;
        let operand = self.parse_unary();
        self.depth -= 1;
        let operand = operand?;

        let span = start.to(operand.span);
        Ok(Expr::new(ExprKind::Unary(op, Box::new(operand)), span))
    }

    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_postfix()?;
        if !self.eat_operator(Operator::Caret) {
            return Ok(base);
        }

        self.descend(base.span)?;
        let exponent = self.parse_unary();
        self.depth -= 1;
        Ok(binary(BinaryOp::Pow, base, exponent?))
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        while self.eat_delimiter(Delimiter::LParen) {
            let (args, close) = self.arguments()?;
            let span = expr.span.to(close);
            let call = Expr::new(
                ExprKind::Call {
                    callee: Box::new(expr),
                    args,
                },
                span,
            );
            expr = shallow(call, close)?;
        }
        Ok(expr)
    }

    /// Call arguments after `(`; returns them with the span of `)`
    fn arguments(&mut self) -> Result<(Vec<Expr>, Span), ParseError> {
        let mut args = Vec::new();
        if let Some(close) = self.eat_delimiter_span(Delimiter::RParen) {
            return Ok((args, close));
        }

        loop {
            args.push(self.nested(Self::parse_comparison)?);
            if let Some(close) = self.eat_delimiter_span(Delimiter::RParen) {
                return Ok((args, close));
            }
            self.expect_delimiter(Delimiter::Comma, "',' or ')'")?;
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.next_token("expression")?;
        let span = token.span;

        match &token.kind {
            TokenKind::Number(NumberLiteral::Integer(i)) => Ok(Expr::new(ExprKind::Integer(*i), span)),
            TokenKind::Number(NumberLiteral::Float(x)) => Ok(Expr::new(ExprKind::Float(*x), span)),
            TokenKind::Ident(name) => Ok(Expr::new(ExprKind::Variable(name.clone()), span)),
            TokenKind::Delimiter(Delimiter::LParen) => {
                let inner = self.nested(Self::parse_comparison)?;
                let close = self.expect_delimiter(Delimiter::RParen, "')'")?;
                Ok(Expr::new(inner.kind, span.to(close)))
            }
            TokenKind::Keyword(Keyword::Fn) => self.lambda(span),
            _ => Err(unexpected(token, "expression")),
        }
    }

    /// `fn(params) => body`, after the keyword
    fn lambda(&mut self, start: Span) -> Result<Expr, ParseError> {
        self.expect_delimiter(Delimiter::LParen, "'('")?;
        let params = unique(self.parameters()?)?;

        let arrow = self.next_token("'=>'")?;
        if arrow.kind != TokenKind::Operator(Operator::Arrow) {
            return Err(unexpected(arrow, "'=>'"));
        }

        let body = self.nested(Self::parse_comparison)?;
        let span = start.to(body.span);
        Ok(Expr::new(
            ExprKind::Lambda {
                params,
                body: Arc::new(body),
            },
            span,
        ))
    }

    // ========== Token helpers ==========

    fn nested(&mut self, parse: fn(&mut Self) -> Result<Expr, ParseError>) -> Result<Expr, ParseError> {
        let at = self.peek().map(|t| t.span).unwrap_or(Span::point(self.end));
        self.descend(at)?;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn descend(&mut self, at: Span) -> Result<(), ParseError> {
        if self.depth >= MAX_DEPTH {
            return Err(ParseError::new(ParseErrorKind::TooDeep(MAX_DEPTH), at));
        }
        self.depth += 1;
        Ok(())
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn advance_span(&mut self) -> Span {
        let span = self.peek().map(|t| t.span).unwrap_or(Span::point(self.end));
        self.pos += 1;
        span
    }

    fn next_token(&mut self, expected: &'static str) -> Result<&'a Token, ParseError> {
        let token = self.peek().ok_or(ParseError::new(
            ParseErrorKind::UnexpectedEnd { expected },
            Span::point(self.end),
        ))?;
        self.pos += 1;
        Ok(token)
    }

    fn binary_operator(&mut self, table: &[(Operator, BinaryOp)]) -> Option<BinaryOp> {
        let TokenKind::Operator(found) = self.peek()?.kind else {
            return None;
        };
        let (_, op) = table.iter().find(|(candidate, _)| *candidate == found)?;
        self.pos += 1;
        Some(*op)
    }

    fn eat_operator(&mut self, op: Operator) -> bool {
        match self.peek() {
            Some(token) if token.kind == TokenKind::Operator(op) => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn eat_delimiter(&mut self, delimiter: Delimiter) -> bool {
        self.eat_delimiter_span(delimiter).is_some()
    }

    fn eat_delimiter_span(&mut self, delimiter: Delimiter) -> Option<Span> {
        match self.peek() {
            Some(token) if token.kind == TokenKind::Delimiter(delimiter) => {
                self.pos += 1;
                Some(token.span)
            }
            _ => None,
        }
    }

    fn expect_delimiter(&mut self, delimiter: Delimiter, expected: &'static str) -> Result<Span, ParseError> {
        let token = self.next_token(expected)?;
        if token.kind == TokenKind::Delimiter(delimiter) {
            Ok(token.span)
        } else {
            Err(unexpected(token, expected))
        }
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    let span = lhs.span.to(rhs.span);
    Expr::new(ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), span)
}

/// Reject trees taller than `MAX_DEPTH`; long operator chains nest as
/// deep as parentheses do.
fn shallow(expr: Expr, at: Span) -> Result<Expr, ParseError> {
    if expr.height() > MAX_DEPTH {
        return Err(ParseError::new(ParseErrorKind::TooDeep(MAX_DEPTH), at));
    }
    Ok(expr)
}

fn unexpected(token: &Token, expected: &'static str) -> ParseError {
    ParseError::new(
        ParseErrorKind::UnexpectedToken {
            found: token.kind.to_string(),
            expected,
        },
        token.span,
    )
}

fn unique(params: Vec<(String, Span)>) -> Result<Vec<String>, ParseError> {
    let mut seen = HashSet::new();
    for (name, span) in &params {
        if !seen.insert(name.as_str()) {
            return Err(ParseError::new(
                ParseErrorKind::DuplicateParameter(name.clone()),
                *span,
            ));
        }
    }
    Ok(params.into_iter().map(|(name, _)| name).collect())
}
