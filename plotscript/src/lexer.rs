//! Lexer
//!
//! `tokenize` turns source text into a flat token list. Splitting is done
//! by the pest grammar in `plotscript.pest`; this module classifies the
//! matches, folds signs into adjacent number literals and converts the
//! literal text into numbers.

use pest::Parser;
use pest_derive::Parser;
use plotscript_core::{LexError, LexErrorKind, Span};
use std::fmt;

#[derive(Parser)]
#[grammar = "plotscript.pest"]
struct TokenGrammar;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumberLiteral {
    Integer(i64),
    Float(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Fn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Assign,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Arrow,
}

impl Operator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Plus => "+",
            Operator::Minus => "-",
            Operator::Star => "*",
            Operator::Slash => "/",
            Operator::Percent => "%",
            Operator::Caret => "^",
            Operator::Assign => "=",
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Arrow => "=>",
        }
    }

    fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "+" => Operator::Plus,
            "-" => Operator::Minus,
            "*" => Operator::Star,
            "/" => Operator::Slash,
            "%" => Operator::Percent,
            "^" => Operator::Caret,
            "=" => Operator::Assign,
            "==" => Operator::Eq,
            "!=" => Operator::Ne,
            "<" => Operator::Lt,
            "<=" => Operator::Le,
            ">" => Operator::Gt,
            ">=" => Operator::Ge,
            "=>" => Operator::Arrow,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    LParen,
    RParen,
    Comma,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    Newline,
    Semicolon,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(NumberLiteral),
    Ident(String),
    Keyword(Keyword),
    Operator(Operator),
    Delimiter(Delimiter),
    Separator(Separator),
}

impl TokenKind {
    /// Tokens that end an operand; a sign after one of these is binary
    fn ends_operand(&self) -> bool {
        matches!(
            self,
            TokenKind::Number(_) | TokenKind::Ident(_) | TokenKind::Delimiter(Delimiter::RParen)
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Number(NumberLiteral::Integer(i)) => write!(f, "number {}", i),
            TokenKind::Number(NumberLiteral::Float(x)) => write!(f, "number {:?}", x),
            TokenKind::Ident(name) => write!(f, "identifier '{}'", name),
            TokenKind::Keyword(Keyword::Fn) => write!(f, "keyword 'fn'"),
            TokenKind::Operator(op) => write!(f, "'{}'", op.symbol()),
            TokenKind::Delimiter(Delimiter::LParen) => write!(f, "'('"),
            TokenKind::Delimiter(Delimiter::RParen) => write!(f, "')'"),
            TokenKind::Delimiter(Delimiter::Comma) => write!(f, "','"),
            TokenKind::Separator(Separator::Newline) => write!(f, "newline"),
            TokenKind::Separator(Separator::Semicolon) => write!(f, "';'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn is_separator(&self) -> bool {
        matches!(self.kind, TokenKind::Separator(_))
    }
}

/// Split `source` into tokens.
///
/// The first malformed construct aborts the call with a `LexError`.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let pairs = TokenGrammar::parse(Rule::tokens, source).map_err(|e| grammar_error(source, e))?;

    let mut tokens: Vec<Token> = Vec::new();
    for pair in pairs.flatten() {
        let span = Span::new(pair.as_span().start(), pair.as_span().end());
        let text = pair.as_str();

        let kind = match pair.as_rule() {
            Rule::number => {
                let start = fold_sign(&mut tokens, span);
                let span = Span::new(start, span.end);
                tokens.push(Token::new(TokenKind::Number(number(&source[span.range()], span)?), span));
                continue;
            }
            Rule::ident if text == "fn" => TokenKind::Keyword(Keyword::Fn),
            Rule::ident => TokenKind::Ident(text.to_string()),
            Rule::operator => match Operator::from_symbol(text) {
                Some(op) => TokenKind::Operator(op),
                None => return Err(unrecognized(text, span)),
            },
            Rule::delimiter => TokenKind::Delimiter(match text {
                "(" => Delimiter::LParen,
                ")" => Delimiter::RParen,
                _ => Delimiter::Comma,
            }),
            Rule::separator if text == ";" => TokenKind::Separator(Separator::Semicolon),
            Rule::separator => TokenKind::Separator(Separator::Newline),
            Rule::malformed_number => {
                return Err(LexError::new(LexErrorKind::MalformedNumber(text.to_string()), span))
            }
            Rule::unterminated_comment => {
                return Err(LexError::new(LexErrorKind::UnterminatedComment, span))
            }
            Rule::unknown => return Err(unrecognized(text, span)),
            _ => continue,
        };

        tokens.push(Token::new(kind, span));
    }

    Ok(tokens)
}

/// Pop a `+`/`-` directly in front of a number when it cannot be a binary
/// operator; returns where the literal starts.
fn fold_sign(tokens: &mut Vec<Token>, number: Span) -> usize {
    let folds = match tokens.as_slice() {
        [.., before, sign] => is_sign_at(sign, number) && !before.kind.ends_operand(),
        [sign] => is_sign_at(sign, number),
        [] => false,
    };

    match tokens.pop() {
        Some(sign) if folds => sign.span.start,
        Some(other) => {
            tokens.push(other);
            number.start
        }
        None => number.start,
    }
}

fn is_sign_at(token: &Token, number: Span) -> bool {
    matches!(token.kind, TokenKind::Operator(Operator::Plus | Operator::Minus))
        && token.span.end == number.start
}

fn number(text: &str, span: Span) -> Result<NumberLiteral, LexError> {
    let out_of_range = || LexError::new(LexErrorKind::NumberOutOfRange(text.to_string()), span);

    if text.contains(['.', 'e', 'E']) {
        let value: f64 = text
            .parse()
            .map_err(|_| LexError::new(LexErrorKind::MalformedNumber(text.to_string()), span))?;
        if !value.is_finite() {
            return Err(out_of_range());
        }
        Ok(NumberLiteral::Float(value))
    } else {
        text.parse().map(NumberLiteral::Integer).map_err(|_| out_of_range())
    }
}

fn unrecognized(text: &str, span: Span) -> LexError {
    let c = text.chars().next().unwrap_or('\u{fffd}');
    LexError::new(LexErrorKind::UnrecognizedCharacter(c), span)
}

fn grammar_error(source: &str, error: pest::error::Error<Rule>) -> LexError {
    let pos = match error.location {
        pest::error::InputLocation::Pos(pos) => pos,
        pest::error::InputLocation::Span((start, _)) => start,
    };
    let c = source[pos..].chars().next().unwrap_or('\u{fffd}');
    LexError::new(
        LexErrorKind::UnrecognizedCharacter(c),
        Span::new(pos, pos + c.len_utf8()),
    )
}
