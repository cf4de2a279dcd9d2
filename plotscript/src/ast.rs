//! Abstract Syntax Tree

use plotscript_core::{BinaryOp, Span};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Integer(i64),
    Float(f64),
    Variable(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call { callee: Box<Expr>, args: Vec<Expr> },
    /// `fn(params) => body`
    Lambda { params: Vec<String>, body: Arc<Expr> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    height: usize,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        let height = 1 + match &kind {
            ExprKind::Integer(_) | ExprKind::Float(_) | ExprKind::Variable(_) => 0,
            ExprKind::Unary(_, operand) => operand.height,
            ExprKind::Binary(_, lhs, rhs) => lhs.height.max(rhs.height),
            ExprKind::Call { callee, args } => args
                .iter()
                .map(|arg| arg.height)
                .fold(callee.height, usize::max),
            ExprKind::Lambda { body, .. } => body.height,
        };
        Self { kind, span, height }
    }

    /// Nodes on the longest path from here to a leaf
    pub fn height(&self) -> usize {
        self.height
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Empty,
    Expr(Expr),
    /// `name = value`
    Assign { name: String, value: Expr },
    /// `name(params) = body`
    Define {
        name: String,
        params: Vec<String>,
        body: Arc<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: Span,
}
