//! Expression AST nodes.

use crate::span::Span;

/// An expression in the AST.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// All expression variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Number literal: 42, 3.5
    NumberLiteral(f64),
    /// String literal: "hello"
    StringLiteral(String),
    /// Boolean literal: true, false
    BoolLiteral(bool),
    /// Null literal
    Null,

    /// Variable reference: foo
    Variable(String),

    /// Binary operation: a + b
    Binary {
        left: Box<Expr>,
        operator: BinaryOp,
        right: Box<Expr>,
    },

    /// Unary operation: -x, !x
    Unary {
        operator: UnaryOp,
        operand: Box<Expr>,
    },

    /// Grouping expression: (expr)
    Grouping(Box<Expr>),

    /// Assignment to a variable: x = expr. `x += e` is desugared by the
    /// parser into `x = x + e`.
    Assign { name: String, value: Box<Expr> },

    /// Function call: foo(a, b)
    Call {
        callee: Box<Expr>,
        arguments: Vec<Expr>,
    },

    /// Property read: obj.name
    GetProperty { object: Box<Expr>, name: String },

    /// Property store: obj.name = value
    SetProperty {
        object: Box<Expr>,
        name: String,
        value: Box<Expr>,
    },

    /// Fused method call: obj.name(args). Produced by the parser instead of
    /// a `GetProperty` wrapped in a `Call` so the compiler can emit a single
    /// invocation opcode.
    Invoke {
        object: Box<Expr>,
        name: String,
        arguments: Vec<Expr>,
    },

    /// Array index: arr[index]
    Index { object: Box<Expr>, index: Box<Expr> },

    /// Array literal: [1, 2, 3]
    Array(Vec<Expr>),

    /// this reference
    This,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}
