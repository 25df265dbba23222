//! Abstract syntax tree for Rill programs.

pub mod expr;
pub mod stmt;

pub use expr::{BinaryOp, Expr, ExprKind, UnaryOp};
pub use stmt::{ClassDecl, FunctionDecl, MethodDecl, Program, Stmt, StmtKind};
