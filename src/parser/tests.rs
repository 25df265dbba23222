//! Parser tests.

use crate::ast::*;
use crate::error::ParserError;
use crate::parser::Parser;

fn parse(source: &str) -> Program {
    Parser::new(source).parse().expect("parse error")
}

fn parse_expr(source: &str) -> Expr {
    match parse(source).statements.into_iter().next().unwrap().kind {
        StmtKind::Expression(expr) => expr,
        other => panic!("Expected expression statement, got {:?}", other),
    }
}

#[test]
fn test_let_initializer_flags() {
    let program = parse("let x = 5; let y;");
    assert_eq!(program.statements.len(), 2);
    match &program.statements[0].kind {
        StmtKind::Let { name, initializer } => {
            assert_eq!(name, "x");
            assert!(initializer.is_some());
        }
        other => panic!("Expected let, got {:?}", other),
    }
    match &program.statements[1].kind {
        StmtKind::Let { name, initializer } => {
            assert_eq!(name, "y");
            assert!(initializer.is_none());
        }
        other => panic!("Expected let, got {:?}", other),
    }
}

#[test]
fn test_precedence_shape() {
    // 1 + 2 * 3 parses as 1 + (2 * 3)
    let expr = parse_expr("1 + 2 * 3;");
    match expr.kind {
        ExprKind::Binary {
            operator: BinaryOp::Add,
            left,
            right,
        } => {
            assert!(matches!(left.kind, ExprKind::NumberLiteral(n) if n == 1.0));
            match right.kind {
                ExprKind::Binary {
                    operator: BinaryOp::Multiply,
                    left,
                    right,
                } => {
                    assert!(matches!(left.kind, ExprKind::NumberLiteral(n) if n == 2.0));
                    assert!(matches!(right.kind, ExprKind::NumberLiteral(n) if n == 3.0));
                }
                other => panic!("Expected multiply on right, got {:?}", other),
            }
        }
        other => panic!("Expected add at top, got {:?}", other),
    }
}

#[test]
fn test_comparison_binds_tighter_than_equality() {
    let expr = parse_expr("1 < 2 == true;");
    assert!(matches!(
        expr.kind,
        ExprKind::Binary {
            operator: BinaryOp::Equal,
            ..
        }
    ));
}

#[test]
fn test_assignment_is_right_associative() {
    let expr = parse_expr("a = b = 1;");
    match expr.kind {
        ExprKind::Assign { name, value } => {
            assert_eq!(name, "a");
            assert!(matches!(value.kind, ExprKind::Assign { .. }));
        }
        other => panic!("Expected assignment, got {:?}", other),
    }
}

#[test]
fn test_plus_equal_desugars() {
    // x += 1 becomes x = x + 1 with the identifier duplicated.
    let expr = parse_expr("x += 1;");
    match expr.kind {
        ExprKind::Assign { name, value } => {
            assert_eq!(name, "x");
            match value.kind {
                ExprKind::Binary {
                    operator: BinaryOp::Add,
                    left,
                    ..
                } => {
                    assert!(matches!(left.kind, ExprKind::Variable(ref n) if n == "x"));
                }
                other => panic!("Expected add, got {:?}", other),
            }
        }
        other => panic!("Expected assignment, got {:?}", other),
    }
}

#[test]
fn test_property_store_desugars() {
    let expr = parse_expr("p.value = 1;");
    assert!(matches!(expr.kind, ExprKind::SetProperty { ref name, .. } if name == "value"));
}

#[test]
fn test_method_call_fuses_to_invoke() {
    let expr = parse_expr("p.tick(1, 2);");
    match expr.kind {
        ExprKind::Invoke {
            name, arguments, ..
        } => {
            assert_eq!(name, "tick");
            assert_eq!(arguments.len(), 2);
        }
        other => panic!("Expected invoke, got {:?}", other),
    }
}

#[test]
fn test_property_read_stays_get() {
    let expr = parse_expr("p.value;");
    assert!(matches!(expr.kind, ExprKind::GetProperty { ref name, .. } if name == "value"));
}

#[test]
fn test_call_and_index_chain() {
    let expr = parse_expr("f(1)[0];");
    match expr.kind {
        ExprKind::Index { object, .. } => {
            assert!(matches!(object.kind, ExprKind::Call { .. }));
        }
        other => panic!("Expected index, got {:?}", other),
    }
}

#[test]
fn test_array_literal() {
    let expr = parse_expr("[1, 2, 3];");
    match expr.kind {
        ExprKind::Array(elements) => assert_eq!(elements.len(), 3),
        other => panic!("Expected array, got {:?}", other),
    }
}

#[test]
fn test_empty_array_literal() {
    let expr = parse_expr("[];");
    assert!(matches!(expr.kind, ExprKind::Array(ref e) if e.is_empty()));
}

#[test]
fn test_class_with_constructor_and_method() {
    let program = parse("class Player { constructor(s) { this.value = s; } tick(n) { } }");
    match &program.statements[0].kind {
        StmtKind::Class(decl) => {
            assert_eq!(decl.name, "Player");
            assert_eq!(decl.methods.len(), 2);
            assert!(decl.methods[0].is_constructor);
            assert_eq!(decl.methods[0].name, "constructor");
            assert_eq!(decl.methods[1].name, "tick");
            assert!(!decl.methods[1].is_constructor);
        }
        other => panic!("Expected class, got {:?}", other),
    }
}

#[test]
fn test_function_declaration() {
    let program = parse("function add(a, b) { return a + b; }");
    match &program.statements[0].kind {
        StmtKind::Function(decl) => {
            assert_eq!(decl.name, "add");
            assert_eq!(decl.params, vec!["a".to_string(), "b".to_string()]);
            assert_eq!(decl.body.len(), 1);
        }
        other => panic!("Expected function, got {:?}", other),
    }
}

#[test]
fn test_if_else_shape() {
    let program = parse("if (x > 5) { x; } else { y; }");
    match &program.statements[0].kind {
        StmtKind::If { else_branch, .. } => assert!(else_branch.is_some()),
        other => panic!("Expected if, got {:?}", other),
    }
}

#[test]
fn test_missing_initializer_is_error() {
    let result = Parser::new("let x = ;").parse();
    assert!(result.is_err());
}

#[test]
fn test_invalid_assignment_target() {
    let result = Parser::new("1 = 2;").parse();
    assert!(matches!(
        result,
        Err(ParserError::InvalidAssignmentTarget(_))
    ));
}

#[test]
fn test_first_error_is_surfaced_after_sync() {
    // Both statements are malformed; the first message wins.
    let result = Parser::new("let x = ; let y = ;").parse();
    let err = result.unwrap_err();
    assert!(err.to_string().contains("expected expression"));
}

#[test]
fn test_unterminated_string_becomes_parse_error() {
    let result = Parser::new("let s = \"abc").parse();
    assert!(result.is_err());
}

#[test]
fn test_missing_semicolon() {
    let result = Parser::new("let x = 1").parse();
    let err = result.unwrap_err();
    assert!(err.to_string().contains("';'"));
}
