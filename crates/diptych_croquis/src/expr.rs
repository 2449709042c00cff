//! Owned expression shapes.
//!
//! oxc syntax trees live in an arena that is dropped after each parse, so the
//! parts of an expression that resolution needs are copied into [`Expr`].

use diptych_carton::CompactString;
use oxc_ast::ast::Expression;

/// The shape of an expression as far as resolution is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Ident(CompactString),
    Call {
        callee: Box<Expr>,
    },
    /// `object.property`; `property` is `None` for computed access.
    Member {
        object: Box<Expr>,
        property: Option<CompactString>,
    },
    Other,
}

impl Expr {
    /// Build the owned shape of `expr`, looking through wrapper nodes.
    pub fn from_oxc(expr: &Expression<'_>) -> Self {
        match unwrap_expression(expr) {
            Expression::Identifier(ident) => Expr::Ident(ident.name.as_str().into()),
            Expression::CallExpression(call) => Expr::Call {
                callee: Box::new(Expr::from_oxc(&call.callee)),
            },
            Expression::StaticMemberExpression(member) => Expr::Member {
                object: Box::new(Expr::from_oxc(&member.object)),
                property: Some(member.property.name.as_str().into()),
            },
            Expression::ComputedMemberExpression(member) => Expr::Member {
                object: Box::new(Expr::from_oxc(&member.object)),
                property: None,
            },
            _ => Expr::Other,
        }
    }

    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Expr::Ident(name) => Some(name),
            _ => None,
        }
    }

    #[inline]
    pub fn is_member(&self) -> bool {
        matches!(self, Expr::Member { .. })
    }
}

/// Strip parentheses and TypeScript-only wrappers.
pub fn unwrap_expression<'b, 'a>(mut expr: &'b Expression<'a>) -> &'b Expression<'a> {
    loop {
        expr = match expr {
            Expression::ParenthesizedExpression(e) => &e.expression,
            Expression::TSAsExpression(e) => &e.expression,
            Expression::TSSatisfiesExpression(e) => &e.expression,
            Expression::TSNonNullExpression(e) => &e.expression,
            Expression::TSTypeAssertion(e) => &e.expression,
            _ => return expr,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxc_allocator::Allocator;
    use oxc_ast::ast::Statement;
    use oxc_parser::Parser;
    use oxc_span::SourceType;

    fn shape_of(source: &str) -> Expr {
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, source, SourceType::ts()).parse();
        match &ret.program.body[0] {
            Statement::ExpressionStatement(stmt) => Expr::from_oxc(&stmt.expression),
            _ => panic!("expected an expression statement"),
        }
    }

    #[test]
    fn test_call_chain_shape() {
        let expr = shape_of("createServerFn().handler(fn)");
        assert_eq!(
            expr,
            Expr::Call {
                callee: Box::new(Expr::Member {
                    object: Box::new(Expr::Call {
                        callee: Box::new(Expr::Ident("createServerFn".into())),
                    }),
                    property: Some("handler".into()),
                }),
            }
        );
    }

    #[test]
    fn test_wrappers_are_transparent() {
        assert_eq!(
            shape_of("((factory as any)!)"),
            Expr::Ident("factory".into())
        );
        assert_eq!(
            shape_of("(make satisfies unknown)()"),
            Expr::Call {
                callee: Box::new(Expr::Ident("make".into())),
            }
        );
    }

    #[test]
    fn test_computed_member_has_no_property() {
        assert_eq!(
            shape_of("ns['createServerOnlyFn']"),
            Expr::Member {
                object: Box::new(Expr::Ident("ns".into())),
                property: None,
            }
        );
        assert_eq!(shape_of("1 + 2"), Expr::Other);
    }
}
