//! Top-level layout of a file.
//!
//! Records where each top-level binding and export statement lives, and
//! where every identifier is referenced. Export stripping and dead-code
//! elimination work from this snapshot after the syntax tree is gone.

use diptych_carton::{CompactString, FxHashMap};
use oxc_ast::ast::{
    BindingPatternKind, Class, Declaration, ExportDefaultDeclarationKind, Function,
    IdentifierReference, ImportDeclaration, ImportDeclarationSpecifier, Program, Statement,
    VariableDeclaration,
};
use oxc_ast::Visit;
use oxc_span::{GetSpan, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecifierShape {
    Default,
    Namespace,
    Named,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpecifierUnit {
    pub local: CompactString,
    pub span: Span,
    pub shape: SpecifierShape,
    /// `import { type X }`.
    pub type_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportUnit {
    pub span: Span,
    /// The module specifier literal.
    pub source_span: Span,
    /// `import type { ... }`.
    pub type_only: bool,
    pub specifiers: Vec<ImportSpecifierUnit>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaratorUnit {
    /// `None` for destructuring patterns.
    pub name: Option<CompactString>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableUnit {
    /// The whole statement, `export` keyword included.
    pub span: Span,
    pub exported: bool,
    pub declarators: Vec<DeclaratorUnit>,
}

/// A named function or class declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationUnit {
    pub name: CompactString,
    pub span: Span,
    pub exported: bool,
}

/// How an export statement is stripped when a file must stop exporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportShape {
    /// `export const/function/class ...`, `export default function f() {}`:
    /// the declaration starting at this offset is kept.
    Declaration { declaration_start: u32 },
    /// `export { a, b as c }`, with or without `from`.
    Specifiers,
    /// Anything else, such as `export default expr` or `export *`.
    Kept,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportUnit {
    pub span: Span,
    pub shape: ExportShape,
}

/// Top-level structure and identifier references of a file.
#[derive(Debug, Default, Clone)]
pub struct Layout {
    /// Start of the first top-level statement, where new imports go.
    pub body_start: u32,
    pub imports: Vec<ImportUnit>,
    pub variables: Vec<VariableUnit>,
    pub declarations: Vec<DeclarationUnit>,
    pub exports: Vec<ExportUnit>,
    /// Every identifier reference, by name.
    pub references: FxHashMap<CompactString, Vec<Span>>,
}

impl Layout {
    pub fn from_program(program: &Program<'_>) -> Self {
        let mut layout = Layout {
            body_start: program
                .body
                .first()
                .map(|stmt| stmt.span().start)
                .unwrap_or(program.span.end),
            ..Layout::default()
        };

        for stmt in &program.body {
            layout.add_statement(stmt);
        }

        let mut collector = ReferenceCollector::default();
        collector.visit_program(program);
        layout.references = collector.references;
        layout
    }

    /// Number of references to `name`.
    pub fn reference_count(&self, name: &str) -> usize {
        self.references.get(name).map_or(0, Vec::len)
    }

    fn add_statement(&mut self, stmt: &Statement<'_>) {
        match stmt {
            Statement::ImportDeclaration(decl) => self.add_import(decl),
            Statement::VariableDeclaration(decl) => self.add_variables(decl.span, decl, false),
            Statement::FunctionDeclaration(func) => self.add_function(func, false),
            Statement::ClassDeclaration(class) => self.add_class(class, false),
            Statement::ExportNamedDeclaration(export) => {
                let shape = match &export.declaration {
                    Some(declaration) => {
                        match declaration {
                            Declaration::VariableDeclaration(decl) => {
                                self.add_variables(export.span, decl, true);
                            }
                            Declaration::FunctionDeclaration(func) => self.add_function(func, true),
                            Declaration::ClassDeclaration(class) => self.add_class(class, true),
                            _ => {}
                        }
                        match declaration {
                            Declaration::VariableDeclaration(_)
                            | Declaration::FunctionDeclaration(_)
                            | Declaration::ClassDeclaration(_) => ExportShape::Declaration {
                                declaration_start: declaration.span().start,
                            },
                            _ => ExportShape::Kept,
                        }
                    }
                    None => ExportShape::Specifiers,
                };
                self.exports.push(ExportUnit {
                    span: export.span,
                    shape,
                });
            }
            Statement::ExportDefaultDeclaration(export) => {
                let shape = match &export.declaration {
                    ExportDefaultDeclarationKind::FunctionDeclaration(func) if func.id.is_some() => {
                        self.add_function(func, true);
                        ExportShape::Declaration {
                            declaration_start: func.span.start,
                        }
                    }
                    ExportDefaultDeclarationKind::ClassDeclaration(class) if class.id.is_some() => {
                        self.add_class(class, true);
                        ExportShape::Declaration {
                            declaration_start: class.span.start,
                        }
                    }
                    _ => ExportShape::Kept,
                };
                self.exports.push(ExportUnit {
                    span: export.span,
                    shape,
                });
            }
            Statement::ExportAllDeclaration(export) => self.exports.push(ExportUnit {
                span: export.span,
                shape: ExportShape::Kept,
            }),
            _ => {}
        }
    }

    fn add_import(&mut self, decl: &ImportDeclaration<'_>) {
        let Some(specifiers) = &decl.specifiers else {
            return;
        };
        let specifiers = specifiers
            .iter()
            .map(|specifier| match specifier {
                ImportDeclarationSpecifier::ImportSpecifier(s) => ImportSpecifierUnit {
                    local: s.local.name.as_str().into(),
                    span: s.span,
                    shape: SpecifierShape::Named,
                    type_only: s.import_kind.is_type(),
                },
                ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => ImportSpecifierUnit {
                    local: s.local.name.as_str().into(),
                    span: s.span,
                    shape: SpecifierShape::Default,
                    type_only: false,
                },
                ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => ImportSpecifierUnit {
                    local: s.local.name.as_str().into(),
                    span: s.span,
                    shape: SpecifierShape::Namespace,
                    type_only: false,
                },
            })
            .collect();
        self.imports.push(ImportUnit {
            span: decl.span,
            source_span: decl.source.span,
            type_only: decl.import_kind.is_type(),
            specifiers,
        });
    }

    fn add_variables(&mut self, span: Span, decl: &VariableDeclaration<'_>, exported: bool) {
        let declarators = decl
            .declarations
            .iter()
            .map(|declarator| DeclaratorUnit {
                name: match &declarator.id.kind {
                    BindingPatternKind::BindingIdentifier(id) => Some(id.name.as_str().into()),
                    _ => None,
                },
                span: declarator.span,
            })
            .collect();
        self.variables.push(VariableUnit {
            span,
            exported,
            declarators,
        });
    }

    fn add_function(&mut self, func: &Function<'_>, exported: bool) {
        if let Some(id) = &func.id {
            self.declarations.push(DeclarationUnit {
                name: id.name.as_str().into(),
                span: func.span,
                exported,
            });
        }
    }

    fn add_class(&mut self, class: &Class<'_>, exported: bool) {
        if let Some(id) = &class.id {
            self.declarations.push(DeclarationUnit {
                name: id.name.as_str().into(),
                span: class.span,
                exported,
            });
        }
    }
}

#[derive(Default)]
struct ReferenceCollector {
    references: FxHashMap<CompactString, Vec<Span>>,
}

impl<'a> Visit<'a> for ReferenceCollector {
    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        self.references
            .entry(ident.name.as_str().into())
            .or_default()
            .push(ident.span);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxc_allocator::Allocator;
    use oxc_parser::Parser;
    use oxc_span::SourceType;

    fn layout(source: &str) -> Layout {
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, source, SourceType::tsx()).parse();
        assert!(ret.errors.is_empty());
        Layout::from_program(&ret.program)
    }

    #[test]
    fn test_units() {
        let source = r#"
import def, { a, type T } from './a'
import * as ns from './ns'
const x = 1, [y] = [2]
export function f() {}
export default class C {}
export { x as z }
export * from './b'
"#;
        let layout = layout(source);
        assert_eq!(layout.body_start, 1);
        assert_eq!(layout.imports.len(), 2);
        assert_eq!(layout.imports[0].specifiers.len(), 3);
        assert!(layout.imports[0].specifiers[2].type_only);
        assert_eq!(layout.imports[1].specifiers[0].shape, SpecifierShape::Namespace);

        assert_eq!(layout.variables[0].declarators[0].name.as_deref(), Some("x"));
        assert_eq!(layout.variables[0].declarators[1].name, None);

        let names: Vec<_> = layout
            .declarations
            .iter()
            .map(|d| (d.name.as_str(), d.exported))
            .collect();
        assert_eq!(names, vec![("f", true), ("C", true)]);

        let shapes: Vec<_> = layout.exports.iter().map(|e| e.shape).collect();
        assert!(matches!(shapes[0], ExportShape::Declaration { .. }));
        assert!(matches!(shapes[1], ExportShape::Declaration { .. }));
        assert_eq!(shapes[2], ExportShape::Specifiers);
        assert_eq!(shapes[3], ExportShape::Kept);
    }

    #[test]
    fn test_references() {
        let layout = layout("const a = 1; function g() { return a + a } export { g }");
        assert_eq!(layout.reference_count("a"), 2);
        assert_eq!(layout.reference_count("g"), 1);
        assert_eq!(layout.reference_count("missing"), 0);
    }

    #[test]
    fn test_anonymous_default_export_is_kept() {
        let layout = layout("export default function () {}");
        assert_eq!(layout.exports[0].shape, ExportShape::Kept);
        assert!(layout.declarations.is_empty());
    }
}
