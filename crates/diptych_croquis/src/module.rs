//! Module ingestion.
//!
//! Only the top-level statement list is inspected. Each import specifier and
//! each top-level variable becomes a [`Binding`]; exports map an exported
//! name onto a local binding name.

use diptych_carton::{CompactString, FxHashMap};
use oxc_allocator::Allocator;
use oxc_ast::ast::{
    BindingPatternKind, Declaration, ExportDefaultDeclarationKind, ImportDeclarationSpecifier,
    Program, Statement, VariableDeclaration,
};
use oxc_parser::Parser;
use oxc_span::SourceType;

use crate::expr::Expr;
use crate::kind::Kind;

/// Stable identity of a module, usually an absolute path.
pub type FileId = CompactString;

/// Local name bound to a default export that is not a plain identifier.
pub const SYNTHETIC_DEFAULT_EXPORT: &str = "__default_export__";

/// Imported name of a namespace import.
pub const NAMESPACE_IMPORT: &str = "*";

/// A top-level name-to-value association.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// `import { imported as local } from 'source'`.
    Import {
        source: CompactString,
        imported: CompactString,
    },
    /// `const local = init`.
    Local { init: Option<Expr> },
    /// A library export whose kind is known up front.
    Seeded { kind: Kind },
}

impl Binding {
    pub fn import(source: impl Into<CompactString>, imported: impl Into<CompactString>) -> Self {
        Binding::Import {
            source: source.into(),
            imported: imported.into(),
        }
    }

    /// Whether this is an `import * as ns` binding.
    pub fn is_namespace_import(&self) -> bool {
        matches!(self, Binding::Import { imported, .. } if imported == NAMESPACE_IMPORT)
    }
}

/// Bindings and exports of one ingested file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleInfo {
    pub id: FileId,
    pub bindings: FxHashMap<CompactString, Binding>,
    /// Exported name to local binding name.
    pub exports: FxHashMap<CompactString, CompactString>,
    /// Specifiers of `export * from '...'`, in source order.
    pub re_export_all_sources: Vec<CompactString>,
}

impl ModuleInfo {
    /// An empty module.
    pub fn new(id: impl Into<FileId>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Collect top-level bindings and exports of a parsed program.
    pub fn from_program(id: impl Into<FileId>, program: &Program<'_>) -> Self {
        let mut info = ModuleInfo::new(id);

        for stmt in &program.body {
            match stmt {
                Statement::ImportDeclaration(decl) => {
                    let source = decl.source.value.as_str();
                    let Some(specifiers) = &decl.specifiers else {
                        continue;
                    };
                    for specifier in specifiers {
                        let (local, imported) = match specifier {
                            ImportDeclarationSpecifier::ImportSpecifier(s) => {
                                (s.local.name.as_str(), s.imported.name())
                            }
                            ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                                (s.local.name.as_str(), "default".into())
                            }
                            ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                                (s.local.name.as_str(), NAMESPACE_IMPORT.into())
                            }
                        };
                        info.bindings
                            .insert(local.into(), Binding::import(source, imported.as_str()));
                    }
                }
                Statement::VariableDeclaration(decl) => {
                    info.add_variables(decl, false);
                }
                Statement::ExportNamedDeclaration(decl) => {
                    match &decl.declaration {
                        Some(Declaration::VariableDeclaration(var)) => {
                            info.add_variables(var, true);
                        }
                        Some(Declaration::FunctionDeclaration(func)) => {
                            if let Some(id) = &func.id {
                                info.add_opaque_export(id.name.as_str());
                            }
                        }
                        Some(Declaration::ClassDeclaration(class)) => {
                            if let Some(id) = &class.id {
                                info.add_opaque_export(id.name.as_str());
                            }
                        }
                        _ => {}
                    }
                    for specifier in &decl.specifiers {
                        let local = specifier.local.name();
                        let exported = specifier.exported.name();
                        info.exports
                            .insert(exported.as_str().into(), local.as_str().into());
                        // `export { x } from './y'` also binds `x` for resolution.
                        if let Some(source) = &decl.source {
                            info.bindings.insert(
                                local.as_str().into(),
                                Binding::import(source.value.as_str(), local.as_str()),
                            );
                        }
                    }
                }
                Statement::ExportDefaultDeclaration(decl) => match &decl.declaration {
                    ExportDefaultDeclarationKind::Identifier(ident) => {
                        info.exports
                            .insert("default".into(), ident.name.as_str().into());
                    }
                    ExportDefaultDeclarationKind::FunctionDeclaration(func) => {
                        info.add_default_declaration(func.id.as_ref().map(|id| id.name.as_str()));
                    }
                    ExportDefaultDeclarationKind::ClassDeclaration(class) => {
                        info.add_default_declaration(
                            class.id.as_ref().map(|id| id.name.as_str()),
                        );
                    }
                    kind => {
                        let init = kind.as_expression().map(Expr::from_oxc);
                        info.bindings
                            .insert(SYNTHETIC_DEFAULT_EXPORT.into(), Binding::Local { init });
                        info.exports
                            .insert("default".into(), SYNTHETIC_DEFAULT_EXPORT.into());
                    }
                },
                Statement::ExportAllDeclaration(decl) => {
                    let source = decl.source.value.as_str();
                    match &decl.exported {
                        // `export * as ns from '...'`
                        Some(exported) => {
                            let name = exported.name();
                            info.exports
                                .insert(name.as_str().into(), name.as_str().into());
                            info.bindings.insert(
                                name.as_str().into(),
                                Binding::import(source, NAMESPACE_IMPORT),
                            );
                        }
                        None => info.re_export_all_sources.push(source.into()),
                    }
                }
                _ => {}
            }
        }

        info
    }

    fn add_variables(&mut self, decl: &VariableDeclaration<'_>, exported: bool) {
        for declarator in &decl.declarations {
            if let BindingPatternKind::BindingIdentifier(id) = &declarator.id.kind {
                let name: CompactString = id.name.as_str().into();
                let init = declarator.init.as_ref().map(Expr::from_oxc);
                if exported {
                    self.exports.insert(name.clone(), name.clone());
                }
                self.bindings.insert(name, Binding::Local { init });
            }
        }
    }

    fn add_opaque_export(&mut self, name: &str) {
        self.exports.insert(name.into(), name.into());
        self.bindings
            .insert(name.into(), Binding::Local { init: None });
    }

    fn add_default_declaration(&mut self, name: Option<&str>) {
        let local = name.unwrap_or(SYNTHETIC_DEFAULT_EXPORT);
        self.exports.insert("default".into(), local.into());
        self.bindings
            .insert(local.into(), Binding::Local { init: None });
    }

    /// Local binding behind an exported name, if this module declares it.
    pub fn exported_binding(&self, exported: &str) -> Option<(&CompactString, &Binding)> {
        let local = self.exports.get(exported)?;
        self.bindings.get_key_value(local.as_str())
    }
}

/// Source type for a module id, ignoring any query suffix.
///
/// Unknown extensions parse as TSX, the most permissive dialect.
pub fn source_type_for(id: &str) -> SourceType {
    let path = id.split('?').next().unwrap_or(id);
    SourceType::from_path(path).unwrap_or_else(|_| SourceType::tsx())
}

/// Parse `source` and collect its [`ModuleInfo`].
///
/// Parse errors are tolerated: whatever top-level structure oxc recovered is
/// used, which is enough for resolving imports into the file.
pub fn ingest_source(id: &str, source: &str) -> ModuleInfo {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, source_type_for(id)).parse();
    if !ret.errors.is_empty() {
        tracing::debug!(file = id, errors = ret.errors.len(), "ingested module with parse errors");
    }
    ModuleInfo::from_program(id, &ret.program)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_imports() {
        let info = ingest_source(
            "/src/a.ts",
            "import def, { createServerFn as csf, 'odd name' as odd } from '@tanstack/react-start'\n\
             import * as ns from './ns'",
        );
        assert_eq!(
            info.bindings.get("csf"),
            Some(&Binding::import("@tanstack/react-start", "createServerFn"))
        );
        assert_eq!(
            info.bindings.get("def"),
            Some(&Binding::import("@tanstack/react-start", "default"))
        );
        assert_eq!(
            info.bindings.get("odd"),
            Some(&Binding::import("@tanstack/react-start", "odd name"))
        );
        assert!(info.bindings["ns"].is_namespace_import());
    }

    #[test]
    fn test_ingest_exports() {
        let info = ingest_source(
            "/src/b.ts",
            "export const a = make()\n\
             const b = 1\n\
             export { b as renamed }\n\
             export { c } from './c'\n\
             export * from './all'\n\
             export * as everything from './everything'\n\
             export function helper() {}\n\
             export default make()",
        );
        assert_eq!(info.exports.get("a").map(|s| s.as_str()), Some("a"));
        assert_eq!(info.exports.get("renamed").map(|s| s.as_str()), Some("b"));
        assert_eq!(info.bindings.get("c"), Some(&Binding::import("./c", "c")));
        assert_eq!(info.re_export_all_sources, vec![CompactString::from("./all")]);
        assert!(info.bindings["everything"].is_namespace_import());
        assert_eq!(info.exports.get("helper").map(|s| s.as_str()), Some("helper"));

        let (local, binding) = info.exported_binding("default").unwrap();
        assert_eq!(local, SYNTHETIC_DEFAULT_EXPORT);
        assert!(matches!(binding, Binding::Local { init: Some(Expr::Call { .. }) }));
    }

    #[test]
    fn test_only_top_level_is_ingested() {
        let info = ingest_source(
            "/src/c.ts",
            "function outer() { const inner = 1 }\nconst { destructured } = obj\nlet plain",
        );
        assert!(!info.bindings.contains_key("inner"));
        assert!(!info.bindings.contains_key("destructured"));
        assert_eq!(info.bindings.get("plain"), Some(&Binding::Local { init: None }));
    }

    #[test]
    fn test_empty_source() {
        let info = ingest_source("/src/empty.ts", "");
        assert!(info.bindings.is_empty());
        assert!(info.exports.is_empty());
    }

    #[test]
    fn test_source_type_ignores_query() {
        assert!(source_type_for("/src/a.tsx?tss-serverfn-split").is_typescript());
        assert!(source_type_for("@tanstack/react-start").is_jsx());
    }
}
