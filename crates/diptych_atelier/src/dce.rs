//! Dead-code elimination over span edits.
//!
//! A top-level binding is removed when it was referenced before rewriting,
//! is not exported, and no reference outside its own declaration survives
//! the edits. Removing one binding can orphan another, so the pass repeats
//! until nothing changes.

use diptych_carton::{CompactString, FxHashSet};
use oxc_span::Span;

use crate::edits::{span_contains, with_line_break, EditSet, Piece};
use crate::layout::{Layout, SpecifierShape};

/// Bindings that must survive elimination regardless of references.
#[derive(Debug, Default)]
pub struct Retention {
    /// Names referenced by inserted code.
    pub pinned: FxHashSet<CompactString>,
    /// `export` keywords were stripped, so no declaration counts as exported.
    pub exports_stripped: bool,
}

/// One removable top-level binding.
#[derive(Debug)]
struct Candidate {
    name: CompactString,
    /// Declaration of the binding; references inside it do not keep it alive.
    span: Span,
    exported: bool,
}

/// Add removal edits for dead bindings to `edits`. Returns the number of
/// bindings removed.
pub fn eliminate_dead_code(
    source: &str,
    layout: &Layout,
    edits: &mut EditSet,
    retention: &Retention,
) -> usize {
    let import_candidates: Vec<Vec<Candidate>> = layout
        .imports
        .iter()
        .map(|import| {
            import
                .specifiers
                .iter()
                .map(|specifier| Candidate {
                    name: specifier.local.clone(),
                    span: specifier.span,
                    // Type imports never reach the output of a bundler anyway.
                    exported: import.type_only || specifier.type_only,
                })
                .collect()
        })
        .collect();
    let variable_candidates: Vec<Vec<Option<Candidate>>> = layout
        .variables
        .iter()
        .map(|unit| {
            unit.declarators
                .iter()
                .map(|declarator| {
                    declarator.name.clone().map(|name| Candidate {
                        name,
                        span: declarator.span,
                        exported: unit.exported && !retention.exports_stripped,
                    })
                })
                .collect()
        })
        .collect();
    let declaration_candidates: Vec<Candidate> = layout
        .declarations
        .iter()
        .map(|decl| Candidate {
            name: decl.name.clone(),
            span: decl.span,
            exported: decl.exported && !retention.exports_stripped,
        })
        .collect();

    let mut removed: Vec<Span> = Vec::new();
    let mut removed_imports: Vec<Vec<bool>> = layout
        .imports
        .iter()
        .map(|unit| vec![false; unit.specifiers.len()])
        .collect();
    let mut removed_declarators: Vec<Vec<bool>> = layout
        .variables
        .iter()
        .map(|unit| vec![false; unit.declarators.len()])
        .collect();
    let mut removed_declarations = vec![false; layout.declarations.len()];

    let is_dead = |candidate: &Candidate, edits: &EditSet, removed: &[Span]| -> bool {
        if candidate.exported
            || retention.pinned.contains(&candidate.name)
            || layout.reference_count(&candidate.name) == 0
            || !edits.retained(candidate.span)
            || removed.iter().any(|r| span_contains(*r, candidate.span))
        {
            return false;
        }
        let live = layout
            .references
            .get(candidate.name.as_str())
            .into_iter()
            .flatten()
            .filter(|reference| !span_contains(candidate.span, **reference))
            .filter(|reference| !removed.iter().any(|r| span_contains(*r, **reference)))
            .any(|reference| edits.retained(*reference));
        !live
    };

    let mut count = 0;
    loop {
        let mut changed = false;

        for (i, candidates) in import_candidates.iter().enumerate() {
            for (j, candidate) in candidates.iter().enumerate() {
                if !removed_imports[i][j] && is_dead(candidate, edits, &removed) {
                    removed_imports[i][j] = true;
                    removed.push(candidate.span);
                    changed = true;
                    count += 1;
                }
            }
        }
        for (i, candidates) in variable_candidates.iter().enumerate() {
            for (j, candidate) in candidates.iter().enumerate() {
                let Some(candidate) = candidate else { continue };
                if !removed_declarators[i][j] && is_dead(candidate, edits, &removed) {
                    removed_declarators[i][j] = true;
                    removed.push(candidate.span);
                    changed = true;
                    count += 1;
                }
            }
        }
        for (i, candidate) in declaration_candidates.iter().enumerate() {
            if !removed_declarations[i] && is_dead(candidate, edits, &removed) {
                removed_declarations[i] = true;
                removed.push(candidate.span);
                changed = true;
                count += 1;
            }
        }

        if !changed {
            break;
        }
    }

    for (unit, flags) in layout.imports.iter().zip(&removed_imports) {
        if !flags.contains(&true) {
            continue;
        }
        if flags.iter().all(|r| *r) {
            edits.remove(with_line_break(source, unit.span));
            continue;
        }
        let kept: Vec<_> = unit
            .specifiers
            .iter()
            .zip(flags)
            .filter(|(_, removed)| !**removed)
            .map(|(specifier, _)| specifier)
            .collect();
        let mut pieces = vec![Piece::Text("import ".into())];
        let mut first = true;
        for specifier in kept.iter().filter(|s| s.shape != SpecifierShape::Named) {
            if !first {
                pieces.push(Piece::Text(", ".into()));
            }
            pieces.push(Piece::Source(specifier.span));
            first = false;
        }
        let named: Vec<_> = kept
            .iter()
            .filter(|s| s.shape == SpecifierShape::Named)
            .collect();
        if !named.is_empty() {
            if !first {
                pieces.push(Piece::Text(", ".into()));
            }
            pieces.push(Piece::Text("{ ".into()));
            for (k, specifier) in named.iter().enumerate() {
                if k > 0 {
                    pieces.push(Piece::Text(", ".into()));
                }
                pieces.push(Piece::Source(specifier.span));
            }
            pieces.push(Piece::Text(" }".into()));
        }
        pieces.push(Piece::Text(" from ".into()));
        pieces.push(Piece::Source(Span::new(unit.source_span.start, unit.span.end)));
        edits.replace(unit.span, pieces);
    }

    for (unit, flags) in layout.variables.iter().zip(&removed_declarators) {
        if !flags.contains(&true) {
            continue;
        }
        if flags.iter().all(|r| *r) {
            edits.remove(with_line_break(source, unit.span));
            continue;
        }
        let (Some(first), Some(last)) = (unit.declarators.first(), unit.declarators.last()) else {
            continue;
        };
        let mut pieces = vec![Piece::Source(Span::new(unit.span.start, first.span.start))];
        let kept = unit
            .declarators
            .iter()
            .zip(flags)
            .filter(|(_, removed)| !**removed)
            .map(|(declarator, _)| declarator);
        for (k, declarator) in kept.enumerate() {
            if k > 0 {
                pieces.push(Piece::Text(", ".into()));
            }
            pieces.push(Piece::Source(declarator.span));
        }
        pieces.push(Piece::Source(Span::new(last.span.end, unit.span.end)));
        edits.replace(unit.span, pieces);
    }

    for (decl, removed) in layout.declarations.iter().zip(&removed_declarations) {
        if *removed {
            edits.remove(with_line_break(source, decl.span));
        }
    }

    if count > 0 {
        tracing::debug!(removed = count, "eliminated dead bindings");
    }
    count
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

    fn span(source: &str, needle: &str) -> Span {
        let start = source.find(needle).unwrap() as u32;
        Span::new(start, start + needle.len() as u32)
    }

    fn run(source: &str, edits: &mut EditSet) -> String {
        eliminate_dead_code(source, &layout(source), edits, &Retention::default());
        edits.render("a.ts", source).code
    }

    #[test]
    fn test_orphaned_chain_is_removed() {
        let source =
            "import { db } from './db'\nconst query = () => db.get()\nconst fn = use(query)\nexport { fn }\n";
        let mut edits = EditSet::new();
        edits.replace_with_text(span(source, "query)"), "stub)");
        assert_eq!(run(source, &mut edits), "const fn = use(stub)\nexport { fn }\n");
    }

    #[test]
    fn test_never_referenced_bindings_are_kept() {
        let source = "import './side-effect'\nimport { unused } from './a'\nconst alone = 1\n";
        assert_eq!(run(source, &mut EditSet::new()), source);
    }

    #[test]
    fn test_exported_bindings_are_kept() {
        let source = "const a = 1\nexport const b = a\n";
        let mut edits = EditSet::new();
        edits.replace_with_text(span(source, "a\n"), "2\n");
        assert_eq!(run(source, &mut edits), "export const b = 2\n");
    }

    #[test]
    fn test_partial_import_and_declaration() {
        let source =
            "import D, { a, b as c } from './m';\nconst x = a, y = c, z = D;\nuse(x, y, z);\n";
        let mut edits = EditSet::new();
        edits.remove(span(source, "x, "));
        assert_eq!(
            run(source, &mut edits),
            "import D, { b as c } from './m';\nconst y = c, z = D;\nuse(y, z);\n"
        );
    }

    #[test]
    fn test_pinned_names_survive() {
        let source = "const keep = 1\nuse(keep)\n";
        let mut edits = EditSet::new();
        edits.replace_with_text(span(source, "use(keep)"), "use()");
        let retention = Retention {
            pinned: [CompactString::from("keep")].into_iter().collect(),
            exports_stripped: false,
        };
        eliminate_dead_code(source, &layout(source), &mut edits, &retention);
        assert_eq!(edits.render("a.ts", source).code, "const keep = 1\nuse()\n");
    }

    #[test]
    fn test_self_references_do_not_keep_a_function() {
        let source = "function loop() { loop() }\nrun(loop)\n";
        let mut edits = EditSet::new();
        edits.replace_with_text(span(source, "run(loop)"), "run()");
        assert_eq!(run(source, &mut edits), "run()\n");
    }
}
