//! `<ClientOnly>` elements on the server.

use oxc_span::Span;

use super::RewriteContext;
use crate::edits::Piece;
use crate::scan::TemplateSite;

/// Drop the children of each element so only its fallback renders.
pub fn rewrite_template_elements(sites: &[&TemplateSite], ctx: &mut RewriteContext<'_>) {
    for site in sites.iter().filter(|site| !site.self_closing) {
        // The opening tag without its closing `>`.
        let open = Span::new(site.opening_span.start, site.opening_span.end - 1);
        ctx.edits
            .replace(site.span, vec![Piece::Source(open), Piece::Text(" />".into())]);
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{analyze, HashIds};
    use super::*;
    use diptych_croquis::{Environment, KindSet};

    fn server(source: &str) -> String {
        let (scan, layout) = analyze(source, KindSet::CLIENT_ONLY_TEMPLATE_ELEMENT);
        let sites: Vec<&TemplateSite> = scan
            .templates
            .iter()
            .filter(|site| site.name == "ClientOnly")
            .collect();
        let mut ctx = RewriteContext::new("/a.tsx", source, Environment::Server, &layout, &HashIds);
        rewrite_template_elements(&sites, &mut ctx);
        ctx.edits.render("/a.tsx", source).code
    }

    #[test]
    fn test_children_are_dropped() {
        assert_eq!(
            server("const el = <ClientOnly fallback={<Spinner />}><Chart data={d} /></ClientOnly>"),
            "const el = <ClientOnly fallback={<Spinner />} />"
        );
    }

    #[test]
    fn test_self_closing_is_untouched() {
        let source = "const el = <ClientOnly fallback={null} />";
        assert_eq!(server(source), source);
    }

    #[test]
    fn test_nested_elements() {
        assert_eq!(
            server("const el = <ClientOnly><ClientOnly>x</ClientOnly></ClientOnly>"),
            "const el = <ClientOnly />"
        );
    }
}
