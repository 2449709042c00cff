//! Textual pre-filter.
//!
//! Decides from raw text alone which kinds a file might contain. The
//! patterns over-approximate: a match only means the file is worth parsing.

use diptych_croquis::{Environment, KindSet, LookupKind};
use once_cell::sync::Lazy;
use regex::Regex;

static SERVER_FN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bcreateServerFn\b|\.\s*handler\s*\(").unwrap());
static MIDDLEWARE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"createMiddleware").unwrap());
static ISOMORPHIC_FN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"createIsomorphicFn").unwrap());
static SERVER_ONLY_FN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"createServerOnlyFn").unwrap());
static CLIENT_ONLY_FN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"createClientOnlyFn").unwrap());
static CLIENT_ONLY_ELEMENT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<ClientOnly|import\s*\{[^}]*\bClientOnly\b").unwrap());

fn pattern(kind: LookupKind) -> &'static Regex {
    match kind {
        LookupKind::ServerFn => &SERVER_FN_PATTERN,
        LookupKind::Middleware => &MIDDLEWARE_PATTERN,
        LookupKind::IsomorphicFn => &ISOMORPHIC_FN_PATTERN,
        LookupKind::ServerOnlyFn => &SERVER_ONLY_FN_PATTERN,
        LookupKind::ClientOnlyFn => &CLIENT_ONLY_FN_PATTERN,
        LookupKind::ClientOnlyTemplateElement => &CLIENT_ONLY_ELEMENT_PATTERN,
    }
}

/// Kinds valid for `env` whose pattern occurs in `source`.
pub fn detect_categories_in_text(source: &str, env: Environment) -> KindSet {
    KindSet::valid_for(env)
        .kinds()
        .filter(|kind| pattern(*kind).is_match(source))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVERYTHING: &str = r#"
import { ClientOnly } from '@tanstack/react-router'
createServerFn createMiddleware createIsomorphicFn
createServerOnlyFn createClientOnlyFn <ClientOnly />
"#;

    #[test]
    fn test_detection_is_exclusive_per_env() {
        for env in [Environment::Client, Environment::Server] {
            let detected = detect_categories_in_text(EVERYTHING, env);
            for kind in LookupKind::ALL {
                assert_eq!(detected.has(kind), kind.is_valid_for(env), "{kind} in {env}");
            }
        }
    }

    #[test]
    fn test_detection_is_idempotent() {
        let first = detect_categories_in_text(EVERYTHING, Environment::Client);
        let second = detect_categories_in_text(EVERYTHING, Environment::Client);
        assert_eq!(first, second);
    }

    #[test]
    fn test_handler_call_counts_as_server_fn() {
        let detected =
            detect_categories_in_text("const f = make().handler (() => 1)", Environment::Client);
        assert_eq!(detected, KindSet::SERVER_FN);
    }

    #[test]
    fn test_word_boundary() {
        let detected = detect_categories_in_text("mycreateServerFnx()", Environment::Server);
        assert!(detected.is_empty());
    }

    #[test]
    fn test_client_only_import() {
        let detected = detect_categories_in_text(
            "import { Link, ClientOnly } from '@tanstack/react-router'",
            Environment::Server,
        );
        assert_eq!(detected, KindSet::CLIENT_ONLY_TEMPLATE_ELEMENT);
    }

    #[test]
    fn test_plain_file() {
        assert!(detect_categories_in_text("export const a = 1", Environment::Client).is_empty());
    }
}
