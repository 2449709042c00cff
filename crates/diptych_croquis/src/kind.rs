//! Categories assigned to call sites and template elements.
//!
//! A [`Kind`] is what resolution produces for an expression. The terminal
//! kinds are mirrored by [`LookupKind`], the set of categories that can be
//! looked up, detected and rewritten.

use std::fmt;

use diptych_carton::bitflags;
use phf::phf_map;
use serde::{Deserialize, Serialize};

/// The artifact a compilation pass is producing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Client,
    Server,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Client => "client",
            Environment::Server => "server",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Incremental (`dev`) or batch (`build`) compilation.
///
/// Resolution caches for specifiers and export lookups only exist in build
/// mode, where modules never change under the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Dev,
    Build,
}

/// Result of resolving an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    None,
    /// A builder-pattern factory such as `createServerFn`.
    Root,
    /// An intermediate value in a builder chain.
    Builder,
    ServerFn,
    Middleware,
    IsomorphicFn,
    ServerOnlyFn,
    ClientOnlyFn,
    ClientOnlyTemplateElement,
}

impl Kind {
    /// The lookup kind for terminal categories.
    pub fn lookup(self) -> Option<LookupKind> {
        match self {
            Kind::None | Kind::Root | Kind::Builder => None,
            Kind::ServerFn => Some(LookupKind::ServerFn),
            Kind::Middleware => Some(LookupKind::Middleware),
            Kind::IsomorphicFn => Some(LookupKind::IsomorphicFn),
            Kind::ServerOnlyFn => Some(LookupKind::ServerOnlyFn),
            Kind::ClientOnlyFn => Some(LookupKind::ClientOnlyFn),
            Kind::ClientOnlyTemplateElement => Some(LookupKind::ClientOnlyTemplateElement),
        }
    }

    #[inline]
    pub fn is_root_or_builder(self) -> bool {
        matches!(self, Kind::Root | Kind::Builder)
    }
}

impl From<LookupKind> for Kind {
    fn from(kind: LookupKind) -> Self {
        match kind {
            LookupKind::ServerFn => Kind::ServerFn,
            LookupKind::Middleware => Kind::Middleware,
            LookupKind::IsomorphicFn => Kind::IsomorphicFn,
            LookupKind::ServerOnlyFn => Kind::ServerOnlyFn,
            LookupKind::ClientOnlyFn => Kind::ClientOnlyFn,
            LookupKind::ClientOnlyTemplateElement => Kind::ClientOnlyTemplateElement,
        }
    }
}

/// How candidates of a lookup kind appear in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupSetup {
    /// Terminated by one of the given method names, e.g. `.handler(...)`.
    MethodChain(&'static [&'static str]),
    /// Called directly, e.g. `createServerOnlyFn(...)`.
    DirectCall(&'static str),
    /// A template element, e.g. `<ClientOnly>`.
    TemplateElement(&'static str),
}

/// Terminal categories that can be detected and rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LookupKind {
    ServerFn,
    Middleware,
    IsomorphicFn,
    ServerOnlyFn,
    ClientOnlyFn,
    ClientOnlyTemplateElement,
}

impl LookupKind {
    pub const ALL: [LookupKind; 6] = [
        LookupKind::ServerFn,
        LookupKind::Middleware,
        LookupKind::IsomorphicFn,
        LookupKind::ServerOnlyFn,
        LookupKind::ClientOnlyFn,
        LookupKind::ClientOnlyTemplateElement,
    ];

    pub fn setup(self) -> LookupSetup {
        match self {
            LookupKind::ServerFn => LookupSetup::MethodChain(&["handler"]),
            LookupKind::Middleware => {
                LookupSetup::MethodChain(&["server", "client", "createMiddlewares"])
            }
            LookupKind::IsomorphicFn => LookupSetup::MethodChain(&["server", "client"]),
            LookupKind::ServerOnlyFn => LookupSetup::DirectCall("createServerOnlyFn"),
            LookupKind::ClientOnlyFn => LookupSetup::DirectCall("createClientOnlyFn"),
            LookupKind::ClientOnlyTemplateElement => LookupSetup::TemplateElement("ClientOnly"),
        }
    }

    /// Whether this kind may be rewritten when producing `env`.
    pub fn is_valid_for(self, env: Environment) -> bool {
        match self {
            LookupKind::ServerFn
            | LookupKind::IsomorphicFn
            | LookupKind::ServerOnlyFn
            | LookupKind::ClientOnlyFn => true,
            LookupKind::Middleware => env == Environment::Client,
            LookupKind::ClientOnlyTemplateElement => env == Environment::Server,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LookupKind::ServerFn => "ServerFn",
            LookupKind::Middleware => "Middleware",
            LookupKind::IsomorphicFn => "IsomorphicFn",
            LookupKind::ServerOnlyFn => "ServerOnlyFn",
            LookupKind::ClientOnlyFn => "ClientOnlyFn",
            LookupKind::ClientOnlyTemplateElement => "ClientOnlyTemplateElement",
        }
    }

    fn flag(self) -> KindSet {
        match self {
            LookupKind::ServerFn => KindSet::SERVER_FN,
            LookupKind::Middleware => KindSet::MIDDLEWARE,
            LookupKind::IsomorphicFn => KindSet::ISOMORPHIC_FN,
            LookupKind::ServerOnlyFn => KindSet::SERVER_ONLY_FN,
            LookupKind::ClientOnlyFn => KindSet::CLIENT_ONLY_FN,
            LookupKind::ClientOnlyTemplateElement => KindSet::CLIENT_ONLY_TEMPLATE_ELEMENT,
        }
    }
}

impl fmt::Display for LookupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags! {
    /// A set of lookup kinds.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct KindSet: u8 {
        const SERVER_FN = 1 << 0;
        const MIDDLEWARE = 1 << 1;
        const ISOMORPHIC_FN = 1 << 2;
        const SERVER_ONLY_FN = 1 << 3;
        const CLIENT_ONLY_FN = 1 << 4;
        const CLIENT_ONLY_TEMPLATE_ELEMENT = 1 << 5;
    }
}

impl KindSet {
    /// Every kind valid for `env`.
    pub fn valid_for(env: Environment) -> Self {
        LookupKind::ALL
            .into_iter()
            .filter(|kind| kind.is_valid_for(env))
            .collect()
    }

    #[inline]
    pub fn has(self, kind: LookupKind) -> bool {
        self.contains(kind.flag())
    }

    #[inline]
    pub fn with(self, kind: LookupKind) -> Self {
        self | kind.flag()
    }

    /// Kinds in declaration order.
    pub fn kinds(self) -> impl Iterator<Item = LookupKind> {
        LookupKind::ALL.into_iter().filter(move |kind| self.has(*kind))
    }

    /// Any kind is invoked directly rather than through a method chain.
    pub fn needs_direct_call_detection(self) -> bool {
        self.kinds()
            .any(|kind| matches!(kind.setup(), LookupSetup::DirectCall(_)))
            || self.has(LookupKind::IsomorphicFn)
    }

    pub fn needs_template_detection(self) -> bool {
        self.kinds()
            .any(|kind| matches!(kind.setup(), LookupSetup::TemplateElement(_)))
    }

    /// Only server functions are possible, and those are always declared at
    /// the top level.
    pub fn is_top_level_only(self) -> bool {
        self == KindSet::SERVER_FN
    }
}

impl FromIterator<LookupKind> for KindSet {
    fn from_iter<I: IntoIterator<Item = LookupKind>>(iter: I) -> Self {
        iter.into_iter()
            .fold(KindSet::empty(), |set, kind| set.with(kind))
    }
}

const HANDLER_KINDS: &[LookupKind] = &[LookupKind::ServerFn];
const ENV_BRANCH_KINDS: &[LookupKind] = &[LookupKind::Middleware, LookupKind::IsomorphicFn];
const MIDDLEWARE_KINDS: &[LookupKind] = &[LookupKind::Middleware];

/// Chain-terminating method name to the kinds it can terminate, in check order.
static CHAIN_METHOD_KINDS: phf::Map<&'static str, &'static [LookupKind]> = phf_map! {
    "handler" => HANDLER_KINDS,
    "server" => ENV_BRANCH_KINDS,
    "client" => ENV_BRANCH_KINDS,
    "createMiddlewares" => MIDDLEWARE_KINDS,
};

/// Kinds a `.method(...)` call with this name could terminate.
#[inline]
pub fn chain_kinds(method: &str) -> &'static [LookupKind] {
    CHAIN_METHOD_KINDS.get(method).copied().unwrap_or(&[])
}

/// Whether `name` is the name of a directly-called factory.
#[inline]
pub fn is_direct_call_factory(name: &str) -> bool {
    matches!(
        name,
        "createServerOnlyFn" | "createClientOnlyFn" | "createIsomorphicFn"
    )
}

/// Seeds one library export with a kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupConfig {
    pub lib_name: String,
    pub root_export: String,
    /// `Root` for builder factories, a terminal kind for direct factories.
    pub kind: Kind,
}

impl LookupConfig {
    pub fn new(lib_name: impl Into<String>, root_export: impl Into<String>, kind: Kind) -> Self {
        Self {
            lib_name: lib_name.into(),
            root_export: root_export.into(),
            kind,
        }
    }

    /// Template-element seeds are only checked against import sources and
    /// never resolved as modules.
    pub fn is_template_element(&self) -> bool {
        matches!(
            self.kind.lookup().map(LookupKind::setup),
            Some(LookupSetup::TemplateElement(_))
        )
    }
}

/// Package always recognised for the direct factories.
pub const STUB_PACKAGE: &str = "@tanstack/start-fn-stubs";

/// The lookup configurations a framework installs for `env`.
pub fn default_lookup_configurations(framework: &str, env: Environment) -> Vec<LookupConfig> {
    let start = format!("@tanstack/{framework}-start");
    let mut configs = vec![
        LookupConfig::new(&start, "createServerFn", Kind::Root),
        LookupConfig::new(&start, "createIsomorphicFn", Kind::IsomorphicFn),
        LookupConfig::new(&start, "createServerOnlyFn", Kind::ServerOnlyFn),
        LookupConfig::new(&start, "createClientOnlyFn", Kind::ClientOnlyFn),
    ];
    match env {
        Environment::Client => {
            configs.push(LookupConfig::new(&start, "createMiddleware", Kind::Root));
            configs.push(LookupConfig::new(&start, "createStart", Kind::Root));
        }
        Environment::Server => {
            configs.push(LookupConfig::new(
                format!("@tanstack/{framework}-router"),
                "ClientOnly",
                Kind::ClientOnlyTemplateElement,
            ));
        }
    }
    configs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_kinds_per_environment() {
        let client = KindSet::valid_for(Environment::Client);
        assert!(client.has(LookupKind::Middleware));
        assert!(!client.has(LookupKind::ClientOnlyTemplateElement));

        let server = KindSet::valid_for(Environment::Server);
        assert!(!server.has(LookupKind::Middleware));
        assert!(server.has(LookupKind::ClientOnlyTemplateElement));
        assert_eq!(server.kinds().count(), 5);
    }

    #[test]
    fn test_chain_kinds_order() {
        assert_eq!(chain_kinds("handler"), &[LookupKind::ServerFn]);
        assert_eq!(
            chain_kinds("client"),
            &[LookupKind::Middleware, LookupKind::IsomorphicFn]
        );
        assert!(chain_kinds("then").is_empty());
    }

    #[test]
    fn test_fast_path_only_for_server_fn() {
        assert!(KindSet::SERVER_FN.is_top_level_only());
        assert!(!(KindSet::SERVER_FN | KindSet::MIDDLEWARE).is_top_level_only());
        assert!(!KindSet::empty().is_top_level_only());
    }

    #[test]
    fn test_direct_call_detection() {
        assert!(KindSet::SERVER_ONLY_FN.needs_direct_call_detection());
        assert!(KindSet::ISOMORPHIC_FN.needs_direct_call_detection());
        assert!(!KindSet::SERVER_FN.needs_direct_call_detection());
    }

    #[test]
    fn test_default_lookup_configurations() {
        let client = default_lookup_configurations("react", Environment::Client);
        assert!(client
            .iter()
            .any(|c| c.root_export == "createMiddleware" && c.kind == Kind::Root));
        assert!(!client.iter().any(LookupConfig::is_template_element));

        let server = default_lookup_configurations("solid", Environment::Server);
        let template = server
            .iter()
            .find(|c| c.is_template_element())
            .map(|c| c.lib_name.as_str());
        assert_eq!(template, Some("@tanstack/solid-router"));
    }

    #[test]
    fn test_lookup_config_json() {
        let config: LookupConfig = serde_json::from_str(
            r#"{"libName":"@acme/start","rootExport":"createServerFn","kind":"Root"}"#,
        )
        .unwrap();
        assert_eq!(config.kind, Kind::Root);
        assert_eq!(config.lib_name, "@acme/start");
    }
}
