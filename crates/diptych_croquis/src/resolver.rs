//! Cross-module binding resolution.
//!
//! Answers "what kind of thing does this expression evaluate to" by following
//! local initializers, imports, named re-exports and `export *` chains across
//! files. Modules are ingested lazily through a [`ModuleHost`].
//!
//! Every recursive step carries its own copy of the visited set, so two
//! candidates resolved concurrently never observe each other's traversal.
//! Revisiting a `(file, name)` pair on the current path resolves to
//! [`Kind::None`].

use std::sync::Arc;

use dashmap::DashMap;
use diptych_carton::{CompactString, FxHashMap, FxHashSet};
use futures::future::{join_all, BoxFuture, FutureExt};

use crate::error::{ResolveError, ResolveResult};
use crate::expr::Expr;
use crate::kind::{chain_kinds, Kind, KindSet, LookupConfig, LookupKind, Mode, STUB_PACKAGE};
use crate::module::{Binding, FileId, ModuleInfo, NAMESPACE_IMPORT};
use crate::registry::ModuleRegistry;

/// Access to the module graph of the host build tool.
pub trait ModuleHost: Send + Sync {
    /// Ingest the module `id` into `registry`, or leave it absent if it
    /// cannot be loaded.
    fn load_module<'a>(&'a self, id: &'a str, registry: &'a ModuleRegistry) -> BoxFuture<'a, ()>;

    /// Resolve a module specifier as seen from `importer`.
    fn resolve_specifier<'a>(
        &'a self,
        specifier: &'a str,
        importer: Option<&'a str>,
    ) -> BoxFuture<'a, Option<FileId>>;
}

/// Resolver configuration.
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub mode: Mode,
    /// Kinds that may terminate a chain or a direct call.
    pub valid_kinds: KindSet,
    pub lookup_configurations: Vec<LookupConfig>,
}

type BindingKey = (FileId, CompactString);
type Visited = FxHashSet<BindingKey>;

/// An export located in some module, possibly behind `export *`.
#[derive(Debug, Clone)]
struct FoundExport {
    module: Arc<ModuleInfo>,
    local: CompactString,
}

/// Binding resolver of one compiler instance.
#[derive(Debug)]
pub struct Resolver {
    mode: Mode,
    valid_kinds: KindSet,
    lookup_configurations: Vec<LookupConfig>,
    registry: ModuleRegistry,
    /// Library name to export name to seeded kind.
    known_roots: FxHashMap<CompactString, FxHashMap<CompactString, Kind>>,
    /// Resolved kind per `(file, local name)`.
    memo: DashMap<BindingKey, Kind>,
    /// Build mode only: `(importer, specifier)` to resolved id.
    resolve_id_cache: DashMap<(CompactString, CompactString), Option<FileId>>,
    /// Build mode only: `(module, exported name)` to its location.
    export_cache: DashMap<BindingKey, Option<FoundExport>>,
}

impl Resolver {
    pub fn new(options: ResolverOptions) -> Self {
        let mut known_roots: FxHashMap<CompactString, FxHashMap<CompactString, Kind>> =
            FxHashMap::default();
        known_roots.insert(
            STUB_PACKAGE.into(),
            [
                ("createIsomorphicFn", Kind::IsomorphicFn),
                ("createServerOnlyFn", Kind::ServerOnlyFn),
                ("createClientOnlyFn", Kind::ClientOnlyFn),
            ]
            .into_iter()
            .map(|(name, kind)| (CompactString::from(name), kind))
            .collect(),
        );
        for config in &options.lookup_configurations {
            known_roots
                .entry(config.lib_name.as_str().into())
                .or_default()
                .insert(config.root_export.as_str().into(), config.kind);
        }

        Self {
            mode: options.mode,
            valid_kinds: options.valid_kinds,
            lookup_configurations: options.lookup_configurations,
            registry: ModuleRegistry::new(),
            known_roots,
            memo: DashMap::new(),
            resolve_id_cache: DashMap::new(),
            export_cache: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn valid_kinds(&self) -> KindSet {
        self.valid_kinds
    }

    /// Kind seeded for `export` of the library `source`, if any.
    pub fn known_root_kind(&self, source: &str, export: &str) -> Option<Kind> {
        self.known_roots.get(source)?.get(export).copied()
    }

    /// Resolve every configured library and install its seeded exports.
    ///
    /// Template-element libraries are only matched by import source and are
    /// never resolved.
    pub async fn seed_libraries<H: ModuleHost + ?Sized>(&self, host: &H) -> ResolveResult<()> {
        let pending = self
            .lookup_configurations
            .iter()
            .filter(|config| !config.is_template_element())
            .map(|config| async move {
                let lib_id = self
                    .resolve_id(host, &config.lib_name, None)
                    .await
                    .ok_or_else(|| ResolveError::UnresolvableLibrary {
                        lib_name: config.lib_name.clone(),
                    })?;
                Ok::<_, ResolveError>((lib_id, config))
            });

        for seeded in join_all(pending).await {
            let (lib_id, config) = seeded?;
            let export: CompactString = config.root_export.as_str().into();
            self.registry.update(&lib_id, |info| {
                info.exports.insert(export.clone(), export.clone());
                info.bindings
                    .insert(export.clone(), Binding::Seeded { kind: config.kind });
            });
            tracing::debug!(lib = %lib_id, export = %export, kind = ?config.kind, "seeded library export");
        }
        Ok(())
    }

    /// Drop a module and everything cached about it.
    pub fn invalidate_module(&self, id: &str) -> bool {
        self.memo.retain(|(file, _), _| file != id);
        self.export_cache.retain(|(file, _), found| {
            file != id && found.as_ref().map_or(true, |found| found.module.id != id)
        });
        self.registry.remove(id)
    }

    /// Resolve the kind of `expr` as it appears in `file`.
    pub fn resolve_expression<'a, H: ModuleHost + ?Sized>(
        &'a self,
        host: &'a H,
        expr: &'a Expr,
        file: &'a str,
    ) -> BoxFuture<'a, Kind> {
        self.resolve_expr(host, expr, file, Visited::default())
    }

    /// Resolve the kind of the top-level binding `name` of `file`.
    pub fn resolve_identifier<'a, H: ModuleHost + ?Sized>(
        &'a self,
        host: &'a H,
        name: &'a str,
        file: &'a str,
    ) -> BoxFuture<'a, Kind> {
        self.resolve_ident(host, name, file, Visited::default())
    }

    #[inline]
    fn is_valid(&self, kind: Kind) -> bool {
        kind.lookup().is_some_and(|kind| self.valid_kinds.has(kind))
    }

    async fn module<H: ModuleHost + ?Sized>(&self, host: &H, id: &str) -> Option<Arc<ModuleInfo>> {
        if let Some(info) = self.registry.get(id) {
            return Some(info);
        }
        host.load_module(id, &self.registry).await;
        let info = self.registry.get(id);
        if info.is_none() {
            tracing::warn!(file = id, "could not load module info");
        }
        info
    }

    async fn resolve_id<H: ModuleHost + ?Sized>(
        &self,
        host: &H,
        specifier: &str,
        importer: Option<&str>,
    ) -> Option<FileId> {
        if self.mode == Mode::Dev {
            return host.resolve_specifier(specifier, importer).await;
        }

        let key = (
            CompactString::from(importer.unwrap_or_default()),
            CompactString::from(specifier),
        );
        if let Some(hit) = self.resolve_id_cache.get(&key).map(|entry| entry.clone()) {
            return hit;
        }
        let resolved = host.resolve_specifier(specifier, importer).await;
        self.resolve_id_cache.insert(key, resolved.clone());
        resolved
    }

    fn resolve_ident<'a, H: ModuleHost + ?Sized>(
        &'a self,
        host: &'a H,
        name: &'a str,
        file: &'a str,
        mut visited: Visited,
    ) -> BoxFuture<'a, Kind> {
        async move {
            let Some(info) = self.module(host, file).await else {
                return Kind::None;
            };
            let Some(binding) = info.bindings.get(name) else {
                return Kind::None;
            };

            let key: BindingKey = (file.into(), name.into());
            if let Some(kind) = self.memo.get(&key).map(|entry| *entry) {
                return kind;
            }
            if !visited.insert(key.clone()) {
                return Kind::None;
            }

            let kind = self.resolve_binding(host, binding, file, visited).await;
            tracing::debug!(file, name, ?kind, "resolved binding");
            self.memo.insert(key, kind);
            kind
        }
        .boxed()
    }

    fn resolve_binding<'a, H: ModuleHost + ?Sized>(
        &'a self,
        host: &'a H,
        binding: &'a Binding,
        file: &'a str,
        visited: Visited,
    ) -> BoxFuture<'a, Kind> {
        async move {
            match binding {
                Binding::Seeded { kind } => *kind,
                Binding::Local { init: Some(init) } => {
                    self.resolve_expr(host, init, file, visited).await
                }
                Binding::Local { init: None } => Kind::None,
                Binding::Import { source, imported } => {
                    if let Some(kind) = self.known_root_kind(source, imported) {
                        return kind;
                    }
                    let Some(target) = self.resolve_id(host, source, Some(file)).await else {
                        return Kind::None;
                    };
                    let Some(module) = self.module(host, &target).await else {
                        return Kind::None;
                    };
                    let Some(found) = self
                        .find_export(host, module, imported, FxHashSet::default())
                        .await
                    else {
                        return Kind::None;
                    };
                    self.resolve_ident(host, &found.local, &found.module.id, visited)
                        .await
                }
            }
        }
        .boxed()
    }

    /// Locate `name` among the exports of `module`, following `export *`.
    ///
    /// Re-export sources are searched concurrently; the first source in
    /// declaration order that has the export wins.
    fn find_export<'a, H: ModuleHost + ?Sized>(
        &'a self,
        host: &'a H,
        module: Arc<ModuleInfo>,
        name: &'a str,
        mut visited_modules: FxHashSet<FileId>,
    ) -> BoxFuture<'a, Option<FoundExport>> {
        async move {
            let top_level = visited_modules.is_empty();
            let cache_key: BindingKey = (module.id.clone(), name.into());
            if self.mode == Mode::Build && top_level {
                if let Some(hit) = self.export_cache.get(&cache_key).map(|entry| entry.clone()) {
                    tracing::debug!(module = %module.id, name, "export cache hit");
                    return hit;
                }
            }

            if !visited_modules.insert(module.id.clone()) {
                return None;
            }

            if let Some((local, _)) = module.exported_binding(name) {
                let found = FoundExport {
                    module: Arc::clone(&module),
                    local: local.clone(),
                };
                if self.mode == Mode::Build {
                    self.export_cache.insert(cache_key, Some(found.clone()));
                }
                return Some(found);
            }

            let mut branches: Vec<BoxFuture<'_, Option<FoundExport>>> = Vec::new();
            for source in &module.re_export_all_sources {
                let visited_modules = visited_modules.clone();
                let importer = module.id.as_str();
                branches.push(
                    async move {
                        let target = self.resolve_id(host, source, Some(importer)).await?;
                        let inner = self.module(host, &target).await?;
                        self.find_export(host, inner, name, visited_modules).await
                    }
                    .boxed(),
                );
            }
            let found = join_all(branches).await.into_iter().flatten().next();

            if self.mode == Mode::Build && (found.is_some() || top_level) {
                self.export_cache.insert(cache_key, found.clone());
            }
            found
        }
        .boxed()
    }

    fn resolve_expr<'a, H: ModuleHost + ?Sized>(
        &'a self,
        host: &'a H,
        expr: &'a Expr,
        file: &'a str,
        visited: Visited,
    ) -> BoxFuture<'a, Kind> {
        async move {
            match expr {
                Expr::Call { callee } => {
                    let callee_kind = self
                        .resolve_callee(host, callee, file, visited.clone())
                        .await;
                    if callee_kind.is_root_or_builder() {
                        return Kind::Builder;
                    }
                    if !self.is_valid(callee_kind) {
                        return Kind::None;
                    }
                    // `builder.handler(...)`: the chain method itself produced the kind.
                    if let Expr::Member {
                        property: Some(method),
                        ..
                    } = callee.as_ref()
                    {
                        if chain_kinds(method)
                            .iter()
                            .any(|kind| Kind::from(*kind) == callee_kind)
                        {
                            return callee_kind;
                        }
                    }
                    // A direct call only counts when the callee is the factory
                    // itself, not a value the factory already produced.
                    if self.is_factory_reference(host, callee, file, visited).await {
                        callee_kind
                    } else {
                        Kind::None
                    }
                }
                Expr::Member {
                    object,
                    property: Some(property),
                } => {
                    if let Some(kind) = self
                        .resolve_namespace_member(host, object, property, file, visited.clone())
                        .await
                    {
                        return kind;
                    }
                    self.resolve_callee(host, object, file, visited).await
                }
                Expr::Ident(name) => self.resolve_ident(host, name, file, visited).await,
                Expr::Member { property: None, .. } | Expr::Other => Kind::None,
            }
        }
        .boxed()
    }

    fn resolve_callee<'a, H: ModuleHost + ?Sized>(
        &'a self,
        host: &'a H,
        callee: &'a Expr,
        file: &'a str,
        visited: Visited,
    ) -> BoxFuture<'a, Kind> {
        async move {
            match callee {
                Expr::Ident(name) => self.resolve_ident(host, name, file, visited).await,
                Expr::Member {
                    object,
                    property: Some(property),
                } => {
                    let mut base = None;
                    let candidates = chain_kinds(property);
                    if !candidates.is_empty() {
                        // One resolution of the base serves every candidate kind.
                        let kind = self.resolve_expr(host, object, file, visited.clone()).await;
                        for candidate in candidates {
                            if self.valid_kinds.has(*candidate) && chain_accepts(*candidate, kind) {
                                return (*candidate).into();
                            }
                        }
                        base = Some(kind);
                    }

                    if let Some(kind) = self
                        .resolve_namespace_member(host, object, property, file, visited.clone())
                        .await
                    {
                        return kind;
                    }

                    match base {
                        Some(kind) => kind,
                        None => self.resolve_expr(host, object, file, visited).await,
                    }
                }
                Expr::Member { property: None, .. } | Expr::Other => Kind::None,
                Expr::Call { .. } => self.resolve_expr(host, callee, file, visited).await,
            }
        }
        .boxed()
    }

    /// Resolve `ns.property` when `ns` is a namespace import of `file`.
    ///
    /// Returns `None` when `object` is not a namespace import.
    fn resolve_namespace_member<'a, H: ModuleHost + ?Sized>(
        &'a self,
        host: &'a H,
        object: &'a Expr,
        property: &'a str,
        file: &'a str,
        visited: Visited,
    ) -> BoxFuture<'a, Option<Kind>> {
        async move {
            let namespace = object.as_ident()?;
            let info = self.module(host, file).await?;
            let Some(Binding::Import { source, imported }) = info.bindings.get(namespace) else {
                return None;
            };
            if imported != NAMESPACE_IMPORT {
                return None;
            }

            if let Some(kind) = self.known_root_kind(source, property) {
                return Some(kind);
            }
            let Some(target) = self.resolve_id(host, source, Some(file)).await else {
                return Some(Kind::None);
            };
            let Some(module) = self.module(host, &target).await else {
                return Some(Kind::None);
            };
            let Some(found) = self
                .find_export(host, module, property, FxHashSet::default())
                .await
            else {
                return Some(Kind::None);
            };
            Some(
                self.resolve_ident(host, &found.local, &found.module.id, visited)
                    .await,
            )
        }
        .boxed()
    }

    /// Whether `expr` refers to a seeded factory without passing through a
    /// call: an identifier aliasing it through locals, imports and re-exports,
    /// or a member of a namespace import.
    fn is_factory_reference<'a, H: ModuleHost + ?Sized>(
        &'a self,
        host: &'a H,
        expr: &'a Expr,
        file: &'a str,
        mut visited: Visited,
    ) -> BoxFuture<'a, bool> {
        async move {
            match expr {
                Expr::Ident(name) => {
                    let Some(info) = self.module(host, file).await else {
                        return false;
                    };
                    let Some(binding) = info.bindings.get(name.as_str()) else {
                        return false;
                    };
                    if !visited.insert((file.into(), name.clone())) {
                        return false;
                    }
                    self.is_factory_binding(host, binding, file, visited).await
                }
                Expr::Member {
                    object,
                    property: Some(property),
                } => {
                    let Some(namespace) = object.as_ident() else {
                        return false;
                    };
                    let Some(info) = self.module(host, file).await else {
                        return false;
                    };
                    match info.bindings.get(namespace) {
                        Some(Binding::Import { source, imported }) if imported == NAMESPACE_IMPORT => {
                            self.is_factory_export(host, source, property, file, visited)
                                .await
                        }
                        _ => false,
                    }
                }
                _ => false,
            }
        }
        .boxed()
    }

    fn is_factory_binding<'a, H: ModuleHost + ?Sized>(
        &'a self,
        host: &'a H,
        binding: &'a Binding,
        file: &'a str,
        visited: Visited,
    ) -> BoxFuture<'a, bool> {
        async move {
            match binding {
                Binding::Seeded { .. } => true,
                Binding::Local { init: Some(init) } => {
                    self.is_factory_reference(host, init, file, visited).await
                }
                Binding::Local { init: None } => false,
                Binding::Import { imported, .. } if imported == NAMESPACE_IMPORT => false,
                Binding::Import { source, imported } => {
                    self.is_factory_export(host, source, imported, file, visited)
                        .await
                }
            }
        }
        .boxed()
    }

    fn is_factory_export<'a, H: ModuleHost + ?Sized>(
        &'a self,
        host: &'a H,
        source: &'a str,
        export: &'a str,
        importer: &'a str,
        mut visited: Visited,
    ) -> BoxFuture<'a, bool> {
        async move {
            if self.known_root_kind(source, export).is_some() {
                return true;
            }
            let Some(target) = self.resolve_id(host, source, Some(importer)).await else {
                return false;
            };
            let Some(module) = self.module(host, &target).await else {
                return false;
            };
            let Some(found) = self
                .find_export(host, module, export, FxHashSet::default())
                .await
            else {
                return false;
            };
            if !visited.insert((found.module.id.clone(), found.local.clone())) {
                return false;
            }
            let Some(binding) = found.module.bindings.get(found.local.as_str()) else {
                return false;
            };
            self.is_factory_binding(host, binding, &found.module.id, visited)
                .await
        }
        .boxed()
    }
}

/// Whether a `.method(...)` call on a base of kind `base` can produce `kind`.
fn chain_accepts(kind: LookupKind, base: Kind) -> bool {
    match kind {
        LookupKind::ServerFn => base.is_root_or_builder(),
        LookupKind::Middleware => base.is_root_or_builder() || base == Kind::Middleware,
        LookupKind::IsomorphicFn => base.is_root_or_builder() || base == Kind::IsomorphicFn,
        LookupKind::ServerOnlyFn
        | LookupKind::ClientOnlyFn
        | LookupKind::ClientOnlyTemplateElement => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_accepts() {
        assert!(chain_accepts(LookupKind::ServerFn, Kind::Builder));
        assert!(!chain_accepts(LookupKind::ServerFn, Kind::ServerFn));
        assert!(chain_accepts(LookupKind::Middleware, Kind::Middleware));
        assert!(chain_accepts(LookupKind::IsomorphicFn, Kind::IsomorphicFn));
        assert!(!chain_accepts(LookupKind::IsomorphicFn, Kind::Middleware));
    }

    #[test]
    fn test_stub_package_is_always_known() {
        let resolver = Resolver::new(ResolverOptions {
            mode: Mode::Dev,
            valid_kinds: KindSet::all(),
            lookup_configurations: Vec::new(),
        });
        assert_eq!(
            resolver.known_root_kind(STUB_PACKAGE, "createServerOnlyFn"),
            Some(Kind::ServerOnlyFn)
        );
        assert_eq!(resolver.known_root_kind(STUB_PACKAGE, "createServerFn"), None);
    }
}
