//! Cross-module resolution tests.
//!
//! Modules are served from memory; relative specifiers are joined against the
//! importer and probed with `.ts`, `.tsx` and `/index.ts`.

use std::sync::atomic::{AtomicUsize, Ordering};

use diptych_carton::FxHashMap;
use diptych_croquis::{
    default_lookup_configurations, Environment, FileId, Kind, KindSet, ModuleHost,
    ModuleRegistry, Mode, ResolveError, Resolver, ResolverOptions,
};
use futures::future::{BoxFuture, FutureExt};

#[derive(Default)]
struct MemoryHost {
    files: FxHashMap<String, String>,
    resolve_calls: AtomicUsize,
    load_calls: AtomicUsize,
}

impl MemoryHost {
    fn new(files: &[(&str, &str)]) -> Self {
        Self {
            files: files
                .iter()
                .map(|(id, code)| (id.to_string(), code.to_string()))
                .collect(),
            ..Default::default()
        }
    }
}

fn join(importer: &str, specifier: &str) -> String {
    let dir = importer.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    let mut parts: Vec<&str> = dir.split('/').collect();
    for segment in specifier.split('/') {
        match segment {
            "." => {}
            ".." => {
                parts.pop();
            }
            segment => parts.push(segment),
        }
    }
    parts.join("/")
}

impl ModuleHost for MemoryHost {
    fn load_module<'a>(&'a self, id: &'a str, registry: &'a ModuleRegistry) -> BoxFuture<'a, ()> {
        async move {
            self.load_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(code) = self.files.get(id) {
                registry.ingest(id, code);
            }
        }
        .boxed()
    }

    fn resolve_specifier<'a>(
        &'a self,
        specifier: &'a str,
        importer: Option<&'a str>,
    ) -> BoxFuture<'a, Option<FileId>> {
        async move {
            self.resolve_calls.fetch_add(1, Ordering::SeqCst);
            if specifier.starts_with('@') {
                return Some(specifier.into());
            }
            let base = join(importer?, specifier);
            [
                base.clone(),
                format!("{base}.ts"),
                format!("{base}.tsx"),
                format!("{base}/index.ts"),
            ]
            .into_iter()
            .find(|candidate| self.files.contains_key(candidate))
            .map(FileId::from)
        }
        .boxed()
    }
}

async fn setup(files: &[(&str, &str)], env: Environment, mode: Mode) -> (Resolver, MemoryHost) {
    let host = MemoryHost::new(files);
    let resolver = Resolver::new(ResolverOptions {
        mode,
        valid_kinds: KindSet::valid_for(env),
        lookup_configurations: default_lookup_configurations("react", env),
    });
    resolver.seed_libraries(&host).await.unwrap();
    (resolver, host)
}

const START: &str = "import { createServerFn, createServerOnlyFn, createIsomorphicFn, createMiddleware } from '@tanstack/react-start'\n";

#[tokio::test]
async fn test_alias_versus_invocation() {
    let app = format!(
        "{START}\
         const f = createServerOnlyFn(() => 1)\n\
         const v = f()\n\
         const g = createServerOnlyFn\n\
         const v2 = g(() => 2)\n"
    );
    let (resolver, host) = setup(&[("/src/app.ts", &app)], Environment::Client, Mode::Dev).await;

    assert_eq!(
        resolver.resolve_identifier(&host, "f", "/src/app.ts").await,
        Kind::ServerOnlyFn
    );
    assert_eq!(resolver.resolve_identifier(&host, "v", "/src/app.ts").await, Kind::None);
    assert_eq!(
        resolver.resolve_identifier(&host, "v2", "/src/app.ts").await,
        Kind::ServerOnlyFn
    );
}

#[tokio::test]
async fn test_re_export_all_chain() {
    let files = [
        ("/src/a.ts", "import { X, Y } from './b'\nconst useX = X\nconst useY = Y\n"),
        ("/src/b.ts", "export * from './c'\n"),
        ("/src/c.ts", "export * from './unrelated'\nexport * from './d'\n"),
        ("/src/unrelated.ts", "export const Z = 1\n"),
        (
            "/src/d.ts",
            "import { createServerFn, createServerOnlyFn } from '@tanstack/react-start'\n\
             export const X = createServerOnlyFn(() => 'x')\n\
             export const Y = createServerFn().handler(() => 'y')\n",
        ),
    ];
    let (resolver, host) = setup(&files, Environment::Server, Mode::Dev).await;

    let direct = resolver.resolve_identifier(&host, "X", "/src/d.ts").await;
    assert_eq!(direct, Kind::ServerOnlyFn);
    assert_eq!(resolver.resolve_identifier(&host, "useX", "/src/a.ts").await, direct);
    assert_eq!(
        resolver.resolve_identifier(&host, "useY", "/src/a.ts").await,
        Kind::ServerFn
    );
}

#[tokio::test]
async fn test_factory_alias_across_files() {
    let files = [
        (
            "/src/lib.ts",
            "export { createServerOnlyFn as serverOnly } from '@tanstack/react-start'\n",
        ),
        (
            "/src/app.ts",
            "import { serverOnly } from './lib'\nconst s = serverOnly(() => 1)\nconst t = s()\n",
        ),
    ];
    let (resolver, host) = setup(&files, Environment::Client, Mode::Dev).await;
    assert_eq!(
        resolver.resolve_identifier(&host, "s", "/src/app.ts").await,
        Kind::ServerOnlyFn
    );
    assert_eq!(resolver.resolve_identifier(&host, "t", "/src/app.ts").await, Kind::None);
}

#[tokio::test]
async fn test_cycles_resolve_to_none() {
    let files = [
        ("/src/a.ts", "export * from './b'\nexport { loop } from './b'\n"),
        ("/src/b.ts", "export * from './a'\nexport { loop } from './a'\n"),
        (
            "/src/app.ts",
            "import { missing, loop } from './a'\nconst m = missing\nconst l = loop\n",
        ),
    ];
    let (resolver, host) = setup(&files, Environment::Client, Mode::Dev).await;
    assert_eq!(resolver.resolve_identifier(&host, "m", "/src/app.ts").await, Kind::None);
    assert_eq!(resolver.resolve_identifier(&host, "l", "/src/app.ts").await, Kind::None);
}

#[tokio::test]
async fn test_self_referencing_local_is_none() {
    let files = [("/src/app.ts", "const a = b()\nconst b = a\n")];
    let (resolver, host) = setup(&files, Environment::Client, Mode::Dev).await;
    assert_eq!(resolver.resolve_identifier(&host, "a", "/src/app.ts").await, Kind::None);
}

#[tokio::test]
async fn test_namespace_imports() {
    let files = [(
        "/src/app.ts",
        "import * as start from '@tanstack/react-start'\n\
         const only = start.createServerOnlyFn(() => 1)\n\
         const fn = start.createServerFn().handler(() => 2)\n",
    )];
    let (resolver, host) = setup(&files, Environment::Server, Mode::Dev).await;
    assert_eq!(
        resolver.resolve_identifier(&host, "only", "/src/app.ts").await,
        Kind::ServerOnlyFn
    );
    assert_eq!(
        resolver.resolve_identifier(&host, "fn", "/src/app.ts").await,
        Kind::ServerFn
    );
}

#[tokio::test]
async fn test_namespace_of_local_barrel() {
    let files = [
        ("/src/fns/index.ts", "export * from './only'\n"),
        (
            "/src/fns/only.ts",
            "export { createClientOnlyFn } from '@tanstack/react-start'\n",
        ),
        (
            "/src/app.ts",
            "import * as fns from './fns'\nconst c = fns.createClientOnlyFn(() => 1)\n",
        ),
    ];
    let (resolver, host) = setup(&files, Environment::Server, Mode::Dev).await;
    assert_eq!(
        resolver.resolve_identifier(&host, "c", "/src/app.ts").await,
        Kind::ClientOnlyFn
    );
}

#[tokio::test]
async fn test_method_chains() {
    let app = format!(
        "{START}\
         const iso = createIsomorphicFn().client(() => 'c').server(() => 's')\n\
         const bare = createIsomorphicFn()\n\
         const mw = createMiddleware().client(() => 1).server(() => 2)\n\
         const validated = createServerFn({{ method: 'POST' }}).inputValidator(v => v).handler(() => 3)\n"
    );
    let (resolver, host) = setup(&[("/src/app.ts", &app)], Environment::Client, Mode::Dev).await;
    let kind = |name: &'static str| resolver.resolve_identifier(&host, name, "/src/app.ts");

    assert_eq!(kind("iso").await, Kind::IsomorphicFn);
    assert_eq!(kind("bare").await, Kind::IsomorphicFn);
    assert_eq!(kind("mw").await, Kind::Middleware);
    assert_eq!(kind("validated").await, Kind::ServerFn);
}

#[tokio::test]
async fn test_middleware_is_not_valid_on_server() {
    let app = "import { createMiddleware } from '@tanstack/react-start'\n\
               const mw = createMiddleware().server(() => 2)\n";
    let (resolver, host) = setup(&[("/src/app.ts", app)], Environment::Server, Mode::Dev).await;
    assert_eq!(
        resolver.resolve_identifier(&host, "mw", "/src/app.ts").await,
        Kind::None
    );
}

#[tokio::test]
async fn test_missing_module_is_none() {
    let files = [("/src/app.ts", "import { x } from './nowhere'\nconst y = x\n")];
    let (resolver, host) = setup(&files, Environment::Client, Mode::Dev).await;
    assert_eq!(resolver.resolve_identifier(&host, "y", "/src/app.ts").await, Kind::None);
    assert_eq!(resolver.resolve_identifier(&host, "y", "/src/unknown.ts").await, Kind::None);
}

#[tokio::test]
async fn test_unresolvable_library_is_fatal() {
    struct NoLibraries;
    impl ModuleHost for NoLibraries {
        fn load_module<'a>(&'a self, _: &'a str, _: &'a ModuleRegistry) -> BoxFuture<'a, ()> {
            async {}.boxed()
        }
        fn resolve_specifier<'a>(
            &'a self,
            _: &'a str,
            _: Option<&'a str>,
        ) -> BoxFuture<'a, Option<FileId>> {
            async { None }.boxed()
        }
    }

    let resolver = Resolver::new(ResolverOptions {
        mode: Mode::Dev,
        valid_kinds: KindSet::valid_for(Environment::Server),
        lookup_configurations: default_lookup_configurations("react", Environment::Server),
    });
    let err = resolver.seed_libraries(&NoLibraries).await.unwrap_err();
    let ResolveError::UnresolvableLibrary { lib_name } = &err;
    assert_eq!(lib_name, "@tanstack/react-start");
    assert_eq!(err.to_string(), "could not resolve \"@tanstack/react-start\"");
}

#[tokio::test]
async fn test_invalidate_module() {
    let files = [
        ("/src/dep.ts", "export const dep = 1\n"),
        ("/src/app.ts", "import { dep } from './dep'\nconst a = dep\n"),
    ];
    let (resolver, host) = setup(&files, Environment::Client, Mode::Dev).await;
    assert_eq!(resolver.resolve_identifier(&host, "a", "/src/app.ts").await, Kind::None);

    resolver.registry().ingest(
        "/src/app.ts",
        "import { createServerOnlyFn } from '@tanstack/react-start'\nconst a = createServerOnlyFn(() => 1)\n",
    );
    // The memoized result survives until the module is invalidated.
    assert_eq!(resolver.resolve_identifier(&host, "a", "/src/app.ts").await, Kind::None);

    assert!(resolver.invalidate_module("/src/app.ts"));
    resolver.registry().ingest(
        "/src/app.ts",
        "import { createServerOnlyFn } from '@tanstack/react-start'\nconst a = createServerOnlyFn(() => 1)\n",
    );
    assert_eq!(
        resolver.resolve_identifier(&host, "a", "/src/app.ts").await,
        Kind::ServerOnlyFn
    );
}

#[tokio::test]
async fn test_build_mode_caches_specifiers() {
    let files = [
        ("/src/dep.ts", "export * from './inner'\n"),
        ("/src/inner.ts", "export const value = 1\n"),
        ("/src/one.ts", "import { value } from './dep'\nconst a = value\n"),
        ("/src/two.ts", "import { value } from './dep'\nconst b = value\n"),
    ];
    let (resolver, host) = setup(&files, Environment::Client, Mode::Build).await;
    resolver.resolve_identifier(&host, "a", "/src/one.ts").await;
    let after_first = host.resolve_calls.load(Ordering::SeqCst);
    resolver.resolve_identifier(&host, "b", "/src/two.ts").await;
    // `./dep` from two.ts is new; the export lookup inside dep.ts is cached.
    assert_eq!(host.resolve_calls.load(Ordering::SeqCst), after_first + 1);

    let loads = host.load_calls.load(Ordering::SeqCst);
    resolver.resolve_identifier(&host, "b", "/src/two.ts").await;
    assert_eq!(host.load_calls.load(Ordering::SeqCst), loads);
}
