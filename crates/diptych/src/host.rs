//! A compiler host backed by the file system.
//!
//! Module ids are absolute paths, optionally followed by a query. Relative
//! specifiers are probed on disk with the usual script extensions and
//! `index` files. Configured library names are never looked up on disk:
//! each resolves to itself, since only their seeded exports matter.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use diptych_atelier::{CompilerHost, ServerFn};
use diptych_carton::{FxHashMap, FxHashSet};
use diptych_croquis::{FileId, ModuleHost, ModuleRegistry, STUB_PACKAGE};
use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;

/// Extensions tried, in order, for a specifier without one.
pub const SCRIPT_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs"];

pub struct FsHost {
    libraries: FxHashSet<String>,
    discovered: Mutex<BTreeMap<String, ServerFn>>,
}

impl FsHost {
    pub fn new(libraries: impl IntoIterator<Item = String>) -> Self {
        let mut libraries: FxHashSet<String> = libraries.into_iter().collect();
        libraries.insert(STUB_PACKAGE.to_string());
        Self {
            libraries,
            discovered: Mutex::new(BTreeMap::new()),
        }
    }

    /// Every server function reported so far, by id.
    pub fn discovered(&self) -> BTreeMap<String, ServerFn> {
        self.discovered.lock().clone()
    }

    async fn probe(&self, base: &Path) -> Option<PathBuf> {
        if is_file(base).await {
            return Some(base.to_path_buf());
        }
        let file_name = base.file_name()?.to_string_lossy().into_owned();
        for ext in SCRIPT_EXTENSIONS {
            let candidate = base.with_file_name(format!("{file_name}.{ext}"));
            if is_file(&candidate).await {
                return Some(candidate);
            }
        }
        for ext in SCRIPT_EXTENSIONS {
            let candidate = base.join(format!("index.{ext}"));
            if is_file(&candidate).await {
                return Some(candidate);
            }
        }
        None
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

/// `id` without its query.
fn path_of(id: &str) -> &str {
    id.split('?').next().unwrap_or(id)
}

/// Lexically resolve `.` and `..` components.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

impl ModuleHost for FsHost {
    fn load_module<'a>(&'a self, id: &'a str, registry: &'a ModuleRegistry) -> BoxFuture<'a, ()> {
        async move {
            match tokio::fs::read_to_string(path_of(id)).await {
                Ok(code) => {
                    registry.ingest(id, &code);
                }
                Err(e) => tracing::debug!(file = id, "cannot read module: {e}"),
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
            if self.libraries.contains(specifier) {
                return Some(specifier.into());
            }
            let base = if specifier.starts_with('/') {
                PathBuf::from(specifier)
            } else if specifier.starts_with('.') {
                let importer = Path::new(path_of(importer?));
                importer.parent()?.join(specifier)
            } else {
                tracing::debug!(specifier, "bare specifier is not resolved");
                return None;
            };
            let resolved = self.probe(&normalize(&base)).await?;
            Some(resolved.to_string_lossy().as_ref().into())
        }
        .boxed()
    }
}

impl CompilerHost for FsHost {
    fn on_server_functions_discovered(&self, functions: &FxHashMap<String, ServerFn>) {
        self.discovered
            .lock()
            .extend(functions.iter().map(|(id, f)| (id.clone(), f.clone())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize(Path::new("/a/b/./../c/d")),
            PathBuf::from("/a/c/d")
        );
    }

    #[tokio::test]
    async fn test_resolve_specifiers() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src/utils")).unwrap();
        std::fs::write(root.join("src/app.ts"), "").unwrap();
        std::fs::write(root.join("src/fns.tsx"), "").unwrap();
        std::fs::write(root.join("src/utils/index.ts"), "").unwrap();

        let host = FsHost::new(["@tanstack/react-start".to_string()]);
        let importer = root.join("src/app.ts").to_string_lossy().into_owned();
        let importer = format!("{importer}?tss-serverfn-split");

        let fns = host.resolve_specifier("./fns", Some(&importer)).await;
        assert_eq!(
            fns.as_deref(),
            Some(root.join("src/fns.tsx").to_string_lossy().as_ref())
        );
        let utils = host.resolve_specifier("./utils", Some(&importer)).await;
        assert_eq!(
            utils.as_deref(),
            Some(root.join("src/utils/index.ts").to_string_lossy().as_ref())
        );
        assert_eq!(host.resolve_specifier("./missing", Some(&importer)).await, None);
        assert_eq!(
            host.resolve_specifier("@tanstack/react-start", None).await.as_deref(),
            Some("@tanstack/react-start")
        );
        assert_eq!(
            host.resolve_specifier(STUB_PACKAGE, None).await.as_deref(),
            Some(STUB_PACKAGE)
        );
        assert_eq!(host.resolve_specifier("lodash", Some(&importer)).await, None);
    }

    #[tokio::test]
    async fn test_load_module_strips_query() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.ts");
        std::fs::write(&path, "export const a = 1\n").unwrap();
        let id = format!("{}?tss-serverfn-split", path.to_string_lossy());

        let host = FsHost::new(Vec::new());
        let registry = ModuleRegistry::new();
        host.load_module(&id, &registry).await;
        assert!(registry.get(&id).is_some_and(|info| info.exports.contains_key("a")));
    }
}
