//! The compiler instance.
//!
//! One [`Compiler`] exists per build environment. It owns the resolver and
//! its caches, so compiling many files against the same instance shares
//! everything already learned about the module graph.

use std::collections::BTreeMap;

use diptych_carton::hash::{base64url, sha256_hex};
use diptych_carton::source_map::SourceMap;
use diptych_carton::{FxHashMap, FxHashSet};
use diptych_croquis::{
    source_type_for, Binding, Kind, KindSet, LookupKind, ModuleHost, ModuleInfo, Mode, Resolver,
    ResolverOptions,
};
use futures::future::join_all;
use oxc_allocator::Allocator;
use oxc_parser::Parser;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::OnceCell;

use crate::dce::eliminate_dead_code;
use crate::detect::detect_categories_in_text;
use crate::error::{CompileDiagnostic, CompileError, CompileResult};
use crate::handlers::{self, FunctionIds, RewriteContext};
use crate::layout::Layout;
use crate::options::{CompilerOptions, ServerFn};
use crate::scan::{scan_program, CallSite, ScanResult, TemplateSite};

/// The build tool a compiler is embedded in.
///
/// Besides module access, the host may supply function ids and is told
/// about every server function a caller file declares.
pub trait CompilerHost: ModuleHost {
    /// Custom id for a server function in build mode. `None` falls back to
    /// a content hash.
    fn generate_function_id(&self, _filename: &str, _function_name: &str) -> Option<String> {
        None
    }

    /// Called after each compilation that found server functions, by id.
    fn on_server_functions_discovered(&self, _functions: &FxHashMap<String, ServerFn>) {}

    /// Server functions known from an earlier pass, by id.
    fn known_server_functions(&self) -> FxHashMap<String, ServerFn> {
        FxHashMap::default()
    }
}

/// Output of a compilation that rewrote something.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub code: String,
    pub map: SourceMap,
    pub warnings: Vec<CompileDiagnostic>,
}

/// Build-mode function ids handed out so far.
#[derive(Debug, Default)]
struct FunctionIdRegistry {
    /// `filename--function` to id.
    by_entry: FxHashMap<String, String>,
    taken: FxHashSet<String>,
}

#[derive(Serialize)]
struct DevFunctionId<'a> {
    file: String,
    export: &'a str,
}

/// Everything a compilation needs from the syntax tree, extracted before
/// any `.await`.
struct Analysis {
    module: ModuleInfo,
    scan: ScanResult,
    layout: Layout,
}

/// Client or server compiler.
pub struct Compiler<H> {
    options: CompilerOptions,
    valid_kinds: KindSet,
    host: H,
    resolver: Resolver,
    initialized: OnceCell<()>,
    function_ids: Mutex<FunctionIdRegistry>,
}

impl<H: CompilerHost> Compiler<H> {
    pub fn new(options: CompilerOptions, host: H) -> Self {
        let valid_kinds = options.valid_kinds();
        let resolver = Resolver::new(ResolverOptions {
            mode: options.mode,
            valid_kinds,
            lookup_configurations: options.resolved_lookup_configurations(),
        });
        Self {
            options,
            valid_kinds,
            host,
            resolver,
            initialized: OnceCell::new(),
            function_ids: Mutex::new(FunctionIdRegistry::default()),
        }
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Kinds this instance rewrites.
    pub fn valid_kinds(&self) -> KindSet {
        self.valid_kinds
    }

    /// Resolve the configured libraries. Runs until it succeeds once.
    pub async fn initialize(&self) -> CompileResult<()> {
        self.initialized
            .get_or_try_init(|| async {
                self.resolver.seed_libraries(&self.host).await?;
                tracing::debug!(env = self.options.env_name(), "compiler initialized");
                Ok::<(), CompileError>(())
            })
            .await
            .map(|_| ())
    }

    /// Forget a changed or deleted module.
    pub fn invalidate_module(&self, id: &str) -> bool {
        self.resolver.invalidate_module(id)
    }

    /// Kinds that may occur in `code`, restricted to this instance.
    pub fn detect(&self, code: &str) -> KindSet {
        detect_categories_in_text(code, self.options.env) & self.valid_kinds
    }

    /// Compile one module.
    ///
    /// `detected` narrows the kinds looked for; without it every valid kind
    /// is. Returns `None` when nothing in the file needs rewriting.
    pub async fn compile(
        &self,
        id: &str,
        code: &str,
        detected: Option<KindSet>,
    ) -> CompileResult<Option<CompileOutput>> {
        self.initialize().await?;

        let kinds = detected.map_or(self.valid_kinds, |kinds| kinds & self.valid_kinds);
        if kinds.is_empty() {
            return Ok(None);
        }

        let Analysis {
            module,
            scan,
            layout,
        } = analyze(id, code, kinds)?;

        self.resolver.invalidate_module(id);
        let module = self.resolver.registry().insert(module);

        let templates: Vec<&TemplateSite> = scan
            .templates
            .iter()
            .filter(|site| match module.bindings.get(site.name.as_str()) {
                Some(Binding::Import { source, imported }) => {
                    self.resolver.known_root_kind(source, imported)
                        == Some(Kind::ClientOnlyTemplateElement)
                }
                _ => false,
            })
            .collect();

        if scan.candidates.is_empty() && templates.is_empty() {
            return Ok(None);
        }

        let resolved = join_all(
            scan.candidates
                .iter()
                .map(|site| self.resolver.resolve_expression(&self.host, &site.expr, id)),
        )
        .await;

        let mut groups: BTreeMap<LookupKind, Vec<&CallSite>> = BTreeMap::new();
        for (site, kind) in scan.candidates.iter().zip(resolved) {
            if let Some(kind) = kind.lookup().filter(|kind| self.valid_kinds.has(*kind)) {
                groups.entry(kind).or_default().push(site);
            }
        }

        if groups.is_empty() && templates.is_empty() {
            return Ok(None);
        }
        tracing::debug!(
            file = id,
            candidates = scan.candidates.len(),
            rewritten = groups.values().map(Vec::len).sum::<usize>(),
            templates = templates.len(),
            "compiling"
        );

        let mut ctx = RewriteContext::new(id, code, self.options.env, &layout, self);
        ctx.root = self.options.root.as_str();
        ctx.framework = self.options.framework.as_str();
        ctx.provider_env_name = self.options.provider_env_name.as_str();

        for (kind, sites) in &groups {
            handlers::rewrite(*kind, sites, &mut ctx)?;
        }
        handlers::rewrite_templates(&templates, &mut ctx);

        eliminate_dead_code(code, &layout, &mut ctx.edits, &ctx.retention);
        let rendered = ctx.edits.render(id, code);

        if !ctx.discovered.is_empty() {
            self.host.on_server_functions_discovered(&ctx.discovered);
        }

        Ok(Some(CompileOutput {
            code: rendered.code,
            map: rendered.map,
            warnings: ctx.diagnostics,
        }))
    }
}

impl<H: CompilerHost> FunctionIds for Compiler<H> {
    fn generate_function_id(
        &self,
        filename: &str,
        function_name: &str,
        extracted_filename: &str,
    ) -> String {
        if self.options.mode == Mode::Dev {
            let root = format!("{}/", self.options.root.trim_end_matches('/'));
            let file = extracted_filename
                .strip_prefix(root.as_str())
                .unwrap_or(extracted_filename);
            let payload = DevFunctionId {
                file: format!("/@id/{file}"),
                export: function_name,
            };
            return base64url(&serde_json::to_string(&payload).unwrap_or_default());
        }

        let entry = format!("{filename}--{function_name}");
        let mut registry = self.function_ids.lock();
        if let Some(id) = registry.by_entry.get(&entry) {
            return id.clone();
        }

        let mut id = self
            .host
            .generate_function_id(filename, function_name)
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| sha256_hex(&entry));
        if registry.taken.contains(&id) {
            let mut iteration = 1;
            while registry.taken.contains(&format!("{id}_{iteration}")) {
                iteration += 1;
            }
            id = format!("{id}_{iteration}");
        }
        registry.by_entry.insert(entry, id.clone());
        registry.taken.insert(id.clone());
        id
    }

    fn known_server_functions(&self) -> FxHashMap<String, ServerFn> {
        self.host.known_server_functions()
    }
}

/// Parse `code` and take every snapshot the rewrite needs.
fn analyze(id: &str, code: &str, kinds: KindSet) -> CompileResult<Analysis> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, code, source_type_for(id)).parse();
    if ret.panicked || !ret.errors.is_empty() {
        let message = ret
            .errors
            .first()
            .map(|error| error.to_string())
            .unwrap_or_else(|| "unrecoverable syntax error".to_string());
        return Err(CompileError::Parse {
            file: id.to_string(),
            message,
        });
    }

    Ok(Analysis {
        module: ModuleInfo::from_program(id, &ret.program),
        scan: scan_program(&ret.program, kinds),
        layout: Layout::from_program(&ret.program),
    })
}
