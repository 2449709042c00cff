//! Per-kind rewrite handlers.
//!
//! Candidates are grouped by resolved kind and each group goes to exactly
//! one handler. Handlers only record span edits; nothing is rendered until
//! every handler has run.

mod client_only;
mod env_only;
mod isomorphic;
mod middleware;
mod server_fn;

use diptych_carton::FxHashMap;
use diptych_croquis::{Environment, LookupKind};
use oxc_span::Span;

use crate::dce::Retention;
use crate::edits::EditSet;
use crate::error::{CompileDiagnostic, CompileError, CompileResult};
use crate::layout::Layout;
use crate::options::ServerFn;
use crate::scan::{CallSite, TemplateSite};

pub use client_only::rewrite_template_elements;
pub use server_fn::{
    increment_function_name_version, make_identifier_safe, SERVER_FN_SPLIT_PARAM,
};

/// Function ids and previously discovered server functions.
pub trait FunctionIds {
    /// Stable id of `function_name` in the file `filename` (relative to the
    /// root). `extracted_filename` is the provider file holding it.
    fn generate_function_id(
        &self,
        filename: &str,
        function_name: &str,
        extracted_filename: &str,
    ) -> String;

    /// Server functions known from an earlier compilation pass, by id.
    fn known_server_functions(&self) -> FxHashMap<String, ServerFn>;
}

/// State shared by the handlers of one compilation.
pub struct RewriteContext<'c> {
    pub file: &'c str,
    pub source: &'c str,
    pub env: Environment,
    pub root: &'c str,
    pub framework: &'c str,
    pub provider_env_name: &'c str,
    pub layout: &'c Layout,
    pub ids: &'c dyn FunctionIds,
    pub edits: EditSet,
    pub retention: Retention,
    pub diagnostics: Vec<CompileDiagnostic>,
    /// Server functions found in this file, by id.
    pub discovered: FxHashMap<String, ServerFn>,
}

impl<'c> RewriteContext<'c> {
    pub fn new(
        file: &'c str,
        source: &'c str,
        env: Environment,
        layout: &'c Layout,
        ids: &'c dyn FunctionIds,
    ) -> Self {
        Self {
            file,
            source,
            env,
            root: "",
            framework: "react",
            provider_env_name: "ssr",
            layout,
            ids,
            edits: EditSet::new(),
            retention: Retention::default(),
            diagnostics: Vec::new(),
            discovered: FxHashMap::default(),
        }
    }

    /// Original text of `span`.
    pub fn text(&self, span: Span) -> &'c str {
        self.source
            .get(span.start as usize..span.end as usize)
            .unwrap_or_default()
    }

    pub fn invalid_usage(&self, span: Span, message: impl Into<String>) -> CompileError {
        CompileError::invalid_usage(self.file, self.source, span, message)
    }

    pub fn warn(&mut self, span: Span, message: impl Into<String>) {
        let diagnostic = CompileDiagnostic::warning(self.source, span, message);
        tracing::warn!(
            file = self.file,
            line = diagnostic.line,
            column = diagnostic.column,
            "{}",
            diagnostic.message
        );
        self.diagnostics.push(diagnostic);
    }
}

/// Rewrite every call site of `kind`.
pub fn rewrite(
    kind: LookupKind,
    sites: &[&CallSite],
    ctx: &mut RewriteContext<'_>,
) -> CompileResult<()> {
    match kind {
        LookupKind::ServerFn => server_fn::rewrite(sites, ctx),
        LookupKind::Middleware => middleware::rewrite(sites, ctx),
        LookupKind::IsomorphicFn => isomorphic::rewrite(sites, ctx),
        LookupKind::ServerOnlyFn => env_only::rewrite(Environment::Server, sites, ctx),
        LookupKind::ClientOnlyFn => env_only::rewrite(Environment::Client, sites, ctx),
        // Template elements are never call sites.
        LookupKind::ClientOnlyTemplateElement => Ok(()),
    }
}

/// Rewrite template elements already confirmed to be `<ClientOnly>`.
pub fn rewrite_templates(sites: &[&TemplateSite], ctx: &mut RewriteContext<'_>) {
    if ctx.env == Environment::Server {
        rewrite_template_elements(sites, ctx);
    }
}

/// Quote `value` as a JavaScript string literal.
pub(crate) fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{value}\""))
}
