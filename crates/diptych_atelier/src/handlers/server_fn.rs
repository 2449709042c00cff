//! `createServerFn().handler(...)` chains.
//!
//! A server function lives in two places. Caller files (the client
//! artifact, and the server artifact outside the provider) keep the chain
//! but swap the handler for an RPC stub. The provider file, the caller
//! module loaded again with [`SERVER_FN_SPLIT_PARAM`] in its id, keeps the
//! implementation and exports it under a derived name.

use diptych_carton::{FxHashMap, FxHashSet};
use diptych_croquis::Environment;
use once_cell::sync::Lazy;
use oxc_span::Span;
use regex::Regex;

use super::{js_string, RewriteContext};
use crate::edits::with_line_break;
use crate::error::CompileResult;
use crate::layout::ExportShape;
use crate::options::ServerFn;
use crate::scan::CallSite;

/// Query parameter marking the provider copy of a module.
pub const SERVER_FN_SPLIT_PARAM: &str = "tss-serverfn-split";

static UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9_$]").unwrap());
static REPEATED_UNDERSCORES: Lazy<Regex> = Lazy::new(|| Regex::new(r"_{2,}").unwrap());
static VERSION_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"_(\d+)$").unwrap());

/// Turn `name` into a valid JavaScript identifier fragment.
pub fn make_identifier_safe(name: &str) -> String {
    let mut safe = UNSAFE_CHARS.replace_all(name, "_").into_owned();
    if safe.starts_with(|c: char| c.is_ascii_digit()) {
        safe.insert(0, '_');
    }
    if safe.starts_with('$') {
        safe.insert(0, '_');
    }
    let safe = REPEATED_UNDERSCORES.replace_all(&safe, "_");
    let safe = safe.strip_prefix('_').unwrap_or(&safe);
    safe.strip_suffix('_').unwrap_or(safe).to_string()
}

/// `name` → `name_1`, `name_1` → `name_2`.
pub fn increment_function_name_version(name: &str) -> String {
    let (base, version) = match VERSION_SUFFIX.captures(name) {
        Some(captures) => {
            let start = captures.get(0).map_or(name.len(), |m| m.start());
            let version = captures
                .get(1)
                .and_then(|m| m.as_str().parse::<u64>().ok())
                .unwrap_or(0);
            (&name[..start], version)
        }
        None => (name, 0),
    };
    format!("{}_{}", make_identifier_safe(base), version + 1)
}

/// `id` without its query or hash.
fn clean_id(id: &str) -> &str {
    id.split(['?', '#']).next().unwrap_or(id)
}

fn relative_to_root<'p>(root: &str, path: &'p str) -> &'p str {
    let root = root.trim_end_matches('/');
    if root.is_empty() {
        return path;
    }
    path.strip_prefix(root)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(path)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Runtime {
    Provider,
    Client,
    Ssr,
}

impl Runtime {
    fn import(self, framework: &str) -> String {
        let (name, module) = match self {
            Runtime::Provider => ("createServerRpc", "server-rpc"),
            Runtime::Client => ("createClientRpc", "client-rpc"),
            Runtime::Ssr => ("createSsrRpc", "ssr-rpc"),
        };
        format!("import {{ {name} }} from '@tanstack/{framework}-start/{module}';\n")
    }
}

pub(super) fn rewrite(sites: &[&CallSite], ctx: &mut RewriteContext<'_>) -> CompileResult<()> {
    if sites.is_empty() {
        return Ok(());
    }

    let is_provider = ctx.file.contains(SERVER_FN_SPLIT_PARAM);
    let runtime = if is_provider {
        Runtime::Provider
    } else if ctx.env == Environment::Client {
        Runtime::Client
    } else {
        Runtime::Ssr
    };
    let ssr_is_provider = ctx.provider_env_name == "ssr";

    let base_filename = ctx.file.split('?').next().unwrap_or(ctx.file);
    let extracted_filename = format!("{base_filename}?{SERVER_FN_SPLIT_PARAM}");
    let relative_filename = relative_to_root(ctx.root, base_filename).to_string();
    let cleaned_id = clean_id(ctx.file).to_string();
    let known = ctx.ids.known_server_functions();

    ctx.edits
        .insert(ctx.layout.body_start, runtime.import(ctx.framework));

    let mut taken_names: FxHashSet<String> = FxHashSet::default();
    let mut export_names: Vec<String> = Vec::new();
    let mut discovered: FxHashMap<String, ServerFn> = FxHashMap::default();

    for site in sites {
        let Some(declarator) = &site.declarator else {
            return Err(ctx.invalid_usage(
                site.call.span,
                "createServerFn must be assigned to a variable!",
            ));
        };
        let Some(variable) = declarator.name.clone() else {
            return Err(ctx.invalid_usage(
                declarator.id_span,
                "createServerFn must be assigned to a simple identifier, not a destructuring pattern",
            ));
        };

        let mut function_name = format!("{variable}_createServerFn_handler");
        while taken_names.contains(&function_name) {
            function_name = increment_function_name_version(&function_name);
        }
        taken_names.insert(function_name.clone());

        let function_id =
            ctx.ids
                .generate_function_id(&relative_filename, &function_name, &extracted_filename);
        let known_fn = known.get(&function_id);
        let is_client_referenced = ctx.env == Environment::Client || known_fn.is_some();
        let canonical_extracted = known_fn
            .map(|known| known.extracted_filename.clone())
            .unwrap_or_else(|| extracted_filename.clone());

        let chain = &site.chain;
        if let Some(validator) = &chain.input_validator {
            if validator.first_arg.is_none() {
                return Err(ctx.invalid_usage(
                    validator.call,
                    "createServerFn().inputValidator() must be called with a validator!",
                ));
            }
            if ctx.env == Environment::Client {
                ctx.edits
                    .replace_with_source(validator.call, validator.object);
            }
        }

        let handler_arg = chain
            .handler
            .as_ref()
            .and_then(|handler| handler.first_arg.as_ref());
        let Some(handler_arg) = handler_arg else {
            return Err(ctx.invalid_usage(
                site.call.callee_span,
                r#"createServerFn must be called with a "handler" property!"#,
            ));
        };
        if handler_arg.is_spread {
            return Err(ctx.invalid_usage(
                handler_arg.span,
                "handler() must be called with an expression, not a SpreadElement",
            ));
        }

        if is_provider {
            let meta = format!(
                "{{ id: {}, name: {}, filename: {} }}",
                js_string(&function_id),
                js_string(&variable),
                js_string(&relative_filename),
            );
            ctx.edits.insert(
                declarator.insert_at,
                format!(
                    "const {function_name} = createServerRpc({meta}, (opts, signal) => {variable}.__executeServer(opts, signal));\n"
                ),
            );
            ctx.edits
                .insert(handler_arg.span.start, format!("{function_name}, "));
            ctx.retention.pinned.insert(variable);
            export_names.push(function_name);
            continue;
        }

        let stub = match runtime {
            Runtime::Client => format!("createClientRpc({})", js_string(&function_id)),
            _ if is_client_referenced || !ssr_is_provider => {
                format!("createSsrRpc({})", js_string(&function_id))
            }
            _ => format!(
                "createSsrRpc({}, () => import({}).then(m => m[{}]))",
                js_string(&function_id),
                js_string(&canonical_extracted),
                js_string(&function_name),
            ),
        };
        ctx.edits.replace_with_text(handler_arg.span, stub);

        discovered.insert(
            function_id.clone(),
            ServerFn {
                function_name,
                function_id,
                filename: cleaned_id.clone(),
                extracted_filename: canonical_extracted,
                is_client_referenced,
            },
        );
    }

    if is_provider {
        strip_exports(ctx);
        if !export_names.is_empty() {
            let separator = if ctx.source.ends_with('\n') { "" } else { "\n" };
            ctx.edits.insert(
                ctx.source.len() as u32,
                format!("{separator}export {{ {} }};\n", export_names.join(", ")),
            );
        }
    } else {
        tracing::debug!(
            file = ctx.file,
            count = discovered.len(),
            "discovered server functions"
        );
        ctx.discovered.extend(discovered);
    }
    Ok(())
}

/// Remove every `export` of the provider file but keep the declarations.
fn strip_exports(ctx: &mut RewriteContext<'_>) {
    for export in &ctx.layout.exports {
        match export.shape {
            ExportShape::Declaration { declaration_start } => {
                ctx.edits
                    .remove(Span::new(export.span.start, declaration_start));
            }
            ExportShape::Specifiers => {
                ctx.edits.remove(with_line_break(ctx.source, export.span));
            }
            ExportShape::Kept => {}
        }
    }
    ctx.retention.exports_stripped = true;
}
