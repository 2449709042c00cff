//! `createIsomorphicFn()` chains.
//!
//! The whole chain collapses to the branch of the current environment, or
//! to a no-op when that branch is missing.

use diptych_croquis::Environment;

use super::RewriteContext;
use crate::error::CompileResult;
use crate::scan::CallSite;

const NO_OP: &str = "() => {}";

pub(super) fn rewrite(sites: &[&CallSite], ctx: &mut RewriteContext<'_>) -> CompileResult<()> {
    for site in sites {
        let chain = &site.chain;
        if chain.client.is_none() && chain.server.is_none() {
            let name = site
                .declarator
                .as_ref()
                .and_then(|declarator| declarator.name.as_deref())
                .unwrap_or("unknown");
            ctx.warn(
                site.call.span,
                format!(
                    "createIsomorphicFn called without a client or server implementation! \
                     This will result in a no-op function. Variable name: {name}"
                ),
            );
        }

        let branch = match ctx.env {
            Environment::Client => &chain.client,
            Environment::Server => &chain.server,
        };
        let Some(branch) = branch else {
            ctx.edits.replace_with_text(site.call.span, NO_OP);
            continue;
        };

        match &branch.first_arg {
            Some(arg) if !arg.is_spread => ctx.edits.replace_with_source(site.call.span, arg.span),
            _ => {
                return Err(ctx.invalid_usage(
                    branch.call,
                    format!(
                        "createIsomorphicFn().{}(func) must be called with a function!",
                        ctx.env
                    ),
                ))
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::run;
    use crate::error::{CompileDiagnostic, CompileResult};
    use diptych_croquis::{Environment, LookupKind};

    fn compile(source: &str, env: Environment) -> CompileResult<(String, Vec<CompileDiagnostic>)> {
        run("/a.ts", source, env, LookupKind::IsomorphicFn)
    }

    #[test]
    fn test_picks_branch_of_env() {
        let source = "const fn = createIsomorphicFn().client(() => 'c').server(() => 's')";
        let (client, _) = compile(source, Environment::Client).unwrap();
        assert_eq!(client, "const fn = () => 'c'");
        let (server, _) = compile(source, Environment::Server).unwrap();
        assert_eq!(server, "const fn = () => 's'");
    }

    #[test]
    fn test_missing_branch_is_silent_no_op() {
        let source = "const fn = createIsomorphicFn().server(() => 's')";
        let (code, warnings) = compile(source, Environment::Client).unwrap();
        assert_eq!(code, "const fn = () => {}");
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_no_branches_warns_once() {
        let (code, warnings) =
            compile("const lonely = createIsomorphicFn()", Environment::Server).unwrap();
        assert_eq!(code, "const lonely = () => {}");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("lonely"));
    }

    #[test]
    fn test_branch_without_function_fails() {
        let error =
            compile("const fn = createIsomorphicFn().client()", Environment::Client).unwrap_err();
        assert!(error
            .to_string()
            .starts_with("createIsomorphicFn().client(func) must be called with a function!"));
    }
}
