//! `createMiddleware()` chains, rewritten for the client only.

use super::RewriteContext;
use crate::error::CompileResult;
use crate::scan::CallSite;

/// Strip `.inputValidator(...)` and `.server(...)` segments from each chain.
pub(super) fn rewrite(sites: &[&CallSite], ctx: &mut RewriteContext<'_>) -> CompileResult<()> {
    for site in sites {
        let chain = &site.chain;

        if let Some(validator) = &chain.input_validator {
            if validator.first_arg.is_none() {
                return Err(ctx.invalid_usage(
                    validator.call,
                    "createMiddleware().inputValidator() must be called with a validator!",
                ));
            }
            ctx.edits
                .replace_with_source(validator.call, validator.object);
        }

        if let Some(server) = &chain.server {
            if server.first_arg.is_some() {
                ctx.edits.replace_with_source(server.call, server.object);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::run;
    use diptych_croquis::{Environment, LookupKind};

    fn client(source: &str) -> String {
        run("/m.ts", source, Environment::Client, LookupKind::Middleware)
            .unwrap()
            .0
    }

    #[test]
    fn test_server_segment_is_stripped() {
        assert_eq!(
            client("const m = createMiddleware().server(async ({ next }) => next())"),
            "const m = createMiddleware()"
        );
    }

    #[test]
    fn test_validator_and_server_inside_client_chain() {
        let source = "const m = createMiddleware({ type: 'function' })\n  .inputValidator(schema)\n  .server(s)\n  .client(c)";
        assert_eq!(
            client(source),
            "const m = createMiddleware({ type: 'function' })\n  .client(c)"
        );
    }

    #[test]
    fn test_validator_without_argument_fails() {
        let error = run(
            "/m.ts",
            "const m = createMiddleware().inputValidator().client(c)",
            Environment::Client,
            LookupKind::Middleware,
        )
        .unwrap_err();
        assert!(error
            .to_string()
            .starts_with("createMiddleware().inputValidator() must be called with a validator!"));
    }
}
