//! `createServerOnlyFn(fn)` and `createClientOnlyFn(fn)`.

use diptych_croquis::Environment;

use super::{js_string, RewriteContext};
use crate::error::CompileResult;
use crate::scan::CallSite;

fn factory_name(declared: Environment) -> &'static str {
    match declared {
        Environment::Server => "createServerOnlyFn",
        Environment::Client => "createClientOnlyFn",
    }
}

/// Unwrap the function where it may run, replace it by a thrower elsewhere.
pub(super) fn rewrite(
    declared: Environment,
    sites: &[&CallSite],
    ctx: &mut RewriteContext<'_>,
) -> CompileResult<()> {
    let factory = factory_name(declared);
    for site in sites {
        let arg = match &site.call.first_arg {
            Some(arg) if !arg.is_spread => arg,
            _ => {
                return Err(ctx.invalid_usage(
                    site.call.span,
                    format!("{factory}() must be called with a function!"),
                ))
            }
        };

        if ctx.env == declared {
            ctx.edits.replace_with_source(site.call.span, arg.span);
        } else {
            let message = format!("{factory}() functions can only be called on the {declared}!");
            ctx.edits.replace_with_text(
                site.call.span,
                format!("() => {{ throw new Error({}) }}", js_string(&message)),
            );
        }
    }
    Ok(())
}
