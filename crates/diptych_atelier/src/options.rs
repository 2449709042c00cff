//! Compiler configuration and server function metadata.

use diptych_croquis::{
    default_lookup_configurations, Environment, KindSet, LookupConfig, LookupKind, Mode,
};
use serde::{Deserialize, Serialize};

/// Options of one compiler instance.
///
/// Every field except `env` has a default, so a JSON document only needs
/// `{ "env": "client" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerOptions {
    pub env: Environment,
    /// Name of the build environment, used in diagnostics.
    #[serde(default)]
    pub env_name: String,
    /// Project root. Function ids and metadata use paths relative to it.
    #[serde(default)]
    pub root: String,
    #[serde(default = "default_framework")]
    pub framework: String,
    /// Environment that hosts server function implementations.
    #[serde(default = "default_provider_env_name")]
    pub provider_env_name: String,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub lookup_configurations: Option<Vec<LookupConfig>>,
    #[serde(default)]
    pub lookup_kinds: Option<Vec<LookupKind>>,
}

fn default_framework() -> String {
    "react".to_string()
}

fn default_provider_env_name() -> String {
    "ssr".to_string()
}

impl CompilerOptions {
    pub fn new(env: Environment) -> Self {
        Self {
            env,
            env_name: String::new(),
            root: String::new(),
            framework: default_framework(),
            provider_env_name: default_provider_env_name(),
            mode: Mode::default(),
            lookup_configurations: None,
            lookup_kinds: None,
        }
    }

    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_framework(mut self, framework: impl Into<String>) -> Self {
        self.framework = framework.into();
        self
    }

    pub fn with_provider_env_name(mut self, name: impl Into<String>) -> Self {
        self.provider_env_name = name.into();
        self
    }

    /// Environment name, falling back to the environment itself.
    pub fn env_name(&self) -> &str {
        if self.env_name.is_empty() {
            self.env.as_str()
        } else {
            &self.env_name
        }
    }

    /// Library exports seeded at initialization.
    pub fn resolved_lookup_configurations(&self) -> Vec<LookupConfig> {
        self.lookup_configurations
            .clone()
            .unwrap_or_else(|| default_lookup_configurations(&self.framework, self.env))
    }

    /// Kinds this instance may rewrite. Kinds invalid for `env` are dropped.
    pub fn valid_kinds(&self) -> KindSet {
        let env_kinds = KindSet::valid_for(self.env);
        match &self.lookup_kinds {
            Some(kinds) => kinds.iter().copied().collect::<KindSet>() & env_kinds,
            None => env_kinds,
        }
    }
}

/// A server function discovered while compiling a caller file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerFn {
    /// Export name in the provider file, e.g. `getUser_createServerFn_handler`.
    pub function_name: String,
    pub function_id: String,
    /// Id of the caller file, without query.
    pub filename: String,
    /// Id of the provider file that holds the implementation.
    pub extracted_filename: String,
    /// Reachable from the client artifact.
    pub is_client_referenced: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal() {
        let options: CompilerOptions = serde_json::from_str(r#"{ "env": "server" }"#).unwrap();
        assert_eq!(options, CompilerOptions::new(Environment::Server));
        assert_eq!(options.env_name(), "server");
        assert_eq!(options.provider_env_name, "ssr");
    }

    #[test]
    fn test_lookup_kinds_are_clamped_to_env() {
        let options: CompilerOptions = serde_json::from_str(
            r#"{ "env": "server", "lookupKinds": ["Middleware", "ServerFn"] }"#,
        )
        .unwrap();
        assert_eq!(options.valid_kinds(), KindSet::SERVER_FN);
    }

    #[test]
    fn test_default_lookup_configurations_follow_framework() {
        let options = CompilerOptions::new(Environment::Client).with_framework("solid");
        assert!(options
            .resolved_lookup_configurations()
            .iter()
            .all(|config| config.lib_name == "@tanstack/solid-start"));
    }

    #[test]
    fn test_server_fn_wire_names() {
        let server_fn = ServerFn {
            function_name: "a_createServerFn_handler".into(),
            function_id: "id".into(),
            filename: "/src/a.ts".into(),
            extracted_filename: "/src/a.ts?tss-serverfn-split".into(),
            is_client_referenced: true,
        };
        let json = serde_json::to_value(&server_fn).unwrap();
        assert_eq!(json["functionName"], "a_createServerFn_handler");
        assert_eq!(json["extractedFilename"], "/src/a.ts?tss-serverfn-split");
        assert_eq!(json["isClientReferenced"], true);
    }
}
