//! # diptych_croquis
//!
//! Croquis - The semantic analysis layer for Diptych.
//!
//! ## Name Origin
//!
//! **Croquis** (/kʁɔ.ki/) is a French term for a quick, sketchy drawing that captures
//! the essential features of a subject. `diptych_croquis` sketches each module
//! only as deeply as needed: its top-level bindings and exports, never its
//! function bodies.
//!
//! ## Purpose
//!
//! - **Kind Model**: The categories a call site or template element can fall into
//! - **Module Ingestion**: Top-level bindings and exports of a file
//! - **Binding Resolution**: Following aliases, imports and re-exports across files
//!
//! ## Architecture
//!
//! ```text
//!  diptych_carton (Toolbox)
//!          ↓
//! diptych_croquis (Semantic Analysis)  ← This crate
//!          ↓
//! diptych_atelier (Transform)
//! ```

pub mod error;
pub mod expr;
pub mod kind;
pub mod module;
pub mod registry;
pub mod resolver;

pub use error::{ResolveError, ResolveResult};
pub use expr::{unwrap_expression, Expr};
pub use kind::{
    chain_kinds, default_lookup_configurations, is_direct_call_factory, Environment, Kind,
    KindSet, LookupConfig, LookupKind, LookupSetup, Mode, STUB_PACKAGE,
};
pub use module::{
    ingest_source, source_type_for, Binding, FileId, ModuleInfo, NAMESPACE_IMPORT,
    SYNTHETIC_DEFAULT_EXPORT,
};
pub use registry::ModuleRegistry;
pub use resolver::{ModuleHost, Resolver, ResolverOptions};
