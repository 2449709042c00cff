//! # diptych_atelier
//!
//! Atelier - The transform workshop for Diptych.
//!
//! ## Name Origin
//!
//! An **atelier** (/a.tə.lje/) is the workshop where a piece is actually made.
//! `diptych_atelier` takes one source file and produces one of its two
//! panels: the client artifact or the server artifact.
//!
//! ## Pipeline
//!
//! 1. [`detect`]: a textual pre-filter that rules files out without parsing
//! 2. [`scan`]: one traversal collecting candidate calls, method chains and
//!    template elements as owned snapshots
//! 3. resolution of each candidate through `diptych_croquis`
//! 4. [`handlers`]: per-kind rewrites, recorded as [`edits`]
//! 5. [`dce`]: removal of bindings the rewrites orphaned
//! 6. rendering with a source map
//!
//! ## Architecture
//!
//! ```text
//!  diptych_carton (Toolbox)
//!          ↓
//! diptych_croquis (Semantic Analysis)
//!          ↓
//! diptych_atelier (Transform)  ← This crate
//! ```

pub mod compiler;
pub mod dce;
pub mod detect;
pub mod edits;
pub mod error;
pub mod handlers;
pub mod layout;
pub mod options;
pub mod scan;

pub use compiler::{CompileOutput, Compiler, CompilerHost};
pub use detect::detect_categories_in_text;
pub use error::{CompileDiagnostic, CompileError, CompileResult, Severity};
pub use handlers::{increment_function_name_version, make_identifier_safe, SERVER_FN_SPLIT_PARAM};
pub use options::{CompilerOptions, ServerFn};
