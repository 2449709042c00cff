//! Carton - The artist's toolbox for Diptych.
//!
//! This crate provides the foundational utilities shared by every Diptych crate,
//! much like a carton (artist's portfolio case) holds the tools an artist
//! carries from one canvas to the next.
//!
//! # Modules
//!
//! - **hash**: Content hashing for change detection and server function ids
//! - **source_map**: Line indexing and Source Map v3 encoding
//!
//! # Example
//!
//! ```
//! use diptych_carton::source_map::vlq;
//!
//! assert_eq!(vlq::encode(16), "gB");
//! assert_eq!(vlq::decode("gB"), Some((16, 2)));
//! ```

pub mod hash;
pub mod source_map;

// Re-export compact_str::CompactString for convenience
pub use compact_str::CompactString;

// Re-export rustc-hash for fast hash maps/sets
pub use rustc_hash::{FxHashMap, FxHashSet};

// Re-export bitflags for flag types
pub use bitflags::bitflags;

// Re-export phf for compile-time perfect hash functions
pub use phf::{phf_map, phf_set, Map as PhfMap, Set as PhfSet};
