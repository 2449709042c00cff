//! # Diptych
//!
//! Splits a TanStack Start source tree into its client and server panels.
//!
//! This crate re-exports all Diptych sub-crates for unified documentation
//! and hosts the pieces the `diptych` binary needs around them.
//!
//! ## Crates
//!
//! - [`carton`] - Collections, hashing and source maps
//! - [`croquis`] - Kind model, module ingestion and binding resolution
//! - [`atelier`] - Detection, candidate scan and rewriting
//!
//! ## Modules
//!
//! - [`config`] - `diptych.config.json` loading
//! - [`host`] - A [`atelier::CompilerHost`] backed by the file system

/// Collections, hashing and source maps.
pub use diptych_carton as carton;

/// Kind model, module ingestion and binding resolution.
pub use diptych_croquis as croquis;

/// Detection, candidate scan and rewriting.
pub use diptych_atelier as atelier;

pub mod config;
pub mod host;
