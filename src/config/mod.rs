// src/config/mod.rs

//! Live configuration objects consumed by manifest compilation.
//!
//! The full configuration layer (file discovery, parsing, revision
//! resolution) lives in the embedding launcher; this module only models the
//! slice of it that [`crate::manifest::compile`] reads.

pub mod model;

pub use model::{BuildSpec, ExperimentSpec, Project, ResolvedBuild, RunDescriptor, VariantSpec};
