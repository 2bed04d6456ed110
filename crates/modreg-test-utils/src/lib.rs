//! Shared test utilities for the module registry workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`builders`]: [`ModuleBuilder`] for module records with metadata
//! - [`seed`]: [`CatalogSeeder`] for populating a [`MemoryCatalog`](modreg_catalog::MemoryCatalog)
//! - [`logging`]: tracing output for test runs

pub mod builders;
pub mod logging;
pub mod seed;

pub use builders::ModuleBuilder;
pub use logging::init_tracing;
pub use seed::{CatalogSeeder, fixture_path};
