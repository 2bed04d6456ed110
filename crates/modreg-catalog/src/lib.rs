//! Catalog records and storage seam for the module registry.
//!
//! This crate defines the persisted shapes ([`Module`], [`ModuleVersion`],
//! [`ModuleInstallation`] and the embedded [`Metadata`]) and the [`Catalog`]
//! trait through which the registry reads and writes them. The storage
//! engine behind the trait is an external concern; [`MemoryCatalog`] is the
//! in-process implementation used for tests and embedding.

pub mod catalog;
pub mod error;
pub mod memory;
pub mod model;

pub use catalog::Catalog;
pub use error::{Entity, Error, Result};
pub use memory::{CatalogSnapshot, MemoryCatalog};
pub use model::{
    Author, Capability, Compatibility, Dependency, Metadata, Module, ModuleId, ModuleInstallation,
    ModuleStatus, ModuleType, ModuleVersion, ReviewStatus,
};
