//! Dependency resolution, conflict detection and lifecycle rules for the
//! module registry.
//!
//! The entry point is [`ModuleRegistry`], built from an injected
//! [`Catalog`](modreg_catalog::Catalog), an [`EventSink`] and a
//! [`RegistryConfig`]:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use modreg_catalog::MemoryCatalog;
//! use modreg_core::{ModuleRegistry, RecordingSink, RegistryConfig};
//!
//! # async fn demo() -> modreg_core::Result<()> {
//! let registry = ModuleRegistry::new(
//!     Arc::new(MemoryCatalog::new()),
//!     Arc::new(RecordingSink::new()),
//!     RegistryConfig::default(),
//! );
//! # let module_id = uuid::Uuid::new_v4();
//! let resolution = registry.resolve_dependencies(module_id, None).await?;
//! if resolution.resolved {
//!     println!("install order: {:?}", resolution.install_order);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Unsatisfiable dependencies and detected conflicts are successful results
//! carrying structured findings; [`Error`] is reserved for bad input, invalid
//! transitions and storage failures.

pub mod config;
pub mod conflict;
pub mod error;
pub mod events;
pub mod integrity;
pub mod lifecycle;
pub mod registry;
pub mod request;
pub mod resolver;
pub mod search;
pub mod validate;

pub use config::{ConflictPolicy, RegistryConfig, ResolutionConfig, ReviewConfig, SearchConfig};
pub use conflict::{ConflictDetector, ConflictReport, ConflictType, ModuleConflict, Severity};
pub use error::{Error, ErrorKind, Result};
pub use events::{EventSink, NullSink, RecordingSink, RegistryEvent};
pub use integrity::{CompatibilityReport, checksum_matches, compute_checksum};
pub use lifecycle::LifecycleAction;
pub use registry::{InstallPlan, ModuleRegistry};
pub use request::{InstallOptions, InstallationUpdate, ModuleUpdate, PublishVersion, RegisterModule};
pub use resolver::{DependencyResolution, DependencyResolver, ResolvedDependency};
pub use search::{SearchFilters, SearchPage, SortBy};
