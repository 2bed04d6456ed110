//! Registry events and the sinks that receive them
//!
//! Every successful mutation through [`ModuleRegistry`](crate::ModuleRegistry)
//! emits exactly one [`RegistryEvent`]. Sinks are injected at construction;
//! there is no process-wide dispatcher.

use std::sync::{Mutex, PoisonError, mpsc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use modreg_catalog::{ModuleId, ReviewStatus};

/// A registry state change, serialized with its event name in `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum RegistryEvent {
    #[serde(rename = "module:registered")]
    Registered {
        module_id: ModuleId,
        name: String,
        version: String,
        at: DateTime<Utc>,
    },

    /// Module record fields changed outside of a publish
    #[serde(rename = "module:updated")]
    Updated {
        module_id: ModuleId,
        fields: Vec<String>,
        at: DateTime<Utc>,
    },

    #[serde(rename = "module:reviewed")]
    Reviewed {
        module_id: ModuleId,
        status: ReviewStatus,
        at: DateTime<Utc>,
    },

    #[serde(rename = "module:version:published")]
    VersionPublished {
        module_id: ModuleId,
        version: String,
        previous_version: String,
        at: DateTime<Utc>,
    },

    #[serde(rename = "module:version:deprecated")]
    VersionDeprecated {
        module_id: ModuleId,
        version: String,
        reason: Option<String>,
        at: DateTime<Utc>,
    },

    #[serde(rename = "module:version:yanked")]
    VersionYanked {
        module_id: ModuleId,
        version: String,
        reason: Option<String>,
        at: DateTime<Utc>,
    },

    #[serde(rename = "module:installed")]
    Installed {
        module_id: ModuleId,
        user_id: String,
        version: String,
        first_install: bool,
        at: DateTime<Utc>,
    },

    #[serde(rename = "module:installation:updated")]
    InstallationUpdated {
        module_id: ModuleId,
        user_id: String,
        at: DateTime<Utc>,
    },

    #[serde(rename = "module:rated")]
    Rated {
        module_id: ModuleId,
        user_id: String,
        stars: f64,
        rating: f64,
        rating_count: u64,
        at: DateTime<Utc>,
    },
}

impl RegistryEvent {
    /// The wire name, e.g. `module:version:published`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Registered { .. } => "module:registered",
            Self::Updated { .. } => "module:updated",
            Self::Reviewed { .. } => "module:reviewed",
            Self::VersionPublished { .. } => "module:version:published",
            Self::VersionDeprecated { .. } => "module:version:deprecated",
            Self::VersionYanked { .. } => "module:version:yanked",
            Self::Installed { .. } => "module:installed",
            Self::InstallationUpdated { .. } => "module:installation:updated",
            Self::Rated { .. } => "module:rated",
        }
    }

    pub fn module_id(&self) -> ModuleId {
        match self {
            Self::Registered { module_id, .. }
            | Self::Updated { module_id, .. }
            | Self::Reviewed { module_id, .. }
            | Self::VersionPublished { module_id, .. }
            | Self::VersionDeprecated { module_id, .. }
            | Self::VersionYanked { module_id, .. }
            | Self::Installed { module_id, .. }
            | Self::InstallationUpdated { module_id, .. }
            | Self::Rated { module_id, .. } => *module_id,
        }
    }
}

/// Receiver of registry events.
///
/// `emit` is called after the catalog write succeeded. Sinks must not block
/// for long; delivery failures are the sink's own concern.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: RegistryEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: RegistryEvent) {}
}

/// Buffers events in memory, in emission order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RegistryEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    pub fn events(&self) -> Vec<RegistryEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Event names in emission order.
    pub fn names(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(RegistryEvent::name)
            .collect()
    }

    /// Remove and return everything recorded so far.
    pub fn drain(&self) -> Vec<RegistryEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: RegistryEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl EventSink for mpsc::Sender<RegistryEvent> {
    fn emit(&self, event: RegistryEvent) {
        if let Err(err) = self.send(event) {
            tracing::warn!(event = err.0.name(), "Event receiver dropped");
        }
    }
}
