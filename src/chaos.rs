//! Chaos injection registry
//!
//! A set of named, toggleable fault-injection scenarios. Components that
//! support fault injection hold an `Arc<ChaosRegistry>` handed to them by the
//! application's composition root and route their data through
//! [`ChaosRegistry::apply_if`]. When a scenario is inactive the call is an
//! identity passthrough.
//!
//! The registry owns no domain data. Activation state is process-lifetime only.

use crate::types::ChaosScenario;
use parking_lot::RwLock;
use std::collections::HashSet;
use tracing::info;

/// Replaces incoming biosignal samples with silence
pub const SIGNAL_DROPOUT: &str = "signal_dropout";

/// Perturbs mastering checksums
pub const CHECKSUM_DRIFT: &str = "checksum_drift";

/// Flips the sign of verification deltas
pub const DELTA_INVERSION: &str = "delta_inversion";

#[derive(Debug, Clone)]
struct ScenarioDescriptor {
    id: String,
    name: String,
    description: String,
    impact: String,
}

fn builtin_catalog() -> Vec<ScenarioDescriptor> {
    [
        (
            SIGNAL_DROPOUT,
            "Sensor Dropout",
            "Pulse samples are replaced with flat zero readings.",
            "BPM collapses to 0 and confidence drops to its floor.",
        ),
        (
            CHECKSUM_DRIFT,
            "Checksum Drift",
            "Mastering fingerprints are offset by one unit.",
            "Exported artifacts no longer match their regression fingerprint.",
        ),
        (
            DELTA_INVERSION,
            "Delta Inversion",
            "Verification deltas are computed with the wrong sign.",
            "Golden baseline verification fails for every non-zero vector.",
        ),
    ]
    .into_iter()
    .map(|(id, name, description, impact)| ScenarioDescriptor {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        impact: impact.to_string(),
    })
    .collect()
}

/// Registry of active fault-injection scenarios.
///
/// Safe to share across threads; reads take a shared lock.
#[derive(Debug)]
pub struct ChaosRegistry {
    catalog: RwLock<Vec<ScenarioDescriptor>>,
    active: RwLock<HashSet<String>>,
}

impl Default for ChaosRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChaosRegistry {
    /// Create a registry seeded with the built-in scenario catalog, all inactive
    pub fn new() -> Self {
        Self {
            catalog: RwLock::new(builtin_catalog()),
            active: RwLock::new(HashSet::new()),
        }
    }

    /// Create a registry with an empty catalog
    pub fn empty() -> Self {
        Self {
            catalog: RwLock::new(Vec::new()),
            active: RwLock::new(HashSet::new()),
        }
    }

    /// Add or replace a scenario descriptor in the catalog
    pub fn register(&self, id: &str, name: &str, description: &str, impact: &str) {
        let descriptor = ScenarioDescriptor {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            impact: impact.to_string(),
        };

        let mut catalog = self.catalog.write();
        match catalog.iter_mut().find(|d| d.id == id) {
            Some(existing) => *existing = descriptor,
            None => catalog.push(descriptor),
        }
    }

    /// Activate a scenario. Idempotent; returns true if it was not already active.
    pub fn activate(&self, scenario_id: &str) -> bool {
        let changed = self.active.write().insert(scenario_id.to_string());
        info!(scenario = scenario_id, changed, "chaos scenario activated");
        changed
    }

    /// Deactivate a scenario. Idempotent; returns true if it was active.
    pub fn deactivate(&self, scenario_id: &str) -> bool {
        let changed = self.active.write().remove(scenario_id);
        info!(scenario = scenario_id, changed, "chaos scenario deactivated");
        changed
    }

    pub fn is_active(&self, scenario_id: &str) -> bool {
        self.active.read().contains(scenario_id)
    }

    /// Ids of all active scenarios, sorted
    pub fn active_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.active.read().iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Deactivate every scenario
    pub fn reset(&self) {
        self.active.write().clear();
    }

    /// Return `transform(data)` if the scenario is active, otherwise `data` unchanged.
    ///
    /// The lock is released before `transform` runs, so the transform may
    /// itself consult the registry.
    pub fn apply_if<T, F>(&self, data: T, scenario_id: &str, transform: F) -> T
    where
        F: FnOnce(T) -> T,
    {
        if self.is_active(scenario_id) {
            transform(data)
        } else {
            data
        }
    }

    /// Catalog snapshot with current activation state, in registration order
    pub fn scenarios(&self) -> Vec<ChaosScenario> {
        let active = self.active.read();
        self.catalog
            .read()
            .iter()
            .map(|d| ChaosScenario {
                id: d.id.clone(),
                name: d.name.clone(),
                description: d.description.clone(),
                impact: d.impact.clone(),
                active: active.contains(&d.id),
            })
            .collect()
    }
}
