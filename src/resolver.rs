//! Resolves a workload's declared requirements against the registry and
//! the encrypted store.
//!
//! The resolver is read-only: it reports which credentials are missing and
//! which of the workload's own tools and node types need them, and leaves
//! the fail/abort decision to the caller. Output is deterministic — sorted
//! by spec id, with tool reasons before node-type reasons — regardless of
//! input iteration order.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::CredentialError;
use crate::registry::{CredentialSpec, SpecRegistry};
use crate::store::CredentialStore;
use crate::sync::{synced_identity, SyncLookup};

/// Requirements declared by one workload unit (e.g. a graph node).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkloadSpec {
    /// Tool names this unit invokes.
    #[serde(default)]
    pub tools: BTreeSet<String>,
    /// The unit's node type.
    pub node_type: String,
}

impl WorkloadSpec {
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            tools: BTreeSet::new(),
            node_type: node_type.into(),
        }
    }

    pub fn tool(mut self, name: impl Into<String>) -> Self {
        self.tools.insert(name.into());
        self
    }
}

/// Aggregated requirements across a whole workload: case-normalized,
/// deduplicated tool and node-type sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkloadRequirements {
    pub tools: BTreeSet<String>,
    pub node_types: BTreeSet<String>,
}

impl WorkloadRequirements {
    /// Collect the tool and node-type sets across all units.
    ///
    /// Order-independent: sets, not sequences. Names are ASCII-lowercased
    /// so declarations match the registry regardless of casing.
    pub fn aggregate(units: &[WorkloadSpec]) -> Self {
        let mut tools = BTreeSet::new();
        let mut node_types = BTreeSet::new();
        for unit in units {
            tools.extend(unit.tools.iter().map(|t| t.to_ascii_lowercase()));
            let node_type = unit.node_type.trim().to_ascii_lowercase();
            if !node_type.is_empty() {
                node_types.insert(node_type);
            }
        }
        Self { tools, node_types }
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty() && self.node_types.is_empty()
    }
}

/// A required credential with no usable store entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingCredential {
    pub spec: CredentialSpec,
    /// The workload's own tools that triggered the requirement (the
    /// intersection, not the spec's full tool set). Sorted.
    pub affected_tools: Vec<String>,
    /// The workload's own node types that triggered the requirement. Sorted.
    pub affected_node_types: Vec<String>,
}

/// Read-only requirement resolution against registry, store, and the
/// optional sync collaborator.
pub struct RequirementResolver {
    registry: SpecRegistry,
    store: Arc<CredentialStore>,
    sync: Option<Arc<dyn SyncLookup>>,
}

impl RequirementResolver {
    pub fn new(registry: SpecRegistry, store: Arc<CredentialStore>) -> Self {
        Self {
            registry,
            store,
            sync: None,
        }
    }

    /// Install the sync collaborator. Checked once here, never re-probed
    /// per call.
    pub fn with_sync(mut self, sync: Arc<dyn SyncLookup>) -> Self {
        self.sync = Some(sync);
        self
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// Compute the missing-credential list for the aggregated requirements.
    ///
    /// A spec is required when its tools or node types intersect the
    /// workload's; it is satisfied when the store holds an entry under its
    /// env var *or* under its synced hash identity. A spec required by both
    /// a tool and a node type produces one combined listing.
    pub async fn resolve(
        &self,
        requirements: &WorkloadRequirements,
    ) -> Result<Vec<MissingCredential>, CredentialError> {
        if requirements.is_empty() {
            return Ok(Vec::new());
        }

        // Candidate registry specs and every identity that could satisfy them
        let mut candidates: Vec<(&CredentialSpec, Vec<String>, Vec<String>)> = Vec::new();
        let mut identities: BTreeSet<String> = BTreeSet::new();
        for spec in self.registry.specs() {
            let affected_tools = sorted_intersection(&spec.tools, &requirements.tools);
            let affected_node_types =
                sorted_intersection(&spec.node_types, &requirements.node_types);
            if affected_tools.is_empty() && affected_node_types.is_empty() {
                continue;
            }
            identities.insert(spec.env_var.clone());
            identities.insert(synced_identity(&spec.id));
            candidates.push((spec, affected_tools, affected_node_types));
        }

        let present = self.store.contains_any_of(&identities).await;

        let mut missing: BTreeMap<String, MissingCredential> = BTreeMap::new();
        for (spec, affected_tools, affected_node_types) in candidates {
            let satisfied = present.contains(&spec.env_var)
                || present.contains(&synced_identity(&spec.id));
            if satisfied {
                continue;
            }
            missing.insert(
                spec.id.clone(),
                MissingCredential {
                    spec: spec.clone(),
                    affected_tools,
                    affected_node_types,
                },
            );
        }

        self.merge_sync_missing(requirements, &mut missing).await?;

        // BTreeMap iteration gives the sorted-by-id presentation order
        Ok(missing.into_values().collect())
    }

    /// Fold in sync-managed credentials the collaborator reports missing.
    /// Absent collaborator: nothing to do.
    async fn merge_sync_missing(
        &self,
        requirements: &WorkloadRequirements,
        missing: &mut BTreeMap<String, MissingCredential>,
    ) -> Result<(), CredentialError> {
        let Some(sync) = &self.sync else {
            return Ok(());
        };

        let tool_names: Vec<String> = requirements.tools.iter().cloned().collect();
        let type_names: Vec<String> = requirements.node_types.iter().cloned().collect();

        let by_tools = sync
            .missing_for_tools(&tool_names)
            .await
            .map_err(|cause| CredentialError::Sync { cause })?;
        for (identity, spec) in by_tools {
            if self.is_satisfied(&identity, &spec).await {
                continue;
            }
            let affected = sorted_intersection(&spec.tools, &requirements.tools);
            merge_reasons(missing, spec, affected, Vec::new());
        }

        let by_types = sync
            .missing_for_node_types(&type_names)
            .await
            .map_err(|cause| CredentialError::Sync { cause })?;
        for (identity, spec) in by_types {
            if self.is_satisfied(&identity, &spec).await {
                continue;
            }
            let affected = sorted_intersection(&spec.node_types, &requirements.node_types);
            merge_reasons(missing, spec, Vec::new(), affected);
        }

        Ok(())
    }

    /// A sync-reported credential may still be satisfied by a direct
    /// env-var entry; either path counts, reported once.
    async fn is_satisfied(&self, identity: &str, spec: &CredentialSpec) -> bool {
        self.store.contains(identity).await || self.store.contains(&spec.env_var).await
    }
}

fn sorted_intersection(spec_names: &BTreeSet<String>, workload_names: &BTreeSet<String>) -> Vec<String> {
    spec_names.intersection(workload_names).cloned().collect()
}

/// Merge a missing credential into the map, combining affected reasons when
/// the spec is already listed.
fn merge_reasons(
    missing: &mut BTreeMap<String, MissingCredential>,
    spec: CredentialSpec,
    affected_tools: Vec<String>,
    affected_node_types: Vec<String>,
) {
    let entry = missing
        .entry(spec.id.clone())
        .or_insert_with(|| MissingCredential {
            spec,
            affected_tools: Vec::new(),
            affected_node_types: Vec::new(),
        });
    for tool in affected_tools {
        if !entry.affected_tools.contains(&tool) {
            entry.affected_tools.push(tool);
        }
    }
    for node_type in affected_node_types {
        if !entry.affected_node_types.contains(&node_type) {
            entry.affected_node_types.push(node_type);
        }
    }
    entry.affected_tools.sort();
    entry.affected_node_types.sort();
}
