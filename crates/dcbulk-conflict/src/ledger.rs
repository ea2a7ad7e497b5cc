//! Per-parent name reservation
//!
//! Tasks of one batch may target the same parent concurrently. Checking the
//! remote listing alone would let two of them pick the same autorenamed
//! name, so every final name is reserved here before the upload starts.
//! Each parent's claim set is mutated only while holding that entry's
//! write guard, which makes decide-derive-record one critical section.

use std::collections::{HashMap, HashSet};

use dashmap::DashMap;
use tracing::{debug, trace};

use dcbulk_core::domain::{NodeId, RemoteNode, ResolutionStrategy};
use dcbulk_core::ports::UploadAction;

use crate::namer::AutoRenamer;
use crate::policy::{decide, ExistingState, PolicyAction, Rejection};

/// Snapshot of a parent's children, keyed by exact name
#[derive(Debug, Clone, Default)]
pub struct ParentListing {
    by_name: HashMap<String, RemoteNode>,
}

impl ParentListing {
    pub fn from_nodes(nodes: impl IntoIterator<Item = RemoteNode>) -> Self {
        Self {
            by_name: nodes.into_iter().map(|n| (n.name.clone(), n)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&RemoteNode> {
        self.by_name.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    fn state_of(&self, name: &str) -> ExistingState {
        match self.by_name.get(name) {
            None => ExistingState::Vacant,
            Some(node) if node.is_file() => ExistingState::File { node_id: node.id },
            Some(node) => ExistingState::Container {
                node_type: node.node_type,
            },
        }
    }
}

/// Names claimed by tasks of the current batch, per target parent
#[derive(Debug, Default)]
pub struct NameLedger {
    claims: DashMap<NodeId, HashSet<String>>,
}

impl NameLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide the upload action for `name` under `parent` and reserve the
    /// resulting final name
    ///
    /// # Errors
    /// Returns the policy's `Rejection` when the task must not upload
    pub fn claim(
        &self,
        parent: NodeId,
        name: &str,
        strategy: ResolutionStrategy,
        listing: &ParentListing,
    ) -> Result<UploadAction, Rejection> {
        let mut claimed = self.claims.entry(parent).or_default();

        let existing = if claimed.contains(name) {
            ExistingState::Claimed
        } else {
            listing.state_of(name)
        };

        let action = match decide(strategy, existing) {
            PolicyAction::Create => UploadAction::Create {
                name: name.to_string(),
            },
            PolicyAction::Replace { node_id } => UploadAction::Replace {
                node_id,
                name: name.to_string(),
            },
            PolicyAction::Autorename => {
                let renamed = AutoRenamer::first_unused(name, |candidate| {
                    claimed.contains(candidate) || listing.contains(candidate)
                });
                debug!(parent = %parent, from = %name, to = %renamed, "Autorenamed");
                UploadAction::Create { name: renamed }
            }
            PolicyAction::Reject(rejection) => {
                trace!(parent = %parent, name = %name, ?existing, "Name rejected");
                return Err(rejection);
            }
        };

        claimed.insert(action.name().to_string());
        Ok(action)
    }

    /// Names claimed under `parent` so far
    pub fn claimed(&self, parent: NodeId) -> usize {
        self.claims.get(&parent).map_or(0, |set| set.len())
    }
}
