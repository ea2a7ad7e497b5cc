//! Conflict resolution policy
//!
//! A pure mapping from the configured strategy and what currently occupies
//! the target name to the action an upload should take.

use serde::{Deserialize, Serialize};

use dcbulk_core::domain::{NodeId, NodeType, ResolutionStrategy, TaskFailure};

/// What occupies a target name under a parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ExistingState {
    /// Nothing remote, nothing claimed in this batch
    Vacant,
    /// A remote file
    File { node_id: NodeId },
    /// A remote room or folder
    Container { node_type: NodeType },
    /// An earlier task in the same batch already claimed the name
    Claimed,
}

/// Why a task is refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    Conflict,
    /// Overwrite would cross a type boundary
    StructuralConflict { existing: NodeType },
}

impl Rejection {
    /// Failure cause recorded for the task targeting `name`
    #[must_use]
    pub fn to_failure(&self, name: &str) -> TaskFailure {
        match self {
            Self::Conflict => TaskFailure::Conflict(name.to_string()),
            Self::StructuralConflict { existing } => TaskFailure::StructuralConflict {
                name: name.to_string(),
                existing: *existing,
            },
        }
    }
}

/// What an upload should do with its target name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PolicyAction {
    /// Upload under the requested name
    Create,
    /// Replace the existing file's content, keeping its id
    Replace { node_id: NodeId },
    /// Upload under a derived unused name; the occupant is untouched
    Autorename,
    Reject(Rejection),
}

/// Decide the action for one upload
#[must_use]
pub fn decide(strategy: ResolutionStrategy, existing: ExistingState) -> PolicyAction {
    use ExistingState as E;
    use ResolutionStrategy as S;

    match (strategy, existing) {
        (_, E::Vacant) => PolicyAction::Create,

        (S::Fail, _) => PolicyAction::Reject(Rejection::Conflict),

        (S::Overwrite, E::File { node_id }) => PolicyAction::Replace { node_id },
        (S::Overwrite, E::Container { node_type }) => {
            PolicyAction::Reject(Rejection::StructuralConflict {
                existing: node_type,
            })
        }
        (S::Overwrite, E::Claimed) => PolicyAction::Reject(Rejection::Conflict),

        (S::Autorename, _) => PolicyAction::Autorename,
    }
}
