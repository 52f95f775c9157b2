//! Storage targets a template or field can be materialized into.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A persistence backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StorageTarget {
    /// Dynamic relational tables.
    Sql,
    /// Graph database nodes and relationships.
    Neo4j,
}

impl fmt::Display for StorageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageTarget::Sql => write!(f, "SQL"),
            StorageTarget::Neo4j => write!(f, "NEO4J"),
        }
    }
}

/// Ordered set of storage targets.
pub type StorageSet = BTreeSet<StorageTarget>;

/// Build a [`StorageSet`] from a slice.
pub fn storages(targets: &[StorageTarget]) -> StorageSet {
    targets.iter().copied().collect()
}

/// Storage difference between two availability sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageDelta {
    pub added: StorageSet,
    pub removed: StorageSet,
}

impl StorageDelta {
    pub fn between(previous: &StorageSet, new: &StorageSet) -> Self {
        Self {
            added: new.difference(previous).copied().collect(),
            removed: previous.difference(new).copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    pub fn adds(&self, target: StorageTarget) -> bool {
        self.added.contains(&target)
    }

    pub fn removes(&self, target: StorageTarget) -> bool {
        self.removed.contains(&target)
    }
}
