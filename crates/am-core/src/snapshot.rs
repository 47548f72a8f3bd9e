//! Binary snapshots of a model (MessagePack via `rmp-serde`).
//!
//! A snapshot holds the node tree only. Observers are not part of it.

use crate::error::ModelError;
use crate::model::{ModelGraph, Subtree};
use serde::{Deserialize, Serialize};

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    root: Subtree,
}

impl ModelGraph {
    /// Encode the whole tree, depth-first in child order.
    pub fn snapshot(&self) -> Result<Vec<u8>, ModelError> {
        let root = self
            .subtree(self.root_id())
            .ok_or(ModelError::UnknownNode(self.root_id()))?;
        let bytes = rmp_serde::to_vec_named(&Snapshot {
            version: SNAPSHOT_VERSION,
            root,
        })?;
        Ok(bytes)
    }

    /// Rebuild a model from `snapshot()` output.
    pub fn from_snapshot(bytes: &[u8]) -> Result<ModelGraph, ModelError> {
        let snapshot: Snapshot = rmp_serde::from_slice(bytes)?;
        if snapshot.version != SNAPSHOT_VERSION {
            log::warn!(
                "snapshot version {} differs from {}",
                snapshot.version,
                SNAPSHOT_VERSION
            );
        }
        let Subtree { node, children } = snapshot.root;
        let root_id = node.id;
        let mut graph = ModelGraph::from_root(node);
        for child in children {
            graph.insert_subtree(root_id, child, None)?;
        }
        Ok(graph)
    }
}
