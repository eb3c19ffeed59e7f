use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AncestryError, Result};

use super::ancestry::{EdgeKey, MergeRecord, MergedAncestryGraph};
use super::identity::NodeId;
use super::node::{AncestorNode, ParentRole};

const SCHEMA_VERSION: u32 = 1;

/// One row of the persisted edge table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub child: NodeId,
    pub role: ParentRole,
    pub parent: NodeId,
}

#[derive(Debug, Serialize, Deserialize)]
struct GraphDocument {
    schema_version: u32,
    saved_at: DateTime<Utc>,
    node_count: usize,
    nodes: Vec<AncestorNode>,
    edges: Vec<EdgeRecord>,
    #[serde(default)]
    merge_log: Vec<MergeRecord>,
}

/// JSON file holding the merged graph between runs.
///
/// Saves go to a `.tmp` sibling that is then renamed over the target, so a
/// crash mid-write leaves the previous state intact.
#[derive(Debug, Clone)]
pub struct GraphStore {
    path: PathBuf,
}

impl GraphStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Persist `graph`, replacing any previous state.
    pub fn save(&self, graph: &MergedAncestryGraph) -> Result<()> {
        let document = GraphDocument {
            schema_version: SCHEMA_VERSION,
            saved_at: Utc::now(),
            node_count: graph.node_count(),
            nodes: graph.nodes.values().cloned().collect(),
            edges: graph
                .edges()
                .map(|(child, role, parent)| EdgeRecord {
                    child: child.clone(),
                    role,
                    parent: parent.clone(),
                })
                .collect(),
            merge_log: graph.merge_log.clone(),
        };

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let tmp = tmp_path(&self.path);
        {
            let mut writer = BufWriter::new(fs::File::create(&tmp)?);
            serde_json::to_writer_pretty(&mut writer, &document)?;
            writer.flush()?;
        }
        fs::rename(&tmp, &self.path)?;

        log::info!(
            "saved merged graph ({} nodes, {} edges) to {}",
            graph.node_count(),
            graph.edge_count(),
            self.path.display()
        );
        Ok(())
    }

    /// Load the stored graph, or an empty graph if nothing has been saved yet.
    ///
    /// # Errors
    /// Returns [`AncestryError::PersistenceCorruption`] if the file exists but
    /// cannot be decoded or is internally inconsistent. A corrupt store is
    /// never replaced by an empty graph.
    pub fn load(&self) -> Result<MergedAncestryGraph> {
        if !self.path.exists() {
            log::info!("no merged graph at {}, starting empty", self.path.display());
            return Ok(MergedAncestryGraph::new());
        }

        let bytes = fs::read(&self.path)?;
        let document: GraphDocument =
            serde_json::from_slice(&bytes).map_err(|e| self.corrupt(e.to_string()))?;

        if document.schema_version != SCHEMA_VERSION {
            return Err(self.corrupt(format!(
                "unsupported schema_version {}",
                document.schema_version
            )));
        }
        if document.node_count != document.nodes.len() {
            return Err(self.corrupt(format!(
                "header declares {} nodes but {} are stored",
                document.node_count,
                document.nodes.len()
            )));
        }

        let mut nodes = BTreeMap::new();
        for node in document.nodes {
            let id = node.id.clone();
            if nodes.insert(id.clone(), node).is_some() {
                return Err(self.corrupt(format!("duplicate node '{}'", id)));
            }
        }

        let mut edges = BTreeMap::new();
        for edge in document.edges {
            let key = EdgeKey {
                child: edge.child,
                role: edge.role,
            };
            if let Some(previous) = edges.insert(key.clone(), edge.parent) {
                return Err(self.corrupt(format!(
                    "duplicate {} edge for '{}' (also '{}')",
                    key.role, key.child, previous
                )));
            }
        }

        let graph = MergedAncestryGraph::from_parts(nodes, edges, document.merge_log)
            .map_err(|reason| self.corrupt(reason))?;

        log::info!(
            "loaded merged graph ({} nodes, {} edges) from {}",
            graph.node_count(),
            graph.edge_count(),
            self.path.display()
        );
        Ok(graph)
    }

    fn corrupt(&self, reason: String) -> AncestryError {
        AncestryError::PersistenceCorruption {
            path: self.path.clone(),
            reason,
        }
    }
}

/// `<path>.tmp` next to the target file.
pub(crate) fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pedigree::{canonical_order, AncestorSlot, FlattenedPedigree};
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_graph_path() -> PathBuf {
        let id = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!(
            "test_graph_store_{}_{}.json",
            std::process::id(),
            id
        ))
    }

    fn sample_graph() -> MergedAncestryGraph {
        let ped = FlattenedPedigree {
            source_id: "S".to_string(),
            subject: AncestorSlot::new(0, 1, "Subject").with_external_id("S"),
            depth: 2,
            slots: canonical_order(2)
                .map(|(g, p)| {
                    AncestorSlot::new(g, p, &format!("H{}{}", g, p)).with_birth_year(1990)
                })
                .collect(),
        };
        let mut graph = MergedAncestryGraph::new();
        graph.merge(&ped).unwrap();
        graph
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let store = GraphStore::new(temp_graph_path());
        let graph = store.load().unwrap();
        assert!(graph.is_empty());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let path = temp_graph_path();
        let store = GraphStore::new(&path);
        let graph = sample_graph();
        store.save(&graph).unwrap();
        assert!(store.exists());
        assert!(!tmp_path(&path).exists());

        let loaded = store.load().unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, graph);
        assert_eq!(loaded.merge_log().len(), 1);
    }

    #[test]
    fn test_garbage_file_is_corruption() {
        let path = temp_graph_path();
        std::fs::write(&path, "{ not json").unwrap();
        let err = GraphStore::new(&path).load().unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, AncestryError::PersistenceCorruption { .. }));
    }

    #[test]
    fn test_dangling_edge_is_corruption() {
        let path = temp_graph_path();
        let store = GraphStore::new(&path);
        store.save(&sample_graph()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut doc: serde_json::Value = serde_json::from_str(&text).unwrap();
        doc["edges"][0]["parent"] = serde_json::json!("ext:nobody");
        std::fs::write(&path, doc.to_string()).unwrap();

        let err = store.load().unwrap_err();
        std::fs::remove_file(&path).ok();
        let msg = err.to_string();
        assert!(msg.contains("unknown node"), "Error was: {}", msg);
    }

    #[test]
    fn test_wrong_schema_version_is_corruption() {
        let path = temp_graph_path();
        let store = GraphStore::new(&path);
        store.save(&sample_graph()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut doc: serde_json::Value = serde_json::from_str(&text).unwrap();
        doc["schema_version"] = serde_json::json!(99);
        std::fs::write(&path, doc.to_string()).unwrap();

        let err = store.load().unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(err.to_string().contains("schema_version 99"));
    }
}
