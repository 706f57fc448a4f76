use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use tracing::debug;

use navgraph_core::error::{NavError, Result};
use navgraph_core::graph::Graph;
use navgraph_core::traits::GraphSource;

/// Loads `<dir>/<tree_id>.json` graph definitions.
pub struct JsonFileGraphSource {
    dir: PathBuf,
}

impl JsonFileGraphSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, tree_id: &str) -> Result<PathBuf> {
        let safe = !tree_id.is_empty()
            && tree_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !tree_id.starts_with('.');
        if !safe {
            return Err(NavError::GraphSource(format!("invalid tree id '{tree_id}'")));
        }
        Ok(self.dir.join(format!("{tree_id}.json")))
    }
}

impl GraphSource for JsonFileGraphSource {
    fn load<'a>(&'a self, tree_id: &'a str) -> BoxFuture<'a, Result<Graph>> {
        Box::pin(async move {
            let path = self.path_for(tree_id)?;
            let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
                NavError::GraphSource(format!("cannot read {}: {}", path.display(), e))
            })?;
            let mut graph: Graph = serde_json::from_str(&content).map_err(|e| {
                NavError::GraphSource(format!("cannot parse {}: {}", path.display(), e))
            })?;
            if graph.tree_id.is_empty() {
                graph.tree_id = tree_id.to_string();
            }
            debug!(tree_id, path = %path.display(), nodes = graph.nodes.len(), "Loaded graph");
            Ok(graph)
        })
    }
}
