//! Headless host: a [`MemoryTree`] mirrored from a JSON snapshot file.
//!
//! Whenever the file changes the whole tree is rebuilt with fresh node ids,
//! the same way the real host rebuilds its UI without telling anyone.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use skinbridge_overlay::{HostError, MemoryTree, NodeSpec};

use crate::error::{ConnectorError, Result};

pub struct SnapshotHost {
    path: Option<PathBuf>,
    tree: MemoryTree,
    modified: Option<SystemTime>,
    rebuilds: u64,
}

impl SnapshotHost {
    /// A host with an empty tree that never changes.
    pub fn empty() -> Self {
        Self {
            path: None,
            tree: MemoryTree::new(),
            modified: None,
            rebuilds: 0,
        }
    }

    /// A host backed by `path`. Nothing is read until the first refresh.
    pub fn watching(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::empty()
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn tree(&self) -> &MemoryTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut MemoryTree {
        &mut self.tree
    }

    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    /// Rebuild the tree if the snapshot's modification time moved.
    /// Returns whether a rebuild happened.
    pub fn refresh(&mut self) -> Result<bool> {
        let Some(path) = self.path.clone() else {
            return Ok(false);
        };
        let modified = std::fs::metadata(&path)
            .and_then(|meta| meta.modified())
            .map_err(|source| ConnectorError::Io {
                path: path.clone(),
                source,
            })?;
        if self.modified == Some(modified) {
            return Ok(false);
        }
        self.rebuild_from(&path)?;
        self.modified = Some(modified);
        Ok(true)
    }

    /// Rebuild from the snapshot regardless of its modification time.
    pub fn reload(&mut self) -> Result<bool> {
        let Some(path) = self.path.clone() else {
            return Ok(false);
        };
        self.rebuild_from(&path)?;
        self.modified = std::fs::metadata(&path)
            .and_then(|meta| meta.modified())
            .ok();
        Ok(true)
    }

    fn rebuild_from(&mut self, path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path).map_err(|source| ConnectorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let spec: NodeSpec = serde_json::from_str(&text).map_err(HostError::from)?;
        self.tree.rebuild(&spec);
        self.rebuilds += 1;
        tracing::info!(path = %path.display(), nodes = self.tree.len(), "Host tree rebuilt");
        Ok(())
    }
}
