//! Directory tree snapshots.
//!
//! A [`DirTree`] is fetched once before rendering a repository's audit log and
//! is then only read. It resolves secret and directory ids to their absolute
//! paths (`namespace/repo/dir/secret`).

use crate::error::{CoreError, CoreResult};
use crate::id::{DirId, SecretId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A directory in the snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirNode {
    /// Directory identifier
    pub id: DirId,
    /// Directory name, one path segment
    pub name: String,
    /// Parent directory, `None` only for the repository root
    #[serde(default)]
    pub parent: Option<DirId>,
}

/// A secret in the snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretNode {
    /// Secret identifier
    pub id: SecretId,
    /// Secret name, the last path segment
    pub name: String,
    /// Directory holding the secret
    pub dir: DirId,
}

/// Flat, serialized form of a directory tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeSnapshot {
    /// Namespace owning the repository
    pub namespace: String,
    /// Root directory; its name is the repository name
    pub root: DirId,
    /// Every directory, including the root
    #[serde(default)]
    pub dirs: Vec<DirNode>,
    /// Every secret
    #[serde(default)]
    pub secrets: Vec<SecretNode>,
}

/// Read-only, validated directory tree of one repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TreeSnapshot", into = "TreeSnapshot")]
pub struct DirTree {
    namespace: String,
    root: DirId,
    dirs: HashMap<DirId, DirNode>,
    secrets: HashMap<SecretId, SecretNode>,
}

impl DirTree {
    /// Build a tree from a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidSnapshot`] if the root is missing, a
    /// directory other than the root has no parent, a parent link dangles or
    /// cycles, or a secret lives in an unknown directory.
    pub fn from_snapshot(snapshot: TreeSnapshot) -> CoreResult<Self> {
        let dirs: HashMap<DirId, DirNode> = snapshot
            .dirs
            .into_iter()
            .map(|dir| (dir.id, dir))
            .collect();

        match dirs.get(&snapshot.root) {
            None => return Err(invalid(format!("root {} is not a directory", snapshot.root))),
            Some(root) if root.parent.is_some() => {
                return Err(invalid(format!("root {} has a parent", snapshot.root)));
            }
            Some(_) => {}
        }

        for dir in dirs.values() {
            if dir.id == snapshot.root {
                continue;
            }
            // every chain of parents must reach the root within |dirs| steps
            let mut current = dir;
            let mut steps = 0;
            while current.id != snapshot.root {
                let parent = current
                    .parent
                    .ok_or_else(|| invalid(format!("{} has no parent", current.id)))?;
                current = dirs
                    .get(&parent)
                    .ok_or_else(|| invalid(format!("parent {} of {} is missing", parent, current.id)))?;
                steps += 1;
                if steps > dirs.len() {
                    return Err(invalid(format!("{} is part of a cycle", dir.id)));
                }
            }
        }

        let mut secrets = HashMap::with_capacity(snapshot.secrets.len());
        for secret in snapshot.secrets {
            if !dirs.contains_key(&secret.dir) {
                return Err(invalid(format!(
                    "secret {} is in unknown directory {}",
                    secret.id, secret.dir
                )));
            }
            secrets.insert(secret.id, secret);
        }

        Ok(Self {
            namespace: snapshot.namespace,
            root: snapshot.root,
            dirs,
            secrets,
        })
    }

    /// Parse and validate a JSON snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ParseError`] for malformed JSON and
    /// [`CoreError::InvalidSnapshot`] for an inconsistent tree.
    pub fn from_json(json: &str) -> CoreResult<Self> {
        let snapshot: TreeSnapshot = serde_json::from_str(json)?;
        Self::from_snapshot(snapshot)
    }

    /// Path of the repository, `namespace/repo`
    #[must_use]
    pub fn root_path(&self) -> String {
        match self.dirs.get(&self.root) {
            Some(root) => format!("{}/{}", self.namespace, root.name),
            None => self.namespace.clone(),
        }
    }

    /// Absolute path of a directory
    #[must_use]
    pub fn dir_path(&self, id: DirId) -> Option<String> {
        let mut names = Vec::new();
        let mut current = self.dirs.get(&id)?;
        while current.id != self.root {
            names.push(current.name.as_str());
            current = self.dirs.get(&current.parent?)?;
        }

        let mut path = self.root_path();
        for name in names.iter().rev() {
            path.push('/');
            path.push_str(name);
        }
        Some(path)
    }

    /// Absolute path of a secret
    #[must_use]
    pub fn secret_path(&self, id: SecretId) -> Option<String> {
        let secret = self.secrets.get(&id)?;
        let dir = self.dir_path(secret.dir)?;
        Some(format!("{}/{}", dir, secret.name))
    }

    /// Number of directories, including the root
    #[must_use]
    pub fn dir_count(&self) -> usize {
        self.dirs.len()
    }

    /// Number of secrets
    #[must_use]
    pub fn secret_count(&self) -> usize {
        self.secrets.len()
    }
}

impl TryFrom<TreeSnapshot> for DirTree {
    type Error = CoreError;

    fn try_from(snapshot: TreeSnapshot) -> Result<Self, Self::Error> {
        Self::from_snapshot(snapshot)
    }
}

impl From<DirTree> for TreeSnapshot {
    fn from(tree: DirTree) -> Self {
        let mut dirs: Vec<DirNode> = tree.dirs.into_values().collect();
        dirs.sort_by_key(|dir| dir.id);
        let mut secrets: Vec<SecretNode> = tree.secrets.into_values().collect();
        secrets.sort_by_key(|secret| secret.id);
        Self {
            namespace: tree.namespace,
            root: tree.root,
            dirs,
            secrets,
        }
    }
}

fn invalid(reason: String) -> CoreError {
    CoreError::InvalidSnapshot { reason }
}
