//! In-memory and filesystem implementations of the storage ports.

use super::model::{ArtifactRef, Delegation};
use super::ports::{ArtifactStore, DelegationRepository};
use crate::error::{Error, Result};
use crate::signatures::{bytes_to_hex, digest_bytes, DigestAlgorithm};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

fn artifact_ref(document_id: &str, location: String, bytes: &[u8]) -> ArtifactRef {
    ArtifactRef {
        document_id: document_id.to_string(),
        location,
        length: bytes.len(),
        sha256: bytes_to_hex(&digest_bytes(bytes, DigestAlgorithm::Sha256)),
    }
}

/// Documents and signed artifacts kept in memory.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    documents: RwLock<HashMap<String, Vec<u8>>>,
    artifacts: RwLock<HashMap<String, Vec<u8>>>,
    next_artifact: AtomicU64,
}

impl MemoryArtifactStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an unsigned document.
    pub fn insert_document(&self, document_id: impl Into<String>, bytes: Vec<u8>) {
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(document_id.into(), bytes);
    }

    /// Signed bytes saved under `location`.
    pub fn artifact(&self, location: &str) -> Option<Vec<u8>> {
        self.artifacts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(location)
            .cloned()
    }

    /// Number of saved artifacts.
    pub fn artifact_count(&self) -> usize {
        self.artifacts.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn load(&self, document_id: &str) -> Result<Vec<u8>> {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(document_id)
            .cloned()
            .ok_or_else(|| Error::DocumentNotFound(document_id.to_string()))
    }

    fn save(&self, document_id: &str, bytes: &[u8]) -> Result<ArtifactRef> {
        let n = self.next_artifact.fetch_add(1, Ordering::SeqCst) + 1;
        let location = format!("memory://{}/signed-{}", document_id, n);
        self.artifacts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(location.clone(), bytes.to_vec());
        Ok(artifact_ref(document_id, location, bytes))
    }
}

/// Directory-backed store.
///
/// Unsigned documents live at `<root>/<document_id>.pdf`; signed output is
/// written to `<root>/signed/<document_id>-<uuid>.pdf` through a temporary
/// file and a rename.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn check_id(document_id: &str) -> Result<()> {
        let valid = !document_id.is_empty()
            && document_id != "."
            && document_id != ".."
            && !document_id.contains(['/', '\\', '\0']);
        if valid {
            Ok(())
        } else {
            Err(Error::InvalidInput {
                field: "document_id",
                reason: format!("{:?} is not a plain file name", document_id),
            })
        }
    }

    /// Path of the unsigned document.
    pub fn document_path(&self, document_id: &str) -> Result<PathBuf> {
        Self::check_id(document_id)?;
        Ok(self.root.join(format!("{}.pdf", document_id)))
    }
}

impl ArtifactStore for FsArtifactStore {
    fn load(&self, document_id: &str) -> Result<Vec<u8>> {
        let path = self.document_path(document_id)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::DocumentNotFound(document_id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, document_id: &str, bytes: &[u8]) -> Result<ArtifactRef> {
        Self::check_id(document_id)?;
        let dir = self.root.join("signed");
        fs::create_dir_all(&dir)?;

        let name = format!("{}-{}.pdf", document_id, Uuid::new_v4());
        let path = dir.join(&name);
        let temp = dir.join(format!("{}.tmp", name));
        fs::write(&temp, bytes)?;
        fs::rename(&temp, &path)?;

        log::debug!("Saved {} signed bytes to {}", bytes.len(), path.display());
        Ok(artifact_ref(document_id, path.to_string_lossy().into_owned(), bytes))
    }
}

/// Delegations kept in memory.
#[derive(Debug, Default)]
pub struct MemoryDelegationRepository {
    delegations: RwLock<HashMap<Uuid, Delegation>>,
}

impl MemoryDelegationRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DelegationRepository for MemoryDelegationRepository {
    fn insert(&self, delegation: &Delegation) -> Result<()> {
        let mut map = self.delegations.write().unwrap_or_else(PoisonError::into_inner);
        if map.contains_key(&delegation.id) {
            return Err(Error::InvalidInput {
                field: "id",
                reason: format!("delegation {} already exists", delegation.id),
            });
        }
        map.insert(delegation.id, delegation.clone());
        Ok(())
    }

    fn get(&self, id: Uuid) -> Result<Delegation> {
        self.delegations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or(Error::DelegationNotFound(id))
    }

    fn update(&self, delegation: &Delegation, expected_version: u64) -> Result<Delegation> {
        let mut map = self.delegations.write().unwrap_or_else(PoisonError::into_inner);
        let stored = map
            .get_mut(&delegation.id)
            .ok_or(Error::DelegationNotFound(delegation.id))?;
        if stored.version != expected_version {
            return Err(Error::ConcurrentModification {
                delegation_id: delegation.id,
            });
        }
        let mut next = delegation.clone();
        next.version = expected_version + 1;
        *stored = next.clone();
        Ok(next)
    }

    fn list_for_user(&self, user_id: &str) -> Result<Vec<Delegation>> {
        let mut found: Vec<Delegation> = self
            .delegations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|d| d.involves(user_id))
            .cloned()
            .collect();
        found.sort_by_key(|d| (d.created_at, d.id));
        Ok(found)
    }
}
