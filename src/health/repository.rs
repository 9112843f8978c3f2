//! Distributed health store.
//!
//! # Responsibilities
//! - Read and write the externally visible `HealthState` of a provider
//! - Offer an optimistic, version-checked update for read-modify-write callers
//!
//! # Design Decisions
//! - Minimal key-value contract keyed by provider id; last write wins
//! - Documents missing a recognizable `healthiness` read as absent
//! - Backends: in-process (`DashMap`) and a shared directory of JSON files

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::config::{HealthStoreBackend, HealthStoreConfig};
use crate::health::state::{HealthState, StoredHealthState};

/// Errors raised by a health store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("health store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("health store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The stored version moved since it was read.
    #[error("version conflict for {provider_id}: expected {expected}, found {found:?}")]
    VersionConflict {
        provider_id: String,
        expected: u64,
        found: Option<u64>,
    },

    #[error("health store misconfigured: {0}")]
    Misconfigured(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Key-value access to provider health records.
#[async_trait]
pub trait HealthStateRepository: Send + Sync {
    /// Read the record of `provider_id`, `None` when absent.
    async fn read(&self, provider_id: &str) -> StoreResult<Option<HealthState>>;

    /// Unconditionally store `state`.
    async fn write(&self, provider_id: &str, state: &HealthState) -> StoreResult<()>;

    /// Store `state` only if the current record has version `state.version - 1`.
    /// Version 1 creates the record and conflicts when one already exists.
    async fn update(&self, provider_id: &str, state: &HealthState) -> StoreResult<()>;
}

fn check_version(provider_id: &str, current: Option<u64>, new_version: u64) -> StoreResult<()> {
    let expected = new_version.saturating_sub(1);
    let matches = match current {
        Some(found) => found == expected,
        None => new_version == 1,
    };
    if matches {
        Ok(())
    } else {
        Err(StoreError::VersionConflict {
            provider_id: provider_id.to_string(),
            expected,
            found: current,
        })
    }
}

/// Process-local store. Shares state only between gateways of one process;
/// the default backend and the one used by tests.
#[derive(Debug, Default)]
pub struct InMemoryHealthStateRepository {
    records: DashMap<String, HealthState>,
}

impl InMemoryHealthStateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl HealthStateRepository for InMemoryHealthStateRepository {
    async fn read(&self, provider_id: &str) -> StoreResult<Option<HealthState>> {
        Ok(self.records.get(provider_id).map(|r| r.value().clone()))
    }

    async fn write(&self, provider_id: &str, state: &HealthState) -> StoreResult<()> {
        self.records.insert(provider_id.to_string(), state.clone());
        Ok(())
    }

    async fn update(&self, provider_id: &str, state: &HealthState) -> StoreResult<()> {
        // The entry guard holds the shard lock across check and insert.
        match self.records.entry(provider_id.to_string()) {
            Entry::Occupied(mut entry) => {
                check_version(provider_id, Some(entry.get().version), state.version)?;
                entry.insert(state.clone());
            }
            Entry::Vacant(entry) => {
                check_version(provider_id, None, state.version)?;
                entry.insert(state.clone());
            }
        }
        Ok(())
    }
}

/// One JSON document per provider id inside a shared directory.
///
/// Writes go through a temporary file and a rename so readers never see a
/// partial document. Creating a record is atomic (hard link onto the final
/// name); later `update`s are check-then-write and therefore only best-effort
/// across processes.
#[derive(Debug, Clone)]
pub struct FileHealthStateRepository {
    dir: PathBuf,
}

impl FileHealthStateRepository {
    /// Use `dir`, creating it if needed.
    pub async fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn document_path(&self, provider_id: &str) -> PathBuf {
        let file_name: String = provider_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{file_name}.json"))
    }

    async fn write_temp(&self, path: &Path, state: &HealthState) -> StoreResult<PathBuf> {
        let tmp = path.with_extension(format!("json.{}.tmp", uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(state)?).await?;
        Ok(tmp)
    }

    /// Publish `state` only if no document exists yet.
    async fn create(&self, provider_id: &str, state: &HealthState) -> StoreResult<()> {
        let path = self.document_path(provider_id);
        let tmp = self.write_temp(&path, state).await?;
        let linked = tokio::fs::hard_link(&tmp, &path).await;
        let _ = tokio::fs::remove_file(&tmp).await;
        match linked {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                match self.read(provider_id).await? {
                    Some(found) => Err(StoreError::VersionConflict {
                        provider_id: provider_id.to_string(),
                        expected: 0,
                        found: Some(found.version),
                    }),
                    // Unreadable foreign document: counts as absent, replace it.
                    None => self.write(provider_id, state).await,
                }
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl HealthStateRepository for FileHealthStateRepository {
    async fn read(&self, provider_id: &str) -> StoreResult<Option<HealthState>> {
        let content = match tokio::fs::read(self.document_path(provider_id)).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let stored: StoredHealthState = serde_json::from_slice(&content)?;
        Ok(stored.into_state())
    }

    async fn write(&self, provider_id: &str, state: &HealthState) -> StoreResult<()> {
        let path = self.document_path(provider_id);
        let tmp = self.write_temp(&path, state).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn update(&self, provider_id: &str, state: &HealthState) -> StoreResult<()> {
        let current = self.read(provider_id).await?.map(|s| s.version);
        check_version(provider_id, current, state.version)?;
        match current {
            Some(_) => self.write(provider_id, state).await,
            None => self.create(provider_id, state).await,
        }
    }
}

/// Build the configured store backend.
pub async fn build_repository(config: &HealthStoreConfig) -> StoreResult<Arc<dyn HealthStateRepository>> {
    match config.backend {
        HealthStoreBackend::Memory => Ok(Arc::new(InMemoryHealthStateRepository::new())),
        HealthStoreBackend::File => {
            let path = config
                .path
                .as_deref()
                .ok_or_else(|| StoreError::Misconfigured("file backend requires a path".into()))?;
            Ok(Arc::new(FileHealthStateRepository::open(path).await?))
        }
    }
}
