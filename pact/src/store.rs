//! Contract document persistence.
//!
//! One document per consumer/provider pair, written as pretty JSON with a
//! trailing newline. Saving the same document twice yields identical bytes.

use crate::contract::{Contract, Interaction};
use crate::error::{PactError, PactResult};
use parking_lot::Mutex;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Serializes writes from concurrently running tests within one process.
static WRITE_LOCK: Mutex<()> = Mutex::new(());

/// Directory of contract documents.
#[derive(Debug, Clone)]
pub struct ContractStore {
    dir: PathBuf,
}

impl ContractStore {
    /// Create a store rooted at `dir`. The directory is created on first save.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Location of the document for this contract's pair.
    #[must_use]
    pub fn path_for(&self, contract: &Contract) -> PathBuf {
        self.dir.join(contract.file_name())
    }

    /// Load a document.
    ///
    /// # Errors
    ///
    /// Returns `ContractNotFound` if nothing exists at `path` and
    /// `MalformedContractDocument` if it cannot be parsed.
    #[instrument(level = "debug", fields(path = %path.display()))]
    pub fn load(path: &Path) -> PactResult<Contract> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(PactError::ContractNotFound(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Self::parse(&path.display().to_string(), &bytes)
    }

    /// Parse a document from bytes; `origin` names it in errors.
    ///
    /// # Errors
    ///
    /// Returns `MalformedContractDocument` if the bytes are not a contract.
    pub fn parse(origin: &str, bytes: &[u8]) -> PactResult<Contract> {
        let contract: Contract =
            serde_json::from_slice(bytes).map_err(|e| PactError::malformed(origin, e))?;
        if contract.consumer.name.is_empty() || contract.provider.name.is_empty() {
            return Err(PactError::malformed(origin, "consumer and provider names are required"));
        }
        Ok(contract)
    }

    /// Save a document, replacing whatever is at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be serialized or written.
    #[instrument(level = "debug", skip(contract), fields(path = %path.display()))]
    pub fn save(contract: &Contract, path: &Path) -> PactResult<()> {
        let _guard = WRITE_LOCK.lock();
        Self::save_locked(contract, path)
    }

    fn save_locked(contract: &Contract, path: &Path) -> PactResult<()> {
        let mut bytes = serde_json::to_vec_pretty(contract)?;
        bytes.push(b'\n');

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4()));
        fs::write(&tmp, &bytes)?;
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        debug!(bytes = bytes.len(), "Contract saved");
        Ok(())
    }

    /// Merge interactions into a document.
    ///
    /// # Errors
    ///
    /// Returns `MalformedContractDocument` if `incoming` belongs to another pair.
    pub fn merge(mut existing: Contract, incoming: &Contract) -> PactResult<Contract> {
        if !existing.same_pair(incoming) {
            return Err(PactError::malformed(
                existing.file_name(),
                format!(
                    "cannot merge contract between {} and {}",
                    incoming.consumer.name, incoming.provider.name
                ),
            ));
        }
        existing.merge(&incoming.interactions);
        Ok(existing)
    }

    /// Merge `interactions` into the stored document for `contract`'s pair,
    /// creating it if absent, and save. Returns the merged document.
    ///
    /// # Errors
    ///
    /// Returns an error if the existing document is malformed or cannot be written.
    #[instrument(skip(self, contract, interactions), fields(consumer = %contract.consumer.name, provider = %contract.provider.name))]
    pub fn write<'a, I>(&self, contract: &Contract, interactions: I) -> PactResult<Contract>
    where
        I: IntoIterator<Item = &'a Interaction>,
    {
        let path = self.path_for(contract);
        let _guard = WRITE_LOCK.lock();

        let mut merged = match Self::load(&path) {
            Ok(existing) => existing,
            Err(PactError::ContractNotFound(_)) => Contract {
                interactions: Vec::new(),
                ..contract.clone()
            },
            Err(e) => return Err(e),
        };
        if !merged.same_pair(contract) {
            return Err(PactError::malformed(
                path.display().to_string(),
                "document belongs to a different consumer/provider pair",
            ));
        }
        merged.merge(interactions);
        Self::save_locked(&merged, &path)?;

        info!(
            path = %path.display(),
            interactions = merged.interactions.len(),
            "Contract written"
        );
        Ok(merged)
    }

    /// Load every `*.json` document in the directory, ordered by file name.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read or a document is malformed.
    pub fn load_dir(&self) -> PactResult<Vec<Contract>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let hidden = path
                .file_name()
                .is_some_and(|n| n.to_string_lossy().starts_with('.'));
            if !hidden && path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();
        paths.iter().map(|p| Self::load(p)).collect()
    }
}
