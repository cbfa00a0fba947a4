//! Directory-backed product store.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{CatalogError, Result};
use crate::query::{Cancellation, Criteria, SortTerms};
use crate::types::{Product, ProductId, ProductInput, ProductPatch};

use super::journal::{Journal, JournalEntry};
use super::memory::{MemoryStore, ProductTable};
use super::{Page, RecordStore};

/// File store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Directory holding the store.
    pub path: PathBuf,

    /// Whether to create the store if it doesn't exist.
    pub create_if_missing: bool,

    /// fsync the journal every this many writes; 0 leaves it to `sync`.
    pub sync_interval: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./catalog"),
            create_if_missing: true,
            sync_interval: 1,
        }
    }
}

/// Magic bytes for store manifest.
const STORE_MAGIC: &[u8; 4] = b"CAT\0";

/// Current store format version.
const STORE_VERSION: u8 = 1;

const JOURNAL_FILE: &str = "products.journal";

/// Products kept in memory and journaled to disk.
///
/// Every mutation is appended to the journal before it becomes visible to
/// readers. Opening the store replays the journal.
pub struct FileStore {
    config: StoreConfig,

    /// Lock file for exclusive access.
    _lock_file: File,

    memory: MemoryStore,

    journal: Mutex<Journal>,
}

impl FileStore {
    /// Open an existing store or create a new one.
    pub fn open_or_create(config: StoreConfig) -> Result<Self> {
        if config.path.join("MANIFEST").exists() {
            Self::open(config)
        } else if config.create_if_missing {
            Self::create(config)
        } else {
            Err(CatalogError::NotInitialized)
        }
    }

    /// Create a new store.
    pub fn create(config: StoreConfig) -> Result<Self> {
        fs::create_dir_all(&config.path)?;
        Self::write_manifest(&config.path)?;
        let lock_file = Self::acquire_lock(&config.path)?;
        Self::load(config, lock_file)
    }

    /// Open an existing store.
    pub fn open(config: StoreConfig) -> Result<Self> {
        Self::verify_manifest(&config.path)?;
        let lock_file = Self::acquire_lock(&config.path)?;
        Self::load(config, lock_file)
    }

    fn load(config: StoreConfig, lock_file: File) -> Result<Self> {
        let (journal, entries) =
            Journal::open(config.path.join(JOURNAL_FILE), config.sync_interval)?;

        let replayed = entries.len();
        let mut table = ProductTable::default();
        for entry in entries {
            match entry {
                JournalEntry::Upsert(product) => table.put(product)?,
                JournalEntry::Remove(id) => {
                    table.observe(id)?;
                    // An earlier compaction may already have dropped it.
                    let _ = table.remove(id);
                }
                JournalEntry::Checkpoint { next_id } => table.advance_to(next_id),
            }
        }
        debug!(
            path = %config.path.display(),
            entries = replayed,
            products = table.len(),
            "journal replayed"
        );

        Ok(Self {
            config,
            _lock_file: lock_file,
            memory: MemoryStore::from_table(table),
            journal: Mutex::new(journal),
        })
    }

    /// Rewrite the journal as one entry per live product. Returns the number
    /// of products written.
    pub fn compact(&self) -> Result<usize> {
        self.memory.read(|table| {
            let mut entries = Vec::with_capacity(table.len() + 1);
            entries.push(JournalEntry::Checkpoint {
                next_id: table.next_id(),
            });
            entries.extend(table.iter().cloned().map(JournalEntry::Upsert));
            self.journal.lock().rewrite(&entries)?;
            debug!(products = table.len(), "journal compacted");
            Ok(table.len())
        })
    }

    /// Flush and fsync the journal.
    pub fn sync(&self) -> Result<()> {
        self.journal.lock().sync()
    }

    /// Get the store path.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    fn append_journal(&self, entry: &JournalEntry) -> Result<()> {
        self.journal.lock().append(entry)
    }

    // --- Private Helpers ---

    fn write_manifest(path: &Path) -> Result<()> {
        let mut file = File::create(path.join("MANIFEST"))?;
        file.write_all(STORE_MAGIC)?;
        file.write_all(&[STORE_VERSION])?;
        file.sync_all()?;
        Ok(())
    }

    fn verify_manifest(path: &Path) -> Result<()> {
        let manifest_path = path.join("MANIFEST");
        if !manifest_path.exists() {
            return Err(CatalogError::NotInitialized);
        }
        let mut file = File::open(manifest_path)?;

        let mut header = [0u8; 5];
        file.read_exact(&mut header)
            .map_err(|_| CatalogError::InvalidFormat("Manifest truncated".into()))?;
        if &header[..4] != STORE_MAGIC {
            return Err(CatalogError::InvalidFormat("Invalid store magic".into()));
        }
        if header[4] != STORE_VERSION {
            return Err(CatalogError::InvalidFormat(format!(
                "Unsupported store version: {}",
                header[4]
            )));
        }

        Ok(())
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_file = File::create(path.join("LOCK"))?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| CatalogError::Locked)?;
        Ok(lock_file)
    }
}

impl RecordStore for FileStore {
    fn len(&self) -> usize {
        self.memory.len()
    }

    fn get(&self, id: ProductId) -> Result<Product> {
        self.memory.get(id)
    }

    fn insert(&self, input: ProductInput, now: DateTime<Utc>) -> Result<Product> {
        self.memory.write(|table| {
            let product = Product::from_input(table.allocate()?, input, now)?;
            self.append_journal(&JournalEntry::Upsert(product.clone()))?;
            table.put(product.clone())?;
            Ok(product)
        })
    }

    fn update(&self, id: ProductId, patch: &ProductPatch, now: DateTime<Utc>) -> Result<Product> {
        self.memory.write(|table| {
            let product = table.get(id)?.patched(patch, now)?;
            self.append_journal(&JournalEntry::Upsert(product.clone()))?;
            table.put(product.clone())?;
            Ok(product)
        })
    }

    fn delete(&self, id: ProductId) -> Result<Product> {
        self.memory.write(|table| {
            table.get(id)?;
            self.append_journal(&JournalEntry::Remove(id))?;
            table.remove(id)
        })
    }

    fn count(&self, criteria: &Criteria, cancel: &Cancellation) -> Result<usize> {
        self.memory.count(criteria, cancel)
    }

    fn scan(
        &self,
        criteria: &Criteria,
        sort: &SortTerms,
        offset: usize,
        limit: usize,
        cancel: &Cancellation,
    ) -> Result<Vec<Product>> {
        self.memory.scan(criteria, sort, offset, limit, cancel)
    }

    fn page(
        &self,
        criteria: &Criteria,
        sort: &SortTerms,
        offset: usize,
        limit: usize,
        cancel: &Cancellation,
    ) -> Result<Page> {
        self.memory.page(criteria, sort, offset, limit, cancel)
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        // Best-effort sync on drop
        let _ = self.journal.get_mut().sync();
    }
}
