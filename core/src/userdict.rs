//! User phrase dictionary with buffered persistence.
//!
//! Learned phrase counts are kept in memory. Changes are written to a `redb`
//! database only when `flush` is called, in one write transaction, so the
//! backend's debounced save decides when the disk is touched. A dictionary
//! opened without a path never persists anything.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use redb::{Database, ReadableTable, TableDefinition, TableError};

/// File name of the store inside a family's user directory.
pub const USERDICT_FILE: &str = "userdict.redb";

/// Phrase → learned count.
const TABLE_DEF: TableDefinition<&'static str, u64> = TableDefinition::new("user_dict");

struct Store {
    db: Database,
    path: PathBuf,
}

pub struct UserDict {
    counts: HashMap<String, u64>,
    dirty: BTreeSet<String>,
    store: Option<Store>,
}

impl UserDict {
    pub fn in_memory() -> Self {
        Self {
            counts: HashMap::new(),
            dirty: BTreeSet::new(),
            store: None,
        }
    }

    /// Open (or create) the database at `path` and load its contents.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, redb::Error> {
        let path = path.as_ref();
        let db = Database::create(path)?;
        let counts = load_counts(&db)?;
        Ok(Self {
            counts,
            dirty: BTreeSet::new(),
            store: Some(Store {
                db,
                path: path.to_path_buf(),
            }),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.store.as_ref().map(|store| store.path.as_path())
    }

    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }

    /// Learn a phrase: increment its count by 1.
    pub fn learn(&mut self, phrase: &str) {
        self.learn_with_count(phrase, 1);
    }

    pub fn learn_with_count(&mut self, phrase: &str, delta: u64) {
        if delta == 0 || phrase.is_empty() {
            return;
        }
        let entry = self.counts.entry(phrase.to_string()).or_insert(0);
        *entry = entry.saturating_add(delta);
        self.dirty.insert(phrase.to_string());
    }

    pub fn frequency(&self, phrase: &str) -> u64 {
        self.counts.get(phrase).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// True when there are changes `flush` has not written yet.
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// All entries, sorted by phrase.
    pub fn entries(&self) -> Vec<(String, u64)> {
        let mut out: Vec<_> = self
            .counts
            .iter()
            .map(|(phrase, count)| (phrase.clone(), *count))
            .collect();
        out.sort();
        out
    }

    /// Write pending changes. Returns the number of phrases written; an
    /// in-memory dictionary writes nothing and only forgets the changes.
    pub fn flush(&mut self) -> Result<usize, redb::Error> {
        let Some(store) = &self.store else {
            self.dirty.clear();
            return Ok(0);
        };
        if self.dirty.is_empty() {
            return Ok(0);
        }

        let txn = store.db.begin_write()?;
        {
            let mut table = txn.open_table(TABLE_DEF)?;
            for phrase in &self.dirty {
                let count = self.counts.get(phrase).copied().unwrap_or(0);
                table.insert(phrase.as_str(), count)?;
            }
        }
        txn.commit()?;

        let written = self.dirty.len();
        self.dirty.clear();
        Ok(written)
    }
}

fn load_counts(db: &Database) -> Result<HashMap<String, u64>, redb::Error> {
    let mut out = HashMap::new();
    let read_txn = db.begin_read()?;
    let table = match read_txn.open_table(TABLE_DEF) {
        Ok(table) => table,
        Err(TableError::TableDoesNotExist(_)) => return Ok(out),
        Err(err) => return Err(err.into()),
    };
    for item in table.iter()? {
        let (phrase, count) = item?;
        out.insert(phrase.value().to_string(), count.value());
    }
    Ok(out)
}

impl std::fmt::Debug for UserDict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserDict")
            .field("entries", &self.counts.len())
            .field("dirty", &self.dirty.len())
            .field("path", &self.path())
            .finish()
    }
}
