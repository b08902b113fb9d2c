//! # redb-backed Record Store
//!
//! A typed record store on top of the redb embedded database.
//!
//! Every record kind lives in its own `u64 -> postcard bytes` table. Ids are
//! handed out from a per-kind sequence kept in the `sequences` table, starting
//! at 1. Unique string lookups (email, username) use dedicated index tables.
//!
//! All access goes through transactions:
//! - `Store::read` runs a closure against a read snapshot
//! - `Store::write` runs a closure in a write transaction, committing on `Ok`
//!   and aborting on `Err`, so a failed rule check leaves no partial writes

use crate::VeloraError;
use redb::{
    Database, ReadTransaction, ReadableDatabase, ReadableTable, ReadableTableMetadata,
    TableDefinition, TableError, WriteTransaction,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Table for id sequences: record kind -> last issued id
const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");

/// Table for the email index: lower-cased email -> UserId
const USER_EMAIL_INDEX: TableDefinition<&str, u64> = TableDefinition::new("user_email_index");

/// Table for the username index: username -> UserId
const USERNAME_INDEX: TableDefinition<&str, u64> = TableDefinition::new("username_index");

/// Table for revoked refresh tokens: jti -> expiry (unix seconds)
const REVOKED_TOKENS: TableDefinition<&str, i64> = TableDefinition::new("revoked_tokens");

/// Byte payload table shape shared by every record kind.
pub type RecordTable = TableDefinition<'static, u64, &'static [u8]>;

/// A persisted record kind.
///
/// Implementors declare their table and expose their primary key. The store
/// assigns keys on insert.
pub trait Record: Serialize + DeserializeOwned {
    /// Human readable kind, used in "not found" messages and as sequence name.
    const KIND: &'static str;
    /// Table holding records of this kind.
    const TABLE: RecordTable;

    /// Primary key.
    fn key(&self) -> u64;

    /// Set the primary key (called once, on insert).
    fn assign_key(&mut self, key: u64);
}

/// Unique string indexes maintained next to record tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Index {
    /// Lower-cased email -> user.
    UserEmail,
    /// Username -> user.
    Username,
}

impl Index {
    const fn table(self) -> TableDefinition<'static, &'static str, u64> {
        match self {
            Self::UserEmail => USER_EMAIL_INDEX,
            Self::Username => USERNAME_INDEX,
        }
    }
}

fn storage<E: std::fmt::Display>(e: E) -> VeloraError {
    VeloraError::Storage(e.to_string())
}

fn encode<R: Record>(record: &R) -> Result<Vec<u8>, VeloraError> {
    postcard::to_allocvec(record).map_err(|e| VeloraError::Serialization(e.to_string()))
}

fn decode<R: Record>(bytes: &[u8]) -> Result<R, VeloraError> {
    postcard::from_bytes(bytes).map_err(|e| VeloraError::Serialization(e.to_string()))
}

fn get_from<R, T>(table: &T, key: u64) -> Result<Option<R>, VeloraError>
where
    R: Record,
    T: ReadableTable<u64, &'static [u8]>,
{
    match table.get(key).map_err(storage)? {
        Some(data) => Ok(Some(decode(data.value())?)),
        None => Ok(None),
    }
}

fn scan_from<R, T>(table: &T) -> Result<Vec<R>, VeloraError>
where
    R: Record,
    T: ReadableTable<u64, &'static [u8]>,
{
    let mut records = Vec::new();
    for entry in table.iter().map_err(storage)? {
        let (_, value) = entry.map_err(storage)?;
        records.push(decode(value.value())?);
    }
    Ok(records)
}

// =============================================================================
// READ ACCESS
// =============================================================================

/// Read operations available in both read and write transactions.
pub trait Reader {
    /// Fetch a record by key.
    fn get<R: Record>(&self, key: u64) -> Result<Option<R>, VeloraError>;

    /// All records of a kind, in ascending key order.
    fn scan<R: Record>(&self) -> Result<Vec<R>, VeloraError>;

    /// Number of records of a kind.
    fn count<R: Record>(&self) -> Result<u64, VeloraError>;

    /// Look up a unique index entry.
    fn index_get(&self, index: Index, key: &str) -> Result<Option<u64>, VeloraError>;

    /// Whether a token id has been revoked.
    fn is_revoked(&self, jti: &str) -> Result<bool, VeloraError>;

    /// Fetch a record by key, failing with `NotFound` if it is missing.
    fn require<R: Record>(&self, key: u64) -> Result<R, VeloraError> {
        self.get(key)?.ok_or(VeloraError::NotFound(R::KIND))
    }

    /// Records matching a predicate, in ascending key order.
    fn filter<R: Record>(&self, pred: impl Fn(&R) -> bool) -> Result<Vec<R>, VeloraError> {
        Ok(self.scan::<R>()?.into_iter().filter(|r| pred(r)).collect())
    }

    /// First record matching a predicate.
    fn find<R: Record>(&self, pred: impl Fn(&R) -> bool) -> Result<Option<R>, VeloraError> {
        Ok(self.scan::<R>()?.into_iter().find(|r| pred(r)))
    }
}

/// A read-only snapshot of the store.
pub struct ReadTx {
    txn: ReadTransaction,
}

impl std::fmt::Debug for ReadTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadTx").finish_non_exhaustive()
    }
}

impl Reader for ReadTx {
    fn get<R: Record>(&self, key: u64) -> Result<Option<R>, VeloraError> {
        match self.txn.open_table(R::TABLE) {
            Ok(table) => get_from(&table, key),
            Err(TableError::TableDoesNotExist(_)) => Ok(None),
            Err(e) => Err(storage(e)),
        }
    }

    fn scan<R: Record>(&self) -> Result<Vec<R>, VeloraError> {
        match self.txn.open_table(R::TABLE) {
            Ok(table) => scan_from(&table),
            Err(TableError::TableDoesNotExist(_)) => Ok(Vec::new()),
            Err(e) => Err(storage(e)),
        }
    }

    fn count<R: Record>(&self) -> Result<u64, VeloraError> {
        match self.txn.open_table(R::TABLE) {
            Ok(table) => table.len().map_err(storage),
            Err(TableError::TableDoesNotExist(_)) => Ok(0),
            Err(e) => Err(storage(e)),
        }
    }

    fn index_get(&self, index: Index, key: &str) -> Result<Option<u64>, VeloraError> {
        let table = self.txn.open_table(index.table()).map_err(storage)?;
        Ok(table.get(key).map_err(storage)?.map(|v| v.value()))
    }

    fn is_revoked(&self, jti: &str) -> Result<bool, VeloraError> {
        let table = self.txn.open_table(REVOKED_TOKENS).map_err(storage)?;
        Ok(table.get(jti).map_err(storage)?.is_some())
    }
}

// =============================================================================
// WRITE ACCESS
// =============================================================================

/// A write transaction. Changes become visible when `Store::write` commits.
pub struct WriteTx {
    txn: WriteTransaction,
}

impl std::fmt::Debug for WriteTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteTx").finish_non_exhaustive()
    }
}

impl Reader for WriteTx {
    fn get<R: Record>(&self, key: u64) -> Result<Option<R>, VeloraError> {
        let table = self.txn.open_table(R::TABLE).map_err(storage)?;
        get_from(&table, key)
    }

    fn scan<R: Record>(&self) -> Result<Vec<R>, VeloraError> {
        let table = self.txn.open_table(R::TABLE).map_err(storage)?;
        scan_from(&table)
    }

    fn count<R: Record>(&self) -> Result<u64, VeloraError> {
        let table = self.txn.open_table(R::TABLE).map_err(storage)?;
        table.len().map_err(storage)
    }

    fn index_get(&self, index: Index, key: &str) -> Result<Option<u64>, VeloraError> {
        let table = self.txn.open_table(index.table()).map_err(storage)?;
        Ok(table.get(key).map_err(storage)?.map(|v| v.value()))
    }

    fn is_revoked(&self, jti: &str) -> Result<bool, VeloraError> {
        let table = self.txn.open_table(REVOKED_TOKENS).map_err(storage)?;
        Ok(table.get(jti).map_err(storage)?.is_some())
    }
}

impl WriteTx {
    /// Insert a new record, assigning the next key of its kind.
    pub fn insert<R: Record>(&self, record: &mut R) -> Result<u64, VeloraError> {
        let key = {
            let mut sequences = self.txn.open_table(SEQUENCES).map_err(storage)?;
            let last = sequences
                .get(R::KIND)
                .map_err(storage)?
                .map(|v| v.value())
                .unwrap_or(0);
            let next = last.saturating_add(1);
            sequences.insert(R::KIND, next).map_err(storage)?;
            next
        };
        record.assign_key(key);
        self.put(record)?;
        Ok(key)
    }

    /// Insert or overwrite a record under its current key.
    pub fn put<R: Record>(&self, record: &R) -> Result<(), VeloraError> {
        let bytes = encode(record)?;
        let mut table = self.txn.open_table(R::TABLE).map_err(storage)?;
        table
            .insert(record.key(), bytes.as_slice())
            .map_err(storage)?;
        Ok(())
    }

    /// Delete a record. Returns whether it existed.
    pub fn delete<R: Record>(&self, key: u64) -> Result<bool, VeloraError> {
        let mut table = self.txn.open_table(R::TABLE).map_err(storage)?;
        let removed = table.remove(key).map_err(storage)?.is_some();
        Ok(removed)
    }

    /// Delete every record matching a predicate. Returns how many were removed.
    pub fn delete_where<R: Record>(&self, pred: impl Fn(&R) -> bool) -> Result<usize, VeloraError> {
        let doomed: Vec<u64> = self
            .scan::<R>()?
            .into_iter()
            .filter(|r| pred(r))
            .map(|r| r.key())
            .collect();
        let mut table = self.txn.open_table(R::TABLE).map_err(storage)?;
        for key in &doomed {
            table.remove(*key).map_err(storage)?;
        }
        Ok(doomed.len())
    }

    /// Claim a unique index entry.
    ///
    /// Fails with `Conflict` if the key is held by a different record.
    pub fn index_put(&self, index: Index, key: &str, id: u64) -> Result<(), VeloraError> {
        let mut table = self.txn.open_table(index.table()).map_err(storage)?;
        let existing = table.get(key).map_err(storage)?.map(|v| v.value());
        match existing {
            Some(holder) if holder != id => Err(VeloraError::Conflict(format!(
                "'{}' is already taken",
                key
            ))),
            _ => {
                table.insert(key, id).map_err(storage)?;
                Ok(())
            }
        }
    }

    /// Release a unique index entry.
    pub fn index_remove(&self, index: Index, key: &str) -> Result<(), VeloraError> {
        let mut table = self.txn.open_table(index.table()).map_err(storage)?;
        table.remove(key).map_err(storage)?;
        Ok(())
    }

    /// Record a revoked token id until its expiry.
    pub fn revoke(&self, jti: &str, expires_at: i64) -> Result<(), VeloraError> {
        let mut table = self.txn.open_table(REVOKED_TOKENS).map_err(storage)?;
        table.insert(jti, expires_at).map_err(storage)?;
        Ok(())
    }

    /// Forget revoked token ids whose tokens have expired anyway.
    pub fn purge_revoked(&self, now: i64) -> Result<usize, VeloraError> {
        let mut table = self.txn.open_table(REVOKED_TOKENS).map_err(storage)?;
        let mut expired = Vec::new();
        for entry in table.iter().map_err(storage)? {
            let (key, value) = entry.map_err(storage)?;
            if value.value() <= now {
                expired.push(key.value().to_string());
            }
        }
        for jti in &expired {
            table.remove(jti.as_str()).map_err(storage)?;
        }
        Ok(expired.len())
    }
}

// =============================================================================
// STORE
// =============================================================================

/// The platform's record store.
///
/// redb serializes writers internally, so a `Store` can be shared across
/// request handlers behind an `Arc` without an extra lock.
pub struct Store {
    db: Database,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, VeloraError> {
        let db = Database::create(path.as_ref()).map_err(storage)?;
        Self::init(db)
    }

    /// Create a volatile store backed by memory.
    pub fn in_memory() -> Result<Self, VeloraError> {
        let db = Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())
            .map_err(storage)?;
        Self::init(db)
    }

    fn init(db: Database) -> Result<Self, VeloraError> {
        // Fixed tables must exist before the first read transaction.
        let write_txn = db.begin_write().map_err(storage)?;
        let _ = write_txn.open_table(SEQUENCES).map_err(storage)?;
        let _ = write_txn.open_table(USER_EMAIL_INDEX).map_err(storage)?;
        let _ = write_txn.open_table(USERNAME_INDEX).map_err(storage)?;
        let _ = write_txn.open_table(REVOKED_TOKENS).map_err(storage)?;
        write_txn.commit().map_err(storage)?;
        Ok(Self { db })
    }

    /// Run a closure against a read snapshot.
    pub fn read<T>(
        &self,
        f: impl FnOnce(&ReadTx) -> Result<T, VeloraError>,
    ) -> Result<T, VeloraError> {
        let txn = self.db.begin_read().map_err(storage)?;
        f(&ReadTx { txn })
    }

    /// Run a closure in a write transaction.
    ///
    /// Commits when the closure returns `Ok`; aborts otherwise.
    pub fn write<T>(
        &self,
        f: impl FnOnce(&WriteTx) -> Result<T, VeloraError>,
    ) -> Result<T, VeloraError> {
        let txn = self.db.begin_write().map_err(storage)?;
        let tx = WriteTx { txn };
        match f(&tx) {
            Ok(value) => {
                tx.txn.commit().map_err(storage)?;
                Ok(value)
            }
            Err(e) => {
                tx.txn.abort().map_err(storage)?;
                Err(e)
            }
        }
    }

    /// Compact the database file.
    pub fn compact(&mut self) -> Result<bool, VeloraError> {
        self.db.compact().map_err(storage)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    const NOTES: RecordTable = TableDefinition::new("test_notes");

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestNote {
        id: u64,
        text: String,
    }

    impl Record for TestNote {
        const KIND: &'static str = "TestNote";
        const TABLE: RecordTable = NOTES;

        fn key(&self) -> u64 {
            self.id
        }

        fn assign_key(&mut self, key: u64) {
            self.id = key;
        }
    }

    fn note(text: &str) -> TestNote {
        TestNote {
            id: 0,
            text: text.to_string(),
        }
    }

    #[test]
    fn insert_assigns_sequential_keys_from_one() {
        let store = Store::in_memory().expect("store");
        let (a, b) = store
            .write(|tx| Ok((tx.insert(&mut note("a"))?, tx.insert(&mut note("b"))?)))
            .expect("write");
        assert_eq!((a, b), (1, 2));
    }

    #[test]
    fn read_of_unknown_table_is_empty() {
        let store = Store::in_memory().expect("store");
        let notes: Vec<TestNote> = store.read(|tx| tx.scan()).expect("scan");
        assert!(notes.is_empty());
        let missing = store.read(|tx| tx.require::<TestNote>(7));
        assert!(matches!(missing, Err(VeloraError::NotFound("TestNote"))));
    }

    #[test]
    fn failed_write_is_rolled_back() {
        let store = Store::in_memory().expect("store");
        let result: Result<(), VeloraError> = store.write(|tx| {
            tx.insert(&mut note("lost"))?;
            Err(VeloraError::invalid("rule failed"))
        });
        assert!(result.is_err());
        let count = store.read(|tx| tx.count::<TestNote>()).expect("count");
        assert_eq!(count, 0);
    }

    #[test]
    fn delete_where_removes_matching_records() {
        let store = Store::in_memory().expect("store");
        store
            .write(|tx| {
                tx.insert(&mut note("keep"))?;
                tx.insert(&mut note("drop"))?;
                tx.insert(&mut note("drop"))?;
                Ok(())
            })
            .expect("seed");
        let removed = store
            .write(|tx| tx.delete_where::<TestNote>(|n| n.text == "drop"))
            .expect("delete");
        assert_eq!(removed, 2);
        let left: Vec<TestNote> = store.read(|tx| tx.scan()).expect("scan");
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].text, "keep");
    }

    #[test]
    fn index_rejects_second_holder() {
        let store = Store::in_memory().expect("store");
        store
            .write(|tx| tx.index_put(Index::Username, "alice", 1))
            .expect("claim");
        // Re-claiming for the same id is fine.
        store
            .write(|tx| tx.index_put(Index::Username, "alice", 1))
            .expect("reclaim");
        let clash = store.write(|tx| tx.index_put(Index::Username, "alice", 2));
        assert!(matches!(clash, Err(VeloraError::Conflict(_))));

        store
            .write(|tx| tx.index_remove(Index::Username, "alice"))
            .expect("release");
        let holder = store
            .read(|tx| tx.index_get(Index::Username, "alice"))
            .expect("get");
        assert!(holder.is_none());
    }

    #[test]
    fn revoked_tokens_are_purged_after_expiry() {
        let store = Store::in_memory().expect("store");
        store
            .write(|tx| {
                tx.revoke("old", 100)?;
                tx.revoke("fresh", 1_000)
            })
            .expect("revoke");
        let purged = store.write(|tx| tx.purge_revoked(500)).expect("purge");
        assert_eq!(purged, 1);
        assert!(!store.read(|tx| tx.is_revoked("old")).expect("read"));
        assert!(store.read(|tx| tx.is_revoked("fresh")).expect("read"));
    }

    #[test]
    fn records_survive_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("velora.redb");
        {
            let store = Store::open(&db_path).expect("open");
            store
                .write(|tx| tx.insert(&mut note("persisted")))
                .expect("insert");
        }
        let store = Store::open(&db_path).expect("reopen");
        let restored: TestNote = store.read(|tx| tx.require(1)).expect("require");
        assert_eq!(restored.text, "persisted");
        let next = store
            .write(|tx| tx.insert(&mut note("second")))
            .expect("insert");
        assert_eq!(next, 2);
    }
}
