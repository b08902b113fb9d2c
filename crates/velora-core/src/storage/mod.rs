//! Persistent record storage.

mod redb_store;

pub use redb_store::{Index, ReadTx, Reader, Record, RecordTable, Store, WriteTx};

/// Implements [`Record`] for a struct whose primary key is an `id` newtype field.
macro_rules! impl_record {
    ($ty:ty, $id:ident, $kind:literal, $table:literal) => {
        impl $crate::storage::Record for $ty {
            const KIND: &'static str = $kind;
            const TABLE: $crate::storage::RecordTable = redb::TableDefinition::new($table);

            fn key(&self) -> u64 {
                self.id.0
            }

            fn assign_key(&mut self, key: u64) {
                self.id = $crate::types::$id(key);
            }
        }
    };
}

pub(crate) use impl_record;
