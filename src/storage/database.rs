//! Database abstraction layer
//!
//! Provides a unified interface for different storage backends (sled,
//! redb). Allows switching between storage engines via feature flags,
//! mirroring the embedded B-tree environment the original C node obtained
//! from Berkeley DB (transactional, thread-safe, recoverable).

use std::path::Path;

use crate::error::{NodeError, Result};

/// Database abstraction trait
pub trait Database: Send + Sync {
    /// Open a named tree/table
    fn open_tree(&self, name: &str) -> Result<Box<dyn Tree>>;

    /// Flush all pending writes
    fn flush(&self) -> Result<()>;
}

/// Tree/Table abstraction trait
pub trait Tree: Send + Sync {
    fn insert(&self, key: &[u8], value: &[u8]) -> Result<()>;
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;
    fn remove(&self, key: &[u8]) -> Result<()>;
    fn contains_key(&self, key: &[u8]) -> Result<bool>;
    fn clear(&self) -> Result<()>;
    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn iter(&self) -> Box<dyn Iterator<Item = Result<(Vec<u8>, Vec<u8>)>> + '_>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackend {
    Sled,
    Redb,
}

pub fn create_database<P: AsRef<Path>>(
    data_dir: P,
    backend: DatabaseBackend,
) -> Result<Box<dyn Database>> {
    match backend {
        #[cfg(feature = "sled")]
        DatabaseBackend::Sled => Ok(Box::new(sled_impl::SledDatabase::new(data_dir)?)),
        #[cfg(not(feature = "sled"))]
        DatabaseBackend::Sled => Err(NodeError::Store(
            "sled backend not available (feature not enabled)".into(),
        )),
        #[cfg(feature = "redb")]
        DatabaseBackend::Redb => Ok(Box::new(redb_impl::RedbDatabase::new(data_dir)?)),
        #[cfg(not(feature = "redb"))]
        DatabaseBackend::Redb => Err(NodeError::Store(
            "redb backend not available (feature not enabled)".into(),
        )),
    }
}

/// Default backend: sled, the teacher's primary choice.
pub fn default_backend() -> DatabaseBackend {
    #[cfg(feature = "sled")]
    {
        DatabaseBackend::Sled
    }
    #[cfg(all(not(feature = "sled"), feature = "redb"))]
    {
        DatabaseBackend::Redb
    }
    #[cfg(all(not(feature = "sled"), not(feature = "redb")))]
    {
        DatabaseBackend::Sled
    }
}

pub fn fallback_backend(primary: DatabaseBackend) -> Option<DatabaseBackend> {
    match primary {
        DatabaseBackend::Sled => {
            #[cfg(feature = "redb")]
            {
                Some(DatabaseBackend::Redb)
            }
            #[cfg(not(feature = "redb"))]
            {
                None
            }
        }
        DatabaseBackend::Redb => {
            #[cfg(feature = "sled")]
            {
                Some(DatabaseBackend::Sled)
            }
            #[cfg(not(feature = "sled"))]
            {
                None
            }
        }
    }
}

#[cfg(feature = "sled")]
mod sled_impl {
    use super::{Database, Tree};
    use crate::error::Result;
    use std::path::Path;
    use std::sync::Arc;

    pub struct SledDatabase {
        db: Arc<sled::Db>,
    }

    impl SledDatabase {
        pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
            let db = sled::open(data_dir)?;
            Ok(Self { db: Arc::new(db) })
        }
    }

    impl Database for SledDatabase {
        fn open_tree(&self, name: &str) -> Result<Box<dyn Tree>> {
            let tree = self.db.open_tree(name)?;
            Ok(Box::new(SledTree { tree: Arc::new(tree) }))
        }

        fn flush(&self) -> Result<()> {
            self.db.flush()?;
            Ok(())
        }
    }

    struct SledTree {
        tree: Arc<sled::Tree>,
    }

    impl Tree for SledTree {
        fn insert(&self, key: &[u8], value: &[u8]) -> Result<()> {
            self.tree.insert(key, value)?;
            // Committed before return: sled durably syncs the write-ahead
            // log on insert, matching the store's crash-safety contract.
            self.tree.flush()?;
            Ok(())
        }

        fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
            Ok(self.tree.get(key)?.map(|v| v.to_vec()))
        }

        fn remove(&self, key: &[u8]) -> Result<()> {
            self.tree.remove(key)?;
            self.tree.flush()?;
            Ok(())
        }

        fn contains_key(&self, key: &[u8]) -> Result<bool> {
            Ok(self.tree.contains_key(key)?)
        }

        fn clear(&self) -> Result<()> {
            self.tree.clear()?;
            Ok(())
        }

        fn len(&self) -> Result<usize> {
            Ok(self.tree.len())
        }

        fn iter(&self) -> Box<dyn Iterator<Item = Result<(Vec<u8>, Vec<u8>)>> + '_> {
            Box::new(
                self.tree
                    .iter()
                    .map(|item| item.map(|(k, v)| (k.to_vec(), v.to_vec())).map_err(NodeError::from)),
            )
        }
    }

    use crate::error::NodeError;
}

#[cfg(feature = "redb")]
mod redb_impl {
    use super::{Database, Tree};
    use crate::error::{NodeError, Result};
    use redb::{Database as RedbDb, ReadableTable, TableDefinition};
    use std::path::Path;
    use std::sync::Arc;

    static HEADERS_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("headers");
    static HEIGHT_INDEX_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("height_index");

    pub struct RedbDatabase {
        db: Arc<RedbDb>,
    }

    impl RedbDatabase {
        pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
            use std::sync::Mutex;
            static DB_CREATE_MUTEX: Mutex<()> = Mutex::new(());
            let _guard = DB_CREATE_MUTEX.lock().unwrap();

            std::fs::create_dir_all(&data_dir)?;
            let db_path = data_dir.as_ref().join("redb.db");
            let db = if db_path.exists() {
                RedbDb::open(&db_path).or_else(|_| RedbDb::create(&db_path))
            } else {
                RedbDb::create(&db_path)
            }
            .map_err(|e| NodeError::Store(e.to_string()))?;

            let write_txn = db.begin_write().map_err(|e| NodeError::Store(e.to_string()))?;
            {
                write_txn.open_table(HEADERS_TABLE).map_err(|e| NodeError::Store(e.to_string()))?;
                write_txn
                    .open_table(HEIGHT_INDEX_TABLE)
                    .map_err(|e| NodeError::Store(e.to_string()))?;
            }
            write_txn.commit().map_err(|e| NodeError::Store(e.to_string()))?;

            Ok(Self { db: Arc::new(db) })
        }

        fn get_table_def(
            &self,
            name: &str,
        ) -> Option<&'static TableDefinition<'static, &'static [u8], &'static [u8]>> {
            match name {
                "headers" => Some(&HEADERS_TABLE),
                "height_index" => Some(&HEIGHT_INDEX_TABLE),
                _ => None,
            }
        }
    }

    impl Database for RedbDatabase {
        fn open_tree(&self, name: &str) -> Result<Box<dyn Tree>> {
            let table_def = self
                .get_table_def(name)
                .ok_or_else(|| NodeError::Store(format!("unknown table: {name}")))?;

            Ok(Box::new(RedbTree { db: Arc::clone(&self.db), table_def }))
        }

        fn flush(&self) -> Result<()> {
            let write_txn = self.db.begin_write().map_err(|e| NodeError::Store(e.to_string()))?;
            write_txn.commit().map_err(|e| NodeError::Store(e.to_string()))?;
            Ok(())
        }
    }

    struct RedbTree {
        db: Arc<RedbDb>,
        table_def: &'static TableDefinition<'static, &'static [u8], &'static [u8]>,
    }

    impl Tree for RedbTree {
        fn insert(&self, key: &[u8], value: &[u8]) -> Result<()> {
            let write_txn = self.db.begin_write().map_err(|e| NodeError::Store(e.to_string()))?;
            {
                let mut table = write_txn.open_table(*self.table_def).map_err(|e| NodeError::Store(e.to_string()))?;
                table.insert(key, value).map_err(|e| NodeError::Store(e.to_string()))?;
            }
            write_txn.commit().map_err(|e| NodeError::Store(e.to_string()))?;
            Ok(())
        }

        fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
            let read_txn = self.db.begin_read().map_err(|e| NodeError::Store(e.to_string()))?;
            let table = read_txn.open_table(*self.table_def).map_err(|e| NodeError::Store(e.to_string()))?;
            Ok(table.get(key).map_err(|e| NodeError::Store(e.to_string()))?.map(|v| v.value().to_vec()))
        }

        fn remove(&self, key: &[u8]) -> Result<()> {
            let write_txn = self.db.begin_write().map_err(|e| NodeError::Store(e.to_string()))?;
            {
                let mut table = write_txn.open_table(*self.table_def).map_err(|e| NodeError::Store(e.to_string()))?;
                table.remove(key).map_err(|e| NodeError::Store(e.to_string()))?;
            }
            write_txn.commit().map_err(|e| NodeError::Store(e.to_string()))?;
            Ok(())
        }

        fn contains_key(&self, key: &[u8]) -> Result<bool> {
            Ok(self.get(key)?.is_some())
        }

        fn clear(&self) -> Result<()> {
            let write_txn = self.db.begin_write().map_err(|e| NodeError::Store(e.to_string()))?;
            {
                let mut table = write_txn.open_table(*self.table_def).map_err(|e| NodeError::Store(e.to_string()))?;
                let keys: Vec<Vec<u8>> = table
                    .range::<&[u8]>(..)
                    .map_err(|e| NodeError::Store(e.to_string()))?
                    .filter_map(|r| r.ok())
                    .map(|(k, _)| k.value().to_vec())
                    .collect();
                for k in keys {
                    table.remove(k.as_slice()).map_err(|e| NodeError::Store(e.to_string()))?;
                }
            }
            write_txn.commit().map_err(|e| NodeError::Store(e.to_string()))?;
            Ok(())
        }

        fn len(&self) -> Result<usize> {
            let read_txn = self.db.begin_read().map_err(|e| NodeError::Store(e.to_string()))?;
            let table = read_txn.open_table(*self.table_def).map_err(|e| NodeError::Store(e.to_string()))?;
            Ok(table.len().map_err(|e| NodeError::Store(e.to_string()))? as usize)
        }

        fn iter(&self) -> Box<dyn Iterator<Item = Result<(Vec<u8>, Vec<u8>)>> + '_> {
            let read_txn = match self.db.begin_read() {
                Ok(txn) => txn,
                Err(e) => return Box::new(std::iter::once(Err(NodeError::Store(e.to_string())))),
            };
            let table = match read_txn.open_table(*self.table_def) {
                Ok(t) => t,
                Err(e) => return Box::new(std::iter::once(Err(NodeError::Store(e.to_string())))),
            };
            let mut items = Vec::new();
            match table.range::<&[u8]>(..) {
                Ok(range_iter) => {
                    for item in range_iter {
                        match item {
                            Ok((k, v)) => items.push(Ok((k.value().to_vec(), v.value().to_vec()))),
                            Err(e) => items.push(Err(NodeError::Store(e.to_string()))),
                        }
                    }
                }
                Err(e) => items.push(Err(NodeError::Store(e.to_string()))),
            }
            Box::new(items.into_iter())
        }
    }
}
