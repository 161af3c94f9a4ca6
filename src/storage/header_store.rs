//! Crash-safe header persistence: a primary hash index and a secondary
//! height index (duplicates allowed, for orphans sharing a height), plus
//! a paginated cursor matching the original `block_headers_db_t` API.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::error::{NodeError, Result};
use crate::primitives::{BlockHeaderRecord, Hash256};
use crate::storage::database::{create_database, default_backend, Database, DatabaseBackend, Tree};

/// Difficulty-epoch-sized page, matching the original default.
pub const DEFAULT_PAGE_SIZE: usize = 2016;

pub enum PutOutcome {
    Inserted,
    Updated,
}

pub enum DelOutcome {
    Removed,
    NotFound,
}

pub struct HeaderStore {
    _db: Box<dyn Database>,
    by_hash: Box<dyn Tree>,
    by_height: Box<dyn Tree>,
}

impl HeaderStore {
    pub fn open(data_dir: impl AsRef<std::path::Path>) -> Result<Self> {
        Self::open_with_backend(data_dir, default_backend())
    }

    pub fn open_with_backend(
        data_dir: impl AsRef<std::path::Path>,
        backend: DatabaseBackend,
    ) -> Result<Self> {
        let db = create_database(data_dir, backend)?;
        let by_hash = db.open_tree("headers")?;
        let by_height = db.open_tree("height_index")?;
        Ok(HeaderStore { _db: db, by_hash, by_height })
    }

    pub fn close(&self) -> Result<()> {
        self._db.flush()
    }

    pub fn get(&self, hash: &Hash256) -> Result<Option<BlockHeaderRecord>> {
        match self.by_hash.get(hash.as_slice())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Insert or overwrite a record, keeping the height index in sync.
    /// Durable before returning: both writes commit before `put` returns.
    pub fn put(&self, hash: &Hash256, record: &BlockHeaderRecord) -> Result<PutOutcome> {
        let existed = self.by_hash.contains_key(hash.as_slice())?;
        let bytes = bincode::serialize(record)?;
        self.by_hash.insert(hash.as_slice(), &bytes)?;

        let height_key = record.height.to_be_bytes();
        let mut height_entry_key = height_key.to_vec();
        height_entry_key.extend_from_slice(hash.as_slice());
        self.by_height.insert(&height_entry_key, hash.as_slice())?;

        Ok(if existed { PutOutcome::Updated } else { PutOutcome::Inserted })
    }

    pub fn del(&self, hash: &Hash256) -> Result<DelOutcome> {
        let Some(record) = self.get(hash)? else {
            return Ok(DelOutcome::NotFound);
        };
        self.by_hash.remove(hash.as_slice())?;
        let mut height_entry_key = record.height.to_be_bytes().to_vec();
        height_entry_key.extend_from_slice(hash.as_slice());
        self.by_height.remove(&height_entry_key)?;
        Ok(DelOutcome::Removed)
    }

    /// All records (including orphans) at a given height.
    pub fn get_by_height(&self, height: u32) -> Result<Vec<BlockHeaderRecord>> {
        let prefix = height.to_be_bytes();
        let mut out = Vec::new();
        for item in self.by_height.iter() {
            let (key, hash_bytes) = item?;
            if key.len() >= 4 && key[..4] == prefix {
                if let Some(record) = self.get(&Hash256::from_bytes(
                    hash_bytes
                        .as_slice()
                        .try_into()
                        .map_err(|_| NodeError::Store("corrupt height index entry".into()))?,
                ))? {
                    out.push(record);
                }
            }
        }
        out.sort_by_key(|r| r.hash());
        Ok(out)
    }

    /// Build a paginated cursor over the secondary height index.
    pub fn cursor(&self, page_size: usize) -> Result<Cursor> {
        let mut heights: BTreeMap<u32, Vec<Hash256>> = BTreeMap::new();
        for item in self.by_height.iter() {
            let (key, hash_bytes) = item?;
            if key.len() < 4 {
                continue;
            }
            let height = u32::from_be_bytes(key[..4].try_into().unwrap());
            let hash: [u8; 32] = hash_bytes
                .as_slice()
                .try_into()
                .map_err(|_| NodeError::Store("corrupt height index entry".into()))?;
            heights.entry(height).or_default().push(Hash256::from_bytes(hash));
        }
        let mut all_hashes: Vec<Hash256> = Vec::new();
        for (_, mut hashes) in heights {
            hashes.sort();
            all_hashes.extend(hashes);
        }
        Ok(Cursor { entries: all_hashes, page_size, offset: Mutex::new(0) })
    }
}

/// `first`/`prior`/`next`/`last`/`move_to` pagination over the hash list,
/// sorted by height then hash. Default page size is a difficulty epoch.
pub struct Cursor {
    entries: Vec<Hash256>,
    page_size: usize,
    offset: Mutex<usize>,
}

impl Cursor {
    fn page_at(&self, offset: usize) -> Vec<Hash256> {
        let end = (offset + self.page_size).min(self.entries.len());
        if offset >= self.entries.len() {
            return Vec::new();
        }
        self.entries[offset..end].to_vec()
    }

    pub fn first(&self) -> Vec<Hash256> {
        *self.offset.lock().unwrap() = 0;
        self.page_at(0)
    }

    pub fn last(&self) -> Vec<Hash256> {
        let last_offset = self.entries.len().saturating_sub(self.page_size);
        *self.offset.lock().unwrap() = last_offset;
        self.page_at(last_offset)
    }

    pub fn next(&self) -> Vec<Hash256> {
        let mut offset = self.offset.lock().unwrap();
        *offset += 1;
        self.page_at(*offset)
    }

    pub fn prior(&self) -> Vec<Hash256> {
        let mut offset = self.offset.lock().unwrap();
        *offset = offset.saturating_sub(1);
        self.page_at(*offset)
    }

    pub fn move_to(&self, height_index: usize) -> Vec<Hash256> {
        *self.offset.lock().unwrap() = height_index;
        self.page_at(height_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{BlockHeader, CompactTarget};

    fn sample_record(height: u32, nonce: u32) -> BlockHeaderRecord {
        BlockHeaderRecord::new(
            height,
            BlockHeader {
                version: 1,
                prev_hash: Hash256::ZERO,
                merkle_root: Hash256::double_sha256(&nonce.to_le_bytes()),
                timestamp: 1,
                bits: CompactTarget::new(0x1d00ffff),
                nonce,
            },
        )
    }

    #[test]
    fn put_get_del_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = HeaderStore::open(dir.path()).unwrap();
        let record = sample_record(1, 42);
        let hash = record.hash();

        assert!(matches!(store.put(&hash, &record).unwrap(), PutOutcome::Inserted));
        let fetched = store.get(&hash).unwrap().unwrap();
        assert_eq!(fetched.height, 1);

        assert!(matches!(store.del(&hash).unwrap(), DelOutcome::Removed));
        assert!(store.get(&hash).unwrap().is_none());
        assert!(matches!(store.del(&hash).unwrap(), DelOutcome::NotFound));
    }

    #[test]
    fn duplicate_height_entries_coexist() {
        let dir = tempfile::tempdir().unwrap();
        let store = HeaderStore::open(dir.path()).unwrap();
        let a = sample_record(5, 1);
        let b = sample_record(5, 2);
        store.put(&a.hash(), &a).unwrap();
        store.put(&b.hash(), &b).unwrap();

        let at_height = store.get_by_height(5).unwrap();
        assert_eq!(at_height.len(), 2);
    }

    #[test]
    fn cursor_pages_through_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = HeaderStore::open(dir.path()).unwrap();
        for h in 0..5u32 {
            let r = sample_record(h, h);
            store.put(&r.hash(), &r).unwrap();
        }
        let cursor = store.cursor(2).unwrap();
        assert_eq!(cursor.first().len(), 2);
        assert_eq!(cursor.next().len(), 2);
    }
}
