//! Key-value database boundary
//!
//! The priority store does not own a storage engine; it consumes anything
//! implementing [`Database`]. Keys and values are opaque bytes here.
//!
//! Iteration is cursor based: [`Database::next`] takes the previous key
//! rather than a live iterator, so callers may rewrite or remove entries
//! between steps without invalidating the scan.

use std::collections::BTreeMap;
use std::io;
use std::ops::Bound;

use bytes::Bytes;

/// Ordered key-value engine consumed by the priority store
pub trait Database: Send {
    /// Fetch the value stored under `key`
    fn get(&self, key: &[u8]) -> Option<Bytes>;

    /// Store `value` under `key`
    ///
    /// With `create_only` set the write fails with
    /// [`io::ErrorKind::AlreadyExists`] if the key is present.
    fn set(&mut self, key: &[u8], value: &[u8], create_only: bool) -> io::Result<()>;

    /// Remove `key`; removing an absent key is not an error
    fn unset(&mut self, key: &[u8]) -> io::Result<()>;

    /// First key in iteration order
    fn first(&self) -> Option<Vec<u8>>;

    /// Key following `key` in iteration order
    ///
    /// `key` need not still be present.
    fn next(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Flush to durable storage
    fn sync(&mut self) -> io::Result<()>;

    /// Flush and release the engine
    fn close(&mut self) -> io::Result<()> {
        self.sync()
    }

    /// Snapshot of every key, walking the cursor from the start
    fn keys(&self) -> Vec<Vec<u8>> {
        let mut keys = Vec::new();
        let mut cursor = self.first();
        while let Some(key) = cursor {
            cursor = self.next(&key);
            keys.push(key);
        }
        keys
    }
}

/// Ordered in-memory map backing [`MemoryDatabase`]
#[derive(Debug, Default, Clone)]
struct OrderedMap {
    map: BTreeMap<Vec<u8>, Bytes>,
}

impl OrderedMap {
    fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.map.get(key).cloned()
    }

    fn set(&mut self, key: &[u8], value: &[u8], create_only: bool) -> io::Result<()> {
        if create_only && self.map.contains_key(key) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "key already present",
            ));
        }
        self.map
            .insert(key.to_vec(), Bytes::copy_from_slice(value));
        Ok(())
    }

    fn unset(&mut self, key: &[u8]) {
        self.map.remove(key);
    }

    fn first(&self) -> Option<Vec<u8>> {
        self.map.keys().next().cloned()
    }

    fn next(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.map
            .range::<[u8], _>((Bound::Excluded(key), Bound::Unbounded))
            .next()
            .map(|(k, _)| k.clone())
    }

    fn len(&self) -> usize {
        self.map.len()
    }
}

/// Volatile database, mostly useful for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    map: OrderedMap,
    syncs: usize,
}

impl MemoryDatabase {
    /// Create an empty database
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times [`Database::sync`] has been called
    pub fn sync_count(&self) -> usize {
        self.syncs
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the database holds no keys
    pub fn is_empty(&self) -> bool {
        self.map.len() == 0
    }
}

impl Database for MemoryDatabase {
    fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.map.get(key)
    }

    fn set(&mut self, key: &[u8], value: &[u8], create_only: bool) -> io::Result<()> {
        self.map.set(key, value, create_only)
    }

    fn unset(&mut self, key: &[u8]) -> io::Result<()> {
        self.map.unset(key);
        Ok(())
    }

    fn first(&self) -> Option<Vec<u8>> {
        self.map.first()
    }

    fn next(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.map.next(key)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.syncs += 1;
        Ok(())
    }
}

impl<D: Database + ?Sized> Database for Box<D> {
    fn get(&self, key: &[u8]) -> Option<Bytes> {
        (**self).get(key)
    }

    fn set(&mut self, key: &[u8], value: &[u8], create_only: bool) -> io::Result<()> {
        (**self).set(key, value, create_only)
    }

    fn unset(&mut self, key: &[u8]) -> io::Result<()> {
        (**self).unset(key)
    }

    fn first(&self) -> Option<Vec<u8>> {
        (**self).first()
    }

    fn next(&self, key: &[u8]) -> Option<Vec<u8>> {
        (**self).next(key)
    }

    fn sync(&mut self) -> io::Result<()> {
        (**self).sync()
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_unset() {
        let mut db = MemoryDatabase::new();
        db.set(b"sink:a", b"one", false).unwrap();
        assert_eq!(db.get(b"sink:a").unwrap(), Bytes::from_static(b"one"));

        db.set(b"sink:a", b"two", false).unwrap();
        assert_eq!(db.get(b"sink:a").unwrap(), Bytes::from_static(b"two"));

        db.unset(b"sink:a").unwrap();
        assert!(db.get(b"sink:a").is_none());
        assert!(db.is_empty());
    }

    #[test]
    fn test_create_only() {
        let mut db = MemoryDatabase::new();
        db.set(b"k", b"v", true).unwrap();
        let err = db.set(b"k", b"w", true).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(db.get(b"k").unwrap(), Bytes::from_static(b"v"));
    }

    #[test]
    fn test_cursor_survives_removal() {
        let mut db = MemoryDatabase::new();
        for key in [&b"a"[..], b"b", b"c"] {
            db.set(key, b"", false).unwrap();
        }

        let first = db.first().unwrap();
        assert_eq!(first, b"a");
        db.unset(&first).unwrap();

        // Cursor still advances from a key that no longer exists
        assert_eq!(db.next(&first).unwrap(), b"b");
        assert_eq!(db.keys(), vec![b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn test_sync_counted() {
        let mut db = MemoryDatabase::new();
        db.sync().unwrap();
        db.close().unwrap();
        assert_eq!(db.sync_count(), 2);
    }
}
