use super::StorageBackend;
use eyre::{Result, eyre};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

/// In-memory storage backend.
///
/// Uses `RefCell`/`Cell` for interior mutability since the store is
/// single-threaded. Besides holding values it counts reads and writes and
/// can simulate failures, which makes it the backend of choice for tests.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RefCell<HashMap<String, Vec<u8>>>,
    reads: Cell<usize>,
    writes: Cell<usize>,
    simulate_read_error: Cell<bool>,
    simulate_write_error: Cell<bool>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend pre-populated with raw payloads.
    ///
    /// Seeding does not count as a write.
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Vec<u8>>,
    {
        let backend = Self::new();
        backend
            .entries
            .borrow_mut()
            .extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
        backend
    }

    /// Enable read error simulation for testing error handling.
    pub fn set_simulate_read_error(&self, simulate: bool) {
        self.simulate_read_error.set(simulate);
    }

    /// Enable write error simulation for testing error handling.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        self.simulate_write_error.set(simulate);
    }

    /// Number of `get` calls so far, including failed ones
    pub fn read_count(&self) -> usize {
        self.reads.get()
    }

    /// Number of `set` calls so far, including failed ones
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }

    /// Raw value under `key`, without counting a read
    pub fn peek(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.borrow().get(key).cloned()
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.reads.set(self.reads.get() + 1);
        if self.simulate_read_error.get() {
            return Err(eyre!("Simulated read error"));
        }
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.writes.set(self.writes.get() + 1);
        if self.simulate_write_error.get() {
            return Err(eyre!("Simulated write error"));
        }
        self.entries.borrow_mut().insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_missing_key() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.get("missing").unwrap(), None);
        assert_eq!(backend.read_count(), 1);
    }

    #[test]
    fn test_set_then_get() {
        let backend = MemoryBackend::new();
        backend.set("k", b"v1").unwrap();
        backend.set("k", b"v2").unwrap();

        assert_eq!(backend.get("k").unwrap(), Some(b"v2".to_vec()));
        assert_eq!(backend.write_count(), 2);
    }

    #[test]
    fn test_with_entries_does_not_count_writes() {
        let backend = MemoryBackend::with_entries([("k", "v")]);
        assert_eq!(backend.write_count(), 0);
        assert_eq!(backend.peek("k"), Some(b"v".to_vec()));
        assert_eq!(backend.read_count(), 0);
    }

    #[test]
    fn test_simulated_errors() {
        let backend = MemoryBackend::with_entries([("k", "v")]);

        backend.set_simulate_read_error(true);
        assert!(backend.get("k").is_err());
        backend.set_simulate_read_error(false);
        assert!(backend.get("k").is_ok());

        backend.set_simulate_write_error(true);
        assert!(backend.set("k", b"new").is_err());
        assert_eq!(backend.peek("k"), Some(b"v".to_vec()));
        assert_eq!(backend.write_count(), 1);
    }
}
