// Todo-list state store with write-through persistence

use crate::backend::StorageBackend;
use crate::filter::Filter;
use crate::models::TodoItem;
use eyre::{Context, Result};
use serde::{Serialize, de::DeserializeOwned};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Storage key holding the serialized item collection
pub const ITEMS_KEY: &str = "todo_list_items";

/// Storage key holding the serialized view filter
pub const FILTER_KEY: &str = "todo_list_filter";

/// What went wrong while talking to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// The backend failed to read a key
    Read,
    /// A stored payload could not be decoded
    Decode,
    /// A value could not be serialized
    Encode,
    /// The backend failed to write a key
    Write,
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FaultKind::Read => write!(f, "read"),
            FaultKind::Decode => write!(f, "decode"),
            FaultKind::Encode => write!(f, "encode"),
            FaultKind::Write => write!(f, "write"),
        }
    }
}

/// A storage failure the store recovered from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageFault {
    pub key: String,
    pub kind: FaultKind,
    pub message: String,
}

impl std::fmt::Display for StorageFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed for {}: {}", self.kind, self.key, self.message)
    }
}

type FaultHook = Box<dyn FnMut(&StorageFault)>;

/// In-memory todo list that writes every change through to a backend
///
/// The store is meant to be constructed once by the hosting application,
/// bootstrapped with [`TodoStore::init`], and then passed by reference to
/// whatever needs it. Actions never return errors: storage failures fall
/// back to defaults on read and leave the in-memory change in place on
/// write. Failures are still observable through [`TodoStore::last_fault`],
/// [`TodoStore::fault_count`] and the hook installed with
/// [`TodoStore::on_fault`].
pub struct TodoStore<B: StorageBackend> {
    backend: B,
    items: Vec<TodoItem>,
    filter: Filter,
    initialized: bool,
    last_fault: Option<StorageFault>,
    fault_count: usize,
    fault_hook: Option<FaultHook>,
}

impl<B: StorageBackend> TodoStore<B> {
    /// Create an empty, uninitialized store over `backend`
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            items: Vec::new(),
            filter: Filter::All,
            initialized: false,
            last_fault: None,
            fault_count: 0,
            fault_hook: None,
        }
    }

    /// Load persisted state once.
    ///
    /// The first call reads items and filter from the backend, substituting
    /// an empty list and [`Filter::All`] for anything missing or unreadable.
    /// Every later call is a no-op and touches no storage.
    pub fn init(&mut self) {
        if self.initialized {
            return;
        }

        let items: Vec<TodoItem> = self.read_or(ITEMS_KEY, Vec::new);
        self.items = dedup_by_id(items);
        self.filter = self.read_or(FILTER_KEY, Filter::default);
        self.initialized = true;

        info!(
            items = self.items.len(),
            filter = %self.filter,
            "Todo store initialized"
        );
    }

    // ========================================================================
    // Derived views
    // ========================================================================

    /// Items visible under the current filter, in list order
    pub fn filtered_items(&self) -> Vec<&TodoItem> {
        self.items.iter().filter(|item| self.filter.matches(item)).collect()
    }

    /// Number of incomplete items
    pub fn remaining_count(&self) -> usize {
        self.items.iter().filter(|item| !item.completed).count()
    }

    /// Number of completed items
    pub fn completed_count(&self) -> usize {
        self.items.len() - self.remaining_count()
    }

    pub fn items(&self) -> &[TodoItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&TodoItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    // ========================================================================
    // Actions
    // ========================================================================

    /// Change the view filter and persist it
    pub fn set_filter(&mut self, next: Filter) {
        self.filter = next;
        let encoded = encode(&next);
        self.write(FILTER_KEY, encoded);
    }

    /// Parse and apply a filter given as text.
    ///
    /// Returns false, without touching state or storage, when `next` is not
    /// one of `all`, `active` or `completed`.
    pub fn set_filter_str(&mut self, next: &str) -> bool {
        match next.parse::<Filter>() {
            Ok(filter) => {
                self.set_filter(filter);
                true
            }
            Err(e) => {
                warn!(value = next, error = %e, "Rejected invalid filter");
                false
            }
        }
    }

    /// Add a new item at the front of the list.
    ///
    /// The title is trimmed; a blank title is ignored and `None` returned.
    pub fn add_todo(&mut self, title: &str) -> Option<&TodoItem> {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            debug!("Ignoring blank todo title");
            return None;
        }

        let mut item = TodoItem::new(trimmed);
        // Ids stay unique even on a v4 collision
        while self.get(&item.id).is_some() {
            item.id = crate::models::new_id();
        }

        debug!(id = %item.id, "Adding todo");
        self.items.insert(0, item);
        self.persist();
        self.items.first()
    }

    /// Flip the completed flag of the item with `id`.
    ///
    /// Returns false when no such item exists.
    pub fn toggle_todo(&mut self, id: &str) -> bool {
        let Some(item) = self.items.iter_mut().find(|item| item.id == id) else {
            debug!(id, "Toggle of unknown todo ignored");
            return false;
        };

        item.completed = !item.completed;
        debug!(id, completed = item.completed, "Toggled todo");
        self.persist();
        true
    }

    /// Remove the item with `id`.
    ///
    /// Storage is written only when something was removed.
    pub fn delete_todo(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);

        if self.items.len() == before {
            debug!(id, "Delete of unknown todo ignored");
            return false;
        }

        debug!(id, "Deleted todo");
        self.persist();
        true
    }

    /// Remove every completed item, returning how many were removed
    pub fn clear_completed(&mut self) -> usize {
        let before = self.items.len();
        self.items.retain(|item| !item.completed);

        let removed = before - self.items.len();
        if removed > 0 {
            debug!(removed, "Cleared completed todos");
            self.persist();
        }
        removed
    }

    // ========================================================================
    // Fault observability
    // ========================================================================

    /// Most recent storage fault, if any
    pub fn last_fault(&self) -> Option<&StorageFault> {
        self.last_fault.as_ref()
    }

    /// Take the most recent storage fault, clearing it
    pub fn take_fault(&mut self) -> Option<StorageFault> {
        self.last_fault.take()
    }

    /// Total number of storage faults since the store was created
    pub fn fault_count(&self) -> usize {
        self.fault_count
    }

    /// Install a callback invoked for every storage fault
    pub fn on_fault<F>(&mut self, hook: F)
    where
        F: FnMut(&StorageFault) + 'static,
    {
        self.fault_hook = Some(Box::new(hook));
    }

    // ========================================================================
    // Persistence helpers
    // ========================================================================

    fn persist(&mut self) {
        let encoded = encode(&self.items);
        self.write(ITEMS_KEY, encoded);
    }

    fn read_or<T, F>(&mut self, key: &str, fallback: F) -> T
    where
        T: DeserializeOwned,
        F: FnOnce() -> T,
    {
        let raw = match self.backend.get(key) {
            Ok(Some(raw)) if !raw.is_empty() => raw,
            Ok(_) => {
                debug!(key, "No stored value, using default");
                return fallback();
            }
            Err(e) => {
                self.record_fault(key, FaultKind::Read, &e);
                return fallback();
            }
        };

        match decode(&raw) {
            Ok(value) => value,
            Err(e) => {
                self.record_fault(key, FaultKind::Decode, &e);
                fallback()
            }
        }
    }

    fn write(&mut self, key: &str, encoded: Result<Vec<u8>>) {
        let result = encoded
            .map_err(|e| (FaultKind::Encode, e))
            .and_then(|bytes| {
                self.backend
                    .set(key, &bytes)
                    .map_err(|e| (FaultKind::Write, e))
            });

        match result {
            Ok(()) => debug!(key, "Persisted"),
            Err((kind, e)) => self.record_fault(key, kind, &e),
        }
    }

    fn record_fault(&mut self, key: &str, kind: FaultKind, error: &eyre::Report) {
        let fault = StorageFault {
            key: key.to_string(),
            kind,
            message: format!("{:#}", error),
        };
        warn!(key, kind = %kind, error = %fault.message, "Storage fault recovered");

        self.fault_count += 1;
        if let Some(hook) = self.fault_hook.as_mut() {
            hook(&fault);
        }
        self.last_fault = Some(fault);
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).context("Failed to serialize value")
}

fn decode<T: DeserializeOwned>(raw: &[u8]) -> Result<T> {
    serde_json::from_slice(raw).context("Failed to parse stored JSON")
}

/// Keep the first occurrence of each id
fn dedup_by_id(items: Vec<TodoItem>) -> Vec<TodoItem> {
    let mut seen = HashSet::with_capacity(items.len());
    let before = items.len();
    let items: Vec<TodoItem> = items
        .into_iter()
        .filter(|item| seen.insert(item.id.clone()))
        .collect();

    if items.len() != before {
        warn!(
            dropped = before - items.len(),
            "Dropped stored todos with duplicate ids"
        );
    }
    items
}
