use std::collections::HashMap;

use arc_swap::ArcSwapOption;
use archive_format::ArchiveError;

/// A `(name, offset, size)` table for one resource kind, plus a lazily
/// populated construction cache per entry (§4.4).
///
/// Read-only after construction except for the cache cells — lookups don't
/// need any coordination, only `ArcSwapOption::store`/`load` on the cells
/// constructed objects pass through.
pub struct ResourceDirectory<T> {
    kind: &'static str,
    entries: HashMap<String, Entry<T>>,
}

struct Entry<T> {
    offset: u32,
    size: u32,
    cache: ArcSwapOption<T>,
}

impl<T> ResourceDirectory<T> {
    pub fn new(kind: &'static str) -> Self {
        ResourceDirectory {
            kind,
            entries: HashMap::new(),
        }
    }

    /// Case-sensitive; rejects duplicates within this directory's namespace.
    /// Different kinds never collide with each other even if they reuse a
    /// name (§3 Open Question: namespaces are independent per kind).
    pub fn insert(&mut self, name: String, offset: u32, size: u32) -> Result<(), ArchiveError> {
        if self.entries.contains_key(&name) {
            return Err(ArchiveError::DuplicateName {
                kind: self.kind.to_string(),
                name,
            });
        }
        self.entries.insert(
            name,
            Entry {
                offset,
                size,
                cache: ArcSwapOption::empty(),
            },
        );
        Ok(())
    }

    pub fn offset_and_size(&self, name: &str) -> Option<(u32, u32)> {
        self.entries.get(name).map(|e| (e.offset, e.size))
    }

    pub fn lookup(&self, name: &str) -> Result<(u32, u32), ArchiveError> {
        self.offset_and_size(name).ok_or_else(|| ArchiveError::NotFound {
            kind: self.kind.to_string(),
            name: name.to_string(),
        })
    }

    pub fn cached(&self, name: &str) -> Option<std::sync::Arc<T>> {
        self.entries.get(name).and_then(|e| e.cache.load_full())
    }

    /// Unconditional store: whichever concurrent unpack calls this last
    /// wins the cache cell, no compare-and-swap. The loser's `Arc` is
    /// simply dropped — correctness holds either way since both callers
    /// constructed an equally valid object (§5, §8 law 5).
    pub fn store(&self, name: &str, value: std::sync::Arc<T>) {
        if let Some(entry) = self.entries.get(name) {
            entry.cache.store(Some(value));
        }
    }

    pub fn clear_cache(&self) {
        for entry in self.entries.values() {
            entry.cache.store(None);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}
