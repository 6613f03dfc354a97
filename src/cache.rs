use std::collections::HashMap;

use parking_lot::RwLock;

use crate::models::UserId;

/// Key of the site-wide statistics fragment.
pub const GLOBAL_STATISTICS_KEY: &str = "statistics_partial";

/// Entries kept by a `MemoryFragmentCache` built with `new()`.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Key of a user's statistics fragment: `statistics_partial-<userId>`.
pub fn user_statistics_key(user: &UserId) -> String {
    format!("{GLOBAL_STATISTICS_KEY}-{user}")
}

/// Store for rendered fragments.
///
/// Every key carries a generation that `expire` bumps. A renderer notes the
/// generation before it reads the data behind a fragment and hands it back
/// to `write`, so a fragment rendered from data that was invalidated in the
/// meantime is dropped instead of stored.
pub trait FragmentCache: Send + Sync {
    fn read(&self, key: &str) -> Option<String>;
    fn generation(&self, key: &str) -> u64;
    /// Returns true if the fragment was stored.
    fn write(&self, key: &str, fragment: String, generation: u64) -> bool;
    /// Returns true if an entry was removed.
    fn expire(&self, key: &str) -> bool;
}

#[derive(Default)]
struct Entries {
    fragments: HashMap<String, String>,
    generations: HashMap<String, u64>,
}

/// In-process fragment cache holding at most `capacity` fragments. Once
/// full, new keys are refused until something is expired.
pub struct MemoryFragmentCache {
    entries: RwLock<Entries>,
    capacity: usize,
}

impl Default for MemoryFragmentCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl MemoryFragmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            capacity,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().fragments.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().fragments.is_empty()
    }
}

impl FragmentCache for MemoryFragmentCache {
    fn read(&self, key: &str) -> Option<String> {
        self.entries.read().fragments.get(key).cloned()
    }

    fn generation(&self, key: &str) -> u64 {
        self.entries.read().generations.get(key).copied().unwrap_or(0)
    }

    fn write(&self, key: &str, fragment: String, generation: u64) -> bool {
        let mut entries = self.entries.write();

        let current = entries.generations.get(key).copied().unwrap_or(0);
        if current != generation {
            tracing::debug!(key, generation, current, "Fragment expired while rendering, not stored");
            return false;
        }
        if !entries.fragments.contains_key(key) && entries.fragments.len() >= self.capacity {
            tracing::debug!(key, capacity = self.capacity, "Fragment cache full");
            return false;
        }

        entries.fragments.insert(key.to_string(), fragment);
        true
    }

    fn expire(&self, key: &str) -> bool {
        let mut entries = self.entries.write();
        *entries.generations.entry(key.to_string()).or_insert(0) += 1;
        entries.fragments.remove(key).is_some()
    }
}

/// Expire every key, returning how many entries were actually present.
pub fn expire_all<I, K>(cache: &dyn FragmentCache, keys: I) -> usize
where
    I: IntoIterator<Item = K>,
    K: AsRef<str>,
{
    let mut expired = 0;
    for key in keys {
        let key = key.as_ref();
        if cache.expire(key) {
            expired += 1;
        }
        tracing::debug!(key, "Expired fragment");
    }
    expired
}
