//! Function existence cache.

use dashmap::DashMap;

/// Whether a plugin is known to export a function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FunctionPresence {
    /// Not looked up yet.
    #[default]
    Unknown,
    /// The plugin exports it.
    Present,
    /// The plugin does not export it.
    Absent,
}

impl FunctionPresence {
    /// Presence for a lookup result.
    #[must_use]
    pub fn from_found(found: bool) -> Self {
        if found { Self::Present } else { Self::Absent }
    }

    /// The cached answer, if any.
    #[must_use]
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Self::Unknown => None,
            Self::Present => Some(true),
            Self::Absent => Some(false),
        }
    }
}

/// Name → presence, shared between callers and the liveness task.
#[derive(Debug, Default)]
pub struct FunctionCache {
    entries: DashMap<String, FunctionPresence>,
}

impl FunctionCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached presence of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> FunctionPresence {
        self.entries.get(name).map_or(FunctionPresence::Unknown, |entry| *entry)
    }

    /// Record the presence of `name`.
    pub fn set(&self, name: &str, presence: FunctionPresence) {
        if presence == FunctionPresence::Unknown {
            self.entries.remove(name);
        } else {
            self.entries.insert(name.to_string(), presence);
        }
    }

    /// Forget every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of cached decisions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_positive_and_negative_entries() {
        let cache = FunctionCache::new();
        assert_eq!(cache.get("sum"), FunctionPresence::Unknown);

        cache.set("sum", FunctionPresence::Present);
        cache.set("missing", FunctionPresence::Absent);
        assert_eq!(cache.get("sum").as_bool(), Some(true));
        assert_eq!(cache.get("missing").as_bool(), Some(false));
        assert_eq!(cache.len(), 2);

        cache.set("sum", FunctionPresence::Unknown);
        assert_eq!(cache.get("sum"), FunctionPresence::Unknown);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_writers() {
        let cache = Arc::new(FunctionCache::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for j in 0..100 {
                        cache.set(&format!("f{j}"), FunctionPresence::from_found(i % 2 == 0));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 100);
    }
}
