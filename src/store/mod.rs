pub mod disk;
pub mod memory;

use crate::core::cache::{KeyValueCollection, Store};
use disk::DiskCollection;
use fjall::{Keyspace, PartitionCreateOptions};
use memory::MemoryCollection;
use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, RwLock},
};
use tracing::{debug, warn};

/// A thread-safe key-value store that can hold multiple named collections,
/// either in memory or persisted under the data directory.
pub struct KeyValueStore {
    collections: RwLock<HashMap<(String, bool), Arc<dyn KeyValueCollection>>>,
    keyspace: Option<Arc<Keyspace>>,
}

impl KeyValueStore {
    /// Opens the on-disk keyspace under `data_path/cache`. Failing to open it
    /// is not fatal: persistent collections are then reported as unavailable.
    pub fn new(data_path: Option<&Path>) -> Self {
        let keyspace = data_path
            .and_then(|path| {
                let cache_dir = path.join("cache");
                match fjall::Config::new(&cache_dir).open() {
                    Ok(keyspace) => Some(keyspace),
                    Err(e) => {
                        warn!("Could not open cache at {}: {}", cache_dir.display(), e);
                        None
                    }
                }
            })
            .map(Arc::new);

        Self {
            collections: RwLock::new(HashMap::new()),
            keyspace,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(None)
    }

    /// Persistent collection when possible, in-memory otherwise.
    pub fn collection_or_memory(&self, name: &str, persist: bool) -> Arc<dyn KeyValueCollection> {
        if persist && let Some(collection) = self.get_collection(name, true, true) {
            return collection;
        }
        self.get_collection(name, false, true)
            .unwrap_or_else(|| Arc::new(MemoryCollection::new()))
    }
}

impl Default for KeyValueStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl Store for KeyValueStore {
    fn get_collection(
        &self,
        name: &str,
        persist: bool,
        create_if_missing: bool,
    ) -> Option<Arc<dyn KeyValueCollection>> {
        let key = (name.to_string(), persist);
        if let Ok(collections) = self.collections.read()
            && let Some(collection) = collections.get(&key)
        {
            return Some(Arc::clone(collection));
        }
        if !create_if_missing {
            return None;
        }

        let new_collection: Arc<dyn KeyValueCollection> = if persist {
            let partition = self
                .keyspace
                .as_ref()?
                .open_partition(name, PartitionCreateOptions::default())
                .map_err(|e| debug!("Failed to open partition {}: {}", name, e))
                .ok()?;
            Arc::new(DiskCollection::new(partition))
        } else {
            Arc::new(MemoryCollection::new())
        };

        let mut collections = self.collections.write().ok()?;
        Some(Arc::clone(collections.entry(key).or_insert(new_collection)))
    }
}
