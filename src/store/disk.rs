use crate::core::cache::KeyValueCollection;
use anyhow::Result;
use async_trait::async_trait;
use fjall::PartitionHandle;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};
use tracing::debug;

#[derive(Serialize, Deserialize)]
struct CacheEntry {
    value: Vec<u8>,
    expires_at: Option<SystemTime>,
}

/// Collection persisted in a fjall partition so that slow-moving data
/// survives restarts of the dashboard.
pub struct DiskCollection {
    partition: PartitionHandle,
}

impl DiskCollection {
    pub fn new(partition: PartitionHandle) -> Self {
        Self { partition }
    }

    fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let Some(raw) = self.partition.get(key)? else {
            return Ok(None);
        };
        let entry: CacheEntry = serde_json::from_slice(&raw)?;
        if let Some(expires_at) = entry.expires_at
            && SystemTime::now() >= expires_at
        {
            debug!("Cache entry expired for key: {}", String::from_utf8_lossy(key));
            self.partition.remove(key)?;
            return Ok(None);
        }
        Ok(Some(entry.value))
    }
}

#[async_trait]
impl KeyValueCollection for DiskCollection {
    async fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        let key_str = String::from_utf8_lossy(key);
        match self.read(key) {
            Ok(Some(value)) => {
                debug!("Cache HIT for key: {}", key_str);
                Some(value)
            }
            Ok(None) => {
                debug!("Cache MISS for key: {}", key_str);
                None
            }
            Err(e) => {
                debug!("DiskCollection get error for key {}: {}", key_str, e);
                None
            }
        }
    }

    async fn put(&self, key: &[u8], value: &[u8], ttl: Option<Duration>) {
        let res: Result<()> = (|| {
            let entry = CacheEntry {
                value: value.to_vec(),
                expires_at: ttl.map(|d| SystemTime::now() + d),
            };
            self.partition.insert(key, serde_json::to_vec(&entry)?)?;
            Ok(())
        })();
        match res {
            Ok(()) => debug!("Cache PUT for key: {}", String::from_utf8_lossy(key)),
            Err(e) => debug!("DiskCollection put error: {}", e),
        }
    }
}
