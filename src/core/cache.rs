//! Key-value caching abstractions shared by the market data and overrides layers

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// A named collection of byte keys and values with optional per-entry expiry.
///
/// Expired entries behave as missing on read; callers refetch and `put` again.
#[async_trait]
pub trait KeyValueCollection: Send + Sync {
    async fn get(&self, key: &[u8]) -> Option<Vec<u8>>;
    async fn put(&self, key: &[u8], value: &[u8], ttl: Option<Duration>);
}

pub trait Store: Send + Sync {
    /// Returns the collection called `name`, creating it when asked to.
    /// `persist` selects the on-disk backend; `None` means it is unavailable.
    fn get_collection(
        &self,
        name: &str,
        persist: bool,
        create_if_missing: bool,
    ) -> Option<Arc<dyn KeyValueCollection>>;
}
