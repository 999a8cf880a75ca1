//! Per-weapon memo of compatibility maps.
//!
//! Building a map walks a weapon's whole slot tree, so each weapon id is built
//! once and the result shared. Concurrent requests for the same id wait on the
//! one build in flight.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

use crate::domain::entities::ItemId;
use crate::domain::lookup::{Catalog, CompatibilityMap};

/// Produces the set of items reachable from a weapon's slots.
pub trait CompatibilityBuilder: Send + Sync {
    fn build(&self, weapon_id: &str, catalog: &Catalog) -> CompatibilityMap;
}

type Slot = Arc<OnceCell<Arc<CompatibilityMap>>>;

#[derive(Default)]
pub struct CompatCache {
    entries: Mutex<HashMap<ItemId, Slot>>,
}

impl CompatCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_build<B>(
        &self,
        weapon_id: &str,
        builder: &B,
        catalog: &Catalog,
    ) -> Arc<CompatibilityMap>
    where
        B: CompatibilityBuilder + ?Sized,
    {
        // The map lock is only held long enough to find the slot.
        let slot = {
            let mut entries = self.entries.lock().await;
            entries.entry(weapon_id.to_string()).or_default().clone()
        };
        slot.get_or_init(|| async {
            let map = builder.build(weapon_id, catalog);
            debug!(
                weapon_id,
                reachable = map.reachable_items.len(),
                "built compatibility map"
            );
            Arc::new(map)
        })
        .await
        .clone()
    }

    /// Number of weapons with a finished map.
    pub async fn len(&self) -> usize {
        self.entries
            .lock()
            .await
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drops every memoized map, e.g. after the catalog was reloaded.
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[derive(Default)]
    struct CountingBuilder {
        calls: AtomicUsize,
    }

    impl CompatibilityBuilder for CountingBuilder {
        fn build(&self, weapon_id: &str, _catalog: &Catalog) -> CompatibilityMap {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            CompatibilityMap {
                reachable_items: [format!("{weapon_id}-stock")].into_iter().collect(),
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_build_once() {
        let cache = Arc::new(CompatCache::new());
        let builder = Arc::new(CountingBuilder::default());
        let catalog = Arc::new(Catalog::default());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let builder = Arc::clone(&builder);
                let catalog = Arc::clone(&catalog);
                tokio::spawn(async move {
                    cache
                        .get_or_build("m4", builder.as_ref(), catalog.as_ref())
                        .await
                })
            })
            .collect();

        let mut maps = Vec::new();
        for handle in handles {
            maps.push(handle.await.unwrap());
        }

        assert_eq!(builder.calls.load(Ordering::SeqCst), 1);
        assert!(maps.iter().all(|map| Arc::ptr_eq(map, &maps[0])));
        assert!(maps[0].reachable_items.contains("m4-stock"));
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let cache = CompatCache::new();
        let builder = CountingBuilder::default();
        let catalog = Catalog::default();

        cache.get_or_build("m4", &builder, &catalog).await;
        cache.get_or_build("mp5", &builder, &catalog).await;
        cache.get_or_build("m4", &builder, &catalog).await;
        assert_eq!(builder.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len().await, 2);

        cache.clear().await;
        assert!(cache.is_empty().await);
        cache.get_or_build("m4", &builder, &catalog).await;
        assert_eq!(builder.calls.load(Ordering::SeqCst), 3);
    }
}
