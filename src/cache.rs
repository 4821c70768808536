use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use crate::identifier::{ContentStreamId, NodeAggregateId};
use crate::projection::NodeAggregateSnapshot;

const KEY_SEPARATOR: &str = "\u{1F}";

/// LRU cache of projected aggregate snapshots, keyed by stream and aggregate.
/// Strictly derived data: an entry is dropped whenever its stream changes.
pub struct AggregateCache {
    inner: Mutex<LruCache<String, NodeAggregateSnapshot>>,
}

impl AggregateCache {
    /// Returns `None` for a zero capacity (caching disabled).
    pub fn new(capacity: usize) -> Option<Self> {
        NonZeroUsize::new(capacity).map(|size| Self {
            inner: Mutex::new(LruCache::new(size)),
        })
    }

    pub fn get(
        &self,
        stream: &ContentStreamId,
        aggregate: &NodeAggregateId,
    ) -> Option<NodeAggregateSnapshot> {
        let key = make_key(stream, aggregate);
        let mut guard = self.inner.lock();
        guard.get(&key).cloned()
    }

    pub fn put(&self, stream: &ContentStreamId, snapshot: NodeAggregateSnapshot) {
        let key = make_key(stream, &snapshot.node_aggregate_id);
        let mut guard = self.inner.lock();
        guard.put(key, snapshot);
    }

    pub fn invalidate_stream(&self, stream: &ContentStreamId) {
        let prefix = format!("{}{}", stream.as_str(), KEY_SEPARATOR);
        let mut guard = self.inner.lock();
        let stale: Vec<String> = guard
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            guard.pop(&key);
        }
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

fn make_key(stream: &ContentStreamId, aggregate: &NodeAggregateId) -> String {
    format!(
        "{}{}{}",
        stream.as_str(),
        KEY_SEPARATOR,
        aggregate.as_str()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn snapshot(aggregate: &str) -> NodeAggregateSnapshot {
        NodeAggregateSnapshot {
            node_aggregate_id: NodeAggregateId::new(aggregate).unwrap(),
            variants: BTreeMap::new(),
        }
    }

    #[test]
    fn zero_capacity_disables_caching() {
        assert!(AggregateCache::new(0).is_none());
    }

    #[test]
    fn caches_per_stream_and_aggregate() {
        let cache = AggregateCache::new(8).unwrap();
        let live = ContentStreamId::new("live").unwrap();
        let draft = ContentStreamId::new("user-1").unwrap();
        let n1 = NodeAggregateId::new("n1").unwrap();

        cache.put(&live, snapshot("n1"));
        assert!(cache.get(&live, &n1).is_some());
        assert!(cache.get(&draft, &n1).is_none());
    }

    #[test]
    fn invalidation_only_touches_the_stream() {
        let cache = AggregateCache::new(8).unwrap();
        let live = ContentStreamId::new("live").unwrap();
        let draft = ContentStreamId::new("user-1").unwrap();
        let n1 = NodeAggregateId::new("n1").unwrap();

        cache.put(&live, snapshot("n1"));
        cache.put(&draft, snapshot("n1"));
        cache.invalidate_stream(&live);

        assert!(cache.get(&live, &n1).is_none());
        assert!(cache.get(&draft, &n1).is_some());
    }
}
