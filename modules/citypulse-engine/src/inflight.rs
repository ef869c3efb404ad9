//! In-flight request coalescing: concurrent callers for the same cache key
//! share one pending future. The map stays per-process even when the value
//! cache moves to a shared store.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use futures::future::{BoxFuture, FutureExt, Shared};

type SharedFuture<V> = Shared<BoxFuture<'static, V>>;

pub struct InflightMap<V: Clone> {
    map: Mutex<HashMap<String, SharedFuture<V>>>,
}

impl<V: Clone + Send + Sync + 'static> InflightMap<V> {
    pub fn new() -> Self {
        Self {
            map: Mutex::new(HashMap::new()),
        }
    }

    /// Join the pending future for `key`, or install a new one built from
    /// `make`. Returns the shared future and whether this caller is the
    /// leader (and therefore responsible for [`Self::finish`]).
    pub fn join_or_create<F>(
        &self,
        key: &str,
        make: impl FnOnce() -> F,
    ) -> (SharedFuture<V>, bool)
    where
        F: Future<Output = V> + Send + 'static,
    {
        let mut map = self.map.lock().expect("inflight lock");
        if let Some(pending) = map.get(key) {
            return (pending.clone(), false);
        }
        let shared = make().boxed().shared();
        map.insert(key.to_string(), shared.clone());
        (shared, true)
    }

    /// Remove a completed key. Leader-only; late joiners already hold the
    /// shared handle.
    pub fn finish(&self, key: &str) {
        self.map.lock().expect("inflight lock").remove(key);
    }

    pub fn pending(&self) -> usize {
        self.map.lock().expect("inflight lock").len()
    }
}

impl<V: Clone + Send + Sync + 'static> Default for InflightMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn concurrent_callers_share_one_execution() {
        let inflight: Arc<InflightMap<u32>> = Arc::new(InflightMap::new());
        let executions = Arc::new(AtomicU32::new(0));

        let make = |executions: Arc<AtomicU32>| async move {
            executions.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            42u32
        };

        let (first, first_leader) =
            inflight.join_or_create("k", || make(executions.clone()));
        let (second, second_leader) =
            inflight.join_or_create("k", || make(executions.clone()));
        assert!(first_leader);
        assert!(!second_leader);
        assert_eq!(inflight.pending(), 1);

        let (a, b) = tokio::join!(first, second);
        assert_eq!(a, 42);
        assert_eq!(b, 42);
        assert_eq!(executions.load(Ordering::SeqCst), 1);

        inflight.finish("k");
        assert_eq!(inflight.pending(), 0);
    }

    #[tokio::test]
    async fn distinct_keys_run_independently() {
        let inflight: InflightMap<u32> = InflightMap::new();
        let (_, a_leader) = inflight.join_or_create("a", || async { 1 });
        let (_, b_leader) = inflight.join_or_create("b", || async { 2 });
        assert!(a_leader && b_leader);
        assert_eq!(inflight.pending(), 2);
    }
}
