// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::future::Future;
use std::num::NonZeroUsize;

use ahash::{HashMap, HashMapExt as _};
use hashlink::LruCache;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::trace;

use crate::blocks::TipsetKey;
use crate::metrics;

/// Close-once signal registered while a computation is in flight. Waiters
/// subscribe to it and are released when the owner drops the sender.
type WaitGate = watch::Receiver<()>;

struct TipsetStateCacheInner<V> {
    values: LruCache<TipsetKey, V>,
    pending: HashMap<TipsetKey, WaitGate>,
}

impl<V> TipsetStateCacheInner<V> {
    fn with_size(cache_size: Option<NonZeroUsize>) -> Self {
        Self {
            values: match cache_size {
                Some(size) => LruCache::new(size.get()),
                None => LruCache::new_unbounded(),
            },
            pending: HashMap::with_capacity(8),
        }
    }
}

enum Status<V> {
    Done(V),
    Pending(WaitGate),
    Owner(watch::Sender<()>),
}

/// Memoizes tipset computations and runs at most one computation per
/// [`TipsetKey`] at a time.
pub(in crate::state_manager) struct TipsetStateCache<V> {
    cache: Mutex<TipsetStateCacheInner<V>>,
}

impl<V: Clone> TipsetStateCache<V> {
    pub fn with_size(cache_size: Option<NonZeroUsize>) -> Self {
        Self {
            cache: Mutex::new(TipsetStateCacheInner::with_size(cache_size)),
        }
    }

    fn with_inner<F, T>(&self, func: F) -> T
    where
        F: FnOnce(&mut TipsetStateCacheInner<V>) -> T,
    {
        let mut lock = self.cache.lock();
        func(&mut lock)
    }

    /// Returns the cached value for `key`, or computes it with `compute`.
    ///
    /// Concurrent callers for a key that is being computed wait for the owner
    /// to finish, then read the cache. Failures are not cached: when the
    /// owner fails, the waiters race to become the next owner.
    pub async fn get_or_else<F, Fut>(&self, key: &TipsetKey, compute: F) -> anyhow::Result<V>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = anyhow::Result<V>>,
    {
        loop {
            let status = self.with_inner(|inner| {
                if let Some(v) = inner.values.get(key) {
                    return Status::Done(v.clone());
                }
                if let Some(gate) = inner.pending.get(key) {
                    return Status::Pending(gate.clone());
                }
                let (tx, rx) = watch::channel(());
                inner.pending.insert(key.clone(), rx);
                Status::Owner(tx)
            });

            match status {
                Status::Done(v) => {
                    metrics::LRU_CACHE_HIT
                        .get_or_create(&metrics::values::STATE_MANAGER_TIPSET)
                        .inc();
                    return Ok(v);
                }
                Status::Pending(mut gate) => {
                    metrics::PENDING_COMPUTATION_WAIT
                        .get_or_create(&metrics::values::STATE_MANAGER_TIPSET)
                        .inc();
                    trace!("waiting for in-flight computation of {key}");
                    // The owner never sends, it only drops the sender, so
                    // this resolves with an error once the gate closes.
                    let _ = gate.changed().await;
                }
                Status::Owner(gate) => {
                    metrics::LRU_CACHE_MISS
                        .get_or_create(&metrics::values::STATE_MANAGER_TIPSET)
                        .inc();
                    let guard = PendingGuard {
                        cache: self,
                        key,
                        gate: Some(gate),
                        completed: false,
                    };
                    let value = compute().await?;
                    guard.complete(value.clone());
                    return Ok(value);
                }
            }
        }
    }

    pub fn get(&self, key: &TipsetKey) -> Option<V> {
        self.with_inner(|inner| inner.values.get(key).cloned())
    }

    pub fn is_pending(&self, key: &TipsetKey) -> bool {
        self.with_inner(|inner| inner.pending.contains_key(key))
    }

    pub fn len(&self) -> usize {
        self.with_inner(|inner| inner.values.len())
    }
}

/// Owner's handle on an in-flight computation. Dropping it, whether after
/// [`PendingGuard::complete`], an error, a panic or the owner's future being
/// cancelled, unregisters the computation and releases every waiter.
struct PendingGuard<'a, V: Clone> {
    cache: &'a TipsetStateCache<V>,
    key: &'a TipsetKey,
    gate: Option<watch::Sender<()>>,
    /// Set once the marker is unregistered. A later owner may have registered
    /// a new marker under the same key by the time the guard drops.
    completed: bool,
}

impl<V: Clone> PendingGuard<'_, V> {
    fn complete(mut self, value: V) {
        self.store(value);
    }

    /// Unregisters the computation and caches its value. Waiters are released
    /// when the guard drops.
    fn store(&mut self, value: V) {
        self.cache.with_inner(|inner| {
            inner.pending.remove(self.key);
            // The first value written for a key is authoritative.
            if !inner.values.contains_key(self.key) {
                inner.values.insert(self.key.clone(), value);
            }
        });
        self.completed = true;
    }
}

impl<V: Clone> Drop for PendingGuard<'_, V> {
    fn drop(&mut self) {
        if !self.completed {
            self.cache.with_inner(|inner| {
                inner.pending.remove(self.key);
            });
        }
        // Closing the gate outside the lock wakes the waiters.
        drop(self.gate.take());
    }
}
