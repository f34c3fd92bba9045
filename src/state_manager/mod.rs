// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod cache;
mod executor;
mod trace;

pub use self::executor::{ExecutorOpts, TipsetExecutor};
pub use self::trace::{ApiInvocResult, InvocationTracer};

use std::num::NonZeroUsize;
use std::sync::Arc;

use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use nonzero_ext::nonzero;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, trace};

use self::cache::TipsetStateCache;
use crate::blocks::{Tipset, TipsetKey};
use crate::chain::{ChainStore, index::ResolveNullTipset};
use crate::interpreter::{ExecMonitor, VMTrace};
use crate::metrics::{self, HistogramTimerExt as _};

const DEFAULT_TIPSET_CACHE_SIZE: NonZeroUsize = nonzero!(1024usize);

/// `(state root, receipts root)` of an executed tipset.
pub type CidPair = (Cid, Cid);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateOutputValue {
    pub state_root: Cid,
    pub receipt_root: Cid,
}

impl From<CidPair> for StateOutputValue {
    fn from((state_root, receipt_root): CidPair) -> Self {
        Self {
            state_root,
            receipt_root,
        }
    }
}

impl From<StateOutputValue> for CidPair {
    fn from(value: StateOutputValue) -> Self {
        (value.state_root, value.receipt_root)
    }
}

/// Options for [`StateManager::tipset_state_with_opts`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TipsetStateOpts {
    /// Ask the executor not to persist the state it computes.
    pub discard_state: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateManagerConfig {
    /// Number of computed tipset states kept in memory. Unbounded when unset.
    pub tipset_state_cache_size: Option<NonZeroUsize>,
}

impl Default for StateManagerConfig {
    fn default() -> Self {
        Self {
            tipset_state_cache_size: Some(DEFAULT_TIPSET_CACHE_SIZE),
        }
    }
}

/// State manager computes the state produced by executing tipsets. Results
/// are cached by [`TipsetKey`] and concurrent requests for the same tipset
/// share a single execution. Tipsets already built upon by the heaviest chain
/// are answered from chain storage without running the executor.
pub struct StateManager<DB> {
    cs: Arc<ChainStore<DB>>,

    /// This is a cache which indexes tipsets to their calculated state.
    cache: TipsetStateCache<StateOutputValue>,
    executor: Arc<dyn TipsetExecutor<DB>>,
    /// Monitor attached to executions that fill the cache.
    exec_monitor: Option<Arc<dyn ExecMonitor>>,
    config: StateManagerConfig,
}

impl<DB> StateManager<DB>
where
    DB: Blockstore,
{
    pub fn new(
        cs: Arc<ChainStore<DB>>,
        executor: Arc<dyn TipsetExecutor<DB>>,
    ) -> anyhow::Result<Self> {
        Self::with_config(cs, executor, StateManagerConfig::default())
    }

    pub fn with_config(
        cs: Arc<ChainStore<DB>>,
        executor: Arc<dyn TipsetExecutor<DB>>,
        config: StateManagerConfig,
    ) -> anyhow::Result<Self> {
        debug!(
            "tipset state cache size: {}",
            config
                .tipset_state_cache_size
                .map_or_else(|| "unbounded".into(), |size| size.to_string())
        );
        Ok(Self {
            cs,
            cache: TipsetStateCache::with_size(config.tipset_state_cache_size),
            executor,
            exec_monitor: None,
            config,
        })
    }

    /// Installs a monitor that observes every execution whose result lands in
    /// the tipset state cache.
    pub fn with_exec_monitor(mut self, monitor: Arc<dyn ExecMonitor>) -> Self {
        self.exec_monitor = Some(monitor);
        self
    }

    /// Returns the internal, protocol-level network chain from the state.
    pub fn chain_store(&self) -> &Arc<ChainStore<DB>> {
        &self.cs
    }

    /// Gets 'Blockstore' from the state manager's chain store.
    pub fn blockstore(&self) -> &DB {
        self.cs.blockstore()
    }

    pub fn config(&self) -> &StateManagerConfig {
        &self.config
    }

    /// Returns the cached state of a tipset without computing it.
    pub fn cached_tipset_state(&self, key: &TipsetKey) -> Option<CidPair> {
        self.cache.get(key).map(Into::into)
    }

    /// Tries to read the output of executing `tipset` from the chain: a child
    /// of `tipset` on the heaviest chain records it as its parent state. The
    /// roots are only returned if both are present locally. Storage errors
    /// are logged and treated as a miss.
    pub fn try_lookup_state_from_next_tipset(&self, tipset: &Tipset) -> Option<StateOutputValue> {
        let next_ts = match self.cs.tipset_by_height(
            tipset.epoch() + 1,
            None,
            ResolveNullTipset::TakeNewer,
        ) {
            Ok(ts) => ts,
            Err(e) => {
                trace!("no tipset above epoch {} on the heaviest chain: {e}", tipset.epoch());
                return None;
            }
        };
        if next_ts.parents() != tipset.key() {
            trace!(
                "tipset at epoch {} does not build on {}",
                next_ts.epoch(),
                tipset.key()
            );
            return None;
        }

        let state_root = *next_ts.parent_state();
        let receipt_root = *next_ts.parent_message_receipts();

        match self.cs.state_blockstore().has(&state_root) {
            Ok(true) => {}
            Ok(false) => {
                trace!("state root {state_root} is not in the state blockstore");
                return None;
            }
            Err(e) => {
                error!("failed to look up state root {state_root}: {e}");
                return None;
            }
        }
        match self.cs.chain_blockstore().has(&receipt_root) {
            Ok(true) => {}
            Ok(false) => {
                trace!("receipt root {receipt_root} is not in the chain blockstore");
                return None;
            }
            Err(e) => {
                error!("failed to look up receipt root {receipt_root}: {e}");
                return None;
            }
        }

        Some(StateOutputValue {
            state_root,
            receipt_root,
        })
    }
}

impl<DB> StateManager<DB>
where
    DB: Blockstore + Send + Sync + 'static,
{
    /// Returns the pair of (state root, message receipt root) produced by
    /// executing `tipset`. This will either be cached or will be calculated
    /// and fill the cache. Tipset state for a given tipset is guaranteed not
    /// to be computed twice concurrently.
    pub async fn tipset_state(self: &Arc<Self>, tipset: &Arc<Tipset>) -> anyhow::Result<CidPair> {
        self.tipset_state_with_opts(tipset, TipsetStateOpts::default())
            .await
    }

    #[instrument(skip_all, fields(epoch = tipset.epoch()))]
    pub async fn tipset_state_with_opts(
        self: &Arc<Self>,
        tipset: &Arc<Tipset>,
        opts: TipsetStateOpts,
    ) -> anyhow::Result<CidPair> {
        let key = tipset.key();
        self.cache
            .get_or_else(key, || async move {
                if let Some(output) = self.try_lookup_state_from_next_tipset(tipset) {
                    trace!("found state of {} on chain, skipping execution", tipset.key());
                    return Ok(output);
                }

                info!(
                    "Evaluating tipset: EPOCH = {}, blocks = {}",
                    tipset.epoch(),
                    tipset.len(),
                );
                let ts_state: StateOutputValue = self
                    .compute_tipset_state(
                        tipset,
                        ExecutorOpts {
                            exec_monitor: self.exec_monitor.clone(),
                            vm_tracing: VMTrace::NotTraced,
                            discard_state: opts.discard_state,
                        },
                    )
                    .await?
                    .into();
                trace!("Completed tipset state calculation {:?}", tipset.cids());
                Ok(ts_state)
            })
            .await
            .map(Into::into)
    }

    /// Executes `tipset` and returns its roots. Bypasses the tipset state
    /// cache.
    #[instrument(skip_all)]
    pub async fn compute_tipset_state(
        self: &Arc<Self>,
        tipset: &Arc<Tipset>,
        opts: ExecutorOpts,
    ) -> anyhow::Result<CidPair> {
        let _timer = metrics::TIPSET_EXECUTION_TIME.start_timer();
        self.executor.execute_tipset(self, tipset, opts).await
    }

    /// Re-executes `tipset` with tracing enabled, reporting every applied
    /// message to `monitor`. The resulting state is discarded and never
    /// cached. Returns the state root.
    #[instrument(skip_all, fields(epoch = tipset.epoch()))]
    pub async fn execution_trace_with_monitor(
        self: &Arc<Self>,
        tipset: &Arc<Tipset>,
        monitor: Arc<dyn ExecMonitor>,
    ) -> anyhow::Result<Cid> {
        let (state_root, _) = self
            .compute_tipset_state(
                tipset,
                ExecutorOpts {
                    exec_monitor: Some(monitor),
                    vm_tracing: VMTrace::Traced,
                    discard_state: true,
                },
            )
            .await?;
        Ok(state_root)
    }

    /// Re-executes `tipset` and returns its state root together with the
    /// invocation results of every applied message.
    pub async fn execution_trace(
        self: &Arc<Self>,
        tipset: &Arc<Tipset>,
    ) -> anyhow::Result<(Cid, Vec<ApiInvocResult>)> {
        let tracer = Arc::new(InvocationTracer::default());
        let state_root = self
            .execution_trace_with_monitor(tipset, tracer.clone())
            .await?;
        Ok((state_root, tracer.take_trace()))
    }
}
