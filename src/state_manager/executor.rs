// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::{CidPair, StateManager};
use crate::blocks::Tipset;
use crate::interpreter::{ExecMonitor, VMTrace};

/// Options handed to a [`TipsetExecutor`] for a single tipset execution.
#[derive(Clone, Default)]
pub struct ExecutorOpts {
    /// Invoked after each message is applied.
    pub exec_monitor: Option<Arc<dyn ExecMonitor>>,
    /// Record VM execution traces, required by monitors that inspect them.
    pub vm_tracing: VMTrace,
    /// Do not persist the resulting state. The returned roots may then point
    /// at data that is not in the state blockstore.
    pub discard_state: bool,
}

impl fmt::Debug for ExecutorOpts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorOpts")
            .field("exec_monitor", &self.exec_monitor.is_some())
            .field("vm_tracing", &self.vm_tracing)
            .field("discard_state", &self.discard_state)
            .finish()
    }
}

/// The chain's state-transition function.
///
/// Implementations apply every message of `tipset` on top of its parent
/// state and return `(state root, receipts root)`. They must be deterministic
/// for a given tipset and prior chain state.
#[async_trait]
pub trait TipsetExecutor<DB>: Send + Sync {
    async fn execute_tipset(
        &self,
        sm: &Arc<StateManager<DB>>,
        tipset: &Arc<Tipset>,
        opts: ExecutorOpts,
    ) -> anyhow::Result<CidPair>;
}
