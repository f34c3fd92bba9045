// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

use anyhow::Context as _;
use async_trait::async_trait;
use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::DAG_CBOR;
use fvm_shared4::address::Address;
use fvm_shared4::econ::TokenAmount;
use fvm_shared4::error::ExitCode;
use fvm_shared4::message::Message;
use fvm_shared4::receipt::Receipt;
use multihash_codetable::{Code, MultihashDigest as _};
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::blocks::Tipset;
use crate::db::MemoryDB;
use crate::interpreter::{ApplyRet, CalledAt, MessageCallbackCtx, VMTrace};
use crate::message::MessageExt as _;
use crate::state_manager::{CidPair, ExecutorOpts, StateManager, TipsetExecutor};

pub fn create_dummy_cid(i: u64) -> Cid {
    let bytes = i.to_le_bytes().to_vec();
    Cid::new_v1(DAG_CBOR, Code::Blake2b256.digest(&bytes))
}

pub fn dummy_message(sequence: u64) -> Message {
    Message {
        version: 0,
        from: Address::new_id(100),
        to: Address::new_id(101),
        sequence,
        value: TokenAmount::from_atto(1),
        method_num: 0,
        params: Default::default(),
        gas_limit: 10_000,
        gas_fee_cap: TokenAmount::from_atto(1),
        gas_premium: TokenAmount::from_atto(1),
    }
}

pub fn dummy_apply_ret() -> ApplyRet {
    ApplyRet {
        msg_receipt: Receipt {
            exit_code: ExitCode::OK,
            return_data: Default::default(),
            gas_used: 1_000,
            events_root: None,
        },
        penalty: TokenAmount::default(),
        miner_tip: TokenAmount::from_atto(10),
        base_fee_burn: TokenAmount::from_atto(1_000),
        over_estimation_burn: TokenAmount::default(),
        refund: TokenAmount::from_atto(9_000),
        failure_info: None,
    }
}

/// In-memory blockstore whose `has` lookups can be made to fail.
#[derive(Debug, Default)]
pub struct FlakyBlockstore {
    inner: MemoryDB,
    fail_has: AtomicBool,
}

impl FlakyBlockstore {
    pub fn set_fail_has(&self, fail: bool) {
        self.fail_has.store(fail, Ordering::SeqCst);
    }
}

impl Blockstore for FlakyBlockstore {
    fn get(&self, k: &Cid) -> anyhow::Result<Option<Vec<u8>>> {
        self.inner.get(k)
    }

    fn put_keyed(&self, k: &Cid, block: &[u8]) -> anyhow::Result<()> {
        self.inner.put_keyed(k, block)
    }

    fn has(&self, k: &Cid) -> anyhow::Result<bool> {
        if self.fail_has.load(Ordering::SeqCst) {
            anyhow::bail!("blockstore unavailable");
        }
        self.inner.has(k)
    }
}

/// Roots the [`MockExecutor`] produces for `tipset`.
pub fn executed_roots(tipset: &Tipset) -> CidPair {
    let key = tipset.key().to_string();
    (
        Cid::new_v1(DAG_CBOR, Code::Blake2b256.digest(format!("state:{key}").as_bytes())),
        Cid::new_v1(DAG_CBOR, Code::Blake2b256.digest(format!("receipts:{key}").as_bytes())),
    )
}

/// Deterministic stand-in for the VM. Applies two messages per tipset, one
/// explicit and one cron, reporting both to the execution monitor.
#[derive(Debug, Default)]
pub struct MockExecutor {
    calls: AtomicUsize,
    failures: AtomicUsize,
    seen: Mutex<Vec<(bool, VMTrace)>>,
    gate: Option<Arc<Semaphore>>,
}

impl MockExecutor {
    /// Every execution blocks until a permit is added to the returned
    /// semaphore.
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let executor = Self {
            gate: Some(gate.clone()),
            ..Default::default()
        };
        (executor, gate)
    }

    /// Makes the next `n` executions fail.
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `(discard_state, vm_tracing)` of every execution, in call order.
    pub fn seen_opts(&self) -> Vec<(bool, VMTrace)> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl<DB> TipsetExecutor<DB> for MockExecutor
where
    DB: Blockstore + Send + Sync + 'static,
{
    async fn execute_tipset(
        &self,
        sm: &Arc<StateManager<DB>>,
        tipset: &Arc<Tipset>,
        opts: ExecutorOpts,
    ) -> anyhow::Result<CidPair> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push((opts.discard_state, opts.vm_tracing));

        if let Some(gate) = &self.gate {
            gate.acquire().await?.forget();
        }
        let should_fail = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            anyhow::bail!("execution of tipset {} failed", tipset.key());
        }

        if let Some(monitor) = &opts.exec_monitor {
            let apply_ret = dummy_apply_ret();
            for (seq, at) in [(0, CalledAt::Applied), (1, CalledAt::Cron)] {
                let message = dummy_message(seq);
                let started = Instant::now();
                monitor
                    .message_applied(MessageCallbackCtx {
                        tipset,
                        cid: message.cid()?,
                        message: &message,
                        apply_ret: &apply_ret,
                        at,
                        duration: started.elapsed(),
                    })
                    .context("execution monitor failed")?;
            }
        }

        let (state_root, receipt_root) = executed_roots(tipset);
        if !opts.discard_state {
            let cs = sm.chain_store();
            cs.state_blockstore().put_keyed(&state_root, b"state")?;
            cs.chain_blockstore().put_keyed(&receipt_root, b"receipts")?;
        }
        Ok((state_root, receipt_root))
    }
}
