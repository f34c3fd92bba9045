// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use fvm_shared4::message::Message;
use fvm_shared4::receipt::Receipt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::interpreter::{ApplyKind, ExecMonitor, MessageCallbackCtx, MessageGasCost};

/// Outcome of one message applied during a traced tipset execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiInvocResult {
    pub msg_cid: Cid,
    pub msg: Message,
    pub msg_rct: Option<Receipt>,
    pub error: String,
    /// Wall-clock time spent applying the message, in nanoseconds.
    pub duration: u64,
    pub gas_cost: MessageGasCost,
    /// Reward and cron messages injected by the system.
    pub implicit: bool,
}

impl PartialEq for ApiInvocResult {
    /// Ignore [`Self::duration`] as it is implementation-dependent
    fn eq(&self, other: &Self) -> bool {
        self.msg == other.msg
            && self.msg_cid == other.msg_cid
            && self.msg_rct == other.msg_rct
            && self.error == other.error
            && self.gas_cost == other.gas_cost
            && self.implicit == other.implicit
    }
}

/// [`ExecMonitor`] collecting an [`ApiInvocResult`] per applied message.
#[derive(Debug, Default)]
pub struct InvocationTracer {
    trace: Mutex<Vec<ApiInvocResult>>,
}

impl InvocationTracer {
    /// Takes the results collected so far, leaving the tracer empty.
    pub fn take_trace(&self) -> Vec<ApiInvocResult> {
        std::mem::take(&mut *self.trace.lock())
    }
}

impl ExecMonitor for InvocationTracer {
    fn message_applied(&self, ctx: MessageCallbackCtx<'_>) -> anyhow::Result<()> {
        let implicit = ctx.at.apply_kind() == ApplyKind::Implicit;
        let gas_cost = if implicit {
            MessageGasCost::from_implicit(ctx.cid, ctx.message, ctx.apply_ret)
        } else {
            MessageGasCost::new(ctx.cid, ctx.message, ctx.apply_ret)
        };
        self.trace.lock().push(ApiInvocResult {
            msg_cid: ctx.cid,
            msg: ctx.message.clone(),
            msg_rct: Some(ctx.apply_ret.msg_receipt.clone()),
            error: ctx.apply_ret.failure_info.clone().unwrap_or_default(),
            duration: u64::try_from(ctx.duration.as_nanos()).unwrap_or(u64::MAX),
            gas_cost,
            implicit,
        });
        Ok(())
    }
}
