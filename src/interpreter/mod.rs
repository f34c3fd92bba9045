// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Types shared between the state manager and a tipset executor: the
//! execution options it receives and the per-message callbacks it emits.

use std::time::Duration;

use crate::blocks::Tipset;
use cid::Cid;
use fvm_shared4::econ::TokenAmount;
use fvm_shared4::message::Message;
use fvm_shared4::receipt::Receipt;
use serde::{Deserialize, Serialize};

/// Whether the VM should record execution traces while applying messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VMTrace {
    /// Collect trace for the given operation
    Traced,
    /// Do not collect trace
    #[default]
    NotTraced,
}

impl VMTrace {
    /// Should tracing be collected?
    pub fn is_traced(&self) -> bool {
        matches!(self, VMTrace::Traced)
    }
}

/// Where in tipset execution a message was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalledAt {
    Applied,
    Reward,
    Cron,
}

impl CalledAt {
    /// Implicit messages are the reward and cron messages the system injects.
    pub fn apply_kind(&self) -> ApplyKind {
        match self {
            CalledAt::Applied => ApplyKind::Explicit,
            CalledAt::Reward | CalledAt::Cron => ApplyKind::Implicit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyKind {
    Explicit,
    Implicit,
}

/// Outcome of applying a single message.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyRet {
    pub msg_receipt: Receipt,
    pub penalty: TokenAmount,
    pub miner_tip: TokenAmount,
    pub base_fee_burn: TokenAmount,
    pub over_estimation_burn: TokenAmount,
    pub refund: TokenAmount,
    /// Human readable failure description, if the message failed.
    pub failure_info: Option<String>,
}

/// Everything a monitor learns about one applied message.
pub struct MessageCallbackCtx<'a> {
    pub tipset: &'a Tipset,
    pub cid: Cid,
    pub message: &'a Message,
    pub apply_ret: &'a ApplyRet,
    pub at: CalledAt,
    pub duration: Duration,
}

/// Observer invoked by the executor after each message is applied.
///
/// Returning an error aborts the execution of the tipset.
pub trait ExecMonitor: Send + Sync {
    fn message_applied(&self, ctx: MessageCallbackCtx<'_>) -> anyhow::Result<()>;
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MessageGasCost {
    pub message: Option<Cid>,
    pub gas_used: TokenAmount,
    pub base_fee_burn: TokenAmount,
    pub over_estimation_burn: TokenAmount,
    pub miner_penalty: TokenAmount,
    pub miner_tip: TokenAmount,
    pub refund: TokenAmount,
    pub total_cost: TokenAmount,
}

impl MessageGasCost {
    pub fn new(message_cid: Cid, msg: &Message, ret: &ApplyRet) -> Self {
        let required_funds =
            TokenAmount::from_atto(msg.gas_fee_cap.atto() * msg.gas_limit) + &msg.value;
        Self {
            message: Some(message_cid),
            gas_used: TokenAmount::from_atto(ret.msg_receipt.gas_used),
            base_fee_burn: ret.base_fee_burn.clone(),
            over_estimation_burn: ret.over_estimation_burn.clone(),
            miner_penalty: ret.penalty.clone(),
            miner_tip: ret.miner_tip.clone(),
            refund: ret.refund.clone(),
            total_cost: required_funds - &ret.refund,
        }
    }

    pub fn from_implicit(message_cid: Cid, msg: &Message, ret: &ApplyRet) -> Self {
        Self {
            message: None,
            gas_used: TokenAmount::default(),
            ..Self::new(message_cid, msg, ret)
        }
    }
}
