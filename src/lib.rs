// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Tipset state computation for Filecoin nodes.
//!
//! The [`StateManager`] turns a [`Tipset`] into the pair of
//! `(state root, receipts root)` produced by executing it. Results are cached
//! by [`TipsetKey`], concurrent requests for the same tipset share a single
//! execution, and tipsets whose successor is already on the heaviest chain are
//! answered straight from chain storage.

pub mod blocks;
pub mod chain;
pub mod cli_shared;
pub mod db;
pub mod interpreter;
pub mod message;
pub mod metrics;
pub mod state_manager;
#[cfg(test)]
mod test_utils;
pub mod utils;

pub use blocks::{CachingBlockHeader, RawBlockHeader, Tipset, TipsetKey};
pub use chain::{ChainStore, index::ResolveNullTipset};
pub use cli_shared::cli::Config;
pub use db::MemoryDB;
pub use interpreter::{ApplyRet, CalledAt, ExecMonitor, MessageCallbackCtx, VMTrace};
pub use state_manager::{
    ApiInvocResult, ExecutorOpts, InvocationTracer, StateManager, StateManagerConfig,
    TipsetExecutor, TipsetStateOpts,
};
