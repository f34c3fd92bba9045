// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::sync::Arc;

use crate::blocks::{CachingBlockHeader, Tipset, TipsetKey};
use fvm_ipld_blockstore::Blockstore;
use fvm_shared4::clock::ChainEpoch;
use parking_lot::RwLock;
use tracing::debug;

use super::{
    Error,
    index::{ChainIndex, ResolveNullTipset},
};

/// Stores chain data such as the heaviest tipset and gives access to the two
/// content-addressed stores the state manager reads from: the chain
/// blockstore (headers, messages, receipts) and the state blockstore (actor
/// state trees). This structure is thread-safe and can be shared across
/// tasks.
pub struct ChainStore<DB> {
    /// Chain `datastore`.
    pub db: Arc<DB>,

    /// State tree `datastore`.
    state_db: Arc<DB>,

    /// Used as a cache for tipset `lookbacks`.
    pub chain_index: Arc<ChainIndex<Arc<DB>>>,

    /// Tipset at the head of the best-known chain.
    heaviest: RwLock<Arc<Tipset>>,

    genesis_block_header: CachingBlockHeader,
}

impl<DB> ChainStore<DB>
where
    DB: Blockstore,
{
    pub fn new(
        db: Arc<DB>,
        state_db: Arc<DB>,
        genesis_block_header: CachingBlockHeader,
    ) -> anyhow::Result<Self> {
        genesis_block_header.persist(&db)?;
        let chain_index = Arc::new(ChainIndex::new(Arc::clone(&db)));
        let genesis = Arc::new(Tipset::from(genesis_block_header.clone()));

        Ok(Self {
            db,
            state_db,
            chain_index,
            heaviest: RwLock::new(genesis),
            genesis_block_header,
        })
    }

    /// Sets heaviest tipset within `ChainStore`. The tipset headers are
    /// expected to be persisted already, see [`ChainStore::put_tipset`].
    pub fn set_heaviest_tipset(&self, ts: Arc<Tipset>) -> Result<(), Error> {
        debug!("new heaviest tipset: epoch={}, key={}", ts.epoch(), ts.key());
        *self.heaviest.write() = ts;
        Ok(())
    }

    /// Writes tipset block headers to the chain data store.
    pub fn put_tipset(&self, ts: &Tipset) -> Result<(), Error> {
        ts.persist(self.blockstore())?;
        Ok(())
    }

    /// Returns the currently tracked heaviest tipset.
    pub fn heaviest_tipset(&self) -> Arc<Tipset> {
        self.heaviest.read().clone()
    }

    /// Returns genesis [`CachingBlockHeader`].
    pub fn genesis_block_header(&self) -> &CachingBlockHeader {
        &self.genesis_block_header
    }

    pub fn genesis_tipset(&self) -> Arc<Tipset> {
        Arc::new(Tipset::from(self.genesis_block_header.clone()))
    }

    /// Returns key-value store instance.
    pub fn blockstore(&self) -> &DB {
        &self.db
    }

    /// Store holding block headers, messages and receipts.
    pub fn chain_blockstore(&self) -> &Arc<DB> {
        &self.db
    }

    /// Store holding actor state trees.
    pub fn state_blockstore(&self) -> &Arc<DB> {
        &self.state_db
    }

    /// Returns Tipset from key-value store from provided CIDs
    pub fn load_required_tipset(&self, tsk: &TipsetKey) -> Result<Arc<Tipset>, Error> {
        self.chain_index.load_required_tipset(tsk)
    }

    /// Finds the tipset at `height` in the ancestry of `from`, or of the
    /// heaviest tipset when `from` is [`None`]. See
    /// [`ChainIndex::tipset_by_height`] for how null rounds are resolved.
    pub fn tipset_by_height(
        &self,
        height: ChainEpoch,
        from: Option<Arc<Tipset>>,
        resolve: ResolveNullTipset,
    ) -> Result<Arc<Tipset>, Error> {
        let from = from.unwrap_or_else(|| self.heaviest_tipset());
        self.chain_index.tipset_by_height(height, from, resolve)
    }
}
