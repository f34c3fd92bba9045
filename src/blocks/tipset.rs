// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::fmt;

use super::{CachingBlockHeader, Error, RawBlockHeader};
use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use fvm_shared4::clock::ChainEpoch;
use itertools::Itertools as _;
use nunny::Vec as NonEmpty;
use serde::{Deserialize, Serialize};

/// A set of CIDs forming a unique key for a [`Tipset`].
///
/// The CIDs are kept sorted and de-duplicated, so two keys built from the same
/// block set compare equal no matter in which order the blocks were
/// discovered.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "NonEmpty<Cid>", into = "NonEmpty<Cid>")]
pub struct TipsetKey(NonEmpty<Cid>);

impl TipsetKey {
    /// Returns `true` if the tipset key contains the given CID.
    pub fn contains(&self, cid: Cid) -> bool {
        self.0.contains(&cid)
    }

    pub fn cids(&self) -> &[Cid] {
        &self.0
    }

    pub fn into_cids(self) -> NonEmpty<Cid> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl From<NonEmpty<Cid>> for TipsetKey {
    fn from(value: NonEmpty<Cid>) -> Self {
        let canonical = value.iter().copied().sorted().dedup().collect_vec();
        // Sorting and de-duplicating a non-empty list never empties it.
        Self(NonEmpty::new(canonical).unwrap_or(value))
    }
}

impl From<TipsetKey> for NonEmpty<Cid> {
    fn from(value: TipsetKey) -> Self {
        value.0
    }
}

impl fmt::Display for TipsetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.iter().join(", "))
    }
}

/// An immutable set of blocks at the same height with the same parent set.
/// Blocks in a tipset are canonically ordered by CID.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tipset {
    headers: NonEmpty<CachingBlockHeader>,
    key: TipsetKey,
}

impl From<RawBlockHeader> for Tipset {
    fn from(value: RawBlockHeader) -> Self {
        Self::from(CachingBlockHeader::from(value))
    }
}

impl From<CachingBlockHeader> for Tipset {
    fn from(value: CachingBlockHeader) -> Self {
        let key = TipsetKey::from(nunny::vec![*value.cid()]);
        Self {
            headers: nunny::vec![value],
            key,
        }
    }
}

impl Tipset {
    /// Builds a new tipset from a collection of headers.
    /// The headers must share the same epoch and parent set. Duplicate
    /// headers are collapsed.
    pub fn new<H: Into<CachingBlockHeader>>(
        headers: impl IntoIterator<Item = H>,
    ) -> Result<Self, Error> {
        let headers = headers
            .into_iter()
            .map(Into::<CachingBlockHeader>::into)
            .sorted_by(|a, b| a.cid().cmp(b.cid()))
            .dedup_by(|a, b| a.cid() == b.cid())
            .collect_vec();
        let headers = NonEmpty::new(headers).map_err(|_| Error::NoBlocks)?;

        let first = headers.first();
        for header in headers.iter() {
            if header.parents != first.parents {
                return Err(Error::InvalidTipset(format!(
                    "parent mismatch: {} != {}",
                    header.parents, first.parents
                )));
            }
            if header.epoch != first.epoch {
                return Err(Error::InvalidTipset(format!(
                    "epoch mismatch: {} != {}",
                    header.epoch, first.epoch
                )));
            }
        }

        let cids = NonEmpty::new(headers.iter().map(|h| *h.cid()).collect_vec())
            .map_err(|_| Error::NoBlocks)?;
        Ok(Self {
            headers,
            key: TipsetKey::from(cids),
        })
    }

    /// Loads a tipset from the blockstore. Returns [`None`] if any of the
    /// headers are missing.
    pub fn load(store: &impl Blockstore, tsk: &TipsetKey) -> anyhow::Result<Option<Tipset>> {
        let mut headers = Vec::with_capacity(tsk.len());
        for cid in tsk.cids() {
            match CachingBlockHeader::load(store, *cid)? {
                Some(header) => headers.push(header),
                None => return Ok(None),
            }
        }
        Ok(Some(Tipset::new(headers)?))
    }

    /// Writes every header of the tipset to the blockstore.
    pub fn persist(&self, store: &impl Blockstore) -> anyhow::Result<()> {
        for header in self.headers.iter() {
            header.persist(store)?;
        }
        Ok(())
    }

    /// Returns epoch of the tipset.
    pub fn epoch(&self) -> ChainEpoch {
        self.min_ticket_block().epoch
    }

    pub fn block_headers(&self) -> &NonEmpty<CachingBlockHeader> {
        &self.headers
    }

    /// Returns the smallest timestamp of all blocks in the tipset.
    pub fn min_timestamp(&self) -> u64 {
        self.headers
            .iter()
            .map(|h| h.timestamp)
            .min()
            .unwrap_or_default()
    }

    /// Returns the number of blocks in the tipset.
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Returns a key for the tipset.
    pub fn key(&self) -> &TipsetKey {
        &self.key
    }

    /// Returns a non-empty collection of CIDs for the current tipset.
    pub fn cids(&self) -> &[Cid] {
        self.key.cids()
    }

    /// Returns the keys of the parents of the blocks in the tipset.
    pub fn parents(&self) -> &TipsetKey {
        &self.min_ticket_block().parents
    }

    /// Returns the state root of the tipset's parent.
    pub fn parent_state(&self) -> &Cid {
        &self.min_ticket_block().state_root
    }

    /// Returns the receipts root produced by executing the tipset's parent.
    pub fn parent_message_receipts(&self) -> &Cid {
        &self.min_ticket_block().message_receipts
    }

    /// Returns the canonical first block of the tipset.
    pub fn min_ticket_block(&self) -> &CachingBlockHeader {
        self.headers.first()
    }
}
