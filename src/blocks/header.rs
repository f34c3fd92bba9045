// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::sync::OnceLock;

use super::TipsetKey;
use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::DAG_CBOR;
use fvm_ipld_encoding::tuple::*;
use fvm_shared4::address::Address;
use fvm_shared4::clock::ChainEpoch;
use multihash_codetable::{Code, MultihashDigest as _};

/// The subset of a Filecoin block header this crate needs to navigate the
/// chain and short-circuit state computation.
#[derive(Deserialize_tuple, Serialize_tuple, Clone, Hash, Eq, PartialEq, Debug)]
pub struct RawBlockHeader {
    /// The address of the miner actor that mined this block
    pub miner_address: Address,
    /// The set of parents this block was based on.
    /// Typically one, but can be several in the case where there were multiple
    /// winning ticket-holders for an epoch
    pub parents: TipsetKey,
    /// The period in which a new block is generated.
    /// There may be multiple rounds in an epoch.
    pub epoch: ChainEpoch,
    /// The CID of the parent state root after calculating parent tipset.
    pub state_root: Cid,
    /// The CID of the root of an array of `MessageReceipts`
    pub message_receipts: Cid,
    /// The CID of the Merkle links for `bls_messages` and `secp_messages`
    pub messages: Cid,
    /// Block creation time, in seconds since the Unix epoch
    pub timestamp: u64,
}

impl Default for RawBlockHeader {
    fn default() -> Self {
        Self {
            miner_address: Address::new_id(0),
            parents: TipsetKey::from(nunny::vec![Cid::default()]),
            epoch: 0,
            state_root: Cid::default(),
            message_receipts: Cid::default(),
            messages: Cid::default(),
            timestamp: 0,
        }
    }
}

impl RawBlockHeader {
    pub fn cid(&self) -> Cid {
        self.car_block().expect("CBOR serialization failed").0
    }

    pub fn car_block(&self) -> anyhow::Result<(Cid, Vec<u8>)> {
        let data = fvm_ipld_encoding::to_vec(self)?;
        let cid = Cid::new_v1(DAG_CBOR, Code::Blake2b256.digest(&data));
        Ok((cid, data))
    }
}

/// A [`RawBlockHeader`] which caches its CID.
#[derive(Debug)]
pub struct CachingBlockHeader {
    uncached: RawBlockHeader,
    cid: OnceLock<Cid>,
}

impl PartialEq for CachingBlockHeader {
    fn eq(&self, other: &Self) -> bool {
        // Epoch check is redundant but cheap.
        self.uncached.epoch == other.uncached.epoch && self.cid() == other.cid()
    }
}

impl Eq for CachingBlockHeader {}

impl Clone for CachingBlockHeader {
    fn clone(&self) -> Self {
        Self {
            uncached: self.uncached.clone(),
            cid: self.cid.clone(),
        }
    }
}

impl std::ops::Deref for CachingBlockHeader {
    type Target = RawBlockHeader;

    fn deref(&self) -> &Self::Target {
        &self.uncached
    }
}

impl From<RawBlockHeader> for CachingBlockHeader {
    fn from(value: RawBlockHeader) -> Self {
        Self::new(value)
    }
}

impl CachingBlockHeader {
    pub fn new(uncached: RawBlockHeader) -> Self {
        Self {
            uncached,
            cid: OnceLock::new(),
        }
    }

    pub fn into_raw(self) -> RawBlockHeader {
        self.uncached
    }

    /// Returns [`None`] if the blockstore doesn't contain the CID.
    pub fn load(store: &impl Blockstore, cid: Cid) -> anyhow::Result<Option<Self>> {
        match store.get(&cid)? {
            Some(bytes) => {
                let uncached: RawBlockHeader = fvm_ipld_encoding::from_slice(&bytes)?;
                let header = Self {
                    uncached,
                    cid: OnceLock::new(),
                };
                let _ = header.cid.set(cid);
                Ok(Some(header))
            }
            None => Ok(None),
        }
    }

    /// Writes the header to the blockstore under its CID.
    pub fn persist(&self, store: &impl Blockstore) -> anyhow::Result<Cid> {
        let (cid, data) = self.uncached.car_block()?;
        store.put_keyed(&cid, &data)?;
        let _ = self.cid.set(cid);
        Ok(cid)
    }

    pub fn cid(&self) -> &Cid {
        self.cid.get_or_init(|| self.uncached.cid())
    }
}
