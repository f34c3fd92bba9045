// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use fvm_ipld_encoding::DAG_CBOR;
use fvm_shared4::message::Message;
use multihash_codetable::{Code, MultihashDigest as _};

/// Extension methods for unsigned messages.
pub trait MessageExt {
    /// CID of the DAG-CBOR encoded message.
    fn cid(&self) -> anyhow::Result<Cid>;
}

impl MessageExt for Message {
    fn cid(&self) -> anyhow::Result<Cid> {
        let data = fvm_ipld_encoding::to_vec(self)?;
        Ok(Cid::new_v1(DAG_CBOR, Code::Blake2b256.digest(&data)))
    }
}
