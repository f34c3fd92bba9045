// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use thiserror::Error;

use crate::blocks;

/// Chain error
#[derive(Debug, Error)]
pub enum Error {
    /// Key not found in database
    #[error("{0} not found")]
    NotFound(String),
    /// Error originating constructing blockchain structures
    #[error(transparent)]
    Blockchain(#[from] blocks::Error),
    /// Other chain error
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Other(e.to_string())
    }
}
