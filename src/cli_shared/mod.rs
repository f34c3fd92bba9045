// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

pub mod cli;
pub mod logger;

use std::path::Path;

use crate::cli_shared::cli::Config;
use crate::utils::io::read_toml_file;

/// Reads the configuration file at `config_path`, falling back to the
/// defaults when no path is given.
pub fn read_config(config_path: Option<&Path>) -> anyhow::Result<Config> {
    match config_path {
        Some(path) => read_toml_file(path),
        None => Ok(Config::default()),
    }
}
