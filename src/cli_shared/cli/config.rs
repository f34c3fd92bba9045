// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::fmt;
use std::str::FromStr;

use itertools::Itertools as _;
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

use crate::state_manager::StateManagerConfig;

/// Verbosity threshold for a single module, written as a plain level name
/// (`"off"`, `"error"`, ..., `"trace"`) in the configuration file.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LogLevelFilter(pub LevelFilter);

impl TryFrom<String> for LogLevelFilter {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        LevelFilter::from_str(&value)
            .map(Self)
            .map_err(|_| format!("unknown log level: {value}"))
    }
}

impl From<LogLevelFilter> for String {
    fn from(value: LogLevelFilter) -> Self {
        value.to_string()
    }
}

impl fmt::Display for LogLevelFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct LogConfig {
    pub filters: Vec<LogValue>,
}

impl LogConfig {
    /// Renders the filters as `EnvFilter` directives.
    pub(in crate::cli_shared) fn to_filter_string(&self) -> String {
        self.filters
            .iter()
            .map(|f| format!("{}={}", f.module, f.level))
            .join(",")
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filters: vec![
                LogValue::new("forest_tipset_state::chain", LogLevelFilter(LevelFilter::WARN)),
                LogValue::new(
                    "forest_tipset_state::state_manager",
                    LogLevelFilter(LevelFilter::INFO),
                ),
            ],
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct LogValue {
    pub module: String,
    pub level: LogLevelFilter,
}

impl LogValue {
    pub fn new(module: &str, level: LogLevelFilter) -> Self {
        Self {
            module: module.to_string(),
            level,
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Default, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub state_manager: StateManagerConfig,
    pub log: LogConfig,
}
