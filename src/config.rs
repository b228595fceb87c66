/* Copyright (c) 2018 University of Utah
 *
 * Permission to use, copy, modify, and distribute this software for any
 * purpose with or without fee is hereby granted, provided that the above
 * copyright notice and this permission notice appear in all copies.
 *
 * THE SOFTWARE IS PROVIDED "AS IS" AND THE AUTHOR(S) DISCLAIM ALL WARRANTIES
 * WITH REGARD TO THIS SOFTWARE INCLUDING ALL IMPLIED WARRANTIES OF
 * MERCHANTABILITY AND FITNESS. IN NO EVENT SHALL AUTHORS BE LIABLE FOR
 * ANY SPECIAL, DIRECT, INDIRECT, OR CONSEQUENTIAL DAMAGES OR ANY DAMAGES
 * WHATSOEVER RESULTING FROM LOSS OF USE, DATA OR PROFITS, WHETHER IN AN
 * ACTION OF CONTRACT, NEGLIGENCE OR OTHER TORTIOUS ACTION, ARISING OUT OF
 * OR IN CONNECTION WITH THE USE OR PERFORMANCE OF THIS SOFTWARE.
 */

//! Loads and validates the agent's on-disk TOML configuration.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

const DEFAULT_INIT_TRANSFER_SIZE: u32 = 20 * 1024 * 1024;

fn default_init_transfer_size() -> u32 {
    DEFAULT_INIT_TRANSFER_SIZE
}

/// The validated, in-memory form of the agent's configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    pub transfer_port: u16,

    #[serde(default)]
    pub remote_hosts: Vec<String>,

    #[serde(default = "default_init_transfer_size")]
    pub init_transfer_size: u32,

    #[serde(default)]
    pub management_port: Option<u16>,

    #[serde(default)]
    pub debug: bool,
}

impl Config {
    /// Reads and parses `path`, then validates it. `management_port: 0` is
    /// normalized to `None` (management API disabled).
    pub fn load(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path_str.clone(),
            source,
        })?;

        let mut cfg: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path_str.clone(),
            source,
        })?;

        if cfg.management_port == Some(0) {
            cfg.management_port = None;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.transfer_port == 0 {
            return Err(ConfigError::Invalid("transfer port is not defined".into()));
        }

        Ok(())
    }
}
