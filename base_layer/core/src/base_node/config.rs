// Copyright 2024. The Tari Project
//
// Redistribution and use in source and binary forms, with or without modification, are permitted provided that the
// following conditions are met:
//
// 1. Redistributions of source code must retain the above copyright notice, this list of conditions and the following
// disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright notice, this list of conditions and the
// following disclaimer in the documentation and/or other materials provided with the distribution.
//
// 3. Neither the name of the copyright holder nor the names of its contributors may be used to endorse or promote
// products derived from this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES,
// INCLUDING, BUT NOT LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
// DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
// SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY,
// WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE
// USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

use config::{Config, ConfigError};
use serde::{Deserialize, Serialize};

use crate::{
    base_node::NodeError,
    chain_storage::BlockchainDatabaseConfig,
    consensus::Network,
    mempool::MempoolConfig,
};

/// Configuration for a node: the network it follows, the block acceptance engine and the mempool.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    pub network: Network,
    pub blockchain: BlockchainDatabaseConfig,
    pub mempool: MempoolConfig,
}

impl NodeConfig {
    /// Reads the `network` key and the `[blockchain]` and `[mempool]` sections. Anything missing takes its default.
    pub fn load_from(config: &Config) -> Result<Self, NodeError> {
        Ok(Self {
            network: optional(config.get::<Network>("network"))?.unwrap_or_default(),
            blockchain: optional(config.get::<BlockchainDatabaseConfig>("blockchain"))?.unwrap_or_default(),
            mempool: optional(config.get::<MempoolConfig>("mempool"))?.unwrap_or_default(),
        })
    }
}

/// Changes ConfigError::NotFound into None
fn optional<T>(result: Result<T, ConfigError>) -> Result<Option<T>, ConfigError> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use config::{File, FileFormat};

    use super::*;

    fn load(toml: &str) -> Result<NodeConfig, NodeError> {
        let config = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        NodeConfig::load_from(&config)
    }

    #[test]
    fn empty_config_is_default() {
        assert_eq!(load("").unwrap(), NodeConfig::default());
    }

    #[test]
    fn sections_override_defaults() {
        let config = load(
            r#"
            network = "testnet"

            [blockchain]
            orphan_block_ttl = 60
            no_script_verify = true

            [mempool]
            max_orphan_txs = 10
            relay_non_std_txs = true
            "#,
        )
        .unwrap();
        assert_eq!(config.network, Network::TestNet);
        assert_eq!(config.blockchain.orphan_block_ttl, Duration::from_secs(60));
        assert!(config.blockchain.no_script_verify);
        assert_eq!(config.blockchain.orphan_block_capacity, 100);
        assert_eq!(config.mempool.max_orphan_txs, 10);
        assert_eq!(config.mempool.relay_non_std_txs, Some(true));
        assert_eq!(config.mempool.min_relay_tx_fee, 1000);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(load("[mempool]\nmax_orphans = 10").is_err());
        assert!(load("network = \"moonnet\"").is_err());
    }
}
