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

use serde::{Deserialize, Serialize};

use crate::mempool::policy::MAX_ORPHAN_TX_SIZE;

/// Configuration for the Mempool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MempoolConfig {
    /// The maximum number of orphan transactions held while waiting for their parents
    pub max_orphan_txs: usize,
    /// The maximum serialized size of an orphan transaction. Larger orphans are rejected outright.
    pub max_orphan_tx_size: usize,
    /// The minimum fee per kB for a transaction to be relayed and mined
    pub min_relay_tx_fee: u64,
    /// The number of kB of free or low fee transactions accepted per minute
    pub free_tx_relay_limit: f64,
    /// Disable the minimum priority requirement for free transactions
    pub no_relay_priority: bool,
    /// Accept and relay non-standard transactions. None uses the network default.
    pub relay_non_std_txs: Option<bool>,
    /// Index pooled transactions by the addresses they pay to
    pub enable_addr_index: bool,
    /// The number of mempool events buffered for subscribers before new events are dropped
    pub event_queue_capacity: usize,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            max_orphan_txs: 1000,
            max_orphan_tx_size: MAX_ORPHAN_TX_SIZE,
            min_relay_tx_fee: 1000,
            free_tx_relay_limit: 15.0,
            no_relay_priority: false,
            relay_non_std_txs: None,
            enable_addr_index: false,
            event_queue_capacity: 1000,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn relay_policy_defaults_to_the_network() {
        let config: MempoolConfig = toml::from_str(
            r#"
            max_orphan_txs = 5
            max_orphan_tx_size = 5000
            min_relay_tx_fee = 0
            free_tx_relay_limit = 1.5
            no_relay_priority = true
            enable_addr_index = true
            event_queue_capacity = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.max_orphan_txs, 5);
        assert_eq!(config.relay_non_std_txs, None);
        assert!(config.enable_addr_index);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(toml::from_str::<MempoolConfig>("max_orphans = 5").is_err());
    }
}
