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

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::common::serializers::seconds;

/// Configuration for the block index and the block acceptance engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BlockchainDatabaseConfig {
    /// Number of main chain block nodes kept in memory behind the tip. Older nodes are reloaded from storage on demand.
    pub min_memory_nodes: u64,
    /// Maximum number of orphan blocks held while waiting for their parents
    pub orphan_block_capacity: usize,
    /// Time after which an orphan block is discarded
    #[serde(with = "seconds")]
    pub orphan_block_ttl: Duration,
    /// Skip script validation of blocks. Only useful for testing and trusted imports.
    pub no_script_verify: bool,
    /// Maximum number of verified signatures kept in the signature cache
    pub sig_cache_max_entries: usize,
}

impl Default for BlockchainDatabaseConfig {
    fn default() -> Self {
        Self {
            min_memory_nodes: 2000,
            orphan_block_capacity: 100,
            orphan_block_ttl: Duration::from_secs(60 * 60),
            no_script_verify: false,
            sig_cache_max_entries: 100_000,
        }
    }
}
