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
use strum_macros::{Display, EnumString};

use crate::{blocks::genesis_block::get_genesis_block, blocks::Block, consensus::ConsensusConstants};

/// Specifies the configured chain network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Network {
    MainNet,
    TestNet,
    /// Local network used by unit and integration tests. Blocks are cheap to mine and difficulty never changes.
    #[default]
    RegTest,
}

impl Network {
    pub fn create_consensus_constants(self) -> ConsensusConstants {
        match self {
            Network::MainNet => ConsensusConstants::mainnet(),
            Network::TestNet => ConsensusConstants::testnet(),
            Network::RegTest => ConsensusConstants::regtest(),
        }
    }

    pub fn genesis_block(self) -> Block {
        get_genesis_block(self)
    }

    pub fn as_key_str(self) -> &'static str {
        match self {
            Network::MainNet => "mainnet",
            Network::TestNet => "testnet",
            Network::RegTest => "regtest",
        }
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn network_names_round_trip() {
        for network in [Network::MainNet, Network::TestNet, Network::RegTest] {
            assert_eq!(Network::from_str(&network.to_string()).unwrap(), network);
            assert_eq!(network.to_string(), network.as_key_str());
        }
        assert!(Network::from_str("ridcully").is_err());
    }
}
