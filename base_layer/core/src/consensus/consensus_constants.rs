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

use primitive_types::U256;

use crate::{
    consensus::{emission::EmissionTier, network::Network, Checkpoint},
    script::standard::pay_to_pubkey_hash_script,
};

/// Number of base units in one coin
pub const COIN: u64 = 100_000_000;

/// Block version from which the coinbase must commit to the block height
pub const SERIALIZED_HEIGHT_VERSION: u32 = 2;
/// Block version from which signatures must be strict DER
pub const DER_SIGNATURES_VERSION: u32 = 3;
/// Block version from which OP_CHECKLOCKTIMEVERIFY is enforced
pub const CHECK_LOCK_TIME_VERSION: u32 = 4;
/// Block version from which OP_CHECKSEQUENCEVERIFY is enforced
pub const CHECK_SEQUENCE_VERSION: u32 = 5;

/// Consensus parameters of a network.
#[derive(Debug, Clone)]
pub struct ConsensusConstants {
    network: Network,
    /// Number of blocks that must be mined on top of a coinbase before its outputs can be spent
    coinbase_maturity: u64,
    /// Maximum serialized size of a block in bytes. Also bounds the size of a single transaction.
    max_block_size: usize,
    /// Maximum number of signature operations in a block
    max_block_sigops: usize,
    /// Maximum value of a single output and of the outputs of a transaction
    max_money: u64,
    min_coinbase_script_len: usize,
    max_coinbase_script_len: usize,
    /// How far in seconds a block timestamp may be ahead of the network adjusted time
    max_future_block_time: u64,
    /// Number of ancestors used to compute the past median time
    median_time_blocks: usize,
    /// The easiest proof of work target allowed
    pow_limit: U256,
    /// Compact form of `pow_limit`
    pow_limit_bits: u32,
    /// Desired duration in seconds of a retarget interval
    target_timespan: u64,
    /// Desired seconds between blocks
    target_spacing: u64,
    /// Bound on how much the difficulty may change in a single retarget
    retarget_adjustment_factor: u64,
    /// When set the difficulty never changes
    no_retargeting: bool,
    /// Window of ancestors inspected when deciding whether a block version has reached a majority
    block_upgrade_num_to_check: u64,
    /// Blocks in the window needed to enforce the rules of a new version
    block_enforce_num_required: u64,
    /// Blocks in the window needed to reject blocks with an older version
    block_reject_num_required: u64,
    /// Whether non-standard transactions are relayed by default
    relay_non_std_txs: bool,
    /// Output script the foundation share of the coinbase must pay to
    foundation_script: Vec<u8>,
    foundation_share_percent: u64,
    /// First block height at which the foundation output is required
    foundation_activation_height: u64,
    emission_tiers: Vec<EmissionTier>,
    emission_tail: u64,
    checkpoints: Vec<Checkpoint>,
}

impl ConsensusConstants {
    pub fn network(&self) -> Network {
        self.network
    }

    pub fn coinbase_maturity(&self) -> u64 {
        self.coinbase_maturity
    }

    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    pub fn max_block_sigops(&self) -> usize {
        self.max_block_sigops
    }

    pub fn max_money(&self) -> u64 {
        self.max_money
    }

    pub fn min_coinbase_script_len(&self) -> usize {
        self.min_coinbase_script_len
    }

    pub fn max_coinbase_script_len(&self) -> usize {
        self.max_coinbase_script_len
    }

    pub fn max_future_block_time(&self) -> u64 {
        self.max_future_block_time
    }

    pub fn median_time_blocks(&self) -> usize {
        self.median_time_blocks
    }

    pub fn pow_limit(&self) -> U256 {
        self.pow_limit
    }

    pub fn pow_limit_bits(&self) -> u32 {
        self.pow_limit_bits
    }

    pub fn target_timespan(&self) -> u64 {
        self.target_timespan
    }

    pub fn target_spacing(&self) -> u64 {
        self.target_spacing
    }

    /// Number of blocks between difficulty retargets
    pub fn blocks_per_retarget(&self) -> u64 {
        (self.target_timespan / self.target_spacing.max(1)).max(1)
    }

    pub fn retarget_adjustment_factor(&self) -> u64 {
        self.retarget_adjustment_factor
    }

    pub fn no_retargeting(&self) -> bool {
        self.no_retargeting
    }

    pub fn block_upgrade_num_to_check(&self) -> u64 {
        self.block_upgrade_num_to_check
    }

    pub fn block_enforce_num_required(&self) -> u64 {
        self.block_enforce_num_required
    }

    pub fn block_reject_num_required(&self) -> u64 {
        self.block_reject_num_required
    }

    pub fn relay_non_std_txs(&self) -> bool {
        self.relay_non_std_txs
    }

    pub fn foundation_script(&self) -> &[u8] {
        &self.foundation_script
    }

    pub fn foundation_share_percent(&self) -> u64 {
        self.foundation_share_percent
    }

    pub fn foundation_activation_height(&self) -> u64 {
        self.foundation_activation_height
    }

    pub fn emission_amounts(&self) -> (&[EmissionTier], u64) {
        (&self.emission_tiers, self.emission_tail)
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    pub fn mainnet() -> Self {
        Self {
            network: Network::MainNet,
            coinbase_maturity: 100,
            max_block_size: 1_000_000,
            max_block_sigops: 1_000_000 / 50,
            max_money: 21_000_000 * COIN,
            min_coinbase_script_len: 2,
            max_coinbase_script_len: 100,
            max_future_block_time: 2 * 60 * 60,
            median_time_blocks: 11,
            pow_limit: U256::MAX >> 32,
            pow_limit_bits: 0x1d00_ffff,
            target_timespan: 14 * 24 * 60 * 60,
            target_spacing: 10 * 60,
            retarget_adjustment_factor: 4,
            no_retargeting: false,
            block_upgrade_num_to_check: 1000,
            block_enforce_num_required: 750,
            block_reject_num_required: 950,
            relay_non_std_txs: false,
            foundation_script: pay_to_pubkey_hash_script(&[
                0x3b, 0x6a, 0x27, 0xbc, 0xce, 0xb6, 0xa4, 0x2d, 0x62, 0xa3, 0xa8, 0xd0, 0x2a, 0x6f, 0x0d, 0x73, 0x65,
                0x32, 0x15, 0x77,
            ]),
            foundation_share_percent: 5,
            foundation_activation_height: 1,
            emission_tiers: vec![
                EmissionTier::new(10_500_000 * COIN, 50 * COIN),
                EmissionTier::new(15_750_000 * COIN, 25 * COIN),
                EmissionTier::new(18_375_000 * COIN, 125 * COIN / 10),
                EmissionTier::new(19_687_500 * COIN, 625 * COIN / 100),
            ],
            emission_tail: COIN / 2,
            checkpoints: Vec::new(),
        }
    }

    pub fn testnet() -> Self {
        Self {
            network: Network::TestNet,
            block_upgrade_num_to_check: 100,
            block_enforce_num_required: 51,
            block_reject_num_required: 75,
            relay_non_std_txs: true,
            foundation_script: pay_to_pubkey_hash_script(&[
                0x9e, 0x16, 0x42, 0x0e, 0x0b, 0x1a, 0x8f, 0x67, 0x25, 0xd5, 0x3a, 0x71, 0xc0, 0x1e, 0x4d, 0x40, 0x80,
                0x6b, 0x1c, 0x52,
            ]),
            ..Self::mainnet()
        }
    }

    /// Constants for local test networks: the easiest possible proof of work and a fixed difficulty
    pub fn regtest() -> Self {
        Self {
            network: Network::RegTest,
            pow_limit: U256::MAX >> 1,
            pow_limit_bits: 0x207f_ffff,
            target_timespan: 14 * 24 * 60 * 60,
            target_spacing: 10 * 60,
            no_retargeting: true,
            block_upgrade_num_to_check: 100,
            block_enforce_num_required: 75,
            block_reject_num_required: 95,
            relay_non_std_txs: true,
            foundation_script: Vec::new(),
            foundation_share_percent: 0,
            foundation_activation_height: u64::MAX,
            emission_tiers: vec![EmissionTier::new(150 * 50 * COIN, 50 * COIN)],
            emission_tail: 25 * COIN,
            ..Self::mainnet()
        }
    }
}

/// Class to create custom consensus constants
pub struct ConsensusConstantsBuilder {
    consensus: ConsensusConstants,
}

impl ConsensusConstantsBuilder {
    pub fn new(network: Network) -> Self {
        Self {
            consensus: network.create_consensus_constants(),
        }
    }

    pub fn with_coinbase_maturity(mut self, maturity: u64) -> Self {
        self.consensus.coinbase_maturity = maturity;
        self
    }

    pub fn with_max_block_size(mut self, max_block_size: usize) -> Self {
        self.consensus.max_block_size = max_block_size;
        self.consensus.max_block_sigops = max_block_size / 50;
        self
    }

    pub fn with_max_block_sigops(mut self, max_block_sigops: usize) -> Self {
        self.consensus.max_block_sigops = max_block_sigops;
        self
    }

    pub fn with_pow_limit(mut self, pow_limit: U256, pow_limit_bits: u32) -> Self {
        self.consensus.pow_limit = pow_limit;
        self.consensus.pow_limit_bits = pow_limit_bits;
        self
    }

    pub fn with_retargeting(mut self, target_timespan: u64, target_spacing: u64, adjustment_factor: u64) -> Self {
        self.consensus.target_timespan = target_timespan;
        self.consensus.target_spacing = target_spacing;
        self.consensus.retarget_adjustment_factor = adjustment_factor;
        self.consensus.no_retargeting = false;
        self
    }

    pub fn with_no_retargeting(mut self) -> Self {
        self.consensus.no_retargeting = true;
        self
    }

    pub fn with_majority_window(mut self, num_to_check: u64, enforce_required: u64, reject_required: u64) -> Self {
        self.consensus.block_upgrade_num_to_check = num_to_check;
        self.consensus.block_enforce_num_required = enforce_required;
        self.consensus.block_reject_num_required = reject_required;
        self
    }

    pub fn with_relay_non_std_txs(mut self, relay: bool) -> Self {
        self.consensus.relay_non_std_txs = relay;
        self
    }

    pub fn with_foundation(mut self, script: Vec<u8>, share_percent: u64, activation_height: u64) -> Self {
        self.consensus.foundation_script = script;
        self.consensus.foundation_share_percent = share_percent;
        self.consensus.foundation_activation_height = activation_height;
        self
    }

    pub fn with_emission_amounts(mut self, tiers: Vec<EmissionTier>, tail: u64) -> Self {
        self.consensus.emission_tiers = tiers;
        self.consensus.emission_tail = tail;
        self
    }

    pub fn with_checkpoints(mut self, mut checkpoints: Vec<Checkpoint>) -> Self {
        checkpoints.sort_by_key(|c| c.height);
        self.consensus.checkpoints = checkpoints;
        self
    }

    pub fn with_median_time_blocks(mut self, count: usize) -> Self {
        self.consensus.median_time_blocks = count.max(1);
        self
    }

    pub fn with_max_future_block_time(mut self, seconds: u64) -> Self {
        self.consensus.max_future_block_time = seconds;
        self
    }

    pub fn build(self) -> ConsensusConstants {
        self.consensus
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::proof_of_work::difficulty::{compact_to_target, target_to_compact};

    #[test]
    fn pow_limit_bits_match_the_limit() {
        for constants in [
            ConsensusConstants::mainnet(),
            ConsensusConstants::testnet(),
            ConsensusConstants::regtest(),
        ] {
            let target = compact_to_target(constants.pow_limit_bits()).unwrap();
            assert!(target <= constants.pow_limit());
            assert_eq!(target_to_compact(constants.pow_limit()), constants.pow_limit_bits());
        }
    }

    #[test]
    fn builder_overrides() {
        let constants = ConsensusConstantsBuilder::new(Network::RegTest)
            .with_coinbase_maturity(2)
            .with_checkpoints(vec![
                Checkpoint::new(10, Default::default()),
                Checkpoint::new(5, Default::default()),
            ])
            .build();
        assert_eq!(constants.coinbase_maturity(), 2);
        assert_eq!(constants.checkpoints()[0].height, 5);
        assert_eq!(constants.network(), Network::RegTest);
        assert_eq!(ConsensusConstants::mainnet().blocks_per_retarget(), 2016);
    }
}
