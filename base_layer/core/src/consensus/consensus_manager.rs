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

use std::sync::Arc;

use crate::{
    blocks::Block,
    consensus::{
        chain_strength_comparer::{strongest_chain, ChainStrengthComparer},
        emission::{Emission, EmissionSchedule},
        network::Network,
        Checkpoint,
        ConsensusConstants,
    },
    types::BlockHash,
};

/// Container struct for consensus rules. This can be cheaply cloned.
#[derive(Debug, Clone)]
pub struct ConsensusManager {
    inner: Arc<ConsensusManagerInner>,
}

impl ConsensusManager {
    pub fn builder(network: Network) -> ConsensusManagerBuilder {
        ConsensusManagerBuilder::new(network)
    }

    /// Returns the genesis block for the selected network.
    pub fn get_genesis_block(&self) -> Arc<Block> {
        self.inner.genesis_block.clone()
    }

    pub fn genesis_hash(&self) -> BlockHash {
        self.inner.genesis_hash
    }

    pub fn consensus_constants(&self) -> &ConsensusConstants {
        &self.inner.consensus_constants
    }

    pub fn emission_schedule(&self) -> &EmissionSchedule {
        &self.inner.emission
    }

    pub fn get_block_reward_at(&self, height: u64) -> u64 {
        self.inner.emission.block_reward(height)
    }

    pub fn get_total_emission_at(&self, height: u64) -> u64 {
        self.inner.emission.supply_at_block(height)
    }

    /// The minimum amount the coinbase at `height` must pay to the foundation script. Zero before the foundation
    /// output is activated.
    pub fn foundation_share_at(&self, height: u64) -> u64 {
        let constants = self.consensus_constants();
        if height < constants.foundation_activation_height() {
            return 0;
        }
        let reward = u128::from(self.get_block_reward_at(height));
        let share = reward * u128::from(constants.foundation_share_percent()) / 100;
        u64::try_from(share).unwrap_or(u64::MAX)
    }

    pub fn chain_strength_comparer(&self) -> &dyn ChainStrengthComparer {
        self.inner.chain_strength_comparer.as_ref()
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        self.inner.consensus_constants.checkpoints()
    }

    /// The checkpoint with the greatest height, if the network has any
    pub fn latest_checkpoint(&self) -> Option<&Checkpoint> {
        self.checkpoints().last()
    }

    pub fn checkpoint_at_height(&self, height: u64) -> Option<&Checkpoint> {
        self.checkpoints().iter().find(|c| c.height == height)
    }

    /// Returns false only if there is a checkpoint at `height` and its hash differs
    pub fn verify_checkpoint(&self, height: u64, hash: &BlockHash) -> bool {
        self.checkpoint_at_height(height).map_or(true, |c| c.hash == *hash)
    }

    /// This is the currently configured chain network.
    pub fn network(&self) -> Network {
        self.inner.consensus_constants.network()
    }
}

/// This is the used to control all consensus values.
#[derive(Debug)]
struct ConsensusManagerInner {
    pub consensus_constants: ConsensusConstants,
    pub emission: EmissionSchedule,
    pub genesis_block: Arc<Block>,
    pub genesis_hash: BlockHash,
    /// The comparer used to determine which chain is stronger for reorgs.
    pub chain_strength_comparer: Box<dyn ChainStrengthComparer + Send + Sync>,
}

/// Constructor for the consensus manager struct
pub struct ConsensusManagerBuilder {
    consensus_constants: Option<ConsensusConstants>,
    network: Network,
    gen_block: Option<Block>,
    chain_strength_comparer: Option<Box<dyn ChainStrengthComparer + Send + Sync>>,
}

impl ConsensusManagerBuilder {
    /// Creates a new ConsensusManagerBuilder with the specified network
    pub fn new(network: Network) -> Self {
        ConsensusManagerBuilder {
            consensus_constants: None,
            network,
            gen_block: None,
            chain_strength_comparer: None,
        }
    }

    /// Adds in a custom consensus constants to be used
    pub fn with_consensus_constants(mut self, consensus_constants: ConsensusConstants) -> Self {
        self.consensus_constants = Some(consensus_constants);
        self
    }

    /// Adds in a custom genesis block to be used
    pub fn with_block(mut self, block: Block) -> Self {
        self.gen_block = Some(block);
        self
    }

    pub fn on_ties(mut self, chain_strength_comparer: Box<dyn ChainStrengthComparer + Send + Sync>) -> Self {
        self.chain_strength_comparer = Some(chain_strength_comparer);
        self
    }

    /// Builds a consensus manager
    pub fn build(self) -> ConsensusManager {
        let consensus_constants = self
            .consensus_constants
            .unwrap_or_else(|| self.network.create_consensus_constants());
        let (tiers, tail) = consensus_constants.emission_amounts();
        let emission = EmissionSchedule::new(tiers.to_vec(), tail);
        let genesis_block = Arc::new(self.gen_block.unwrap_or_else(|| self.network.genesis_block()));
        let genesis_hash = genesis_block.hash();
        let inner = ConsensusManagerInner {
            consensus_constants,
            emission,
            genesis_block,
            genesis_hash,
            chain_strength_comparer: self.chain_strength_comparer.unwrap_or_else(|| {
                strongest_chain()
                    .by_accumulated_work()
                    .then()
                    .by_earlier_timestamp()
                    .then()
                    .by_smaller_hash()
                    .build()
            }),
        };
        ConsensusManager { inner: Arc::new(inner) }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::consensus::{ConsensusConstantsBuilder, COIN};

    #[test]
    fn foundation_share_follows_activation() {
        let constants = ConsensusConstantsBuilder::new(Network::RegTest)
            .with_foundation(vec![0x51], 10, 5)
            .build();
        let rules = ConsensusManager::builder(Network::RegTest)
            .with_consensus_constants(constants)
            .build();
        assert_eq!(rules.foundation_share_at(4), 0);
        assert_eq!(rules.foundation_share_at(5), 5 * COIN);
        assert_eq!(rules.get_block_reward_at(0), 50 * COIN);
    }

    #[test]
    fn checkpoints_are_verified_by_height() {
        let checkpoint = Checkpoint::new(3, BlockHash::from([3; 32]));
        let constants = ConsensusConstantsBuilder::new(Network::RegTest)
            .with_checkpoints(vec![checkpoint])
            .build();
        let rules = ConsensusManager::builder(Network::RegTest)
            .with_consensus_constants(constants)
            .build();
        assert_eq!(rules.latest_checkpoint(), Some(&checkpoint));
        assert!(rules.verify_checkpoint(3, &BlockHash::from([3; 32])));
        assert!(!rules.verify_checkpoint(3, &BlockHash::zero()));
        assert!(rules.verify_checkpoint(4, &BlockHash::zero()));
        assert_eq!(rules.genesis_hash(), rules.get_genesis_block().hash());
    }
}
