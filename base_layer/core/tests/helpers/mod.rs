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

use tari_chain_core::{
    base_node::NodeCore,
    blocks::Block,
    chain_storage::{BehaviorFlags, BlockchainDatabaseConfig, MemoryDatabase},
    common::MedianTime,
    consensus::{ConsensusConstantsBuilder, ConsensusManager, Network},
    mempool::{BoundedEventQueue, Mempool, MempoolConfig, MempoolEvent},
    test_helpers::{append_block, create_block, create_custom_blockchain, BlockSpec, MockScriptEngine, TestBlockchain},
};

/// Coinbase maturity of the test networks. Small so that tests do not need to mine many blocks.
pub const TEST_COINBASE_MATURITY: u64 = 5;

pub struct TestNode {
    pub node: NodeCore<MemoryDatabase>,
    pub events: Arc<BoundedEventQueue>,
    pub engine: Arc<MockScriptEngine>,
}

impl TestNode {
    pub fn new() -> Self {
        Self::with_mempool_config(MempoolConfig::default())
    }

    pub fn with_mempool_config(config: MempoolConfig) -> Self {
        let _ = env_logger::try_init();
        let constants = ConsensusConstantsBuilder::new(Network::RegTest)
            .with_coinbase_maturity(TEST_COINBASE_MATURITY)
            .build();
        let rules = ConsensusManager::builder(Network::RegTest)
            .with_consensus_constants(constants)
            .build();
        let engine = Arc::new(MockScriptEngine::default());
        let db = create_custom_blockchain(rules, BlockchainDatabaseConfig::default(), engine.clone());
        let time_source = Arc::new(MedianTime::new());
        let events = Arc::new(BoundedEventQueue::new(1000));
        let mempool = Mempool::new(db.clone(), config, time_source.clone(), events.clone());
        Self {
            node: NodeCore::new(db, mempool, time_source),
            events,
            engine,
        }
    }

    pub fn db(&self) -> &TestBlockchain {
        self.node.blockchain_db()
    }

    pub fn mempool(&self) -> &Mempool<MemoryDatabase> {
        self.node.mempool()
    }

    pub fn genesis(&self) -> Arc<Block> {
        self.db().fetch_block_by_height(0).unwrap().unwrap()
    }

    pub fn tip(&self) -> Arc<Block> {
        let hash = self.db().best_block_hash().unwrap();
        self.db().fetch_block_by_hash(&hash).unwrap().unwrap()
    }

    /// Mines `len` empty blocks on the tip through the node, so that the mempool follows
    pub fn mine(&self, len: usize) -> Vec<Arc<Block>> {
        self.mine_on(&self.tip(), len, 0)
    }

    /// Mines `len` empty blocks on `prev`, tagging their coinbases with `tag`
    pub fn mine_on(&self, prev: &Arc<Block>, len: usize, tag: u8) -> Vec<Arc<Block>> {
        let mut blocks: Vec<Arc<Block>> = Vec::with_capacity(len);
        for _ in 0..len {
            let parent = blocks.last().unwrap_or(prev).clone();
            let block = create_block(self.db(), &parent, BlockSpec::new().with_coinbase_tag(vec![tag]));
            self.node.process_block(block.clone(), BehaviorFlags::empty()).unwrap();
            blocks.push(block);
        }
        blocks
    }

    /// Mines a block on the tip without telling the mempool
    pub fn append_quietly(&self, spec: BlockSpec) -> Arc<Block> {
        append_block(self.db(), &self.tip(), spec).unwrap()
    }

    /// Creates a block on `prev` and sends it through the node
    pub fn submit(&self, prev: &Block, spec: BlockSpec) -> Arc<Block> {
        let block = create_block(self.db(), prev, spec);
        self.node.process_block(block.clone(), BehaviorFlags::empty()).unwrap();
        block
    }

    pub fn drain_events(&self) -> Vec<MempoolEvent> {
        self.events.drain()
    }
}
