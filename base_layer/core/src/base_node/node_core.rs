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

use log::*;

use crate::{
    base_node::{NodeConfig, NodeError},
    blocks::{Block, BlockHeader},
    chain_storage::{BehaviorFlags, BlockAddResult, BlockchainBackend, BlockchainDatabase, ChainEvent},
    common::MedianTimeSource,
    consensus::ConsensusManager,
    mempool::{Mempool, MempoolEventSink},
    script::ScriptEngine,
    transactions::Transaction,
    types::{BlockHash, TxHash},
};

const LOG_TARGET: &str = "c::bn::node_core";

/// The chain and the mempool of a node. Blocks and transactions from the network layer enter here, and every change to
/// the main chain is passed on to the mempool in the order it happened.
pub struct NodeCore<B> {
    blockchain_db: BlockchainDatabase<B>,
    mempool: Mempool<B>,
    time_source: Arc<dyn MedianTimeSource>,
}

impl<B> NodeCore<B>
where B: BlockchainBackend
{
    pub fn new(
        blockchain_db: BlockchainDatabase<B>,
        mempool: Mempool<B>,
        time_source: Arc<dyn MedianTimeSource>,
    ) -> Self {
        Self {
            blockchain_db,
            mempool,
            time_source,
        }
    }

    /// Opens the chain on `backend` for the configured network and starts an empty mempool on it
    pub fn from_config(
        backend: B,
        config: &NodeConfig,
        script_engine: Arc<dyn ScriptEngine>,
        time_source: Arc<dyn MedianTimeSource>,
        event_sink: Arc<dyn MempoolEventSink>,
    ) -> Result<Self, NodeError> {
        let rules = ConsensusManager::builder(config.network).build();
        let blockchain_db = BlockchainDatabase::new(backend, rules, config.blockchain.clone(), script_engine)?;
        let mempool = Mempool::new(
            blockchain_db.clone(),
            config.mempool.clone(),
            time_source.clone(),
            event_sink,
        );
        info!(
            target: LOG_TARGET,
            "Node started on {} at height {}",
            config.network,
            blockchain_db.best_height()?
        );
        Ok(Self::new(blockchain_db, mempool, time_source))
    }

    pub fn blockchain_db(&self) -> &BlockchainDatabase<B> {
        &self.blockchain_db
    }

    pub fn mempool(&self) -> &Mempool<B> {
        &self.mempool
    }

    pub fn time_source(&self) -> &Arc<dyn MedianTimeSource> {
        &self.time_source
    }

    /// Processes a block and updates the mempool. Returns true if the block is an orphan.
    pub fn process_block(&self, block: Arc<Block>, flags: BehaviorFlags) -> Result<bool, NodeError> {
        let result = self.process_block_with_events(block, flags)?;
        Ok(result.is_orphan)
    }

    /// Like [process_block](Self::process_block), returning the chain events caused by the block
    pub fn process_block_with_events(
        &self,
        block: Arc<Block>,
        flags: BehaviorFlags,
    ) -> Result<BlockAddResult, NodeError> {
        let result = self
            .blockchain_db
            .process_block(block, self.time_source.as_ref(), flags)?;
        self.handle_chain_events(&result.events)?;
        if result.is_chain_reorg() {
            info!(
                target: LOG_TARGET,
                "Chain reorganised: {} block(s) removed, {} block(s) added",
                result.disconnected_blocks().len(),
                result.connected_blocks().len()
            );
        }
        Ok(result)
    }

    /// Passes chain events on to the mempool. A reorganisation disconnects blocks tip first, so each run of
    /// disconnected blocks is returned to the pool oldest first and parents are back before their children.
    fn handle_chain_events(&self, events: &[ChainEvent]) -> Result<(), NodeError> {
        let mut disconnected = Vec::new();
        for event in events {
            match event {
                ChainEvent::BlockDisconnected(block) => disconnected.push(block),
                ChainEvent::BlockAccepted(block) => {
                    self.return_disconnected_blocks(&mut disconnected)?;
                    trace!(target: LOG_TARGET, "Block {} accepted", block.hash());
                },
                ChainEvent::BlockConnected(block) => {
                    self.return_disconnected_blocks(&mut disconnected)?;
                    let promoted = self.mempool.process_published_block(block)?;
                    if !promoted.is_empty() {
                        debug!(
                            target: LOG_TARGET,
                            "{} orphan transaction(s) promoted after block {}",
                            promoted.len(),
                            block.hash()
                        );
                    }
                },
            }
        }
        self.return_disconnected_blocks(&mut disconnected)
    }

    fn return_disconnected_blocks(&self, blocks: &mut Vec<&Arc<Block>>) -> Result<(), NodeError> {
        for block in blocks.drain(..).rev() {
            self.mempool.process_disconnected_block(block)?;
        }
        Ok(())
    }

    /// Processes a transaction from a peer. Returns true if it was stored as an orphan.
    pub fn process_transaction(
        &self,
        tx: Arc<Transaction>,
        allow_orphan: bool,
        rate_limit: bool,
    ) -> Result<bool, NodeError> {
        Ok(self.mempool.process_transaction(tx, allow_orphan, rate_limit)?)
    }

    pub fn best_block_hash(&self) -> Result<BlockHash, NodeError> {
        Ok(self.blockchain_db.best_block_hash()?)
    }

    pub fn best_height(&self) -> Result<u64, NodeError> {
        Ok(self.blockchain_db.best_height()?)
    }

    pub fn best_header(&self) -> Result<BlockHeader, NodeError> {
        Ok(self.blockchain_db.best_header()?)
    }

    pub fn fetch_block_by_hash(&self, hash: &BlockHash) -> Result<Option<Arc<Block>>, NodeError> {
        Ok(self.blockchain_db.fetch_block_by_hash(hash)?)
    }

    pub fn fetch_block_by_height(&self, height: u64) -> Result<Option<Arc<Block>>, NodeError> {
        Ok(self.blockchain_db.fetch_block_by_height(height)?)
    }

    pub fn is_in_main_chain(&self, hash: &BlockHash) -> Result<bool, NodeError> {
        Ok(self.blockchain_db.is_in_main_chain(hash)?)
    }

    pub fn fetch_transaction(&self, tx_hash: &TxHash) -> Result<Option<Arc<Transaction>>, NodeError> {
        Ok(self.mempool.fetch_transaction(tx_hash)?)
    }
}

impl<B> Clone for NodeCore<B> {
    fn clone(&self) -> Self {
        Self {
            blockchain_db: self.blockchain_db.clone(),
            mempool: self.mempool.clone(),
            time_source: self.time_source.clone(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        chain_storage::MemoryDatabase,
        common::MedianTime,
        consensus::Network,
        mempool::{BoundedEventQueue, MempoolEvent},
        test_helpers::{append_block, create_block, spend_coinbase, BlockSpec, MockScriptEngine},
    };

    fn create_node() -> (NodeCore<MemoryDatabase>, Arc<BoundedEventQueue>) {
        let events = Arc::new(BoundedEventQueue::new(100));
        let node = NodeCore::from_config(
            MemoryDatabase::new(),
            &NodeConfig::default(),
            Arc::new(MockScriptEngine::default()),
            Arc::new(MedianTime::new()),
            events.clone(),
        )
        .unwrap();
        (node, events)
    }

    #[test]
    fn it_reports_orphans_and_duplicates() {
        let (node, _) = create_node();
        let db = node.blockchain_db();
        let genesis = db.fetch_block_by_height(0).unwrap().unwrap();
        let block_1 = create_block(db, &genesis, BlockSpec::new());
        let block_2 = create_block(db, &block_1, BlockSpec::new());

        assert!(node.process_block(block_2.clone(), BehaviorFlags::empty()).unwrap());
        assert!(!node.process_block(block_1.clone(), BehaviorFlags::empty()).unwrap());
        assert_eq!(node.best_block_hash().unwrap(), block_2.hash());
        assert!(!node.process_block(block_2, BehaviorFlags::empty()).unwrap());
        assert!(node.is_in_main_chain(&block_1.hash()).unwrap());
    }

    #[test]
    fn connected_blocks_clear_the_mempool() {
        let (node, events) = create_node();
        let db = node.blockchain_db();
        let maturity = db.rules().consensus_constants().coinbase_maturity() as usize;
        let genesis = db.fetch_block_by_height(0).unwrap().unwrap();
        let mut tip = append_block(db, &genesis, BlockSpec::new()).unwrap();
        let funding = tip.clone();
        for _ in 0..maturity {
            tip = append_block(db, &tip, BlockSpec::new()).unwrap();
        }

        let tx = Arc::new(spend_coinbase(&funding, 10_000));
        assert!(!node.process_transaction(tx.clone(), false, false).unwrap());
        assert_eq!(node.mempool().count().unwrap(), 1);
        assert!(matches!(
            events.drain().as_slice(),
            [MempoolEvent::TransactionAccepted { is_new: true, .. }]
        ));

        let block = create_block(db, &tip, BlockSpec::new().with_transactions(vec![(*tx).clone()]));
        let result = node.process_block_with_events(block, BehaviorFlags::empty()).unwrap();
        result.assert_reorg(1, 0);
        assert_eq!(node.mempool().count().unwrap(), 0);
        assert!(matches!(
            events.drain().as_slice(),
            [MempoolEvent::TransactionRemoved { hash }] if *hash == tx.hash()
        ));
    }
}
