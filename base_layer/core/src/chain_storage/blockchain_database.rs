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

use std::{
    cmp::Ordering,
    collections::{HashSet, VecDeque},
    sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use log::*;

use crate::{
    blocks::{Block, BlockHeader},
    chain_storage::{
        fetch_tx_store_main,
        BehaviorFlags,
        BlockAddResult,
        BlockNode,
        BlockchainBackend,
        BlockchainDatabaseConfig,
        ChainEvent,
        ChainState,
        ChainStorageError,
        OrNotFound,
        OrphanBlockPool,
        TxStore,
    },
    common::MedianTimeSource,
    consensus::{Checkpoint, ConsensusManager},
    script::{HashCache, ScriptEngine, SigCache},
    transactions::Transaction,
    types::{BlockHash, TxHash},
    validation::{
        calc_sequence_lock,
        check_block_context,
        check_block_sanity,
        check_checkpoint_constraints,
        check_connect_block,
        find_previous_checkpoint,
        SequenceLock,
    },
};

const LOG_TARGET: &str = "c::cs::database";

/// The block acceptance engine and the read interface to the chain.
///
/// `process_block` calls are serialised by a process lock. The block index and the backend each sit behind their own
/// read/write lock so that queries can proceed while a block is being processed; when both are needed the index lock
/// is always taken first. Script validation runs without holding either lock.
///
/// Cloning is cheap and every clone refers to the same chain.
pub struct BlockchainDatabase<B> {
    db: Arc<RwLock<B>>,
    state: Arc<RwLock<ChainState>>,
    orphans: Arc<RwLock<OrphanBlockPool>>,
    process_lock: Arc<Mutex<()>>,
    rules: ConsensusManager,
    config: BlockchainDatabaseConfig,
    script_engine: Arc<dyn ScriptEngine>,
    sig_cache: Arc<SigCache>,
    hash_cache: Arc<HashCache>,
}

impl<B> BlockchainDatabase<B>
where B: BlockchainBackend
{
    /// Creates a new `BlockchainDatabase` using the provided backend. An empty backend is initialised with the genesis
    /// block of the network, otherwise the stored genesis block must match it.
    pub fn new(
        mut db: B,
        rules: ConsensusManager,
        config: BlockchainDatabaseConfig,
        script_engine: Arc<dyn ScriptEngine>,
    ) -> Result<Self, ChainStorageError> {
        let genesis = rules.get_genesis_block();
        match db.fetch_hash_by_height(0)? {
            None => {
                info!(
                    target: LOG_TARGET,
                    "Blockchain db is empty. Adding genesis block {}.",
                    genesis.hash()
                );
                db.insert_block(genesis.clone())?;
            },
            Some(hash) if hash != rules.genesis_hash() => {
                error!(
                    target: LOG_TARGET,
                    "Genesis block in the database {} does not match the {} genesis block {}",
                    hash,
                    rules.network(),
                    rules.genesis_hash()
                );
                return Err(ChainStorageError::CorruptedDatabase(
                    "Genesis block in database does not match the network genesis block".to_string(),
                ));
            },
            Some(_) => {},
        }

        let mut state = ChainState::new(
            config.min_memory_nodes,
            rules.consensus_constants().median_time_blocks(),
            genesis.header.timestamp,
        );
        state.generate_initial_index(&db)?;
        let orphans = OrphanBlockPool::new(config.orphan_block_capacity, config.orphan_block_ttl);
        let sig_cache = SigCache::new(config.sig_cache_max_entries);

        Ok(Self {
            db: Arc::new(RwLock::new(db)),
            state: Arc::new(RwLock::new(state)),
            orphans: Arc::new(RwLock::new(orphans)),
            process_lock: Arc::new(Mutex::new(())),
            rules,
            config,
            script_engine,
            sig_cache: Arc::new(sig_cache),
            hash_cache: Arc::new(HashCache::new()),
        })
    }

    pub fn rules(&self) -> &ConsensusManager {
        &self.rules
    }

    pub fn config(&self) -> &BlockchainDatabaseConfig {
        &self.config
    }

    pub fn script_engine(&self) -> Arc<dyn ScriptEngine> {
        self.script_engine.clone()
    }

    /// The signature cache shared by block and transaction validation
    pub fn sig_cache(&self) -> Arc<SigCache> {
        self.sig_cache.clone()
    }

    /// The sighash midstate cache shared by block and transaction validation
    pub fn hash_cache(&self) -> Arc<HashCache> {
        self.hash_cache.clone()
    }

    fn state_read_access(&self) -> Result<RwLockReadGuard<'_, ChainState>, ChainStorageError> {
        self.state.read().map_err(|e| {
            error!(
                target: LOG_TARGET,
                "An attempt to get a read lock on the block index failed. {}", e
            );
            ChainStorageError::AccessError("Read lock on block index failed".into())
        })
    }

    fn state_write_access(&self) -> Result<RwLockWriteGuard<'_, ChainState>, ChainStorageError> {
        self.state.write().map_err(|e| {
            error!(
                target: LOG_TARGET,
                "An attempt to get a write lock on the block index failed. {}", e
            );
            ChainStorageError::AccessError("Write lock on block index failed".into())
        })
    }

    fn db_read_access(&self) -> Result<RwLockReadGuard<'_, B>, ChainStorageError> {
        self.db.read().map_err(|e| {
            error!(
                target: LOG_TARGET,
                "An attempt to get a read lock on the blockchain backend failed. {}", e
            );
            ChainStorageError::AccessError("Read lock on blockchain backend failed".into())
        })
    }

    fn db_write_access(&self) -> Result<RwLockWriteGuard<'_, B>, ChainStorageError> {
        self.db.write().map_err(|e| {
            error!(
                target: LOG_TARGET,
                "An attempt to get a write lock on the blockchain backend failed. {}", e
            );
            ChainStorageError::AccessError("Write lock on blockchain backend failed".into())
        })
    }

    fn orphans_read_access(&self) -> Result<RwLockReadGuard<'_, OrphanBlockPool>, ChainStorageError> {
        self.orphans
            .read()
            .map_err(|_| ChainStorageError::AccessError("Read lock on orphan block pool failed".into()))
    }

    fn orphans_write_access(&self) -> Result<RwLockWriteGuard<'_, OrphanBlockPool>, ChainStorageError> {
        self.orphans
            .write()
            .map_err(|_| ChainStorageError::AccessError("Write lock on orphan block pool failed".into()))
    }

    fn process_access(&self) -> Result<MutexGuard<'_, ()>, ChainStorageError> {
        self.process_lock
            .lock()
            .map_err(|_| ChainStorageError::AccessError("Block processing lock is poisoned".into()))
    }

    /// Processes a block received from a peer or produced locally.
    ///
    /// Returns
    /// * an empty result if the block is already known,
    /// * `is_orphan` if the block's parent is unknown, in which case the block is held until the parent arrives,
    /// * the chain events caused by the block otherwise, including those of any orphans it made connectable.
    ///
    /// A rule violation is returned as [ChainStorageError::ValidationError]; the chain is left as it was.
    pub fn process_block(
        &self,
        block: Arc<Block>,
        time_source: &dyn MedianTimeSource,
        flags: BehaviorFlags,
    ) -> Result<BlockAddResult, ChainStorageError> {
        let _guard = self.process_access()?;
        let hash = block.hash();
        let dry_run = flags.is_dry_run();
        trace!(target: LOG_TARGET, "Processing block {} ({:?})", hash, flags);

        if self.block_exists(&hash)? {
            debug!(target: LOG_TARGET, "Already have block {}", hash);
            return Ok(BlockAddResult::default());
        }
        if self.is_known_orphan(&hash)? {
            debug!(target: LOG_TARGET, "Already have orphan block {}", hash);
            return Ok(BlockAddResult::orphaned());
        }

        let constants = self.rules.consensus_constants();
        check_block_sanity(&block, constants, time_source)?;

        let checkpoint = find_previous_checkpoint(&*self.db_read_access()?, &self.rules)?;
        if let Some(checkpoint) = checkpoint {
            let checkpoint_header = self
                .db_read_access()?
                .fetch_header_by_hash(&checkpoint.hash)
                .or_not_found("BlockHeader", "hash", checkpoint.hash.to_hex())?;
            check_checkpoint_constraints(&block.header, &checkpoint_header, constants, flags)?;
        }

        let prev_hash = block.header.prev_hash;
        if !prev_hash.is_zero() && !self.block_exists(&prev_hash)? {
            if !dry_run {
                info!(
                    target: LOG_TARGET,
                    "Adding orphan block {} with parent {}", hash, prev_hash
                );
                self.orphans_write_access()?.add(block);
            }
            return Ok(BlockAddResult::orphaned());
        }

        let mut events = Vec::new();
        self.maybe_accept_block(block, flags, &mut events)?;
        if !dry_run {
            self.process_orphans(&hash, flags, &mut events)?;
        }
        debug!(target: LOG_TARGET, "Accepted block {}", hash);
        Ok(BlockAddResult {
            is_orphan: false,
            events,
        })
    }

    /// Processes every orphan that is connectable now that `hash` was accepted. The orphans are handled as a worklist
    /// so that long chains of orphans do not grow the stack. An orphan that breaks a rule is dropped.
    fn process_orphans(
        &self,
        hash: &BlockHash,
        flags: BehaviorFlags,
        events: &mut Vec<ChainEvent>,
    ) -> Result<(), ChainStorageError> {
        let mut accepted = VecDeque::from(vec![*hash]);
        while let Some(parent) = accepted.pop_front() {
            let children = self.orphans_write_access()?.take_children(&parent);
            for orphan in children {
                let orphan_hash = orphan.hash();
                match self.maybe_accept_block(orphan, flags, events) {
                    Ok(()) => {
                        debug!(target: LOG_TARGET, "Accepted orphan block {}", orphan_hash);
                        accepted.push_back(orphan_hash);
                    },
                    Err(ChainStorageError::ValidationError { source }) => {
                        warn!(
                            target: LOG_TARGET,
                            "Discarding orphan block {}: {}", orphan_hash, source
                        );
                    },
                    Err(err) => return Err(err),
                }
            }
        }
        Ok(())
    }

    /// Checks the block against its parent and adds it to the block index, connecting it to the best chain if it
    /// extends it or makes a side chain stronger. The parent must be known.
    fn maybe_accept_block(
        &self,
        block: Arc<Block>,
        flags: BehaviorFlags,
        events: &mut Vec<ChainEvent>,
    ) -> Result<(), ChainStorageError> {
        let hash = block.hash();
        let dry_run = flags.is_dry_run();
        let node = {
            let mut state = self.state_write_access()?;
            let db = self.db_read_access()?;
            if !dry_run {
                state.prune_block_nodes()?;
            }
            let prev = state.get_prev_node_from_block(&*db, &block)?;
            if prev.is_none() && hash != self.rules.genesis_hash() {
                return Err(ChainStorageError::InvalidOperation(format!(
                    "Block {} does not have a parent but is not the genesis block",
                    hash
                )));
            }
            check_block_context(&mut state, &*db, &block, prev.as_ref(), &self.rules, flags)?;

            let mut node = BlockNode::new(&block.header);
            if let Some(prev) = prev {
                let parent = state.get_node(&prev)?;
                node.capsum = parent.capsum.saturating_add(node.work);
                node.parent = Some(prev);
            }
            node
        };

        self.connect_best_chain(node, block.clone(), flags, events)?;
        if !dry_run {
            events.push(ChainEvent::BlockAccepted(block));
        }
        Ok(())
    }

    /// Adds the node to the best chain if it extends the tip. Otherwise it is added to a side chain, and the chain is
    /// reorganised onto that side chain when it is now the strongest chain.
    fn connect_best_chain(
        &self,
        node: BlockNode,
        block: Arc<Block>,
        flags: BehaviorFlags,
        events: &mut Vec<ChainEvent>,
    ) -> Result<(), ChainStorageError> {
        let hash = node.hash;
        let dry_run = flags.is_dry_run();
        let extends_tip = self
            .state_read_access()?
            .best_hash()
            .map_or(true, |best| best == node.prev_hash);

        if extends_tip {
            if !flags.is_fast_add() {
                self.check_connect(&block, node.parent.as_ref())?;
            }
            if dry_run {
                return Ok(());
            }
            self.state_write_access()?.insert_node(node);
            if let Err(err) = self.connect_block(&hash, block, events) {
                self.state_write_access()?.remove_node(&hash);
                return Err(err);
            }
            return Ok(());
        }

        if flags.is_fast_add() {
            warn!(
                target: LOG_TARGET,
                "Fast add was requested for side chain block {}, running the full checks", hash
            );
        }
        {
            let mut state = self.state_write_access()?;
            state.cache_block(block);
            state.insert_node(node);
        }
        let result = self.activate_side_chain(&hash, flags, events);
        if dry_run {
            self.state_write_access()?.remove_node(&hash);
        }
        result
    }

    /// Reorganises onto the side chain ending at `hash` if it is stronger than the best chain
    fn activate_side_chain(
        &self,
        hash: &BlockHash,
        flags: BehaviorFlags,
        events: &mut Vec<ChainEvent>,
    ) -> Result<(), ChainStorageError> {
        let (detach, attach) = {
            let state = self.state_read_access()?;
            let node = state.get_node(hash)?;
            let best = state.best_chain().ok_or_else(|| ChainStorageError::DataInconsistencyDetected {
                function: "activate_side_chain",
                details: "The block index has no best chain".to_string(),
            })?;
            if self.rules.chain_strength_comparer().compare(node, best) != Ordering::Greater {
                match state.fork_point(hash) {
                    Some(fork) if Some(fork.hash) == node.parent => info!(
                        target: LOG_TARGET,
                        "FORK: Block {} forks the chain at height {}/block {}, but does not cause a reorganize. \
                         Work: {}",
                        hash,
                        fork.height,
                        fork.hash,
                        node.capsum
                    ),
                    Some(fork) => info!(
                        target: LOG_TARGET,
                        "EXTEND FORK: Block {} extends a side chain which forks the chain at height {}/block {}",
                        hash,
                        fork.height,
                        fork.hash
                    ),
                    None => debug!(
                        target: LOG_TARGET,
                        "Block {} was added to a side chain without a fork point in the block index", hash
                    ),
                }
                return Ok(());
            }
            state.get_reorganize_nodes(hash)?
        };
        self.reorganize_chain(&detach, &attach, flags, events)
    }

    /// Runs the connect time checks of a block building on `prev`, followed by its script checks. The locks are only
    /// held while the transaction store is assembled.
    fn check_connect(&self, block: &Block, prev: Option<&BlockHash>) -> Result<(), ChainStorageError> {
        let scripts = {
            let mut state = self.state_write_access()?;
            let db = self.db_read_access()?;
            check_connect_block(
                &mut state,
                &*db,
                block,
                prev,
                &self.rules,
                &self.hash_cache,
                self.config.no_script_verify,
            )?
        };
        if let Some(scripts) = scripts {
            scripts.validate(self.script_engine.clone(), self.sig_cache.clone(), &self.hash_cache)?;
        }
        Ok(())
    }

    /// Appends a block whose node is already in the index to the main chain
    fn connect_block(
        &self,
        hash: &BlockHash,
        block: Arc<Block>,
        events: &mut Vec<ChainEvent>,
    ) -> Result<(), ChainStorageError> {
        {
            let mut state = self.state_write_access()?;
            let mut db = self.db_write_access()?;
            db.insert_block(block.clone())?;
            state.set_in_main_chain(hash, true);
            state.uncache_block(hash);
            state.set_best_chain(Some(*hash));
        }
        debug!(
            target: LOG_TARGET,
            "Block {} connected at height {}",
            hash,
            block.height()
        );
        events.push(ChainEvent::BlockConnected(block));
        Ok(())
    }

    /// Removes the main chain tip. The block is kept in the block cache since it is now a side chain block.
    fn disconnect_block(&self, hash: &BlockHash, events: &mut Vec<ChainEvent>) -> Result<(), ChainStorageError> {
        let block = {
            let mut state = self.state_write_access()?;
            let mut db = self.db_write_access()?;
            let prev_hash = state.get_node(hash)?.prev_hash;
            let block = db
                .fetch_block_by_hash(hash)
                .or_not_found("Block", "hash", hash.to_hex())?;
            db.drop_after_block_by_hash(&prev_hash)?;
            state.set_in_main_chain(hash, false);
            state.cache_block(block.clone());
            state.set_best_chain(Some(prev_hash));
            block
        };
        debug!(
            target: LOG_TARGET,
            "Block {} disconnected from height {}",
            hash,
            block.height()
        );
        events.push(ChainEvent::BlockDisconnected(block));
        Ok(())
    }

    /// Detaches the `detach` blocks (tip first) and attaches the `attach` blocks (fork point first). Every attached
    /// block is validated before anything is changed, so a failed reorganisation leaves the main chain untouched.
    fn reorganize_chain(
        &self,
        detach: &[BlockHash],
        attach: &[BlockHash],
        flags: BehaviorFlags,
        events: &mut Vec<ChainEvent>,
    ) -> Result<(), ChainStorageError> {
        let mut attach_blocks = Vec::with_capacity(attach.len());
        for hash in attach {
            let (block, parent) = {
                let state = self.state_read_access()?;
                let block =
                    state
                        .cached_block(hash)
                        .ok_or_else(|| ChainStorageError::DataInconsistencyDetected {
                            function: "reorganize_chain",
                            details: format!("Side chain block {} is not in the block cache", hash),
                        })?;
                (block, state.get_node(hash)?.parent)
            };
            // Fast add only applies to blocks extending the tip
            self.check_connect(&block, parent.as_ref())?;
            attach_blocks.push(block);
        }
        if flags.is_dry_run() {
            return Ok(());
        }

        let (fork, old_tip) = {
            let state = self.state_read_access()?;
            let fork = attach
                .first()
                .and_then(|hash| state.node(hash))
                .and_then(|node| node.parent)
                .and_then(|parent| state.node(&parent))
                .map(|node| (node.hash, node.height));
            let old_tip = state.best_chain().map(|node| (node.hash, node.height));
            (fork, old_tip)
        };

        for hash in detach {
            self.disconnect_block(hash, events)?;
        }
        for (hash, block) in attach.iter().zip(attach_blocks) {
            self.connect_block(hash, block, events)?;
        }

        if let Some((hash, height)) = fork {
            info!(
                target: LOG_TARGET,
                "REORGANIZE: Chain forks at {} (height {})", hash, height
            );
        }
        if let Some((hash, height)) = old_tip {
            info!(
                target: LOG_TARGET,
                "REORGANIZE: Old best chain head was {} (height {})", hash, height
            );
        }
        if let Some(node) = self.state_read_access()?.best_chain() {
            info!(
                target: LOG_TARGET,
                "REORGANIZE: New best chain head is {} (height {})", node.hash, node.height
            );
        }
        Ok(())
    }

    /// The hash of the best chain tip
    pub fn best_block_hash(&self) -> Result<BlockHash, ChainStorageError> {
        self.state_read_access()?
            .best_hash()
            .ok_or_else(|| ChainStorageError::ValueNotFound {
                entity: "BlockNode",
                field: "best_chain",
                value: "tip".to_string(),
            })
    }

    /// The height of the best chain tip
    pub fn best_height(&self) -> Result<u64, ChainStorageError> {
        let state = self.state_read_access()?;
        let best = state.best_chain().ok_or_else(|| ChainStorageError::ValueNotFound {
            entity: "BlockNode",
            field: "best_chain",
            value: "tip".to_string(),
        })?;
        Ok(best.height)
    }

    pub fn best_header(&self) -> Result<BlockHeader, ChainStorageError> {
        let hash = self.best_block_hash()?;
        self.fetch_header_by_hash(&hash)
            .or_not_found("BlockHeader", "hash", hash.to_hex())
    }

    /// Fetches a main chain block, or a side chain block that is held in the block cache
    pub fn fetch_block_by_hash(&self, hash: &BlockHash) -> Result<Option<Arc<Block>>, ChainStorageError> {
        let state = self.state_read_access()?;
        if let Some(block) = self.db_read_access()?.fetch_block_by_hash(hash)? {
            return Ok(Some(block));
        }
        Ok(state.cached_block(hash))
    }

    /// Fetches the main chain block at the given height
    pub fn fetch_block_by_height(&self, height: u64) -> Result<Option<Arc<Block>>, ChainStorageError> {
        let db = self.db_read_access()?;
        match db.fetch_hash_by_height(height)? {
            Some(hash) => db.fetch_block_by_hash(&hash),
            None => Ok(None),
        }
    }

    pub fn fetch_header_by_hash(&self, hash: &BlockHash) -> Result<Option<BlockHeader>, ChainStorageError> {
        let state = self.state_read_access()?;
        if let Some(header) = self.db_read_access()?.fetch_header_by_hash(hash)? {
            return Ok(Some(header));
        }
        Ok(state.cached_block(hash).map(|block| block.header.clone()))
    }

    /// Returns true if the block is part of the best chain
    pub fn is_in_main_chain(&self, hash: &BlockHash) -> Result<bool, ChainStorageError> {
        let state = self.state_read_access()?;
        if let Some(node) = state.node(hash) {
            return Ok(node.in_main_chain);
        }
        self.db_read_access()?.block_exists(hash)
    }

    /// Returns true if the block is on the main chain or on a side chain in the block index. Orphans are not included.
    pub fn block_exists(&self, hash: &BlockHash) -> Result<bool, ChainStorageError> {
        let state = self.state_read_access()?;
        if state.contains(hash) {
            return Ok(true);
        }
        self.db_read_access()?.block_exists(hash)
    }

    pub fn is_known_orphan(&self, hash: &BlockHash) -> Result<bool, ChainStorageError> {
        Ok(self.orphans_read_access()?.contains(hash))
    }

    /// The first block of the chain of orphans ending at `hash`. Its parent is the block that needs to be requested.
    pub fn orphan_root(&self, hash: &BlockHash) -> Result<BlockHash, ChainStorageError> {
        Ok(self.orphans_read_access()?.orphan_root(hash))
    }

    pub fn orphan_count(&self) -> Result<usize, ChainStorageError> {
        Ok(self.orphans_read_access()?.len())
    }

    pub fn latest_checkpoint(&self) -> Option<Checkpoint> {
        self.rules.latest_checkpoint().copied()
    }

    /// The past median time of the best chain tip, which is the time a transaction entering the next block has to
    /// be final at
    pub fn past_median_time_of_tip(&self) -> Result<u64, ChainStorageError> {
        let mut state = self.state_write_access()?;
        let db = self.db_read_access()?;
        let tip = state.best_hash();
        state.past_median_time(&*db, tip.as_ref())
    }

    /// The sequence lock of a transaction that would be included in the block after the best chain tip. Every input
    /// of the transaction must be in `store`.
    pub fn calc_sequence_lock(&self, tx: &Transaction, store: &TxStore) -> Result<SequenceLock, ChainStorageError> {
        let mut state = self.state_write_access()?;
        let db = self.db_read_access()?;
        let tip = state.best_hash();
        calc_sequence_lock(&mut state, &*db, tip.as_ref(), tx, store)
    }

    /// Fetches the requested transactions as seen from the best chain tip. Unless `include_spent` is set, fully spent
    /// transactions are reported as missing.
    pub fn fetch_transaction_store(
        &self,
        hashes: &HashSet<TxHash>,
        include_spent: bool,
    ) -> Result<TxStore, ChainStorageError> {
        let db = self.db_read_access()?;
        fetch_tx_store_main(&*db, hashes, include_spent)
    }
}

impl<B> Clone for BlockchainDatabase<B> {
    fn clone(&self) -> Self {
        BlockchainDatabase {
            db: self.db.clone(),
            state: self.state.clone(),
            orphans: self.orphans.clone(),
            process_lock: self.process_lock.clone(),
            rules: self.rules.clone(),
            config: self.config.clone(),
            script_engine: self.script_engine.clone(),
            sig_cache: self.sig_cache.clone(),
            hash_cache: self.hash_cache.clone(),
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
        test_helpers::{append_block, create_new_blockchain, BlockSpec},
    };

    #[test]
    fn genesis_is_inserted_into_an_empty_backend() {
        let db = create_new_blockchain(Network::RegTest);
        assert_eq!(db.best_height().unwrap(), 0);
        assert_eq!(db.best_block_hash().unwrap(), db.rules().genesis_hash());
        assert!(db.is_in_main_chain(&db.rules().genesis_hash()).unwrap());
    }

    #[test]
    fn a_mismatched_genesis_is_rejected() {
        let rules = ConsensusManager::builder(Network::RegTest).build();
        let mut backend = MemoryDatabase::new();
        let other = crate::blocks::genesis_block::get_mainnet_genesis_block();
        backend.insert_block(Arc::new(other)).unwrap();
        let result = BlockchainDatabase::new(
            backend,
            rules,
            BlockchainDatabaseConfig::default(),
            Arc::new(crate::test_helpers::MockScriptEngine::default()),
        );
        assert!(matches!(result, Err(ChainStorageError::CorruptedDatabase(_))));
    }

    #[test]
    fn duplicates_and_orphans() {
        let db = create_new_blockchain(Network::RegTest);
        let genesis = db.fetch_block_by_height(0).unwrap().unwrap();
        let block_1 = append_block(&db, &genesis, BlockSpec::default()).unwrap();

        let result = db
            .process_block(block_1.clone(), &MedianTime::new(), BehaviorFlags::empty())
            .unwrap();
        assert_eq!(result, BlockAddResult::default());

        let block_2 = crate::test_helpers::create_block(&db, &block_1, BlockSpec::default());
        let block_3 = crate::test_helpers::create_block(&db, &block_2, BlockSpec::default());
        let result = db
            .process_block(block_3.clone(), &MedianTime::new(), BehaviorFlags::empty())
            .unwrap();
        assert!(result.is_orphan);
        assert!(db.is_known_orphan(&block_3.hash()).unwrap());
        assert_eq!(db.orphan_root(&block_3.hash()).unwrap(), block_3.hash());

        let result = db
            .process_block(block_2.clone(), &MedianTime::new(), BehaviorFlags::empty())
            .unwrap();
        result.assert_reorg(2, 0);
        assert_eq!(db.best_block_hash().unwrap(), block_3.hash());
        assert!(!db.is_known_orphan(&block_3.hash()).unwrap());
    }

    #[test]
    fn dry_run_leaves_no_trace() {
        let db = create_new_blockchain(Network::RegTest);
        let genesis = db.fetch_block_by_height(0).unwrap().unwrap();
        let block_1 = crate::test_helpers::create_block(&db, &genesis, BlockSpec::default());
        let result = db
            .process_block(block_1.clone(), &MedianTime::new(), BehaviorFlags::DRY_RUN)
            .unwrap();
        assert!(result.events.is_empty());
        assert!(!db.block_exists(&block_1.hash()).unwrap());
        assert_eq!(db.best_height().unwrap(), 0);
    }
}
