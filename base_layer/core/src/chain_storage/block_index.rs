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

//! The in-memory block index.
//!
//! Every block the node knows about near the tip has a [BlockNode]. Nodes live in a single map keyed by block hash
//! and refer to their parent and children by hash. Main chain nodes that are deeper than `min_memory_nodes` behind
//! the tip are pruned from the index and lazily reloaded from the main chain store when they are needed again, e.g.
//! for median time or majority version walks.

use std::{collections::HashMap, sync::Arc};

use log::*;
use primitive_types::U256;

use crate::{
    blocks::{Block, BlockHeader},
    chain_storage::{BlockchainBackend, ChainStorageError},
    proof_of_work::calc_work,
    types::BlockHash,
};

const LOG_TARGET: &str = "c::cs::block_index";

/// Metadata of a block in the block index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockNode {
    pub hash: BlockHash,
    pub prev_hash: BlockHash,
    /// Set while the parent is linked in the index. Pruning the parent clears it.
    pub parent: Option<BlockHash>,
    pub children: Vec<BlockHash>,
    pub height: u64,
    pub version: u32,
    pub timestamp: u64,
    pub bits: u32,
    /// Work represented by this block alone
    pub work: U256,
    /// Accumulated work of the chain ending at this block
    pub capsum: U256,
    pub in_main_chain: bool,
}

impl BlockNode {
    /// A detached node for the header. The accumulated work is only this block's work until it is linked to a
    /// parent.
    pub fn new(header: &BlockHeader) -> Self {
        let work = calc_work(header.bits);
        Self {
            hash: header.hash(),
            prev_hash: header.prev_hash,
            parent: None,
            children: Vec::new(),
            height: header.height,
            version: header.version,
            timestamp: header.timestamp,
            bits: header.bits,
            work,
            capsum: work,
            in_main_chain: false,
        }
    }

    #[cfg(test)]
    pub fn test_node(hash: BlockHash, height: u64) -> Self {
        Self {
            hash,
            prev_hash: BlockHash::zero(),
            parent: None,
            children: Vec::new(),
            height,
            version: 1,
            timestamp: 0,
            bits: 0x207f_ffff,
            work: U256::one(),
            capsum: U256::one(),
            in_main_chain: false,
        }
    }
}

/// The block index: known nodes, the side chain blocks that may become main chain blocks after a reorg, the best
/// chain tip and the root of the in-memory tree.
#[derive(Debug)]
pub struct ChainState {
    index: HashMap<BlockHash, BlockNode>,
    /// Children by parent hash, used to link a lazily loaded parent to nodes that are already in the index
    dep_nodes: HashMap<BlockHash, Vec<BlockHash>>,
    block_cache: HashMap<BlockHash, Arc<Block>>,
    best_chain: Option<BlockHash>,
    root: Option<BlockHash>,
    min_memory_nodes: u64,
    median_time_blocks: usize,
    genesis_timestamp: u64,
}

impl ChainState {
    pub fn new(min_memory_nodes: u64, median_time_blocks: usize, genesis_timestamp: u64) -> Self {
        Self {
            index: HashMap::new(),
            dep_nodes: HashMap::new(),
            block_cache: HashMap::new(),
            best_chain: None,
            root: None,
            min_memory_nodes: min_memory_nodes.max(1),
            median_time_blocks: median_time_blocks.max(1),
            genesis_timestamp,
        }
    }

    pub fn node(&self, hash: &BlockHash) -> Option<&BlockNode> {
        self.index.get(hash)
    }

    /// Like [ChainState::node], but a missing node is an error.
    pub fn get_node(&self, hash: &BlockHash) -> Result<&BlockNode, ChainStorageError> {
        self.index.get(hash).ok_or_else(|| ChainStorageError::ValueNotFound {
            entity: "BlockNode",
            field: "hash",
            value: hash.to_hex(),
        })
    }

    pub fn contains(&self, hash: &BlockHash) -> bool {
        self.index.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn best_chain(&self) -> Option<&BlockNode> {
        self.best_chain.as_ref().and_then(|hash| self.index.get(hash))
    }

    pub fn best_hash(&self) -> Option<BlockHash> {
        self.best_chain
    }

    pub fn root(&self) -> Option<BlockHash> {
        self.root
    }

    pub(crate) fn set_best_chain(&mut self, hash: Option<BlockHash>) {
        self.best_chain = hash;
    }

    pub(crate) fn set_in_main_chain(&mut self, hash: &BlockHash, in_main_chain: bool) {
        if let Some(node) = self.index.get_mut(hash) {
            node.in_main_chain = in_main_chain;
        }
    }

    pub fn cached_block(&self, hash: &BlockHash) -> Option<Arc<Block>> {
        self.block_cache.get(hash).cloned()
    }

    pub(crate) fn cache_block(&mut self, block: Arc<Block>) {
        self.block_cache.insert(block.hash(), block);
    }

    pub(crate) fn uncache_block(&mut self, hash: &BlockHash) -> Option<Arc<Block>> {
        self.block_cache.remove(hash)
    }

    pub fn cached_block_count(&self) -> usize {
        self.block_cache.len()
    }

    /// Adds a node to the index and links it as a child of its parent, if the parent is present.
    pub(crate) fn insert_node(&mut self, node: BlockNode) {
        let hash = node.hash;
        let prev_hash = node.prev_hash;
        let parent = node.parent;
        self.index.insert(hash, node);
        let deps = self.dep_nodes.entry(prev_hash).or_default();
        if !deps.contains(&hash) {
            deps.push(hash);
        }
        if let Some(parent) = parent.and_then(|p| self.index.get_mut(&p)) {
            if !parent.children.contains(&hash) {
                parent.children.push(hash);
            }
        }
    }

    /// Removes every trace of a node that was added speculatively, including its cached block.
    pub(crate) fn remove_node(&mut self, hash: &BlockHash) {
        if let Some(node) = self.index.remove(hash) {
            self.remove_dependency(&node.prev_hash, hash);
            if let Some(parent) = node.parent.and_then(|p| self.index.get_mut(&p)) {
                parent.children.retain(|child| child != hash);
            }
        }
        self.block_cache.remove(hash);
    }

    fn remove_dependency(&mut self, prev_hash: &BlockHash, hash: &BlockHash) {
        if let Some(children) = self.dep_nodes.get_mut(prev_hash) {
            children.retain(|child| child != hash);
            if children.is_empty() {
                self.dep_nodes.remove(prev_hash);
            }
        }
    }

    /// Loads the main chain tip and up to `min_memory_nodes` blocks below it into an empty index.
    pub fn generate_initial_index<B: BlockchainBackend + ?Sized>(&mut self, db: &B) -> Result<(), ChainStorageError> {
        let (tip_hash, tip_height) = match db.newest_hash()? {
            Some(tip) => tip,
            None => return Ok(()),
        };
        let start = tip_height.saturating_sub(self.min_memory_nodes - 1);
        for hash in db.fetch_hash_range(start, tip_height + 1)? {
            self.load_block_node(db, &hash)?;
        }
        self.best_chain = Some(tip_hash);
        debug!(
            target: LOG_TARGET,
            "Loaded {} block nodes, tip is {} at height {}",
            self.index.len(),
            tip_hash,
            tip_height
        );
        Ok(())
    }

    /// Returns the node for a main chain block, loading it from the store when it is not in the index. The loaded
    /// node is linked to its parent when the parent is in the index, or to its children when they are. A node with
    /// neither is only accepted as the first node of an empty index.
    pub fn load_block_node<B: BlockchainBackend + ?Sized>(
        &mut self,
        db: &B,
        hash: &BlockHash,
    ) -> Result<BlockHash, ChainStorageError> {
        if self.index.contains_key(hash) {
            return Ok(*hash);
        }
        let header = db
            .fetch_header_by_hash(hash)?
            .ok_or_else(|| ChainStorageError::ValueNotFound {
                entity: "BlockHeader",
                field: "hash",
                value: hash.to_hex(),
            })?;
        let mut node = BlockNode::new(&header);
        node.in_main_chain = true;
        let prev_hash = header.prev_hash;

        if let Some(parent) = self.index.get_mut(&prev_hash) {
            node.capsum = parent.capsum.saturating_add(node.work);
            node.parent = Some(prev_hash);
            parent.children.push(*hash);
        } else if let Some(children) = self.dep_nodes.get(hash).cloned() {
            if let Some(first) = children.first().and_then(|child| self.index.get(child)) {
                node.capsum = first.capsum.saturating_sub(first.work);
            }
            for child in children {
                if let Some(child_node) = self.index.get_mut(&child) {
                    child_node.parent = Some(*hash);
                }
                node.children.push(child);
            }
            self.root = Some(*hash);
        } else {
            if self.root.is_some() {
                return Err(ChainStorageError::InvalidOperation(format!(
                    "Attempt to insert orphan block {} into the block index",
                    hash
                )));
            }
            // Work below the root is not loaded, so approximate it with this block's work
            node.capsum = node.work.saturating_mul(U256::from(header.height.saturating_add(1)));
            self.root = Some(*hash);
        }

        trace!(target: LOG_TARGET, "Loaded block node {} at height {}", hash, node.height);
        self.index.insert(*hash, node);
        let deps = self.dep_nodes.entry(prev_hash).or_default();
        if !deps.contains(hash) {
            deps.push(*hash);
        }
        Ok(*hash)
    }

    /// The node of the block's parent, loading it if needed. Returns None for a block without a parent.
    pub fn get_prev_node_from_block<B: BlockchainBackend + ?Sized>(
        &mut self,
        db: &B,
        block: &Block,
    ) -> Result<Option<BlockHash>, ChainStorageError> {
        let prev_hash = block.header.prev_hash;
        if prev_hash.is_zero() {
            return Ok(None);
        }
        if self.index.contains_key(&prev_hash) {
            return Ok(Some(prev_hash));
        }
        self.load_block_node(db, &prev_hash).map(Some)
    }

    /// The parent of a node in the index, loading it if it was pruned. Returns None for the genesis node.
    pub fn get_prev_node_from_node<B: BlockchainBackend + ?Sized>(
        &mut self,
        db: &B,
        hash: &BlockHash,
    ) -> Result<Option<BlockHash>, ChainStorageError> {
        let node = self.get_node(hash)?;
        if let Some(parent) = node.parent {
            return Ok(Some(parent));
        }
        let prev_hash = node.prev_hash;
        if prev_hash.is_zero() {
            return Ok(None);
        }
        if let Some(parent) = self.index.get_mut(&prev_hash) {
            if !parent.children.contains(hash) {
                parent.children.push(*hash);
            }
            if let Some(node) = self.index.get_mut(hash) {
                node.parent = Some(prev_hash);
            }
            return Ok(Some(prev_hash));
        }
        self.load_block_node(db, &prev_hash).map(Some)
    }

    /// The ancestor of the node at the given height, or None if the height is above the node.
    pub fn ancestor<B: BlockchainBackend + ?Sized>(
        &mut self,
        db: &B,
        hash: &BlockHash,
        height: u64,
    ) -> Result<Option<BlockHash>, ChainStorageError> {
        let mut current = *hash;
        let mut current_height = self.get_node(hash)?.height;
        if height > current_height {
            return Ok(None);
        }
        while current_height > height {
            current = match self.get_prev_node_from_node(db, &current)? {
                Some(prev) => prev,
                None => return Ok(None),
            };
            current_height = self.get_node(&current)?.height;
        }
        Ok(Some(current))
    }

    /// The median timestamp of the node and the blocks before it, up to the median time window. With no node the
    /// genesis timestamp is returned.
    pub fn past_median_time<B: BlockchainBackend + ?Sized>(
        &mut self,
        db: &B,
        hash: Option<&BlockHash>,
    ) -> Result<u64, ChainStorageError> {
        let mut iter = match hash {
            Some(hash) => Some(*hash),
            None => return Ok(self.genesis_timestamp),
        };
        let mut timestamps = Vec::with_capacity(self.median_time_blocks);
        while let Some(hash) = iter {
            timestamps.push(self.get_node(&hash)?.timestamp);
            if timestamps.len() == self.median_time_blocks {
                break;
            }
            iter = self.get_prev_node_from_node(db, &hash)?;
        }
        timestamps.sort_unstable();
        Ok(timestamps[timestamps.len() / 2])
    }

    /// Evicts main chain nodes that are more than `min_memory_nodes` behind the tip. Only the index is affected, the
    /// nodes can be reloaded from the store. Side chains forking off an evicted node are dropped with their cached
    /// blocks, they can no longer be reorganised onto.
    pub fn prune_block_nodes(&mut self) -> Result<(), ChainStorageError> {
        let mut new_root = match self.best_chain {
            Some(hash) => hash,
            None => return Ok(()),
        };
        for _ in 0..self.min_memory_nodes - 1 {
            match self.index.get(&new_root).and_then(|node| node.parent) {
                Some(parent) => new_root = parent,
                None => return Ok(()),
            }
        }

        let mut delete_nodes = Vec::new();
        let mut current = self.get_node(&new_root)?.parent;
        while let Some(hash) = current {
            delete_nodes.push(hash);
            current = self.index.get(&hash).and_then(|node| node.parent);
        }
        if delete_nodes.is_empty() {
            return Ok(());
        }
        let stale_side_nodes = delete_nodes
            .iter()
            .flat_map(|hash| self.side_chain_descendants(hash))
            .collect::<Vec<_>>();
        for hash in &stale_side_nodes {
            self.remove_node(hash);
        }
        // Remove oldest first so that every removed node is at the front of the chain
        for hash in delete_nodes.iter().rev() {
            self.remove_block_node(hash)?;
        }
        self.root = Some(new_root);
        trace!(
            target: LOG_TARGET,
            "Pruned {} block nodes and {} side chain nodes, new root is {}",
            delete_nodes.len(),
            stale_side_nodes.len(),
            new_root
        );
        Ok(())
    }

    /// Every side chain node descending from the given node
    fn side_chain_descendants(&self, hash: &BlockHash) -> Vec<BlockHash> {
        let mut found = Vec::new();
        let mut pending = match self.index.get(hash) {
            Some(node) => node.children.clone(),
            None => return found,
        };
        while let Some(child) = pending.pop() {
            match self.index.get(&child) {
                Some(node) if !node.in_main_chain => {
                    pending.extend(node.children.iter().copied());
                    found.push(child);
                },
                _ => {},
            }
        }
        found
    }

    fn remove_block_node(&mut self, hash: &BlockHash) -> Result<(), ChainStorageError> {
        if self.get_node(hash)?.parent.is_some() {
            return Err(ChainStorageError::InvalidOperation(format!(
                "Block node {} must be at the front of the chain to be removed",
                hash
            )));
        }
        let node = match self.index.remove(hash) {
            Some(node) => node,
            None => return Ok(()),
        };
        for child in &node.children {
            if let Some(child) = self.index.get_mut(child) {
                child.parent = None;
            }
        }
        self.remove_dependency(&node.prev_hash, hash);
        Ok(())
    }

    /// The nodes to detach from the tip down to the fork point (tip first) and the nodes to attach from the fork
    /// point up to the given node (fork first) to make that node the best chain tip.
    pub fn get_reorganize_nodes(
        &self,
        hash: &BlockHash,
    ) -> Result<(Vec<BlockHash>, Vec<BlockHash>), ChainStorageError> {
        let mut attach = Vec::new();
        let mut ancestor = *hash;
        loop {
            let node = self.get_node(&ancestor)?;
            if node.in_main_chain {
                break;
            }
            match node.parent {
                Some(parent) => {
                    attach.push(ancestor);
                    ancestor = parent;
                },
                None => {
                    return Err(ChainStorageError::DataInconsistencyDetected {
                        function: "get_reorganize_nodes",
                        details: format!("Side chain node {} has no parent in the index", ancestor),
                    })
                },
            }
        }
        attach.reverse();

        let mut detach = Vec::new();
        let mut current = self.best_chain;
        loop {
            let hash = match current {
                Some(hash) if hash == ancestor => break,
                Some(hash) => hash,
                None => {
                    return Err(ChainStorageError::DataInconsistencyDetected {
                        function: "get_reorganize_nodes",
                        details: format!("Fork point {} was not found below the best chain tip", ancestor),
                    })
                },
            };
            detach.push(hash);
            current = self.get_node(&hash)?.parent;
        }
        Ok((detach, attach))
    }

    /// The main chain node where the side chain containing the given node branches off
    pub fn fork_point(&self, hash: &BlockHash) -> Option<&BlockNode> {
        let mut node = self.index.get(hash)?;
        while !node.in_main_chain {
            node = self.index.get(node.parent.as_ref()?)?;
        }
        Some(node)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        blocks::BlockBuilder,
        chain_storage::MemoryDatabase,
        transactions::{OutPoint, Transaction, TxInput, TxOutput},
    };

    fn block_after(prev: Option<&Block>, timestamp: u64, tag: u8) -> Arc<Block> {
        let mut header = match prev {
            Some(prev) => BlockHeader::from_previous(&prev.header),
            None => BlockHeader::new(1),
        };
        header.timestamp = timestamp;
        header.bits = 0x207f_ffff;
        let coinbase = Transaction::new(
            1,
            vec![TxInput::new(OutPoint::null(), vec![tag, tag])],
            vec![TxOutput::new(1, vec![0x51])],
            0,
        );
        Arc::new(header.into_builder().with_transactions(vec![coinbase]).build())
    }

    /// A main chain of `len` blocks with timestamps 1000, 1010, ...
    fn main_chain(len: usize) -> (MemoryDatabase, Vec<Arc<Block>>) {
        let mut db = MemoryDatabase::new();
        let mut blocks: Vec<Arc<Block>> = Vec::new();
        for i in 0..len {
            let block = block_after(blocks.last().map(|b| b.as_ref()), 1000 + 10 * i as u64, 0);
            db.insert_block(block.clone()).unwrap();
            blocks.push(block);
        }
        (db, blocks)
    }

    #[test]
    fn initial_index_is_bounded_and_linked() {
        let (db, blocks) = main_chain(10);
        let mut state = ChainState::new(4, 11, 1000);
        state.generate_initial_index(&db).unwrap();
        assert_eq!(state.len(), 4);
        assert_eq!(state.best_hash(), Some(blocks[9].hash()));
        assert_eq!(state.root(), Some(blocks[6].hash()));
        let tip = state.best_chain().unwrap();
        assert_eq!(tip.parent, Some(blocks[8].hash()));
        assert!(tip.in_main_chain);
        let work = calc_work(0x207f_ffff);
        // The root's work is seeded for the whole chain below it
        assert_eq!(tip.capsum, work * U256::from(10u64));
    }

    #[test]
    fn ancestors_are_reloaded_on_demand() {
        let (db, blocks) = main_chain(10);
        let mut state = ChainState::new(3, 11, 1000);
        state.generate_initial_index(&db).unwrap();
        let tip = blocks[9].hash();
        let ancestor = state.ancestor(&db, &tip, 2).unwrap();
        assert_eq!(ancestor, Some(blocks[2].hash()));
        assert_eq!(state.root(), Some(blocks[2].hash()));
        let node = state.node(&blocks[3].hash()).unwrap();
        assert_eq!(node.parent, Some(blocks[2].hash()));
        assert_eq!(state.ancestor(&db, &tip, 11).unwrap(), None);
        assert_eq!(state.ancestor(&db, &tip, 9).unwrap(), Some(tip));
        // Accumulated work stays consistent across the reloaded nodes
        let n2 = state.node(&blocks[2].hash()).unwrap().capsum;
        let n3 = state.node(&blocks[3].hash()).unwrap().capsum;
        assert_eq!(n3 - n2, calc_work(0x207f_ffff));
    }

    #[test]
    fn past_median_time_uses_the_window() {
        let (db, blocks) = main_chain(15);
        let mut state = ChainState::new(2000, 11, 999);
        state.generate_initial_index(&db).unwrap();
        assert_eq!(state.past_median_time(&db, None).unwrap(), 999);
        // Three blocks: 1000, 1010, 1020 so the median is 1010
        assert_eq!(state.past_median_time(&db, Some(&blocks[2].hash())).unwrap(), 1010);
        // Two blocks: index 1 of the sorted pair
        assert_eq!(state.past_median_time(&db, Some(&blocks[1].hash())).unwrap(), 1010);
        // The window covers blocks 4..=14 so the median is block 9
        assert_eq!(
            state.past_median_time(&db, Some(&blocks[14].hash())).unwrap(),
            1000 + 10 * 9
        );
    }

    #[test]
    fn prune_keeps_min_memory_nodes() {
        let (db, blocks) = main_chain(10);
        let mut state = ChainState::new(2000, 11, 1000);
        state.generate_initial_index(&db).unwrap();
        assert_eq!(state.len(), 10);
        state.min_memory_nodes = 3;
        state.prune_block_nodes().unwrap();
        assert_eq!(state.len(), 3);
        assert_eq!(state.root(), Some(blocks[7].hash()));
        assert!(state.node(&blocks[7].hash()).unwrap().parent.is_none());
        assert!(!state.contains(&blocks[6].hash()));
    }

    /// Adds a side chain of `len` nodes on top of `prev`, caching the blocks
    fn add_side_chain(state: &mut ChainState, prev: &Arc<Block>, len: usize, tag: u8) -> Vec<BlockHash> {
        let mut prev = prev.clone();
        let mut side = Vec::new();
        for i in 0..len {
            let block = block_after(Some(prev.as_ref()), prev.header.timestamp + 1 + i as u64, tag);
            let mut node = BlockNode::new(&block.header);
            let parent = state.node(&prev.hash()).unwrap();
            node.parent = Some(parent.hash);
            node.capsum = parent.capsum + node.work;
            state.insert_node(node);
            state.cache_block(block.clone());
            side.push(block.hash());
            prev = block;
        }
        side
    }

    #[test]
    fn prune_drops_side_chains_below_the_new_root() {
        let (db, blocks) = main_chain(10);
        let mut state = ChainState::new(2000, 11, 1000);
        state.generate_initial_index(&db).unwrap();
        let stale = add_side_chain(&mut state, &blocks[3], 2, 7);
        let live = add_side_chain(&mut state, &blocks[8], 1, 8);
        assert_eq!(state.cached_block_count(), 3);

        state.min_memory_nodes = 3;
        state.prune_block_nodes().unwrap();
        assert!(stale.iter().all(|hash| !state.contains(hash)));
        assert!(stale.iter().all(|hash| state.cached_block(hash).is_none()));
        assert!(state.contains(&live[0]));
        assert_eq!(state.cached_block_count(), 1);
        assert_eq!(state.len(), 4);
    }

    #[test]
    fn reorganize_nodes_need_a_linked_fork_point() {
        let (db, blocks) = main_chain(10);
        let mut state = ChainState::new(2000, 11, 1000);
        state.generate_initial_index(&db).unwrap();
        let side = add_side_chain(&mut state, &blocks[2], 2, 7);

        // Unlink the side chain from its fork point
        state.index.get_mut(&side[0]).unwrap().parent = None;
        assert!(matches!(
            state.get_reorganize_nodes(&side[1]),
            Err(ChainStorageError::DataInconsistencyDetected { .. })
        ));

        // A main chain broken above the fork point
        state.index.get_mut(&side[0]).unwrap().parent = Some(blocks[2].hash());
        state.index.get_mut(&blocks[5].hash()).unwrap().parent = None;
        assert!(matches!(
            state.get_reorganize_nodes(&side[1]),
            Err(ChainStorageError::DataInconsistencyDetected { .. })
        ));
    }

    #[test]
    fn reorganize_nodes() {
        let (db, blocks) = main_chain(5);
        let mut state = ChainState::new(2000, 11, 1000);
        state.generate_initial_index(&db).unwrap();
        // Side chain branching off block 2
        let mut prev = blocks[2].clone();
        let mut side = Vec::new();
        for i in 0..3 {
            let block = block_after(Some(prev.as_ref()), 5000 + i, 9);
            let mut node = BlockNode::new(&block.header);
            let parent = state.node(&prev.hash()).unwrap();
            node.parent = Some(parent.hash);
            node.capsum = parent.capsum + node.work;
            state.insert_node(node);
            side.push(block.hash());
            prev = block;
        }
        let (detach, attach) = state.get_reorganize_nodes(&side[2]).unwrap();
        assert_eq!(detach, vec![blocks[4].hash(), blocks[3].hash()]);
        assert_eq!(attach, side);
        assert_eq!(state.fork_point(&side[2]).unwrap().hash, blocks[2].hash());
        assert_eq!(state.node(&blocks[2].hash()).unwrap().children.len(), 2);

        state.remove_node(&side[2]);
        assert!(!state.contains(&side[2]));
        assert!(state.node(&side[1]).unwrap().children.is_empty());
    }
}
