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
    blocks::{Block, BlockHeader},
    chain_storage::ChainStorageError,
    transactions::Transaction,
    types::{BlockHash, TxHash},
};

/// A transaction as recorded on the main chain, with the spend state of each of its outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTx {
    pub tx: Arc<Transaction>,
    pub block_height: u64,
    /// One flag per output, set when a later main chain transaction spends the output
    pub spent: Vec<bool>,
}

/// Identify behaviour for the durable store of the main chain. Only main chain blocks are stored; side chains live in
/// memory in the block index until they are reorganised onto the main chain.
///
/// Implementations must support `Send` and `Sync` so that `BlockchainDatabase` can be thread-safe. Writes are
/// expected to be atomic: `insert_block` and `drop_after_block_by_hash` either apply completely or not at all.
pub trait BlockchainBackend: Send + Sync {
    /// Fetch a main chain block by hash.
    fn fetch_block_by_hash(&self, hash: &BlockHash) -> Result<Option<Arc<Block>>, ChainStorageError>;
    /// Fetch the header of a main chain block.
    fn fetch_header_by_hash(&self, hash: &BlockHash) -> Result<Option<BlockHeader>, ChainStorageError>;
    /// Fetch the height of a main chain block.
    fn fetch_height_by_hash(&self, hash: &BlockHash) -> Result<Option<u64>, ChainStorageError>;
    /// Fetch the hash of the main chain block at the given height.
    fn fetch_hash_by_height(&self, height: u64) -> Result<Option<BlockHash>, ChainStorageError>;
    /// Fetch the hashes of the main chain blocks in `start..end`. Heights above the tip are skipped.
    fn fetch_hash_range(&self, start: u64, end: u64) -> Result<Vec<BlockHash>, ChainStorageError>;
    /// Returns true if the block is on the main chain.
    fn block_exists(&self, hash: &BlockHash) -> Result<bool, ChainStorageError>;
    /// The hash and height of the main chain tip, or None if the store is empty.
    fn newest_hash(&self) -> Result<Option<(BlockHash, u64)>, ChainStorageError>;
    /// Fetch the newest main chain instance of a transaction together with its spend state.
    fn fetch_tx_by_hash(&self, hash: &TxHash) -> Result<Option<StoredTx>, ChainStorageError>;
    /// Append a block to the main chain. The block must build on the current tip, and every output it spends must be
    /// recorded, which marks that output as spent.
    fn insert_block(&mut self, block: Arc<Block>) -> Result<(), ChainStorageError>;
    /// Remove every block above the given one from the main chain, undoing their spends.
    fn drop_after_block_by_hash(&mut self, hash: &BlockHash) -> Result<(), ChainStorageError>;
}
