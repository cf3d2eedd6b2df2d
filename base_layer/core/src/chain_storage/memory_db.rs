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

//! This is a memory-based blockchain database, generally only useful for testing purposes and for embedders that
//! do not need the main chain to survive a restart.

use std::{collections::HashMap, sync::Arc};

use log::*;

use crate::{
    blocks::{Block, BlockHeader},
    chain_storage::{BlockchainBackend, ChainStorageError, StoredTx},
    transactions::Transaction,
    types::{BlockHash, TxHash},
};

const LOG_TARGET: &str = "c::cs::memory_db";

#[derive(Debug, Clone)]
struct TxRecord {
    tx: Arc<Transaction>,
    block_height: u64,
    spent: Vec<bool>,
}

/// A memory-backed main chain store. Blocks are indexed by height and hash, and every transaction instance keeps a
/// spent flag per output. A transaction hash may appear more than once on the chain once the earlier instance is
/// fully spent; lookups return the newest instance.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    blocks: Vec<Arc<Block>>,
    height_by_hash: HashMap<BlockHash, u64>,
    txs: HashMap<TxHash, Vec<TxRecord>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blocks on the main chain, including the genesis block
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Records a transaction at the given height, marking the outputs it spends. Nothing is changed if one of the
    /// spent outputs is unknown.
    fn apply_tx(&mut self, tx: &Arc<Transaction>, height: u64) -> Result<(), ChainStorageError> {
        if !tx.is_coinbase() {
            for input in &tx.inputs {
                let outpoint = &input.previous_output;
                let record = self
                    .txs
                    .get(&outpoint.hash)
                    .and_then(|records| records.last())
                    .ok_or_else(|| ChainStorageError::ValueNotFound {
                        entity: "Transaction",
                        field: "hash",
                        value: outpoint.hash.to_hex(),
                    })?;
                if outpoint.index as usize >= record.spent.len() {
                    return Err(ChainStorageError::InvalidOperation(format!(
                        "Output {} does not exist",
                        outpoint
                    )));
                }
            }
            self.set_spent(tx, true);
        }
        self.txs.entry(tx.hash()).or_default().push(TxRecord {
            tx: tx.clone(),
            block_height: height,
            spent: vec![false; tx.outputs.len()],
        });
        Ok(())
    }

    fn undo_tx(&mut self, tx: &Transaction) {
        let tx_hash = tx.hash();
        if let Some(records) = self.txs.get_mut(&tx_hash) {
            records.pop();
            if records.is_empty() {
                self.txs.remove(&tx_hash);
            }
        }
        if !tx.is_coinbase() {
            self.set_spent(tx, false);
        }
    }

    fn set_spent(&mut self, tx: &Transaction, spent: bool) {
        for input in &tx.inputs {
            let outpoint = &input.previous_output;
            let flag = self
                .txs
                .get_mut(&outpoint.hash)
                .and_then(|records| records.last_mut())
                .and_then(|record| record.spent.get_mut(outpoint.index as usize));
            match flag {
                Some(flag) => *flag = spent,
                None => warn!(
                    target: LOG_TARGET,
                    "Transaction {} spends output {} which is not in the store",
                    tx.hash(),
                    outpoint
                ),
            }
        }
    }
}

impl BlockchainBackend for MemoryDatabase {
    fn fetch_block_by_hash(&self, hash: &BlockHash) -> Result<Option<Arc<Block>>, ChainStorageError> {
        Ok(self
            .height_by_hash
            .get(hash)
            .and_then(|height| self.blocks.get(*height as usize))
            .cloned())
    }

    fn fetch_header_by_hash(&self, hash: &BlockHash) -> Result<Option<BlockHeader>, ChainStorageError> {
        Ok(self.fetch_block_by_hash(hash)?.map(|block| block.header.clone()))
    }

    fn fetch_height_by_hash(&self, hash: &BlockHash) -> Result<Option<u64>, ChainStorageError> {
        Ok(self.height_by_hash.get(hash).copied())
    }

    fn fetch_hash_by_height(&self, height: u64) -> Result<Option<BlockHash>, ChainStorageError> {
        Ok(self.blocks.get(height as usize).map(|block| block.hash()))
    }

    fn fetch_hash_range(&self, start: u64, end: u64) -> Result<Vec<BlockHash>, ChainStorageError> {
        if start > end {
            return Err(ChainStorageError::InvalidOperation(format!(
                "Invalid height range {}..{}",
                start, end
            )));
        }
        Ok((start..end)
            .map_while(|height| self.blocks.get(height as usize))
            .map(|block| block.hash())
            .collect())
    }

    fn block_exists(&self, hash: &BlockHash) -> Result<bool, ChainStorageError> {
        Ok(self.height_by_hash.contains_key(hash))
    }

    fn newest_hash(&self) -> Result<Option<(BlockHash, u64)>, ChainStorageError> {
        Ok(self
            .blocks
            .last()
            .map(|block| (block.hash(), self.blocks.len() as u64 - 1)))
    }

    fn fetch_tx_by_hash(&self, hash: &TxHash) -> Result<Option<StoredTx>, ChainStorageError> {
        Ok(self
            .txs
            .get(hash)
            .and_then(|records| records.last())
            .map(|record| StoredTx {
                tx: record.tx.clone(),
                block_height: record.block_height,
                spent: record.spent.clone(),
            }))
    }

    fn insert_block(&mut self, block: Arc<Block>) -> Result<(), ChainStorageError> {
        let height = self.blocks.len() as u64;
        if block.header.height != height {
            return Err(ChainStorageError::InvalidOperation(format!(
                "Block {} has height {} but the next main chain height is {}",
                block.hash(),
                block.header.height,
                height
            )));
        }
        if let Some(tip) = self.blocks.last() {
            if block.header.prev_hash != tip.hash() {
                return Err(ChainStorageError::InvalidOperation(format!(
                    "Block {} does not build on the main chain tip {}",
                    block.hash(),
                    tip.hash()
                )));
            }
        }
        // Spends are applied transaction by transaction so that outputs created earlier in the same block can be
        // spent by later ones.
        for (i, tx) in block.transactions.iter().enumerate() {
            if let Err(err) = self.apply_tx(tx, height) {
                for applied in block.transactions[..i].iter().rev() {
                    self.undo_tx(applied);
                }
                return Err(err);
            }
        }
        self.height_by_hash.insert(block.hash(), height);
        self.blocks.push(block);
        trace!(target: LOG_TARGET, "Inserted block at height {}", height);
        Ok(())
    }

    fn drop_after_block_by_hash(&mut self, hash: &BlockHash) -> Result<(), ChainStorageError> {
        let height = *self
            .height_by_hash
            .get(hash)
            .ok_or_else(|| ChainStorageError::ValueNotFound {
                entity: "Block",
                field: "hash",
                value: hash.to_hex(),
            })?;
        while self.blocks.len() as u64 > height + 1 {
            let block = match self.blocks.pop() {
                Some(block) => block,
                None => break,
            };
            for tx in block.transactions.iter().rev() {
                self.undo_tx(tx);
            }
            self.height_by_hash.remove(&block.hash());
            trace!(target: LOG_TARGET, "Dropped block {} at height {}", block.hash(), block.height());
        }
        Ok(())
    }
}
