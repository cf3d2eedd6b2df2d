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

//! Point-of-view transaction stores.
//!
//! A [TxStore] answers "which transactions exist and which of their outputs are spent" as of a particular position in
//! the block tree. It is built on demand for a single validation and then discarded. The main chain store only knows
//! the current tip, so views for side chain positions are derived by undoing the main chain blocks above the fork
//! point and then replaying the side chain blocks up to the requested position.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use crate::{
    blocks::Block,
    chain_storage::{BlockchainBackend, ChainState, ChainStorageError},
    transactions::Transaction,
    types::{BlockHash, TxHash},
};

/// Height used for outputs of transactions that are in the mempool rather than in a block
pub const MEMPOOL_HEIGHT: u64 = 0x7fff_ffff;

/// The state of one transaction as seen from a point in the chain. `tx` is None when the transaction does not exist
/// at that point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxData {
    pub tx: Option<Arc<Transaction>>,
    pub hash: TxHash,
    pub block_height: u64,
    pub spent: Vec<bool>,
}

impl TxData {
    pub fn missing(hash: TxHash) -> Self {
        Self {
            tx: None,
            hash,
            block_height: 0,
            spent: Vec::new(),
        }
    }

    pub fn new(tx: Arc<Transaction>, block_height: u64) -> Self {
        let spent = vec![false; tx.outputs.len()];
        Self {
            hash: tx.hash(),
            tx: Some(tx),
            block_height,
            spent,
        }
    }

    pub fn is_missing(&self) -> bool {
        self.tx.is_none()
    }

    /// True when every output has been spent. A missing transaction counts as fully spent.
    pub fn is_fully_spent(&self) -> bool {
        self.tx.is_none() || self.spent.iter().all(|spent| *spent)
    }
}

pub type TxStore = HashMap<TxHash, TxData>;

/// Fetches the requested transactions from the main chain tip. Transactions that are not on the main chain are
/// returned as missing. When `include_spent` is false, fully spent transactions are reported as missing too.
pub fn fetch_tx_store_main<B: BlockchainBackend + ?Sized>(
    db: &B,
    hashes: &HashSet<TxHash>,
    include_spent: bool,
) -> Result<TxStore, ChainStorageError> {
    let mut store = TxStore::with_capacity(hashes.len());
    for hash in hashes {
        let data = match db.fetch_tx_by_hash(hash)? {
            Some(stored) => {
                let data = TxData {
                    tx: Some(stored.tx),
                    hash: *hash,
                    block_height: stored.block_height,
                    spent: stored.spent,
                };
                if !include_spent && data.is_fully_spent() {
                    TxData::missing(*hash)
                } else {
                    data
                }
            },
            None => TxData::missing(*hash),
        };
        store.insert(*hash, data);
    }
    Ok(store)
}

/// Fetches the requested transactions as seen by a block building on `prev`. When `prev` is the main chain tip the
/// main chain view is used directly. Otherwise the blocks between the tip and the fork point are undone and the side
/// chain blocks from the fork point up to `prev` are replayed from the block cache.
pub fn fetch_tx_store<B: BlockchainBackend + ?Sized>(
    state: &ChainState,
    db: &B,
    prev: Option<&BlockHash>,
    hashes: &HashSet<TxHash>,
) -> Result<TxStore, ChainStorageError> {
    let prev = match prev {
        Some(prev) if state.best_hash().map_or(false, |best| best != *prev) => prev,
        _ => return fetch_tx_store_main(db, hashes, false),
    };

    // Fully spent transactions are needed, undoing a block may unspend them
    let mut store = fetch_tx_store_main(db, hashes, true)?;
    let (detach, attach) = state.get_reorganize_nodes(prev)?;
    for hash in &detach {
        let block = db
            .fetch_block_by_hash(hash)?
            .ok_or_else(|| ChainStorageError::ValueNotFound {
                entity: "Block",
                field: "hash",
                value: hash.to_hex(),
            })?;
        disconnect_transactions(&mut store, &block);
    }
    for hash in &attach {
        let block = state
            .cached_block(hash)
            .ok_or_else(|| ChainStorageError::DataInconsistencyDetected {
                function: "fetch_tx_store",
                details: format!("Side chain block {} is not in the block cache", hash),
            })?;
        connect_transactions(&mut store, &block);
    }
    Ok(store)
}

/// Updates the store as if the block had been connected: transactions of the block that are tracked by the store are
/// set to their new state, and the outputs spent by the block are marked.
pub fn connect_transactions(store: &mut TxStore, block: &Block) {
    let height = block.height();
    for tx in &block.transactions {
        if let Some(data) = store.get_mut(&tx.hash()) {
            data.tx = Some(tx.clone());
            data.block_height = height;
            data.spent = vec![false; tx.outputs.len()];
        }
        if tx.is_coinbase() {
            continue;
        }
        for input in &tx.inputs {
            let outpoint = &input.previous_output;
            if let Some(origin) = store.get_mut(&outpoint.hash) {
                if origin.tx.is_none() {
                    continue;
                }
                if let Some(spent) = origin.spent.get_mut(outpoint.index as usize) {
                    *spent = true;
                }
            }
        }
    }
}

/// Updates the store as if the block had been disconnected: transactions of the block that are tracked by the store
/// no longer exist, and the outputs spent by the block are unspent again.
pub fn disconnect_transactions(store: &mut TxStore, block: &Block) {
    for tx in &block.transactions {
        if let Some(data) = store.get_mut(&tx.hash()) {
            data.tx = None;
            data.block_height = 0;
            data.spent = Vec::new();
        }
        if tx.is_coinbase() {
            continue;
        }
        for input in &tx.inputs {
            let outpoint = &input.previous_output;
            if let Some(origin) = store.get_mut(&outpoint.hash) {
                if origin.tx.is_none() {
                    continue;
                }
                if let Some(spent) = origin.spent.get_mut(outpoint.index as usize) {
                    *spent = false;
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        blocks::BlockBuilder,
        transactions::{OutPoint, TxInput, TxOutput},
    };

    fn tx_with_outputs(tag: u8, n: usize) -> Arc<Transaction> {
        Arc::new(Transaction::new(
            1,
            vec![TxInput::new(OutPoint::new([tag; 32].into(), 0), vec![])],
            (0..n).map(|_| TxOutput::new(10, vec![0x51])).collect(),
            0,
        ))
    }

    #[test]
    fn connect_and_disconnect_are_inverse() {
        let origin = tx_with_outputs(1, 2);
        let spend = Transaction::new(
            1,
            vec![
                TxInput::new(OutPoint::new(origin.hash(), 0), vec![]),
                TxInput::new(OutPoint::new(origin.hash(), 2), vec![]),
            ],
            vec![TxOutput::new(5, vec![0x51])],
            0,
        );
        let mut store = TxStore::new();
        store.insert(origin.hash(), TxData::new(origin.clone(), 3));
        store.insert(spend.hash(), TxData::missing(spend.hash()));
        let before = store.clone();

        let mut block = BlockBuilder::new(1).with_transactions(vec![spend.clone()]).build();
        block.header.height = 4;
        connect_transactions(&mut store, &block);
        // Index 2 is out of range and is ignored
        assert_eq!(store[&origin.hash()].spent, vec![true, false]);
        assert_eq!(store[&spend.hash()].block_height, 4);
        assert!(!store[&spend.hash()].is_missing());

        disconnect_transactions(&mut store, &block);
        assert_eq!(store, before);
    }

    #[test]
    fn fully_spent() {
        let tx = tx_with_outputs(2, 2);
        let mut data = TxData::new(tx, 1);
        assert!(!data.is_fully_spent());
        data.spent = vec![true, true];
        assert!(data.is_fully_spent());
        assert!(TxData::missing(TxHash::zero()).is_fully_spent());
    }
}
