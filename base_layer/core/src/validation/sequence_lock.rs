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

use crate::{
    chain_storage::{BlockchainBackend, ChainState, ChainStorageError, TxStore, MEMPOOL_HEIGHT},
    transactions::{
        Transaction,
        SEQUENCE_LOCK_TIME_DISABLED,
        SEQUENCE_LOCK_TIME_GRANULARITY,
        SEQUENCE_LOCK_TIME_IS_SECONDS,
        SEQUENCE_LOCK_TIME_MASK,
    },
    types::BlockHash,
    validation::ValidationError,
};

/// The earliest time and height at which a transaction with relative lock times may be included in a block. The
/// transaction is valid once the past median time is after `seconds` and the block height is after `block_height`.
/// Either value is -1 when no input constrains it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceLock {
    pub seconds: i64,
    pub block_height: i64,
}

impl SequenceLock {
    pub fn none() -> Self {
        Self {
            seconds: -1,
            block_height: -1,
        }
    }
}

impl Default for SequenceLock {
    fn default() -> Self {
        Self::none()
    }
}

/// Computes the sequence lock of a transaction that would be included in the block after `prev`. Every input must be
/// in the store. Inputs created by unconfirmed transactions are treated as if they were mined in the next block.
pub fn calc_sequence_lock<B: BlockchainBackend + ?Sized>(
    state: &mut ChainState,
    db: &B,
    prev: Option<&BlockHash>,
    tx: &Transaction,
    store: &TxStore,
) -> Result<SequenceLock, ChainStorageError> {
    let mut lock = SequenceLock::none();
    if tx.version < 2 || tx.is_coinbase() {
        return Ok(lock);
    }

    let next_height = match prev {
        Some(hash) => state.get_node(hash)?.height + 1,
        None => 0,
    };
    let tx_hash = tx.hash();
    for input in &tx.inputs {
        let outpoint = &input.previous_output;
        let origin = store
            .get(&outpoint.hash)
            .filter(|data| !data.is_missing())
            .ok_or(ValidationError::MissingTx {
                tx: tx_hash,
                missing: outpoint.hash,
            })?;
        let input_height = if origin.block_height == MEMPOOL_HEIGHT {
            next_height
        } else {
            origin.block_height
        };

        let sequence = input.sequence;
        if sequence & SEQUENCE_LOCK_TIME_DISABLED != 0 {
            continue;
        }
        let relative_lock = i64::from(sequence & SEQUENCE_LOCK_TIME_MASK);
        if sequence & SEQUENCE_LOCK_TIME_IS_SECONDS != 0 {
            // The lock starts at the median time of the block before the one containing the input
            let lock_start = match prev {
                Some(hash) => state.ancestor(db, hash, input_height.saturating_sub(1))?,
                None => None,
            };
            let median_time = to_i64(state.past_median_time(db, lock_start.as_ref())?);
            let seconds = median_time + (relative_lock << SEQUENCE_LOCK_TIME_GRANULARITY) - 1;
            lock.seconds = lock.seconds.max(seconds);
        } else {
            let block_height = to_i64(input_height) + relative_lock - 1;
            lock.block_height = lock.block_height.max(block_height);
        }
    }
    Ok(lock)
}

/// Returns true when the lock has been satisfied by a block at `block_height` whose parent has the given past median
/// time.
pub fn sequence_lock_active(lock: &SequenceLock, block_height: u64, median_time_past: u64) -> bool {
    !(lock.seconds >= to_i64(median_time_past) || lock.block_height >= to_i64(block_height))
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::{
        blocks::{Block, BlockHeader},
        chain_storage::{MemoryDatabase, TxData},
        transactions::{OutPoint, TxInput, TxOutput},
    };

    fn chain(len: usize) -> (MemoryDatabase, ChainState, Vec<Arc<Block>>) {
        let mut db = MemoryDatabase::new();
        let mut blocks: Vec<Arc<Block>> = Vec::new();
        for i in 0..len {
            let mut header = match blocks.last() {
                Some(prev) => BlockHeader::from_previous(&prev.header),
                None => BlockHeader::new(1),
            };
            header.timestamp = 10_000 + 600 * i as u64;
            let coinbase = Transaction::new(
                1,
                vec![TxInput::new(OutPoint::null(), vec![i as u8, 0])],
                vec![TxOutput::new(50, vec![0x51])],
                0,
            );
            let block = Arc::new(header.into_builder().with_transactions(vec![coinbase]).build());
            db.insert_block(block.clone()).unwrap();
            blocks.push(block);
        }
        let mut state = ChainState::new(2000, 11, 10_000);
        state.generate_initial_index(&db).unwrap();
        (db, state, blocks)
    }

    fn spend(origin: &Arc<Transaction>, version: u32, sequence: u32) -> Transaction {
        Transaction::new(
            version,
            vec![TxInput::new(OutPoint::new(origin.hash(), 0), vec![]).with_sequence(sequence)],
            vec![TxOutput::new(10, vec![0x51])],
            0,
        )
    }

    #[test]
    fn height_locks() {
        let (db, mut state, blocks) = chain(10);
        let origin = blocks[4].transactions[0].clone();
        let mut store = TxStore::new();
        store.insert(origin.hash(), TxData::new(origin.clone(), 4));
        let tip = blocks[9].hash();

        let tx = spend(&origin, 2, 10);
        let lock = calc_sequence_lock(&mut state, &db, Some(&tip), &tx, &store).unwrap();
        assert_eq!(lock, SequenceLock {
            seconds: -1,
            block_height: 13
        });
        assert!(!sequence_lock_active(&lock, 13, u64::MAX));
        assert!(sequence_lock_active(&lock, 14, 0));

        // Version 1 transactions and disabled inputs are unconstrained
        let tx = spend(&origin, 1, 10);
        assert_eq!(
            calc_sequence_lock(&mut state, &db, Some(&tip), &tx, &store).unwrap(),
            SequenceLock::none()
        );
        let tx = spend(&origin, 2, SEQUENCE_LOCK_TIME_DISABLED | 10);
        assert_eq!(
            calc_sequence_lock(&mut state, &db, Some(&tip), &tx, &store).unwrap(),
            SequenceLock::none()
        );
    }

    #[test]
    fn time_locks_start_at_the_median_time_before_the_input() {
        let (db, mut state, blocks) = chain(10);
        let origin = blocks[4].transactions[0].clone();
        let mut store = TxStore::new();
        store.insert(origin.hash(), TxData::new(origin.clone(), 4));
        let tip = blocks[9].hash();

        let tx = spend(&origin, 2, SEQUENCE_LOCK_TIME_IS_SECONDS | 2);
        let lock = calc_sequence_lock(&mut state, &db, Some(&tip), &tx, &store).unwrap();
        let median = state.past_median_time(&db, Some(&blocks[3].hash())).unwrap() as i64;
        assert_eq!(lock.seconds, median + (2 << SEQUENCE_LOCK_TIME_GRANULARITY) - 1);
        assert_eq!(lock.block_height, -1);
    }

    #[test]
    fn mempool_inputs_count_as_the_next_block() {
        let (db, mut state, blocks) = chain(3);
        let origin = Arc::new(spend(&blocks[0].transactions[0], 1, 0));
        let mut store = TxStore::new();
        store.insert(origin.hash(), TxData::new(origin.clone(), MEMPOOL_HEIGHT));
        let tx = spend(&origin, 2, 1);
        let lock = calc_sequence_lock(&mut state, &db, Some(&blocks[2].hash()), &tx, &store).unwrap();
        assert_eq!(lock.block_height, 3);

        let missing = spend(&Arc::new(spend(&origin, 1, 7)), 2, 1);
        let err = calc_sequence_lock(&mut state, &db, Some(&blocks[2].hash()), &missing, &store).unwrap_err();
        assert!(matches!(
            err.validation_error(),
            Some(ValidationError::MissingTx { .. })
        ));
    }
}
