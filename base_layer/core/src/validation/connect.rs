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

//! Connect time validation: the checks that need the full set of outputs a block spends, as seen from the position
//! in the block tree the block would be connected at.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use log::*;

use crate::{
    blocks::Block,
    chain_storage::{fetch_tx_store, BlockchainBackend, ChainState, ChainStorageError, TxData, TxStore},
    consensus::{ConsensusConstants, ConsensusManager},
    script::{
        standard::{count_p2sh_sig_ops, legacy_sig_op_count, TxStoreLookupError},
        HashCache,
        ScriptEngine,
        ScriptFlags,
        SigCache,
    },
    transactions::Transaction,
    types::{BlockHash, TxHash},
    validation::{
        helpers::block_script_flags,
        script_pool::{ScriptValidationPool, ScriptWorkItem},
        sequence_lock::{calc_sequence_lock, sequence_lock_active},
        ValidationError,
    },
};

const LOG_TARGET: &str = "c::val::connect";

/// Script checks left over after [check_connect_block]. They need no access to the chain, so they can run after the
/// chain locks have been released.
pub struct BlockScripts {
    pub store: Arc<TxStore>,
    pub flags: ScriptFlags,
    pub items: Vec<ScriptWorkItem>,
    witness_txs: Vec<TxHash>,
}

impl BlockScripts {
    /// Runs the scripts on a [ScriptValidationPool]. The signature midstates of the block's witness transactions are
    /// no longer needed afterwards and are purged from the hash cache.
    pub fn validate(
        self,
        engine: Arc<dyn ScriptEngine>,
        sig_cache: Arc<SigCache>,
        hash_cache: &HashCache,
    ) -> Result<(), ChainStorageError> {
        let pool = ScriptValidationPool::new(self.store, self.flags, engine, sig_cache);
        let result = pool.validate(self.items);
        for tx_hash in &self.witness_txs {
            hash_cache.purge_sig_hashes(tx_hash);
        }
        result
    }
}

/// Performs every check that needs the outputs spent by the block, for a block building on `prev`: no overwrite of
/// unspent transactions, signature operation limits, input values and maturity, fees, the coinbase value and
/// sequence locks. Script checks are prepared but not run; they are returned unless disabled by `no_script_verify`
/// or because the block is covered by a checkpoint.
pub fn check_connect_block<B: BlockchainBackend + ?Sized>(
    state: &mut ChainState,
    db: &B,
    block: &Block,
    prev: Option<&BlockHash>,
    rules: &ConsensusManager,
    hash_cache: &HashCache,
    no_script_verify: bool,
) -> Result<Option<BlockScripts>, ChainStorageError> {
    let hash = block.hash();
    // The genesis coinbase is not spendable and there is nothing to connect it to
    if hash == rules.genesis_hash() && state.best_chain().is_none() {
        return Ok(None);
    }
    let height = block.height();
    let constants = rules.consensus_constants();

    // A transaction may only reuse the hash of an earlier transaction once every output of that one has been spent
    let tx_hashes = block.transactions.iter().map(|tx| tx.hash()).collect::<HashSet<_>>();
    let existing = fetch_tx_store(state, db, prev, &tx_hashes)?;
    if let Some(data) = existing
        .values()
        .find(|data| !data.is_missing() && !data.is_fully_spent())
    {
        return Err(ValidationError::OverwriteTx {
            tx: data.hash,
            height: data.block_height,
        }
        .into());
    }

    let mut store = fetch_input_transactions(state, db, block, prev)?;

    let max_sig_ops = constants.max_block_sigops();
    let mut total_sig_ops = 0usize;
    for (i, tx) in block.transactions.iter().enumerate() {
        let p2sh_sig_ops = count_p2sh_sig_ops(tx, i == 0, &store).map_err(|err| match err {
            TxStoreLookupError::MissingTx(missing) => ValidationError::MissingTx { tx: tx.hash(), missing },
            TxStoreLookupError::Overflow => ValidationError::TooManySigOps {
                count: usize::MAX,
                max: max_sig_ops,
            },
        })?;
        total_sig_ops = total_sig_ops
            .saturating_add(legacy_sig_op_count(tx))
            .saturating_add(p2sh_sig_ops);
        if total_sig_ops > max_sig_ops {
            return Err(ValidationError::TooManySigOps {
                count: total_sig_ops,
                max: max_sig_ops,
            }
            .into());
        }
    }

    let mut total_fees = 0u64;
    for tx in &block.transactions {
        let fee = check_transaction_inputs(tx, height, &mut store, constants)?;
        total_fees = total_fees.checked_add(fee).ok_or(ValidationError::BadFees)?;
    }
    check_coinbase_value(block, rules, total_fees)?;

    let median_time_past = state.past_median_time(db, prev)?;
    for tx in &block.transactions {
        let lock = calc_sequence_lock(state, db, prev, tx, &store)?;
        if !sequence_lock_active(&lock, height, median_time_past) {
            return Err(ValidationError::SequenceLockNotMet(tx.hash()).into());
        }
    }

    let below_checkpoint = rules.latest_checkpoint().map_or(false, |c| height <= c.height);
    if no_script_verify || below_checkpoint {
        trace!(
            target: LOG_TARGET,
            "Skipping script validation for block {} at height {}",
            hash,
            height
        );
        return Ok(None);
    }
    let flags = block_script_flags(state, db, block, prev, rules)?;
    let items = ScriptWorkItem::for_block(block, hash_cache);
    let witness_txs = block
        .transactions
        .iter()
        .filter(|tx| tx.has_witness())
        .map(|tx| tx.hash())
        .collect();
    debug!(
        target: LOG_TARGET,
        "Block {} at height {} connects with {} in fees, {} scripts to validate",
        hash,
        height,
        total_fees,
        items.len()
    );
    Ok(Some(BlockScripts {
        store: Arc::new(store),
        flags,
        items,
        witness_txs,
    }))
}

/// Builds the store of every transaction spent by the block. Outputs created earlier in the same block are taken
/// from the block itself, everything else is fetched as seen from `prev`. Spending an output of a transaction that
/// appears later in the block is an error.
pub fn fetch_input_transactions<B: BlockchainBackend + ?Sized>(
    state: &ChainState,
    db: &B,
    block: &Block,
    prev: Option<&BlockHash>,
) -> Result<TxStore, ChainStorageError> {
    let height = block.height();
    let in_flight = block
        .transactions
        .iter()
        .enumerate()
        .map(|(i, tx)| (tx.hash(), i))
        .collect::<HashMap<_, _>>();

    let mut store = TxStore::new();
    let mut needed = HashSet::new();
    for (i, tx) in block.transactions.iter().enumerate() {
        if tx.is_coinbase() {
            continue;
        }
        for input in &tx.inputs {
            let origin = input.previous_output.hash;
            match in_flight.get(&origin) {
                Some(&index) if index < i => {
                    store
                        .entry(origin)
                        .or_insert_with(|| TxData::new(block.transactions[index].clone(), height));
                },
                Some(_) => {
                    return Err(ValidationError::MissingTx {
                        tx: tx.hash(),
                        missing: origin,
                    }
                    .into());
                },
                None => {
                    needed.insert(origin);
                },
            }
        }
    }

    store.extend(fetch_tx_store(state, db, prev, &needed)?);
    Ok(store)
}

/// Checks the inputs of a transaction included at `tx_height` against the store and returns the fee it pays. Spent
/// outputs are marked in the store, so a later transaction spending the same output is caught as a double spend.
pub fn check_transaction_inputs(
    tx: &Transaction,
    tx_height: u64,
    store: &mut TxStore,
    constants: &ConsensusConstants,
) -> Result<u64, ValidationError> {
    if tx.is_coinbase() {
        return Ok(0);
    }
    let tx_hash = tx.hash();
    let max_money = constants.max_money();
    let maturity = constants.coinbase_maturity();

    let mut total_in = 0u64;
    for input in &tx.inputs {
        let outpoint = &input.previous_output;
        let missing = ValidationError::MissingTx {
            tx: tx_hash,
            missing: outpoint.hash,
        };
        let origin = store.get_mut(&outpoint.hash).ok_or_else(|| missing.clone())?;
        let origin_tx = origin.tx.clone().ok_or(missing)?;

        if origin_tx.is_coinbase() {
            let blocks_since = tx_height.saturating_sub(origin.block_height);
            if blocks_since < maturity {
                return Err(ValidationError::ImmatureSpend {
                    coinbase: outpoint.hash,
                    origin_height: origin.block_height,
                    height: tx_height,
                    maturity,
                });
            }
        }

        let index = outpoint.index as usize;
        let value = match (origin.spent.get(index), origin_tx.outputs.get(index)) {
            (Some(false), Some(output)) => output.value,
            (Some(true), _) => {
                return Err(ValidationError::DoubleSpend {
                    tx: tx_hash,
                    outpoint: outpoint.to_string(),
                })
            },
            _ => {
                return Err(ValidationError::BadTxInput(format!(
                    "Transaction {} spends output {} which does not exist",
                    tx_hash, outpoint
                )))
            },
        };
        if value > max_money {
            return Err(ValidationError::BadTxOutValue(format!(
                "Output {} has value {} which is higher than the maximum of {}",
                outpoint, value, max_money
            )));
        }
        total_in = total_in
            .checked_add(value)
            .filter(|total| *total <= max_money)
            .ok_or_else(|| {
                ValidationError::BadTxOutValue(format!(
                    "Total value of the inputs of transaction {} exceeds the maximum of {}",
                    tx_hash, max_money
                ))
            })?;
        origin.spent[index] = true;
    }

    let total_out = tx.total_output_value().ok_or_else(|| {
        ValidationError::BadTxOutValue(format!("Total output value of transaction {} overflows", tx_hash))
    })?;
    if total_in < total_out {
        return Err(ValidationError::SpendTooHigh {
            tx: tx_hash,
            input_value: total_in,
            output_value: total_out,
        });
    }
    Ok(total_in - total_out)
}

/// The coinbase may claim at most the block reward plus the fees of the block. From the foundation activation height
/// it must also pay the foundation share of the reward to the foundation script.
pub fn check_coinbase_value(block: &Block, rules: &ConsensusManager, total_fees: u64) -> Result<(), ValidationError> {
    let coinbase = block.coinbase().ok_or(ValidationError::FirstTxNotCoinbase)?;
    let height = block.height();
    let expected = rules
        .get_block_reward_at(height)
        .checked_add(total_fees)
        .ok_or(ValidationError::BadFees)?;
    let paid = coinbase.total_output_value().ok_or_else(|| {
        ValidationError::BadTxOutValue(format!("Total output value of coinbase {} overflows", coinbase.hash()))
    })?;
    if paid > expected {
        return Err(ValidationError::BadCoinbaseValue { paid, expected });
    }

    let share = rules.foundation_share_at(height);
    if share > 0 {
        let script = rules.consensus_constants().foundation_script();
        let to_foundation = coinbase
            .outputs
            .iter()
            .filter(|output| output.pk_script == script)
            .fold(0u64, |total, output| total.saturating_add(output.value));
        if to_foundation < share {
            return Err(ValidationError::BadFoundationOutput {
                paid: to_foundation,
                expected: share,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        blocks::BlockBuilder,
        consensus::{ConsensusConstantsBuilder, ConsensusManagerBuilder, Network, COIN},
        test_helpers::create_coinbase,
        transactions::{OutPoint, TxInput, TxOutput},
    };

    fn constants(maturity: u64) -> ConsensusConstants {
        ConsensusConstantsBuilder::new(Network::RegTest)
            .with_coinbase_maturity(maturity)
            .build()
    }

    fn spend(outpoints: &[OutPoint], value: u64) -> Transaction {
        Transaction::new(
            1,
            outpoints.iter().map(|o| TxInput::new(*o, vec![])).collect(),
            vec![TxOutput::new(value, vec![0x51])],
            0,
        )
    }

    #[test]
    fn coinbase_maturity_boundary() {
        let constants = constants(10);
        let coinbase = Arc::new(create_coinbase(5, 50, vec![0x51]));
        let tx = spend(&[OutPoint::new(coinbase.hash(), 0)], 40);
        let mut store = TxStore::new();
        store.insert(coinbase.hash(), TxData::new(coinbase.clone(), 5));

        assert!(matches!(
            check_transaction_inputs(&tx, 14, &mut store.clone(), &constants),
            Err(ValidationError::ImmatureSpend { .. })
        ));
        assert_eq!(check_transaction_inputs(&tx, 15, &mut store, &constants), Ok(10));
    }

    #[test]
    fn double_spends_and_bad_indexes() {
        let constants = constants(0);
        let origin = Arc::new(spend(&[OutPoint::new([1; 32].into(), 0)], 50));
        let mut store = TxStore::new();
        store.insert(origin.hash(), TxData::new(origin.clone(), 1));

        let first = spend(&[OutPoint::new(origin.hash(), 0)], 50);
        assert_eq!(check_transaction_inputs(&first, 2, &mut store, &constants), Ok(0));
        let second = spend(&[OutPoint::new(origin.hash(), 0)], 10);
        assert!(matches!(
            check_transaction_inputs(&second, 2, &mut store, &constants),
            Err(ValidationError::DoubleSpend { .. })
        ));
        // The index equal to the output count is out of range
        let out_of_range = spend(&[OutPoint::new(origin.hash(), 1)], 10);
        assert!(matches!(
            check_transaction_inputs(&out_of_range, 2, &mut store, &constants),
            Err(ValidationError::BadTxInput(_))
        ));
        let missing = spend(&[OutPoint::new([9; 32].into(), 0)], 10);
        assert!(matches!(
            check_transaction_inputs(&missing, 2, &mut store, &constants),
            Err(ValidationError::MissingTx { .. })
        ));
    }

    #[test]
    fn spend_too_high() {
        let constants = constants(0);
        let origin = Arc::new(spend(&[OutPoint::new([1; 32].into(), 0)], 50));
        let mut store = TxStore::new();
        store.insert(origin.hash(), TxData::new(origin.clone(), 1));
        let tx = spend(&[OutPoint::new(origin.hash(), 0)], 51);
        assert_eq!(
            check_transaction_inputs(&tx, 2, &mut store, &constants),
            Err(ValidationError::SpendTooHigh {
                tx: tx.hash(),
                input_value: 50,
                output_value: 51
            })
        );
    }

    #[test]
    fn coinbase_value() {
        let rules = ConsensusManagerBuilder::new(Network::RegTest).build();
        let reward = rules.get_block_reward_at(1);
        let mut header = crate::blocks::BlockHeader::new(1);
        header.height = 1;
        let block = |value| {
            BlockBuilder::new(1)
                .with_header(header.clone())
                .with_transactions(vec![create_coinbase(1, value, vec![0x51])])
                .build()
        };
        assert!(check_coinbase_value(&block(reward + 5), &rules, 5).is_ok());
        assert_eq!(
            check_coinbase_value(&block(reward + 6), &rules, 5),
            Err(ValidationError::BadCoinbaseValue {
                paid: reward + 6,
                expected: reward + 5
            })
        );
    }

    #[test]
    fn foundation_share() {
        let foundation = vec![0x76, 0xa9];
        let constants = ConsensusConstantsBuilder::new(Network::RegTest)
            .with_foundation(foundation.clone(), 10, 1)
            .build();
        let rules = ConsensusManagerBuilder::new(Network::RegTest)
            .with_consensus_constants(constants)
            .build();
        let reward = rules.get_block_reward_at(1);
        assert_eq!(reward, 50 * COIN);
        let mut header = crate::blocks::BlockHeader::new(1);
        header.height = 1;

        let mut coinbase = create_coinbase(1, reward - 5 * COIN, vec![0x51]);
        coinbase.outputs.push(TxOutput::new(5 * COIN, foundation));
        let block = BlockBuilder::new(1)
            .with_header(header.clone())
            .with_transactions(vec![coinbase])
            .build();
        assert!(check_coinbase_value(&block, &rules, 0).is_ok());

        let block = BlockBuilder::new(1)
            .with_header(header)
            .with_transactions(vec![create_coinbase(1, reward, vec![0x51])])
            .build();
        assert_eq!(
            check_coinbase_value(&block, &rules, 0),
            Err(ValidationError::BadFoundationOutput {
                paid: 0,
                expected: 5 * COIN
            })
        );
    }
}
