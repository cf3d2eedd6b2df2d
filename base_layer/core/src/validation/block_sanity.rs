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

//! Context free block checks. Everything here can be checked without knowing anything about the chain the block
//! builds on, so these run before a block is stored as an orphan.

use std::collections::HashSet;

use log::*;

use crate::{
    blocks::{
        merkle::{calc_merkle_root, calc_proposal_root},
        Block,
    },
    common::MedianTimeSource,
    consensus::ConsensusConstants,
    proof_of_work::check_proof_of_work,
    script::standard::legacy_sig_op_count,
    transactions::Transaction,
    validation::ValidationError,
};

const LOG_TARGET: &str = "c::val::block_sanity";

/// Runs every context free check on the block. The block timestamp is checked against the network adjusted time
/// from `time_source`.
pub fn check_block_sanity(
    block: &Block,
    constants: &ConsensusConstants,
    time_source: &dyn MedianTimeSource,
) -> Result<(), ValidationError> {
    let num_txs = block.transactions.len();
    if num_txs == 0 {
        return Err(ValidationError::NoTransactions);
    }
    if num_txs > constants.max_block_size() {
        return Err(ValidationError::TooManyTransactions(num_txs));
    }
    let size = block.serialized_size();
    if size > constants.max_block_size() {
        return Err(ValidationError::BlockTooBig {
            size,
            max: constants.max_block_size(),
        });
    }

    let hash = block.hash();
    check_proof_of_work(&hash, block.header.bits, constants.pow_limit())?;
    check_timestamp_ftl(block, constants, time_source)?;

    if !block.transactions[0].is_coinbase() {
        return Err(ValidationError::FirstTxNotCoinbase);
    }
    if let Some(index) = block.transactions.iter().skip(1).position(|tx| tx.is_coinbase()) {
        return Err(ValidationError::MultipleCoinbases(index + 1));
    }
    for tx in &block.transactions {
        check_transaction_sanity(tx, constants)?;
    }

    check_merkle_roots(block)?;

    let mut seen = HashSet::with_capacity(num_txs);
    for tx in &block.transactions {
        let tx_hash = tx.hash();
        if !seen.insert(tx_hash) {
            return Err(ValidationError::DuplicateTx(tx_hash));
        }
    }

    // Only the legacy count is known here, pay-to-script-hash operations are added once the inputs are resolved
    let max = constants.max_block_sigops();
    let mut total_sig_ops = 0usize;
    for tx in &block.transactions {
        let count = total_sig_ops.saturating_add(legacy_sig_op_count(tx));
        if count > max {
            return Err(ValidationError::TooManySigOps { count, max });
        }
        total_sig_ops = count;
    }

    trace!(target: LOG_TARGET, "Block {} passed the sanity checks", hash);
    Ok(())
}

/// The header timestamp may not be further in the future than the network allows
pub fn check_timestamp_ftl(
    block: &Block,
    constants: &ConsensusConstants,
    time_source: &dyn MedianTimeSource,
) -> Result<(), ValidationError> {
    let max_timestamp = time_source
        .adjusted_time()
        .saturating_add(constants.max_future_block_time());
    if block.header.timestamp > max_timestamp {
        warn!(
            target: LOG_TARGET,
            "Block {} timestamp {} is too far in the future (limit {})",
            block.hash(),
            block.header.timestamp,
            max_timestamp
        );
        return Err(ValidationError::TimeTooNew {
            timestamp: block.header.timestamp,
            max_timestamp,
        });
    }
    Ok(())
}

/// Recomputes the transaction and proposal merkle roots and compares them to the header
pub fn check_merkle_roots(block: &Block) -> Result<(), ValidationError> {
    let merkle_root = calc_merkle_root(&block.transactions);
    if merkle_root != block.header.merkle_root {
        return Err(ValidationError::BadMerkleRoot {
            expected: merkle_root.to_hex(),
            actual: block.header.merkle_root.to_hex(),
        });
    }
    let proposal_root = calc_proposal_root(&block.proposals);
    if proposal_root != block.header.proposal_root {
        return Err(ValidationError::BadProposalRoot {
            expected: proposal_root.to_hex(),
            actual: block.header.proposal_root.to_hex(),
        });
    }
    Ok(())
}

/// Context free checks for a single transaction. Used for block transactions and for transactions entering the
/// mempool.
pub fn check_transaction_sanity(tx: &Transaction, constants: &ConsensusConstants) -> Result<(), ValidationError> {
    let tx_hash = tx.hash();
    if tx.inputs.is_empty() {
        return Err(ValidationError::NoTxInputs(tx_hash));
    }
    if tx.outputs.is_empty() {
        return Err(ValidationError::NoTxOutputs(tx_hash));
    }
    let size = tx.base_size();
    if size > constants.max_block_size() {
        return Err(ValidationError::TxTooBig {
            tx: tx_hash,
            size,
            max: constants.max_block_size(),
        });
    }

    let max_money = constants.max_money();
    let mut total = 0u64;
    for output in &tx.outputs {
        if output.value > max_money {
            return Err(ValidationError::BadTxOutValue(format!(
                "Transaction {} output value of {} is higher than the maximum of {}",
                tx_hash, output.value, max_money
            )));
        }
        total = total
            .checked_add(output.value)
            .filter(|total| *total <= max_money)
            .ok_or_else(|| {
                ValidationError::BadTxOutValue(format!(
                    "Total value of all outputs of transaction {} exceeds the maximum of {}",
                    tx_hash, max_money
                ))
            })?;
    }

    let mut outpoints = HashSet::with_capacity(tx.inputs.len());
    if !tx.inputs.iter().all(|input| outpoints.insert(&input.previous_output)) {
        return Err(ValidationError::DuplicateTxInputs(tx_hash));
    }

    if tx.is_coinbase() {
        let len = tx.inputs[0].signature_script.len();
        let min = constants.min_coinbase_script_len();
        let max = constants.max_coinbase_script_len();
        if len < min || len > max {
            return Err(ValidationError::BadCoinbaseScriptLen { len, min, max });
        }
    } else if let Some(input) = tx.inputs.iter().find(|input| input.previous_output.is_null()) {
        return Err(ValidationError::BadTxInput(format!(
            "Transaction {} input {} references the null outpoint",
            tx_hash, input.previous_output
        )));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::{
        blocks::BlockBuilder,
        common::MedianTime,
        consensus::{ConsensusConstantsBuilder, Network},
        test_helpers::{create_coinbase, mine_block},
        transactions::{OutPoint, TxInput, TxOutput},
    };

    fn constants() -> ConsensusConstants {
        ConsensusConstantsBuilder::new(Network::RegTest).build()
    }

    fn tx(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Transaction {
        Transaction::new(1, inputs, outputs, 0)
    }

    fn valid_block() -> Block {
        let block = BlockBuilder::new(1)
            .with_transactions(vec![create_coinbase(1, 50, vec![0x51])])
            .build();
        mine_block(block, &constants())
    }

    #[test]
    fn accepts_a_valid_block() {
        let block = valid_block();
        assert!(check_block_sanity(&block, &constants(), &MedianTime::new()).is_ok());
    }

    #[test]
    fn rejects_bad_coinbase_placement() {
        let constants = constants();
        let time = MedianTime::new();
        let spend = tx(vec![TxInput::new(OutPoint::new([1; 32].into(), 0), vec![])], vec![
            TxOutput::new(1, vec![0x51]),
        ]);

        let block = BlockBuilder::new(1).with_transactions(vec![spend.clone()]).build();
        let block = mine_block(block, &constants);
        assert_eq!(
            check_block_sanity(&block, &constants, &time),
            Err(ValidationError::FirstTxNotCoinbase)
        );

        let block = BlockBuilder::new(1)
            .with_transactions(vec![
                create_coinbase(1, 50, vec![0x51]),
                spend,
                create_coinbase(2, 50, vec![0x51]),
            ])
            .build();
        let block = mine_block(block, &constants);
        assert_eq!(
            check_block_sanity(&block, &constants, &time),
            Err(ValidationError::MultipleCoinbases(2))
        );
    }

    #[test]
    fn rejects_a_tampered_merkle_root() {
        let constants = constants();
        let mut block = BlockBuilder::new(1)
            .with_transactions(vec![create_coinbase(1, 50, vec![0x51])])
            .build();
        block.header.merkle_root = [7; 32].into();
        let block = mine_block(block, &constants);
        assert!(matches!(
            check_block_sanity(&block, &constants, &MedianTime::new()),
            Err(ValidationError::BadMerkleRoot { .. })
        ));
    }

    #[test]
    fn rejects_future_timestamps() {
        let constants = constants();
        let mut block = valid_block();
        block.header.timestamp = MedianTime::new().adjusted_time() + constants.max_future_block_time() + 60;
        let block = mine_block(block, &constants);
        assert!(matches!(
            check_block_sanity(&block, &constants, &MedianTime::new()),
            Err(ValidationError::TimeTooNew { .. })
        ));
    }

    #[test]
    fn duplicate_transactions() {
        let constants = constants();
        let spend = Arc::new(tx(vec![TxInput::new(OutPoint::new([1; 32].into(), 0), vec![])], vec![
            TxOutput::new(1, vec![0x51]),
        ]));
        let mut block = valid_block();
        block.transactions.push(spend.clone());
        block.transactions.push(spend);
        block.header.merkle_root = calc_merkle_root(&block.transactions);
        let block = mine_block(block, &constants);
        assert!(matches!(
            check_block_sanity(&block, &constants, &MedianTime::new()),
            Err(ValidationError::DuplicateTx(_))
        ));
    }

    #[test]
    fn transaction_sanity() {
        let constants = constants();
        let input = TxInput::new(OutPoint::new([1; 32].into(), 0), vec![]);
        let output = TxOutput::new(1, vec![0x51]);

        assert!(matches!(
            check_transaction_sanity(&tx(vec![], vec![output.clone()]), &constants),
            Err(ValidationError::NoTxInputs(_))
        ));
        assert!(matches!(
            check_transaction_sanity(&tx(vec![input.clone()], vec![]), &constants),
            Err(ValidationError::NoTxOutputs(_))
        ));
        assert!(matches!(
            check_transaction_sanity(&tx(vec![input.clone(), input.clone()], vec![output.clone()]), &constants),
            Err(ValidationError::DuplicateTxInputs(_))
        ));
        let too_much = TxOutput::new(constants.max_money() + 1, vec![0x51]);
        assert!(matches!(
            check_transaction_sanity(&tx(vec![input.clone()], vec![too_much]), &constants),
            Err(ValidationError::BadTxOutValue(_))
        ));
        let half = TxOutput::new(constants.max_money() / 2 + 1, vec![0x51]);
        assert!(matches!(
            check_transaction_sanity(&tx(vec![input.clone()], vec![half.clone(), half]), &constants),
            Err(ValidationError::BadTxOutValue(_))
        ));
        let short_coinbase = tx(vec![TxInput::new(OutPoint::null(), vec![1])], vec![output.clone()]);
        assert!(matches!(
            check_transaction_sanity(&short_coinbase, &constants),
            Err(ValidationError::BadCoinbaseScriptLen { len: 1, .. })
        ));
        let null_input = tx(vec![input, TxInput::new(OutPoint::null(), vec![])], vec![output]);
        assert!(matches!(
            check_transaction_sanity(&null_input, &constants),
            Err(ValidationError::BadTxInput(_))
        ));
    }
}
