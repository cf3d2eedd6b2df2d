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

//! Checks that depend on where in the block tree a block is placed: difficulty, timestamps, checkpoints, version
//! upgrades and commitments that include the block height.

use log::*;

use crate::{
    blocks::{merkle::calc_witness_merkle_root, Block, BlockHeader},
    chain_storage::{BehaviorFlags, BlockchainBackend, ChainState, ChainStorageError},
    consensus::{
        double_sha256,
        Checkpoint,
        ConsensusConstants,
        ConsensusManager,
        CHECK_LOCK_TIME_VERSION,
        CHECK_SEQUENCE_VERSION,
        DER_SIGNATURES_VERSION,
        SERIALIZED_HEIGHT_VERSION,
    },
    proof_of_work::{calc_easiest_difficulty, compact_to_target},
    script::standard::extract_witness_commitment,
    types::BlockHash,
    validation::{
        helpers::{calc_next_required_difficulty, check_serialized_height, is_finalized_tx, is_majority_version},
        ValidationError,
    },
};

const LOG_TARGET: &str = "c::val::block_context";

/// Checks the block against its parent `prev` and the chain before it. With [BehaviorFlags::FAST_ADD] only the
/// height and checkpoint rules are enforced. The genesis block (no parent) has no context to check.
pub fn check_block_context<B: BlockchainBackend + ?Sized>(
    state: &mut ChainState,
    db: &B,
    block: &Block,
    prev: Option<&BlockHash>,
    rules: &ConsensusManager,
    flags: BehaviorFlags,
) -> Result<(), ChainStorageError> {
    let prev = match prev {
        Some(prev) => *prev,
        None => return Ok(()),
    };
    let constants = rules.consensus_constants();
    let header = &block.header;
    let (prev_height, prev_timestamp) = {
        let node = state.get_node(&prev)?;
        (node.height, node.timestamp)
    };
    let height = prev_height + 1;
    if header.height != height {
        return Err(ValidationError::IncorrectHeight {
            expected: height,
            block_height: header.height,
        }
        .into());
    }

    let fast_add = flags.is_fast_add();
    if !fast_add {
        let expected = calc_next_required_difficulty(state, db, Some(&prev), constants)?;
        if header.bits != expected {
            return Err(ValidationError::UnexpectedDifficulty {
                bits: header.bits,
                expected,
            }
            .into());
        }
        if header.timestamp <= prev_timestamp {
            return Err(ValidationError::TimeTooOld {
                timestamp: header.timestamp,
                parent_timestamp: prev_timestamp,
            }
            .into());
        }
        let median_time_past = state.past_median_time(db, Some(&prev))?;
        if let Some(tx) = block
            .transactions
            .iter()
            .find(|tx| !is_finalized_tx(tx, height, median_time_past))
        {
            return Err(ValidationError::UnfinalizedTx { tx: tx.hash(), height }.into());
        }
    }

    let hash = block.hash();
    if !rules.verify_checkpoint(height, &hash) {
        let expected = rules
            .checkpoint_at_height(height)
            .map(|c| c.hash)
            .unwrap_or_default();
        return Err(ValidationError::BadCheckpoint { height, expected }.into());
    }
    if let Some(checkpoint) = find_previous_checkpoint(db, rules)? {
        if height < checkpoint.height {
            return Err(ValidationError::ForkTooOld {
                height,
                checkpoint_height: checkpoint.height,
            }
            .into());
        }
    }

    if !fast_add {
        check_block_version(state, db, block, &prev, constants)?;
        if header.version >= SERIALIZED_HEIGHT_VERSION &&
            is_majority_version(
                state,
                db,
                SERIALIZED_HEIGHT_VERSION,
                Some(&prev),
                constants.block_enforce_num_required(),
                constants,
            )?
        {
            let coinbase = block.coinbase().ok_or(ValidationError::FirstTxNotCoinbase)?;
            check_serialized_height(coinbase, height)?;
        }
        check_witness_commitment(block)?;
    }

    trace!(target: LOG_TARGET, "Block {} passed the context checks at height {}", hash, height);
    Ok(())
}

/// Rejects blocks with a version the network has abandoned
fn check_block_version<B: BlockchainBackend + ?Sized>(
    state: &mut ChainState,
    db: &B,
    block: &Block,
    prev: &BlockHash,
    constants: &ConsensusConstants,
) -> Result<(), ChainStorageError> {
    let version = block.header.version;
    let upgrades = [
        SERIALIZED_HEIGHT_VERSION,
        DER_SIGNATURES_VERSION,
        CHECK_LOCK_TIME_VERSION,
        CHECK_SEQUENCE_VERSION,
    ];
    for min_version in upgrades {
        if version < min_version &&
            is_majority_version(
                state,
                db,
                min_version,
                Some(prev),
                constants.block_reject_num_required(),
                constants,
            )?
        {
            debug!(
                target: LOG_TARGET,
                "Rejecting version {} block {}, the network has upgraded to version {}",
                version,
                block.hash(),
                min_version
            );
            return Err(ValidationError::BlockVersionTooOld { version, min_version }.into());
        }
    }
    Ok(())
}

/// Blocks with witness data must commit to it in the coinbase. The commitment is the double SHA-256 of the witness
/// merkle root followed by the witness nonce, the single 32 byte witness item of the coinbase input.
pub fn check_witness_commitment(block: &Block) -> Result<(), ValidationError> {
    let coinbase = block.coinbase().ok_or(ValidationError::FirstTxNotCoinbase)?;
    let commitment = match extract_witness_commitment(coinbase) {
        Some(commitment) => commitment,
        None => {
            if block.transactions.iter().any(|tx| tx.has_witness()) {
                return Err(ValidationError::UnexpectedWitness);
            }
            return Ok(());
        },
    };

    let witness = &coinbase.inputs[0].witness;
    if witness.len() != 1 {
        return Err(ValidationError::InvalidWitnessCommitment(format!(
            "The coinbase witness must have exactly one item, found {}",
            witness.len()
        )));
    }
    let nonce = &witness[0];
    if nonce.len() != 32 {
        return Err(ValidationError::InvalidWitnessCommitment(format!(
            "The coinbase witness nonce must be 32 bytes, found {}",
            nonce.len()
        )));
    }
    let witness_root = calc_witness_merkle_root(&block.transactions);
    let mut preimage = Vec::with_capacity(64);
    preimage.extend_from_slice(witness_root.as_slice());
    preimage.extend_from_slice(nonce);
    if double_sha256(&preimage) != commitment {
        return Err(ValidationError::WitnessCommitmentMismatch);
    }
    Ok(())
}

/// Checks a block against the newest checkpoint the main chain has passed. A block may not be older than the
/// checkpoint, and its difficulty may not be easier than the network could have reached since the checkpoint.
pub fn check_checkpoint_constraints(
    header: &BlockHeader,
    checkpoint_header: &BlockHeader,
    constants: &ConsensusConstants,
    flags: BehaviorFlags,
) -> Result<(), ValidationError> {
    if header.timestamp < checkpoint_header.timestamp {
        return Err(ValidationError::CheckpointTimeTooOld {
            timestamp: header.timestamp,
            checkpoint_timestamp: checkpoint_header.timestamp,
        });
    }
    if flags.is_fast_add() {
        return Ok(());
    }
    let duration = header.timestamp - checkpoint_header.timestamp;
    let min_bits = calc_easiest_difficulty(checkpoint_header.bits, duration, constants);
    let required_target = compact_to_target(min_bits).unwrap_or_else(|| constants.pow_limit());
    let target = compact_to_target(header.bits).unwrap_or_else(|| constants.pow_limit());
    if target > required_target {
        return Err(ValidationError::DifficultyTooLow {
            bits: header.bits,
            min_bits,
        });
    }
    Ok(())
}

/// The newest checkpoint at or below the main chain tip that is present in the store
pub fn find_previous_checkpoint<B: BlockchainBackend + ?Sized>(
    db: &B,
    rules: &ConsensusManager,
) -> Result<Option<Checkpoint>, ChainStorageError> {
    let best_height = match db.newest_hash()? {
        Some((_, height)) => height,
        None => return Ok(None),
    };
    for checkpoint in rules.checkpoints().iter().rev() {
        if checkpoint.height > best_height {
            continue;
        }
        if db.block_exists(&checkpoint.hash)? {
            return Ok(Some(*checkpoint));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::{
        consensus::{ConsensusConstantsBuilder, Network},
        script::standard::witness_commitment_script,
        test_helpers::create_coinbase,
        transactions::{OutPoint, Transaction, TxInput, TxOutput},
        types::FixedHash,
    };

    fn block_with(transactions: Vec<Transaction>) -> Block {
        crate::blocks::BlockBuilder::new(1).with_transactions(transactions).build()
    }

    fn witness_spend() -> Transaction {
        Transaction::new(
            1,
            vec![TxInput::new(OutPoint::new([3; 32].into(), 0), vec![]).with_witness(vec![vec![1, 2, 3]])],
            vec![TxOutput::new(1, vec![0x51])],
            0,
        )
    }

    fn committed_coinbase(spend: &Transaction, nonce: Vec<u8>) -> Transaction {
        let mut coinbase = create_coinbase(1, 50, vec![0x51]);
        coinbase.inputs[0].witness = vec![nonce.clone()];
        let txs = vec![Arc::new(coinbase.clone()), Arc::new(spend.clone())];
        let root = calc_witness_merkle_root(&txs);
        let mut preimage = root.as_slice().to_vec();
        preimage.extend_from_slice(&nonce);
        let commitment = double_sha256(&preimage);
        coinbase.outputs.push(TxOutput::new(0, witness_commitment_script(&commitment)));
        coinbase
    }

    #[test]
    fn witness_data_needs_a_commitment() {
        let spend = witness_spend();
        let block = block_with(vec![create_coinbase(1, 50, vec![0x51]), spend.clone()]);
        assert_eq!(check_witness_commitment(&block), Err(ValidationError::UnexpectedWitness));

        let block = block_with(vec![committed_coinbase(&spend, vec![7; 32]), spend.clone()]);
        assert_eq!(check_witness_commitment(&block), Ok(()));

        let mut coinbase = committed_coinbase(&spend, vec![7; 32]);
        coinbase.inputs[0].witness = vec![vec![8; 32]];
        let block = block_with(vec![coinbase, spend.clone()]);
        assert_eq!(
            check_witness_commitment(&block),
            Err(ValidationError::WitnessCommitmentMismatch)
        );

        let block = block_with(vec![committed_coinbase(&spend, vec![7; 31]), spend]);
        assert!(matches!(
            check_witness_commitment(&block),
            Err(ValidationError::InvalidWitnessCommitment(_))
        ));
    }

    #[test]
    fn blocks_without_witnesses_pass() {
        let block = block_with(vec![create_coinbase(1, 50, vec![0x51])]);
        assert_eq!(check_witness_commitment(&block), Ok(()));
    }

    #[test]
    fn checkpoint_constraints() {
        let constants = ConsensusConstantsBuilder::new(Network::MainNet).build();
        let mut checkpoint = BlockHeader::new(1);
        checkpoint.timestamp = 1_000_000;
        checkpoint.bits = 0x1b04_864c;
        let mut header = BlockHeader::new(1);
        header.bits = checkpoint.bits;

        header.timestamp = checkpoint.timestamp - 1;
        assert!(matches!(
            check_checkpoint_constraints(&header, &checkpoint, &constants, BehaviorFlags::empty()),
            Err(ValidationError::CheckpointTimeTooOld { .. })
        ));

        header.timestamp = checkpoint.timestamp + 600;
        assert!(check_checkpoint_constraints(&header, &checkpoint, &constants, BehaviorFlags::empty()).is_ok());
        // Shortly after the checkpoint the difficulty cannot have dropped to the limit
        header.bits = constants.pow_limit_bits();
        assert!(matches!(
            check_checkpoint_constraints(&header, &checkpoint, &constants, BehaviorFlags::empty()),
            Err(ValidationError::DifficultyTooLow { .. })
        ));
        assert!(check_checkpoint_constraints(&header, &checkpoint, &constants, BehaviorFlags::FAST_ADD).is_ok());
        assert_ne!(checkpoint.hash(), FixedHash::zero());
    }
}
