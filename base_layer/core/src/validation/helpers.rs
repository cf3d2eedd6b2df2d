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

use log::*;

use crate::{
    blocks::Block,
    chain_storage::{BlockchainBackend, ChainState, ChainStorageError},
    consensus::{
        ConsensusConstants,
        ConsensusManager,
        CHECK_LOCK_TIME_VERSION,
        CHECK_SEQUENCE_VERSION,
        DER_SIGNATURES_VERSION,
    },
    proof_of_work::calc_retarget,
    script::{standard::extract_coinbase_height, ScriptFlags, MANDATORY_VERIFY_FLAGS},
    transactions::{Transaction, LOCK_TIME_THRESHOLD, MAX_TX_IN_SEQUENCE_NUM},
    types::BlockHash,
    validation::ValidationError,
};

const LOG_TARGET: &str = "c::val::helpers";

/// A transaction is final when its lock time has passed, or when every input has opted out of the lock time with the
/// maximum sequence number. Lock times below [LOCK_TIME_THRESHOLD] are heights, the rest are unix timestamps.
pub fn is_finalized_tx(tx: &Transaction, block_height: u64, block_time: u64) -> bool {
    let lock_time = u64::from(tx.lock_time);
    if lock_time == 0 {
        return true;
    }
    let threshold = if tx.lock_time < LOCK_TIME_THRESHOLD {
        block_height
    } else {
        block_time
    };
    if lock_time < threshold {
        return true;
    }
    tx.inputs.iter().all(|input| input.sequence == MAX_TX_IN_SEQUENCE_NUM)
}

/// Checks the coinbase signature script starts with the serialized block height.
pub fn check_serialized_height(coinbase: &Transaction, expected_height: u64) -> Result<(), ValidationError> {
    let script = coinbase
        .inputs
        .first()
        .map(|input| input.signature_script.as_slice())
        .unwrap_or_default();
    let height = extract_coinbase_height(script).ok_or(ValidationError::MissingCoinbaseHeight)?;
    if height != expected_height {
        return Err(ValidationError::BadCoinbaseHeight {
            expected: expected_height,
            actual: height,
        });
    }
    Ok(())
}

/// Returns true if at least `num_required` of the last `block_upgrade_num_to_check` blocks ending at `start` have a
/// version of at least `min_version`. The walk stops as soon as the requirement is met.
pub fn is_majority_version<B: BlockchainBackend + ?Sized>(
    state: &mut ChainState,
    db: &B,
    min_version: u32,
    start: Option<&BlockHash>,
    num_required: u64,
    constants: &ConsensusConstants,
) -> Result<bool, ChainStorageError> {
    let mut num_found = 0u64;
    let mut iter = start.copied();
    let mut checked = 0u64;
    while let Some(hash) = iter {
        if checked >= constants.block_upgrade_num_to_check() || num_found >= num_required {
            break;
        }
        if state.get_node(&hash)?.version >= min_version {
            num_found += 1;
        }
        checked += 1;
        iter = state.get_prev_node_from_node(db, &hash)?;
    }
    Ok(num_found >= num_required)
}

/// The difficulty bits required for the block after `last`. Only retarget blocks change the difficulty, everything
/// else must use the bits of its parent.
pub fn calc_next_required_difficulty<B: BlockchainBackend + ?Sized>(
    state: &mut ChainState,
    db: &B,
    last: Option<&BlockHash>,
    constants: &ConsensusConstants,
) -> Result<u32, ChainStorageError> {
    let last = match last {
        Some(hash) => state.get_node(hash)?.clone(),
        None => return Ok(constants.pow_limit_bits()),
    };
    let blocks_per_retarget = constants.blocks_per_retarget().max(1);
    if constants.no_retargeting() || (last.height + 1) % blocks_per_retarget != 0 {
        return Ok(last.bits);
    }

    let mut first = last.hash;
    for _ in 0..blocks_per_retarget - 1 {
        first = state
            .get_prev_node_from_node(db, &first)?
            .ok_or_else(|| ChainStorageError::InvalidOperation("Unable to obtain previous retarget block".to_string()))?;
    }
    let first_timestamp = state.get_node(&first)?.timestamp;
    let actual_timespan = last.timestamp.saturating_sub(first_timestamp);
    let new_bits = calc_retarget(last.bits, actual_timespan, constants);
    debug!(
        target: LOG_TARGET,
        "Difficulty retarget at height {}: {:#010x} -> {:#010x} (actual timespan {}s, target {}s)",
        last.height + 1,
        last.bits,
        new_bits,
        actual_timespan,
        constants.target_timespan()
    );
    Ok(new_bits)
}

/// The script flags a block building on `prev` must satisfy. Stricter rules are switched on once the majority of the
/// recent blocks signal the version that introduced them.
pub fn block_script_flags<B: BlockchainBackend + ?Sized>(
    state: &mut ChainState,
    db: &B,
    block: &Block,
    prev: Option<&BlockHash>,
    rules: &ConsensusManager,
) -> Result<ScriptFlags, ChainStorageError> {
    let constants = rules.consensus_constants();
    let required = constants.block_enforce_num_required();
    let mut flags = MANDATORY_VERIFY_FLAGS;
    let version_flags = [
        (DER_SIGNATURES_VERSION, ScriptFlags::VERIFY_DER_SIGNATURES),
        (CHECK_LOCK_TIME_VERSION, ScriptFlags::VERIFY_CHECK_LOCK_TIME),
        (CHECK_SEQUENCE_VERSION, ScriptFlags::VERIFY_CHECK_SEQUENCE),
    ];
    for (version, flag) in version_flags {
        if block.header.version >= version && is_majority_version(state, db, version, prev, required, constants)? {
            flags |= flag;
        }
    }
    Ok(flags)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::transactions::{OutPoint, TxInput, TxOutput};

    fn tx_with_lock_time(lock_time: u32, sequence: u32) -> Transaction {
        Transaction::new(
            1,
            vec![TxInput::new(OutPoint::new([1; 32].into(), 0), vec![]).with_sequence(sequence)],
            vec![TxOutput::new(1, vec![0x51])],
            lock_time,
        )
    }

    #[test]
    fn finality() {
        assert!(is_finalized_tx(&tx_with_lock_time(0, 0), 10, 0));
        assert!(is_finalized_tx(&tx_with_lock_time(9, 0), 10, 0));
        assert!(!is_finalized_tx(&tx_with_lock_time(10, 0), 10, 0));
        assert!(is_finalized_tx(&tx_with_lock_time(10, MAX_TX_IN_SEQUENCE_NUM), 10, 0));
        let time_lock = LOCK_TIME_THRESHOLD + 100;
        assert!(!is_finalized_tx(&tx_with_lock_time(time_lock, 0), 10, u64::from(time_lock)));
        assert!(is_finalized_tx(&tx_with_lock_time(time_lock, 0), 10, u64::from(time_lock) + 1));
    }

    #[test]
    fn serialized_height() {
        use crate::script::standard::serialized_height_script;
        let coinbase = Transaction::new(
            1,
            vec![TxInput::new(OutPoint::null(), serialized_height_script(300))],
            vec![TxOutput::new(1, vec![0x51])],
            0,
        );
        assert!(check_serialized_height(&coinbase, 300).is_ok());
        assert_eq!(
            check_serialized_height(&coinbase, 301),
            Err(ValidationError::BadCoinbaseHeight {
                expected: 301,
                actual: 300
            })
        );
    }
}
