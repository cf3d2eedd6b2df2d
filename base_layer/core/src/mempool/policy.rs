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

//! Relay policy. These rules are stricter than consensus and only decide what this node is willing to pool and relay,
//! never whether a block is valid.

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    chain_storage::{TxStore, MEMPOOL_HEIGHT},
    common::RejectCode,
    consensus::ConsensusEncodingSized,
    mempool::MempoolError,
    script::{
        standard::{is_push_only, is_unspendable},
        classify,
        ScriptClass,
    },
    transactions::{Transaction, TxOutput},
    validation::helpers::is_finalized_tx,
};

const LOG_TARGET: &str = "c::mp::policy";

/// Larger transactions are not relayed, they would take up too much space in a block for their fee
pub const MAX_STANDARD_TX_SIZE: usize = 100_000;
/// Large enough for a 15-of-15 P2SH multisig redemption
pub const MAX_STANDARD_SIG_SCRIPT_SIZE: usize = 1650;
pub const MAX_ORPHAN_TX_SIZE: usize = 5000;
/// One coin aged one day in a 250 byte transaction
pub const MIN_HIGH_PRIORITY: f64 = 100_000_000.0 * 144.0 / 250.0;
/// Block space reserved for high priority transactions. Transactions too large to fit in it always pay the minimum fee.
pub const DEFAULT_BLOCK_PRIORITY_SIZE: usize = 50_000;
pub const MIN_STANDARD_TX_VERSION: u32 = 1;
pub const MAX_STANDARD_TX_VERSION: u32 = 2;
/// Size of a typical input spending a P2PKH output. Spending an output smaller than three times this fee is uneconomic.
const TYPICAL_INPUT_SIZE: u64 = 148;
/// Bytes of every input that do not count against its priority: the outpoint, sequence and script length prefix
const PRIORITY_INPUT_OVERHEAD: usize = 41;
/// The largest signature script discount, which covers a compressed P2PKH redemption
const MAX_PRIORITY_SIG_SCRIPT_DISCOUNT: usize = 110;
/// Seconds over which the free relay budget fully decays
const RATE_LIMIT_DECAY_SECS: f64 = 600.0;

/// An output is dust when spending it would cost more than a third of its value at the minimum relay fee.
/// Unspendable outputs are always dust.
pub fn is_dust(output: &TxOutput, min_relay_tx_fee: u64) -> bool {
    if is_unspendable(&output.pk_script) {
        return true;
    }
    let total_size = output.consensus_encode_exact_size() as u64 + TYPICAL_INPUT_SIZE;
    let value = u128::from(output.value) * 1000 / (3 * u128::from(total_size));
    value < u128::from(min_relay_tx_fee)
}

/// The minimum fee a transaction of the given size must pay to be relayed, capped at `max_money`.
pub fn calc_min_required_fee(serialized_size: usize, min_relay_tx_fee: u64, max_money: u64) -> u64 {
    let kilobytes = 1 + serialized_size as u64 / 1000;
    kilobytes.saturating_mul(min_relay_tx_fee).min(max_money)
}

/// The sum of every input's value multiplied by its age in blocks at `next_height`. Inputs created by unconfirmed
/// transactions have no age.
pub fn calc_input_value_age(tx: &Transaction, store: &TxStore, next_height: u64) -> f64 {
    tx.inputs
        .iter()
        .filter_map(|input| {
            let outpoint = &input.previous_output;
            let origin = store.get(&outpoint.hash)?;
            let output = origin.tx.as_ref()?.outputs.get(outpoint.index as usize)?;
            let age = if origin.block_height == MEMPOOL_HEIGHT {
                0
            } else {
                next_height.saturating_sub(origin.block_height)
            };
            Some(output.value as f64 * age as f64)
        })
        .sum()
}

/// Transaction priority is its input value age per byte. Part of every input is not counted, so that spending more
/// inputs is not penalised.
pub fn calc_priority(tx: &Transaction, store: &TxStore, next_height: u64) -> f64 {
    let overhead = tx
        .inputs
        .iter()
        .map(|input| PRIORITY_INPUT_OVERHEAD + input.signature_script.len().min(MAX_PRIORITY_SIG_SCRIPT_DISCOUNT))
        .sum::<usize>();
    let size = tx.serialized_size();
    if overhead >= size {
        return 0.0;
    }
    calc_input_value_age(tx, store, next_height) / (size - overhead) as f64
}

/// Checks the transaction only uses the standard forms this node relays. `height` and `adjusted_time`, in seconds
/// since the unix epoch, are those of the next block.
pub fn check_transaction_standard(
    tx: &Transaction,
    height: u64,
    adjusted_time: u64,
    min_relay_tx_fee: u64,
) -> Result<(), MempoolError> {
    let tx_hash = tx.hash();
    if tx.version < MIN_STANDARD_TX_VERSION || tx.version > MAX_STANDARD_TX_VERSION {
        return Err(MempoolError::tx_rule(
            RejectCode::Nonstandard,
            format!(
                "Transaction {} has version {}, only versions {} to {} are standard",
                tx_hash, tx.version, MIN_STANDARD_TX_VERSION, MAX_STANDARD_TX_VERSION
            ),
        ));
    }

    if !is_finalized_tx(tx, height, adjusted_time) {
        return Err(MempoolError::tx_rule(
            RejectCode::Nonstandard,
            format!("Transaction {} is not finalized", tx_hash),
        ));
    }

    let size = tx.serialized_size();
    if size > MAX_STANDARD_TX_SIZE {
        return Err(MempoolError::tx_rule(
            RejectCode::Nonstandard,
            format!(
                "Transaction {} size of {} bytes is larger than the maximum of {}",
                tx_hash, size, MAX_STANDARD_TX_SIZE
            ),
        ));
    }

    for (i, input) in tx.inputs.iter().enumerate() {
        let len = input.signature_script.len();
        if len > MAX_STANDARD_SIG_SCRIPT_SIZE {
            return Err(MempoolError::tx_rule(
                RejectCode::Nonstandard,
                format!(
                    "Transaction {} input {} signature script size of {} bytes is larger than the maximum of {}",
                    tx_hash, i, len, MAX_STANDARD_SIG_SCRIPT_SIZE
                ),
            ));
        }
        if !is_push_only(&input.signature_script) {
            return Err(MempoolError::tx_rule(
                RejectCode::Nonstandard,
                format!("Transaction {} input {} signature script is not push only", tx_hash, i),
            ));
        }
    }

    let mut num_null_data = 0usize;
    for (i, output) in tx.outputs.iter().enumerate() {
        match classify(&output.pk_script) {
            ScriptClass::NonStandard => {
                return Err(MempoolError::tx_rule(
                    RejectCode::Nonstandard,
                    format!("Transaction {} output {} has a non-standard script", tx_hash, i),
                ));
            },
            ScriptClass::NullData => {
                num_null_data += 1;
                continue;
            },
            _ => {},
        }
        if is_dust(output, min_relay_tx_fee) {
            return Err(MempoolError::tx_rule(
                RejectCode::Dust,
                format!("Transaction {} output {} pays {} which is dust", tx_hash, i, output.value),
            ));
        }
    }
    if num_null_data > 1 {
        return Err(MempoolError::tx_rule(
            RejectCode::Nonstandard,
            format!("Transaction {} has more than one null data output", tx_hash),
        ));
    }
    Ok(())
}

/// Checks every output spent by the transaction has a standard form. Every input must be in the store.
pub fn check_inputs_standard(tx: &Transaction, store: &TxStore) -> Result<(), MempoolError> {
    let tx_hash = tx.hash();
    for (i, input) in tx.inputs.iter().enumerate() {
        let outpoint = &input.previous_output;
        let pk_script = store
            .get(&outpoint.hash)
            .and_then(|data| data.tx.as_ref())
            .and_then(|origin| origin.outputs.get(outpoint.index as usize))
            .map(|output| output.pk_script.as_slice())
            .ok_or_else(|| {
                MempoolError::tx_rule(
                    RejectCode::Invalid,
                    format!("Transaction {} input {} spends an unknown output {}", tx_hash, i, outpoint),
                )
            })?;
        if classify(pk_script) == ScriptClass::NonStandard {
            return Err(MempoolError::tx_rule(
                RejectCode::Nonstandard,
                format!("Transaction {} input {} spends a non-standard output {}", tx_hash, i, outpoint),
            ));
        }
    }
    Ok(())
}

/// Limits the rate at which free and low fee transactions are accepted. The budget used decays exponentially over
/// ten minutes.
#[derive(Debug, Clone)]
pub struct FreeTxRateLimiter {
    penny_total: f64,
    last_penny_time: DateTime<Utc>,
}

impl FreeTxRateLimiter {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            penny_total: 0.0,
            last_penny_time: now,
        }
    }

    /// Admits `size` bytes at `now` if the decayed total is below `limit_kb_per_min`
    pub fn admit(&mut self, now: DateTime<Utc>, size: usize, limit_kb_per_min: f64) -> Result<(), MempoolError> {
        let elapsed = (now - self.last_penny_time).num_seconds().max(0);
        self.penny_total *= (1.0 - 1.0 / RATE_LIMIT_DECAY_SECS).powf(elapsed as f64);
        self.last_penny_time = now;

        if self.penny_total >= limit_kb_per_min * 10.0 * 1000.0 {
            return Err(MempoolError::tx_rule(
                RejectCode::InsufficientFee,
                "Transaction rejected by the free transaction rate limiter",
            ));
        }
        let old_total = self.penny_total;
        self.penny_total += size as f64;
        trace!(
            target: LOG_TARGET,
            "Free transaction rate: {:.0}kB, limit {:.0}kB",
            old_total / 1000.0,
            limit_kb_per_min * 10.0
        );
        Ok(())
    }

    pub fn penny_total(&self) -> f64 {
        self.penny_total
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::{
        chain_storage::TxData,
        script::{
            opcodes::{OP_CHECKSIG, OP_TRUE},
            standard::{null_data_script, pay_to_pubkey_hash_script},
            ScriptBuilder,
        },
        transactions::{OutPoint, TxInput},
        types::TxHash,
    };

    fn p2pkh() -> Vec<u8> {
        pay_to_pubkey_hash_script(&[7u8; 20])
    }

    fn standard_tx(outputs: Vec<TxOutput>) -> Transaction {
        let sig_script = ScriptBuilder::new().add_data(&[1u8; 72]).add_data(&[2u8; 33]).into_script();
        Transaction::new(
            1,
            vec![TxInput::new(OutPoint::new(TxHash::from([1u8; 32]), 0), sig_script)],
            outputs,
            0,
        )
    }

    #[test]
    fn dust_threshold() {
        // A P2PKH output is 34 bytes, so the threshold at 1000/kB is 3 * 182 = 546
        assert!(is_dust(&TxOutput::new(545, p2pkh()), 1000));
        assert!(!is_dust(&TxOutput::new(546, p2pkh()), 1000));
        assert!(!is_dust(&TxOutput::new(0, p2pkh()), 0));
        assert!(is_dust(&TxOutput::new(1_000_000, null_data_script(b"hi")), 1000));
    }

    #[test]
    fn min_fee_is_charged_per_started_kilobyte() {
        assert_eq!(calc_min_required_fee(250, 1000, u64::MAX), 1000);
        assert_eq!(calc_min_required_fee(999, 1000, u64::MAX), 1000);
        assert_eq!(calc_min_required_fee(1000, 1000, u64::MAX), 2000);
        assert_eq!(calc_min_required_fee(1000, 1000, 1500), 1500);
        assert_eq!(calc_min_required_fee(1000, 0, u64::MAX), 0);
    }

    #[test]
    fn priority_grows_with_input_age() {
        let origin = Arc::new(Transaction::new(
            1,
            vec![TxInput::new(OutPoint::new(TxHash::from([9u8; 32]), 0), vec![OP_TRUE])],
            vec![TxOutput::new(100_000_000, p2pkh())],
            0,
        ));
        let tx = standard_tx(vec![TxOutput::new(1000, p2pkh())]);
        let tx = Transaction::new(
            tx.version,
            vec![TxInput::new(OutPoint::new(origin.hash(), 0), tx.inputs[0].signature_script.clone())],
            tx.outputs,
            0,
        );
        let mut store = TxStore::new();
        store.insert(origin.hash(), TxData::new(origin.clone(), 10));

        assert_eq!(calc_priority(&tx, &store, 10), 0.0);
        let young = calc_priority(&tx, &store, 11);
        let old = calc_priority(&tx, &store, 155);
        assert!(young > 0.0);
        assert!(old > MIN_HIGH_PRIORITY);

        store.insert(origin.hash(), TxData::new(origin, MEMPOOL_HEIGHT));
        assert_eq!(calc_priority(&tx, &store, 1000), 0.0);
    }

    #[test]
    fn standard_transactions() {
        let now = Utc::now().timestamp() as u64;
        let tx = standard_tx(vec![TxOutput::new(10_000, p2pkh())]);
        assert!(check_transaction_standard(&tx, 100, now, 1000).is_ok());

        let mut bad = tx.clone();
        bad.version = 3;
        let err = check_transaction_standard(&bad, 100, now, 1000).unwrap_err();
        assert_eq!(err.reject_code(), Some(RejectCode::Nonstandard));

        let bad = standard_tx(vec![TxOutput::new(100, p2pkh())]);
        let err = check_transaction_standard(&bad, 100, now, 1000).unwrap_err();
        assert_eq!(err.reject_code(), Some(RejectCode::Dust));

        let bad = standard_tx(vec![TxOutput::new(10_000, vec![OP_TRUE])]);
        let err = check_transaction_standard(&bad, 100, now, 1000).unwrap_err();
        assert_eq!(err.reject_code(), Some(RejectCode::Nonstandard));

        let mut bad = tx.clone();
        bad.inputs[0].signature_script = vec![OP_CHECKSIG];
        assert!(check_transaction_standard(&bad, 100, now, 1000).is_err());

        let one_null_data = standard_tx(vec![
            TxOutput::new(10_000, p2pkh()),
            TxOutput::new(0, null_data_script(b"a")),
        ]);
        assert!(check_transaction_standard(&one_null_data, 100, now, 1000).is_ok());
        let two_null_data = standard_tx(vec![
            TxOutput::new(0, null_data_script(b"a")),
            TxOutput::new(0, null_data_script(b"b")),
        ]);
        assert!(check_transaction_standard(&two_null_data, 100, now, 1000).is_err());

        let mut locked = tx;
        locked.lock_time = 200;
        locked.inputs[0].sequence = 0;
        assert!(check_transaction_standard(&locked, 100, now, 1000).is_err());
        assert!(check_transaction_standard(&locked, 201, now, 1000).is_ok());
    }

    #[test]
    fn inputs_must_spend_standard_outputs() {
        let origin = Arc::new(standard_tx(vec![
            TxOutput::new(10_000, p2pkh()),
            TxOutput::new(10_000, vec![OP_TRUE]),
        ]));
        let mut store = TxStore::new();
        store.insert(origin.hash(), TxData::new(origin.clone(), 1));

        let spend = |index| {
            Transaction::new(
                1,
                vec![TxInput::new(OutPoint::new(origin.hash(), index), vec![])],
                vec![TxOutput::new(5000, p2pkh())],
                0,
            )
        };
        assert!(check_inputs_standard(&spend(0), &store).is_ok());
        let err = check_inputs_standard(&spend(1), &store).unwrap_err();
        assert_eq!(err.reject_code(), Some(RejectCode::Nonstandard));
        assert!(check_inputs_standard(&spend(2), &store).is_err());
    }

    #[test]
    fn rate_limiter_decays() {
        let start = Utc::now();
        let mut limiter = FreeTxRateLimiter::new(start);
        // A limit of 1kB/min allows 10kB before decay
        limiter.admit(start, 9_999, 1.0).unwrap();
        limiter.admit(start, 10, 1.0).unwrap();
        assert!(limiter.admit(start, 10, 1.0).is_err());

        let later = start + Duration::seconds(600);
        limiter.admit(later, 10, 1.0).unwrap();
        assert!(limiter.penny_total() < 5_000.0);
    }
}
