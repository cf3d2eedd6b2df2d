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

use thiserror::Error;

use crate::{
    common::RejectCode,
    proof_of_work::PowError,
    script::ScriptError,
    types::{BlockHash, TxHash},
};

/// Consensus rule violations. Every variant is a reason a block or transaction is invalid, as opposed to a failure
/// of the node itself.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("Already have block {0}")]
    DuplicateBlock(BlockHash),
    #[error("Block version {version} is too old, a majority of the network has upgraded to at least {min_version}")]
    BlockVersionTooOld { version: u32, min_version: u32 },
    #[error("Block timestamp {timestamp} is not after its parent's timestamp {parent_timestamp}")]
    TimeTooOld { timestamp: u64, parent_timestamp: u64 },
    #[error("Block timestamp {timestamp} is too far in the future, the limit is {max_timestamp}")]
    TimeTooNew { timestamp: u64, max_timestamp: u64 },
    #[error("Block timestamp {timestamp} is before the last checkpoint timestamp {checkpoint_timestamp}")]
    CheckpointTimeTooOld { timestamp: u64, checkpoint_timestamp: u64 },
    #[error("Block difficulty {bits:#010x} is easier than the minimum {min_bits:#010x} allowed since the last checkpoint")]
    DifficultyTooLow { bits: u32, min_bits: u32 },
    #[error("Block difficulty {bits:#010x} does not match the expected difficulty {expected:#010x}")]
    UnexpectedDifficulty { bits: u32, expected: u32 },
    #[error("Expected block height to be {expected}, but was {block_height}")]
    IncorrectHeight { expected: u64, block_height: u64 },
    #[error("Block merkle root is invalid, expected {expected} but the header commits to {actual}")]
    BadMerkleRoot { expected: String, actual: String },
    #[error("Block proposal root is invalid, expected {expected} but the header commits to {actual}")]
    BadProposalRoot { expected: String, actual: String },
    #[error("Block at height {height} does not match the checkpoint hash {expected}")]
    BadCheckpoint { height: u64, expected: BlockHash },
    #[error("Block at height {height} forks the main chain before the checkpoint at height {checkpoint_height}")]
    ForkTooOld { height: u64, checkpoint_height: u64 },
    #[error("Block does not contain any transactions")]
    NoTransactions,
    #[error("Block contains too many transactions ({0})")]
    TooManyTransactions(usize),
    #[error("Serialized block is too big: {size} bytes, the maximum is {max}")]
    BlockTooBig { size: usize, max: usize },
    #[error("First transaction in the block is not a coinbase")]
    FirstTxNotCoinbase,
    #[error("Block contains a second coinbase at index {0}")]
    MultipleCoinbases(usize),
    #[error("Block contains duplicate transaction {0}")]
    DuplicateTx(TxHash),
    #[error("Block contains too many signature operations ({count}), the maximum is {max}")]
    TooManySigOps { count: usize, max: usize },
    #[error("Transaction {0} has no inputs")]
    NoTxInputs(TxHash),
    #[error("Transaction {0} has no outputs")]
    NoTxOutputs(TxHash),
    #[error("Serialized transaction {tx} is too big: {size} bytes, the maximum is {max}")]
    TxTooBig { tx: TxHash, size: usize, max: usize },
    #[error("Bad transaction output value: {0}")]
    BadTxOutValue(String),
    #[error("Transaction {0} contains duplicate inputs")]
    DuplicateTxInputs(TxHash),
    #[error("Bad transaction input: {0}")]
    BadTxInput(String),
    #[error("Unable to find input transaction {missing} for transaction {tx}")]
    MissingTx { tx: TxHash, missing: TxHash },
    #[error("Coinbase signature script length {len} is out of range {min}..={max}")]
    BadCoinbaseScriptLen { len: usize, min: usize, max: usize },
    #[error("Transaction {tx} is not finalized at height {height}")]
    UnfinalizedTx { tx: TxHash, height: u64 },
    #[error("Tried to overwrite transaction {tx} at block height {height} that is not fully spent")]
    OverwriteTx { tx: TxHash, height: u64 },
    #[error(
        "Tried to spend coinbase transaction {coinbase} from height {origin_height} at height {height} before the \
         required maturity of {maturity} blocks"
    )]
    ImmatureSpend {
        coinbase: TxHash,
        origin_height: u64,
        height: u64,
        maturity: u64,
    },
    #[error("Transaction {tx} tried to double spend output {outpoint}")]
    DoubleSpend { tx: TxHash, outpoint: String },
    #[error("Total value of all inputs ({input_value}) for transaction {tx} is less than the amount spent ({output_value})")]
    SpendTooHigh {
        tx: TxHash,
        input_value: u64,
        output_value: u64,
    },
    #[error("Total fees for the block overflow the accumulator")]
    BadFees,
    #[error("Coinbase pays {paid} which is more than the expected value of {expected}")]
    BadCoinbaseValue { paid: u64, expected: u64 },
    #[error("Coinbase must pay at least {expected} to the foundation, found {paid}")]
    BadFoundationOutput { paid: u64, expected: u64 },
    #[error("Coinbase signature script does not start with the serialized block height")]
    MissingCoinbaseHeight,
    #[error("Coinbase commits to height {actual}, expected {expected}")]
    BadCoinbaseHeight { expected: u64, actual: u64 },
    #[error("Transaction {0} has sequence locks on inputs which are not yet met")]
    SequenceLockNotMet(TxHash),
    #[error("Block contains witness data without a witness commitment")]
    UnexpectedWitness,
    #[error("Invalid witness commitment: {0}")]
    InvalidWitnessCommitment(String),
    #[error("Witness commitment does not match the computed value")]
    WitnessCommitmentMismatch,
    #[error("Failed to parse input {input} of transaction {tx}: {reason}")]
    ScriptMalformed { tx: TxHash, input: usize, reason: String },
    #[error("Failed to validate input {input} of transaction {tx}: {source}")]
    ScriptValidation {
        tx: TxHash,
        input: usize,
        source: ScriptError,
    },
    #[error("Proof of work error: {0}")]
    ProofOfWorkError(#[from] PowError),
}

impl ValidationError {
    /// The reject code echoed to the peer that relayed the offending object
    pub fn reject_code(&self) -> RejectCode {
        match self {
            ValidationError::DuplicateBlock(_) => RejectCode::Duplicate,
            ValidationError::BlockVersionTooOld { .. } => RejectCode::Obsolete,
            ValidationError::CheckpointTimeTooOld { .. } |
            ValidationError::DifficultyTooLow { .. } |
            ValidationError::BadCheckpoint { .. } |
            ValidationError::ForkTooOld { .. } => RejectCode::Checkpoint,
            _ => RejectCode::Invalid,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reject_codes() {
        assert_eq!(
            ValidationError::DuplicateBlock(BlockHash::zero()).reject_code(),
            RejectCode::Duplicate
        );
        assert_eq!(
            ValidationError::BlockVersionTooOld {
                version: 1,
                min_version: 2
            }
            .reject_code(),
            RejectCode::Obsolete
        );
        assert_eq!(
            ValidationError::ForkTooOld {
                height: 1,
                checkpoint_height: 10
            }
            .reject_code(),
            RejectCode::Checkpoint
        );
        assert_eq!(ValidationError::BadFees.reject_code(), RejectCode::Invalid);
    }
}
