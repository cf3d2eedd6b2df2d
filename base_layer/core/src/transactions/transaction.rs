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

use std::{
    fmt,
    fmt::{Display, Formatter},
    io,
};

use serde::{Deserialize, Serialize};

use crate::{
    consensus::{
        compact_size_len,
        write_compact_size,
        ConsensusEncoding,
        ConsensusEncodingSized,
        ConsensusHasher,
    },
    types::{FixedHash, TxHash},
};

/// Sequence number that disables both absolute and relative lock times for an input.
pub const MAX_TX_IN_SEQUENCE_NUM: u32 = 0xffff_ffff;
/// When set, the relative lock time of the input is not enforced.
pub const SEQUENCE_LOCK_TIME_DISABLED: u32 = 1 << 31;
/// When set, the relative lock time is expressed in units of 512 seconds rather than blocks.
pub const SEQUENCE_LOCK_TIME_IS_SECONDS: u32 = 1 << 22;
pub const SEQUENCE_LOCK_TIME_MASK: u32 = 0x0000_ffff;
pub const SEQUENCE_LOCK_TIME_GRANULARITY: u32 = 9;
/// Lock times below this value are block heights, the rest are unix timestamps.
pub const LOCK_TIME_THRESHOLD: u32 = 500_000_000;

const WITNESS_MARKER: u8 = 0x00;
const WITNESS_FLAG: u8 = 0x01;

/// A reference to a specific output of a previous transaction
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    pub hash: TxHash,
    pub index: u32,
}

impl OutPoint {
    pub fn new(hash: TxHash, index: u32) -> Self {
        Self { hash, index }
    }

    /// The outpoint referenced by coinbase inputs
    pub fn null() -> Self {
        Self {
            hash: FixedHash::zero(),
            index: u32::MAX,
        }
    }

    pub fn is_null(&self) -> bool {
        self.index == u32::MAX && self.hash.is_zero()
    }
}

impl Display for OutPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hash, self.index)
    }
}

impl ConsensusEncoding for OutPoint {
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> Result<usize, io::Error> {
        let mut written = self.hash.consensus_encode(writer)?;
        written += self.index.consensus_encode(writer)?;
        Ok(written)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub previous_output: OutPoint,
    pub signature_script: Vec<u8>,
    #[serde(default)]
    pub witness: Vec<Vec<u8>>,
    pub sequence: u32,
}

impl TxInput {
    pub fn new(previous_output: OutPoint, signature_script: Vec<u8>) -> Self {
        Self {
            previous_output,
            signature_script,
            witness: Vec::new(),
            sequence: MAX_TX_IN_SEQUENCE_NUM,
        }
    }

    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_witness(mut self, witness: Vec<Vec<u8>>) -> Self {
        self.witness = witness;
        self
    }
}

impl ConsensusEncoding for TxInput {
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> Result<usize, io::Error> {
        let mut written = self.previous_output.consensus_encode(writer)?;
        written += self.signature_script.consensus_encode(writer)?;
        written += self.sequence.consensus_encode(writer)?;
        Ok(written)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: u64,
    pub pk_script: Vec<u8>,
}

impl TxOutput {
    pub fn new(value: u64, pk_script: Vec<u8>) -> Self {
        Self { value, pk_script }
    }
}

impl ConsensusEncoding for TxOutput {
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> Result<usize, io::Error> {
        let mut written = self.value.consensus_encode(writer)?;
        written += self.pk_script.consensus_encode(writer)?;
        Ok(written)
    }
}

impl ConsensusEncodingSized for TxOutput {
    fn consensus_encode_exact_size(&self) -> usize {
        8 + self.pk_script.consensus_encode_exact_size()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub lock_time: u32,
}

impl Transaction {
    pub fn new(version: u32, inputs: Vec<TxInput>, outputs: Vec<TxOutput>, lock_time: u32) -> Self {
        Self {
            version,
            inputs,
            outputs,
            lock_time,
        }
    }

    /// The transaction id. Witness data is not committed to.
    pub fn hash(&self) -> TxHash {
        ConsensusHasher::<sha2::Sha256>::default()
            .chain(&WitnessStripped(self))
            .finalize_double()
    }

    /// The witness transaction id. Equal to [Transaction::hash] when the transaction carries no witness data.
    pub fn witness_hash(&self) -> TxHash {
        if !self.has_witness() {
            return self.hash();
        }
        ConsensusHasher::<sha2::Sha256>::default().chain(self).finalize_double()
    }

    pub fn has_witness(&self) -> bool {
        self.inputs.iter().any(|input| !input.witness.is_empty())
    }

    /// A coinbase has exactly one input which references the null outpoint.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].previous_output.is_null()
    }

    /// Size of the transaction including witness data
    pub fn serialized_size(&self) -> usize {
        self.consensus_encode_exact_size()
    }

    /// Size of the transaction without witness data
    pub fn base_size(&self) -> usize {
        let mut size = 4 + compact_size_len(self.inputs.len() as u64) + compact_size_len(self.outputs.len() as u64) + 4;
        size += self
            .inputs
            .iter()
            .map(|i| 36 + i.signature_script.consensus_encode_exact_size() + 4)
            .sum::<usize>();
        size += self
            .outputs
            .iter()
            .map(ConsensusEncodingSized::consensus_encode_exact_size)
            .sum::<usize>();
        size
    }

    /// Sum of the output values, or None if it overflows
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |total, output| total.checked_add(output.value))
    }

    fn encode_base<W: io::Write>(&self, writer: &mut W) -> Result<usize, io::Error> {
        let mut written = self.version.consensus_encode(writer)?;
        written += self.encode_inputs_and_outputs(writer)?;
        written += self.lock_time.consensus_encode(writer)?;
        Ok(written)
    }

    fn encode_inputs_and_outputs<W: io::Write>(&self, writer: &mut W) -> Result<usize, io::Error> {
        let mut written = write_compact_size(writer, self.inputs.len() as u64)?;
        for input in &self.inputs {
            written += input.consensus_encode(writer)?;
        }
        written += write_compact_size(writer, self.outputs.len() as u64)?;
        for output in &self.outputs {
            written += output.consensus_encode(writer)?;
        }
        Ok(written)
    }
}

impl ConsensusEncoding for Transaction {
    /// Full encoding. Transactions with witness data use the marker and flag bytes followed by the witness stacks.
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> Result<usize, io::Error> {
        if !self.has_witness() {
            return self.encode_base(writer);
        }
        let mut written = self.version.consensus_encode(writer)?;
        writer.write_all(&[WITNESS_MARKER, WITNESS_FLAG])?;
        written += 2;
        written += self.encode_inputs_and_outputs(writer)?;
        for input in &self.inputs {
            written += write_compact_size(writer, input.witness.len() as u64)?;
            for item in &input.witness {
                written += item.consensus_encode(writer)?;
            }
        }
        written += self.lock_time.consensus_encode(writer)?;
        Ok(written)
    }
}

impl ConsensusEncodingSized for Transaction {}

impl Display for Transaction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Transaction {} (version {}, lock time {})",
            self.hash(),
            self.version,
            self.lock_time
        )?;
        for input in &self.inputs {
            writeln!(f, "  in: {} seq={:#x}", input.previous_output, input.sequence)?;
        }
        for output in &self.outputs {
            writeln!(f, "  out: {} -> {}", output.value, hex::encode(&output.pk_script))?;
        }
        Ok(())
    }
}

/// Encodes a transaction without its witness data
struct WitnessStripped<'a>(&'a Transaction);

impl ConsensusEncoding for WitnessStripped<'_> {
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> Result<usize, io::Error> {
        self.0.encode_base(writer)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_tx() -> Transaction {
        Transaction::new(
            1,
            vec![TxInput::new(OutPoint::new(FixedHash::from([1u8; 32]), 0), vec![0x51])],
            vec![TxOutput::new(5000, vec![0x51])],
            0,
        )
    }

    #[test]
    fn it_detects_coinbase_transactions() {
        let coinbase = Transaction::new(
            1,
            vec![TxInput::new(OutPoint::null(), vec![0x01, 0x02])],
            vec![TxOutput::new(50, vec![])],
            0,
        );
        assert!(coinbase.is_coinbase());
        assert!(!sample_tx().is_coinbase());
    }

    #[test]
    fn witness_does_not_change_the_txid() {
        let tx = sample_tx();
        let mut with_witness = tx.clone();
        with_witness.inputs[0].witness = vec![vec![1, 2, 3]];
        assert_eq!(tx.hash(), with_witness.hash());
        assert_eq!(tx.hash(), tx.witness_hash());
        assert_ne!(with_witness.hash(), with_witness.witness_hash());
        assert!(with_witness.serialized_size() > with_witness.base_size());
        assert_eq!(tx.serialized_size(), tx.base_size());
    }

    #[test]
    fn it_sums_outputs_without_overflowing() {
        let mut tx = sample_tx();
        assert_eq!(tx.total_output_value(), Some(5000));
        tx.outputs.push(TxOutput::new(u64::MAX, vec![]));
        assert_eq!(tx.total_output_value(), None);
    }
}
