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
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use crate::{
    blocks::{
        merkle::{calc_merkle_root, calc_proposal_root},
        BlockHeader,
    },
    consensus::{write_compact_size, ConsensusEncoding, ConsensusEncodingSized, ConsensusHasher},
    transactions::Transaction,
    types::{BlockHash, FixedHash},
};

/// An entry of the proposal area. Proposals carry protocol governance data (fault punishments, parameter votes) that
/// is committed to by the header's proposal root but not interpreted by the validation core.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub version: u16,
    pub content: Vec<u8>,
}

impl Proposal {
    pub fn new(version: u16, content: Vec<u8>) -> Self {
        Self { version, content }
    }

    pub fn hash(&self) -> FixedHash {
        ConsensusHasher::<sha2::Sha256>::default().chain(self).finalize_double()
    }
}

impl ConsensusEncoding for Proposal {
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> Result<usize, io::Error> {
        let mut written = self.version.consensus_encode(writer)?;
        written += self.content.consensus_encode(writer)?;
        Ok(written)
    }
}

/// A block is a header, the transactions it commits to (the first being the coinbase) and the proposal area.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Arc<Transaction>>,
    #[serde(default)]
    pub proposals: Vec<Proposal>,
}

impl Block {
    pub fn new(header: BlockHeader, transactions: Vec<Arc<Transaction>>, proposals: Vec<Proposal>) -> Self {
        Self {
            header,
            transactions,
            proposals,
        }
    }

    pub fn hash(&self) -> BlockHash {
        self.header.hash()
    }

    pub fn height(&self) -> u64 {
        self.header.height
    }

    pub fn coinbase(&self) -> Option<&Arc<Transaction>> {
        self.transactions.first().filter(|tx| tx.is_coinbase())
    }

    pub fn serialized_size(&self) -> usize {
        self.consensus_encode_exact_size()
    }
}

impl ConsensusEncoding for Block {
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> Result<usize, io::Error> {
        let mut written = self.header.consensus_encode(writer)?;
        written += write_compact_size(writer, self.transactions.len() as u64)?;
        for tx in &self.transactions {
            written += tx.consensus_encode(writer)?;
        }
        written += write_compact_size(writer, self.proposals.len() as u64)?;
        for proposal in &self.proposals {
            written += proposal.consensus_encode(writer)?;
        }
        Ok(written)
    }
}

impl ConsensusEncodingSized for Block {}

impl Display for Block {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        writeln!(fmt, "----------------- Block -----------------")?;
        writeln!(fmt, "--- Header ---")?;
        writeln!(fmt, "Hash: {}", self.hash())?;
        writeln!(fmt, "{}", self.header)?;
        writeln!(fmt, "---  Body  ---")?;
        for tx in &self.transactions {
            writeln!(fmt, "{}", tx)?;
        }
        writeln!(fmt, "Proposals: {}", self.proposals.len())
    }
}

/// Assembles a block and fills in the header's merkle roots from its contents.
pub struct BlockBuilder {
    header: BlockHeader,
    transactions: Vec<Arc<Transaction>>,
    proposals: Vec<Proposal>,
}

impl BlockBuilder {
    pub fn new(version: u32) -> BlockBuilder {
        BlockBuilder {
            header: BlockHeader::new(version),
            transactions: Vec::new(),
            proposals: Vec::new(),
        }
    }

    pub fn with_header(mut self, header: BlockHeader) -> Self {
        self.header = header;
        self
    }

    pub fn with_transactions(mut self, transactions: Vec<Transaction>) -> Self {
        self.transactions = transactions.into_iter().map(Arc::new).collect();
        self
    }

    pub fn add_transaction(mut self, transaction: Transaction) -> Self {
        self.transactions.push(Arc::new(transaction));
        self
    }

    pub fn with_proposals(mut self, proposals: Vec<Proposal>) -> Self {
        self.proposals = proposals;
        self
    }

    pub fn build(mut self) -> Block {
        self.header.merkle_root = calc_merkle_root(&self.transactions);
        self.header.proposal_root = calc_proposal_root(&self.proposals);
        Block::new(self.header, self.transactions, self.proposals)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::transactions::{OutPoint, TxInput, TxOutput};

    #[test]
    fn builder_sets_the_merkle_roots() {
        let coinbase = Transaction::new(
            1,
            vec![TxInput::new(OutPoint::null(), vec![0x51, 0x51])],
            vec![TxOutput::new(100, vec![0x51])],
            0,
        );
        let block = BlockBuilder::new(1)
            .with_transactions(vec![coinbase.clone()])
            .with_proposals(vec![Proposal::new(1, vec![1, 2, 3])])
            .build();
        assert_eq!(block.header.merkle_root, coinbase.hash());
        assert_eq!(block.header.proposal_root, block.proposals[0].hash());
        assert!(block.coinbase().is_some());
        assert!(block.serialized_size() > block.header.consensus_encode_exact_size());
    }
}
