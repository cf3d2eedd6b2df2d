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

//! Block headers commit to the transaction set through the merkle root, to the proposal area through the proposal
//! root, and to the previous block through `prev_hash`. The double SHA-256 of the consensus encoding of the header is
//! the block hash, and is the value checked against the proof of work target encoded in `bits`.

use std::{
    fmt,
    fmt::{Display, Formatter},
    io,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    blocks::BlockBuilder,
    consensus::{ConsensusEncoding, ConsensusEncodingSized, ConsensusHasher},
    types::{BlockHash, FixedHash},
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Version of the block. Used to signal rule upgrades, see the majority version rules.
    pub version: u32,
    /// Height of this block since the genesis block (height 0)
    pub height: u64,
    /// Hash of the block previous to this in the chain.
    pub prev_hash: BlockHash,
    /// Merkle root of the transaction ids in the block
    pub merkle_root: FixedHash,
    /// Merkle root of the proposal area
    pub proposal_root: FixedHash,
    /// Timestamp at which the block was built, in seconds since the unix epoch.
    pub timestamp: u64,
    /// Compact representation of the proof of work target
    pub bits: u32,
    /// Nonce used to satisfy the proof of work
    pub nonce: u64,
}

impl BlockHeader {
    /// Create a new, default header with the given version.
    pub fn new(version: u32) -> BlockHeader {
        BlockHeader {
            version,
            height: 0,
            prev_hash: FixedHash::zero(),
            merkle_root: FixedHash::zero(),
            proposal_root: FixedHash::zero(),
            timestamp: Utc::now().timestamp() as u64,
            bits: 0,
            nonce: 0,
        }
    }

    /// Create a new block header using relevant data from the previous block. The height is incremented by one, the
    /// previous block hash is set and the bits are carried over. The timestamp is one second after the previous block
    /// or the current time, whichever is later.
    pub fn from_previous(prev: &BlockHeader) -> BlockHeader {
        let now = Utc::now().timestamp() as u64;
        BlockHeader {
            version: prev.version,
            height: prev.height + 1,
            prev_hash: prev.hash(),
            merkle_root: FixedHash::zero(),
            proposal_root: FixedHash::zero(),
            timestamp: now.max(prev.timestamp + 1),
            bits: prev.bits,
            nonce: 0,
        }
    }

    pub fn into_builder(self) -> BlockBuilder {
        BlockBuilder::new(self.version).with_header(self)
    }

    pub fn hash(&self) -> BlockHash {
        ConsensusHasher::<sha2::Sha256>::default().chain(self).finalize_double()
    }

    pub fn timestamp_as_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(i64::try_from(self.timestamp).ok()?, 0)
    }
}

impl ConsensusEncoding for BlockHeader {
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> Result<usize, io::Error> {
        let mut written = self.version.consensus_encode(writer)?;
        written += self.height.consensus_encode(writer)?;
        written += self.prev_hash.consensus_encode(writer)?;
        written += self.merkle_root.consensus_encode(writer)?;
        written += self.proposal_root.consensus_encode(writer)?;
        written += self.timestamp.consensus_encode(writer)?;
        written += self.bits.consensus_encode(writer)?;
        written += self.nonce.consensus_encode(writer)?;
        Ok(written)
    }
}

impl ConsensusEncodingSized for BlockHeader {
    fn consensus_encode_exact_size(&self) -> usize {
        4 + 8 + 32 * 3 + 8 + 4 + 8
    }
}

impl Display for BlockHeader {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        let datetime = self
            .timestamp_as_datetime()
            .map(|dt| dt.to_rfc2822())
            .unwrap_or_else(|| self.timestamp.to_string());
        writeln!(
            fmt,
            "Version: {}\nBlock height: {}\nPrevious block hash: {}\nTimestamp: {}",
            self.version, self.height, self.prev_hash, datetime
        )?;
        writeln!(
            fmt,
            "Merkle roots:\nTransactions: {}\nProposals: {}",
            self.merkle_root, self.proposal_root
        )?;
        writeln!(fmt, "Bits: {:#010x}\nNonce: {}", self.bits, self.nonce)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn from_previous() {
        let mut h1 = BlockHeader::new(1);
        h1.nonce = 7;
        h1.bits = 0x207f_ffff;
        let h2 = BlockHeader::from_previous(&h1);
        assert_eq!(h2.height, h1.height + 1);
        assert_eq!(h2.prev_hash, h1.hash());
        assert_eq!(h2.bits, h1.bits);
        assert!(h2.timestamp > h1.timestamp || h2.timestamp == h1.timestamp + 1);
    }

    #[test]
    fn hash_commits_to_the_nonce() {
        let mut header = BlockHeader::new(1);
        let hash = header.hash();
        header.nonce += 1;
        assert_ne!(header.hash(), hash);
        let mut buf = Vec::new();
        assert_eq!(
            header.consensus_encode(&mut buf).unwrap(),
            header.consensus_encode_exact_size()
        );
    }
}
