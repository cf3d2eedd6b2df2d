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

use std::io;

mod hashing;

pub use hashing::{double_sha256, ConsensusHasher};

use crate::{common::byte_counter::ByteCounter, types::FixedHash};

/// Abstracts the ability of a type to canonically encode itself for the purposes of consensus
pub trait ConsensusEncoding {
    /// Encode to the given writer returning the number of bytes written.
    /// If writing to this Writer is infallible, this implementation must always succeed.
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> Result<usize, io::Error>;
}

pub trait ConsensusEncodingSized: ConsensusEncoding {
    /// The return value MUST be the exact byte size of the implementing type.
    fn consensus_encode_exact_size(&self) -> usize {
        let mut counter = ByteCounter::new();
        // unreachable panic: ByteCounter is infallible
        self.consensus_encode(&mut counter).expect("unreachable");
        counter.get()
    }
}

/// Writes a variable length integer using the compact size format: values below 0xfd take a single byte, larger values
/// are prefixed by 0xfd, 0xfe or 0xff followed by a 2, 4 or 8 byte little-endian integer.
pub fn write_compact_size<W: io::Write>(writer: &mut W, n: u64) -> Result<usize, io::Error> {
    match n {
        0..=0xfc => {
            writer.write_all(&[n as u8])?;
            Ok(1)
        },
        0xfd..=0xffff => {
            writer.write_all(&[0xfd])?;
            writer.write_all(&(n as u16).to_le_bytes())?;
            Ok(3)
        },
        0x10000..=0xffff_ffff => {
            writer.write_all(&[0xfe])?;
            writer.write_all(&(n as u32).to_le_bytes())?;
            Ok(5)
        },
        _ => {
            writer.write_all(&[0xff])?;
            writer.write_all(&n.to_le_bytes())?;
            Ok(9)
        },
    }
}

pub fn compact_size_len(n: u64) -> usize {
    match n {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x10000..=0xffff_ffff => 5,
        _ => 9,
    }
}

impl ConsensusEncoding for u16 {
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> Result<usize, io::Error> {
        writer.write_all(&self.to_le_bytes())?;
        Ok(2)
    }
}

impl ConsensusEncoding for u32 {
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> Result<usize, io::Error> {
        writer.write_all(&self.to_le_bytes())?;
        Ok(4)
    }
}

impl ConsensusEncoding for u64 {
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> Result<usize, io::Error> {
        writer.write_all(&self.to_le_bytes())?;
        Ok(8)
    }
}

impl ConsensusEncoding for FixedHash {
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> Result<usize, io::Error> {
        writer.write_all(self.as_slice())?;
        Ok(self.as_slice().len())
    }
}

/// Byte strings are length prefixed
impl ConsensusEncoding for [u8] {
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> Result<usize, io::Error> {
        let written = write_compact_size(writer, self.len() as u64)?;
        writer.write_all(self)?;
        Ok(written + self.len())
    }
}

impl ConsensusEncoding for Vec<u8> {
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> Result<usize, io::Error> {
        self.as_slice().consensus_encode(writer)
    }
}

impl ConsensusEncodingSized for Vec<u8> {
    fn consensus_encode_exact_size(&self) -> usize {
        compact_size_len(self.len() as u64) + self.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn it_writes_compact_sizes() {
        for (n, expected_len) in [(0u64, 1), (0xfc, 1), (0xfd, 3), (0xffff, 3), (0x10000, 5), (u64::MAX, 9)] {
            let mut buf = Vec::new();
            let written = write_compact_size(&mut buf, n).unwrap();
            assert_eq!(written, expected_len);
            assert_eq!(buf.len(), expected_len);
            assert_eq!(compact_size_len(n), expected_len);
        }
    }

    #[test]
    fn it_length_prefixes_byte_strings() {
        let script = vec![1u8, 2, 3];
        let mut buf = Vec::new();
        script.consensus_encode(&mut buf).unwrap();
        assert_eq!(buf, vec![3, 1, 2, 3]);
        assert_eq!(script.consensus_encode_exact_size(), 4);
    }
}
