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

use std::{fmt, str::FromStr};

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const HASH_SIZE: usize = 32;

/// A 32-byte hash as produced by the consensus hashing functions.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FixedHash([u8; HASH_SIZE]);

pub type BlockHash = FixedHash;
pub type TxHash = FixedHash;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FixedHashError {
    #[error("Invalid hash size, expected {HASH_SIZE} bytes but got {0}")]
    InvalidSize(usize),
    #[error("Invalid hex string: {0}")]
    InvalidHex(String),
}

impl FixedHash {
    pub const fn new(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }

    pub const fn zero() -> Self {
        Self([0u8; HASH_SIZE])
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Interprets the hash as a little-endian 256-bit unsigned integer. This is the value compared against proof of
    /// work targets and used to break fork-choice ties.
    pub fn to_u256(&self) -> U256 {
        U256::from_little_endian(&self.0)
    }

    pub fn from_u256(value: U256) -> Self {
        let mut buf = [0u8; HASH_SIZE];
        value.to_little_endian(&mut buf);
        Self(buf)
    }
}

impl From<[u8; HASH_SIZE]> for FixedHash {
    fn from(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for FixedHash {
    type Error = FixedHashError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let buf: [u8; HASH_SIZE] = bytes.try_into().map_err(|_| FixedHashError::InvalidSize(bytes.len()))?;
        Ok(Self(buf))
    }
}

impl FromStr for FixedHash {
    type Err = FixedHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| FixedHashError::InvalidHex(e.to_string()))?;
        Self::try_from(bytes.as_slice())
    }
}

impl AsRef<[u8]> for FixedHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for FixedHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for FixedHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FixedHash({})", self.to_hex())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn it_converts_to_and_from_u256() {
        let mut bytes = [0u8; 32];
        bytes[0] = 1;
        let hash = FixedHash::from(bytes);
        assert_eq!(hash.to_u256(), U256::one());
        assert_eq!(FixedHash::from_u256(U256::one()), hash);
    }

    #[test]
    fn it_parses_hex() {
        let hash = FixedHash::from([0xab; 32]);
        let parsed = hash.to_hex().parse::<FixedHash>().unwrap();
        assert_eq!(parsed, hash);
        assert!(matches!(
            "abcd".parse::<FixedHash>(),
            Err(FixedHashError::InvalidSize(2))
        ));
        assert!(FixedHash::zero().is_zero());
    }
}
