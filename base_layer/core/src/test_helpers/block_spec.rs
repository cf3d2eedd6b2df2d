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

use crate::transactions::Transaction;

/// Describes a test block relative to its parent
#[derive(Debug, Clone)]
pub struct BlockSpec {
    pub version: u32,
    /// Seconds after the parent's timestamp
    pub block_time: u64,
    /// Transactions following the coinbase
    pub transactions: Vec<Transaction>,
    /// Coinbase value. Defaults to the block reward.
    pub coinbase_value: Option<u64>,
    /// Pushed into the coinbase signature script to tell sibling blocks apart
    pub coinbase_tag: Vec<u8>,
}

impl BlockSpec {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_block_time(mut self, block_time: u64) -> Self {
        self.block_time = block_time;
        self
    }

    pub fn with_transactions(mut self, transactions: Vec<Transaction>) -> Self {
        self.transactions = transactions;
        self
    }

    pub fn with_coinbase_value(mut self, value: u64) -> Self {
        self.coinbase_value = Some(value);
        self
    }

    pub fn with_coinbase_tag(mut self, tag: Vec<u8>) -> Self {
        self.coinbase_tag = tag;
        self
    }
}

impl Default for BlockSpec {
    fn default() -> Self {
        Self {
            version: 1,
            block_time: 120,
            transactions: Vec::new(),
            coinbase_value: None,
            coinbase_tag: vec![0],
        }
    }
}
