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

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{chain_storage::TxStore, mempool::policy::calc_priority, transactions::Transaction};

/// A transaction in the mempool, with the details recorded when it was accepted
#[derive(Debug, Clone)]
pub struct TxDesc {
    pub tx: Arc<Transaction>,
    /// Time the transaction was added to the pool
    pub added: DateTime<Utc>,
    /// Best chain height when the transaction was added
    pub height: u64,
    pub fee: u64,
    /// Priority when the transaction was added
    pub starting_priority: f64,
}

impl TxDesc {
    /// The priority of the transaction if it were included in the block at `next_height`. It grows as the inputs age.
    pub fn current_priority(&self, store: &TxStore, next_height: u64) -> f64 {
        calc_priority(&self.tx, store, next_height)
    }

    /// Fee per kB of serialized size
    pub fn fee_per_kb(&self) -> u64 {
        let size = self.tx.serialized_size().max(1) as u64;
        self.fee.saturating_mul(1000) / size
    }
}
