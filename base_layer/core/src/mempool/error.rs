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

use crate::{chain_storage::ChainStorageError, common::RejectCode, validation::ValidationError};

#[derive(Debug, Error)]
pub enum MempoolError {
    #[error("Transaction rejected by relay policy ({code}): {reason}")]
    TxRule { code: RejectCode, reason: String },
    #[error("Validation error: {0}")]
    ValidationError(#[from] ValidationError),
    #[error("Chain storage error: {0}")]
    ChainStorageError(#[from] ChainStorageError),
    #[error("The address index is disabled")]
    AddressIndexDisabled,
    #[error("Mempool lock poisoned. This indicates that the mempool has panicked while holding a RwLockGuard.")]
    RwLockPoisonError,
}

impl MempoolError {
    pub fn tx_rule<T: Into<String>>(code: RejectCode, reason: T) -> Self {
        MempoolError::TxRule {
            code,
            reason: reason.into(),
        }
    }

    /// The reject code to echo to the peer that relayed the transaction. Failures of the node itself have none.
    pub fn reject_code(&self) -> Option<RejectCode> {
        match self {
            MempoolError::TxRule { code, .. } => Some(*code),
            MempoolError::ValidationError(e) => Some(e.reject_code()),
            MempoolError::ChainStorageError(e) => e.validation_error().map(ValidationError::reject_code),
            MempoolError::AddressIndexDisabled | MempoolError::RwLockPoisonError => None,
        }
    }

    /// True when the transaction itself is at fault, as opposed to the node
    pub fn is_rule_violation(&self) -> bool {
        self.reject_code().is_some()
    }
}
