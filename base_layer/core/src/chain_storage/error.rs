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

use crate::{proof_of_work::PowError, validation::ValidationError};

#[derive(Debug, Error)]
pub enum ChainStorageError {
    #[error("Access to the underlying storage mechanism failed: {0}")]
    AccessError(String),
    #[error(
        "The database may be corrupted or otherwise be in an inconsistent state. Please check logs to try and \
         identify the issue: {0}"
    )]
    CorruptedDatabase(String),
    #[error("You tried to execute an invalid Database operation: {0}")]
    InvalidOperation(String),
    #[error("DATABASE INCONSISTENCY DETECTED at {function}: {details}")]
    DataInconsistencyDetected { function: &'static str, details: String },
    #[error("The requested {entity} was not found via {field}:{value} in the database")]
    ValueNotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },
    #[error("Validation error: {source}")]
    ValidationError {
        #[from]
        source: ValidationError,
    },
    #[error("Script validation worker failed: {0}")]
    ScriptWorkerFailed(String),
}

impl ChainStorageError {
    pub fn is_value_not_found(&self) -> bool {
        matches!(self, ChainStorageError::ValueNotFound { .. })
    }

    /// The consensus rule that was broken, if this error is a rule violation rather than a storage failure
    pub fn validation_error(&self) -> Option<&ValidationError> {
        match self {
            ChainStorageError::ValidationError { source } => Some(source),
            _ => None,
        }
    }
}

impl From<PowError> for ChainStorageError {
    fn from(err: PowError) -> Self {
        ValidationError::from(err).into()
    }
}

pub trait Optional<U> {
    fn optional(self) -> Result<Option<U>, ChainStorageError>;
}

impl<U> Optional<U> for Result<U, ChainStorageError> {
    fn optional(self) -> Result<Option<U>, ChainStorageError> {
        match self {
            Ok(item) => Ok(Some(item)),
            Err(err) if err.is_value_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }
}

pub trait OrNotFound<U> {
    fn or_not_found(self, entity: &'static str, field: &'static str, value: String) -> Result<U, ChainStorageError>;
}

impl<U> OrNotFound<U> for Result<Option<U>, ChainStorageError> {
    fn or_not_found(self, entity: &'static str, field: &'static str, value: String) -> Result<U, ChainStorageError> {
        self.and_then(|inner| inner.ok_or(ChainStorageError::ValueNotFound { entity, field, value }))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn optional_maps_not_found_to_none() {
        let not_found: Result<u32, ChainStorageError> = Err(ChainStorageError::ValueNotFound {
            entity: "BlockHeader",
            field: "hash",
            value: "00".to_string(),
        });
        assert!(not_found.optional().unwrap().is_none());
        let other: Result<u32, ChainStorageError> = Err(ChainStorageError::AccessError("poisoned".to_string()));
        assert!(other.optional().is_err());
        let found: Result<Option<u32>, ChainStorageError> = Ok(None);
        assert!(found
            .or_not_found("Block", "height", "1".to_string())
            .unwrap_err()
            .is_value_not_found());
    }
}
