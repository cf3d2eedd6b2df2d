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
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
};

use crate::{
    script::{ScriptContext, ScriptEngine, ScriptError},
    types::TxHash,
};

/// A [ScriptEngine] that accepts every input unless told otherwise. Counts the inputs it was asked to execute.
#[derive(Debug, Default)]
pub struct MockScriptEngine {
    reject_all: AtomicBool,
    rejected_inputs: Mutex<HashSet<(TxHash, usize)>>,
    calls: AtomicUsize,
}

impl MockScriptEngine {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn set_reject_all(&self, reject: bool) {
        self.reject_all.store(reject, Ordering::SeqCst);
    }

    /// Rejects the given input of the transaction from now on
    pub fn reject_input(&self, tx: TxHash, input_index: usize) {
        self.rejected_inputs.lock().unwrap().insert((tx, input_index));
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ScriptEngine for MockScriptEngine {
    fn execute(&self, context: &ScriptContext<'_>) -> Result<(), ScriptError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_all.load(Ordering::SeqCst) {
            return Err(ScriptError::EvalFalse);
        }
        let key = (context.tx.hash(), context.input_index);
        if self.rejected_inputs.lock().unwrap().contains(&key) {
            return Err(ScriptError::ExecutionFailed("Input rejected by mock".to_string()));
        }
        Ok(())
    }
}
