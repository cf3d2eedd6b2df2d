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

use std::fmt;

use crate::{
    script::{ScriptError, ScriptFlags, SigCache, TxSigHashes},
    transactions::Transaction,
};

/// Everything the interpreter needs to check that an input unlocks the output it spends.
pub struct ScriptContext<'a> {
    /// The locking script of the output being spent
    pub pk_script: &'a [u8],
    pub tx: &'a Transaction,
    pub input_index: usize,
    pub flags: ScriptFlags,
    pub sig_cache: &'a SigCache,
    pub sig_hashes: &'a TxSigHashes,
    /// Value of the output being spent, committed to by witness signatures
    pub input_value: u64,
}

impl fmt::Debug for ScriptContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptContext")
            .field("tx", &self.tx.hash())
            .field("input_index", &self.input_index)
            .field("flags", &self.flags)
            .field("input_value", &self.input_value)
            .finish()
    }
}

/// The script interpreter. Implementations must be safe to call from several validation workers at once.
pub trait ScriptEngine: Send + Sync {
    fn execute(&self, context: &ScriptContext<'_>) -> Result<(), ScriptError>;
}
