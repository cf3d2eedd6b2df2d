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

//! Consensus rule checks for blocks and transactions.
//!
//! Checks are layered by how much context they need. [check_block_sanity] needs nothing but the block,
//! [check_block_context] needs the block's parent in the block index and [check_connect_block] needs every output the
//! block spends. Script checks run last, in parallel, on a [ScriptValidationPool].

mod error;
pub use error::ValidationError;

mod block_context;
pub use block_context::{
    check_block_context,
    check_checkpoint_constraints,
    check_witness_commitment,
    find_previous_checkpoint,
};

mod block_sanity;
pub use block_sanity::{check_block_sanity, check_merkle_roots, check_timestamp_ftl, check_transaction_sanity};

mod connect;
pub use connect::{
    check_coinbase_value,
    check_connect_block,
    check_transaction_inputs,
    fetch_input_transactions,
    BlockScripts,
};

pub mod helpers;

mod script_pool;
pub use script_pool::{ScriptValidationPool, ScriptWorkItem};

mod sequence_lock;
pub use sequence_lock::{calc_sequence_lock, sequence_lock_active, SequenceLock};
