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

//! The block index, the point-of-view transaction stores and the block acceptance engine.
//!
//! [BlockchainDatabase] is the entry point. It owns the [ChainState] block index, the [OrphanBlockPool] and a
//! [BlockchainBackend] holding the main chain, and decides for every incoming block whether it is rejected, held as an
//! orphan, added to a side chain or connected to the main chain, reorganising the chain when a side chain becomes
//! stronger.

mod block_add_result;
pub use block_add_result::{BlockAddResult, ChainEvent};

mod block_index;
pub use block_index::{BlockNode, ChainState};

mod blockchain_backend;
pub use blockchain_backend::{BlockchainBackend, StoredTx};

mod blockchain_database;
pub use blockchain_database::BlockchainDatabase;

mod config;
pub use config::BlockchainDatabaseConfig;

mod error;
pub use error::{ChainStorageError, Optional, OrNotFound};

mod flags;
pub use flags::BehaviorFlags;

mod memory_db;
pub use memory_db::MemoryDatabase;

mod orphan_block_pool;
pub use orphan_block_pool::OrphanBlockPool;

mod tx_store;
pub use tx_store::{
    connect_transactions,
    disconnect_transactions,
    fetch_tx_store,
    fetch_tx_store_main,
    TxData,
    TxStore,
    MEMPOOL_HEIGHT,
};
