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

//! Common test helper functions that are small and useful enough to be included in the main crate, rather than the
//! integration test folder.

mod block_spec;
pub use block_spec::BlockSpec;

mod mock_script_engine;
pub use mock_script_engine::MockScriptEngine;

use std::sync::Arc;

use crate::{
    blocks::{Block, BlockHeader},
    chain_storage::{BehaviorFlags, BlockchainDatabase, BlockchainDatabaseConfig, ChainStorageError, MemoryDatabase},
    common::MedianTime,
    consensus::{ConsensusConstants, ConsensusManager, Network},
    proof_of_work::check_proof_of_work,
    script::{opcodes::OP_TRUE, standard::serialized_height_script, ScriptBuilder},
    transactions::{OutPoint, Transaction, TxInput, TxOutput, MAX_TX_IN_SEQUENCE_NUM},
};

pub type TestBlockchain = BlockchainDatabase<MemoryDatabase>;

/// A blockchain on the in-memory backend containing only the genesis block, with scripts accepted by a
/// [MockScriptEngine]
pub fn create_new_blockchain(network: Network) -> TestBlockchain {
    let rules = ConsensusManager::builder(network).build();
    create_custom_blockchain(rules, BlockchainDatabaseConfig::default(), Arc::new(MockScriptEngine::default()))
}

pub fn create_custom_blockchain(
    rules: ConsensusManager,
    config: BlockchainDatabaseConfig,
    engine: Arc<MockScriptEngine>,
) -> TestBlockchain {
    BlockchainDatabase::new(MemoryDatabase::new(), rules, config, engine).unwrap()
}

/// A coinbase paying `value` to `pk_script`. The signature script commits to the height.
pub fn create_coinbase(height: u64, value: u64, pk_script: Vec<u8>) -> Transaction {
    create_tagged_coinbase(height, value, pk_script, &[0])
}

/// Like [create_coinbase], with `tag` pushed after the height so that coinbases of sibling blocks differ
pub fn create_tagged_coinbase(height: u64, value: u64, pk_script: Vec<u8>, tag: &[u8]) -> Transaction {
    let mut signature_script = serialized_height_script(height);
    signature_script.extend(ScriptBuilder::new().add_data(tag).into_script());
    Transaction::new(
        1,
        vec![TxInput::new(OutPoint::null(), signature_script).with_sequence(MAX_TX_IN_SEQUENCE_NUM)],
        vec![TxOutput::new(value, pk_script)],
        0,
    )
}

/// Sets the network's easiest difficulty if the block has none and increments the nonce until the block meets it
pub fn mine_block(mut block: Block, constants: &ConsensusConstants) -> Block {
    if block.header.bits == 0 {
        block.header.bits = constants.pow_limit_bits();
    }
    while check_proof_of_work(&block.hash(), block.header.bits, constants.pow_limit()).is_err() {
        block.header.nonce += 1;
    }
    block
}

/// A mined block building on `prev` as described by `spec`. The coinbase pays the block reward to `OP_TRUE`
/// unless `spec` says otherwise.
pub fn create_block(db: &TestBlockchain, prev: &Block, spec: BlockSpec) -> Arc<Block> {
    let rules = db.rules();
    let height = prev.height() + 1;
    let mut header = BlockHeader::from_previous(&prev.header);
    header.version = spec.version;
    header.timestamp = prev.header.timestamp + spec.block_time;
    let value = spec.coinbase_value.unwrap_or_else(|| rules.get_block_reward_at(height));
    let mut transactions = vec![create_tagged_coinbase(height, value, vec![OP_TRUE], &spec.coinbase_tag)];
    transactions.extend(spec.transactions);
    let block = header.into_builder().with_transactions(transactions).build();
    Arc::new(mine_block(block, rules.consensus_constants()))
}

/// Creates a block on `prev` and processes it
pub fn append_block(db: &TestBlockchain, prev: &Block, spec: BlockSpec) -> Result<Arc<Block>, ChainStorageError> {
    let block = create_block(db, prev, spec);
    db.process_block(block.clone(), &MedianTime::new(), BehaviorFlags::empty())?;
    Ok(block)
}

/// Appends `len` empty blocks to `prev`, tagging their coinbases with `tag`, and returns them in chain order
pub fn append_chain(
    db: &TestBlockchain,
    prev: &Arc<Block>,
    len: usize,
    tag: u8,
) -> Result<Vec<Arc<Block>>, ChainStorageError> {
    let mut blocks: Vec<Arc<Block>> = Vec::with_capacity(len);
    for _ in 0..len {
        let parent = blocks.last().unwrap_or(prev).clone();
        blocks.push(append_block(db, &parent, BlockSpec::new().with_coinbase_tag(vec![tag]))?);
    }
    Ok(blocks)
}

/// A transaction spending the given outputs to one `OP_TRUE` output per value
pub fn create_spend(inputs: Vec<OutPoint>, output_values: &[u64]) -> Transaction {
    Transaction::new(
        1,
        inputs.into_iter().map(|outpoint| TxInput::new(outpoint, vec![])).collect(),
        output_values
            .iter()
            .map(|value| TxOutput::new(*value, vec![OP_TRUE]))
            .collect(),
        0,
    )
}

/// Spends the first output of the block's coinbase, leaving `fee` for the miner
pub fn spend_coinbase(block: &Block, fee: u64) -> Transaction {
    let coinbase = &block.transactions[0];
    create_spend(vec![OutPoint::new(coinbase.hash(), 0)], &[coinbase.outputs[0].value - fee])
}
