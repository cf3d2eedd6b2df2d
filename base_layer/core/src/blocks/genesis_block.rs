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

use once_cell::sync::Lazy;

use crate::{
    blocks::{Block, BlockBuilder, BlockHeader},
    consensus::{Network, COIN},
    script::{opcodes::OP_CHECKSIG, standard::serialized_height_script, ScriptBuilder},
    transactions::{OutPoint, Transaction, TxInput, TxOutput, MAX_TX_IN_SEQUENCE_NUM},
};

/// Reward paid by every genesis coinbase
pub const GENESIS_BLOCK_REWARD: u64 = 50 * COIN;

/// Returns the genesis block for the selected network.
pub fn get_genesis_block(network: Network) -> Block {
    match network {
        Network::MainNet => get_mainnet_genesis_block(),
        Network::TestNet => get_testnet_genesis_block(),
        Network::RegTest => get_regtest_genesis_block(),
    }
}

pub fn get_mainnet_genesis_block() -> Block {
    // 2023-10-01 00:00:00 UTC
    static GENESIS: Lazy<Block> = Lazy::new(|| {
        build_genesis_block(1_696_118_400, 0x1d00_ffff, 2_083_236_893, "Tokenized, connected and validated")
    });
    GENESIS.clone()
}

pub fn get_testnet_genesis_block() -> Block {
    // 2023-11-01 00:00:00 UTC
    static GENESIS: Lazy<Block> =
        Lazy::new(|| build_genesis_block(1_698_796_800, 0x1d00_ffff, 414_098_458, "Testnet genesis"));
    GENESIS.clone()
}

pub fn get_regtest_genesis_block() -> Block {
    static GENESIS: Lazy<Block> = Lazy::new(|| build_genesis_block(1_700_000_000, 0x207f_ffff, 2, "Regtest genesis"));
    GENESIS.clone()
}

fn genesis_coinbase(message: &str) -> Transaction {
    let mut signature_script = serialized_height_script(0);
    signature_script.extend(ScriptBuilder::new().add_data(message.as_bytes()).into_script());
    // The genesis output pays to an unspendable key
    let pk_script = ScriptBuilder::new()
        .add_data(&[0x04; 65])
        .add_op(OP_CHECKSIG)
        .into_script();
    Transaction::new(
        1,
        vec![TxInput::new(OutPoint::null(), signature_script).with_sequence(MAX_TX_IN_SEQUENCE_NUM)],
        vec![TxOutput::new(GENESIS_BLOCK_REWARD, pk_script)],
        0,
    )
}

fn build_genesis_block(timestamp: u64, bits: u32, nonce: u64, message: &str) -> Block {
    let mut header = BlockHeader::new(1);
    header.timestamp = timestamp;
    header.bits = bits;
    header.nonce = nonce;
    BlockBuilder::new(1)
        .with_header(header)
        .with_transactions(vec![genesis_coinbase(message)])
        .build()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{blocks::merkle::calc_merkle_root, types::FixedHash};

    #[test]
    fn genesis_blocks_are_well_formed() {
        for network in [Network::MainNet, Network::TestNet, Network::RegTest] {
            let block = get_genesis_block(network);
            assert_eq!(block.header.height, 0);
            assert_eq!(block.header.prev_hash, FixedHash::zero());
            assert_eq!(block.header.merkle_root, calc_merkle_root(&block.transactions));
            assert!(block.coinbase().is_some());
            assert_eq!(block.transactions.len(), 1);
        }
        assert_ne!(
            get_genesis_block(Network::MainNet).hash(),
            get_genesis_block(Network::RegTest).hash()
        );
    }

    #[test]
    fn genesis_block_is_stable() {
        assert_eq!(get_regtest_genesis_block(), get_regtest_genesis_block());
        assert_eq!(get_regtest_genesis_block().header.timestamp, 1_700_000_000);
    }
}
