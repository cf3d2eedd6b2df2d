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

use helpers::TestNode;
use tari_chain_core::{
    chain_storage::BehaviorFlags,
    common::{MedianTime, MedianTimeSource, RejectCode},
    test_helpers::{create_block, spend_coinbase, BlockSpec},
};

#[allow(dead_code)]
mod helpers;

const BLOCK_TIME: u64 = 120;

#[test]
fn past_median_time_of_a_short_chain() {
    let node = TestNode::new();
    let genesis_time = node.genesis().header.timestamp;
    assert_eq!(node.db().past_median_time_of_tip().unwrap(), genesis_time);

    node.mine(1);
    // Two timestamps: the later one is taken
    assert_eq!(node.db().past_median_time_of_tip().unwrap(), genesis_time + BLOCK_TIME);

    node.mine(3);
    assert_eq!(node.db().past_median_time_of_tip().unwrap(), genesis_time + 2 * BLOCK_TIME);
}

#[test]
fn past_median_time_uses_the_last_eleven_blocks() {
    let node = TestNode::new();
    let genesis_time = node.genesis().header.timestamp;
    node.mine(20);
    // Heights 10 to 20 are in the window
    assert_eq!(node.db().past_median_time_of_tip().unwrap(), genesis_time + 15 * BLOCK_TIME);
}

#[test]
fn timestamps_must_move_forward() {
    let node = TestNode::new();
    node.mine(3);
    let block = create_block(node.db(), &node.tip(), BlockSpec::new().with_block_time(0));
    let err = node.node.process_block(block, BehaviorFlags::empty()).unwrap_err();
    assert_eq!(err.reject_code(), Some(RejectCode::Invalid));
    assert_eq!(node.db().best_height().unwrap(), 3);
}

#[test]
fn lock_times_are_checked_against_the_past_median_time() {
    let node = TestNode::new();
    let blocks = node.mine(20);
    let tip = node.tip();

    let mut tx = spend_coinbase(&blocks[0], 10_000);
    tx.inputs[0].sequence = 0;
    // Before the tip's own timestamp but after the median of the window
    tx.lock_time = u32::try_from(tip.header.timestamp - BLOCK_TIME).unwrap();
    assert!(u64::from(tx.lock_time) > node.db().past_median_time_of_tip().unwrap());

    let block = create_block(node.db(), &tip, BlockSpec::new().with_transactions(vec![tx]));
    let err = node.node.process_block(block, BehaviorFlags::empty()).unwrap_err();
    assert_eq!(err.reject_code(), Some(RejectCode::Invalid));
    assert_eq!(node.db().best_block_hash().unwrap(), tip.hash());
}

#[test]
fn network_adjusted_time_follows_the_median_offset() {
    let time = MedianTime::new();
    for (i, offset) in [30, 40, 50, 60].iter().enumerate() {
        time.add_offset_sample(&format!("peer-{}", i), *offset);
    }
    assert_eq!(time.offset(), 0);

    time.add_offset_sample("peer-4", 70);
    assert_eq!(time.offset(), 50);

    // A source is only counted once
    time.add_offset_sample("peer-4", 1000);
    time.add_offset_sample("peer-5", 1000);
    assert_eq!(time.offset(), 50);
}
