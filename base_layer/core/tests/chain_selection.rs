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

use helpers::TestNode;
use tari_chain_core::{
    chain_storage::BehaviorFlags,
    mempool::MempoolEvent,
    test_helpers::{create_block, create_spend, spend_coinbase, BlockSpec},
    transactions::OutPoint,
};

#[allow(dead_code)]
mod helpers;

#[test]
fn heavier_side_chain_becomes_the_main_chain() {
    let node = TestNode::new();
    let blocks = node.mine(6);
    let fork_point = blocks.last().unwrap().clone();

    let tx = Arc::new(spend_coinbase(&blocks[0], 10_000));
    assert!(!node.node.process_transaction(tx.clone(), false, false).unwrap());
    let main_tip = node.submit(
        &fork_point,
        BlockSpec::new().with_transactions(vec![(*tx).clone()]),
    );
    assert_eq!(node.mempool().count().unwrap(), 0);
    node.drain_events();

    // Mined later than the main chain block, so equal work is not enough to switch
    let side_1 = node.submit(
        &fork_point,
        BlockSpec::new().with_block_time(240).with_coinbase_tag(vec![1]),
    );
    assert_eq!(node.db().best_block_hash().unwrap(), main_tip.hash());
    assert!(node.db().block_exists(&side_1.hash()).unwrap());
    assert!(!node.db().is_in_main_chain(&side_1.hash()).unwrap());

    let side_2 = create_block(node.db(), &side_1, BlockSpec::new().with_coinbase_tag(vec![1]));
    let result = node
        .node
        .process_block_with_events(side_2.clone(), BehaviorFlags::empty())
        .unwrap();
    assert!(result.is_chain_reorg());
    assert_eq!(result.disconnected_blocks().len(), 1);
    assert_eq!(result.disconnected_blocks()[0].hash(), main_tip.hash());
    let connected = result.connected_blocks().iter().map(|b| b.hash()).collect::<Vec<_>>();
    assert_eq!(connected, vec![side_1.hash(), side_2.hash()]);

    assert_eq!(node.db().best_block_hash().unwrap(), side_2.hash());
    assert_eq!(node.db().best_height().unwrap(), 8);
    assert!(!node.db().is_in_main_chain(&main_tip.hash()).unwrap());

    // The spend was only confirmed on the old chain
    assert!(node.mempool().is_transaction_in_pool(&tx.hash()).unwrap());
    assert!(matches!(
        node.drain_events().as_slice(),
        [MempoolEvent::TransactionAccepted { is_new: false, .. }]
    ));
}

#[test]
fn dependent_transactions_return_after_a_deep_reorganisation() {
    let node = TestNode::new();
    let blocks = node.mine(6);
    let fork_point = blocks.last().unwrap().clone();

    let parent = spend_coinbase(&blocks[0], 10_000);
    let child = create_spend(vec![OutPoint::new(parent.hash(), 0)], &[parent.outputs[0].value - 10_000]);
    let block_a = node.submit(&fork_point, BlockSpec::new().with_transactions(vec![parent.clone()]));
    let block_b = node.submit(&block_a, BlockSpec::new().with_transactions(vec![child.clone()]));
    assert_eq!(node.mempool().count().unwrap(), 0);

    let side_1 = node.submit(
        &fork_point,
        BlockSpec::new().with_block_time(240).with_coinbase_tag(vec![1]),
    );
    let side_2 = node.submit(&side_1, BlockSpec::new().with_coinbase_tag(vec![1]));
    assert_eq!(node.db().best_block_hash().unwrap(), block_b.hash());
    node.drain_events();

    let side_3 = create_block(node.db(), &side_2, BlockSpec::new().with_coinbase_tag(vec![1]));
    let result = node
        .node
        .process_block_with_events(side_3.clone(), BehaviorFlags::empty())
        .unwrap();
    let disconnected = result.disconnected_blocks().iter().map(|b| b.hash()).collect::<Vec<_>>();
    assert_eq!(disconnected, vec![block_b.hash(), block_a.hash()]);
    assert_eq!(node.db().best_block_hash().unwrap(), side_3.hash());

    // Both were only confirmed on the old chain, the child spending the parent's output
    assert_eq!(node.mempool().count().unwrap(), 2);
    assert!(node.mempool().is_transaction_in_pool(&parent.hash()).unwrap());
    assert!(node.mempool().is_transaction_in_pool(&child.hash()).unwrap());
    let accepted = node
        .drain_events()
        .into_iter()
        .filter_map(|event| match event {
            MempoolEvent::TransactionAccepted { tx, is_new: false } => Some(tx.hash()),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(accepted, vec![parent.hash(), child.hash()]);
}

#[test]
fn equal_work_ties_go_to_the_smaller_hash() {
    let node = TestNode::new();
    let genesis = node.genesis();
    let a = create_block(node.db(), &genesis, BlockSpec::new().with_coinbase_tag(vec![1]));
    let b = create_block(node.db(), &genesis, BlockSpec::new().with_coinbase_tag(vec![2]));
    assert_eq!(a.header.timestamp, b.header.timestamp);

    node.node.process_block(a.clone(), BehaviorFlags::empty()).unwrap();
    node.node.process_block(b.clone(), BehaviorFlags::empty()).unwrap();

    let expected = if a.hash().to_u256() < b.hash().to_u256() {
        a.hash()
    } else {
        b.hash()
    };
    assert_eq!(node.db().best_block_hash().unwrap(), expected);
    assert_eq!(node.db().best_height().unwrap(), 1);
}

#[test]
fn failed_reorganisation_keeps_the_main_chain() {
    let node = TestNode::new();
    let blocks = node.mine(6);
    let fork_point = blocks.last().unwrap().clone();
    let main_tip = node.mine(1).pop().unwrap();

    let bad_spend = spend_coinbase(&blocks[0], 10_000);
    node.engine.reject_input(bad_spend.hash(), 0);
    let side_1 = node.submit(
        &fork_point,
        BlockSpec::new()
            .with_block_time(240)
            .with_coinbase_tag(vec![1])
            .with_transactions(vec![bad_spend]),
    );
    assert_eq!(node.db().best_block_hash().unwrap(), main_tip.hash());

    let side_2 = create_block(node.db(), &side_1, BlockSpec::new().with_coinbase_tag(vec![1]));
    let err = node
        .node
        .process_block(side_2.clone(), BehaviorFlags::empty())
        .unwrap_err();
    assert!(err.reject_code().is_some());

    assert_eq!(node.db().best_block_hash().unwrap(), main_tip.hash());
    assert!(node.db().is_in_main_chain(&main_tip.hash()).unwrap());
    assert!(node.db().block_exists(&side_2.hash()).unwrap());
    assert!(!node.db().is_in_main_chain(&side_2.hash()).unwrap());
}

#[test]
fn fast_add_still_validates_a_side_chain() {
    let node = TestNode::new();
    let blocks = node.mine(6);
    let fork_point = blocks.last().unwrap().clone();
    let main_tip = node.mine(1).pop().unwrap();

    let bad_spend = spend_coinbase(&blocks[0], 10_000);
    node.engine.reject_input(bad_spend.hash(), 0);
    let side_1 = node.submit(
        &fork_point,
        BlockSpec::new()
            .with_block_time(240)
            .with_coinbase_tag(vec![1])
            .with_transactions(vec![bad_spend]),
    );

    let side_2 = create_block(node.db(), &side_1, BlockSpec::new().with_coinbase_tag(vec![1]));
    let err = node
        .node
        .process_block(side_2.clone(), BehaviorFlags::FAST_ADD)
        .unwrap_err();
    assert!(err.reject_code().is_some());
    assert_eq!(node.db().best_block_hash().unwrap(), main_tip.hash());
    assert!(!node.db().is_in_main_chain(&side_2.hash()).unwrap());
}

#[test]
fn orphans_connect_once_their_parent_arrives() {
    let source = TestNode::new();
    let blocks = source.mine(5);
    let node = TestNode::new();

    for block in blocks.iter().skip(1).rev() {
        assert!(node.node.process_block(block.clone(), BehaviorFlags::empty()).unwrap());
    }
    assert_eq!(node.db().orphan_count().unwrap(), 4);
    assert_eq!(node.db().orphan_root(&blocks[4].hash()).unwrap(), blocks[1].hash());
    assert_eq!(node.db().best_height().unwrap(), 0);

    let result = node
        .node
        .process_block_with_events(blocks[0].clone(), BehaviorFlags::empty())
        .unwrap();
    assert!(!result.is_orphan);
    assert_eq!(result.connected_blocks().len(), 5);
    assert_eq!(node.db().best_block_hash().unwrap(), blocks[4].hash());
    assert_eq!(node.db().orphan_count().unwrap(), 0);
}

#[test]
fn the_orphan_pool_is_bounded() {
    let source = TestNode::new();
    let blocks = source.mine(105);
    let node = TestNode::new();

    for block in blocks.iter().skip(1) {
        assert!(node.node.process_block(block.clone(), BehaviorFlags::empty()).unwrap());
    }
    assert_eq!(node.db().orphan_count().unwrap(), 100);
}

#[test]
fn duplicate_blocks_change_nothing() {
    let node = TestNode::new();
    let block = node.mine(1).pop().unwrap();
    let result = node
        .node
        .process_block_with_events(block.clone(), BehaviorFlags::empty())
        .unwrap();
    assert!(!result.is_orphan);
    assert!(!result.was_chain_modified());
    assert_eq!(node.db().best_block_hash().unwrap(), block.hash());
}

#[test]
fn dry_run_does_not_reorganise() {
    let node = TestNode::new();
    let fork_point = node.genesis();
    let main_tip = node.mine(1).pop().unwrap();
    let side_1 = node.submit(
        &fork_point,
        BlockSpec::new().with_block_time(240).with_coinbase_tag(vec![1]),
    );

    let side_2 = create_block(node.db(), &side_1, BlockSpec::new().with_coinbase_tag(vec![1]));
    node.node.process_block(side_2.clone(), BehaviorFlags::DRY_RUN).unwrap();
    assert_eq!(node.db().best_block_hash().unwrap(), main_tip.hash());
    assert!(!node.db().block_exists(&side_2.hash()).unwrap());

    node.node.process_block(side_2.clone(), BehaviorFlags::empty()).unwrap();
    assert_eq!(node.db().best_block_hash().unwrap(), side_2.hash());
}
