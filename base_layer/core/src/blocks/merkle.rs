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

//! Binary merkle trees stored as a linear array.
//!
//! The leaves are placed at the start of an array sized for the next power of two, followed by each level of parent
//! nodes, with the root in the last slot. For a tree of 5 leaves:
//!
//! ```text
//!          root = h1234           (slot 14)
//!        /        \
//!     h1234       h5500           (slots 12, 13)
//!    /    \      /     \
//!   h12   h34  h55     -          (slots 8..11)
//!  / \    / \   / \
//!  1  2  3  4  5   -  -  -        (slots 0..7)
//! ```
//!
//! A parent with no right child hashes its left child with itself. A parent with no left child is empty. A tree with a
//! single leaf has that leaf as its root.

use std::sync::Arc;

use crate::{
    blocks::Proposal,
    consensus::ConsensusHasher,
    transactions::Transaction,
    types::FixedHash,
};

/// Builds the linear merkle tree array for a set of leaves.
#[derive(Debug, Clone, Default)]
pub struct MerkleTreeBuilder {
    leaves: Vec<FixedHash>,
}

impl MerkleTreeBuilder {
    pub fn new(leaves: Vec<FixedHash>) -> Self {
        Self { leaves }
    }

    /// Leaves are the transaction ids
    pub fn transactions(transactions: &[Arc<Transaction>]) -> Self {
        Self::new(transactions.iter().map(|tx| tx.hash()).collect())
    }

    /// Leaves are the witness transaction ids, with the coinbase leaf set to zero since the coinbase commits to the
    /// witness root itself.
    pub fn witness(transactions: &[Arc<Transaction>]) -> Self {
        let leaves = transactions
            .iter()
            .enumerate()
            .map(|(i, tx)| if i == 0 { FixedHash::zero() } else { tx.witness_hash() })
            .collect();
        Self::new(leaves)
    }

    pub fn proposals(proposals: &[Proposal]) -> Self {
        Self::new(proposals.iter().map(Proposal::hash).collect())
    }

    pub fn build(self) -> Vec<Option<FixedHash>> {
        build_merkle_tree_store(self.leaves)
    }

    /// The root of the tree, or the zero hash if there are no leaves
    pub fn root(self) -> FixedHash {
        self.build().last().copied().flatten().unwrap_or_else(FixedHash::zero)
    }
}

pub fn hash_merkle_branches(left: &FixedHash, right: &FixedHash) -> FixedHash {
    ConsensusHasher::<sha2::Sha256>::default()
        .chain_raw(left.as_slice())
        .chain_raw(right.as_slice())
        .finalize_double()
}

pub fn build_merkle_tree_store(leaves: Vec<FixedHash>) -> Vec<Option<FixedHash>> {
    let next_pot = leaves.len().next_power_of_two();
    let array_size = next_pot * 2 - 1;
    let mut merkles: Vec<Option<FixedHash>> = Vec::with_capacity(array_size);
    merkles.extend(leaves.into_iter().map(Some));
    merkles.resize(array_size, None);

    let mut offset = next_pot;
    let mut i = 0;
    while i + 1 < array_size {
        merkles[offset] = match (merkles[i], merkles[i + 1]) {
            (None, _) => None,
            (Some(left), None) => Some(hash_merkle_branches(&left, &left)),
            (Some(left), Some(right)) => Some(hash_merkle_branches(&left, &right)),
        };
        offset += 1;
        i += 2;
    }
    merkles
}

pub fn calc_merkle_root(transactions: &[Arc<Transaction>]) -> FixedHash {
    MerkleTreeBuilder::transactions(transactions).root()
}

pub fn calc_witness_merkle_root(transactions: &[Arc<Transaction>]) -> FixedHash {
    MerkleTreeBuilder::witness(transactions).root()
}

pub fn calc_proposal_root(proposals: &[Proposal]) -> FixedHash {
    MerkleTreeBuilder::proposals(proposals).root()
}

#[cfg(test)]
mod test {
    use quickcheck::quickcheck;

    use super::*;

    fn leaf(n: u8) -> FixedHash {
        FixedHash::from([n; 32])
    }

    #[test]
    fn single_leaf_is_the_root() {
        let root = MerkleTreeBuilder::new(vec![leaf(1)]).root();
        assert_eq!(root, leaf(1));
    }

    #[test]
    fn empty_tree_has_a_zero_root() {
        assert_eq!(MerkleTreeBuilder::new(vec![]).root(), FixedHash::zero());
    }

    #[test]
    fn odd_nodes_are_hashed_with_themselves() {
        let store = build_merkle_tree_store(vec![leaf(1), leaf(2), leaf(3)]);
        assert_eq!(store.len(), 7);
        let h12 = hash_merkle_branches(&leaf(1), &leaf(2));
        let h33 = hash_merkle_branches(&leaf(3), &leaf(3));
        assert_eq!(store[4], Some(h12));
        assert_eq!(store[5], Some(h33));
        assert_eq!(store[6], Some(hash_merkle_branches(&h12, &h33)));
    }

    #[test]
    fn empty_subtrees_stay_empty() {
        let store = build_merkle_tree_store((1..=5).map(leaf).collect());
        assert_eq!(store.len(), 15);
        // Slots 5..7 are padding, so their parents at 10 and 11 are empty
        assert_eq!(store[10], Some(hash_merkle_branches(&leaf(5), &leaf(5))));
        assert_eq!(store[11], None);
        let h5500 = hash_merkle_branches(&store[10].unwrap(), &store[10].unwrap());
        assert_eq!(store[13], Some(h5500));
    }

    quickcheck! {
        fn root_is_deterministic_and_order_sensitive(seeds: Vec<u8>) -> bool {
            let mut leaves: Vec<FixedHash> = seeds.iter().map(|s| leaf(*s)).collect();
            leaves.sort();
            leaves.dedup();
            let root = MerkleTreeBuilder::new(leaves.clone()).root();
            if root != MerkleTreeBuilder::new(leaves.clone()).root() {
                return false;
            }
            if leaves.len() < 2 {
                return true;
            }
            leaves.swap(0, 1);
            MerkleTreeBuilder::new(leaves).root() != root
        }
    }
}
