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
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

use log::*;
use rand::{rngs::OsRng, Rng};

use crate::{
    common::RejectCode,
    mempool::MempoolError,
    transactions::Transaction,
    types::{TxHash, HASH_SIZE},
};

const LOG_TARGET: &str = "c::mp::orphan_pool";

/// The Orphan Pool holds transactions that spend outputs this node does not know about yet. They are promoted to the
/// mempool once a transaction creating the missing outputs is accepted.
///
/// Orphans are indexed by hash and by the hash of every transaction they spend from, which is how dependents are found
/// once a parent arrives. When the pool is full a random orphan is evicted.
pub struct OrphanTxPool {
    max_orphans: usize,
    max_orphan_size: usize,
    orphans: BTreeMap<TxHash, Arc<Transaction>>,
    orphans_by_prev: HashMap<TxHash, HashSet<TxHash>>,
}

impl OrphanTxPool {
    pub fn new(max_orphans: usize, max_orphan_size: usize) -> Self {
        Self {
            max_orphans,
            max_orphan_size,
            orphans: BTreeMap::new(),
            orphans_by_prev: HashMap::new(),
        }
    }

    /// Adds the orphan, evicting another if the pool is full. Oversized orphans are rejected since they could be used
    /// to exhaust memory at no cost.
    pub fn insert(&mut self, tx: Arc<Transaction>) -> Result<(), MempoolError> {
        let tx_hash = tx.hash();
        let size = tx.serialized_size();
        if size > self.max_orphan_size {
            return Err(MempoolError::tx_rule(
                RejectCode::Nonstandard,
                format!(
                    "Orphan transaction {} size of {} bytes is larger than the maximum of {}",
                    tx_hash, size, self.max_orphan_size
                ),
            ));
        }
        if self.max_orphans == 0 {
            return Err(MempoolError::tx_rule(
                RejectCode::Nonstandard,
                format!("Orphan transaction {} refused, orphans are not accepted", tx_hash),
            ));
        }
        if self.orphans.contains_key(&tx_hash) {
            return Ok(());
        }
        while self.orphans.len() >= self.max_orphans {
            self.evict_random();
        }

        for input in &tx.inputs {
            self.orphans_by_prev
                .entry(input.previous_output.hash)
                .or_default()
                .insert(tx_hash);
        }
        self.orphans.insert(tx_hash, tx);
        debug!(
            target: LOG_TARGET,
            "Stored orphan transaction {} (total: {})",
            tx_hash,
            self.orphans.len()
        );
        Ok(())
    }

    fn evict_random(&mut self) {
        let mut draw = [0u8; HASH_SIZE];
        OsRng.fill(&mut draw);
        let draw = TxHash::from(draw);
        let victim = self
            .orphans
            .range(draw..)
            .next()
            .or_else(|| self.orphans.iter().next())
            .map(|(hash, _)| *hash);
        if let Some(hash) = victim {
            trace!(target: LOG_TARGET, "Evicting orphan transaction {} to make space", hash);
            self.remove(&hash);
        }
    }

    /// Removes the orphan. Orphans spending from it stay in the pool.
    pub fn remove(&mut self, tx_hash: &TxHash) -> Option<Arc<Transaction>> {
        let tx = self.orphans.remove(tx_hash)?;
        for input in &tx.inputs {
            let prev_hash = &input.previous_output.hash;
            if let Some(dependents) = self.orphans_by_prev.get_mut(prev_hash) {
                dependents.remove(tx_hash);
                if dependents.is_empty() {
                    self.orphans_by_prev.remove(prev_hash);
                }
            }
        }
        Some(tx)
    }

    /// Orphans that spend any output of the given transaction
    pub fn dependents_of(&self, prev_hash: &TxHash) -> Vec<Arc<Transaction>> {
        self.orphans_by_prev
            .get(prev_hash)
            .map(|hashes| hashes.iter().filter_map(|hash| self.orphans.get(hash)).cloned().collect())
            .unwrap_or_default()
    }

    pub fn get(&self, tx_hash: &TxHash) -> Option<&Arc<Transaction>> {
        self.orphans.get(tx_hash)
    }

    pub fn contains(&self, tx_hash: &TxHash) -> bool {
        self.orphans.contains_key(tx_hash)
    }

    pub fn len(&self) -> usize {
        self.orphans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orphans.is_empty()
    }

    pub fn snapshot(&self) -> Vec<Arc<Transaction>> {
        self.orphans.values().cloned().collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{test_helpers::create_spend, transactions::OutPoint};

    fn orphan(seed: u8, num_inputs: u8) -> Arc<Transaction> {
        let inputs = (0..num_inputs)
            .map(|i| OutPoint::new(TxHash::from([seed; 32]), u32::from(i)))
            .collect();
        Arc::new(create_spend(inputs, &[1000]))
    }

    #[test]
    fn it_indexes_orphans_by_parent() {
        let mut pool = OrphanTxPool::new(10, 5000);
        let a = orphan(1, 1);
        let b = orphan(1, 2);
        let c = orphan(2, 1);
        pool.insert(a.clone()).unwrap();
        pool.insert(b.clone()).unwrap();
        pool.insert(c.clone()).unwrap();
        pool.insert(c.clone()).unwrap();
        assert_eq!(pool.len(), 3);

        let mut dependents = pool
            .dependents_of(&TxHash::from([1u8; 32]))
            .iter()
            .map(|tx| tx.hash())
            .collect::<Vec<_>>();
        dependents.sort();
        let mut expected = vec![a.hash(), b.hash()];
        expected.sort();
        assert_eq!(dependents, expected);

        assert!(pool.remove(&a.hash()).is_some());
        assert!(pool.remove(&a.hash()).is_none());
        assert_eq!(pool.dependents_of(&TxHash::from([1u8; 32])).len(), 1);
        pool.remove(&b.hash());
        assert!(pool.dependents_of(&TxHash::from([1u8; 32])).is_empty());
        assert!(pool.orphans_by_prev.get(&TxHash::from([1u8; 32])).is_none());
    }

    #[test]
    fn it_never_exceeds_capacity() {
        let mut pool = OrphanTxPool::new(5, 5000);
        for seed in 0..20 {
            pool.insert(orphan(seed, 1)).unwrap();
            assert!(pool.len() <= 5);
        }
        assert_eq!(pool.len(), 5);
        let indexed = pool.orphans_by_prev.values().map(HashSet::len).sum::<usize>();
        assert_eq!(indexed, 5);
    }

    #[test]
    fn it_rejects_oversized_orphans() {
        let mut pool = OrphanTxPool::new(5, 100);
        let err = pool.insert(orphan(1, 10)).unwrap_err();
        assert_eq!(err.reject_code(), Some(RejectCode::Nonstandard));
        assert!(pool.is_empty());
        pool.insert(orphan(1, 1)).unwrap();
        assert!(pool.contains(&orphan(1, 1).hash()));
    }
}
