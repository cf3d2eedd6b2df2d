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
    collections::{HashMap, HashSet},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    common::RejectCode,
    mempool::{orphan_pool::OrphanTxPool, policy::FreeTxRateLimiter, MempoolConfig, MempoolError, TxDesc},
    script::standard::extract_payload,
    transactions::{OutPoint, Transaction},
    types::TxHash,
};

const LOG_TARGET: &str = "c::mp::mempool_storage";

/// The pooled transactions and their indexes. All access goes through the lock held by [Mempool](super::Mempool).
pub struct MempoolStorage {
    pool: HashMap<TxHash, TxDesc>,
    /// The pooled transaction spending each outpoint
    outpoints: HashMap<OutPoint, Arc<Transaction>>,
    pub(crate) orphans: OrphanTxPool,
    /// Pooled transactions by the payload of the outputs that pay to them
    addr_index: Option<HashMap<Vec<u8>, HashMap<TxHash, Arc<Transaction>>>>,
    pub(crate) rate_limiter: FreeTxRateLimiter,
    last_updated: DateTime<Utc>,
}

impl MempoolStorage {
    pub fn new(config: &MempoolConfig, now: DateTime<Utc>) -> Self {
        Self {
            pool: HashMap::new(),
            outpoints: HashMap::new(),
            orphans: OrphanTxPool::new(config.max_orphan_txs, config.max_orphan_tx_size),
            addr_index: config.enable_addr_index.then(HashMap::new),
            rate_limiter: FreeTxRateLimiter::new(now),
            last_updated: now,
        }
    }

    pub fn insert(&mut self, desc: TxDesc) {
        let tx = desc.tx.clone();
        let tx_hash = tx.hash();
        for input in &tx.inputs {
            self.outpoints.insert(input.previous_output, tx.clone());
        }
        if let Some(index) = self.addr_index.as_mut() {
            for payload in tx.outputs.iter().filter_map(|output| extract_payload(&output.pk_script)) {
                index.entry(payload).or_default().insert(tx_hash, tx.clone());
            }
        }
        self.pool.insert(tx_hash, desc);
        self.last_updated = Utc::now();
    }

    /// Removes the transaction from the pool and every index. Transactions spending its outputs are left alone.
    pub fn remove(&mut self, tx_hash: &TxHash) -> Option<TxDesc> {
        let desc = self.pool.remove(tx_hash)?;
        for input in &desc.tx.inputs {
            self.outpoints.remove(&input.previous_output);
        }
        if let Some(index) = self.addr_index.as_mut() {
            for payload in desc.tx.outputs.iter().filter_map(|output| extract_payload(&output.pk_script)) {
                if let Some(txs) = index.get_mut(&payload) {
                    txs.remove(tx_hash);
                    if txs.is_empty() {
                        index.remove(&payload);
                    }
                }
            }
        }
        self.last_updated = Utc::now();
        trace!(target: LOG_TARGET, "Removed transaction {} from the pool", tx_hash);
        Some(desc)
    }

    /// Rejects the transaction if any of its inputs is already spent by a pooled transaction
    pub fn check_pool_double_spend(&self, tx: &Transaction) -> Result<(), MempoolError> {
        for input in &tx.inputs {
            if let Some(spender) = self.outpoints.get(&input.previous_output) {
                return Err(MempoolError::tx_rule(
                    RejectCode::Duplicate,
                    format!(
                        "Output {} is already spent by transaction {} in the memory pool",
                        input.previous_output,
                        spender.hash()
                    ),
                ));
            }
        }
        Ok(())
    }

    pub fn spender_of(&self, outpoint: &OutPoint) -> Option<&Arc<Transaction>> {
        self.outpoints.get(outpoint)
    }

    pub fn get(&self, tx_hash: &TxHash) -> Option<&TxDesc> {
        self.pool.get(tx_hash)
    }

    pub fn contains(&self, tx_hash: &TxHash) -> bool {
        self.pool.contains_key(tx_hash)
    }

    /// In the pool or the orphan pool
    pub fn have_transaction(&self, tx_hash: &TxHash) -> bool {
        self.contains(tx_hash) || self.orphans.contains(tx_hash)
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    pub fn tx_descs(&self) -> Vec<TxDesc> {
        self.pool.values().cloned().collect()
    }

    pub fn tx_hashes(&self) -> Vec<TxHash> {
        self.pool.keys().copied().collect()
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    pub fn addr_index_enabled(&self) -> bool {
        self.addr_index.is_some()
    }

    pub fn transactions_paying_to(&self, payload: &[u8]) -> Vec<Arc<Transaction>> {
        self.addr_index
            .as_ref()
            .and_then(|index| index.get(payload))
            .map(|txs| txs.values().cloned().collect())
            .unwrap_or_default()
    }

    /// The given transaction and every pooled transaction that spends from it, directly or through other pooled
    /// transactions. Redeemers come before the transactions they spend from.
    pub fn collect_redeemers(&self, tx: &Arc<Transaction>) -> Vec<Arc<Transaction>> {
        let mut ordered = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![(tx.clone(), false)];
        while let Some((tx, expanded)) = stack.pop() {
            let tx_hash = tx.hash();
            if expanded {
                ordered.push(tx);
                continue;
            }
            if !seen.insert(tx_hash) {
                continue;
            }
            stack.push((tx.clone(), true));
            for index in 0..tx.outputs.len() {
                let outpoint = OutPoint::new(tx_hash, index as u32);
                if let Some(spender) = self.outpoints.get(&outpoint) {
                    stack.push((spender.clone(), false));
                }
            }
        }
        ordered
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        script::standard::pay_to_pubkey_hash_script,
        test_helpers::create_spend,
        transactions::TxOutput,
    };

    fn desc(tx: Transaction) -> TxDesc {
        TxDesc {
            tx: Arc::new(tx),
            added: Utc::now(),
            height: 1,
            fee: 0,
            starting_priority: 0.0,
        }
    }

    #[test]
    fn it_indexes_spent_outpoints_and_addresses() {
        let config = MempoolConfig {
            enable_addr_index: true,
            ..Default::default()
        };
        let mut storage = MempoolStorage::new(&config, Utc::now());
        let mut tx = create_spend(vec![OutPoint::new(TxHash::from([1u8; 32]), 0)], &[]);
        tx.outputs.push(TxOutput::new(5000, pay_to_pubkey_hash_script(&[3u8; 20])));
        let tx_hash = tx.hash();
        storage.insert(desc(tx.clone()));

        assert!(storage.contains(&tx_hash));
        assert!(storage.check_pool_double_spend(&tx).is_err());
        assert_eq!(storage.transactions_paying_to(&[3u8; 20]).len(), 1);

        storage.remove(&tx_hash).unwrap();
        assert!(storage.is_empty());
        assert!(storage.check_pool_double_spend(&tx).is_ok());
        assert!(storage.transactions_paying_to(&[3u8; 20]).is_empty());
    }

    #[test]
    fn redeemers_come_first() {
        let mut storage = MempoolStorage::new(&MempoolConfig::default(), Utc::now());
        let parent = create_spend(vec![OutPoint::new(TxHash::from([1u8; 32]), 0)], &[1000, 1000]);
        let child = create_spend(vec![OutPoint::new(parent.hash(), 0)], &[900]);
        let other_child = create_spend(vec![OutPoint::new(parent.hash(), 1)], &[900]);
        let grandchild = create_spend(vec![OutPoint::new(child.hash(), 0)], &[800]);
        for tx in [&parent, &child, &other_child, &grandchild] {
            storage.insert(desc(tx.clone()));
        }

        let parent = Arc::new(parent);
        let ordered = storage
            .collect_redeemers(&parent)
            .iter()
            .map(|tx| tx.hash())
            .collect::<Vec<_>>();
        assert_eq!(ordered.len(), 4);
        assert_eq!(*ordered.last().unwrap(), parent.hash());
        let pos = |hash: TxHash| ordered.iter().position(|h| *h == hash).unwrap();
        assert!(pos(grandchild.hash()) < pos(child.hash()));
        assert!(pos(other_child.hash()) < pos(parent.hash()));
    }
}
