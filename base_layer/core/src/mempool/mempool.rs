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
    collections::{HashSet, VecDeque},
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    blocks::Block,
    chain_storage::{BlockchainBackend, BlockchainDatabase, TxData, TxStore, MEMPOOL_HEIGHT},
    common::{MedianTimeSource, RejectCode},
    mempool::{
        mempool_storage::MempoolStorage,
        policy::{
            calc_min_required_fee,
            calc_priority,
            check_inputs_standard,
            check_transaction_standard,
            DEFAULT_BLOCK_PRIORITY_SIZE,
            MIN_HIGH_PRIORITY,
        },
        MempoolConfig,
        MempoolError,
        MempoolEvent,
        MempoolEventSink,
        TxDesc,
    },
    script::STANDARD_VERIFY_FLAGS,
    transactions::{OutPoint, Transaction},
    types::TxHash,
    validation::{
        check_transaction_inputs,
        check_transaction_sanity,
        sequence_lock_active,
        ScriptValidationPool,
        ScriptWorkItem,
    },
};

pub const LOG_TARGET: &str = "c::mp::mempool";

/// The Mempool holds valid transactions that have not been mined yet, along with orphan transactions whose inputs are
/// not known yet. It validates every transaction against the best chain of the [BlockchainDatabase] and the other
/// pooled transactions, and applies relay policy on top of consensus. Block connections and disconnections are fed in
/// by the caller so the pool follows the best chain.
pub struct Mempool<B> {
    blockchain_db: BlockchainDatabase<B>,
    config: MempoolConfig,
    relay_non_std_txs: bool,
    time_source: Arc<dyn MedianTimeSource>,
    event_sink: Arc<dyn MempoolEventSink>,
    pool_storage: Arc<RwLock<MempoolStorage>>,
}

impl<B> Mempool<B>
where B: BlockchainBackend
{
    pub fn new(
        blockchain_db: BlockchainDatabase<B>,
        config: MempoolConfig,
        time_source: Arc<dyn MedianTimeSource>,
        event_sink: Arc<dyn MempoolEventSink>,
    ) -> Self {
        let relay_non_std_txs = config
            .relay_non_std_txs
            .unwrap_or_else(|| blockchain_db.rules().consensus_constants().relay_non_std_txs());
        let pool_storage = MempoolStorage::new(&config, Utc::now());
        Self {
            blockchain_db,
            config,
            relay_non_std_txs,
            time_source,
            event_sink,
            pool_storage: Arc::new(RwLock::new(pool_storage)),
        }
    }

    pub fn config(&self) -> &MempoolConfig {
        &self.config
    }

    fn read_access(&self) -> Result<RwLockReadGuard<'_, MempoolStorage>, MempoolError> {
        self.pool_storage.read().map_err(|e| {
            error!(target: LOG_TARGET, "An attempt to get a read lock on the mempool failed. {:?}", e);
            MempoolError::RwLockPoisonError
        })
    }

    fn write_access(&self) -> Result<RwLockWriteGuard<'_, MempoolStorage>, MempoolError> {
        self.pool_storage.write().map_err(|e| {
            error!(target: LOG_TARGET, "An attempt to get a write lock on the mempool failed. {:?}", e);
            MempoolError::RwLockPoisonError
        })
    }

    /// Validates the transaction and adds it to the pool unless an input is unknown, in which case the hashes of the
    /// missing parents are returned and nothing is stored. `is_new` is false for transactions returning from a
    /// disconnected block, which are exempt from the priority requirement.
    pub fn maybe_accept_transaction(
        &self,
        tx: Arc<Transaction>,
        is_new: bool,
        rate_limit: bool,
    ) -> Result<Vec<TxHash>, MempoolError> {
        let mut storage = self.write_access()?;
        self.accept_transaction(&mut storage, tx, is_new, rate_limit)
    }

    /// The main entry point for transactions relayed by peers. Accepted transactions promote any orphans waiting on
    /// them. A transaction with unknown inputs is stored as an orphan if `allow_orphan` is set, otherwise it is
    /// rejected. Returns true when the transaction was stored as an orphan.
    pub fn process_transaction(
        &self,
        tx: Arc<Transaction>,
        allow_orphan: bool,
        rate_limit: bool,
    ) -> Result<bool, MempoolError> {
        let tx_hash = tx.hash();
        trace!(target: LOG_TARGET, "Processing transaction {}", tx_hash);
        let mut storage = self.write_access()?;
        let missing_parents = self.accept_transaction(&mut storage, tx.clone(), true, rate_limit)?;
        if missing_parents.is_empty() {
            self.process_orphans_locked(&mut storage, tx_hash)?;
            return Ok(false);
        }

        if !allow_orphan {
            return Err(MempoolError::tx_rule(
                RejectCode::Duplicate,
                format!(
                    "Orphan transaction {} references outputs of unknown or fully-spent transaction {}",
                    tx_hash, missing_parents[0]
                ),
            ));
        }
        storage.orphans.insert(tx)?;
        debug!(
            target: LOG_TARGET,
            "Transaction {} is an orphan, missing {} parent(s)",
            tx_hash,
            missing_parents.len()
        );
        Ok(true)
    }

    fn accept_transaction(
        &self,
        storage: &mut MempoolStorage,
        tx: Arc<Transaction>,
        is_new: bool,
        rate_limit: bool,
    ) -> Result<Vec<TxHash>, MempoolError> {
        let tx_hash = tx.hash();
        if storage.have_transaction(&tx_hash) {
            return Err(MempoolError::tx_rule(
                RejectCode::Duplicate,
                format!("Already have transaction {}", tx_hash),
            ));
        }

        let constants = self.blockchain_db.rules().consensus_constants();
        check_transaction_sanity(&tx, constants)?;
        if tx.is_coinbase() {
            return Err(MempoolError::tx_rule(
                RejectCode::Invalid,
                format!("Transaction {} is an individual coinbase", tx_hash),
            ));
        }
        if tx.lock_time > i32::MAX as u32 {
            return Err(MempoolError::tx_rule(
                RejectCode::Nonstandard,
                format!(
                    "Transaction {} has a lock time of {} which is greater than the maximum allowed",
                    tx_hash, tx.lock_time
                ),
            ));
        }

        let best_height = self.blockchain_db.best_height()?;
        let next_height = best_height + 1;
        if !self.relay_non_std_txs {
            check_transaction_standard(
                &tx,
                next_height,
                self.time_source.adjusted_time(),
                self.config.min_relay_tx_fee,
            )?;
        }

        storage.check_pool_double_spend(&tx)?;

        let mut store = self.fetch_input_transactions(storage, &tx)?;
        let missing_parents = missing_parents(&tx, &store);
        if !missing_parents.is_empty() {
            return Ok(missing_parents);
        }

        let own = self.blockchain_db.fetch_transaction_store(&HashSet::from([tx_hash]), false)?;
        if own.get(&tx_hash).map_or(false, |data| !data.is_missing()) {
            return Err(MempoolError::tx_rule(
                RejectCode::Duplicate,
                format!("Transaction {} already exists on the chain with unspent outputs", tx_hash),
            ));
        }

        let sequence_lock = self.blockchain_db.calc_sequence_lock(&tx, &store)?;
        let median_time_past = self.blockchain_db.past_median_time_of_tip()?;
        if !sequence_lock_active(&sequence_lock, next_height, median_time_past) {
            return Err(MempoolError::tx_rule(
                RejectCode::Nonstandard,
                format!("Transaction {} has sequence locks on inputs which are not yet met", tx_hash),
            ));
        }

        let fee = check_transaction_inputs(&tx, next_height, &mut store, constants)?;
        if !self.relay_non_std_txs {
            check_inputs_standard(&tx, &store)?;
        }

        let size = tx.serialized_size();
        let min_fee = calc_min_required_fee(size, self.config.min_relay_tx_fee, constants.max_money());
        if size >= DEFAULT_BLOCK_PRIORITY_SIZE - 1000 && fee < min_fee {
            return Err(MempoolError::tx_rule(
                RejectCode::InsufficientFee,
                format!(
                    "Transaction {} has {} fees which is under the required amount of {}",
                    tx_hash, fee, min_fee
                ),
            ));
        }
        let priority = calc_priority(&tx, &store, next_height);
        if is_new && !self.config.no_relay_priority && fee < min_fee && priority <= MIN_HIGH_PRIORITY {
            return Err(MempoolError::tx_rule(
                RejectCode::InsufficientFee,
                format!(
                    "Transaction {} has insufficient priority ({:.2} <= {:.2})",
                    tx_hash, priority, MIN_HIGH_PRIORITY
                ),
            ));
        }
        if rate_limit && fee < min_fee {
            storage
                .rate_limiter
                .admit(Utc::now(), size, self.config.free_tx_relay_limit)?;
        }

        self.validate_scripts(&tx, store)?;

        let added = Utc::now();
        storage.insert(TxDesc {
            tx: tx.clone(),
            added,
            height: best_height,
            fee,
            starting_priority: priority,
        });
        debug!(
            target: LOG_TARGET,
            "Accepted transaction {} (pool size: {})",
            tx_hash,
            storage.len()
        );
        self.event_sink.publish(MempoolEvent::TransactionAccepted { tx, is_new });
        Ok(Vec::new())
    }

    /// The outputs spent by the transaction as seen from the best chain, with outputs of pooled transactions added at
    /// the mempool height. Unknown inputs are reported as missing entries.
    fn fetch_input_transactions(&self, storage: &MempoolStorage, tx: &Transaction) -> Result<TxStore, MempoolError> {
        let needed = tx
            .inputs
            .iter()
            .map(|input| input.previous_output.hash)
            .collect::<HashSet<_>>();
        let mut store = self.blockchain_db.fetch_transaction_store(&needed, false)?;
        for (hash, data) in store.iter_mut() {
            if !data.is_missing() {
                continue;
            }
            if let Some(desc) = storage.get(hash) {
                *data = TxData::new(desc.tx.clone(), MEMPOOL_HEIGHT);
            }
        }
        Ok(store)
    }

    fn validate_scripts(&self, tx: &Arc<Transaction>, store: TxStore) -> Result<(), MempoolError> {
        let hash_cache = self.blockchain_db.hash_cache();
        let items = ScriptWorkItem::for_transaction(tx, &hash_cache);
        let pool = ScriptValidationPool::new(
            Arc::new(store),
            STANDARD_VERIFY_FLAGS,
            self.blockchain_db.script_engine(),
            self.blockchain_db.sig_cache(),
        );
        pool.validate(items).map_err(|e| {
            hash_cache.purge_sig_hashes(&tx.hash());
            e.into()
        })
    }

    /// Moves orphans that spend from the given transaction into the pool, and then the orphans that spend from those.
    /// Returns the promoted transactions.
    pub fn process_orphans(&self, accepted: TxHash) -> Result<Vec<Arc<Transaction>>, MempoolError> {
        let mut storage = self.write_access()?;
        self.process_orphans_locked(&mut storage, accepted)
    }

    fn process_orphans_locked(
        &self,
        storage: &mut MempoolStorage,
        accepted: TxHash,
    ) -> Result<Vec<Arc<Transaction>>, MempoolError> {
        let mut promoted = Vec::new();
        let mut queue = VecDeque::from([accepted]);
        while let Some(parent) = queue.pop_front() {
            for orphan in storage.orphans.dependents_of(&parent) {
                let orphan_hash = orphan.hash();
                storage.orphans.remove(&orphan_hash);
                match self.accept_transaction(storage, orphan.clone(), true, false) {
                    Ok(missing) if missing.is_empty() => {
                        debug!(target: LOG_TARGET, "Promoted orphan transaction {}", orphan_hash);
                        queue.push_back(orphan_hash);
                        promoted.push(orphan);
                    },
                    Ok(_) => {
                        // Still waiting on another parent
                        storage.orphans.insert(orphan)?;
                    },
                    Err(e) if e.is_rule_violation() => {
                        debug!(
                            target: LOG_TARGET,
                            "Orphan transaction {} is invalid and was dropped with its redeemers: {}", orphan_hash, e
                        );
                        Self::remove_orphan_locked(storage, &orphan_hash, true);
                    },
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(promoted)
    }

    /// Removes the transaction from the pool. With `remove_redeemers` every pooled transaction spending from it is
    /// removed too, recursively. Removed redeemers are dropped, not moved to the orphan pool.
    pub fn remove_transaction(&self, tx: &Arc<Transaction>, remove_redeemers: bool) -> Result<(), MempoolError> {
        let mut storage = self.write_access()?;
        self.remove_transaction_locked(&mut storage, tx, remove_redeemers);
        Ok(())
    }

    fn remove_transaction_locked(&self, storage: &mut MempoolStorage, tx: &Arc<Transaction>, remove_redeemers: bool) {
        let to_remove = if remove_redeemers {
            storage.collect_redeemers(tx)
        } else {
            vec![tx.clone()]
        };
        let hash_cache = self.blockchain_db.hash_cache();
        for tx in to_remove {
            let tx_hash = tx.hash();
            if storage.remove(&tx_hash).is_some() {
                hash_cache.purge_sig_hashes(&tx_hash);
                self.event_sink.publish(MempoolEvent::TransactionRemoved { hash: tx_hash });
            }
        }
    }

    /// Removes every pooled transaction, and its redeemers, that spends an output also spent by `tx`
    pub fn remove_double_spends(&self, tx: &Transaction) -> Result<(), MempoolError> {
        let mut storage = self.write_access()?;
        self.remove_double_spends_locked(&mut storage, tx);
        Ok(())
    }

    fn remove_double_spends_locked(&self, storage: &mut MempoolStorage, tx: &Transaction) {
        let tx_hash = tx.hash();
        for input in &tx.inputs {
            let spender = storage
                .spender_of(&input.previous_output)
                .filter(|spender| spender.hash() != tx_hash)
                .cloned();
            if let Some(spender) = spender {
                debug!(
                    target: LOG_TARGET,
                    "Removing transaction {} which double spends {}",
                    spender.hash(),
                    input.previous_output
                );
                self.remove_transaction_locked(storage, &spender, true);
            }
        }
    }

    /// Removes the orphan, and with `remove_redeemers` every orphan spending from it
    pub fn remove_orphan(&self, tx_hash: &TxHash, remove_redeemers: bool) -> Result<(), MempoolError> {
        let mut storage = self.write_access()?;
        Self::remove_orphan_locked(&mut storage, tx_hash, remove_redeemers);
        Ok(())
    }

    fn remove_orphan_locked(storage: &mut MempoolStorage, tx_hash: &TxHash, remove_redeemers: bool) {
        let mut queue = VecDeque::from([*tx_hash]);
        while let Some(hash) = queue.pop_front() {
            let removed = storage.orphans.remove(&hash);
            if !remove_redeemers {
                break;
            }
            // Only follow orphans that spend an output of the removed one
            let num_outputs = removed.map(|tx| tx.outputs.len()).unwrap_or(usize::MAX);
            for dependent in storage.orphans.dependents_of(&hash) {
                let spends_output = dependent
                    .inputs
                    .iter()
                    .any(|input| input.previous_output.hash == hash && (input.previous_output.index as usize) < num_outputs);
                if spends_output {
                    queue.push_back(dependent.hash());
                }
            }
        }
    }

    /// Updates the pool for a block added to the main chain: its transactions and anything double spending them are
    /// removed, and orphans waiting on them are promoted. Returns the promoted transactions.
    pub fn process_published_block(&self, block: &Block) -> Result<Vec<Arc<Transaction>>, MempoolError> {
        let mut storage = self.write_access()?;
        let mut promoted = Vec::new();
        for tx in block.transactions.iter().skip(1) {
            let tx_hash = tx.hash();
            self.remove_transaction_locked(&mut storage, tx, false);
            self.remove_double_spends_locked(&mut storage, tx);
            Self::remove_orphan_locked(&mut storage, &tx_hash, false);
            promoted.extend(self.process_orphans_locked(&mut storage, tx_hash)?);
        }
        debug!(
            target: LOG_TARGET,
            "Processed block {} at height {}, {} transaction(s) in the pool",
            block.hash(),
            block.height(),
            storage.len()
        );
        Ok(promoted)
    }

    /// Updates the pool for a block removed from the main chain. Its transactions are returned to the pool if they are
    /// still valid. Otherwise they are removed along with anything spending from them.
    pub fn process_disconnected_block(&self, block: &Block) -> Result<(), MempoolError> {
        let mut storage = self.write_access()?;
        for tx in block.transactions.iter().skip(1) {
            match self.accept_transaction(&mut storage, tx.clone(), false, false) {
                Ok(missing) if missing.is_empty() => {},
                Ok(_) => {
                    debug!(
                        target: LOG_TARGET,
                        "Transaction {} from disconnected block {} has missing inputs",
                        tx.hash(),
                        block.hash()
                    );
                    self.remove_transaction_locked(&mut storage, tx, true);
                },
                Err(e) if e.is_rule_violation() => {
                    debug!(
                        target: LOG_TARGET,
                        "Transaction {} from disconnected block {} was not returned to the pool: {}",
                        tx.hash(),
                        block.hash(),
                        e
                    );
                    self.remove_transaction_locked(&mut storage, tx, true);
                },
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// The number of transactions in the pool, not counting orphans
    pub fn count(&self) -> Result<usize, MempoolError> {
        Ok(self.read_access()?.len())
    }

    pub fn orphan_count(&self) -> Result<usize, MempoolError> {
        Ok(self.read_access()?.orphans.len())
    }

    pub fn tx_descs(&self) -> Result<Vec<TxDesc>, MempoolError> {
        Ok(self.read_access()?.tx_descs())
    }

    pub fn tx_hashes(&self) -> Result<Vec<TxHash>, MempoolError> {
        Ok(self.read_access()?.tx_hashes())
    }

    /// Fetches a transaction from the pool. Orphans are not returned.
    pub fn fetch_transaction(&self, tx_hash: &TxHash) -> Result<Option<Arc<Transaction>>, MempoolError> {
        Ok(self.read_access()?.get(tx_hash).map(|desc| desc.tx.clone()))
    }

    /// True if the transaction is in the pool or the orphan pool
    pub fn have_transaction(&self, tx_hash: &TxHash) -> Result<bool, MempoolError> {
        Ok(self.read_access()?.have_transaction(tx_hash))
    }

    pub fn is_transaction_in_pool(&self, tx_hash: &TxHash) -> Result<bool, MempoolError> {
        Ok(self.read_access()?.contains(tx_hash))
    }

    pub fn is_orphan_in_pool(&self, tx_hash: &TxHash) -> Result<bool, MempoolError> {
        Ok(self.read_access()?.orphans.contains(tx_hash))
    }

    /// The pooled transaction spending the outpoint, if any
    pub fn fetch_spender(&self, outpoint: &OutPoint) -> Result<Option<Arc<Transaction>>, MempoolError> {
        Ok(self.read_access()?.spender_of(outpoint).cloned())
    }

    /// The last time a transaction was added to or removed from the pool
    pub fn last_updated(&self) -> Result<DateTime<Utc>, MempoolError> {
        Ok(self.read_access()?.last_updated())
    }

    /// Pooled transactions with an output paying to the given payload: a public key hash, script hash, witness program
    /// or public key. Requires the address index.
    pub fn filter_transactions_by_address(&self, payload: &[u8]) -> Result<Vec<Arc<Transaction>>, MempoolError> {
        let storage = self.read_access()?;
        if !storage.addr_index_enabled() {
            return Err(MempoolError::AddressIndexDisabled);
        }
        Ok(storage.transactions_paying_to(payload))
    }
}

impl<B> Clone for Mempool<B> {
    fn clone(&self) -> Self {
        Self {
            blockchain_db: self.blockchain_db.clone(),
            config: self.config.clone(),
            relay_non_std_txs: self.relay_non_std_txs,
            time_source: self.time_source.clone(),
            event_sink: self.event_sink.clone(),
            pool_storage: self.pool_storage.clone(),
        }
    }
}

fn missing_parents(tx: &Transaction, store: &TxStore) -> Vec<TxHash> {
    let mut missing = Vec::new();
    for input in &tx.inputs {
        let hash = input.previous_output.hash;
        let is_missing = store.get(&hash).map_or(true, TxData::is_missing);
        if is_missing && !missing.contains(&hash) {
            missing.push(hash);
        }
    }
    missing
}
