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
    collections::HashMap,
    sync::{Arc, RwLock},
};

use crate::{
    consensus::ConsensusHasher,
    transactions::Transaction,
    types::{FixedHash, TxHash},
};

/// The per transaction midstate hashes used by witness signature hashes. Computing them once per transaction keeps
/// signature hashing linear in the number of inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxSigHashes {
    pub hash_prev_outs: FixedHash,
    pub hash_sequence: FixedHash,
    pub hash_outputs: FixedHash,
}

impl TxSigHashes {
    pub fn new(tx: &Transaction) -> Self {
        let hash_prev_outs = tx
            .inputs
            .iter()
            .fold(ConsensusHasher::<sha2::Sha256>::default(), |hasher, input| {
                hasher.chain(&input.previous_output)
            })
            .finalize_double();
        let hash_sequence = tx
            .inputs
            .iter()
            .fold(ConsensusHasher::<sha2::Sha256>::default(), |hasher, input| {
                hasher.chain(&input.sequence)
            })
            .finalize_double();
        let hash_outputs = tx
            .outputs
            .iter()
            .fold(ConsensusHasher::<sha2::Sha256>::default(), |hasher, output| hasher.chain(output))
            .finalize_double();
        Self {
            hash_prev_outs,
            hash_sequence,
            hash_outputs,
        }
    }
}

/// Caches [TxSigHashes] by transaction id. Entries are added when a transaction with witness inputs is validated and
/// purged when the transaction leaves the mempool.
#[derive(Debug, Default)]
pub struct HashCache {
    sig_hashes: RwLock<HashMap<TxHash, Arc<TxSigHashes>>>,
}

impl HashCache {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add_sig_hashes(&self, tx: &Transaction) -> Arc<TxSigHashes> {
        let hashes = Arc::new(TxSigHashes::new(tx));
        if let Ok(mut cache) = self.sig_hashes.write() {
            cache.insert(tx.hash(), hashes.clone());
        }
        hashes
    }

    pub fn contains_hashes(&self, tx_hash: &TxHash) -> bool {
        self.sig_hashes
            .read()
            .map(|cache| cache.contains_key(tx_hash))
            .unwrap_or(false)
    }

    pub fn get_sig_hashes(&self, tx_hash: &TxHash) -> Option<Arc<TxSigHashes>> {
        self.sig_hashes.read().ok()?.get(tx_hash).cloned()
    }

    /// Returns the cached hashes for the transaction, computing and caching them if needed
    pub fn get_or_add(&self, tx: &Transaction) -> Arc<TxSigHashes> {
        match self.get_sig_hashes(&tx.hash()) {
            Some(hashes) => hashes,
            None => self.add_sig_hashes(tx),
        }
    }

    pub fn purge_sig_hashes(&self, tx_hash: &TxHash) {
        if let Ok(mut cache) = self.sig_hashes.write() {
            cache.remove(tx_hash);
        }
    }

    pub fn len(&self) -> usize {
        self.sig_hashes.read().map(|cache| cache.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::transactions::{OutPoint, TxInput, TxOutput};

    fn tx(sequence: u32) -> Transaction {
        Transaction::new(
            2,
            vec![TxInput::new(OutPoint::new(FixedHash::from([1; 32]), 0), vec![]).with_sequence(sequence)],
            vec![TxOutput::new(50, vec![0x51])],
            0,
        )
    }

    #[test]
    fn sig_hashes_commit_to_the_sequences() {
        let a = TxSigHashes::new(&tx(1));
        let b = TxSigHashes::new(&tx(2));
        assert_eq!(a.hash_prev_outs, b.hash_prev_outs);
        assert_eq!(a.hash_outputs, b.hash_outputs);
        assert_ne!(a.hash_sequence, b.hash_sequence);
    }

    #[test]
    fn it_adds_and_purges() {
        let cache = HashCache::new();
        let tx = tx(1);
        assert!(!cache.contains_hashes(&tx.hash()));
        let hashes = cache.get_or_add(&tx);
        assert!(cache.contains_hashes(&tx.hash()));
        assert!(Arc::ptr_eq(&hashes, &cache.get_or_add(&tx)));
        cache.purge_sig_hashes(&tx.hash());
        assert!(cache.is_empty());
    }
}
