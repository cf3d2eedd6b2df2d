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

use std::{collections::HashMap, sync::RwLock};

use log::*;
use rand::Rng;

use crate::types::FixedHash;

const LOG_TARGET: &str = "c::script::sig_cache";

#[derive(Debug, Clone, PartialEq, Eq)]
struct SigCacheEntry {
    signature: Vec<u8>,
    public_key: Vec<u8>,
}

/// A bounded cache of signatures that have already been verified, keyed by signature hash. Signatures checked when a
/// transaction enters the mempool are not verified again when the block containing it arrives.
#[derive(Debug)]
pub struct SigCache {
    valid_sigs: RwLock<HashMap<FixedHash, SigCacheEntry>>,
    max_entries: usize,
}

impl SigCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            valid_sigs: RwLock::new(HashMap::with_capacity(max_entries.min(1024))),
            max_entries,
        }
    }

    /// True if the exact signature and public key were verified for this signature hash
    pub fn exists(&self, sig_hash: &FixedHash, signature: &[u8], public_key: &[u8]) -> bool {
        match self.valid_sigs.read() {
            Ok(sigs) => sigs
                .get(sig_hash)
                .map(|entry| entry.signature == signature && entry.public_key == public_key)
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Adds a verified signature. When the cache is full a random entry is evicted first.
    pub fn add(&self, sig_hash: FixedHash, signature: Vec<u8>, public_key: Vec<u8>) {
        if self.max_entries == 0 {
            return;
        }
        let mut sigs = match self.valid_sigs.write() {
            Ok(sigs) => sigs,
            Err(_) => {
                warn!(target: LOG_TARGET, "Signature cache lock poisoned, not caching signature");
                return;
            },
        };
        if sigs.len() >= self.max_entries && !sigs.contains_key(&sig_hash) {
            let victim = rand::thread_rng().gen_range(0..sigs.len());
            if let Some(key) = sigs.keys().nth(victim).copied() {
                trace!(target: LOG_TARGET, "Evicting signature {} from the cache", key);
                sigs.remove(&key);
            }
        }
        sigs.insert(sig_hash, SigCacheEntry { signature, public_key });
    }

    pub fn len(&self) -> usize {
        self.valid_sigs.read().map(|sigs| sigs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
