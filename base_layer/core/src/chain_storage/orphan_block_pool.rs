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

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use log::*;

use crate::{blocks::Block, types::BlockHash};

const LOG_TARGET: &str = "c::cs::orphan_block_pool";

#[derive(Debug, Clone)]
struct OrphanBlock {
    block: Arc<Block>,
    expiration: DateTime<Utc>,
}

/// Blocks whose parent is not known yet. The pool is bounded by count, and entries expire after a time to live.
/// Expired entries are swept when a new orphan is added; when the pool is still full, the entry closest to expiry
/// is evicted.
#[derive(Debug)]
pub struct OrphanBlockPool {
    orphans: HashMap<BlockHash, OrphanBlock>,
    /// Orphan hashes by the hash of the parent they are waiting for
    prev_orphans: HashMap<BlockHash, Vec<BlockHash>>,
    capacity: usize,
    ttl: chrono::Duration,
}

impl OrphanBlockPool {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            orphans: HashMap::new(),
            prev_orphans: HashMap::new(),
            capacity: capacity.max(1),
            ttl: chrono::Duration::seconds(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX / 1000)),
        }
    }

    pub fn len(&self) -> usize {
        self.orphans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orphans.is_empty()
    }

    pub fn contains(&self, hash: &BlockHash) -> bool {
        self.orphans.contains_key(hash)
    }

    pub fn get(&self, hash: &BlockHash) -> Option<Arc<Block>> {
        self.orphans.get(hash).map(|orphan| orphan.block.clone())
    }

    pub fn add(&mut self, block: Arc<Block>) {
        self.add_at(block, Utc::now());
    }

    /// Adds the orphan as if the current time was `now`.
    pub fn add_at(&mut self, block: Arc<Block>, now: DateTime<Utc>) {
        let hash = block.hash();
        if self.orphans.contains_key(&hash) {
            return;
        }

        let expired = self
            .orphans
            .iter()
            .filter(|(_, orphan)| now > orphan.expiration)
            .map(|(hash, _)| *hash)
            .collect::<Vec<_>>();
        for hash in &expired {
            self.remove(hash);
        }
        if !expired.is_empty() {
            debug!(target: LOG_TARGET, "Removed {} expired orphan blocks", expired.len());
        }

        if self.orphans.len() + 1 > self.capacity {
            let oldest = self
                .orphans
                .iter()
                .min_by_key(|(_, orphan)| orphan.expiration)
                .map(|(hash, _)| *hash);
            if let Some(oldest) = oldest {
                debug!(target: LOG_TARGET, "Orphan pool is full, evicting orphan block {}", oldest);
                self.remove(&oldest);
            }
        }

        let prev_hash = block.header.prev_hash;
        self.orphans.insert(hash, OrphanBlock {
            block,
            expiration: now + self.ttl,
        });
        self.prev_orphans.entry(prev_hash).or_default().push(hash);
        trace!(target: LOG_TARGET, "Added orphan block {} waiting for {}", hash, prev_hash);
    }

    pub fn remove(&mut self, hash: &BlockHash) -> Option<Arc<Block>> {
        let orphan = self.orphans.remove(hash)?;
        let prev_hash = orphan.block.header.prev_hash;
        if let Some(siblings) = self.prev_orphans.get_mut(&prev_hash) {
            siblings.retain(|sibling| sibling != hash);
            if siblings.is_empty() {
                self.prev_orphans.remove(&prev_hash);
            }
        }
        Some(orphan.block)
    }

    /// Removes and returns every orphan that builds on the given block
    pub fn take_children(&mut self, prev_hash: &BlockHash) -> Vec<Arc<Block>> {
        let children = self.prev_orphans.remove(prev_hash).unwrap_or_default();
        children
            .iter()
            .filter_map(|hash| self.orphans.remove(hash).map(|orphan| orphan.block))
            .collect()
    }

    /// The deepest ancestor of the given block that is in the pool, following parent links through the pool. This
    /// is the block whose parent must be requested to make the chain of orphans connectable. Returns the hash itself
    /// if it is not an orphan.
    pub fn orphan_root(&self, hash: &BlockHash) -> BlockHash {
        let mut root = *hash;
        let mut prev_hash = *hash;
        while let Some(orphan) = self.orphans.get(&prev_hash) {
            root = prev_hash;
            prev_hash = orphan.block.header.prev_hash;
        }
        root
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::blocks::{BlockBuilder, BlockHeader};

    fn orphan(prev_hash: BlockHash, nonce: u64) -> Arc<Block> {
        let mut header = BlockHeader::new(1);
        header.prev_hash = prev_hash;
        header.nonce = nonce;
        Arc::new(BlockBuilder::new(1).with_header(header).build())
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut pool = OrphanBlockPool::new(100, Duration::from_secs(3600));
        let start = Utc::now();
        let first = orphan(BlockHash::from([1; 32]), 0);
        pool.add_at(first.clone(), start);
        for i in 1..100u64 {
            pool.add_at(orphan(BlockHash::from([1; 32]), i), start + chrono::Duration::seconds(i as i64));
        }
        assert_eq!(pool.len(), 100);
        pool.add_at(orphan(BlockHash::from([2; 32]), 1000), start + chrono::Duration::seconds(200));
        assert_eq!(pool.len(), 100);
        assert!(!pool.contains(&first.hash()));
    }

    #[test]
    fn expired_orphans_are_swept() {
        let mut pool = OrphanBlockPool::new(10, Duration::from_secs(3600));
        let start = Utc::now();
        let old = orphan(BlockHash::from([1; 32]), 0);
        pool.add_at(old.clone(), start);
        let new = orphan(BlockHash::from([1; 32]), 1);
        pool.add_at(new.clone(), start + chrono::Duration::seconds(3601));
        assert!(!pool.contains(&old.hash()));
        assert!(pool.contains(&new.hash()));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn children_and_root() {
        let mut pool = OrphanBlockPool::new(10, Duration::from_secs(3600));
        let missing = BlockHash::from([9; 32]);
        let a = orphan(missing, 0);
        let b = orphan(a.hash(), 0);
        let c = orphan(a.hash(), 1);
        pool.add(a.clone());
        pool.add(b.clone());
        pool.add(c.clone());
        assert_eq!(pool.orphan_root(&b.hash()), a.hash());
        assert_eq!(pool.orphan_root(&missing), missing);

        let children = pool.take_children(&a.hash());
        assert_eq!(children.len(), 2);
        assert_eq!(pool.len(), 1);
        assert!(pool.take_children(&a.hash()).is_empty());
        assert_eq!(pool.remove(&a.hash()), Some(a));
        assert!(pool.is_empty());
    }
}
