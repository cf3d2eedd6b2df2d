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

use std::{cmp::Ordering, fmt::Debug};

use crate::chain_storage::BlockNode;

/// Orders chain tips by strength. `Ordering::Greater` means `a` is the stronger chain.
pub trait ChainStrengthComparer: Debug {
    fn compare(&self, a: &BlockNode, b: &BlockNode) -> Ordering;
}

#[derive(Default, Debug)]
pub struct AccumulatedWorkComparer {}

impl ChainStrengthComparer for AccumulatedWorkComparer {
    fn compare(&self, a: &BlockNode, b: &BlockNode) -> Ordering {
        a.capsum.cmp(&b.capsum)
    }
}

/// The tip that was mined first is stronger
#[derive(Default, Debug)]
pub struct EarlierTimestampComparer {}

impl ChainStrengthComparer for EarlierTimestampComparer {
    fn compare(&self, a: &BlockNode, b: &BlockNode) -> Ordering {
        b.timestamp.cmp(&a.timestamp)
    }
}

/// The tip whose hash is numerically smaller is stronger
#[derive(Default, Debug)]
pub struct SmallerHashComparer {}

impl ChainStrengthComparer for SmallerHashComparer {
    fn compare(&self, a: &BlockNode, b: &BlockNode) -> Ordering {
        b.hash.to_u256().cmp(&a.hash.to_u256())
    }
}

#[derive(Debug)]
pub struct ThenComparer {
    before: Box<dyn ChainStrengthComparer + Send + Sync>,
    after: Box<dyn ChainStrengthComparer + Send + Sync>,
}

impl ThenComparer {
    pub fn new(
        before: Box<dyn ChainStrengthComparer + Send + Sync>,
        after: Box<dyn ChainStrengthComparer + Send + Sync>,
    ) -> Self {
        ThenComparer { before, after }
    }
}

impl ChainStrengthComparer for ThenComparer {
    fn compare(&self, a: &BlockNode, b: &BlockNode) -> Ordering {
        match self.before.compare(a, b) {
            Ordering::Equal => self.after.compare(a, b),
            Ordering::Less => Ordering::Less,
            Ordering::Greater => Ordering::Greater,
        }
    }
}

#[derive(Default)]
pub struct ChainStrengthComparerBuilder {
    target: Option<Box<dyn ChainStrengthComparer + Send + Sync>>,
}

impl ChainStrengthComparerBuilder {
    pub fn new() -> ChainStrengthComparerBuilder {
        ChainStrengthComparerBuilder { target: None }
    }

    fn add_comparer_as_then(mut self, inner: Box<dyn ChainStrengthComparer + Send + Sync>) -> Self {
        self.target = match self.target {
            Some(t) => Some(Box::new(ThenComparer::new(t, inner))),
            None => Some(inner),
        };
        self
    }

    pub fn by_accumulated_work(self) -> Self {
        self.add_comparer_as_then(Box::<AccumulatedWorkComparer>::default())
    }

    pub fn by_earlier_timestamp(self) -> Self {
        self.add_comparer_as_then(Box::<EarlierTimestampComparer>::default())
    }

    pub fn by_smaller_hash(self) -> Self {
        self.add_comparer_as_then(Box::<SmallerHashComparer>::default())
    }

    pub fn then(self) -> Self {
        // convenience method for wording
        self
    }

    /// Builds the comparer. An empty builder compares by accumulated work alone.
    pub fn build(self) -> Box<dyn ChainStrengthComparer + Send + Sync> {
        self.target.unwrap_or_else(|| Box::<AccumulatedWorkComparer>::default())
    }
}

pub fn strongest_chain() -> ChainStrengthComparerBuilder {
    ChainStrengthComparerBuilder::new()
}
