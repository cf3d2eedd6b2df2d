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

use std::{fmt, sync::Arc};

use crate::blocks::Block;

/// A change to the chain made while processing a block. Events are recorded in the order they happened, so a
/// reorganisation shows every disconnected block (tip first) before the connected blocks (fork point first).
#[derive(Clone, Debug, PartialEq)]
pub enum ChainEvent {
    /// The block passed validation and was added to the block index, on the main chain or a side chain.
    BlockAccepted(Arc<Block>),
    /// The block was added to the end of the main chain.
    BlockConnected(Arc<Block>),
    /// The block was removed from the end of the main chain.
    BlockDisconnected(Arc<Block>),
}

impl ChainEvent {
    pub fn block(&self) -> &Arc<Block> {
        match self {
            ChainEvent::BlockAccepted(block) |
            ChainEvent::BlockConnected(block) |
            ChainEvent::BlockDisconnected(block) => block,
        }
    }
}

impl fmt::Display for ChainEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainEvent::BlockAccepted(block) => write!(f, "Block {} accepted", block.hash()),
            ChainEvent::BlockConnected(block) => {
                write!(f, "Block {} connected at height {}", block.hash(), block.height())
            },
            ChainEvent::BlockDisconnected(block) => {
                write!(f, "Block {} disconnected from height {}", block.hash(), block.height())
            },
        }
    }
}

/// The outcome of processing a block that was not rejected.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BlockAddResult {
    /// The block's parent is unknown, so it was held in the orphan pool
    pub is_orphan: bool,
    pub events: Vec<ChainEvent>,
}

impl BlockAddResult {
    pub fn orphaned() -> Self {
        Self {
            is_orphan: true,
            events: Vec::new(),
        }
    }

    /// Returns true if the main chain was changed
    pub fn was_chain_modified(&self) -> bool {
        self.events
            .iter()
            .any(|event| !matches!(event, ChainEvent::BlockAccepted(_)))
    }

    pub fn is_chain_reorg(&self) -> bool {
        self.events
            .iter()
            .any(|event| matches!(event, ChainEvent::BlockDisconnected(_)))
    }

    pub fn connected_blocks(&self) -> Vec<Arc<Block>> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ChainEvent::BlockConnected(block) => Some(block.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn disconnected_blocks(&self) -> Vec<Arc<Block>> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ChainEvent::BlockDisconnected(block) => Some(block.clone()),
                _ => None,
            })
            .collect()
    }

    #[cfg(test)]
    pub fn assert_reorg(&self, num_added: usize, num_removed: usize) {
        assert_eq!(
            num_added,
            self.connected_blocks().len(),
            "Number of connected blocks was different"
        );
        assert_eq!(
            num_removed,
            self.disconnected_blocks().len(),
            "Number of disconnected blocks was different"
        );
    }
}

impl fmt::Display for BlockAddResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_orphan {
            return write!(f, "Block added as orphan");
        }
        let connected = self.connected_blocks();
        let disconnected = self.disconnected_blocks();
        match (connected.last(), disconnected.is_empty()) {
            (Some(tip), true) => write!(f, "{} blocks connected, new tip is {}", connected.len(), tip.hash()),
            (Some(tip), false) => write!(
                f,
                "Reorg removed {} blocks and added {} blocks ending with {} ({})",
                disconnected.len(),
                connected.len(),
                tip.height(),
                tip.hash()
            ),
            (None, _) => write!(f, "Block accepted without changing the main chain"),
        }
    }
}
