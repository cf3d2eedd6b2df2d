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

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::*;

use crate::{transactions::Transaction, types::TxHash};

const LOG_TARGET: &str = "c::mp::events";

#[derive(Debug, Clone)]
pub enum MempoolEvent {
    /// The transaction entered the pool. `is_new` is false when it was re-added after its block was disconnected.
    TransactionAccepted { tx: Arc<Transaction>, is_new: bool },
    TransactionRemoved { hash: TxHash },
}

/// Receives mempool notifications. Publishing must not block, it is called while the mempool is locked.
pub trait MempoolEventSink: Send + Sync {
    fn publish(&self, event: MempoolEvent);
}

/// Drops every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

impl MempoolEventSink for NullEventSink {
    fn publish(&self, _event: MempoolEvent) {}
}

/// A bounded queue of mempool events. When the queue is full new events are dropped and a warning is logged.
///
/// Every call to [subscribe](BoundedEventQueue::subscribe) returns a handle to the same queue, so each event is
/// delivered to exactly one subscriber.
#[derive(Debug, Clone)]
pub struct BoundedEventQueue {
    sender: Sender<MempoolEvent>,
    receiver: Receiver<MempoolEvent>,
}

impl BoundedEventQueue {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        Self { sender, receiver }
    }

    pub fn subscribe(&self) -> Receiver<MempoolEvent> {
        self.receiver.clone()
    }

    /// Takes every event currently queued
    pub fn drain(&self) -> Vec<MempoolEvent> {
        self.receiver.try_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl MempoolEventSink for BoundedEventQueue {
    fn publish(&self, event: MempoolEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {},
            Err(TrySendError::Full(event)) => {
                warn!(
                    target: LOG_TARGET,
                    "Mempool event queue is full, dropping event {:?}", event
                );
            },
            Err(TrySendError::Disconnected(_)) => {
                debug!(target: LOG_TARGET, "No mempool event subscribers");
            },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn it_drops_events_when_full() {
        let queue = BoundedEventQueue::new(2);
        for i in 0..3u8 {
            queue.publish(MempoolEvent::TransactionRemoved {
                hash: TxHash::from([i; 32]),
            });
        }
        assert_eq!(queue.len(), 2);
        let events = queue.drain();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0],
            MempoolEvent::TransactionRemoved { hash } if hash == TxHash::from([0u8; 32])
        ));
        assert!(queue.is_empty());

        let subscriber = queue.subscribe();
        queue.publish(MempoolEvent::TransactionRemoved {
            hash: TxHash::from([9u8; 32]),
        });
        assert!(subscriber.try_recv().is_ok());
        assert!(queue.drain().is_empty());
    }
}
