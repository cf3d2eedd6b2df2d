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

//! Network adjusted time.
//!
//! Peers report their clocks when they connect. The median of the offsets between those clocks and the local clock is
//! added to the local time to get the time used for block timestamp checks, which keeps a node with a slightly wrong
//! clock in agreement with the network.

use std::{
    collections::{HashSet, VecDeque},
    sync::Mutex,
};

use chrono::{DateTime, Utc};
use log::*;

const LOG_TARGET: &str = "c::common::median_time";

/// Maximum number of peer offsets kept. Once full the oldest offset is replaced.
pub const MAX_MEDIAN_TIME_ENTRIES: usize = 200;
/// Medians further than this from the local clock are ignored
pub const MAX_ALLOWED_OFFSET_SECS: i64 = 70 * 60;
/// Offsets within this range of the local clock are considered plausible
pub const SIMILAR_TIME_SECS: i64 = 5 * 60;
const MIN_SAMPLES_FOR_MEDIAN: usize = 5;

/// Source of the network adjusted time.
pub trait MedianTimeSource: Send + Sync {
    /// The local time corrected by the median peer offset, in seconds since the unix epoch
    fn adjusted_time(&self) -> u64;

    /// Adds a clock sample from a peer. Each source is only counted once.
    fn add_time_sample(&self, source_id: &str, time: DateTime<Utc>);

    /// The offset in seconds currently applied to the local clock
    fn offset(&self) -> i64;
}

#[derive(Debug, Default)]
struct MedianTimeInner {
    known_ids: HashSet<String>,
    offsets: VecDeque<i64>,
    offset_secs: i64,
    invalid_time_checked: bool,
}

/// A [MedianTimeSource] that updates its offset from the median of the peer samples. The median is only recomputed
/// when there are at least five samples and an odd number of them.
#[derive(Debug, Default)]
pub struct MedianTime {
    inner: Mutex<MedianTimeInner>,
}

impl MedianTime {
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a sample as an offset in seconds from the local clock
    pub fn add_offset_sample(&self, source_id: &str, offset_secs: i64) {
        let mut inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(_) => {
                warn!(target: LOG_TARGET, "Median time lock poisoned, ignoring sample from {}", source_id);
                return;
            },
        };
        if !inner.known_ids.insert(source_id.to_string()) {
            return;
        }

        if inner.offsets.len() == MAX_MEDIAN_TIME_ENTRIES {
            inner.offsets.pop_front();
        }
        inner.offsets.push_back(offset_secs);
        let num_offsets = inner.offsets.len();

        let mut sorted_offsets: Vec<i64> = inner.offsets.iter().copied().collect();
        sorted_offsets.sort_unstable();
        debug!(
            target: LOG_TARGET,
            "Added time sample of {}s from {} (total: {})", offset_secs, source_id, num_offsets
        );

        if num_offsets < MIN_SAMPLES_FOR_MEDIAN || num_offsets % 2 == 0 {
            return;
        }

        let median = sorted_offsets[num_offsets / 2];
        if median.abs() < MAX_ALLOWED_OFFSET_SECS {
            inner.offset_secs = median;
        } else {
            inner.offset_secs = 0;
            if !inner.invalid_time_checked {
                inner.invalid_time_checked = true;
                let remote_has_close_time = sorted_offsets.iter().any(|offset| offset.abs() < SIMILAR_TIME_SECS);
                if !remote_has_close_time {
                    warn!(
                        target: LOG_TARGET,
                        "Please check your date and time are correct! The node will not work properly with an invalid \
                         time"
                    );
                }
            }
        }
        debug!(
            target: LOG_TARGET,
            "New time offset: {}s (median of {:?})", inner.offset_secs, sorted_offsets
        );
    }
}

impl MedianTimeSource for MedianTime {
    fn adjusted_time(&self) -> u64 {
        let now = Utc::now().timestamp();
        u64::try_from(now.saturating_add(self.offset())).unwrap_or(0)
    }

    fn add_time_sample(&self, source_id: &str, time: DateTime<Utc>) {
        let offset_secs = time.timestamp() - Utc::now().timestamp();
        self.add_offset_sample(source_id, offset_secs);
    }

    fn offset(&self) -> i64 {
        self.inner.lock().map(|inner| inner.offset_secs).unwrap_or(0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn add_all(time: &MedianTime, offsets: &[i64]) {
        for (i, offset) in offsets.iter().enumerate() {
            time.add_offset_sample(&format!("peer{}", i), *offset);
        }
    }

    #[test]
    fn it_needs_five_samples() {
        let time = MedianTime::new();
        add_all(&time, &[10, 20, 30, 40]);
        assert_eq!(time.offset(), 0);
        time.add_offset_sample("peer4", 50);
        assert_eq!(time.offset(), 30);
    }

    #[test]
    fn it_only_updates_on_an_odd_count() {
        let time = MedianTime::new();
        add_all(&time, &[-10, -10, -10, -10, -10]);
        assert_eq!(time.offset(), -10);
        time.add_offset_sample("later", 100);
        assert_eq!(time.offset(), -10);
    }

    #[test]
    fn duplicate_sources_are_ignored() {
        let time = MedianTime::new();
        for _ in 0..10 {
            time.add_offset_sample("same", 100);
        }
        assert_eq!(time.offset(), 0);
    }

    #[test]
    fn large_medians_are_ignored() {
        let time = MedianTime::new();
        add_all(&time, &[5000, 5000, 5000, 20, 5000]);
        assert_eq!(time.offset(), 0);
        let time = MedianTime::new();
        add_all(&time, &[4199, 4199, 4199, 4199, 4199]);
        assert_eq!(time.offset(), 4199);
    }

    #[test]
    fn old_samples_are_replaced() {
        let time = MedianTime::new();
        add_all(&time, &vec![1; MAX_MEDIAN_TIME_ENTRIES]);
        assert_eq!(time.inner.lock().unwrap().offsets.len(), MAX_MEDIAN_TIME_ENTRIES);
        time.add_offset_sample("extra", 3);
        let inner = time.inner.lock().unwrap();
        assert_eq!(inner.offsets.len(), MAX_MEDIAN_TIME_ENTRIES);
        assert_eq!(inner.offsets.back(), Some(&3));
    }
}
