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

use serde::{Deserialize, Serialize};

pub trait Emission {
    fn block_reward(&self, height: u64) -> u64;
    fn supply_at_block(&self, height: u64) -> u64;
}

/// A stage of the emission curve. Every block pays `block_reward` until the total supply reaches `supply_cap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmissionTier {
    pub supply_cap: u64,
    pub block_reward: u64,
}

impl EmissionTier {
    pub const fn new(supply_cap: u64, block_reward: u64) -> Self {
        Self {
            supply_cap,
            block_reward,
        }
    }
}

/// The emission schedule pays a fixed reward per block in each tier of total supply. The block that crosses a tier's
/// cap is paid only the amount remaining in the tier, so the cap is hit exactly. Once every tier is exhausted, each
/// block pays the tail reward forever.
///
/// The genesis block is block 0 and is paid the reward of the first tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmissionSchedule {
    tiers: Vec<EmissionTier>,
    tail_reward: u64,
}

impl EmissionSchedule {
    /// Create a new emission schedule. Tiers must be ordered by increasing supply cap, tiers that do not raise the cap
    /// or pay nothing are ignored.
    pub fn new(tiers: Vec<EmissionTier>, tail_reward: u64) -> Self {
        let mut last_cap = 0;
        let tiers = tiers
            .into_iter()
            .filter(|tier| {
                let keep = tier.block_reward > 0 && tier.supply_cap > last_cap;
                if keep {
                    last_cap = tier.supply_cap;
                }
                keep
            })
            .collect();
        Self { tiers, tail_reward }
    }

    pub fn tiers(&self) -> &[EmissionTier] {
        &self.tiers
    }

    pub fn tail_reward(&self) -> u64 {
        self.tail_reward
    }

    /// The total supply after `num_blocks` blocks have been mined
    fn supply_after(&self, num_blocks: u64) -> u64 {
        let mut supply = 0u64;
        let mut remaining = num_blocks;
        for tier in &self.tiers {
            if remaining == 0 {
                return supply;
            }
            let tier_amount = tier.supply_cap - supply;
            let blocks_in_tier =
                tier_amount / tier.block_reward + u64::from(tier_amount % tier.block_reward != 0);
            if remaining <= blocks_in_tier {
                return remaining
                    .saturating_mul(tier.block_reward)
                    .saturating_add(supply)
                    .min(tier.supply_cap);
            }
            supply = tier.supply_cap;
            remaining -= blocks_in_tier;
        }
        supply.saturating_add(remaining.saturating_mul(self.tail_reward))
    }
}

impl Emission for EmissionSchedule {
    fn block_reward(&self, height: u64) -> u64 {
        let supply_before = self.supply_after(height);
        self.tiers
            .iter()
            .find(|tier| tier.supply_cap > supply_before)
            .map(|tier| tier.block_reward.min(tier.supply_cap - supply_before))
            .unwrap_or(self.tail_reward)
    }

    /// Total supply once the block at `height` has been mined, the genesis block included
    fn supply_at_block(&self, height: u64) -> u64 {
        self.supply_after(height.saturating_add(1))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn schedule() -> EmissionSchedule {
        EmissionSchedule::new(vec![EmissionTier::new(1000, 100), EmissionTier::new(1250, 30)], 5)
    }

    #[test]
    fn it_pays_the_tier_reward() {
        let schedule = schedule();
        assert_eq!(schedule.block_reward(0), 100);
        assert_eq!(schedule.block_reward(9), 100);
        assert_eq!(schedule.supply_at_block(9), 1000);
        assert_eq!(schedule.block_reward(10), 30);
    }

    #[test]
    fn the_last_block_of_a_tier_is_capped() {
        let schedule = schedule();
        // 250 / 30 leaves 10 for the ninth block of the second tier
        assert_eq!(schedule.supply_at_block(17), 1240);
        assert_eq!(schedule.block_reward(18), 10);
        assert_eq!(schedule.supply_at_block(18), 1250);
        assert_eq!(schedule.block_reward(19), 5);
        assert_eq!(schedule.supply_at_block(20), 1260);
    }

    #[test]
    fn supply_is_the_sum_of_rewards() {
        let schedule = schedule();
        let mut supply = 0;
        for height in 0..40 {
            supply += schedule.block_reward(height);
            assert_eq!(schedule.supply_at_block(height), supply, "height {}", height);
        }
    }

    #[test]
    fn it_ignores_useless_tiers() {
        let schedule = EmissionSchedule::new(
            vec![
                EmissionTier::new(100, 10),
                EmissionTier::new(50, 10),
                EmissionTier::new(200, 0),
            ],
            1,
        );
        assert_eq!(schedule.tiers().len(), 1);
        assert_eq!(schedule.block_reward(u64::MAX - 1), 1);
        assert_eq!(schedule.supply_at_block(u64::MAX), u64::MAX);
    }
}
