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

//! Proof of work targets.
//!
//! Targets are 256-bit integers. A block hash, read as a little-endian integer, must not exceed the target of its
//! block. Headers carry the target in the 32-bit compact form: the top byte is the length of the target in bytes and
//! the lower three bytes are its most significant bytes, with bit 23 as a sign bit that must be clear.

use primitive_types::{U256, U512};

use crate::{consensus::ConsensusConstants, proof_of_work::PowError, types::BlockHash};

const COMPACT_SIGN_BIT: u32 = 0x0080_0000;
const COMPACT_MANTISSA_MASK: u32 = 0x007f_ffff;

/// Expands compact bits into a target. Returns `None` for negative targets and targets that do not fit in 256 bits.
pub fn compact_to_target(bits: u32) -> Option<U256> {
    let size = bits >> 24;
    let mantissa = bits & COMPACT_MANTISSA_MASK;
    if mantissa != 0 && bits & COMPACT_SIGN_BIT != 0 {
        return None;
    }
    if size <= 3 {
        return Some(U256::from(mantissa >> (8 * (3 - size))));
    }
    let shift = 8 * (size - 3) as usize;
    let mantissa_bits = (32 - mantissa.leading_zeros()) as usize;
    if mantissa != 0 && mantissa_bits + shift > 256 {
        return None;
    }
    if mantissa == 0 {
        return Some(U256::zero());
    }
    Some(U256::from(mantissa) << shift)
}

pub fn target_to_compact(target: U256) -> u32 {
    let mut size = ((target.bits() + 7) / 8) as u32;
    let mut compact = if size <= 3 {
        (target.low_u64() << (8 * (3 - size))) as u32
    } else {
        (target >> (8 * (size - 3) as usize)).low_u64() as u32
    };
    // The mantissa would read as negative, so move it down a byte
    if compact & COMPACT_SIGN_BIT != 0 {
        compact >>= 8;
        size += 1;
    }
    compact | (size << 24)
}

/// The expected number of hashes needed to find a block with the given target: 2^256 / (target + 1). Invalid targets
/// contribute no work.
pub fn calc_work(bits: u32) -> U256 {
    let target = match compact_to_target(bits) {
        Some(t) if !t.is_zero() => t,
        _ => return U256::zero(),
    };
    match target.checked_add(U256::one()) {
        Some(denominator) => (!target / denominator) + U256::one(),
        None => U256::one(),
    }
}

/// Checks the target encoded in `bits` is within the network limit and that the block hash satisfies it.
pub fn check_proof_of_work(hash: &BlockHash, bits: u32, pow_limit: U256) -> Result<(), PowError> {
    let target = compact_to_target(bits)
        .filter(|t| !t.is_zero())
        .ok_or(PowError::InvalidTarget(bits))?;
    if target > pow_limit {
        return Err(PowError::TargetAboveLimit {
            target,
            limit: pow_limit,
        });
    }
    if hash.to_u256() > target {
        return Err(PowError::HighHash { hash: *hash, target });
    }
    Ok(())
}

fn clamp_to_limit(target: U512, pow_limit: U256) -> U256 {
    if target > U512::from(pow_limit) {
        pow_limit
    } else {
        U256::try_from(target).unwrap_or(pow_limit)
    }
}

/// Computes the bits of a retarget block from the bits of the previous block and the time taken by the last retarget
/// interval. The timespan is clamped so the target changes by at most the adjustment factor.
pub fn calc_retarget(prev_bits: u32, actual_timespan: u64, constants: &ConsensusConstants) -> u32 {
    let target_timespan = constants.target_timespan().max(1);
    let factor = constants.retarget_adjustment_factor().max(1);
    let adjusted_timespan = actual_timespan.clamp(target_timespan / factor, target_timespan.saturating_mul(factor));
    let old_target = compact_to_target(prev_bits).unwrap_or_else(|| constants.pow_limit());
    let new_target = old_target.full_mul(U256::from(adjusted_timespan)) / U512::from(target_timespan);
    target_to_compact(clamp_to_limit(new_target, constants.pow_limit()))
}

/// The easiest target a block could have reached from `bits` after `duration` seconds, assuming every retarget in that
/// time lowered the difficulty by the maximum amount.
pub fn calc_easiest_difficulty(bits: u32, duration: u64, constants: &ConsensusConstants) -> u32 {
    if constants.no_retargeting() {
        return bits;
    }
    let factor = U256::from(constants.retarget_adjustment_factor().max(1));
    let max_retarget_timespan = constants
        .target_timespan()
        .saturating_mul(constants.retarget_adjustment_factor())
        .max(1);
    let pow_limit = constants.pow_limit();
    let mut new_target = compact_to_target(bits).unwrap_or(pow_limit);
    let mut remaining = duration;
    while remaining > 0 && new_target < pow_limit {
        new_target = clamp_to_limit(new_target.full_mul(factor), pow_limit);
        remaining = remaining.saturating_sub(max_retarget_timespan);
    }
    target_to_compact(new_target.min(pow_limit))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::consensus::{ConsensusConstantsBuilder, Network};

    #[test]
    fn compact_round_trip() {
        let target = compact_to_target(0x1d00_ffff).unwrap();
        assert_eq!(target, U256::from(0xffffu64) << 208);
        assert_eq!(target_to_compact(target), 0x1d00_ffff);
        assert_eq!(compact_to_target(0x0312_3456), Some(U256::from(0x12_3456u64)));
        assert_eq!(compact_to_target(0x0112_3456), Some(U256::from(0x12u64)));
        assert_eq!(target_to_compact(U256::from(0x80u64)), 0x0200_8000);
    }

    #[test]
    fn invalid_compact_values() {
        assert_eq!(compact_to_target(0x0492_3456), None);
        assert_eq!(compact_to_target(0xff12_3456), None);
        assert_eq!(compact_to_target(0x2200_0000), Some(U256::zero()));
        assert!(calc_work(0x0492_3456).is_zero());
    }

    #[test]
    fn work_is_inverse_to_target() {
        assert_eq!(calc_work(0x207f_ffff), U256::from(2u64));
        assert_eq!(calc_work(0x1d00_ffff), U256::from(0x1_0001_0001u64));
        assert!(calc_work(0x1c00_ffff) > calc_work(0x1d00_ffff));
    }

    #[test]
    fn it_checks_the_hash_against_the_target() {
        let limit = U256::MAX >> 1;
        assert!(check_proof_of_work(&BlockHash::zero(), 0x207f_ffff, limit).is_ok());
        let mut high = [0u8; 32];
        high[31] = 0xff;
        assert!(matches!(
            check_proof_of_work(&BlockHash::from(high), 0x207f_ffff, limit),
            Err(PowError::HighHash { .. })
        ));
        assert!(matches!(
            check_proof_of_work(&BlockHash::zero(), 0x2100_ffff, limit),
            Err(PowError::TargetAboveLimit { .. })
        ));
        assert!(matches!(
            check_proof_of_work(&BlockHash::zero(), 0, limit),
            Err(PowError::InvalidTarget(0))
        ));
    }

    #[test]
    fn retarget_is_clamped() {
        let constants = ConsensusConstantsBuilder::new(Network::MainNet).build();
        let bits = 0x1c00_ffff;
        assert_eq!(calc_retarget(bits, constants.target_timespan(), &constants), bits);
        let faster = calc_retarget(bits, 1, &constants);
        assert_eq!(
            compact_to_target(faster).unwrap(),
            compact_to_target(bits).unwrap() / U256::from(4u64)
        );
        let slower = calc_retarget(bits, u64::MAX, &constants);
        assert_eq!(
            compact_to_target(slower).unwrap(),
            compact_to_target(bits).unwrap() * U256::from(4u64)
        );
        assert_eq!(calc_retarget(0x1d00_ffff, u64::MAX, &constants), 0x1d00_ffff);
    }

    #[test]
    fn easiest_difficulty_relaxes_over_time() {
        let constants = ConsensusConstantsBuilder::new(Network::MainNet).build();
        let bits = 0x1b00_ffff;
        assert_eq!(calc_easiest_difficulty(bits, 0, &constants), bits);
        let relaxed = calc_easiest_difficulty(bits, 1, &constants);
        assert_eq!(compact_to_target(relaxed).unwrap(), compact_to_target(bits).unwrap() * U256::from(4u64));
        assert_eq!(calc_easiest_difficulty(bits, u64::MAX, &constants), 0x1d00_ffff);
    }
}
