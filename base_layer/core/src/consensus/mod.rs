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

mod chain_strength_comparer;
pub use chain_strength_comparer::{
    strongest_chain,
    ChainStrengthComparer,
    ChainStrengthComparerBuilder,
    ThenComparer,
};

mod checkpoints;
pub use checkpoints::Checkpoint;

mod consensus_constants;
pub use consensus_constants::{
    ConsensusConstants,
    ConsensusConstantsBuilder,
    CHECK_LOCK_TIME_VERSION,
    CHECK_SEQUENCE_VERSION,
    COIN,
    DER_SIGNATURES_VERSION,
    SERIALIZED_HEIGHT_VERSION,
};

mod consensus_manager;
pub use consensus_manager::{ConsensusManager, ConsensusManagerBuilder};

mod consensus_encoding;
pub use consensus_encoding::{
    compact_size_len,
    double_sha256,
    write_compact_size,
    ConsensusEncoding,
    ConsensusEncodingSized,
    ConsensusHasher,
};

pub mod emission;
pub use emission::{Emission, EmissionSchedule, EmissionTier};

mod network;
pub use network::Network;
