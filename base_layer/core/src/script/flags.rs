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

use bitflags::bitflags;

bitflags! {
    /// Rules enforced by the script interpreter in addition to the base evaluation rules.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ScriptFlags: u32 {
        /// Evaluate pay-to-script-hash redeem scripts
        const BIP16 = 1 << 0;
        /// Require strict DER signature encoding
        const VERIFY_DER_SIGNATURES = 1 << 1;
        const VERIFY_STRICT_ENCODING = 1 << 2;
        const VERIFY_LOW_S = 1 << 3;
        const VERIFY_MINIMAL_DATA = 1 << 4;
        const VERIFY_SIG_PUSH_ONLY = 1 << 5;
        const VERIFY_CLEAN_STACK = 1 << 6;
        const VERIFY_STRICT_MULTISIG = 1 << 7;
        const DISCOURAGE_UPGRADABLE_NOPS = 1 << 8;
        /// Enforce OP_CHECKLOCKTIMEVERIFY
        const VERIFY_CHECK_LOCK_TIME = 1 << 9;
        /// Enforce OP_CHECKSEQUENCEVERIFY
        const VERIFY_CHECK_SEQUENCE = 1 << 10;
        const VERIFY_WITNESS = 1 << 11;
        const VERIFY_NULL_FAIL = 1 << 12;
    }
}

/// Flags every block must satisfy regardless of the majority version
pub const MANDATORY_VERIFY_FLAGS: ScriptFlags = ScriptFlags::BIP16;

/// Flags applied to transactions entering the mempool. Transactions failing these are not relayed even though a block
/// containing them could be valid.
pub const STANDARD_VERIFY_FLAGS: ScriptFlags = MANDATORY_VERIFY_FLAGS
    .union(ScriptFlags::VERIFY_DER_SIGNATURES)
    .union(ScriptFlags::VERIFY_STRICT_ENCODING)
    .union(ScriptFlags::VERIFY_LOW_S)
    .union(ScriptFlags::VERIFY_MINIMAL_DATA)
    .union(ScriptFlags::VERIFY_STRICT_MULTISIG)
    .union(ScriptFlags::DISCOURAGE_UPGRADABLE_NOPS)
    .union(ScriptFlags::VERIFY_CLEAN_STACK)
    .union(ScriptFlags::VERIFY_CHECK_LOCK_TIME)
    .union(ScriptFlags::VERIFY_CHECK_SEQUENCE)
    .union(ScriptFlags::VERIFY_WITNESS)
    .union(ScriptFlags::VERIFY_NULL_FAIL);

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn standard_flags_include_the_mandatory_flags() {
        assert!(STANDARD_VERIFY_FLAGS.contains(MANDATORY_VERIFY_FLAGS));
        assert!(!MANDATORY_VERIFY_FLAGS.contains(ScriptFlags::VERIFY_CHECK_SEQUENCE));
    }
}
