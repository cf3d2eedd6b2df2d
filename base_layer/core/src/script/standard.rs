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

//! Script parsing, standard template classification and signature operation counting.
//!
//! Script execution itself belongs to the interpreter behind [ScriptEngine](crate::script::ScriptEngine). The
//! functions here only look at the shape of scripts, which is all the consensus sigop limits and the relay policy need.

use std::fmt;

use crate::{
    chain_storage::TxStore,
    script::{opcodes::*, ScriptError},
    transactions::Transaction,
    types::FixedHash,
};

/// Maximum size of the data pushed by a standard null data output
pub const MAX_DATA_CARRIER_SIZE: usize = 80;

/// Prefix of the coinbase output committing to the witness merkle root: OP_RETURN, a 36 byte push and the commitment
/// magic.
pub const WITNESS_COMMITMENT_HEADER: [u8; 6] = [OP_RETURN, OP_DATA_36, 0xaa, 0x21, 0xa9, 0xed];
const WITNESS_COMMITMENT_SCRIPT_LEN: usize = WITNESS_COMMITMENT_HEADER.len() + 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedOpcode<'a> {
    pub opcode: u8,
    pub data: &'a [u8],
}

impl ParsedOpcode<'_> {
    pub fn is_push(&self) -> bool {
        self.opcode <= OP_16 && self.opcode != OP_RESERVED
    }
}

/// Iterates over the opcodes of a script. Iteration stops after the first malformed push.
pub struct Instructions<'a> {
    script: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> Instructions<'a> {
    pub fn new(script: &'a [u8]) -> Self {
        Self {
            script,
            pos: 0,
            done: false,
        }
    }

    fn read_len(&mut self, width: usize) -> Result<usize, ScriptError> {
        let start = self.pos + 1;
        let bytes = self
            .script
            .get(start..start + width)
            .ok_or_else(|| ScriptError::Malformed(format!("missing push length at offset {}", self.pos)))?;
        let mut buf = [0u8; 4];
        buf[..width].copy_from_slice(bytes);
        Ok(u32::from_le_bytes(buf) as usize)
    }
}

impl<'a> Iterator for Instructions<'a> {
    type Item = Result<ParsedOpcode<'a>, ScriptError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.pos >= self.script.len() {
            return None;
        }
        let opcode = self.script[self.pos];
        let (len_width, data_len) = match opcode {
            OP_DATA_1..=OP_DATA_75 => (0, opcode as usize),
            OP_PUSHDATA1 | OP_PUSHDATA2 | OP_PUSHDATA4 => {
                let width = match opcode {
                    OP_PUSHDATA1 => 1,
                    OP_PUSHDATA2 => 2,
                    _ => 4,
                };
                match self.read_len(width) {
                    Ok(len) => (width, len),
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    },
                }
            },
            _ => (0, 0),
        };
        let data_start = self.pos + 1 + len_width;
        let data_end = match data_start.checked_add(data_len) {
            Some(end) if end <= self.script.len() => end,
            _ => {
                self.done = true;
                return Some(Err(ScriptError::Malformed(format!(
                    "push of {} bytes at offset {} exceeds the script length {}",
                    data_len,
                    self.pos,
                    self.script.len()
                ))));
            },
        };
        let data = &self.script[data_start..data_end];
        self.pos = data_end;
        Some(Ok(ParsedOpcode { opcode, data }))
    }
}

pub fn parse_script(script: &[u8]) -> Result<Vec<ParsedOpcode<'_>>, ScriptError> {
    Instructions::new(script).collect()
}

/// True if the script only pushes data. Malformed scripts are never push only.
pub fn is_push_only(script: &[u8]) -> bool {
    Instructions::new(script).all(|op| op.map(|op| op.is_push()).unwrap_or(false))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptClass {
    NonStandard,
    PubKey,
    PubKeyHash,
    ScriptHash,
    MultiSig,
    NullData,
    WitnessV0KeyHash,
    WitnessV0ScriptHash,
}

impl fmt::Display for ScriptClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScriptClass::NonStandard => "nonstandard",
            ScriptClass::PubKey => "pubkey",
            ScriptClass::PubKeyHash => "pubkeyhash",
            ScriptClass::ScriptHash => "scripthash",
            ScriptClass::MultiSig => "multisig",
            ScriptClass::NullData => "nulldata",
            ScriptClass::WitnessV0KeyHash => "witness_v0_keyhash",
            ScriptClass::WitnessV0ScriptHash => "witness_v0_scripthash",
        };
        f.write_str(s)
    }
}

pub fn is_pay_to_pubkey_hash(script: &[u8]) -> bool {
    script.len() == 25 &&
        script[0] == OP_DUP &&
        script[1] == OP_HASH160 &&
        script[2] == OP_DATA_20 &&
        script[23] == OP_EQUALVERIFY &&
        script[24] == OP_CHECKSIG
}

pub fn is_pay_to_script_hash(script: &[u8]) -> bool {
    script.len() == 23 && script[0] == OP_HASH160 && script[1] == OP_DATA_20 && script[22] == OP_EQUAL
}

pub fn is_witness_v0_key_hash(script: &[u8]) -> bool {
    script.len() == 22 && script[0] == OP_0 && script[1] == OP_DATA_20
}

pub fn is_witness_v0_script_hash(script: &[u8]) -> bool {
    script.len() == 34 && script[0] == OP_0 && script[1] == OP_DATA_32
}

/// Outputs starting with OP_RETURN can never be spent
pub fn is_unspendable(script: &[u8]) -> bool {
    script.first() == Some(&OP_RETURN)
}

fn is_pubkey_push(op: &ParsedOpcode<'_>) -> bool {
    op.is_push() && (op.data.len() == 33 || op.data.len() == 65)
}

pub fn classify(script: &[u8]) -> ScriptClass {
    if is_pay_to_pubkey_hash(script) {
        return ScriptClass::PubKeyHash;
    }
    if is_pay_to_script_hash(script) {
        return ScriptClass::ScriptHash;
    }
    if is_witness_v0_key_hash(script) {
        return ScriptClass::WitnessV0KeyHash;
    }
    if is_witness_v0_script_hash(script) {
        return ScriptClass::WitnessV0ScriptHash;
    }
    let pops = match parse_script(script) {
        Ok(pops) => pops,
        Err(_) => return ScriptClass::NonStandard,
    };
    match pops.as_slice() {
        [key, checksig] if is_pubkey_push(key) && checksig.opcode == OP_CHECKSIG => ScriptClass::PubKey,
        [ret] if ret.opcode == OP_RETURN => ScriptClass::NullData,
        [ret, data] if ret.opcode == OP_RETURN && data.is_push() && data.data.len() <= MAX_DATA_CARRIER_SIZE => {
            ScriptClass::NullData
        },
        _ if is_multisig(&pops) => ScriptClass::MultiSig,
        _ => ScriptClass::NonStandard,
    }
}

fn is_multisig(pops: &[ParsedOpcode<'_>]) -> bool {
    if pops.len() < 4 {
        return false;
    }
    let last = pops.len() - 1;
    if pops[last].opcode != OP_CHECKMULTISIG {
        return false;
    }
    let (required, keys) = match (as_small_int(pops[0].opcode), as_small_int(pops[last - 1].opcode)) {
        (Some(m), Some(n)) => (m, n),
        _ => return false,
    };
    let pubkeys = &pops[1..last - 1];
    required >= 1 && required <= keys && keys == pubkeys.len() && pubkeys.iter().all(is_pubkey_push)
}

/// The data a standard output pays to, used to index transactions by recipient: the key hash, script hash, witness
/// program or raw public key.
pub fn extract_payload(script: &[u8]) -> Option<Vec<u8>> {
    match classify(script) {
        ScriptClass::PubKeyHash => Some(script[3..23].to_vec()),
        ScriptClass::ScriptHash => Some(script[2..22].to_vec()),
        ScriptClass::WitnessV0KeyHash | ScriptClass::WitnessV0ScriptHash => Some(script[2..].to_vec()),
        ScriptClass::PubKey => parse_script(script).ok().map(|pops| pops[0].data.to_vec()),
        _ => None,
    }
}

fn count_parsed_sig_ops(pops: &[ParsedOpcode<'_>], accurate: bool) -> usize {
    let mut sig_ops = 0usize;
    for (i, op) in pops.iter().enumerate() {
        match op.opcode {
            OP_CHECKSIG | OP_CHECKSIGVERIFY => sig_ops += 1,
            OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => {
                let keys = if accurate && i > 0 {
                    pops[i - 1]
                        .opcode
                        .ne(&OP_0)
                        .then(|| as_small_int(pops[i - 1].opcode))
                        .flatten()
                } else {
                    None
                };
                sig_ops += keys.unwrap_or(MAX_PUB_KEYS_PER_MULTISIG);
            },
            _ => {},
        }
    }
    sig_ops
}

/// Counts signature operations in a script. Opcodes after a parse failure are not counted.
pub fn count_sig_ops(script: &[u8], accurate: bool) -> usize {
    let pops: Vec<_> = Instructions::new(script).map_while(Result::ok).collect();
    count_parsed_sig_ops(&pops, accurate)
}

/// Legacy signature operations of a transaction: every input script and output script, multisig counted at the maximum.
pub fn legacy_sig_op_count(tx: &Transaction) -> usize {
    let inputs = tx
        .inputs
        .iter()
        .map(|input| count_sig_ops(&input.signature_script, false));
    let outputs = tx.outputs.iter().map(|output| count_sig_ops(&output.pk_script, false));
    inputs.chain(outputs).sum()
}

/// Signature operations in the redeem script of a pay-to-script-hash spend. The redeem script is the final push of the
/// signature script, and signature scripts that are not push only count as zero.
pub fn p2sh_sig_op_count(signature_script: &[u8]) -> usize {
    let pops = match parse_script(signature_script) {
        Ok(pops) => pops,
        Err(_) => return 0,
    };
    if pops.is_empty() || !pops.iter().all(ParsedOpcode::is_push) {
        return 0;
    }
    let redeem_script = pops[pops.len() - 1].data;
    count_sig_ops(redeem_script, true)
}

/// Counts the signature operations of all pay-to-script-hash inputs of a transaction. The referenced outputs must be
/// present in the transaction store.
pub fn count_p2sh_sig_ops(tx: &Transaction, is_coinbase: bool, store: &TxStore) -> Result<usize, TxStoreLookupError> {
    if is_coinbase {
        return Ok(0);
    }
    let mut total = 0usize;
    for input in &tx.inputs {
        let outpoint = &input.previous_output;
        let origin = store
            .get(&outpoint.hash)
            .and_then(|data| data.tx.as_ref())
            .ok_or(TxStoreLookupError::MissingTx(outpoint.hash))?;
        let output = origin
            .outputs
            .get(outpoint.index as usize)
            .ok_or(TxStoreLookupError::MissingTx(outpoint.hash))?;
        if !is_pay_to_script_hash(&output.pk_script) {
            continue;
        }
        total = total
            .checked_add(p2sh_sig_op_count(&input.signature_script))
            .ok_or(TxStoreLookupError::Overflow)?;
    }
    Ok(total)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStoreLookupError {
    MissingTx(FixedHash),
    Overflow,
}

/// Encodes an integer as a minimal little-endian script number with a sign bit.
pub fn script_num_bytes(value: i64) -> Vec<u8> {
    if value == 0 {
        return Vec::new();
    }
    let negative = value < 0;
    let mut abs = value.unsigned_abs();
    let mut result = Vec::with_capacity(9);
    while abs > 0 {
        result.push((abs & 0xff) as u8);
        abs >>= 8;
    }
    // The sign lives in the top bit of the last byte, so add a byte if that bit is taken
    let last = result.len() - 1;
    if result[last] & 0x80 != 0 {
        result.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        result[last] |= 0x80;
    }
    result
}

/// Builds scripts using minimal push encodings
#[derive(Debug, Clone, Default)]
pub struct ScriptBuilder {
    script: Vec<u8>,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add_op(mut self, opcode: u8) -> Self {
        self.script.push(opcode);
        self
    }

    pub fn add_data(mut self, data: &[u8]) -> Self {
        let len = data.len();
        match len {
            0 => self.script.push(OP_0),
            1 if data[0] >= 1 && data[0] <= 16 => self.script.push(OP_1 - 1 + data[0]),
            1..=75 => self.script.push(len as u8),
            76..=0xff => {
                self.script.push(OP_PUSHDATA1);
                self.script.push(len as u8);
            },
            0x100..=0xffff => {
                self.script.push(OP_PUSHDATA2);
                self.script.extend_from_slice(&(len as u16).to_le_bytes());
            },
            _ => {
                self.script.push(OP_PUSHDATA4);
                self.script.extend_from_slice(&(len as u32).to_le_bytes());
            },
        }
        if !(len == 1 && data[0] >= 1 && data[0] <= 16) {
            self.script.extend_from_slice(data);
        }
        self
    }

    pub fn add_int64(mut self, value: i64) -> Self {
        match value {
            0 => self.script.push(OP_0),
            -1 => self.script.push(OP_1NEGATE),
            1..=16 => self.script.push(OP_1 - 1 + value as u8),
            _ => return self.add_data(&script_num_bytes(value)),
        }
        self
    }

    pub fn into_script(self) -> Vec<u8> {
        self.script
    }
}

pub fn pay_to_pubkey_hash_script(pubkey_hash: &[u8; 20]) -> Vec<u8> {
    ScriptBuilder::new()
        .add_op(OP_DUP)
        .add_op(OP_HASH160)
        .add_data(pubkey_hash)
        .add_op(OP_EQUALVERIFY)
        .add_op(OP_CHECKSIG)
        .into_script()
}

pub fn pay_to_script_hash_script(script_hash: &[u8; 20]) -> Vec<u8> {
    ScriptBuilder::new()
        .add_op(OP_HASH160)
        .add_data(script_hash)
        .add_op(OP_EQUAL)
        .into_script()
}

pub fn null_data_script(data: &[u8]) -> Vec<u8> {
    ScriptBuilder::new().add_op(OP_RETURN).add_data(data).into_script()
}

/// The script prefix a coinbase must start with to commit to its block height
pub fn serialized_height_script(height: u64) -> Vec<u8> {
    ScriptBuilder::new()
        .add_int64(i64::try_from(height).unwrap_or(i64::MAX))
        .into_script()
}

/// Extracts the block height committed to by the start of a coinbase signature script
pub fn extract_coinbase_height(signature_script: &[u8]) -> Option<u64> {
    let opcode = *signature_script.first()?;
    if let Some(n) = as_small_int(opcode) {
        return Some(n as u64);
    }
    let len = opcode as usize;
    if !(1..=8).contains(&len) {
        return None;
    }
    let bytes = signature_script.get(1..=len)?;
    let mut buf = [0u8; 8];
    buf[..len].copy_from_slice(bytes);
    Some(u64::from_le_bytes(buf))
}

pub fn witness_commitment_script(commitment: &FixedHash) -> Vec<u8> {
    let mut script = Vec::with_capacity(WITNESS_COMMITMENT_SCRIPT_LEN);
    script.extend_from_slice(&WITNESS_COMMITMENT_HEADER);
    script.extend_from_slice(commitment.as_slice());
    script
}

/// Finds the witness commitment in a coinbase. The last matching output wins.
pub fn extract_witness_commitment(coinbase: &Transaction) -> Option<FixedHash> {
    coinbase.outputs.iter().rev().find_map(|output| {
        let script = &output.pk_script;
        if script.len() >= WITNESS_COMMITMENT_SCRIPT_LEN && script.starts_with(&WITNESS_COMMITMENT_HEADER) {
            FixedHash::try_from(&script[WITNESS_COMMITMENT_HEADER.len()..WITNESS_COMMITMENT_SCRIPT_LEN]).ok()
        } else {
            None
        }
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn it_classifies_standard_scripts() {
        assert_eq!(classify(&pay_to_pubkey_hash_script(&[1; 20])), ScriptClass::PubKeyHash);
        assert_eq!(classify(&pay_to_script_hash_script(&[1; 20])), ScriptClass::ScriptHash);
        assert_eq!(classify(&null_data_script(b"hello")), ScriptClass::NullData);
        assert_eq!(classify(&null_data_script(&[0u8; 81])), ScriptClass::NonStandard);
        let p2pk = ScriptBuilder::new().add_data(&[2; 33]).add_op(OP_CHECKSIG).into_script();
        assert_eq!(classify(&p2pk), ScriptClass::PubKey);
        let multisig = ScriptBuilder::new()
            .add_int64(1)
            .add_data(&[2; 33])
            .add_data(&[3; 33])
            .add_int64(2)
            .add_op(OP_CHECKMULTISIG)
            .into_script();
        assert_eq!(classify(&multisig), ScriptClass::MultiSig);
        assert_eq!(classify(&[OP_TRUE]), ScriptClass::NonStandard);
        assert_eq!(classify(&[OP_0, OP_DATA_20]), ScriptClass::NonStandard);
    }

    #[test]
    fn it_detects_malformed_pushes() {
        assert!(parse_script(&[OP_DATA_20, 1, 2]).is_err());
        assert!(parse_script(&[OP_PUSHDATA2, 1]).is_err());
        assert!(!is_push_only(&[OP_DATA_20, 1, 2]));
        assert!(is_push_only(&ScriptBuilder::new().add_data(&[9; 72]).add_data(&[2; 33]).into_script()));
        assert!(!is_push_only(&[OP_DUP]));
    }

    #[test]
    fn it_counts_sig_ops() {
        let multisig = ScriptBuilder::new()
            .add_int64(1)
            .add_data(&[2; 33])
            .add_data(&[3; 33])
            .add_int64(2)
            .add_op(OP_CHECKMULTISIG)
            .into_script();
        assert_eq!(count_sig_ops(&multisig, false), MAX_PUB_KEYS_PER_MULTISIG);
        assert_eq!(count_sig_ops(&multisig, true), 2);
        assert_eq!(count_sig_ops(&pay_to_pubkey_hash_script(&[0; 20]), true), 1);
        // Counting stops at the malformed push
        assert_eq!(count_sig_ops(&[OP_CHECKSIG, OP_DATA_20, OP_CHECKSIG], false), 1);

        let sig_script = ScriptBuilder::new().add_data(&[1; 72]).add_data(&multisig).into_script();
        assert_eq!(p2sh_sig_op_count(&sig_script), 2);
        assert_eq!(p2sh_sig_op_count(&[OP_DUP]), 0);
    }

    #[test]
    fn coinbase_height_round_trips_through_the_script() {
        for height in [0u64, 1, 16, 17, 127, 128, 255, 256, 65_535, 500_000, 8_388_608] {
            let script = serialized_height_script(height);
            assert_eq!(extract_coinbase_height(&script), Some(height), "height {}", height);
        }
        assert_eq!(extract_coinbase_height(&[]), None);
        assert_eq!(extract_coinbase_height(&[0x03, 0x01]), None);
    }

    #[test]
    fn script_numbers_are_minimal() {
        assert_eq!(script_num_bytes(127), vec![0x7f]);
        assert_eq!(script_num_bytes(128), vec![0x80, 0x00]);
        assert_eq!(script_num_bytes(-1), vec![0x81]);
        assert_eq!(script_num_bytes(256), vec![0x00, 0x01]);
    }

    #[test]
    fn it_extracts_payloads() {
        assert_eq!(extract_payload(&pay_to_pubkey_hash_script(&[7; 20])), Some(vec![7; 20]));
        assert_eq!(extract_payload(&pay_to_script_hash_script(&[8; 20])), Some(vec![8; 20]));
        assert_eq!(extract_payload(&null_data_script(b"x")), None);
    }
}
