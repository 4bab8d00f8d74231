//! Standard script templates.
//!
//! Only the shapes this tool creates or recognizes are supported:
//! - P2PKH locking: `OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG`
//! - P2SH locking: `OP_HASH160 <20> OP_EQUAL`
//! - P2PKH unlocking: `<sig||hashtype> <pubkey>`

use crate::error::ScriptError;

pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;

/// A recognized standard locking script.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StandardScript {
    PubkeyHash([u8; 20]),
    ScriptHash([u8; 20]),
}

/// Build a P2PKH locking script.
pub fn p2pkh_script(pubkey_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(25);
    script.push(OP_DUP);
    script.push(OP_HASH160);
    script.push(20);
    script.extend_from_slice(pubkey_hash);
    script.push(OP_EQUALVERIFY);
    script.push(OP_CHECKSIG);
    script
}

/// Build a P2SH locking script.
pub fn p2sh_script(script_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(23);
    script.push(OP_HASH160);
    script.push(20);
    script.extend_from_slice(script_hash);
    script.push(OP_EQUAL);
    script
}

/// Classify a locking script as one of the standard templates.
pub fn classify(script: &[u8]) -> Option<StandardScript> {
    match script {
        [OP_DUP, OP_HASH160, 20, hash @ .., OP_EQUALVERIFY, OP_CHECKSIG] if hash.len() == 20 => {
            Some(StandardScript::PubkeyHash(hash.try_into().ok()?))
        }
        [OP_HASH160, 20, hash @ .., OP_EQUAL] if hash.len() == 20 => {
            Some(StandardScript::ScriptHash(hash.try_into().ok()?))
        }
        _ => None,
    }
}

/// Extract the pubkey hash from a P2PKH locking script.
pub fn p2pkh_hash(script: &[u8]) -> Result<[u8; 20], ScriptError> {
    match classify(script) {
        Some(StandardScript::PubkeyHash(hash)) => Ok(hash),
        _ => Err(ScriptError::NotPayToPubkeyHash),
    }
}

/// Append a minimal data push to `script`.
pub fn push_data(script: &mut Vec<u8>, data: &[u8]) -> Result<(), ScriptError> {
    match data.len() {
        len @ 0..=0x4b => script.push(len as u8),
        len @ 0x4c..=0xff => {
            script.push(OP_PUSHDATA1);
            script.push(len as u8);
        }
        len @ 0x100..=0xffff => {
            script.push(OP_PUSHDATA2);
            script.extend_from_slice(&(len as u16).to_le_bytes());
        }
        len => return Err(ScriptError::PushTooLarge(len)),
    }
    script.extend_from_slice(data);
    Ok(())
}

/// Build a P2PKH unlocking script: `<signature> <pubkey>`.
///
/// `signature` already carries its trailing sighash-type byte.
pub fn p2pkh_unlocking_script(signature: &[u8], pubkey: &[u8]) -> Result<Vec<u8>, ScriptError> {
    let mut script = Vec::with_capacity(2 + signature.len() + pubkey.len());
    push_data(&mut script, signature)?;
    push_data(&mut script, pubkey)?;
    Ok(script)
}

/// Split a push-only script into its pushed data elements.
pub fn parse_pushes(script: &[u8]) -> Result<Vec<&[u8]>, ScriptError> {
    let mut pushes = Vec::new();
    let mut pos = 0;
    while pos < script.len() {
        let opcode = script[pos];
        let (len, header) = match opcode {
            0x00..=0x4b => (opcode as usize, 1),
            OP_PUSHDATA1 => {
                let len = *script.get(pos + 1).ok_or(ScriptError::TruncatedPush(pos))?;
                (len as usize, 2)
            }
            OP_PUSHDATA2 => {
                let bytes = script
                    .get(pos + 1..pos + 3)
                    .ok_or(ScriptError::TruncatedPush(pos))?;
                (u16::from_le_bytes([bytes[0], bytes[1]]) as usize, 3)
            }
            _ => return Err(ScriptError::NonPushOpcode { opcode, offset: pos }),
        };
        let start = pos + header;
        let data = script
            .get(start..start + len)
            .ok_or(ScriptError::TruncatedPush(pos))?;
        pushes.push(data);
        pos = start + len;
    }
    Ok(pushes)
}

/// Parse a P2PKH unlocking script into `(signature, pubkey)`.
pub fn parse_p2pkh_unlocking(script: &[u8]) -> Result<(&[u8], &[u8]), ScriptError> {
    match parse_pushes(script)?.as_slice() {
        [signature, pubkey] => Ok((*signature, *pubkey)),
        other => Err(ScriptError::UnexpectedPushCount {
            expected: 2,
            got: other.len(),
        }),
    }
}
