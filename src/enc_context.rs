//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: ciphergram — streaming authenticated-encryption message core.
//

//! Canonical serialization of the encryption context.
//!
//! `count_be16 || (key_len_be16 || key || value_len_be16 || value)*`, entries
//! sorted ascending by key bytes. Used both inside the header and as AAD
//! when a keyring wraps/unwraps a data key.

use crate::error::Error;
use std::collections::BTreeMap;

/// A string-to-string map bound cryptographically to a message and to every
/// encrypted data key. Keys are byte strings, values are byte strings;
/// Rust's `BTreeMap` keeps entries in ascending key order for free, which is
/// exactly the canonical ordering the wire format requires.
pub type EncryptionContext = BTreeMap<Vec<u8>, Vec<u8>>;

/// Serialize an encryption context in canonical (sorted, length-prefixed)
/// form. Fails if any individual length, or the total serialized length,
/// does not fit in 16 bits.
pub fn serialize(ctx: &EncryptionContext) -> Result<Vec<u8>, Error> {
    if ctx.len() > u16::MAX as usize {
        return Err(Error::serialization(format!(
            "encryption context has {} entries, exceeds 65535",
            ctx.len()
        )));
    }

    let mut out = Vec::with_capacity(2);
    out.extend_from_slice(&(ctx.len() as u16).to_be_bytes());

    // BTreeMap iterates in ascending key order already, which matches the
    // lexicographic-on-unsigned-octets requirement directly.
    for (key, value) in ctx.iter() {
        if key.len() > u16::MAX as usize || value.len() > u16::MAX as usize {
            return Err(Error::serialization(
                "encryption context key or value exceeds 65535 bytes",
            ));
        }
        out.extend_from_slice(&(key.len() as u16).to_be_bytes());
        out.extend_from_slice(key);
        out.extend_from_slice(&(value.len() as u16).to_be_bytes());
        out.extend_from_slice(value);
    }

    if out.len() > u16::MAX as usize {
        return Err(Error::serialization(
            "serialized encryption context exceeds 65535 bytes",
        ));
    }

    Ok(out)
}

/// Parse a canonically-serialized encryption context, rejecting duplicate
/// or out-of-order keys and truncated input.
pub fn parse(bytes: &[u8]) -> Result<EncryptionContext, Error> {
    let mut ctx = EncryptionContext::new();
    if bytes.len() < 2 {
        return Err(Error::bad_ciphertext("encryption context: truncated count"));
    }
    let count = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
    let mut pos = 2;
    let mut prev_key: Option<&[u8]> = None;

    for _ in 0..count {
        let key_len = read_be16(bytes, pos)?;
        pos += 2;
        let key = read_bytes(bytes, pos, key_len)?;
        pos += key_len;

        if let Some(prev) = prev_key {
            if key <= prev {
                return Err(Error::bad_ciphertext(
                    "encryption context keys not strictly ascending",
                ));
            }
        }

        let value_len = read_be16(bytes, pos)?;
        pos += 2;
        let value = read_bytes(bytes, pos, value_len)?;
        pos += value_len;

        ctx.insert(key.to_vec(), value.to_vec());
        prev_key = Some(key);
    }

    if pos != bytes.len() {
        return Err(Error::bad_ciphertext(
            "encryption context: trailing bytes after declared entries",
        ));
    }

    Ok(ctx)
}

fn read_be16(bytes: &[u8], pos: usize) -> Result<usize, Error> {
    if pos + 2 > bytes.len() {
        return Err(Error::bad_ciphertext("encryption context: truncated length"));
    }
    Ok(u16::from_be_bytes([bytes[pos], bytes[pos + 1]]) as usize)
}

fn read_bytes(bytes: &[u8], pos: usize, len: usize) -> Result<&[u8], Error> {
    if pos + len > bytes.len() {
        return Err(Error::bad_ciphertext("encryption context: truncated field"));
    }
    Ok(&bytes[pos..pos + len])
}

/// Key under which a signing suite's public key is placed in the encryption
/// context (spec.md §9, Open Question 2).
pub const PUBLIC_KEY_CONTEXT_KEY: &[u8] = b"aws-crypto-public-key";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_context_round_trips() {
        let ctx = EncryptionContext::new();
        let bytes = serialize(&ctx).unwrap();
        assert_eq!(bytes, vec![0, 0]);
        assert_eq!(parse(&bytes).unwrap(), ctx);
    }

    #[test]
    fn sorts_entries_ascending_by_key() {
        let mut ctx = EncryptionContext::new();
        ctx.insert(b"zzz".to_vec(), b"1".to_vec());
        ctx.insert(b"aaa".to_vec(), b"2".to_vec());
        ctx.insert(b"mmm".to_vec(), b"3".to_vec());

        let bytes = serialize(&ctx).unwrap();
        // count, then "aaa" before "mmm" before "zzz".
        let aaa_pos = bytes.windows(3).position(|w| w == b"aaa").unwrap();
        let mmm_pos = bytes.windows(3).position(|w| w == b"mmm").unwrap();
        let zzz_pos = bytes.windows(3).position(|w| w == b"zzz").unwrap();
        assert!(aaa_pos < mmm_pos);
        assert!(mmm_pos < zzz_pos);
    }

    #[test]
    fn round_trip_is_identity() {
        let mut ctx = EncryptionContext::new();
        ctx.insert(b"purpose".to_vec(), b"test".to_vec());
        ctx.insert(b"device".to_vec(), b"abc123".to_vec());

        let bytes = serialize(&ctx).unwrap();
        let parsed = parse(&bytes).unwrap();
        assert_eq!(ctx, parsed);
    }

    #[test]
    fn parse_rejects_out_of_order_keys() {
        // Hand-construct a context with "b" before "a" -- not ascending.
        let mut bytes = vec![0u8, 2];
        bytes.extend_from_slice(&1u16.to_be_bytes());
        bytes.push(b'b');
        bytes.extend_from_slice(&1u16.to_be_bytes());
        bytes.push(b'1');
        bytes.extend_from_slice(&1u16.to_be_bytes());
        bytes.push(b'a');
        bytes.extend_from_slice(&1u16.to_be_bytes());
        bytes.push(b'2');

        assert!(parse(&bytes).is_err());
    }

    #[test]
    fn parse_rejects_duplicate_keys() {
        let mut bytes = vec![0u8, 2];
        for _ in 0..2 {
            bytes.extend_from_slice(&1u16.to_be_bytes());
            bytes.push(b'a');
            bytes.extend_from_slice(&1u16.to_be_bytes());
            bytes.push(b'1');
        }
        assert!(parse(&bytes).is_err());
    }

    #[test]
    fn parse_rejects_truncated_input() {
        assert!(parse(&[0]).is_err());
        assert!(parse(&[0, 1]).is_err());
    }

    #[test]
    fn serialize_rejects_oversize_total() {
        let mut ctx = EncryptionContext::new();
        // A single entry whose combined length blows past u16::MAX.
        ctx.insert(vec![0u8; 40_000], vec![0u8; 40_000]);
        assert!(serialize(&ctx).is_err());
    }
}
