//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: ciphergram — streaming authenticated-encryption message core.
//

//! Message header codec.
//!
//! The header is the one part of the wire format that must be parsed
//! incrementally: a streaming decryptor sees it a few bytes at a time, so
//! [`Header::parse`] distinguishes "not enough bytes yet" (`Ok(None)`) from a
//! genuinely malformed header (`Err`). Nothing here buffers unboundedly --
//! the caller keeps accumulating bytes and calling `parse` again.

use crate::aead::MESSAGE_ID_LEN;
use crate::alg::{self, Suite};
use crate::enc_context::{self, EncryptionContext};
use crate::error::Error;

pub const VERSION: u8 = 1;
pub const MESSAGE_TYPE: u8 = 0x80;
pub const IV_LEN: u8 = 12;

/// One encrypted data key as carried in the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edk {
    pub provider_id: Vec<u8>,
    pub provider_info: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

/// Whether the body is one unframed record or a sequence of fixed-size frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Unframed,
    Framed { frame_length: u32 },
}

/// A fully parsed (or about-to-be-serialized) message header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub suite_id: u16,
    pub message_id: [u8; MESSAGE_ID_LEN],
    pub enc_context: EncryptionContext,
    pub edks: Vec<Edk>,
    pub content_type: ContentType,
}

impl Header {
    /// Look up this header's algorithm suite, rejecting unsupported
    /// (signature-bearing) suites per spec.md §9, Open Question 2.
    pub fn suite(&self) -> Result<&'static Suite, Error> {
        let suite = alg::lookup(self.suite_id)?;
        suite.require_supported()?;
        Ok(suite)
    }

    /// Serialize the header fields (everything before the header-auth blob).
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut out = Vec::new();
        out.push(VERSION);
        out.push(MESSAGE_TYPE);
        out.extend_from_slice(&self.suite_id.to_be_bytes());
        out.extend_from_slice(&self.message_id);
        out.extend_from_slice(&enc_context::serialize(&self.enc_context)?);

        if self.edks.len() > u16::MAX as usize {
            return Err(Error::serialization("too many encrypted data keys"));
        }
        out.extend_from_slice(&(self.edks.len() as u16).to_be_bytes());
        for edk in &self.edks {
            write_lp(&mut out, &edk.provider_id)?;
            write_lp(&mut out, &edk.provider_info)?;
            write_lp(&mut out, &edk.ciphertext)?;
        }

        let frame_length = match self.content_type {
            ContentType::Unframed => {
                out.push(1);
                0u32
            }
            ContentType::Framed { frame_length } => {
                if frame_length == 0 {
                    return Err(Error::serialization("framed content type requires frame_length > 0"));
                }
                out.push(2);
                frame_length
            }
        };
        out.extend_from_slice(&[0u8; 4]);
        out.push(IV_LEN);
        out.extend_from_slice(&frame_length.to_be_bytes());

        Ok(out)
    }

    /// Try to parse a header from the front of `bytes`.
    ///
    /// Returns `Ok(Some((header, consumed)))` on success, `Ok(None)` if
    /// `bytes` does not yet hold a complete header (the caller should
    /// accumulate more and retry), or `Err` for a genuinely malformed header.
    pub fn parse(bytes: &[u8]) -> Result<Option<(Header, usize)>, Error> {
        let mut c = Cursor { bytes, pos: 0 };
        match parse_inner(&mut c) {
            Ok(header) => Ok(Some((header, c.pos))),
            Err(ParseOutcome::NeedMore) => Ok(None),
            Err(ParseOutcome::Invalid(e)) => Err(e),
        }
    }
}

fn write_lp(out: &mut Vec<u8>, field: &[u8]) -> Result<(), Error> {
    if field.len() > u16::MAX as usize {
        return Err(Error::serialization("header field exceeds 65535 bytes"));
    }
    out.extend_from_slice(&(field.len() as u16).to_be_bytes());
    out.extend_from_slice(field);
    Ok(())
}

enum ParseOutcome {
    NeedMore,
    Invalid(Error),
}

impl From<Error> for ParseOutcome {
    fn from(e: Error) -> Self {
        ParseOutcome::Invalid(e)
    }
}

type PResult<T> = Result<T, ParseOutcome>;

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> PResult<&'a [u8]> {
        if self.pos + n > self.bytes.len() {
            return Err(ParseOutcome::NeedMore);
        }
        let s = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    fn u8(&mut self) -> PResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn be16(&mut self) -> PResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn be32(&mut self) -> PResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn lp(&mut self) -> PResult<Vec<u8>> {
        let len = self.be16()? as usize;
        Ok(self.take(len)?.to_vec())
    }
}

fn parse_inner(c: &mut Cursor<'_>) -> PResult<Header> {
    let version = c.u8()?;
    if version != VERSION {
        return Err(Error::bad_ciphertext(format!("unsupported header version {version}")).into());
    }
    let message_type = c.u8()?;
    if message_type != MESSAGE_TYPE {
        return Err(Error::bad_ciphertext(format!("unsupported message type {message_type:#04x}")).into());
    }
    let suite_id = c.be16()?;
    alg::lookup(suite_id)?;

    let mut message_id = [0u8; MESSAGE_ID_LEN];
    message_id.copy_from_slice(c.take(MESSAGE_ID_LEN)?);

    let enc_context = parse_enc_context(c)?;

    let edk_count = c.be16()? as usize;
    let mut edks = Vec::with_capacity(edk_count.min(1024));
    for _ in 0..edk_count {
        edks.push(Edk {
            provider_id: c.lp()?,
            provider_info: c.lp()?,
            ciphertext: c.lp()?,
        });
    }

    let content_type_byte = c.u8()?;
    let reserved = c.take(4)?;
    if reserved != [0, 0, 0, 0] {
        return Err(Error::bad_ciphertext("header reserved bytes must be zero").into());
    }
    let iv_len = c.u8()?;
    if iv_len != IV_LEN {
        return Err(Error::bad_ciphertext(format!("unsupported IV length {iv_len}")).into());
    }
    let frame_length = c.be32()?;

    let content_type = match content_type_byte {
        1 => ContentType::Unframed,
        2 => {
            if frame_length == 0 {
                return Err(Error::bad_ciphertext("frame length is zero in framed header").into());
            }
            ContentType::Framed { frame_length }
        }
        other => return Err(Error::bad_ciphertext(format!("unsupported content type {other}")).into()),
    };

    Ok(Header {
        suite_id,
        message_id,
        enc_context,
        edks,
        content_type,
    })
}

/// Parse the encryption-context sub-structure inline in the header cursor,
/// which needs `Cursor`'s "need more bytes" semantics rather than
/// [`enc_context::parse`]'s all-or-nothing contract.
fn parse_enc_context(c: &mut Cursor<'_>) -> PResult<EncryptionContext> {
    let count = c.be16()? as usize;
    let mut ctx = EncryptionContext::new();
    let mut prev_key: Option<Vec<u8>> = None;

    for _ in 0..count {
        let key = c.lp()?;
        if let Some(prev) = &prev_key {
            if key.as_slice() <= prev.as_slice() {
                return Err(Error::bad_ciphertext("encryption context keys not strictly ascending").into());
            }
        }
        let value = c.lp()?;
        prev_key = Some(key.clone());
        ctx.insert(key, value);
    }

    Ok(ctx)
}
