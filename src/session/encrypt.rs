//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: ciphergram — streaming authenticated-encryption message core.
//

//! Encrypt-path state transitions: generate the data key and header
//! (`GenKey`/`WriteHeader`), then seal plaintext a frame at a time
//! (`EncryptBody`).

use super::{Session, State, StepOutcome};
use crate::aead::{self, FrameKind, MESSAGE_ID_LEN};
use crate::alg;
use crate::error::Error;
use crate::frame::{self, Frame};
use crate::header::{ContentType, Edk, Header};

impl Session {
    pub(super) fn step_encrypt(&mut self, input: &[u8], out_capacity: usize) -> Result<(usize, StepOutcome), Error> {
        match self.state {
            State::Config => {
                self.state = State::GenKey;
                Ok((0, StepOutcome::Advanced))
            }
            State::GenKey => self.gen_key(),
            State::WriteHeader => {
                // Reached only once `pending_output` (the header bytes) has
                // been fully drained by the caller's process loop.
                self.state = State::EncryptBody;
                Ok((0, StepOutcome::Advanced))
            }
            State::EncryptBody => self.encrypt_one_frame(input, out_capacity),
            _ => unreachable!("an encrypt session never enters a decrypt-only state"),
        }
    }

    fn gen_key(&mut self) -> Result<(usize, StepOutcome), Error> {
        let suite = alg::lookup(self.suite_id)?;
        suite.require_supported()?;

        let (data_key, edks): (_, Vec<Edk>) = self.keyring.generate_data_key(suite, &self.enc_context)?;

        let mut message_id = [0u8; MESSAGE_ID_LEN];
        aead::fill_random(&mut message_id)?;
        let content_key = aead::derive_content_key(suite, &data_key, &message_id)?;

        let content_type = if self.frame_size == 0 {
            ContentType::Unframed
        } else {
            ContentType::Framed {
                frame_length: self.frame_size,
            }
        };

        let header = Header {
            suite_id: self.suite_id,
            message_id,
            enc_context: self.enc_context.clone(),
            edks,
            content_type,
        };
        let header_bytes = header.to_bytes()?;
        let tag = aead::seal_header(suite, &content_key, &header_bytes)?;

        self.pending_output.extend(header_bytes.iter().copied());
        self.pending_output.extend([0u8; aead::HEADER_IV_LEN]);
        self.pending_output.extend(tag);

        self.message_id = message_id;
        self.data_key = Some(data_key);
        self.content_key = Some(content_key);
        self.header = Some(header);
        self.state = State::WriteHeader;
        Ok((0, StepOutcome::Advanced))
    }

    fn encrypt_one_frame(&mut self, input: &[u8], out_capacity: usize) -> Result<(usize, StepOutcome), Error> {
        let suite = alg::lookup(self.suite_id)?;

        if self.frame_size == 0 {
            return self.encrypt_unframed(suite, input, out_capacity);
        }

        let remaining = self.precise_size.map(|p| p - self.data_so_far);
        let (len, is_final) = match remaining {
            Some(r) if r <= self.frame_size as u64 => (r as usize, true),
            _ => (self.frame_size as usize, false),
        };

        if input.len() < len {
            return Ok((0, StepOutcome::Blocked));
        }
        // Sealed bytes land in `pending_output`, which the caller's process
        // loop drains independently of this call's `out_capacity` -- so a
        // small output buffer only slows draining, it never blocks sealing.
        if self.data_so_far + len as u64 > self.size_bound {
            return Err(Error::bad_state("encrypting this frame would exceed the configured size bound"));
        }

        let mut iv = [0u8; frame::IV_LEN];
        aead::fill_random(&mut iv)?;
        let seqno = self.frame_seqno;
        let message_id = self.message_id;
        let content_key = self.content_key.as_ref().expect("content key set by gen_key");
        let kind = if is_final { FrameKind::Final } else { FrameKind::Frame };
        let plaintext = &input[..len];

        let (ciphertext, tag) = aead::encrypt_body(suite, content_key, &message_id, seqno, &iv, plaintext, kind)?;
        let wire_frame = Frame::Framed {
            seqno,
            iv,
            ciphertext,
            tag,
            is_final,
        };
        self.pending_output.extend(wire_frame.to_bytes());
        self.data_so_far += len as u64;

        if is_final {
            self.state = State::Done;
        } else {
            self.frame_seqno += 1;
        }

        Ok((len, StepOutcome::Advanced))
    }

    /// Unframed bodies are a single AEAD record covering the whole message,
    /// so plaintext accumulates in `self.accum` across calls until the
    /// caller-declared message size is fully buffered.
    fn encrypt_unframed(
        &mut self,
        suite: &'static alg::Suite,
        input: &[u8],
        _out_capacity: usize,
    ) -> Result<(usize, StepOutcome), Error> {
        let remaining = self
            .precise_size
            .ok_or_else(|| Error::bad_state("message size must be set before processing in unframed mode"))?;

        let still_needed = (remaining - self.accum.len() as u64) as usize;
        let take = still_needed.min(input.len());
        self.accum.extend_from_slice(&input[..take]);

        if (self.accum.len() as u64) < remaining {
            return Ok((take, StepOutcome::Blocked));
        }

        let mut iv = [0u8; frame::IV_LEN];
        aead::fill_random(&mut iv)?;
        let message_id = self.message_id;
        let content_key = self.content_key.as_ref().expect("content key set by gen_key");

        let (ciphertext, tag) = aead::encrypt_body(suite, content_key, &message_id, 1, &iv, &self.accum, FrameKind::Single)?;
        let wire_frame = Frame::Unframed { iv, ciphertext, tag };
        self.pending_output.extend(wire_frame.to_bytes());
        self.data_so_far += remaining;
        self.accum.clear();
        self.state = State::Done;

        Ok((take, StepOutcome::Advanced))
    }
}
