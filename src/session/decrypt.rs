//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: ciphergram — streaming authenticated-encryption message core.
//

//! Decrypt-path state transitions: accumulate and parse the header
//! (`ReadHeader`), unwrap the data key and verify the header tag
//! (`UnwrapKey`), then open the body a frame at a time (`DecryptBody`).
//! `CheckTrailer` is a pass-through: this format has no signature trailer
//! to verify once signing is out of scope.

use super::{Session, State, StepOutcome};
use crate::aead;
use crate::alg;
use crate::error::Error;
use crate::frame::Frame;
use crate::header::{ContentType, Header};

impl Session {
    pub(super) fn step_decrypt(&mut self, input: &[u8], out_capacity: usize) -> Result<(usize, StepOutcome), Error> {
        match self.state {
            State::Config => {
                self.state = State::ReadHeader;
                Ok((0, StepOutcome::Advanced))
            }
            State::ReadHeader => self.read_header(input),
            State::UnwrapKey => self.unwrap_key(),
            State::DecryptBody => self.decrypt_one_frame(input, out_capacity),
            State::CheckTrailer => {
                self.state = State::Done;
                Ok((0, StepOutcome::Advanced))
            }
            _ => unreachable!("a decrypt session never enters an encrypt-only state"),
        }
    }

    fn read_header(&mut self, input: &[u8]) -> Result<(usize, StepOutcome), Error> {
        self.accum.extend_from_slice(input);
        let consumed = input.len();

        let (header, header_len) = match Header::parse(&self.accum)? {
            None => return Ok((consumed, StepOutcome::Blocked)),
            Some(parsed) => parsed,
        };

        let suite = header.suite()?;
        let auth_len = aead::HEADER_IV_LEN + suite.tag_len;
        if self.accum.len() < header_len + auth_len {
            return Ok((consumed, StepOutcome::Blocked));
        }

        let header_bytes = self.accum[..header_len].to_vec();
        let auth_blob = self.accum[header_len..header_len + auth_len].to_vec();
        let leftover = self.accum[header_len + auth_len..].to_vec();

        self.header_bytes = header_bytes;
        self.auth_blob = auth_blob;
        self.header = Some(header);
        self.accum = leftover;
        self.state = State::UnwrapKey;

        Ok((consumed, StepOutcome::Advanced))
    }

    fn unwrap_key(&mut self) -> Result<(usize, StepOutcome), Error> {
        let header = self.header.as_ref().expect("set by read_header");
        let suite = header.suite()?;

        let data_key = self.keyring.decrypt_data_key(suite, &header.enc_context, &header.edks)?;
        let content_key = aead::derive_content_key(suite, &data_key, &header.message_id)?;
        aead::verify_header(suite, &content_key, &self.header_bytes, &self.auth_blob)?;

        self.suite_id = header.suite_id;
        self.message_id = header.message_id;
        self.frame_size = match header.content_type {
            ContentType::Framed { frame_length } => frame_length,
            ContentType::Unframed => 0,
        };

        self.data_key = Some(data_key);
        self.content_key = Some(content_key);
        self.header_bytes.clear();
        self.auth_blob.clear();
        self.state = State::DecryptBody;

        Ok((0, StepOutcome::Advanced))
    }

    fn decrypt_one_frame(&mut self, input: &[u8], _out_capacity: usize) -> Result<(usize, StepOutcome), Error> {
        self.accum.extend_from_slice(input);
        let consumed = input.len();
        let suite = alg::lookup(self.suite_id)?;

        let parsed = if self.frame_size == 0 {
            Frame::parse_unframed(&self.accum)
        } else {
            Frame::parse_framed(&self.accum, self.frame_size)
        };

        let Some((wire_frame, frame_len)) = parsed else {
            return Ok((consumed, StepOutcome::Blocked));
        };

        if wire_frame.seqno() != self.frame_seqno {
            return Err(Error::bad_ciphertext("frame sequence number out of order"));
        }

        // Opened plaintext lands in `pending_output`, drained independently
        // of this call's output buffer -- see the matching note in
        // `encrypt.rs`.
        let message_id = self.message_id;
        let content_key = self.content_key.as_ref().expect("content key set by unwrap_key");
        let plaintext = aead::decrypt_body(
            suite,
            content_key,
            &message_id,
            wire_frame.seqno(),
            wire_frame.iv(),
            wire_frame.ciphertext(),
            wire_frame.tag(),
            wire_frame.kind(),
        )?;

        self.data_so_far += plaintext.len() as u64;
        self.pending_output.extend(plaintext);
        self.accum.drain(..frame_len);

        let is_final = matches!(wire_frame, Frame::Unframed { .. }) || matches!(wire_frame, Frame::Framed { is_final: true, .. });
        if is_final {
            self.state = State::CheckTrailer;
        } else {
            self.frame_seqno += 1;
        }

        Ok((consumed, StepOutcome::Advanced))
    }
}
