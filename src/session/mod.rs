//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: ciphergram — streaming authenticated-encryption message core.
//

//! The streaming session state machine: the part of this crate that drives
//! encryption and decryption a buffer at a time, negotiates how much data
//! it needs to make progress, and enforces message-size bounds.
//!
//! `process` is the only I/O-shaped entry point. Everything else configures
//! the session before the first call or inspects it afterward.

mod decrypt;
mod encrypt;

use crate::aead::{self, KeyBuf, MESSAGE_ID_LEN};
use crate::alg;
use crate::enc_context::EncryptionContext;
use crate::error::{Error, SessionError};
use crate::header::Header;
use crate::keyring::Keyring;
use std::collections::VecDeque;
use std::sync::Arc;

/// Frame size used when a caller never calls [`Session::set_frame_size`],
/// matching the reference implementation's default.
pub const DEFAULT_FRAME_SIZE: u32 = 256 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Encrypt,
    Decrypt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Config,
    Error,
    Done,

    // Decrypt path.
    ReadHeader,
    UnwrapKey,
    DecryptBody,
    CheckTrailer,

    // Encrypt path.
    GenKey,
    WriteHeader,
    EncryptBody,
}

pub(crate) enum StepOutcome {
    /// The session changed state or fully drained its queued output; the
    /// caller's `process` loop should immediately look for more work.
    Advanced,
    /// No further progress is possible this call without more input or
    /// output capacity.
    Blocked,
}

/// A streaming encryption or decryption session.
///
/// Construct with [`Session::new`], configure with `init_encrypt`/
/// `init_decrypt` and the `set_*` methods, then drive it with repeated
/// calls to [`Session::process`] until [`Session::is_done`].
pub struct Session {
    keyring: Arc<dyn Keyring>,
    mode: Mode,
    state: State,
    error: Option<Error>,

    suite_id: u16,
    enc_context: EncryptionContext,

    precise_size: Option<u64>,
    size_bound: u64,
    data_so_far: u64,

    frame_size: u32,
    frame_seqno: u32,

    header: Option<Header>,
    header_bytes: Vec<u8>,
    auth_blob: Vec<u8>,
    message_id: [u8; MESSAGE_ID_LEN],

    data_key: Option<KeyBuf>,
    content_key: Option<KeyBuf>,

    pending_output: VecDeque<u8>,
    accum: Vec<u8>,
}

impl Session {
    pub fn new(keyring: Arc<dyn Keyring>) -> Self {
        Self {
            keyring,
            mode: Mode::Encrypt,
            state: State::Config,
            error: None,
            suite_id: alg::AES_256_GCM_IV12_AUTH16_KDSHA256_SIGNONE,
            enc_context: EncryptionContext::new(),
            precise_size: None,
            size_bound: u64::MAX,
            data_so_far: 0,
            frame_size: DEFAULT_FRAME_SIZE,
            frame_seqno: 1,
            header: None,
            header_bytes: Vec::new(),
            auth_blob: Vec::new(),
            message_id: [0u8; MESSAGE_ID_LEN],
            data_key: None,
            content_key: None,
            pending_output: VecDeque::new(),
            accum: Vec::new(),
        }
    }

    /// Reset to `Config` for an encrypt session with the given suite and
    /// encryption context, preserving the keyring (spec.md §4.5).
    pub fn init_encrypt(&mut self, suite_id: u16, enc_context: EncryptionContext) {
        self.reset_common();
        self.mode = Mode::Encrypt;
        self.suite_id = suite_id;
        self.enc_context = enc_context;
    }

    /// Reset to `Config` for a decrypt session, preserving the keyring.
    pub fn init_decrypt(&mut self) {
        self.reset_common();
        self.mode = Mode::Decrypt;
    }

    fn reset_common(&mut self) {
        self.zeroize_keys();
        self.state = State::Config;
        self.error = None;
        self.precise_size = None;
        self.size_bound = u64::MAX;
        self.data_so_far = 0;
        self.frame_size = DEFAULT_FRAME_SIZE;
        self.frame_seqno = 1;
        self.header = None;
        self.header_bytes.clear();
        self.auth_blob.clear();
        self.pending_output.clear();
        self.accum.clear();
    }

    fn zeroize_keys(&mut self) {
        self.data_key = None;
        self.content_key = None;
    }

    fn latch(&mut self, error: Error) -> Error {
        self.error = Some(error.clone());
        self.state = State::Error;
        self.zeroize_keys();
        error
    }

    /// `n = 0` selects unframed mode; `n > 0` selects framed mode with
    /// frames of exactly `n` plaintext bytes except possibly the final one.
    /// Must be called before the first `process` call.
    pub fn set_frame_size(&mut self, n: u32) -> Result<(), Error> {
        if self.state != State::Config {
            return Err(self.latch(Error::bad_state("frame size must be set before processing begins")));
        }
        self.frame_size = n;
        Ok(())
    }

    /// May be called at most once; rejects being called twice, after data
    /// has already been processed past `n`, or above any previously set
    /// bound (spec.md §4.5).
    pub fn set_message_size(&mut self, n: u64) -> Result<(), Error> {
        if self.precise_size.is_some() {
            return Err(self.latch(Error::bad_state("message size already set")));
        }
        if n > self.size_bound {
            return Err(self.latch(Error::bad_state("message size exceeds previously set bound")));
        }
        if self.data_so_far > n {
            return Err(self.latch(Error::bad_state("message size is smaller than data already processed")));
        }
        self.precise_size = Some(n);
        Ok(())
    }

    /// May be called repeatedly; the effective bound is the minimum of all
    /// calls.
    pub fn set_message_bound(&mut self, n: u64) -> Result<(), Error> {
        let new_bound = self.size_bound.min(n);
        if let Some(precise) = self.precise_size {
            if precise > new_bound {
                return Err(self.latch(Error::bad_state("message bound is smaller than the previously set message size")));
            }
        }
        self.size_bound = new_bound;
        Ok(())
    }

    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// The latched error, if the session is in the `Error` state.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// `(input_needed, output_needed)` sufficient to guarantee forward
    /// progress in the current state (spec.md §4.5's buffer-estimate
    /// discipline).
    pub fn estimate_buf(&self) -> (usize, usize) {
        let frame_overhead = crate::frame::IV_LEN + crate::frame::TAG_LEN;
        match self.state {
            State::Config | State::GenKey | State::UnwrapKey | State::CheckTrailer => (0, 0),
            State::WriteHeader => (0, self.pending_output.len().max(1)),
            State::ReadHeader => (self.accum.len() + 1, 0),
            State::EncryptBody => (
                (self.frame_size as usize).max(1),
                self.frame_size as usize + frame_overhead + 8,
            ),
            State::DecryptBody => (self.accum.len() + 1, (self.frame_size as usize).max(1)),
            State::Done | State::Error => (1, 1),
        }
    }

    /// Attempt to consume bytes from `input`, produce bytes into `out`, and
    /// advance the state machine. Returns `(bytes_consumed, bytes_produced)`.
    pub fn process(&mut self, out: &mut [u8], input: &[u8]) -> Result<(usize, usize), Error> {
        if self.state == State::Error {
            return Err(self.error.clone().expect("Error state always carries an error"));
        }
        if self.state == State::Done {
            return Ok((0, 0));
        }

        let mut consumed = 0usize;
        let mut produced = 0usize;

        loop {
            if !self.pending_output.is_empty() {
                let n = self.pending_output.len().min(out.len() - produced);
                if n == 0 {
                    break;
                }
                for slot in &mut out[produced..produced + n] {
                    *slot = self.pending_output.pop_front().expect("checked len above");
                }
                produced += n;
                continue;
            }

            if self.state == State::Done || self.state == State::Error {
                break;
            }

            let remaining_input = &input[consumed..];
            let out_capacity = out.len() - produced;

            let step_result = match self.mode {
                Mode::Encrypt => self.step_encrypt(remaining_input, out_capacity),
                Mode::Decrypt => self.step_decrypt(remaining_input, out_capacity),
            };

            match step_result {
                Ok((used, StepOutcome::Advanced)) => {
                    consumed += used;
                    continue;
                }
                Ok((used, StepOutcome::Blocked)) => {
                    consumed += used;
                    break;
                }
                Err(e) => {
                    for slot in &mut out[..produced] {
                        *slot = 0;
                    }
                    return Err(self.latch(e));
                }
            }
        }

        Ok((consumed, produced))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.zeroize_keys();
    }
}
