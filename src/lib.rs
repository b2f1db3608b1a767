//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: ciphergram — streaming authenticated-encryption message core.
//
// lib.rs - Streaming authenticated-encryption message core
//
//! ciphergram-core: the client-side engine behind a self-describing,
//! streaming authenticated-encryption message format.
//!
//! A [`session::Session`] drives an append-only state machine that turns
//! plaintext into a sealed message (or back) a buffer at a time: it owns no
//! sockets, files, or processes, and never blocks -- every call to
//! [`session::Session::process`] either makes forward progress or tells the
//! caller exactly how many more bytes it needs.
//!
//! Module map:
//! - [`error`] -- the single error type returned by every fallible operation.
//! - [`alg`] -- the fixed registry of algorithm suites (cipher, KDF, lengths).
//! - [`aead`] -- key derivation and AES-GCM framing primitives.
//! - [`enc_context`] -- canonical encryption-context serialization.
//! - [`header`] -- message header codec.
//! - [`frame`] -- body frame codec.
//! - [`keyring`] -- the data-key provider contract and built-in keyrings.
//! - [`session`] -- the streaming encrypt/decrypt state machine.

pub mod aead;
pub mod alg;
pub mod enc_context;
pub mod error;
pub mod frame;
pub mod header;
pub mod keyring;
pub mod session;

pub use error::{Error, Result};
pub use session::Session;
