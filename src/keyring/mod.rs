//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: ciphergram — streaming authenticated-encryption message core.
//

//! The abstract contract through which a session obtains or unwraps a data
//! key, plus the two built-in implementations: a bit-exact raw-AES keyring
//! and a multi-keyring that composes several.

mod multi;
mod raw_aes;

pub use multi::MultiKeyring;
pub use raw_aes::RawAesKeyring;

use crate::aead::KeyBuf;
use crate::alg::Suite;
use crate::enc_context::EncryptionContext;
use crate::error::Error;
use crate::header::Edk;

/// Produces and unwraps data keys on behalf of a session.
///
/// Implementations may support any subset of capabilities: a
/// decrypt-only keyring may return `KeyringNotFound` from
/// `generate_data_key`/`encrypt_data_key`, and vice versa.
pub trait Keyring: Send + Sync {
    /// Called once on encrypt when the session has no data key yet.
    /// Returns the plaintext data key and every EDK that wraps it -- more
    /// than one when this keyring composes several wrapping members (see
    /// [`MultiKeyring`]).
    fn generate_data_key(&self, suite: &Suite, enc_context: &EncryptionContext) -> Result<(KeyBuf, Vec<Edk>), Error>;

    /// Wrap an already-generated data key, producing one EDK per
    /// participating member of this keyring.
    fn encrypt_data_key(&self, suite: &Suite, enc_context: &EncryptionContext, data_key: &KeyBuf) -> Result<Vec<Edk>, Error>;

    /// Try each EDK in order, returning the first one this keyring can
    /// unwrap to a key of the suite's expected length.
    fn decrypt_data_key(&self, suite: &Suite, enc_context: &EncryptionContext, edks: &[Edk]) -> Result<KeyBuf, Error>;
}
