//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: ciphergram — streaming authenticated-encryption message core.
//

//! Unified error hierarchy for the ciphergram core: one focused enum per
//! concern, unified by a top-level [`Error`] via `#[from]`.

use thiserror::Error as ThisError;

/// Authentication or cryptographic-primitive failures.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Authentication or parse failure on untrusted input (tampered
    /// ciphertext, malformed header/frame, bad tag).
    #[error("bad ciphertext: {0}")]
    BadCiphertext(String),

    /// A cryptographic primitive failed for reasons unrelated to untrusted
    /// input (RNG failure, library-internal error).
    #[error("cryptographic primitive failed: {0}")]
    Unknown(String),

    /// Unknown or gated algorithm suite id.
    #[error("unsupported algorithm suite: {0}")]
    UnsupportedSuite(String),
}

/// Header / encryption-context wire-format failures.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    /// Output cannot be encoded in the wire format (e.g. encryption context
    /// too large).
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Keyring (data-key provider) failures.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// No keyring was able to produce or unwrap the requested data key.
    #[error("keyring could not satisfy request: {0}")]
    NotFound(String),
}

/// Session API-contract failures.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Caller violated the session API contract.
    #[error("invalid session state: {0}")]
    BadState(String),

    /// Caller-sized buffer is smaller than a strict requirement.
    #[error("buffer too short: {0}")]
    ShortBuffer(String),
}

/// Top-level error type returned by every public operation in this crate.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Header(#[from] HeaderError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl Error {
    pub(crate) fn bad_ciphertext(msg: impl Into<String>) -> Self {
        CryptoError::BadCiphertext(msg.into()).into()
    }

    pub(crate) fn crypto_unknown(msg: impl Into<String>) -> Self {
        CryptoError::Unknown(msg.into()).into()
    }

    pub(crate) fn unsupported_suite(msg: impl Into<String>) -> Self {
        CryptoError::UnsupportedSuite(msg.into()).into()
    }

    pub(crate) fn serialization(msg: impl Into<String>) -> Self {
        HeaderError::Serialization(msg.into()).into()
    }

    pub(crate) fn bad_state(msg: impl Into<String>) -> Self {
        SessionError::BadState(msg.into()).into()
    }

    pub(crate) fn short_buffer(msg: impl Into<String>) -> Self {
        SessionError::ShortBuffer(msg.into()).into()
    }

    pub(crate) fn keyring_not_found(msg: impl Into<String>) -> Self {
        BackendError::NotFound(msg.into()).into()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
