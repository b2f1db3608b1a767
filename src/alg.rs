//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: ciphergram — streaming authenticated-encryption message core.
//

//! Algorithm suite registry.
//!
//! A suite id is a fixed, process-lifetime descriptor of the cipher, KDF
//! hash, and key/IV/tag lengths used for a message. Lookup is pure and
//! infallible except for unknown ids.

use crate::error::Error;

/// KDF hash used to derive the per-message content key from the data key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KdfHash {
    None,
    Sha256,
    Sha384,
}

/// Declares whether a suite carries a digital-signature algorithm slot.
/// Signing suites add a public-key entry to the encryption context under
/// `aws-crypto-public-key`, but signature production/verification itself is
/// out of scope (spec.md §9, Open Question 2) -- suites with a signature
/// algorithm are rejected by [`Suite::require_supported`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlg {
    None,
    Ec256,
    Ec384,
}

/// Immutable algorithm-suite descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Suite {
    pub id: u16,
    pub data_key_len: usize,
    pub iv_len: usize,
    pub tag_len: usize,
    pub kdf_hash: KdfHash,
    pub signature_alg: SignatureAlg,
}

impl Suite {
    pub const fn has_kdf(&self) -> bool {
        !matches!(self.kdf_hash, KdfHash::None)
    }

    /// Gate suites whose signing path is not implemented (spec.md §9).
    pub fn require_supported(&self) -> Result<(), Error> {
        if matches!(self.signature_alg, SignatureAlg::None) {
            Ok(())
        } else {
            Err(Error::unsupported_suite(format!(
                "suite {:#06x} declares a signature algorithm but signing is not implemented",
                self.id
            )))
        }
    }
}

pub const AES_128_GCM_IV12_AUTH16_KDNONE_SIGNONE: u16 = 0x0014;
pub const AES_128_GCM_IV12_AUTH16_KDSHA256_SIGEC256: u16 = 0x0114;
pub const AES_128_GCM_IV12_AUTH16_KDSHA256_SIGNONE: u16 = 0x0114 + 1;
pub const AES_192_GCM_IV12_AUTH16_KDNONE_SIGNONE: u16 = 0x0046;
pub const AES_192_GCM_IV12_AUTH16_KDSHA256_SIGNONE: u16 = 0x0146;
pub const AES_192_GCM_IV12_AUTH16_KDSHA384_SIGEC384: u16 = 0x0346;
pub const AES_256_GCM_IV12_AUTH16_KDNONE_SIGNONE: u16 = 0x0078;
pub const AES_256_GCM_IV12_AUTH16_KDSHA256_SIGNONE: u16 = 0x0178;
pub const AES_256_GCM_IV12_AUTH16_KDSHA384_SIGEC384: u16 = 0x0378;

const REGISTRY: &[Suite] = &[
    Suite {
        id: AES_128_GCM_IV12_AUTH16_KDNONE_SIGNONE,
        data_key_len: 16,
        iv_len: 12,
        tag_len: 16,
        kdf_hash: KdfHash::None,
        signature_alg: SignatureAlg::None,
    },
    Suite {
        id: AES_128_GCM_IV12_AUTH16_KDSHA256_SIGEC256,
        data_key_len: 16,
        iv_len: 12,
        tag_len: 16,
        kdf_hash: KdfHash::Sha256,
        signature_alg: SignatureAlg::Ec256,
    },
    Suite {
        id: AES_128_GCM_IV12_AUTH16_KDSHA256_SIGNONE,
        data_key_len: 16,
        iv_len: 12,
        tag_len: 16,
        kdf_hash: KdfHash::Sha256,
        signature_alg: SignatureAlg::None,
    },
    Suite {
        id: AES_192_GCM_IV12_AUTH16_KDNONE_SIGNONE,
        data_key_len: 24,
        iv_len: 12,
        tag_len: 16,
        kdf_hash: KdfHash::None,
        signature_alg: SignatureAlg::None,
    },
    Suite {
        id: AES_192_GCM_IV12_AUTH16_KDSHA256_SIGNONE,
        data_key_len: 24,
        iv_len: 12,
        tag_len: 16,
        kdf_hash: KdfHash::Sha256,
        signature_alg: SignatureAlg::None,
    },
    Suite {
        id: AES_192_GCM_IV12_AUTH16_KDSHA384_SIGEC384,
        data_key_len: 24,
        iv_len: 12,
        tag_len: 16,
        kdf_hash: KdfHash::Sha384,
        signature_alg: SignatureAlg::Ec384,
    },
    Suite {
        id: AES_256_GCM_IV12_AUTH16_KDNONE_SIGNONE,
        data_key_len: 32,
        iv_len: 12,
        tag_len: 16,
        kdf_hash: KdfHash::None,
        signature_alg: SignatureAlg::None,
    },
    Suite {
        id: AES_256_GCM_IV12_AUTH16_KDSHA256_SIGNONE,
        data_key_len: 32,
        iv_len: 12,
        tag_len: 16,
        kdf_hash: KdfHash::Sha256,
        signature_alg: SignatureAlg::None,
    },
    Suite {
        id: AES_256_GCM_IV12_AUTH16_KDSHA384_SIGEC384,
        data_key_len: 32,
        iv_len: 12,
        tag_len: 16,
        kdf_hash: KdfHash::Sha384,
        signature_alg: SignatureAlg::Ec384,
    },
];

/// Look up a suite descriptor by wire id.
pub fn lookup(id: u16) -> Result<&'static Suite, Error> {
    REGISTRY
        .iter()
        .find(|s| s.id == id)
        .ok_or_else(|| Error::unsupported_suite(format!("suite id {:#06x}", id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_known_suite() {
        let suite = lookup(AES_128_GCM_IV12_AUTH16_KDNONE_SIGNONE).unwrap();
        assert_eq!(suite.data_key_len, 16);
        assert_eq!(suite.iv_len, 12);
        assert_eq!(suite.tag_len, 16);
        assert!(!suite.has_kdf());
    }

    #[test]
    fn lookup_unknown_suite_fails() {
        assert!(lookup(0xFFFF).is_err());
    }

    #[test]
    fn signing_suites_are_gated() {
        let suite = lookup(AES_128_GCM_IV12_AUTH16_KDSHA256_SIGEC256).unwrap();
        assert_eq!(suite.data_key_len, 16);
        assert!(suite.has_kdf());
        assert!(suite.require_supported().is_err());
    }

    #[test]
    fn non_signing_suites_are_supported() {
        for id in [
            AES_128_GCM_IV12_AUTH16_KDNONE_SIGNONE,
            AES_128_GCM_IV12_AUTH16_KDSHA256_SIGNONE,
            AES_192_GCM_IV12_AUTH16_KDNONE_SIGNONE,
            AES_192_GCM_IV12_AUTH16_KDSHA256_SIGNONE,
            AES_256_GCM_IV12_AUTH16_KDNONE_SIGNONE,
            AES_256_GCM_IV12_AUTH16_KDSHA256_SIGNONE,
        ] {
            let suite = lookup(id).unwrap();
            assert!(suite.require_supported().is_ok());
        }
    }
}
