//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: ciphergram — streaming authenticated-encryption message core.
//

//! The raw-AES keyring: wraps/unwraps data keys with a locally held
//! 256-bit AES key. Its wire format is specified bit-exact (spec.md §4.3)
//! because interop test vectors target it, including the historical
//! asymmetry of storing the GCM tag length in *bits* in `provider_info`
//! while every other length in this crate is in bytes.

use super::Keyring;
use crate::aead::{self, KeyBuf};
use crate::alg::Suite;
use crate::enc_context::{self, EncryptionContext};
use crate::error::{BackendError, Error};
use crate::header::Edk;

const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;
const TAG_BITS: u32 = (TAG_LEN as u32) * 8;
const PROVIDER_INFO_SUFFIX_LEN: usize = 4 + 4 + IV_LEN;

/// A keyring that wraps data keys with a single, locally-held 256-bit AES
/// key. `master_key_id` identifies which key this keyring holds;
/// `provider_id` tags the EDKs it produces so a multi-keyring can route
/// unwrap requests to the right child without trying every one of them.
pub struct RawAesKeyring {
    master_key_id: Vec<u8>,
    provider_id: Vec<u8>,
    wrapping_key: KeyBuf,
}

impl RawAesKeyring {
    pub fn new(master_key_id: impl Into<Vec<u8>>, provider_id: impl Into<Vec<u8>>, wrapping_key: [u8; 32]) -> Self {
        Self {
            master_key_id: master_key_id.into(),
            provider_id: provider_id.into(),
            wrapping_key: KeyBuf::new(wrapping_key.to_vec()),
        }
    }

    fn serialize_provider_info(&self, iv: &[u8; IV_LEN]) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.master_key_id.len() + PROVIDER_INFO_SUFFIX_LEN);
        out.extend_from_slice(&self.master_key_id);
        out.extend_from_slice(&TAG_BITS.to_be_bytes());
        out.extend_from_slice(&(IV_LEN as u32).to_be_bytes());
        out.extend_from_slice(iv);
        out
    }

    fn parse_provider_info(&self, provider_info: &[u8]) -> Option<[u8; IV_LEN]> {
        if provider_info.len() != self.master_key_id.len() + PROVIDER_INFO_SUFFIX_LEN {
            return None;
        }
        let (mkid, rest) = provider_info.split_at(self.master_key_id.len());
        if mkid != self.master_key_id.as_slice() {
            return None;
        }
        let tag_bits = u32::from_be_bytes(rest[0..4].try_into().unwrap());
        if tag_bits != TAG_BITS {
            return None;
        }
        let iv_len = u32::from_be_bytes(rest[4..8].try_into().unwrap());
        if iv_len != IV_LEN as u32 {
            return None;
        }
        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(&rest[8..8 + IV_LEN]);
        Some(iv)
    }
}

impl Keyring for RawAesKeyring {
    fn generate_data_key(&self, suite: &Suite, enc_context: &EncryptionContext) -> Result<(KeyBuf, Vec<Edk>), Error> {
        let mut data_key = vec![0u8; suite.data_key_len];
        aead::fill_random(&mut data_key)?;
        let data_key = KeyBuf::new(data_key);
        let edks = self.encrypt_data_key(suite, enc_context, &data_key)?;
        Ok((data_key, edks))
    }

    fn encrypt_data_key(&self, _suite: &Suite, enc_context: &EncryptionContext, data_key: &KeyBuf) -> Result<Vec<Edk>, Error> {
        let mut iv = [0u8; IV_LEN];
        aead::fill_random(&mut iv)?;
        let aad = enc_context::serialize(enc_context)?;
        let (mut ciphertext, tag) = aead::wrap_data_key(&self.wrapping_key, &iv, &aad, data_key.as_slice())?;
        ciphertext.extend_from_slice(&tag);

        Ok(vec![Edk {
            provider_id: self.provider_id.clone(),
            provider_info: self.serialize_provider_info(&iv),
            ciphertext,
        }])
    }

    fn decrypt_data_key(&self, suite: &Suite, enc_context: &EncryptionContext, edks: &[Edk]) -> Result<KeyBuf, Error> {
        let aad = enc_context::serialize(enc_context)?;

        for edk in edks {
            if edk.provider_id != self.provider_id {
                continue;
            }
            let Some(iv) = self.parse_provider_info(&edk.provider_info) else {
                continue;
            };
            if edk.ciphertext.len() < TAG_LEN {
                continue;
            }
            let (ciphertext, tag) = edk.ciphertext.split_at(edk.ciphertext.len() - TAG_LEN);
            let tag: &[u8; TAG_LEN] = tag.try_into().expect("split at len - TAG_LEN");

            match aead::unwrap_data_key(&self.wrapping_key, &iv, &aad, ciphertext, tag) {
                Ok(data_key) if data_key.len() == suite.data_key_len => return Ok(data_key),
                _ => continue,
            }
        }

        Err(Error::keyring_not_found("no EDK could be unwrapped by this raw-AES keyring"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alg;

    #[test]
    fn provider_info_round_trips() {
        // From the reference serialize/parse test vector: master key id
        // "Master key id", iv = 00 11 22 .. bb.
        let keyring = RawAesKeyring::new(*b"Master key id", *b"Provider id", [0u8; 32]);
        let iv: [u8; IV_LEN] = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb];

        let serialized = keyring.serialize_provider_info(&iv);
        assert_eq!(
            hex::encode(&serialized),
            format!(
                "{}000000800000000c{}",
                hex::encode(b"Master key id"),
                hex::encode(iv)
            )
        );

        let parsed = keyring.parse_provider_info(&serialized).unwrap();
        assert_eq!(parsed, iv);
    }

    #[test]
    fn parse_provider_info_rejects_wrong_master_key_id() {
        let keyring = RawAesKeyring::new(*b"Master key id", *b"Provider id", [0u8; 32]);
        let other = RawAesKeyring::new(*b"someone else", *b"Provider id", [0u8; 32]);
        let iv = [0u8; IV_LEN];
        let serialized = other.serialize_provider_info(&iv);
        assert!(keyring.parse_provider_info(&serialized).is_none());
    }

    #[test]
    fn generate_then_decrypt_round_trips() {
        let suite = alg::lookup(alg::AES_256_GCM_IV12_AUTH16_KDSHA256_SIGNONE).unwrap();
        let keyring = RawAesKeyring::new(*b"test-master-key", *b"test-provider", [0x42; 32]);
        let enc_context = EncryptionContext::new();

        let (data_key, edks) = keyring.generate_data_key(suite, &enc_context).unwrap();
        let unwrapped = keyring.decrypt_data_key(suite, &enc_context, &edks).unwrap();
        assert_eq!(data_key.as_slice(), unwrapped.as_slice());
    }

    #[test]
    fn decrypt_data_key_literal_vector_empty_encryption_context() {
        // From the reference raw-AES-keyring decrypt vector: wrapping key
        // 00..1f, empty encryption context -> unwrapped data key
        // ddc2f65f96a2da9686ead658fee9c0c3b6d4b192f2ba5093219762ab7d259f2c.
        let suite = alg::lookup(alg::AES_256_GCM_IV12_AUTH16_KDSHA256_SIGNONE).unwrap();
        let wrapping_key: [u8; 32] = (0u8..32).collect::<Vec<_>>().try_into().unwrap();
        let keyring = RawAesKeyring::new(
            *b"asdfhasiufhiasuhviawurhgiuawrhefiuawhf",
            *b"static-random",
            wrapping_key,
        );
        let enc_context = EncryptionContext::new();

        let edk_bytes = hex::decode(
            "542bf0dc35200738e49e34faa6bf11ed454097fdb8e336755c03bb9fa4429e66\
             447c39f77ffebca59870e9a8c9b57f6f",
        )
        .unwrap();
        // provider_info is the master key id string followed by the
        // tag-bits/iv-len/iv suffix, matching `serialize_provider_info`.
        let mut provider_info = b"asdfhasiufhiasuhviawurhgiuawrhefiuawhf".to_vec();
        provider_info.extend_from_slice(&TAG_BITS.to_be_bytes());
        provider_info.extend_from_slice(&(IV_LEN as u32).to_be_bytes());
        provider_info.extend_from_slice(&hex::decode("bea0fbd00eee0d94d9b1b393").unwrap());

        let edk = Edk {
            provider_id: b"static-random".to_vec(),
            provider_info,
            ciphertext: edk_bytes,
        };

        let unwrapped = keyring.decrypt_data_key(suite, &enc_context, &[edk]).unwrap();
        assert_eq!(
            hex::encode(unwrapped.as_slice()),
            "ddc2f65f96a2da9686ead658fee9c0c3b6d4b192f2ba5093219762ab7d259f2c"
        );
    }

    #[test]
    fn decrypt_data_key_fails_for_wrong_provider_id() {
        let suite = alg::lookup(alg::AES_256_GCM_IV12_AUTH16_KDSHA256_SIGNONE).unwrap();
        let keyring = RawAesKeyring::new(*b"master", *b"mine", [0x11; 32]);
        let enc_context = EncryptionContext::new();
        let edk = Edk {
            provider_id: b"someone-elses".to_vec(),
            provider_info: vec![],
            ciphertext: vec![0u8; 48],
        };
        assert!(matches!(
            keyring.decrypt_data_key(suite, &enc_context, &[edk]),
            Err(Error::Backend(BackendError::NotFound(_)))
        ));
    }
}
