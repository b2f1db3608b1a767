//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: ciphergram — streaming authenticated-encryption message core.
//

//! A keyring that composes an optional generator with an ordered list of
//! children, generalizing the capability-interface pattern used elsewhere
//! in this crate from a single backend to an ordered collection.

use super::Keyring;
use crate::aead::KeyBuf;
use crate::alg::Suite;
use crate::enc_context::EncryptionContext;
use crate::error::Error;
use crate::header::Edk;

/// Composes one optional "generator" keyring with zero or more children.
///
/// On encrypt, the generator produces the data key and every child wraps
/// it too, producing one EDK per participating keyring. On decrypt, each
/// child (and the generator, if present) is tried in order until one
/// succeeds; a child's failure is non-fatal until all have been tried.
pub struct MultiKeyring {
    generator: Option<Box<dyn Keyring>>,
    children: Vec<Box<dyn Keyring>>,
}

impl MultiKeyring {
    pub fn new() -> Self {
        Self {
            generator: None,
            children: Vec::new(),
        }
    }

    pub fn with_generator(mut self, generator: Box<dyn Keyring>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_child(mut self, child: Box<dyn Keyring>) -> Self {
        self.children.push(child);
        self
    }

    fn all_members(&self) -> impl Iterator<Item = &Box<dyn Keyring>> {
        self.generator.iter().chain(self.children.iter())
    }
}

impl Default for MultiKeyring {
    fn default() -> Self {
        Self::new()
    }
}

impl Keyring for MultiKeyring {
    fn generate_data_key(&self, suite: &Suite, enc_context: &EncryptionContext) -> Result<(KeyBuf, Vec<Edk>), Error> {
        let generator = self
            .generator
            .as_ref()
            .ok_or_else(|| Error::keyring_not_found("multi-keyring has no generator"))?;
        let (data_key, mut edks) = generator.generate_data_key(suite, enc_context)?;
        for child in &self.children {
            edks.extend(child.encrypt_data_key(suite, enc_context, &data_key)?);
        }
        Ok((data_key, edks))
    }

    fn encrypt_data_key(&self, suite: &Suite, enc_context: &EncryptionContext, data_key: &KeyBuf) -> Result<Vec<Edk>, Error> {
        let mut edks = Vec::new();
        for member in self.all_members() {
            edks.extend(member.encrypt_data_key(suite, enc_context, data_key)?);
        }
        if edks.is_empty() {
            return Err(Error::keyring_not_found("multi-keyring has no members to wrap with"));
        }
        Ok(edks)
    }

    fn decrypt_data_key(&self, suite: &Suite, enc_context: &EncryptionContext, edks: &[Edk]) -> Result<KeyBuf, Error> {
        for member in self.all_members() {
            if let Ok(data_key) = member.decrypt_data_key(suite, enc_context, edks) {
                return Ok(data_key);
            }
        }
        Err(Error::keyring_not_found(
            "no member of the multi-keyring could unwrap any EDK",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alg;
    use crate::keyring::RawAesKeyring;

    fn suite() -> &'static Suite {
        alg::lookup(alg::AES_256_GCM_IV12_AUTH16_KDSHA256_SIGNONE).unwrap()
    }

    #[test]
    fn generate_requires_a_generator() {
        let multi = MultiKeyring::new();
        let ctx = EncryptionContext::new();
        assert!(multi.generate_data_key(suite(), &ctx).is_err());
    }

    #[test]
    fn generate_produces_one_edk_per_member_and_each_unwraps_independently() {
        let generator = RawAesKeyring::new(*b"gen-key", *b"gen", [0x11; 32]);
        let other_child = RawAesKeyring::new(*b"other-key", *b"other", [0x22; 32]);

        let multi = MultiKeyring::new()
            .with_generator(Box::new(generator))
            .with_child(Box::new(other_child));

        let ctx = EncryptionContext::new();
        let (data_key, edks) = multi.generate_data_key(suite(), &ctx).unwrap();
        assert_eq!(edks.len(), 2, "generator and the one child must each contribute an EDK");

        // Either EDK alone must be enough for the multi-keyring to recover
        // the data key, proving both members actually wrapped it.
        for edk in &edks {
            let unwrapped = multi.decrypt_data_key(suite(), &ctx, std::slice::from_ref(edk)).unwrap();
            assert_eq!(data_key.as_slice(), unwrapped.as_slice());
        }
    }

    #[test]
    fn decrypt_fails_when_no_child_recognizes_any_edk() {
        let child = RawAesKeyring::new(*b"key", *b"mine", [0x33; 32]);
        let multi = MultiKeyring::new().with_child(Box::new(child));
        let ctx = EncryptionContext::new();
        let edk = Edk {
            provider_id: b"not-mine".to_vec(),
            provider_info: vec![],
            ciphertext: vec![0u8; 48],
        };
        assert!(multi.decrypt_data_key(suite(), &ctx, &[edk]).is_err());
    }
}
