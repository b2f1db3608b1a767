//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: ciphergram — streaming authenticated-encryption message core.
//

//! End-to-end encrypt/decrypt coverage across frame sizes, suites, and
//! adversarial buffer shapes.

use ciphergram_core::alg;
use ciphergram_core::enc_context::EncryptionContext;
use ciphergram_core::error::{CryptoError, Error};
use ciphergram_core::frame::Frame;
use ciphergram_core::header::Header;
use ciphergram_core::keyring::RawAesKeyring;
use ciphergram_core::Session;
use std::sync::Arc;

fn keyring() -> Arc<RawAesKeyring> {
    Arc::new(RawAesKeyring::new(*b"test-master-key", *b"test-provider", [0x5a; 32]))
}

/// Drive a session to completion, feeding all of `input` in one shot and
/// reading output through a buffer of `out_buf_len` bytes at a time.
fn drive(session: &mut Session, input: &[u8], out_buf_len: usize) -> Result<Vec<u8>, Error> {
    let mut consumed = 0usize;
    let mut output = Vec::new();
    let mut out_buf = vec![0u8; out_buf_len.max(1)];

    loop {
        let (used, produced) = session.process(&mut out_buf, &input[consumed..])?;
        consumed += used;
        output.extend_from_slice(&out_buf[..produced]);

        if session.is_done() {
            break;
        }
        if used == 0 && produced == 0 {
            panic!("session made no progress with consumed={consumed} remaining_input={}", input.len() - consumed);
        }
    }

    assert_eq!(consumed, input.len(), "did not consume all plaintext/ciphertext");
    Ok(output)
}

fn round_trip(suite_id: u16, frame_size: u32, plaintext: &[u8], out_buf_len: usize) {
    let kr = keyring();
    let mut ctx = EncryptionContext::new();
    ctx.insert(b"purpose".to_vec(), b"integration-test".to_vec());

    let mut encryptor = Session::new(kr.clone());
    encryptor.init_encrypt(suite_id, ctx.clone());
    encryptor.set_frame_size(frame_size).unwrap();
    encryptor.set_message_size(plaintext.len() as u64).unwrap();
    let ciphertext = drive(&mut encryptor, plaintext, out_buf_len).unwrap();

    let mut decryptor = Session::new(kr);
    decryptor.init_decrypt();
    let recovered = drive(&mut decryptor, &ciphertext, out_buf_len).unwrap();

    assert_eq!(recovered, plaintext);
}

#[test]
fn round_trips_across_frame_sizes_and_plaintext_lengths() {
    let suite = alg::AES_256_GCM_IV12_AUTH16_KDSHA256_SIGNONE;
    for frame_size in [0u32, 1, 16, 1024] {
        for len in [0usize, 1, 15, 16, 17, 1000, 4096] {
            let plaintext: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            round_trip(suite, frame_size, &plaintext, 8192);
        }
    }
}

#[test]
fn round_trips_across_every_non_signing_suite() {
    for suite_id in [
        alg::AES_128_GCM_IV12_AUTH16_KDNONE_SIGNONE,
        alg::AES_128_GCM_IV12_AUTH16_KDSHA256_SIGNONE,
        alg::AES_192_GCM_IV12_AUTH16_KDNONE_SIGNONE,
        alg::AES_192_GCM_IV12_AUTH16_KDSHA256_SIGNONE,
        alg::AES_256_GCM_IV12_AUTH16_KDNONE_SIGNONE,
        alg::AES_256_GCM_IV12_AUTH16_KDSHA256_SIGNONE,
    ] {
        round_trip(suite_id, 64, b"the quick brown fox jumps over the lazy dog", 4096);
    }
}

#[test]
fn streaming_with_small_buffers_produces_exactly_two_frames() {
    // 31 bytes of plaintext at frame_size=16 must yield one full FRAME
    // (seqno=1, 16 bytes) and one shorter FINAL frame (seqno=2, 15 bytes).
    let kr = keyring();
    let plaintext = vec![0x42u8; 31];

    let mut encryptor = Session::new(kr.clone());
    encryptor.init_encrypt(alg::AES_256_GCM_IV12_AUTH16_KDSHA256_SIGNONE, EncryptionContext::new());
    encryptor.set_frame_size(16).unwrap();
    encryptor.set_message_size(31).unwrap();
    let ciphertext = drive(&mut encryptor, &plaintext, 1).unwrap();

    // Header, then a full 16-byte FRAME, then a 15-byte FINAL frame, then
    // nothing left over.
    let (header, header_len) = Header::parse(&ciphertext).unwrap().unwrap();
    let suite = header.suite().unwrap();
    let auth_len = 12 + suite.tag_len;
    let body = &ciphertext[header_len + auth_len..];

    let (first, first_len) = Frame::parse_framed(body, 16).unwrap();
    assert!(matches!(first, Frame::Framed { is_final: false, .. }));
    assert_eq!(first.ciphertext().len(), 16);

    let (second, second_len) = Frame::parse_framed(&body[first_len..], 16).unwrap();
    assert!(matches!(second, Frame::Framed { is_final: true, .. }));
    assert_eq!(second.ciphertext().len(), 15);
    assert_eq!(first_len + second_len, body.len());

    let mut decryptor = Session::new(kr);
    decryptor.init_decrypt();
    let recovered = drive(&mut decryptor, &ciphertext, 1).unwrap();
    assert_eq!(recovered, plaintext);
}

#[test]
fn tampering_with_a_frame_is_detected_on_decrypt() {
    let kr = keyring();
    let plaintext = vec![0x11u8; 100];

    let mut encryptor = Session::new(kr.clone());
    encryptor.init_encrypt(alg::AES_128_GCM_IV12_AUTH16_KDNONE_SIGNONE, EncryptionContext::new());
    encryptor.set_frame_size(32).unwrap();
    encryptor.set_message_size(100).unwrap();
    let mut ciphertext = drive(&mut encryptor, &plaintext, 4096).unwrap();

    // Flip a bit well past the header, inside the body.
    let flip_at = ciphertext.len() - 10;
    ciphertext[flip_at] ^= 0x01;

    let mut decryptor = Session::new(kr);
    decryptor.init_decrypt();
    let mut out_buf = vec![0u8; 4096];
    let mut consumed = 0usize;
    let mut saw_error = false;
    loop {
        match decryptor.process(&mut out_buf, &ciphertext[consumed..]) {
            Ok((used, _produced)) => {
                consumed += used;
                if decryptor.is_done() {
                    break;
                }
                if used == 0 {
                    break;
                }
            }
            Err(Error::Crypto(CryptoError::BadCiphertext(_))) => {
                saw_error = true;
                break;
            }
            Err(e) => panic!("unexpected error kind: {e:?}"),
        }
    }
    assert!(saw_error, "tampered ciphertext must be rejected with BadCiphertext");
}

#[test]
fn exceeding_the_size_bound_is_rejected() {
    let kr = keyring();
    let mut session = Session::new(kr);
    session.init_encrypt(alg::AES_128_GCM_IV12_AUTH16_KDNONE_SIGNONE, EncryptionContext::new());
    session.set_message_bound(50).unwrap();
    assert!(session.set_message_size(100).is_err());
    assert!(session.error().is_some());
}

#[test]
fn wrong_keyring_cannot_decrypt() {
    let plaintext = b"secret payload".to_vec();
    let encrypt_keyring = Arc::new(RawAesKeyring::new(*b"alice-key", *b"alice", [0x01; 32]));
    let decrypt_keyring: Arc<RawAesKeyring> = Arc::new(RawAesKeyring::new(*b"bob-key", *b"bob", [0x02; 32]));

    let mut encryptor = Session::new(encrypt_keyring);
    encryptor.init_encrypt(alg::AES_256_GCM_IV12_AUTH16_KDSHA256_SIGNONE, EncryptionContext::new());
    encryptor.set_frame_size(16).unwrap();
    encryptor.set_message_size(plaintext.len() as u64).unwrap();
    let ciphertext = drive(&mut encryptor, &plaintext, 4096).unwrap();

    let mut decryptor = Session::new(decrypt_keyring);
    decryptor.init_decrypt();
    let mut out_buf = vec![0u8; 4096];
    let result = decryptor.process(&mut out_buf, &ciphertext);
    // The header parses and the auth blob is fully present in one shot, so
    // the key-unwrap failure surfaces as an immediate error.
    assert!(result.is_err());
}
