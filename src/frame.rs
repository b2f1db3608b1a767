//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: ciphergram — streaming authenticated-encryption message core.
//

//! Body frame codec: serializes and parses the three record shapes a
//! session can emit -- framed non-final, framed final, and unframed -- and
//! reports how many wire bytes one record needs before it can be read.

use crate::aead::FrameKind;

pub const IV_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
pub const FINAL_FRAME_SEQNO_MARKER: u32 = 0xFFFF_FFFF;

/// A body record as it appears on the wire, with its ciphertext and tag
/// still attached (the session is responsible for calling into
/// [`crate::aead`] to open/seal the ciphertext itself).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Framed {
        seqno: u32,
        iv: [u8; IV_LEN],
        ciphertext: Vec<u8>,
        tag: [u8; TAG_LEN],
        is_final: bool,
    },
    Unframed {
        iv: [u8; IV_LEN],
        ciphertext: Vec<u8>,
        tag: [u8; TAG_LEN],
    },
}

impl Frame {
    pub fn kind(&self) -> FrameKind {
        match self {
            Frame::Framed { is_final: true, .. } => FrameKind::Final,
            Frame::Framed { is_final: false, .. } => FrameKind::Frame,
            Frame::Unframed { .. } => FrameKind::Single,
        }
    }

    pub fn seqno(&self) -> u32 {
        match self {
            Frame::Framed { seqno, .. } => *seqno,
            Frame::Unframed { .. } => 1,
        }
    }

    pub fn iv(&self) -> &[u8; IV_LEN] {
        match self {
            Frame::Framed { iv, .. } => iv,
            Frame::Unframed { iv, .. } => iv,
        }
    }

    pub fn ciphertext(&self) -> &[u8] {
        match self {
            Frame::Framed { ciphertext, .. } => ciphertext,
            Frame::Unframed { ciphertext, .. } => ciphertext,
        }
    }

    pub fn tag(&self) -> &[u8; TAG_LEN] {
        match self {
            Frame::Framed { tag, .. } => tag,
            Frame::Unframed { tag, .. } => tag,
        }
    }

    /// Serialize this frame to its wire layout (spec.md §3).
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Frame::Framed {
                seqno,
                iv,
                ciphertext,
                tag,
                is_final,
            } => {
                let mut out = Vec::with_capacity(4 + 4 + IV_LEN + ciphertext.len() + TAG_LEN);
                if *is_final {
                    out.extend_from_slice(&FINAL_FRAME_SEQNO_MARKER.to_be_bytes());
                    out.extend_from_slice(&seqno.to_be_bytes());
                    out.extend_from_slice(iv);
                    out.extend_from_slice(&(ciphertext.len() as u32).to_be_bytes());
                } else {
                    out.extend_from_slice(&seqno.to_be_bytes());
                    out.extend_from_slice(iv);
                }
                out.extend_from_slice(ciphertext);
                out.extend_from_slice(tag);
                out
            }
            Frame::Unframed { iv, ciphertext, tag } => {
                let mut out = Vec::with_capacity(IV_LEN + 8 + ciphertext.len() + TAG_LEN);
                out.extend_from_slice(iv);
                out.extend_from_slice(&(ciphertext.len() as u64).to_be_bytes());
                out.extend_from_slice(ciphertext);
                out.extend_from_slice(tag);
                out
            }
        }
    }

    /// Parse one framed-mode record (non-final or final) from the front of
    /// `bytes`, given the fixed `frame_size` negotiated for the message.
    /// `Ok(None)` means not enough bytes yet.
    pub fn parse_framed(bytes: &[u8], frame_size: u32) -> Option<(Frame, usize)> {
        if bytes.len() < 4 {
            return None;
        }
        let first_word = u32::from_be_bytes(bytes[0..4].try_into().unwrap());

        if first_word == FINAL_FRAME_SEQNO_MARKER {
            if bytes.len() < 4 + 4 + IV_LEN + 4 {
                return None;
            }
            let seqno = u32::from_be_bytes(bytes[4..8].try_into().unwrap());
            let iv: [u8; IV_LEN] = bytes[8..8 + IV_LEN].try_into().unwrap();
            let len_pos = 8 + IV_LEN;
            let length = u32::from_be_bytes(bytes[len_pos..len_pos + 4].try_into().unwrap()) as usize;
            let ct_pos = len_pos + 4;
            let total = ct_pos + length + TAG_LEN;
            if bytes.len() < total {
                return None;
            }
            let ciphertext = bytes[ct_pos..ct_pos + length].to_vec();
            let mut tag = [0u8; TAG_LEN];
            tag.copy_from_slice(&bytes[ct_pos + length..total]);
            Some((
                Frame::Framed {
                    seqno,
                    iv,
                    ciphertext,
                    tag,
                    is_final: true,
                },
                total,
            ))
        } else {
            let seqno = first_word;
            let total = 4 + IV_LEN + frame_size as usize + TAG_LEN;
            if bytes.len() < total {
                return None;
            }
            let iv: [u8; IV_LEN] = bytes[4..4 + IV_LEN].try_into().unwrap();
            let ct_pos = 4 + IV_LEN;
            let ciphertext = bytes[ct_pos..ct_pos + frame_size as usize].to_vec();
            let mut tag = [0u8; TAG_LEN];
            tag.copy_from_slice(&bytes[ct_pos + frame_size as usize..total]);
            Some((
                Frame::Framed {
                    seqno,
                    iv,
                    ciphertext,
                    tag,
                    is_final: false,
                },
                total,
            ))
        }
    }

    /// Parse the single unframed-mode record. `Ok(None)` means not enough
    /// bytes yet.
    pub fn parse_unframed(bytes: &[u8]) -> Option<(Frame, usize)> {
        if bytes.len() < IV_LEN + 8 {
            return None;
        }
        let length = u64::from_be_bytes(bytes[IV_LEN..IV_LEN + 8].try_into().unwrap()) as usize;
        let ct_pos = IV_LEN + 8;
        let total = ct_pos + length + TAG_LEN;
        if bytes.len() < total {
            return None;
        }
        let iv: [u8; IV_LEN] = bytes[0..IV_LEN].try_into().unwrap();
        let ciphertext = bytes[ct_pos..ct_pos + length].to_vec();
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&bytes[ct_pos + length..total]);
        Some((Frame::Unframed { iv, ciphertext, tag }, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(is_final: bool, seqno: u32, pt_len: usize) -> Frame {
        Frame::Framed {
            seqno,
            iv: [0x7; IV_LEN],
            ciphertext: vec![0xab; pt_len],
            tag: [0x9; TAG_LEN],
            is_final,
        }
    }

    #[test]
    fn non_final_frame_round_trips_with_fixed_frame_size() {
        let f = frame(false, 1, 16);
        let bytes = f.to_bytes();
        let (parsed, consumed) = Frame::parse_framed(&bytes, 16).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(parsed, f);
    }

    #[test]
    fn final_frame_round_trips_with_shorter_length() {
        let f = frame(true, 2, 15);
        let bytes = f.to_bytes();
        let (parsed, consumed) = Frame::parse_framed(&bytes, 16).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(parsed, f);
    }

    #[test]
    fn final_frame_allows_empty_ciphertext() {
        let f = frame(true, 3, 0);
        let bytes = f.to_bytes();
        let (parsed, _) = Frame::parse_framed(&bytes, 16).unwrap();
        assert_eq!(parsed, f);
    }

    #[test]
    fn framed_parse_needs_more_on_truncation() {
        let f = frame(false, 1, 16);
        let bytes = f.to_bytes();
        for cut in 0..bytes.len() {
            assert!(Frame::parse_framed(&bytes[..cut], 16).is_none(), "cut at {cut}");
        }
    }

    #[test]
    fn unframed_round_trips() {
        let f = Frame::Unframed {
            iv: [0x1; IV_LEN],
            ciphertext: vec![0xcd; 1024],
            tag: [0x2; TAG_LEN],
        };
        let bytes = f.to_bytes();
        let (parsed, consumed) = Frame::parse_unframed(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(parsed, f);
    }

    #[test]
    fn unframed_parse_needs_more_on_truncation() {
        let f = Frame::Unframed {
            iv: [0x1; IV_LEN],
            ciphertext: vec![0xcd; 64],
            tag: [0x2; TAG_LEN],
        };
        let bytes = f.to_bytes();
        for cut in 0..bytes.len() {
            assert!(Frame::parse_unframed(&bytes[..cut]).is_none(), "cut at {cut}");
        }
    }

    #[test]
    fn kind_maps_to_aad_selector() {
        assert_eq!(frame(false, 1, 1).kind(), FrameKind::Frame);
        assert_eq!(frame(true, 1, 1).kind(), FrameKind::Final);
        let unframed = Frame::Unframed {
            iv: [0; IV_LEN],
            ciphertext: vec![],
            tag: [0; TAG_LEN],
        };
        assert_eq!(unframed.kind(), FrameKind::Single);
    }
}
