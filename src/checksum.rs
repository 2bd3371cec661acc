//! CRC-16 frame checksum
//!
//! Every unit on the wire is `payload || crc16_be(payload)`. The algorithm is
//! CRC-16/CCITT-FALSE: initial register 0xFFFF, polynomial 0x1021, MSB first,
//! no reflection and no final XOR (`CRC_16_IBM_3740` in the `crc` crate).

use crc::{Crc, CRC_16_IBM_3740};

/// Checksum trailer length in bytes
pub const CHECKSUM_LEN: usize = 2;

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Compute the checksum of `bytes`
pub fn compute(bytes: &[u8]) -> u16 {
    CRC16.checksum(bytes)
}

/// Append the big-endian checksum of `bytes`
pub fn frame(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + CHECKSUM_LEN);
    out.extend_from_slice(bytes);
    out.extend_from_slice(&compute(bytes).to_be_bytes());
    out
}

/// Result of splitting a frame into payload and trailer
///
/// A mismatch is reported through `ok`, never raised; the caller decides
/// what a corrupted frame means for the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unframed<'a> {
    pub payload: &'a [u8],
    pub ok: bool,
    /// Checksum carried by the frame
    pub received: u16,
    /// Checksum recomputed over `payload`
    pub computed: u16,
}

/// Split `bytes` into `expected_len` payload bytes and a verified trailer
///
/// Input shorter than `expected_len + CHECKSUM_LEN` is reported as not ok
/// with whatever payload bytes were present.
pub fn unframe(bytes: &[u8], expected_len: usize) -> Unframed<'_> {
    if bytes.len() < expected_len + CHECKSUM_LEN {
        let payload = &bytes[..bytes.len().min(expected_len)];
        let computed = compute(payload);
        return Unframed {
            payload,
            ok: false,
            received: 0,
            computed,
        };
    }

    let payload = &bytes[..expected_len];
    let received = u16::from_be_bytes([bytes[expected_len], bytes[expected_len + 1]]);
    let computed = compute(payload);
    Unframed {
        payload,
        ok: received == computed,
        received,
        computed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_value() {
        // Standard CRC-16/CCITT-FALSE check input
        assert_eq!(compute(b"123456789"), 0x29B1);
        assert_eq!(compute(b""), 0xFFFF);
    }

    #[test]
    fn test_frame_appends_big_endian_trailer() {
        let framed = frame(b"123456789");
        assert_eq!(framed.len(), 11);
        assert_eq!(&framed[9..], &[0x29, 0xB1]);
    }

    #[test]
    fn test_round_trip() {
        let inputs: [&[u8]; 4] = [b"", b"a", b"hello relay", &[0u8; 1043]];
        for input in inputs {
            let framed = frame(input);
            let unframed = unframe(&framed, input.len());
            assert!(unframed.ok);
            assert_eq!(unframed.payload, input);
        }
    }

    #[test]
    fn test_single_bit_flip_detected() {
        let payload: Vec<u8> = (0..64u8).collect();
        let framed = frame(&payload);

        for bit in 0..framed.len() * 8 {
            let mut corrupted = framed.clone();
            corrupted[bit / 8] ^= 1 << (bit % 8);
            let unframed = unframe(&corrupted, payload.len());
            assert!(!unframed.ok, "bit {} flip went undetected", bit);
        }
    }

    #[test]
    fn test_short_input_not_ok() {
        let framed = frame(b"abcd");
        let unframed = unframe(&framed[..4], 4);
        assert!(!unframed.ok);
        assert_eq!(unframed.payload, b"abcd");
    }
}
