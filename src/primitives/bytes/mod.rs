//! Encoding, varint, and cursor utilities shared by the key and row codecs.

pub mod ord {
    //! Order-preserving encoders for fixed-width numeric key components.

    const U64_LEN: usize = core::mem::size_of::<u64>();
    const SIGN_BIT: u64 = 1 << 63;

    /// Encoded form of a NaN float; collides with the encoding of the largest NaN payload.
    pub const NAN_BYTES: [u8; U64_LEN] = [0xFF; U64_LEN];

    /// Big-endian encoding for lexicographic order preservation.
    pub fn put_u64_be(dst: &mut [u8], v: u64) {
        assert!(dst.len() >= U64_LEN, "destination too small");
        dst[..U64_LEN].copy_from_slice(&v.to_be_bytes());
    }

    /// Decodes a u64 from big-endian byte order.
    pub fn get_u64_be(src: &[u8]) -> u64 {
        let head = src
            .get(..U64_LEN)
            .unwrap_or_else(|| panic!("u64 source shorter than 8 bytes (have {})", src.len()));
        let mut bytes = [0u8; U64_LEN];
        bytes.copy_from_slice(head);
        u64::from_be_bytes(bytes)
    }

    /// Encodes a signed i64 with order preservation (flip sign bit for sorting).
    pub fn put_i64_be(dst: &mut [u8], v: i64) {
        let flipped = (v as u64) ^ SIGN_BIT;
        put_u64_be(dst, flipped);
    }

    /// Decodes a signed i64 with order preservation.
    pub fn get_i64_be(src: &[u8]) -> i64 {
        let flipped = get_u64_be(src);
        (flipped ^ SIGN_BIT) as i64
    }

    /// Encodes an f64 with order preservation. Every NaN maps to [`NAN_BYTES`].
    pub fn put_f64_be(dst: &mut [u8], v: f64) {
        if v.is_nan() {
            dst[..U64_LEN].copy_from_slice(&NAN_BYTES);
            return;
        }
        put_u64_be(dst, encode_f64_bits(v));
    }

    /// Decodes an f64 with order preservation; [`NAN_BYTES`] decodes to NaN.
    pub fn get_f64_be(src: &[u8]) -> f64 {
        let bits = get_u64_be(src);
        if bits == u64::MAX {
            return f64::NAN;
        }
        f64::from_bits(decode_f64_bits(bits))
    }

    /// Writes a big-endian u32.
    pub fn put_u32_be(dst: &mut [u8], v: u32) {
        dst[..4].copy_from_slice(&v.to_be_bytes());
    }

    /// Reads a big-endian u32.
    pub fn get_u32_be(src: &[u8]) -> u32 {
        let bytes: [u8; 4] = src[..4]
            .try_into()
            .unwrap_or_else(|_| panic!("u32 source shorter than 4 bytes (have {})", src.len()));
        u32::from_be_bytes(bytes)
    }

    /// Encodes a signed i16 with order preservation (sign bit flipped).
    pub fn put_i16_be(dst: &mut [u8], v: i16) {
        dst[..2].copy_from_slice(&((v as u16) ^ 0x8000).to_be_bytes());
    }

    /// Decodes a signed i16 written by [`put_i16_be`].
    pub fn get_i16_be(src: &[u8]) -> i16 {
        (u16::from_be_bytes([src[0], src[1]]) ^ 0x8000) as i16
    }

    fn encode_f64_bits(v: f64) -> u64 {
        let bits = v.to_bits();
        if bits & SIGN_BIT != 0 {
            !bits
        } else {
            bits ^ SIGN_BIT
        }
    }

    fn decode_f64_bits(encoded: u64) -> u64 {
        if encoded & SIGN_BIT != 0 {
            encoded ^ SIGN_BIT
        } else {
            !encoded
        }
    }
}

pub mod var {
    //! Unsigned varints and ZigZag signed integers.

    use crate::error::{LookupError, Result};

    /// Encodes a u64 as an unsigned varint.
    pub fn encode_u64(mut v: u64, out: &mut Vec<u8>) {
        loop {
            let byte = (v & 0x7f) as u8;
            v >>= 7;
            if v == 0 {
                out.push(byte);
                break;
            }
            out.push(byte | 0x80);
        }
    }

    /// Decodes a u64 varint from a slice, updating the offset.
    pub fn decode_u64(src: &[u8], off: &mut usize) -> Result<u64> {
        let mut result = 0u64;
        let mut shift = 0u32;
        for i in 0..10 {
            let byte = *src
                .get(*off)
                .ok_or(LookupError::Corruption("varint decode truncated"))?;
            *off += 1;
            let payload = (byte & 0x7f) as u64;
            if i == 9 && payload > 1 {
                return Err(LookupError::Corruption("varint overflow"));
            }
            result |= payload << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
        Err(LookupError::Corruption("varint too long"))
    }

    /// Encodes an i64 as a ZigZag-encoded varint.
    pub fn encode_i64(v: i64, out: &mut Vec<u8>) {
        let zigzag = ((v << 1) ^ (v >> 63)) as u64;
        encode_u64(zigzag, out);
    }

    /// Decodes a ZigZag-encoded i64 varint from a slice, updating the offset.
    pub fn decode_i64(src: &[u8], off: &mut usize) -> Result<i64> {
        let zigzag = decode_u64(src, off)?;
        Ok(((zigzag >> 1) as i64) ^ (-((zigzag & 1) as i64)))
    }
}

pub mod buf {
    //! A slice-backed cursor for fallible parsing of stored records.

    use core::fmt;

    use crate::error::{LookupError, Result};

    /// A cursor for reading bytes from a slice with offset tracking.
    pub struct Cursor<'a> {
        /// The underlying byte slice.
        pub buf: &'a [u8],
        /// Current read offset.
        pub off: usize,
    }

    impl<'a> Cursor<'a> {
        /// Creates a new cursor starting at offset 0.
        pub fn new(buf: &'a [u8]) -> Self {
            Self { buf, off: 0 }
        }

        /// Takes the next `n` bytes from the cursor, advancing the offset.
        pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
            let end = self
                .off
                .checked_add(n)
                .filter(|end| *end <= self.buf.len())
                .ok_or(LookupError::Corruption("record truncated"))?;
            let slice = &self.buf[self.off..end];
            self.off = end;
            Ok(slice)
        }

        /// Reads one byte.
        pub fn byte(&mut self) -> Result<u8> {
            Ok(self.take(1)?[0])
        }

        /// Reads an unsigned varint.
        pub fn var_u64(&mut self) -> Result<u64> {
            super::var::decode_u64(self.buf, &mut self.off)
        }

        /// Reads a ZigZag varint.
        pub fn var_i64(&mut self) -> Result<i64> {
            super::var::decode_i64(self.buf, &mut self.off)
        }

        /// Returns the number of bytes remaining in the buffer.
        pub fn remaining(&self) -> usize {
            self.buf.len().saturating_sub(self.off)
        }
    }

    impl<'a> fmt::Debug for Cursor<'a> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("Cursor")
                .field("off", &self.off)
                .field("remaining", &self.remaining())
                .finish()
        }
    }
}
