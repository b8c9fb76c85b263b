// gore_server/server/src/network/codec.rs
//! Bit-level packet codec. Bits are packed most-significant first.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("unexpected end of packet: needed {needed} bits, {remaining} left")]
    UnexpectedEof { needed: u32, remaining: usize },

    #[error("compact integer longer than 5 groups")]
    CompactOverflow,

    #[error("string of {len} bytes exceeds limit of {max}")]
    StringTooLong { len: usize, max: usize },

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("invalid {kind} value {value}")]
    InvalidEnumValue { kind: &'static str, value: u32 },

    #[error("empty packet")]
    Empty,
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Enumerations with a fixed-width wire form.
pub trait WireEnum: Sized + Copy {
    const BITS: u32;
    const NAME: &'static str;
    fn to_wire(self) -> u32;
    fn from_wire(value: u32) -> Option<Self>;
}

#[derive(Debug, Default, Clone)]
pub struct BitWriter {
    buf: Vec<u8>,
    bit_len: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bytes: usize) -> Self {
        BitWriter { buf: Vec::with_capacity(bytes), bit_len: 0 }
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Writes the low `bits` bits of `value`.
    pub fn write_bits(&mut self, value: u32, bits: u32) {
        debug_assert!(bits <= 32);
        for i in (0..bits).rev() {
            let bit = (value >> i) & 1;
            let byte_idx = self.bit_len / 8;
            if byte_idx == self.buf.len() {
                self.buf.push(0);
            }
            if bit == 1 {
                self.buf[byte_idx] |= 0x80 >> (self.bit_len % 8);
            }
            self.bit_len += 1;
        }
    }

    pub fn write_bool(&mut self, v: bool) {
        self.write_bits(v as u32, 1);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.write_bits(v as u32, 8);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.write_bits(v as u32, 16);
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write_bits(v, 32);
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write_u32((v >> 32) as u32);
        self.write_u32(v as u32);
    }

    pub fn write_i32(&mut self, v: i32) {
        self.write_bits(v as u32, 32);
    }

    pub fn write_f32(&mut self, v: f32) {
        self.write_bits(v.to_bits(), 32);
    }

    /// 7 bits per group, high bit set while more groups follow.
    pub fn write_compact_u32(&mut self, mut v: u32) {
        loop {
            let group = v & 0x7f;
            v >>= 7;
            if v == 0 {
                self.write_bits(group, 8);
                return;
            }
            self.write_bits(group | 0x80, 8);
        }
    }

    pub fn write_string(&mut self, s: &str) {
        self.write_compact_u32(s.len() as u32);
        for b in s.bytes() {
            self.write_u8(b);
        }
    }

    pub fn write_enum<E: WireEnum>(&mut self, e: E) {
        self.write_bits(e.to_wire(), E::BITS);
    }

    /// Final buffer; the last byte is zero-padded.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

pub struct BitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        BitReader { data, bit_pos: 0 }
    }

    pub fn remaining_bits(&self) -> usize {
        (self.data.len() * 8).saturating_sub(self.bit_pos)
    }

    pub fn read_bits(&mut self, bits: u32) -> CodecResult<u32> {
        debug_assert!(bits <= 32);
        if self.remaining_bits() < bits as usize {
            return Err(CodecError::UnexpectedEof { needed: bits, remaining: self.remaining_bits() });
        }
        let mut v: u32 = 0;
        for _ in 0..bits {
            let byte = self.data[self.bit_pos / 8];
            let bit = (byte >> (7 - (self.bit_pos % 8))) & 1;
            v = (v << 1) | bit as u32;
            self.bit_pos += 1;
        }
        Ok(v)
    }

    pub fn read_bool(&mut self) -> CodecResult<bool> {
        Ok(self.read_bits(1)? == 1)
    }

    pub fn read_u8(&mut self) -> CodecResult<u8> {
        Ok(self.read_bits(8)? as u8)
    }

    pub fn read_u16(&mut self) -> CodecResult<u16> {
        Ok(self.read_bits(16)? as u16)
    }

    pub fn read_u32(&mut self) -> CodecResult<u32> {
        self.read_bits(32)
    }

    pub fn read_u64(&mut self) -> CodecResult<u64> {
        let hi = self.read_u32()? as u64;
        let lo = self.read_u32()? as u64;
        Ok((hi << 32) | lo)
    }

    pub fn read_i32(&mut self) -> CodecResult<i32> {
        Ok(self.read_bits(32)? as i32)
    }

    pub fn read_f32(&mut self) -> CodecResult<f32> {
        Ok(f32::from_bits(self.read_bits(32)?))
    }

    pub fn read_compact_u32(&mut self) -> CodecResult<u32> {
        let mut v: u64 = 0;
        for i in 0..5 {
            let group = self.read_bits(8)?;
            v |= ((group & 0x7f) as u64) << (7 * i);
            if group & 0x80 == 0 {
                return u32::try_from(v).map_err(|_| CodecError::CompactOverflow);
            }
        }
        Err(CodecError::CompactOverflow)
    }

    pub fn read_string(&mut self, max_len: usize) -> CodecResult<String> {
        let len = self.read_compact_u32()? as usize;
        if len > max_len {
            return Err(CodecError::StringTooLong { len, max: max_len });
        }
        if self.remaining_bits() < len * 8 {
            return Err(CodecError::UnexpectedEof { needed: (len * 8) as u32, remaining: self.remaining_bits() });
        }
        let mut bytes = Vec::with_capacity(len);
        for _ in 0..len {
            bytes.push(self.read_u8()?);
        }
        String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)
    }

    pub fn read_enum<E: WireEnum>(&mut self) -> CodecResult<E> {
        let value = self.read_bits(E::BITS)?;
        E::from_wire(value).ok_or(CodecError::InvalidEnumValue { kind: E::NAME, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn fields_share_bytes() {
        let mut w = BitWriter::new();
        w.write_bool(true);
        w.write_bits(0b101, 3);
        w.write_u8(0xff);
        assert_eq!(w.bit_len(), 12);
        let bytes = w.into_bytes();
        assert_eq!(bytes, vec![0b1101_1111, 0b1111_0000]);

        let mut r = BitReader::new(&bytes);
        assert!(r.read_bool().unwrap());
        assert_eq!(r.read_bits(3).unwrap(), 0b101);
        assert_eq!(r.read_u8().unwrap(), 0xff);
        assert_eq!(r.remaining_bits(), 4);
    }

    #[test]
    fn truncated_input_is_an_error_not_a_panic() {
        let mut r = BitReader::new(&[0xAB]);
        assert_eq!(r.read_u16(), Err(CodecError::UnexpectedEof { needed: 16, remaining: 8 }));
    }

    #[test]
    fn string_length_is_checked_before_reading() {
        let mut w = BitWriter::new();
        w.write_string("hello world");
        let bytes = w.into_bytes();
        assert_eq!(
            BitReader::new(&bytes).read_string(5),
            Err(CodecError::StringTooLong { len: 11, max: 5 })
        );
        assert_eq!(BitReader::new(&bytes).read_string(64).unwrap(), "hello world");
    }

    #[test]
    fn overlong_compact_integer_is_rejected() {
        let bytes = [0xff, 0xff, 0xff, 0xff, 0xff, 0x01];
        assert_eq!(BitReader::new(&bytes).read_compact_u32(), Err(CodecError::CompactOverflow));
        let too_big = [0xff, 0xff, 0xff, 0xff, 0x7f];
        assert_eq!(BitReader::new(&too_big).read_compact_u32(), Err(CodecError::CompactOverflow));
    }

    proptest! {
        #[test]
        fn compact_u32_survives_any_bit_alignment(v in any::<u32>(), shift in 0u32..8) {
            let mut w = BitWriter::new();
            w.write_bits(0, shift);
            w.write_compact_u32(v);
            let bytes = w.into_bytes();
            let mut r = BitReader::new(&bytes);
            r.read_bits(shift).unwrap();
            prop_assert_eq!(r.read_compact_u32().unwrap(), v);
            prop_assert!(bytes.len() <= 6);
        }
    }
}
