// model = "claude-opus-4-5"
// created = "2026-10-19"
// modified = "2026-10-19"
// driver = "Isaac Clayton"

//! Low-level binary encoding shared by updates and state vectors.
//!
//! Integers are unsigned LEB128 varints (signed ones are zig-zag encoded
//! first), strings and byte strings are length prefixed, floats are 8 bytes
//! little-endian. The decoder never trusts a length prefix for allocation:
//! every read is checked against the remaining input.

use crate::error::DecodeError;

/// An append-only byte encoder.
#[derive(Clone, Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Encoder {
        return Encoder { buf: Vec::new() };
    }

    #[inline]
    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_var_u64(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.buf.push((value as u8) | 0x80);
            value >>= 7;
        }
        self.buf.push(value as u8);
    }

    #[inline]
    pub fn write_var_u32(&mut self, value: u32) {
        self.write_var_u64(value as u64);
    }

    pub fn write_var_i64(&mut self, value: i64) {
        let zigzag = ((value << 1) ^ (value >> 63)) as u64;
        self.write_var_u64(zigzag);
    }

    pub fn write_f64(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_var_u64(bytes.len() as u64);
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_string(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
    }

    pub fn into_bytes(self) -> Vec<u8> {
        return self.buf;
    }
}

/// A bounds-checked cursor over an input buffer.
#[derive(Clone, Debug)]
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Decoder<'a> {
        return Decoder { buf, pos: 0 };
    }

    /// Bytes left to read.
    #[inline]
    pub fn remaining(&self) -> usize {
        return self.buf.len() - self.pos;
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let byte = *self.buf.get(self.pos).ok_or(DecodeError::UnexpectedEnd(self.pos))?;
        self.pos += 1;
        return Ok(byte);
    }

    pub fn read_var_u64(&mut self) -> Result<u64, DecodeError> {
        let start = self.pos;
        let mut value: u64 = 0;
        let mut shift = 0u32;
        loop {
            let byte = self.read_u8()?;
            let bits = (byte & 0x7f) as u64;
            if shift == 63 && bits > 1 {
                return Err(DecodeError::VarIntOverflow(start));
            }
            value |= bits << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
            if shift > 63 {
                return Err(DecodeError::VarIntOverflow(start));
            }
        }
    }

    pub fn read_var_u32(&mut self) -> Result<u32, DecodeError> {
        let start = self.pos;
        let value = self.read_var_u64()?;
        return u32::try_from(value).map_err(|_| DecodeError::VarIntOverflow(start));
    }

    pub fn read_var_i64(&mut self) -> Result<i64, DecodeError> {
        let zigzag = self.read_var_u64()?;
        return Ok(((zigzag >> 1) as i64) ^ -((zigzag & 1) as i64));
    }

    pub fn read_f64(&mut self) -> Result<f64, DecodeError> {
        let raw = self.read_exact(8)?;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(raw);
        return Ok(f64::from_le_bytes(bytes));
    }

    pub fn read_bytes(&mut self) -> Result<&'a [u8], DecodeError> {
        let start = self.pos;
        let len = self.read_var_u64()?;
        if len > self.remaining() as u64 {
            return Err(DecodeError::UnexpectedEnd(start));
        }
        return self.read_exact(len as usize);
    }

    pub fn read_string(&mut self) -> Result<&'a str, DecodeError> {
        let start = self.pos;
        let bytes = self.read_bytes()?;
        return std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8(start));
    }

    /// Fail unless the whole input has been consumed.
    pub fn finish(&self) -> Result<(), DecodeError> {
        if self.remaining() > 0 {
            return Err(DecodeError::TrailingBytes(self.remaining()));
        }
        return Ok(());
    }

    fn read_exact(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if len > self.remaining() {
            return Err(DecodeError::UnexpectedEnd(self.buf.len()));
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        return Ok(slice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_boundaries() {
        for value in [0u64, 1, 127, 128, 300, 16_383, 16_384, u32::MAX as u64, u64::MAX] {
            let mut enc = Encoder::new();
            enc.write_var_u64(value);
            let bytes = enc.into_bytes();
            let mut dec = Decoder::new(&bytes);
            assert_eq!(dec.read_var_u64().unwrap(), value);
            dec.finish().unwrap();
        }
    }

    #[test]
    fn small_varints_take_one_byte() {
        let mut enc = Encoder::new();
        enc.write_var_u32(127);
        assert_eq!(enc.into_bytes(), vec![127]);
    }

    #[test]
    fn zigzag_signed() {
        let mut enc = Encoder::new();
        for value in [0i64, -1, 1, -64, 64, i64::MIN, i64::MAX] {
            enc.write_var_i64(value);
        }
        let bytes = enc.into_bytes();
        let mut dec = Decoder::new(&bytes);
        for value in [0i64, -1, 1, -64, 64, i64::MIN, i64::MAX] {
            assert_eq!(dec.read_var_i64().unwrap(), value);
        }
    }

    #[test]
    fn truncated_varint_is_an_error() {
        let mut dec = Decoder::new(&[0x80, 0x80]);
        assert_eq!(dec.read_var_u64(), Err(DecodeError::UnexpectedEnd(2)));
    }

    #[test]
    fn overlong_varint_is_an_error() {
        let bytes = [0xff; 11];
        let mut dec = Decoder::new(&bytes);
        assert_eq!(dec.read_var_u64(), Err(DecodeError::VarIntOverflow(0)));
    }

    #[test]
    fn u32_overflow_is_an_error() {
        let mut enc = Encoder::new();
        enc.write_var_u64(u32::MAX as u64 + 1);
        let bytes = enc.into_bytes();
        let mut dec = Decoder::new(&bytes);
        assert_eq!(dec.read_var_u32(), Err(DecodeError::VarIntOverflow(0)));
    }

    #[test]
    fn string_length_beyond_input() {
        // Claims 10 bytes, provides 2.
        let mut dec = Decoder::new(&[10, b'h', b'i']);
        assert_eq!(dec.read_string(), Err(DecodeError::UnexpectedEnd(0)));
    }

    #[test]
    fn invalid_utf8() {
        let mut dec = Decoder::new(&[2, 0xc3, 0x28]);
        assert_eq!(dec.read_string(), Err(DecodeError::InvalidUtf8(0)));
    }

    #[test]
    fn trailing_bytes() {
        let mut dec = Decoder::new(&[1, 2]);
        dec.read_u8().unwrap();
        assert_eq!(dec.finish(), Err(DecodeError::TrailingBytes(1)));
    }
}
