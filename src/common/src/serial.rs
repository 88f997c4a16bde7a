// Copyright 2022 eau2 authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Length-prefixed binary serialization shared by every over-the-wire
//! type. Values are not self-describing: the outer context decides what
//! to read next. The "machine word" of the wire format is a
//! native-endian `u64`; the cluster is assumed homogeneous.

use byteorder::{ByteOrder, NativeEndian};
use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{SerialError, SerialResult};

/// Growable byte buffer with typed appends.
#[derive(Debug, Default)]
pub struct Serializer {
    buf: BytesMut,
}

impl Serializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(cap),
        }
    }

    /// Appends one machine word.
    pub fn put_u64(&mut self, v: u64) {
        let mut bytes = [0u8; 8];
        NativeEndian::write_u64(&mut bytes, v);
        self.buf.put_slice(&bytes);
    }

    /// Appends a length or count as a machine word.
    pub fn put_usize(&mut self, v: usize) {
        self.put_u64(v as u64);
    }

    pub fn put_i32(&mut self, v: i32) {
        let mut bytes = [0u8; 4];
        NativeEndian::write_i32(&mut bytes, v);
        self.buf.put_slice(&bytes);
    }

    pub fn put_f32(&mut self, v: f32) {
        let mut bytes = [0u8; 4];
        NativeEndian::write_f32(&mut bytes, v);
        self.buf.put_slice(&bytes);
    }

    pub fn put_f64(&mut self, v: f64) {
        let mut bytes = [0u8; 8];
        NativeEndian::write_f64(&mut bytes, v);
        self.buf.put_slice(&bytes);
    }

    pub fn put_bool(&mut self, v: bool) {
        self.buf.put_u8(v as u8);
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn put_raw(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Appends a string as `[length: word][bytes]`, no terminator.
    pub fn put_str(&mut self, s: &str) {
        self.put_usize(s.len());
        self.buf.put_slice(s.as_bytes());
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Cursor over a byte slice. Every read checks bounds; reading past the
/// end is a hard fault at the call site.
#[derive(Debug)]
pub struct Deserializer<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Deserializer<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, need: usize) -> SerialResult<&'a [u8]> {
        if self.remaining() < need {
            return Err(SerialError::UnexpectedEof {
                offset: self.pos,
                need,
                len: self.buf.len(),
            });
        }
        let out = &self.buf[self.pos..self.pos + need];
        self.pos += need;
        Ok(out)
    }

    /// Reads the next machine word without advancing the cursor. Used by
    /// the message dispatcher to branch on the leading kind tag.
    pub fn peek_u64(&self) -> SerialResult<u64> {
        if self.remaining() < 8 {
            return Err(SerialError::UnexpectedEof {
                offset: self.pos,
                need: 8,
                len: self.buf.len(),
            });
        }
        Ok(NativeEndian::read_u64(&self.buf[self.pos..self.pos + 8]))
    }

    pub fn read_u64(&mut self) -> SerialResult<u64> {
        Ok(NativeEndian::read_u64(self.take(8)?))
    }

    pub fn read_usize(&mut self) -> SerialResult<usize> {
        Ok(self.read_u64()? as usize)
    }

    pub fn read_i32(&mut self) -> SerialResult<i32> {
        Ok(NativeEndian::read_i32(self.take(4)?))
    }

    pub fn read_f32(&mut self) -> SerialResult<f32> {
        Ok(NativeEndian::read_f32(self.take(4)?))
    }

    pub fn read_f64(&mut self) -> SerialResult<f64> {
        Ok(NativeEndian::read_f64(self.take(8)?))
    }

    pub fn read_bool(&mut self) -> SerialResult<bool> {
        Ok(self.take(1)?[0] != 0)
    }

    pub fn read_u8(&mut self) -> SerialResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_raw(&mut self, len: usize) -> SerialResult<&'a [u8]> {
        self.take(len)
    }

    pub fn read_str(&mut self) -> SerialResult<String> {
        let len = self.read_usize()?;
        let bytes = self.take(len)?;
        Ok(String::from_utf8(bytes.to_vec())?)
    }
}

/// A type with a wire form. Composites append a type-specific payload;
/// the reader must already know what type it is looking at.
pub trait Serial: Sized {
    fn serialize(&self, ser: &mut Serializer);

    fn deserialize(de: &mut Deserializer<'_>) -> SerialResult<Self>;

    fn to_bytes(&self) -> Bytes {
        let mut ser = Serializer::new();
        self.serialize(&mut ser);
        ser.finish()
    }

    fn from_bytes(bytes: &[u8]) -> SerialResult<Self> {
        let mut de = Deserializer::new(bytes);
        Self::deserialize(&mut de)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_round_trip() {
        let mut ser = Serializer::new();
        ser.put_u64(42);
        ser.put_i32(-7);
        ser.put_f32(2.5);
        ser.put_f64(-0.125);
        ser.put_bool(true);
        ser.put_bool(false);
        ser.put_u8(b'F');
        ser.put_str("hello world");
        let bytes = ser.finish();

        let mut de = Deserializer::new(&bytes);
        assert_eq!(de.read_u64().unwrap(), 42);
        assert_eq!(de.read_i32().unwrap(), -7);
        assert_eq!(de.read_f32().unwrap(), 2.5);
        assert_eq!(de.read_f64().unwrap(), -0.125);
        assert!(de.read_bool().unwrap());
        assert!(!de.read_bool().unwrap());
        assert_eq!(de.read_u8().unwrap(), b'F');
        assert_eq!(de.read_str().unwrap(), "hello world");
        assert!(de.is_exhausted());
    }

    #[test]
    fn test_peek_does_not_advance() {
        let mut ser = Serializer::new();
        ser.put_u64(99);
        ser.put_u64(100);
        let bytes = ser.finish();

        let mut de = Deserializer::new(&bytes);
        assert_eq!(de.peek_u64().unwrap(), 99);
        assert_eq!(de.peek_u64().unwrap(), 99);
        assert_eq!(de.read_u64().unwrap(), 99);
        assert_eq!(de.read_u64().unwrap(), 100);
    }

    #[test]
    fn test_read_past_end() {
        let mut ser = Serializer::new();
        ser.put_i32(1);
        let bytes = ser.finish();

        let mut de = Deserializer::new(&bytes);
        de.read_i32().unwrap();
        assert!(matches!(
            de.read_u64(),
            Err(SerialError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_empty_string() {
        let mut ser = Serializer::new();
        ser.put_str("");
        let bytes = ser.finish();
        assert_eq!(bytes.len(), 8);

        let mut de = Deserializer::new(&bytes);
        assert_eq!(de.read_str().unwrap(), "");
    }
}
