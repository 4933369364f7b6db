// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Joe Pearson
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

/// Append-only encoder producing the little-endian framing.
///
/// The writer is infallible; the finished blob is taken with
/// [`ByteWriter::into_vec`].
#[derive(Clone, Debug, Default)]
pub struct ByteWriter {
    data: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.data.push(v);
    }

    pub fn write_i8(&mut self, v: i8) {
        self.write_u8(v as u8);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_i16(&mut self, v: i16) {
        self.write_u16(v as u16);
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.write_u32(v as u32);
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_i64(&mut self, v: i64) {
        self.write_u64(v as u64);
    }

    pub fn write_f32(&mut self, v: f32) {
        self.write_u32(v.to_bits());
    }

    pub fn write_f64(&mut self, v: f64) {
        self.write_u64(v.to_bits());
    }

    pub fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    pub fn write_uleb64(&mut self, mut v: u64) {
        loop {
            let mut b = (v & 0x7f) as u8;
            v >>= 7;
            if v != 0 {
                b |= 0x80;
            }
            self.data.push(b);
            if v == 0 {
                return;
            }
        }
    }

    pub fn write_uleb32(&mut self, v: u32) {
        self.write_uleb64(u64::from(v));
    }

    /// Signed LEB128: the final byte's bit 6 tells the reader to extend
    /// with one-bits.
    pub fn write_leb64(&mut self, mut v: i64) {
        loop {
            let b = (v & 0x7f) as u8;
            v >>= 7;
            let done = (v == 0 && b & 0x40 == 0) || (v == -1 && b & 0x40 != 0);
            self.data.push(if done { b } else { b | 0x80 });
            if done {
                return;
            }
        }
    }

    pub fn write_leb32(&mut self, v: i32) {
        self.write_leb64(i64::from(v));
    }

    pub fn write_string(&mut self, v: &str) {
        self.write_uleb64(v.len() as u64);
        self.write_bytes(v.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::ByteReader;

    #[test]
    fn uleb_single_byte_values() {
        for v in [0u64, 1, 0x7f] {
            let mut wr = ByteWriter::new();
            wr.write_uleb64(v);
            assert_eq!(wr.len(), 1, "{v} should fit one byte");
        }
    }

    #[test]
    fn uleb_round_trip() {
        for v in [
            0u64,
            1,
            0x7f,
            0x80,
            624485,
            u64::from(u32::MAX),
            u64::MAX,
        ] {
            let mut wr = ByteWriter::new();
            wr.write_uleb64(v);
            let mut rd = ByteReader::new(wr.as_slice());
            assert_eq!(rd.read_uleb64().unwrap(), v);
            assert!(rd.is_empty());
        }
    }

    #[test]
    fn leb_round_trip() {
        for v in [0i64, 1, -1, 63, 64, -64, -65, 624485, -624485, i64::MIN, i64::MAX] {
            let mut wr = ByteWriter::new();
            wr.write_leb64(v);
            let mut rd = ByteReader::new(wr.as_slice());
            assert_eq!(rd.read_leb64().unwrap(), v, "value {v}");
            assert!(rd.is_empty());
        }
    }

    #[test]
    fn string_framing() {
        let mut wr = ByteWriter::new();
        wr.write_string("LSGG");
        assert_eq!(wr.as_slice(), &[4, b'L', b'S', b'G', b'G']);
    }

    #[test]
    fn truncation_always_fails() {
        let mut wr = ByteWriter::new();
        wr.write_u32(0xdead_beef);
        wr.write_string("DITON");
        wr.write_leb64(-12345);
        let blob = wr.into_vec();
        for cut in 0..blob.len() {
            let mut rd = ByteReader::new(&blob[..cut]);
            let ok = (|| {
                rd.read_u32()?;
                rd.read_string()?;
                rd.read_leb64()?;
                Ok::<(), crate::DecodeError>(())
            })();
            assert!(ok.is_err(), "truncation to {cut} bytes must fail");
        }
    }
}
