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

//! Byte-level framing for aeronautical data repository blobs.
//!
//! Everything is little-endian: fixed-width integers are two's complement,
//! floats are the bit pattern of the same-width unsigned integer, strings
//! and containers are prefixed by a ULEB128 length, and signed LEB128
//! follows the sign-extension convention (a final byte with bit 6 set
//! extends with one-bits).
//!
//! The framing is a versioned on-disk contract shared with the SQL store
//! and the snapshot file; changing any of it breaks every previously
//! written database.
//!
//! # Examples
//!
//! ```
//! use adr_archive::{ByteReader, ByteWriter};
//!
//! let mut wr = ByteWriter::new();
//! wr.write_string("LSGG");
//! wr.write_leb64(-1411);
//!
//! let blob = wr.into_vec();
//! let mut rd = ByteReader::new(&blob);
//! assert_eq!(rd.read_string().unwrap(), "LSGG");
//! assert_eq!(rd.read_leb64().unwrap(), -1411);
//! assert!(rd.expect_end().is_ok());
//! ```

mod error;
mod reader;
mod writer;

pub use error::DecodeError;
pub use reader::ByteReader;
pub use writer::ByteWriter;

/// Renders a blob as a space-separated hex string for error reports.
pub fn hexdump(data: &[u8]) -> String {
    let mut s = String::with_capacity(data.len() * 3);
    for (i, b) in data.iter().enumerate() {
        if i > 0 {
            s.push(' ');
        }
        s.push_str(&format!("{b:02x}"));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hexdump_format() {
        assert_eq!(hexdump(&[0x00, 0x1f, 0xff]), "00 1f ff");
        assert_eq!(hexdump(&[]), "");
    }
}
