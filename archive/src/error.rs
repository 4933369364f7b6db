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

use std::error;
use std::fmt;

/// Failure while decoding a binary blob.
///
/// Every variant carries the byte offset at which the cursor stood when the
/// error was raised, so callers can point into a hex dump of the blob.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum DecodeError {
    /// The blob ended before the requested number of bytes could be read.
    ShortRead {
        offset: usize,
        wanted: usize,
        remaining: usize,
    },
    /// A LEB128 value ran over the width of the target integer.
    LebOverflow {
        offset: usize,
        bits: u32,
    },
    /// A length prefix exceeds the number of bytes left in the blob.
    LengthOutOfBounds {
        offset: usize,
        length: u64,
        remaining: usize,
    },
    /// A string was not valid UTF-8.
    InvalidUtf8 {
        offset: usize,
    },
    /// A discriminant byte does not name any known variant.
    UnknownDiscriminant {
        offset: usize,
        what: &'static str,
        value: u8,
    },
    /// The blob decoded cleanly but left trailing bytes.
    TrailingBytes {
        offset: usize,
        remaining: usize,
    },
}

impl DecodeError {
    /// The byte offset the cursor stood at when the error was raised.
    pub fn offset(&self) -> usize {
        match self {
            Self::ShortRead { offset, .. }
            | Self::LebOverflow { offset, .. }
            | Self::LengthOutOfBounds { offset, .. }
            | Self::InvalidUtf8 { offset }
            | Self::UnknownDiscriminant { offset, .. }
            | Self::TrailingBytes { offset, .. } => *offset,
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShortRead {
                offset,
                wanted,
                remaining,
            } => {
                write!(
                    f,
                    "short read at offset {offset}: wanted {wanted} byte(s), {remaining} left"
                )
            }
            Self::LebOverflow { offset, bits } => {
                write!(f, "LEB128 value at offset {offset} overflows {bits} bits")
            }
            Self::LengthOutOfBounds {
                offset,
                length,
                remaining,
            } => {
                write!(
                    f,
                    "length prefix {length} at offset {offset} exceeds the {remaining} byte(s) left"
                )
            }
            Self::InvalidUtf8 { offset } => {
                write!(f, "string at offset {offset} is not valid UTF-8")
            }
            Self::UnknownDiscriminant {
                offset,
                what,
                value,
            } => {
                write!(
                    f,
                    "unknown {what} discriminant 0x{value:02x} at offset {offset}"
                )
            }
            Self::TrailingBytes { offset, remaining } => {
                write!(f, "{remaining} trailing byte(s) after offset {offset}")
            }
        }
    }
}

impl error::Error for DecodeError {}
