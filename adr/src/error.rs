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

use adr_archive::DecodeError;

use crate::id::Uuid;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the repository.
#[derive(Debug)]
pub enum Error {
    /// A blob could not be decoded. Carries the failing object's UUID when
    /// known and a hex dump of the blob.
    Decode {
        uuid: Option<Uuid>,
        source: DecodeError,
        blob: String,
    },
    /// The SQLite schema could not be created or opened.
    Schema(rusqlite::Error),
    /// Any other SQLite failure.
    Sql(rusqlite::Error),
    /// An explicit link resolution request found no object for the UUID.
    LinkUnresolved(Uuid),
    /// An object of one kind was asked to carry a slice of another.
    SliceKindMismatch {
        uuid: Uuid,
    },
    /// Filesystem failure on the snapshot file.
    Io(std::io::Error),
    /// The snapshot file does not carry the expected signature.
    SnapshotSignature,
    /// The snapshot directory or a body extent lies outside the file.
    SnapshotBounds {
        offset: u64,
        len: u64,
        filesize: u64,
    },
}

impl Error {
    pub(crate) fn decode(uuid: Option<Uuid>, source: DecodeError, blob: &[u8]) -> Self {
        Self::Decode {
            uuid,
            source,
            blob: adr_archive::hexdump(blob),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode { uuid, source, blob } => {
                match uuid {
                    Some(uuid) => write!(f, "{source}; object {uuid}; blob {blob}"),
                    None => write!(f, "{source}; blob {blob}"),
                }
            }
            Self::Schema(e) => write!(f, "schema error: {e}"),
            Self::Sql(e) => write!(f, "sql error: {e}"),
            Self::LinkUnresolved(uuid) => write!(f, "unresolved link {uuid}"),
            Self::SliceKindMismatch { uuid } => {
                write!(f, "object {uuid} carries a slice of a foreign kind")
            }
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::SnapshotSignature => write!(f, "snapshot file signature mismatch"),
            Self::SnapshotBounds {
                offset,
                len,
                filesize,
            } => {
                write!(
                    f,
                    "snapshot extent {offset}+{len} outside file of {filesize} byte(s)"
                )
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Decode { source, .. } => Some(source),
            Self::Schema(e) | Self::Sql(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Self::Sql(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
