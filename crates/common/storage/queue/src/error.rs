// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::PathBuf;

use snafu::{OptionExt, Snafu};

/// Queue operation errors.
///
/// An empty queue is not an error: `pop` and `peek` return `Ok(None)`.
#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum QueueError {
    /// The item cannot be framed as a stored record.
    #[snafu(display("Invalid item: {len} bytes does not fit a 4-byte record length"))]
    InvalidItemType {
        len: usize,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    /// Filesystem I/O failure.
    #[snafu(transparent)]
    Io {
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    /// Table store failure.
    #[snafu(transparent)]
    Sqlite {
        source: rusqlite::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    /// `info.json` exists but cannot be decoded.
    #[snafu(display("Corrupted queue metadata at {}", path.display()))]
    MetadataCorrupted {
        path:   PathBuf,
        source: serde_json::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    /// `info.json` decodes but describes an impossible queue state.
    #[snafu(display("Invalid queue metadata at {}: {reason}", path.display()))]
    InvalidMetadata {
        path:   PathBuf,
        reason: String,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    /// Failed to encode `info.json`.
    #[snafu(display("Failed to encode queue metadata for {}", path.display()))]
    MetadataEncode {
        path:   PathBuf,
        source: serde_json::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    /// A chunk file disagrees with the persisted cursor or ends mid-record.
    #[snafu(display("Corrupted chunk file {}: {reason}", path.display()))]
    CorruptedChunk {
        path:   PathBuf,
        reason: String,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    /// A stack file is shorter than its header or ends mid-record.
    #[snafu(display("Corrupted stack file {}: {reason}", path.display()))]
    CorruptedStack {
        path:   PathBuf,
        reason: String,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    /// The stack header cannot count another item.
    #[snafu(display("Stack file {} is full", path.display()))]
    StackFull {
        path: PathBuf,
        #[snafu(implicit)]
        loc:  snafu::Location,
    },

    /// The queue's handles were already released.
    ///
    /// `close` consumes the queue, so only code running after the shared
    /// finish step (such as a `Drop` impl) can observe this.
    #[snafu(display("Queue at {} is closed", path.display()))]
    Closed {
        path: PathBuf,
        #[snafu(implicit)]
        loc:  snafu::Location,
    },
}

/// Result type for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;

/// Rejects items whose length cannot be written as a 4-byte big-endian
/// record length.
pub(crate) fn ensure_item_len(len: usize) -> Result<u32> {
    u32::try_from(len).ok().context(InvalidItemTypeSnafu { len })
}
