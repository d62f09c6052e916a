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

//! Cursor metadata for the chunked FIFO disk queue.
//!
//! The record lives in `info.json` next to the chunk files and is rewritten
//! on every close:
//!
//! ```json
//! {"chunksize":100000,"size":3,"head":[0,3],"tail":[0,0,0]}
//! ```
//!
//! - `head`: `[chunk, slot]`, the chunk being appended to and how many
//!   records it already holds
//! - `tail`: `[chunk, items, offset]`, the chunk being read, how many of its
//!   records were consumed and the byte offset of the next one
//!
//! Writes go to a temporary file that is synced and renamed over
//! `info.json`, so a crash leaves either the old or the new record.

use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::Path,
};

use serde::{Deserialize, Serialize};
use snafu::{ResultExt, ensure};
use tracing::debug;

use crate::{
    Result,
    error::{InvalidMetadataSnafu, MetadataCorruptedSnafu, MetadataEncodeSnafu},
    path::info_file_path,
};

const INFO_TMP_SUFFIX: &str = "tmp";

/// Append position: `[chunk, slot]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(u32, u32)", into = "(u32, u32)")]
pub struct HeadCursor {
    pub chunk: u32,
    pub slot:  u32,
}

/// Read position: `[chunk, items, offset]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(u32, u32, u64)", into = "(u32, u32, u64)")]
pub struct TailCursor {
    pub chunk:  u32,
    pub items:  u32,
    pub offset: u64,
}

impl From<(u32, u32)> for HeadCursor {
    fn from((chunk, slot): (u32, u32)) -> Self { Self { chunk, slot } }
}

impl From<HeadCursor> for (u32, u32) {
    fn from(head: HeadCursor) -> Self { (head.chunk, head.slot) }
}

impl From<(u32, u32, u64)> for TailCursor {
    fn from((chunk, items, offset): (u32, u32, u64)) -> Self {
        Self {
            chunk,
            items,
            offset,
        }
    }
}

impl From<TailCursor> for (u32, u32, u64) {
    fn from(tail: TailCursor) -> Self { (tail.chunk, tail.items, tail.offset) }
}

impl TailCursor {
    /// Whether the tail has caught up with the head.
    #[must_use]
    pub const fn reached(&self, head: &HeadCursor) -> bool {
        self.chunk > head.chunk || (self.chunk == head.chunk && self.items >= head.slot)
    }
}

/// Persisted state of a FIFO disk queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueInfo {
    /// Records per chunk file.
    #[serde(rename = "chunksize")]
    pub chunk_size: u32,
    /// Items currently stored.
    pub size:       u64,
    pub head:       HeadCursor,
    pub tail:       TailCursor,
}

impl QueueInfo {
    /// State of a queue that has never stored anything.
    #[must_use]
    pub fn new(chunk_size: u32) -> Self {
        Self {
            chunk_size,
            size: 0,
            head: HeadCursor::default(),
            tail: TailCursor::default(),
        }
    }

    /// Read `info.json` from the queue directory, if present.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Option<Self>> {
        let path = info_file_path(dir);
        if !path.exists() {
            return Ok(None);
        }

        let data = std::fs::read(&path)?;
        let info: Self =
            serde_json::from_slice(&data).context(MetadataCorruptedSnafu { path: &path })?;

        ensure!(
            info.chunk_size > 0,
            InvalidMetadataSnafu {
                path:   &path,
                reason: "chunksize must be at least 1".to_string(),
            }
        );
        ensure!(
            (info.tail.chunk, info.tail.items) <= (info.head.chunk, info.head.slot),
            InvalidMetadataSnafu {
                path:   &path,
                reason: format!("tail {:?} is ahead of head {:?}", info.tail, info.head),
            }
        );

        Ok(Some(info))
    }

    /// Atomically replace `info.json` in the queue directory.
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let path = info_file_path(dir);
        let tmp_path = path.with_extension(format!("json.{INFO_TMP_SUFFIX}"));

        let data = serde_json::to_vec(self).context(MetadataEncodeSnafu { path: &path })?;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);

        std::fs::rename(&tmp_path, &path)?;
        if let Some(parent) = path.parent() {
            // Directory fsync makes the rename durable; not supported everywhere.
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        debug!(path = ?path, size = self.size, "Queue metadata written");
        Ok(())
    }
}
