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

//! LIFO queue in a single stack file.
//!
//! ```text
//! ┌──────────────┬─────────────────────┬─────────────────────┬─────┐
//! │ Count (4B)   │ Payload │ Len (4B)  │ Payload │ Len (4B)  │ ... │
//! │ big-endian   │ record 0            │ record 1            │     │
//! └──────────────┴─────────────────────┴─────────────────────┴─────┘
//! ```
//!
//! The length trails its payload so the newest record can be located from
//! the end of the file. Popping truncates the file; the count header is only
//! rewritten on close.

use std::{
    fs::{File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use bytes::Bytes;
use snafu::{OptionExt, ensure};
use tracing::{info, warn};

use crate::{
    Queue, Result,
    error::{ClosedSnafu, CorruptedStackSnafu, StackFullSnafu, ensure_item_len},
};

const HEADER_SIZE: u64 = 4;
const LEN_SIZE: u64 = 4;

/// LIFO queue stored as one append-and-truncate file.
pub struct LifoDiskQueue {
    path: PathBuf,
    /// `None` once the queue has been closed.
    file: Option<File>,
    size: u32,
}

impl LifoDiskQueue {
    /// Open the stack file at `path`, creating it and its parent directory
    /// if needed.
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();

        let (file, size) = if path.exists() {
            let mut file = OpenOptions::new().read(true).write(true).open(&path)?;
            let mut header = [0u8; HEADER_SIZE as usize];
            match file.read_exact(&mut header) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return CorruptedStackSnafu {
                        path:   &path,
                        reason: "shorter than the count header".to_string(),
                    }
                    .fail();
                }
                Err(e) => return Err(e.into()),
            }
            (file, u32::from_be_bytes(header))
        } else {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(&path)?;
            file.write_all(&0u32.to_be_bytes())?;
            (file, 0)
        };

        info!(path = ?path, size, "LIFO disk queue opened");
        Ok(Self {
            path,
            file: Some(file),
            size,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path { &self.path }

    /// Locate the newest record: `(payload_start, payload_len)`.
    fn last_record(&mut self) -> Result<(u64, usize)> {
        let file = self.file.as_mut().context(ClosedSnafu { path: &self.path })?;
        let end = file.seek(SeekFrom::End(0))?;
        ensure!(
            end >= HEADER_SIZE + LEN_SIZE,
            CorruptedStackSnafu {
                path:   &self.path,
                reason: format!("{end} bytes cannot hold a record"),
            }
        );

        file.seek(SeekFrom::Start(end - LEN_SIZE))?;
        let mut len = [0u8; LEN_SIZE as usize];
        file.read_exact(&mut len)?;
        let len = u64::from(u32::from_be_bytes(len));

        ensure!(
            end >= HEADER_SIZE + LEN_SIZE + len,
            CorruptedStackSnafu {
                path:   &self.path,
                reason: format!("record of {len} bytes overruns the header"),
            }
        );
        Ok((end - LEN_SIZE - len, len as usize))
    }

    fn read_payload(&mut self, start: u64, len: usize) -> Result<Bytes> {
        let file = self.file.as_mut().context(ClosedSnafu { path: &self.path })?;
        file.seek(SeekFrom::Start(start))?;
        let mut payload = vec![0u8; len];
        file.read_exact(&mut payload)?;
        Ok(Bytes::from(payload))
    }

    /// Write the count header and release the file, or delete it when empty.
    fn finish(&mut self) -> Result<()> {
        let Some(mut file) = self.file.take() else {
            return Ok(());
        };

        if self.size == 0 {
            drop(file);
            std::fs::remove_file(&self.path)?;
            info!(path = ?self.path, "LIFO disk queue closed empty, file removed");
        } else {
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&self.size.to_be_bytes())?;
            file.sync_all()?;
            info!(path = ?self.path, size = self.size, "LIFO disk queue closed");
        }
        Ok(())
    }
}

impl Queue for LifoDiskQueue {
    fn push(&mut self, item: &[u8]) -> Result<()> {
        let len = ensure_item_len(item.len())?;
        let size = self
            .size
            .checked_add(1)
            .context(StackFullSnafu { path: &self.path })?;

        let mut record = Vec::with_capacity(item.len() + LEN_SIZE as usize);
        record.extend_from_slice(item);
        record.extend_from_slice(&len.to_be_bytes());

        let file = self.file.as_mut().context(ClosedSnafu { path: &self.path })?;
        file.seek(SeekFrom::End(0))?;
        file.write_all(&record)?;
        self.size = size;
        Ok(())
    }

    fn pop(&mut self) -> Result<Option<Bytes>> {
        if self.size == 0 {
            return Ok(None);
        }
        let (start, len) = self.last_record()?;
        let payload = self.read_payload(start, len)?;

        let file = self.file.as_mut().context(ClosedSnafu { path: &self.path })?;
        file.set_len(start)?;
        self.size -= 1;
        Ok(Some(payload))
    }

    fn peek(&mut self) -> Result<Option<Bytes>> {
        if self.size == 0 {
            return Ok(None);
        }
        let (start, len) = self.last_record()?;
        self.read_payload(start, len).map(Some)
    }

    fn len(&self) -> usize { self.size as usize }

    fn close(mut self) -> Result<()> { self.finish() }
}

impl Drop for LifoDiskQueue {
    fn drop(&mut self) {
        if self.file.is_some() {
            if let Err(e) = self.finish() {
                warn!(path = ?self.path, error = %e, "Failed to close LIFO disk queue on drop");
            }
        }
    }
}

impl std::fmt::Debug for LifoDiskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifoDiskQueue")
            .field("path", &self.path)
            .field("size", &self.size)
            .field("open", &self.file.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::QueueError;

    #[test]
    fn test_push_pop_newest_first() {
        let temp_dir = TempDir::new().unwrap();
        let mut queue = LifoDiskQueue::open(temp_dir.path().join("stack")).unwrap();

        for item in [&b"a"[..], b"bb", b"ccc"] {
            queue.push(item).unwrap();
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.peek().unwrap(), Some(Bytes::from_static(b"ccc")));
        assert_eq!(queue.pop().unwrap(), Some(Bytes::from_static(b"ccc")));
        assert_eq!(queue.pop().unwrap(), Some(Bytes::from_static(b"bb")));

        queue.push(b"d").unwrap();
        assert_eq!(queue.pop().unwrap(), Some(Bytes::from_static(b"d")));
        assert_eq!(queue.pop().unwrap(), Some(Bytes::from_static(b"a")));
        assert!(queue.pop().unwrap().is_none());
        assert!(queue.peek().unwrap().is_none());
    }

    #[test]
    fn test_file_layout_after_close() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("stack");
        let mut queue = LifoDiskQueue::open(&path).unwrap();
        queue.push(b"ab").unwrap();
        queue.push(b"").unwrap();
        queue.close().unwrap();

        let data = std::fs::read(&path).unwrap();
        assert_eq!(data, [0, 0, 0, 2, b'a', b'b', 0, 0, 0, 2, 0, 0, 0, 0]);
    }

    #[test]
    fn test_pop_truncates_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("stack");
        let mut queue = LifoDiskQueue::open(&path).unwrap();
        queue.push(b"first").unwrap();
        queue.push(b"second").unwrap();
        queue.pop().unwrap();

        assert_eq!(std::fs::metadata(&path).unwrap().len(), 4 + 5 + 4);
    }

    #[test]
    fn test_reopen_keeps_items() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("stack");

        let mut queue = LifoDiskQueue::open(&path).unwrap();
        queue.push(b"one").unwrap();
        queue.push(b"two").unwrap();
        queue.close().unwrap();

        let mut queue = LifoDiskQueue::open(&path).unwrap();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop().unwrap(), Some(Bytes::from_static(b"two")));
        assert_eq!(queue.pop().unwrap(), Some(Bytes::from_static(b"one")));
        queue.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_close_empty_removes_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("stack");
        let queue = LifoDiskQueue::open(&path).unwrap();
        assert!(path.exists());
        queue.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_short_file_is_corrupted() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("stack");
        std::fs::write(&path, [0, 1]).unwrap();

        let err = LifoDiskQueue::open(&path).unwrap_err();
        assert!(matches!(err, QueueError::CorruptedStack { .. }));
    }

    #[test]
    fn test_overrunning_record_is_corrupted() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("stack");
        std::fs::write(&path, [0, 0, 0, 1, b'x', 0, 0, 0, 9]).unwrap();

        let mut queue = LifoDiskQueue::open(&path).unwrap();
        let err = queue.pop().unwrap_err();
        assert!(matches!(err, QueueError::CorruptedStack { .. }));
        drop(queue);
    }
}
