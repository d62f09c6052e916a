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

//! Chunked FIFO queue on flat files.
//!
//! A queue is a directory holding a run of chunk files plus `info.json`:
//!
//! ```text
//! queue/
//! ├── q00003      <- tail chunk (being read, deleted once consumed)
//! ├── q00004
//! ├── q00005      <- head chunk (being appended to)
//! └── info.json   <- cursors, written on close
//! ```
//!
//! ## Chunk Record Format
//!
//! ```text
//! ┌─────────────────┬──────────────────────┐
//! │  Length (4B)    │   Payload (variable) │
//! │  big-endian     │   raw bytes          │
//! └─────────────────┴──────────────────────┘
//! ```
//!
//! Each chunk holds at most `chunksize` records. The head rolls to a fresh
//! chunk as soon as the current one is full; the tail deletes a chunk once
//! all of its records were popped.
//!
//! ## Recovery
//!
//! Cursors are only persisted on close. On open the head chunk is scanned
//! record by record and must hold exactly `head.slot` complete records;
//! anything else (a torn trailing record, records appended by a process that
//! never closed) is reported as [`QueueError::CorruptedChunk`] rather than
//! repaired. Records are written with a single `write_all` of the framed
//! buffer so a torn length prefix without payload is never produced by a
//! clean write path.

use std::{
    fs::{File, OpenOptions},
    io::{self, BufReader, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use bytes::Bytes;
use snafu::{OptionExt, ensure};
use tracing::{debug, info, warn};

use crate::{
    Queue, Result,
    error::{ClosedSnafu, CorruptedChunkSnafu, ensure_item_len},
    info::QueueInfo,
    path::{chunk_file_path, info_file_path, scan_chunk_files},
};

/// Size of the big-endian length prefix of each record.
pub const RECORD_HEADER_SIZE: usize = 4;

/// Records per chunk file when none is configured.
pub const DEFAULT_CHUNK_SIZE: u32 = 100_000;

struct ChunkHandles {
    /// Append handle on the head chunk.
    head: File,
    /// Read handle on the tail chunk.
    tail: File,
}

/// FIFO queue stored as a directory of fixed-count chunk files.
pub struct FifoDiskQueue {
    /// Queue directory.
    path:    PathBuf,
    /// Cursors and item count; persisted as `info.json` on close.
    info:    QueueInfo,
    /// `None` once the queue has been closed.
    handles: Option<ChunkHandles>,
}

impl FifoDiskQueue {
    /// Open the queue at `path`, creating the directory if needed.
    ///
    /// `chunk_size` only applies to a fresh queue; an existing queue keeps
    /// the chunk size recorded in its `info.json`. A zero chunk size is
    /// treated as 1.
    pub fn open<P: Into<PathBuf>>(path: P, chunk_size: u32) -> Result<Self> {
        let path = path.into();
        std::fs::create_dir_all(&path)?;

        let info = match QueueInfo::load(&path)? {
            Some(info) => {
                verify_head_chunk(&path, &info)?;
                info
            }
            None => QueueInfo::new(chunk_size.max(1)),
        };

        let head = open_head_chunk(&path, info.head.chunk)?;
        let mut tail = File::open(chunk_file_path(&path, info.tail.chunk))?;
        tail.seek(SeekFrom::Start(info.tail.offset))?;

        info!(
            path = ?path,
            size = info.size,
            chunk_size = info.chunk_size,
            head_chunk = info.head.chunk,
            tail_chunk = info.tail.chunk,
            "FIFO disk queue opened"
        );

        Ok(Self {
            path,
            info,
            handles: Some(ChunkHandles { head, tail }),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path { &self.path }

    #[must_use]
    pub const fn chunk_size(&self) -> u32 { self.info.chunk_size }

    /// Current cursors, as they would be written to `info.json`.
    #[must_use]
    pub const fn info(&self) -> &QueueInfo { &self.info }

    fn handles(&mut self) -> Result<&mut ChunkHandles> {
        self.handles.as_mut().context(ClosedSnafu { path: &self.path })
    }

    fn roll_head(&mut self) -> Result<()> {
        let next = self.info.head.chunk + 1;
        let file = open_head_chunk(&self.path, next)?;
        // Replacing the handle closes the full chunk.
        self.handles()?.head = file;
        self.info.head.chunk = next;
        self.info.head.slot = 0;
        debug!(path = ?self.path, chunk = next, "Head rolled to new chunk");
        Ok(())
    }

    /// Delete the tail chunk once all of its records were consumed and the
    /// head has moved on, then continue reading from the next chunk.
    fn roll_tail_if_consumed(&mut self) -> Result<()> {
        let tail = self.info.tail;
        if tail.items < self.info.chunk_size || tail.chunk >= self.info.head.chunk {
            return Ok(());
        }

        let next = tail.chunk + 1;
        let file = File::open(chunk_file_path(&self.path, next))?;
        self.handles()?.tail = file;
        self.info.tail.chunk = next;
        self.info.tail.items = 0;
        self.info.tail.offset = 0;

        let consumed = chunk_file_path(&self.path, tail.chunk);
        std::fs::remove_file(&consumed)?;
        debug!(path = ?consumed, "Consumed chunk removed");
        Ok(())
    }

    /// Read the record under the tail cursor without moving the cursor.
    fn read_tail_record(&mut self) -> Result<Bytes> {
        let offset = self.info.tail.offset;
        let path = chunk_file_path(&self.path, self.info.tail.chunk);
        let file = &mut self
            .handles
            .as_mut()
            .context(ClosedSnafu { path: &self.path })?
            .tail;

        file.seek(SeekFrom::Start(offset))?;
        let mut header = [0u8; RECORD_HEADER_SIZE];
        read_record_part(file, &mut header, &path, offset)?;

        let len = u32::from_be_bytes(header) as usize;
        let mut payload = vec![0u8; len];
        read_record_part(file, &mut payload, &path, offset)?;

        Ok(Bytes::from(payload))
    }

    /// Release handles, then persist cursors or remove an empty queue.
    fn finish(&mut self) -> Result<()> {
        let Some(handles) = self.handles.take() else {
            return Ok(());
        };
        let synced = handles.head.sync_data();
        drop(handles);

        if self.info.size == 0 {
            self.cleanup()?;
            info!(path = ?self.path, "FIFO disk queue closed empty, files removed");
        } else {
            self.info.save(&self.path)?;
            info!(path = ?self.path, size = self.info.size, "FIFO disk queue closed");
        }

        synced?;
        Ok(())
    }

    fn cleanup(&self) -> Result<()> {
        for chunk in scan_chunk_files(&self.path)? {
            std::fs::remove_file(&chunk)?;
        }

        let info_path = info_file_path(&self.path);
        if info_path.exists() {
            std::fs::remove_file(&info_path)?;
        }

        if std::fs::read_dir(&self.path)?.next().is_none() {
            std::fs::remove_dir(&self.path)?;
        }
        Ok(())
    }
}

impl Queue for FifoDiskQueue {
    fn push(&mut self, item: &[u8]) -> Result<()> {
        let len = ensure_item_len(item.len())?;
        // A full head chunk never takes another record.
        if self.info.head.slot >= self.info.chunk_size {
            self.roll_head()?;
        }

        let mut record = Vec::with_capacity(RECORD_HEADER_SIZE + item.len());
        record.extend_from_slice(&len.to_be_bytes());
        record.extend_from_slice(item);
        self.handles()?.head.write_all(&record)?;

        self.info.size += 1;
        self.info.head.slot += 1;
        // The item is already stored; a failed roll is retried by the next
        // push instead of reporting the push as failed.
        if self.info.head.slot >= self.info.chunk_size {
            if let Err(e) = self.roll_head() {
                warn!(path = ?self.path, error = %e, "Failed to roll head chunk");
            }
        }
        Ok(())
    }

    fn pop(&mut self) -> Result<Option<Bytes>> {
        self.roll_tail_if_consumed()?;
        if self.info.tail.reached(&self.info.head) {
            return Ok(None);
        }

        let payload = self.read_tail_record()?;
        self.info.tail.items += 1;
        self.info.tail.offset += (RECORD_HEADER_SIZE + payload.len()) as u64;
        self.info.size = self.info.size.saturating_sub(1);

        // The item is already consumed; a failed roll is retried by the next
        // pop instead of losing it.
        if let Err(e) = self.roll_tail_if_consumed() {
            warn!(path = ?self.path, error = %e, "Failed to roll tail chunk");
        }
        Ok(Some(payload))
    }

    fn peek(&mut self) -> Result<Option<Bytes>> {
        self.roll_tail_if_consumed()?;
        if self.info.tail.reached(&self.info.head) {
            return Ok(None);
        }
        self.read_tail_record().map(Some)
    }

    fn len(&self) -> usize { usize::try_from(self.info.size).unwrap_or(usize::MAX) }

    fn close(mut self) -> Result<()> { self.finish() }
}

impl Drop for FifoDiskQueue {
    fn drop(&mut self) {
        if self.handles.is_some() {
            if let Err(e) = self.finish() {
                warn!(path = ?self.path, error = %e, "Failed to close FIFO disk queue on drop");
            }
        }
    }
}

impl std::fmt::Debug for FifoDiskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FifoDiskQueue")
            .field("path", &self.path)
            .field("info", &self.info)
            .field("open", &self.handles.is_some())
            .finish()
    }
}

fn open_head_chunk(dir: &Path, chunk: u32) -> Result<File> {
    Ok(OpenOptions::new()
        .create(true)
        .append(true)
        .open(chunk_file_path(dir, chunk))?)
}

fn read_record_part(file: &mut File, buf: &mut [u8], path: &Path, offset: u64) -> Result<()> {
    match file.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => CorruptedChunkSnafu {
            path,
            reason: format!("short record at offset {offset}"),
        }
        .fail(),
        Err(e) => Err(e.into()),
    }
}

/// Check that the head chunk holds exactly the records `info` claims.
///
/// Only record headers are read; payloads are skipped.
fn verify_head_chunk(dir: &Path, info: &QueueInfo) -> Result<()> {
    let path = chunk_file_path(dir, info.head.chunk);
    if !path.exists() {
        ensure!(
            info.head.slot == 0,
            CorruptedChunkSnafu {
                path:   &path,
                reason: format!("missing, expected {} records", info.head.slot),
            }
        );
        return Ok(());
    }

    let file = File::open(&path)?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    let mut position = 0u64;
    let mut records = 0u64;
    while position < file_len {
        ensure!(
            position + RECORD_HEADER_SIZE as u64 <= file_len,
            CorruptedChunkSnafu {
                path:   &path,
                reason: format!("truncated length prefix at offset {position}"),
            }
        );

        let mut header = [0u8; RECORD_HEADER_SIZE];
        reader.read_exact(&mut header)?;
        let len = u32::from_be_bytes(header);
        let end = position + RECORD_HEADER_SIZE as u64 + u64::from(len);
        ensure!(
            end <= file_len,
            CorruptedChunkSnafu {
                path:   &path,
                reason: format!("truncated payload at offset {position}"),
            }
        );

        reader.seek_relative(i64::from(len))?;
        position = end;
        records += 1;
    }

    ensure!(
        records == u64::from(info.head.slot),
        CorruptedChunkSnafu {
            path:   &path,
            reason: format!(
                "holds {records} records, metadata expects {}",
                info.head.slot
            ),
        }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use test_case::test_case;

    use super::*;
    use crate::QueueError;

    fn chunk_count(dir: &Path) -> usize { scan_chunk_files(dir).unwrap().len() }

    #[test]
    fn test_push_pop_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let mut queue = FifoDiskQueue::open(temp_dir.path().join("q"), 100).unwrap();

        for i in 0..10 {
            queue.push(format!("item-{i}").as_bytes()).unwrap();
        }
        assert_eq!(queue.len(), 10);

        for i in 0..10 {
            let item = queue.pop().unwrap().unwrap();
            assert_eq!(item, Bytes::from(format!("item-{i}")));
        }
        assert!(queue.pop().unwrap().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_record_layout_on_disk() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("q");
        let mut queue = FifoDiskQueue::open(&dir, 100).unwrap();
        queue.push(b"abc").unwrap();
        queue.push(b"").unwrap();

        let data = std::fs::read(chunk_file_path(&dir, 0)).unwrap();
        assert_eq!(data, [0, 0, 0, 3, b'a', b'b', b'c', 0, 0, 0, 0]);
        queue.close().unwrap();
    }

    #[test]
    fn test_peek_does_not_consume() {
        let temp_dir = TempDir::new().unwrap();
        let mut queue = FifoDiskQueue::open(temp_dir.path().join("q"), 2).unwrap();
        assert!(queue.peek().unwrap().is_none());

        queue.push(b"first").unwrap();
        queue.push(b"second").unwrap();

        assert_eq!(queue.peek().unwrap(), Some(Bytes::from_static(b"first")));
        assert_eq!(queue.peek().unwrap(), Some(Bytes::from_static(b"first")));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop().unwrap(), Some(Bytes::from_static(b"first")));
        assert_eq!(queue.peek().unwrap(), Some(Bytes::from_static(b"second")));
    }

    #[test_case(1, 3, 4 ; "one record per chunk")]
    #[test_case(2, 5, 3 ; "partial last chunk")]
    #[test_case(2, 4, 3 ; "full chunks roll eagerly")]
    #[test_case(10, 5, 1 ; "single chunk")]
    fn test_chunk_files_created(chunk_size: u32, items: usize, expected_chunks: usize) {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("q");
        let mut queue = FifoDiskQueue::open(&dir, chunk_size).unwrap();
        for i in 0..items {
            queue.push(&[i as u8]).unwrap();
        }
        assert_eq!(chunk_count(&dir), expected_chunks);
    }

    #[test]
    fn test_consumed_chunks_are_removed() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("q");
        let mut queue = FifoDiskQueue::open(&dir, 2).unwrap();
        for i in 0..5u8 {
            queue.push(&[i]).unwrap();
        }
        assert_eq!(chunk_count(&dir), 3);

        for i in 0..5u8 {
            assert_eq!(queue.pop().unwrap(), Some(Bytes::copy_from_slice(&[i])));
        }
        assert_eq!(chunk_count(&dir), 1);
        assert!(chunk_file_path(&dir, 2).exists());
    }

    #[test]
    fn test_failed_head_roll_keeps_chunk_full() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("q");
        let mut queue = FifoDiskQueue::open(&dir, 2).unwrap();
        // A directory where the next chunk belongs makes the roll fail.
        std::fs::create_dir(chunk_file_path(&dir, 1)).unwrap();

        queue.push(b"a").unwrap();
        queue.push(b"b").unwrap();
        assert_eq!(queue.info().head.chunk, 0);
        assert!(queue.push(b"c").is_err());
        assert_eq!(queue.len(), 2);
        assert_eq!(std::fs::metadata(chunk_file_path(&dir, 0)).unwrap().len(), 10);

        std::fs::remove_dir(chunk_file_path(&dir, 1)).unwrap();
        queue.push(b"c").unwrap();
        assert_eq!(queue.info().head.chunk, 1);

        for item in [&b"a"[..], b"b", b"c"] {
            assert_eq!(queue.pop().unwrap().as_deref(), Some(item));
        }
        assert!(queue.pop().unwrap().is_none());
        queue.close().unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn test_released_handles_report_closed() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("q");
        let mut queue = FifoDiskQueue::open(&dir, 2).unwrap();
        queue.push(b"a").unwrap();
        queue.finish().unwrap();

        assert!(matches!(queue.push(b"b"), Err(QueueError::Closed { .. })));
        assert!(matches!(queue.pop(), Err(QueueError::Closed { .. })));
        queue.finish().unwrap();
        drop(queue);

        let mut queue = FifoDiskQueue::open(&dir, 2).unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop().unwrap().as_deref(), Some(&b"a"[..]));
    }

    #[test]
    fn test_reopen_resumes_mid_chunk() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("q");

        let mut queue = FifoDiskQueue::open(&dir, 3).unwrap();
        for i in 0..7u8 {
            queue.push(&[i]).unwrap();
        }
        assert_eq!(queue.pop().unwrap(), Some(Bytes::copy_from_slice(&[0])));
        assert_eq!(queue.pop().unwrap(), Some(Bytes::copy_from_slice(&[1])));
        queue.close().unwrap();

        let mut queue = FifoDiskQueue::open(&dir, 1000).unwrap();
        assert_eq!(queue.chunk_size(), 3);
        assert_eq!(queue.len(), 5);
        queue.push(&[7]).unwrap();
        for i in 2..8u8 {
            assert_eq!(queue.pop().unwrap(), Some(Bytes::copy_from_slice(&[i])));
        }
        assert!(queue.pop().unwrap().is_none());
        queue.close().unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn test_close_empty_removes_directory() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("q");
        let mut queue = FifoDiskQueue::open(&dir, 2).unwrap();
        queue.push(b"a").unwrap();
        queue.push(b"b").unwrap();
        queue.push(b"c").unwrap();
        while queue.pop().unwrap().is_some() {}
        queue.close().unwrap();

        assert!(!dir.exists());
    }

    #[test]
    fn test_close_empty_keeps_foreign_files() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("q");
        let queue = FifoDiskQueue::open(&dir, 2).unwrap();
        std::fs::write(dir.join("notes.txt"), b"keep me").unwrap();
        queue.close().unwrap();

        assert!(dir.join("notes.txt").exists());
        assert_eq!(chunk_count(&dir), 0);
        assert!(!info_file_path(&dir).exists());
    }

    #[test]
    fn test_drop_persists_cursors() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("q");
        {
            let mut queue = FifoDiskQueue::open(&dir, 4).unwrap();
            queue.push(b"kept").unwrap();
        }

        let mut queue = FifoDiskQueue::open(&dir, 4).unwrap();
        assert_eq!(queue.pop().unwrap(), Some(Bytes::from_static(b"kept")));
    }

    #[test]
    fn test_torn_head_record_detected_on_open() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("q");
        let mut queue = FifoDiskQueue::open(&dir, 10).unwrap();
        queue.push(b"whole").unwrap();
        queue.close().unwrap();

        let mut chunk = OpenOptions::new()
            .append(true)
            .open(chunk_file_path(&dir, 0))
            .unwrap();
        chunk.write_all(&[0, 0, 0, 9, b'x']).unwrap();
        drop(chunk);

        let err = FifoDiskQueue::open(&dir, 10).unwrap_err();
        assert!(matches!(err, QueueError::CorruptedChunk { .. }));
    }

    #[test]
    fn test_unrecorded_records_detected_on_open() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("q");
        let mut queue = FifoDiskQueue::open(&dir, 10).unwrap();
        queue.push(b"one").unwrap();
        queue.close().unwrap();

        let mut chunk = OpenOptions::new()
            .append(true)
            .open(chunk_file_path(&dir, 0))
            .unwrap();
        chunk.write_all(&[0, 0, 0, 1, b'x']).unwrap();
        drop(chunk);

        let err = FifoDiskQueue::open(&dir, 10).unwrap_err();
        assert!(matches!(err, QueueError::CorruptedChunk { .. }));
    }

    #[test]
    fn test_corrupted_metadata_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("q");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(info_file_path(&dir), b"[]").unwrap();

        let err = FifoDiskQueue::open(&dir, 10).unwrap_err();
        assert!(matches!(err, QueueError::MetadataCorrupted { .. }));
    }
}
