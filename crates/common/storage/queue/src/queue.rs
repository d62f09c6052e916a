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

//! The backing-queue interface shared by every backend.
//!
//! A backing queue stores opaque byte items and hands them back in FIFO or
//! LIFO order. Three backends implement it:
//! - [`MemoryQueue`](crate::MemoryQueue): in-process, nothing persisted
//! - [`FifoDiskQueue`](crate::FifoDiskQueue) /
//!   [`LifoDiskQueue`](crate::LifoDiskQueue): flat files
//! - [`TableQueue`](crate::TableQueue): a single SQLite table
//!
//! ## Usage
//!
//! ```ignore
//! let mut queue = FifoDiskQueue::open("/path/to/queue", 100_000)?;
//! queue.push(b"hello")?;
//! assert_eq!(queue.pop()?.as_deref(), Some(&b"hello"[..]));
//! queue.close()?;
//! ```
//!
//! Items are byte slices, so values that are not byte sequences never reach
//! a queue:
//!
//! ```compile_fail
//! use frontier_common_storage_queue::{MemoryQueue, Queue};
//!
//! let mut queue = MemoryQueue::fifo();
//! queue.push(42u32).unwrap();
//! ```
//!
//! ```compile_fail
//! use frontier_common_storage_queue::{MemoryQueue, Queue};
//!
//! let mut queue = MemoryQueue::fifo();
//! queue.push("text is not bytes").unwrap();
//! ```

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Dequeue order of a backing queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Order {
    /// First in, first out.
    #[default]
    Fifo,
    /// Last in, first out.
    Lifo,
}

/// A queue of opaque byte items.
///
/// `pop` and `peek` return `Ok(None)` when the queue is empty. `close`
/// releases every handle; persistent backends keep their files when items
/// remain and delete them when the queue is empty.
pub trait Queue {
    /// Store one item.
    fn push(&mut self, item: &[u8]) -> Result<()>;

    /// Remove and return the next item.
    fn pop(&mut self) -> Result<Option<Bytes>>;

    /// Return the item the next `pop` would return, without removing it.
    fn peek(&mut self) -> Result<Option<Bytes>>;

    /// Number of stored items.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool { self.len() == 0 }

    /// Release the queue, persisting or removing its footprint.
    fn close(self) -> Result<()>
    where
        Self: Sized;
}
