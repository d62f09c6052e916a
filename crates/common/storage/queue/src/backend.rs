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

use bytes::Bytes;

use crate::{
    BackendKind, FifoDiskQueue, LifoDiskQueue, MemoryQueue, Order, Queue, QueueConfig, Result,
    TableQueue,
};

/// A backing queue whose backend is picked at run time.
#[derive(Debug, derive_more::From)]
pub enum AnyQueue {
    Memory(MemoryQueue),
    FifoDisk(FifoDiskQueue),
    LifoDisk(LifoDiskQueue),
    Table(TableQueue),
}

impl AnyQueue {
    /// Open the backend `config` selects at `path`.
    ///
    /// `path` is a directory for FIFO disk queues and a file otherwise;
    /// memory queues ignore it.
    pub fn open<P: Into<PathBuf>>(config: &QueueConfig, path: P) -> Result<Self> {
        Ok(match (config.backend, config.order) {
            (BackendKind::Memory, order) => MemoryQueue::new(order).into(),
            (BackendKind::Disk, Order::Fifo) => FifoDiskQueue::open(path, config.chunk_size)?.into(),
            (BackendKind::Disk, Order::Lifo) => LifoDiskQueue::open(path)?.into(),
            (BackendKind::Table, order) => {
                TableQueue::open(path, order, config.busy_timeout())?.into()
            }
        })
    }
}

impl Queue for AnyQueue {
    fn push(&mut self, item: &[u8]) -> Result<()> {
        match self {
            Self::Memory(q) => q.push(item),
            Self::FifoDisk(q) => q.push(item),
            Self::LifoDisk(q) => q.push(item),
            Self::Table(q) => q.push(item),
        }
    }

    fn pop(&mut self) -> Result<Option<Bytes>> {
        match self {
            Self::Memory(q) => q.pop(),
            Self::FifoDisk(q) => q.pop(),
            Self::LifoDisk(q) => q.pop(),
            Self::Table(q) => q.pop(),
        }
    }

    fn peek(&mut self) -> Result<Option<Bytes>> {
        match self {
            Self::Memory(q) => q.peek(),
            Self::FifoDisk(q) => q.peek(),
            Self::LifoDisk(q) => q.peek(),
            Self::Table(q) => q.peek(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Memory(q) => q.len(),
            Self::FifoDisk(q) => q.len(),
            Self::LifoDisk(q) => q.len(),
            Self::Table(q) => q.len(),
        }
    }

    fn close(self) -> Result<()> {
        match self {
            Self::Memory(q) => q.close(),
            Self::FifoDisk(q) => q.close(),
            Self::LifoDisk(q) => q.close(),
            Self::Table(q) => q.close(),
        }
    }
}
