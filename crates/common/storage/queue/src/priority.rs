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

//! Strict priority over many backing queues.
//!
//! Each priority owns one backing queue, created on first use. `pop` always
//! serves the numerically smallest priority that still holds items, so
//! lower numbers are served first. A backing queue is evicted and closed as
//! soon as it is observed empty; pushing to that priority again creates a
//! fresh one.
//!
//! ```ignore
//! let mut queue = PriorityQueue::new(config.factory(), [])?;
//! queue.push(b"later", 5)?;
//! queue.push(b"sooner", 1)?;
//! assert_eq!(queue.pop()?.as_deref(), Some(&b"sooner"[..]));
//!
//! // Priorities that still hold items; pass them back to `new` next run.
//! let active = queue.close()?;
//! ```

use std::collections::{BTreeMap, btree_map::Entry};

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::{Queue, QueueFactory, Result};

/// Backing queues keyed by `i32` priority, lowest served first.
#[derive(Debug)]
pub struct PriorityQueue<Q, F> {
    factory: F,
    queues:  BTreeMap<i32, Q>,
}

impl<Q, F> PriorityQueue<Q, F>
where
    Q: Queue,
    F: QueueFactory<i32, Q>,
{
    /// Create the multiplexer, opening a backing queue for every start
    /// priority. Pass the list returned by a previous [`close`](Self::close)
    /// to resume.
    pub fn new<I>(mut factory: F, start_priorities: I) -> Result<Self>
    where
        I: IntoIterator<Item = i32>,
    {
        let mut queues = BTreeMap::new();
        for priority in start_priorities {
            if let Entry::Vacant(entry) = queues.entry(priority) {
                entry.insert(factory.create(&priority)?);
            }
        }

        Ok(Self { factory, queues })
    }

    /// Store `item` under `priority`, creating its backing queue if needed.
    pub fn push(&mut self, item: &[u8], priority: i32) -> Result<()> {
        let queue = match self.queues.entry(priority) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                debug!(priority, "Creating backing queue");
                entry.insert(self.factory.create(&priority)?)
            }
        };
        queue.push(item)
    }

    /// Remove and return the next item of the smallest non-empty priority.
    pub fn pop(&mut self) -> Result<Option<Bytes>> {
        while let Some(mut entry) = self.queues.first_entry() {
            let item = entry.get_mut().pop()?;
            if entry.get().is_empty() {
                let (priority, queue) = entry.remove_entry();
                debug!(priority, "Evicting drained backing queue");
                // The item already left the backing queue; keep it.
                if let Err(e) = queue.close() {
                    warn!(priority, error = %e, "Failed to close drained backing queue");
                }
            }
            if item.is_some() {
                return Ok(item);
            }
        }
        Ok(None)
    }

    /// The item the next [`pop`](Self::pop) would return.
    pub fn peek(&mut self) -> Result<Option<Bytes>> {
        for queue in self.queues.values_mut() {
            if let Some(item) = queue.peek()? {
                return Ok(Some(item));
            }
        }
        Ok(None)
    }

    /// Items stored across all priorities.
    pub fn len(&self) -> usize { self.queues.values().map(Queue::len).sum() }

    pub fn is_empty(&self) -> bool { self.queues.values().all(Queue::is_empty) }

    /// Close every backing queue and return the priorities that still held
    /// items, in ascending order.
    ///
    /// Every queue is closed even when one fails; the first failure is
    /// returned.
    pub fn close(self) -> Result<Vec<i32>> {
        let mut active = Vec::new();
        let mut first_error = None;

        for (priority, queue) in self.queues {
            if !queue.is_empty() {
                active.push(priority);
            }
            if let Err(e) = queue.close() {
                warn!(priority, error = %e, "Failed to close backing queue");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        info!(active = ?active, "Priority queue closed");
        Ok(active)
    }
}
