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

//! Round-robin fairness over many backing queues.
//!
//! Each key (typically a crawl target's domain) owns one backing queue.
//! Keys take turns: `pop` serves the key at the front of the rotation and
//! moves it to the back, so no key is served twice while another key with
//! items waits. A key whose queue drains leaves the rotation and its queue
//! is closed.
//!
//! Start keys passed to [`RoundRobinQueue::new`] fix a seed order. A seeded
//! key that rejoins the rotation is placed ahead of any seeded key that came
//! after it in that order; other new keys join at the back.

use std::{
    collections::{HashMap, VecDeque, hash_map::Entry},
    fmt::Debug,
    hash::Hash,
};

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::{Queue, QueueFactory, Result};

/// Backing queues keyed by `K`, served in rotation.
#[derive(Debug)]
pub struct RoundRobinQueue<K, Q, F> {
    factory:  F,
    queues:   HashMap<K, Q>,
    /// Keys in serving order; holds exactly the keys of `queues`.
    rotation: VecDeque<K>,
    /// Position of each start key in the seed order.
    seed:     HashMap<K, usize>,
}

impl<K, Q, F> RoundRobinQueue<K, Q, F>
where
    K: Eq + Hash + Clone + Debug,
    Q: Queue,
    F: QueueFactory<K, Q>,
{
    /// Create the multiplexer, opening a backing queue for every start key.
    /// The start keys seed the rotation in the given order.
    pub fn new<I>(mut factory: F, start_keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = K>,
    {
        let mut queues = HashMap::new();
        let mut rotation = VecDeque::new();
        let mut seed = HashMap::new();
        for key in start_keys {
            if let Entry::Vacant(entry) = queues.entry(key) {
                let queue = factory.create(entry.key())?;
                seed.insert(entry.key().clone(), seed.len());
                rotation.push_back(entry.key().clone());
                entry.insert(queue);
            }
        }

        Ok(Self {
            factory,
            queues,
            rotation,
            seed,
        })
    }

    /// Store `item` under `key`. A new key joins the rotation, see
    /// [`join_rotation`](Self::join_rotation).
    pub fn push(&mut self, item: &[u8], key: K) -> Result<()> {
        let queue = match self.queues.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                debug!(key = ?entry.key(), "Creating backing queue");
                let queue = self.factory.create(entry.key())?;
                let key = entry.key().clone();
                let queue = entry.insert(queue);
                Self::join_rotation(&mut self.rotation, &self.seed, key);
                queue
            }
        };
        queue.push(item)
    }

    /// Insert a key that is not in the rotation. A seeded key goes before
    /// the first seeded key with a later seed position; anything else goes
    /// to the back.
    fn join_rotation(rotation: &mut VecDeque<K>, seed: &HashMap<K, usize>, key: K) {
        let position = seed.get(&key).and_then(|&rank| {
            rotation
                .iter()
                .position(|other| seed.get(other).is_some_and(|&other_rank| other_rank > rank))
        });
        match position {
            Some(index) => rotation.insert(index, key),
            None => rotation.push_back(key),
        }
    }

    /// Remove and return one item from the next key in the rotation.
    pub fn pop(&mut self) -> Result<Option<Bytes>> {
        for _ in 0..self.rotation.len() {
            let Some(key) = self.rotation.pop_front() else {
                break;
            };
            let Some(queue) = self.queues.get_mut(&key) else {
                continue;
            };

            let item = match queue.pop() {
                Ok(item) => item,
                Err(e) => {
                    self.rotation.push_front(key);
                    return Err(e);
                }
            };

            if queue.is_empty() {
                if let Some(queue) = self.queues.remove(&key) {
                    debug!(key = ?key, "Evicting drained backing queue");
                    // The item already left the backing queue; keep it.
                    if let Err(e) = queue.close() {
                        warn!(key = ?key, error = %e, "Failed to close drained backing queue");
                    }
                }
            } else {
                self.rotation.push_back(key);
            }

            if item.is_some() {
                return Ok(item);
            }
        }
        Ok(None)
    }

    /// The item the next [`pop`](Self::pop) would return. The rotation is
    /// left untouched.
    pub fn peek(&mut self) -> Result<Option<Bytes>> {
        for key in &self.rotation {
            if let Some(queue) = self.queues.get_mut(key) {
                if let Some(item) = queue.peek()? {
                    return Ok(Some(item));
                }
            }
        }
        Ok(None)
    }

    /// Keys in serving order.
    pub fn keys(&self) -> impl Iterator<Item = &K> { self.rotation.iter() }

    /// Items stored across all keys.
    pub fn len(&self) -> usize { self.queues.values().map(Queue::len).sum() }

    pub fn is_empty(&self) -> bool { self.queues.values().all(Queue::is_empty) }

    /// Close every backing queue and return the keys that still held items,
    /// in rotation order.
    ///
    /// Every queue is closed even when one fails; the first failure is
    /// returned.
    pub fn close(mut self) -> Result<Vec<K>> {
        let mut active = Vec::new();
        let mut first_error = None;

        for key in self.rotation {
            let Some(queue) = self.queues.remove(&key) else {
                continue;
            };
            let has_items = !queue.is_empty();
            if let Err(e) = queue.close() {
                warn!(key = ?key, error = %e, "Failed to close backing queue");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
            if has_items {
                active.push(key);
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        info!(active = active.len(), "Round-robin queue closed");
        Ok(active)
    }
}
