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

use std::collections::VecDeque;

use bytes::Bytes;

use crate::{Order, Queue, Result};

/// In-process queue. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    order: Order,
    items: VecDeque<Bytes>,
}

impl MemoryQueue {
    #[must_use]
    pub const fn new(order: Order) -> Self {
        Self {
            order,
            items: VecDeque::new(),
        }
    }

    #[must_use]
    pub const fn fifo() -> Self { Self::new(Order::Fifo) }

    #[must_use]
    pub const fn lifo() -> Self { Self::new(Order::Lifo) }

    #[must_use]
    pub const fn order(&self) -> Order { self.order }
}

impl Queue for MemoryQueue {
    fn push(&mut self, item: &[u8]) -> Result<()> {
        self.items.push_back(Bytes::copy_from_slice(item));
        Ok(())
    }

    fn pop(&mut self) -> Result<Option<Bytes>> {
        Ok(match self.order {
            Order::Fifo => self.items.pop_front(),
            Order::Lifo => self.items.pop_back(),
        })
    }

    fn peek(&mut self) -> Result<Option<Bytes>> {
        Ok(match self.order {
            Order::Fifo => self.items.front().cloned(),
            Order::Lifo => self.items.back().cloned(),
        })
    }

    fn len(&self) -> usize { self.items.len() }

    fn close(self) -> Result<()> { Ok(()) }
}
