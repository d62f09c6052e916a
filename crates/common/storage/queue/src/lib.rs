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

//! Persistent byte queues for a crawl frontier.
//!
//! Backing queues ([`MemoryQueue`], [`FifoDiskQueue`], [`LifoDiskQueue`],
//! [`TableQueue`]) store opaque items behind the [`Queue`] trait. The
//! multiplexers [`PriorityQueue`] and [`RoundRobinQueue`] spread items over
//! many backing queues created on demand by a [`QueueFactory`].

pub mod backend;
pub mod builder;
pub mod config;
pub mod error;
pub mod factory;
pub mod fifo_disk;
pub mod info;
pub mod lifo_disk;
pub mod memory;
pub mod path;
pub mod priority;
pub mod queue;
pub mod round_robin;
pub mod table;

pub use backend::AnyQueue;
pub use builder::QueueBuilder;
pub use config::{BackendKind, QueueConfig};
pub use error::{QueueError, Result};
pub use factory::{BackendFactory, QueueFactory};
pub use fifo_disk::FifoDiskQueue;
pub use info::{HeadCursor, QueueInfo, TailCursor};
pub use lifo_disk::LifoDiskQueue;
pub use memory::MemoryQueue;
pub use priority::PriorityQueue;
pub use queue::{Order, Queue};
pub use round_robin::RoundRobinQueue;
pub use table::TableQueue;
