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

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

use crate::{BackendFactory, Order, fifo_disk::DEFAULT_CHUNK_SIZE};

/// Storage used for each backing queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// In-process only.
    Memory,
    /// Chunk directory (FIFO) or stack file (LIFO).
    #[default]
    Disk,
    /// SQLite database file.
    Table,
}

/// How backing queues are created.
#[derive(Debug, Clone, PartialEq, Eq, SmartDefault, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Directory holding one artifact per backing queue.
    #[default(PathBuf::from("./frontier_data"))]
    pub base_path:         PathBuf,
    pub backend:           BackendKind,
    pub order:             Order,
    /// Records per chunk file for FIFO disk queues.
    #[default(DEFAULT_CHUNK_SIZE)]
    pub chunk_size:        u32,
    /// SQLite busy timeout for table queues.
    #[default = 60]
    pub busy_timeout_secs: u64,
}

impl QueueConfig {
    #[must_use]
    pub const fn busy_timeout(&self) -> Duration { Duration::from_secs(self.busy_timeout_secs) }

    /// Factory opening one backing queue per key under `base_path`.
    #[must_use]
    pub fn factory(&self) -> BackendFactory { BackendFactory::new(self.clone()) }
}
