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

use crate::{AnyQueue, BackendFactory, BackendKind, Order, QueueConfig, Result};

pub struct QueueBuilder {
    config: QueueConfig,
}

impl QueueBuilder {
    pub fn new<P: Into<PathBuf>>(base_path: P) -> Self {
        Self {
            config: QueueConfig {
                base_path: base_path.into(),
                ..Default::default()
            },
        }
    }

    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.config.order = order;
        self
    }

    pub fn chunk_size(mut self, chunk_size: u32) -> Self {
        self.config.chunk_size = chunk_size;
        self
    }

    pub fn busy_timeout_secs(mut self, secs: u64) -> Self {
        self.config.busy_timeout_secs = secs;
        self
    }

    /// Open a single queue at the base path.
    pub fn build(self) -> Result<AnyQueue> {
        let path = self.config.base_path.clone();
        AnyQueue::open(&self.config, path)
    }

    /// Factory opening one queue per key under the base path.
    pub fn factory(self) -> BackendFactory { BackendFactory::new(self.config) }
}
