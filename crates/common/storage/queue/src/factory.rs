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

//! Creation of backing queues for the multiplexers.
//!
//! A factory is called with a priority or key and must return a ready
//! backing queue. Calling it again for a key whose previous queue was
//! closed while holding items reopens that queue, which is how a
//! multiplexer resumes from a start hint.

use std::{fmt::Display, path::PathBuf};

use tracing::debug;

use crate::{AnyQueue, QueueConfig, Result, path::key_file_name};

/// Creates the backing queue for a priority or key.
///
/// Any `FnMut(&K) -> Result<Q>` closure is a factory.
pub trait QueueFactory<K: ?Sized, Q> {
    fn create(&mut self, key: &K) -> Result<Q>;
}

impl<K, Q, F> QueueFactory<K, Q> for F
where
    K: ?Sized,
    F: FnMut(&K) -> Result<Q>,
{
    fn create(&mut self, key: &K) -> Result<Q> { self(key) }
}

/// Factory opening a [`QueueConfig`]-selected backend at
/// `base_path/<key>` for any displayable key.
///
/// Keys are turned into safe file names, see
/// [`key_file_name`](crate::path::key_file_name).
#[derive(Debug, Clone)]
pub struct BackendFactory {
    config: QueueConfig,
}

impl BackendFactory {
    #[must_use]
    pub const fn new(config: QueueConfig) -> Self { Self { config } }

    #[must_use]
    pub const fn config(&self) -> &QueueConfig { &self.config }

    /// Location of the artifact backing `key`.
    #[must_use]
    pub fn path_for<K: Display + ?Sized>(&self, key: &K) -> PathBuf {
        self.config.base_path.join(key_file_name(&key.to_string()))
    }
}

impl<K: Display + ?Sized> QueueFactory<K, AnyQueue> for BackendFactory {
    fn create(&mut self, key: &K) -> Result<AnyQueue> {
        let path = self.path_for(key);
        debug!(key = %key, path = ?path, "Creating backing queue");
        AnyQueue::open(&self.config, path)
    }
}
