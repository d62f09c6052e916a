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

//! One CLI invocation against a persistent multiplexer.
//!
//! Each frontier kind keeps its backing queues under `<base_path>/<name>/`
//! and the keys returned by `close` in `<base_path>/<name>.json`, so the
//! next run resumes where the last one stopped.

use bytes::Bytes;
use frontier_common_storage_queue::{
    AnyQueue, BackendFactory, PriorityQueue, QueueConfig, RoundRobinQueue,
};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{info, warn};

use crate::{active::ActiveSetFile, error::Result};

/// A multiplexer the CLI can reopen from a saved active set.
pub trait Frontier: Sized {
    type Key: Serialize + DeserializeOwned;

    /// Directory and active set file name under the base path.
    const NAME: &'static str;

    fn open(factory: BackendFactory, active: Vec<Self::Key>) -> Result<Self>;

    fn push(&mut self, item: &[u8], key: Self::Key) -> Result<()>;

    fn pop(&mut self) -> Result<Option<Bytes>>;

    fn peek(&mut self) -> Result<Option<Bytes>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool { self.len() == 0 }

    fn close(self) -> Result<Vec<Self::Key>>;
}

pub type PriorityFrontier = PriorityQueue<AnyQueue, BackendFactory>;

pub type RoundRobinFrontier = RoundRobinQueue<String, AnyQueue, BackendFactory>;

impl Frontier for PriorityFrontier {
    type Key = i32;

    const NAME: &'static str = "priority";

    fn open(factory: BackendFactory, active: Vec<i32>) -> Result<Self> {
        Ok(Self::new(factory, active)?)
    }

    fn push(&mut self, item: &[u8], key: i32) -> Result<()> { Ok(Self::push(self, item, key)?) }

    fn pop(&mut self) -> Result<Option<Bytes>> { Ok(Self::pop(self)?) }

    fn peek(&mut self) -> Result<Option<Bytes>> { Ok(Self::peek(self)?) }

    fn len(&self) -> usize { Self::len(self) }

    fn close(self) -> Result<Vec<i32>> { Ok(Self::close(self)?) }
}

impl Frontier for RoundRobinFrontier {
    type Key = String;

    const NAME: &'static str = "round-robin";

    fn open(factory: BackendFactory, active: Vec<String>) -> Result<Self> {
        Ok(Self::new(factory, active)?)
    }

    fn push(&mut self, item: &[u8], key: String) -> Result<()> {
        Ok(Self::push(self, item, key)?)
    }

    fn pop(&mut self) -> Result<Option<Bytes>> { Ok(Self::pop(self)?) }

    fn peek(&mut self) -> Result<Option<Bytes>> { Ok(Self::peek(self)?) }

    fn len(&self) -> usize { Self::len(self) }

    fn close(self) -> Result<Vec<String>> { Ok(Self::close(self)?) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action<K> {
    Push { key: K, item: Vec<u8> },
    Pop,
    Peek,
    Len,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Pushed,
    Item(Option<Bytes>),
    Len(usize),
}

/// Open the frontier, apply `action` and close it again.
///
/// The frontier is closed even when the action fails. The active set is
/// only rewritten after a clean close.
pub fn execute<F: Frontier>(config: &QueueConfig, action: Action<F::Key>) -> Result<Outcome> {
    let active_file = ActiveSetFile::new(config.base_path.join(format!("{}.json", F::NAME)));
    let factory = QueueConfig {
        base_path: config.base_path.join(F::NAME),
        ..config.clone()
    }
    .factory();

    let mut frontier = F::open(factory, active_file.load()?)?;
    let outcome = match action {
        Action::Push { key, item } => frontier.push(&item, key).map(|()| Outcome::Pushed),
        Action::Pop => frontier.pop().map(Outcome::Item),
        Action::Peek => frontier.peek().map(Outcome::Item),
        Action::Len => Ok(Outcome::Len(frontier.len())),
    };

    match frontier.close() {
        Ok(active) => {
            info!(frontier = F::NAME, active = active.len(), "Closed frontier");
            active_file.save(&active)?;
        }
        Err(e) => {
            warn!(frontier = F::NAME, error = %e, "Failed to close frontier");
            return outcome.and(Err(e));
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use frontier_common_storage_queue::{BackendKind, Order};
    use tempfile::TempDir;
    use test_case::test_case;

    use super::*;

    fn config(base: &Path, backend: BackendKind) -> QueueConfig {
        QueueConfig {
            base_path: base.to_path_buf(),
            backend,
            order: Order::Fifo,
            chunk_size: 2,
            ..Default::default()
        }
    }

    fn push<F: Frontier>(config: &QueueConfig, key: F::Key, item: &[u8]) {
        let outcome = execute::<F>(
            config,
            Action::Push {
                key,
                item: item.to_vec(),
            },
        )
        .unwrap();
        assert_eq!(outcome, Outcome::Pushed);
    }

    fn pop<F: Frontier>(config: &QueueConfig) -> Option<Bytes> {
        match execute::<F>(config, Action::Pop).unwrap() {
            Outcome::Item(item) => item,
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test_case(BackendKind::Disk ; "disk")]
    #[test_case(BackendKind::Table ; "table")]
    fn test_priority_across_runs(backend: BackendKind) {
        let temp_dir = TempDir::new().unwrap();
        let config = config(temp_dir.path(), backend);

        push::<PriorityFrontier>(&config, 5, b"low");
        push::<PriorityFrontier>(&config, -1, b"urgent");
        push::<PriorityFrontier>(&config, 1, b"normal");
        assert_eq!(
            std::fs::read_to_string(temp_dir.path().join("priority.json")).unwrap(),
            "[-1,1,5]"
        );
        assert_eq!(
            execute::<PriorityFrontier>(&config, Action::Len).unwrap(),
            Outcome::Len(3)
        );
        assert_eq!(
            execute::<PriorityFrontier>(&config, Action::Peek).unwrap(),
            Outcome::Item(Some(Bytes::from_static(b"urgent")))
        );

        assert_eq!(pop::<PriorityFrontier>(&config).as_deref(), Some(&b"urgent"[..]));
        assert_eq!(pop::<PriorityFrontier>(&config).as_deref(), Some(&b"normal"[..]));
        assert_eq!(pop::<PriorityFrontier>(&config).as_deref(), Some(&b"low"[..]));
        assert_eq!(pop::<PriorityFrontier>(&config), None);

        assert!(!temp_dir.path().join("priority.json").exists());
    }

    #[test]
    fn test_round_robin_across_runs() {
        let temp_dir = TempDir::new().unwrap();
        let config = config(temp_dir.path(), BackendKind::Disk);

        push::<RoundRobinFrontier>(&config, "a.example".to_string(), b"a1");
        push::<RoundRobinFrontier>(&config, "a.example".to_string(), b"a2");
        push::<RoundRobinFrontier>(&config, "b.example".to_string(), b"b1");

        assert_eq!(pop::<RoundRobinFrontier>(&config).as_deref(), Some(&b"a1"[..]));
        assert_eq!(
            std::fs::read_to_string(temp_dir.path().join("round-robin.json")).unwrap(),
            r#"["b.example","a.example"]"#
        );
        assert_eq!(pop::<RoundRobinFrontier>(&config).as_deref(), Some(&b"b1"[..]));
        assert_eq!(pop::<RoundRobinFrontier>(&config).as_deref(), Some(&b"a2"[..]));
        assert_eq!(pop::<RoundRobinFrontier>(&config), None);
    }

    #[test]
    fn test_frontiers_do_not_share_storage() {
        let temp_dir = TempDir::new().unwrap();
        let config = config(temp_dir.path(), BackendKind::Disk);

        push::<PriorityFrontier>(&config, 1, b"by priority");
        push::<RoundRobinFrontier>(&config, "1".to_string(), b"by key");

        assert_eq!(pop::<PriorityFrontier>(&config).as_deref(), Some(&b"by priority"[..]));
        assert_eq!(pop::<RoundRobinFrontier>(&config).as_deref(), Some(&b"by key"[..]));
    }

    #[test]
    fn test_key_named_like_active_set() {
        let temp_dir = TempDir::new().unwrap();
        let config = config(temp_dir.path(), BackendKind::Table);

        push::<RoundRobinFrontier>(&config, "round-robin.json".to_string(), b"item");
        assert_eq!(pop::<RoundRobinFrontier>(&config).as_deref(), Some(&b"item"[..]));
    }
}
