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

//! Queue stored as rows of a single SQLite table.
//!
//! Rows are ordered by their autoincrement id; FIFO pops the smallest id and
//! LIFO the largest. Select and delete run in one transaction.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use bytes::Bytes;
use rusqlite::{Connection, OptionalExtension, params};
use snafu::OptionExt;
use tracing::{info, warn};

use crate::{
    Order, Queue, Result,
    error::{ClosedSnafu, ensure_item_len},
};

/// How long a statement waits on a locked database by default.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(60);

const SQL_CREATE: &str =
    "CREATE TABLE IF NOT EXISTS queue (id INTEGER PRIMARY KEY AUTOINCREMENT, item BLOB)";
const SQL_COUNT: &str = "SELECT COUNT(*) FROM queue";
const SQL_PUSH: &str = "INSERT INTO queue (item) VALUES (?1)";
const SQL_DELETE: &str = "DELETE FROM queue WHERE id = ?1";
const SQL_FIRST: &str = "SELECT id, item FROM queue ORDER BY id ASC LIMIT 1";
const SQL_LAST: &str = "SELECT id, item FROM queue ORDER BY id DESC LIMIT 1";

/// FIFO or LIFO queue backed by a SQLite database file.
pub struct TableQueue {
    path:  PathBuf,
    order: Order,
    /// `None` once the queue has been closed.
    conn:  Option<Connection>,
    size:  usize,
}

impl TableQueue {
    /// Open the database at `path`, creating it and the `queue` table if
    /// missing.
    pub fn open<P: Into<PathBuf>>(path: P, order: Order, busy_timeout: Duration) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&path)?;
        conn.busy_timeout(busy_timeout)?;
        conn.execute(SQL_CREATE, [])?;
        let count: i64 = conn.query_row(SQL_COUNT, [], |row| row.get(0))?;
        let size = usize::try_from(count).unwrap_or_default();

        info!(path = %path.display(), ?order, size, "Table queue opened");
        Ok(Self {
            path,
            order,
            conn: Some(conn),
            size,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path { &self.path }

    #[must_use]
    pub const fn order(&self) -> Order { self.order }

    const fn select_sql(&self) -> &'static str {
        match self.order {
            Order::Fifo => SQL_FIRST,
            Order::Lifo => SQL_LAST,
        }
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().context(ClosedSnafu { path: &self.path })
    }

    fn finish(&mut self) -> Result<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        conn.close().map_err(|(_, e)| e)?;

        if self.size == 0 {
            std::fs::remove_file(&self.path)?;
            info!(path = %self.path.display(), "Table queue closed empty, file removed");
        } else {
            info!(path = %self.path.display(), size = self.size, "Table queue closed");
        }
        Ok(())
    }
}

impl Queue for TableQueue {
    fn push(&mut self, item: &[u8]) -> Result<()> {
        ensure_item_len(item.len())?;
        self.conn()?.execute(SQL_PUSH, params![item])?;
        self.size += 1;
        Ok(())
    }

    fn pop(&mut self) -> Result<Option<Bytes>> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let row: Option<(i64, Vec<u8>)> = tx
            .query_row(self.select_sql(), [], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()?;

        let Some((id, item)) = row else {
            return Ok(None);
        };
        tx.execute(SQL_DELETE, params![id])?;
        tx.commit()?;

        self.size = self.size.saturating_sub(1);
        Ok(Some(Bytes::from(item)))
    }

    fn peek(&mut self) -> Result<Option<Bytes>> {
        let item: Option<Vec<u8>> = self
            .conn()?
            .query_row(self.select_sql(), [], |row| row.get(1))
            .optional()?;
        Ok(item.map(Bytes::from))
    }

    fn len(&self) -> usize { self.size }

    fn close(mut self) -> Result<()> { self.finish() }
}

impl Drop for TableQueue {
    fn drop(&mut self) {
        if self.conn.is_some() {
            if let Err(e) = self.finish() {
                warn!(path = %self.path.display(), error = %e, "Failed to close table queue on drop");
            }
        }
    }
}

impl std::fmt::Debug for TableQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableQueue")
            .field("path", &self.path)
            .field("order", &self.order)
            .field("size", &self.size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use test_case::test_case;

    use super::*;
    use crate::QueueError;

    fn open(path: &Path, order: Order) -> TableQueue {
        TableQueue::open(path, order, DEFAULT_BUSY_TIMEOUT).unwrap()
    }

    #[test_case(Order::Fifo, &[b"a", b"b", b"c"] ; "fifo pops smallest id")]
    #[test_case(Order::Lifo, &[b"c", b"b", b"a"] ; "lifo pops largest id")]
    fn test_pop_order(order: Order, expected: &[&[u8; 1]]) {
        let temp_dir = TempDir::new().unwrap();
        let mut queue = open(&temp_dir.path().join("queue.db"), order);
        for item in [b"a", b"b", b"c"] {
            queue.push(item).unwrap();
        }

        for want in expected {
            assert_eq!(queue.peek().unwrap().as_deref(), Some(&want[..]));
            assert_eq!(queue.pop().unwrap().as_deref(), Some(&want[..]));
        }
        assert!(queue.pop().unwrap().is_none());
        assert!(queue.peek().unwrap().is_none());
    }

    #[test]
    fn test_reopen_counts_rows() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("queue.db");

        let mut queue = open(&path, Order::Fifo);
        queue.push(b"one").unwrap();
        queue.push(b"two").unwrap();
        queue.close().unwrap();
        assert!(path.exists());

        let mut queue = open(&path, Order::Fifo);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop().unwrap(), Some(Bytes::from_static(b"one")));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_close_empty_removes_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("queue.db");

        let mut queue = open(&path, Order::Lifo);
        queue.push(b"x").unwrap();
        queue.pop().unwrap();
        queue.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_binary_items_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let mut queue = open(&temp_dir.path().join("queue.db"), Order::Fifo);
        let item = [0u8, 255, 0, 10, 13];
        queue.push(&item).unwrap();
        queue.push(b"").unwrap();

        assert_eq!(queue.pop().unwrap().as_deref(), Some(&item[..]));
        assert_eq!(queue.pop().unwrap(), Some(Bytes::new()));
    }

    #[test]
    fn test_released_connection_reports_closed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("queue.db");
        let mut queue = open(&path, Order::Fifo);
        queue.push(b"a").unwrap();
        queue.finish().unwrap();

        assert!(matches!(queue.push(b"b"), Err(QueueError::Closed { .. })));
        assert!(matches!(queue.peek(), Err(QueueError::Closed { .. })));
        drop(queue);

        let mut queue = open(&path, Order::Fifo);
        assert_eq!(queue.pop().unwrap().as_deref(), Some(&b"a"[..]));
    }
}
