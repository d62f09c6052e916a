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

//! The keys a multiplexer returned from `close`, kept between CLI runs.

use std::{
    fs::File,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use serde::{Serialize, de::DeserializeOwned};
use snafu::ResultExt;
use tracing::debug;

use crate::error::{ActiveSetFormatSnafu, ActiveSetIoSnafu, Result};

/// JSON array of keys at a fixed path.
#[derive(Debug, Clone)]
pub struct ActiveSetFile {
    path: PathBuf,
}

impl ActiveSetFile {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self { Self { path: path.into() } }

    pub fn path(&self) -> &Path { &self.path }

    /// Saved keys, or none if nothing was saved.
    pub fn load<K: DeserializeOwned>(&self) -> Result<Vec<K>> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).context(ActiveSetIoSnafu { path: &self.path }),
        };
        serde_json::from_slice(&data).context(ActiveSetFormatSnafu { path: &self.path })
    }

    /// Replace the saved keys. An empty set removes the file.
    pub fn save<K: Serialize>(&self, keys: &[K]) -> Result<()> {
        if keys.is_empty() {
            return match std::fs::remove_file(&self.path) {
                Err(e) if e.kind() != ErrorKind::NotFound => {
                    Err(e).context(ActiveSetIoSnafu { path: &self.path })
                }
                _ => Ok(()),
            };
        }

        let data = serde_json::to_vec(keys).context(ActiveSetFormatSnafu { path: &self.path })?;
        let tmp_path = self.path.with_extension("json.tmp");
        let write = || -> std::io::Result<()> {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut file = File::create(&tmp_path)?;
            file.write_all(&data)?;
            file.sync_all()?;
            std::fs::rename(&tmp_path, &self.path)
        };
        write().context(ActiveSetIoSnafu { path: &self.path })?;

        debug!(path = ?self.path, keys = keys.len(), "Saved active set");
        Ok(())
    }
}
