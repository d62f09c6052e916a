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

use frontier_common_storage_queue::QueueError;
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CmdError {
    #[snafu(transparent)]
    Queue {
        source: QueueError,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Failed to access active set file {}", path.display()))]
    ActiveSetIo {
        path:   PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Active set file {} is not a JSON key list", path.display()))]
    ActiveSetFormat {
        path:   PathBuf,
        source: serde_json::Error,
    },
}

pub type Result<T, E = CmdError> = std::result::Result<T, E>;
