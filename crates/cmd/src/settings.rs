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

//! Layered CLI settings.
//!
//! Sources, later ones winning:
//! 1. built-in defaults
//! 2. the `--config` file (TOML, YAML or JSON by extension)
//! 3. `FRONTIER__*` environment variables, e.g.
//!    `FRONTIER__QUEUE__BACKEND=table` or `FRONTIER__LOGGING__LEVEL=debug`

use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use frontier_common_storage_queue::QueueConfig;
use frontier_common_telemetry::LoggingOptions;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use snafu::{ResultExt, Snafu};
use validator::{Validate, ValidationError, ValidationErrors};

const ENV_PREFIX: &str = "FRONTIER";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Snafu)]
pub enum SettingsError {
    #[snafu(display("Failed to load settings"))]
    Load { source: ConfigError },

    #[snafu(display("Invalid settings: {source}"))]
    Invalid { source: ValidationErrors },
}

#[derive(Debug, Clone, PartialEq, Eq, SmartDefault, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Settings {
    #[validate(custom(function = "validate_queue"))]
    pub queue:   QueueConfig,
    /// Items go to stdout, so only warnings are logged by default.
    #[default(LoggingOptions { level: Some("warn".to_string()), ..Default::default() })]
    pub logging: LoggingOptions,
}

fn validate_queue(queue: &QueueConfig) -> Result<(), ValidationError> {
    if queue.chunk_size == 0 {
        return Err(ValidationError::new("chunk_size_zero")
            .with_message("queue.chunk_size must be at least 1".into()));
    }
    Ok(())
}

impl Settings {
    /// Load settings from defaults, `file` and the process environment.
    pub fn load(file: Option<&Path>) -> Result<Self, SettingsError> {
        Self::load_with_env(file, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with_env(file: Option<&Path>, env: Environment) -> Result<Self, SettingsError> {
        let mut builder =
            Config::builder().add_source(Config::try_from(&Self::default()).context(LoadSnafu)?);
        if let Some(file) = file {
            builder = builder.add_source(File::from(file).required(true));
        }
        builder = builder.add_source(env.separator(ENV_SEPARATOR).try_parsing(true));

        let settings: Self = builder
            .build()
            .context(LoadSnafu)?
            .try_deserialize()
            .context(LoadSnafu)?;
        settings.validate().context(InvalidSnafu)?;
        Ok(settings)
    }
}
