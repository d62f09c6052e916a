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

use std::{
    env,
    io::IsTerminal,
    sync::{Mutex, Once},
};

use bon::Builder;
use once_cell::sync::{Lazy, OnceCell};
use serde::{Deserialize, Deserializer, Serialize, de};
use smart_default::SmartDefault;
use snafu::{ResultExt, Snafu};
use tracing::Subscriber;
use tracing_appender::{
    non_blocking::{NonBlocking, WorkerGuard},
    rolling::{RollingFileAppender, Rotation},
};
use tracing_log::LogTracer;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, filter, layer::SubscriberExt, registry::LookupSpan,
};

/// Deserializes a string value, using `Default::default()` if the string is
/// empty.
///
/// Lets environment variables such as `FRONTIER__LOGGING__LOG_FORMAT=` fall
/// back to the default instead of failing.
///
/// # Errors
/// Returns an error if the non-empty string is not a valid `T`.
pub fn empty_string_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    let s = String::deserialize(deserializer)?;
    if s.is_empty() {
        return Ok(T::default());
    }
    T::deserialize(de::value::StrDeserializer::new(&s)).map_err(|e: de::value::Error| {
        de::Error::custom(format!("invalid value, expect empty string, err: {e}"))
    })
}

/// The default directory name for log files when file logging is enabled.
pub const DEFAULT_LOGGING_DIR: &str = "logs";

/// Default level filter when neither `level` nor `RUST_LOG` is set.
const DEFAULT_LOG_TARGETS: &str = "info";

/// Handle for changing the level filter after initialization.
///
/// Set by the first successful [`init_global_logging`].
pub static RELOAD_HANDLE: OnceCell<tracing_subscriber::reload::Handle<filter::Targets, Registry>> =
    OnceCell::new();

/// Logging setup failures.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum LoggingError {
    #[snafu(display("Failed to install the log crate bridge: {message}"))]
    LogTracer { message: String },

    #[snafu(display("Failed to create rolling log file in {dir}"))]
    RollingFile {
        dir:    String,
        source: tracing_appender::rolling::InitError,
    },

    #[snafu(display("Invalid log level filter {level:?}"))]
    InvalidLevel {
        level:  String,
        source: filter::ParseError,
    },

    #[snafu(display("A global tracing subscriber is already installed"))]
    SetGlobalDefault {
        source: tracing::subscriber::SetGlobalDefaultError,
    },
}

/// Configuration options for the logging system.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, SmartDefault, Builder)]
#[serde(default)]
pub struct LoggingOptions {
    /// Directory for hourly rotated log files. Empty disables file logging.
    #[default = ""]
    #[builder(default)]
    pub dir: String,

    /// Level filter such as `"info"` or `"info,frontier=debug"`. Falls back
    /// to `RUST_LOG`, then `"info"`.
    pub level: Option<String>,

    #[serde(default, deserialize_with = "empty_string_as_default")]
    #[builder(default)]
    pub log_format: LogFormat,

    /// Rotated files kept per log stream.
    #[default = 720]
    #[builder(default = 720)]
    pub max_log_files: usize,

    /// Also write to stdout.
    #[default = true]
    #[builder(default = true)]
    pub append_stdout: bool,
}

/// Available log output formats.
#[derive(
    Clone, Debug, Copy, PartialEq, Eq, Serialize, Deserialize, Default, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// One JSON object per event, for log pipelines.
    Json,
    /// Human-readable lines.
    #[default]
    Text,
}

/// Stdout-only text logging with default options.
///
/// Keep the returned guards alive; dropping them stops the writer threads.
///
/// # Errors
/// See [`init_global_logging`].
pub fn init_tracing_subscriber(app_name: &str) -> Result<Vec<WorkerGuard>, LoggingError> {
    init_global_logging(app_name, &LoggingOptions::default())
}

/// Logging for unit and integration tests.
///
/// Writes to files under `UNITTEST_LOG_DIR` (default `/tmp/__unittest_logs`)
/// at `UNITTEST_LOG_LEVEL` (default `debug`). Safe to call from every test;
/// only the first call installs anything.
pub fn init_default_ut_logging() {
    static START: Once = Once::new();

    START.call_once(|| {
        let dir =
            env::var("UNITTEST_LOG_DIR").unwrap_or_else(|_| "/tmp/__unittest_logs".to_string());
        let level = env::var("UNITTEST_LOG_LEVEL").unwrap_or_else(|_| "debug".to_string());
        let opts = LoggingOptions {
            dir: dir.clone(),
            level: Some(level),
            append_stdout: false,
            ..Default::default()
        };

        match init_global_logging("unittest", &opts) {
            Ok(guards) => {
                if let Ok(mut g) = GLOBAL_UT_LOG_GUARD.lock() {
                    *g = Some(guards);
                }
                tracing::info!("logs dir = {}", dir);
            }
            Err(e) => eprintln!("unit test logging disabled: {e}"),
        }
    });
}

/// Keeps the unit test writer threads alive for the whole test binary.
static GLOBAL_UT_LOG_GUARD: Lazy<Mutex<Option<Vec<WorkerGuard>>>> = Lazy::new(|| Mutex::new(None));

static GLOBAL_INIT: OnceCell<()> = OnceCell::new();

/// Install the global subscriber.
///
/// Layers, depending on `opts`:
/// - stdout (if `append_stdout`)
/// - `<dir>/<app_name>.*` with every event (if `dir` is set)
/// - `<dir>/<app_name>-err.*` with errors only (if `dir` is set)
///
/// Only the first successful call installs anything; later calls return no
/// guards.
///
/// # Errors
/// Fails on an invalid level filter, an unusable log directory, or when
/// another subscriber was installed by someone else.
pub fn init_global_logging(
    app_name: &str,
    opts: &LoggingOptions,
) -> Result<Vec<WorkerGuard>, LoggingError> {
    let mut guards = Vec::new();
    GLOBAL_INIT.get_or_try_init(|| install(app_name, opts, &mut guards))?;
    Ok(guards)
}

fn install(
    app_name: &str,
    opts: &LoggingOptions,
    guards: &mut Vec<WorkerGuard>,
) -> Result<(), LoggingError> {
    let level = opts
        .level
        .clone()
        .or_else(|| env::var(EnvFilter::DEFAULT_ENV).ok())
        .unwrap_or_else(|| DEFAULT_LOG_TARGETS.to_string());
    let targets = level
        .parse::<filter::Targets>()
        .context(InvalidLevelSnafu { level: &level })?;

    LogTracer::init().map_err(|e| LoggingError::LogTracer {
        message: e.to_string(),
    })?;

    let stdout_layer = if opts.append_stdout {
        let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
        guards.push(guard);
        Some(fmt_layer(writer, opts.log_format, std::io::stdout().is_terminal()))
    } else {
        None
    };

    let (file_layer, err_file_layer) = if opts.dir.is_empty() {
        (None, None)
    } else {
        let writer = rolling_writer(&opts.dir, app_name, opts.max_log_files, guards)?;
        let err_writer = rolling_writer(
            &opts.dir,
            &format!("{app_name}-err"),
            opts.max_log_files,
            guards,
        )?;
        (
            Some(fmt_layer(writer, opts.log_format, false)),
            Some(
                fmt_layer(err_writer, opts.log_format, false)
                    .with_filter(filter::LevelFilter::ERROR),
            ),
        )
    };

    let (dyn_filter, reload_handle) = tracing_subscriber::reload::Layer::new(targets);

    let subscriber = Registry::default()
        .with(dyn_filter)
        .with(stdout_layer)
        .with(file_layer)
        .with(err_file_layer);

    tracing::subscriber::set_global_default(subscriber).context(SetGlobalDefaultSnafu)?;
    let _ = RELOAD_HANDLE.set(reload_handle);
    Ok(())
}

fn rolling_writer(
    dir: &str,
    prefix: &str,
    max_log_files: usize,
    guards: &mut Vec<WorkerGuard>,
) -> Result<NonBlocking, LoggingError> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::HOURLY)
        .filename_prefix(prefix)
        .max_log_files(max_log_files)
        .build(dir)
        .context(RollingFileSnafu { dir })?;
    let (writer, guard) = tracing_appender::non_blocking(appender);
    guards.push(guard);
    Ok(writer)
}

fn fmt_layer<S>(
    writer: NonBlocking,
    format: LogFormat,
    ansi: bool,
) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    let layer = tracing_subscriber::fmt::Layer::new()
        .with_writer(writer)
        .with_ansi(ansi);
    match format {
        LogFormat::Json => layer
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .boxed(),
        LogFormat::Text => layer.boxed(),
    }
}
