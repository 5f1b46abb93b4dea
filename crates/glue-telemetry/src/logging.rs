//! Subscriber construction for hosts and plugin processes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::Subscriber;
use tracing_appender::rolling::{self, RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{TelemetryError, TelemetryResult};

/// How each event is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, for people at a terminal.
    #[default]
    Pretty,
    /// One line per event.
    Compact,
    /// One JSON object per line.
    Json,
}

/// When a rolling log file is replaced by a new one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileRotation {
    /// New file every minute.
    Minutely,
    /// New file every hour.
    Hourly,
    /// New file every day.
    #[default]
    Daily,
    /// Keep writing the same file.
    Never,
}

impl From<FileRotation> for Rotation {
    fn from(rotation: FileRotation) -> Self {
        match rotation {
            FileRotation::Minutely => Rotation::MINUTELY,
            FileRotation::Hourly => Rotation::HOURLY,
            FileRotation::Daily => Rotation::DAILY,
            FileRotation::Never => Rotation::NEVER,
        }
    }
}

/// Settings for [`LogTarget::Rolling`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLogConfig {
    /// Directory the files are created in.
    pub directory: PathBuf,
    /// File name prefix; files are named `<prefix>.<date>.log`.
    pub prefix: String,
    /// Rotation period.
    pub rotation: FileRotation,
    /// Oldest files beyond this count are deleted. `0` keeps everything.
    pub keep: usize,
}

impl Default for FileLogConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
            prefix: "glue".to_string(),
            rotation: FileRotation::default(),
            keep: 0,
        }
    }
}

/// Where events are written.
///
/// A plugin process owns its stdout for the handshake line, so plugins must
/// pick [`LogTarget::Stderr`] or a file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LogTarget {
    /// Standard error.
    #[default]
    Stderr,
    /// Standard output.
    Stdout,
    /// A single file, appended to.
    File {
        /// Path of the log file. Missing parent directories are created.
        path: PathBuf,
    },
    /// Rotating files in a directory.
    Rolling(FileLogConfig),
}

impl LogTarget {
    fn is_terminal_stream(&self) -> bool {
        matches!(self, Self::Stderr | Self::Stdout)
    }

    fn open(&self) -> TelemetryResult<BoxMakeWriter> {
        match self {
            Self::Stderr => Ok(BoxMakeWriter::new(std::io::stderr)),
            Self::Stdout => Ok(BoxMakeWriter::new(std::io::stdout)),
            Self::File { path } => {
                let name = path
                    .file_name()
                    .ok_or_else(|| TelemetryError::InvalidTarget(path.clone()))?;
                let directory = path
                    .parent()
                    .filter(|parent| !parent.as_os_str().is_empty())
                    .unwrap_or_else(|| Path::new("."));
                create_dir(directory)?;
                Ok(BoxMakeWriter::new(rolling::never(directory, name)))
            },
            Self::Rolling(file) => {
                create_dir(&file.directory)?;
                let mut builder = RollingFileAppender::builder()
                    .rotation(file.rotation.into())
                    .filename_prefix(&file.prefix)
                    .filename_suffix("log");
                if file.keep > 0 {
                    builder = builder.max_log_files(file.keep);
                }
                let appender = builder.build(&file.directory).map_err(|e| {
                    TelemetryError::Output {
                        path: file.directory.clone(),
                        source: std::io::Error::other(e),
                    }
                })?;
                Ok(BoxMakeWriter::new(appender))
            },
        }
    }
}

fn create_dir(path: &Path) -> TelemetryResult<()> {
    std::fs::create_dir_all(path).map_err(|source| TelemetryError::Output {
        path: path.to_path_buf(),
        source,
    })
}

/// Logging configuration shared by the host and plugin processes.
///
/// Deserializes from a `[logging]` table; every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Base filter in `EnvFilter` syntax, e.g. `info` or `warn,glue_host=debug`.
    pub filter: String,
    /// Extra directives appended to `filter`.
    pub directives: Vec<String>,
    /// Event rendering.
    pub format: LogFormat,
    /// Output destination.
    pub target: LogTarget,
    /// Prefix events with a timestamp.
    pub timestamps: bool,
    /// Colorize output. Ignored for files and JSON.
    pub ansi: bool,
    /// Include the source file and line of each event.
    pub source_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            directives: Vec::new(),
            format: LogFormat::default(),
            target: LogTarget::default(),
            timestamps: true,
            ansi: true,
            source_location: false,
        }
    }
}

impl LogConfig {
    /// Default settings with `filter` as the base filter.
    #[must_use]
    pub fn new(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            ..Self::default()
        }
    }

    /// Settings for a plugin subprocess.
    ///
    /// Compact, uncolored lines on stderr. The host reads that stream and
    /// re-emits each line through its own subscriber.
    #[must_use]
    pub fn for_plugin(filter: impl Into<String>) -> Self {
        Self::new(filter)
            .with_format(LogFormat::Compact)
            .with_target(LogTarget::Stderr)
            .without_ansi()
    }

    /// Set the event format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the output destination.
    #[must_use]
    pub fn with_target(mut self, target: LogTarget) -> Self {
        self.target = target;
        self
    }

    /// Append to the file at `path`.
    #[must_use]
    pub fn with_log_file(self, path: impl Into<PathBuf>) -> Self {
        self.with_target(LogTarget::File { path: path.into() })
    }

    /// Write rotating files named `<prefix>.<date>.log` into `directory`.
    #[must_use]
    pub fn with_rotating_files(
        self,
        directory: impl Into<PathBuf>,
        prefix: impl Into<String>,
        rotation: FileRotation,
    ) -> Self {
        self.with_target(LogTarget::Rolling(FileLogConfig {
            directory: directory.into(),
            prefix: prefix.into(),
            rotation,
            keep: 0,
        }))
    }

    /// Append a directive such as `glue_wire=trace`.
    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    /// Omit timestamps.
    #[must_use]
    pub fn without_timestamps(mut self) -> Self {
        self.timestamps = false;
        self
    }

    /// Disable colors.
    #[must_use]
    pub fn without_ansi(mut self) -> Self {
        self.ansi = false;
        self
    }

    /// Record the source location of each event.
    #[must_use]
    pub fn with_source_location(mut self) -> Self {
        self.source_location = true;
        self
    }

    fn env_filter(&self) -> TelemetryResult<EnvFilter> {
        let spec = std::iter::once(self.filter.as_str())
            .chain(self.directives.iter().map(String::as_str))
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join(",");

        EnvFilter::builder()
            .parse(&spec)
            .map_err(|e| TelemetryError::InvalidFilter {
                filter: spec,
                reason: e.to_string(),
            })
    }

    fn use_ansi(&self) -> bool {
        self.ansi && self.format != LogFormat::Json && self.target.is_terminal_stream()
    }

    fn fmt_layer<S>(&self, writer: BoxMakeWriter) -> Box<dyn Layer<S> + Send + Sync + 'static>
    where
        S: Subscriber + for<'span> LookupSpan<'span>,
    {
        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(self.use_ansi())
            .with_file(self.source_location)
            .with_line_number(self.source_location);

        match (self.format, self.timestamps) {
            (LogFormat::Pretty, true) => layer.pretty().boxed(),
            (LogFormat::Pretty, false) => layer.pretty().without_time().boxed(),
            (LogFormat::Compact, true) => layer.compact().boxed(),
            (LogFormat::Compact, false) => layer.compact().without_time().boxed(),
            (LogFormat::Json, true) => layer.json().boxed(),
            (LogFormat::Json, false) => layer.json().without_time().boxed(),
        }
    }
}

/// Install a global subscriber built from `config`.
///
/// # Errors
///
/// Returns an error if the filter does not parse, the output cannot be
/// opened, or a global subscriber is already installed.
pub fn setup_logging(config: &LogConfig) -> TelemetryResult<()> {
    let filter = config.env_filter()?;
    let writer = config.target.open()?;

    tracing_subscriber::registry()
        .with(config.fmt_layer(writer).with_filter(filter))
        .try_init()
        .map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))
}

/// Install the default subscriber: `info`, pretty, stderr.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn setup_default_logging() -> TelemetryResult<()> {
    setup_logging(&LogConfig::default())
}
