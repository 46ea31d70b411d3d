//! Logging bootstrap: a stderr writer plus an `EnvFilter`, with an
//! optional rolling file appender when a logfile path is configured.

use std::path::Path;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Init(#[from] tracing_subscriber::util::TryInitError),
    #[error("unable to open logfile {path}: {source}")]
    Logfile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Keeps the background flush thread for the optional file appender
/// alive; dropping it stops buffered writes from being flushed.
#[must_use]
pub struct TracingHandle {
    _file_guard: Option<WorkerGuard>,
}

pub struct TracingBuilder {
    level: Level,
    logfile: Option<String>,
}

impl Default for TracingBuilder {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            logfile: None,
        }
    }
}

impl TracingBuilder {
    /// Sets the default log level for all layers. `RUST_LOG` still
    /// takes priority over this value.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Mirrors every event to `path` in addition to stderr, matching
    /// the broker's `Logfile` setting.
    pub fn logfile(mut self, path: impl Into<String>) -> Self {
        self.logfile = Some(path.into());
        self
    }

    pub fn build(self) -> Result<TracingHandle, Error> {
        let env_filter = EnvFilter::builder()
            .with_default_directive(self.level.into())
            .from_env()
            .expect("invalid RUST_LOG");

        let stderr_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .compact();

        let (file_layer, guard) = match &self.logfile {
            Some(path) => {
                let path = Path::new(path);
                let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
                let filename = path
                    .file_name()
                    .ok_or_else(|| Error::Logfile {
                        path: path.display().to_string(),
                        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "missing file name"),
                    })?;
                let appender = tracing_appender::rolling::never(dir, filename);
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);
                let layer = tracing_subscriber::fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .json();
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .try_init()?;

        Ok(TracingHandle { _file_guard: guard })
    }
}
