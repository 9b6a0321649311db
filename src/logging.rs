//! Run logging: timestamped lines to stderr and to a per-run log file.
//!
//! The crate logs through the `log` facade only. The binary installs
//! `env_logger` once at startup with [`init`]. `RUST_LOG` is honored, with
//! `info` as the default level and `debug` when requested.

use chrono::{DateTime, Local};
use log::LevelFilter;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::LoggingError;

/// Prefix of every run's log file name.
pub const LOG_FILE_PREFIX: &str = "sso-membership_run_";

/// `sso-membership_run_<YYYYmmddHHMMSS>.log`
pub fn log_file_name(started: DateTime<Local>) -> String {
    format!("{LOG_FILE_PREFIX}{}.log", started.format("%Y%m%d%H%M%S"))
}

/// Copies every log line to stderr and to a file.
pub struct TeeWriter<W> {
    file: W,
}

impl<W: Write> TeeWriter<W> {
    pub fn new(file: W) -> Self {
        Self { file }
    }
}

impl<W: Write> Write for TeeWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

/// Install the global logger and return the path of this run's log file.
///
/// # Errors
///
/// * [`LoggingError::File`] if the log file cannot be created in `log_dir`
/// * [`LoggingError::AlreadyInitialized`] if a logger is already installed
pub fn init(debug: bool, log_dir: &Path) -> Result<PathBuf, LoggingError> {
    let path = log_dir.join(log_file_name(Local::now()));
    let file = File::create(&path).map_err(|source| LoggingError::File {
        path: path.display().to_string(),
        source,
    })?;

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if debug {
        builder.filter_level(LevelFilter::Debug);
    }
    builder
        .filter_module("hyper_util", LevelFilter::Info)
        .filter_module("rustls", LevelFilter::Info)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(TeeWriter::new(file))))
        .try_init()?;

    Ok(path)
}
