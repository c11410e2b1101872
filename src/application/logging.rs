//! # Logging
//!
//! Sets up `tracing` with a console sink and a size-capped rotating file sink.
//! Every line is prefixed with the process id and a local timestamp.

use anyhow::{Context, Result};
use clap::ValueEnum;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::domain::config::LoggingConfig;

/// Verbosity selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Critical,
    Error,
    Warning,
    Info,
    Debug,
}

impl LogLevel {
    /// `tracing` has no critical level; it shares ERROR.
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Critical | LogLevel::Error => "error",
            LogLevel::Warning => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }

    pub fn env_filter(self) -> EnvFilter {
        EnvFilter::new(format!(
            "{},hyper=warn,reqwest=warn,rustls=warn,tungstenite=warn,tokio_tungstenite=warn",
            self.as_directive()
        ))
    }
}

/// `<pid> - <yy-mm-dd HH:MM:SS>` in front of every line.
struct PidTime;

impl FormatTime for PidTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{} - {}",
            std::process::id(),
            chrono::Local::now().format("%y-%m-%d %H:%M:%S")
        )
    }
}

/// Installs the global subscriber. Keep the guard alive until exit so the file sink flushes.
pub fn init(level: LogLevel, config: &LoggingConfig) -> Result<WorkerGuard> {
    let dir = Path::new(&config.directory);
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    let file = RotatingFile::open(dir.join(&config.file_name), config.max_bytes, config.backups)
        .context("Failed to open log file")?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_timer(PidTime);
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_timer(PidTime);

    tracing_subscriber::registry()
        .with(level.env_filter())
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install log subscriber")?;

    Ok(guard)
}

/// A log file that rolls over to `name.1 … name.N` once it reaches `max_bytes`.
pub struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    backups: usize,
    file: File,
    written: u64,
}

impl RotatingFile {
    pub fn open(path: impl Into<PathBuf>, max_bytes: u64, backups: usize) -> io::Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();
        Ok(Self {
            path,
            max_bytes,
            backups,
            file,
            written,
        })
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(format!(".{index}"));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.backups == 0 {
            self.file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&self.path)?;
            self.written = 0;
            return Ok(());
        }

        match fs::remove_file(self.backup_path(self.backups)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
            _ => {}
        }
        for index in (1..self.backups).rev() {
            let src = self.backup_path(index);
            if src.exists() {
                fs::rename(&src, self.backup_path(index + 1))?;
            }
        }
        fs::rename(&self.path, self.backup_path(1))?;

        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.written = 0;
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(path: &Path) -> String {
        fs::read_to_string(path).unwrap()
    }

    #[test]
    fn test_rotates_and_caps_backups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.log");
        let mut file = RotatingFile::open(&path, 4, 2).unwrap();

        for i in 1..=4 {
            file.write_all(format!("line-{i}\n").as_bytes()).unwrap();
        }
        file.flush().unwrap();

        assert_eq!(read(&path), "line-4\n");
        assert_eq!(read(&dir.path().join("bot.log.1")), "line-3\n");
        assert_eq!(read(&dir.path().join("bot.log.2")), "line-2\n");
        assert!(!dir.path().join("bot.log.3").exists());
    }

    #[test]
    fn test_no_rotation_under_cap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.log");
        let mut file = RotatingFile::open(&path, 1024, 2).unwrap();

        file.write_all(b"a\n").unwrap();
        file.write_all(b"b\n").unwrap();
        file.flush().unwrap();

        assert_eq!(read(&path), "a\nb\n");
        assert!(!dir.path().join("bot.log.1").exists());
    }

    #[test]
    fn test_zero_backups_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.log");
        let mut file = RotatingFile::open(&path, 4, 0).unwrap();

        file.write_all(b"first\n").unwrap();
        file.write_all(b"second\n").unwrap();
        file.flush().unwrap();

        assert_eq!(read(&path), "second\n");
        assert!(!dir.path().join("bot.log.1").exists());
    }

    #[test]
    fn test_existing_size_counts_toward_cap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.log");
        fs::write(&path, "old\n").unwrap();

        let mut file = RotatingFile::open(&path, 6, 1).unwrap();
        file.write_all(b"new\n").unwrap();
        file.flush().unwrap();

        assert_eq!(read(&path), "new\n");
        assert_eq!(read(&dir.path().join("bot.log.1")), "old\n");
    }

    #[test]
    fn test_critical_shares_error_filter() {
        assert_eq!(LogLevel::Critical.as_directive(), "error");
        assert_eq!(LogLevel::Warning.as_directive(), "warn");
        assert_eq!(
            LogLevel::from_str("warning", false).unwrap(),
            LogLevel::Warning
        );
    }
}
