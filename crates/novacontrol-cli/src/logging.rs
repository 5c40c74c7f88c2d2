//! Tracing setup
//!
//! Terminal filter: `--debug` > `--verbose` > `RUST_LOG` > `logging.level`.
//! The optional file layer shares the same filter and never emits ANSI.
//!
//! The keyboard hook puts the terminal in raw mode, where a bare `\n` no
//! longer returns the carriage, so terminal output goes through
//! [`TerminalMakeWriter`] which writes `\r\n` line endings.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use novacontrol_core::config::LoggingConfig;

pub fn filter_directive(config: &LoggingConfig, debug: bool, verbose: bool) -> String {
    if debug {
        "debug".to_string()
    } else if verbose {
        "info,novacontrol=debug,novacontrol_core=debug".to_string()
    } else {
        std::env::var(EnvFilter::DEFAULT_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| config.level.clone())
    }
}

pub fn init(config: &LoggingConfig, debug: bool, verbose: bool) -> Result<()> {
    let directive = filter_directive(config, debug, verbose);
    let terminal_layer = fmt::layer()
        .with_target(false)
        .with_writer(TerminalMakeWriter)
        .with_filter(EnvFilter::new(&directive));

    let file_layer = if config.file {
        let file = open_log_file(config)?;
        Some(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(FileMakeWriter::new(file))
                .with_filter(EnvFilter::new(&directive)),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(terminal_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;
    Ok(())
}

fn open_log_file(config: &LoggingConfig) -> Result<Arc<Mutex<File>>> {
    std::fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("Failed to create log dir {}", config.log_dir.display()))?;
    let path = config.log_file_path();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;
    Ok(Arc::new(Mutex::new(file)))
}

/// Writes to stderr with `\r\n` line endings
#[derive(Clone, Copy)]
pub struct TerminalMakeWriter;

impl<'a> fmt::MakeWriter<'a> for TerminalMakeWriter {
    type Writer = TerminalWriter;

    fn make_writer(&'a self) -> Self::Writer {
        TerminalWriter {
            buf: Vec::with_capacity(256),
        }
    }
}

/// Buffers one event and writes it on drop
pub struct TerminalWriter {
    buf: Vec<u8>,
}

impl Write for TerminalWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for TerminalWriter {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let out = with_crlf(&self.buf);
        let mut stderr = io::stderr().lock();
        let _ = stderr.write_all(&out);
        let _ = stderr.flush();
    }
}

fn with_crlf(buf: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(buf.len() + 8);
    let mut prev = 0u8;
    for &byte in buf {
        if byte == b'\n' && prev != b'\r' {
            out.push(b'\r');
        }
        out.push(byte);
        prev = byte;
    }
    out
}

#[derive(Clone)]
pub struct FileMakeWriter {
    file: Arc<Mutex<File>>,
}

impl FileMakeWriter {
    pub fn new(file: Arc<Mutex<File>>) -> Self {
        Self { file }
    }
}

impl<'a> fmt::MakeWriter<'a> for FileMakeWriter {
    type Writer = FileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        FileWriter {
            file: Arc::clone(&self.file),
            buf: Vec::with_capacity(256),
        }
    }
}

/// Buffers one event and appends it to the log file on drop
pub struct FileWriter {
    file: Arc<Mutex<File>>,
    buf: Vec<u8>,
}

impl Write for FileWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for FileWriter {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let mut file = self.file.lock();
        let _ = file.write_all(&self.buf);
        let _ = file.flush();
    }
}
