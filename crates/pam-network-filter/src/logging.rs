//! # Syslog Logging
//!
//! The module runs inside someone else's process, so it never installs a
//! global subscriber. Each entry point runs under a scoped [`Dispatch`]
//! whose `fmt` layer writes one syslog record per event at `LOG_AUTHPRIV`.
//!
//! | Setting | Effect |
//! |---------|--------|
//! | `PAM_NETWORK_FILTER_LOG` | `EnvFilter` directives, default `info` |
//! | `debug` module argument | Forces `debug` for that call |
//!
//! The host's syslog identity is left alone; records are prefixed with
//! `pam_network_filter:` instead of calling `openlog`.

use std::ffi::{c_int, CString};
use std::io::{self, Write};
use std::sync::OnceLock;

use tracing::dispatcher::{self, Dispatch};
use tracing::{Level, Metadata};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Environment variable holding filter directives.
pub const LOG_ENV: &str = "PAM_NETWORK_FILTER_LOG";

const PREFIX: &str = "pam_network_filter: ";

static STANDARD: OnceLock<Dispatch> = OnceLock::new();
static VERBOSE: OnceLock<Dispatch> = OnceLock::new();

/// Run `f` with module logging routed to syslog.
pub fn with_module_logging<T>(debug: bool, f: impl FnOnce() -> T) -> T {
    let dispatch = if debug {
        VERBOSE.get_or_init(|| build_dispatch(true))
    } else {
        STANDARD.get_or_init(|| build_dispatch(false))
    };
    dispatcher::with_default(dispatch, f)
}

fn build_dispatch(debug: bool) -> Dispatch {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(SyslogMakeWriter)
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .with_level(false)
        .finish();
    Dispatch::new(subscriber)
}

/// Syslog priority for a tracing level.
pub fn priority_for(level: &Level) -> c_int {
    match *level {
        Level::ERROR => libc::LOG_ERR,
        Level::WARN => libc::LOG_WARNING,
        Level::INFO => libc::LOG_INFO,
        Level::DEBUG | Level::TRACE => libc::LOG_DEBUG,
    }
}

/// Hands out one [`SyslogWriter`] per event.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyslogMakeWriter;

impl<'a> MakeWriter<'a> for SyslogMakeWriter {
    type Writer = SyslogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SyslogWriter::new(libc::LOG_INFO)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        SyslogWriter::new(priority_for(meta.level()))
    }
}

/// Buffers one formatted event and sends it to syslog on drop.
#[derive(Debug)]
pub struct SyslogWriter {
    priority: c_int,
    buf: Vec<u8>,
}

impl SyslogWriter {
    fn new(priority: c_int) -> Self {
        Self {
            priority,
            buf: Vec::new(),
        }
    }

    /// The record as it will be sent: prefixed, one line, no NULs.
    fn record(&self) -> Option<CString> {
        let text = String::from_utf8_lossy(&self.buf);
        let text = text.trim_end();
        if text.is_empty() {
            return None;
        }
        let line = format!("{}{}", PREFIX, text.replace(['\n', '\0'], " "));
        CString::new(line).ok()
    }

    fn emit(&mut self) {
        if let Some(record) = self.record() {
            // SAFETY: "%s" with one NUL-terminated argument.
            unsafe {
                libc::syslog(libc::LOG_AUTHPRIV | self.priority, c"%s".as_ptr(), record.as_ptr());
            }
        }
        self.buf.clear();
    }
}

impl Write for SyslogWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for SyslogWriter {
    fn drop(&mut self) {
        self.emit();
    }
}
