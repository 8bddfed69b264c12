//! Thread-safe report emission.
//!
//! Every hazard the validator observes becomes one [`Report`]: a headline
//! opening with the operation name, the lock token, and the thread name,
//! optionally followed by captured frames, one per line. Reports serialize
//! through the sink mutex so lines from concurrent threads never interleave;
//! the mutex is released before any user callback runs and is never held
//! together with the registry lock.
//!
//! The destination is chosen once, at the first report, from `LKSMITH_LOG`:
//! `stderr` (default), `stdout`, `syslog`, `file://<path>`, or
//! `callback://0x<hex-address>`. A malformed value falls back to stderr with
//! a one-line diagnostic.

use std::ffi::CString;
use std::fs::File;
use std::io::Write;
use std::sync::LazyLock;

use parking_lot::Mutex;

use crate::error::LockError;
use crate::record::LockToken;

/// Environment variable selecting the report destination.
pub(crate) const LOG_VAR: &str = "LKSMITH_LOG";

/// C-compatible report callback, reachable through
/// `LKSMITH_LOG=callback://0x<hex>`. Receives a POSIX-style error code and
/// the full report text (headline plus frame lines, `\n`-separated).
pub type RawReportFn = extern "C" fn(code: libc::c_int, msg: *const libc::c_char);

/// In-process report hook. While installed, it replaces the configured
/// destination; this is how tests and embedding programs observe reports.
pub type ReportHook = fn(&Report<'_>);

/// One diagnostic event.
#[derive(Debug, Clone, Copy)]
pub struct Report<'a> {
    /// Operation that observed the hazard (`"prelock"`, `"destroy"`, …).
    pub op: &'static str,
    /// The lock involved, if any.
    pub token: Option<LockToken>,
    /// Name of the offending thread.
    pub thread: &'a str,
    pub kind: LockError,
    /// Condition description.
    pub message: &'a str,
    /// Symbolic backtrace attached to the report, innermost frame first.
    pub frames: Option<&'a [String]>,
}

impl Report<'_> {
    /// The single-line opening of the report.
    pub fn headline(&self) -> String {
        match self.token {
            Some(token) => format!(
                "{}(lock={}, thread={}): {}",
                self.op, token, self.thread, self.message
            ),
            None => format!("{}(thread={}): {}", self.op, self.thread, self.message),
        }
    }
}

enum Destination {
    Stderr,
    Stdout,
    File(File),
    #[cfg(unix)]
    Syslog,
    Callback(RawReportFn),
}

static HOOK: Mutex<Option<ReportHook>> = Mutex::new(None);

static SINK: LazyLock<Mutex<Destination>> = LazyLock::new(|| {
    let destination = match std::env::var(LOG_VAR) {
        Err(_) => Destination::Stderr,
        Ok(spec) => match parse_spec(&spec) {
            Ok(destination) => destination,
            Err(reason) => {
                eprintln!("lksmith: {reason}; reporting to stderr instead");
                Destination::Stderr
            }
        },
    };
    Mutex::new(destination)
});

/// Install (or clear) the in-process report hook.
pub fn set_report_hook(hook: Option<ReportHook>) {
    *HOOK.lock() = hook;
}

/// Deliver one report.
pub(crate) fn emit(report: &Report<'_>) {
    // The hook or callback may re-enter instrumented code; pass through.
    let _guard = crate::tls::PassThrough::enter();

    if let Some(hook) = *HOOK.lock() {
        hook(report);
        return;
    }

    let callback = {
        let mut sink = SINK.lock();
        match &mut *sink {
            Destination::Stderr => {
                write_lines(&mut std::io::stderr().lock(), report);
                None
            }
            Destination::Stdout => {
                write_lines(&mut std::io::stdout().lock(), report);
                None
            }
            Destination::File(file) => {
                write_lines(file, report);
                let _ = file.flush();
                None
            }
            #[cfg(unix)]
            Destination::Syslog => {
                syslog_line(&format!("lksmith [{}]: {}", report.kind, report.headline()));
                for frame in report.frames.unwrap_or_default() {
                    syslog_line(&format!("    {frame}"));
                }
                None
            }
            Destination::Callback(callback) => Some(*callback),
        }
    };

    // The sink mutex is never held while user code runs.
    if let Some(callback) = callback {
        let mut text = report.headline();
        for frame in report.frames.unwrap_or_default() {
            text.push('\n');
            text.push_str("    ");
            text.push_str(frame);
        }
        if let Ok(text) = CString::new(text) {
            callback(report.kind.code(), text.as_ptr());
        }
    }
}

fn write_lines(out: &mut impl Write, report: &Report<'_>) {
    let _ = writeln!(out, "lksmith [{}]: {}", report.kind, report.headline());
    for frame in report.frames.unwrap_or_default() {
        let _ = writeln!(out, "    {frame}");
    }
}

#[cfg(unix)]
fn syslog_line(line: &str) {
    if let Ok(line) = CString::new(line) {
        unsafe {
            libc::syslog(libc::LOG_USER | libc::LOG_INFO, c"%s".as_ptr(), line.as_ptr());
        }
    }
}

fn parse_spec(spec: &str) -> Result<Destination, String> {
    match spec {
        "stderr" => Ok(Destination::Stderr),
        "stdout" => Ok(Destination::Stdout),
        #[cfg(unix)]
        "syslog" => Ok(Destination::Syslog),
        _ => {
            if let Some(path) = spec.strip_prefix("file://") {
                return match File::create(path) {
                    Ok(file) => Ok(Destination::File(file)),
                    Err(err) => Err(format!("cannot open log file '{path}': {err}")),
                };
            }
            if let Some(address) = spec.strip_prefix("callback://") {
                return parse_callback(address);
            }
            Err(format!("unintelligible {LOG_VAR} value '{spec}'"))
        }
    }
}

fn parse_callback(address: &str) -> Result<Destination, String> {
    let Some(hex) = address.strip_prefix("0x") else {
        return Err(format!("callback address '{address}' must start with 0x"));
    };
    let raw = usize::from_str_radix(hex, 16)
        .map_err(|_| format!("callback address '{address}' is not hexadecimal"))?;
    if raw == 0 {
        return Err("callback address must be non-null".to_string());
    }
    // Trusting the configured address is the contract of callback://; it
    // must name an `extern "C" fn(c_int, *const c_char)` in this process.
    let callback: RawReportFn = unsafe { std::mem::transmute::<usize, RawReportFn>(raw) };
    Ok(Destination::Callback(callback))
}
