#![deny(missing_docs)]
//! Shared logging utilities for the rewrite workspace.
//!
//! Every crate logs through the `rewrite_*` macros below so the background
//! and page sides share one facade. Selected text and model output are user
//! content; log them through [`excerpt`] so a log file never holds a whole
//! document.

/// Maximum number of characters [`excerpt`] keeps.
pub const EXCERPT_CHARS: usize = 48;

/// Shortens user content for log lines: newlines are escaped and anything
/// past [`EXCERPT_CHARS`] characters is replaced by a length marker.
pub fn excerpt(text: &str) -> String {
    let total = text.chars().count();
    let mut out: String = text
        .chars()
        .take(EXCERPT_CHARS)
        .flat_map(|c| match c {
            '\n' => vec!['\\', 'n'],
            '\r' => vec!['\\', 'r'],
            other => vec![other],
        })
        .collect();
    if total > EXCERPT_CHARS {
        out.push_str(&format!("…(+{} chars)", total - EXCERPT_CHARS));
    }
    out
}

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! rewrite_trace {
    ($($arg:tt)*) => {{
        log::trace!($($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! rewrite_debug {
    ($($arg:tt)*) => {{
        log::debug!($($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! rewrite_info {
    ($($arg:tt)*) => {{
        log::info!($($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! rewrite_warn {
    ($($arg:tt)*) => {{
        log::warn!($($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! rewrite_error {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
    }};
}

/// Initializes a terminal logger for tests.
///
/// The level comes from `REWRITE_TEST_LOG` (`trace`, `debug`, `info`, ...)
/// and defaults to debug in debug builds, info otherwise. Safe to call from
/// every test: it no-ops once a logger is installed.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    let default_level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    let level = std::env::var("REWRITE_TEST_LOG")
        .ok()
        .and_then(|raw| raw.parse::<log::LevelFilter>().ok())
        .unwrap_or(default_level);

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
