//! Terminal logging with colored prefixes and in-place status lines.
//!
//! - `log!` / `debug!` for prefixed messages (`debug!` only with `--verbose`)
//! - `WatchStatus` for the single status block shown while watching
//! - `ProgressLine` for in-place counters during transformation and emission
//!
//! ```ignore
//! log!("build"; "{} modules in {} chunks", modules, chunks);
//!
//! let progress = ProgressLine::new(&[("chunks", 3), ("assets", 12)]);
//! progress.inc("chunks");
//! progress.finish();
//! ```

use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType},
};
use owo_colors::OwoColorize;
use parking_lot::Mutex;
use std::{
    io::{Write, stdout},
    sync::LazyLock,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

/// Global verbose flag (set by --verbose CLI argument)
static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Set verbose mode globally
pub fn set_verbose(v: bool) {
    VERBOSE.store(v, Ordering::SeqCst);
}

/// Check if verbose mode is enabled
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

/// Active progress bar count (for log coordination)
static BAR_COUNT: AtomicUsize = AtomicUsize::new(0);

// ============================================================================
// Log Macro
// ============================================================================

/// Log a message with a colored module prefix
///
/// # Usage
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Log a debug message (only shown when --verbose is enabled)
///
/// # Usage
/// ```ignore
/// debug!("module"; "debug info: {}", value);
/// ```
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Log a message with a colored module prefix
#[inline]
#[allow(clippy::cast_possible_truncation)] // Safe: bars count is always small
pub fn log(module: &str, message: &str) {
    let module_lower = module.to_ascii_lowercase();
    let prefix = colorize_prefix(module, &module_lower);

    let mut stdout = stdout().lock();

    let bar_count = BAR_COUNT.load(Ordering::SeqCst);
    if bar_count > 0 {
        execute!(stdout, cursor::MoveUp(bar_count as u16)).ok();
        execute!(stdout, Clear(ClearType::FromCursorDown)).ok();
    } else {
        execute!(stdout, Clear(ClearType::UntilNewLine)).ok();
    }

    writeln!(stdout, "{prefix} {message}").ok();

    if bar_count > 0 {
        for _ in 0..bar_count {
            writeln!(stdout).ok();
        }
    }

    stdout.flush().ok();
}

/// Apply color to a module prefix based on module type
#[inline]
fn colorize_prefix(module: &str, module_lower: &str) -> String {
    let prefix = format!("[{module}]");
    match module_lower {
        "serve" | "hmr" => prefix.bright_blue().bold().to_string(),
        "watch" => prefix.bright_green().bold().to_string(),
        "error" => prefix.bright_red().bold().to_string(),
        "warning" => prefix.bright_magenta().bold().to_string(),
        _ => prefix.bright_yellow().bold().to_string(),
    }
}

// ============================================================================
// Watch Status (single-line status with overwrite)
// ============================================================================

/// Wall-clock time of day (UTC) as HH:MM:SS.
fn now() -> String {
    use std::time::SystemTime;
    let secs = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let hours = (secs / 3600) % 24;
    let minutes = (secs / 60) % 60;
    let seconds = secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Status block for watch mode.
///
/// Each message replaces the previous one so a long serve session keeps
/// a single, current status on screen.
pub struct WatchStatus {
    /// Lines of previous output to clear
    last_lines: usize,
}

static WATCH_STATUS: LazyLock<Mutex<WatchStatus>> =
    LazyLock::new(|| Mutex::new(WatchStatus::new()));

impl WatchStatus {
    pub const fn new() -> Self {
        Self { last_lines: 0 }
    }

    /// Display success message (✓ prefix, green).
    pub fn success(&mut self, message: &str) {
        self.display(format!("{}", "✓".green()), message);
    }

    /// Display unchanged message (dimmed, no symbol).
    pub fn unchanged(&mut self, message: &str) {
        self.display(String::new(), &format!("{}", message.dimmed()));
    }

    /// Display error message (✗ prefix, red) with optional detail.
    pub fn error(&mut self, summary: &str, detail: &str) {
        let message = if detail.is_empty() {
            summary.to_string()
        } else {
            format!("{summary}\n{detail}")
        };
        self.display(format!("{}", "✗".red()), &message);
    }

    fn display(&mut self, symbol: String, message: &str) {
        let mut stdout = stdout().lock();

        if self.last_lines > 0 {
            #[allow(clippy::cast_possible_truncation)]
            let lines = self.last_lines as u16;
            execute!(stdout, cursor::MoveUp(lines)).ok();
            execute!(stdout, Clear(ClearType::FromCursorDown)).ok();
        }

        let timestamp = format!("[{}]", now()).dimmed().to_string();
        let line = if symbol.is_empty() {
            format!("{timestamp} {message}")
        } else {
            format!("{timestamp} {symbol} {message}")
        };

        writeln!(stdout, "{line}").ok();
        stdout.flush().ok();

        self.last_lines = line_count(message);
    }
}

/// Number of terminal lines a status message occupies.
fn line_count(message: &str) -> usize {
    message.matches('\n').count() + 1
}

pub fn status_success(message: &str) {
    WATCH_STATUS.lock().success(message);
}

pub fn status_unchanged(message: &str) {
    WATCH_STATUS.lock().unchanged(message);
}

pub fn status_error(summary: &str, detail: &str) {
    WATCH_STATUS.lock().error(summary, detail);
}

// ============================================================================
// Progress Line (single-line counters)
// ============================================================================

/// Single-line progress display with multiple counters.
///
/// Displays `[build] chunks(2/3) assets(7/12)`; a counter created with a
/// zero total is open-ended and shows only its current value
/// (`modules(42)`), which suits graph discovery where the total is unknown
/// until the graph closes.
///
/// Updates use `try_lock` so worker threads never block on the terminal.
pub struct ProgressLine {
    label: &'static str,
    counters: Vec<Counter>,
    lock: Mutex<()>,
}

struct Counter {
    name: &'static str,
    total: usize,
    current: AtomicUsize,
}

impl Counter {
    fn render(&self) -> String {
        let current = self.current.load(Ordering::Relaxed);
        if self.total == 0 {
            format!("{}({})", self.name, current)
        } else {
            format!("{}({}/{})", self.name, current, self.total)
        }
    }
}

impl ProgressLine {
    /// Progress line under the `[build]` prefix.
    pub fn new(items: &[(&'static str, usize)]) -> Self {
        Self::with_label("build", items)
    }

    pub fn with_label(label: &'static str, items: &[(&'static str, usize)]) -> Self {
        let counters = items
            .iter()
            .map(|&(name, total)| Counter {
                name,
                total,
                current: AtomicUsize::new(0),
            })
            .collect();

        BAR_COUNT.store(1, Ordering::SeqCst);

        let progress = Self {
            label,
            counters,
            lock: Mutex::new(()),
        };
        progress.display(false);
        progress
    }

    /// Increment the counter with the given name.
    #[inline]
    pub fn inc(&self, name: &str) {
        let Some(counter) = self.counters.iter().find(|c| c.name == name) else {
            return;
        };
        counter.current.fetch_add(1, Ordering::Relaxed);
        if self.lock.try_lock().is_some() {
            self.display(false);
        }
    }

    fn line(&self) -> String {
        self.counters
            .iter()
            .map(Counter::render)
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn display(&self, newline: bool) {
        let prefix = colorize_prefix(self.label, self.label);
        let line = self.line();

        let mut stdout = stdout().lock();
        execute!(
            stdout,
            cursor::MoveToColumn(0),
            Clear(ClearType::CurrentLine)
        )
        .ok();
        if newline {
            writeln!(stdout, "{prefix} {line}").ok();
        } else {
            write!(stdout, "{prefix} {line}").ok();
        }
        stdout.flush().ok();
    }

    /// Keep the final counts on screen and move to the next line.
    pub fn finish(self) {
        BAR_COUNT.store(0, Ordering::SeqCst);
        {
            let _guard = self.lock.lock();
            self.display(true);
        }
        std::mem::forget(self);
    }
}

impl Drop for ProgressLine {
    fn drop(&mut self) {
        BAR_COUNT.store(0, Ordering::SeqCst);

        let mut stdout = stdout().lock();
        execute!(
            stdout,
            cursor::MoveToColumn(0),
            Clear(ClearType::CurrentLine)
        )
        .ok();
        stdout.flush().ok();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_status_new() {
        let status = WatchStatus::new();
        assert_eq!(status.last_lines, 0);
    }

    #[test]
    fn test_line_count_error_with_detail() {
        let message = format!("{}\n{}", "failed: src/js/b.js", "script: unexpected token\n  at 3:1");
        assert_eq!(line_count(&message), 3);
        assert_eq!(line_count("rebuilt 1 module"), 1);
    }

    #[test]
    fn test_counter_render_open_and_bounded() {
        let open = Counter {
            name: "modules",
            total: 0,
            current: AtomicUsize::new(42),
        };
        assert_eq!(open.render(), "modules(42)");

        let bounded = Counter {
            name: "chunks",
            total: 3,
            current: AtomicUsize::new(2),
        };
        assert_eq!(bounded.render(), "chunks(2/3)");
    }

    #[test]
    fn test_now_format() {
        let time = now();
        assert_eq!(time.len(), 8);
        assert_eq!(time.matches(':').count(), 2);
    }
}
