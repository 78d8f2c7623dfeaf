//! Logging helpers: keep player-supplied text on a single log line and attach
//! `key=value` context to validation and progress messages.

use std::fmt::{self, Write};

const MAX_PREVIEW: usize = 200;

/// Escape a submitted command (or any user text) for single-line logging.
///
/// Backslashes, newlines, carriage returns and tabs are escaped, other control
/// characters become `\xNN`, and anything past `MAX_PREVIEW` characters is
/// replaced with an ellipsis.
pub fn escape_log(s: &str) -> String {
    escape_log_with_limit(s, MAX_PREVIEW)
}

pub fn escape_log_with_limit(s: &str, limit: usize) -> String {
    let mut out = String::with_capacity(s.len().min(limit) + 4);
    let mut chars = s.chars();
    for ch in chars.by_ref().take(limit) {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    if chars.next().is_some() {
        out.push('…');
    }
    out
}

/// Structured context appended to log lines, rendered as `key=value` pairs.
///
/// ```
/// use gitquest::logutil::LogContext;
/// let ctx = LogContext::new().with("user", "alice").with("step", "q-step-1");
/// assert_eq!(ctx.to_string(), "user=alice step=q-step-1");
/// ```
#[derive(Debug, Default, Clone)]
pub struct LogContext {
    fields: Vec<(&'static str, String)>,
}

impl LogContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.fields.push((key, escape_log(&value.to_string())));
        self
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (key, value)) in self.fields.iter().enumerate() {
            if idx > 0 {
                f.write_char(' ')?;
            }
            if value.is_empty() || value.contains(' ') {
                write!(f, "{}=\"{}\"", key, value)?;
            } else {
                write!(f, "{}={}", key, value)?;
            }
        }
        Ok(())
    }
}
