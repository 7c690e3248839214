//! Command encoding.
//!
//! A request header is the verb and its arguments joined by single
//! spaces; numeric arguments render in their natural base-10 form (no
//! sign, no leading zeros). The transport appends the CRLF terminator,
//! and for `put` the raw body plus one more terminator, so the encoder
//! itself never emits framing bytes.
//!
//! # Example
//!
//! ```
//! use beanline::protocol::command::CommandLine;
//!
//! let line = CommandLine::new("release").arg(42u64).arg(0u32).arg(10u32);
//! assert_eq!(line.as_str(), "release 42 0 10");
//! ```

use std::fmt::Display;
use std::fmt::Write as _;

/// Builder for one command header line.
#[derive(Debug, Clone)]
pub struct CommandLine {
    buf: String,
}

impl CommandLine {
    /// Start a line with the given verb. With no arguments added the
    /// line is just the verb.
    pub fn new(verb: &str) -> Self {
        Self {
            buf: verb.to_string(),
        }
    }

    /// Append one space-separated argument.
    pub fn arg(mut self, value: impl Display) -> Self {
        self.buf.push(' ');
        // Writing a Display into a String cannot fail.
        let _ = write!(self.buf, "{value}");
        self
    }

    /// The encoded header line, without any terminator.
    pub fn as_str(&self) -> &str {
        &self.buf
    }

    /// Consume the builder, yielding the encoded line.
    pub fn into_string(self) -> String {
        self.buf
    }
}
