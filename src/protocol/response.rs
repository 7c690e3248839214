//! Status line parsing and classification.
//!
//! Every broker reply starts with one status line:
//! `<status-token> <result tokens...>`. The caller of each operation
//! declares which tokens count as success and which as recognized
//! failure; a token in neither set is a protocol desynchronization and
//! always surfaces as [`BeanlineError::Unexpected`].

use crate::error::{BeanlineError, Result};

/// A split status line. Transient; used only to decide control flow
/// for a single exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    /// First token of the line.
    pub status: String,
    /// Remaining tokens, in order.
    pub args: Vec<String>,
}

impl StatusLine {
    /// Split a raw line on single spaces into status plus result tokens.
    pub fn parse(line: &str) -> Self {
        let mut tokens = line.split(' ').map(str::to_string);
        let status = tokens.next().unwrap_or_default();
        Self {
            status,
            args: tokens.collect(),
        }
    }

    /// Classify against the caller's expected token sets.
    ///
    /// Returns the result tokens on a success status, a
    /// [`BeanlineError::Command`] on a recognized failure status, and a
    /// [`BeanlineError::Unexpected`] on anything else (including the
    /// empty or truncated lines the line reader hands back at EOF).
    pub fn classify(self, ok: &[&str], err: &[&str]) -> Result<Vec<String>> {
        if ok.contains(&self.status.as_str()) {
            return Ok(self.args);
        }
        if err.contains(&self.status.as_str()) {
            return Err(BeanlineError::Command {
                status: self.status,
                args: self.args,
            });
        }
        Err(BeanlineError::Unexpected {
            status: self.status,
            args: self.args,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_and_args() {
        let line = StatusLine::parse("RESERVED 42 11");
        assert_eq!(line.status, "RESERVED");
        assert_eq!(line.args, vec!["42", "11"]);
    }

    #[test]
    fn test_parse_status_only() {
        let line = StatusLine::parse("DELETED");
        assert_eq!(line.status, "DELETED");
        assert!(line.args.is_empty());
    }

    #[test]
    fn test_parse_empty_line() {
        let line = StatusLine::parse("");
        assert_eq!(line.status, "");
        assert!(line.args.is_empty());
    }

    #[test]
    fn test_classify_success_returns_args() {
        let args = StatusLine::parse("INSERTED 7")
            .classify(&["INSERTED"], &["DRAINING"])
            .unwrap();
        assert_eq!(args, vec!["7"]);
    }

    #[test]
    fn test_classify_recognized_failure() {
        let err = StatusLine::parse("NOT_FOUND")
            .classify(&["DELETED"], &["NOT_FOUND"])
            .unwrap_err();
        assert!(err.is_failure("NOT_FOUND"));
    }

    #[test]
    fn test_classify_failure_keeps_args() {
        let err = StatusLine::parse("BURIED 12")
            .classify(&["INSERTED"], &["BURIED"])
            .unwrap_err();
        match err {
            BeanlineError::Command { status, args } => {
                assert_eq!(status, "BURIED");
                assert_eq!(args, vec!["12"]);
            }
            other => panic!("wrong error kind: {other:?}"),
        }
    }

    #[test]
    fn test_classify_unrecognized_token_is_unexpected() {
        let err = StatusLine::parse("WAT 1 2")
            .classify(&["OK"], &["NOT_FOUND"])
            .unwrap_err();
        assert!(matches!(err, BeanlineError::Unexpected { .. }));
    }

    #[test]
    fn test_classify_truncated_line_is_unexpected() {
        let err = StatusLine::parse("").classify(&["OK"], &[]).unwrap_err();
        assert!(matches!(err, BeanlineError::Unexpected { .. }));
    }
}
