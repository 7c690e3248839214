//! Protocol engine: command encoding, response classification, stat
//! decoding, and the write-then-read exchange every operation uses.
//!
//! One exchange is always: encode the header line, send it (plus the
//! raw body for `put`), read exactly one status line, classify it
//! against the operation's expected success/failure tokens, then pull
//! the optional trailing block (job body or stat text) whose byte
//! length the status line declared.
//!
//! The `ops` submodule holds the id-shaped implementations of the
//! verbs that exist in two call shapes (`stats`, `kick`, `bury`,
//! `release`, `touch`, `delete`). [`crate::Connection`] calls them
//! with an explicit id; [`crate::Job`] delegates through its owning
//! wire with its own id. Both shapes put identical bytes on the wire.

pub mod command;
pub mod response;
pub mod stats;

pub use stats::{StatTable, StatValue};

use std::str::FromStr;

use bytes::Bytes;

use crate::error::{BeanlineError, Result};
use crate::transport::Wire;
use command::CommandLine;
use response::StatusLine;

/// Parse one result token as an integer field, rejecting absence or a
/// non-numeric token as a protocol error.
pub(crate) fn parse_field<T: FromStr>(token: Option<&String>, field: &str) -> Result<T> {
    let token =
        token.ok_or_else(|| BeanlineError::Protocol(format!("missing {field} in reply")))?;
    token
        .parse()
        .map_err(|_| BeanlineError::Protocol(format!("invalid {field}: {token:?}")))
}

/// Run one command exchange and classify the reply.
///
/// Writes the header line (and the raw body, for `put`), reads one
/// status line, and returns the result tokens of a success status.
pub(crate) fn interact(
    wire: &mut Wire,
    header: &str,
    body: Option<&[u8]>,
    ok: &[&str],
    err: &[&str],
) -> Result<Vec<String>> {
    let verb = header.split(' ').next().unwrap_or(header);
    tracing::debug!(command = verb, "sending command");

    wire.send(header, body)?;
    let line = wire.read_line()?;
    let status = StatusLine::parse(&line);
    tracing::debug!(command = verb, status = %status.status, "broker replied");

    let result = status.classify(ok, err);
    if let Err(BeanlineError::Unexpected { status, .. }) = &result {
        tracing::warn!(command = verb, status = %status, "unrecognized status token");
    }
    result
}

/// Exchange expecting a single-scalar reply (a tube name, a count, an
/// id); returns the first result token.
pub(crate) fn interact_value(
    wire: &mut Wire,
    header: &str,
    ok: &[&str],
    err: &[&str],
) -> Result<String> {
    let mut args = interact(wire, header, None, ok, err)?;
    if args.is_empty() {
        return Err(BeanlineError::Protocol(format!(
            "missing result token in {ok:?} reply"
        )));
    }
    Ok(args.remove(0))
}

/// Exchange expecting `(id, length)` plus a trailing body of exactly
/// `length` bytes.
pub(crate) fn interact_job(
    wire: &mut Wire,
    header: &str,
    ok: &[&str],
    err: &[&str],
) -> Result<(u64, Bytes)> {
    let args = interact(wire, header, None, ok, err)?;
    let id: u64 = parse_field(args.first(), "job id")?;
    let len: usize = parse_field(args.get(1), "body length")?;
    let body = wire.read_body(len)?;
    Ok((id, body))
}

/// Peek-family exchange: `FOUND` yields the job, `NOT_FOUND` is
/// downgraded to `None` rather than propagated.
pub(crate) fn interact_peek(wire: &mut Wire, header: &str) -> Result<Option<(u64, Bytes)>> {
    match interact_job(wire, header, &["FOUND"], &["NOT_FOUND"]) {
        Ok(found) => Ok(Some(found)),
        Err(e) if e.is_failure("NOT_FOUND") => Ok(None),
        Err(e) => Err(e),
    }
}

/// Exchange whose reply declares the byte length of a trailing flat
/// mapping block; decodes it into a [`StatTable`].
pub(crate) fn interact_table(
    wire: &mut Wire,
    header: &str,
    ok: &[&str],
    err: &[&str],
) -> Result<StatTable> {
    let text = read_block(wire, header, ok, err)?;
    Ok(stats::parse_table(&text))
}

/// Exchange whose reply declares the byte length of a trailing
/// top-level list block; decodes it preserving order.
pub(crate) fn interact_list(
    wire: &mut Wire,
    header: &str,
    ok: &[&str],
    err: &[&str],
) -> Result<Vec<String>> {
    let text = read_block(wire, header, ok, err)?;
    Ok(stats::parse_list(&text))
}

fn read_block(wire: &mut Wire, header: &str, ok: &[&str], err: &[&str]) -> Result<String> {
    let args = interact(wire, header, None, ok, err)?;
    let len: usize = parse_field(args.first(), "block length")?;
    let block = wire.read_body(len)?;
    Ok(String::from_utf8_lossy(&block).into_owned())
}

/// Id-shaped implementations of the dual-shape verbs.
pub(crate) mod ops {
    use super::*;

    pub(crate) fn delete(wire: &mut Wire, id: u64) -> Result<()> {
        let line = CommandLine::new("delete").arg(id).into_string();
        interact(wire, &line, None, &["DELETED"], &["NOT_FOUND"]).map(|_| ())
    }

    pub(crate) fn release(wire: &mut Wire, id: u64, pri: u32, delay: u32) -> Result<()> {
        let line = CommandLine::new("release")
            .arg(id)
            .arg(pri)
            .arg(delay)
            .into_string();
        interact(wire, &line, None, &["RELEASED", "BURIED"], &["NOT_FOUND"]).map(|_| ())
    }

    pub(crate) fn bury(wire: &mut Wire, id: u64, pri: u32) -> Result<()> {
        let line = CommandLine::new("bury").arg(id).arg(pri).into_string();
        interact(wire, &line, None, &["BURIED"], &["NOT_FOUND"]).map(|_| ())
    }

    pub(crate) fn touch(wire: &mut Wire, id: u64) -> Result<()> {
        let line = CommandLine::new("touch").arg(id).into_string();
        interact(wire, &line, None, &["TOUCHED"], &["NOT_FOUND"]).map(|_| ())
    }

    pub(crate) fn kick_job(wire: &mut Wire, id: u64) -> Result<()> {
        let line = CommandLine::new("kick-job").arg(id).into_string();
        interact(wire, &line, None, &["KICKED"], &["NOT_FOUND"]).map(|_| ())
    }

    pub(crate) fn stats_job(wire: &mut Wire, id: u64) -> Result<StatTable> {
        let line = CommandLine::new("stats-job").arg(id).into_string();
        interact_table(wire, &line, &["OK"], &["NOT_FOUND"])
    }
}
