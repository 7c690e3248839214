//! Connection lifecycle and the connection-shaped operation surface.
//!
//! A [`Connection`] owns one broker socket, opened by an explicit
//! [`connect`](Connection::connect) and released by
//! [`close`](Connection::close) or drop. The protocol allows exactly
//! one in-flight command per connection; every operation here holds
//! the wire lock for its whole write-then-read exchange, so sharing a
//! `Connection` between threads serializes rather than interleaves.
//! There is no reconnect, no retry, and no pipelining.
//!
//! Jobs returned by `reserve` and the peek family carry a weak back
//! reference to this connection's wire; see [`crate::Job`] for the
//! job-shaped call surface.
//!
//! # Example
//!
//! ```no_run
//! use beanline::Connection;
//!
//! fn main() -> beanline::Result<()> {
//!     let conn = Connection::connect("127.0.0.1:11300")?;
//!     conn.use_tube("invoices")?;
//!     let id = conn.put_default(b"render #1042")?;
//!
//!     conn.watch("invoices")?;
//!     if let Some(job) = conn.reserve_with_timeout(5)? {
//!         assert_eq!(job.id(), id);
//!         job.delete()?;
//!     }
//!     conn.close();
//!     Ok(())
//! }
//! ```

use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::Result;
use crate::job::Job;
use crate::protocol::command::CommandLine;
use crate::protocol::{self, ops, StatTable};
use crate::transport::Wire;
use crate::{DEFAULT_DELAY, DEFAULT_PRIORITY, DEFAULT_TTR};

/// One open connection to the broker.
#[derive(Debug)]
pub struct Connection {
    wire: Arc<Mutex<Wire>>,
}

impl Connection {
    /// Connect to a broker at `"host:port"` or `(host, port)`.
    ///
    /// # Errors
    ///
    /// [`BeanlineError::Io`](crate::BeanlineError::Io) on refusal or
    /// resolution failure. The core never reconnects on its own.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        Self::from_stream(stream)
    }

    /// Connect with an upper bound on how long the TCP handshake may
    /// take. Commands issued later still block without a deadline.
    pub fn connect_timeout(addr: &SocketAddr, timeout: Duration) -> Result<Self> {
        let stream = TcpStream::connect_timeout(addr, timeout)?;
        Self::from_stream(stream)
    }

    fn from_stream(stream: TcpStream) -> Result<Self> {
        // Command lines are tiny; never let Nagle hold one back.
        stream.set_nodelay(true)?;
        if let Ok(peer) = stream.peer_addr() {
            tracing::debug!(%peer, "connected to broker");
        }
        Ok(Self {
            wire: Arc::new(Mutex::new(Wire::new(stream)?)),
        })
    }

    /// Close the connection, releasing the transport.
    ///
    /// Taking `self` by value makes a double close unrepresentable.
    /// Dropping the connection has the same effect, which is what
    /// gives [`with_connection`] its close-on-every-path guarantee.
    /// Jobs still holding a back reference to this connection fail
    /// with [`ConnectionClosed`](crate::BeanlineError::ConnectionClosed)
    /// afterwards.
    pub fn close(self) {}

    fn job(&self, id: u64, body: bytes::Bytes, reserved: bool) -> Job {
        Job::new(Arc::downgrade(&self.wire), id, body, reserved)
    }

    // --- producer side ---

    /// Submit a job body into the currently used tube.
    ///
    /// Returns the new job id. Recognized failures: `JOB_TOO_BIG`,
    /// `BURIED` (out of memory, job buried on arrival), `DRAINING`.
    pub fn put(&self, body: &[u8], pri: u32, delay: u32, ttr: u32) -> Result<u64> {
        let line = CommandLine::new("put")
            .arg(pri)
            .arg(delay)
            .arg(ttr)
            .arg(body.len())
            .into_string();
        let args = protocol::interact(
            &mut self.wire.lock(),
            &line,
            Some(body),
            &["INSERTED"],
            &["JOB_TOO_BIG", "BURIED", "DRAINING"],
        )?;
        protocol::parse_field(args.first(), "job id")
    }

    /// [`put`](Self::put) with the crate defaults:
    /// [`DEFAULT_PRIORITY`], [`DEFAULT_DELAY`], [`DEFAULT_TTR`].
    pub fn put_default(&self, body: &[u8]) -> Result<u64> {
        self.put(body, DEFAULT_PRIORITY, DEFAULT_DELAY, DEFAULT_TTR)
    }

    /// Select the tube subsequent `put`s go to. Returns the tube name
    /// the broker echoes back.
    pub fn use_tube(&self, tube: &str) -> Result<String> {
        let line = CommandLine::new("use").arg(tube).into_string();
        protocol::interact_value(&mut self.wire.lock(), &line, &["USING"], &[])
    }

    // --- consumer side ---

    /// Reserve the next ready job from the watched tubes, blocking
    /// until one is available or the peer closes the connection.
    ///
    /// `DEADLINE_SOON` surfaces as a recognized
    /// [`Command`](crate::BeanlineError::Command) failure.
    pub fn reserve(&self) -> Result<Job> {
        let (id, body) = protocol::interact_job(
            &mut self.wire.lock(),
            "reserve",
            &["RESERVED"],
            &["DEADLINE_SOON", "TIMED_OUT"],
        )?;
        Ok(self.job(id, body, true))
    }

    /// Reserve with a server-side timeout in seconds.
    ///
    /// `TIMED_OUT` is downgraded to `Ok(None)` - the one place a
    /// recognized failure token becomes a normal empty result. A
    /// timeout of `0` returns immediately when nothing is ready.
    pub fn reserve_with_timeout(&self, timeout: u32) -> Result<Option<Job>> {
        let line = CommandLine::new("reserve-with-timeout")
            .arg(timeout)
            .into_string();
        let outcome = protocol::interact_job(
            &mut self.wire.lock(),
            &line,
            &["RESERVED"],
            &["DEADLINE_SOON", "TIMED_OUT"],
        );
        match outcome {
            Ok((id, body)) => Ok(Some(self.job(id, body, true))),
            Err(e) if e.is_failure("TIMED_OUT") => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Add a tube to the watch set. Returns the new watch count.
    pub fn watch(&self, tube: &str) -> Result<u32> {
        let line = CommandLine::new("watch").arg(tube).into_string();
        let count = protocol::interact_value(&mut self.wire.lock(), &line, &["WATCHING"], &[])?;
        protocol::parse_field(Some(&count), "watch count")
    }

    /// Remove a tube from the watch set. Returns the new watch count;
    /// ignoring the last watched tube fails with `NOT_IGNORED`.
    pub fn ignore(&self, tube: &str) -> Result<u32> {
        let line = CommandLine::new("ignore").arg(tube).into_string();
        let count = protocol::interact_value(
            &mut self.wire.lock(),
            &line,
            &["WATCHING"],
            &["NOT_IGNORED"],
        )?;
        protocol::parse_field(Some(&count), "watch count")
    }

    // --- peeking ---

    fn peek_line(&self, line: &str) -> Result<Option<Job>> {
        let found = protocol::interact_peek(&mut self.wire.lock(), line)?;
        Ok(found.map(|(id, body)| self.job(id, body, false)))
    }

    /// Look at a job by id without reserving it.
    pub fn peek(&self, id: u64) -> Result<Option<Job>> {
        let line = CommandLine::new("peek").arg(id).into_string();
        self.peek_line(&line)
    }

    /// Look at the next ready job in the used tube.
    pub fn peek_ready(&self) -> Result<Option<Job>> {
        self.peek_line("peek-ready")
    }

    /// Look at the delayed job with the shortest remaining delay.
    pub fn peek_delayed(&self) -> Result<Option<Job>> {
        self.peek_line("peek-delayed")
    }

    /// Look at the oldest buried job in the used tube.
    pub fn peek_buried(&self) -> Result<Option<Job>> {
        self.peek_line("peek-buried")
    }

    // --- dual-shape verbs, id form ---

    /// Delete a job by id.
    pub fn delete(&self, id: u64) -> Result<()> {
        ops::delete(&mut self.wire.lock(), id)
    }

    /// Release a reserved job back to the ready (or delayed) queue.
    pub fn release(&self, id: u64, pri: u32, delay: u32) -> Result<()> {
        ops::release(&mut self.wire.lock(), id, pri, delay)
    }

    /// Bury a reserved job with an explicit priority.
    pub fn bury(&self, id: u64, pri: u32) -> Result<()> {
        ops::bury(&mut self.wire.lock(), id, pri)
    }

    /// Refresh a reserved job's time-to-run window.
    pub fn touch(&self, id: u64) -> Result<()> {
        ops::touch(&mut self.wire.lock(), id)
    }

    /// Kick one job by id back to ready.
    pub fn kick_job(&self, id: u64) -> Result<()> {
        ops::kick_job(&mut self.wire.lock(), id)
    }

    /// Kick up to `bound` buried (or, if none, delayed) jobs in the
    /// used tube back to ready. Returns the number actually kicked.
    pub fn kick(&self, bound: u64) -> Result<u64> {
        let line = CommandLine::new("kick").arg(bound).into_string();
        let count =
            protocol::interact_value(&mut self.wire.lock(), &line, &["KICKED"], &["NOT_FOUND"])?;
        protocol::parse_field(Some(&count), "kick count")
    }

    /// `stats-job` by id.
    pub fn stats_job(&self, id: u64) -> Result<StatTable> {
        ops::stats_job(&mut self.wire.lock(), id)
    }

    // --- introspection ---

    /// Whole-broker statistics.
    pub fn stats(&self) -> Result<StatTable> {
        protocol::interact_table(&mut self.wire.lock(), "stats", &["OK"], &[])
    }

    /// Per-tube statistics.
    pub fn stats_tube(&self, tube: &str) -> Result<StatTable> {
        let line = CommandLine::new("stats-tube").arg(tube).into_string();
        protocol::interact_table(&mut self.wire.lock(), &line, &["OK"], &["NOT_FOUND"])
    }

    /// All tubes the broker currently knows, in broker order.
    pub fn list_tubes(&self) -> Result<Vec<String>> {
        protocol::interact_list(&mut self.wire.lock(), "list-tubes", &["OK"], &[])
    }

    /// The tubes this connection is watching, in broker order.
    pub fn list_tubes_watched(&self) -> Result<Vec<String>> {
        protocol::interact_list(&mut self.wire.lock(), "list-tubes-watched", &["OK"], &[])
    }

    /// The tube this connection currently puts into.
    pub fn list_tube_used(&self) -> Result<String> {
        protocol::interact_value(&mut self.wire.lock(), "list-tube-used", &["USING"], &[])
    }

    /// Pause new reservations from a tube for `delay` seconds.
    pub fn pause_tube(&self, tube: &str, delay: u32) -> Result<()> {
        let line = CommandLine::new("pause-tube")
            .arg(tube)
            .arg(delay)
            .into_string();
        protocol::interact(
            &mut self.wire.lock(),
            &line,
            None,
            &["PAUSED"],
            &["NOT_FOUND"],
        )
        .map(|_| ())
    }
}

/// Connect, run `f` against the connection, and close it on every exit
/// path (return or unwind).
///
/// This is the explicit scoped replacement for an ambient "current
/// connection": the connection only ever reaches callees as an
/// argument, never as global state.
///
/// # Example
///
/// ```no_run
/// let ready = beanline::with_connection("127.0.0.1:11300", |conn| {
///     conn.stats().map(|s| s.get_int("current-jobs-ready"))
/// })?;
/// # Ok::<(), beanline::BeanlineError>(())
/// ```
pub fn with_connection<A, T, F>(addr: A, f: F) -> Result<T>
where
    A: ToSocketAddrs,
    F: FnOnce(&Connection) -> Result<T>,
{
    let conn = Connection::connect(addr)?;
    let outcome = f(&conn);
    conn.close();
    outcome
}
