//! # beanline
//!
//! Client for the beanstalkd work-queue protocol. Producers `put` jobs
//! into named queues ("tubes"); consumers `reserve`, process, and then
//! `delete`, `release`, or `bury` them.
//!
//! ## Architecture
//!
//! - **transport**: one TCP stream per [`Connection`], CRLF-framed
//!   lines plus declared-length bodies, strictly one command in flight
//! - **protocol**: command encoding, status-token classification, and
//!   the minimal flat-YAML decoder for stat blocks
//! - **[`Job`]**: immutable handle that routes `stats`/`kick`/`bury`/
//!   `release`/`touch`/`delete` back through its owning connection
//!
//! Everything is blocking and synchronous; `reserve` without a timeout
//! waits until the broker answers. There is no pooling, pipelining,
//! retrying, or reconnecting - callers that want those build them on
//! top.
//!
//! ## Example
//!
//! ```no_run
//! use beanline::Connection;
//!
//! fn main() -> beanline::Result<()> {
//!     let producer = Connection::connect("127.0.0.1:11300")?;
//!     producer.put_default(b"send welcome email")?;
//!
//!     let worker = Connection::connect("127.0.0.1:11300")?;
//!     let job = worker.reserve()?;
//!     println!("job {}: {:?}", job.id(), job.body());
//!     job.delete()?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod protocol;

mod connection;
mod job;
mod transport;

pub use connection::{with_connection, Connection};
pub use error::{BeanlineError, Result};
pub use job::Job;
pub use protocol::{StatTable, StatValue};

/// Default job priority (2^31). Lower values are served first.
pub const DEFAULT_PRIORITY: u32 = 2_147_483_648;

/// Default put/release delay in seconds.
pub const DEFAULT_DELAY: u32 = 0;

/// Default time-to-run in seconds.
pub const DEFAULT_TTR: u32 = 120;
