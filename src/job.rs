//! Job handle and its delegated operations.
//!
//! A [`Job`] is an immutable record of what the broker handed back:
//! id, body, and whether it came from a reserving operation. It keeps
//! a weak back reference to the wire of the connection that produced
//! it, used purely to route the job-shaped verbs (`stats`, `delete`,
//! `release`, `bury`, `touch`, `kick`) to the same id-shaped
//! implementations the connection uses. A job never opens I/O of its
//! own and never keeps the connection alive.
//!
//! The broker does not tell the client when a job goes stale; after a
//! delete/release/bury the handle stays usable and later verbs simply
//! surface the broker's `NOT_FOUND`.

use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::Mutex;

use crate::error::{BeanlineError, Result};
use crate::protocol::{ops, StatTable};
use crate::transport::Wire;
use crate::{DEFAULT_DELAY, DEFAULT_PRIORITY};

/// One job as returned by `reserve` or the peek family.
///
/// Immutable and cheap to clone; the body is shared, not copied.
/// Safe to hand across threads, but every operation still serializes
/// on the owning connection's one-in-flight-command lock.
#[derive(Debug, Clone)]
pub struct Job {
    owner: Weak<Mutex<Wire>>,
    id: u64,
    body: Bytes,
    reserved: bool,
}

impl Job {
    pub(crate) fn new(owner: Weak<Mutex<Wire>>, id: u64, body: Bytes, reserved: bool) -> Self {
        Self {
            owner,
            id,
            body,
            reserved,
        }
    }

    /// Broker-assigned job id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The job payload. Exactly as many bytes as the broker declared.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The payload as shared [`Bytes`] (cheap clone).
    pub fn bytes(&self) -> Bytes {
        self.body.clone()
    }

    /// Declared body length in bytes.
    pub fn len(&self) -> usize {
        self.body.len()
    }

    /// True for an empty body.
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// True only for jobs obtained through `reserve` /
    /// `reserve-with-timeout`. Peeked jobs are never reserved.
    pub fn is_reserved(&self) -> bool {
        self.reserved
    }

    /// Upgrade the back reference, failing if the owning connection
    /// has been closed or dropped.
    fn owner(&self) -> Result<Arc<Mutex<Wire>>> {
        self.owner.upgrade().ok_or(BeanlineError::ConnectionClosed)
    }

    /// `stats-job` for this job. Delegates to the id-shaped call.
    pub fn stats(&self) -> Result<StatTable> {
        let wire = self.owner()?;
        let mut guard = wire.lock();
        ops::stats_job(&mut guard, self.id)
    }

    /// Delete this job from the broker.
    pub fn delete(&self) -> Result<()> {
        let wire = self.owner()?;
        let mut guard = wire.lock();
        ops::delete(&mut guard, self.id)
    }

    /// Release this job back to the ready (or delayed) queue.
    pub fn release(&self, pri: u32, delay: u32) -> Result<()> {
        let wire = self.owner()?;
        let mut guard = wire.lock();
        ops::release(&mut guard, self.id, pri, delay)
    }

    /// Release with the crate default priority and no delay.
    pub fn release_default(&self) -> Result<()> {
        self.release(DEFAULT_PRIORITY, DEFAULT_DELAY)
    }

    /// Bury this job.
    ///
    /// With `None`, the job's current priority is fetched via
    /// `stats-job` first and reused, so burying does not silently
    /// reprioritize. If that lookup answers `NOT_FOUND` (the job is
    /// already gone or was snatched by another consumer) the bury
    /// proceeds with [`DEFAULT_PRIORITY`] and surfaces the broker's
    /// own verdict; other stats errors propagate unchanged.
    pub fn bury(&self, pri: Option<u32>) -> Result<()> {
        let wire = self.owner()?;
        let mut guard = wire.lock();
        let pri = match pri {
            Some(pri) => pri,
            None => match ops::stats_job(&mut guard, self.id) {
                Ok(table) => table
                    .get_int("pri")
                    .and_then(|n| u32::try_from(n).ok())
                    .unwrap_or(DEFAULT_PRIORITY),
                Err(e) if e.is_failure("NOT_FOUND") => DEFAULT_PRIORITY,
                Err(e) => return Err(e),
            },
        };
        ops::bury(&mut guard, self.id, pri)
    }

    /// Refresh this job's time-to-run window.
    pub fn touch(&self) -> Result<()> {
        let wire = self.owner()?;
        let mut guard = wire.lock();
        ops::touch(&mut guard, self.id)
    }

    /// Kick this job (buried or delayed) back to ready.
    pub fn kick(&self) -> Result<()> {
        let wire = self.owner()?;
        let mut guard = wire.lock();
        ops::kick_job(&mut guard, self.id)
    }
}
