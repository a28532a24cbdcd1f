//! Simulated control bus
//!
//! [`SimBus`] stands in for one device on the bus. Writes are recorded with
//! the virtual time they happened at; reads are served from a queue of
//! scripted replies, then from a responder closure that sees the most recent
//! write, then as zeros.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::trace;
use tuner_core::Transport;

use crate::clock::SimDelay;

/// Computes a read reply from the last write and the read length
pub type Responder = Box<dyn FnMut(&[u8], &mut [u8]) + Send>;

/// One recorded bus operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// Bytes written, with virtual time in microseconds
    Write { at_us: u64, bytes: Vec<u8> },
    /// Bytes returned by a read, with virtual time in microseconds
    Read { at_us: u64, bytes: Vec<u8> },
}

impl BusEvent {
    /// Virtual time of the event
    pub fn at_us(&self) -> u64 {
        match self {
            BusEvent::Write { at_us, .. } | BusEvent::Read { at_us, .. } => *at_us,
        }
    }
}

struct SimBusState {
    events: Vec<BusEvent>,
    replies: VecDeque<Vec<u8>>,
    responder: Option<Responder>,
    last_write: Vec<u8>,
    max_transaction: usize,
    fail_write_at: Option<usize>,
    writes_seen: usize,
    clock: Option<SimDelay>,
}

/// A simulated bus device
///
/// Cloning yields another handle to the same device, so a test can keep one
/// handle for inspection while a driver owns the other.
#[derive(Clone)]
pub struct SimBus {
    state: Arc<Mutex<SimBusState>>,
}

impl Default for SimBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SimBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("SimBus")
            .field("events", &state.events.len())
            .field("pending_replies", &state.replies.len())
            .field("max_transaction", &state.max_transaction)
            .finish()
    }
}

impl SimBus {
    /// Create a bus with no scripted replies and no transaction limit
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimBusState {
                events: Vec::new(),
                replies: VecDeque::new(),
                responder: None,
                last_write: Vec::new(),
                max_transaction: usize::MAX,
                fail_write_at: None,
                writes_seen: 0,
                clock: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimBusState> {
        // A panicking test thread must not hide the bus from the others.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Timestamp events with `clock`
    pub fn with_clock(self, clock: &SimDelay) -> Self {
        self.lock().clock = Some(clock.clone());
        self
    }

    /// Limit the size of a single write
    pub fn with_max_transaction(self, limit: usize) -> Self {
        self.lock().max_transaction = limit;
        self
    }

    /// Queue a reply for the next read
    pub fn push_reply(&self, bytes: impl Into<Vec<u8>>) {
        self.lock().replies.push_back(bytes.into());
    }

    /// Serve reads that have no queued reply
    pub fn set_responder(&self, responder: impl FnMut(&[u8], &mut [u8]) + Send + 'static) {
        self.lock().responder = Some(Box::new(responder));
    }

    /// Fail the `n`th write from now (0 = the next one) with a bus error
    pub fn fail_write_after(&self, n: usize) {
        let mut state = self.lock();
        state.fail_write_at = Some(state.writes_seen + n);
    }

    /// All recorded events
    pub fn events(&self) -> Vec<BusEvent> {
        self.lock().events.clone()
    }

    /// Payloads of all recorded writes
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| match e {
                BusEvent::Write { bytes, .. } => Some(bytes.clone()),
                BusEvent::Read { .. } => None,
            })
            .collect()
    }

    /// Number of recorded writes
    pub fn write_count(&self) -> usize {
        self.lock()
            .events
            .iter()
            .filter(|e| matches!(e, BusEvent::Write { .. }))
            .count()
    }

    /// Number of recorded reads
    pub fn read_count(&self) -> usize {
        self.lock()
            .events
            .iter()
            .filter(|e| matches!(e, BusEvent::Read { .. }))
            .count()
    }

    /// Concatenation of every written byte
    pub fn written_bytes(&self) -> Vec<u8> {
        self.writes().concat()
    }

    /// Forget recorded events, keeping replies and the responder
    pub fn clear_events(&self) {
        self.lock().events.clear();
    }

    /// Number of queued replies not yet consumed
    pub fn pending_replies(&self) -> usize {
        self.lock().replies.len()
    }
}

impl SimBusState {
    fn now_us(&self) -> u64 {
        self.clock.as_ref().map_or(0, SimDelay::elapsed_us)
    }
}

impl Transport for SimBus {
    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        let mut state = self.lock();
        if buf.len() > state.max_transaction {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "write of {} bytes exceeds transaction limit {}",
                    buf.len(),
                    state.max_transaction
                ),
            ));
        }
        let index = state.writes_seen;
        state.writes_seen += 1;
        if state.fail_write_at == Some(index) {
            state.fail_write_at = None;
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "simulated bus NAK"));
        }
        trace!("sim write {:02X?}", buf);
        let at_us = state.now_us();
        state.events.push(BusEvent::Write {
            at_us,
            bytes: buf.to_vec(),
        });
        state.last_write = buf.to_vec();
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let mut state = self.lock();
        buf.fill(0);
        if let Some(reply) = state.replies.pop_front() {
            let n = reply.len().min(buf.len());
            buf[..n].copy_from_slice(&reply[..n]);
        } else {
            let last_write = state.last_write.clone();
            if let Some(responder) = state.responder.as_mut() {
                responder(&last_write, buf);
            }
        }
        trace!("sim read {:02X?}", buf);
        let at_us = state.now_us();
        state.events.push(BusEvent::Read {
            at_us,
            bytes: buf.to_vec(),
        });
        Ok(())
    }

    fn max_transaction(&self) -> usize {
        self.lock().max_transaction
    }
}
