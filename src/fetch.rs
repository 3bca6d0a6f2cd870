//! Last-write-wins guard for overlapping report fetches.
//!
//! Every fetch takes a ticket before it starts. When it completes, its
//! payload is kept only if no newer fetch has been started since, so a slow
//! response for an old date range never replaces a newer one.
use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchTicket(u64);

#[derive(Debug, Default)]
pub struct FetchSequencer {
    issued: AtomicU64,
}

impl FetchSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> FetchTicket {
        FetchTicket(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: FetchTicket) -> bool {
        self.issued.load(Ordering::SeqCst) == ticket.0
    }
}

/// The payload of the newest fetch, if it has completed.
#[derive(Debug)]
pub struct LatestPayload<T> {
    sequencer: FetchSequencer,
    slot: Mutex<Option<(FetchTicket, T)>>,
}

impl<T> Default for LatestPayload<T> {
    fn default() -> Self {
        Self {
            sequencer: FetchSequencer::new(),
            slot: Mutex::new(None),
        }
    }
}

impl<T: Clone> LatestPayload<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> FetchTicket {
        self.sequencer.begin()
    }

    /// Store `value` if `ticket` is the newest issued. Returns whether it
    /// was kept.
    pub fn complete(&self, ticket: FetchTicket, value: T) -> bool {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        let newer_stored = matches!(slot.as_ref(), Some((kept, _)) if *kept > ticket);
        if newer_stored || !self.sequencer.is_current(ticket) {
            debug!("discarding stale fetch {:?}", ticket);
            return false;
        }
        *slot = Some((ticket, value));
        true
    }

    pub fn get(&self) -> Option<T> {
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        slot.as_ref().map(|(_, v)| v.clone())
    }
}
