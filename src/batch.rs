use crate::record::LogEntry;
use parking_lot::Mutex;
use std::mem;

/// Returned by [`BatchBuffer::append`] once the buffer has been closed for
/// shutdown. Carries the refused entry back to the caller.
#[derive(Debug)]
pub struct Closed(pub LogEntry);

#[derive(Debug, Default)]
struct BatchState {
    entries: Vec<LogEntry>,
    closed: bool,
}

/// Unbounded, mutex-protected queue of pending entries.
///
/// The batch size threshold is only a flush hint: `append` never refuses an
/// entry because the buffer is large. An entry lands in exactly one drain.
#[derive(Debug, Default)]
pub struct BatchBuffer {
    state: Mutex<BatchState>,
}

impl BatchBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and return the buffer length right after the append.
    pub fn append(&self, entry: LogEntry) -> Result<usize, Closed> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(Closed(entry));
        }
        state.entries.push(entry);
        Ok(state.entries.len())
    }

    /// Take every buffered entry, leaving the buffer empty.
    pub fn drain_all(&self) -> Vec<LogEntry> {
        mem::take(&mut self.state.lock().entries)
    }

    /// Close the buffer and take what is left in the same critical section,
    /// so no append can slip in between the final drain and the close.
    pub fn close_and_drain(&self) -> Vec<LogEntry> {
        let mut state = self.state.lock();
        state.closed = true;
        mem::take(&mut state.entries)
    }

    /// Current length. May be stale as soon as it returns.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}
