//! Testing utilities for exports.
//!
//! - **Mock I/O**: destinations that count, fail, or can be read back, and
//!   temporary files that clean up after themselves
//! - **Sources**: a source that rewrites its buffer in place, one that fails
//!   after a fixed number of rows, and one that never ends
//! - **Event log**: a shared, ordered record of fetches and writes for
//!   asserting how the pipeline interleaves them
//!
//! # Example
//!
//! ```
//! use rawcsv::{Coordinator, ExportOptions};
//! use rawcsv::testing::{Event, EventLog, EventWriter, MutatingSource};
//!
//! let log = EventLog::new();
//! let src = MutatingSource::new("v", ["aaa", "bbb"]).with_log(log.clone());
//! // A threshold of one byte flushes after every line.
//! let opts = ExportOptions::default().header(false).flush_threshold(1);
//! Coordinator::new(opts).run(src, EventWriter::new(log.clone())).unwrap();
//!
//! assert_eq!(
//!     log.events(),
//!     vec![
//!         Event::Fetched(1),
//!         Event::Written(b"\"aaa\"\n".to_vec()),
//!         Event::Fetched(2),
//!         Event::Written(b"\"bbb\"\n".to_vec()),
//!     ]
//! );
//! ```

pub mod mock_io;
pub mod sources;

pub use mock_io::*;
pub use sources::*;

use std::sync::{Arc, Mutex, PoisonError};

/// Something that happened during an export.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// The source produced its n-th row (1-based).
    Fetched(u64),
    /// Bytes reached the destination.
    Written(Vec<u8>),
}

/// Shared, ordered event record. Clones append to the same log.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: Event) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    /// Snapshot of every event so far.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
