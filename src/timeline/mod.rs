//! Timeline reconstruction: pagination and detail resolution.
//!
//! [`Timeline`] owns every event seen during a run. Its behaviour is split by concern:
//! - [`pagination`] - walking the cursor-paginated streams
//! - [`details`] - screening events and resolving details through the [`DetailWindow`]
//! - [`window`] - the bounded in-flight request window

mod details;
mod pagination;
mod window;

pub use pagination::WalkerStep;
pub use window::DetailWindow;

use crate::config::{Config, Verbosity};
use crate::types::{EventId, StreamKind, TimelineEvent};
use std::collections::{HashMap, HashSet, VecDeque};

/// Event store and state machine of Phase 1
#[derive(Debug)]
pub struct Timeline {
    cutoff_millis: Option<i64>,
    verbosity: Verbosity,
    /// Events in arrival order
    events: Vec<TimelineEvent>,
    index: HashMap<EventId, usize>,
    /// Events not yet screened/requested (indices into `events`)
    pending: VecDeque<usize>,
    /// Events whose detail request is outstanding
    in_flight: HashSet<usize>,
    window: DetailWindow,
    /// Details expected: distinct events minus skipped ones
    total: usize,
    skipped: usize,
    /// Stream currently being walked
    stream: Option<StreamKind>,
    /// Pages received per stream
    pages: HashMap<StreamKind, usize>,
    seeded: bool,
    completion_fired: bool,
}

impl Timeline {
    /// Create an empty timeline using the cutoff, window size and verbosity of `config`
    pub fn new(config: &Config) -> Self {
        Self {
            cutoff_millis: config.cutoff_millis(),
            verbosity: config.verbosity,
            events: Vec::new(),
            index: HashMap::new(),
            pending: VecDeque::new(),
            in_flight: HashSet::new(),
            window: DetailWindow::new(config.detail_window),
            total: 0,
            skipped: 0,
            stream: None,
            pages: HashMap::new(),
            seeded: false,
            completion_fired: false,
        }
    }

    /// All events in arrival order
    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    /// Event by id
    pub fn event(&self, id: &EventId) -> Option<&TimelineEvent> {
        self.index.get(id).map(|&idx| &self.events[idx])
    }

    /// The detail request window
    pub fn window(&self) -> &DetailWindow {
        &self.window
    }

    /// Pages received so far for `stream`
    pub fn pages(&self, stream: StreamKind) -> usize {
        self.pages.get(&stream).copied().unwrap_or(0)
    }

    /// Details expected in total (distinct events minus skipped ones)
    pub fn total(&self) -> usize {
        self.total
    }

    /// Events skipped without a detail request
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Details received so far
    pub fn received(&self) -> usize {
        self.window.received()
    }

    /// Whether pagination has finished and detail resolution started
    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    /// Whether every expected detail has been received
    pub fn is_complete(&self) -> bool {
        self.seeded && self.pending.is_empty() && self.window.received() == self.total
    }

    /// Report completion exactly once: `true` on the first call after the
    /// timeline became complete, `false` before and afterwards
    pub fn take_completion(&mut self) -> bool {
        if self.is_complete() && !self.completion_fired {
            self.completion_fired = true;
            true
        } else {
            false
        }
    }

    /// Insert an event unless its id is known; returns whether it was inserted
    fn insert(&mut self, mut event: TimelineEvent, stream: StreamKind) -> bool {
        if self.index.contains_key(&event.id) {
            return false;
        }
        event.source = Some(stream.source_tag().to_string());
        self.index.insert(event.id.clone(), self.events.len());
        self.events.push(event);
        true
    }
}
