//! Bounded window of outstanding detail requests.

/// Counting window over in-flight detail requests
///
/// A permit is taken for every request issued and returned for every response
/// received, so `outstanding() <= capacity()` holds at all times.
#[derive(Clone, Debug)]
pub struct DetailWindow {
    capacity: usize,
    requested: usize,
    received: usize,
}

impl DetailWindow {
    /// Create a window admitting at most `capacity` outstanding requests
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            requested: 0,
            received: 0,
        }
    }

    /// Maximum number of outstanding requests
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Requests issued so far
    pub fn requested(&self) -> usize {
        self.requested
    }

    /// Responses received so far
    pub fn received(&self) -> usize {
        self.received
    }

    /// Requests issued but not yet answered
    pub fn outstanding(&self) -> usize {
        self.requested - self.received
    }

    /// Free slots
    pub fn available(&self) -> usize {
        self.capacity - self.outstanding()
    }

    /// Whether every issued request has been answered
    pub fn is_idle(&self) -> bool {
        self.requested == self.received
    }

    /// Take a permit for one request; `false` when the window is full
    pub fn try_acquire(&mut self) -> bool {
        if self.outstanding() < self.capacity {
            self.requested += 1;
            true
        } else {
            false
        }
    }

    /// Return the permit of one answered request; `false` if none was outstanding
    pub fn release(&mut self) -> bool {
        if self.received < self.requested {
            self.received += 1;
            true
        } else {
            false
        }
    }
}
