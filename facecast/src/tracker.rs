//! Duplicate and loop detection for the active broadcast epoch.
//!
//! An epoch is `(id, sequence)`. Only the most recent accepted epoch is
//! retained: enough to recognise a flood looping back through a cycle or
//! arriving twice on different faces while it is still the active one.
//! Sequences are assigned per originator, so an epoch is only locally
//! meaningful.

use crate::wire::Header;

/// Remembers the active epoch and hands out sequence numbers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tracker {
    current: Option<(u8, u8)>,
    next_sequence: u8,
}

impl Tracker {
    /// Create a tracker with no active epoch.
    pub const fn new() -> Self {
        Self {
            current: None,
            next_sequence: 0,
        }
    }

    /// Record `header` as the active epoch.
    ///
    /// Returns false (and changes nothing) if it already is the active epoch.
    pub fn accept(&mut self, header: &Header) -> bool {
        if self.is_current(header) {
            return false;
        }
        self.current = Some((header.id, header.sequence));
        true
    }

    /// Does `header` belong to the active epoch?
    pub fn is_current(&self, header: &Header) -> bool {
        self.current == Some((header.id, header.sequence))
    }

    /// Forget the active epoch.
    pub fn clear(&mut self) {
        self.current = None;
    }

    /// The active epoch as `(id, sequence)`, if any.
    pub fn current(&self) -> Option<(u8, u8)> {
        self.current
    }

    /// Sequence number for the next locally originated broadcast.
    ///
    /// Wraps after 255. Starts at 1 so a fresh device never collides with a
    /// zeroed header.
    pub fn next_sequence(&mut self) -> u8 {
        self.next_sequence = self.next_sequence.wrapping_add(1);
        self.next_sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(id: u8, sequence: u8) -> Header {
        Header {
            id,
            sequence,
            ..Header::default()
        }
    }

    #[test]
    fn test_accept_new_epoch() {
        let mut tracker = Tracker::new();
        assert!(tracker.current().is_none());

        assert!(tracker.accept(&header(1, 1)));
        assert!(tracker.is_current(&header(1, 1)));
        assert_eq!(tracker.current(), Some((1, 1)));
    }

    #[test]
    fn test_accept_duplicate_rejected() {
        let mut tracker = Tracker::new();
        assert!(tracker.accept(&header(1, 1)));
        assert!(!tracker.accept(&header(1, 1)));
        assert_eq!(tracker.current(), Some((1, 1)));
    }

    #[test]
    fn test_only_latest_epoch_kept() {
        let mut tracker = Tracker::new();
        tracker.accept(&header(1, 1));
        tracker.accept(&header(1, 2));

        assert!(!tracker.is_current(&header(1, 1)));
        assert!(tracker.is_current(&header(1, 2)));

        // Same sequence, different id is a different epoch
        assert!(!tracker.is_current(&header(2, 2)));

        // The older epoch is accepted again once displaced
        assert!(tracker.accept(&header(1, 1)));
    }

    #[test]
    fn test_flags_do_not_affect_epoch() {
        let mut tracker = Tracker::new();
        tracker.accept(&header(4, 7));

        let mut reply = header(4, 7);
        reply.is_reply = true;
        reply.is_fire_and_forget = true;
        assert!(tracker.is_current(&reply));
    }

    #[test]
    fn test_clear() {
        let mut tracker = Tracker::new();
        tracker.accept(&header(1, 1));
        tracker.clear();
        assert!(!tracker.is_current(&header(1, 1)));
        assert!(tracker.accept(&header(1, 1)));
    }

    #[test]
    fn test_next_sequence_wraps() {
        let mut tracker = Tracker::new();
        assert_eq!(tracker.next_sequence(), 1);
        assert_eq!(tracker.next_sequence(), 2);

        for _ in 0..253 {
            tracker.next_sequence();
        }
        assert_eq!(tracker.next_sequence(), 0);
        assert_eq!(tracker.next_sequence(), 1);
    }
}
