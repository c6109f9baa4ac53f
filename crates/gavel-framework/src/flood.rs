//! Per-chat flood control.
//!
//! A fixed-window counter per chat: the first update after the window has
//! elapsed opens a new window with count 0, every other update increments
//! the count, and updates are admitted while `count <= limit`. With the
//! defaults (1 s, 10) that is at most 11 updates per window.
//!
//! Counters live in a [`DashMap`], so each chat's entry is locked on its own
//! shard and unrelated chats never contend on a global lock.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use gavel_core::ChatId;

pub const DEFAULT_FLOOD_LIMIT: u32 = 10;
pub const DEFAULT_FLOOD_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
struct FloodWindow {
    start: Instant,
    count: u32,
}

/// Sharded per-chat admission counter.
#[derive(Debug)]
pub struct FloodController {
    windows: DashMap<ChatId, FloodWindow>,
    limit: u32,
    window: Duration,
}

impl Default for FloodController {
    fn default() -> Self {
        Self::new(DEFAULT_FLOOD_LIMIT, DEFAULT_FLOOD_WINDOW)
    }
}

impl FloodController {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            limit,
            window,
        }
    }

    /// Records an update for `chat_id` at `now` and decides whether it may
    /// be processed.
    pub fn admit(&self, chat_id: ChatId, now: Instant) -> bool {
        match self.windows.entry(chat_id) {
            Entry::Vacant(entry) => {
                entry.insert(FloodWindow {
                    start: now,
                    count: 0,
                });
                true
            }
            Entry::Occupied(mut entry) => {
                let window = entry.get_mut();
                if now.saturating_duration_since(window.start) > self.window {
                    window.start = now;
                    window.count = 0;
                } else {
                    window.count = window.count.saturating_add(1);
                }
                window.count <= self.limit
            }
        }
    }

    /// Number of chats with a live counter.
    pub fn tracked_chats(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_admits_eleven_per_window() {
        let flood = FloodController::default();
        let start = Instant::now();

        let admitted = (0..15)
            .filter(|i| flood.admit(-1, start + Duration::from_millis(i * 30)))
            .count();
        assert_eq!(admitted, 11);
    }

    #[test]
    fn test_resets_after_window() {
        let flood = FloodController::default();
        let start = Instant::now();
        for i in 0..20 {
            flood.admit(-1, start + Duration::from_millis(i));
        }
        assert!(!flood.admit(-1, start + Duration::from_millis(1000)));
        assert!(flood.admit(-1, start + Duration::from_millis(1001)));
        assert!(flood.admit(-1, start + Duration::from_millis(1002)));
    }

    #[test]
    fn test_chats_are_independent() {
        let flood = FloodController::default();
        let now = Instant::now();
        for _ in 0..11 {
            assert!(flood.admit(-1, now));
        }
        assert!(!flood.admit(-1, now));
        assert!(flood.admit(-2, now));
        assert_eq!(flood.tracked_chats(), 2);
    }

    #[test]
    fn test_custom_limit() {
        let flood = FloodController::new(2, Duration::from_millis(100));
        let now = Instant::now();
        assert_eq!((0..5).filter(|_| flood.admit(7, now)).count(), 3);
    }

    #[test]
    fn test_concurrent_chats() {
        let flood = Arc::new(FloodController::default());
        let now = Instant::now();
        let threads: Vec<_> = (0..8)
            .map(|chat| {
                let flood = flood.clone();
                std::thread::spawn(move || (0..15).filter(|_| flood.admit(chat, now)).count())
            })
            .collect();

        for thread in threads {
            assert_eq!(thread.join().unwrap(), 11);
        }
    }
}
