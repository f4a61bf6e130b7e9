//! Bounded-recency dedup for re-emitted transcript questions.
//!
//! Overlapping transcription windows re-emit the same utterance several
//! times; without suppression the queue fills with duplicates. The filter
//! keeps a normalized-text -> last-seen map and purges stale entries lazily
//! on each call, so no background sweep is needed.

use std::collections::HashMap;
use std::time::{Duration, Instant};

pub struct DebounceFilter {
    window: Duration,
    last_seen: HashMap<String, Instant>,
}

impl DebounceFilter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_seen: HashMap::new(),
        }
    }

    /// Admit `text` only if it has not been seen inside the window. The
    /// timestamp is refreshed either way, so continuous re-emission keeps
    /// the suppression alive until the speaker actually stops repeating.
    pub fn admit(&mut self, text: &str, now: Instant) -> bool {
        self.purge(now);
        let fresh = match self.last_seen.get(text) {
            Some(&seen) => now.duration_since(seen) >= self.window,
            None => true,
        };
        self.last_seen.insert(text.to_string(), now);
        fresh
    }

    fn purge(&mut self, now: Instant) {
        let window = self.window;
        self.last_seen
            .retain(|_, seen| now.duration_since(*seen) < window);
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Number of texts currently being tracked.
    pub fn tracked(&self) -> usize {
        self.last_seen.len()
    }
}
