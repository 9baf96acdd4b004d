//! Run-scoped set of already reported diagnostic strings.

use std::collections::HashSet;

/// Tracks formatted messages seen during one analysis run.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `message`; `false` when it was already recorded this run.
    pub fn try_record(&mut self, message: &str) -> bool {
        if self.seen.contains(message) {
            return false;
        }
        self.seen.insert(message.to_string())
    }
}
