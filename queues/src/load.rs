use std::time::Duration;

/// Append-only record of when `add`/`get_next` were called.
///
/// Entries are kept in call order. Wall-clock readings are not guaranteed to be
/// monotonic, so adjacent entries may go backwards.
#[derive(Clone, Debug, Default)]
pub struct OperationLog {
    entries: Vec<Duration>,
}

impl OperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, at: Duration) {
        self.entries.push(at);
    }

    /// Densest burst of operations in any `window` anchored at a logged
    /// operation: for each entry `t_i`, count the entries from `i` onwards with
    /// `t_j <= t_i + window`, and take the maximum.
    ///
    /// Quadratic on purpose: it stays correct when the log is not sorted.
    pub fn peak_load(&self, window: Duration) -> usize {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, anchor)| {
                let limit = anchor.saturating_add(window);
                self.entries[i..].iter().filter(|t| **t <= limit).count()
            })
            .max()
            .unwrap_or(0)
    }
}

impl FromIterator<Duration> for OperationLog {
    fn from_iter<I: IntoIterator<Item = Duration>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
