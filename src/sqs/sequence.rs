use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic source of FIFO sequence numbers, shared by every queue of an engine.
#[derive(Debug, Default)]
pub struct MessageSequence {
    counter: AtomicU64,
}

impl MessageSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next sequence number, rendered as a zero-padded decimal.
    pub fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{:020}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_increase_and_sort_lexically() {
        let seq = MessageSequence::new();
        let a = seq.next();
        let b = seq.next();
        assert_eq!(a, "00000000000000000001");
        assert_eq!(a.len(), 20);
        assert!(b > a);
    }
}
