use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of a light; also the `<id>` part of its topic names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LightId {
    Seq(u64),
    Named(String),
}

impl fmt::Display for LightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LightId::Seq(value) => write!(f, "{value}"),
            LightId::Named(name) => f.write_str(name),
        }
    }
}

impl From<u64> for LightId {
    fn from(value: u64) -> Self {
        LightId::Seq(value)
    }
}

impl From<&str> for LightId {
    fn from(value: &str) -> Self {
        LightId::Named(value.to_string())
    }
}

impl From<String> for LightId {
    fn from(value: String) -> Self {
        LightId::Named(value)
    }
}

/// Hands out sequential ids. Share one allocator (behind an `Arc`) between
/// every factory that must not produce colliding ids.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    pub fn next_id(&self) -> LightId {
        LightId::Seq(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// The id the next call to `next_id` will return.
    pub fn peek(&self) -> LightId {
        LightId::Seq(self.next.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn display_matches_topic_fragment() {
        assert_eq!(LightId::Seq(7).to_string(), "7");
        assert_eq!(LightId::from("master").to_string(), "master");
    }

    #[test]
    fn sequential_ids_start_where_asked() {
        let ids = IdAllocator::starting_at(40);
        assert_eq!(ids.next_id(), LightId::Seq(40));
        assert_eq!(ids.next_id(), LightId::Seq(41));
        assert_eq!(ids.peek(), LightId::Seq(42));
    }

    #[test_timeout::timeout(secs = 10)]
    fn concurrent_allocation_is_unique_and_monotonic_per_caller() {
        let ids = Arc::new(IdAllocator::new());
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let ids = ids.clone();
                thread::spawn(move || {
                    (0..250)
                        .map(|_| match ids.next_id() {
                            LightId::Seq(value) => value,
                            LightId::Named(name) => panic!("unexpected named id {name}"),
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for worker in workers {
            let batch = worker.join().expect("allocator thread");
            assert!(batch.windows(2).all(|pair| pair[0] < pair[1]));
            seen.extend(batch);
        }
        assert_eq!(seen.len(), 2000);
        assert_eq!(ids.peek(), LightId::Seq(2000));
    }
}
