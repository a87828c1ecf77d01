//! # Index Sequence
//!
//! Contatori per i nomi dei file di output (`_0001.webp`, `vid_0.mp4`).
//! Appartengono al `BatchScheduler`, vivono quanto il processo e vengono
//! passati ai task per riferimento: l'incremento è atomico, quindi due worker
//! concorrenti non leggono mai lo stesso valore.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonically increasing, process-wide counter
#[derive(Debug)]
pub struct IndexSequence {
    next: AtomicU64,
}

impl IndexSequence {
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Claim the next value
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// Value the next call to `next` will return
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }
}

/// Independent per-kind counters: images start at 1, videos at 0
#[derive(Debug)]
pub struct IndexSequences {
    pub images: IndexSequence,
    pub videos: IndexSequence,
}

impl IndexSequences {
    pub fn new() -> Self {
        Self {
            images: IndexSequence::starting_at(1),
            videos: IndexSequence::starting_at(0),
        }
    }
}

impl Default for IndexSequences {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn counts_up_from_start() {
        let sequence = IndexSequence::starting_at(1);
        assert_eq!(sequence.next(), 1);
        assert_eq!(sequence.next(), 2);
        assert_eq!(sequence.peek(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn never_repeats_under_concurrency() {
        let sequence = Arc::new(IndexSequence::starting_at(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let sequence = sequence.clone();
                tokio::spawn(async move {
                    let mut claimed = Vec::with_capacity(250);
                    for _ in 0..250 {
                        claimed.push(sequence.next());
                        tokio::task::yield_now().await;
                    }
                    claimed
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for value in handle.await.unwrap() {
                assert!(seen.insert(value), "index {value} handed out twice");
            }
        }
        assert_eq!(seen.len(), 2000);
        assert_eq!(sequence.peek(), 2000);
    }
}
