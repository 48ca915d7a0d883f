use std::sync::atomic::{AtomicI64, Ordering};

/// Highest checkpoint whose produced messages have all been confirmed.
///
/// Only ever moves forward: completions may arrive in any order, so every
/// advancement is a running maximum rather than an overwrite.
#[derive(Debug, Default)]
pub struct Watermark {
    value: AtomicI64,
}

impl Watermark {
    pub fn new(initial: i64) -> Self {
        Watermark {
            value: AtomicI64::new(initial),
        }
    }

    /// Raises the watermark to `checkpoint` if it is higher. Returns the value
    /// after the update.
    pub fn advance(&self, checkpoint: i64) -> i64 {
        let previous = self.value.fetch_max(checkpoint, Ordering::AcqRel);
        previous.max(checkpoint)
    }

    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread};

    #[test]
    fn never_regresses() {
        let wm = Watermark::new(0);
        assert_eq!(wm.advance(30), 30);
        assert_eq!(wm.advance(10), 30);
        assert_eq!(wm.get(), 30);
        assert_eq!(wm.advance(31), 31);
    }

    #[test]
    fn concurrent_advances_keep_the_maximum() {
        let wm = Arc::new(Watermark::new(0));
        let writers: Vec<_> = (0..8)
            .map(|t| {
                let wm = wm.clone();
                thread::spawn(move || {
                    // Interleave high and low values per thread.
                    for i in (0..1_000i64).rev() {
                        wm.advance(i * 8 + t);
                    }
                })
            })
            .collect();

        let observer = {
            let wm = wm.clone();
            thread::spawn(move || {
                let mut last = wm.get();
                for _ in 0..10_000 {
                    let now = wm.get();
                    assert!(now >= last, "watermark went from {last} to {now}");
                    last = now;
                }
            })
        };

        for w in writers {
            w.join().unwrap();
        }
        observer.join().unwrap();
        assert_eq!(wm.get(), 999 * 8 + 7);
    }
}
