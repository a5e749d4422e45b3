//! Bucketed sliding window of call statistics

/// Number of buckets a window is split into
const SAMPLE_COUNT: u64 = 10;

/// Counters observed within the current window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowSnapshot {
    pub total: u64,
    pub errors: u64,
    pub slow: u64,
}

impl WindowSnapshot {
    pub fn error_ratio(&self) -> f64 {
        ratio(self.errors, self.total)
    }

    pub fn slow_ratio(&self) -> f64 {
        ratio(self.slow, self.total)
    }
}

fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    start: u64,
    total: u64,
    errors: u64,
    slow: u64,
}

/// Ring of fixed-width buckets covering `window_ms`
///
/// A bucket is reused once its slot comes round again; stale buckets are
/// reset lazily on write and skipped on read.
#[derive(Debug)]
pub(crate) struct SlidingWindow {
    window_ms: u64,
    bucket_ms: u64,
    buckets: Vec<Bucket>,
}

impl SlidingWindow {
    pub(crate) fn new(window_ms: u64) -> Self {
        let bucket_ms = (window_ms / SAMPLE_COUNT).max(1);
        let len = window_ms.div_ceil(bucket_ms).max(1) as usize;
        SlidingWindow {
            window_ms,
            bucket_ms,
            buckets: vec![Bucket::default(); len],
        }
    }

    /// Count one finished call
    pub(crate) fn record(&mut self, now: u64, succeeded: bool, slow: bool) {
        let bucket = self.current_bucket(now);
        bucket.total += 1;
        if !succeeded {
            bucket.errors += 1;
        }
        if slow {
            bucket.slow += 1;
        }
    }

    /// Sum of all buckets still inside the window
    pub(crate) fn snapshot(&self, now: u64) -> WindowSnapshot {
        self.buckets
            .iter()
            .filter(|b| b.start <= now && now - b.start < self.window_ms)
            .fold(WindowSnapshot::default(), |acc, b| WindowSnapshot {
                total: acc.total + b.total,
                errors: acc.errors + b.errors,
                slow: acc.slow + b.slow,
            })
    }

    /// Forget everything
    pub(crate) fn reset(&mut self) {
        self.buckets.iter_mut().for_each(|b| *b = Bucket::default());
    }

    fn current_bucket(&mut self, now: u64) -> &mut Bucket {
        let start = now - now % self.bucket_ms;
        let idx = ((now / self.bucket_ms) % self.buckets.len() as u64) as usize;
        let bucket = &mut self.buckets[idx];
        if bucket.start != start {
            *bucket = Bucket {
                start,
                ..Bucket::default()
            };
        }
        bucket
    }
}
