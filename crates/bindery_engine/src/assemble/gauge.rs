use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counts entry buffers that are alive at once and remembers the high-water mark.
#[derive(Debug, Default)]
pub struct BufferGauge {
    live: AtomicUsize,
    peak: AtomicUsize,
}

impl BufferGauge {
    pub fn lease(self: &Arc<Self>) -> BufferLease {
        let now = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        BufferLease {
            gauge: Arc::clone(self),
        }
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Held while one entry's bytes are in memory.
#[derive(Debug)]
pub struct BufferLease {
    gauge: Arc<BufferGauge>,
}

impl Drop for BufferLease {
    fn drop(&mut self) {
        self.gauge.live.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peak_tracks_overlap() {
        let gauge = Arc::new(BufferGauge::default());
        let a = gauge.lease();
        let b = gauge.lease();
        assert_eq!(gauge.live(), 2);
        drop(a);
        drop(b);
        let _c = gauge.lease();
        assert_eq!(gauge.live(), 1);
        assert_eq!(gauge.peak(), 2);
    }
}
