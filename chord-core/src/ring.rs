//! # Sample Ring Module
//!
//! Keeps the most recent raw samples so the analysis worker can snapshot
//! them while the capture callback keeps writing. Snapshots are copies.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::engine::SampleSource;

/// Thread-safe bounded history of recent mono samples.
#[derive(Debug)]
pub struct SampleRing {
    capacity: usize,
    sample_rate: f32,
    samples: Mutex<VecDeque<f32>>,
}

impl SampleRing {
    pub fn new(capacity: usize, sample_rate: f32) -> Self {
        Self {
            capacity,
            sample_rate,
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Appends a block, dropping the oldest samples beyond capacity.
    pub fn push(&self, block: &[f32]) {
        let mut samples = self.samples.lock().unwrap_or_else(|e| e.into_inner());
        let block = if block.len() > self.capacity {
            &block[block.len() - self.capacity..]
        } else {
            block
        };
        let overflow = (samples.len() + block.len()).saturating_sub(self.capacity);
        samples.drain(..overflow);
        samples.extend(block.iter().copied());
    }

    /// Copies the most recent `count` samples (fewer if not yet buffered).
    pub fn snapshot(&self, count: usize) -> Vec<f32> {
        let samples = self.samples.lock().unwrap_or_else(|e| e.into_inner());
        let start = samples.len().saturating_sub(count);
        samples.range(start..).copied().collect()
    }

    pub fn len(&self) -> usize {
        self.samples.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SampleSource for SampleRing {
    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn recent_samples(&self, count: usize) -> Vec<f32> {
        self.snapshot(count)
    }
}

/// Root-mean-square amplitude of a block; 0 for an empty block.
pub fn rms(block: &[f32]) -> f32 {
    if block.is_empty() {
        return 0.0;
    }
    (block.iter().map(|&s| s * s).sum::<f32>() / block.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn keeps_only_the_most_recent_samples() {
        let ring = SampleRing::new(4, 44_100.0);
        ring.push(&[1.0, 2.0, 3.0]);
        ring.push(&[4.0, 5.0]);
        assert_eq!(ring.snapshot(10), vec![2.0, 3.0, 4.0, 5.0]);
        assert_eq!(ring.snapshot(2), vec![4.0, 5.0]);
    }

    #[test]
    fn oversized_block_keeps_its_tail() {
        let ring = SampleRing::new(3, 44_100.0);
        ring.push(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(ring.snapshot(3), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn snapshot_is_a_copy() {
        let ring = SampleRing::new(8, 44_100.0);
        ring.push(&[1.0, 2.0]);
        let snap = ring.snapshot(2);
        ring.push(&[9.0, 9.0]);
        assert_eq!(snap, vec![1.0, 2.0]);
    }

    #[test]
    fn concurrent_writer_and_reader() {
        let ring = Arc::new(SampleRing::new(1024, 44_100.0));
        let writer = {
            let ring = ring.clone();
            thread::spawn(move || {
                for i in 0..200 {
                    ring.push(&[i as f32; 64]);
                }
            })
        };
        for _ in 0..200 {
            let snap = ring.recent_samples(512);
            assert!(snap.len() <= 512);
        }
        writer.join().unwrap();
        assert_eq!(ring.len(), 1024);
        assert!(ring.snapshot(64).iter().all(|&s| s == 199.0));
    }

    #[test]
    fn rms_of_constant_and_empty() {
        assert_eq!(rms(&[]), 0.0);
        assert!((rms(&[0.5; 16]) - 0.5).abs() < 1e-6);
    }
}
