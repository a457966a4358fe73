//! Geometric growth for the batch decode output buffer.

use crate::error::{PlaybackError, Result};

/// How the batch PCM buffer is pre-sized and grown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrowthPolicy {
    /// Assumed decoded-bytes to encoded-bytes ratio used for the first guess.
    pub compression_ratio: usize,
    /// Multiplier applied each time the buffer runs out. Values below 2 are
    /// treated as 2.
    pub factor: usize,
}

impl Default for GrowthPolicy {
    fn default() -> Self {
        Self {
            compression_ratio: 10,
            factor: 2,
        }
    }
}

impl GrowthPolicy {
    /// First capacity guess, in i16 samples, for `input_len` encoded bytes.
    pub fn initial_samples(&self, input_len: usize) -> usize {
        (input_len.saturating_mul(self.compression_ratio) / size_of::<i16>()).max(1)
    }

    /// Smallest geometric step from `current` that holds `required` samples.
    pub fn next_capacity(&self, current: usize, required: usize) -> usize {
        let factor = self.factor.max(2);
        let mut capacity = current.max(1);
        while capacity < required {
            capacity = capacity.saturating_mul(factor);
        }
        capacity
    }
}

/// Growable PCM destination that follows a [`GrowthPolicy`] and reports
/// allocation failure instead of aborting.
#[derive(Debug)]
pub struct PcmAccumulator {
    samples: Vec<i16>,
    policy: GrowthPolicy,
    growths: usize,
}

impl PcmAccumulator {
    pub fn new(policy: GrowthPolicy, input_len: usize) -> Result<Self> {
        let initial = policy.initial_samples(input_len);
        let mut samples = Vec::new();
        samples
            .try_reserve_exact(initial)
            .map_err(|_| PlaybackError::Allocation {
                bytes: initial.saturating_mul(size_of::<i16>()),
            })?;

        Ok(Self {
            samples,
            policy,
            growths: 0,
        })
    }

    pub fn extend(&mut self, block: &[i16]) -> Result<()> {
        let required = self.samples.len() + block.len();
        if required > self.samples.capacity() {
            let target = self.policy.next_capacity(self.samples.capacity(), required);
            self.samples
                .try_reserve_exact(target - self.samples.len())
                .map_err(|_| PlaybackError::Allocation {
                    bytes: target.saturating_mul(size_of::<i16>()),
                })?;
            self.growths += 1;
        }
        self.samples.extend_from_slice(block);
        Ok(())
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.samples.capacity()
    }

    /// Number of times the buffer had to grow past its estimate.
    pub fn growths(&self) -> usize {
        self.growths
    }

    /// Release the unused tail and hand over the samples.
    pub fn finish(mut self) -> Vec<i16> {
        self.samples.shrink_to_fit();
        self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_estimate_uses_compression_ratio() {
        let policy = GrowthPolicy::default();
        // 1000 encoded bytes -> 10_000 decoded bytes -> 5_000 samples
        assert_eq!(policy.initial_samples(1000), 5000);
        assert_eq!(policy.initial_samples(0), 1);
    }

    #[test]
    fn test_next_capacity_doubles_until_it_fits() {
        let policy = GrowthPolicy::default();
        assert_eq!(policy.next_capacity(100, 50), 100);
        assert_eq!(policy.next_capacity(100, 101), 200);
        assert_eq!(policy.next_capacity(100, 401), 800);
        assert_eq!(policy.next_capacity(0, 3), 4);
    }

    #[test]
    fn test_factor_below_two_is_clamped() {
        let policy = GrowthPolicy {
            compression_ratio: 10,
            factor: 1,
        };
        assert_eq!(policy.next_capacity(10, 11), 20);
    }

    #[test]
    fn test_custom_factor() {
        let policy = GrowthPolicy {
            compression_ratio: 4,
            factor: 3,
        };
        assert_eq!(policy.initial_samples(10), 20);
        assert_eq!(policy.next_capacity(20, 21), 60);
        assert_eq!(policy.next_capacity(20, 61), 180);
    }

    #[test]
    fn test_accumulator_grows_geometrically_and_shrinks() {
        let policy = GrowthPolicy {
            compression_ratio: 2,
            factor: 2,
        };
        // 8 bytes -> 8 samples initial estimate
        let mut acc = PcmAccumulator::new(policy, 8).unwrap();
        assert!(acc.capacity() >= 8);

        acc.extend(&[1; 6]).unwrap();
        assert_eq!(acc.growths(), 0);
        acc.extend(&[2; 6]).unwrap();
        assert_eq!(acc.growths(), 1);
        assert!(acc.capacity() >= 16);
        acc.extend(&[3; 20]).unwrap();
        assert_eq!(acc.growths(), 2);
        assert_eq!(acc.len(), 32);

        let samples = acc.finish();
        assert_eq!(samples.len(), 32);
        assert_eq!(samples.capacity(), 32);
        assert_eq!(&samples[..6], &[1; 6]);
        assert_eq!(&samples[12..], &[3; 20]);
    }
}
