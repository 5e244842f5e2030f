//! Memory-aware batch sizing

use bench_core::{BatchingConfig, ResolutionClass, ResolutionSpec, ResourceSnapshot};
use std::collections::HashMap;
use tracing::debug;

/// Computes how many images of a resolution class fit in one dispatch
#[derive(Debug, Clone)]
pub struct BatchSizer {
    bytes_per_image: HashMap<ResolutionClass, u64>,
    default_bytes_per_image: u64,
    memory_fraction: f64,
}

impl BatchSizer {
    pub fn new(resolutions: &[ResolutionSpec], batching: &BatchingConfig) -> Self {
        Self {
            bytes_per_image: resolutions
                .iter()
                .map(|spec| (spec.name.clone(), spec.bytes_per_image))
                .collect(),
            default_bytes_per_image: batching.default_bytes_per_image,
            memory_fraction: batching.memory_fraction,
        }
    }

    /// Per-image memory estimate, falling back to the default for unmapped classes
    pub fn bytes_per_image(&self, class: &ResolutionClass) -> u64 {
        self.bytes_per_image
            .get(class)
            .copied()
            .unwrap_or(self.default_bytes_per_image)
    }

    /// Batch size for `class` under `snapshot`, using an explicit memory fraction.
    ///
    /// Pure in its inputs. Never returns less than 1: without a memory reading
    /// the run degrades to one image at a time.
    pub fn compute_batch_size(
        &self,
        class: &ResolutionClass,
        snapshot: &ResourceSnapshot,
        memory_fraction: f64,
    ) -> usize {
        let size = batch_size_for(
            self.bytes_per_image(class),
            snapshot.gpu_free_memory,
            memory_fraction,
        );
        debug!(
            "Batch size for {}: {} (free memory: {:?}, fraction: {})",
            class, size, snapshot.gpu_free_memory, memory_fraction
        );
        size
    }

    /// Batch size for `class` under `snapshot` with the configured memory fraction
    pub fn batch_size(&self, class: &ResolutionClass, snapshot: &ResourceSnapshot) -> usize {
        self.compute_batch_size(class, snapshot, self.memory_fraction)
    }
}

/// `max(1, floor(free_memory * memory_fraction / bytes_per_image))`
pub fn batch_size_for(bytes_per_image: u64, free_memory: Option<u64>, memory_fraction: f64) -> usize {
    let Some(free_memory) = free_memory else {
        return 1;
    };
    if bytes_per_image == 0 || memory_fraction.is_nan() || memory_fraction <= 0.0 {
        return 1;
    }

    let usable = free_memory as f64 * memory_fraction.min(1.0);
    let fitting = (usable / bytes_per_image as f64).floor();

    // float-to-int casts saturate
    (fitting as usize).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bench_core::MIB;
    use proptest::prelude::*;

    fn sizer() -> BatchSizer {
        BatchSizer::new(
            &[
                ResolutionSpec::new("720p", 50 * MIB),
                ResolutionSpec::new("4k", 400 * MIB),
            ],
            &BatchingConfig::default(),
        )
    }

    #[test]
    fn test_reference_scenario() {
        // 200MB free * 0.8 = 160MB usable, 50MB per image
        let snapshot = ResourceSnapshot::unavailable().with_gpu_free_memory(200 * MIB);
        assert_eq!(sizer().compute_batch_size(&"720p".into(), &snapshot, 0.8), 3);
    }

    #[test]
    fn test_unmapped_class_uses_default_estimate() {
        let sizer = sizer();
        assert_eq!(sizer.bytes_per_image(&"8k".into()), 100 * MIB);

        let snapshot = ResourceSnapshot::unavailable().with_gpu_free_memory(1000 * MIB);
        assert_eq!(sizer.batch_size(&"8k".into(), &snapshot), 8);
    }

    #[test]
    fn test_missing_memory_reading_falls_back_to_one() {
        let snapshot = ResourceSnapshot::unavailable();
        assert_eq!(sizer().batch_size(&"720p".into(), &snapshot), 1);
    }

    #[test]
    fn test_insufficient_memory_still_dispatches_one() {
        let snapshot = ResourceSnapshot::unavailable().with_gpu_free_memory(10 * MIB);
        assert_eq!(sizer().batch_size(&"4k".into(), &snapshot), 1);

        let snapshot = ResourceSnapshot::unavailable().with_gpu_free_memory(0);
        assert_eq!(sizer().batch_size(&"720p".into(), &snapshot), 1);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(batch_size_for(0, Some(MIB), 0.8), 1);
        assert_eq!(batch_size_for(MIB, Some(10 * MIB), f64::NAN), 1);
        assert_eq!(batch_size_for(MIB, Some(10 * MIB), -1.0), 1);
        assert!(batch_size_for(1, Some(u64::MAX), 1.0) > 1);
    }

    proptest! {
        #[test]
        fn prop_never_below_one(
            bytes_per_image in 1u64..=u64::from(u32::MAX),
            free in proptest::option::of(any::<u64>()),
            fraction in 0.0001f64..=1.0,
        ) {
            prop_assert!(batch_size_for(bytes_per_image, free, fraction) >= 1);
        }

        #[test]
        fn prop_exactly_one_when_usable_below_cost(
            bytes_per_image in 2u64..=u64::from(u32::MAX),
            fraction in 0.0001f64..=1.0,
            ratio in 0.0f64..0.999,
        ) {
            let free = ((bytes_per_image as f64 * ratio) / fraction).floor() as u64;
            prop_assume!((free as f64 * fraction) < bytes_per_image as f64);
            prop_assert_eq!(batch_size_for(bytes_per_image, Some(free), fraction), 1);
        }

        #[test]
        fn prop_monotonic_in_free_memory(
            bytes_per_image in 1u64..=u64::from(u32::MAX),
            a in 0u64..=(1u64 << 48),
            b in 0u64..=(1u64 << 48),
            fraction in 0.0001f64..=1.0,
        ) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(
                batch_size_for(bytes_per_image, Some(low), fraction)
                    <= batch_size_for(bytes_per_image, Some(high), fraction)
            );
        }
    }
}
