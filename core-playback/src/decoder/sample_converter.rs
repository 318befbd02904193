//! Conversion of decoded buffers to interleaved `f32`.

use symphonia::core::audio::{AudioBufferRef, SampleBuffer};
use tracing::warn;

/// Normalizes any decoded sample format to interleaved `f32` in `[-1.0, 1.0]`.
pub struct SampleConverter;

impl SampleConverter {
    /// Interleave and convert a decoded buffer (`LRLR...` for stereo).
    pub fn to_interleaved_f32(buffer: AudioBufferRef<'_>) -> Vec<f32> {
        if buffer.frames() == 0 {
            return Vec::new();
        }

        let spec = *buffer.spec();
        let capacity = buffer.capacity().max(buffer.frames()) as u64;
        let mut samples = SampleBuffer::<f32>::new(capacity, spec);
        samples.copy_interleaved_ref(buffer);
        samples.samples().to_vec()
    }

    /// Number of samples outside `[-1.0, 1.0]`, logged when non-zero.
    pub fn validate_samples(samples: &[f32]) -> usize {
        let clipped = samples.iter().filter(|s| !(-1.0..=1.0).contains(*s)).count();

        if clipped > 0 {
            warn!(
                "Detected {} clipped samples ({:.2}% of total)",
                clipped,
                (clipped as f64 / samples.len() as f64) * 100.0
            );
        }

        clipped
    }

    pub fn clamp_samples(samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }
}
