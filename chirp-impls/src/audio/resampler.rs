use chirp_core::Sample;
use rubato::{FftFixedInOut, Resampler};

use super::AudioError;

type SpeechResampler = FftFixedInOut<Sample>;

const CHUNK_SIZE: usize = 1024;

/// Resamples a mono signal, returning exactly as many samples as the new rate implies
pub fn resample_mono(
    samples: &[Sample],
    source_sample_rate: usize,
    target_sample_rate: usize,
) -> Result<Vec<Sample>, AudioError> {
    // Don't do anything if it's not necessary
    if source_sample_rate == target_sample_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let mut resampler =
        SpeechResampler::new(source_sample_rate, target_sample_rate, CHUNK_SIZE, 1)
            .map_err(|e| AudioError::Resample(e.to_string()))?;

    let frames_in = resampler.input_frames_next();
    let delay = resampler.output_delay();
    let expected = samples.len() * target_sample_rate / source_sample_rate;

    // Pad with silence so the last partial chunk is full and the delayed tail gets flushed out
    let mut padded = samples.to_vec();
    padded.resize((samples.len() / frames_in + 3) * frames_in, 0.);

    let mut output = Vec::with_capacity(expected + delay);

    for chunk in padded.chunks_exact(frames_in) {
        let resampled = resampler
            .process(&[chunk], None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;

        if let Some(channel) = resampled.into_iter().next() {
            output.extend_from_slice(&channel);
        }
    }

    Ok(output.into_iter().skip(delay).take(expected).collect())
}

/// Separates interleaved samples into one vector per channel
pub fn uninterleave_samples(samples: &[Sample], channels: usize) -> Vec<Vec<Sample>> {
    let mut uninterleaved_samples = vec![];
    let chunks: Vec<&[Sample]> = samples.chunks_exact(channels).collect();

    for c in 0..channels {
        let channel_samples = chunks.iter().map(|chunk| chunk[c]).collect();
        uninterleaved_samples.push(channel_samples);
    }

    uninterleaved_samples
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uninterleave_samples() {
        let samples = vec![1., 2., 3., 4., 5., 6.];
        let result = uninterleave_samples(&samples, 2);

        assert_eq!(result, vec![vec![1., 3., 5.], vec![2., 4., 6.]])
    }

    #[test]
    fn test_same_rate_is_untouched() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(resample_mono(&samples, 16_000, 16_000).unwrap(), samples);
    }

    #[test]
    fn test_downsampling_length() {
        let samples = vec![0.25; 48_000];
        let result = resample_mono(&samples, 48_000, 16_000).unwrap();

        assert_eq!(result.len(), 16_000);

        // A constant signal stays roughly constant away from the edges
        let middle = result[8_000];
        assert!((middle - 0.25).abs() < 0.05, "got {middle}");
    }
}
