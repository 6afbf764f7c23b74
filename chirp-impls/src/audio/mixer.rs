use chirp_core::Sample;

use super::resampler::uninterleave_samples;

/// Sums several tracks of the same format into one, clipping the result.
/// Shorter tracks are treated as silent once they end.
pub fn mix_tracks(tracks: &[Vec<Sample>]) -> Vec<Sample> {
    let length = tracks.iter().map(|t| t.len()).max().unwrap_or(0);
    let mut mixed = vec![0.; length];

    for track in tracks {
        for (out, sample) in mixed.iter_mut().zip(track) {
            *out += sample;
        }
    }

    mixed.iter_mut().for_each(|s| *s = s.clamp(-1., 1.));
    mixed
}

/// Averages all channels of interleaved samples into a single channel
pub fn downmix_to_mono(samples: &[Sample], channel_count: usize) -> Vec<Sample> {
    if channel_count <= 1 {
        return samples.to_vec();
    }

    let channels = uninterleave_samples(samples, channel_count);
    let frames = channels.first().map(|c| c.len()).unwrap_or(0);

    (0..frames)
        .map(|i| channels.iter().map(|c| c[i]).sum::<Sample>() / channel_count as Sample)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mix_tracks() {
        let mixed = mix_tracks(&[vec![0.5, 0.5, 0.5], vec![0.25, 0.75]]);
        assert_eq!(mixed, vec![0.75, 1.0, 0.5]);
    }

    #[test]
    fn test_mix_nothing() {
        assert!(mix_tracks(&[]).is_empty());
    }

    #[test]
    fn test_downmix_to_mono() {
        let stereo = vec![1.0, 0.0, 0.5, 0.5, -1.0, 1.0];
        assert_eq!(downmix_to_mono(&stereo, 2), vec![0.5, 0.5, 0.0]);
    }
}
