use std::mem::size_of;

/// A single audio sample
pub type Sample = f32;

/// The sample rate speech models expect
pub const SPEECH_SAMPLE_RATE: usize = 16_000;

/// How many seconds of audio go into a single transcription chunk
pub const CHUNK_DURATION_IN_SECONDS: f32 = 1.5;

/// Describes interleaved audio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// The rate of samples per second
    pub sample_rate: usize,
    /// The number of channels in the audio stream
    pub channel_count: usize,
}

impl AudioFormat {
    pub const SAMPLES_IN_BYTES: usize = size_of::<Sample>();

    /// The format chunks are sent to speech models in
    pub const SPEECH: Self = Self {
        sample_rate: SPEECH_SAMPLE_RATE,
        channel_count: 1,
    };

    pub fn new(sample_rate: usize, channel_count: usize) -> Self {
        Self {
            sample_rate,
            channel_count,
        }
    }

    /// How many samples exist in a second
    pub fn samples_per_sec(&self) -> usize {
        self.sample_rate * self.channel_count
    }

    /// Returns the number of samples for any given number of seconds
    pub fn seconds_to_samples(&self, seconds: f32) -> usize {
        (seconds * self.samples_per_sec() as f32) as usize
    }

    /// Returns the number of seconds for any given number of samples
    pub fn samples_to_seconds(&self, samples: usize) -> f32 {
        (samples as f32) / self.samples_per_sec() as f32
    }

    /// Returns the number of samples for any given number of bytes
    pub fn bytes_to_samples(&self, bytes: usize) -> usize {
        bytes / Self::SAMPLES_IN_BYTES
    }

    pub fn is_valid(&self) -> bool {
        self.sample_rate > 0 && self.channel_count > 0
    }
}

/// Reads little-endian f32 samples, ignoring a trailing partial sample
pub fn samples_from_le_bytes(bytes: &[u8]) -> Vec<Sample> {
    bytes
        .chunks_exact(AudioFormat::SAMPLES_IN_BYTES)
        .map(|b| Sample::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speech_chunk_size() {
        let samples = AudioFormat::SPEECH.seconds_to_samples(CHUNK_DURATION_IN_SECONDS);
        assert_eq!(samples, 24_000);
    }

    #[test]
    fn test_samples_from_le_bytes() {
        let mut bytes: Vec<u8> = [0.5f32, -1.0]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        bytes.push(7);

        assert_eq!(samples_from_le_bytes(&bytes), vec![0.5, -1.0]);
    }
}
