use chirp_core::{AudioFormat, Sample};

/// Encodes [Sample]s into a complete 16-bit PCM .wav file
#[derive(Debug, Clone)]
pub struct WaveEncoder {
    header: WaveHeader,
}

#[derive(Debug, Clone, Copy)]
enum WaveHeaderValue {
    Ascii(&'static str),
    TwoBytes(u16),
    FourBytes(u32),
}

#[derive(Debug, Clone)]
struct WaveHeader {
    channel_count: u16,
    sample_rate: u32,
    bit_depth: u16,
}

impl WaveHeaderValue {
    fn to_bytes(self) -> Vec<u8> {
        match self {
            WaveHeaderValue::Ascii(x) => x.as_bytes().to_vec(),
            WaveHeaderValue::TwoBytes(x) => x.to_le_bytes().to_vec(),
            WaveHeaderValue::FourBytes(x) => x.to_le_bytes().to_vec(),
        }
    }
}

impl WaveHeader {
    const SIZE: usize = 44;

    // ChunkID: Contains the letters "RIFF" in ASCII form
    const CHUNK_ID: WaveHeaderValue = WaveHeaderValue::Ascii("RIFF");

    // Format: Contains the letters "WAVE"
    const FORMAT: WaveHeaderValue = WaveHeaderValue::Ascii("WAVE");

    // Subchunk1ID: Contains the letters "fmt "
    const FMT_CHUNK_ID: WaveHeaderValue = WaveHeaderValue::Ascii("fmt ");

    // Subchunk1Size: 16 for PCM.
    const FMT_CHUNK_SIZE: WaveHeaderValue = WaveHeaderValue::FourBytes(16);

    // AudioFormat: PCM = 1
    const AUDIO_FORMAT: WaveHeaderValue = WaveHeaderValue::TwoBytes(1);

    // Subchunk2ID: Contains the letters "data"
    const DATA_CHUNK_ID: WaveHeaderValue = WaveHeaderValue::Ascii("data");

    fn to_bytes(&self, data_size: u32) -> Vec<u8> {
        let num_channels = WaveHeaderValue::TwoBytes(self.channel_count);
        let sample_rate = WaveHeaderValue::FourBytes(self.sample_rate);

        let byte_rate = WaveHeaderValue::FourBytes(
            self.sample_rate * self.channel_count as u32 * self.bit_depth as u32 / 8,
        );

        let block_align = WaveHeaderValue::TwoBytes(self.channel_count * self.bit_depth / 8);
        let bits_per_sample = WaveHeaderValue::TwoBytes(self.bit_depth);

        // Everything after the RIFF chunk id and size
        let chunk_size = WaveHeaderValue::FourBytes(Self::SIZE as u32 - 8 + data_size);
        let data_chunk_size = WaveHeaderValue::FourBytes(data_size);

        [
            Self::CHUNK_ID,
            chunk_size,
            Self::FORMAT,
            Self::FMT_CHUNK_ID,
            Self::FMT_CHUNK_SIZE,
            Self::AUDIO_FORMAT,
            num_channels,
            sample_rate,
            byte_rate,
            block_align,
            bits_per_sample,
            Self::DATA_CHUNK_ID,
            data_chunk_size,
        ]
        .into_iter()
        .flat_map(WaveHeaderValue::to_bytes)
        .collect()
    }
}

impl WaveEncoder {
    pub fn new(format: AudioFormat) -> Self {
        let header = WaveHeader {
            channel_count: format.channel_count as u16,
            sample_rate: format.sample_rate as u32,
            bit_depth: 16,
        };

        Self { header }
    }

    /// Encodes interleaved samples into a .wav file, clipping anything outside -1.0..=1.0
    pub fn encode(&self, samples: &[Sample]) -> Vec<u8> {
        let data_size = (samples.len() * 2) as u32;
        let mut bytes = self.header.to_bytes(data_size);

        bytes.reserve(samples.len() * 2);
        bytes.extend(
            samples
                .iter()
                .map(|s| (s.clamp(-1., 1.) * i16::MAX as Sample) as i16)
                .flat_map(|s| s.to_le_bytes()),
        );

        bytes
    }

    pub fn content_type() -> &'static str {
        "audio/wav"
    }
}

/// Returns true if the bytes start with a RIFF/WAVE header
pub fn is_wave(bytes: &[u8]) -> bool {
    bytes.len() >= WaveHeader::SIZE && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    fn u16_at(bytes: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes(bytes[offset..offset + 2].try_into().unwrap())
    }

    #[test]
    fn test_header_layout() {
        let encoder = WaveEncoder::new(AudioFormat::SPEECH);
        let wav = encoder.encode(&[0.0; 100]);

        assert_eq!(wav.len(), 44 + 200);
        assert!(is_wave(&wav));
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(&wav[36..40], b"data");

        assert_eq!(u32_at(&wav, 4), 36 + 200);
        assert_eq!(u16_at(&wav, 22), 1);
        assert_eq!(u32_at(&wav, 24), 16_000);
        assert_eq!(u32_at(&wav, 28), 32_000);
        assert_eq!(u16_at(&wav, 32), 2);
        assert_eq!(u16_at(&wav, 34), 16);
        assert_eq!(u32_at(&wav, 40), 200);
    }

    #[test]
    fn test_samples_are_clipped() {
        let encoder = WaveEncoder::new(AudioFormat::SPEECH);
        let wav = encoder.encode(&[2.0, -2.0, 0.5]);

        let body: Vec<i16> = wav[44..]
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();

        assert_eq!(body, vec![i16::MAX, -i16::MAX, i16::MAX / 2]);
    }

    #[test]
    fn test_is_wave_rejects_other_data() {
        assert!(!is_wave(b"not a wave file at all, definitely not one!!"));
        assert!(!is_wave(b"RIFF"));
    }
}
