use chirp_core::{AudioFormat, Sample, CHUNK_DURATION_IN_SECONDS};

use super::{downmix_to_mono, resample_mono, AudioError, WaveEncoder};

/// A .wav encoded piece of speech audio, ready to be transcribed
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Position of this chunk in the recording, starting at 0
    pub seq: u64,
    pub duration_in_seconds: f32,
    pub wav: Vec<u8>,
}

/// Buffers incoming audio and cuts it into fixed-size 16kHz mono chunks
pub struct SpeechChunker {
    source: AudioFormat,
    encoder: WaveEncoder,
    pending: Vec<Sample>,
    chunk_size: usize,
    next_seq: u64,
}

impl SpeechChunker {
    pub fn new(source: AudioFormat) -> Result<Self, AudioError> {
        if !source.is_valid() {
            return Err(AudioError::InvalidFormat(format!(
                "{} Hz with {} channels",
                source.sample_rate, source.channel_count
            )));
        }

        Ok(Self {
            source,
            encoder: WaveEncoder::new(AudioFormat::SPEECH),
            pending: Vec::new(),
            chunk_size: AudioFormat::SPEECH.seconds_to_samples(CHUNK_DURATION_IN_SECONDS),
            next_seq: 0,
        })
    }

    /// Starts numbering chunks at the given sequence number
    pub fn starting_at(mut self, seq: u64) -> Self {
        self.next_seq = seq;
        self
    }

    /// Adds interleaved samples in the source format, returning every chunk that is now full
    pub fn push(&mut self, samples: &[Sample]) -> Result<Vec<AudioChunk>, AudioError> {
        let mono = downmix_to_mono(samples, self.source.channel_count);
        let resampled = resample_mono(&mono, self.source.sample_rate, AudioFormat::SPEECH.sample_rate)?;

        self.pending.extend_from_slice(&resampled);

        let mut chunks = vec![];

        while self.pending.len() >= self.chunk_size {
            let samples: Vec<_> = self.pending.drain(..self.chunk_size).collect();
            chunks.push(self.encode(&samples));
        }

        Ok(chunks)
    }

    /// Encodes whatever is left as a final, shorter chunk
    pub fn flush(&mut self) -> Option<AudioChunk> {
        if self.pending.is_empty() {
            return None;
        }

        let samples: Vec<_> = self.pending.drain(..).collect();
        Some(self.encode(&samples))
    }

    fn encode(&mut self, samples: &[Sample]) -> AudioChunk {
        let seq = self.next_seq;
        self.next_seq += 1;

        AudioChunk {
            seq,
            duration_in_seconds: AudioFormat::SPEECH.samples_to_seconds(samples.len()),
            wav: self.encoder.encode(samples),
        }
    }
}

/// Runs a complete recording through the chunker
pub fn speech_chunks(
    samples: &[Sample],
    format: AudioFormat,
    first_seq: u64,
) -> Result<Vec<AudioChunk>, AudioError> {
    let mut chunker = SpeechChunker::new(format)?.starting_at(first_seq);
    let mut chunks = chunker.push(samples)?;

    chunks.extend(chunker.flush());
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunks_are_cut_at_chunk_size() {
        let samples = vec![0.1; 40_000];
        let chunks = speech_chunks(&samples, AudioFormat::SPEECH, 7).unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].seq, 7);
        assert_eq!(chunks[1].seq, 8);
        assert_eq!(chunks[0].duration_in_seconds, 1.5);
        assert_eq!(chunks[0].wav.len(), 44 + 24_000 * 2);
        assert_eq!(chunks[1].wav.len(), 44 + 16_000 * 2);
    }

    #[test]
    fn test_stereo_input_is_downmixed() {
        let samples = vec![0.2; 16_000 * 2];
        let chunks = speech_chunks(&samples, AudioFormat::new(16_000, 2), 0).unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].wav.len(), 44 + 16_000 * 2);
    }

    #[test]
    fn test_push_keeps_remainder_until_flush() {
        let mut chunker = SpeechChunker::new(AudioFormat::SPEECH).unwrap();

        assert!(chunker.push(&[0.0; 10_000]).unwrap().is_empty());
        assert_eq!(chunker.push(&[0.0; 20_000]).unwrap().len(), 1);
        assert_eq!(chunker.flush().unwrap().wav.len(), 44 + 6_000 * 2);
        assert!(chunker.flush().is_none());
    }

    #[test]
    fn test_invalid_format() {
        assert!(SpeechChunker::new(AudioFormat::new(0, 2)).is_err());
    }
}
