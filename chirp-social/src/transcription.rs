use chirp_core::{AudioFormat, AudioShape, IntegrationError, Sample, FALLBACK_SPEECH_MODEL};
use chirp_impls::{is_wave, mix_tracks, speech_chunks};
use thiserror::Error;

use crate::SocialContext;

#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("Speech-to-text is not configured")]
    NotConfigured,
    #[error("Invalid audio: {0}")]
    InvalidAudio(String),
    #[error("Audio is empty")]
    EmptyAudio,
    #[error("Transcription failed: {message}")]
    Failed {
        /// The status of the last vendor response, if there was one
        status: Option<u16>,
        message: String,
    },
}

/// Audio to transcribe
#[derive(Debug, Clone)]
pub enum AudioInput {
    /// A complete .wav file
    Wave(Vec<u8>),
    /// One or more tracks of interleaved samples in the same format
    Pcm {
        tracks: Vec<Vec<Sample>>,
        format: AudioFormat,
    },
}

#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    /// Identifies the recording session the audio belongs to
    pub sid: String,
    pub seq: u64,
    pub input: AudioInput,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionResult {
    pub sid: String,
    pub seq: u64,
    pub text: String,
    /// The model that produced the text
    pub model: String,
}

pub struct Transcription {
    context: SocialContext,
}

/// The (model, shape) pairs to try, in order. The fallback model is skipped
/// when it's the configured one, since it would only repeat the same attempts.
pub fn attempt_plan(configured: &str) -> Vec<(String, AudioShape)> {
    let mut models = vec![configured];

    if configured != FALLBACK_SPEECH_MODEL {
        models.push(FALLBACK_SPEECH_MODEL);
    }

    models
        .into_iter()
        .flat_map(|model| {
            [AudioShape::DataUrl, AudioShape::ByteArray]
                .into_iter()
                .map(move |shape| (model.to_string(), shape))
        })
        .collect()
}

impl Transcription {
    pub fn new(context: &SocialContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    pub async fn transcribe(
        &self,
        request: TranscriptionRequest,
    ) -> Result<TranscriptionResult, TranscriptionError> {
        if self.context.integrations.speech.is_none() {
            return Err(TranscriptionError::NotConfigured);
        }

        let (text, model) = match request.input {
            AudioInput::Wave(bytes) => {
                if bytes.is_empty() {
                    return Err(TranscriptionError::EmptyAudio);
                }

                if !is_wave(&bytes) {
                    return Err(TranscriptionError::InvalidAudio(
                        "expected a RIFF/WAVE file".to_string(),
                    ));
                }

                self.transcribe_wav(&bytes).await?
            }
            AudioInput::Pcm { tracks, format } => {
                self.transcribe_pcm(&tracks, format, request.seq).await?
            }
        };

        Ok(TranscriptionResult {
            sid: request.sid,
            seq: request.seq,
            text,
            model,
        })
    }

    /// Mixes the tracks and transcribes them chunk by chunk, joining the texts
    async fn transcribe_pcm(
        &self,
        tracks: &[Vec<Sample>],
        format: AudioFormat,
        seq: u64,
    ) -> Result<(String, String), TranscriptionError> {
        let mixed = mix_tracks(tracks);

        if mixed.is_empty() {
            return Err(TranscriptionError::EmptyAudio);
        }

        let chunks = speech_chunks(&mixed, format, seq)
            .map_err(|e| TranscriptionError::InvalidAudio(e.to_string()))?;

        let mut texts = vec![];
        let mut model = String::new();

        for chunk in chunks {
            let (text, used) = self.transcribe_wav(&chunk.wav).await?;

            if !text.is_empty() {
                texts.push(text);
            }

            model = used;
        }

        Ok((texts.join(" "), model))
    }

    /// Tries every attempt in the plan until one succeeds
    async fn transcribe_wav(&self, wav: &[u8]) -> Result<(String, String), TranscriptionError> {
        let speech = self
            .context
            .integrations
            .speech
            .as_ref()
            .ok_or(TranscriptionError::NotConfigured)?;

        let mut last_error: Option<IntegrationError> = None;

        for (model, shape) in attempt_plan(speech.configured_model()) {
            match speech.transcribe(&model, shape, wav).await {
                Ok(transcript) => return Ok((transcript.joined(), model)),
                Err(e) => {
                    log::warn!("Transcription with {} ({:?}) failed: {}", model, shape, e);
                    last_error = Some(e);
                }
            }
        }

        Err(match last_error {
            Some(e) => TranscriptionError::Failed {
                status: e.status(),
                message: e.to_string(),
            },
            None => TranscriptionError::Failed {
                status: None,
                message: "no model to try".to_string(),
            },
        })
    }
}
