mod chunker;
mod mixer;
mod resampler;
mod wave_encoder;

pub use chunker::*;
pub use mixer::*;
pub use resampler::*;
pub use wave_encoder::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Invalid audio format: {0}")]
    InvalidFormat(String),
    #[error("Failed to resample: {0}")]
    Resample(String),
}
