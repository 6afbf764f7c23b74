use std::ops::RangeInclusive;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query},
    http::{header, HeaderMap},
    routing::post,
    Json,
};
use chirp_core::{samples_from_le_bytes, AudioFormat};
use chirp_social::{AudioInput, TranscriptionRequest};

use crate::{
    auth::Session,
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::TranscribeQuery,
    serialized::{ToSerialized, Transcription},
    Router,
};

/// Recordings are sent in pieces, so this only has to fit one of them
const MAX_AUDIO_BYTES: usize = 25 * 1024 * 1024;

const PCM_RATES: RangeInclusive<usize> = 8_000..=192_000;
const PCM_CHANNELS: RangeInclusive<usize> = 1..=8;

fn is_raw_pcm(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/octet-stream"))
}

/// Decides how to read the body from its content type
fn audio_input(headers: &HeaderMap, query: &TranscribeQuery, body: Bytes) -> ServerResult<AudioInput> {
    if !is_raw_pcm(headers) {
        return Ok(AudioInput::Wave(body.to_vec()));
    }

    let (Some(rate), Some(channels)) = (query.rate, query.channels) else {
        return Err(ServerError::bad_request(
            "Raw PCM needs the rate and channels query parameters",
        ));
    };

    if !PCM_RATES.contains(&rate) {
        return Err(ServerError::bad_request(format!(
            "The rate must be between {} and {} Hz",
            PCM_RATES.start(),
            PCM_RATES.end()
        )));
    }

    if !PCM_CHANNELS.contains(&channels) {
        return Err(ServerError::bad_request(format!(
            "There must be between {} and {} channels",
            PCM_CHANNELS.start(),
            PCM_CHANNELS.end()
        )));
    }

    let format = AudioFormat::new(rate, channels);

    Ok(AudioInput::Pcm {
        tracks: vec![samples_from_le_bytes(&body)],
        format,
    })
}

#[utoipa::path(
    post,
    path = "/api/transcribe",
    tag = "ai",
    params(TranscribeQuery),
    request_body(
        content = Vec<u8>,
        description = "A WAV file, or little-endian f32 PCM sent as application/octet-stream",
        content_type = "audio/wav"
    ),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Transcription),
        (status = 400, description = "The audio is empty or not understood"),
        (status = 503, description = "Speech-to-text is not configured")
    )
)]
async fn transcribe(
    _session: Session,
    context: ServerContext,
    Query(query): Query<TranscribeQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<Json<Transcription>> {
    let input = audio_input(&headers, &query, body)?;

    let result = context
        .social
        .transcription
        .transcribe(TranscriptionRequest {
            sid: query.sid,
            seq: query.seq,
            input,
        })
        .await?;

    Ok(Json(result.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/", post(transcribe))
        .layer(DefaultBodyLimit::max(MAX_AUDIO_BYTES))
}
