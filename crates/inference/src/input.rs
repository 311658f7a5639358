//! Turns the text a caller pipes in into an RGB image.
//!
//! Two envelopes are accepted: a JSON object with an `image` field, or the
//! bare base64 string. Either may carry a data-URL prefix
//! (`data:image/png;base64,`).

use crate::errors::{DecodeError, DetectorError};
use base64::{
    Engine, alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use common::span_debug;
use image::RgbImage;
use std::borrow::Cow;
use std::io::Read;

/// Standard alphabet, padding optional.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Read everything from `reader` as UTF-8 text.
pub fn read_input<R: Read>(mut reader: R) -> Result<String, DetectorError> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|e| DetectorError::Inference(anyhow::Error::new(e).context("Failed to read input")))?;

    String::from_utf8(bytes).map_err(|_| DecodeError::NotUtf8.into())
}

/// Pick the base64 payload out of the raw input text.
pub fn extract_payload(raw: &str) -> Result<Cow<'_, str>, DetectorError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(DetectorError::EmptyInput);
    }

    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(serde_json::Value::Object(mut envelope)) => match envelope.remove("image") {
            Some(serde_json::Value::String(image)) => Ok(Cow::Owned(image)),
            Some(other) => Err(DecodeError::Envelope(format!(
                "`image` must be a base64 string, got {}",
                json_type_name(&other)
            ))
            .into()),
            None => Ok(Cow::Borrowed(text)),
        },
        // Not JSON, or JSON without an envelope: the text itself is the payload
        _ => Ok(Cow::Borrowed(text)),
    }
}

/// Drop everything up to and including the first comma, if any.
pub fn strip_data_url(payload: &str) -> &str {
    payload
        .split_once(',')
        .map_or(payload, |(_, encoded)| encoded)
}

/// Decode base64, ignoring embedded whitespace from line-wrapped encoders.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>, DecodeError> {
    let compact: Cow<'_, str> = if payload.bytes().any(|b| b.is_ascii_whitespace()) {
        Cow::Owned(
            payload
                .chars()
                .filter(|c| !c.is_ascii_whitespace())
                .collect(),
        )
    } else {
        Cow::Borrowed(payload)
    };

    Ok(PAYLOAD_ENGINE.decode(compact.as_bytes())?)
}

/// Decode encoded image bytes and normalize to 8-bit RGB.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, DecodeError> {
    let image = image::load_from_memory(bytes)?;
    tracing::debug!(
        width = image.width(),
        height = image.height(),
        color = ?image.color(),
        "Decoded image"
    );
    Ok(image.into_rgb8())
}

/// Full decode chain from raw input text to an RGB image.
pub fn decode_request(raw: &str) -> Result<RgbImage, DetectorError> {
    let _s = span_debug!("decode_request");

    let payload = extract_payload(raw)?;
    let encoded = strip_data_url(&payload);
    let bytes = decode_base64(encoded)?;

    tracing::debug!(
        encoded_len = encoded.len(),
        decoded_len = bytes.len(),
        "Decoded base64 payload"
    );

    Ok(decode_image(&bytes)?)
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
