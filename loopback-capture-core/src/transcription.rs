use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::error::CaptureError;
use crate::models::payload::{CapturePayload, PayloadMetadata};
use crate::traits::transcriber::Transcriber;

/// How long the transcription collaborator gets before it is considered unresponsive.
pub const DEFAULT_TRANSCRIPTION_TIMEOUT: Duration = Duration::from_secs(15);

/// One completed session, as handed to the transcriber.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionRequest {
    pub request_id: String,
    #[serde(skip)]
    pub payload: Vec<u8>,
    pub mime_type: String,
    pub metadata: PayloadMetadata,
}

impl TranscriptionRequest {
    pub fn from_payload(payload: &CapturePayload) -> Self {
        Self {
            request_id: payload.request_id().to_string(),
            payload: payload.bytes.clone(),
            mime_type: payload.mime_type().to_string(),
            metadata: payload.metadata.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionResponse {
    pub request_id: String,
    pub success: bool,
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Send `payload` to `transcriber` and wait at most `timeout` for the matching response.
pub async fn submit_for_transcription(
    transcriber: &dyn Transcriber,
    payload: &CapturePayload,
    timeout: Duration,
) -> Result<String, CaptureError> {
    let request = TranscriptionRequest::from_payload(payload);
    let request_id = request.request_id.clone();
    log::info!(
        "submitting {} bytes ({}) for transcription, request {}",
        request.payload.len(),
        request.mime_type,
        request_id
    );

    let response = tokio::time::timeout(timeout, transcriber.transcribe(request))
        .await
        .map_err(|_| {
            log::warn!("transcription request {} timed out after {:?}", request_id, timeout);
            CaptureError::Timeout
        })??;

    if response.request_id != request_id {
        return Err(CaptureError::TranscriptionFailed(format!(
            "response for request {} does not match {}",
            response.request_id, request_id
        )));
    }
    if !response.success {
        return Err(CaptureError::TranscriptionFailed(
            response.error.unwrap_or_else(|| "transcription failed".into()),
        ));
    }
    response
        .transcript
        .ok_or_else(|| CaptureError::TranscriptionFailed("empty transcript".into()))
}
