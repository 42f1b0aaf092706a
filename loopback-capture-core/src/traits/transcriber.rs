use async_trait::async_trait;

use crate::models::error::CaptureError;
use crate::transcription::{TranscriptionRequest, TranscriptionResponse};

/// External speech-to-text collaborator.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, request: TranscriptionRequest) -> Result<TranscriptionResponse, CaptureError>;
}
