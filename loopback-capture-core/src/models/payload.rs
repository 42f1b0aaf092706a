use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Metadata describing an accepted payload.
///
/// Serializable for the transcription boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadMetadata {
    pub request_id: String,
    pub mime_type: String,
    pub duration_secs: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
    pub checksum: String,
    pub method: String,
    pub is_system_audio: bool,
    pub created_at: String,
}

/// A finalized, validated recording handed to the transcription collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturePayload {
    pub bytes: Vec<u8>,
    pub metadata: PayloadMetadata,
}

/// Format facts the recorder knows about the bytes it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadFormat {
    pub mime_type: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
    pub duration_secs: f64,
}

/// Capture facts the session knows about where the audio came from.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PayloadOrigin {
    pub method: String,
    pub is_system_audio: bool,
}

impl CapturePayload {
    pub fn new(bytes: Vec<u8>, format: PayloadFormat, origin: PayloadOrigin) -> Self {
        let checksum = sha256_hex(&bytes);
        let metadata = PayloadMetadata {
            request_id: uuid::Uuid::new_v4().to_string(),
            mime_type: format.mime_type,
            duration_secs: format.duration_secs,
            sample_rate: format.sample_rate,
            channels: format.channels,
            bit_depth: format.bit_depth,
            checksum,
            method: origin.method,
            is_system_audio: origin.is_system_audio,
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        Self { bytes, metadata }
    }

    pub fn mime_type(&self) -> &str {
        &self.metadata.mime_type
    }

    pub fn request_id(&self) -> &str {
        &self.metadata.request_id
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// SHA-256 hex digest.
pub fn sha256_hex(data: &[u8]) -> String {
    Sha256::digest(data).iter().map(|b| format!("{:02x}", b)).collect()
}
