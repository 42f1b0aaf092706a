use crate::models::error::CaptureError;

/// Settings an encoder is created with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncoderSettings {
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
    pub bits_per_second: u32,
}

/// Chunked audio encoder used by the recorder.
pub trait AudioEncoder: Send {
    /// MIME type of the finished payload.
    fn mime_type(&self) -> &str;

    /// Encode interleaved samples into one chunk.
    fn encode(&mut self, samples: &[f32]) -> Result<Vec<u8>, CaptureError>;

    /// Assemble all chunks into the final payload bytes.
    fn finish(&mut self, chunks: Vec<Vec<u8>>) -> Result<Vec<u8>, CaptureError>;
}
