//! WAV file format utilities.
//!
//! Generates standard 44-byte RIFF WAV headers, encodes recorder chunks as
//! integer PCM, and decodes the WAV files written by the native capture tool.

use crate::models::error::CaptureError;
use crate::processing::mixdown::convert_to_pcm;
use crate::traits::encoder::{AudioEncoder, EncoderSettings};

/// Size of the standard WAV RIFF header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

pub const WAV_MIME_TYPE: &str = "audio/wav";

const FORMAT_PCM: u16 = 1;
const FORMAT_IEEE_FLOAT: u16 = 3;
const FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// Generate a 44-byte WAV RIFF header.
///
/// Format: PCM (format code 1), little-endian.
///
/// Layout:
/// ```text
/// [0-3]    "RIFF"
/// [4-7]    file size - 8 (36 + data_size)
/// [8-11]   "WAVE"
/// [12-15]  "fmt "
/// [16-19]  16 (PCM format chunk size)
/// [20-21]  1 (PCM format code)
/// [22-23]  channels
/// [24-27]  sample_rate
/// [28-31]  byte_rate = sample_rate * channels * bit_depth / 8
/// [32-33]  block_align = channels * bit_depth / 8
/// [34-35]  bit_depth
/// [36-39]  "data"
/// [40-43]  data_size
/// ```
pub fn generate_wav_header(sample_rate: u32, bit_depth: u16, channels: u16, data_size: u32) -> [u8; WAV_HEADER_SIZE] {
    let byte_rate = sample_rate * channels as u32 * bit_depth as u32 / 8;
    let block_align = channels * bit_depth / 8;
    let chunk_size = 36u32.saturating_add(data_size);

    let mut header = [0u8; WAV_HEADER_SIZE];

    // RIFF chunk descriptor
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&chunk_size.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    // fmt sub-chunk
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&FORMAT_PCM.to_le_bytes());
    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&bit_depth.to_le_bytes());

    // data sub-chunk
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());

    header
}

/// Recorder encoder producing a single PCM WAV payload.
#[derive(Debug)]
pub struct WavEncoder {
    settings: EncoderSettings,
}

impl WavEncoder {
    pub fn new(settings: EncoderSettings) -> Self {
        Self { settings }
    }
}

impl AudioEncoder for WavEncoder {
    fn mime_type(&self) -> &str {
        WAV_MIME_TYPE
    }

    fn encode(&mut self, samples: &[f32]) -> Result<Vec<u8>, CaptureError> {
        Ok(convert_to_pcm(samples, self.settings.bit_depth))
    }

    fn finish(&mut self, chunks: Vec<Vec<u8>>) -> Result<Vec<u8>, CaptureError> {
        let data_size: usize = chunks.iter().map(Vec::len).sum();
        let data_size = u32::try_from(data_size)
            .map_err(|_| CaptureError::StorageError(format!("recording too large for WAV: {} bytes", data_size)))?;

        let mut out = Vec::with_capacity(WAV_HEADER_SIZE + data_size as usize);
        out.extend_from_slice(&generate_wav_header(
            self.settings.sample_rate,
            self.settings.bit_depth,
            self.settings.channels,
            data_size,
        ));
        for chunk in chunks {
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }
}

/// Decoded WAV audio as interleaved f32.
#[derive(Debug, Clone, PartialEq)]
pub struct WavClip {
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
    pub samples: Vec<f32>,
}

impl WavClip {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / f64::from(self.channels) / f64::from(self.sample_rate)
    }
}

fn read_u16(data: &[u8], at: usize) -> Option<u16> {
    data.get(at..at + 2).map(|b| u16::from_le_bytes([b[0], b[1]]))
}

fn read_u32(data: &[u8], at: usize) -> Option<u32> {
    data.get(at..at + 4).map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn malformed(reason: &str) -> CaptureError {
    CaptureError::StorageError(format!("malformed WAV: {}", reason))
}

/// Decode a RIFF/WAVE file into f32 samples.
///
/// Walks the chunk list, so extra chunks (e.g. `LIST`) before `data` are
/// skipped. A `data` size that overruns the file is truncated to what exists.
pub fn decode_wav(data: &[u8]) -> Result<WavClip, CaptureError> {
    if data.len() < 12 || &data[0..4] != b"RIFF" || &data[8..12] != b"WAVE" {
        return Err(malformed("missing RIFF/WAVE signature"));
    }

    let mut format: Option<(u16, u16, u32, u16)> = None;
    let mut offset = 12;
    while offset + 8 <= data.len() {
        let id = &data[offset..offset + 4];
        let size = read_u32(data, offset + 4).ok_or_else(|| malformed("truncated chunk header"))? as usize;
        let body = offset + 8;

        match id {
            b"fmt " => {
                let code = read_u16(data, body).ok_or_else(|| malformed("truncated fmt chunk"))?;
                let channels = read_u16(data, body + 2).ok_or_else(|| malformed("truncated fmt chunk"))?;
                let sample_rate = read_u32(data, body + 4).ok_or_else(|| malformed("truncated fmt chunk"))?;
                let bit_depth = read_u16(data, body + 14).ok_or_else(|| malformed("truncated fmt chunk"))?;
                format = Some((code, channels, sample_rate, bit_depth));
            }
            b"data" => {
                let (code, channels, sample_rate, bit_depth) = format.ok_or_else(|| malformed("data before fmt"))?;
                let end = body.saturating_add(size).min(data.len());
                let samples = decode_samples(&data[body..end], code, bit_depth)?;
                return Ok(WavClip {
                    sample_rate,
                    channels,
                    bit_depth,
                    samples,
                });
            }
            _ => {}
        }

        // Chunks are word-aligned.
        offset = body.saturating_add(size).saturating_add(size & 1);
    }

    Err(malformed("no data chunk"))
}

fn decode_samples(bytes: &[u8], code: u16, bit_depth: u16) -> Result<Vec<f32>, CaptureError> {
    let float = code == FORMAT_IEEE_FLOAT;
    if code != FORMAT_PCM && !float && code != FORMAT_EXTENSIBLE {
        return Err(malformed(&format!("unsupported format code {}", code)));
    }

    let samples = match (bit_depth, float) {
        (16, false) => bytes
            .chunks_exact(2)
            .map(|b| f32::from(i16::from_le_bytes([b[0], b[1]])) / 32_768.0)
            .collect(),
        (24, false) => bytes
            .chunks_exact(3)
            .map(|b| {
                let value = i32::from_le_bytes([0, b[0], b[1], b[2]]) >> 8;
                value as f32 / 8_388_608.0
            })
            .collect(),
        (32, false) => bytes
            .chunks_exact(4)
            .map(|b| (f64::from(i32::from_le_bytes([b[0], b[1], b[2], b[3]])) / 2_147_483_648.0) as f32)
            .collect(),
        (32, true) => bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
        (depth, _) => return Err(malformed(&format!("unsupported bit depth {}", depth))),
    };
    Ok(samples)
}
