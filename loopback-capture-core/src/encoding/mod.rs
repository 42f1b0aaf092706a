pub mod wav;

use std::collections::HashMap;
use std::sync::Arc;

use crate::traits::encoder::{AudioEncoder, EncoderSettings};

/// Recorder MIME preference, best first: speech-optimized compressed,
/// generic compressed, then lossless.
pub const DEFAULT_MIME_PREFERENCES: &[&str] = &[
    "audio/webm;codecs=opus",
    "audio/ogg;codecs=opus",
    "audio/webm",
    "audio/mp4",
    wav::WAV_MIME_TYPE,
];

pub type EncoderFactory = Arc<dyn Fn(&EncoderSettings) -> Box<dyn AudioEncoder> + Send + Sync>;

/// Encoders available in this runtime, keyed by MIME type.
#[derive(Clone)]
pub struct EncoderRegistry {
    factories: HashMap<String, EncoderFactory>,
}

impl EncoderRegistry {
    /// A registry with no encoders at all.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register(&mut self, mime_type: impl Into<String>, factory: EncoderFactory) {
        self.factories.insert(mime_type.into().to_ascii_lowercase(), factory);
    }

    pub fn supports(&self, mime_type: &str) -> bool {
        self.factories.contains_key(&mime_type.to_ascii_lowercase())
    }

    /// First entry of `preferences` this runtime can encode.
    pub fn select<'a, S: AsRef<str>>(&self, preferences: &'a [S]) -> Option<&'a str> {
        preferences
            .iter()
            .map(|p| AsRef::<str>::as_ref(p))
            .find(|mime| self.supports(mime))
    }

    pub fn create(&self, mime_type: &str, settings: &EncoderSettings) -> Option<Box<dyn AudioEncoder>> {
        self.factories
            .get(&mime_type.to_ascii_lowercase())
            .map(|factory| factory(settings))
    }

    pub fn mime_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

impl Default for EncoderRegistry {
    /// Built-in encoders: PCM WAV.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(
            wav::WAV_MIME_TYPE,
            Arc::new(|settings: &EncoderSettings| Box::new(wav::WavEncoder::new(*settings)) as Box<dyn AudioEncoder>),
        );
        registry
    }
}
