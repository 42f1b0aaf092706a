use std::fmt;

use crate::models::error::CaptureError;
use crate::traits::capture_provider::{AudioBufferCallback, CaptureProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    Live,
    Ended,
}

/// One track of a media stream.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaTrack {
    pub id: String,
    pub kind: TrackKind,
    pub label: String,
    pub muted: bool,
    pub enabled: bool,
    pub state: TrackState,
}

impl MediaTrack {
    pub fn new(kind: TrackKind, label: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            label: label.into(),
            muted: false,
            enabled: true,
            state: TrackState::Live,
        }
    }

    pub fn audio(label: impl Into<String>) -> Self {
        Self::new(TrackKind::Audio, label)
    }

    pub fn video(label: impl Into<String>) -> Self {
        Self::new(TrackKind::Video, label)
    }

    /// Live, unmuted, enabled audio.
    pub fn is_usable_audio(&self) -> bool {
        self.kind == TrackKind::Audio && self.state == TrackState::Live && !self.muted && self.enabled
    }

    pub fn stop(&mut self) {
        self.state = TrackState::Ended;
    }
}

/// A raw capture stream: tracks plus the native sample source behind them.
///
/// Stopping ends every track and stops the provider. `stop` is idempotent and
/// also runs on drop, so a discarded candidate stream never keeps a device open.
pub struct MediaStream {
    id: String,
    tracks: Vec<MediaTrack>,
    provider: Option<Box<dyn CaptureProvider>>,
    started: bool,
    stopped: bool,
}

impl MediaStream {
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tracks,
            provider: None,
            started: false,
            stopped: false,
        }
    }

    /// A single-audio-track stream fed by `provider`.
    pub fn from_provider(provider: Box<dyn CaptureProvider>) -> Self {
        let label = provider.device_info().display_name;
        Self::new(vec![MediaTrack::audio(label)]).with_provider(provider)
    }

    pub fn with_provider(mut self, provider: Box<dyn CaptureProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn tracks_mut(&mut self) -> &mut [MediaTrack] {
        &mut self.tracks
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind == TrackKind::Audio)
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind == TrackKind::Video)
    }

    /// Label of the first audio track, if any.
    pub fn label(&self) -> Option<&str> {
        self.audio_tracks().next().map(|t| t.label.as_str())
    }

    /// Stop and remove every video track. Returns how many were removed.
    pub fn drop_video_tracks(&mut self) -> usize {
        let before = self.tracks.len();
        for track in self.tracks.iter_mut().filter(|t| t.kind == TrackKind::Video) {
            track.stop();
        }
        self.tracks.retain(|t| t.kind != TrackKind::Video);
        before - self.tracks.len()
    }

    /// At least one live, unmuted, enabled audio track.
    pub fn has_usable_audio(&self) -> bool {
        !self.stopped && self.tracks.iter().any(MediaTrack::is_usable_audio)
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// Start delivering samples to `callback`.
    pub fn start(&mut self, callback: AudioBufferCallback) -> Result<(), CaptureError> {
        if self.stopped {
            return Err(CaptureError::SourceUnavailable("stream already stopped".into()));
        }
        if self.started {
            return Err(CaptureError::ConfigurationFailed("stream already started".into()));
        }
        let provider = self
            .provider
            .as_mut()
            .ok_or_else(|| CaptureError::NoAudioTrack("stream has no sample source".into()))?;
        provider.start(callback)?;
        self.started = true;
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Whether a finite source has run out of audio.
    pub fn is_finished(&self) -> bool {
        self.provider.as_ref().is_some_and(|p| p.is_finished())
    }

    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        for track in &mut self.tracks {
            track.stop();
        }
        if let Some(provider) = self.provider.as_mut() {
            if let Err(e) = provider.stop() {
                log::warn!("failed to stop stream provider: {}", e);
            }
        }
        log::debug!("media stream {} stopped", self.id);
    }
}

impl Drop for MediaStream {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaStream")
            .field("id", &self.id)
            .field("tracks", &self.tracks)
            .field("has_provider", &self.provider.is_some())
            .field("started", &self.started)
            .field("stopped", &self.stopped)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ToneProvider;

    #[test]
    fn usable_audio_requires_live_unmuted_enabled() {
        let mut stream = MediaStream::new(vec![MediaTrack::audio("mic")]);
        assert!(stream.has_usable_audio());

        stream.tracks_mut()[0].muted = true;
        assert!(!stream.has_usable_audio());

        stream.tracks_mut()[0].muted = false;
        stream.tracks_mut()[0].enabled = false;
        assert!(!stream.has_usable_audio());
    }

    #[test]
    fn video_only_stream_is_unusable() {
        let stream = MediaStream::new(vec![MediaTrack::video("screen")]);
        assert!(!stream.has_usable_audio());
    }

    #[test]
    fn drop_video_keeps_audio() {
        let mut stream = MediaStream::new(vec![MediaTrack::video("screen"), MediaTrack::audio("system")]);
        assert_eq!(stream.drop_video_tracks(), 1);
        assert_eq!(stream.tracks().len(), 1);
        assert_eq!(stream.label(), Some("system"));
        assert!(stream.has_usable_audio());
    }

    #[test]
    fn stop_is_idempotent_and_stops_provider() {
        let tone = ToneProvider::new(0.5);
        let probe = tone.probe();
        let mut stream = MediaStream::from_provider(Box::new(tone));
        stream.start(std::sync::Arc::new(|_: &[f32], _: f64, _: u16| {})).unwrap();
        assert!(probe.is_running());

        stream.stop();
        stream.stop();
        assert!(!probe.is_running());
        assert_eq!(probe.stop_calls(), 1);
        assert!(stream.tracks().iter().all(|t| t.state == TrackState::Ended));
        assert!(!stream.has_usable_audio());
    }

    #[test]
    fn start_without_provider_fails() {
        let mut stream = MediaStream::new(vec![MediaTrack::audio("orphan")]);
        let err = stream.start(std::sync::Arc::new(|_: &[f32], _: f64, _: u16| {})).unwrap_err();
        assert!(matches!(err, CaptureError::NoAudioTrack(_)));
    }

    #[test]
    fn drop_stops_provider() {
        let tone = ToneProvider::new(0.5);
        let probe = tone.probe();
        {
            let mut stream = MediaStream::from_provider(Box::new(tone));
            stream.start(std::sync::Arc::new(|_: &[f32], _: f64, _: u16| {})).unwrap();
        }
        assert!(!probe.is_running());
    }
}
