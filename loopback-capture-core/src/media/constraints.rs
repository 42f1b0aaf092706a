/// Audio processing and format constraints for an input request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AudioConstraints {
    pub device_id: Option<String>,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    pub sample_rate: Option<u32>,
    pub channel_count: Option<u16>,
}

impl AudioConstraints {
    /// All voice processing disabled, for loopback-style fidelity.
    pub fn raw() -> Self {
        Self::default()
    }

    /// All voice processing enabled, for general microphone use.
    pub fn processed() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
            ..Self::default()
        }
    }

    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn with_format(mut self, sample_rate: u32, channels: u16) -> Self {
        self.sample_rate = Some(sample_rate);
        self.channel_count = Some(channels);
        self
    }

    pub fn is_raw(&self) -> bool {
        !self.echo_cancellation && !self.noise_suppression && !self.auto_gain_control
    }
}

/// Video request parameters. Only used where the capture mechanism insists on video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoConstraints {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
}

impl VideoConstraints {
    /// 1×1 at 1 fps; discarded as soon as the stream opens.
    pub fn minimal() -> Self {
        Self {
            width: 1,
            height: 1,
            frame_rate: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MediaConstraints {
    pub audio: Option<AudioConstraints>,
    pub video: Option<VideoConstraints>,
}

impl MediaConstraints {
    pub fn audio_only(audio: AudioConstraints) -> Self {
        Self {
            audio: Some(audio),
            video: None,
        }
    }

    pub fn with_minimal_video(audio: AudioConstraints) -> Self {
        Self {
            audio: Some(audio),
            video: Some(VideoConstraints::minimal()),
        }
    }

    pub fn wants_video(&self) -> bool {
        self.video.is_some()
    }
}
