use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use loopback_capture_core::models::capability::PlatformFamily;
use loopback_capture_core::{DeviceDescriptor, SubprocessSlot, TerminationPolicy};

use super::device_list::{parse_device_list, InputFormat};
use super::process::ToolProcess;
use crate::error::DriverError;

pub const DEFAULT_PROGRAM: &str = "ffmpeg";
pub const DEFAULT_TIMEOUT_SLACK: Duration = Duration::from_secs(5);

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);
const DIAGNOSTICS_WAIT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub program: String,
    pub format: InputFormat,
    /// Wall-clock allowance beyond the requested duration before the run is killed.
    pub timeout_slack: Duration,
    pub termination: TerminationPolicy,
    pub temp_dir: PathBuf,
}

impl DriverOptions {
    pub fn for_platform(platform: PlatformFamily) -> Option<Self> {
        InputFormat::for_platform(platform).map(|format| Self {
            program: DEFAULT_PROGRAM.to_string(),
            format,
            timeout_slack: DEFAULT_TIMEOUT_SLACK,
            termination: TerminationPolicy::default(),
            temp_dir: std::env::temp_dir(),
        })
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

/// Removes the capture file however the run ends.
struct TempOutput(PathBuf);

impl Drop for TempOutput {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.0) {
            Ok(()) => log::debug!("removed {}", self.0.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("failed to remove {}: {}", self.0.display(), e),
        }
    }
}

enum RunEnd {
    Exited(i32),
    TimedOut,
    Cancelled,
}

/// Fixed-duration loopback recording through an external capture tool.
#[derive(Debug, Clone)]
pub struct NativeLoopbackDriver {
    options: DriverOptions,
}

impl NativeLoopbackDriver {
    pub fn new(options: DriverOptions) -> Self {
        Self { options }
    }

    /// A driver for the running platform, if the platform has a known input format.
    pub fn for_current_platform() -> Option<Self> {
        DriverOptions::for_platform(PlatformFamily::current()).map(Self::new)
    }

    pub fn options(&self) -> &DriverOptions {
        &self.options
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.options.program);
        command.stdin(Stdio::null()).kill_on_drop(true);
        command
    }

    fn spawn_error(&self, source: std::io::Error) -> DriverError {
        if source.kind() == std::io::ErrorKind::NotFound {
            DriverError::ToolMissing {
                program: self.options.program.clone(),
            }
        } else {
            DriverError::Spawn {
                program: self.options.program.clone(),
                source,
            }
        }
    }

    /// Run the version probe. Returns the tool's first output line.
    pub async fn check_available(&self) -> Result<String, DriverError> {
        let output = self
            .command()
            .arg("-version")
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;
        if !output.status.success() {
            return Err(DriverError::ToolUnusable {
                program: self.options.program.clone(),
                code: output.status.code().unwrap_or(-1),
                diagnostics: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let version = stdout.lines().next().unwrap_or_default().trim().to_string();
        log::debug!("{} available: {}", self.options.program, version);
        Ok(version)
    }

    /// List the tool's audio input devices.
    ///
    /// The listing run always "fails" because there is no real input, so its
    /// exit status is ignored.
    pub async fn list_devices(&self) -> Result<Vec<DeviceDescriptor>, DriverError> {
        let output = self
            .command()
            .args(self.options.format.list_args())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;
        let mut text = String::from_utf8_lossy(&output.stderr).into_owned();
        text.push('\n');
        text.push_str(&String::from_utf8_lossy(&output.stdout));

        let devices = parse_device_list(&text, self.options.format);
        log::info!(
            "{} listed {} {} audio device(s)",
            self.options.program,
            devices.len(),
            self.options.format.as_str()
        );
        Ok(devices)
    }

    fn capture_args(&self, device: &str, duration: Duration, sample_rate: u32, channels: u16, output: &Path) -> Vec<String> {
        vec![
            "-hide_banner".into(),
            "-y".into(),
            "-f".into(),
            self.options.format.as_str().into(),
            "-i".into(),
            self.options.format.device_spec(device),
            "-acodec".into(),
            "pcm_s16le".into(),
            "-ar".into(),
            sample_rate.to_string(),
            "-ac".into(),
            channels.to_string(),
            "-t".into(),
            format!("{:.3}", duration.as_secs_f64()),
            output.to_string_lossy().into_owned(),
        ]
    }

    /// Record `duration` of audio from `device` and return the WAV bytes.
    ///
    /// The live process sits in `slot` for the whole run so that whoever owns
    /// the slot can terminate it. Exceeding `duration` plus the timeout slack,
    /// or cancellation, stops the process with the termination policy.
    pub async fn capture(
        &self,
        device: &str,
        duration: Duration,
        sample_rate: u32,
        channels: u16,
        slot: &SubprocessSlot,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, DriverError> {
        let program = self.options.program.clone();
        let output = TempOutput(
            self.options
                .temp_dir
                .join(format!("loopback-capture-{}.wav", uuid::Uuid::new_v4())),
        );
        let args = self.capture_args(device, duration, sample_rate, channels, &output.0);
        log::info!("starting {} capture from {:?} for {:?}", program, device, duration);
        log::debug!("{} {}", program, args.join(" "));

        let mut child = self
            .command()
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stderr = child.stderr.take();
        let diagnostics = tokio::spawn(async move {
            let mut text = String::new();
            if let Some(mut stderr) = stderr {
                if let Err(e) = stderr.read_to_string(&mut text).await {
                    log::debug!("stopped reading capture diagnostics: {}", e);
                }
            }
            text
        });

        if let Some(mut previous) = slot.install(Box::new(ToolProcess::new(child, program.clone()))) {
            log::warn!("replacing a capture subprocess that was still registered");
            if let Err(e) = self.options.termination.terminate(previous.as_mut()).await {
                log::warn!("failed to stop previous capture subprocess: {}", e);
            }
        }

        let end = self.wait(duration, slot, cancel).await;
        if matches!(end, RunEnd::TimedOut | RunEnd::Cancelled) {
            if let Some(mut process) = slot.take() {
                match self.options.termination.terminate(process.as_mut()).await {
                    Ok(outcome) => log::info!("{} stopped: {:?}", program, outcome),
                    Err(e) => log::error!("failed to stop {}: {}", program, e),
                }
            }
        } else {
            slot.take();
        }

        let diagnostics = match tokio::time::timeout(DIAGNOSTICS_WAIT, diagnostics).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                log::debug!("diagnostics reader failed: {}", e);
                String::new()
            }
            Err(_) => String::new(),
        };

        match end {
            RunEnd::Exited(0) => {
                let bytes = tokio::fs::read(&output.0).await?;
                log::info!("{} captured {} bytes", program, bytes.len());
                Ok(bytes)
            }
            RunEnd::Exited(code) => {
                log::error!("{} exited with status {}", program, code);
                Err(DriverError::Exited {
                    program,
                    code,
                    diagnostics,
                })
            }
            RunEnd::TimedOut => {
                let secs = (duration + self.options.timeout_slack).as_secs_f64();
                log::error!("{} exceeded {:.1}s", program, secs);
                Err(DriverError::TimedOut {
                    program,
                    secs,
                    diagnostics,
                })
            }
            RunEnd::Cancelled => Err(DriverError::Cancelled),
        }
    }

    async fn wait(&self, duration: Duration, slot: &SubprocessSlot, cancel: &CancellationToken) -> RunEnd {
        let deadline = tokio::time::sleep(duration + self.options.timeout_slack);
        tokio::pin!(deadline);
        let mut poll = tokio::time::interval(EXIT_POLL_INTERVAL);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return RunEnd::Cancelled,
                _ = &mut deadline => return RunEnd::TimedOut,
                _ = poll.tick() => {
                    match slot.with(|process| process.try_wait()) {
                        Some(Ok(Some(code))) => return RunEnd::Exited(code),
                        Some(Ok(None)) => {}
                        Some(Err(e)) => {
                            log::error!("lost track of capture subprocess: {}", e);
                            return RunEnd::Exited(-1);
                        }
                        // Taken out of the slot by the session's teardown.
                        None => return RunEnd::Cancelled,
                    }
                }
            }
        }
    }
}
